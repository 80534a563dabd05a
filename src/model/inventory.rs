use super::{OwnershipShare, OwnershipShareInput, optional_date, required, validate_ledger};
use crate::domain::{InventoryItemId, ValidationError, non_negative, optional_text, required_text};
use crate::store::Document;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum InventoryStatus {
    #[default]
    #[serde(alias = "Aktif")]
    Active,
    #[serde(alias = "Bakımda")]
    Maintenance,
    #[serde(alias = "Hurda")]
    Retired,
}

/// Equipment or material, optionally burning fuel while in use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub name: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_price: Option<f64>,
    pub status: InventoryStatus,
    #[serde(default)]
    pub owners: Vec<OwnershipShare>,
    /// Liters per decare
    pub fuel_consumption_rate: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn owned_by(&self, user: &str) -> bool {
        self.owners.iter().any(|owner| owner.user_id.as_str() == user)
    }
}

impl Document for InventoryItem {
    const COLLECTION: &'static str = "inventory";

    fn document_id(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItemInput {
    pub name: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub purchase_date: Option<String>,
    pub purchase_price: Option<f64>,
    pub status: Option<InventoryStatus>,
    pub owners: Option<Vec<OwnershipShareInput>>,
    pub fuel_consumption_rate: Option<f64>,
}

impl InventoryItemInput {
    pub fn into_item(
        self,
        existing: Option<&InventoryItem>,
        now: DateTime<Utc>,
    ) -> Result<InventoryItem, ValidationError> {
        Ok(InventoryItem {
            id: existing.map_or_else(InventoryItemId::generate, |i| i.id.clone()),
            name: required_text("name", &required("name", self.name)?)?,
            category: required_text("category", &required("category", self.category)?)?,
            sub_category: optional_text(self.sub_category),
            purchase_date: optional_date("purchaseDate", self.purchase_date)?,
            purchase_price: self
                .purchase_price
                .map(|price| non_negative("purchasePrice", price))
                .transpose()?,
            status: self.status.unwrap_or_default(),
            owners: validate_ledger(self.owners.unwrap_or_default())?,
            fuel_consumption_rate: self
                .fuel_consumption_rate
                .map(|rate| non_negative("fuelConsumptionRate", rate))
                .transpose()?,
            created_at: existing.map_or(now, |i| i.created_at),
            updated_at: now,
        })
    }
}
