use super::{required, required_date};
use crate::allocation::{Allocation, OwnerAllocation, OwnerShare};
use crate::domain::{
    FieldId, InventoryItemId, RecordId, UserId, ValidationError, non_negative, optional_text,
    percentage,
};
use crate::store::Document;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A processed field pass with its fuel cost split across the field owners.
///
/// Item and field names are copied in when the record is computed so the
/// record stays readable after either is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRecord {
    pub id: RecordId,
    pub inventory_item_id: InventoryItemId,
    pub inventory_item_name: String,
    pub field_id: FieldId,
    pub field_name: String,
    pub date: NaiveDate,
    /// Decares
    pub processed_area: f64,
    pub fuel_unit_price: f64,
    pub total_fuel_consumption: f64,
    pub total_cost: f64,
    pub field_owners: Vec<OwnerShare>,
    pub owner_distribution: Vec<OwnerAllocation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingRecord {
    /// Amount charged to `user` by this record.
    pub fn amount_for(&self, user: &str) -> f64 {
        self.owner_distribution
            .iter()
            .filter(|entry| entry.user_id.as_str() == user)
            .map(|entry| entry.amount)
            .sum()
    }
}

impl Document for ProcessingRecord {
    const COLLECTION: &'static str = "processing_records";

    fn document_id(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerShareInput {
    pub user_id: Option<String>,
    #[serde(alias = "percentage")]
    pub ownership_percentage: Option<f64>,
    pub owner_name: Option<String>,
}

/// Body of a processing submission. Totals and the distribution are never
/// read from the client; they are always recomputed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingInput {
    pub inventory_item_id: Option<String>,
    pub field_id: Option<String>,
    pub date: Option<String>,
    pub processed_area: Option<f64>,
    #[serde(alias = "fuelPrice")]
    pub fuel_unit_price: Option<f64>,
    pub field_owners: Option<Vec<OwnerShareInput>>,
}

/// A submission whose values are present and well formed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingRequest {
    pub inventory_item_id: InventoryItemId,
    pub field_id: FieldId,
    pub date: NaiveDate,
    pub processed_area: f64,
    pub fuel_unit_price: f64,
    /// `None` when the owners should come from the field's ledger.
    pub field_owners: Option<Vec<OwnerShare>>,
}

impl ProcessingInput {
    /// Checks everything that can be checked without the store.
    pub fn validate(self) -> Result<ProcessingRequest, ValidationError> {
        let inventory_item_id =
            InventoryItemId::new(required("inventoryItemId", self.inventory_item_id)?)?;
        let field_id = FieldId::new(required("fieldId", self.field_id)?)?;
        let date = required_date("date", self.date)?;
        let processed_area =
            non_negative("processedArea", required("processedArea", self.processed_area)?)?;
        let fuel_unit_price =
            non_negative("fuelUnitPrice", required("fuelUnitPrice", self.fuel_unit_price)?)?;

        let field_owners = match self.field_owners {
            None => None,
            Some(owners) if owners.is_empty() => return Err(ValidationError::NoOwners),
            Some(owners) => Some(
                owners
                    .into_iter()
                    .map(|owner| {
                        Ok(OwnerShare {
                            user_id: UserId::new(
                                owner.user_id.ok_or(ValidationError::Missing("userId"))?,
                            )?,
                            ownership_percentage: percentage(
                                "ownershipPercentage",
                                owner
                                    .ownership_percentage
                                    .ok_or(ValidationError::Missing("ownershipPercentage"))?,
                            )?,
                            owner_name: optional_text(owner.owner_name).unwrap_or_default(),
                        })
                    })
                    .collect::<Result<Vec<_>, ValidationError>>()?,
            ),
        };

        Ok(ProcessingRequest {
            inventory_item_id,
            field_id,
            date,
            processed_area,
            fuel_unit_price,
            field_owners,
        })
    }
}

/// Names resolved from the referenced item and field.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNames {
    pub inventory_item_name: String,
    pub field_name: String,
}

impl ProcessingRequest {
    /// Builds the stored record from a computed allocation. An `existing`
    /// record keeps its id and creation time.
    pub fn into_record(
        self,
        owners: Vec<OwnerShare>,
        names: ResolvedNames,
        allocation: Allocation,
        existing: Option<&ProcessingRecord>,
        now: DateTime<Utc>,
    ) -> ProcessingRecord {
        ProcessingRecord {
            id: existing.map_or_else(RecordId::generate, |r| r.id.clone()),
            inventory_item_id: self.inventory_item_id,
            inventory_item_name: names.inventory_item_name,
            field_id: self.field_id,
            field_name: names.field_name,
            date: self.date,
            processed_area: self.processed_area,
            fuel_unit_price: self.fuel_unit_price,
            total_fuel_consumption: allocation.total_fuel_consumption,
            total_cost: allocation.total_cost,
            field_owners: owners,
            owner_distribution: allocation.distribution,
            created_at: existing.map_or(now, |r| r.created_at),
            updated_at: now,
        }
    }
}
