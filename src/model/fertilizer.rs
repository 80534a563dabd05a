use super::required;
use crate::domain::{FertilizerId, ValidationError, non_negative, positive, required_text};
use crate::store::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum FertilizerKind {
    #[serde(alias = "Katı")]
    Solid,
    #[serde(alias = "Sıvı")]
    Liquid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum FertilizerUnit {
    #[serde(alias = "ton")]
    Ton,
    #[serde(alias = "litre")]
    Liter,
    #[serde(alias = "çuval")]
    Bag,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum FertilizerStatus {
    #[default]
    #[serde(alias = "Aktif")]
    Active,
    #[serde(alias = "Pasif")]
    Passive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fertilizer {
    pub id: FertilizerId,
    pub name: String,
    pub kind: FertilizerKind,
    pub unit: FertilizerUnit,
    /// Set exactly when `unit` is [`FertilizerUnit::Bag`]
    pub kg_per_bag: Option<f64>,
    pub current_stock: f64,
    pub price: f64,
    pub status: FertilizerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Fertilizer {
    const COLLECTION: &'static str = "fertilizers";

    fn document_id(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FertilizerInput {
    pub name: Option<String>,
    #[serde(alias = "type")]
    pub kind: Option<FertilizerKind>,
    pub unit: Option<FertilizerUnit>,
    pub kg_per_bag: Option<f64>,
    pub current_stock: Option<f64>,
    pub price: Option<f64>,
    pub status: Option<FertilizerStatus>,
}

impl FertilizerInput {
    pub fn into_fertilizer(
        self,
        existing: Option<&Fertilizer>,
        now: DateTime<Utc>,
    ) -> Result<Fertilizer, ValidationError> {
        let unit = required("unit", self.unit)?;
        let kg_per_bag = match unit {
            FertilizerUnit::Bag => Some(positive(
                "kgPerBag",
                self.kg_per_bag.ok_or(ValidationError::Missing("kgPerBag"))?,
            )?),
            // A bag weight means nothing for bulk units.
            FertilizerUnit::Ton | FertilizerUnit::Liter => None,
        };

        Ok(Fertilizer {
            id: existing.map_or_else(FertilizerId::generate, |f| f.id.clone()),
            name: required_text("name", &required("name", self.name)?)?,
            kind: required("kind", self.kind)?,
            unit,
            kg_per_bag,
            current_stock: non_negative("currentStock", self.current_stock.unwrap_or(0.0))?,
            price: non_negative("price", required("price", self.price)?)?,
            status: self.status.unwrap_or_default(),
            created_at: existing.map_or(now, |f| f.created_at),
            updated_at: now,
        })
    }
}
