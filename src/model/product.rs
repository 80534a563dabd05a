use super::{optional_date, optional_ref, required};
use crate::domain::{FieldId, ProductId, ValidationError, non_negative, required_text};
use crate::store::Document;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A seasonal crop, optionally tied to the field it grows on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub field_id: Option<FieldId>,
    pub category: String,
    pub unit: String,
    pub planting_date: Option<NaiveDate>,
    pub harvest_date: Option<NaiveDate>,
    pub revenue: Option<f64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Product {
    const COLLECTION: &'static str = "products";

    fn document_id(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: Option<String>,
    #[serde(alias = "field")]
    pub field_id: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub planting_date: Option<String>,
    pub harvest_date: Option<String>,
    pub revenue: Option<f64>,
    pub is_active: Option<bool>,
}

impl ProductInput {
    pub fn into_product(
        self,
        existing: Option<&Product>,
        now: DateTime<Utc>,
    ) -> Result<Product, ValidationError> {
        let planting_date = optional_date("plantingDate", self.planting_date)?;
        let harvest_date = optional_date("harvestDate", self.harvest_date)?;
        if let (Some(planted), Some(harvested)) = (planting_date, harvest_date) {
            if harvested < planted {
                return Err(ValidationError::invalid(
                    "harvestDate",
                    format!("harvest on {harvested} precedes planting on {planted}"),
                ));
            }
        }

        Ok(Product {
            id: existing.map_or_else(ProductId::generate, |p| p.id.clone()),
            name: required_text("name", &required("name", self.name)?)?,
            field_id: optional_ref(self.field_id, FieldId::new)?,
            category: required_text("category", &required("category", self.category)?)?,
            unit: required_text("unit", &required("unit", self.unit)?)?,
            planting_date,
            harvest_date,
            revenue: self
                .revenue
                .map(|revenue| non_negative("revenue", revenue))
                .transpose()?,
            is_active: self.is_active.unwrap_or(true),
            created_at: existing.map_or(now, |p| p.created_at),
            updated_at: now,
        })
    }
}
