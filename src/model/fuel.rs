use super::{required, required_date};
use crate::domain::{FieldId, FuelConsumptionId, InventoryItemId, ValidationError, non_negative};
use crate::store::Document;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the fuel log: fuel burnt by an item working a whole field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelConsumption {
    pub id: FuelConsumptionId,
    pub inventory_item_id: InventoryItemId,
    pub field_id: FieldId,
    pub date: NaiveDate,
    pub fuel_price: f64,
    /// Liters
    pub quantity: f64,
    pub total_cost: f64,
    pub created_at: DateTime<Utc>,
}

impl Document for FuelConsumption {
    const COLLECTION: &'static str = "fuel_consumption";

    fn document_id(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelConsumptionInput {
    #[serde(alias = "inventoryItem")]
    pub inventory_item_id: Option<String>,
    #[serde(alias = "field")]
    pub field_id: Option<String>,
    pub date: Option<String>,
    #[serde(alias = "fuelUnitPrice")]
    pub fuel_price: Option<f64>,
}

/// Validated fuel log submission, before its references are resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct FuelRequest {
    pub inventory_item_id: InventoryItemId,
    pub field_id: FieldId,
    pub date: NaiveDate,
    pub fuel_price: f64,
}

impl FuelConsumptionInput {
    pub fn validate(self) -> Result<FuelRequest, ValidationError> {
        Ok(FuelRequest {
            inventory_item_id: InventoryItemId::new(required(
                "inventoryItemId",
                self.inventory_item_id,
            )?)?,
            field_id: FieldId::new(required("fieldId", self.field_id)?)?,
            date: required_date("date", self.date)?,
            fuel_price: non_negative("fuelPrice", required("fuelPrice", self.fuel_price)?)?,
        })
    }
}

impl FuelRequest {
    pub fn into_entry(self, quantity: f64, total_cost: f64, now: DateTime<Utc>) -> FuelConsumption {
        FuelConsumption {
            id: FuelConsumptionId::generate(),
            inventory_item_id: self.inventory_item_id,
            field_id: self.field_id,
            date: self.date,
            fuel_price: self.fuel_price,
            quantity,
            total_cost,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validates_submission() {
        let input: FuelConsumptionInput = serde_json::from_value(json!({
            "inventoryItem": "i1",
            "fieldId": "f1",
            "date": "2024-04-02",
            "fuelPrice": 42.5
        }))
        .unwrap();
        let request = input.validate().unwrap();
        assert_eq!(request.inventory_item_id.as_str(), "i1");
        assert_eq!(request.fuel_price, 42.5);

        let entry = request.into_entry(25.0, 1062.5, Utc::now());
        assert_eq!(entry.quantity, 25.0);
        assert_eq!(entry.total_cost, 1062.5);
    }

    #[test]
    fn every_value_is_required() {
        let err = FuelConsumptionInput {
            inventory_item_id: Some("i1".to_string()),
            field_id: Some("f1".to_string()),
            date: Some("2024-04-02".to_string()),
            fuel_price: None,
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, ValidationError::Missing("fuelPrice"));
    }
}
