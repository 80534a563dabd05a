use super::{OwnershipShare, OwnershipShareInput, optional_ref, required, validate_ledger};
use crate::domain::{
    FieldId, SeasonId, ValidationError, WellId, optional_text, positive, required_text,
};
use crate::store::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum FieldStatus {
    #[serde(alias = "Ekili")]
    Planted,
    #[default]
    #[serde(alias = "Boş")]
    Empty,
    #[serde(alias = "Hazırlanıyor")]
    Preparing,
    #[serde(alias = "Sürüldü")]
    Plowed,
}

/// A cultivable parcel and its co-ownership ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    /// Decares
    pub size: f64,
    pub location: String,
    pub well_id: Option<WellId>,
    pub crop: Option<String>,
    pub status: FieldStatus,
    pub season_id: Option<SeasonId>,
    pub is_irrigated: bool,
    pub is_rented: bool,
    pub block_parcel: Option<String>,
    #[serde(default)]
    pub owners: Vec<OwnershipShare>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Field {
    pub fn owned_by(&self, user: &str) -> bool {
        self.owners.iter().any(|owner| owner.user_id.as_str() == user)
    }
}

impl Document for Field {
    const COLLECTION: &'static str = "fields";

    fn document_id(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInput {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub location: Option<String>,
    #[serde(alias = "well")]
    pub well_id: Option<String>,
    pub crop: Option<String>,
    pub status: Option<FieldStatus>,
    #[serde(alias = "season")]
    pub season_id: Option<String>,
    #[serde(alias = "isIrrigable")]
    pub is_irrigated: Option<bool>,
    pub is_rented: Option<bool>,
    pub block_parcel: Option<String>,
    pub owners: Option<Vec<OwnershipShareInput>>,
}

impl FieldInput {
    pub fn into_field(
        self,
        existing: Option<&Field>,
        now: DateTime<Utc>,
    ) -> Result<Field, ValidationError> {
        Ok(Field {
            id: existing.map_or_else(FieldId::generate, |f| f.id.clone()),
            name: required_text("name", &required("name", self.name)?)?,
            size: positive("size", required("size", self.size)?)?,
            location: optional_text(self.location).unwrap_or_default(),
            well_id: optional_ref(self.well_id, WellId::new)?,
            crop: optional_text(self.crop),
            status: self.status.unwrap_or_default(),
            season_id: optional_ref(self.season_id, SeasonId::new)?,
            is_irrigated: self.is_irrigated.unwrap_or(false),
            is_rented: self.is_rented.unwrap_or(false),
            block_parcel: optional_text(self.block_parcel),
            owners: validate_ledger(self.owners.unwrap_or_default())?,
            created_at: existing.map_or(now, |f| f.created_at),
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(body: serde_json::Value) -> FieldInput {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn builds_field_with_defaults() {
        let now = Utc::now();
        let field = input(json!({"name": " North ", "size": 12.5}))
            .into_field(None, now)
            .unwrap();
        assert_eq!(field.name, "North");
        assert_eq!(field.status, FieldStatus::Empty);
        assert!(!field.is_irrigated);
        assert!(field.owners.is_empty());
        assert_eq!(field.created_at, now);
    }

    #[test]
    fn accepts_localized_status_and_legacy_keys() {
        let field = input(json!({
            "name": "South",
            "size": 3.0,
            "status": "Ekili",
            "isIrrigable": true,
            "well": "w-1"
        }))
        .into_field(None, Utc::now())
        .unwrap();
        assert_eq!(field.status, FieldStatus::Planted);
        assert!(field.is_irrigated);
        assert_eq!(field.well_id.unwrap().as_str(), "w-1");
    }

    #[test]
    fn size_must_be_positive() {
        let err = input(json!({"name": "x", "size": 0}))
            .into_field(None, Utc::now())
            .unwrap_err();
        assert_eq!(err.field(), "size");
        let err = input(json!({"name": "x"})).into_field(None, Utc::now()).unwrap_err();
        assert_eq!(err, ValidationError::Missing("size"));
    }

    #[test]
    fn update_keeps_identity_and_creation_time() {
        let created = input(json!({"name": "A", "size": 1.0}))
            .into_field(None, Utc::now())
            .unwrap();
        let later = created.created_at + chrono::Duration::hours(1);
        let updated = input(json!({"name": "B", "size": 2.0}))
            .into_field(Some(&created), later)
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.name, "B");
    }

    #[test]
    fn owned_by_checks_ledger() {
        let field = input(json!({
            "name": "A",
            "size": 1.0,
            "owners": [{"userId": "u1", "percentage": 100}]
        }))
        .into_field(None, Utc::now())
        .unwrap();
        assert!(field.owned_by("u1"));
        assert!(!field.owned_by("u2"));
    }
}
