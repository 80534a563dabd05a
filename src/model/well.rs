use super::{optional_ref, required};
use crate::domain::{
    FieldId, UserId, ValidationError, WellId, optional_text, positive, required_text,
};
use crate::store::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum WellStatus {
    #[default]
    #[serde(alias = "Aktif")]
    Active,
    #[serde(alias = "Bakımda")]
    Maintenance,
    #[serde(alias = "Kapalı")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Well {
    pub id: WellId,
    pub name: String,
    pub location: String,
    pub region: Option<String>,
    /// Meters
    pub depth: f64,
    /// Cubic meters per hour
    pub capacity: f64,
    pub status: WellStatus,
    #[serde(default)]
    pub field_ids: Vec<FieldId>,
    pub responsible_user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Well {
    const COLLECTION: &'static str = "wells";

    fn document_id(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellInput {
    pub name: Option<String>,
    pub location: Option<String>,
    pub region: Option<String>,
    pub depth: Option<f64>,
    pub capacity: Option<f64>,
    pub status: Option<WellStatus>,
    #[serde(alias = "fields")]
    pub field_ids: Option<Vec<String>>,
    #[serde(alias = "responsibleUser")]
    pub responsible_user_id: Option<String>,
}

impl WellInput {
    pub fn into_well(
        self,
        existing: Option<&Well>,
        now: DateTime<Utc>,
    ) -> Result<Well, ValidationError> {
        let field_ids = self
            .field_ids
            .unwrap_or_default()
            .into_iter()
            .map(FieldId::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Well {
            id: existing.map_or_else(WellId::generate, |w| w.id.clone()),
            name: required_text("name", &required("name", self.name)?)?,
            location: optional_text(self.location).unwrap_or_default(),
            region: optional_text(self.region),
            depth: positive("depth", required("depth", self.depth)?)?,
            capacity: positive("capacity", required("capacity", self.capacity)?)?,
            status: self.status.unwrap_or_default(),
            field_ids,
            responsible_user_id: optional_ref(self.responsible_user_id, UserId::new)?,
            created_at: existing.map_or(now, |w| w.created_at),
            updated_at: now,
        })
    }
}
