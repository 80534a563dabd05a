use super::required;
use crate::domain::{FertilizerId, FieldId, SeasonId, ValidationError};
use crate::store::Document;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2999;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum SeasonStatus {
    #[default]
    #[serde(alias = "Aktif")]
    Active,
    #[serde(alias = "Pasif")]
    Passive,
}

/// An agricultural year running from October 1st to September 30th.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub id: SeasonId,
    pub year: i32,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: SeasonStatus,
    #[serde(default)]
    pub field_ids: Vec<FieldId>,
    #[serde(default)]
    pub fertilizer_ids: Vec<FertilizerId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Season {
    const COLLECTION: &'static str = "seasons";

    fn document_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Name, start and end of the season beginning in `year`.
pub fn season_bounds(year: i32) -> Result<(String, NaiveDate, NaiveDate), ValidationError> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(ValidationError::OutOfRange {
            field: "year",
            min: f64::from(MIN_YEAR),
            max: f64::from(MAX_YEAR),
            actual: f64::from(year),
        });
    }
    let start = NaiveDate::from_ymd_opt(year, 10, 1)
        .ok_or_else(|| ValidationError::invalid("year", "no October 1st in that year"))?;
    let end = NaiveDate::from_ymd_opt(year + 1, 9, 30)
        .ok_or_else(|| ValidationError::invalid("year", "no September 30th after that year"))?;
    Ok((format!("{}-{} Season", year, year + 1), start, end))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonInput {
    pub year: Option<i32>,
    pub status: Option<SeasonStatus>,
    #[serde(alias = "fields")]
    pub field_ids: Option<Vec<String>>,
    #[serde(alias = "fertilizers")]
    pub fertilizer_ids: Option<Vec<String>>,
}

impl SeasonInput {
    /// Name and dates always follow from `year`; clients cannot set them.
    pub fn into_season(
        self,
        existing: Option<&Season>,
        now: DateTime<Utc>,
    ) -> Result<Season, ValidationError> {
        let year = required("year", self.year)?;
        let (name, start_date, end_date) = season_bounds(year)?;
        let field_ids = self
            .field_ids
            .unwrap_or_default()
            .into_iter()
            .map(FieldId::new)
            .collect::<Result<Vec<_>, _>>()?;
        let fertilizer_ids = self
            .fertilizer_ids
            .unwrap_or_default()
            .into_iter()
            .map(FertilizerId::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Season {
            id: existing.map_or_else(SeasonId::generate, |s| s.id.clone()),
            year,
            name,
            start_date,
            end_date,
            status: self.status.unwrap_or_default(),
            field_ids,
            fertilizer_ids,
            created_at: existing.map_or(now, |s| s.created_at),
            updated_at: now,
        })
    }
}
