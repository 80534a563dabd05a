//! Persisted documents and the request bodies that create them.
//!
//! Every document kind pairs an entity (what is stored and returned) with an
//! input type (what clients submit). Inputs keep required values optional so
//! a missing value is reported against its field name instead of as a
//! generic body rejection.

mod category;
mod fertilizer;
mod field;
mod fuel;
mod inventory;
mod ownership;
mod product;
mod product_category;
mod record;
mod season;
mod user;
mod well;

pub use category::{ExpenseCategory, ExpenseCategoryInput};
pub use fertilizer::{
    Fertilizer, FertilizerInput, FertilizerKind, FertilizerStatus, FertilizerUnit,
};
pub use field::{Field, FieldInput, FieldStatus};
pub use fuel::{FuelConsumption, FuelConsumptionInput, FuelRequest};
pub use inventory::{InventoryItem, InventoryItemInput, InventoryStatus};
pub use ownership::{
    OwnershipShare, OwnershipShareInput, ensure_complete, ledger_total, validate_ledger,
};
pub use product::{Product, ProductInput};
pub use product_category::{ProductCategory, ProductCategoryInput};
pub use record::{
    OwnerShareInput, ProcessingInput, ProcessingRecord, ProcessingRequest, ResolvedNames,
};
pub use season::{Season, SeasonInput, SeasonStatus, season_bounds};
pub use user::{User, UserInput};
pub use well::{Well, WellInput, WellStatus};

use crate::domain::ValidationError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Parses `YYYY-MM-DD`, an RFC 3339 timestamp or a naive `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.date_naive());
    }
    if let Ok(timestamp) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(timestamp.date());
    }
    Err(ValidationError::invalid(
        field,
        format!("'{value}' is not a date (expected YYYY-MM-DD)"),
    ))
}

pub fn required_date(
    field: &'static str,
    value: Option<String>,
) -> Result<NaiveDate, ValidationError> {
    parse_date(field, &value.ok_or(ValidationError::Missing(field))?)
}

/// Blank or absent dates become `None`.
pub fn optional_date(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<NaiveDate>, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_date(field, &v).map(Some),
        _ => Ok(None),
    }
}

/// Blank or absent references become `None`; forms submit `""` for "none".
pub fn optional_ref<T>(
    value: Option<String>,
    make: impl FnOnce(String) -> Result<T, ValidationError>,
) -> Result<Option<T>, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => make(v).map(Some),
        _ => Ok(None),
    }
}

pub fn required<T>(field: &'static str, value: Option<T>) -> Result<T, ValidationError> {
    value.ok_or(ValidationError::Missing(field))
}
