//! Identifier newtypes and numeric guards.
//!
//! Every document kind gets its own identifier type so a `FieldId` can never
//! be passed where an `InventoryItemId` is expected:
//!
//! ```rust,ignore
//! let field = FieldId::new("f-1".to_string())?;
//! let item = InventoryItemId::generate();
//! // resolve_field(item)  ✗ compile error
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const MAX_ID_LENGTH: usize = 128;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier, rejecting empty or oversized values.
            pub fn new(id: String) -> Result<Self, ValidationError> {
                let trimmed = id.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::Empty($label));
                }
                if trimmed.len() > MAX_ID_LENGTH {
                    return Err(ValidationError::TooLong {
                        field: $label,
                        max: MAX_ID_LENGTH,
                        actual: trimmed.len(),
                    });
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Generates a fresh random identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of a user (admin, partner or worker).
    UserId,
    "userId"
);
entity_id!(
    /// Identifier of a cultivable field.
    FieldId,
    "fieldId"
);
entity_id!(
    /// Identifier of an inventory item (tractor attachment, equipment, material).
    InventoryItemId,
    "inventoryItemId"
);
entity_id!(
    /// Identifier of a field processing record.
    RecordId,
    "recordId"
);
entity_id!(WellId, "wellId");
entity_id!(SeasonId, "seasonId");
entity_id!(ProductId, "productId");
entity_id!(FertilizerId, "fertilizerId");
entity_id!(ExpenseCategoryId, "expenseCategoryId");
entity_id!(ProductCategoryId, "productCategoryId");
entity_id!(FuelConsumptionId, "fuelConsumptionId");

/// Validation failures raised while turning input into domain values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error("{field} too long (max: {max}, actual: {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("{field} must not be negative (got {actual})")]
    Negative { field: &'static str, actual: f64 },

    #[error("{field} must be greater than zero (got {actual})")]
    NotPositive { field: &'static str, actual: f64 },

    #[error("{field} out of range (min: {min}, max: {max}, actual: {actual})")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        actual: f64,
    },

    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("{field} references unknown id '{id}'")]
    UnknownReference { field: &'static str, id: String },

    #[error("field owners are missing or invalid")]
    NoOwners,
}

impl ValidationError {
    /// Name of the input field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing(field) | ValidationError::Empty(field) => field,
            ValidationError::TooLong { field, .. }
            | ValidationError::NotFinite { field }
            | ValidationError::Negative { field, .. }
            | ValidationError::NotPositive { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::Invalid { field, .. }
            | ValidationError::UnknownReference { field, .. } => field,
            ValidationError::NoOwners => "fieldOwners",
        }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Accepts finite values `>= 0`.
pub fn non_negative(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if value < 0.0 {
        return Err(ValidationError::Negative {
            field,
            actual: value,
        });
    }
    Ok(value)
}

/// Accepts finite values `> 0`.
pub fn positive(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if value <= 0.0 {
        return Err(ValidationError::NotPositive {
            field,
            actual: value,
        });
    }
    Ok(value)
}

/// Accepts an ownership share within `0..=100`.
pub fn percentage(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field,
            min: 0.0,
            max: 100.0,
            actual: value,
        });
    }
    Ok(value)
}

/// Trims a required text input, rejecting blank values.
pub fn required_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional text input; blank becomes `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
