use super::required;
use crate::access::Role;
use crate::domain::{FieldId, UserId, ValidationError, WellId, required_text};
use crate::store::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A person known to the farm. Credentials are held by the upstream
/// gateway, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub assigned_field_ids: Vec<FieldId>,
    #[serde(default)]
    pub assigned_well_ids: Vec<WellId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for User {
    const COLLECTION: &'static str = "users";

    fn document_id(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    #[serde(alias = "assignedFields")]
    pub assigned_field_ids: Option<Vec<String>>,
    #[serde(alias = "assignedWells")]
    pub assigned_well_ids: Option<Vec<String>>,
}

impl UserInput {
    pub fn into_user(
        self,
        existing: Option<&User>,
        now: DateTime<Utc>,
    ) -> Result<User, ValidationError> {
        let email = required_text("email", &required("email", self.email)?)?.to_lowercase();
        if !valid_email(&email) {
            return Err(ValidationError::invalid(
                "email",
                format!("'{email}' is not an email address"),
            ));
        }

        Ok(User {
            id: existing.map_or_else(UserId::generate, |u| u.id.clone()),
            name: required_text("name", &required("name", self.name)?)?,
            email,
            role: required("role", self.role)?,
            assigned_field_ids: self
                .assigned_field_ids
                .unwrap_or_default()
                .into_iter()
                .map(FieldId::new)
                .collect::<Result<_, _>>()?,
            assigned_well_ids: self
                .assigned_well_ids
                .unwrap_or_default()
                .into_iter()
                .map(WellId::new)
                .collect::<Result<_, _>>()?,
            created_at: existing.map_or(now, |u| u.created_at),
            updated_at: now,
        })
    }
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}
