//! Caller identity and the role capability gate.
//!
//! Session handling lives upstream: the gateway in front of this service
//! authenticates the user and forwards who they are in two headers. Every
//! business handler extracts a [`Caller`] and asks it for the capability
//! the operation needs:
//!
//! ```rust,ignore
//! async fn delete_record(caller: Caller, ...) -> Result<..., ApiError> {
//!     caller.require(Capability::DeleteProcessing)?;
//!     ...
//! }
//! ```
//!
//! [`role_allows`] is the only place that knows which role may do what.

use crate::domain::UserId;
use crate::error::ApiError;
use crate::log_access_denied;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";

// =============================================================================
// ROLES AND CAPABILITIES
// =============================================================================

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum Role {
    #[strum(to_string = "Admin", serialize = "admin")]
    #[serde(alias = "admin")]
    Admin,
    /// Field co-owner
    #[strum(to_string = "Ortak", serialize = "partner")]
    #[serde(alias = "partner")]
    Ortak,
    /// Farm hand; read-only access to the crop catalog
    #[strum(to_string = "İşçi", serialize = "worker")]
    #[serde(rename = "İşçi", alias = "worker")]
    Isci,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    /// Fields, seasons, products, fertilizers, expense categories
    ViewCatalog,
    /// Wells, inventory and the fuel log
    ViewAssets,
    ManageCatalog,
    ManageUsers,
    ViewProcessing,
    /// Create, update and preview processing records
    RecordProcessing,
    DeleteProcessing,
    RecordFuel,
    ViewPartnerDashboard,
}

/// Decides whether `role` holds `capability`.
pub fn role_allows(role: Role, capability: Capability) -> bool {
    use Capability::*;
    match role {
        Role::Admin => !matches!(capability, ViewPartnerDashboard),
        Role::Ortak => matches!(
            capability,
            ViewCatalog | ViewAssets | ViewProcessing | RecordProcessing | ViewPartnerDashboard
        ),
        Role::Isci => matches!(capability, ViewCatalog),
    }
}

// =============================================================================
// CALLER EXTRACTOR
// =============================================================================

/// Identity of the user behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Fails with 403 when the caller's role lacks `capability`.
    pub fn require(&self, capability: Capability) -> Result<(), ApiError> {
        if role_allows(self.role, capability) {
            return Ok(());
        }
        log_access_denied!(self.user_id, self.role, capability);
        Err(ApiError::forbidden()
            .message(format!(
                "role {} is not allowed to {}",
                self.role, capability
            ))
            .build())
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = header_text(parts, USER_ID_HEADER)?;
        let user_id = UserId::new(user.to_string()).map_err(|_| {
            ApiError::unauthorized()
                .message(format!("{USER_ID_HEADER} header is empty"))
                .build()
        })?;

        let role = header_text(parts, ROLE_HEADER)?;
        let role = Role::from_str(role.trim()).map_err(|_| {
            ApiError::unauthorized()
                .message(format!("unknown role '{role}'"))
                .suggestion("Use one of Admin, Ortak, İşçi (or admin, partner, worker)")
                .build()
        })?;

        Ok(Caller { user_id, role })
    }
}

// Role names are not ASCII, so header values are read as raw UTF-8.
fn header_text<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    let value = parts.headers.get(name).ok_or_else(|| {
        ApiError::unauthorized()
            .message(format!("missing {name} header"))
            .build()
    })?;
    std::str::from_utf8(value.as_bytes()).map_err(|_| {
        ApiError::unauthorized()
            .message(format!("{name} header is not valid UTF-8"))
            .build()
    })
}
