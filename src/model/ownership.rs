use crate::domain::{UserId, ValidationError, percentage};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const SUM_TOLERANCE: f64 = 1e-6;

/// One entry of a field or inventory item ownership ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipShare {
    pub user_id: UserId,
    pub percentage: f64,
}

/// Owner entry as submitted by clients, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipShareInput {
    pub user_id: Option<String>,
    #[serde(alias = "ownershipPercentage")]
    pub percentage: Option<f64>,
}

/// Validates a submitted ledger: every entry names a user once and carries a
/// share within `0..=100`. The sum is checked separately by
/// [`ensure_complete`].
pub fn validate_ledger(
    owners: Vec<OwnershipShareInput>,
) -> Result<Vec<OwnershipShare>, ValidationError> {
    let mut seen = HashSet::new();
    owners
        .into_iter()
        .map(|owner| {
            let user_id = UserId::new(owner.user_id.ok_or(ValidationError::Missing("userId"))?)?;
            let percentage = percentage(
                "percentage",
                owner.percentage.ok_or(ValidationError::Missing("percentage"))?,
            )?;
            if !seen.insert(user_id.clone()) {
                return Err(ValidationError::invalid(
                    "owners",
                    format!("user '{user_id}' is listed more than once"),
                ));
            }
            Ok(OwnershipShare {
                user_id,
                percentage,
            })
        })
        .collect()
}

pub fn ledger_total(owners: &[OwnershipShare]) -> f64 {
    owners.iter().map(|owner| owner.percentage).sum()
}

/// Rejects a non-empty ledger whose shares do not add up to 100.
pub fn ensure_complete(owners: &[OwnershipShare]) -> Result<(), ValidationError> {
    if owners.is_empty() {
        return Ok(());
    }
    let total = ledger_total(owners);
    if (total - 100.0).abs() > SUM_TOLERANCE {
        return Err(ValidationError::invalid(
            "owners",
            format!("ownership percentages sum to {total}, expected 100"),
        ));
    }
    Ok(())
}
