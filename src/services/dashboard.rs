use crate::access::Caller;
use crate::error::ApiError;
use crate::model::{Field, FieldStatus, ProcessingRecord, Well};
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Summary of one partner's stake in the farm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerDashboard {
    pub total_fields: usize,
    /// Owned fields currently planted
    pub active_fields: usize,
    pub total_wells: usize,
    /// The caller's share of every processing record
    pub total_processing_cost: f64,
}

pub async fn partner_dashboard(
    state: &AppState,
    caller: &Caller,
) -> Result<PartnerDashboard, ApiError> {
    let user = caller.user_id.as_str();

    let fields: Vec<Field> = state
        .repo::<Field>()
        .list()
        .await?
        .into_iter()
        .filter(|field| field.owned_by(user))
        .collect();
    let field_ids: HashSet<&str> = fields.iter().map(|f| f.id.as_str()).collect();

    // A well counts when it lists one of the fields or one of the fields
    // points at it.
    let mut wells: HashSet<String> = fields
        .iter()
        .filter_map(|field| field.well_id.as_ref().map(|w| w.to_string()))
        .collect();
    for well in state.repo::<Well>().list().await? {
        if well.field_ids.iter().any(|f| field_ids.contains(f.as_str())) {
            wells.insert(well.id.into_inner());
        }
    }

    let total_processing_cost: f64 = state
        .repo::<ProcessingRecord>()
        .list()
        .await?
        .iter()
        .map(|record| record.amount_for(user))
        .sum();

    Ok(PartnerDashboard {
        total_fields: fields.len(),
        active_fields: fields
            .iter()
            .filter(|field| field.status == FieldStatus::Planted)
            .count(),
        total_wells: wells.len(),
        total_processing_cost,
    })
}
