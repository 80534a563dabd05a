//! Field processing records.
//!
//! A submission is validated, its inventory item and field are looked up,
//! the owners are taken from the body or from the field's ledger, and the
//! allocation calculator produces the totals and the per-owner split. The
//! calculator never touches the store; everything it needs is resolved
//! here first.

use crate::allocation::{self, Allocation, AllocationInput, OwnerAllocation, OwnerShare};
use crate::domain::{FieldId, InventoryItemId, ValidationError};
use crate::error::ApiError;
use crate::logging::{operation_span, record_span};
use crate::metrics::METRICS;
use crate::model::{
    Field, InventoryItem, ProcessingInput, ProcessingRecord, ProcessingRequest, ResolvedNames,
    User,
};
use crate::state::AppState;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{Instrument, info};

const OWNERSHIP_TOLERANCE: f64 = 1e-6;

/// Allocation computed for a submission that is not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationPreview {
    pub inventory_item_id: InventoryItemId,
    pub inventory_item_name: String,
    pub field_id: FieldId,
    pub field_name: String,
    pub processed_area: f64,
    pub fuel_unit_price: f64,
    pub total_fuel_consumption: f64,
    pub total_cost: f64,
    pub field_owners: Vec<OwnerShare>,
    pub owner_distribution: Vec<OwnerAllocation>,
}

struct Computed {
    request: ProcessingRequest,
    owners: Vec<OwnerShare>,
    names: ResolvedNames,
    allocation: Allocation,
}

pub async fn list_records(state: &AppState) -> Result<Vec<ProcessingRecord>, ApiError> {
    let mut records = state.repo::<ProcessingRecord>().list().await?;
    sort_newest_first(&mut records);
    Ok(records)
}

/// Date descending, ties broken by creation time descending.
pub fn sort_newest_first(records: &mut [ProcessingRecord]) {
    records.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

pub async fn get_record(state: &AppState, id: &str) -> Result<ProcessingRecord, ApiError> {
    state
        .repo::<ProcessingRecord>()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::missing("processing record", id))
}

pub async fn create_record(
    state: &AppState,
    input: ProcessingInput,
) -> Result<ProcessingRecord, ApiError> {
    async {
        let computed = compute(state, input).await?;
        let record = computed.request.into_record(
            computed.owners,
            computed.names,
            computed.allocation,
            None,
            Utc::now(),
        );
        state.repo::<ProcessingRecord>().insert(&record).await?;

        METRICS.record_processing("created", distributed(&record));
        info!(
            record_id = %record.id,
            field_id = %record.field_id,
            total_cost = record.total_cost,
            owners = record.owner_distribution.len(),
            "processing record created"
        );
        Ok::<_, ApiError>(record)
    }
    .instrument(operation_span("create_processing_record"))
    .await
}

/// Recomputes every derived value from the submitted inputs and overwrites
/// the stored record, keeping its id and creation time.
pub async fn update_record(
    state: &AppState,
    id: &str,
    input: ProcessingInput,
) -> Result<ProcessingRecord, ApiError> {
    async {
        let computed = compute(state, input).await?;
        let existing = get_record(state, id).await?;
        let record = computed.request.into_record(
            computed.owners,
            computed.names,
            computed.allocation,
            Some(&existing),
            Utc::now(),
        );
        if !state.repo::<ProcessingRecord>().replace(&record).await? {
            return Err(ApiError::missing("processing record", id));
        }

        METRICS.record_processing("updated", distributed(&record));
        info!(
            total_cost = record.total_cost,
            previous_total_cost = existing.total_cost,
            "processing record updated"
        );
        Ok(record)
    }
    .instrument(record_span("update_processing_record", id))
    .await
}

pub async fn delete_record(state: &AppState, id: &str) -> Result<(), ApiError> {
    async {
        if !state.repo::<ProcessingRecord>().delete(id).await? {
            return Err(ApiError::missing("processing record", id));
        }
        METRICS.record_processing("deleted", 0.0);
        info!("processing record deleted");
        Ok(())
    }
    .instrument(record_span("delete_processing_record", id))
    .await
}

/// Computes the allocation of a submission without storing anything.
pub async fn preview(
    state: &AppState,
    input: ProcessingInput,
) -> Result<AllocationPreview, ApiError> {
    let computed = compute(state, input)
        .instrument(operation_span("preview_processing_record"))
        .await?;
    Ok(AllocationPreview {
        inventory_item_id: computed.request.inventory_item_id,
        inventory_item_name: computed.names.inventory_item_name,
        field_id: computed.request.field_id,
        field_name: computed.names.field_name,
        processed_area: computed.request.processed_area,
        fuel_unit_price: computed.request.fuel_unit_price,
        total_fuel_consumption: computed.allocation.total_fuel_consumption,
        total_cost: computed.allocation.total_cost,
        field_owners: computed.owners,
        owner_distribution: computed.allocation.distribution,
    })
}

async fn compute(state: &AppState, input: ProcessingInput) -> Result<Computed, ApiError> {
    let mut request = input.validate()?;

    let item = state
        .repo::<InventoryItem>()
        .get(request.inventory_item_id.as_str())
        .await?
        .ok_or_else(|| ValidationError::UnknownReference {
            field: "inventoryItemId",
            id: request.inventory_item_id.to_string(),
        })?;
    let field = state
        .repo::<Field>()
        .get(request.field_id.as_str())
        .await?
        .ok_or_else(|| ValidationError::UnknownReference {
            field: "fieldId",
            id: request.field_id.to_string(),
        })?;

    let owners = match request.field_owners.take() {
        Some(owners) => owners,
        None => owners_from_ledger(state, &field).await?,
    };
    if state.config.strict_ownership {
        ensure_full_ownership(&owners)?;
    }

    let allocation = allocation::allocate(&AllocationInput {
        fuel_consumption_rate: item.fuel_consumption_rate,
        processed_area: request.processed_area,
        fuel_unit_price: request.fuel_unit_price,
        owners: owners.clone(),
    })?;

    Ok(Computed {
        request,
        owners,
        names: ResolvedNames {
            inventory_item_name: item.name,
            field_name: field.name,
        },
        allocation,
    })
}

/// Joins the field's ledger with user names. Owners whose user has been
/// deleted keep their share with an empty name.
async fn owners_from_ledger(
    state: &AppState,
    field: &Field,
) -> Result<Vec<OwnerShare>, ApiError> {
    if field.owners.is_empty() {
        return Err(ValidationError::NoOwners.into());
    }
    let names: HashMap<String, String> = state
        .repo::<User>()
        .list()
        .await?
        .into_iter()
        .map(|user| (user.id.into_inner(), user.name))
        .collect();

    Ok(field
        .owners
        .iter()
        .map(|share| OwnerShare {
            user_id: share.user_id.clone(),
            ownership_percentage: share.percentage,
            owner_name: names.get(share.user_id.as_str()).cloned().unwrap_or_default(),
        })
        .collect())
}

fn ensure_full_ownership(owners: &[OwnerShare]) -> Result<(), ValidationError> {
    let total = allocation::ownership_total(owners);
    if (total - 100.0).abs() > OWNERSHIP_TOLERANCE {
        return Err(ValidationError::invalid(
            "fieldOwners",
            format!("ownership percentages sum to {total}, expected 100"),
        ));
    }
    Ok(())
}

fn distributed(record: &ProcessingRecord) -> f64 {
    record.owner_distribution.iter().map(|entry| entry.amount).sum()
}
