use crate::allocation::fuel_usage;
use crate::domain::ValidationError;
use crate::error::ApiError;
use crate::metrics::METRICS;
use crate::model::{Field, FuelConsumption, FuelConsumptionInput, InventoryItem};
use crate::state::AppState;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

/// A fuel log entry with the documents it points at. Either side is
/// `null` once that document has been deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelLogEntry {
    #[serde(flatten)]
    pub entry: FuelConsumption,
    pub inventory_item: Option<InventoryItem>,
    pub field: Option<Field>,
}

/// Records fuel burnt by an item working a whole field: quantity is the
/// item's rate times the field size.
pub async fn record_fuel(
    state: &AppState,
    input: FuelConsumptionInput,
) -> Result<FuelConsumption, ApiError> {
    let request = input.validate()?;

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

    let (quantity, total_cost) =
        fuel_usage(item.fuel_consumption_rate, field.size, request.fuel_price)?;
    let entry = request.into_entry(quantity, total_cost, Utc::now());
    state.repo::<FuelConsumption>().insert(&entry).await?;

    METRICS.record_fuel_entry();
    info!(
        entry_id = %entry.id,
        item = %item.name,
        field = %field.name,
        quantity,
        total_cost,
        "fuel consumption recorded"
    );
    Ok(entry)
}

/// Fuel log, newest date first, joined with items and fields.
pub async fn fuel_log(state: &AppState) -> Result<Vec<FuelLogEntry>, ApiError> {
    let mut entries = state.repo::<FuelConsumption>().list().await?;
    entries.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    let items: HashMap<String, InventoryItem> = state
        .repo::<InventoryItem>()
        .list()
        .await?
        .into_iter()
        .map(|item| (item.id.to_string(), item))
        .collect();
    let fields: HashMap<String, Field> = state
        .repo::<Field>()
        .list()
        .await?
        .into_iter()
        .map(|field| (field.id.to_string(), field))
        .collect();

    Ok(entries
        .into_iter()
        .map(|entry| FuelLogEntry {
            inventory_item: items.get(entry.inventory_item_id.as_str()).cloned(),
            field: fields.get(entry.field_id.as_str()).cloned(),
            entry,
        })
        .collect())
}
