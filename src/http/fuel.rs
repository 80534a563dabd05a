use super::ApiJson;
use crate::access::{Caller, Capability};
use crate::error::ApiError;
use crate::model::{FuelConsumption, FuelConsumptionInput};
use crate::services::fuel::{self, FuelLogEntry};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

pub fn routes() -> Router<AppState> {
    Router::new().route("/fuel-consumption", get(log).post(record))
}

async fn log(
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<Vec<FuelLogEntry>>, ApiError> {
    caller.require(Capability::ViewAssets)?;
    Ok(Json(fuel::fuel_log(&state).await?))
}

async fn record(
    caller: Caller,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<FuelConsumptionInput>,
) -> Result<(StatusCode, Json<FuelConsumption>), ApiError> {
    caller.require(Capability::RecordFuel)?;
    let entry = fuel::record_fuel(&state, input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}
