use super::ApiJson;
use crate::access::{Caller, Capability};
use crate::error::ApiError;
use crate::model::{ProcessingInput, ProcessingRecord};
use crate::services::processing::{self, AllocationPreview};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/processing-records", get(list).post(create))
        .route("/processing-records/preview", post(preview))
        .route(
            "/processing-records/{id}",
            get(show).put(update).delete(remove),
        )
}

async fn list(
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProcessingRecord>>, ApiError> {
    caller.require(Capability::ViewProcessing)?;
    Ok(Json(processing::list_records(&state).await?))
}

async fn show(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProcessingRecord>, ApiError> {
    caller.require(Capability::ViewProcessing)?;
    Ok(Json(processing::get_record(&state, &id).await?))
}

async fn create(
    caller: Caller,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ProcessingInput>,
) -> Result<(StatusCode, Json<ProcessingRecord>), ApiError> {
    caller.require(Capability::RecordProcessing)?;
    let record = processing::create_record(&state, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<ProcessingInput>,
) -> Result<Json<ProcessingRecord>, ApiError> {
    caller.require(Capability::RecordProcessing)?;
    Ok(Json(processing::update_record(&state, &id, input).await?))
}

async fn remove(
    caller: Caller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    caller.require(Capability::DeleteProcessing)?;
    processing::delete_record(&state, &id).await?;
    Ok(Json(json!({ "id": id, "deleted": true })))
}

async fn preview(
    caller: Caller,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ProcessingInput>,
) -> Result<Json<AllocationPreview>, ApiError> {
    caller.require(Capability::RecordProcessing)?;
    Ok(Json(processing::preview(&state, input).await?))
}
