use crate::access::{Caller, Capability};
use crate::error::ApiError;
use crate::services::dashboard::{self, PartnerDashboard};
use crate::state::AppState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

pub fn routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(partner))
}

async fn partner(
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<PartnerDashboard>, ApiError> {
    caller.require(Capability::ViewPartnerDashboard)?;
    Ok(Json(dashboard::partner_dashboard(&state, &caller).await?))
}
