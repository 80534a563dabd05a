//! HTTP surface: routes, extractors and request telemetry.
//!
//! Handlers stay thin. They extract the [`Caller`](crate::access::Caller),
//! check one capability and hand the decoded body to a service operation.

mod catalog;
mod dashboard;
mod fuel;
mod processing;

use crate::error::ApiError;
use crate::metrics::RequestMetrics;
use crate::state::AppState;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;

const SLOW_REQUEST_MS: u64 = 1_000;

/// JSON body whose rejections are reported as validation errors.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation()
            .message(rejection.body_text())
            .suggestion("Send a JSON object with Content-Type: application/json")
            .build()
    }
}

/// Every business route, still waiting for its state.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(processing::routes())
        .merge(catalog::routes())
        .merge(fuel::routes())
        .merge(dashboard::routes())
}

/// Records count, latency and in-flight gauge per route template.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = request.method().to_string();

    let started = Instant::now();
    let metrics = RequestMetrics::new(&method, &route);
    let response = next.run(request).await;
    let status = response.status().as_u16();
    metrics.finish(status);
    crate::log_slow_operation!(
        started.elapsed(),
        SLOW_REQUEST_MS,
        method = %method,
        route = %route,
        status,
        "request served"
    );
    response
}
