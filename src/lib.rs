pub mod access;
pub mod allocation;
pub mod config;
pub mod domain;
pub mod error;
pub mod health;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod services;
pub mod shutdown;
pub mod state;
pub mod store;

pub use access::{Caller, Capability, Role, role_allows};
pub use allocation::{Allocation, AllocationInput, OwnerAllocation, OwnerShare, allocate};
pub use config::{CliArgs, ServerConfig};
pub use error::{ApiError, ERROR_METRICS, ErrorCode, ErrorMetrics};
pub use logging::{LoggingConfig, init_logging, shutdown_telemetry};
pub use shutdown::{ShutdownConfig, ShutdownCoordinator};
pub use state::AppState;
pub use store::{DocumentStore, FileStore, MemoryStore, StorageKind};

use anyhow::{Context, Result};
use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use shutdown::{CompositeShutdownHandler, StoreShutdownHandler};
use std::{future::IntoFuture, sync::Arc};
use tokio::net::TcpListener;

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// The complete application: business routes plus the operational
/// endpoints, with request telemetry on every matched route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(http::api_routes())
        .route("/health", get(health::liveness_handler))
        .route("/ready", get(health::readiness_handler))
        .route("/health/components", get(health::components_handler))
        .route("/metrics", get(metrics_handler))
        .route_layer(axum::middleware::from_fn(http::track_requests))
        .with_state(state)
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    let state = AppState::open(config)?;
    let config = state.config.clone();

    let shutdown_config =
        ShutdownConfig::default().with_total_timeout(config.graceful_shutdown_timeout_secs);
    let coordinator = Arc::new(ShutdownCoordinator::new(shutdown_config));
    let signals = coordinator.listen_for_signals();

    let mut handlers = CompositeShutdownHandler::new();
    handlers.add_handler(Box::new(StoreShutdownHandler::new(state.store.clone())));

    let listener = TcpListener::bind(config.http_bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.http_bind_address))?;
    let actual_addr = listener.local_addr()?;
    tracing::info!(
        bind = %actual_addr,
        storage = %config.storage,
        data_dir = %config.data_dir.display(),
        "farm-ops listening"
    );

    let token = coordinator.token();
    let server = axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .into_future();
    tokio::pin!(server);

    // Once shutdown starts, in-flight requests get a bounded grace period.
    let drain_token = coordinator.token();
    let drain_limit = coordinator.config().in_flight_timeout;
    let server_result = tokio::select! {
        result = &mut server => result.map_err(anyhow::Error::from),
        _ = async {
            drain_token.cancelled().await;
            tokio::time::sleep(drain_limit).await;
        } => {
            tracing::warn!(
                timeout_secs = drain_limit.as_secs(),
                "in-flight requests did not finish in time, abandoning them"
            );
            Ok(())
        }
    };
    signals.abort();

    tracing::info!("server stopped, running shutdown handlers");
    coordinator.shutdown(&handlers).await?;

    server_result
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> Response {
    match metrics::METRICS.encode() {
        Ok(text) => ([(CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], text).into_response(),
        Err(e) => ApiError::internal()
            .message("failed to encode metrics")
            .operation("metrics")
            .cause(e.to_string())
            .build()
            .into_response(),
    }
}
