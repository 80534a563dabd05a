use crate::metrics::METRICS;
use crate::model::User;
use crate::state::AppState;
use crate::store::{Document, StorageKind};
use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

/// Health status for a component or the overall system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Serving, with reduced guarantees
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Combines two health statuses, returning the worse of the two
    pub fn combine(self, other: Self) -> Self {
        match (self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub component: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ComponentHealth {
    pub fn healthy(component: impl Into<String>) -> Self {
        Self::build(component, HealthStatus::Healthy, None, None)
    }

    pub fn healthy_with_details(component: impl Into<String>, details: serde_json::Value) -> Self {
        Self::build(component, HealthStatus::Healthy, None, Some(details))
    }

    pub fn degraded(component: impl Into<String>, error: impl Into<String>) -> Self {
        Self::build(component, HealthStatus::Degraded, Some(error.into()), None)
    }

    pub fn unhealthy(component: impl Into<String>, error: impl Into<String>) -> Self {
        Self::build(component, HealthStatus::Unhealthy, Some(error.into()), None)
    }

    fn build(
        component: impl Into<String>,
        status: HealthStatus,
        error: Option<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            component: component.into(),
            status,
            error,
            timestamp: now(),
            details,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: i64,
    pub version: String,
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let status = self.status.status_code();
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub status: HealthStatus,
    pub timestamp: i64,
    /// Components that are not ready
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub not_ready: Vec<String>,
}

impl IntoResponse for ReadinessResponse {
    fn into_response(self) -> Response {
        let status = if self.ready {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealthResponse {
    pub status: HealthStatus,
    pub timestamp: i64,
    pub components: HashMap<String, ComponentHealth>,
}

impl IntoResponse for ComponentHealthResponse {
    fn into_response(self) -> Response {
        let status = self.status.status_code();
        (status, Json(self)).into_response()
    }
}

/// Runs the store and data directory checks behind the health endpoints.
#[derive(Clone)]
pub struct HealthChecker {
    state: AppState,
}

impl FromRef<AppState> for HealthChecker {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.clone())
    }
}

impl HealthChecker {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Healthy whenever the process can answer.
    pub fn liveness(&self) -> HealthResponse {
        HealthResponse {
            status: HealthStatus::Healthy,
            timestamp: now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let components = self.check_all_components().await;
        let mut overall = HealthStatus::Healthy;
        let mut not_ready = Vec::new();

        for (name, health) in &components {
            overall = overall.combine(health.status);
            if health.status == HealthStatus::Unhealthy {
                not_ready.push(name.clone());
            }
        }
        not_ready.sort();

        ReadinessResponse {
            ready: overall != HealthStatus::Unhealthy,
            status: overall,
            timestamp: now(),
            not_ready,
        }
    }

    pub async fn components(&self) -> ComponentHealthResponse {
        let components = self.check_all_components().await;
        let overall = components
            .values()
            .fold(HealthStatus::Healthy, |acc, health| acc.combine(health.status));

        ComponentHealthResponse {
            status: overall,
            timestamp: now(),
            components,
        }
    }

    async fn check_all_components(&self) -> HashMap<String, ComponentHealth> {
        let mut components = HashMap::new();
        components.insert("store".to_string(), self.check_store().await);
        if self.state.config.storage == StorageKind::File {
            components.insert("data_dir".to_string(), self.check_data_dir().await);
        }
        components
    }

    async fn check_store(&self) -> ComponentHealth {
        let store = &self.state.store;
        // A cheap read proves the backend answers.
        if let Err(e) = store.list(User::COLLECTION).await {
            return ComponentHealth::unhealthy("store", format!("store read failed: {e}"));
        }

        let stats = store.stats();
        METRICS.update_store_documents(stats.documents);
        ComponentHealth::healthy_with_details(
            "store",
            serde_json::json!({
                "backend": stats.backend,
                "collections": stats.collections,
                "documents": stats.documents,
                "persistent": self.state.config.storage == StorageKind::File,
            }),
        )
    }

    async fn check_data_dir(&self) -> ComponentHealth {
        let dir = &self.state.config.data_dir;
        let metadata = match tokio::fs::metadata(dir).await {
            Ok(metadata) => metadata,
            Err(e) => {
                return ComponentHealth::unhealthy(
                    "data_dir",
                    format!("data directory {} is not accessible: {e}", dir.display()),
                );
            }
        };

        if !metadata.is_dir() {
            return ComponentHealth::unhealthy(
                "data_dir",
                format!("data path is not a directory: {}", dir.display()),
            );
        }
        if metadata.permissions().readonly() {
            return ComponentHealth::degraded(
                "data_dir",
                format!("data directory {} is read-only; writes will fail", dir.display()),
            );
        }

        ComponentHealth::healthy_with_details(
            "data_dir",
            serde_json::json!({
                "path": dir.display().to_string(),
                "writable": true,
            }),
        )
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

pub async fn liveness_handler(State(checker): State<HealthChecker>) -> impl IntoResponse {
    checker.liveness()
}

pub async fn readiness_handler(State(checker): State<HealthChecker>) -> impl IntoResponse {
    checker.readiness().await
}

pub async fn components_handler(State(checker): State<HealthChecker>) -> impl IntoResponse {
    checker.components().await
}
