//! Error handling for the farm-ops HTTP surface
//!
//! This module provides:
//! - Error codes mapped onto HTTP statuses
//! - Rich error context (operation, resource, offending input field)
//! - Error telemetry counters
//! - A builder for constructing errors
//! - `IntoResponse` so handlers can return `Result<_, ApiError>`

use crate::domain::ValidationError;
use crate::store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// ERROR CODES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Missing or malformed input
    ValidationError,
    /// No caller identity on the request
    Unauthorized,
    /// Caller's role lacks the capability
    Forbidden,
    /// Addressed document does not exist
    NotFound,
    /// Write collides with an existing document
    Conflict,
    /// Persistence layer failed
    StorageError,
    /// Anything else
    InternalError,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::StorageError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::Unauthorized | ErrorCode::Forbidden => "access_error",
            ErrorCode::NotFound => "resource_not_found",
            ErrorCode::Conflict => "conflict",
            ErrorCode::StorageError => "storage_error",
            ErrorCode::InternalError => "server_error",
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.status().as_u16())
    }
}

// =============================================================================
// ERROR CONTEXT
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Operation that was being performed
    pub operation: Option<String>,
    /// Document kind involved (field, inventory, processing_record, ...)
    pub resource: Option<String>,
    /// Identifier of the addressed document
    pub resource_id: Option<String>,
    /// Input field that failed validation
    pub field: Option<String>,
    /// Suggestions for fixing the error
    pub suggestions: Vec<String>,
    /// Underlying causes, server-side only
    pub causes: Vec<String>,
}

// =============================================================================
// API ERROR
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Unique error ID for correlating logs with responses
    pub error_id: String,
    pub context: ErrorContext,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            error_id: Self::generate_error_id(),
            context: ErrorContext::default(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn builder(code: ErrorCode) -> ErrorBuilder {
        ErrorBuilder::new(code)
    }

    pub fn validation() -> ErrorBuilder {
        ErrorBuilder::new(ErrorCode::ValidationError)
    }

    pub fn not_found() -> ErrorBuilder {
        ErrorBuilder::new(ErrorCode::NotFound)
    }

    pub fn unauthorized() -> ErrorBuilder {
        ErrorBuilder::new(ErrorCode::Unauthorized)
    }

    pub fn forbidden() -> ErrorBuilder {
        ErrorBuilder::new(ErrorCode::Forbidden)
    }

    pub fn internal() -> ErrorBuilder {
        ErrorBuilder::new(ErrorCode::InternalError)
    }

    /// Not-found error for a document of `resource` kind.
    pub fn missing(resource: &str, id: impl Into<String>) -> Self {
        let id = id.into();
        Self::not_found()
            .message(format!("{resource} '{id}' not found"))
            .resource(resource)
            .resource_id(id)
            .build()
    }

    /// Add this error to telemetry
    pub fn track(&self) {
        ERROR_METRICS.record_error(&self.code, self.context.operation.as_deref());
    }

    fn generate_error_id() -> String {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);
        let timestamp = chrono::Utc::now().timestamp_millis();
        format!("err_{:x}_{:x}", timestamp, count)
    }

    /// Message safe to return to callers. Server-side failures never leak
    /// storage detail.
    pub fn public_message(&self) -> &str {
        match self.code {
            ErrorCode::StorageError => "a storage error occurred while processing the request",
            ErrorCode::InternalError => "an internal error occurred while processing the request",
            _ => &self.message,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.context.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "Suggestions:")?;
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Wire shape of an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub code: ErrorCode,
    pub error_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.track();
        if self.code.is_server_error() {
            tracing::error!(
                error_id = %self.error_id,
                code = %self.code,
                operation = self.context.operation.as_deref(),
                resource = self.context.resource.as_deref(),
                causes = ?self.context.causes,
                "{}",
                self.message
            );
        } else {
            tracing::debug!(
                error_id = %self.error_id,
                code = %self.code,
                field = self.context.field.as_deref(),
                "{}",
                self.message
            );
        }

        let body = ErrorBody {
            error: self.public_message().to_string(),
            code: self.code,
            error_id: self.error_id.clone(),
            field: self.context.field.clone(),
            suggestions: self.context.suggestions.clone(),
        };
        (self.code.status(), Json(body)).into_response()
    }
}

// =============================================================================
// ERROR BUILDER
// =============================================================================

pub struct ErrorBuilder {
    error: ApiError,
}

impl ErrorBuilder {
    fn new(code: ErrorCode) -> Self {
        Self {
            error: ApiError::new(code, ""),
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.error.message = message.into();
        self
    }

    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.error.context.operation = Some(operation.into());
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.error.context.resource = Some(resource.into());
        self
    }

    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.error.context.resource_id = Some(id.into());
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.error.context.field = Some(field.into());
        self
    }

    pub fn suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.error.context.suggestions.push(suggestion.into());
        self
    }

    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.error.context.causes.push(cause.into());
        self
    }

    pub fn build(self) -> ApiError {
        self.error
    }
}

// =============================================================================
// ERROR TELEMETRY
// =============================================================================

/// Error counters, by code, by operation and by category
#[derive(Debug)]
pub struct ErrorMetrics {
    error_counts: RwLock<HashMap<ErrorCode, AtomicU64>>,
    operation_errors: RwLock<HashMap<String, AtomicU64>>,
    category_counts: RwLock<HashMap<String, AtomicU64>>,
}

impl ErrorMetrics {
    pub fn new() -> Self {
        Self {
            error_counts: RwLock::new(HashMap::new()),
            operation_errors: RwLock::new(HashMap::new()),
            category_counts: RwLock::new(HashMap::new()),
        }
    }

    pub fn record_error(&self, code: &ErrorCode, operation: Option<&str>) {
        increment(&self.error_counts, code, || *code);

        if let Some(operation) = operation {
            increment(&self.operation_errors, operation, || operation.to_string());
        }

        let category = code.category();
        increment(&self.category_counts, category, || category.to_string());

        crate::metrics::METRICS.record_error(category);
        tracing::debug!(
            error_code = %code,
            operation = operation,
            category = category,
            "error recorded"
        );
    }

    pub fn get_error_count(&self, code: &ErrorCode) -> u64 {
        self.error_counts
            .read()
            .get(code)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn get_operation_error_count(&self, operation: &str) -> u64 {
        self.operation_errors
            .read()
            .get(operation)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn get_category_count(&self, category: &str) -> u64 {
        self.category_counts
            .read()
            .get(category)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn reset(&self) {
        self.error_counts.write().clear();
        self.operation_errors.write().clear();
        self.category_counts.write().clear();
    }
}

impl Default for ErrorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn increment<K, Q, F>(map: &RwLock<HashMap<K, AtomicU64>>, key: &Q, owned: F)
where
    K: std::borrow::Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + ?Sized,
    F: FnOnce() -> K,
{
    {
        let read = map.read();
        if let Some(counter) = read.get(key) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
    }
    map.write()
        .entry(owned())
        .or_insert_with(|| AtomicU64::new(0))
        .fetch_add(1, Ordering::Relaxed);
}

/// Global error metrics instance
pub static ERROR_METRICS: once_cell::sync::Lazy<ErrorMetrics> =
    once_cell::sync::Lazy::new(ErrorMetrics::new);

// =============================================================================
// CONVERSIONS
// =============================================================================

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        let mut builder = ApiError::validation()
            .message(error.to_string())
            .field(error.field());
        if let ValidationError::NoOwners = error {
            builder = builder
                .suggestion("Submit at least one owner with a userId and ownershipPercentage")
                .suggestion("Or register owners on the field and omit fieldOwners");
        }
        builder.build()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::DuplicateId { collection, id } => {
                ApiError::builder(ErrorCode::Conflict)
                    .message(format!("{collection} '{id}' already exists"))
                    .resource(collection)
                    .resource_id(id)
                    .build()
            }
            other => ApiError::builder(ErrorCode::StorageError)
                .message(other.to_string())
                .cause(format!("{other:?}"))
                .build(),
        }
    }
}
