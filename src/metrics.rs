/// Prometheus metrics for the farm-ops HTTP service.
///
/// One process-wide collector backs the `/metrics` endpoint. Request
/// counters are labelled by matched route template, never by raw path, so
/// ids do not explode label cardinality.
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::{Duration, Instant};

/// Global metrics registry instance
pub static METRICS: Lazy<Arc<MetricsCollector>> = Lazy::new(|| Arc::new(MetricsCollector::new()));

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    pub method: String,
    /// Route template, e.g. `/fields/{id}`
    pub route: String,
    pub status: u16,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RouteLabels {
    pub method: String,
    pub route: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RecordLabels {
    /// "created", "updated" or "deleted"
    pub operation: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub category: String,
}

pub struct MetricsCollector {
    registry: RwLock<Registry>,

    pub http_requests_total: Family<RequestLabels, Counter>,
    pub http_request_duration_seconds: Family<RouteLabels, Histogram>,
    pub http_active_requests: Family<RouteLabels, Gauge>,

    pub processing_records_total: Family<RecordLabels, Counter>,
    /// Fuel cost distributed to owners, in currency units
    pub allocated_cost_total: Counter<f64, AtomicU64>,
    pub fuel_consumption_entries_total: Counter,

    pub store_documents: Gauge,

    pub errors_total: Family<ErrorLabels, Counter>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("farm");

        let http_requests_total = Family::<RequestLabels, Counter>::default();
        registry.register(
            "http_requests",
            "HTTP requests by method, route and status",
            http_requests_total.clone(),
        );

        let http_request_duration_seconds =
            Family::<RouteLabels, Histogram>::new_with_constructor(|| {
                // 1ms .. ~4s
                Histogram::new(exponential_buckets(0.001, 2.5, 10))
            });
        registry.register(
            "http_request_duration_seconds",
            "Request latency histogram in seconds",
            http_request_duration_seconds.clone(),
        );

        let http_active_requests = Family::<RouteLabels, Gauge>::default();
        registry.register(
            "http_active_requests",
            "Requests currently being processed",
            http_active_requests.clone(),
        );

        let processing_records_total = Family::<RecordLabels, Counter>::default();
        registry.register(
            "processing_records",
            "Processing record writes by operation",
            processing_records_total.clone(),
        );

        let allocated_cost_total = Counter::<f64, AtomicU64>::default();
        registry.register(
            "allocated_cost",
            "Fuel cost distributed across field owners",
            allocated_cost_total.clone(),
        );

        let fuel_consumption_entries_total = Counter::default();
        registry.register(
            "fuel_consumption_entries",
            "Fuel consumption log entries recorded",
            fuel_consumption_entries_total.clone(),
        );

        let store_documents = Gauge::default();
        registry.register(
            "store_documents",
            "Documents held by the store at last health check",
            store_documents.clone(),
        );

        let errors_total = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "errors",
            "Errors returned to callers by category",
            errors_total.clone(),
        );

        Self {
            registry: RwLock::new(registry),
            http_requests_total,
            http_request_duration_seconds,
            http_active_requests,
            processing_records_total,
            allocated_cost_total,
            fuel_consumption_entries_total,
            store_documents,
            errors_total,
        }
    }

    /// Encode metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        let registry = self.registry.read();
        encode(&mut buffer, &registry)?;
        Ok(buffer)
    }

    pub fn record_request(&self, method: &str, route: &str, status: u16, duration: Duration) {
        self.http_requests_total
            .get_or_create(&RequestLabels {
                method: method.to_string(),
                route: route.to_string(),
                status,
            })
            .inc();

        self.http_request_duration_seconds
            .get_or_create(&RouteLabels {
                method: method.to_string(),
                route: route.to_string(),
            })
            .observe(duration.as_secs_f64());
    }

    pub fn record_processing(&self, operation: &str, distributed: f64) {
        self.processing_records_total
            .get_or_create(&RecordLabels {
                operation: operation.to_string(),
            })
            .inc();
        if distributed > 0.0 {
            self.allocated_cost_total.inc_by(distributed);
        }
    }

    pub fn record_fuel_entry(&self) {
        self.fuel_consumption_entries_total.inc();
    }

    pub fn update_store_documents(&self, count: usize) {
        self.store_documents.set(count as i64);
    }

    pub fn record_error(&self, category: &str) {
        self.errors_total
            .get_or_create(&ErrorLabels {
                category: category.to_string(),
            })
            .inc();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard timing one HTTP request.
///
/// Increments the active gauge on creation. [`RequestMetrics::finish`]
/// records the status; a guard dropped without finishing (the request
/// future was cancelled) is recorded with status 499.
pub struct RequestMetrics {
    labels: RouteLabels,
    start: Instant,
    completed: bool,
}

const CLIENT_CLOSED_REQUEST: u16 = 499;

impl RequestMetrics {
    pub fn new(method: &str, route: &str) -> Self {
        let labels = RouteLabels {
            method: method.to_string(),
            route: route.to_string(),
        };
        METRICS.http_active_requests.get_or_create(&labels).inc();

        Self {
            labels,
            start: Instant::now(),
            completed: false,
        }
    }

    pub fn finish(mut self, status: u16) {
        self.complete(status);
    }

    fn complete(&mut self, status: u16) {
        METRICS.record_request(
            &self.labels.method,
            &self.labels.route,
            status,
            self.start.elapsed(),
        );
        METRICS.http_active_requests.get_or_create(&self.labels).dec();
        self.completed = true;
    }
}

impl Drop for RequestMetrics {
    fn drop(&mut self) {
        if !self.completed {
            self.complete(CLIENT_CLOSED_REQUEST);
        }
    }
}
