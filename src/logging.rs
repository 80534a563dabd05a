//! Structured logging and trace export.
//!
//! Production deployments log JSON at info level; everything else gets
//! pretty output at debug. Lines go through a non-blocking writer to
//! stderr, stdout or a daily file. Spans are exported over OTLP when
//! `OTEL_EXPORTER_OTLP_ENDPOINT` is set.

use anyhow::{Context, Result};
use opentelemetry::{KeyValue, trace::TraceError};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, Tracer},
};
use std::env;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const SERVICE_NAME: &str = "farm-ops";

/// Filter used when `RUST_LOG` is unset.
const QUIET_DEPENDENCIES: &str = "hyper=info,tower=info,h2=warn";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub output: LogOutput,
    /// Directory for log files (when output is "file")
    pub log_dir: PathBuf,
    pub log_file_prefix: String,
    pub service_name: String,
    pub service_version: String,
    /// Deployment name; "production" or "prod" switch to JSON and info level
    pub environment: String,
    pub otlp_endpoint: Option<String>,
    pub enable_rotation: bool,
    /// Trace sampling ratio in `0.0..=1.0`
    pub otel_sampling_rate: f64,
    pub otlp_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Rolling file under `log_dir`
    File,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

impl LogOutput {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "stdout" => Some(Self::Stdout),
            "stderr" => Some(Self::Stderr),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let environment = env::var("FARM_OPS_ENV")
            .or_else(|_| env::var("ENVIRONMENT"))
            .unwrap_or_else(|_| "development".to_string());
        let production = is_production(&environment);

        Self {
            format: if production { LogFormat::Json } else { LogFormat::Pretty },
            output: LogOutput::Stderr,
            log_dir: PathBuf::from("logs"),
            log_file_prefix: SERVICE_NAME.to_string(),
            service_name: SERVICE_NAME.to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment,
            otlp_endpoint: None,
            enable_rotation: true,
            otel_sampling_rate: if production { 0.1 } else { 1.0 },
            otlp_timeout_secs: 10,
        }
    }
}

fn is_production(environment: &str) -> bool {
    matches!(environment, "production" | "prod")
}

/// Reads `name` and maps it through `parse`; unset or unrecognised values
/// yield `None`.
fn env_choice<T>(name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
    env::var(name).ok().and_then(|value| parse(value.trim()))
}

impl LoggingConfig {
    /// Reads `FARM_OPS_LOG_*` and the standard OTLP exporter variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(format) = env_choice("FARM_OPS_LOG_FORMAT", LogFormat::parse) {
            config.format = format;
        }
        if let Some(output) = env_choice("FARM_OPS_LOG_OUTPUT", LogOutput::parse) {
            config.output = output;
        }
        if let Some(dir) = env_choice("FARM_OPS_LOG_DIR", |v| Some(PathBuf::from(v))) {
            config.log_dir = dir;
        }
        if let Some(rotate) = env_choice("FARM_OPS_LOG_ROTATE", |v| v.parse::<bool>().ok()) {
            config.enable_rotation = rotate;
        }

        config.otlp_endpoint = env_choice("OTEL_EXPORTER_OTLP_ENDPOINT", |v| {
            (!v.is_empty()).then(|| v.to_string())
        });
        if let Some(rate) = env_choice("FARM_OPS_OTEL_SAMPLING_RATE", |v| v.parse::<f64>().ok()) {
            config.otel_sampling_rate = rate.clamp(0.0, 1.0);
        }
        if let Some(secs) = env_choice("OTEL_EXPORTER_OTLP_TIMEOUT", |v| v.parse::<u64>().ok()) {
            config.otlp_timeout_secs = secs;
        }

        config
    }

    fn resource(&self) -> Resource {
        Resource::new(vec![
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                self.service_name.clone(),
            ),
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                self.service_version.clone(),
            ),
            KeyValue::new("deployment.environment", self.environment.clone()),
            KeyValue::new("service.namespace", "farm"),
        ])
    }

    fn sampler(&self) -> Sampler {
        match self.otel_sampling_rate {
            rate if rate >= 1.0 => Sampler::AlwaysOn,
            rate if rate <= 0.0 => Sampler::AlwaysOff,
            rate => Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(rate))),
        }
    }

    fn default_filter(&self) -> EnvFilter {
        let level = if is_production(&self.environment) { "info" } else { "debug" };
        EnvFilter::new(format!("{level},{QUIET_DEPENDENCIES}"))
    }

    fn writer(&self) -> Result<(NonBlocking, WorkerGuard)> {
        Ok(match self.output {
            LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
            LogOutput::File => {
                std::fs::create_dir_all(&self.log_dir).with_context(|| {
                    format!("failed to create log directory {}", self.log_dir.display())
                })?;
                let appender = if self.enable_rotation {
                    tracing_appender::rolling::daily(&self.log_dir, &self.log_file_prefix)
                } else {
                    tracing_appender::rolling::never(&self.log_dir, &self.log_file_prefix)
                };
                tracing_appender::non_blocking(appender)
            }
        })
    }
}

/// Installs the global subscriber.
///
/// Hold the returned guard until exit; dropping it stops the background
/// writer and buffered lines are lost.
pub fn init_logging(config: LoggingConfig) -> Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| config.default_filter());
    let (writer, guard) = config.writer()?;

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(filter)
            .boxed(),
    };

    // The subscriber is not up yet, so exporter trouble goes to stderr.
    let otel_layer = match init_tracer(&config) {
        Ok(Some(tracer)) => Some(tracing_opentelemetry::layer().with_tracer(tracer)),
        Ok(None) => None,
        Err(e) => {
            eprintln!("OTLP exporter unavailable, tracing stays local: {e}");
            None
        }
    };
    let otel_enabled = otel_layer.is_some();

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = %config.environment,
        format = ?config.format,
        output = ?config.output,
        otel = otel_enabled,
        "logging initialized"
    );

    Ok(guard)
}

/// Installs the global OTLP batch pipeline and returns its tracer.
fn init_tracer(config: &LoggingConfig) -> Result<Option<Tracer>, TraceError> {
    let Some(endpoint) = &config.otlp_endpoint else {
        return Ok(None);
    };

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(config.otlp_timeout_secs));

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(config.sampler())
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(config.resource()),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)
        .map(Some)
}

/// Flushes pending spans to the exporter.
pub fn shutdown_telemetry() {
    tracing::info!("Shutting down OpenTelemetry");
    opentelemetry::global::shutdown_tracer_provider();
}

/// Logs at warn when `$duration` exceeds `$threshold_ms`, at debug otherwise.
#[macro_export]
macro_rules! log_slow_operation {
    ($duration:expr, $threshold_ms:expr, $($arg:tt)*) => {
        {
            let duration_ms = $duration.as_millis() as u64;
            if duration_ms > $threshold_ms {
                tracing::warn!(
                    duration_ms = duration_ms,
                    threshold_ms = $threshold_ms,
                    $($arg)*
                );
            } else {
                tracing::debug!(
                    duration_ms = duration_ms,
                    $($arg)*
                );
            }
        }
    };
}

/// Logs a refused request at warn with the caller and capability involved.
#[macro_export]
macro_rules! log_access_denied {
    ($user:expr, $role:expr, $capability:expr) => {
        tracing::warn!(
            security.event_type = "access_denied",
            user_id = %$user,
            role = %$role,
            capability = ?$capability,
            "capability denied"
        );
    };
}

/// Span wrapping one business operation.
pub fn operation_span(name: &'static str) -> tracing::Span {
    tracing::info_span!(
        "operation",
        operation.name = name,
        service = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION")
    )
}

/// Span wrapping work on one processing record.
pub fn record_span(operation: &'static str, record_id: &str) -> tracing::Span {
    tracing::info_span!(
        "processing_record",
        operation.name = operation,
        record.id = record_id,
        service = env!("CARGO_PKG_NAME")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_names_the_service() {
        let config = LoggingConfig::default();
        assert_eq!(config.service_name, "farm-ops");
        assert_eq!(config.log_file_prefix, "farm-ops");
        assert!((0.0..=1.0).contains(&config.otel_sampling_rate));
    }

    #[test]
    #[serial]
    fn config_reads_environment() {
        unsafe {
            env::set_var("FARM_OPS_LOG_FORMAT", "json");
            env::set_var("FARM_OPS_LOG_OUTPUT", "file");
            env::set_var("FARM_OPS_LOG_DIR", "/tmp/farm-ops-logs");
            env::set_var("FARM_OPS_OTEL_SAMPLING_RATE", "7");
        }

        let config = LoggingConfig::from_env();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::File);
        assert_eq!(config.log_dir, PathBuf::from("/tmp/farm-ops-logs"));
        assert_eq!(config.otel_sampling_rate, 1.0);

        unsafe {
            env::remove_var("FARM_OPS_LOG_FORMAT");
            env::remove_var("FARM_OPS_LOG_OUTPUT");
            env::remove_var("FARM_OPS_LOG_DIR");
            env::remove_var("FARM_OPS_OTEL_SAMPLING_RATE");
        }
    }

    #[test]
    #[serial]
    fn unknown_values_keep_defaults() {
        unsafe {
            env::set_var("FARM_OPS_LOG_FORMAT", "xml");
        }
        let config = LoggingConfig::from_env();
        assert_eq!(config.format, LoggingConfig::default().format);
        unsafe {
            env::remove_var("FARM_OPS_LOG_FORMAT");
        }
    }

    #[test]
    fn production_filters_at_info() {
        let config = LoggingConfig {
            environment: "prod".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(
            config.default_filter().max_level_hint(),
            Some(tracing_subscriber::filter::LevelFilter::INFO)
        );
    }

    #[test]
    fn no_endpoint_means_no_exporter() {
        let config = LoggingConfig {
            otlp_endpoint: None,
            ..LoggingConfig::default()
        };
        assert!(init_tracer(&config).unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn endpoint_yields_a_tracer() {
        let config = LoggingConfig {
            otlp_endpoint: Some("http://127.0.0.1:4317".to_string()),
            ..LoggingConfig::default()
        };
        assert!(init_tracer(&config).unwrap().is_some());
    }
}
