use crate::store::StorageKind;
use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
const MAX_SHUTDOWN_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_bind_address: SocketAddr,
    pub storage: StorageKind,
    pub data_dir: PathBuf,
    /// Reject ownership ledgers whose percentages do not sum to 100.
    pub strict_ownership: bool,
    pub graceful_shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind_address: default_bind(),
            storage: StorageKind::File,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            strict_ownership: false,
            graceful_shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            http_bind: cli_http_bind,
            storage: cli_storage,
            data_dir: cli_data_dir,
            strict_ownership: cli_strict_ownership,
            graceful_shutdown_timeout_secs: cli_shutdown_timeout,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            http_bind: file_http_bind,
            storage: file_storage,
            data_dir: file_data_dir,
            strict_ownership: file_strict_ownership,
            graceful_shutdown_timeout_secs: file_shutdown_timeout,
        } = file_config;

        let defaults = Self::default();

        Ok(Self {
            http_bind_address: cli_http_bind
                .or(file_http_bind)
                .unwrap_or(defaults.http_bind_address),
            storage: cli_storage.or(file_storage).unwrap_or(defaults.storage),
            data_dir: cli_data_dir
                .or(file_data_dir)
                .unwrap_or(defaults.data_dir),
            strict_ownership: cli_strict_ownership
                .or(file_strict_ownership)
                .unwrap_or(defaults.strict_ownership),
            graceful_shutdown_timeout_secs: cli_shutdown_timeout
                .or(file_shutdown_timeout)
                .unwrap_or(defaults.graceful_shutdown_timeout_secs),
        })
    }

    /// In-memory configuration used by tests and embedding callers.
    pub fn in_memory() -> Self {
        Self {
            storage: StorageKind::Memory,
            ..Self::default()
        }
    }

    /// Fails fast on settings the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.graceful_shutdown_timeout_secs > 0,
            "graceful shutdown timeout must be at least one second"
        );
        anyhow::ensure!(
            self.graceful_shutdown_timeout_secs <= MAX_SHUTDOWN_TIMEOUT_SECS,
            "graceful shutdown timeout {}s exceeds the maximum of {}s",
            self.graceful_shutdown_timeout_secs,
            MAX_SHUTDOWN_TIMEOUT_SECS
        );

        if self.storage == StorageKind::File {
            anyhow::ensure!(
                !self.data_dir.as_os_str().is_empty(),
                "data directory must be set when using file storage"
            );
            if self.data_dir.exists() {
                anyhow::ensure!(
                    self.data_dir.is_dir(),
                    "data directory {:?} is not a directory",
                    self.data_dir
                );
            }
        }
        Ok(())
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

#[derive(Parser, Debug, Default, Clone)]
#[command(name = "farm-ops", about = "Farm operations service", version)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "FARM_OPS_HTTP_BIND",
        value_name = "ADDR",
        help = "HTTP bind address (default 127.0.0.1:8080)"
    )]
    pub http_bind: Option<SocketAddr>,

    #[arg(
        long,
        env = "FARM_OPS_STORAGE",
        value_enum,
        value_name = "BACKEND",
        help = "Document storage backend (memory or file)"
    )]
    pub storage: Option<StorageKind>,

    #[arg(
        long,
        env = "FARM_OPS_DATA_DIR",
        value_name = "DIR",
        help = "Directory holding collection files for file storage"
    )]
    pub data_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "FARM_OPS_STRICT_OWNERSHIP",
        value_name = "BOOL",
        help = "Reject ownership ledgers that do not sum to 100"
    )]
    pub strict_ownership: Option<bool>,

    #[arg(
        long,
        env = "FARM_OPS_SHUTDOWN_TIMEOUT_SECS",
        value_name = "SECS",
        help = "Seconds allowed for graceful shutdown",
        value_parser = clap::value_parser!(u64)
    )]
    pub graceful_shutdown_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    http_bind: Option<SocketAddr>,
    storage: Option<StorageKind>,
    data_dir: Option<PathBuf>,
    strict_ownership: Option<bool>,
    graceful_shutdown_timeout_secs: Option<u64>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
