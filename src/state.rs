use crate::config::ServerConfig;
use crate::store::{Document, DocumentStore, Repository, open_store};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Shared request state: configuration plus the one store opened at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(config: ServerConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    /// Opens the configured backend and wraps it with the configuration.
    pub fn open(config: ServerConfig) -> Result<Self> {
        let store = open_store(config.storage, &config.data_dir).with_context(|| {
            format!(
                "failed to open {} store at {}",
                config.storage,
                config.data_dir.display()
            )
        })?;
        let stats = store.stats();
        info!(
            backend = %stats.backend,
            collections = stats.collections,
            documents = stats.documents,
            strict_ownership = config.strict_ownership,
            "document store ready"
        );
        Ok(Self::new(config, store))
    }

    /// Typed view of one collection.
    pub fn repo<T: Document>(&self) -> Repository<T> {
        Repository::new(self.store.clone())
    }
}
