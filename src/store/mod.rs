//! Document persistence.
//!
//! Documents are JSON objects grouped into named collections and addressed
//! by id. The [`DocumentStore`] trait is the seam between handlers and the
//! backend; [`Repository`] layers typed (de)serialization on top of it.
//!
//! Backends:
//! - [`MemoryStore`]: process-local, lost on restart.
//! - [`FileStore`]: one `<collection>.json` per collection under a data
//!   directory, replaced atomically on every write.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} document '{id}' already exists")]
    DuplicateId { collection: String, id: String },

    #[error("i/o failure on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode or decode {collection} document: {source}")]
    Serialization {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("collection file {path:?} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("background write task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Document counts reported by health checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub backend: String,
    pub collections: usize,
    pub documents: usize,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores a new document; fails with [`StoreError::DuplicateId`] if the
    /// id is already taken.
    async fn insert(&self, collection: &str, id: &str, document: Value) -> StoreResult<()>;

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// All documents of a collection in insertion order.
    async fn list(&self, collection: &str) -> StoreResult<Vec<Value>>;

    /// Overwrites an existing document. Returns `false` if it was absent.
    async fn replace(&self, collection: &str, id: &str, document: Value) -> StoreResult<bool>;

    /// Returns `false` if the document was absent.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// Makes every acknowledged write durable.
    async fn flush(&self) -> StoreResult<()>;

    fn stats(&self) -> StoreStats;

    fn backend_name(&self) -> &'static str;
}

/// A type persisted in a collection.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn document_id(&self) -> &str;
}

/// Typed access to one collection.
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    pub async fn insert(&self, document: &T) -> StoreResult<()> {
        let value = encode(document)?;
        self.store
            .insert(T::COLLECTION, document.document_id(), value)
            .await
    }

    pub async fn get(&self, id: &str) -> StoreResult<Option<T>> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(value) => decode(value).map(Some),
            None => Ok(None),
        }
    }

    pub async fn exists(&self, id: &str) -> StoreResult<bool> {
        Ok(self.store.get(T::COLLECTION, id).await?.is_some())
    }

    pub async fn list(&self) -> StoreResult<Vec<T>> {
        self.store
            .list(T::COLLECTION)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn replace(&self, document: &T) -> StoreResult<bool> {
        let value = encode(document)?;
        self.store
            .replace(T::COLLECTION, document.document_id(), value)
            .await
    }

    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.store.delete(T::COLLECTION, id).await
    }
}

fn encode<T: Document>(document: &T) -> StoreResult<Value> {
    serde_json::to_value(document).map_err(|source| StoreError::Serialization {
        collection: T::COLLECTION.to_string(),
        source,
    })
}

fn decode<T: Document>(value: Value) -> StoreResult<T> {
    serde_json::from_value(value).map_err(|source| StoreError::Serialization {
        collection: T::COLLECTION.to_string(),
        source,
    })
}

/// Backend selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    File,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::Memory => write!(f, "memory"),
            StorageKind::File => write!(f, "file"),
        }
    }
}

/// Opens the configured backend.
pub fn open_store(kind: StorageKind, data_dir: &Path) -> StoreResult<Arc<dyn DocumentStore>> {
    match kind {
        StorageKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageKind::File => Ok(Arc::new(FileStore::open(data_dir)?)),
    }
}
