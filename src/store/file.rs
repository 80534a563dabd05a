use super::memory::{Collection, MemoryStore, delete_from, insert_into, replace_in};
use super::{DocumentStore, StoreError, StoreResult, StoreStats};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

const EXTENSION: &str = "json";

/// JSON-file backed store.
///
/// Reads are served from memory. A write clones the affected collection,
/// applies the change to the clone, rewrites `<collection>.json` through a
/// temp file and rename, and only then publishes the clone. A failed write
/// therefore leaves both disk and memory untouched.
pub struct FileStore {
    dir: PathBuf,
    memory: MemoryStore,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens (creating if needed) `dir` and loads every collection file in it.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

        let mut collections = HashMap::new();
        let entries = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let contents = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
            let documents: Collection =
                serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            debug!(collection = name, documents = documents.len(), "loaded collection");
            collections.insert(name.to_string(), documents);
        }

        let store = Self {
            dir: dir.to_path_buf(),
            memory: MemoryStore::with_collections(collections),
            write_lock: Mutex::new(()),
        };
        let stats = store.memory.stats_for("file");
        info!(
            data_dir = %dir.display(),
            collections = stats.collections,
            documents = stats.documents,
            "file store opened"
        );
        Ok(store)
    }

    pub fn data_dir(&self) -> &Path {
        &self.dir
    }

    fn collection_path(&self, collection: &str) -> StoreResult<PathBuf> {
        let valid = !collection.is_empty()
            && collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::Corrupt {
                path: self.dir.clone(),
                reason: format!("illegal collection name '{collection}'"),
            });
        }
        Ok(self.dir.join(format!("{collection}.{EXTENSION}")))
    }

    async fn mutate<R, F>(&self, collection: &str, op: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Collection) -> StoreResult<(R, bool)>,
    {
        let path = self.collection_path(collection)?;
        let _guard = self.write_lock.lock().await;

        let mut documents = self.memory.snapshot(collection);
        let (result, changed) = op(&mut documents)?;
        if !changed {
            return Ok(result);
        }

        let dir = self.dir.clone();
        let to_write = documents.clone();
        tokio::task::spawn_blocking(move || write_atomically(&dir, &path, &to_write))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;

        self.memory.install(collection, documents);
        Ok(result)
    }
}

fn write_atomically(dir: &Path, path: &Path, documents: &Collection) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(documents).map_err(|source| {
        StoreError::Serialization {
            collection: path.display().to_string(),
            source,
        }
    })?;
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    temp.write_all(&bytes)
        .map_err(|e| StoreError::io(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn insert(&self, collection: &str, id: &str, document: Value) -> StoreResult<()> {
        self.mutate(collection, |documents| {
            insert_into(documents, collection, id, document).map(|()| ((), true))
        })
        .await
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        self.memory.get(collection, id).await
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<Value>> {
        self.memory.list(collection).await
    }

    async fn replace(&self, collection: &str, id: &str, document: Value) -> StoreResult<bool> {
        self.mutate(collection, |documents| {
            let replaced = replace_in(documents, id, document);
            Ok((replaced, replaced))
        })
        .await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.mutate(collection, |documents| {
            let deleted = delete_from(documents, id);
            Ok((deleted, deleted))
        })
        .await
    }

    async fn flush(&self) -> StoreResult<()> {
        // Writes are durable once acknowledged; taking the lock waits out
        // any write still in progress.
        let _guard = self.write_lock.lock().await;
        debug!(
            collections = self.memory.collection_names().len(),
            "file store flushed"
        );
        Ok(())
    }

    fn stats(&self) -> StoreStats {
        self.memory.stats_for(self.backend_name())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn documents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store
                .insert("fields", "f1", json!({"id": "f1", "name": "North"}))
                .await
                .unwrap();
            store
                .insert("fields", "f2", json!({"id": "f2", "name": "South"}))
                .await
                .unwrap();
            store
                .replace("fields", "f1", json!({"id": "f1", "name": "North Ridge"}))
                .await
                .unwrap();
            store.delete("fields", "f2").await.unwrap();
            store.flush().await.unwrap();
        }

        let reopened = FileStore::open(dir.path()).unwrap();
        let fields = reopened.list("fields").await.unwrap();
        assert_eq!(fields, vec![json!({"id": "f1", "name": "North Ridge"})]);
        assert!(dir.path().join("fields.json").exists());
    }

    #[tokio::test]
    async fn duplicate_insert_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.insert("wells", "w1", json!({"v": 1})).await.unwrap();
        let before = fs::read_to_string(dir.path().join("wells.json")).unwrap();

        let err = store.insert("wells", "w1", json!({"v": 2})).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { .. }));

        let after = fs::read_to_string(dir.path().join("wells.json")).unwrap();
        assert_eq!(before, after);
        assert_eq!(store.get("wells", "w1").await.unwrap(), Some(json!({"v": 1})));
    }

    #[tokio::test]
    async fn corrupt_collection_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fields.json"), "{ not json").unwrap();
        let err = FileStore::open(dir.path()).err().unwrap();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn illegal_collection_names_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.insert("../escape", "x", json!({})).await.is_err());
    }

    #[tokio::test]
    async fn non_json_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.txt"), "notes").unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.stats().collections, 0);
    }
}
