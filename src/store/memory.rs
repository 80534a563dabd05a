use super::{DocumentStore, StoreError, StoreResult, StoreStats};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

pub(crate) type Collection = IndexMap<String, Value>;

/// In-process store; every collection lives in an insertion-ordered map.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_collections(collections: HashMap<String, Collection>) -> Self {
        Self {
            collections: RwLock::new(collections),
        }
    }

    /// Copy of one collection, empty if it does not exist yet.
    pub(crate) fn snapshot(&self, collection: &str) -> Collection {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Swaps in a collection previously taken with [`Self::snapshot`].
    pub(crate) fn install(&self, collection: &str, documents: Collection) {
        self.collections
            .write()
            .insert(collection.to_string(), documents);
    }

    pub(crate) fn collection_names(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    pub(crate) fn stats_for(&self, backend: &str) -> StoreStats {
        let collections = self.collections.read();
        StoreStats {
            backend: backend.to_string(),
            collections: collections.len(),
            documents: collections.values().map(IndexMap::len).sum(),
        }
    }
}

pub(crate) fn insert_into(
    documents: &mut Collection,
    collection: &str,
    id: &str,
    document: Value,
) -> StoreResult<()> {
    if documents.contains_key(id) {
        return Err(StoreError::DuplicateId {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }
    documents.insert(id.to_string(), document);
    Ok(())
}

pub(crate) fn replace_in(documents: &mut Collection, id: &str, document: Value) -> bool {
    match documents.get_mut(id) {
        Some(slot) => {
            *slot = document;
            true
        }
        None => false,
    }
}

pub(crate) fn delete_from(documents: &mut Collection, id: &str) -> bool {
    documents.shift_remove(id).is_some()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, id: &str, document: Value) -> StoreResult<()> {
        let mut collections = self.collections.write();
        let documents = collections.entry(collection.to_string()).or_default();
        insert_into(documents, collection, id, document)
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<Value>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|documents| documents.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn replace(&self, collection: &str, id: &str, document: Value) -> StoreResult<bool> {
        let mut collections = self.collections.write();
        Ok(collections
            .get_mut(collection)
            .map(|documents| replace_in(documents, id, document))
            .unwrap_or(false))
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut collections = self.collections.write();
        Ok(collections
            .get_mut(collection)
            .map(|documents| delete_from(documents, id))
            .unwrap_or(false))
    }

    async fn flush(&self) -> StoreResult<()> {
        Ok(())
    }

    fn stats(&self) -> StoreStats {
        self.stats_for(self.backend_name())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn list_keeps_insertion_order_after_delete() {
        let store = MemoryStore::new();
        for id in ["a", "b", "c"] {
            store.insert("fields", id, json!({ "id": id })).await.unwrap();
        }
        assert!(store.delete("fields", "b").await.unwrap());

        let ids: Vec<_> = store
            .list("fields")
            .await
            .unwrap()
            .into_iter()
            .map(|v| v["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn unknown_collections_behave_as_empty() {
        let store = MemoryStore::new();
        assert!(store.list("wells").await.unwrap().is_empty());
        assert_eq!(store.get("wells", "w1").await.unwrap(), None);
        assert!(!store.replace("wells", "w1", json!({})).await.unwrap());
        assert!(!store.delete("wells", "w1").await.unwrap());
    }

    #[tokio::test]
    async fn stats_count_documents_across_collections() {
        let store = MemoryStore::new();
        store.insert("fields", "f1", json!({})).await.unwrap();
        store.insert("fields", "f2", json!({})).await.unwrap();
        store.insert("wells", "w1", json!({})).await.unwrap();

        let stats = store.stats();
        assert_eq!(stats.backend, "memory");
        assert_eq!(stats.collections, 2);
        assert_eq!(stats.documents, 3);
    }
}
