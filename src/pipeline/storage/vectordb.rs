use std::sync::Mutex;

use serde_json::Value;
use uuid::Uuid;

use super::types::VectorStore;
use super::StorageError;

/// In-memory vector store for testing and dry runs.
/// Objects are keyed by (collection, identity); an upsert replaces.
pub struct InMemoryVectorStore {
    entries: Mutex<Vec<StoredObject>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub collection: String,
    pub identity: Uuid,
    pub properties: Value,
    pub embedding_source: String,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn get(&self, collection: &str, identity: &Uuid) -> Option<StoredObject> {
        self.entries.lock().ok().and_then(|entries| {
            entries
                .iter()
                .find(|e| e.collection == collection && e.identity == *identity)
                .cloned()
        })
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn upsert(
        &self,
        collection: &str,
        identity: &Uuid,
        properties: &Value,
        embedding_source: &str,
    ) -> Result<(), StorageError> {
        if properties.get(embedding_source).is_none() {
            return Err(StorageError::VectorDb(format!(
                "Embedding source property '{embedding_source}' missing"
            )));
        }

        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::VectorDb("store lock poisoned".into()))?;
        let object = StoredObject {
            collection: collection.to_string(),
            identity: *identity,
            properties: properties.clone(),
            embedding_source: embedding_source.to_string(),
        };
        match entries
            .iter_mut()
            .find(|e| e.collection == collection && e.identity == *identity)
        {
            Some(existing) => *existing = object,
            None => entries.push(object),
        }
        Ok(())
    }
}
