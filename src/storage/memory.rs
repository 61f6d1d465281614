//! In-memory document store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::storage::{Collection, DocumentStore, Filter, OWNER_FIELD};

/// Document store kept in process memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<Mutex<HashMap<Collection, Vec<Value>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in `collection`.
    pub async fn count(&self, collection: Collection) -> usize {
        self.collections
            .lock()
            .await
            .get(&collection)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn delete_by_owner(&self, collection: Collection, owner: &str) -> Result<usize> {
        let mut collections = self.collections.lock().await;
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|d| d.get(OWNER_FIELD).and_then(Value::as_str) != Some(owner));
        Ok(before - documents.len())
    }

    async fn insert_many(&self, collection: Collection, records: Vec<Value>) -> Result<usize> {
        let inserted = records.len();
        self.collections
            .lock()
            .await
            .entry(collection)
            .or_default()
            .extend(records);
        Ok(inserted)
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>> {
        Ok(self
            .collections
            .lock()
            .await
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }
}
