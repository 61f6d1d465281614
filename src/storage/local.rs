//! Local filesystem document store.
//!
//! Each collection is a JSON array in `{root}/{Collection}.json`. Writes go
//! through a temp file and a rename, and every read-modify-write cycle runs
//! under one process-wide lock so concurrent sources cannot interleave.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── LessonOccurrences.json
//! ├── BaselineLessons.json
//! └── SlotStates.json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::storage::{Collection, DocumentStore, Filter, OWNER_FIELD};

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    fn collection_key(collection: Collection) -> String {
        format!("{}.json", collection.name())
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn load_collection(&self, collection: Collection) -> Result<Vec<Value>> {
        Ok(self
            .read_json(&Self::collection_key(collection))
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl DocumentStore for LocalStorage {
    async fn delete_by_owner(&self, collection: Collection, owner: &str) -> Result<usize> {
        let _guard = self.lock.lock().await;

        let mut documents = self.load_collection(collection).await?;
        let before = documents.len();
        documents.retain(|d| d.get(OWNER_FIELD).and_then(Value::as_str) != Some(owner));
        let deleted = before - documents.len();

        if deleted > 0 {
            self.write_json(&Self::collection_key(collection), &documents)
                .await?;
        }
        log::debug!("{collection}: deleted {deleted} documents owned by {owner}");
        Ok(deleted)
    }

    async fn insert_many(&self, collection: Collection, records: Vec<Value>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let _guard = self.lock.lock().await;

        let mut documents = self.load_collection(collection).await?;
        let inserted = records.len();
        documents.extend(records);
        self.write_json(&Self::collection_key(collection), &documents)
            .await?;
        log::debug!("{collection}: inserted {inserted} documents");
        Ok(inserted)
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>> {
        let _guard = self.lock.lock().await;

        let documents = self.load_collection(collection).await?;
        Ok(documents.into_iter().filter(|d| filter.matches(d)).collect())
    }
}
