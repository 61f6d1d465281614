//! Document store abstractions for schedule persistence.
//!
//! The synchronizer only needs three operations against the store:
//! delete every record owned by a source, bulk-insert records, and find
//! records by field equality. Records are JSON documents carrying their
//! owning source id in the `source` field.
//!
//! ## Collections
//!
//! ```text
//! storage/
//! ├── LessonOccurrences.json   # Dated lessons, replaced on every full sync
//! ├── BaselineLessons.json     # Recurring template, replaced on every full sync
//! └── SlotStates.json          # Last scraped state matrix per source
//! ```

pub mod local;
pub mod memory;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::Result;

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStore;

/// Field holding the owning source id on every document.
pub const OWNER_FIELD: &str = "source";

/// Collections managed by the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    LessonOccurrences,
    BaselineLessons,
    SlotStates,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::LessonOccurrences => "LessonOccurrences",
            Collection::BaselineLessons => "BaselineLessons",
            Collection::SlotStates => "SlotStates",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Top-level field equality filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(BTreeMap<String, Value>);

impl Filter {
    /// Match every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match documents owned by `source`.
    pub fn owner(source: &str) -> Self {
        Self::all().and(OWNER_FIELD, source)
    }

    /// Add an equality condition.
    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }
}

/// Trait for document store backends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Delete every document in `collection` owned by `owner`.
    ///
    /// Returns the number of deleted documents.
    async fn delete_by_owner(&self, collection: Collection, owner: &str) -> Result<usize>;

    /// Append documents to `collection`.
    ///
    /// Returns the number of inserted documents.
    async fn insert_many(&self, collection: Collection, records: Vec<Value>) -> Result<usize>;

    /// Documents in `collection` matching `filter`, in insertion order.
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>>;
}

/// Serialize typed records into documents.
pub fn to_documents<T: Serialize>(records: &[T]) -> Result<Vec<Value>> {
    records
        .iter()
        .map(|r| serde_json::to_value(r).map_err(Into::into))
        .collect()
}

/// Deserialize documents into typed records.
pub fn from_documents<T: DeserializeOwned>(documents: Vec<Value>) -> Result<Vec<T>> {
    documents
        .into_iter()
        .map(|d| serde_json::from_value(d).map_err(Into::into))
        .collect()
}
