//! Store materialization: delete a source's rows, then insert the new set.
//!
//! The delete/insert pair is not transactional. A crash in between leaves
//! the source empty until the next successful sync.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{BaselineLesson, LessonOccurrence, StateMatrix, StoredSlotState};
use crate::storage::{Collection, DocumentStore, to_documents};

/// Row counts from one replace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceSummary {
    pub lessons_deleted: usize,
    pub lessons_inserted: usize,
    pub baseline_deleted: usize,
    pub baseline_inserted: usize,
}

/// Writes sync results into a `DocumentStore` with a bounded timeout per side.
#[derive(Clone)]
pub struct Materializer {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl Materializer {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Replace a source's lesson occurrences and baseline lessons.
    ///
    /// Both sides are always attempted. If exactly one fails, the side that
    /// succeeded is kept and `PartialReplace` is returned.
    pub async fn replace(
        &self,
        source_id: &str,
        occurrences: &[LessonOccurrence],
        baseline: &[BaselineLesson],
    ) -> Result<ReplaceSummary> {
        let lessons = self
            .replace_collection(Collection::LessonOccurrences, source_id, to_documents(occurrences))
            .await;
        let templates = self
            .replace_collection(Collection::BaselineLessons, source_id, to_documents(baseline))
            .await;

        match (lessons, templates) {
            (Ok((lessons_deleted, lessons_inserted)), Ok((baseline_deleted, baseline_inserted))) => {
                let summary = ReplaceSummary {
                    lessons_deleted,
                    lessons_inserted,
                    baseline_deleted,
                    baseline_inserted,
                };
                log::debug!("[{source_id}] replaced: {summary:?}");
                Ok(summary)
            }
            (Err(lessons), Err(baseline)) => {
                log::error!("[{source_id}] baseline replace failed: {baseline}");
                Err(lessons)
            }
            (lessons, baseline) => {
                let describe = |r: Result<(usize, usize)>| match r {
                    Ok((_, inserted)) => format!("ok ({inserted} inserted)"),
                    Err(e) => e.to_string(),
                };
                Err(AppError::PartialReplace {
                    source_id: source_id.to_string(),
                    lessons: describe(lessons),
                    baseline: describe(baseline),
                })
            }
        }
    }

    /// Replace a source's persisted state matrix.
    pub async fn replace_states(&self, source_id: &str, matrix: &StateMatrix) -> Result<usize> {
        let rows: Vec<StoredSlotState> = matrix
            .entries()
            .iter()
            .map(|&state| StoredSlotState {
                source: source_id.to_string(),
                state,
            })
            .collect();
        let (_, inserted) = self
            .replace_collection(Collection::SlotStates, source_id, to_documents(&rows))
            .await?;
        Ok(inserted)
    }

    async fn replace_collection(
        &self,
        collection: Collection,
        source_id: &str,
        documents: Result<Vec<serde_json::Value>>,
    ) -> Result<(usize, usize)> {
        let documents = documents?;
        let deleted = self
            .bounded(
                format!("delete {collection}"),
                self.store.delete_by_owner(collection, source_id),
            )
            .await?;
        let inserted = if documents.is_empty() {
            0
        } else {
            self.bounded(
                format!("insert {collection}"),
                self.store.insert_many(collection, documents),
            )
            .await?
        };
        Ok((deleted, inserted))
    }

    async fn bounded<T>(
        &self,
        operation: String,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| AppError::StoreTimeout {
                operation,
                secs: self.timeout.as_secs(),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LessonTag, SlotState, SlotStatus};
    use crate::storage::{Filter, MemoryStore};
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::Value;

    fn lesson(source: &str, subject: &str) -> LessonOccurrence {
        let starts_at = Utc.with_ymd_and_hms(2026, 10, 12, 5, 30, 0).unwrap();
        LessonOccurrence {
            source: source.into(),
            subject: subject.into(),
            teacher: "Petrova".into(),
            group: "IS-21".into(),
            room: "204".into(),
            tag: LessonTag::Stay,
            week_index: 0,
            day_index: 0,
            slot_index: 0,
            starts_at,
            ends_at: starts_at + chrono::Duration::minutes(90),
        }
    }

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 12).unwrap()
    }

    #[tokio::test]
    async fn test_replace_only_touches_owner() {
        let store = Arc::new(MemoryStore::new());
        let materializer = Materializer::new(store.clone(), Duration::from_secs(5));

        let other = vec![lesson("north", "Chemistry")];
        materializer.replace("north", &other, &[]).await.unwrap();

        let first = vec![lesson("college", "Algebra"), lesson("college", "Physics")];
        let baseline = vec![BaselineLesson::from_occurrence(&first[0], anchor())];
        materializer.replace("college", &first, &baseline).await.unwrap();

        let second = vec![lesson("college", "Algebra")];
        let summary = materializer.replace("college", &second, &[]).await.unwrap();

        assert_eq!(summary.lessons_deleted, 2);
        assert_eq!(summary.lessons_inserted, 1);
        assert_eq!(summary.baseline_deleted, 1);
        assert_eq!(summary.baseline_inserted, 0);
        assert_eq!(store.count(Collection::LessonOccurrences).await, 2);

        let north = store
            .find(Collection::LessonOccurrences, &Filter::owner("north"))
            .await
            .unwrap();
        assert_eq!(north.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_states() {
        let store = Arc::new(MemoryStore::new());
        let materializer = Materializer::new(store.clone(), Duration::from_secs(5));
        let matrix = StateMatrix::new(vec![
            SlotState::new(0, 0, SlotStatus::NotUpdated),
            SlotState::new(0, 1, SlotStatus::Updated),
        ]);

        materializer.replace_states("college", &matrix).await.unwrap();
        materializer.replace_states("college", &matrix).await.unwrap();

        let rows = store
            .find(Collection::SlotStates, &Filter::owner("college"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["status"], "updated");
    }

    /// Fails every write to one collection.
    struct BrokenCollection {
        inner: MemoryStore,
        broken: Collection,
    }

    #[async_trait]
    impl DocumentStore for BrokenCollection {
        async fn delete_by_owner(&self, collection: Collection, owner: &str) -> Result<usize> {
            self.inner.delete_by_owner(collection, owner).await
        }

        async fn insert_many(&self, collection: Collection, records: Vec<Value>) -> Result<usize> {
            if collection == self.broken {
                return Err(AppError::store("disk full"));
            }
            self.inner.insert_many(collection, records).await
        }

        async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>> {
            self.inner.find(collection, filter).await
        }
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_side() {
        let inner = MemoryStore::new();
        let store = Arc::new(BrokenCollection {
            inner: inner.clone(),
            broken: Collection::BaselineLessons,
        });
        let materializer = Materializer::new(store, Duration::from_secs(5));

        let lessons = vec![lesson("college", "Algebra")];
        let baseline = vec![BaselineLesson::from_occurrence(&lessons[0], anchor())];
        let err = materializer
            .replace("college", &lessons, &baseline)
            .await
            .unwrap_err();

        match err {
            AppError::PartialReplace {
                source_id,
                lessons,
                baseline,
            } => {
                assert_eq!(source_id, "college");
                assert!(lessons.starts_with("ok"));
                assert!(baseline.contains("disk full"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(inner.count(Collection::LessonOccurrences).await, 1);
    }

    /// Never finishes a delete.
    struct HungStore;

    #[async_trait]
    impl DocumentStore for HungStore {
        async fn delete_by_owner(&self, _: Collection, _: &str) -> Result<usize> {
            std::future::pending().await
        }

        async fn insert_many(&self, _: Collection, records: Vec<Value>) -> Result<usize> {
            Ok(records.len())
        }

        async fn find(&self, _: Collection, _: &Filter) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_hung_store_times_out() {
        let materializer = Materializer::new(Arc::new(HungStore), Duration::from_millis(20));
        let err = materializer
            .replace_states("college", &StateMatrix::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StoreTimeout { .. }));
    }
}
