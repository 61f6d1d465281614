// src/pipeline/sync.rs

//! Full-sync procedure for one source.
//!
//! 1. Refresh the slot types from the listing page
//! 2. Scrape every slot type's schedule (bounded fan-out)
//! 3. Scrape the state matrix of the probe target
//! 4. Build the baseline and materialize lessons and baseline

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::error::Result;
use crate::models::{LessonOccurrence, SourceConfig, StateMatrix, week_start};
use crate::pipeline::baseline::build_baseline;
use crate::pipeline::materialize::{Materializer, ReplaceSummary};
use crate::services::ScheduleScraper;

/// Outcome of one full sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub source_id: String,

    /// Slot types in effect after discovery
    pub slot_types: Vec<String>,

    /// Slot types whose scrape failed
    pub failed_slots: Vec<String>,

    pub lesson_count: usize,
    pub baseline_count: usize,

    /// Freshly scraped state matrix, not yet adopted; empty if the state scrape failed
    pub states: StateMatrix,

    /// `None` when nothing was written
    pub replaced: Option<ReplaceSummary>,

    pub anchor: NaiveDate,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn wrote(&self) -> bool {
        self.replaced.is_some()
    }
}

/// Runs full syncs for one source.
pub struct Syncer {
    source: Arc<SourceConfig>,
    scraper: Arc<dyn ScheduleScraper>,
    materializer: Materializer,
    concurrency: usize,
}

impl Syncer {
    pub fn new(
        source: Arc<SourceConfig>,
        scraper: Arc<dyn ScheduleScraper>,
        materializer: Materializer,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            scraper,
            materializer,
            concurrency: concurrency.max(1),
        }
    }

    pub fn source(&self) -> &Arc<SourceConfig> {
        &self.source
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    /// Run one full sync.
    ///
    /// Scrape failures are logged and count as empty results. A sync that
    /// scraped no lessons at all writes nothing. Store failures are returned.
    pub async fn run(&self, known_slots: &[String], now: DateTime<Utc>) -> Result<SyncReport> {
        let id = self.source.id.as_str();
        let slot_types = self.discover_slots(known_slots).await;
        let today = self.source.local(now)?.date_naive();

        let mut occurrences = Vec::new();
        let mut failed_slots = Vec::new();
        let scraper = Arc::clone(&self.scraper);
        let mut results = stream::iter(slot_types.clone())
            .map(move |slot| {
                let scraper = Arc::clone(&scraper);
                async move {
                    let result = scraper.scrape_schedule(&slot, today).await;
                    (slot, result)
                }
            })
            .buffered(self.concurrency);

        while let Some((slot, result)) = results.next().await {
            match result {
                Ok(lessons) => {
                    log::debug!("[{id}] {slot}: {} lessons", lessons.len());
                    occurrences.extend(lessons);
                }
                Err(e) => {
                    log::warn!("[{id}] failed to scrape {slot}: {e}");
                    failed_slots.push(slot);
                }
            }
        }
        sort_occurrences(&mut occurrences);

        let states = self.scrape_states(&slot_types).await;
        // Same local date the occurrences were dated from.
        let anchor = week_start(today);

        let mut report = SyncReport {
            source_id: id.to_string(),
            slot_types,
            failed_slots,
            lesson_count: occurrences.len(),
            baseline_count: 0,
            states,
            replaced: None,
            anchor,
            finished_at: now,
        };

        if occurrences.is_empty() {
            log::warn!("[{id}] full sync scraped no lessons; keeping stored schedule");
            report.finished_at = Utc::now();
            return Ok(report);
        }

        let baseline = build_baseline(&occurrences, anchor);
        report.baseline_count = baseline.len();

        let summary = self.materializer.replace(id, &occurrences, &baseline).await?;
        report.replaced = Some(summary);
        report.finished_at = Utc::now();

        log::info!(
            "[{id}] full sync stored {} lessons, {} baseline lessons across {} slot types",
            report.lesson_count,
            report.baseline_count,
            report.slot_types.len()
        );
        Ok(report)
    }

    /// Current state matrix of the probe target. Failures yield an empty matrix.
    pub async fn scrape_states(&self, slot_types: &[String]) -> StateMatrix {
        let id = self.source.id.as_str();
        let Some(target) = self.source.resolve_probe_target(slot_types) else {
            log::warn!("[{id}] no probe target: no slot types known");
            return StateMatrix::default();
        };
        match self.scraper.scrape_slot_states(target).await {
            Ok(states) => states,
            Err(e) => {
                log::warn!("[{id}] state scrape failed for {target}: {e}");
                StateMatrix::default()
            }
        }
    }

    async fn discover_slots(&self, known: &[String]) -> Vec<String> {
        let id = self.source.id.as_str();
        match self.scraper.scrape_available_slots().await {
            Ok(slots) if !slots.is_empty() => {
                if slots != known {
                    log::info!("[{id}] slot types: {}", slots.join(", "));
                }
                slots
            }
            Ok(_) => {
                log::warn!("[{id}] slot listing is empty; keeping {} known", known.len());
                known.to_vec()
            }
            Err(e) => {
                log::warn!("[{id}] slot discovery failed: {e}; keeping {} known", known.len());
                known.to_vec()
            }
        }
    }
}

/// Deterministic order so repeated syncs of an unchanged page write identical sets.
pub fn sort_occurrences(occurrences: &mut [LessonOccurrence]) {
    occurrences.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{LessonTag, SlotState, SlotStatus, sample_source};
    use crate::storage::{Collection, DocumentStore, Filter, MemoryStore};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    /// Serves fixed lessons per slot type.
    #[derive(Default)]
    struct FixedScraper {
        slots: Vec<String>,
        lessons: HashMap<String, Vec<LessonOccurrence>>,
        states: StateMatrix,
        broken_slot: Option<String>,
        dated_on: StdMutex<Vec<NaiveDate>>,
    }

    #[async_trait]
    impl ScheduleScraper for FixedScraper {
        async fn scrape_schedule(
            &self,
            target: &str,
            today: NaiveDate,
        ) -> Result<Vec<LessonOccurrence>> {
            self.dated_on.lock().unwrap().push(today);
            if self.broken_slot.as_deref() == Some(target) {
                return Err(AppError::scrape(target, "connection reset"));
            }
            Ok(self.lessons.get(target).cloned().unwrap_or_default())
        }

        async fn scrape_slot_states(&self, _target: &str) -> Result<StateMatrix> {
            Ok(self.states.clone())
        }

        async fn scrape_available_slots(&self) -> Result<Vec<String>> {
            Ok(self.slots.clone())
        }
    }

    fn lesson(group: &str, subject: &str, day: usize, tag: LessonTag) -> LessonOccurrence {
        let starts_at = Utc.with_ymd_and_hms(2026, 10, 12, 5, 30, 0).unwrap() + Duration::days(day as i64);
        LessonOccurrence {
            source: "college".into(),
            subject: subject.into(),
            teacher: "Petrova".into(),
            group: group.into(),
            room: "204".into(),
            tag,
            week_index: 0,
            day_index: day,
            slot_index: 0,
            starts_at,
            ends_at: starts_at + Duration::minutes(90),
        }
    }

    fn scraper() -> FixedScraper {
        let mut lessons = HashMap::new();
        lessons.insert(
            "IS-21".to_string(),
            vec![
                lesson("IS-21", "Physics", 2, LessonTag::Removed),
                lesson("IS-21", "Algebra", 0, LessonTag::Stay),
            ],
        );
        lessons.insert(
            "PH-11".to_string(),
            vec![lesson("PH-11", "Databases", 0, LessonTag::Added)],
        );
        FixedScraper {
            slots: vec!["IS-21".into(), "PH-11".into()],
            lessons,
            states: StateMatrix::new(vec![SlotState::new(0, 0, SlotStatus::NotUpdated)]),
            ..Default::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap()
    }

    fn syncer(scraper: FixedScraper, store: Arc<MemoryStore>) -> Syncer {
        Syncer::new(
            Arc::new(sample_source()),
            Arc::new(scraper),
            Materializer::new(store, std::time::Duration::from_secs(5)),
            2,
        )
    }

    #[tokio::test]
    async fn test_full_sync_materializes_all_slot_types() {
        let store = Arc::new(MemoryStore::new());
        let report = syncer(scraper(), store.clone()).run(&[], now()).await.unwrap();

        assert!(report.wrote());
        assert_eq!(report.slot_types, vec!["IS-21", "PH-11"]);
        assert_eq!(report.lesson_count, 3);
        assert_eq!(report.baseline_count, 2);
        assert_eq!(report.anchor, NaiveDate::from_ymd_opt(2026, 10, 12).unwrap());
        assert_eq!(store.count(Collection::LessonOccurrences).await, 3);
        assert_eq!(store.count(Collection::BaselineLessons).await, 2);
        assert_eq!(report.states.len(), 1);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let syncer = syncer(scraper(), store.clone());

        syncer.run(&[], now()).await.unwrap();
        let first = store
            .find(Collection::LessonOccurrences, &Filter::all())
            .await
            .unwrap();
        let first_baseline = store
            .find(Collection::BaselineLessons, &Filter::all())
            .await
            .unwrap();

        syncer.run(&[], now()).await.unwrap();
        let second = store
            .find(Collection::LessonOccurrences, &Filter::all())
            .await
            .unwrap();
        let second_baseline = store
            .find(Collection::BaselineLessons, &Filter::all())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first_baseline, second_baseline);
        // Sorted by start time: Monday lessons first.
        assert_eq!(second[0]["subject"], "Algebra");
    }

    #[tokio::test]
    async fn test_empty_scrape_keeps_store() {
        let store = Arc::new(MemoryStore::new());
        syncer(scraper(), store.clone()).run(&[], now()).await.unwrap();

        let empty = FixedScraper {
            slots: vec!["IS-21".into()],
            ..Default::default()
        };
        let report = syncer(empty, store.clone()).run(&[], now()).await.unwrap();

        assert!(!report.wrote());
        assert_eq!(store.count(Collection::LessonOccurrences).await, 3);
    }

    #[tokio::test]
    async fn test_failed_slot_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let mut broken = scraper();
        broken.broken_slot = Some("PH-11".into());

        let report = syncer(broken, store.clone()).run(&[], now()).await.unwrap();

        assert_eq!(report.failed_slots, vec!["PH-11"]);
        assert_eq!(report.lesson_count, 2);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_run_future_is_send() {
        // Cron job bodies are spawned onto the runtime.
        let syncer = Arc::new(syncer(scraper(), Arc::new(MemoryStore::new())));
        let fut = async move { syncer.run(&[], now()).await };
        assert_send(&fut);
    }

    #[tokio::test]
    async fn test_lessons_and_anchor_share_local_date() {
        let store = Arc::new(MemoryStore::new());
        let scraper = Arc::new(scraper());
        let syncer = Syncer::new(
            Arc::new(sample_source()),
            scraper.clone(),
            Materializer::new(store, std::time::Duration::from_secs(5)),
            2,
        );

        // Sunday 22:30 UTC is already Monday at UTC+3.
        let late_sunday = Utc.with_ymd_and_hms(2026, 10, 18, 22, 30, 0).unwrap();
        let report = syncer.run(&[], late_sunday).await.unwrap();

        let monday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(report.anchor, monday);
        assert_eq!(*scraper.dated_on.lock().unwrap(), vec![monday, monday]);
    }

    #[tokio::test]
    async fn test_empty_discovery_keeps_known_slots() {
        let store = Arc::new(MemoryStore::new());
        let mut source = scraper();
        source.slots.clear();
        let known = vec!["PH-11".to_string()];

        let report = syncer(source, store).run(&known, now()).await.unwrap();

        assert_eq!(report.slot_types, known);
        assert_eq!(report.lesson_count, 1);
    }
}
