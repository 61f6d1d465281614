//! Read side of the store.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::Result;
use crate::models::{
    BaselineLesson, LessonOccurrence, LessonTag, SourceConfig, StateMatrix, StoredSlotState,
    local_instant, week_start,
};
use crate::services::layout::WEEK_ROTATION;
use crate::storage::{Collection, DocumentStore, Filter, from_documents};

/// Lessons of one group on one day.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub lessons: Vec<LessonOccurrence>,

    /// Whether `lessons` were projected from the baseline
    pub from_baseline: bool,
}

/// Queries materialized schedules.
#[derive(Clone)]
pub struct ScheduleReader {
    store: Arc<dyn DocumentStore>,
}

impl ScheduleReader {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Lessons of `group` on `date` (institution-local).
    ///
    /// Falls back to the baseline for the date's week parity and weekday
    /// when no dated occurrence exists.
    pub async fn day_schedule(
        &self,
        source: &SourceConfig,
        group: &str,
        date: NaiveDate,
    ) -> Result<DaySchedule> {
        let offset = source.offset()?;
        let filter = Filter::owner(&source.id).and("group", group);

        let documents = self
            .store
            .find(Collection::LessonOccurrences, &filter)
            .await?;
        let mut lessons: Vec<LessonOccurrence> = from_documents::<LessonOccurrence>(documents)?
            .into_iter()
            .filter(|l| l.starts_at.with_timezone(&offset).date_naive() == date)
            .collect();

        if !lessons.is_empty() {
            lessons.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
            return Ok(DaySchedule {
                date,
                lessons,
                from_baseline: false,
            });
        }

        let day_index = date.weekday().num_days_from_monday() as usize;
        let documents = self
            .store
            .find(
                Collection::BaselineLessons,
                &filter.and("day_index", day_index),
            )
            .await?;
        let baseline: Vec<BaselineLesson> = from_documents(documents)?;

        let periods = source.period_table()?;
        let mut lessons: Vec<LessonOccurrence> = baseline
            .iter()
            .filter(|b| b.week_index == week_parity(b.anchor, date))
            .filter_map(|b| {
                let &(start, end) = periods.get(b.slot_index)?;
                Some(LessonOccurrence {
                    source: b.source.clone(),
                    subject: b.subject.clone(),
                    teacher: b.teacher.clone(),
                    group: b.group.clone(),
                    room: b.room.clone(),
                    // The baseline is the regular schedule; cancellations do not carry over.
                    tag: LessonTag::Stay,
                    week_index: b.week_index,
                    day_index: b.day_index,
                    slot_index: b.slot_index,
                    starts_at: local_instant(offset, date, start)?,
                    ends_at: local_instant(offset, date, end)?,
                })
            })
            .collect();
        lessons.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        Ok(DaySchedule {
            date,
            lessons,
            from_baseline: true,
        })
    }

    /// Last state matrix persisted for a source.
    pub async fn stored_states(&self, source_id: &str) -> Result<StateMatrix> {
        let documents = self
            .store
            .find(Collection::SlotStates, &Filter::owner(source_id))
            .await?;
        let rows: Vec<StoredSlotState> = from_documents(documents)?;
        Ok(StateMatrix::new(rows.into_iter().map(|r| r.state).collect()))
    }
}

/// Week parity of `date` relative to the week starting at `anchor`.
pub fn week_parity(anchor: NaiveDate, date: NaiveDate) -> usize {
    let weeks = (week_start(date) - week_start(anchor)).num_days() / 7;
    weeks.rem_euclid(WEEK_ROTATION as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SlotState, SlotStatus, sample_source};
    use crate::pipeline::baseline::build_baseline;
    use crate::pipeline::materialize::Materializer;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lesson(subject: &str, week: usize, day: usize, tag: LessonTag) -> LessonOccurrence {
        // Week 0 starts on Monday 2026-10-12; period 0 is 08:30 at UTC+3.
        let starts_at = Utc.with_ymd_and_hms(2026, 10, 12, 5, 30, 0).unwrap()
            + Duration::days((week * 7 + day) as i64);
        LessonOccurrence {
            source: "college".into(),
            subject: subject.into(),
            teacher: "Petrova".into(),
            group: "IS-21".into(),
            room: "204".into(),
            tag,
            week_index: week,
            day_index: day,
            slot_index: 0,
            starts_at,
            ends_at: starts_at + Duration::minutes(90),
        }
    }

    async fn seeded() -> ScheduleReader {
        let store = Arc::new(MemoryStore::new());
        let materializer = Materializer::new(store.clone(), std::time::Duration::from_secs(5));
        let occurrences = vec![
            lesson("Algebra", 0, 0, LessonTag::Stay),
            lesson("Databases", 0, 1, LessonTag::Added),
            lesson("Physics", 0, 2, LessonTag::Removed),
            lesson("Statistics", 1, 0, LessonTag::Stay),
        ];
        let baseline = build_baseline(&occurrences, date(2026, 10, 12));
        materializer
            .replace("college", &occurrences, &baseline)
            .await
            .unwrap();
        materializer
            .replace_states(
                "college",
                &StateMatrix::new(vec![
                    SlotState::new(0, 0, SlotStatus::NotUpdated),
                    SlotState::new(0, 2, SlotStatus::Updated),
                ]),
            )
            .await
            .unwrap();
        ScheduleReader::new(store)
    }

    #[test]
    fn test_week_parity() {
        let anchor = date(2026, 10, 12);
        assert_eq!(week_parity(anchor, date(2026, 10, 18)), 0);
        assert_eq!(week_parity(anchor, date(2026, 10, 19)), 1);
        assert_eq!(week_parity(anchor, date(2026, 10, 28)), 0);
        assert_eq!(week_parity(anchor, date(2026, 10, 5)), 1);
    }

    #[tokio::test]
    async fn test_concrete_lessons_preferred() {
        let reader = seeded().await;
        let day = reader
            .day_schedule(&sample_source(), "IS-21", date(2026, 10, 14))
            .await
            .unwrap();

        assert!(!day.from_baseline);
        assert_eq!(day.lessons.len(), 1);
        assert_eq!(day.lessons[0].subject, "Physics");
        assert_eq!(day.lessons[0].tag, LessonTag::Removed);
    }

    #[tokio::test]
    async fn test_baseline_fallback_by_parity() {
        let reader = seeded().await;
        let source = sample_source();

        // Two weeks later: parity 0, Monday.
        let monday = reader
            .day_schedule(&source, "IS-21", date(2026, 10, 26))
            .await
            .unwrap();
        assert!(monday.from_baseline);
        assert_eq!(monday.lessons.len(), 1);
        assert_eq!(monday.lessons[0].subject, "Algebra");
        assert_eq!(
            monday.lessons[0].starts_at,
            Utc.with_ymd_and_hms(2026, 10, 26, 5, 30, 0).unwrap()
        );

        // Parity 1 Monday.
        let odd = reader
            .day_schedule(&source, "IS-21", date(2026, 11, 2))
            .await
            .unwrap();
        assert_eq!(odd.lessons[0].subject, "Statistics");

        // Added lessons never reach the baseline.
        let tuesday = reader
            .day_schedule(&source, "IS-21", date(2026, 10, 27))
            .await
            .unwrap();
        assert!(tuesday.lessons.is_empty());

        // Cancelled occurrences still belong to the regular schedule.
        let wednesday = reader
            .day_schedule(&source, "IS-21", date(2026, 10, 28))
            .await
            .unwrap();
        assert_eq!(wednesday.lessons[0].subject, "Physics");
        assert_eq!(wednesday.lessons[0].tag, LessonTag::Stay);
    }

    #[tokio::test]
    async fn test_third_week_table_does_not_duplicate_fallback() {
        let store = Arc::new(MemoryStore::new());
        let materializer = Materializer::new(store.clone(), std::time::Duration::from_secs(5));
        let mut third = lesson("Algebra", 2, 0, LessonTag::Stay);
        third.week_index = 0;
        let occurrences = vec![
            lesson("Algebra", 0, 0, LessonTag::Stay),
            lesson("Algebra", 1, 0, LessonTag::Stay),
            third,
        ];
        let baseline = build_baseline(&occurrences, date(2026, 10, 12));
        materializer
            .replace("college", &occurrences, &baseline)
            .await
            .unwrap();

        let day = ScheduleReader::new(store)
            .day_schedule(&sample_source(), "IS-21", date(2026, 11, 9))
            .await
            .unwrap();

        assert!(day.from_baseline);
        assert_eq!(day.lessons.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_group_is_empty() {
        let reader = seeded().await;
        let day = reader
            .day_schedule(&sample_source(), "XX-00", date(2026, 10, 12))
            .await
            .unwrap();
        assert!(day.lessons.is_empty());
    }

    #[tokio::test]
    async fn test_stored_states() {
        let reader = seeded().await;
        let states = reader.stored_states("college").await.unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states.status_of(0, 2), Some(SlotStatus::Updated));
        assert!(reader.stored_states("north").await.unwrap().is_empty());
    }
}
