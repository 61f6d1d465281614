//! Lesson records produced by a full sync.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a lesson block derived from its markup state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LessonTag {
    /// Regular lesson, unchanged
    #[default]
    Stay,
    /// One-off lesson added on top of the regular schedule
    Added,
    /// Regular lesson cancelled for this occurrence
    Removed,
}

/// One concrete class instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LessonOccurrence {
    /// Owning source id
    pub source: String,

    /// Subject name
    pub subject: String,

    /// Teacher name
    pub teacher: String,

    /// Group (slot type) the lesson belongs to
    pub group: String,

    /// Room or location
    pub room: String,

    /// Added / Removed / Stay
    pub tag: LessonTag,

    /// Week parity (page week ordinal mod 2)
    pub week_index: usize,

    /// Day of week, 0 = first day row
    pub day_index: usize,

    /// Period of day
    pub slot_index: usize,

    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl LessonOccurrence {
    /// Key used to give a full-sync result a deterministic order.
    pub fn sort_key(&self) -> (DateTime<Utc>, &str, usize, &str, &str) {
        (
            self.starts_at,
            self.group.as_str(),
            self.slot_index,
            self.subject.as_str(),
            self.teacher.as_str(),
        )
    }
}

/// Template lesson keyed by `(week_index, day_index, slot_index)` instead of a date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BaselineLesson {
    pub source: String,
    pub subject: String,
    pub teacher: String,
    pub group: String,
    pub room: String,
    pub tag: LessonTag,
    pub week_index: usize,
    pub day_index: usize,
    pub slot_index: usize,

    /// Week start that `week_index == 0` referred to when this baseline was built
    pub anchor: NaiveDate,
}

impl BaselineLesson {
    /// Project a concrete occurrence onto the recurring grid.
    pub fn from_occurrence(occurrence: &LessonOccurrence, anchor: NaiveDate) -> Self {
        Self {
            source: occurrence.source.clone(),
            subject: occurrence.subject.clone(),
            teacher: occurrence.teacher.clone(),
            group: occurrence.group.clone(),
            room: occurrence.room.clone(),
            tag: occurrence.tag,
            week_index: occurrence.week_index,
            day_index: occurrence.day_index,
            slot_index: occurrence.slot_index,
            anchor,
        }
    }
}
