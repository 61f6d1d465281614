//! Baseline (general schedule) construction.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::models::{BaselineLesson, LessonOccurrence, LessonTag};

/// Project occurrences onto the recurring grid.
///
/// One-off `Added` lessons are not part of the regular schedule and are
/// left out. `anchor` is the week start that `week_index == 0` referred to.
///
/// Pages showing more weeks than the rotation repeat grid positions; only
/// the first lesson per position and content is kept.
pub fn build_baseline(occurrences: &[LessonOccurrence], anchor: NaiveDate) -> Vec<BaselineLesson> {
    let mut seen = HashSet::new();
    let mut baseline = Vec::new();
    for o in occurrences.iter().filter(|o| o.tag != LessonTag::Added) {
        let key = (
            o.group.as_str(),
            o.week_index,
            o.day_index,
            o.slot_index,
            o.subject.as_str(),
            o.teacher.as_str(),
            o.room.as_str(),
        );
        if seen.insert(key) {
            baseline.push(BaselineLesson::from_occurrence(o, anchor));
        }
    }
    baseline
}
