//! Per-(week, day) update markers.

use serde::{Deserialize, Serialize};

/// Whether the remote marked a day as changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Updated,
    NotUpdated,
}

impl SlotStatus {
    pub fn is_updated(self) -> bool {
        self == SlotStatus::Updated
    }
}

/// Marker for one `(week_index, day_index)` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotState {
    pub week_index: usize,
    pub day_index: usize,
    pub status: SlotStatus,
}

impl SlotState {
    pub fn new(week_index: usize, day_index: usize, status: SlotStatus) -> Self {
        Self {
            week_index,
            day_index,
            status,
        }
    }
}

/// Ordered slot markers for one source.
///
/// Entries are sorted by `week_index`, then `day_index`, so two matrices
/// scraped from the same page structure line up positionally. The sort is
/// stable: pages showing more than two weeks keep their page order within
/// equal keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateMatrix(Vec<SlotState>);

impl StateMatrix {
    pub fn new(mut entries: Vec<SlotState>) -> Self {
        entries.sort_by_key(|s| (s.week_index, s.day_index));
        Self(entries)
    }

    pub fn entries(&self) -> &[SlotState] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Status of the first entry at the given position.
    pub fn status_of(&self, week_index: usize, day_index: usize) -> Option<SlotStatus> {
        self.0
            .iter()
            .find(|s| s.week_index == week_index && s.day_index == day_index)
            .map(|s| s.status)
    }

    /// Number of slots marked as updated.
    pub fn updated_count(&self) -> usize {
        self.0.iter().filter(|s| s.status.is_updated()).count()
    }
}

impl From<Vec<SlotState>> for StateMatrix {
    fn from(entries: Vec<SlotState>) -> Self {
        Self::new(entries)
    }
}

/// A slot marker as persisted in the `SlotStates` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSlotState {
    pub source: String,
    #[serde(flatten)]
    pub state: SlotState,
}
