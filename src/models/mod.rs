// src/models/mod.rs

//! Domain models for the schedule synchronizer.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod layout;
mod lesson;
mod slot;
mod source;

// Re-export all public types
pub use config::{Config, CrawlerConfig, NotifierConfig, StoreConfig};
pub use layout::{ClassRule, LayoutConfig, parse_selector};
pub use lesson::{BaselineLesson, LessonOccurrence, LessonTag};
pub use slot::{SlotState, SlotStatus, StateMatrix, StoredSlotState};
pub use source::{PeriodConfig, SourceConfig, local_instant, parse_time, week_start};

#[cfg(test)]
pub(crate) use source::tests::sample_source;
