//! Sync pipeline stages.
//!
//! - `diff`: decide whether a probe saw a change
//! - `baseline`: derive the recurring schedule from dated lessons
//! - `materialize`: replace a source's rows in the store
//! - `sync`: the full-sync procedure tying the stages together
//! - `reader`: query the materialized schedule

pub mod baseline;
pub mod diff;
pub mod materialize;
pub mod reader;
pub mod sync;

pub use baseline::build_baseline;
pub use diff::states_equal;
pub use materialize::{Materializer, ReplaceSummary};
pub use reader::{DaySchedule, ScheduleReader};
pub use sync::{SyncReport, Syncer};
