//! Dual-cadence scheduling.
//!
//! Every source gets two cron jobs: a frequent probe that only compares
//! slot states, and a coarse full sync that always rescrapes and also
//! re-arms the probe once a day.

pub mod engine;
pub mod worker;

pub use engine::Engine;
pub use worker::{Phase, ProbeOutcome, SourceWorker, WorkerStatus};
