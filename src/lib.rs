// src/lib.rs

//! Timetable Sync Library
//!
//! Keeps a document store in step with institutions' published class
//! schedules: scrape, diff slot states, materialize, notify.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod scheduler;
pub mod services;
pub mod storage;
pub mod utils;
