// src/error.rs

//! Unified error handling for the schedule synchronizer.

use std::fmt;

use thiserror::Error;

/// Result type alias for synchronizer operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Remote page could not be fetched or did not have the expected shape
    #[error("Scrape error for {target}: {message}")]
    Scrape { target: String, message: String },

    /// Store write or read failed
    #[error("Store error: {0}")]
    Store(String),

    /// Store operation exceeded its time budget
    #[error("Store operation '{operation}' timed out after {secs}s")]
    StoreTimeout { operation: String, secs: u64 },

    /// One side of a lesson/baseline replace failed
    #[error("Partial replace for {source_id}: lessons: {lessons}, baseline: {baseline}")]
    PartialReplace {
        source_id: String,
        lessons: String,
        baseline: String,
    },

    /// Push notification could not be delivered
    #[error("Notification error: {0}")]
    Notify(String),

    /// Cron scheduler failure
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// No source with the given id is registered
    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a scrape error with the target it happened on.
    pub fn scrape(target: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Scrape {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Create a store error.
    pub fn store(message: impl fmt::Display) -> Self {
        Self::Store(message.to_string())
    }

    /// Create a notification error.
    pub fn notify(message: impl fmt::Display) -> Self {
        Self::Notify(message.to_string())
    }

    /// Create a scheduler error.
    pub fn scheduler(message: impl fmt::Debug) -> Self {
        Self::Scheduler(format!("{message:?}"))
    }
}
