// src/config.rs

//! Configuration loading utilities.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::Config;

/// Load and validate the configuration file.
///
/// A missing file falls back to the compiled-in registry. A file that
/// exists but does not parse or validate is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        Config::load(path)
            .map_err(|e| AppError::config(format!("Failed to load {}: {e}", path.display())))?
    } else {
        log::warn!(
            "Config file {} not found. Using the built-in source registry.",
            path.display()
        );
        Config::default()
    };

    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid configuration in {}: {e}", path.display())))?;
    Ok(config)
}
