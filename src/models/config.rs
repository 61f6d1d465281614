//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SourceConfig;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and scraping behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Document store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Push notification settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Source registry
    #[serde(default = "defaults::sources")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.store.timeout_secs == 0 {
            return Err(AppError::validation("store.timeout_secs must be > 0"));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.id.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate source id: {}",
                    source.id
                )));
            }
            source.validate()?;
        }
        Ok(())
    }

    /// Enabled sources only.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            store: StoreConfig::default(),
            notifier: NotifierConfig::default(),
            sources: defaults::sources(),
        }
    }
}

/// HTTP client and scraping behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent slot-type scrapes per sync
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one JSON file per collection
    #[serde(default = "defaults::store_root")]
    pub root_dir: PathBuf,

    /// Upper bound for each replace, in seconds
    #[serde(default = "defaults::store_timeout")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_dir: defaults::store_root(),
            timeout_secs: defaults::store_timeout(),
        }
    }
}

/// Push notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Webhook endpoint; notifications are only logged when absent
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Topic prefix, followed by the source id
    #[serde(default = "defaults::topic_prefix")]
    pub topic_prefix: String,

    /// Title template (`{name}`, `{id}`)
    #[serde(default = "defaults::title")]
    pub title: String,

    /// Body template (`{name}`, `{id}`)
    #[serde(default = "defaults::body")]
    pub body: String,

    #[serde(default)]
    pub image_url: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            topic_prefix: defaults::topic_prefix(),
            title: defaults::title(),
            body: defaults::body(),
            image_url: String::new(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use crate::models::{LayoutConfig, PeriodConfig, SourceConfig};

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; timetable-sync/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        4
    }

    // Store defaults
    pub fn store_root() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn store_timeout() -> u64 {
        20
    }

    // Notifier defaults
    pub fn topic_prefix() -> String {
        "schedule_".into()
    }
    pub fn title() -> String {
        "Schedule updated".into()
    }
    pub fn body() -> String {
        "The class schedule of {name} has changed.".into()
    }

    // Source registry defaults
    pub fn sources() -> Vec<SourceConfig> {
        vec![SourceConfig {
            id: "example_college".to_string(),
            name: "Example College".to_string(),
            enabled: true,
            base_url: "https://schedule.example.edu/timetable/".to_string(),
            slots_path: "groups".to_string(),
            target_template: "?group={target}".to_string(),
            probe_target: String::new(),
            probe_cron: "0 */5 * * * *".to_string(),
            sync_cron: "0 */30 * * * *".to_string(),
            arm_time: "06:00".to_string(),
            utc_offset_minutes: 180,
            control_secret: String::new(),
            periods: vec![
                PeriodConfig::new("08:30", "10:00"),
                PeriodConfig::new("10:10", "11:40"),
                PeriodConfig::new("12:10", "13:40"),
                PeriodConfig::new("13:50", "15:20"),
                PeriodConfig::new("15:30", "17:00"),
                PeriodConfig::new("17:10", "18:40"),
                PeriodConfig::new("18:50", "20:20"),
            ],
            layout: LayoutConfig::default(),
        }]
    }
}
