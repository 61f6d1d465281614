//! Source registry entries: one per synchronized institution.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio_cron_scheduler::Job;
use url::{Url, form_urlencoded};

use crate::error::{AppError, Result};
use crate::models::LayoutConfig;

/// Start and end of one period of the day, as `HH:MM` local times.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeriodConfig {
    pub start: String,
    pub end: String,
}

impl PeriodConfig {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Parse both bounds.
    pub fn bounds(&self) -> Result<(NaiveTime, NaiveTime)> {
        let start = parse_time(&self.start)?;
        let end = parse_time(&self.end)?;
        if end <= start {
            return Err(AppError::validation(format!(
                "period {}-{} ends before it starts",
                self.start, self.end
            )));
        }
        Ok((start, end))
    }
}

/// Parse an `HH:MM` wall-clock time.
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| AppError::validation(format!("invalid time '{s}': {e}")))
}

/// Configuration for one institution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique source identifier, used as the owner key in the store
    pub id: String,

    /// Human-readable institution name
    pub name: String,

    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Base URL that scrape targets are resolved against
    pub base_url: String,

    /// Path of the page listing available slot types
    #[serde(default)]
    pub slots_path: String,

    /// Path of one slot type's schedule page; `{target}` is replaced by the slot id
    #[serde(default = "defaults::target_template")]
    pub target_template: String,

    /// Slot id scraped by the probe; empty means the first known slot type
    #[serde(default)]
    pub probe_target: String,

    /// Cron expression for the probe cadence (seconds first)
    #[serde(default = "defaults::probe_cron")]
    pub probe_cron: String,

    /// Cron expression for the full-sync cadence (seconds first)
    #[serde(default = "defaults::sync_cron")]
    pub sync_cron: String,

    /// Local time after which the first full-sync tick of a day re-arms the probe
    #[serde(default = "defaults::arm_time")]
    pub arm_time: String,

    /// Institution offset from UTC, in minutes
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Shared secret for the control surface
    #[serde(default)]
    pub control_secret: String,

    /// Period index to start/end lookup table
    #[serde(default = "defaults::periods")]
    pub periods: Vec<PeriodConfig>,

    #[serde(default)]
    pub layout: LayoutConfig,
}

impl SourceConfig {
    /// Schedule page URL for a scrape target (slot id). The target is
    /// percent-encoded before it is substituted.
    pub fn target_url(&self, target: &str) -> Result<Url> {
        let encoded = form_urlencoded::byte_serialize(target.as_bytes())
            .collect::<String>()
            .replace('+', "%20");
        let path = self.target_template.replace("{target}", &encoded);
        Ok(Url::parse(&self.base_url)?.join(&path)?)
    }

    /// URL of the slot listing page.
    pub fn slots_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.base_url)?.join(&self.slots_path)?)
    }

    /// Slot id the probe scrapes: the configured one, else the first known slot type.
    pub fn resolve_probe_target<'a>(&'a self, slot_types: &'a [String]) -> Option<&'a str> {
        if !self.probe_target.trim().is_empty() {
            return Some(self.probe_target.trim());
        }
        slot_types.first().map(String::as_str)
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            AppError::validation(format!(
                "source {}: utc_offset_minutes {} out of range",
                self.id, self.utc_offset_minutes
            ))
        })
    }

    /// Convert an instant to institution-local time.
    pub fn local(&self, at: DateTime<Utc>) -> Result<DateTime<FixedOffset>> {
        Ok(at.with_timezone(&self.offset()?))
    }

    pub fn arm_at(&self) -> Result<NaiveTime> {
        parse_time(&self.arm_time)
    }

    /// Parsed period table.
    pub fn period_table(&self) -> Result<Vec<(NaiveTime, NaiveTime)>> {
        self.periods.iter().map(PeriodConfig::bounds).collect()
    }

    /// Validate fields that are checked once at startup.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::validation("source id is empty"));
        }
        Url::parse(&self.base_url).map_err(|e| {
            AppError::validation(format!("source {}: invalid base_url: {e}", self.id))
        })?;
        check_cron(&self.id, "probe_cron", &self.probe_cron)?;
        check_cron(&self.id, "sync_cron", &self.sync_cron)?;
        self.arm_at()?;
        self.offset()?;
        if self.periods.is_empty() {
            return Err(AppError::validation(format!(
                "source {}: no periods defined",
                self.id
            )));
        }
        self.period_table()?;
        self.layout.validate()
    }
}

/// Parse a cron expression the way the scheduler will, without scheduling it.
fn check_cron(id: &str, field: &str, expr: &str) -> Result<()> {
    if expr.trim().is_empty() {
        return Err(AppError::validation(format!("source {id}: {field} is empty")));
    }
    Job::new_async(expr, |_uuid, _l| Box::pin(async {}))
        .map(drop)
        .map_err(|e| AppError::validation(format!("source {id}: invalid {field} '{expr}': {e:?}")))
}

/// Institution-local wall-clock time on `date`, as a UTC instant.
pub fn local_instant(offset: FixedOffset, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

mod defaults {
    use super::PeriodConfig;

    pub fn enabled() -> bool {
        true
    }
    pub fn target_template() -> String {
        "{target}".into()
    }
    pub fn probe_cron() -> String {
        "0 */5 * * * *".into()
    }
    pub fn sync_cron() -> String {
        "0 */30 * * * *".into()
    }
    pub fn arm_time() -> String {
        "06:00".into()
    }
    pub fn periods() -> Vec<PeriodConfig> {
        vec![
            PeriodConfig::new("08:30", "10:00"),
            PeriodConfig::new("10:10", "11:40"),
            PeriodConfig::new("12:10", "13:40"),
            PeriodConfig::new("13:50", "15:20"),
            PeriodConfig::new("15:30", "17:00"),
            PeriodConfig::new("17:10", "18:40"),
            PeriodConfig::new("18:50", "20:20"),
        ]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_source() -> SourceConfig {
        toml::from_str(
            r#"
            id = "college"
            name = "Test College"
            base_url = "https://schedule.example.edu/timetable/"
            slots_path = "groups"
            target_template = "?group={target}"
            utc_offset_minutes = 180
            control_secret = "hunter2"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_fill_in() {
        let source = sample_source();
        assert!(source.enabled);
        assert_eq!(source.periods.len(), 7);
        assert_eq!(source.arm_at().unwrap(), NaiveTime::from_hms_opt(6, 0, 0).unwrap());
        assert!(source.validate().is_ok());
    }

    #[test]
    fn test_target_url_resolves_relative_path() {
        let source = sample_source();
        assert_eq!(
            source.target_url("IS-21").unwrap().as_str(),
            "https://schedule.example.edu/timetable/?group=IS-21"
        );
        assert_eq!(
            source.slots_url().unwrap().as_str(),
            "https://schedule.example.edu/timetable/groups"
        );
    }

    #[test]
    fn test_target_is_percent_encoded() {
        let source = sample_source();
        assert_eq!(
            source.target_url("R&D 1#a?").unwrap().as_str(),
            "https://schedule.example.edu/timetable/?group=R%26D%201%23a%3F"
        );
    }

    #[test]
    fn test_validate_rejects_malformed_cron() {
        let mut source = sample_source();
        source.probe_cron = "every five minutes".into();
        assert!(matches!(source.validate(), Err(AppError::Validation(_))));

        let mut source = sample_source();
        source.sync_cron = "0 0 */2 * * *".into();
        assert!(source.validate().is_ok());

        source.sync_cron = " ".into();
        assert!(source.validate().is_err());
    }

    #[test]
    fn test_probe_target_falls_back_to_first_slot() {
        let mut source = sample_source();
        let slots = vec!["IS-21".to_string(), "PH-11".to_string()];
        assert_eq!(source.resolve_probe_target(&slots), Some("IS-21"));
        assert_eq!(source.resolve_probe_target(&[]), None);

        source.probe_target = "PH-11".into();
        assert_eq!(source.resolve_probe_target(&[]), Some("PH-11"));
    }

    #[test]
    fn test_period_must_end_after_start() {
        assert!(PeriodConfig::new("10:00", "09:00").bounds().is_err());
        assert!(PeriodConfig::new("9:00", "x").bounds().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_arm_time() {
        let mut source = sample_source();
        source.arm_time = "25:99".into();
        assert!(source.validate().is_err());
    }

    #[test]
    fn test_week_start_is_monday() {
        let sunday = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(week_start(sunday), NaiveDate::from_ymd_opt(2026, 10, 12).unwrap());
        let monday = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        assert_eq!(week_start(monday), monday);
    }
}
