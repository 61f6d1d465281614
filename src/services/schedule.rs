// src/services/schedule.rs

//! Schedule scraper service.
//!
//! Fetches schedule pages for a source and turns the week tables into
//! lesson occurrences, slot state matrices, and slot-type listings.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime};
use reqwest::Client;
use scraper::Html;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{
    LessonOccurrence, LessonTag, SlotState, SlotStatus, SourceConfig, StateMatrix, local_instant,
    week_start,
};
use crate::services::layout::{CompiledLayout, DayRow};
use crate::utils::{http::fetch_page_async, select_text};

/// The three scrape operations a source exposes.
#[async_trait]
pub trait ScheduleScraper: Send + Sync {
    /// Lesson occurrences for one scrape target, with the first week
    /// table taken as the week containing `today` (institution-local).
    async fn scrape_schedule(
        &self,
        target: &str,
        today: NaiveDate,
    ) -> Result<Vec<LessonOccurrence>>;

    /// Per-(week, day) update markers for one scrape target.
    async fn scrape_slot_states(&self, target: &str) -> Result<StateMatrix>;

    /// Slot types (e.g. groups) that can be used as scrape targets.
    async fn scrape_available_slots(&self) -> Result<Vec<String>>;
}

/// Scraper driven by a source's `LayoutConfig`.
pub struct HtmlScheduleScraper {
    source: Arc<SourceConfig>,
    layout: CompiledLayout,
    periods: Vec<(NaiveTime, NaiveTime)>,
    offset: FixedOffset,
    client: Client,
}

impl HtmlScheduleScraper {
    /// Create a scraper for a source, compiling its layout up front.
    pub fn new(source: Arc<SourceConfig>, client: Client) -> Result<Self> {
        let layout = CompiledLayout::compile(&source.layout)?;
        let periods = source.period_table()?;
        let offset = source.offset()?;
        Ok(Self {
            source,
            layout,
            periods,
            offset,
            client,
        })
    }

    async fn fetch(&self, url: Url) -> Result<String> {
        log::debug!("[{}] fetching {}", self.source.id, url);
        fetch_page_async(&self.client, url.as_str())
            .await
            .map_err(|e| AppError::scrape(url.as_str(), e))
    }

    /// Parse lesson occurrences out of a schedule page.
    ///
    /// `today` anchors the first week table: it is assumed to be the week
    /// containing `today`, and each further table the week after.
    pub fn parse_schedule(
        &self,
        html: &str,
        target: &str,
        today: NaiveDate,
    ) -> Result<Vec<LessonOccurrence>> {
        let document = Html::parse_document(html);
        self.ensure_shape(&document, target)?;

        let anchor = week_start(today);
        let mut occurrences = Vec::new();

        for row in self.layout.day_rows(&document) {
            let date = anchor
                + Duration::days((row.week_ordinal * 7 + row.day_index) as i64);

            for (slot_index, cell) in row.periods.iter().enumerate() {
                for block in cell.select(&self.layout.lesson_block) {
                    if let Some(occurrence) =
                        self.parse_block(&row, &block, slot_index, date, target)
                    {
                        occurrences.push(occurrence);
                    }
                }
            }
        }

        Ok(occurrences)
    }

    fn parse_block(
        &self,
        row: &DayRow<'_>,
        block: &scraper::ElementRef,
        slot_index: usize,
        date: NaiveDate,
        target: &str,
    ) -> Option<LessonOccurrence> {
        let teacher = select_text(block, &self.layout.teacher);
        if teacher.is_empty() {
            return None;
        }

        let tag = self.layout.classifier.classify(block);
        // Removed markup on a day the remote did not mark as updated is stale.
        if tag == LessonTag::Removed && !row.updated {
            return None;
        }

        let Some(&(start, end)) = self.periods.get(slot_index) else {
            log::debug!(
                "[{}] period {} has no configured time, skipping block",
                self.source.id,
                slot_index
            );
            return None;
        };

        let group = match select_text(block, &self.layout.group) {
            g if g.is_empty() => target.to_string(),
            g => g,
        };

        Some(LessonOccurrence {
            source: self.source.id.clone(),
            subject: select_text(block, &self.layout.subject),
            teacher,
            group,
            room: select_text(block, &self.layout.room),
            tag,
            week_index: row.week_index,
            day_index: row.day_index,
            slot_index,
            starts_at: local_instant(self.offset, date, start)?,
            ends_at: local_instant(self.offset, date, end)?,
        })
    }

    /// Parse the state matrix out of a schedule page.
    pub fn parse_slot_states(&self, html: &str, target: &str) -> Result<StateMatrix> {
        let document = Html::parse_document(html);
        self.ensure_shape(&document, target)?;

        let states = self
            .layout
            .day_rows(&document)
            .iter()
            .map(|row| {
                let status = if row.updated {
                    SlotStatus::Updated
                } else {
                    SlotStatus::NotUpdated
                };
                SlotState::new(row.week_index, row.day_index, status)
            })
            .collect::<Vec<_>>();

        Ok(StateMatrix::new(states))
    }

    /// Parse the slot listing page.
    pub fn parse_available_slots(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        self.layout.slot_ids(&document)
    }

    fn ensure_shape(&self, document: &Html, target: &str) -> Result<()> {
        if self.layout.week_count(document) == 0 {
            return Err(AppError::scrape(
                target,
                format!("no elements match '{}'", self.source.layout.week_table),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ScheduleScraper for HtmlScheduleScraper {
    async fn scrape_schedule(
        &self,
        target: &str,
        today: NaiveDate,
    ) -> Result<Vec<LessonOccurrence>> {
        let html = self.fetch(self.source.target_url(target)?).await?;
        self.parse_schedule(&html, target, today)
    }

    async fn scrape_slot_states(&self, target: &str) -> Result<StateMatrix> {
        let html = self.fetch(self.source.target_url(target)?).await?;
        self.parse_slot_states(&html, target)
    }

    async fn scrape_available_slots(&self) -> Result<Vec<String>> {
        let html = self.fetch(self.source.slots_url()?).await?;
        Ok(self.parse_available_slots(&html))
    }
}
