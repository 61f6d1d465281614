// src/models/layout.rs

//! CSS selectors and class rules describing a schedule page.

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::LessonTag;

/// Maps a CSS class on a lesson block to a tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassRule {
    pub class: String,
    pub tag: LessonTag,
}

impl ClassRule {
    pub fn new(class: impl Into<String>, tag: LessonTag) -> Self {
        Self {
            class: class.into(),
            tag,
        }
    }
}

/// Positional description of the week tables on a schedule page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Selector for each week table
    #[serde(default = "defaults::week_table")]
    pub week_table: String,

    /// Selector for rows inside a week table
    #[serde(default = "defaults::row")]
    pub row: String,

    /// Selector for cells inside a row
    #[serde(default = "defaults::cell")]
    pub cell: String,

    /// Rows to skip at the top of each week table
    #[serde(default = "defaults::header_rows")]
    pub header_rows: usize,

    /// Cells to skip at the start of each row (day label cells)
    #[serde(default = "defaults::leading_cells")]
    pub leading_cells: usize,

    /// Class on a leading cell marking the day as updated
    #[serde(default = "defaults::updated_class")]
    pub updated_class: String,

    /// Selector for a lesson block inside a period cell
    #[serde(default = "defaults::lesson_block")]
    pub lesson_block: String,

    #[serde(default = "defaults::subject")]
    pub subject: String,

    #[serde(default = "defaults::teacher")]
    pub teacher: String,

    #[serde(default = "defaults::group")]
    pub group: String,

    #[serde(default = "defaults::room")]
    pub room: String,

    /// Selector for entries on the slot listing page
    #[serde(default = "defaults::slot_option")]
    pub slot_option: String,

    /// Attribute holding the slot id on each entry
    #[serde(default = "defaults::slot_attr")]
    pub slot_attr: String,

    /// Class name to tag table; the first matching rule wins
    #[serde(default = "defaults::classes")]
    pub classes: Vec<ClassRule>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            week_table: defaults::week_table(),
            row: defaults::row(),
            cell: defaults::cell(),
            header_rows: defaults::header_rows(),
            leading_cells: defaults::leading_cells(),
            updated_class: defaults::updated_class(),
            lesson_block: defaults::lesson_block(),
            subject: defaults::subject(),
            teacher: defaults::teacher(),
            group: defaults::group(),
            room: defaults::room(),
            slot_option: defaults::slot_option(),
            slot_attr: defaults::slot_attr(),
            classes: defaults::classes(),
        }
    }
}

impl LayoutConfig {
    /// Check that every selector parses.
    pub fn validate(&self) -> Result<()> {
        for selector in [
            &self.week_table,
            &self.row,
            &self.cell,
            &self.lesson_block,
            &self.subject,
            &self.teacher,
            &self.group,
            &self.room,
            &self.slot_option,
        ] {
            parse_selector(selector)?;
        }
        if self.slot_attr.trim().is_empty() {
            return Err(AppError::validation("layout.slot_attr is empty"));
        }
        if self.classes.iter().any(|r| r.class.trim().is_empty()) {
            return Err(AppError::validation("layout.classes contains an empty class"));
        }
        Ok(())
    }
}

/// Parse a CSS selector, mapping failures to `AppError::Selector`.
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

mod defaults {
    use super::ClassRule;
    use crate::models::LessonTag;

    pub fn week_table() -> String {
        "table.week".into()
    }
    pub fn row() -> String {
        "tr".into()
    }
    pub fn cell() -> String {
        "td".into()
    }
    pub fn header_rows() -> usize {
        1
    }
    pub fn leading_cells() -> usize {
        1
    }
    pub fn updated_class() -> String {
        "updated".into()
    }
    pub fn lesson_block() -> String {
        "div.lesson".into()
    }
    pub fn subject() -> String {
        ".subject".into()
    }
    pub fn teacher() -> String {
        ".teacher".into()
    }
    pub fn group() -> String {
        ".group".into()
    }
    pub fn room() -> String {
        ".room".into()
    }
    pub fn slot_option() -> String {
        "select#group option".into()
    }
    pub fn slot_attr() -> String {
        "value".into()
    }
    pub fn classes() -> Vec<ClassRule> {
        vec![
            ClassRule::new("added", LessonTag::Added),
            ClassRule::new("removed", LessonTag::Removed),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_valid() {
        assert!(LayoutConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let layout = LayoutConfig {
            lesson_block: "[[invalid".into(),
            ..LayoutConfig::default()
        };
        assert!(matches!(
            layout.validate(),
            Err(AppError::Selector { .. })
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let layout: LayoutConfig = toml::from_str("week_table = \"table.schedule\"").unwrap();
        assert_eq!(layout.week_table, "table.schedule");
        assert_eq!(layout.header_rows, 1);
        assert_eq!(layout.classes.len(), 2);
    }
}
