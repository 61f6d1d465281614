//! Layout adapter.
//!
//! The remote page carries no explicit keys: week, day and period are
//! inferred from where a cell sits in the table structure. All of that
//! positional reasoning lives here, so a markup change only touches this
//! module and the `LayoutConfig` that drives it.

use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::models::{LayoutConfig, parse_selector};
use crate::services::Classifier;

/// Number of alternating weeks the remote rotates through.
pub const WEEK_ROTATION: usize = 2;

/// One day row of a week table, with typed grid indices.
#[derive(Debug, Clone)]
pub struct DayRow<'a> {
    /// Position of the week table on the page
    pub week_ordinal: usize,
    /// `week_ordinal mod WEEK_ROTATION`
    pub week_index: usize,
    pub day_index: usize,
    /// Whether the leading cells carry the updated marker
    pub updated: bool,
    /// Period cells; the position in this vector is the period index
    pub periods: Vec<ElementRef<'a>>,
}

/// Selectors compiled once per source.
#[derive(Debug, Clone)]
pub struct CompiledLayout {
    week_table: Selector,
    row: Selector,
    cell: Selector,
    pub(crate) lesson_block: Selector,
    pub(crate) subject: Selector,
    pub(crate) teacher: Selector,
    pub(crate) group: Selector,
    pub(crate) room: Selector,
    slot_option: Selector,
    slot_attr: String,
    header_rows: usize,
    leading_cells: usize,
    updated_class: String,
    pub(crate) classifier: Classifier,
}

impl CompiledLayout {
    pub fn compile(layout: &LayoutConfig) -> Result<Self> {
        Ok(Self {
            week_table: parse_selector(&layout.week_table)?,
            row: parse_selector(&layout.row)?,
            cell: parse_selector(&layout.cell)?,
            lesson_block: parse_selector(&layout.lesson_block)?,
            subject: parse_selector(&layout.subject)?,
            teacher: parse_selector(&layout.teacher)?,
            group: parse_selector(&layout.group)?,
            room: parse_selector(&layout.room)?,
            slot_option: parse_selector(&layout.slot_option)?,
            slot_attr: layout.slot_attr.clone(),
            header_rows: layout.header_rows,
            leading_cells: layout.leading_cells,
            updated_class: layout.updated_class.clone(),
            classifier: Classifier::new(layout.classes.clone()),
        })
    }

    /// Number of week tables on the page.
    pub fn week_count(&self, document: &Html) -> usize {
        document.select(&self.week_table).count()
    }

    /// Walk every week table and return its day rows in page order.
    pub fn day_rows<'a>(&self, document: &'a Html) -> Vec<DayRow<'a>> {
        let mut rows = Vec::new();

        for (week_ordinal, table) in document.select(&self.week_table).enumerate() {
            let day_rows = table.select(&self.row).skip(self.header_rows);

            for (day_index, row) in day_rows.enumerate() {
                let cells: Vec<ElementRef<'a>> = row.select(&self.cell).collect();
                let leading = cells.len().min(self.leading_cells);

                let updated = cells[..leading].iter().any(|cell| {
                    cell.value()
                        .classes()
                        .any(|c| c.eq_ignore_ascii_case(&self.updated_class))
                });

                rows.push(DayRow {
                    week_ordinal,
                    week_index: week_ordinal % WEEK_ROTATION,
                    day_index,
                    updated,
                    periods: cells[leading..].to_vec(),
                });
            }
        }

        rows
    }

    /// Slot identifiers listed on the slot page, deduplicated in page order.
    pub fn slot_ids(&self, document: &Html) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for option in document.select(&self.slot_option) {
            let Some(value) = option.value().attr(&self.slot_attr) else {
                continue;
            };
            let value = value.trim();
            if !value.is_empty() && !ids.iter().any(|id| id == value) {
                ids.push(value.to_string());
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <table class="week">
          <tr><th>Day</th><th>1</th><th>2</th></tr>
          <tr><td class="day">Mon</td><td>a</td><td>b</td></tr>
          <tr><td class="day updated">Tue</td><td>c</td><td>d</td></tr>
        </table>
        <table class="week">
          <tr><th>Day</th><th>1</th><th>2</th></tr>
          <tr><td class="day">Mon</td><td>e</td><td>f</td></tr>
        </table>
        <table class="week">
          <tr><th>Day</th><th>1</th><th>2</th></tr>
          <tr><td class="day UPDATED">Mon</td><td>g</td><td>h</td></tr>
        </table>
        </body></html>
    "#;

    fn layout() -> CompiledLayout {
        CompiledLayout::compile(&LayoutConfig::default()).unwrap()
    }

    #[test]
    fn test_day_rows_indices() {
        let document = Html::parse_document(PAGE);
        let rows = layout().day_rows(&document);

        let indices: Vec<_> = rows
            .iter()
            .map(|r| (r.week_ordinal, r.week_index, r.day_index, r.updated))
            .collect();
        assert_eq!(
            indices,
            vec![
                (0, 0, 0, false),
                (0, 0, 1, true),
                (1, 1, 0, false),
                (2, 0, 0, true),
            ]
        );
    }

    #[test]
    fn test_period_cells_skip_leading() {
        let document = Html::parse_document(PAGE);
        let rows = layout().day_rows(&document);

        let texts: Vec<String> = rows[1]
            .periods
            .iter()
            .map(|c| c.text().collect())
            .collect();
        assert_eq!(texts, vec!["c", "d"]);
    }

    #[test]
    fn test_missing_tables_yield_no_rows() {
        let document = Html::parse_document("<html><body><p>maintenance</p></body></html>");
        assert!(layout().day_rows(&document).is_empty());
        assert_eq!(layout().week_count(&document), 0);
    }

    #[test]
    fn test_slot_ids_dedup_and_skip_empty() {
        let document = Html::parse_document(
            r#"<select id="group">
                 <option value="">--</option>
                 <option value="IS-21">IS-21</option>
                 <option value=" PH-11 ">PH-11</option>
                 <option value="IS-21">IS-21</option>
               </select>"#,
        );
        assert_eq!(layout().slot_ids(&document), vec!["IS-21", "PH-11"]);
    }
}
