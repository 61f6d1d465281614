//! Utility functions and helpers.

pub mod http;

use scraper::{ElementRef, Selector};

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized text of the first element under `parent` matching `selector`.
///
/// Missing elements yield an empty string.
pub fn select_text(parent: &ElementRef, selector: &Selector) -> String {
    parent
        .select(selector)
        .next()
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  Linear \n\t Algebra "), "Linear Algebra");
        assert_eq!(normalize_whitespace("   "), "");
    }

    #[test]
    fn test_select_text() {
        let html = Html::parse_fragment(
            r#"<div><span class="teacher"> Petrova
                 A. V. </span></div>"#,
        );
        let root = html.root_element();
        let teacher = Selector::parse(".teacher").unwrap();
        let room = Selector::parse(".room").unwrap();

        assert_eq!(select_text(&root, &teacher), "Petrova A. V.");
        assert_eq!(select_text(&root, &room), "");
    }
}
