//! Lesson block classification.
//!
//! Maps the CSS classes on a lesson block to a `LessonTag` using the
//! configured rule table.

use scraper::ElementRef;

use crate::models::{ClassRule, LessonTag};

/// Table-driven classifier for lesson blocks.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassRule>,
}

impl Classifier {
    pub fn new(rules: Vec<ClassRule>) -> Self {
        Self { rules }
    }

    /// Tag for a set of class names. The first rule, in table order, that
    /// matches any class wins; no match means `Stay`.
    pub fn classify_classes<'a>(&self, classes: impl IntoIterator<Item = &'a str>) -> LessonTag {
        let classes: Vec<&str> = classes.into_iter().collect();
        self.rules
            .iter()
            .find(|rule| {
                classes
                    .iter()
                    .any(|class| class.eq_ignore_ascii_case(&rule.class))
            })
            .map_or(LessonTag::Stay, |rule| rule.tag)
    }

    /// Tag for a lesson block element.
    pub fn classify(&self, block: &ElementRef) -> LessonTag {
        self.classify_classes(block.value().classes())
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(crate::models::LayoutConfig::default().classes)
    }
}
