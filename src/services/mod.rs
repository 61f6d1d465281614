//! Service layer for the synchronizer.
//!
//! This module contains the business logic for:
//! - Layout walking (`CompiledLayout`)
//! - Lesson block classification (`Classifier`)
//! - Schedule scraping (`ScheduleScraper`, `HtmlScheduleScraper`)
//! - Change notification (`Notifier`, `ChangeNotifier`)

mod classify;
pub mod layout;
pub mod notifier;
mod schedule;

pub use classify::Classifier;
pub use layout::CompiledLayout;
pub use notifier::{ChangeNotifier, LogNotifier, Notification, Notifier, WebhookNotifier, build_notifier};
pub use schedule::{HtmlScheduleScraper, ScheduleScraper};

#[cfg(test)]
pub(crate) use notifier::tests::RecordingNotifier;
