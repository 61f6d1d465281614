//! State diff for probe ticks.
//!
//! A probe only needs to know whether anything changed, not what. Locating
//! the change is left to the full sync that follows.

use crate::models::{SlotState, StateMatrix};

/// Whether two state matrices describe the same remote state.
///
/// Both matrices come from the same scraper against the same source, so
/// they are compared positionally. A length mismatch is a change.
pub fn states_equal(previous: &StateMatrix, next: &StateMatrix) -> bool {
    previous.len() == next.len()
        && previous
            .entries()
            .iter()
            .zip(next.entries())
            .all(|(a, b)| slot_equal(a, b))
}

fn slot_equal(a: &SlotState, b: &SlotState) -> bool {
    a.week_index == b.week_index && a.day_index == b.day_index && a.status == b.status
}
