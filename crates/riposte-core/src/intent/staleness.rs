//! The staleness rule.
//!
//! A candidate replaces the held intent if and only if its `tick_id` is
//! strictly greater. The comparison is kept free of any state or locking so
//! that it can be tested against arbitrary arrival orders on its own.

use crate::snapshot::TickId;

/// Outcome of comparing a candidate against the held intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The candidate is newer and replaces the held intent.
    Accept,
    /// The candidate is not newer and is discarded.
    Stale,
}

/// Adjudicates `candidate` against the currently `held` tick.
#[must_use]
pub fn adjudicate(held: TickId, candidate: TickId) -> Verdict {
    if candidate > held {
        Verdict::Accept
    } else {
        Verdict::Stale
    }
}
