//! Crate-level scenario tests.
//!
//! - `determinism.rs`: identical inputs give bit-identical state and predictions
//! - `integration.rs`: ordering, concurrency, timeout and guardrail scenarios
//!   across several components, plus short end-to-end runs
//! - `helpers.rs`: shared builders and a scheduled strategy source, re-exported
//!   for unit tests elsewhere in the crate

mod helpers;

pub use helpers::*;
