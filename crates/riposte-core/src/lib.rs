//! # Riposte Core
//!
//! Synchronization core for a real-time agent that splits slow strategic
//! reasoning from fast reflexive execution.
//!
//! A fixed-rate simulation emits immutable snapshots; a predictor
//! extrapolates them by the expected decision latency; a bounded pipeline
//! sends them to a slow external strategy source; replies are validated and
//! adjudicated by `tick_id` into a single current-intent cell; and a
//! high-rate reflex executor turns that intent into smoothed,
//! guardrail-constrained control signals without ever waiting.
//!
//! ## Architecture
//!
//! - **Simulation**: [`simulation`], [`arena`], [`resolver`], [`snapshot`]
//! - **Planning**: [`predictor`], [`planner`], [`intent`]
//! - **Execution**: [`reflex`]
//! - **Memory**: [`adaptation`]
//! - **Wiring**: [`runtime`], [`opponent`], [`metrics`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use riposte_core::runtime::{Engine, RunLimits};
//!
//! let engine = Engine::new(config, oracle, opponent)?;
//! let report = engine.run(RunLimits { max_rounds: Some(5), ..Default::default() }).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod adaptation;
pub mod arena;
pub mod config;
pub mod entity;
pub mod error;
pub mod intent;
pub mod metrics;
pub mod opponent;
pub mod output;
pub mod planner;
pub mod predictor;
pub mod reflex;
pub mod resolver;
pub mod runtime;
pub mod simulation;
pub mod snapshot;

#[cfg(test)]
mod tests;
