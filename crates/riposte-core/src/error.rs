//! Error types for the synchronization core.
//!
//! Each concern gets its own enum so that failures stay on their side of the
//! async boundary:
//!
//! - [`SimulationError`]: fatal invariant violations in the tick loop
//! - [`IntentError`]: malformed packets rejected at the ingestion boundary
//! - [`OracleError`]: transport failures talking to a strategy source
//! - [`ConfigError`]: invalid configuration
//! - [`EngineError`]: runtime failures surfaced by [`Engine::run`](crate::runtime::Engine::run)
//!
//! Only `SimulationError` is allowed to stop the simulation. Planning-path
//! errors are counted and logged by the intent resolver, never propagated.

use std::path::PathBuf;

use thiserror::Error;

use crate::entity::Side;
use crate::snapshot::TickId;

/// Fatal invariant violation detected while producing a tick.
///
/// When returned from [`Simulation::step`](crate::simulation::Simulation::step)
/// the tick has been aborted and the previous valid state is retained.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// An actor ended the tick with a NaN or infinite position or velocity.
    #[error("tick {tick}: {side} has non-finite kinematics (pos={position:?}, vel={velocity:?})")]
    NonFiniteActor {
        /// Tick that was being produced.
        tick: TickId,
        /// Offending actor.
        side: Side,
        /// Position at the end of the tick.
        position: [f32; 2],
        /// Velocity at the end of the tick.
        velocity: [f32; 2],
    },
    /// A projectile ended the tick with a NaN or infinite position or velocity.
    #[error("tick {tick}: projectile {id} has non-finite kinematics")]
    NonFiniteProjectile {
        /// Tick that was being produced.
        tick: TickId,
        /// Projectile entity id.
        id: u64,
    },
    /// An actor ended the tick with negative health.
    #[error("tick {tick}: {side} has negative health {hp}")]
    NegativeHealth {
        /// Tick that was being produced.
        tick: TickId,
        /// Offending actor.
        side: Side,
        /// Health value observed.
        hp: f32,
    },
}

/// Reasons an incoming intent packet is rejected as malformed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntentError {
    /// The payload carried no `tick_id`.
    #[error("intent packet is missing tick_id")]
    MissingTickId,
    /// The echoed `tick_id` does not match the request it answers.
    #[error("intent packet echoes tick_id {got}, expected {expected}")]
    TickMismatch {
        /// The tick of the outstanding request.
        expected: TickId,
        /// The tick echoed by the packet.
        got: u64,
    },
    /// A numeric field is NaN/infinite or outside its allowed range.
    #[error("intent field `{field}` = {value} is outside [{min}, {max}]")]
    OutOfRange {
        /// Field name as it appears on the wire.
        field: &'static str,
        /// Received value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// None of `dx`, `dy`, `shoot`, `shoot_probability` were present.
    #[error("intent packet carries no directive fields")]
    Empty,
    /// The reply text did not contain a decodable directive object.
    #[error("could not decode intent from reply: {0}")]
    Undecodable(String),
}

/// Transport-level failure of a strategy source request.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The external process could not be started.
    #[error("failed to spawn strategy command `{command}`: {source}")]
    Spawn {
        /// Command line that failed.
        command: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// IO failure while exchanging data with the strategy source.
    #[error("strategy source IO failure: {0}")]
    Io(#[from] std::io::Error),
    /// The external process exited unsuccessfully.
    #[error("strategy command exited with status {status}")]
    ExitStatus {
        /// Exit status as reported by the OS.
        status: String,
    },
    /// The request could not be encoded.
    #[error("failed to encode strategy request: {0}")]
    Encode(#[from] serde_json::Error),
    /// The strategy source answered with nothing.
    #[error("strategy source returned an empty reply")]
    EmptyReply,
}

/// Invalid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field failed validation.
    #[error("invalid config `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
    /// JSON could not be decoded.
    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure of the runtime as a whole.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The simulation hit a fatal invariant violation and halted.
    #[error("simulation halted: {0}")]
    Simulation(#[from] SimulationError),
    /// The configuration was rejected before start.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A runtime task panicked or was cancelled unexpectedly.
    #[error("runtime task `{task}` failed: {reason}")]
    Task {
        /// Task name.
        task: &'static str,
        /// Join error description.
        reason: String,
    },
}
