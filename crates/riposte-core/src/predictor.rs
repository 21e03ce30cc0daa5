//! Latency-compensating predictor.
//!
//! The predictor turns a [`StateSnapshot`] into a [`FutureSnapshot`] by
//! linear dead reckoning over an estimated end-to-end latency Δt:
//!
//! ```text
//! position_future = position_now + velocity_now × Δt
//! ```
//!
//! Velocities, health and cooldowns are carried through unchanged, threats
//! are re-ranked against the extrapolated actor position, and obstacle
//! proximity is carried from the source snapshot.
//!
//! Where Δt comes from is a [`LatencyEstimator`]: either a fixed value or an
//! EWMA over observed round trips, chosen by [`LatencyConfig`].
//!
//! # Example
//!
//! ```
//! use riposte_core::predictor::extrapolate;
//! use glam::Vec2;
//!
//! let p = extrapolate(Vec2::new(10.0, 0.0), Vec2::new(1.0, 0.0), 0.25);
//! assert_eq!(p, Vec2::new(10.25, 0.0));
//! ```

use std::fmt;
use std::time::Duration;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::adaptation::AdaptationProfile;
use crate::config::{LatencyConfig, SimulationConfig};
use crate::snapshot::{select_threats, ActorView, ObstacleProximity, StateSnapshot, Threat, TickId};

// =============================================================================
// Latency estimation
// =============================================================================

/// Source of the latency estimate Δt.
pub trait LatencyEstimator: Send + Sync + fmt::Debug {
    /// Current estimate in seconds, always ≥ 0.
    fn estimate(&self) -> f32;

    /// Feeds an observed request round trip.
    fn observe(&mut self, round_trip: Duration);
}

/// A static Δt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedLatency {
    seconds: f32,
}

impl FixedLatency {
    /// Creates a fixed estimator. Negative or non-finite values become 0.
    #[must_use]
    pub fn new(seconds: f32) -> Self {
        Self {
            seconds: sanitize(seconds),
        }
    }
}

impl LatencyEstimator for FixedLatency {
    fn estimate(&self) -> f32 {
        self.seconds
    }

    fn observe(&mut self, _round_trip: Duration) {}
}

/// Exponentially-weighted running average of observed round trips.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EwmaLatency {
    estimate: f32,
    alpha: f32,
    min: f32,
    max: f32,
}

impl EwmaLatency {
    /// Creates an estimator seeded with `initial` seconds.
    #[must_use]
    pub fn new(initial: f32, alpha: f32, min: f32, max: f32) -> Self {
        Self {
            estimate: sanitize(initial).clamp(min, max.max(min)),
            alpha: alpha.clamp(f32::EPSILON, 1.0),
            min,
            max: max.max(min),
        }
    }
}

impl LatencyEstimator for EwmaLatency {
    fn estimate(&self) -> f32 {
        self.estimate
    }

    fn observe(&mut self, round_trip: Duration) {
        let sample = round_trip.as_secs_f32();
        self.estimate = (self.estimate + self.alpha * (sample - self.estimate)).clamp(self.min, self.max);
    }
}

/// Builds the estimator selected by config.
#[must_use]
pub fn estimator_from_config(config: &LatencyConfig) -> Box<dyn LatencyEstimator> {
    match *config {
        LatencyConfig::Fixed { seconds } => Box::new(FixedLatency::new(seconds)),
        LatencyConfig::Adaptive {
            initial_s,
            alpha,
            min_s,
            max_s,
        } => Box::new(EwmaLatency::new(initial_s, alpha, min_s, max_s)),
    }
}

fn sanitize(seconds: f32) -> f32 {
    if seconds.is_finite() {
        seconds.max(0.0)
    } else {
        0.0
    }
}

// =============================================================================
// Prediction
// =============================================================================

/// Linear dead reckoning of one position.
#[must_use]
pub fn extrapolate(position: Vec2, velocity: Vec2, dt: f32) -> Vec2 {
    position + velocity * dt
}

/// Extrapolated state at the expected execution time of a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureSnapshot {
    /// Tick of the source snapshot.
    pub tick_id: TickId,
    /// Simulated time of the source snapshot.
    pub time_s: f64,
    /// Δt used for the extrapolation.
    pub latency_s: f32,
    /// Extrapolated agent.
    pub actor: ActorView,
    /// Extrapolated adversary.
    pub opponent: ActorView,
    /// Extrapolated threats, re-ranked against the extrapolated agent.
    pub threats: Vec<Threat>,
    /// Wall distances from the source snapshot.
    pub obstacles: ObstacleProximity,
    /// Opponent profile at issuance.
    pub adaptation: AdaptationProfile,
}

/// Pure dead-reckoning predictor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Predictor {
    threat_count: usize,
    threat_range: f32,
}

impl Predictor {
    /// Creates a predictor ranking threats like the simulation does.
    #[must_use]
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            threat_count: config.threat_count,
            threat_range: config.threat_range,
        }
    }

    /// Extrapolates `snapshot` by `dt` seconds.
    ///
    /// Negative or non-finite `dt` is treated as 0.
    #[must_use]
    pub fn predict(&self, snapshot: &StateSnapshot, dt: f32, adaptation: &AdaptationProfile) -> FutureSnapshot {
        let dt = sanitize(dt);
        let actor = advance(&snapshot.actor, dt);
        let opponent = advance(&snapshot.opponent, dt);
        let threats = select_threats(
            actor.position,
            snapshot
                .threats
                .iter()
                .map(|t| (t.id, extrapolate(t.position, t.velocity, dt), t.velocity)),
            self.threat_count,
            self.threat_range,
        );

        FutureSnapshot {
            tick_id: snapshot.tick_id,
            time_s: snapshot.time_s,
            latency_s: dt,
            actor,
            opponent,
            threats,
            obstacles: snapshot.obstacles,
            adaptation: adaptation.clone(),
        }
    }

    /// Opponent position led by `lead_s`, used for aiming.
    #[must_use]
    pub fn predicted_opponent(snapshot: &StateSnapshot, lead_s: f32) -> Vec2 {
        extrapolate(snapshot.opponent.position, snapshot.opponent.velocity, sanitize(lead_s))
    }
}

fn advance(view: &ActorView, dt: f32) -> ActorView {
    ActorView {
        position: extrapolate(view.position, view.velocity, dt),
        ..*view
    }
}
