//! Strategy sources.
//!
//! A [`StrategySource`] answers a [`StrategyRequest`] with free reply text,
//! possibly after a long time, possibly never. The pipeline owns deadlines;
//! sources only do the talking.
//!
//! [`ScriptedOracle`] is a deterministic stand-in for a slow reasoning model:
//! a fixed combat heuristic behind seeded latency jitter, with optional
//! silence and garbled replies so the rest of the core can be exercised
//! against realistic faults.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::adaptation::{AdaptationProfile, Style};
use crate::error::OracleError;
use crate::intent::{Goal, RawIntent};
use crate::predictor::FutureSnapshot;
use crate::snapshot::TickId;

/// One outbound strategy request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRequest {
    /// Tick the reply must echo.
    pub tick_id: TickId,
    /// Extrapolated world state.
    pub snapshot: FutureSnapshot,
    /// Opponent profile at issuance.
    pub adaptation_features: AdaptationProfile,
    /// Most recent reasoning note from earlier replies.
    pub style_note: Option<String>,
}

/// An external decision source.
#[async_trait]
pub trait StrategySource: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Produces reply text for `request`.
    ///
    /// # Errors
    ///
    /// Returns an [`OracleError`] on transport failure.
    async fn decide(&self, request: &StrategyRequest) -> Result<String, OracleError>;
}

// =============================================================================
// ScriptedOracle
// =============================================================================

/// Tuning for [`ScriptedOracle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptedOracleConfig {
    /// RNG seed.
    pub seed: u64,
    /// Shortest simulated think time.
    pub min_latency_ms: u64,
    /// Longest simulated think time.
    pub max_latency_ms: u64,
    /// Chance of never replying.
    pub silence_probability: f64,
    /// Chance of a malformed reply.
    pub garble_probability: f64,
    /// Preferred distance to the opponent.
    pub engage_distance: f32,
}

impl Default for ScriptedOracleConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            min_latency_ms: 250,
            max_latency_ms: 900,
            silence_probability: 0.0,
            garble_probability: 0.0,
            engage_distance: 250.0,
        }
    }
}

enum Fault {
    None,
    Silence,
    Garble(u32),
}

/// Seeded heuristic strategy source.
#[derive(Debug)]
pub struct ScriptedOracle {
    config: ScriptedOracleConfig,
    rng: Mutex<ChaCha8Rng>,
}

impl ScriptedOracle {
    /// Creates an oracle.
    #[must_use]
    pub fn new(config: ScriptedOracleConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    fn draw(&self) -> (Duration, Fault) {
        let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let lo = self.config.min_latency_ms.min(self.config.max_latency_ms);
        let hi = self.config.max_latency_ms.max(lo);
        let latency = Duration::from_millis(rng.gen_range(lo..=hi));
        let roll: f64 = rng.gen();
        let fault = if roll < self.config.silence_probability {
            Fault::Silence
        } else if roll < self.config.silence_probability + self.config.garble_probability {
            Fault::Garble(rng.gen_range(0..3))
        } else {
            Fault::None
        };
        (latency, fault)
    }

    /// The heuristic: dodge first, hold engagement distance, strafe, shoot.
    #[must_use]
    pub fn plan(&self, request: &StrategyRequest) -> (RawIntent, String) {
        let snap = &request.snapshot;
        let me = snap.actor.position;
        let to_enemy = snap.opponent.position - me;
        let distance = to_enemy.length();
        let toward = to_enemy.normalize_or_zero();

        let (mut direction, note) = if let Some(threat) = snap
            .threats
            .iter()
            .find(|t| t.distance < 120.0 && t.velocity.dot(me - t.position) > 0.0)
        {
            let travel = threat.velocity.normalize_or_zero();
            let perp = travel.perp();
            let side = if perp.dot(me - threat.position) >= 0.0 { perp } else { -perp };
            (side, format!("projectile {} inbound, sidestep", threat.id))
        } else {
            let engage = match request.adaptation_features.style {
                Style::Camper => self.config.engage_distance * 0.7,
                Style::Rusher => self.config.engage_distance * 1.3,
                _ => self.config.engage_distance,
            };
            if distance > engage {
                (toward, format!("enemy at {distance:.0}px, closing the gap"))
            } else if distance < engage * 0.6 {
                (-toward, format!("enemy too close at {distance:.0}px, backing off"))
            } else {
                let flip = if (request.tick_id.as_u64() / 60) % 2 == 0 { 1.0 } else { -1.0 };
                (toward.perp() * flip, format!("holding {distance:.0}px, strafing"))
            }
        };

        let walls = &snap.obstacles;
        if walls.north < 50.0 && direction.y < 0.0 {
            direction.y = 0.3;
        }
        if walls.south < 50.0 && direction.y > 0.0 {
            direction.y = -0.3;
        }
        if walls.west < 50.0 && direction.x < 0.0 {
            direction.x = 0.3;
        }
        if walls.east < 50.0 && direction.x > 0.0 {
            direction.x = -0.3;
        }
        let direction = direction.clamp_length_max(1.0);

        let intent = RawIntent {
            dx: Some(f64::from(direction.x.clamp(-1.0, 1.0))),
            dy: Some(f64::from(direction.y.clamp(-1.0, 1.0))),
            shoot: Some(true),
            shoot_probability: None,
            aggression: Some(if snap.opponent.hp < snap.actor.hp { 1.0 } else { 0.8 }),
            goal: Some(Goal::Engage),
            tick_id: Some(request.tick_id.as_u64()),
        };
        (intent, note)
    }

    fn garble(kind: u32, request: &StrategyRequest) -> String {
        match kind {
            0 => "I cannot decide right now.".to_string(),
            1 => format!(
                "{{\"dx\": 3.5, \"dy\": 0.0, \"shoot\": true, \"tick_id\": {}}}",
                request.tick_id
            ),
            _ => "{\"dx\": 0.4, \"dy\": -0.2, \"shoot\": true}".to_string(),
        }
    }
}

#[async_trait]
impl StrategySource for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn decide(&self, request: &StrategyRequest) -> Result<String, OracleError> {
        let (latency, fault) = self.draw();
        tokio::time::sleep(latency).await;
        match fault {
            Fault::Silence => std::future::pending().await,
            Fault::Garble(kind) => Ok(Self::garble(kind, request)),
            Fault::None => {
                let (intent, note) = self.plan(request);
                let json = serde_json::to_string(&intent)?;
                Ok(format!("<thinking>{note}</thinking>\n{json}"))
            }
        }
    }
}
