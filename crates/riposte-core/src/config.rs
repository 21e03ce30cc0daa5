//! Engine configuration.
//!
//! [`EngineConfig`] groups one section per component. Every section has
//! defaults taken from the reference arena, so a JSON file only needs to name
//! the fields it overrides:
//!
//! ```
//! use riposte_core::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "planner": { "max_in_flight": 2 } }"#).unwrap();
//! assert_eq!(config.planner.max_in_flight, 2);
//! assert_eq!(config.simulation.tick_hz, 60);
//! ```

use std::path::Path;
use std::time::Duration;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::arena::WallRect;
use crate::error::ConfigError;

/// Top-level configuration for the whole core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Arena geometry.
    pub arena: ArenaConfig,
    /// Simulation tick and combat tuning.
    pub simulation: SimulationConfig,
    /// Latency estimation for the predictor.
    pub predictor: PredictorConfig,
    /// Planner pipeline concurrency.
    pub planner: PlannerConfig,
    /// Reflex executor tuning.
    pub reflex: ReflexConfig,
    /// Adaptation store tuning.
    pub adaptation: AdaptationConfig,
}

impl EngineConfig {
    /// Parses a JSON document and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] when a value fails validation.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise
    /// the same errors as [`EngineConfig::from_json_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Checks cross-field and range constraints.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Invalid`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.arena.validate()?;
        self.simulation.validate()?;
        self.predictor.validate()?;
        self.planner.validate()?;
        self.reflex.validate()?;
        self.adaptation.validate()
    }
}

fn require_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be > 0, got {value}")))
    }
}

fn require_non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be >= 0, got {value}")))
    }
}

fn require_unit(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be in [0, 1], got {value}")))
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Arena dimensions, interior walls and spawn points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Arena width in pixels.
    pub width: f32,
    /// Arena height in pixels.
    pub height: f32,
    /// Interior wall rectangles.
    pub walls: Vec<WallRect>,
    /// Collision radius of both actors.
    pub actor_radius: f32,
    /// Collision radius of projectiles.
    pub projectile_radius: f32,
    /// Spawn point of the bot.
    pub bot_spawn: Vec2,
    /// Spawn point of the opponent.
    pub opponent_spawn: Vec2,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        let walls = [
            (160.0, 80.0, 80.0, 140.0),
            (350.0, 120.0, 100.0, 50.0),
            (560.0, 80.0, 80.0, 140.0),
            (120.0, 300.0, 140.0, 50.0),
            (540.0, 300.0, 140.0, 50.0),
            (300.0, 250.0, 200.0, 50.0),
            (160.0, 400.0, 80.0, 140.0),
            (560.0, 400.0, 80.0, 140.0),
            (340.0, 430.0, 120.0, 50.0),
        ]
        .into_iter()
        .map(|(x, y, w, h)| WallRect::new(x, y, w, h))
        .collect();

        Self {
            width: 800.0,
            height: 600.0,
            walls,
            actor_radius: 16.0,
            projectile_radius: 5.0,
            bot_spawn: Vec2::new(650.0, 380.0),
            opponent_spawn: Vec2::new(150.0, 380.0),
        }
    }
}

impl ArenaConfig {
    /// An arena with no interior walls, for tests and benchmarks.
    #[must_use]
    pub fn open(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            walls: Vec::new(),
            bot_spawn: Vec2::new(width * 0.75, height * 0.5),
            opponent_spawn: Vec2::new(width * 0.25, height * 0.5),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("arena.width", self.width)?;
        require_positive("arena.height", self.height)?;
        require_positive("arena.actor_radius", self.actor_radius)?;
        require_positive("arena.projectile_radius", self.projectile_radius)?;
        for spawn in [self.bot_spawn, self.opponent_spawn] {
            if !(0.0..=self.width).contains(&spawn.x) || !(0.0..=self.height).contains(&spawn.y) {
                return Err(ConfigError::invalid(
                    "arena.spawn",
                    format!("spawn point {spawn} lies outside the arena"),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Simulation
// =============================================================================

/// Fixed-rate simulation and combat tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulation ticks per second.
    pub tick_hz: u32,
    /// Starting and maximum hit points of each actor.
    pub max_hp: f32,
    /// Damage dealt per projectile hit.
    pub damage: f32,
    /// Projectile speed in pixels per second.
    pub projectile_speed: f32,
    /// Projectile lifetime in seconds.
    pub projectile_lifetime_s: f32,
    /// Bot movement speed in pixels per second.
    pub bot_speed: f32,
    /// Opponent movement speed in pixels per second.
    pub opponent_speed: f32,
    /// Seconds between bot shots.
    pub bot_cooldown_s: f32,
    /// Seconds between opponent shots.
    pub opponent_cooldown_s: f32,
    /// Number of threats kept in each snapshot (K).
    pub threat_count: usize,
    /// Only projectiles within this distance of the bot are threats.
    pub threat_range: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60,
            max_hp: 100.0,
            damage: 10.0,
            projectile_speed: 420.0,
            projectile_lifetime_s: 2.5,
            bot_speed: 230.0,
            opponent_speed: 200.0,
            bot_cooldown_s: 0.14,
            opponent_cooldown_s: 0.22,
            threat_count: 5,
            threat_range: 300.0,
        }
    }
}

impl SimulationConfig {
    /// Seconds per simulation tick.
    #[must_use]
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_hz.max(1) as f32
    }

    /// Wall-clock period of the simulation tick.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.max(1)))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_hz == 0 {
            return Err(ConfigError::invalid("simulation.tick_hz", "must be > 0"));
        }
        if self.threat_count == 0 {
            return Err(ConfigError::invalid("simulation.threat_count", "must be > 0"));
        }
        require_positive("simulation.max_hp", self.max_hp)?;
        require_non_negative("simulation.damage", self.damage)?;
        require_positive("simulation.projectile_speed", self.projectile_speed)?;
        require_positive("simulation.projectile_lifetime_s", self.projectile_lifetime_s)?;
        require_non_negative("simulation.bot_speed", self.bot_speed)?;
        require_non_negative("simulation.opponent_speed", self.opponent_speed)?;
        require_non_negative("simulation.bot_cooldown_s", self.bot_cooldown_s)?;
        require_non_negative("simulation.opponent_cooldown_s", self.opponent_cooldown_s)?;
        require_positive("simulation.threat_range", self.threat_range)
    }
}

// =============================================================================
// Predictor
// =============================================================================

/// How the predictor obtains its latency estimate Δt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LatencyConfig {
    /// A static Δt.
    Fixed {
        /// Δt in seconds.
        seconds: f32,
    },
    /// An exponentially-weighted running average of observed round trips.
    Adaptive {
        /// Estimate used before the first observation.
        initial_s: f32,
        /// Weight of each new observation in (0, 1].
        alpha: f32,
        /// Lower clamp of the estimate.
        min_s: f32,
        /// Upper clamp of the estimate.
        max_s: f32,
    },
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self::Adaptive {
            initial_s: 0.35,
            alpha: 0.2,
            min_s: 0.0,
            max_s: 3.0,
        }
    }
}

/// Predictor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Latency estimation strategy.
    pub latency: LatencyConfig,
}

impl PredictorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.latency {
            LatencyConfig::Fixed { seconds } => require_non_negative("predictor.latency.seconds", seconds),
            LatencyConfig::Adaptive {
                initial_s,
                alpha,
                min_s,
                max_s,
            } => {
                require_non_negative("predictor.latency.initial_s", initial_s)?;
                require_non_negative("predictor.latency.min_s", min_s)?;
                require_non_negative("predictor.latency.max_s", max_s)?;
                if !(alpha > 0.0 && alpha <= 1.0) {
                    return Err(ConfigError::invalid(
                        "predictor.latency.alpha",
                        format!("must be in (0, 1], got {alpha}"),
                    ));
                }
                if min_s > max_s {
                    return Err(ConfigError::invalid(
                        "predictor.latency.min_s",
                        format!("min_s {min_s} exceeds max_s {max_s}"),
                    ));
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// Planner
// =============================================================================

/// Planner pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Maximum concurrently outstanding strategy requests (`K_max`).
    pub max_in_flight: usize,
    /// Per-request deadline in milliseconds.
    pub request_timeout_ms: u64,
    /// Minimum spacing between issuances in milliseconds (0 = issue on every
    /// fresh snapshot while a slot is free).
    pub min_issue_interval_ms: u64,
    /// Number of strategy notes retained for the next requests.
    pub style_memory: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 3,
            request_timeout_ms: 2_000,
            min_issue_interval_ms: 0,
            style_memory: 10,
        }
    }
}

impl PlannerConfig {
    /// Per-request deadline.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Minimum spacing between issuances.
    #[must_use]
    pub fn min_issue_interval(&self) -> Duration {
        Duration::from_millis(self.min_issue_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_in_flight == 0 {
            return Err(ConfigError::invalid("planner.max_in_flight", "must be > 0"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::invalid("planner.request_timeout_ms", "must be > 0"));
        }
        Ok(())
    }
}

// =============================================================================
// Reflex
// =============================================================================

/// Reflex executor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflexConfig {
    /// Reflex ticks per second.
    pub tick_hz: u32,
    /// Largest change of the movement vector per reflex tick.
    pub max_delta_per_tick: f32,
    /// Only threats whose closest approach is at most this far ahead trigger a dodge.
    pub dodge_horizon_s: f32,
    /// Miss distance below which a threat counts as a hit course.
    pub collision_margin: f32,
    /// Distance from a wall at which movement toward it is zeroed.
    pub wall_buffer: f32,
    /// How far ahead a dodge direction is probed for walls.
    pub probe_distance: f32,
    /// `shoot_probability` at or above which the intent fires.
    pub fire_probability_threshold: f32,
    /// Lead time applied to the opponent position when aiming.
    pub aim_lead_s: f32,
}

impl Default for ReflexConfig {
    fn default() -> Self {
        Self {
            tick_hz: 100,
            max_delta_per_tick: 0.15,
            dodge_horizon_s: 0.6,
            collision_margin: 29.0,
            wall_buffer: 38.0,
            probe_distance: 30.0,
            fire_probability_threshold: 0.5,
            aim_lead_s: 0.35,
        }
    }
}

impl ReflexConfig {
    /// Wall-clock period of the reflex tick.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.max(1)))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_hz == 0 {
            return Err(ConfigError::invalid("reflex.tick_hz", "must be > 0"));
        }
        require_positive("reflex.max_delta_per_tick", self.max_delta_per_tick)?;
        require_positive("reflex.dodge_horizon_s", self.dodge_horizon_s)?;
        require_positive("reflex.collision_margin", self.collision_margin)?;
        require_non_negative("reflex.wall_buffer", self.wall_buffer)?;
        require_non_negative("reflex.probe_distance", self.probe_distance)?;
        require_unit("reflex.fire_probability_threshold", self.fire_probability_threshold)?;
        require_non_negative("reflex.aim_lead_s", self.aim_lead_s)
    }
}

// =============================================================================
// Adaptation
// =============================================================================

/// Adaptation store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationConfig {
    /// EWMA weight of the newest round.
    pub alpha: f32,
    /// Engagement distance under which the opponent is a rusher.
    pub rush_distance: f32,
    /// Engagement distance over which a slow-moving opponent is a camper.
    pub camp_distance: f32,
    /// Direction changes per second at which the opponent is a strafer.
    pub strafe_rate: f32,
    /// A bot projectile this close to the opponent puts it under pressure.
    pub pressure_radius: f32,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            rush_distance: 180.0,
            camp_distance: 350.0,
            strafe_rate: 1.5,
            pressure_radius: 200.0,
        }
    }
}

impl AdaptationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(ConfigError::invalid(
                "adaptation.alpha",
                format!("must be in (0, 1], got {}", self.alpha),
            ));
        }
        require_positive("adaptation.rush_distance", self.rush_distance)?;
        require_positive("adaptation.camp_distance", self.camp_distance)?;
        if self.rush_distance >= self.camp_distance {
            return Err(ConfigError::invalid(
                "adaptation.rush_distance",
                "must be smaller than camp_distance",
            ));
        }
        require_positive("adaptation.strafe_rate", self.strafe_rate)?;
        require_positive("adaptation.pressure_radius", self.pressure_radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "reflex": { "tick_hz": 50 }, "predictor": { "latency": { "mode": "fixed", "seconds": 0.25 } } }"#,
        )
        .unwrap();
        assert_eq!(config.reflex.tick_hz, 50);
        assert_eq!(config.reflex.max_delta_per_tick, 0.15);
        assert_eq!(config.predictor.latency, LatencyConfig::Fixed { seconds: 0.25 });
        assert_eq!(config.arena.walls.len(), 9);
    }

    #[test]
    fn zero_max_in_flight_is_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "planner": { "max_in_flight": 0 } }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "planner.max_in_flight",
                ..
            }
        ));
    }

    #[test]
    fn negative_latency_is_rejected() {
        let err = EngineConfig::from_json_str(
            r#"{ "predictor": { "latency": { "mode": "fixed", "seconds": -0.1 } } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("predictor.latency.seconds"));
    }

    #[test]
    fn spawn_outside_arena_is_rejected() {
        let mut config = EngineConfig::default();
        config.arena.bot_spawn = Vec2::new(900.0, 10.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "simulation": { "tick_hz": 30 } }"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.simulation.tick_hz, 30);
    }

    #[test]
    fn load_missing_file_reports_path() {
        let err = EngineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn intervals_follow_rates() {
        let config = EngineConfig::default();
        assert_eq!(config.reflex.tick_interval(), Duration::from_millis(10));
        assert_eq!(config.planner.request_timeout(), Duration::from_secs(2));
        assert!((config.simulation.dt() - 1.0 / 60.0).abs() < 1e-9);
    }
}
