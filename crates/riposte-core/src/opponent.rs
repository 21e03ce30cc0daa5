//! Scripted adversaries.
//!
//! The opponent stands in for the external human player. An
//! [`OpponentController`] reads the arena each simulation tick and returns
//! commands for [`Side::Opponent`]; the simulation task merges them with the
//! bot's reflex commands.
//!
//! [`ScriptedOpponent`] plays one of three [`OpponentStyle`]s with seeded
//! randomness, which is enough to exercise the adaptation store's style
//! classification.
//!
//! # Example
//!
//! ```
//! use riposte_core::arena::Arena;
//! use riposte_core::config::{ArenaConfig, SimulationConfig};
//! use riposte_core::opponent::{OpponentController, OpponentStyle, ScriptedOpponent};
//!
//! let arena = Arena::new(&ArenaConfig::default(), &SimulationConfig::default());
//! let mut opponent = ScriptedOpponent::new(OpponentStyle::Rush, 7);
//! let commands = opponent.control(&arena, 1.0 / 60.0);
//! assert!(!commands.is_empty());
//! ```

use std::fmt;
use std::str::FromStr;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::arena::Arena;
use crate::entity::Side;
use crate::error::ConfigError;
use crate::output::Command;

/// Produces the opponent's commands for one simulation tick.
pub trait OpponentController: Send {
    /// Commands for the next tick.
    fn control(&mut self, arena: &Arena, dt: f32) -> Vec<Command>;

    /// Called when a new round starts.
    fn reset(&mut self) {}
}

/// Behaviour of a [`ScriptedOpponent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpponentStyle {
    /// Circle at mid range, reversing often, sidestepping incoming fire.
    #[default]
    Strafe,
    /// Charge straight in.
    Rush,
    /// Hang back and snipe.
    Camp,
}

impl fmt::Display for OpponentStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strafe => write!(f, "strafe"),
            Self::Rush => write!(f, "rush"),
            Self::Camp => write!(f, "camp"),
        }
    }
}

impl FromStr for OpponentStyle {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strafe" => Ok(Self::Strafe),
            "rush" => Ok(Self::Rush),
            "camp" => Ok(Self::Camp),
            other => Err(ConfigError::invalid(
                "opponent",
                format!("unknown style `{other}` (expected strafe, rush or camp)"),
            )),
        }
    }
}

/// Seeded scripted opponent.
#[derive(Debug, Clone)]
pub struct ScriptedOpponent {
    style: OpponentStyle,
    seed: u64,
    rng: ChaCha8Rng,
    orbit: f32,
    flip_in: f32,
}

impl ScriptedOpponent {
    /// Creates an opponent.
    #[must_use]
    pub fn new(style: OpponentStyle, seed: u64) -> Self {
        Self {
            style,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            orbit: 1.0,
            flip_in: 0.0,
        }
    }

    /// The style being played.
    #[must_use]
    pub fn style(&self) -> OpponentStyle {
        self.style
    }

    fn preferred_distance(&self) -> f32 {
        match self.style {
            OpponentStyle::Strafe => 260.0,
            OpponentStyle::Rush => 60.0,
            OpponentStyle::Camp => 420.0,
        }
    }

    fn flip_interval(&mut self) -> f32 {
        match self.style {
            OpponentStyle::Strafe => self.rng.gen_range(0.3..0.7),
            OpponentStyle::Rush => self.rng.gen_range(1.5..3.0),
            OpponentStyle::Camp => self.rng.gen_range(2.5..4.0),
        }
    }

    /// Sidestep for the nearest incoming bot projectile, if any.
    fn sidestep(arena: &Arena, me: Vec2) -> Option<Vec2> {
        arena
            .projectiles_sorted()
            .filter(|p| p.owner == Side::Bot)
            .filter(|p| p.position().distance(me) < 150.0 && p.velocity().dot(me - p.position()) > 0.0)
            .min_by(|a, b| a.position().distance(me).total_cmp(&b.position().distance(me)))
            .map(|p| {
                let perp = p.velocity().normalize_or_zero().perp();
                if perp.dot(me - p.position()) >= 0.0 {
                    perp
                } else {
                    -perp
                }
            })
    }
}

impl OpponentController for ScriptedOpponent {
    fn control(&mut self, arena: &Arena, dt: f32) -> Vec<Command> {
        let me = arena.actor(Side::Opponent);
        let bot = arena.actor(Side::Bot);
        if me.combat.is_destroyed() {
            return vec![Command::SetMovement {
                side: Side::Opponent,
                direction: Vec2::ZERO,
            }];
        }

        self.flip_in -= dt;
        if self.flip_in <= 0.0 {
            self.orbit = -self.orbit;
            self.flip_in = self.flip_interval();
        }

        let offset = bot.position() - me.position();
        let distance = offset.length();
        let toward = offset.normalize_or_zero();
        let range_error = (distance - self.preferred_distance()) / 100.0;
        let radial = toward * range_error.clamp(-1.0, 1.0);
        let tangential = toward.perp() * self.orbit;

        let direction = match self.style {
            OpponentStyle::Strafe => Self::sidestep(arena, me.position()).unwrap_or(radial * 0.6 + tangential),
            OpponentStyle::Rush => toward + tangential * 0.25,
            OpponentStyle::Camp => radial + tangential * 0.3,
        }
        .clamp_length_max(1.0);

        let mut commands = vec![Command::SetMovement {
            side: Side::Opponent,
            direction,
        }];

        if me.combat.is_ready() && !bot.combat.is_destroyed() && self.rng.gen_bool(0.6) {
            let spread = Vec2::new(self.rng.gen_range(-20.0..20.0), self.rng.gen_range(-20.0..20.0));
            commands.push(Command::Fire {
                side: Side::Opponent,
                aim: bot.position() + spread,
            });
        }
        commands
    }

    fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(self.rng.gen::<u64>()));
        self.orbit = 1.0;
        self.flip_in = 0.0;
    }
}
