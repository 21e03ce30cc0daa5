//! Commands into and events out of the simulation tick.
//!
//! Controllers (the reflex executor for the bot, an [`OpponentController`]
//! for the adversary) express what they want as [`Command`]s. Resolvers turn
//! commands into state changes and report what happened as [`Event`]s.
//!
//! [`OpponentController`]: crate::opponent::OpponentController
//!
//! # Example
//!
//! ```
//! use riposte_core::output::{Command, CommandKind};
//! use riposte_core::entity::Side;
//! use glam::Vec2;
//!
//! let cmd = Command::Fire { side: Side::Bot, aim: Vec2::new(100.0, 40.0) };
//! assert_eq!(cmd.kind(), CommandKind::Fire);
//! assert_eq!(cmd.side(), Side::Bot);
//! ```

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, Side};

// =============================================================================
// Commands
// =============================================================================

/// A request from a controller for the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Move in `direction`. The length is clamped to 1 and scaled by the
    /// actor's speed.
    SetMovement {
        /// Actor to move.
        side: Side,
        /// Desired direction, length at most 1.
        direction: Vec2,
    },
    /// Fire toward `aim` if the weapon is ready.
    Fire {
        /// Actor firing.
        side: Side,
        /// World point to aim at.
        aim: Vec2,
    },
}

impl Command {
    /// Returns the routing category of this command.
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::SetMovement { .. } => CommandKind::Movement,
            Self::Fire { .. } => CommandKind::Fire,
        }
    }

    /// Returns the actor this command applies to.
    #[must_use]
    pub fn side(&self) -> Side {
        match self {
            Self::SetMovement { side, .. } | Self::Fire { side, .. } => *side,
        }
    }
}

/// Routing category used to dispatch commands to resolvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// [`Command::SetMovement`].
    Movement,
    /// [`Command::Fire`].
    Fire,
}

// =============================================================================
// Events
// =============================================================================

/// Why a projectile left play without hitting anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    /// Reached its maximum age.
    Lifetime,
    /// Struck an interior wall.
    Wall,
    /// Left the arena.
    OutOfBounds,
}

/// Something that happened during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// A projectile was spawned.
    ProjectileFired {
        /// New projectile.
        projectile: EntityId,
        /// Side that fired.
        owner: Side,
        /// Spawn position.
        origin: Vec2,
        /// Initial velocity.
        velocity: Vec2,
    },
    /// A projectile struck an actor.
    Hit {
        /// Projectile that hit.
        projectile: EntityId,
        /// Side that fired it.
        owner: Side,
        /// Actor that was struck.
        target: Side,
        /// Damage applied.
        damage: f32,
    },
    /// A projectile was removed without hitting anyone.
    ProjectileExpired {
        /// Removed projectile.
        projectile: EntityId,
        /// Side that fired it.
        owner: Side,
        /// Why it was removed.
        reason: ExpiryReason,
    },
    /// At least one actor reached zero health.
    RoundOver {
        /// Surviving side, or `None` when both fell on the same tick.
        winner: Option<Side>,
    },
}
