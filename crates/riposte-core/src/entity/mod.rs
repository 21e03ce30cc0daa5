//! Entity types for the duel arena.
//!
//! The arena holds exactly two actors, one per [`Side`], plus any number of
//! in-flight projectiles. Projectiles are identified by [`EntityId`]s handed
//! out in spawn order; that order is also the tie-break used when ranking
//! threats at equal distance.
//!
//! # Example
//!
//! ```
//! use riposte_core::entity::{EntityId, Side};
//!
//! let first = EntityId::new(1);
//! let second = EntityId::new(2);
//! assert!(first < second);
//! assert_eq!(Side::Bot.opposite(), Side::Opponent);
//! ```

pub mod components;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use components::{Actor, CombatState, PhysicsState, Projectile, TransformState};

/// Unique, spawn-ordered identifier for a projectile.
///
/// `EntityId` is a newtype wrapper around `u64`. Ids are assigned from a
/// monotonically increasing counter owned by the arena and are never reused,
/// so a lower id always means an earlier spawn.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new `EntityId` from a raw `u64` value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` value of this identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

/// Which actor an entity belongs to.
///
/// `Bot` is the agent driven by the planner and reflex executor.
/// `Opponent` is driven by an external controller (a human, or a script
/// standing in for one).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The controlled agent.
    Bot,
    /// The adversary.
    Opponent,
}

impl Side {
    /// Returns the other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Bot => Self::Opponent,
            Self::Opponent => Self::Bot,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bot => write!(f, "bot"),
            Self::Opponent => write!(f, "opponent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod entity_id_tests {
        use super::*;

        #[test]
        fn ordering_follows_spawn_order() {
            let mut ids = vec![EntityId::new(5), EntityId::new(1), EntityId::new(3)];
            ids.sort();
            assert_eq!(ids, vec![EntityId::new(1), EntityId::new(3), EntityId::new(5)]);
        }

        #[test]
        fn debug_and_display() {
            let id = EntityId::new(42);
            assert_eq!(format!("{id:?}"), "EntityId(42)");
            assert_eq!(format!("{id}"), "42");
        }

        #[test]
        fn serializes_as_plain_number() {
            let json = serde_json::to_string(&EntityId::new(7)).unwrap();
            assert_eq!(json, "7");
        }
    }

    mod side_tests {
        use super::*;

        #[test]
        fn opposite_is_involution() {
            assert_eq!(Side::Bot.opposite().opposite(), Side::Bot);
            assert_eq!(Side::Opponent.opposite(), Side::Bot);
        }

        #[test]
        fn serde_uses_snake_case() {
            assert_eq!(serde_json::to_string(&Side::Opponent).unwrap(), "\"opponent\"");
        }
    }
}
