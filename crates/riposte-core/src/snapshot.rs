//! Immutable per-tick views of the world.
//!
//! A [`StateSnapshot`] is captured from the arena once per simulation tick,
//! from the bot's perspective, and then never mutated. It is shared as an
//! `Arc<StateSnapshot>` with every downstream consumer.
//!
//! # Threat ranking
//!
//! [`select_threats`] keeps opposing projectiles within range, sorted by
//! ascending distance with ties broken by the lower (earlier) entity id, and
//! truncates to the configured K. The predictor reuses the same ranking on
//! extrapolated positions.
//!
//! # Example
//!
//! ```
//! use riposte_core::snapshot::TickId;
//!
//! let tick = TickId::new(100);
//! assert_eq!(tick.next(), TickId::new(101));
//! assert!(TickId::GENESIS < tick);
//! ```

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::arena::Arena;
use crate::config::SimulationConfig;
use crate::entity::{Actor, EntityId, Side};

pub use crate::arena::ObstacleProximity;

// =============================================================================
// TickId
// =============================================================================

/// Monotonically increasing simulation instant.
///
/// Tick 0 ([`TickId::GENESIS`]) is the state before the first step; the
/// first produced snapshot is tick 1. The safe-default intent carries tick 0
/// so that any real response supersedes it.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickId(u64);

impl TickId {
    /// The instant before the first simulation step.
    pub const GENESIS: Self = Self(0);

    /// Creates a tick id from a raw value.
    #[must_use]
    pub const fn new(tick: u64) -> Self {
        Self(tick)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Ticks elapsed from `earlier` to `self`, zero if `earlier` is later.
    #[must_use]
    pub const fn since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Debug for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TickId({})", self.0)
    }
}

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TickId {
    fn from(tick: u64) -> Self {
        Self(tick)
    }
}

// =============================================================================
// Views
// =============================================================================

/// Kinematic and combat view of one actor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActorView {
    /// Position.
    pub position: Vec2,
    /// Velocity.
    pub velocity: Vec2,
    /// Current hit points.
    pub hp: f32,
    /// Seconds until the weapon is ready.
    pub cooldown_remaining: f32,
    /// Collision radius.
    pub radius: f32,
}

impl From<&Actor> for ActorView {
    fn from(actor: &Actor) -> Self {
        Self {
            position: actor.position(),
            velocity: actor.velocity(),
            hp: actor.combat.hp,
            cooldown_remaining: actor.combat.cooldown_remaining,
            radius: actor.radius,
        }
    }
}

/// An opposing projectile ranked by proximity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threat {
    /// Projectile id (spawn order).
    pub id: EntityId,
    /// Position.
    pub position: Vec2,
    /// Velocity.
    pub velocity: Vec2,
    /// Distance to the actor at capture time.
    pub distance: f32,
}

/// Ranks candidate projectiles against `origin`.
///
/// Keeps candidates within `range`, sorts by ascending distance then by
/// lower id, and returns at most `k`.
pub fn select_threats<I>(origin: Vec2, candidates: I, k: usize, range: f32) -> Vec<Threat>
where
    I: IntoIterator<Item = (EntityId, Vec2, Vec2)>,
{
    let mut threats: Vec<Threat> = candidates
        .into_iter()
        .map(|(id, position, velocity)| Threat {
            id,
            position,
            velocity,
            distance: origin.distance(position),
        })
        .filter(|t| t.distance <= range)
        .collect();
    threats.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
    threats.truncate(k);
    threats
}

// =============================================================================
// StateSnapshot
// =============================================================================

/// Ground-truth world state at one tick, from the bot's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Tick this snapshot was produced by.
    pub tick_id: TickId,
    /// Simulated seconds since session start.
    pub time_s: f64,
    /// The controlled agent.
    pub actor: ActorView,
    /// The adversary.
    pub opponent: ActorView,
    /// Up to K nearest opposing projectiles.
    pub threats: Vec<Threat>,
    /// Wall distances around the actor.
    pub obstacles: ObstacleProximity,
}

impl StateSnapshot {
    /// Captures the current arena.
    #[must_use]
    pub fn capture(arena: &Arena, config: &SimulationConfig) -> Self {
        let actor = arena.actor(Side::Bot);
        let origin = actor.position();
        let candidates = arena
            .projectiles_sorted()
            .filter(|p| p.owner == Side::Opponent)
            .map(|p| (p.id, p.position(), p.velocity()));

        Self {
            tick_id: TickId::new(arena.current_tick()),
            time_s: arena.time(),
            actor: ActorView::from(actor),
            opponent: ActorView::from(arena.actor(Side::Opponent)),
            threats: select_threats(origin, candidates, config.threat_count, config.threat_range),
            obstacles: arena.geometry().proximity(origin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;

    mod tick_id_tests {
        use super::*;

        #[test]
        fn ordering_and_next() {
            assert!(TickId::new(3) < TickId::new(5));
            assert_eq!(TickId::GENESIS.next(), TickId::new(1));
            assert_eq!(TickId::new(10).since(TickId::new(4)), 6);
            assert_eq!(TickId::new(4).since(TickId::new(10)), 0);
        }

        #[test]
        fn formats() {
            assert_eq!(format!("{:?}", TickId::new(9)), "TickId(9)");
            assert_eq!(TickId::new(9).to_string(), "9");
            assert_eq!(serde_json::to_string(&TickId::new(9)).unwrap(), "9");
        }
    }

    mod threat_tests {
        use super::*;

        fn candidate(id: u64, x: f32) -> (EntityId, Vec2, Vec2) {
            (EntityId::new(id), Vec2::new(x, 0.0), Vec2::ZERO)
        }

        #[test]
        fn sorted_by_distance_then_id() {
            let threats = select_threats(
                Vec2::ZERO,
                vec![candidate(4, 50.0), candidate(2, 10.0), candidate(3, -50.0), candidate(1, 30.0)],
                10,
                300.0,
            );
            let ids: Vec<u64> = threats.iter().map(|t| t.id.as_u64()).collect();
            assert_eq!(ids, vec![2, 1, 3, 4]);
        }

        #[test]
        fn truncated_to_k_and_range() {
            let threats = select_threats(
                Vec2::ZERO,
                (1..=10).map(|i| candidate(i, i as f32 * 40.0)),
                5,
                300.0,
            );
            assert_eq!(threats.len(), 5);
            let far = select_threats(Vec2::ZERO, vec![candidate(1, 301.0)], 5, 300.0);
            assert!(far.is_empty());
        }
    }

    mod capture_tests {
        use super::*;

        #[test]
        fn capture_ignores_own_projectiles() {
            let sim = SimulationConfig::default();
            let mut arena = Arena::new(&ArenaConfig::open(800.0, 600.0), &sim);
            let bot = arena.actor(Side::Bot).position();
            arena.spawn_projectile(Side::Bot, bot + Vec2::new(20.0, 0.0), Vec2::X, 2.5);
            let theirs = arena.spawn_projectile(Side::Opponent, bot + Vec2::new(60.0, 0.0), Vec2::X, 2.5);

            let snapshot = StateSnapshot::capture(&arena, &sim);
            assert_eq!(snapshot.threats.len(), 1);
            assert_eq!(snapshot.threats[0].id, theirs);
            assert_eq!(snapshot.tick_id, TickId::GENESIS);
            assert_eq!(snapshot.actor.hp, 100.0);
            assert_eq!(snapshot.obstacles.east, 800.0 - bot.x);
        }
    }
}
