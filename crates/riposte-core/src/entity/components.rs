//! State components for actors and projectiles.
//!
//! Components are plain data. All mutation happens inside the resolvers
//! during a simulation tick; everything handed outward is a copy.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::{EntityId, Side};

/// Position in arena space (pixels, +x right, +y down).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformState {
    /// World position.
    pub position: Vec2,
}

impl TransformState {
    /// Creates a transform at the given position.
    #[must_use]
    pub const fn new(position: Vec2) -> Self {
        Self { position }
    }
}

/// Linear velocity in pixels per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicsState {
    /// Current velocity.
    pub velocity: Vec2,
}

/// Health and weapon state of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatState {
    /// Current hit points, never negative.
    pub hp: f32,
    /// Maximum hit points.
    pub max_hp: f32,
    /// Seconds until the weapon may fire again (0 when ready).
    pub cooldown_remaining: f32,
    /// Cooldown applied after each shot.
    pub cooldown: f32,
}

impl CombatState {
    /// Creates a full-health combat state with a ready weapon.
    #[must_use]
    pub const fn new(max_hp: f32, cooldown: f32) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            cooldown_remaining: 0.0,
            cooldown,
        }
    }

    /// Returns true if the weapon cooldown has elapsed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.cooldown_remaining <= 0.0
    }

    /// Returns true if this actor is out of hit points.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.hp <= 0.0
    }
}

/// One of the two duelling actors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    /// Which side this actor plays.
    pub side: Side,
    /// Position.
    pub transform: TransformState,
    /// Velocity.
    pub physics: PhysicsState,
    /// Health and weapon.
    pub combat: CombatState,
    /// Collision radius.
    pub radius: f32,
    /// Top movement speed in pixels per second.
    pub speed: f32,
}

impl Actor {
    /// Creates an actor at rest at `position`.
    #[must_use]
    pub fn new(side: Side, position: Vec2, combat: CombatState, radius: f32, speed: f32) -> Self {
        Self {
            side,
            transform: TransformState::new(position),
            physics: PhysicsState::default(),
            combat,
            radius,
            speed,
        }
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.transform.position
    }

    /// Current velocity.
    #[must_use]
    pub fn velocity(&self) -> Vec2 {
        self.physics.velocity
    }
}

/// A projectile in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Spawn-ordered id.
    pub id: EntityId,
    /// Side that fired it.
    pub owner: Side,
    /// Position.
    pub transform: TransformState,
    /// Velocity.
    pub physics: PhysicsState,
    /// Seconds since spawn.
    pub age: f32,
    /// Lifetime in seconds.
    pub max_age: f32,
}

impl Projectile {
    /// Current position.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.transform.position
    }

    /// Current velocity.
    #[must_use]
    pub fn velocity(&self) -> Vec2 {
        self.physics.velocity
    }

    /// Returns true once the projectile has outlived its lifetime.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.age >= self.max_age
    }
}
