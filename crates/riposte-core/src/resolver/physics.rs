//! Physics resolver for actor movement.
//!
//! The `PhysicsResolver` handles:
//! - `SetMovement` commands: velocity = direction (length ≤ 1) × actor speed
//! - Integration: `position += velocity * dt` for both actors
//! - Wall collisions: minimum-overlap push-out, then clamp inside the arena
//! - Cooldown decay, floored at zero
//!
//! Projectiles are integrated by the [`CombatResolver`](super::CombatResolver)
//! because their flight and their hits are resolved together.

use std::sync::Arc;

use crate::arena::Arena;
use crate::entity::Side;
use crate::output::{Command, CommandKind, Event};

use super::Resolver;

/// Resolver for movement commands and actor integration.
///
/// # Processing Order
///
/// 1. Apply velocity changes from `SetMovement` commands (last write wins)
/// 2. Integrate both actors
/// 3. Resolve wall overlaps and clamp to the arena
/// 4. Decrement weapon cooldowns
///
/// An actor with no movement command this tick keeps its velocity.
#[derive(Debug, Clone)]
pub struct PhysicsResolver {
    /// Fixed timestep for integration.
    dt: f32,
}

impl PhysicsResolver {
    /// Creates a physics resolver with the given timestep.
    #[must_use]
    pub fn new(dt: f32) -> Self {
        Self { dt }
    }

    /// Returns the timestep used for integration.
    #[must_use]
    pub fn dt(&self) -> f32 {
        self.dt
    }

    fn integrate(&self, next: &mut Arena) {
        let geometry = Arc::clone(next.geometry());
        for side in [Side::Bot, Side::Opponent] {
            let actor = next.actor_mut(side);
            actor.transform.position += actor.physics.velocity * self.dt;
            geometry.resolve_circle(
                &mut actor.transform.position,
                &mut actor.physics.velocity,
                actor.radius,
            );
            actor.combat.cooldown_remaining = (actor.combat.cooldown_remaining - self.dt).max(0.0);
        }
    }
}

impl Resolver for PhysicsResolver {
    fn handles(&self) -> &[CommandKind] {
        &[CommandKind::Movement]
    }

    fn resolve(&self, commands: &[&Command], current: &Arena, next: &mut Arena, _events: &mut Vec<Event>) {
        for command in commands {
            if let Command::SetMovement { side, direction } = command {
                let speed = current.actor(*side).speed;
                next.actor_mut(*side).physics.velocity = direction.clamp_length_max(1.0) * speed;
            }
        }
        self.integrate(next);
    }
}
