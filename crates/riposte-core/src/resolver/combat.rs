//! Combat resolver for firing, projectile flight and hits.
//!
//! The `CombatResolver` handles:
//! - `Fire` commands: spawn a projectile toward the aim point when ready
//! - Projectile flight: integrate, age, and remove on lifetime, wall or
//!   leaving the arena
//! - Hits: a projectile within `actor radius + projectile radius` of the
//!   opposing actor deals damage and is removed
//! - Round end: reported once, on the tick the first actor reaches zero HP
//!
//! # Destruction Handling
//!
//! HP is floored at 0. Actors at 0 HP stay in the arena until the round is
//! reset by the owner of the simulation.

use glam::Vec2;

use crate::arena::Arena;
use crate::config::{ArenaConfig, SimulationConfig};
use crate::entity::{EntityId, Side};
use crate::output::{Command, CommandKind, Event, ExpiryReason};

use super::Resolver;

/// Resolver for combat-related commands and projectile lifecycle.
///
/// # Processing Order
///
/// 1. Fire commands in submission order (at most one shot per side per tick,
///    since firing resets the cooldown)
/// 2. Integrate and age every projectile, including ones spawned this tick
/// 3. Hits, then arena exits, then walls, then lifetime expiry
/// 4. Round-end detection
#[derive(Debug, Clone)]
pub struct CombatResolver {
    dt: f32,
    projectile_speed: f32,
    projectile_lifetime: f32,
    projectile_radius: f32,
    damage: f32,
}

/// What happened to one projectile this tick.
enum Fate {
    Hit(Side),
    Expired(ExpiryReason),
}

impl CombatResolver {
    /// Creates a combat resolver from config.
    #[must_use]
    pub fn new(arena: &ArenaConfig, sim: &SimulationConfig) -> Self {
        Self {
            dt: sim.dt(),
            projectile_speed: sim.projectile_speed,
            projectile_lifetime: sim.projectile_lifetime_s,
            projectile_radius: arena.projectile_radius,
            damage: sim.damage,
        }
    }

    fn fire(&self, next: &mut Arena, side: Side, aim: Vec2, events: &mut Vec<Event>) {
        let shooter = next.actor(side);
        if !shooter.combat.is_ready() || shooter.combat.is_destroyed() {
            return;
        }
        let origin = shooter.position();
        let direction = (aim - origin).normalize_or_zero();
        if direction == Vec2::ZERO {
            return;
        }
        let velocity = direction * self.projectile_speed;

        let cooldown = shooter.combat.cooldown;
        next.actor_mut(side).combat.cooldown_remaining = cooldown;
        let projectile = next.spawn_projectile(side, origin, velocity, self.projectile_lifetime);
        events.push(Event::ProjectileFired {
            projectile,
            owner: side,
            origin,
            velocity,
        });
    }

    fn fly(&self, next: &mut Arena) {
        for projectile in next.projectiles_sorted_mut() {
            projectile.transform.position += projectile.physics.velocity * self.dt;
            projectile.age += self.dt;
        }
    }

    fn fate(&self, next: &Arena, owner: Side, position: Vec2, expired: bool) -> Option<Fate> {
        let target = next.actor(owner.opposite());
        if target.position().distance(position) < target.radius + self.projectile_radius {
            return Some(Fate::Hit(target.side));
        }
        let geometry = next.geometry();
        if !geometry.in_bounds(position) {
            return Some(Fate::Expired(ExpiryReason::OutOfBounds));
        }
        if geometry.walls.iter().any(|w| w.contains(position)) {
            return Some(Fate::Expired(ExpiryReason::Wall));
        }
        expired.then_some(Fate::Expired(ExpiryReason::Lifetime))
    }

    fn settle_projectiles(&self, next: &mut Arena, events: &mut Vec<Event>) {
        let flying: Vec<(EntityId, Side, Vec2, bool)> = next
            .projectiles_sorted()
            .map(|p| (p.id, p.owner, p.position(), p.is_expired()))
            .collect();

        for (id, owner, position, expired) in flying {
            match self.fate(next, owner, position, expired) {
                Some(Fate::Hit(target)) => {
                    let combat = &mut next.actor_mut(target).combat;
                    combat.hp = (combat.hp - self.damage).max(0.0);
                    next.despawn_projectile(id);
                    events.push(Event::Hit {
                        projectile: id,
                        owner,
                        target,
                        damage: self.damage,
                    });
                }
                Some(Fate::Expired(reason)) => {
                    next.despawn_projectile(id);
                    events.push(Event::ProjectileExpired {
                        projectile: id,
                        owner,
                        reason,
                    });
                }
                None => {}
            }
        }
    }
}

impl Resolver for CombatResolver {
    fn handles(&self) -> &[CommandKind] {
        &[CommandKind::Fire]
    }

    fn resolve(&self, commands: &[&Command], current: &Arena, next: &mut Arena, events: &mut Vec<Event>) {
        for command in commands {
            if let Command::Fire { side, aim } = command {
                self.fire(next, *side, *aim, events);
            }
        }

        self.fly(next);
        self.settle_projectiles(next, events);

        let was_over = current.actors().any(|a| a.combat.is_destroyed());
        let bot_down = next.actor(Side::Bot).combat.is_destroyed();
        let opponent_down = next.actor(Side::Opponent).combat.is_destroyed();
        if !was_over && (bot_down || opponent_down) {
            let winner = match (bot_down, opponent_down) {
                (true, false) => Some(Side::Opponent),
                (false, true) => Some(Side::Bot),
                _ => None,
            };
            events.push(Event::RoundOver { winner });
        }
    }
}
