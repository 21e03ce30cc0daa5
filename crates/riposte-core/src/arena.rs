//! Arena module for the duel simulation.
//!
//! The [`Arena`] is the container for all simulation state. It provides:
//! - The two actors, addressed by [`Side`]
//! - Projectile storage with deterministic iteration order (`BTreeMap`)
//! - Spawn-ordered [`EntityId`] generation
//! - Static [`ArenaGeometry`] (bounds and interior walls) shared by reference
//!
//! # Determinism
//!
//! Projectiles are stored in a `BTreeMap` keyed by their spawn-ordered id so
//! that every pass over them visits the same sequence on every platform. The
//! threat ranking relies on that order for its tie-break.
//!
//! # Example
//!
//! ```
//! use riposte_core::arena::Arena;
//! use riposte_core::config::{ArenaConfig, SimulationConfig};
//! use riposte_core::entity::Side;
//! use glam::Vec2;
//!
//! let mut arena = Arena::new(&ArenaConfig::open(800.0, 600.0), &SimulationConfig::default());
//! let id = arena.spawn_projectile(Side::Opponent, Vec2::new(10.0, 10.0), Vec2::new(420.0, 0.0), 2.5);
//! assert_eq!(arena.projectile(id).unwrap().owner, Side::Opponent);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::{ArenaConfig, SimulationConfig};
use crate::entity::{Actor, CombatState, EntityId, PhysicsState, Projectile, Side, TransformState};

// =============================================================================
// Geometry
// =============================================================================

/// Axis-aligned interior wall.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallRect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
}

impl WallRect {
    /// Creates a wall from its top-left corner and size.
    #[must_use]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Returns true if `point` lies inside or on the wall.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        (self.x..=self.right()).contains(&point.x) && (self.y..=self.bottom()).contains(&point.y)
    }

    /// Closest point of the wall to `point`.
    #[must_use]
    pub fn closest_point(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            point.x.clamp(self.x, self.right()),
            point.y.clamp(self.y, self.bottom()),
        )
    }

    /// Returns true if a circle overlaps the wall.
    #[must_use]
    pub fn overlaps_circle(&self, center: Vec2, radius: f32) -> bool {
        self.x < center.x + radius
            && center.x - radius < self.right()
            && self.y < center.y + radius
            && center.y - radius < self.bottom()
    }
}

/// Distance from a point to the nearest wall surface in each compass direction.
///
/// Screen coordinates: North is -y, South is +y.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ObstacleProximity {
    /// Distance upward.
    pub north: f32,
    /// Distance to the right.
    pub east: f32,
    /// Distance downward.
    pub south: f32,
    /// Distance to the left.
    pub west: f32,
}

impl ObstacleProximity {
    /// Smallest of the four distances.
    #[must_use]
    pub fn nearest(&self) -> f32 {
        self.north.min(self.east).min(self.south).min(self.west)
    }
}

/// Static arena layout: perimeter bounds plus interior walls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaGeometry {
    /// Arena width.
    pub width: f32,
    /// Arena height.
    pub height: f32,
    /// Interior walls.
    pub walls: Vec<WallRect>,
}

impl ArenaGeometry {
    /// Builds geometry from config.
    #[must_use]
    pub fn from_config(config: &ArenaConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            walls: config.walls.clone(),
        }
    }

    /// Returns true if `point` lies within the perimeter.
    #[must_use]
    pub fn in_bounds(&self, point: Vec2) -> bool {
        (0.0..=self.width).contains(&point.x) && (0.0..=self.height).contains(&point.y)
    }

    /// Returns true if a point is outside the perimeter or inside a wall.
    #[must_use]
    pub fn is_blocked(&self, point: Vec2) -> bool {
        !self.in_bounds(point) || self.walls.iter().any(|w| w.contains(point))
    }

    /// Distances to the nearest wall surface North, East, South and West.
    ///
    /// Interior walls only count in a direction when they overlap the point's
    /// column (for North/South) or row (for East/West).
    #[must_use]
    pub fn proximity(&self, point: Vec2) -> ObstacleProximity {
        let mut prox = ObstacleProximity {
            north: point.y,
            east: self.width - point.x,
            south: self.height - point.y,
            west: point.x,
        };

        for wall in &self.walls {
            let in_column = (wall.x..=wall.right()).contains(&point.x);
            let in_row = (wall.y..=wall.bottom()).contains(&point.y);
            if in_column && wall.bottom() <= point.y {
                prox.north = prox.north.min(point.y - wall.bottom());
            }
            if in_column && wall.y >= point.y {
                prox.south = prox.south.min(wall.y - point.y);
            }
            if in_row && wall.right() <= point.x {
                prox.west = prox.west.min(point.x - wall.right());
            }
            if in_row && wall.x >= point.x {
                prox.east = prox.east.min(wall.x - point.x);
            }
        }

        prox
    }

    /// Soft push away from walls and the perimeter within `buffer` pixels.
    ///
    /// Each nearby surface contributes a vector pointing away from it with
    /// strength `1 - distance / buffer`.
    #[must_use]
    pub fn repulsion(&self, point: Vec2, buffer: f32) -> Vec2 {
        if buffer <= 0.0 {
            return Vec2::ZERO;
        }
        let mut push = Vec2::ZERO;

        for (dist, dir) in [
            (point.x, Vec2::X),
            (self.width - point.x, Vec2::NEG_X),
            (point.y, Vec2::Y),
            (self.height - point.y, Vec2::NEG_Y),
        ] {
            if dist < buffer {
                push += dir * (1.0 - dist / buffer);
            }
        }

        for wall in &self.walls {
            let closest = wall.closest_point(point);
            let away = point - closest;
            let dist = away.length();
            if dist > 1e-3 && dist < buffer {
                push += away / dist * (1.0 - dist / buffer);
            }
        }

        push
    }

    /// Moves a circle out of any wall it overlaps and inside the perimeter.
    ///
    /// Overlaps are resolved along the axis of minimum penetration, and the
    /// velocity component along that axis is zeroed.
    pub fn resolve_circle(&self, position: &mut Vec2, velocity: &mut Vec2, radius: f32) {
        for wall in &self.walls {
            if !wall.overlaps_circle(*position, radius) {
                continue;
            }
            let push_left = position.x + radius - wall.x;
            let push_right = wall.right() - (position.x - radius);
            let push_up = position.y + radius - wall.y;
            let push_down = wall.bottom() - (position.y - radius);

            let min_x = push_left.min(push_right);
            let min_y = push_up.min(push_down);

            if min_x < min_y {
                if push_left < push_right {
                    position.x = wall.x - radius;
                } else {
                    position.x = wall.right() + radius;
                }
                velocity.x = 0.0;
            } else {
                if push_up < push_down {
                    position.y = wall.y - radius;
                } else {
                    position.y = wall.bottom() + radius;
                }
                velocity.y = 0.0;
            }
        }

        position.x = position.x.clamp(radius, (self.width - radius).max(radius));
        position.y = position.y.clamp(radius, (self.height - radius).max(radius));
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Complete mutable simulation state.
///
/// Exclusively owned by the [`Simulation`](crate::simulation::Simulation);
/// everything handed outward is a snapshot copy.
#[derive(Debug, Clone)]
pub struct Arena {
    /// Static layout, shared between clones.
    geometry: Arc<ArenaGeometry>,
    /// The controlled agent.
    bot: Actor,
    /// The adversary.
    opponent: Actor,
    /// In-flight projectiles in spawn order.
    projectiles: BTreeMap<EntityId, Projectile>,
    /// Monotonically increasing projectile id counter.
    next_id: u64,
    /// Last completed simulation tick.
    tick: u64,
    /// Simulated seconds since the start of the session.
    time: f64,
}

impl Arena {
    /// Creates an arena with both actors at their spawn points.
    #[must_use]
    pub fn new(arena: &ArenaConfig, sim: &SimulationConfig) -> Self {
        let geometry = Arc::new(ArenaGeometry::from_config(arena));
        let (bot, opponent) = Self::spawn_actors(arena, sim);
        Self {
            geometry,
            bot,
            opponent,
            projectiles: BTreeMap::new(),
            next_id: 1,
            tick: 0,
            time: 0.0,
        }
    }

    fn spawn_actors(arena: &ArenaConfig, sim: &SimulationConfig) -> (Actor, Actor) {
        let bot = Actor::new(
            Side::Bot,
            arena.bot_spawn,
            CombatState::new(sim.max_hp, sim.bot_cooldown_s),
            arena.actor_radius,
            sim.bot_speed,
        );
        let opponent = Actor::new(
            Side::Opponent,
            arena.opponent_spawn,
            CombatState::new(sim.max_hp, sim.opponent_cooldown_s),
            arena.actor_radius,
            sim.opponent_speed,
        );
        (bot, opponent)
    }

    /// Restores both actors to their spawn state and clears projectiles.
    ///
    /// The tick counter, clock and id counter are kept so that ids and ticks
    /// stay monotonic across rounds.
    pub fn reset_actors(&mut self, arena: &ArenaConfig, sim: &SimulationConfig) {
        let (bot, opponent) = Self::spawn_actors(arena, sim);
        self.bot = bot;
        self.opponent = opponent;
        self.projectiles.clear();
    }

    /// Shared static geometry.
    #[must_use]
    pub fn geometry(&self) -> &Arc<ArenaGeometry> {
        &self.geometry
    }

    /// Returns the actor for `side`.
    #[must_use]
    pub fn actor(&self, side: Side) -> &Actor {
        match side {
            Side::Bot => &self.bot,
            Side::Opponent => &self.opponent,
        }
    }

    /// Returns the actor for `side` mutably.
    #[must_use]
    pub fn actor_mut(&mut self, side: Side) -> &mut Actor {
        match side {
            Side::Bot => &mut self.bot,
            Side::Opponent => &mut self.opponent,
        }
    }

    /// Iterates both actors, bot first.
    pub fn actors(&self) -> impl Iterator<Item = &Actor> + '_ {
        [&self.bot, &self.opponent].into_iter()
    }

    /// Spawns a projectile and returns its id.
    pub fn spawn_projectile(
        &mut self,
        owner: Side,
        position: Vec2,
        velocity: Vec2,
        max_age: f32,
    ) -> EntityId {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;
        self.projectiles.insert(
            id,
            Projectile {
                id,
                owner,
                transform: TransformState::new(position),
                physics: PhysicsState { velocity },
                age: 0.0,
                max_age,
            },
        );
        id
    }

    /// Removes a projectile.
    pub fn despawn_projectile(&mut self, id: EntityId) -> Option<Projectile> {
        self.projectiles.remove(&id)
    }

    /// Returns a projectile by id.
    #[must_use]
    pub fn projectile(&self, id: EntityId) -> Option<&Projectile> {
        self.projectiles.get(&id)
    }

    /// Iterates projectiles in spawn order.
    pub fn projectiles_sorted(&self) -> impl Iterator<Item = &Projectile> + '_ {
        self.projectiles.values()
    }

    /// Iterates projectiles mutably in spawn order.
    pub fn projectiles_sorted_mut(&mut self) -> impl Iterator<Item = &mut Projectile> + '_ {
        self.projectiles.values_mut()
    }

    /// Number of projectiles in flight.
    #[must_use]
    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    /// Last completed tick (0 before the first step).
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds elapsed.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Advances the tick counter and clock.
    pub fn advance_tick(&mut self, dt: f32) {
        self.tick += 1;
        self.time += f64::from(dt);
    }
}
