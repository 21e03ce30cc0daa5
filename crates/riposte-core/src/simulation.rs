//! Simulation module: the fixed-rate snapshot producer.
//!
//! The `Simulation` struct advances the arena one fixed timestep at a time:
//!
//! 1. **RESOLUTION**: Clone current to next, route commands to resolvers
//! 2. **VALIDATE**: Check invariants (finite kinematics, non-negative HP) on next
//! 3. **APPLY**: Swap buffers
//! 4. **CAPTURE**: Emit an immutable [`StateSnapshot`]
//!
//! If validation fails, the tick is aborted: `current` is left untouched and
//! a [`SimulationError`] is returned. This is the only fatal error in the core.
//!
//! # Determinism
//!
//! Given the same config and the same command sequence, the simulation
//! produces bit-identical state:
//! - Projectiles are iterated in id order (via `BTreeMap`)
//! - Commands are applied in submission order
//! - [`Simulation::state_hash`] hashes the raw float bits
//!
//! # Example
//!
//! ```
//! use riposte_core::simulation::Simulation;
//! use riposte_core::config::EngineConfig;
//! use riposte_core::output::Command;
//! use riposte_core::entity::Side;
//! use glam::Vec2;
//!
//! let mut sim = Simulation::new(&EngineConfig::default());
//! let outcome = sim
//!     .step(&[Command::SetMovement { side: Side::Bot, direction: Vec2::NEG_Y }])
//!     .unwrap();
//! assert_eq!(outcome.snapshot.tick_id.as_u64(), 1);
//! assert_eq!(sim.tick(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::error;

use crate::arena::Arena;
use crate::config::{ArenaConfig, EngineConfig, SimulationConfig};
use crate::error::SimulationError;
use crate::output::{Command, Event};
use crate::resolver::{CombatResolver, PhysicsResolver, Resolver};
use crate::snapshot::{StateSnapshot, TickId};

// =============================================================================
// TickOutcome
// =============================================================================

/// Result of one successful simulation tick.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    /// Immutable snapshot of the new state.
    pub snapshot: Arc<StateSnapshot>,
    /// Everything that happened during the tick, in resolution order.
    pub events: Vec<Event>,
    /// True if an actor reached zero HP on this tick.
    pub round_over: bool,
}

// =============================================================================
// Simulation
// =============================================================================

/// The snapshot producer.
///
/// # Double Buffering
///
/// The simulation holds two arenas:
/// - `current`: the last valid state, read-only during a tick
/// - `next`: scratch state the resolvers write to
///
/// After a valid tick the buffers are swapped to avoid copying.
pub struct Simulation {
    /// Last valid arena state.
    current: Arena,
    /// Scratch arena written by resolvers.
    next: Arena,
    /// Resolvers in execution order.
    resolvers: Vec<Box<dyn Resolver>>,
    /// Arena layout and spawn points, used by round resets.
    arena_config: ArenaConfig,
    /// Tick rate and combat tuning.
    sim_config: SimulationConfig,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("current", &self.current)
            .field("resolvers", &format!("[{} resolvers]", self.resolvers.len()))
            .field("sim_config", &self.sim_config)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Creates a simulation at tick 0 with both actors at their spawn points
    /// and the default resolvers (Physics, Combat).
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        let current = Arena::new(&config.arena, &config.simulation);
        Self {
            next: current.clone(),
            current,
            resolvers: vec![
                Box::new(PhysicsResolver::new(config.simulation.dt())),
                Box::new(CombatResolver::new(&config.arena, &config.simulation)),
            ],
            arena_config: config.arena.clone(),
            sim_config: config.simulation.clone(),
        }
    }

    /// Advances the simulation by one fixed timestep.
    ///
    /// # Errors
    ///
    /// Returns a [`SimulationError`] if the produced state violates an
    /// invariant. The tick is discarded and the previous state retained.
    pub fn step(&mut self, commands: &[Command]) -> Result<TickOutcome, SimulationError> {
        let mut events = Vec::new();

        // RESOLUTION
        self.next.clone_from(&self.current);
        for resolver in &self.resolvers {
            let relevant: Vec<&Command> = commands
                .iter()
                .filter(|c| resolver.handles().contains(&c.kind()))
                .collect();
            resolver.resolve(&relevant, &self.current, &mut self.next, &mut events);
        }
        self.next.advance_tick(self.sim_config.dt());

        // VALIDATE
        if let Err(err) = Self::check_invariants(&self.next) {
            error!(error = %err, "simulation invariant violated, tick aborted");
            return Err(err);
        }

        // APPLY
        std::mem::swap(&mut self.current, &mut self.next);

        // CAPTURE
        let round_over = events.iter().any(|e| matches!(e, Event::RoundOver { .. }));
        Ok(TickOutcome {
            snapshot: Arc::new(self.snapshot()),
            events,
            round_over,
        })
    }

    fn check_invariants(arena: &Arena) -> Result<(), SimulationError> {
        let tick = TickId::new(arena.current_tick());
        for actor in arena.actors() {
            let (pos, vel) = (actor.position(), actor.velocity());
            if !pos.is_finite() || !vel.is_finite() {
                return Err(SimulationError::NonFiniteActor {
                    tick,
                    side: actor.side,
                    position: pos.to_array(),
                    velocity: vel.to_array(),
                });
            }
            if actor.combat.hp < 0.0 || actor.combat.hp.is_nan() {
                return Err(SimulationError::NegativeHealth {
                    tick,
                    side: actor.side,
                    hp: actor.combat.hp,
                });
            }
        }
        for projectile in arena.projectiles_sorted() {
            if !projectile.position().is_finite() || !projectile.velocity().is_finite() {
                return Err(SimulationError::NonFiniteProjectile {
                    tick,
                    id: projectile.id.as_u64(),
                });
            }
        }
        Ok(())
    }

    /// Captures a snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::capture(&self.current, &self.sim_config)
    }

    /// Starts a new round: actors back to spawn with full HP, projectiles
    /// cleared. The tick counter keeps counting.
    pub fn reset_round(&mut self) {
        self.current.reset_actors(&self.arena_config, &self.sim_config);
    }

    /// Returns the current arena state.
    #[must_use]
    pub fn arena(&self) -> &Arena {
        &self.current
    }

    /// Returns a mutable reference to the current arena, for test setup.
    #[must_use]
    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.current
    }

    /// Returns the last completed tick.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.current.current_tick()
    }

    /// Seconds per tick.
    #[must_use]
    pub fn dt(&self) -> f32 {
        self.sim_config.dt()
    }

    /// Deterministic hash of the full simulation state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        let arena = &self.current;
        arena.current_tick().hash(&mut hasher);
        arena.time().to_bits().hash(&mut hasher);
        for actor in arena.actors() {
            actor.side.hash(&mut hasher);
            hash_floats(
                &mut hasher,
                &[
                    actor.position().x,
                    actor.position().y,
                    actor.velocity().x,
                    actor.velocity().y,
                    actor.combat.hp,
                    actor.combat.cooldown_remaining,
                ],
            );
        }
        for projectile in arena.projectiles_sorted() {
            projectile.id.hash(&mut hasher);
            projectile.owner.hash(&mut hasher);
            hash_floats(
                &mut hasher,
                &[
                    projectile.position().x,
                    projectile.position().y,
                    projectile.velocity().x,
                    projectile.velocity().y,
                    projectile.age,
                ],
            );
        }
        hasher.finish()
    }
}

fn hash_floats(hasher: &mut DefaultHasher, values: &[f32]) {
    for value in values {
        value.to_bits().hash(hasher);
    }
}

// =============================================================================
// Tests
// =============================================================================
