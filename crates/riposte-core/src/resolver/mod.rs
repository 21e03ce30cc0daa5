//! Resolvers turn controller commands into state changes.
//!
//! Resolvers are the write phase of a simulation tick. Each one declares the
//! command kinds it handles, receives the matching commands in submission
//! order, and mutates the next arena.
//!
//! # Invariants
//!
//! - `current` is the frozen state at the start of the tick
//! - Resolvers run in a fixed order; each sees the writes of the ones before
//!   it in `next`
//! - Resolvers MUST be deterministic given the same inputs and command order
//!
//! # Available Resolvers
//!
//! - [`PhysicsResolver`]: movement commands, actor integration, wall
//!   collisions and cooldown decay
//! - [`CombatResolver`]: fire commands, projectile flight, hits and round end

mod combat;
mod physics;

pub use combat::CombatResolver;
pub use physics::PhysicsResolver;

use crate::arena::Arena;
use crate::output::{Command, CommandKind, Event};

/// Processes commands and mutates the next state.
///
/// # Example
///
/// ```
/// use riposte_core::arena::Arena;
/// use riposte_core::output::{Command, CommandKind, Event};
/// use riposte_core::resolver::Resolver;
///
/// struct Noop;
///
/// impl Resolver for Noop {
///     fn handles(&self) -> &[CommandKind] {
///         &[]
///     }
///
///     fn resolve(&self, _commands: &[&Command], _current: &Arena, _next: &mut Arena, _events: &mut Vec<Event>) {}
/// }
/// ```
pub trait Resolver: Send + Sync {
    /// Returns the command kinds this resolver handles.
    fn handles(&self) -> &[CommandKind];

    /// Applies `commands` to `next`, appending anything notable to `events`.
    ///
    /// Resolvers with per-tick work (integration, ageing) do it here even
    /// when `commands` is empty.
    fn resolve(&self, commands: &[&Command], current: &Arena, next: &mut Arena, events: &mut Vec<Event>);
}
