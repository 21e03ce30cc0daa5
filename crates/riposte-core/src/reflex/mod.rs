//! The reflex executor.
//!
//! [`ReflexExecutor::step`] runs at a fixed high rate and turns the latest
//! [`StateSnapshot`] and [`CurrentIntent`] into a [`ControlSignal`]. It never
//! waits: both inputs are read from cells that always hold a value.
//!
//! # Pipeline
//!
//! 1. Target vector from the intent (`dx`, `dy`, aggression, goal)
//! 2. Rate-limited smoothing toward the target
//! 3. Guardrails, in priority order:
//!    - emergency dodge ([`GuardrailFlags::DODGE`]) replaces the movement
//!    - boundary clamp ([`GuardrailFlags::CLAMP`]) zeroes components toward
//!      near walls
//!    - cooldown gate ([`GuardrailFlags::COOLDOWN`]) suppresses fire
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use riposte_core::arena::Arena;
//! use riposte_core::config::{ArenaConfig, ReflexConfig, SimulationConfig};
//! use riposte_core::intent::CurrentIntent;
//! use riposte_core::reflex::ReflexExecutor;
//! use riposte_core::snapshot::StateSnapshot;
//!
//! let arena_config = ArenaConfig::open(800.0, 600.0);
//! let sim = SimulationConfig::default();
//! let arena = Arena::new(&arena_config, &sim);
//! let snapshot = StateSnapshot::capture(&arena, &sim);
//!
//! let mut reflex = ReflexExecutor::new(ReflexConfig::default(), Arc::clone(arena.geometry()));
//! let signal = reflex.step(&snapshot, &CurrentIntent::initial(tokio::time::Instant::now()));
//! assert!(!signal.fire);
//! assert_eq!(signal.movement, glam::Vec2::ZERO);
//! ```

mod guardrails;

pub use guardrails::{boundary_clamp, closest_approach, evasive_vector, imminent_threats, ImminentThreat};

use std::sync::Arc;

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::arena::ArenaGeometry;
use crate::config::ReflexConfig;
use crate::entity::{EntityId, Side};
use crate::intent::{CurrentIntent, Goal, IntentPacket};
use crate::output::Command;
use crate::predictor::Predictor;
use crate::snapshot::{StateSnapshot, TickId};

bitflags! {
    /// Guardrails that changed a control signal.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct GuardrailFlags: u8 {
        /// Movement replaced by an evasive vector.
        const DODGE = 1 << 0;
        /// Movement clamped at a wall.
        const CLAMP = 1 << 1;
        /// Fire suppressed by the weapon cooldown.
        const COOLDOWN = 1 << 2;
    }
}

/// Result of the cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CooldownGate {
    /// The weapon may fire.
    Ready,
    /// The weapon is cooling down.
    CoolingDown {
        /// Seconds left.
        remaining: f32,
    },
}

impl CooldownGate {
    fn check(cooldown_remaining: f32) -> Self {
        if cooldown_remaining <= 0.0 {
            Self::Ready
        } else {
            Self::CoolingDown {
                remaining: cooldown_remaining,
            }
        }
    }
}

/// Per-tick actuation output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSignal {
    /// Snapshot the signal was computed from.
    pub tick_id: TickId,
    /// Tick of the intent that was followed.
    pub intent_tick: TickId,
    /// Movement direction, length at most 1.
    pub movement: Vec2,
    /// Fire this tick.
    pub fire: bool,
    /// World point to aim at.
    pub aim: Vec2,
    /// Cooldown check result.
    pub cooldown: CooldownGate,
    /// Guardrails that fired.
    pub guardrails: GuardrailFlags,
    /// Projectiles being dodged.
    pub evading: Vec<EntityId>,
}

impl ControlSignal {
    /// The signal emitted before the first reflex tick: stand still, hold fire.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            tick_id: TickId::GENESIS,
            intent_tick: TickId::GENESIS,
            movement: Vec2::ZERO,
            fire: false,
            aim: Vec2::ZERO,
            cooldown: CooldownGate::Ready,
            guardrails: GuardrailFlags::empty(),
            evading: Vec::new(),
        }
    }

    /// Simulation commands for `side`.
    #[must_use]
    pub fn to_commands(&self, side: Side) -> Vec<Command> {
        let mut commands = vec![Command::SetMovement {
            side,
            direction: self.movement,
        }];
        if self.fire {
            commands.push(Command::Fire { side, aim: self.aim });
        }
        commands
    }
}

/// Smoothing state plus guardrails.
#[derive(Debug, Clone)]
pub struct ReflexExecutor {
    config: ReflexConfig,
    geometry: Arc<ArenaGeometry>,
    movement: Vec2,
}

impl ReflexExecutor {
    /// Creates an executor at rest.
    #[must_use]
    pub fn new(config: ReflexConfig, geometry: Arc<ArenaGeometry>) -> Self {
        Self {
            config,
            geometry,
            movement: Vec2::ZERO,
        }
    }

    /// Movement emitted on the last step.
    #[must_use]
    pub fn movement(&self) -> Vec2 {
        self.movement
    }

    /// Forgets the smoothing state, e.g. at a round boundary.
    pub fn reset(&mut self) {
        self.movement = Vec2::ZERO;
    }

    /// Target movement for `packet` before smoothing and guardrails.
    #[must_use]
    pub fn target(snapshot: &StateSnapshot, packet: &IntentPacket) -> Vec2 {
        let scale = packet.aggression.map_or(1.0, |a| 0.5 + 0.5 * a);
        let bias = packet.direction().clamp_length_max(1.0) * scale;
        let to_opponent = (snapshot.opponent.position - snapshot.actor.position).normalize_or_zero();

        match packet.goal {
            Some(Goal::Hold) => Vec2::ZERO,
            Some(Goal::Retreat) => {
                let magnitude = if bias.length() > 1e-3 { bias.length() } else { scale };
                -to_opponent * magnitude
            }
            Some(Goal::Engage) if bias.length() <= 1e-3 => to_opponent * scale,
            _ => bias,
        }
    }

    /// Computes this tick's control signal.
    pub fn step(&mut self, snapshot: &StateSnapshot, intent: &CurrentIntent) -> ControlSignal {
        let packet = &intent.packet;
        let mut guardrails = GuardrailFlags::empty();

        let threats = imminent_threats(snapshot, &self.config);
        let mut movement = if threats.is_empty() {
            let target = Self::target(snapshot, packet);
            self.movement + (target - self.movement).clamp_length_max(self.config.max_delta_per_tick)
        } else {
            guardrails |= GuardrailFlags::DODGE;
            evasive_vector(snapshot.actor.position, &threats, &self.geometry, &self.config)
        };

        let (clamped, changed) = boundary_clamp(movement, &snapshot.obstacles, self.config.wall_buffer);
        if changed {
            guardrails |= GuardrailFlags::CLAMP;
            movement = clamped;
        }
        self.movement = movement;

        let cooldown = CooldownGate::check(snapshot.actor.cooldown_remaining);
        let wants_fire = packet.shoot.wants_fire(self.config.fire_probability_threshold);
        let fire = wants_fire && cooldown == CooldownGate::Ready;
        if wants_fire && !fire {
            guardrails |= GuardrailFlags::COOLDOWN;
        }

        ControlSignal {
            tick_id: snapshot.tick_id,
            intent_tick: packet.tick_id,
            movement,
            fire,
            aim: Predictor::predicted_opponent(snapshot, self.config.aim_lead_s),
            cooldown,
            guardrails,
            evading: threats.iter().map(|t| t.id).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;
    use crate::intent::ShootSignal;
    use crate::snapshot::{ActorView, Threat};
    use tokio::time::Instant;

    fn executor() -> ReflexExecutor {
        let geometry = Arc::new(ArenaGeometry::from_config(&ArenaConfig::open(800.0, 600.0)));
        ReflexExecutor::new(ReflexConfig::default(), geometry)
    }

    fn snapshot_at(actor: Vec2) -> StateSnapshot {
        let geometry = ArenaGeometry::from_config(&ArenaConfig::open(800.0, 600.0));
        let view = ActorView {
            position: actor,
            velocity: Vec2::ZERO,
            hp: 100.0,
            cooldown_remaining: 0.0,
            radius: 16.0,
        };
        StateSnapshot {
            tick_id: TickId::new(10),
            time_s: 0.0,
            actor: view,
            opponent: ActorView {
                position: Vec2::new(200.0, 300.0),
                velocity: Vec2::new(0.0, 100.0),
                ..view
            },
            threats: Vec::new(),
            obstacles: geometry.proximity(actor),
        }
    }

    fn intent(dx: f32, dy: f32, shoot: ShootSignal) -> CurrentIntent {
        CurrentIntent {
            packet: IntentPacket {
                tick_id: TickId::new(5),
                dx,
                dy,
                shoot,
                aggression: None,
                goal: None,
            },
            accepted_at_tick: TickId::new(6),
            accepted_at: Instant::now(),
        }
    }

    mod smoothing_tests {
        use super::*;

        #[test]
        fn ramps_toward_target() {
            let mut reflex = executor();
            let snap = snapshot_at(Vec2::new(400.0, 300.0));
            let goal = intent(1.0, 0.0, ShootSignal::Fire(false));

            let first = reflex.step(&snap, &goal);
            assert!((first.movement.x - 0.15).abs() < 1e-6);
            for _ in 0..10 {
                reflex.step(&snap, &goal);
            }
            assert!((reflex.movement().x - 1.0).abs() < 1e-6);
            assert_eq!(first.guardrails, GuardrailFlags::empty());
        }

        #[test]
        fn reversal_is_rate_limited() {
            let mut reflex = executor();
            let snap = snapshot_at(Vec2::new(400.0, 300.0));
            for _ in 0..20 {
                reflex.step(&snap, &intent(1.0, 0.0, ShootSignal::Fire(false)));
            }
            let before = reflex.movement();
            let after = reflex.step(&snap, &intent(-1.0, 0.0, ShootSignal::Fire(false))).movement;
            assert!((after - before).length() <= 0.15 + 1e-6);
        }
    }

    mod target_tests {
        use super::*;

        #[test]
        fn aggression_scales_and_hold_zeroes() {
            let snap = snapshot_at(Vec2::new(400.0, 300.0));
            let mut packet = intent(1.0, 0.0, ShootSignal::Fire(false)).packet;
            packet.aggression = Some(0.0);
            assert_eq!(ReflexExecutor::target(&snap, &packet), Vec2::new(0.5, 0.0));
            packet.goal = Some(Goal::Hold);
            assert_eq!(ReflexExecutor::target(&snap, &packet), Vec2::ZERO);
        }

        #[test]
        fn retreat_points_away_and_engage_closes() {
            let snap = snapshot_at(Vec2::new(400.0, 300.0));
            let mut packet = intent(0.0, 0.0, ShootSignal::Fire(false)).packet;
            packet.goal = Some(Goal::Retreat);
            assert_eq!(ReflexExecutor::target(&snap, &packet), Vec2::new(1.0, 0.0));
            packet.goal = Some(Goal::Engage);
            assert_eq!(ReflexExecutor::target(&snap, &packet), Vec2::new(-1.0, 0.0));
        }

        #[test]
        fn oversized_bias_is_normalized() {
            let snap = snapshot_at(Vec2::new(400.0, 300.0));
            let packet = intent(1.0, 1.0, ShootSignal::Fire(false)).packet;
            assert!((ReflexExecutor::target(&snap, &packet).length() - 1.0).abs() < 1e-6);
        }
    }

    mod guardrail_tests {
        use super::*;

        #[test]
        fn cooldown_suppresses_fire() {
            let mut reflex = executor();
            let mut snap = snapshot_at(Vec2::new(400.0, 300.0));
            snap.actor.cooldown_remaining = 0.1;
            let signal = reflex.step(&snap, &intent(0.0, 0.0, ShootSignal::Fire(true)));
            assert!(!signal.fire);
            assert!(signal.guardrails.contains(GuardrailFlags::COOLDOWN));
            assert_eq!(signal.cooldown, CooldownGate::CoolingDown { remaining: 0.1 });

            snap.actor.cooldown_remaining = 0.0;
            let signal = reflex.step(&snap, &intent(0.0, 0.0, ShootSignal::Fire(true)));
            assert!(signal.fire);
            assert!((signal.aim - Vec2::new(200.0, 335.0)).length() < 1e-4);
        }

        #[test]
        fn probability_below_threshold_does_not_fire() {
            let mut reflex = executor();
            let snap = snapshot_at(Vec2::new(400.0, 300.0));
            let signal = reflex.step(&snap, &intent(0.0, 0.0, ShootSignal::Probability(0.3)));
            assert!(!signal.fire);
            assert!(!signal.guardrails.contains(GuardrailFlags::COOLDOWN));
        }

        #[test]
        fn wall_clamp_zeroes_component() {
            let mut reflex = executor();
            let snap = snapshot_at(Vec2::new(20.0, 300.0));
            let signal = reflex.step(&snap, &intent(-1.0, 0.0, ShootSignal::Fire(false)));
            assert_eq!(signal.movement, Vec2::ZERO);
            assert!(signal.guardrails.contains(GuardrailFlags::CLAMP));
        }

        #[test]
        fn dodge_overrides_intent_and_resets_smoother() {
            let mut reflex = executor();
            let mut snap = snapshot_at(Vec2::new(400.0, 310.0));
            snap.threats.push(Threat {
                id: EntityId::new(3),
                position: Vec2::new(300.0, 300.0),
                velocity: Vec2::new(420.0, 0.0),
                distance: 100.5,
            });
            let signal = reflex.step(&snap, &intent(-1.0, 0.0, ShootSignal::Fire(false)));
            assert!(signal.guardrails.contains(GuardrailFlags::DODGE));
            assert!(signal.movement.y > 0.99);
            assert_eq!(signal.evading, vec![EntityId::new(3)]);
            assert_eq!(reflex.movement(), signal.movement);
        }
    }

    #[test]
    fn commands_follow_signal() {
        let mut signal = ControlSignal::idle();
        assert_eq!(signal.to_commands(Side::Bot).len(), 1);
        signal.fire = true;
        let commands = signal.to_commands(Side::Bot);
        assert!(matches!(commands[1], Command::Fire { side: Side::Bot, .. }));
    }
}
