//! Cross-round opponent profiling.
//!
//! During a round an [`ObservationWindow`] accumulates a handful of counters
//! from the simulation state and events. At the round boundary the window is
//! closed into [`RoundObservations`] and folded into the fixed-size
//! [`AdaptationProfile`] by [`AdaptationStore::end_round`] with an
//! exponentially-weighted update. Nothing grows with the number of rounds.
//!
//! The store is the only writer of the profile. Readers get a copy via
//! [`AdaptationStore::profile`].
//!
//! # Example
//!
//! ```
//! use riposte_core::adaptation::{AdaptationStore, RoundObservations, Style};
//! use riposte_core::config::AdaptationConfig;
//!
//! let mut store = AdaptationStore::new(AdaptationConfig::default());
//! let round = RoundObservations {
//!     ticks: 600,
//!     duration_s: 10.0,
//!     distance_sum: 600.0 * 120.0,
//!     ..RoundObservations::default()
//! };
//! assert_eq!(store.end_round(&round).style, Style::Rusher);
//! ```

use std::collections::BTreeSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::arena::Arena;
use crate::config::AdaptationConfig;
use crate::entity::{EntityId, Side};
use crate::output::Event;

// =============================================================================
// Profile
// =============================================================================

/// Coarse opponent play style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    /// Not enough or conflicting evidence.
    #[default]
    Neutral,
    /// Frequent lateral direction changes.
    Strafer,
    /// Fights at close range.
    Rusher,
    /// Keeps distance and moves little.
    Camper,
}

/// Compass direction the opponent prefers when dodging.
///
/// Screen coordinates: North is -y.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DodgeDirection {
    /// No dominant direction.
    #[default]
    None,
    /// Upward.
    North,
    /// Right.
    East,
    /// Downward.
    South,
    /// Left.
    West,
}

impl DodgeDirection {
    const COMPASS: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Compass bucket of a movement vector (N, E, S, W index), or `None` at rest.
    #[must_use]
    pub fn bucket(velocity: Vec2) -> Option<usize> {
        if velocity.length_squared() < 1e-6 {
            return None;
        }
        Some(if velocity.x.abs() >= velocity.y.abs() {
            if velocity.x >= 0.0 {
                1
            } else {
                3
            }
        } else if velocity.y < 0.0 {
            0
        } else {
            2
        })
    }

    /// Dominant direction of a share vector; ties and empty shares give `None`.
    #[must_use]
    pub fn dominant(shares: &[f32; 4]) -> Self {
        let (best, top) = shares
            .iter()
            .copied()
            .enumerate()
            .fold((0, shares[0]), |(bi, bs), (i, s)| if s > bs { (i, s) } else { (bi, bs) });
        let tied = shares
            .iter()
            .enumerate()
            .any(|(i, s)| i != best && (s - top).abs() < 1e-6);
        if top <= 0.0 || tied {
            Self::None
        } else {
            Self::COMPASS[best]
        }
    }
}

/// Bounded summary of how the opponent plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationProfile {
    /// Classified style.
    pub style: Style,
    /// Dominant dodge direction.
    pub dodge_direction: DodgeDirection,
    /// Share of pressured movement toward N, E, S, W.
    pub dodge_shares: [f32; 4],
    /// Typical distance between the actors in pixels.
    pub engagement_distance: f32,
    /// Opponent velocity sign flips per second.
    pub direction_change_rate: f32,
    /// Fraction of opponent shots fired under pressure that hit.
    pub hit_rate_under_pressure: f32,
    /// Rounds folded into this profile.
    pub rounds_observed: u32,
}

impl Default for AdaptationProfile {
    fn default() -> Self {
        Self {
            style: Style::Neutral,
            dodge_direction: DodgeDirection::None,
            dodge_shares: [0.0; 4],
            engagement_distance: 0.0,
            direction_change_rate: 0.0,
            hit_rate_under_pressure: 0.0,
            rounds_observed: 0,
        }
    }
}

/// Deterministic style rule over the accumulated scalars.
///
/// Rusher if closer than `rush_distance`; otherwise Strafer if the direction
/// change rate reaches `strafe_rate`; otherwise Camper if farther than
/// `camp_distance`; otherwise Neutral. A profile with no rounds is Neutral.
#[must_use]
pub fn classify(profile: &AdaptationProfile, config: &AdaptationConfig) -> Style {
    if profile.rounds_observed == 0 {
        Style::Neutral
    } else if profile.engagement_distance < config.rush_distance {
        Style::Rusher
    } else if profile.direction_change_rate >= config.strafe_rate {
        Style::Strafer
    } else if profile.engagement_distance > config.camp_distance {
        Style::Camper
    } else {
        Style::Neutral
    }
}

// =============================================================================
// Observations
// =============================================================================

/// Aggregated observations of one round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundObservations {
    /// Ticks observed.
    pub ticks: u64,
    /// Simulated seconds observed.
    pub duration_s: f32,
    /// Sum of actor-to-actor distances over all ticks.
    pub distance_sum: f64,
    /// Opponent velocity sign flips.
    pub direction_changes: u32,
    /// Opponent movement ticks under pressure, bucketed N, E, S, W.
    pub dodge_counts: [u32; 4],
    /// Ticks during which the opponent was under pressure.
    pub pressure_ticks: u64,
    /// Opponent shots fired while under pressure.
    pub shots_under_pressure: u32,
    /// Hits scored by those shots.
    pub hits_under_pressure: u32,
    /// Damage the opponent dealt while under pressure.
    pub damage_dealt_under_pressure: f32,
    /// Damage the opponent received while under pressure.
    pub damage_received_under_pressure: f32,
}

impl RoundObservations {
    /// Mean actor-to-actor distance, if any tick was observed.
    #[must_use]
    pub fn mean_distance(&self) -> Option<f32> {
        (self.ticks > 0).then(|| (self.distance_sum / self.ticks as f64) as f32)
    }
}

/// Accumulates observations tick by tick during a round.
#[derive(Debug, Clone)]
pub struct ObservationWindow {
    pressure_radius: f32,
    current: RoundObservations,
    last_sign: [f32; 2],
    pressured_shots: BTreeSet<EntityId>,
}

impl ObservationWindow {
    /// Creates an empty window.
    #[must_use]
    pub fn new(config: &AdaptationConfig) -> Self {
        Self {
            pressure_radius: config.pressure_radius,
            current: RoundObservations::default(),
            last_sign: [0.0; 2],
            pressured_shots: BTreeSet::new(),
        }
    }

    /// Records one simulation tick.
    pub fn observe(&mut self, arena: &Arena, events: &[Event], dt: f32) {
        let bot = arena.actor(Side::Bot);
        let opponent = arena.actor(Side::Opponent);
        let obs = &mut self.current;

        obs.ticks += 1;
        obs.duration_s += dt;
        obs.distance_sum += f64::from(bot.position().distance(opponent.position()));

        let velocity = opponent.velocity();
        for (axis, value) in [velocity.x, velocity.y].into_iter().enumerate() {
            if value.abs() > 1e-3 {
                let sign = value.signum();
                if self.last_sign[axis] != 0.0 && sign != self.last_sign[axis] {
                    obs.direction_changes += 1;
                }
                self.last_sign[axis] = sign;
            }
        }

        let pressured = arena
            .projectiles_sorted()
            .any(|p| p.owner == Side::Bot && p.position().distance(opponent.position()) <= self.pressure_radius);
        if pressured {
            obs.pressure_ticks += 1;
            if let Some(bucket) = DodgeDirection::bucket(velocity) {
                obs.dodge_counts[bucket] += 1;
            }
        }

        for event in events {
            match event {
                Event::ProjectileFired {
                    projectile,
                    owner: Side::Opponent,
                    ..
                } if pressured => {
                    obs.shots_under_pressure += 1;
                    self.pressured_shots.insert(*projectile);
                }
                Event::Hit {
                    projectile,
                    target: Side::Bot,
                    damage,
                    ..
                } => {
                    if self.pressured_shots.remove(projectile) {
                        obs.hits_under_pressure += 1;
                    }
                    if pressured {
                        obs.damage_dealt_under_pressure += damage;
                    }
                }
                Event::Hit {
                    target: Side::Opponent,
                    damage,
                    ..
                } if pressured => {
                    obs.damage_received_under_pressure += damage;
                }
                Event::ProjectileExpired { projectile, .. } => {
                    self.pressured_shots.remove(projectile);
                }
                _ => {}
            }
        }
    }

    /// Closes the round and resets the window.
    pub fn finish(&mut self) -> RoundObservations {
        self.last_sign = [0.0; 2];
        self.pressured_shots.clear();
        std::mem::take(&mut self.current)
    }
}

// =============================================================================
// Store
// =============================================================================

/// Sole owner of the [`AdaptationProfile`].
#[derive(Debug, Clone)]
pub struct AdaptationStore {
    config: AdaptationConfig,
    profile: AdaptationProfile,
}

impl AdaptationStore {
    /// Creates a store with an empty profile.
    #[must_use]
    pub fn new(config: AdaptationConfig) -> Self {
        Self::with_profile(config, AdaptationProfile::default())
    }

    /// Creates a store seeded with a profile from a previous session.
    #[must_use]
    pub fn with_profile(config: AdaptationConfig, profile: AdaptationProfile) -> Self {
        Self { config, profile }
    }

    /// Returns a copy of the current profile.
    #[must_use]
    pub fn profile(&self) -> AdaptationProfile {
        self.profile.clone()
    }

    /// Folds one round into the profile and reclassifies.
    ///
    /// Rounds with no observed ticks are ignored. The first round seeds the
    /// scalars directly; later rounds blend with weight `alpha`. The hit rate
    /// only moves when the round had shots under pressure.
    pub fn end_round(&mut self, round: &RoundObservations) -> &AdaptationProfile {
        let Some(distance) = round.mean_distance() else {
            return &self.profile;
        };
        let alpha = if self.profile.rounds_observed == 0 {
            1.0
        } else {
            self.config.alpha
        };
        let blend = |old: f32, new: f32| old + alpha * (new - old);

        let p = &mut self.profile;
        p.engagement_distance = blend(p.engagement_distance, distance);

        let rate = if round.duration_s > 0.0 {
            round.direction_changes as f32 / round.duration_s
        } else {
            0.0
        };
        p.direction_change_rate = blend(p.direction_change_rate, rate);

        let dodges: u32 = round.dodge_counts.iter().sum();
        if dodges > 0 {
            for (share, count) in p.dodge_shares.iter_mut().zip(round.dodge_counts) {
                *share = blend(*share, count as f32 / dodges as f32);
            }
        }

        if round.shots_under_pressure > 0 {
            let hit_rate = round.hits_under_pressure as f32 / round.shots_under_pressure as f32;
            p.hit_rate_under_pressure = blend(p.hit_rate_under_pressure, hit_rate);
        }

        p.rounds_observed += 1;
        p.dodge_direction = DodgeDirection::dominant(&p.dodge_shares);
        p.style = classify(p, &self.config);

        info!(
            rounds = p.rounds_observed,
            style = ?p.style,
            dodge = ?p.dodge_direction,
            distance = p.engagement_distance,
            "adaptation profile updated"
        );
        &self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArenaConfig, SimulationConfig};

    fn round(distance: f32, changes: u32, seconds: f32) -> RoundObservations {
        RoundObservations {
            ticks: 100,
            duration_s: seconds,
            distance_sum: f64::from(distance) * 100.0,
            direction_changes: changes,
            ..RoundObservations::default()
        }
    }

    mod classify_tests {
        use super::*;

        fn profile(distance: f32, rate: f32) -> AdaptationProfile {
            AdaptationProfile {
                engagement_distance: distance,
                direction_change_rate: rate,
                rounds_observed: 1,
                ..AdaptationProfile::default()
            }
        }

        #[test]
        fn style_rule() {
            let config = AdaptationConfig::default();
            assert_eq!(classify(&profile(100.0, 3.0), &config), Style::Rusher);
            assert_eq!(classify(&profile(250.0, 2.0), &config), Style::Strafer);
            assert_eq!(classify(&profile(400.0, 0.2), &config), Style::Camper);
            assert_eq!(classify(&profile(250.0, 0.2), &config), Style::Neutral);
            assert_eq!(classify(&AdaptationProfile::default(), &config), Style::Neutral);
        }

        #[test]
        fn dominant_direction_ties_are_none() {
            assert_eq!(DodgeDirection::dominant(&[0.1, 0.6, 0.2, 0.1]), DodgeDirection::East);
            assert_eq!(DodgeDirection::dominant(&[0.5, 0.0, 0.5, 0.0]), DodgeDirection::None);
            assert_eq!(DodgeDirection::dominant(&[0.0; 4]), DodgeDirection::None);
            assert_eq!(DodgeDirection::dominant(&[0.1, 0.1, 0.1, 0.7]), DodgeDirection::West);
            assert_eq!(DodgeDirection::dominant(&[0.7, 0.1, 0.1, 0.1]), DodgeDirection::North);
        }

        #[test]
        fn bucket_uses_screen_coordinates() {
            assert_eq!(DodgeDirection::bucket(Vec2::new(0.0, -5.0)), Some(0));
            assert_eq!(DodgeDirection::bucket(Vec2::new(5.0, 1.0)), Some(1));
            assert_eq!(DodgeDirection::bucket(Vec2::new(0.0, 5.0)), Some(2));
            assert_eq!(DodgeDirection::bucket(Vec2::new(-5.0, 1.0)), Some(3));
            assert_eq!(DodgeDirection::bucket(Vec2::ZERO), None);
        }
    }

    mod store_tests {
        use super::*;

        #[test]
        fn first_round_seeds_then_blends() {
            let mut store = AdaptationStore::new(AdaptationConfig::default());
            store.end_round(&round(300.0, 0, 10.0));
            assert_eq!(store.profile().engagement_distance, 300.0);

            store.end_round(&round(200.0, 0, 10.0));
            let p = store.profile();
            assert!((p.engagement_distance - 270.0).abs() < 1e-3);
            assert_eq!(p.rounds_observed, 2);
        }

        #[test]
        fn empty_round_is_ignored() {
            let mut store = AdaptationStore::new(AdaptationConfig::default());
            store.end_round(&RoundObservations::default());
            assert_eq!(store.profile(), AdaptationProfile::default());
        }

        #[test]
        fn strafer_detected_from_direction_changes() {
            let mut store = AdaptationStore::new(AdaptationConfig::default());
            let style = store.end_round(&round(260.0, 30, 10.0)).style;
            assert_eq!(style, Style::Strafer);
        }

        #[test]
        fn hit_rate_only_moves_with_evidence() {
            let mut store = AdaptationStore::new(AdaptationConfig::default());
            let mut first = round(260.0, 0, 10.0);
            first.shots_under_pressure = 4;
            first.hits_under_pressure = 1;
            store.end_round(&first);
            assert_eq!(store.profile().hit_rate_under_pressure, 0.25);

            store.end_round(&round(260.0, 0, 10.0));
            assert_eq!(store.profile().hit_rate_under_pressure, 0.25);
        }

        #[test]
        fn profile_size_is_fixed() {
            let mut store = AdaptationStore::new(AdaptationConfig::default());
            let before = serde_json::to_string(&store.profile()).unwrap().len();
            for _ in 0..50 {
                store.end_round(&round(260.0, 3, 10.0));
            }
            let after = serde_json::to_string(&store.profile()).unwrap().len();
            assert!(after < before + 64);
        }
    }

    mod window_tests {
        use super::*;

        #[test]
        fn window_counts_direction_changes_and_pressure() {
            let config = AdaptationConfig::default();
            let sim = SimulationConfig::default();
            let mut arena = Arena::new(&ArenaConfig::open(800.0, 600.0), &sim);
            let mut window = ObservationWindow::new(&config);

            arena.actor_mut(Side::Opponent).physics.velocity = Vec2::new(0.0, -100.0);
            window.observe(&arena, &[], sim.dt());
            arena.actor_mut(Side::Opponent).physics.velocity = Vec2::new(0.0, 100.0);
            let near = arena.actor(Side::Opponent).position() + Vec2::new(50.0, 0.0);
            arena.spawn_projectile(Side::Bot, near, Vec2::ZERO, 2.5);
            window.observe(&arena, &[], sim.dt());

            let obs = window.finish();
            assert_eq!(obs.ticks, 2);
            assert_eq!(obs.direction_changes, 1);
            assert_eq!(obs.pressure_ticks, 1);
            assert_eq!(obs.dodge_counts, [0, 0, 1, 0]);
            assert_eq!(obs.mean_distance(), Some(400.0));

            assert_eq!(window.finish().ticks, 0);
        }

        #[test]
        fn pressured_shot_hit_is_counted() {
            let config = AdaptationConfig::default();
            let sim = SimulationConfig::default();
            let mut arena = Arena::new(&ArenaConfig::open(800.0, 600.0), &sim);
            let near = arena.actor(Side::Opponent).position() + Vec2::new(10.0, 0.0);
            arena.spawn_projectile(Side::Bot, near, Vec2::ZERO, 2.5);
            let mut window = ObservationWindow::new(&config);

            let shot = EntityId::new(99);
            window.observe(
                &arena,
                &[Event::ProjectileFired {
                    projectile: shot,
                    owner: Side::Opponent,
                    origin: Vec2::ZERO,
                    velocity: Vec2::X,
                }],
                sim.dt(),
            );
            window.observe(
                &arena,
                &[Event::Hit {
                    projectile: shot,
                    owner: Side::Opponent,
                    target: Side::Bot,
                    damage: 10.0,
                }],
                sim.dt(),
            );

            let obs = window.finish();
            assert_eq!(obs.shots_under_pressure, 1);
            assert_eq!(obs.hits_under_pressure, 1);
            assert_eq!(obs.damage_dealt_under_pressure, 10.0);
        }
    }
}
