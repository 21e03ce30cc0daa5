//! Observability surface.
//!
//! - [`PipelineMetrics`]: lock-free counters for the planning path, plus a
//!   small mutex-guarded [`LatencyStats`] accumulator
//! - [`CombatStats`]: hit rates, survival and dodge success from simulation
//!   events
//! - [`MetricsSnapshot`]: a serializable point-in-time copy of both, plus
//!   the age of the current intent
//!
//! Everything here is read-only to consumers; only the planner task, the
//! simulation task and the reflex task write.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, Side};
use crate::output::Event;

// =============================================================================
// Latency statistics
// =============================================================================

/// Running mean, variance, min and max of request latencies in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Arithmetic mean.
    pub mean_ms: f32,
    /// Variance (σ²).
    pub variance: f32,
    /// Minimum value.
    pub min_ms: f32,
    /// Maximum value.
    pub max_ms: f32,
    /// Number of samples.
    pub sample_count: u32,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::empty()
    }
}

impl LatencyStats {
    /// Stats with no samples.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            mean_ms: 0.0,
            variance: 0.0,
            min_ms: f32::INFINITY,
            max_ms: f32::NEG_INFINITY,
            sample_count: 0,
        }
    }

    /// Stats of a single sample.
    #[must_use]
    pub fn from_value(ms: f32) -> Self {
        Self {
            mean_ms: ms,
            variance: 0.0,
            min_ms: ms,
            max_ms: ms,
            sample_count: 1,
        }
    }

    /// Combines two accumulators (Welford's parallel algorithm).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn merge(a: &Self, b: &Self) -> Self {
        if a.sample_count == 0 {
            return *b;
        }
        if b.sample_count == 0 {
            return *a;
        }

        let n_a = a.sample_count as f32;
        let n_b = b.sample_count as f32;
        let n_total = n_a + n_b;

        let delta = b.mean_ms - a.mean_ms;
        let mean_ms = a.mean_ms + delta * (n_b / n_total);
        let variance = (a.variance * n_a + b.variance * n_b + delta * delta * n_a * n_b / n_total) / n_total;

        Self {
            mean_ms,
            variance,
            min_ms: a.min_ms.min(b.min_ms),
            max_ms: a.max_ms.max(b.max_ms),
            sample_count: a.sample_count + b.sample_count,
        }
    }

    /// Adds one sample.
    pub fn record(&mut self, latency: Duration) {
        *self = Self::merge(self, &Self::from_value(latency.as_secs_f32() * 1_000.0));
    }

    /// Standard deviation.
    #[must_use]
    pub fn std_dev(&self) -> f32 {
        self.variance.sqrt()
    }
}

// =============================================================================
// Pipeline metrics
// =============================================================================

/// Counters for the planning path.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    issued: AtomicU64,
    in_flight: AtomicUsize,
    replies: AtomicU64,
    timeouts: AtomicU64,
    failures: AtomicU64,
    malformed: AtomicU64,
    stale: AtomicU64,
    accepted: AtomicU64,
    superseded: AtomicU64,
    latency: Mutex<LatencyStats>,
}

impl PipelineMetrics {
    /// Creates zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A request was issued.
    pub fn record_issued(&self) {
        self.issued.fetch_add(1, Ordering::Relaxed);
    }

    /// Sets the in-flight gauge.
    pub fn set_in_flight(&self, count: usize) {
        self.in_flight.store(count, Ordering::Relaxed);
    }

    /// A reply arrived after `latency`.
    pub fn record_reply(&self, latency: Duration) {
        self.replies.fetch_add(1, Ordering::Relaxed);
        self.latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(latency);
    }

    /// A request hit its deadline.
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// A request failed in transport.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A reply was malformed.
    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// A valid packet lost the staleness comparison.
    pub fn record_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
    }

    /// A packet replaced the current intent.
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// A held snapshot was replaced before it could be issued.
    pub fn record_superseded(&self) {
        self.superseded.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy.
    #[must_use]
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            issued: self.issued.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            replies: self.replies.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            latency: *self.latency.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// Serializable copy of [`PipelineMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    /// Requests issued.
    pub issued: u64,
    /// Requests outstanding.
    pub in_flight: usize,
    /// Replies received (any content).
    pub replies: u64,
    /// Requests abandoned at their deadline.
    pub timeouts: u64,
    /// Transport failures.
    pub failures: u64,
    /// Malformed packets discarded.
    pub malformed: u64,
    /// Stale packets discarded.
    pub stale: u64,
    /// Packets accepted.
    pub accepted: u64,
    /// Held snapshots replaced before issuance.
    pub superseded: u64,
    /// Reply latency.
    pub latency: LatencyStats,
}

impl PipelineSnapshot {
    /// stale / (accepted + stale), or 0 with no valid packets.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stale_discard_rate(&self) -> f64 {
        let valid = self.accepted + self.stale;
        if valid == 0 {
            0.0
        } else {
            self.stale as f64 / valid as f64
        }
    }
}

// =============================================================================
// Combat statistics
// =============================================================================

/// Per-side shot counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotCounts {
    /// Projectiles fired.
    pub fired: u64,
    /// Projectiles that hit.
    pub hits: u64,
}

impl ShotCounts {
    /// hits / fired, or 0 with no shots.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        if self.fired == 0 {
            0.0
        } else {
            self.hits as f64 / self.fired as f64
        }
    }
}

/// Outcome statistics accumulated from simulation events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatStats {
    /// Bot shots.
    pub bot: ShotCounts,
    /// Opponent shots.
    pub opponent: ShotCounts,
    /// Rounds completed.
    pub rounds: u32,
    /// Bot survival summed over completed rounds, in ticks.
    pub survival_ticks: u64,
    /// Distinct projectiles that were on a hit course for the bot.
    pub threats_faced: u64,
    /// Of those, how many left play without hitting.
    pub threats_dodged: u64,
    #[serde(skip)]
    tracked: BTreeSet<EntityId>,
    /// Projectiles already counted this round; never tracked again.
    #[serde(skip)]
    settled: BTreeSet<EntityId>,
}

impl CombatStats {
    /// Creates empty stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks projectiles the reflex executor judged imminent.
    pub fn record_imminent(&mut self, ids: &[EntityId]) {
        for id in ids {
            if self.settled.contains(id) {
                continue;
            }
            if self.tracked.insert(*id) {
                self.threats_faced += 1;
            }
        }
    }

    /// Folds one tick of simulation events.
    pub fn record_events(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::ProjectileFired { owner, .. } => self.side_mut(*owner).fired += 1,
                Event::Hit {
                    projectile, owner, ..
                } => {
                    self.side_mut(*owner).hits += 1;
                    self.tracked.remove(projectile);
                    self.settled.insert(*projectile);
                }
                Event::ProjectileExpired { projectile, .. } => {
                    if self.tracked.remove(projectile) {
                        self.threats_dodged += 1;
                    }
                    self.settled.insert(*projectile);
                }
                Event::RoundOver { .. } => {}
            }
        }
    }

    /// Closes a round that lasted `ticks`.
    pub fn end_round(&mut self, ticks: u64) {
        self.rounds += 1;
        self.survival_ticks += ticks;
        self.tracked.clear();
        self.settled.clear();
    }

    fn side_mut(&mut self, side: Side) -> &mut ShotCounts {
        match side {
            Side::Bot => &mut self.bot,
            Side::Opponent => &mut self.opponent,
        }
    }

    /// threats dodged / threats faced, or 0 with none faced.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn dodge_success_rate(&self) -> f64 {
        if self.threats_faced == 0 {
            0.0
        } else {
            self.threats_dodged as f64 / self.threats_faced as f64
        }
    }

    /// Mean survival per completed round in seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_survival_s(&self, dt: f32) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            self.survival_ticks as f64 * f64::from(dt) / f64::from(self.rounds)
        }
    }
}

/// Everything on the metrics surface at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Planning path counters.
    pub pipeline: PipelineSnapshot,
    /// stale / (accepted + stale).
    pub stale_discard_rate: f64,
    /// Combat outcome statistics.
    pub combat: CombatStats,
    /// Bot hit rate.
    pub hit_rate: f64,
    /// Dodge success rate.
    pub dodge_success_rate: f64,
    /// Mean bot survival per round in seconds.
    pub mean_survival_s: f64,
    /// Simulation ticks since the current intent was accepted.
    pub intent_age_ticks: u64,
    /// Milliseconds since the current intent was accepted.
    pub intent_age_ms: u64,
}

impl MetricsSnapshot {
    /// Assembles a snapshot.
    #[must_use]
    pub fn new(pipeline: PipelineSnapshot, combat: CombatStats, dt: f32, intent_age_ticks: u64, intent_age: Duration) -> Self {
        Self {
            stale_discard_rate: pipeline.stale_discard_rate(),
            hit_rate: combat.bot.hit_rate(),
            dodge_success_rate: combat.dodge_success_rate(),
            mean_survival_s: combat.mean_survival_s(dt),
            pipeline,
            combat,
            intent_age_ticks,
            intent_age_ms: u64::try_from(intent_age.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod latency_tests {
        use super::*;

        #[test]
        fn welford_mean_and_extrema() {
            let mut stats = LatencyStats::empty();
            for ms in [100, 200, 300] {
                stats.record(Duration::from_millis(ms));
            }
            assert_eq!(stats.sample_count, 3);
            assert!((stats.mean_ms - 200.0).abs() < 1e-3);
            assert!((stats.min_ms - 100.0).abs() < 1e-3);
            assert!((stats.max_ms - 300.0).abs() < 1e-3);
            assert!((stats.std_dev() - 81.649_66).abs() < 1e-2);
        }

        #[test]
        fn merge_with_empty_is_identity() {
            let one = LatencyStats::from_value(42.0);
            assert_eq!(LatencyStats::merge(&LatencyStats::empty(), &one), one);
            assert_eq!(LatencyStats::merge(&one, &LatencyStats::empty()), one);
        }
    }

    mod pipeline_tests {
        use super::*;

        #[test]
        fn stale_rate() {
            let metrics = PipelineMetrics::new();
            assert_eq!(metrics.snapshot().stale_discard_rate(), 0.0);
            metrics.record_accepted();
            metrics.record_stale();
            metrics.record_stale();
            metrics.record_accepted();
            metrics.record_malformed();
            let snap = metrics.snapshot();
            assert_eq!(snap.stale_discard_rate(), 0.5);
            assert_eq!(snap.malformed, 1);
        }

        #[test]
        fn reply_records_latency() {
            let metrics = PipelineMetrics::new();
            metrics.record_reply(Duration::from_millis(250));
            let snap = metrics.snapshot();
            assert_eq!(snap.replies, 1);
            assert_eq!(snap.latency.sample_count, 1);
        }
    }

    mod combat_tests {
        use super::*;

        fn fired(id: u64, owner: Side) -> Event {
            Event::ProjectileFired {
                projectile: EntityId::new(id),
                owner,
                origin: glam::Vec2::ZERO,
                velocity: glam::Vec2::X,
            }
        }

        #[test]
        fn hit_rate_per_side() {
            let mut stats = CombatStats::new();
            stats.record_events(&[fired(1, Side::Bot), fired(2, Side::Bot), fired(3, Side::Opponent)]);
            stats.record_events(&[Event::Hit {
                projectile: EntityId::new(1),
                owner: Side::Bot,
                target: Side::Opponent,
                damage: 10.0,
            }]);
            assert_eq!(stats.bot.hit_rate(), 0.5);
            assert_eq!(stats.opponent.hit_rate(), 0.0);
        }

        #[test]
        fn dodges_count_only_tracked_expiries() {
            let mut stats = CombatStats::new();
            stats.record_imminent(&[EntityId::new(5), EntityId::new(6)]);
            stats.record_imminent(&[EntityId::new(5)]);
            stats.record_events(&[
                Event::ProjectileExpired {
                    projectile: EntityId::new(5),
                    owner: Side::Opponent,
                    reason: crate::output::ExpiryReason::Wall,
                },
                Event::Hit {
                    projectile: EntityId::new(6),
                    owner: Side::Opponent,
                    target: Side::Bot,
                    damage: 10.0,
                },
                Event::ProjectileExpired {
                    projectile: EntityId::new(7),
                    owner: Side::Opponent,
                    reason: crate::output::ExpiryReason::Lifetime,
                },
            ]);
            assert_eq!(stats.threats_faced, 2);
            assert_eq!(stats.threats_dodged, 1);
            assert_eq!(stats.dodge_success_rate(), 0.5);
        }

        #[test]
        fn stale_imminent_report_after_expiry_is_ignored() {
            let mut stats = CombatStats::new();
            let id = EntityId::new(42);
            stats.record_imminent(&[id]);
            stats.record_events(&[Event::ProjectileExpired {
                projectile: id,
                owner: Side::Opponent,
                reason: crate::output::ExpiryReason::Wall,
            }]);
            stats.record_imminent(&[id]);
            assert_eq!(stats.threats_faced, 1);
            assert_eq!(stats.threats_dodged, 1);
            assert_eq!(stats.dodge_success_rate(), 1.0);

            stats.end_round(30);
            stats.record_imminent(&[id]);
            assert_eq!(stats.threats_faced, 2);
        }

        #[test]
        fn survival_average() {
            let mut stats = CombatStats::new();
            stats.end_round(60);
            stats.end_round(180);
            assert!((stats.mean_survival_s(1.0 / 60.0) - 2.0).abs() < 1e-6);
        }
    }
}
