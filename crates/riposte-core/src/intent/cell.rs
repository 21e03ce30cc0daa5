//! The single authoritative "current intent" cell.
//!
//! [`IntentCell`] wraps a `tokio::sync::watch` channel holding an
//! `Arc<CurrentIntent>`. Replacement goes through `send_if_modified`, so the
//! staleness comparison and the swap happen under the channel's write lock:
//! concurrent writers are serialized and a stale candidate never overwrites a
//! newer one. Readers clone the `Arc` under a read lock and never observe a
//! partially updated packet.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use super::packet::IntentPacket;
use super::staleness::{adjudicate, Verdict};
use crate::snapshot::TickId;

/// The latest accepted intent.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentIntent {
    /// The accepted packet.
    pub packet: IntentPacket,
    /// Simulation tick at which it was accepted.
    pub accepted_at_tick: TickId,
    /// Wall-clock time at which it was accepted.
    pub accepted_at: Instant,
}

impl CurrentIntent {
    /// The safe default held before any packet is accepted.
    #[must_use]
    pub fn initial(now: Instant) -> Self {
        Self {
            packet: IntentPacket::safe_default(),
            accepted_at_tick: TickId::GENESIS,
            accepted_at: now,
        }
    }

    /// Tick of the request this intent answers.
    #[must_use]
    pub fn tick_id(&self) -> TickId {
        self.packet.tick_id
    }

    /// Simulation ticks since acceptance.
    #[must_use]
    pub fn age_ticks(&self, now_tick: TickId) -> u64 {
        now_tick.since(self.accepted_at_tick)
    }

    /// Wall-clock time since acceptance.
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.accepted_at)
    }
}

/// Compare-and-replace cell for [`CurrentIntent`].
#[derive(Clone)]
pub struct IntentCell {
    tx: Arc<watch::Sender<Arc<CurrentIntent>>>,
}

impl fmt::Debug for IntentCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentCell")
            .field("tick_id", &self.current().tick_id())
            .finish_non_exhaustive()
    }
}

impl Default for IntentCell {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentCell {
    /// Creates a cell holding the safe default.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(CurrentIntent::initial(Instant::now())));
        Self { tx: Arc::new(tx) }
    }

    /// Returns the latest accepted intent without waiting.
    #[must_use]
    pub fn current(&self) -> Arc<CurrentIntent> {
        Arc::clone(&self.tx.borrow())
    }

    /// Returns a read handle for another task.
    #[must_use]
    pub fn reader(&self) -> IntentReader {
        IntentReader {
            rx: self.tx.subscribe(),
        }
    }

    /// Replaces the held intent if `packet` is strictly newer.
    pub fn offer(&self, packet: IntentPacket, now_tick: TickId, now: Instant) -> Verdict {
        let mut verdict = Verdict::Stale;
        self.tx.send_if_modified(|held| {
            verdict = adjudicate(held.tick_id(), packet.tick_id);
            if verdict == Verdict::Accept {
                *held = Arc::new(CurrentIntent {
                    packet,
                    accepted_at_tick: now_tick,
                    accepted_at: now,
                });
                true
            } else {
                false
            }
        });
        verdict
    }
}

/// Non-blocking read handle on an [`IntentCell`].
#[derive(Debug, Clone)]
pub struct IntentReader {
    rx: watch::Receiver<Arc<CurrentIntent>>,
}

impl IntentReader {
    /// Returns the latest accepted intent.
    #[must_use]
    pub fn latest(&self) -> Arc<CurrentIntent> {
        Arc::clone(&self.rx.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::packet::ShootSignal;

    fn packet(tick: u64) -> IntentPacket {
        IntentPacket {
            tick_id: TickId::new(tick),
            dx: 0.1,
            dy: 0.0,
            shoot: ShootSignal::Fire(true),
            aggression: None,
            goal: None,
        }
    }

    #[test]
    fn starts_with_safe_default() {
        let cell = IntentCell::new();
        let current = cell.current();
        assert_eq!(current.packet, IntentPacket::safe_default());
        assert_eq!(current.tick_id(), TickId::GENESIS);
    }

    #[test]
    fn newer_replaces_older_is_discarded() {
        let cell = IntentCell::new();
        let reader = cell.reader();
        let now = Instant::now();

        assert_eq!(cell.offer(packet(5), TickId::new(20), now), Verdict::Accept);
        assert_eq!(cell.offer(packet(3), TickId::new(21), now), Verdict::Stale);
        assert_eq!(cell.offer(packet(5), TickId::new(22), now), Verdict::Stale);
        assert_eq!(cell.offer(packet(7), TickId::new(23), now), Verdict::Accept);
        assert_eq!(cell.offer(packet(4), TickId::new(24), now), Verdict::Stale);

        let latest = reader.latest();
        assert_eq!(latest.tick_id(), TickId::new(7));
        assert_eq!(latest.accepted_at_tick, TickId::new(23));
        assert_eq!(latest.age_ticks(TickId::new(30)), 7);
    }

    #[test]
    fn concurrent_writers_keep_the_maximum() {
        let cell = IntentCell::new();
        let now = Instant::now();
        let handles: Vec<_> = (0..4u64)
            .map(|worker| {
                let cell = cell.clone();
                std::thread::spawn(move || {
                    for i in 0..250u64 {
                        let tick = (i * 7 + worker * 13) % 1_000 + 1;
                        cell.offer(packet(tick), TickId::new(i), now);
                    }
                })
            })
            .collect();
        let reader = cell.reader();
        let mut last_seen = TickId::GENESIS;
        for _ in 0..100 {
            let seen = reader.latest().tick_id();
            assert!(seen >= last_seen);
            last_seen = seen;
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let expected = (0..4u64)
            .flat_map(|w| (0..250u64).map(move |i| (i * 7 + w * 13) % 1_000 + 1))
            .max()
            .unwrap();
        assert_eq!(cell.current().tick_id(), TickId::new(expected));
    }
}
