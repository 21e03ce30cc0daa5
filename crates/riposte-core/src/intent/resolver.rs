//! Turning pipeline completions into intent updates.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::cell::IntentCell;
use super::packet::IntentPacket;
use super::parse::parse_reply;
use super::staleness::Verdict;
use crate::error::IntentError;
use crate::metrics::PipelineMetrics;
use crate::planner::Completion;
use crate::snapshot::TickId;

/// What became of one completion.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The packet replaced the current intent.
    Accepted {
        /// Tick of the accepted packet.
        tick_id: TickId,
        /// Reasoning note carried by the reply.
        note: Option<String>,
    },
    /// The packet was valid but not newer than the current intent.
    Stale {
        /// Tick of the discarded packet.
        tick_id: TickId,
        /// Tick held at the time.
        held: TickId,
        /// Reasoning note carried by the reply.
        note: Option<String>,
    },
    /// The reply failed decoding or validation.
    Malformed {
        /// Tick of the request.
        tick_id: TickId,
        /// Why it was rejected.
        error: IntentError,
    },
    /// The request hit its deadline.
    TimedOut {
        /// Tick of the request.
        tick_id: TickId,
    },
    /// The source failed in transport.
    Failed {
        /// Tick of the request.
        tick_id: TickId,
    },
}

impl Resolution {
    /// Takes the reasoning note, if the reply was valid and had one.
    #[must_use]
    pub fn into_note(self) -> Option<String> {
        match self {
            Self::Accepted { note, .. } | Self::Stale { note, .. } => note,
            _ => None,
        }
    }

    /// Returns true if the current intent changed.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Validates replies and offers them to the intent cell.
#[derive(Debug, Clone)]
pub struct IntentResolver {
    cell: IntentCell,
    metrics: Arc<PipelineMetrics>,
}

impl IntentResolver {
    /// Creates a resolver writing into `cell`.
    #[must_use]
    pub fn new(cell: IntentCell, metrics: Arc<PipelineMetrics>) -> Self {
        Self { cell, metrics }
    }

    /// The cell this resolver writes.
    #[must_use]
    pub fn cell(&self) -> &IntentCell {
        &self.cell
    }

    /// Handles one completion. `now_tick` is the latest simulation tick and
    /// becomes the acceptance tick of a winning packet.
    pub fn handle(&self, completion: Completion, now_tick: TickId) -> Resolution {
        match completion {
            Completion::Replied { tick_id, latency, text } => {
                self.metrics.record_reply(latency);
                let validated =
                    parse_reply(&text).and_then(|reply| Ok((IntentPacket::validate(&reply.intent, tick_id)?, reply.thinking)));
                match validated {
                    Ok((packet, note)) => self.offer(packet, note, now_tick),
                    Err(error) => {
                        self.metrics.record_malformed();
                        warn!(tick = %tick_id, %error, "malformed intent discarded");
                        Resolution::Malformed { tick_id, error }
                    }
                }
            }
            Completion::TimedOut { tick_id, deadline } => {
                self.metrics.record_timeout();
                debug!(tick = %tick_id, deadline_ms = deadline.as_millis(), "strategy request timed out");
                Resolution::TimedOut { tick_id }
            }
            Completion::Failed { tick_id, error, .. } => {
                self.metrics.record_failure();
                warn!(tick = %tick_id, %error, "strategy request failed");
                Resolution::Failed { tick_id }
            }
        }
    }

    fn offer(&self, packet: IntentPacket, note: Option<String>, now_tick: TickId) -> Resolution {
        let tick_id = packet.tick_id;
        match self.cell.offer(packet, now_tick, Instant::now()) {
            Verdict::Accept => {
                self.metrics.record_accepted();
                debug!(tick = %tick_id, at = %now_tick, "intent accepted");
                Resolution::Accepted { tick_id, note }
            }
            Verdict::Stale => {
                let held = self.cell.current().tick_id();
                self.metrics.record_stale();
                debug!(tick = %tick_id, %held, "stale intent discarded");
                Resolution::Stale { tick_id, held, note }
            }
        }
    }
}
