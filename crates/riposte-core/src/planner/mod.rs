//! Bounded asynchronous planning pipeline.
//!
//! [`PlannerPipeline`] turns a stream of [`FutureSnapshot`]s into at most
//! `max_in_flight` concurrent strategy requests. When every slot is busy the
//! newest snapshot is held and older held snapshots are superseded, so the
//! queue never grows past one. Every request carries its own deadline; a
//! request that misses it resolves as [`Completion::TimedOut`] and frees its
//! slot.
//!
//! The pipeline only issues and collects. Deciding what a reply means is the
//! job of [`IntentResolver`](crate::intent::IntentResolver).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use riposte_core::config::PlannerConfig;
//! use riposte_core::metrics::PipelineMetrics;
//! use riposte_core::planner::{PlannerPipeline, ScriptedOracle, ScriptedOracleConfig};
//!
//! # async fn demo(snapshot: riposte_core::predictor::FutureSnapshot) {
//! let oracle = Arc::new(ScriptedOracle::new(ScriptedOracleConfig::default()));
//! let metrics = Arc::new(PipelineMetrics::new());
//! let mut pipeline = PlannerPipeline::new(oracle, &PlannerConfig::default(), metrics);
//!
//! pipeline.offer(snapshot);
//! pipeline.pump(tokio::time::Instant::now());
//! if let Some(completion) = pipeline.next_completion().await {
//!     println!("tick {} resolved", completion.tick_id());
//! }
//! # }
//! ```

mod oracle;
mod process;

pub use oracle::{ScriptedOracle, ScriptedOracleConfig, StrategyRequest, StrategySource};
pub use process::ProcessOracle;

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::PlannerConfig;
use crate::error::OracleError;
use crate::metrics::PipelineMetrics;
use crate::predictor::FutureSnapshot;
use crate::snapshot::TickId;

/// How an issued request ended.
#[derive(Debug)]
pub enum Completion {
    /// The source answered.
    Replied {
        /// Tick of the request.
        tick_id: TickId,
        /// Time from issuance to reply.
        latency: Duration,
        /// Reply text.
        text: String,
    },
    /// The deadline passed first.
    TimedOut {
        /// Tick of the request.
        tick_id: TickId,
        /// The deadline that was exceeded.
        deadline: Duration,
    },
    /// The source failed in transport.
    Failed {
        /// Tick of the request.
        tick_id: TickId,
        /// Time from issuance to failure.
        latency: Duration,
        /// The failure.
        error: OracleError,
    },
}

impl Completion {
    /// Tick of the request this completes.
    #[must_use]
    pub fn tick_id(&self) -> TickId {
        match self {
            Self::Replied { tick_id, .. } | Self::TimedOut { tick_id, .. } | Self::Failed { tick_id, .. } => *tick_id,
        }
    }

    /// Latency sample for the estimator: reply time, or the deadline for a
    /// timeout. Transport failures say nothing about think time.
    #[must_use]
    pub fn round_trip(&self) -> Option<Duration> {
        match self {
            Self::Replied { latency, .. } => Some(*latency),
            Self::TimedOut { deadline, .. } => Some(*deadline),
            Self::Failed { .. } => None,
        }
    }
}

/// Issues strategy requests under a concurrency cap.
pub struct PlannerPipeline {
    source: Arc<dyn StrategySource>,
    metrics: Arc<PipelineMetrics>,
    max_in_flight: usize,
    deadline: Duration,
    min_interval: Duration,
    style_memory: usize,
    tasks: JoinSet<Completion>,
    held: Option<FutureSnapshot>,
    last_issued: Option<TickId>,
    last_issue_at: Option<Instant>,
    notes: VecDeque<String>,
}

impl fmt::Debug for PlannerPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannerPipeline")
            .field("source", &self.source.name())
            .field("in_flight", &self.tasks.len())
            .field("max_in_flight", &self.max_in_flight)
            .field("held", &self.held_tick())
            .field("last_issued", &self.last_issued)
            .finish_non_exhaustive()
    }
}

impl PlannerPipeline {
    /// Creates an idle pipeline.
    #[must_use]
    pub fn new(source: Arc<dyn StrategySource>, config: &PlannerConfig, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            source,
            metrics,
            max_in_flight: config.max_in_flight.max(1),
            deadline: config.request_timeout(),
            min_interval: config.min_issue_interval(),
            style_memory: config.style_memory,
            tasks: JoinSet::new(),
            held: None,
            last_issued: None,
            last_issue_at: None,
            notes: VecDeque::new(),
        }
    }

    /// Offers a snapshot for planning.
    ///
    /// Returns false if it is not newer than the last issued or held
    /// snapshot. A newer snapshot replaces any held one.
    pub fn offer(&mut self, snapshot: FutureSnapshot) -> bool {
        if self.last_issued.is_some_and(|issued| snapshot.tick_id <= issued) {
            return false;
        }
        if let Some(held) = &self.held {
            if snapshot.tick_id <= held.tick_id {
                return false;
            }
            debug!(superseded = %held.tick_id, by = %snapshot.tick_id, "held snapshot superseded");
            self.metrics.record_superseded();
        }
        self.held = Some(snapshot);
        true
    }

    /// Issues the held snapshot if a slot is free and the issue interval
    /// has elapsed. Returns the issued tick.
    pub fn pump(&mut self, now: Instant) -> Option<TickId> {
        if self.tasks.len() >= self.max_in_flight {
            return None;
        }
        if let Some(last) = self.last_issue_at {
            if now.saturating_duration_since(last) < self.min_interval {
                return None;
            }
        }
        let snapshot = self.held.take()?;
        Some(self.issue(snapshot, now))
    }

    fn issue(&mut self, snapshot: FutureSnapshot, now: Instant) -> TickId {
        let tick_id = snapshot.tick_id;
        let request = StrategyRequest {
            tick_id,
            adaptation_features: snapshot.adaptation.clone(),
            snapshot,
            style_note: self.notes.back().cloned(),
        };
        let source = Arc::clone(&self.source);
        let deadline = self.deadline;

        self.tasks.spawn(async move {
            let started = Instant::now();
            match tokio::time::timeout(deadline, source.decide(&request)).await {
                Ok(Ok(text)) => Completion::Replied {
                    tick_id,
                    latency: started.elapsed(),
                    text,
                },
                Ok(Err(error)) => Completion::Failed {
                    tick_id,
                    latency: started.elapsed(),
                    error,
                },
                Err(_) => Completion::TimedOut { tick_id, deadline },
            }
        });

        self.last_issued = Some(tick_id);
        self.last_issue_at = Some(now);
        self.metrics.record_issued();
        self.metrics.set_in_flight(self.tasks.len());
        debug!(tick = %tick_id, in_flight = self.tasks.len(), source = self.source.name(), "strategy request issued");
        tick_id
    }

    /// Waits for the next request to finish, then refills the freed slot.
    ///
    /// Returns `None` when nothing is in flight. Cancel-safe: the only await
    /// point is the join.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        loop {
            let joined = self.tasks.join_next().await?;
            self.metrics.set_in_flight(self.tasks.len());
            match joined {
                Ok(completion) => {
                    self.pump(Instant::now());
                    return Some(completion);
                }
                Err(err) => {
                    warn!(error = %err, "strategy request task did not complete");
                    self.metrics.record_failure();
                    self.pump(Instant::now());
                }
            }
        }
    }

    /// Remembers a reasoning note for later requests.
    pub fn remember(&mut self, note: String) {
        if self.style_memory == 0 {
            return;
        }
        self.notes.push_back(note);
        while self.notes.len() > self.style_memory {
            self.notes.pop_front();
        }
    }

    /// Remembered notes, oldest first.
    pub fn notes(&self) -> impl Iterator<Item = &str> {
        self.notes.iter().map(String::as_str)
    }

    /// Requests currently outstanding.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Tick of the held snapshot, if any.
    #[must_use]
    pub fn held_tick(&self) -> Option<TickId> {
        self.held.as_ref().map(|s| s.tick_id)
    }

    /// Tick of the most recently issued request.
    #[must_use]
    pub fn last_issued(&self) -> Option<TickId> {
        self.last_issued
    }

    /// Drops the held snapshot and aborts every outstanding request.
    pub async fn shutdown(&mut self) {
        self.held = None;
        self.tasks.shutdown().await;
        self.metrics.set_in_flight(0);
    }
}
