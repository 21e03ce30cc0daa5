//! The async runtime wiring every component together.
//!
//! [`Engine::run`] spawns three tasks that never wait on each other:
//!
//! | Task | Cadence | Reads | Writes |
//! |------|---------|-------|--------|
//! | simulation | `simulation.tick_hz` | control cell, opponent | snapshot cell, profile cell, round cell |
//! | planner | event-driven | snapshot cell, profile cell | [`IntentCell`] |
//! | reflex | `reflex.tick_hz` | snapshot cell, [`IntentCell`], round cell | control cell |
//!
//! All cells are `tokio::sync::watch` channels holding the latest value, so a
//! slow consumer only ever sees fresher data, never a backlog. Planning-path
//! failures end at the [`IntentResolver`]; only a [`SimulationError`] stops
//! the run.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use riposte_core::config::EngineConfig;
//! use riposte_core::opponent::{OpponentStyle, ScriptedOpponent};
//! use riposte_core::planner::{ScriptedOracle, ScriptedOracleConfig};
//! use riposte_core::runtime::{Engine, RunLimits};
//!
//! # async fn demo() -> Result<(), riposte_core::error::EngineError> {
//! let engine = Engine::new(
//!     EngineConfig::default(),
//!     Arc::new(ScriptedOracle::new(ScriptedOracleConfig::default())),
//!     Box::new(ScriptedOpponent::new(OpponentStyle::Strafe, 7)),
//! )?;
//! let report = engine
//!     .run(RunLimits { max_rounds: Some(3), ..RunLimits::default() })
//!     .await?;
//! println!("bot won {} of {} rounds", report.bot_wins(), report.rounds.len());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::adaptation::{AdaptationProfile, AdaptationStore, ObservationWindow, Style};
use crate::config::EngineConfig;
use crate::entity::Side;
use crate::error::{EngineError, SimulationError};
use crate::intent::{IntentCell, IntentReader, IntentResolver};
use crate::metrics::{CombatStats, MetricsSnapshot, PipelineMetrics};
use crate::opponent::OpponentController;
use crate::output::Event;
use crate::planner::{PlannerPipeline, StrategySource};
use crate::predictor::{estimator_from_config, LatencyEstimator, Predictor};
use crate::reflex::{ControlSignal, ReflexExecutor};
use crate::simulation::Simulation;
use crate::snapshot::{StateSnapshot, TickId};

// =============================================================================
// Limits and reports
// =============================================================================

/// When to stop a run. With no limits set the run only ends on a fatal
/// simulation error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunLimits {
    /// Stop after this many completed rounds.
    pub max_rounds: Option<usize>,
    /// Stop after this much wall-clock time.
    pub max_duration: Option<Duration>,
    /// End a round as a draw-on-points after this much simulated time.
    pub round_time_limit: Option<Duration>,
}

/// Outcome of one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    /// 1-based round number.
    pub round: usize,
    /// Surviving side, or `None` for a draw.
    pub winner: Option<Side>,
    /// Simulation ticks the round lasted.
    pub ticks: u64,
    /// Bot HP at the end.
    pub bot_hp: f32,
    /// Opponent HP at the end.
    pub opponent_hp: f32,
    /// True if the round hit the time limit.
    pub timed_out: bool,
    /// Opponent style after folding this round in.
    pub style: Style,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Completed rounds in order.
    pub rounds: Vec<RoundSummary>,
    /// Final metrics.
    pub metrics: MetricsSnapshot,
    /// Final adaptation profile.
    pub profile: AdaptationProfile,
    /// Last simulation tick.
    pub last_tick: TickId,
}

impl RunReport {
    /// Rounds won by the bot.
    #[must_use]
    pub fn bot_wins(&self) -> usize {
        self.rounds.iter().filter(|r| r.winner == Some(Side::Bot)).count()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Owns the configuration and collaborators for one run.
pub struct Engine {
    config: EngineConfig,
    source: Arc<dyn StrategySource>,
    opponent: Box<dyn OpponentController>,
    adaptation: AdaptationStore,
    metrics: Arc<PipelineMetrics>,
    cell: IntentCell,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("source", &self.source.name())
            .field("cell", &self.cell)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Validates `config` and assembles an engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the configuration is invalid.
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn StrategySource>,
        opponent: Box<dyn OpponentController>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            adaptation: AdaptationStore::new(config.adaptation.clone()),
            config,
            source,
            opponent,
            metrics: Arc::new(PipelineMetrics::new()),
            cell: IntentCell::new(),
        })
    }

    /// Starts from a previously saved opponent profile.
    #[must_use]
    pub fn with_profile(mut self, profile: AdaptationProfile) -> Self {
        self.adaptation = AdaptationStore::with_profile(self.config.adaptation.clone(), profile);
        self
    }

    /// Live pipeline counters.
    #[must_use]
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Read handle on the current intent.
    #[must_use]
    pub fn intent_reader(&self) -> IntentReader {
        self.cell.reader()
    }

    /// Runs until a limit is reached.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Simulation`] if the simulation hit a fatal
    /// invariant violation, or [`EngineError::Task`] if a task panicked.
    pub async fn run(self, limits: RunLimits) -> Result<RunReport, EngineError> {
        let Self {
            config,
            source,
            opponent,
            adaptation,
            metrics,
            cell,
        } = self;

        let simulation = Simulation::new(&config);
        let geometry = Arc::clone(simulation.arena().geometry());
        let dt = simulation.dt();

        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(simulation.snapshot()));
        let (control_tx, control_rx) = watch::channel(Arc::new(ControlSignal::idle()));
        let (profile_tx, profile_rx) = watch::channel(adaptation.profile());
        let (round_tx, round_rx) = watch::channel(1usize);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            source = source.name(),
            sim_hz = config.simulation.tick_hz,
            reflex_hz = config.reflex.tick_hz,
            max_in_flight = config.planner.max_in_flight,
            "run starting"
        );

        let planner = PlannerTask {
            pipeline: PlannerPipeline::new(source, &config.planner, Arc::clone(&metrics)),
            resolver: IntentResolver::new(cell.clone(), Arc::clone(&metrics)),
            predictor: Predictor::new(&config.simulation),
            estimator: estimator_from_config(&config.predictor.latency),
            snapshots: snapshot_rx.clone(),
            profiles: profile_rx,
            shutdown: shutdown_rx.clone(),
        };
        let reflex = ReflexTask {
            executor: ReflexExecutor::new(config.reflex.clone(), geometry),
            period: config.reflex.tick_interval(),
            snapshots: snapshot_rx,
            intent: cell.reader(),
            controls: control_tx,
            rounds: round_rx,
            shutdown: shutdown_rx,
        };
        let sim = SimulationTask {
            window: ObservationWindow::new(&config.adaptation),
            period: config.simulation.tick_interval(),
            simulation,
            opponent,
            adaptation,
            controls: control_rx,
            snapshots: snapshot_tx,
            profiles: profile_tx,
            rounds: round_tx,
            limits,
        };

        let planner_handle = tokio::spawn(planner.run());
        let reflex_handle = tokio::spawn(reflex.run());
        let sim_outcome = join("simulation", tokio::spawn(sim.run())).await;

        // Stop the other tasks whatever the simulation outcome was.
        shutdown_tx.send_replace(true);
        join("planner", planner_handle).await?;
        join("reflex", reflex_handle).await?;

        let sim_report = sim_outcome??;
        let last_tick = sim_report.last_tick;
        let current = cell.current();
        let metrics = MetricsSnapshot::new(
            metrics.snapshot(),
            sim_report.combat,
            dt,
            current.age_ticks(last_tick),
            current.age(Instant::now()),
        );

        info!(
            rounds = sim_report.rounds.len(),
            last_tick = %last_tick,
            issued = metrics.pipeline.issued,
            accepted = metrics.pipeline.accepted,
            stale_rate = metrics.stale_discard_rate,
            "run finished"
        );

        Ok(RunReport {
            rounds: sim_report.rounds,
            metrics,
            profile: sim_report.profile,
            last_tick,
        })
    }
}

async fn join<T>(task: &'static str, handle: JoinHandle<T>) -> Result<T, EngineError> {
    handle.await.map_err(|err| EngineError::Task {
        task,
        reason: err.to_string(),
    })
}

fn interval(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

// =============================================================================
// Simulation task
// =============================================================================

struct SimulationTask {
    simulation: Simulation,
    opponent: Box<dyn OpponentController>,
    adaptation: AdaptationStore,
    window: ObservationWindow,
    period: Duration,
    controls: watch::Receiver<Arc<ControlSignal>>,
    snapshots: watch::Sender<Arc<StateSnapshot>>,
    profiles: watch::Sender<AdaptationProfile>,
    /// Number of the round in progress, 1-based.
    rounds: watch::Sender<usize>,
    limits: RunLimits,
}

struct SimulationReport {
    rounds: Vec<RoundSummary>,
    combat: CombatStats,
    profile: AdaptationProfile,
    last_tick: TickId,
}

impl SimulationTask {
    async fn run(mut self) -> Result<SimulationReport, SimulationError> {
        let mut ticker = interval(self.period);
        let started = Instant::now();
        let dt = self.simulation.dt();
        let mut combat = CombatStats::new();
        let mut rounds = Vec::new();
        let mut round_start = self.simulation.tick();

        loop {
            ticker.tick().await;
            if self.limits.max_duration.is_some_and(|limit| started.elapsed() >= limit) {
                break;
            }

            let control = Arc::clone(&self.controls.borrow());
            combat.record_imminent(&control.evading);
            let mut commands = control.to_commands(Side::Bot);
            commands.extend(self.opponent.control(self.simulation.arena(), dt));

            let outcome = self.simulation.step(&commands)?;
            combat.record_events(&outcome.events);
            self.window.observe(self.simulation.arena(), &outcome.events, dt);
            self.snapshots.send_replace(Arc::clone(&outcome.snapshot));

            let ticks = self.simulation.tick() - round_start;
            #[allow(clippy::cast_precision_loss)]
            let elapsed = Duration::from_secs_f64(ticks as f64 * f64::from(dt));
            let timed_out = !outcome.round_over && self.limits.round_time_limit.is_some_and(|limit| elapsed >= limit);
            if !(outcome.round_over || timed_out) {
                continue;
            }

            combat.end_round(ticks);
            let observations = self.window.finish();
            let profile = self.adaptation.end_round(&observations).clone();
            let summary = self.summarize(rounds.len() + 1, &outcome.events, ticks, timed_out, profile.style);
            info!(
                round = summary.round,
                winner = ?summary.winner,
                ticks,
                timed_out,
                style = ?summary.style,
                "round over"
            );
            self.profiles.send_replace(profile);
            rounds.push(summary);

            if self.limits.max_rounds.is_some_and(|max| rounds.len() >= max) {
                break;
            }
            self.opponent.reset();
            self.simulation.reset_round();
            round_start = self.simulation.tick();
            self.rounds.send_replace(rounds.len() + 1);
        }

        Ok(SimulationReport {
            rounds,
            combat,
            profile: self.adaptation.profile(),
            last_tick: TickId::new(self.simulation.tick()),
        })
    }

    fn summarize(&self, round: usize, events: &[Event], ticks: u64, timed_out: bool, style: Style) -> RoundSummary {
        let arena = self.simulation.arena();
        let bot_hp = arena.actor(Side::Bot).combat.hp;
        let opponent_hp = arena.actor(Side::Opponent).combat.hp;
        let winner = events
            .iter()
            .find_map(|e| match e {
                Event::RoundOver { winner } => Some(*winner),
                _ => None,
            })
            .unwrap_or_else(|| {
                if bot_hp > opponent_hp {
                    Some(Side::Bot)
                } else if opponent_hp > bot_hp {
                    Some(Side::Opponent)
                } else {
                    None
                }
            });
        RoundSummary {
            round,
            winner,
            ticks,
            bot_hp,
            opponent_hp,
            timed_out,
            style,
        }
    }
}

// =============================================================================
// Planner task
// =============================================================================

struct PlannerTask {
    pipeline: PlannerPipeline,
    resolver: IntentResolver,
    predictor: Predictor,
    estimator: Box<dyn LatencyEstimator>,
    snapshots: watch::Receiver<Arc<StateSnapshot>>,
    profiles: watch::Receiver<AdaptationProfile>,
    shutdown: watch::Receiver<bool>,
}

impl PlannerTask {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                Some(completion) = self.pipeline.next_completion(), if self.pipeline.in_flight() > 0 => {
                    if let Some(sample) = completion.round_trip() {
                        self.estimator.observe(sample);
                    }
                    let now_tick = self.snapshots.borrow().tick_id;
                    if let Some(note) = self.resolver.handle(completion, now_tick).into_note() {
                        self.pipeline.remember(note);
                    }
                }
                changed = self.snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = Arc::clone(&self.snapshots.borrow_and_update());
                    let profile = self.profiles.borrow().clone();
                    let future = self.predictor.predict(&snapshot, self.estimator.estimate(), &profile);
                    self.pipeline.offer(future);
                    self.pipeline.pump(Instant::now());
                }
            }
        }
        debug!(in_flight = self.pipeline.in_flight(), "planner stopping");
        self.pipeline.shutdown().await;
    }
}

// =============================================================================
// Reflex task
// =============================================================================

struct ReflexTask {
    executor: ReflexExecutor,
    period: Duration,
    snapshots: watch::Receiver<Arc<StateSnapshot>>,
    intent: IntentReader,
    controls: watch::Sender<Arc<ControlSignal>>,
    rounds: watch::Receiver<usize>,
    shutdown: watch::Receiver<bool>,
}

impl ReflexTask {
    async fn run(mut self) {
        let mut ticker = interval(self.period);
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                _ = ticker.tick() => self.tick(),
            }
        }
    }

    fn tick(&mut self) {
        if self.rounds.has_changed().unwrap_or(false) {
            let round = *self.rounds.borrow_and_update();
            debug!(round, "round start, reflex smoother reset");
            self.executor.reset();
        }
        let snapshot = Arc::clone(&self.snapshots.borrow());
        let intent = self.intent.latest();
        let signal = self.executor.step(&snapshot, &intent);
        self.controls.send_replace(Arc::new(signal));
    }
}
