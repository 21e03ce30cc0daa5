//! Test helper functions for building configs, snapshots and strategy sources.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use glam::Vec2;

use crate::adaptation::AdaptationProfile;
use crate::arena::ArenaGeometry;
use crate::config::{ArenaConfig, EngineConfig, PlannerConfig};
use crate::entity::EntityId;
use crate::error::OracleError;
use crate::intent::{CurrentIntent, IntentPacket, ShootSignal};
use crate::metrics::PipelineMetrics;
use crate::planner::{PlannerPipeline, StrategyRequest, StrategySource};
use crate::predictor::FutureSnapshot;
use crate::snapshot::{ActorView, StateSnapshot, Threat, TickId};

// =============================================================================
// Configs and snapshots
// =============================================================================

/// Default config on an 800×600 arena with no interior walls.
pub fn open_config() -> EngineConfig {
    EngineConfig {
        arena: ArenaConfig::open(800.0, 600.0),
        ..EngineConfig::default()
    }
}

/// Actor view with full health and a ready weapon.
pub fn actor_view(position: Vec2, velocity: Vec2) -> ActorView {
    ActorView {
        position,
        velocity,
        hp: 100.0,
        cooldown_remaining: 0.0,
        radius: 16.0,
    }
}

/// Opposing projectile at `position` moving with `velocity`.
pub fn threat(id: u64, position: Vec2, velocity: Vec2) -> Threat {
    Threat {
        id: EntityId::new(id),
        position,
        velocity,
        distance: 0.0,
    }
}

/// Snapshot on the open arena, with obstacle distances measured at `actor`.
pub fn snapshot(tick: u64, actor: ActorView, opponent: ActorView, threats: Vec<Threat>) -> StateSnapshot {
    let geometry = ArenaGeometry::from_config(&ArenaConfig::open(800.0, 600.0));
    StateSnapshot {
        tick_id: TickId::new(tick),
        time_s: 0.0,
        obstacles: geometry.proximity(actor.position),
        actor,
        opponent,
        threats,
    }
}

/// Minimal future snapshot for pipeline tests.
pub fn future(tick: u64) -> FutureSnapshot {
    let view = actor_view(Vec2::new(400.0, 300.0), Vec2::ZERO);
    FutureSnapshot {
        tick_id: TickId::new(tick),
        time_s: 0.0,
        latency_s: 0.0,
        actor: view,
        opponent: view,
        threats: Vec::new(),
        obstacles: snapshot(tick, view, view, Vec::new()).obstacles,
        adaptation: AdaptationProfile::default(),
    }
}

/// A current intent with the given bias.
pub fn intent(tick: u64, dx: f32, dy: f32) -> CurrentIntent {
    CurrentIntent {
        packet: IntentPacket {
            tick_id: TickId::new(tick),
            dx,
            dy,
            shoot: ShootSignal::Fire(false),
            aggression: None,
            goal: None,
        },
        accepted_at_tick: TickId::new(tick),
        accepted_at: tokio::time::Instant::now(),
    }
}

// =============================================================================
// Scheduled strategy source
// =============================================================================

/// Strategy source with a per-tick reply delay.
///
/// Ticks listed as silent never reply. Every reply is a valid directive
/// echoing the request's tick. Tracks how many `decide` calls are running
/// at once.
#[derive(Debug, Default)]
pub struct ScheduledOracle {
    delays: HashMap<u64, Duration>,
    default_delay: Duration,
    silent: Vec<u64>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

struct Running(Arc<AtomicUsize>);

impl Drop for Running {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScheduledOracle {
    /// Replies to every tick after `default_delay`.
    pub fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            ..Self::default()
        }
    }

    /// Replies to `tick` after `delay_ms`.
    pub fn with_delay(mut self, tick: u64, delay_ms: u64) -> Self {
        self.delays.insert(tick, Duration::from_millis(delay_ms));
        self
    }

    /// Never replies to `tick`.
    pub fn with_silence(mut self, tick: u64) -> Self {
        self.silent.push(tick);
        self
    }

    /// Highest number of concurrent `decide` calls observed.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StrategySource for ScheduledOracle {
    fn name(&self) -> &str {
        "scheduled"
    }

    async fn decide(&self, request: &StrategyRequest) -> Result<String, OracleError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _running = Running(Arc::clone(&self.running));

        let tick = request.tick_id.as_u64();
        if self.silent.contains(&tick) {
            std::future::pending::<()>().await;
        }
        let delay = self.delays.get(&tick).copied().unwrap_or(self.default_delay);
        tokio::time::sleep(delay).await;
        Ok(format!(
            "<thinking>reply {tick}</thinking>{{\"dx\": 0.1, \"dy\": 0.0, \"shoot\": false, \"tick_id\": {tick}}}"
        ))
    }
}

/// Pipeline over `source` with the given cap and deadline.
pub fn pipeline_with(
    source: Arc<dyn StrategySource>,
    max_in_flight: usize,
    timeout_ms: u64,
) -> (PlannerPipeline, Arc<PipelineMetrics>) {
    let metrics = Arc::new(PipelineMetrics::new());
    let config = PlannerConfig {
        max_in_flight,
        request_timeout_ms: timeout_ms,
        ..PlannerConfig::default()
    };
    (PlannerPipeline::new(source, &config, Arc::clone(&metrics)), metrics)
}
