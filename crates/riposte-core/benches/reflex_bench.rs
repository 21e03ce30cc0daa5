use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec2;
use riposte_core::adaptation::AdaptationProfile;
use riposte_core::arena::ArenaGeometry;
use riposte_core::config::{ArenaConfig, EngineConfig, ReflexConfig, SimulationConfig};
use riposte_core::entity::Side;
use riposte_core::intent::CurrentIntent;
use riposte_core::opponent::{OpponentController, OpponentStyle, ScriptedOpponent};
use riposte_core::predictor::Predictor;
use riposte_core::reflex::ReflexExecutor;
use riposte_core::simulation::Simulation;
use tokio::time::Instant;

/// Simulation with a handful of projectiles in flight.
fn busy_simulation() -> Simulation {
    let config = EngineConfig::default();
    let mut sim = Simulation::new(&config);
    for i in 0..6 {
        let y = 200.0 + i as f32 * 40.0;
        sim.arena_mut()
            .spawn_projectile(Side::Opponent, Vec2::new(300.0, y), Vec2::new(420.0, 0.0), 2.5);
    }
    sim
}

fn bench_simulation_step(c: &mut Criterion) {
    let config = EngineConfig::default();
    let mut sim = Simulation::new(&config);
    let mut opponent = ScriptedOpponent::new(OpponentStyle::Strafe, 11);
    let dt = sim.dt();

    c.bench_function("simulation_step", |b| {
        b.iter(|| {
            let commands = opponent.control(sim.arena(), dt);
            let outcome = sim.step(black_box(&commands)).unwrap();
            if outcome.round_over {
                sim.reset_round();
            }
        })
    });
}

fn bench_predict(c: &mut Criterion) {
    let predictor = Predictor::new(&SimulationConfig::default());
    let snapshot = busy_simulation().snapshot();
    let profile = AdaptationProfile::default();

    c.bench_function("predict", |b| {
        b.iter(|| black_box(predictor.predict(&snapshot, black_box(0.45), &profile)))
    });
}

fn bench_reflex_step(c: &mut Criterion) {
    // Default arena keeps the wall probes busy.
    let geometry = Arc::new(ArenaGeometry::from_config(&ArenaConfig::default()));
    let mut reflex = ReflexExecutor::new(ReflexConfig::default(), geometry);
    let snapshot = busy_simulation().snapshot();
    let intent = CurrentIntent::initial(Instant::now());

    c.bench_function("reflex_step", |b| b.iter(|| black_box(reflex.step(&snapshot, &intent))));
}

criterion_group!(benches, bench_simulation_step, bench_predict, bench_reflex_step);
criterion_main!(benches);
