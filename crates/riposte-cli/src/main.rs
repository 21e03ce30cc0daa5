//! Headless match runner.
//!
//! Drives the riposte engine against a scripted opponent and prints a run
//! report. The strategy source is either the built-in scripted oracle or an
//! external command that reads a request on stdin and answers on stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use riposte_core::adaptation::AdaptationProfile;
use riposte_core::config::EngineConfig;
use riposte_core::opponent::{OpponentStyle, ScriptedOpponent};
use riposte_core::planner::{ProcessOracle, ScriptedOracle, ScriptedOracleConfig, StrategySource};
use riposte_core::runtime::{Engine, RunLimits, RunReport};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "riposte")]
#[command(about = "Run headless matches against the riposte agent core", long_about = None)]
struct Cli {
    /// Log filter (overrides RUST_LOG), e.g. "debug" or "riposte_core=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one match and print the report
    Run(RunArgs),

    /// Play several seeded matches in parallel and print the aggregate
    Sweep(SweepArgs),

    /// Print the default configuration as JSON
    Config,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Engine configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many rounds
    #[arg(long, default_value_t = 3)]
    rounds: usize,

    /// Stop after this many wall-clock seconds
    #[arg(long)]
    seconds: Option<f64>,

    /// Simulated seconds before a round is scored on points
    #[arg(long, default_value_t = 30.0)]
    round_seconds: f64,

    /// Seed for the opponent and the scripted oracle
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Opponent behaviour: strafe, rush or camp
    #[arg(long, default_value = "strafe")]
    opponent: OpponentStyle,

    /// Strategy source
    #[arg(long, value_enum, default_value_t = OracleKind::Scripted)]
    oracle: OracleKind,

    /// Command line of the external strategy source (with --oracle command)
    #[arg(long)]
    oracle_cmd: Option<String>,

    /// Opponent profile JSON, loaded at start and saved at the end
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long, default_value = "false")]
    json: bool,
}

#[derive(clap::Args)]
struct SweepArgs {
    /// Engine configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of matches
    #[arg(long, default_value_t = 8)]
    matches: u64,

    /// Rounds per match
    #[arg(long, default_value_t = 3)]
    rounds: usize,

    /// Simulated seconds before a round is scored on points
    #[arg(long, default_value_t = 30.0)]
    round_seconds: f64,

    /// Base seed; match `i` uses `seed + i`
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Opponent behaviour: strafe, rush or camp
    #[arg(long, default_value = "strafe")]
    opponent: OpponentStyle,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OracleKind {
    /// Built-in seeded heuristic with simulated latency
    Scripted,
    /// External process, one per request
    Command,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Commands::Run(args) => run(&args),
        Commands::Sweep(args) => sweep(&args),
        Commands::Config => {
            let json = serde_json::to_string_pretty(&EngineConfig::default())?;
            println!("{json}");
            Ok(())
        }
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// =============================================================================
// run
// =============================================================================

fn run(args: &RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let source = strategy_source(args)?;
    let opponent = Box::new(ScriptedOpponent::new(args.opponent, args.seed));

    let mut engine = Engine::new(config, source, opponent).context("failed to build engine")?;
    if let Some(path) = args.profile.as_deref().filter(|p| p.exists()) {
        let profile = load_profile(path)?;
        info!(path = %path.display(), rounds = profile.rounds_observed, style = ?profile.style, "profile loaded");
        engine = engine.with_profile(profile);
    }

    let limits = RunLimits {
        max_rounds: Some(args.rounds),
        max_duration: args.seconds.map(seconds).transpose()?,
        round_time_limit: Some(seconds(args.round_seconds)?),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    let report = runtime.block_on(engine.run(limits))?;

    if let Some(path) = args.profile.as_deref() {
        save_profile(path, &report.profile)?;
        info!(path = %path.display(), "profile saved");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn strategy_source(args: &RunArgs) -> Result<Arc<dyn StrategySource>> {
    match args.oracle {
        OracleKind::Scripted => Ok(Arc::new(ScriptedOracle::new(ScriptedOracleConfig {
            seed: args.seed,
            ..ScriptedOracleConfig::default()
        }))),
        OracleKind::Command => {
            let Some(line) = args.oracle_cmd.as_deref() else {
                bail!("--oracle command requires --oracle-cmd");
            };
            let mut parts = line.split_whitespace().map(str::to_string);
            let Some(program) = parts.next() else {
                bail!("--oracle-cmd is empty");
            };
            Ok(Arc::new(ProcessOracle::new(program, parts.collect())))
        }
    }
}

fn print_report(report: &RunReport) {
    println!("round  winner    ticks   bot_hp  opp_hp  style");
    for round in &report.rounds {
        let winner = round.winner.map_or_else(|| "draw".to_string(), |side| side.to_string());
        let timed_out = if round.timed_out { " (time)" } else { "" };
        println!(
            "{:>5}  {:<8}  {:>5}  {:>7.1}  {:>6.1}  {:?}{timed_out}",
            round.round, winner, round.ticks, round.bot_hp, round.opponent_hp, round.style
        );
    }

    let m = &report.metrics;
    println!();
    println!("bot wins:            {}/{}", report.bot_wins(), report.rounds.len());
    println!(
        "requests:            {} issued, {} accepted, {} stale, {} malformed, {} timed out, {} failed",
        m.pipeline.issued,
        m.pipeline.accepted,
        m.pipeline.stale,
        m.pipeline.malformed,
        m.pipeline.timeouts,
        m.pipeline.failures
    );
    println!(
        "request latency:     {:.0} ms mean ({:.0}..{:.0})",
        m.pipeline.latency.mean_ms, m.pipeline.latency.min_ms, m.pipeline.latency.max_ms
    );
    println!("stale discard rate:  {:.2}", m.stale_discard_rate);
    println!("bot hit rate:        {:.2}", m.hit_rate);
    println!("dodge success rate:  {:.2}", m.dodge_success_rate);
    println!("mean survival:       {:.1} s", m.mean_survival_s);
    println!("intent age at end:   {} ticks", m.intent_age_ticks);
}

// =============================================================================
// sweep
// =============================================================================

fn sweep(args: &SweepArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let limits = RunLimits {
        max_rounds: Some(args.rounds),
        max_duration: None,
        round_time_limit: Some(seconds(args.round_seconds)?),
    };

    let reports: Vec<(u64, Result<RunReport>)> = (0..args.matches)
        .into_par_iter()
        .map(|i| {
            let seed = args.seed.wrapping_add(i);
            (seed, play_match(&config, args.opponent, seed, limits))
        })
        .collect();

    let mut wins = 0;
    let mut rounds = 0;
    for (seed, report) in &reports {
        match report {
            Ok(report) => {
                wins += report.bot_wins();
                rounds += report.rounds.len();
                println!(
                    "seed {seed:>6}: {}/{} rounds won, stale rate {:.2}",
                    report.bot_wins(),
                    report.rounds.len(),
                    report.metrics.stale_discard_rate
                );
            }
            Err(err) => warn!(seed, error = %err, "match failed"),
        }
    }

    if rounds == 0 {
        bail!("no rounds completed");
    }
    #[allow(clippy::cast_precision_loss)]
    let rate = wins as f64 / rounds as f64;
    println!("aggregate win rate: {rate:.3} ({wins}/{rounds})");
    Ok(())
}

/// One headless match on its own single-threaded runtime.
fn play_match(config: &EngineConfig, style: OpponentStyle, seed: u64, limits: RunLimits) -> Result<RunReport> {
    let source = Arc::new(ScriptedOracle::new(ScriptedOracleConfig {
        seed,
        ..ScriptedOracleConfig::default()
    }));
    let engine = Engine::new(config.clone(), source, Box::new(ScriptedOpponent::new(style, seed)))?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    Ok(runtime.block_on(engine.run(limits))?)
}

// =============================================================================
// Files
// =============================================================================

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path).with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn load_profile(path: &Path) -> Result<AdaptationProfile> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read profile {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse profile {}", path.display()))
}

fn save_profile(path: &Path, profile: &AdaptationProfile) -> Result<()> {
    let json = serde_json::to_string_pretty(profile)?;
    std::fs::write(path, json).with_context(|| format!("failed to write profile {}", path.display()))
}

fn seconds(value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("invalid duration {value}"))
}
