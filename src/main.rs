//! Side-bet Decision Engine CLI
//!
//! Query probabilities, inspect zones, replay round history and simulate staking strategies.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use rust_decimal::Decimal;
use sidebet_engine::{
    DecisionEngine, DecisionQuery, EngineConfig, ProbabilityResult, RoundObservation,
    RoundOutcome, RoundTelemetry, RoundTradingFeatures, Simulation, SimulationConfig,
    StakeManager, Zone,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "sidebet-engine")]
#[command(about = "Rug-risk and stake-sizing engine for tick-based side bets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Probability that the round ends within the decision window
    Probability {
        /// Current tick of the round
        #[arg(short, long)]
        tick: u32,

        /// Lookahead in ticks (defaults to the configured decision window)
        #[arg(short, long)]
        window: Option<u32>,

        /// Peak multiplier reached at this tick
        #[arg(short, long)]
        peak: Option<f64>,

        /// Tick at which the round first crossed the abrupt-end threshold
        #[arg(long)]
        crossed_at: Option<u32>,
    },

    /// Show the zone table for the configured payout ratio
    Zones,

    /// Feed completed rounds (JSON lines of {"duration", "peak"}) through the sequence tracker
    Replay {
        /// Path to the JSON-lines file
        file: PathBuf,
    },

    /// Per-round trading features and composite risk from JSON-lines round telemetry
    Trading {
        /// Path to the JSON-lines file ({"duration", "peak", "trades": [...]})
        file: PathBuf,
    },

    /// Probability plus a stake recommendation from a fresh purse
    Advise {
        /// Current tick of the round
        #[arg(short, long)]
        tick: u32,

        /// Peak multiplier reached at this tick
        #[arg(short, long)]
        peak: Option<f64>,

        /// Tick at which the round first crossed the abrupt-end threshold
        #[arg(long)]
        crossed_at: Option<u32>,
    },

    /// Monte Carlo comparison of fixed and Martingale staking
    Simulate {
        /// Number of simulated rounds
        #[arg(short, long, default_value = "1000")]
        rounds: usize,

        /// RNG seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Per-tick stop probability
        #[arg(long, default_value = "0.0005")]
        stop_prob: f64,

        /// Starting purse per round
        #[arg(short, long)]
        bankroll: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let config = EngineConfig::from_env()?;

    match cli.command {
        Commands::Probability { tick, window, peak, crossed_at } => {
            show_probability(&config, tick, window, peak, crossed_at)?
        }
        Commands::Zones => show_zones(&config)?,
        Commands::Replay { file } => replay_rounds(&config, &file)?,
        Commands::Trading { file } => trading_report(&file)?,
        Commands::Advise { tick, peak, crossed_at } => advise(&config, tick, peak, crossed_at)?,
        Commands::Simulate { rounds, seed, stop_prob, bankroll } => {
            simulate(&config, rounds, seed, stop_prob, bankroll.as_deref())?
        }
    }

    Ok(())
}

fn paint(zone: Zone) -> ColoredString {
    let label = zone.to_string();
    match zone {
        Zone::Avoid | Zone::Danger => label.red(),
        Zone::Breakeven => label.yellow(),
        Zone::Profit | Zone::HighProfit => label.green(),
        Zone::Certainty => label.bright_green().bold(),
    }
}

/// A single synthetic observation so the peak reaches the detectors
fn peak_observations(tick: u32, peak: Option<f64>) -> Vec<RoundObservation> {
    peak.map(|p| vec![RoundObservation::new(tick, p)]).unwrap_or_default()
}

fn build_query(tick: u32, observations: &[RoundObservation], crossed_at: Option<u32>) -> DecisionQuery<'_> {
    let query = DecisionQuery::new(tick, observations);
    match crossed_at {
        Some(t) => query.with_peak_crossed_at(t),
        None => query,
    }
}

fn show_probability(
    config: &EngineConfig,
    tick: u32,
    window: Option<u32>,
    peak: Option<f64>,
    crossed_at: Option<u32>,
) -> Result<()> {
    let engine = DecisionEngine::new(config.clone())?;
    let observations = peak_observations(tick, peak);
    let mut query = build_query(tick, &observations, crossed_at);
    if let Some(w) = window {
        query = query.with_window(w);
    }
    let result = engine.evaluate(&query);

    println!("\n{}", "=".repeat(70));
    println!("  RUG PROBABILITY - tick {} | window {} ticks | payout {}:1",
        tick, result.window, config.payout_ratio);
    println!("{}\n", "=".repeat(70));

    print_result(&result);
    Ok(())
}

fn print_result(result: &ProbabilityResult) {
    println!("Base probability:     {:.2}%", result.base_probability * 100.0);
    for adj in &result.adjustments {
        println!("  x {:<20} {:.3}", adj.source.to_string(), adj.multiplier);
    }
    println!("Adjusted probability: {:.2}%", result.adjusted_probability * 100.0);
    if let Some(floor) = &result.floor {
        println!("Floor ({}):   {:.2}% (confidence {:.0}%)",
            floor.source, floor.floor * 100.0, floor.confidence * 100.0);
    }
    println!("Final probability:    {:.2}%{}",
        result.final_probability * 100.0,
        if result.clamped { " (clamped)" } else { "" });
    println!("Zone:                 {} -> {}", paint(result.zone), result.zone.recommendation());
    println!("Expected value:       {:+.3} per unit", result.expected_value);
    println!("Long-round chance:    {:.2}%", result.long_round_probability * 100.0);
    println!();
}

fn show_zones(config: &EngineConfig) -> Result<()> {
    let engine = DecisionEngine::new(config.clone())?;
    let zones = engine.zones();

    println!("\n{}", "=".repeat(70));
    println!("  ZONES - payout {}:1 | breakeven {:.2}%",
        config.payout_ratio, zones.breakeven() * 100.0);
    println!("{}\n", "=".repeat(70));

    for band in zones.bands() {
        if band.is_empty() {
            println!("  {:<22} (empty)", paint(band.zone));
            continue;
        }
        println!("  {:<22} {:>6.2}% - {:>6.2}%  {:<10} EV at top {:+.3}",
            paint(band.zone),
            band.lower * 100.0,
            band.upper * 100.0,
            band.zone.recommendation(),
            zones.expected_value(band.upper));
    }
    println!();
    Ok(())
}

fn replay_rounds(config: &EngineConfig, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let mut engine = DecisionEngine::new(config.clone())?;
    let mut skipped = 0;

    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<RoundOutcome>(line) {
            Ok(outcome) => {
                engine.record_round(outcome);
            }
            Err(e) => {
                warn!("Skipping line {}: {}", line_no + 1, e);
                skipped += 1;
            }
        }
    }

    let tracker = engine.tracker();
    let state = tracker.state();

    println!("\n{}", "=".repeat(70));
    println!("  SEQUENCE REPLAY - {}", file.display());
    println!("{}\n", "=".repeat(70));

    println!("Rounds since long round: {}", state.rounds_since_long);
    println!("Post-long position:      {}", state.post_long_position);
    if let Some(duration) = state.last_long_duration {
        println!("Last long round:         {} ticks, peak {:.2}x",
            duration, state.last_long_peak.unwrap_or(0.0));
    }
    println!("Average gap:             {:.1} rounds", tracker.average_gap());
    println!("Clustering density:      {:.3}", tracker.clustering_density());
    println!("Reliability:             {:.2}", tracker.reliability());

    if let Some(stats) = tracker.statistics() {
        println!("\nLast {} rounds:", stats.count);
        println!("  Duration: mean {:.1} | median {:.1} | min {} | max {}",
            stats.mean_duration, stats.median_duration, stats.min_duration, stats.max_duration);
        println!("  Peak:     mean {:.2}x | median {:.2}x | min {:.2}x | max {:.2}x",
            stats.mean_peak, stats.median_peak, stats.min_peak, stats.max_peak);
        println!("  Instant ends: {} ({:.1}%) | Long rounds: {}",
            stats.instant_end_count, stats.instant_end_rate * 100.0, stats.long_round_count);
    } else {
        println!("\nNo rounds recorded.");
    }

    if skipped > 0 {
        println!("\n{} line(s) skipped", skipped);
    }
    println!();
    Ok(())
}

fn trading_report(file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let mut rows = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<RoundTelemetry>(line) {
            Ok(telemetry) => rows.push(RoundTradingFeatures::from_telemetry(&telemetry)),
            Err(e) => warn!("Skipping line {}: {}", line_no + 1, e),
        }
    }

    println!("\n{}", "=".repeat(70));
    println!("  ROUND TRADING - {} | {} round(s)", file.display(), rows.len());
    println!("{}\n", "=".repeat(70));

    println!("{:>8} {:>8} {:>7} {:>8} {:>9} {:>7} {:>7}",
        "Ticks", "Peak", "Trades", "Players", "Top vol", "Whales", "Risk");
    println!("{}", "-".repeat(60));
    for f in &rows {
        let risk = format!("{:.3}", f.risk.composite);
        println!("{:>8} {:>7.2}x {:>7} {:>8} {:>8.1}% {:>7} {:>7}",
            f.duration,
            f.peak,
            f.total_trades,
            f.unique_players,
            f.top_player_volume_ratio * 100.0,
            f.patterns.whales,
            if f.risk.composite >= 0.5 { risk.red() } else { risk.normal() });
    }

    if !rows.is_empty() {
        let mean_risk = rows.iter().map(|f| f.risk.composite).sum::<f64>() / rows.len() as f64;
        println!("\nMean composite risk: {:.3}", mean_risk);
    }
    println!();
    Ok(())
}

fn advise(config: &EngineConfig, tick: u32, peak: Option<f64>, crossed_at: Option<u32>) -> Result<()> {
    let engine = DecisionEngine::new(config.clone())?;
    let manager = StakeManager::new(config)?;
    let observations = peak_observations(tick, peak);
    let result = engine.evaluate(&build_query(tick, &observations, crossed_at));
    let advice = manager.recommend(&result);

    println!("\n{}", "=".repeat(70));
    println!("  STAKE ADVICE - tick {} | purse {} | level {}",
        tick, manager.purse().capital(), advice.level);
    println!("{}\n", "=".repeat(70));

    print_result(&result);

    match advice.stake() {
        Some(stake) => println!("Action:   {} {}", "PLACE".green().bold(), stake),
        None => println!("Action:   {}", "SKIP".red().bold()),
    }
    if let sidebet_engine::bankroll::StakeAction::Skip { reason } = &advice.action {
        println!("Reason:   {}", reason);
    }
    println!("Standard: {}", advice.standard_stake);
    println!("Kelly:    {:.2}% of purse", advice.kelly_fraction * 100.0);
    for alt in &advice.alternatives {
        println!("  {:<13} {} ({:.2}x Kelly)", alt.label, alt.stake, alt.kelly_multiplier);
    }
    println!("Health:   {} ({:.1}%)", advice.health.band, advice.health.percent_remaining);
    println!();
    Ok(())
}

fn simulate(config: &EngineConfig, rounds: usize, seed: u64, stop_prob: f64, bankroll: Option<&str>) -> Result<()> {
    let bankroll = match bankroll {
        Some(raw) => Decimal::from_str(raw.trim())
            .with_context(|| format!("invalid bankroll: {}", raw))?,
        None => config.bankroll.initial_capital,
    };

    let sim_config = SimulationConfig {
        rounds,
        stop_prob,
        decision_window: config.model.decision_window,
        payout_ratio: config.payout_ratio,
        bankroll,
        fixed_stake: config.bankroll.progression[0],
        progression: config.bankroll.progression.clone(),
        seed,
        ..Default::default()
    };

    info!("Simulating {} rounds (seed {})", rounds, seed);
    let report = Simulation::new(sim_config)?.run();

    println!("\n{}", "=".repeat(70));
    println!("  STRATEGY SIMULATION - {} rounds | stop prob {:.4}/tick", report.rounds, stop_prob);
    println!("{}\n", "=".repeat(70));

    println!("Mean round length:   {:.1} ticks", report.mean_stop_tick);
    println!("Win chance per bet:  {:.2}%", report.win_probability * 100.0);
    let ev = format!("{:+.4}", report.ev_per_bet);
    println!("EV per unit bet:     {}", if report.ev_per_bet >= 0.0 { ev.green() } else { ev.red() });
    println!();

    println!("{:<24} {:>14} {:>14}", "Metric", "Fixed", "Martingale");
    println!("{}", "-".repeat(54));
    let (f, m) = (&report.fixed, &report.martingale);
    println!("{:<24} {:>14.6} {:>14.6}", "Mean final bankroll", f.mean_final_bankroll, m.mean_final_bankroll);
    println!("{:<24} {:>+14.6} {:>+14.6}", "Mean profit/loss", f.mean_profit, m.mean_profit);
    println!("{:<24} {:>14.3} {:>14.3}", "Probability of profit", f.profit_probability, m.profit_probability);
    println!("{:<24} {:>14.3} {:>14.3}", "Probability of ruin", f.ruin_probability, m.ruin_probability);
    println!("{:<24} {:>14.1} {:>14.1}", "Mean bets per round", f.mean_bets, m.mean_bets);
    println!();
    Ok(())
}
