//! Monte Carlo strategy simulation under a constant per-tick stop probability
//!
//! Each simulated round starts from a fresh purse, draws its end tick from a geometric
//! distribution (truncated at `max_ticks`) and bets every consecutive decision window until the
//! round ends or the purse can no longer cover the next stake.

use crate::bankroll::{Purse, Settlement, StakeProgression};
use crate::config::payout_decimal;
use crate::error::ConfigError;
use crate::model::geometric_window_probability;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub rounds: usize,
    /// Probability that any single tick ends the round
    pub stop_prob: f64,
    /// Rounds that survive this long end here
    pub max_ticks: u32,
    pub decision_window: u32,
    pub payout_ratio: f64,
    /// Starting purse of every simulated round
    pub bankroll: Decimal,
    /// Stake used by the fixed strategy
    pub fixed_stake: Decimal,
    /// Progression used by the Martingale strategy
    pub progression: Vec<Decimal>,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rounds: 1000,
            stop_prob: 0.0005,
            max_ticks: 1000,
            decision_window: 40,
            payout_ratio: 5.0,
            bankroll: dec!(0.1),
            fixed_stake: dec!(0.001),
            progression: vec![dec!(0.001), dec!(0.002), dec!(0.004), dec!(0.008), dec!(0.016)],
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategySummary {
    pub name: &'static str,
    pub mean_final_bankroll: f64,
    pub mean_profit: f64,
    pub profit_probability: f64,
    /// Share of rounds that ended unable to cover the next stake
    pub ruin_probability: f64,
    pub mean_bets: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub rounds: usize,
    pub mean_stop_tick: f64,
    /// Chance a single window contains the end tick
    pub win_probability: f64,
    /// Expected value of a unit wager at `win_probability`
    pub ev_per_bet: f64,
    pub fixed: StrategySummary,
    pub martingale: StrategySummary,
}

/// Outcome of one strategy over one round
struct RoundResult {
    final_bankroll: Decimal,
    bets: usize,
    ruined: bool,
}

pub struct Simulation {
    config: SimulationConfig,
    payout: Decimal,
    fixed: StakeProgression,
    martingale: StakeProgression,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        let payout = payout_decimal(config.payout_ratio)?;
        if config.decision_window == 0 {
            return Err(ConfigError::ZeroDecisionWindow);
        }
        if config.rounds == 0 {
            return Err(ConfigError::WindowTooSmall {
                name: "rounds",
                min: 1,
            });
        }
        if config.bankroll <= Decimal::ZERO {
            return Err(ConfigError::InvalidInitialCapital(config.bankroll));
        }
        let fixed = StakeProgression::new(vec![config.fixed_stake])?;
        let martingale = StakeProgression::new(config.progression.clone())?;

        Ok(Self {
            config,
            payout,
            fixed,
            martingale,
        })
    }

    /// Draw one end tick: trials until the first stop, truncated at `max_ticks`
    pub fn sample_stop_tick<R: Rng>(&self, rng: &mut R) -> u32 {
        let p = self.config.stop_prob;
        let max = self.config.max_ticks.max(1);
        if p >= 1.0 {
            return 1;
        }
        if p <= 0.0 {
            return max;
        }
        // Inverse CDF on (0, 1]
        let u: f64 = 1.0 - rng.gen::<f64>();
        let ticks = (u.ln() / (1.0 - p).ln()).ceil().max(1.0);
        if ticks >= max as f64 {
            max
        } else {
            ticks as u32
        }
    }

    pub fn run(&self) -> SimulationReport {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let stops: Vec<u32> = (0..self.config.rounds)
            .map(|_| self.sample_stop_tick(&mut rng))
            .collect();

        let fixed: Vec<RoundResult> = stops.iter().map(|&s| self.play(&self.fixed, s)).collect();
        let martingale: Vec<RoundResult> = stops
            .iter()
            .map(|&s| self.play(&self.martingale, s))
            .collect();

        let win_probability =
            geometric_window_probability(self.config.stop_prob, self.config.decision_window);
        let report = SimulationReport {
            rounds: stops.len(),
            mean_stop_tick: stops.iter().map(|&s| s as f64).sum::<f64>() / stops.len() as f64,
            win_probability,
            ev_per_bet: win_probability * self.config.payout_ratio - (1.0 - win_probability),
            fixed: self.summarize("Fixed", &fixed),
            martingale: self.summarize("Martingale", &martingale),
        };

        info!(
            "[Simulation] {} rounds: fixed mean P/L {:.6}, martingale mean P/L {:.6}",
            report.rounds, report.fixed.mean_profit, report.martingale.mean_profit
        );

        report
    }

    /// Bet every window of one round through a fresh purse
    fn play(&self, progression: &StakeProgression, stop_tick: u32) -> RoundResult {
        let mut purse = Purse::new(self.config.bankroll, self.payout, progression.clone(), None);
        let window = self.config.decision_window;
        let mut bets = 0;
        let mut t = 0u32;
        let mut ruined = false;

        while t < stop_tick {
            if purse.place_stake(purse.standard_stake()).is_err() {
                ruined = true;
                break;
            }
            bets += 1;

            let won = stop_tick <= t.saturating_add(window);
            match purse.record_outcome(won) {
                Ok(Settlement::Won { .. }) => break,
                Ok(_) => {}
                Err(_) => break,
            }
            t = t.saturating_add(window);
        }

        RoundResult {
            final_bankroll: purse.capital(),
            bets,
            ruined,
        }
    }

    fn summarize(&self, name: &'static str, results: &[RoundResult]) -> StrategySummary {
        let n = results.len().max(1) as f64;
        let initial = self.config.bankroll.to_f64().unwrap_or(0.0);
        let finals: Vec<f64> = results
            .iter()
            .map(|r| r.final_bankroll.to_f64().unwrap_or(0.0))
            .collect();

        StrategySummary {
            name,
            mean_final_bankroll: finals.iter().sum::<f64>() / n,
            mean_profit: finals.iter().map(|f| f - initial).sum::<f64>() / n,
            profit_probability: results
                .iter()
                .filter(|r| r.final_bankroll > self.config.bankroll)
                .count() as f64
                / n,
            ruin_probability: results.iter().filter(|r| r.ruined).count() as f64 / n,
            mean_bets: results.iter().map(|r| r.bets as f64).sum::<f64>() / n,
        }
    }
}
