//! Tick-level feature extraction for offline model training
//!
//! Pure consumer of the engine: it reads probability results and tracker state and never feeds
//! anything back.

pub mod trading;

pub use trading::{RoundTelemetry, RoundTradingFeatures, TradingPattern};

use crate::engine::{DecisionEngine, DecisionQuery};
use crate::types::{RoundObservation, RoundOutcome, Zone, INSTANT_END_TICKS};
use serde::Serialize;

/// Trailing values used for the rolling change statistics
pub const VOLATILITY_WINDOW: usize = 10;

/// Ticks before the end that count as "near end"
const NEAR_END_TICKS: u32 = 5;
const VERY_NEAR_END_TICKS: u32 = 2;

/// Statistics over absolute tick-to-tick changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ChangeStats {
    pub avg_change: f64,
    /// Sample standard deviation of the changes
    pub volatility: f64,
    pub max_change: f64,
}

/// Change statistics over a value series. Zero for fewer than two values; volatility needs
/// at least two changes.
pub fn change_stats(values: &[f64]) -> ChangeStats {
    if values.len() < 2 {
        return ChangeStats::default();
    }
    let changes: Vec<f64> = values.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let n = changes.len() as f64;
    let avg_change = changes.iter().sum::<f64>() / n;
    let max_change = changes.iter().cloned().fold(0.0, f64::max);
    let volatility = if changes.len() > 1 {
        let var = changes.iter().map(|c| (c - avg_change).powi(2)).sum::<f64>() / (n - 1.0);
        var.sqrt()
    } else {
        0.0
    };

    ChangeStats {
        avg_change,
        volatility,
        max_change,
    }
}

/// Volatility over the trailing `VOLATILITY_WINDOW` values
pub fn rolling_volatility(values: &[f64]) -> f64 {
    let start = values.len().saturating_sub(VOLATILITY_WINDOW);
    change_stats(&values[start..]).volatility
}

/// Labels known only once the round has ended
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickLabels {
    pub final_tick: u32,
    pub ticks_to_end: u32,
    /// tick / final_tick
    pub position_ratio: f64,
    pub near_end: bool,
    pub very_near_end: bool,
    pub instant_end: bool,
}

impl TickLabels {
    pub fn new(tick: u32, final_tick: u32) -> Self {
        let ticks_to_end = final_tick.saturating_sub(tick);
        Self {
            final_tick,
            ticks_to_end,
            position_ratio: tick as f64 / final_tick.max(1) as f64,
            near_end: ticks_to_end <= NEAR_END_TICKS,
            very_near_end: ticks_to_end <= VERY_NEAR_END_TICKS,
            instant_end: final_tick < INSTANT_END_TICKS,
        }
    }
}

/// One flat training record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickFeatures {
    pub tick: u32,
    pub value: f64,
    pub peak_so_far: f64,
    pub peak_ratio: f64,
    pub change_1tick: f64,
    pub change_5tick: f64,
    /// Second difference over the last three values
    pub velocity: f64,
    pub rolling_volatility: f64,
    pub rolling_avg_change: f64,
    pub rolling_max_change: f64,

    pub base_probability: f64,
    pub final_probability: f64,
    pub zone: Zone,
    pub rounds_since_long: u32,
    pub post_long_position: u8,
    pub clustering_density: f64,

    pub labels: Option<TickLabels>,
}

pub struct FeatureExtractor<'a> {
    engine: &'a DecisionEngine,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(engine: &'a DecisionEngine) -> Self {
        Self { engine }
    }

    /// Features at the last observation of `observations`; `None` when empty
    pub fn extract(&self, observations: &[RoundObservation]) -> Option<TickFeatures> {
        let current = observations.last()?;
        let values: Vec<f64> = observations.iter().map(|o| o.value).collect();
        let i = values.len() - 1;

        let peak_so_far = values.iter().cloned().fold(0.0, f64::max);
        let relative = |from: f64| (current.value - from) / from.max(0.001);
        let change_1tick = if i >= 1 { relative(values[i - 1]) } else { 0.0 };
        let change_5tick = if i >= 5 { relative(values[i - 5]) } else { 0.0 };
        let velocity = if i >= 2 {
            (values[i] - values[i - 1]) - (values[i - 1] - values[i - 2])
        } else {
            0.0
        };

        let start = values.len().saturating_sub(VOLATILITY_WINDOW);
        let stats = change_stats(&values[start..]);

        let query = DecisionQuery::new(current.tick, observations).with_peak(peak_so_far);
        let result = self.engine.evaluate(&query);
        let tracker = self.engine.tracker();

        Some(TickFeatures {
            tick: current.tick,
            value: current.value,
            peak_so_far,
            peak_ratio: current.value / peak_so_far.max(0.001),
            change_1tick,
            change_5tick,
            velocity,
            rolling_volatility: stats.volatility,
            rolling_avg_change: stats.avg_change,
            rolling_max_change: stats.max_change,
            base_probability: result.base_probability,
            final_probability: result.final_probability,
            zone: result.zone,
            rounds_since_long: tracker.rounds_since_long(),
            post_long_position: tracker.position(),
            clustering_density: tracker.clustering_density(),
            labels: None,
        })
    }

    /// One record per observation, each computed from the observations up to it.
    /// Labels are attached when the outcome is known.
    pub fn extract_round(
        &self,
        observations: &[RoundObservation],
        outcome: Option<&RoundOutcome>,
    ) -> Vec<TickFeatures> {
        (1..=observations.len())
            .filter_map(|end| self.extract(&observations[..end]))
            .map(|mut features| {
                features.labels = outcome.map(|o| TickLabels::new(features.tick, o.duration));
                features
            })
            .collect()
    }
}
