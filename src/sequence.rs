//! Cross-round sequence and clustering tracker
//!
//! Remembers how many rounds have passed since the last long round, where the current round sits
//! in the three-round window that follows one, and how densely long rounds have clustered recently.
//! Updated exactly once per completed round.

use crate::config::{PositionAdjustment, SequenceConfig};
use crate::types::RoundOutcome;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Rounds tracked after a qualifying long round
pub const TRACKED_POSITIONS: u8 = 3;

/// Gaps between consecutive long rounds kept for the running average
const GAP_MEMORY: usize = 20;

/// Sequence state, mutated once per completed round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceState {
    pub rounds_since_long: u32,
    /// 0 = not in a tracked sequence, 1..=3 = rounds since a qualifying long round
    pub post_long_position: u8,
    pub last_long_duration: Option<u32>,
    pub last_long_peak: Option<f64>,
    /// Still inside the window that follows a long round
    tracking: bool,
}

/// What one completed round did to the sequence state
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SequenceTransition {
    pub was_long: bool,
    pub previous_position: u8,
    pub position: u8,
    pub rounds_since_long: u32,
}

/// Sequence-derived multipliers for the current round
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SequenceAdjustment {
    pub position: u8,
    /// Position-specific multiplier on the long-round probability
    pub position_long_round: f64,
    /// Position-specific rug risk multiplier
    pub risk_multiplier: f64,
    /// Long-round side cycle multiplier
    pub cycle_multiplier: f64,
    /// Long-round side clustering multiplier
    pub clustering_multiplier: f64,
}

impl SequenceAdjustment {
    /// Combined multiplier on the probability of reaching another long round
    pub fn long_round_multiplier(&self) -> f64 {
        self.position_long_round * self.cycle_multiplier * self.clustering_multiplier
    }
}

/// Summary statistics over the remembered rounds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundStatistics {
    pub count: usize,
    pub mean_duration: f64,
    pub median_duration: f64,
    pub min_duration: u32,
    pub max_duration: u32,
    pub mean_peak: f64,
    pub median_peak: f64,
    pub min_peak: f64,
    pub max_peak: f64,
    pub instant_end_count: usize,
    pub instant_end_rate: f64,
    pub long_round_count: usize,
}

/// Owned tracker instance. One per game stream; no shared state.
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    config: SequenceConfig,
    state: SequenceState,
    history: VecDeque<RoundOutcome>,
    gaps: VecDeque<u32>,
}

impl SequenceTracker {
    pub fn new(config: SequenceConfig) -> Self {
        let capacity = config.history_capacity;
        Self {
            config,
            state: SequenceState::default(),
            history: VecDeque::with_capacity(capacity),
            gaps: VecDeque::with_capacity(GAP_MEMORY),
        }
    }

    pub fn state(&self) -> &SequenceState {
        &self.state
    }

    pub fn position(&self) -> u8 {
        self.state.post_long_position
    }

    pub fn rounds_since_long(&self) -> u32 {
        self.state.rounds_since_long
    }

    pub fn history(&self) -> &VecDeque<RoundOutcome> {
        &self.history
    }

    /// Feed one completed round through the state machine
    pub fn record(&mut self, outcome: RoundOutcome) -> SequenceTransition {
        let previous_position = self.state.post_long_position;
        let was_long = outcome.is_long(self.config.long_round_ticks);

        if was_long {
            if self.state.last_long_duration.is_some() {
                self.push_gap(self.state.rounds_since_long + 1);
            }
            self.state.rounds_since_long = 0;
            // The long round itself is not position 1
            self.state.post_long_position = 0;
            self.state.tracking = true;
            self.state.last_long_duration = Some(outcome.duration);
            self.state.last_long_peak = Some(outcome.peak);
        } else {
            self.state.rounds_since_long = self.state.rounds_since_long.saturating_add(1);
            let (position, tracking) = match (self.state.tracking, self.state.post_long_position) {
                (true, p) if p < TRACKED_POSITIONS => (p + 1, true),
                _ => (0, false),
            };
            self.state.post_long_position = position;
            self.state.tracking = tracking;
        }

        if self.history.len() == self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(outcome);

        let transition = SequenceTransition {
            was_long,
            previous_position,
            position: self.state.post_long_position,
            rounds_since_long: self.state.rounds_since_long,
        };

        debug!(
            "[Sequence] round of {} ticks (long: {}), position {} -> {}, rounds since long {}",
            outcome.duration,
            was_long,
            previous_position,
            transition.position,
            transition.rounds_since_long
        );

        transition
    }

    fn push_gap(&mut self, gap: u32) {
        if self.gaps.len() == GAP_MEMORY {
            self.gaps.pop_front();
        }
        self.gaps.push_back(gap);
    }

    /// Mean rounds between long rounds, or the configured prior before two have been seen
    pub fn average_gap(&self) -> f64 {
        if self.gaps.is_empty() {
            self.config.prior_long_round_gap
        } else {
            self.gaps.iter().map(|&g| g as f64).sum::<f64>() / self.gaps.len() as f64
        }
    }

    /// Share of long rounds among the trailing clustering window
    pub fn clustering_density(&self) -> f64 {
        let window = self.config.clustering_window;
        let long = self
            .history
            .iter()
            .rev()
            .take(window)
            .filter(|o| o.is_long(self.config.long_round_ticks))
            .count();
        long as f64 / window as f64
    }

    /// How much weight the sequence signals deserve: 0.5 with no history, 1.0 once the clustering
    /// window is full
    pub fn reliability(&self) -> f64 {
        if self.history.is_empty() {
            return 0.5;
        }
        let fill = (self.history.len() as f64 / self.config.clustering_window as f64).min(1.0);
        0.5 + 0.5 * fill
    }

    /// Position-specific adjustment; neutral outside a tracked sequence
    pub fn position_adjustment(&self) -> PositionAdjustment {
        match self.state.post_long_position {
            p @ 1..=TRACKED_POSITIONS => self.config.positions[(p - 1) as usize],
            _ => PositionAdjustment::NEUTRAL,
        }
    }

    /// Smooth multiplier on long-round probability from how far into the average gap we are.
    ///
    /// Early in the gap it dampens, near or past the average it amplifies. Neutral until a long
    /// round has been observed.
    pub fn cycle_multiplier(&self) -> f64 {
        if self.state.last_long_duration.is_none() {
            return 1.0;
        }
        let c = &self.config;
        let x = self.state.rounds_since_long as f64 / self.average_gap();
        let sigmoid = 1.0 / (1.0 + (-c.cycle_steepness * (x - c.cycle_midpoint)).exp());
        c.cycle_min + (c.cycle_max - c.cycle_min) * sigmoid
    }

    /// Multiplier on long-round probability from recent clustering relative to the baseline rate.
    /// Neutral until the clustering window has filled.
    pub fn clustering_multiplier(&self) -> f64 {
        let c = &self.config;
        if self.history.len() < c.clustering_window {
            return 1.0;
        }
        let baseline = 1.0 / self.average_gap();
        let relative = (self.clustering_density() - baseline) / baseline;
        (1.0 + c.clustering_sensitivity * relative).clamp(c.clustering_min, c.clustering_max)
    }

    pub fn adjustment(&self) -> SequenceAdjustment {
        let position = self.position_adjustment();
        SequenceAdjustment {
            position: self.state.post_long_position,
            position_long_round: position.long_round_multiplier,
            risk_multiplier: position.risk_multiplier,
            cycle_multiplier: self.cycle_multiplier(),
            clustering_multiplier: self.clustering_multiplier(),
        }
    }

    /// Summary over the remembered rounds; `None` before any round completes
    pub fn statistics(&self) -> Option<RoundStatistics> {
        if self.history.is_empty() {
            return None;
        }
        let count = self.history.len();

        let mut durations: Vec<u32> = self.history.iter().map(|o| o.duration).collect();
        durations.sort_unstable();
        let mut peaks: Vec<f64> = self.history.iter().map(|o| o.peak).collect();
        peaks.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let durations_f: Vec<f64> = durations.iter().map(|&d| d as f64).collect();
        let instant_end_count = self.history.iter().filter(|o| o.is_instant_end()).count();
        let long_round_count = self
            .history
            .iter()
            .filter(|o| o.is_long(self.config.long_round_ticks))
            .count();

        Some(RoundStatistics {
            count,
            mean_duration: durations_f.iter().sum::<f64>() / count as f64,
            median_duration: median(&durations_f),
            min_duration: durations[0],
            max_duration: durations[count - 1],
            mean_peak: peaks.iter().sum::<f64>() / count as f64,
            median_peak: median(&peaks),
            min_peak: peaks[0],
            max_peak: peaks[count - 1],
            instant_end_count,
            instant_end_rate: instant_end_count as f64 / count as f64,
            long_round_count,
        })
    }
}

/// Median of an already sorted, non-empty slice
fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> SequenceTracker {
        SequenceTracker::new(SequenceConfig::default())
    }

    #[test]
    fn test_long_round_then_three_short_rounds() {
        let mut t = tracker();

        let first = t.record(RoundOutcome::new(520, 4.0));
        assert!(first.was_long);
        assert_eq!((t.position(), t.rounds_since_long()), (0, 0));

        let mut seen = Vec::new();
        for duration in [45, 12, 59] {
            t.record(RoundOutcome::new(duration, 1.2));
            seen.push((t.position(), t.rounds_since_long()));
        }
        assert_eq!(seen, vec![(1, 1), (2, 2), (3, 3)]);

        t.record(RoundOutcome::new(30, 1.1));
        assert_eq!(t.position(), 0);
        assert_eq!(t.rounds_since_long(), 4);

        // Stays out of a sequence until the next long round
        t.record(RoundOutcome::new(30, 1.1));
        assert_eq!(t.position(), 0);
    }

    #[test]
    fn test_long_round_inside_sequence_restarts_it() {
        let mut t = tracker();
        t.record(RoundOutcome::new(600, 8.0));
        t.record(RoundOutcome::new(40, 1.5));
        t.record(RoundOutcome::new(510, 6.0));
        assert_eq!(t.position(), 0);
        assert_eq!(t.state().last_long_duration, Some(510));
        t.record(RoundOutcome::new(20, 1.1));
        assert_eq!(t.position(), 1);
    }

    #[test]
    fn test_short_rounds_without_long_round_never_start_a_sequence() {
        let mut t = tracker();
        for _ in 0..5 {
            t.record(RoundOutcome::new(100, 2.0));
        }
        assert_eq!(t.position(), 0);
        assert_eq!(t.rounds_since_long(), 5);
    }

    #[test]
    fn test_position_two_is_distinct() {
        let config = SequenceConfig::default();
        let risks: Vec<f64> = config.positions.iter().map(|p| p.risk_multiplier).collect();
        assert!(risks[1] > risks[0] && risks[1] > risks[2]);

        let mut t = tracker();
        t.record(RoundOutcome::new(505, 3.0));
        t.record(RoundOutcome::new(10, 1.0));
        t.record(RoundOutcome::new(10, 1.0));
        assert_eq!(t.position_adjustment(), config.positions[1]);
    }

    #[test]
    fn test_neutral_defaults_without_history() {
        let t = tracker();
        assert_eq!(t.reliability(), 0.5);
        assert_eq!(t.cycle_multiplier(), 1.0);
        assert_eq!(t.clustering_multiplier(), 1.0);
        assert_eq!(t.position_adjustment(), PositionAdjustment::NEUTRAL);
        assert!(t.statistics().is_none());
        assert_eq!(t.average_gap(), 20.0);
    }

    #[test]
    fn test_cycle_multiplier_is_smooth_and_bounded() {
        let mut t = tracker();
        t.record(RoundOutcome::new(500, 2.0));
        let early = t.cycle_multiplier();

        let mut prev = early;
        for _ in 0..60 {
            t.record(RoundOutcome::new(50, 1.3));
            let m = t.cycle_multiplier();
            assert!(m >= prev - 1e-12);
            assert!(m - prev < 0.1, "jump of {} is not smooth", m - prev);
            assert!((0.70..=1.30).contains(&m));
            prev = m;
        }
        assert!(early < 1.0);
        assert!(prev > 1.0);
    }

    #[test]
    fn test_average_gap_from_observed_long_rounds() {
        let mut t = tracker();
        t.record(RoundOutcome::new(500, 2.0));
        for _ in 0..9 {
            t.record(RoundOutcome::new(50, 1.3));
        }
        t.record(RoundOutcome::new(700, 9.0));
        assert_eq!(t.average_gap(), 10.0);
    }

    #[test]
    fn test_clustering_density_and_multiplier() {
        let mut t = tracker();
        for i in 0..30 {
            let duration = if i % 5 == 0 { 550 } else { 80 };
            t.record(RoundOutcome::new(duration, 2.0));
        }
        assert!((t.clustering_density() - 6.0 / 30.0).abs() < 1e-12);
        // Gaps of 5 rounds observed, so density matches the baseline
        assert!((t.clustering_multiplier() - 1.0).abs() < 1e-9);
        assert_eq!(t.reliability(), 1.0);
    }

    fn record_all(t: &mut SequenceTracker, durations: &[u32]) {
        for &duration in durations {
            t.record(RoundOutcome::new(duration, 2.0));
        }
    }

    /// A long round followed by `gap - 1` short rounds
    fn cycle(gap: usize) -> Vec<u32> {
        let mut rounds = vec![80; gap - 1];
        rounds.push(550);
        rounds
    }

    #[test]
    fn test_dense_cluster_raises_multiplier_to_cap() {
        let mut t = tracker();
        record_all(&mut t, &[550]);
        record_all(&mut t, &cycle(60));
        record_all(&mut t, &cycle(60));
        for _ in 0..3 {
            record_all(&mut t, &cycle(5));
        }
        // Gaps 60, 60, 5, 5, 5 average 27; four long rounds in the last 30
        assert_eq!(t.average_gap(), 27.0);
        assert!((t.clustering_density() - 4.0 / 30.0).abs() < 1e-12);
        assert_eq!(t.clustering_multiplier(), 1.25);
    }

    #[test]
    fn test_moderate_cluster_stays_inside_bounds() {
        let mut t = tracker();
        record_all(&mut t, &[550]);
        record_all(&mut t, &cycle(20));
        record_all(&mut t, &cycle(15));
        record_all(&mut t, &cycle(15));
        let m = t.clustering_multiplier();
        // Density 2/30 against a baseline of 3/50
        assert!((m - (1.0 + 0.5 * (2.0 / 30.0 - 0.06) / 0.06)).abs() < 1e-9);
        assert!(m > 1.0 && m < 1.25);
    }

    #[test]
    fn test_sparse_window_floors_multiplier() {
        let mut t = tracker();
        record_all(&mut t, &[550]);
        record_all(&mut t, &cycle(10));
        record_all(&mut t, &[80; 30]);
        assert_eq!(t.clustering_density(), 0.0);
        assert_eq!(t.clustering_multiplier(), 0.80);
    }

    #[test]
    fn test_history_is_capped() {
        let mut t = tracker();
        for i in 0..150 {
            t.record(RoundOutcome::new(i, 1.5));
        }
        assert_eq!(t.history().len(), 100);
        assert_eq!(t.history().front().map(|o| o.duration), Some(50));
    }

    #[test]
    fn test_statistics() {
        let mut t = tracker();
        for (duration, peak) in [(5, 1.0), (100, 2.0), (300, 4.0), (520, 10.0)] {
            t.record(RoundOutcome::new(duration, peak));
        }
        let stats = t.statistics().unwrap();
        assert_eq!(stats.count, 4);
        assert!((stats.mean_duration - 231.25).abs() < 1e-9);
        assert!((stats.median_duration - 200.0).abs() < 1e-9);
        assert_eq!((stats.min_duration, stats.max_duration), (5, 520));
        assert!((stats.median_peak - 3.0).abs() < 1e-9);
        assert_eq!((stats.min_peak, stats.max_peak), (1.0, 10.0));
        assert_eq!(stats.instant_end_count, 1);
        assert!((stats.instant_end_rate - 0.25).abs() < 1e-9);
        assert_eq!(stats.long_round_count, 1);
    }
}
