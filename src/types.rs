//! Core types for the side-bet decision engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rounds shorter than this many ticks count as instant ends
pub const INSTANT_END_TICKS: u32 = 11;

/// One tick of an in-progress round, as delivered by the live feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundObservation {
    pub tick: u32,
    /// Running multiplier (>= 1.0)
    pub value: f64,
    /// Volatility statistic reported by the feed, if any
    pub volatility: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl RoundObservation {
    pub fn new(tick: u32, value: f64) -> Self {
        Self {
            tick,
            value,
            volatility: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = Some(volatility);
        self
    }
}

/// Final result of a completed round
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// Final duration in ticks
    pub duration: u32,
    /// Peak multiplier reached during the round
    pub peak: f64,
}

impl RoundOutcome {
    pub fn new(duration: u32, peak: f64) -> Self {
        Self { duration, peak }
    }

    pub fn is_long(&self, threshold: u32) -> bool {
        self.duration >= threshold
    }

    pub fn is_instant_end(&self) -> bool {
        self.duration < INSTANT_END_TICKS
    }
}

/// Risk zone, ordered from least to most favourable for the side bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Zone {
    Avoid,
    Danger,
    Breakeven,
    Profit,
    HighProfit,
    Certainty,
}

impl Zone {
    pub const ALL: [Zone; 6] = [
        Zone::Avoid,
        Zone::Danger,
        Zone::Breakeven,
        Zone::Profit,
        Zone::HighProfit,
        Zone::Certainty,
    ];

    /// Short action tag shown to the player
    pub fn recommendation(&self) -> &'static str {
        match self {
            Zone::Avoid | Zone::Danger => "SKIP",
            Zone::Breakeven => "MINIMUM",
            Zone::Profit => "STANDARD",
            Zone::HighProfit => "STANDARD+",
            Zone::Certainty => "MAXIMUM",
        }
    }

    /// How confident the zone's recommendation is
    pub fn confidence(&self) -> f64 {
        match self {
            Zone::Avoid => 0.9,
            Zone::Danger => 0.7,
            Zone::Breakeven => 0.5,
            Zone::Profit => 0.6,
            Zone::HighProfit => 0.75,
            Zone::Certainty => 0.9,
        }
    }

    /// Whether a stake should be placed at all in this zone
    pub fn is_playable(&self) -> bool {
        *self >= Zone::Breakeven
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Avoid => write!(f, "AVOID"),
            Zone::Danger => write!(f, "DANGER"),
            Zone::Breakeven => write!(f, "BREAKEVEN"),
            Zone::Profit => write!(f, "PROFIT"),
            Zone::HighProfit => write!(f, "HIGH PROFIT"),
            Zone::Certainty => write!(f, "CERTAINTY"),
        }
    }
}

/// Where a probability adjustment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdjustmentSource {
    SequencePosition,
    Cycle,
    Clustering,
    AbruptEnd,
    VolatilitySpike,
    Plateau,
    Recovery,
}

impl fmt::Display for AdjustmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdjustmentSource::SequencePosition => "sequence_position",
            AdjustmentSource::Cycle => "cycle",
            AdjustmentSource::Clustering => "clustering",
            AdjustmentSource::AbruptEnd => "abrupt_end",
            AdjustmentSource::VolatilitySpike => "volatility_spike",
            AdjustmentSource::Plateau => "plateau",
            AdjustmentSource::Recovery => "recovery",
        };
        write!(f, "{}", name)
    }
}

/// A named multiplicative adjustment (always positive)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Adjustment {
    pub source: AdjustmentSource,
    pub multiplier: f64,
}

/// The probability floor that won the max-reduction across triggered detectors
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AppliedFloor {
    pub source: AdjustmentSource,
    pub floor: f64,
    pub confidence: f64,
}

/// Outcome of a decision query. Recomputed on every request, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbabilityResult {
    pub tick: u32,
    /// Lookahead window in ticks
    pub window: u32,
    /// Survival-curve probability of the round ending inside the window
    pub base_probability: f64,
    pub adjustments: Vec<Adjustment>,
    /// Base probability after all multiplicative adjustments, before floors
    pub adjusted_probability: f64,
    pub floor: Option<AppliedFloor>,
    /// Final probability after floors and bounds
    pub final_probability: f64,
    /// Whether the final bounds had to clamp the value
    pub clamped: bool,
    pub zone: Zone,
    /// Expected value of a unit wager at `final_probability`
    pub expected_value: f64,
    /// Probability that this round reaches the long-round threshold
    pub long_round_probability: f64,
    /// Sequence risk multiplier handed to the stake manager
    pub risk_multiplier: f64,
}

impl ProbabilityResult {
    /// Product of all multiplicative adjustments
    pub fn combined_multiplier(&self) -> f64 {
        self.adjustments.iter().map(|a| a.multiplier).product()
    }

    pub fn adjustment(&self, source: AdjustmentSource) -> Option<f64> {
        self.adjustments
            .iter()
            .find(|a| a.source == source)
            .map(|a| a.multiplier)
    }
}
