//! Configuration management for the decision engine

use crate::error::ConfigError;
use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Engine configuration. Every recognized option with its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Payout ratio of the side bet (5 = 5:1)
    pub payout_ratio: f64,

    /// Survival model settings
    pub model: ModelConfig,

    /// Cross-round sequence tracking
    pub sequence: SequenceConfig,

    /// Pattern detector thresholds
    pub detectors: DetectorConfig,

    /// Zone boundaries
    pub zones: ZoneConfig,

    /// Purse and stake sizing
    pub bankroll: BankrollConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            payout_ratio: 5.0,
            model: ModelConfig::default(),
            sequence: SequenceConfig::default(),
            detectors: DetectorConfig::default(),
            zones: ZoneConfig::default(),
            bankroll: BankrollConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Lookahead window in ticks (default: 40)
    pub decision_window: u32,
    /// Cap on the base probability (default: 0.96, None disables)
    pub probability_cap: Option<f64>,
    /// Lower bound of the final probability (default: 0.01)
    pub min_probability: f64,
    /// Upper bound of the final probability (default: 0.98)
    pub max_probability: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            decision_window: 40,
            probability_cap: Some(0.96),
            min_probability: 0.01,
            max_probability: 0.98,
        }
    }
}

/// Multipliers attached to one post-long-round position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionAdjustment {
    /// Scales the probability of another long round
    pub long_round_multiplier: f64,
    /// Scales rug risk; also consumed by the stake manager
    pub risk_multiplier: f64,
}

impl PositionAdjustment {
    pub const NEUTRAL: PositionAdjustment = PositionAdjustment {
        long_round_multiplier: 1.0,
        risk_multiplier: 1.0,
    };
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Duration at or above which a round counts as long (default: 500)
    pub long_round_ticks: u32,
    /// Completed rounds kept in memory (default: 100)
    pub history_capacity: usize,
    /// Trailing rounds used for clustering density (default: 30)
    pub clustering_window: usize,
    /// Average rounds between long rounds until two have been observed (default: 20)
    pub prior_long_round_gap: f64,
    /// Adjustments for positions 1, 2 and 3 after a long round
    pub positions: [PositionAdjustment; 3],
    /// Cycle multiplier range (default: 0.70 to 1.30)
    pub cycle_min: f64,
    pub cycle_max: f64,
    /// Logistic steepness and midpoint over rounds_since / average_gap (default: 8, 0.75)
    pub cycle_steepness: f64,
    pub cycle_midpoint: f64,
    /// How strongly clustering density moves the long-round multiplier (default: 0.5)
    pub clustering_sensitivity: f64,
    /// Clustering multiplier range (default: 0.80 to 1.25)
    pub clustering_min: f64,
    pub clustering_max: f64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            long_round_ticks: 500,
            history_capacity: 100,
            clustering_window: 30,
            prior_long_round_gap: 20.0,
            cycle_min: 0.70,
            cycle_max: 1.30,
            cycle_steepness: 8.0,
            cycle_midpoint: 0.75,
            clustering_sensitivity: 0.5,
            clustering_min: 0.80,
            clustering_max: 1.25,
            positions: [
                PositionAdjustment {
                    long_round_multiplier: 0.85,
                    risk_multiplier: 1.10,
                },
                // Position 2 carries the highest early-termination risk
                PositionAdjustment {
                    long_round_multiplier: 0.70,
                    risk_multiplier: 1.30,
                },
                PositionAdjustment {
                    long_round_multiplier: 0.90,
                    risk_multiplier: 1.05,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub abrupt_end: AbruptEndConfig,
    pub volatility: VolatilityConfig,
    pub plateau: PlateauConfig,
    pub recovery: RecoveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbruptEndConfig {
    pub enabled: bool,
    /// Peak multiplier that arms the detector (default: 50x)
    pub peak_threshold: f64,
    /// Ticks after the first crossing during which the floor holds (default: 40)
    pub window_ticks: u32,
    pub floor: f64,
    pub confidence: f64,
}

impl Default for AbruptEndConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            peak_threshold: 50.0,
            window_ticks: 40,
            floor: 0.84,
            confidence: 0.85,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityConfig {
    pub enabled: bool,
    /// Trailing observations averaged for the reference volatility (default: 10)
    pub lookback: usize,
    /// Readings required before the detector speaks (default: 3)
    pub min_samples: usize,
    /// Ratio at which the floor applies (default: 2.5)
    pub spike_ratio: f64,
    pub spike_floor: f64,
    /// Ratio at which a mild multiplier applies (default: 1.5)
    pub elevated_ratio: f64,
    /// Multiplier gained per unit of ratio above 1.0 (default: 0.1)
    pub elevated_slope: f64,
    pub max_elevated_multiplier: f64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookback: 10,
            min_samples: 3,
            spike_ratio: 2.5,
            spike_floor: 0.78,
            elevated_ratio: 1.5,
            elevated_slope: 0.1,
            max_elevated_multiplier: 1.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateauConfig {
    pub enabled: bool,
    /// Observations that must sit inside the band (default: 10)
    pub window: usize,
    /// Range/mean below which the value counts as stuck (default: 0.02)
    pub max_relative_range: f64,
    pub base_multiplier: f64,
    /// Extra multiplier per observation the plateau outlasts the window (default: 0.01)
    pub per_tick_penalty: f64,
    pub max_multiplier: f64,
}

impl Default for PlateauConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: 10,
            max_relative_range: 0.02,
            base_multiplier: 1.10,
            per_tick_penalty: 0.01,
            max_multiplier: 1.35,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    pub enabled: bool,
    /// Minimum drawdown from the prior peak (default: 0.30)
    pub min_dip: f64,
    /// Share of the prior peak the value must regain (default: 0.80)
    pub recovery_fraction: f64,
    pub multiplier: f64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_dip: 0.30,
            recovery_fraction: 0.80,
            multiplier: 0.85,
        }
    }
}

/// Zone boundaries as multiples of the breakeven probability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Upper edges of Avoid, Danger, Breakeven, Profit and HighProfit.
    /// The Breakeven edge must be 1.0 so it lands on the breakeven probability.
    pub breakeven_multiples: [f64; 5],
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            breakeven_multiples: [0.5, 0.75, 1.0, 1.5, 2.5],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankrollConfig {
    /// Starting purse (default: 0.1)
    pub initial_capital: Decimal,
    /// Standard stake per Martingale level, level 1 first
    pub progression: Vec<Decimal>,
    /// Smallest stake ever recommended (default: 0.001)
    pub min_stake: Decimal,
    /// Share of full Kelly used for alternatives (default: 0.25)
    pub kelly_multiplier: f64,
    /// Share of initial capital below which the purse is in emergency (default: 0.20)
    pub emergency_threshold: f64,
    /// Largest total one escalation may stake; a loss that would push past it ends the sequence
    pub max_sequence_loss: Option<Decimal>,
}

impl Default for BankrollConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(0.1),
            progression: vec![dec!(0.001), dec!(0.002), dec!(0.004), dec!(0.008), dec!(0.016)],
            min_stake: dec!(0.001),
            kelly_multiplier: 0.25,
            emergency_threshold: 0.20,
            max_sequence_loss: None,
        }
    }
}

impl BankrollConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capital <= Decimal::ZERO {
            return Err(ConfigError::InvalidInitialCapital(self.initial_capital));
        }
        let first_step = *self.progression.first().ok_or(ConfigError::EmptyProgression)?;
        if let Some(level) = self
            .progression
            .iter()
            .enumerate()
            .position(|(i, step)| *step <= Decimal::ZERO || (i > 0 && *step <= self.progression[i - 1]))
        {
            return Err(ConfigError::InvalidProgression { level: level + 1 });
        }
        if self.min_stake > first_step {
            return Err(ConfigError::MinStakeAboveProgression {
                min_stake: self.min_stake,
                first_step,
            });
        }
        if !(self.kelly_multiplier > 0.0 && self.kelly_multiplier <= 1.0) {
            return Err(ConfigError::InvalidKellyMultiplier(self.kelly_multiplier));
        }
        if !(self.emergency_threshold > 0.0 && self.emergency_threshold < 1.0) {
            return Err(ConfigError::InvalidEmergencyThreshold(self.emergency_threshold));
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Some(ratio) = env_parse::<f64>("SIDEBET_PAYOUT_RATIO") {
            config.payout_ratio = ratio;
        }
        if let Some(ticks) = env_parse::<u32>("SIDEBET_LONG_ROUND_TICKS") {
            config.sequence.long_round_ticks = ticks;
        }
        if let Some(window) = env_parse::<u32>("SIDEBET_DECISION_WINDOW") {
            config.model.decision_window = window;
            config.detectors.abrupt_end.window_ticks = window;
        }
        if let Some(progression) = env::var("SIDEBET_PROGRESSION")
            .ok()
            .and_then(|v| parse_progression(&v))
        {
            config.bankroll.progression = progression;
        }
        if let Some(multiplier) = env_parse::<f64>("SIDEBET_KELLY_MULTIPLIER") {
            config.bankroll.kelly_multiplier = multiplier;
        }
        if let Some(threshold) = env_parse::<f64>("SIDEBET_EMERGENCY_THRESHOLD") {
            config.bankroll.emergency_threshold = threshold;
        }
        if let Some(capital) = env::var("SIDEBET_INITIAL_CAPITAL")
            .ok()
            .and_then(|v| Decimal::from_str(v.trim()).ok())
        {
            config.bankroll.initial_capital = capital;
        }
        if let Some(min_stake) = env::var("SIDEBET_MIN_STAKE")
            .ok()
            .and_then(|v| Decimal::from_str(v.trim()).ok())
        {
            config.bankroll.min_stake = min_stake;
        }
        if let Ok(cap) = env::var("SIDEBET_PROBABILITY_CAP") {
            if cap.trim().eq_ignore_ascii_case("none") {
                config.model.probability_cap = None;
            } else if let Ok(cap) = cap.trim().parse() {
                config.model.probability_cap = Some(cap);
            }
        }

        if let Err(e) = config.validate() {
            anyhow::bail!("invalid engine configuration: {}", e);
        }

        Ok(config)
    }

    /// Check every option once, before any component is built
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.payout_ratio.is_finite() && self.payout_ratio > 1.0) {
            return Err(ConfigError::InvalidPayoutRatio(self.payout_ratio));
        }

        let model = &self.model;
        if model.decision_window == 0 {
            return Err(ConfigError::ZeroDecisionWindow);
        }
        if !(0.0..=1.0).contains(&model.min_probability)
            || !(0.0..=1.0).contains(&model.max_probability)
            || model.min_probability >= model.max_probability
        {
            return Err(ConfigError::InvalidProbabilityBounds {
                min: model.min_probability,
                max: model.max_probability,
            });
        }
        if let Some(cap) = model.probability_cap {
            if !(cap > 0.0 && cap <= 1.0) {
                return Err(ConfigError::InvalidProbabilityCap(cap));
            }
        }

        let sequence = &self.sequence;
        if sequence.long_round_ticks == 0 {
            return Err(ConfigError::ZeroLongRoundThreshold);
        }
        if sequence.clustering_window == 0 {
            return Err(ConfigError::WindowTooSmall {
                name: "clustering_window",
                min: 1,
            });
        }
        if sequence.history_capacity < sequence.clustering_window {
            return Err(ConfigError::WindowTooSmall {
                name: "history_capacity",
                min: sequence.clustering_window,
            });
        }
        let multipliers_positive = sequence
            .positions
            .iter()
            .all(|p| p.long_round_multiplier > 0.0 && p.risk_multiplier > 0.0);
        if !multipliers_positive
            || !(sequence.prior_long_round_gap > 0.0)
            || !(sequence.cycle_min > 0.0 && sequence.cycle_min <= sequence.cycle_max)
            || !(sequence.clustering_min > 0.0 && sequence.clustering_min <= sequence.clustering_max)
        {
            return Err(ConfigError::InvalidSequenceMultipliers);
        }

        let detectors = &self.detectors;
        if detectors.volatility.lookback < 2 || detectors.volatility.min_samples == 0 {
            return Err(ConfigError::WindowTooSmall {
                name: "volatility.lookback",
                min: 2,
            });
        }
        if detectors.plateau.window < 2 {
            return Err(ConfigError::WindowTooSmall {
                name: "plateau.window",
                min: 2,
            });
        }

        let multiples = &self.zones.breakeven_multiples;
        if multiples[0] <= 0.0
            || multiples.windows(2).any(|w| w[1] <= w[0])
            || (multiples[2] - 1.0).abs() > f64::EPSILON
        {
            return Err(ConfigError::InvalidZoneMultipliers);
        }

        self.bankroll.validate()
    }
}

/// Payout ratio as a decimal for purse settlement
pub fn payout_decimal(payout_ratio: f64) -> Result<Decimal, ConfigError> {
    if !(payout_ratio.is_finite() && payout_ratio > 1.0) {
        return Err(ConfigError::InvalidPayoutRatio(payout_ratio));
    }
    Decimal::from_f64_retain(payout_ratio)
        .map(|d| d.normalize())
        .ok_or(ConfigError::InvalidPayoutRatio(payout_ratio))
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse a comma-separated stake progression, e.g. `0.001,0.002,0.004`
pub fn parse_progression(raw: &str) -> Option<Vec<Decimal>> {
    let steps: Option<Vec<Decimal>> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| Decimal::from_str(s).ok())
        .collect();
    steps.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_payout() {
        let config = EngineConfig {
            payout_ratio: 1.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidPayoutRatio(1.0)));
    }

    #[test]
    fn test_rejects_non_increasing_progression() {
        let mut config = EngineConfig::default();
        config.bankroll.progression = vec![dec!(0.001), dec!(0.002), dec!(0.002)];
        assert_eq!(config.validate(), Err(ConfigError::InvalidProgression { level: 3 }));

        config.bankroll.progression.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyProgression));
    }

    #[test]
    fn test_rejects_min_stake_above_first_step() {
        let mut config = EngineConfig::default();
        config.bankroll.min_stake = dec!(0.01);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MinStakeAboveProgression { .. })
        ));
    }

    #[test]
    fn test_rejects_kelly_and_emergency_out_of_range() {
        let mut config = EngineConfig::default();
        config.bankroll.kelly_multiplier = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidKellyMultiplier(_))));

        let mut config = EngineConfig::default();
        config.bankroll.emergency_threshold = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidEmergencyThreshold(_))));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let mut config = EngineConfig::default();
        config.model.min_probability = 0.9;
        config.model.max_probability = 0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProbabilityBounds { .. })
        ));
    }

    #[test]
    fn test_zone_multiples_must_anchor_breakeven() {
        let mut config = EngineConfig::default();
        config.zones.breakeven_multiples = [0.5, 0.75, 1.1, 1.5, 2.5];
        assert_eq!(config.validate(), Err(ConfigError::InvalidZoneMultipliers));
    }

    #[test]
    fn test_parse_progression() {
        let steps = parse_progression("0.001, 0.002,0.004").unwrap();
        assert_eq!(steps, vec![dec!(0.001), dec!(0.002), dec!(0.004)]);
        assert!(parse_progression("0.001,abc").is_none());
        assert!(parse_progression("").is_none());
    }

    #[test]
    fn test_payout_decimal() {
        assert_eq!(payout_decimal(EngineConfig::default().payout_ratio).unwrap(), dec!(5));
        assert_eq!(payout_decimal(2.5).unwrap(), dec!(2.5));
        assert!(payout_decimal(1.0).is_err());
        assert!(payout_decimal(f64::NAN).is_err());
    }
}
