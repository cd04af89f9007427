//! Error types for calibration, configuration and stake handling

use rust_decimal::Decimal;
use thiserror::Error;

/// Malformed calibration data. Raised at construction, never at query time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("calibration table `{table}` is empty")]
    Empty { table: &'static str },

    #[error("calibration table `{table}` has {milestones} milestones but {values} values")]
    LengthMismatch {
        table: &'static str,
        milestones: usize,
        values: usize,
    },

    #[error("calibration table `{table}` milestones must strictly increase (index {index})")]
    NonMonotonicMilestones { table: &'static str, index: usize },

    #[error("calibration table `{table}` value {value} at index {index} is outside [0, 1]")]
    OutOfRange {
        table: &'static str,
        index: usize,
        value: f64,
    },

    #[error("survival curve must be non-increasing (index {index})")]
    SurvivalIncreases { index: usize },

    #[error("long-round curve must be non-decreasing (index {index})")]
    LongRoundDecreases { index: usize },

    #[error("calibration tables must share the same milestones")]
    MilestoneMismatch,

    #[error("tail slope cap must be finite and non-negative, got {0}")]
    InvalidTailSlope(f64),
}

/// Invalid engine or bankroll configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("payout ratio must be greater than 1, got {0}")]
    InvalidPayoutRatio(f64),

    #[error("decision window must be at least one tick")]
    ZeroDecisionWindow,

    #[error("long-round threshold must be at least one tick")]
    ZeroLongRoundThreshold,

    #[error("stake progression must not be empty")]
    EmptyProgression,

    #[error("stake progression must be positive and strictly increasing (level {level})")]
    InvalidProgression { level: usize },

    #[error("Kelly multiplier must be in (0, 1], got {0}")]
    InvalidKellyMultiplier(f64),

    #[error("emergency threshold must be in (0, 1), got {0}")]
    InvalidEmergencyThreshold(f64),

    #[error("probability bounds [{min}, {max}] are invalid")]
    InvalidProbabilityBounds { min: f64, max: f64 },

    #[error("probability cap must be in (0, 1], got {0}")]
    InvalidProbabilityCap(f64),

    #[error("minimum stake {min_stake} exceeds the first progression step {first_step}")]
    MinStakeAboveProgression {
        min_stake: Decimal,
        first_step: Decimal,
    },

    #[error("initial capital must be positive, got {0}")]
    InvalidInitialCapital(Decimal),

    #[error("window `{name}` must be at least {min}")]
    WindowTooSmall { name: &'static str, min: usize },

    #[error("sequence multipliers, ranges and the prior gap must be positive")]
    InvalidSequenceMultipliers,

    #[error("zone multipliers must be positive and strictly increasing")]
    InvalidZoneMultipliers,
}

/// Rejected stake operation. The purse is left untouched when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StakeError {
    #[error("stake must be positive, got {0}")]
    NonPositiveStake(Decimal),

    #[error("stake {requested} exceeds available capital {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    #[error("a stake of {0} is still awaiting settlement")]
    StakeOutstanding(Decimal),

    #[error("no stake is awaiting settlement")]
    NoOutstandingStake,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_funds_message() {
        let err = StakeError::InsufficientFunds {
            requested: dec!(0.5),
            available: dec!(0.1),
        };
        assert_eq!(err.to_string(), "stake 0.5 exceeds available capital 0.1");
    }
}
