//! Purse health: a read-only view over current and initial capital

use rust_decimal::prelude::*;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum HealthBand {
    Emergency,
    Warning,
    Caution,
    Healthy,
    Profitable,
}

impl fmt::Display for HealthBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthBand::Emergency => write!(f, "EMERGENCY"),
            HealthBand::Warning => write!(f, "WARNING"),
            HealthBand::Caution => write!(f, "CAUTION"),
            HealthBand::Healthy => write!(f, "HEALTHY"),
            HealthBand::Profitable => write!(f, "PROFITABLE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurseHealth {
    pub initial_capital: Decimal,
    pub current_capital: Decimal,
    /// Current capital as a percentage of initial capital
    pub percent_remaining: f64,
    pub profit: Decimal,
    pub band: HealthBand,
    pub emergency: bool,
}

impl PurseHealth {
    pub fn assess(initial: Decimal, current: Decimal, emergency_threshold: f64) -> Self {
        let ratio = if initial > Decimal::ZERO {
            (current / initial).to_f64().unwrap_or(0.0)
        } else {
            0.0
        };

        // The threshold outranks the fixed bands so a high threshold still flags emergency
        let band = if ratio < emergency_threshold {
            HealthBand::Emergency
        } else if ratio > 1.0 {
            HealthBand::Profitable
        } else if ratio >= 0.8 {
            HealthBand::Healthy
        } else if ratio >= 0.5 {
            HealthBand::Caution
        } else {
            HealthBand::Warning
        };

        Self {
            initial_capital: initial,
            current_capital: current,
            percent_remaining: ratio * 100.0,
            profit: current - initial,
            band,
            emergency: band == HealthBand::Emergency,
        }
    }
}
