//! Kelly Criterion stake sizing
//!
//! Formula: f* = (b·p - q) / b
//! Where:
//!   b = net odds of the side bet (payout ratio - 1)
//!   p = probability the round ends inside the window
//!   q = 1 - p
//!
//! Only a fraction of f* is ever used, and only as an alternative to the fixed progression.

use rust_decimal::Decimal;
use serde::Serialize;

/// Alternative multipliers relative to the configured Kelly multiplier
const ALTERNATIVE_SCALES: [(&str, f64); 3] = [("conservative", 0.5), ("standard", 1.0), ("aggressive", 2.0)];

/// One Kelly-derived alternative to the progression stake
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeAlternative {
    pub label: &'static str,
    /// Share of full Kelly applied
    pub kelly_multiplier: f64,
    /// Share of the purse before clamping
    pub fraction: f64,
    pub stake: Decimal,
}

#[derive(Debug, Clone)]
pub struct KellySizer {
    payout_ratio: f64,
    multiplier: f64,
}

impl KellySizer {
    pub fn new(payout_ratio: f64, multiplier: f64) -> Self {
        Self {
            payout_ratio,
            multiplier,
        }
    }

    pub fn net_odds(&self) -> f64 {
        self.payout_ratio - 1.0
    }

    /// Full Kelly fraction, floored at zero (no edge, no bet)
    pub fn full_fraction(&self, probability: f64) -> f64 {
        let b = self.net_odds();
        if b <= 0.0 || !(0.0..=1.0).contains(&probability) {
            return 0.0;
        }
        let q = 1.0 - probability;
        ((b * probability - q) / b).clamp(0.0, 1.0)
    }

    /// Fraction actually recommended: full Kelly times the configured multiplier
    pub fn fraction(&self, probability: f64) -> f64 {
        self.full_fraction(probability) * self.multiplier
    }

    /// Alternatives at half, one and two times the configured multiplier.
    ///
    /// Each stake is `capital * fraction / risk_multiplier`, clamped into `[min_stake, standard]`.
    pub fn alternatives(
        &self,
        probability: f64,
        capital: Decimal,
        risk_multiplier: f64,
        min_stake: Decimal,
        standard: Decimal,
    ) -> Vec<StakeAlternative> {
        let full = self.full_fraction(probability);
        let risk = if risk_multiplier > 0.0 { risk_multiplier } else { 1.0 };
        let ceiling = standard.max(min_stake);

        ALTERNATIVE_SCALES
            .iter()
            .map(|&(label, scale)| {
                let kelly_multiplier = (self.multiplier * scale).min(1.0);
                let fraction = full * kelly_multiplier / risk;
                let raw = capital * Decimal::from_f64_retain(fraction).unwrap_or(Decimal::ZERO);
                StakeAlternative {
                    label,
                    kelly_multiplier,
                    fraction,
                    stake: raw.round_dp(6).max(min_stake).min(ceiling),
                }
            })
            .collect()
    }
}
