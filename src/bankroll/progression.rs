//! Martingale stake progression

use crate::error::ConfigError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Standard stake per level, level 1 first. Strictly increasing and positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeProgression {
    steps: Vec<Decimal>,
}

impl StakeProgression {
    pub fn new(steps: Vec<Decimal>) -> Result<Self, ConfigError> {
        if steps.is_empty() {
            return Err(ConfigError::EmptyProgression);
        }
        for (i, step) in steps.iter().enumerate() {
            if *step <= Decimal::ZERO || (i > 0 && *step <= steps[i - 1]) {
                return Err(ConfigError::InvalidProgression { level: i + 1 });
            }
        }
        Ok(Self { steps })
    }

    /// `base * 2^(L-1)` for L = 1..=levels
    pub fn doubling(base: Decimal, levels: usize) -> Result<Self, ConfigError> {
        let mut steps = Vec::with_capacity(levels);
        let mut stake = base;
        for _ in 0..levels {
            steps.push(stake);
            stake *= Decimal::TWO;
        }
        Self::new(steps)
    }

    /// Ceiling level K
    pub fn max_level(&self) -> usize {
        self.steps.len()
    }

    /// Stake at a 1-based level
    pub fn stake_at(&self, level: usize) -> Option<Decimal> {
        level.checked_sub(1).and_then(|i| self.steps.get(i)).copied()
    }

    pub fn first(&self) -> Decimal {
        self.steps[0]
    }

    pub fn steps(&self) -> &[Decimal] {
        &self.steps
    }
}
