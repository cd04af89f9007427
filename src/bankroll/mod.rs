//! Bankroll and stake management
//!
//! `StakeManager` owns one purse. A session that shares it across callers must serialize
//! placements and settlements itself.

pub mod health;
pub mod kelly;
pub mod progression;
pub mod purse;

pub use health::{HealthBand, PurseHealth};
pub use kelly::{KellySizer, StakeAlternative};
pub use progression::StakeProgression;
pub use purse::{Placement, Purse, SequenceOutcome, SequencePhase, SequenceRecord, Settlement};

use crate::config::{payout_decimal, BankrollConfig, EngineConfig};
use crate::error::{ConfigError, StakeError};
use crate::types::{ProbabilityResult, Zone};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

/// What to do with the current decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StakeAction {
    Skip { reason: String },
    Place { stake: Decimal },
}

/// Stake recommendation for one decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeAdvice {
    pub zone: Zone,
    pub level: usize,
    pub action: StakeAction,
    /// Progression stake at the current level
    pub standard_stake: Decimal,
    pub kelly_fraction: f64,
    pub alternatives: Vec<StakeAlternative>,
    pub health: PurseHealth,
}

impl StakeAdvice {
    pub fn stake(&self) -> Option<Decimal> {
        match self.action {
            StakeAction::Place { stake } => Some(stake),
            StakeAction::Skip { .. } => None,
        }
    }
}

pub struct StakeManager {
    purse: Purse,
    kelly: KellySizer,
    min_stake: Decimal,
    emergency_threshold: f64,
}

impl StakeManager {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::from_bankroll(config.payout_ratio, &config.bankroll)
    }

    pub fn from_bankroll(payout_ratio: f64, config: &BankrollConfig) -> Result<Self, ConfigError> {
        let payout = payout_decimal(payout_ratio)?;
        config.validate()?;
        let progression = StakeProgression::new(config.progression.clone())?;

        Ok(Self {
            purse: Purse::new(
                config.initial_capital,
                payout,
                progression,
                config.max_sequence_loss,
            ),
            kelly: KellySizer::new(payout_ratio, config.kelly_multiplier),
            min_stake: config.min_stake,
            emergency_threshold: config.emergency_threshold,
        })
    }

    pub fn purse(&self) -> &Purse {
        &self.purse
    }

    /// Level the next placement will use
    pub fn level(&self) -> usize {
        self.purse.level()
    }

    pub fn standard_stake(&self) -> Decimal {
        self.purse.standard_stake()
    }

    pub fn place_stake(&mut self, amount: Decimal) -> Result<Placement, StakeError> {
        self.purse.place_stake(amount)
    }

    /// Place the progression stake for the current level
    pub fn place_standard_stake(&mut self) -> Result<Placement, StakeError> {
        let stake = self.purse.standard_stake();
        self.purse.place_stake(stake)
    }

    pub fn record_outcome(&mut self, won: bool) -> Result<Settlement, StakeError> {
        let settlement = self.purse.record_outcome(won)?;
        let health = self.health();
        if health.emergency {
            warn!(
                "[Bankroll] Purse at {:.1}% of initial capital, below emergency threshold",
                health.percent_remaining
            );
        }
        Ok(settlement)
    }

    pub fn health(&self) -> PurseHealth {
        PurseHealth::assess(
            self.purse.initial_capital(),
            self.purse.capital(),
            self.emergency_threshold,
        )
    }

    /// Turn a decision into a stake recommendation. Never mutates the purse.
    ///
    /// Unplayable zones skip. A purse in emergency is limited to the minimum stake.
    pub fn recommend(&self, result: &ProbabilityResult) -> StakeAdvice {
        let health = self.health();
        let standard = self.purse.standard_stake();
        let capital = self.purse.capital();
        let p = result.final_probability;

        let alternatives = self.kelly.alternatives(
            p,
            capital,
            result.risk_multiplier,
            self.min_stake,
            standard,
        );

        let action = if !result.zone.is_playable() {
            StakeAction::Skip {
                reason: format!("{} zone", result.zone),
            }
        } else if self.purse.outstanding().is_some() {
            StakeAction::Skip {
                reason: "stake already outstanding".to_string(),
            }
        } else if health.emergency {
            if self.min_stake <= capital {
                StakeAction::Place {
                    stake: self.min_stake,
                }
            } else {
                StakeAction::Skip {
                    reason: "purse exhausted".to_string(),
                }
            }
        } else if standard > capital {
            StakeAction::Skip {
                reason: format!("standard stake {} exceeds purse {}", standard, capital),
            }
        } else {
            StakeAction::Place { stake: standard }
        };

        StakeAdvice {
            zone: result.zone,
            level: self.purse.level(),
            action,
            standard_stake: standard,
            kelly_fraction: self.kelly.fraction(p),
            alternatives,
            health,
        }
    }
}
