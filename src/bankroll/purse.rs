//! Purse and Martingale sequence state
//!
//! Capital changes at exactly two points: a placement debits the stake immediately, and a win
//! credits `stake * payout_ratio`. A loss moves no money because the stake already left at
//! placement. Every rejected operation returns before touching state.

use super::progression::StakeProgression;
use crate::error::StakeError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

/// Escalation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SequencePhase {
    Idle,
    Escalating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SequenceOutcome {
    Won,
    Lost,
}

/// A closed escalation sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceRecord {
    pub outcome: SequenceOutcome,
    /// Payout minus everything staked in the sequence (negative on a loss)
    pub net_profit: Decimal,
    pub total_staked: Decimal,
    pub levels_used: usize,
    pub closed_at: DateTime<Utc>,
}

/// Accepted placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub stake: Decimal,
    /// Level the stake was placed at
    pub level: usize,
    pub purse_after: Decimal,
}

/// Result of settling the outstanding stake
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Settlement {
    /// The sequence closed with a win
    Won {
        stake: Decimal,
        payout: Decimal,
        net_profit: Decimal,
        purse_after: Decimal,
    },
    /// Lost, and the sequence continues at `next_level`
    Escalated {
        stake: Decimal,
        next_level: usize,
        cumulative_staked: Decimal,
        purse_after: Decimal,
    },
    /// Lost, and the sequence closed: ceiling, loss cap or purse exhausted
    SequenceLost {
        stake: Decimal,
        loss_total: Decimal,
        purse_after: Decimal,
    },
}

impl Settlement {
    pub fn purse_after(&self) -> Decimal {
        match self {
            Settlement::Won { purse_after, .. }
            | Settlement::Escalated { purse_after, .. }
            | Settlement::SequenceLost { purse_after, .. } => *purse_after,
        }
    }

    /// Whether this settlement closed the sequence
    pub fn closes_sequence(&self) -> bool {
        !matches!(self, Settlement::Escalated { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Purse {
    initial_capital: Decimal,
    capital: Decimal,
    payout_ratio: Decimal,
    progression: StakeProgression,
    max_sequence_loss: Option<Decimal>,
    phase: SequencePhase,
    /// Level the next stake is placed at
    level: usize,
    cumulative_staked: Decimal,
    levels_used: usize,
    outstanding: Option<Decimal>,
    history: Vec<SequenceRecord>,
}

impl Purse {
    pub fn new(
        initial_capital: Decimal,
        payout_ratio: Decimal,
        progression: StakeProgression,
        max_sequence_loss: Option<Decimal>,
    ) -> Self {
        Self {
            initial_capital,
            capital: initial_capital,
            payout_ratio,
            progression,
            max_sequence_loss,
            phase: SequencePhase::Idle,
            level: 1,
            cumulative_staked: Decimal::ZERO,
            levels_used: 0,
            outstanding: None,
            history: Vec::new(),
        }
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    pub fn capital(&self) -> Decimal {
        self.capital
    }

    pub fn phase(&self) -> SequencePhase {
        self.phase
    }

    /// Level the next placement will use
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn cumulative_staked(&self) -> Decimal {
        self.cumulative_staked
    }

    pub fn outstanding(&self) -> Option<Decimal> {
        self.outstanding
    }

    pub fn progression(&self) -> &StakeProgression {
        &self.progression
    }

    pub fn history(&self) -> &[SequenceRecord] {
        &self.history
    }

    /// Progression stake at the current level
    pub fn standard_stake(&self) -> Decimal {
        self.progression
            .stake_at(self.level)
            .unwrap_or_else(|| self.progression.first())
    }

    /// Debit a stake at the current level
    pub fn place_stake(&mut self, amount: Decimal) -> Result<Placement, StakeError> {
        if amount <= Decimal::ZERO {
            return Err(StakeError::NonPositiveStake(amount));
        }
        if let Some(stake) = self.outstanding {
            return Err(StakeError::StakeOutstanding(stake));
        }
        if amount > self.capital {
            warn!(
                "[Purse] Rejected stake {} at level {}: only {} available",
                amount, self.level, self.capital
            );
            return Err(StakeError::InsufficientFunds {
                requested: amount,
                available: self.capital,
            });
        }

        self.capital -= amount;
        self.cumulative_staked += amount;
        self.levels_used += 1;
        self.outstanding = Some(amount);
        self.phase = SequencePhase::Escalating;

        Ok(Placement {
            stake: amount,
            level: self.level,
            purse_after: self.capital,
        })
    }

    /// Settle the outstanding stake
    pub fn record_outcome(&mut self, won: bool) -> Result<Settlement, StakeError> {
        let stake = self.outstanding.take().ok_or(StakeError::NoOutstandingStake)?;

        if won {
            let payout = stake * self.payout_ratio;
            self.capital += payout;
            let net_profit = payout - self.cumulative_staked;
            info!(
                "[Purse] Sequence won at level {}: payout {}, net {}, purse {}",
                self.level, payout, net_profit, self.capital
            );
            self.close_sequence(SequenceOutcome::Won, net_profit);
            return Ok(Settlement::Won {
                stake,
                payout,
                net_profit,
                purse_after: self.capital,
            });
        }

        let next_level = self.level + 1;
        let next_stake = self.progression.stake_at(next_level);
        let within_cap = |step: Decimal| {
            self.max_sequence_loss
                .map(|cap| self.cumulative_staked + step <= cap)
                .unwrap_or(true)
        };

        match next_stake {
            Some(step) if step <= self.capital && within_cap(step) => {
                self.level = next_level;
                Ok(Settlement::Escalated {
                    stake,
                    next_level,
                    cumulative_staked: self.cumulative_staked,
                    purse_after: self.capital,
                })
            }
            _ => {
                let loss_total = self.cumulative_staked;
                warn!(
                    "[Purse] Sequence lost after {} level(s): {} staked, purse {}",
                    self.levels_used, loss_total, self.capital
                );
                self.close_sequence(SequenceOutcome::Lost, -loss_total);
                Ok(Settlement::SequenceLost {
                    stake,
                    loss_total,
                    purse_after: self.capital,
                })
            }
        }
    }

    fn close_sequence(&mut self, outcome: SequenceOutcome, net_profit: Decimal) {
        self.history.push(SequenceRecord {
            outcome,
            net_profit,
            total_staked: self.cumulative_staked,
            levels_used: self.levels_used,
            closed_at: Utc::now(),
        });
        self.phase = SequencePhase::Idle;
        self.level = 1;
        self.cumulative_staked = Decimal::ZERO;
        self.levels_used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rust_decimal_macros::dec;

    fn purse(capital: Decimal) -> Purse {
        let progression = StakeProgression::doubling(dec!(0.001), 5).unwrap();
        Purse::new(capital, dec!(5), progression, None)
    }

    #[test]
    fn test_loss_debits_once() {
        let mut p = purse(dec!(0.1));
        let placed = p.place_stake(dec!(0.001)).unwrap();
        assert_eq!(placed.purse_after, dec!(0.099));
        let settled = p.record_outcome(false).unwrap();
        assert_eq!(settled.purse_after(), dec!(0.099));
        assert_eq!(p.capital(), dec!(0.1) - dec!(0.001));
    }

    #[test]
    fn test_win_after_two_losses() {
        let mut p = purse(dec!(0.1));
        for expected_level in 1..=3 {
            assert_eq!(p.level(), expected_level);
            let stake = p.standard_stake();
            let placed = p.place_stake(stake).unwrap();
            assert_eq!(placed.level, expected_level);
            if expected_level < 3 {
                assert!(matches!(p.record_outcome(false).unwrap(), Settlement::Escalated { .. }));
            }
        }

        match p.record_outcome(true).unwrap() {
            Settlement::Won { payout, net_profit, purse_after, .. } => {
                assert_eq!(payout, dec!(0.020));
                assert_eq!(net_profit, dec!(0.013));
                assert_eq!(purse_after, dec!(0.113));
            }
            other => panic!("expected win, got {:?}", other),
        }
        assert_eq!(p.phase(), SequencePhase::Idle);
        assert_eq!(p.level(), 1);
        assert_eq!(p.history().len(), 1);
        assert_eq!(p.history()[0].levels_used, 3);
        assert_eq!(p.history()[0].net_profit, dec!(0.013));
    }

    #[test]
    fn test_insufficient_funds_leaves_state_untouched() {
        let mut p = purse(dec!(0.003));
        let before = (p.capital(), p.level(), p.phase(), p.cumulative_staked());
        let err = p.place_stake(dec!(0.004)).unwrap_err();
        assert_eq!(
            err,
            StakeError::InsufficientFunds {
                requested: dec!(0.004),
                available: dec!(0.003)
            }
        );
        assert_eq!(before, (p.capital(), p.level(), p.phase(), p.cumulative_staked()));
        assert!(p.outstanding().is_none());
    }

    #[test]
    fn test_one_stake_at_a_time() {
        let mut p = purse(dec!(0.1));
        p.place_stake(dec!(0.001)).unwrap();
        assert_eq!(p.place_stake(dec!(0.001)), Err(StakeError::StakeOutstanding(dec!(0.001))));
        p.record_outcome(true).unwrap();
        assert_eq!(p.record_outcome(true), Err(StakeError::NoOutstandingStake));
        assert_eq!(p.place_stake(dec!(0)), Err(StakeError::NonPositiveStake(dec!(0))));
    }

    #[test]
    fn test_ceiling_closes_sequence() {
        let mut p = purse(dec!(0.1));
        for level in 1..=5 {
            p.place_stake(p.standard_stake()).unwrap();
            let settled = p.record_outcome(false).unwrap();
            if level < 5 {
                assert!(!settled.closes_sequence());
            } else {
                match settled {
                    Settlement::SequenceLost { loss_total, .. } => assert_eq!(loss_total, dec!(0.031)),
                    other => panic!("expected sequence loss, got {:?}", other),
                }
            }
        }
        assert_eq!(p.level(), 1);
        assert_eq!(p.capital(), dec!(0.069));
        assert_eq!(p.history()[0].net_profit, dec!(-0.031));
    }

    #[test]
    fn test_unaffordable_next_level_closes_sequence() {
        let mut p = purse(dec!(0.004));
        p.place_stake(dec!(0.001)).unwrap();
        assert!(matches!(p.record_outcome(false).unwrap(), Settlement::Escalated { next_level: 2, .. }));
        p.place_stake(dec!(0.002)).unwrap();
        // 0.001 left, level 3 needs 0.004
        assert!(matches!(p.record_outcome(false).unwrap(), Settlement::SequenceLost { .. }));
        assert_eq!(p.level(), 1);
    }

    #[test]
    fn test_loss_cap_closes_sequence() {
        let progression = StakeProgression::doubling(dec!(0.001), 5).unwrap();
        let mut p = Purse::new(dec!(0.1), dec!(5), progression, Some(dec!(0.005)));
        p.place_stake(dec!(0.001)).unwrap();
        p.record_outcome(false).unwrap();
        p.place_stake(dec!(0.002)).unwrap();
        // 0.003 staked, next step 0.004 would exceed the 0.005 cap
        match p.record_outcome(false).unwrap() {
            Settlement::SequenceLost { loss_total, .. } => assert_eq!(loss_total, dec!(0.003)),
            other => panic!("expected sequence loss, got {:?}", other),
        }
    }

    #[test]
    fn test_random_operations_never_go_negative() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut p = purse(dec!(0.05));

        for _ in 0..5_000 {
            if p.outstanding().is_some() {
                let before = p.capital();
                let won = rng.gen_bool(0.2);
                let settled = p.record_outcome(won).unwrap();
                if !won {
                    assert_eq!(settled.purse_after(), before);
                }
            } else {
                let before = p.capital();
                let level = p.level();
                let amount = if rng.gen_bool(0.8) {
                    p.standard_stake()
                } else {
                    Decimal::from(rng.gen_range(1..200u32)) / dec!(1000)
                };
                match p.place_stake(amount) {
                    Ok(placed) => {
                        assert_eq!(placed.level, level);
                        assert_eq!(p.capital(), before - amount);
                    }
                    Err(_) => assert_eq!(p.capital(), before),
                }
            }
            assert!(p.capital() >= Decimal::ZERO);
        }
    }
}
