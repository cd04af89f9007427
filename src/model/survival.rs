//! Survival model: turns a tick count into the probability the round ends soon
//!
//! The headline number is the discrete conditional hazard over the lookahead window:
//! `(S(t) - S(t + W)) / S(t)`, where `S` is the empirical survival curve.

use super::calibration::Calibration;

/// Probability model backed by the calibrated survival and long-round curves
#[derive(Debug, Clone)]
pub struct SurvivalModel {
    calibration: Calibration,
    window: u32,
    probability_cap: Option<f64>,
}

impl SurvivalModel {
    pub fn new(calibration: Calibration, window: u32, probability_cap: Option<f64>) -> Self {
        Self {
            calibration,
            window,
            probability_cap,
        }
    }

    /// Default lookahead window in ticks
    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Fraction of rounds still active at `tick`
    pub fn survival(&self, tick: f64) -> f64 {
        self.calibration.survival.value_at(tick)
    }

    /// Conditional probability of ending within `window` ticks of `tick`.
    ///
    /// Returns 0 when the survival mass at `tick` is exhausted.
    pub fn window_hazard(&self, tick: f64, window: u32) -> f64 {
        let now = self.survival(tick);
        if now > 0.0 {
            let later = self.survival(tick + window as f64);
            ((now - later) / now).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Probability of the round ending within the default window
    pub fn rug_probability(&self, tick: u32) -> f64 {
        self.rug_probability_within(tick, self.window)
    }

    /// Probability of the round ending within `window` ticks.
    ///
    /// Tick 0 (presale) reads the zero-milestone row. Past the last milestone the extrapolated
    /// tail is used; once that tail has no survival mass left the configured cap is returned.
    pub fn rug_probability_within(&self, tick: u32, window: u32) -> f64 {
        let survival = &self.calibration.survival;
        let at = if tick == 0 {
            survival.first_milestone() as f64
        } else {
            tick as f64
        };
        let hazard = self.window_hazard(at, window);

        match self.probability_cap {
            Some(cap) if tick > survival.last_milestone() && self.survival(at) <= 0.0 => cap,
            Some(cap) => hazard.min(cap),
            None => hazard,
        }
    }

    /// Probability that a round alive at `tick` goes on to become a long round
    pub fn long_round_probability(&self, tick: u32) -> f64 {
        self.calibration.long_round.value_at(tick as f64)
    }
}

/// Constant-hazard reference: chance that a per-tick stop probability fires within `window` ticks
pub fn geometric_window_probability(stop_prob: f64, window: u32) -> f64 {
    let stop_prob = stop_prob.clamp(0.0, 1.0);
    1.0 - (1.0 - stop_prob).powi(window as i32)
}
