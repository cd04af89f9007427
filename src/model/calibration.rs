//! Empirical calibration curves and piecewise-linear interpolation

use crate::error::CalibrationError;
use serde::{Deserialize, Serialize};

/// Default milestones (ticks). Denser past 500 so the tail keeps its shape at a 40-tick window.
pub const DEFAULT_MILESTONES: [u32; 16] = [
    0, 50, 100, 150, 200, 250, 300, 350, 400, 450, 500, 540, 580, 620, 660, 700,
];

/// Fraction of historical rounds still active at each default milestone
pub const DEFAULT_SURVIVAL: [f64; 16] = [
    1.0, 0.8125, 0.63375, 0.468975, 0.323593, 0.203863, 0.114164, 0.0547985, 0.0213714,
    0.00619771, 0.00105361, 9.4825e-05, 6.63775e-06, 3.65076e-07, 1.64284e-08, 6.57137e-10,
];

/// Probability of reaching the 500-tick long-round threshold given survival to each milestone
pub const DEFAULT_LONG_ROUND: [f64; 16] = [
    0.001054, 0.001297, 0.001663, 0.002247, 0.003256, 0.005168, 0.009229, 0.01923, 0.0493, 0.17,
    1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
];

/// Default cap on the per-tick slope used past the last milestone
pub const DEFAULT_MAX_TAIL_SLOPE: f64 = 0.002;

/// A sparse curve over tick milestones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCurve {
    milestones: Vec<u32>,
    values: Vec<f64>,
    max_tail_slope: f64,
}

impl CalibrationCurve {
    /// Build a curve, rejecting empty tables, unsorted milestones and values outside [0, 1]
    pub fn new(
        table: &'static str,
        milestones: Vec<u32>,
        values: Vec<f64>,
        max_tail_slope: f64,
    ) -> Result<Self, CalibrationError> {
        if milestones.is_empty() {
            return Err(CalibrationError::Empty { table });
        }
        if milestones.len() != values.len() {
            return Err(CalibrationError::LengthMismatch {
                table,
                milestones: milestones.len(),
                values: values.len(),
            });
        }
        if let Some(index) = milestones.windows(2).position(|w| w[1] <= w[0]) {
            return Err(CalibrationError::NonMonotonicMilestones {
                table,
                index: index + 1,
            });
        }
        if let Some((index, &value)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0 || **v > 1.0)
        {
            return Err(CalibrationError::OutOfRange { table, index, value });
        }
        if !max_tail_slope.is_finite() || max_tail_slope < 0.0 {
            return Err(CalibrationError::InvalidTailSlope(max_tail_slope));
        }

        Ok(Self {
            milestones,
            values,
            max_tail_slope,
        })
    }

    pub fn milestones(&self) -> &[u32] {
        &self.milestones
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_milestone(&self) -> u32 {
        self.milestones[0]
    }

    pub fn last_milestone(&self) -> u32 {
        self.milestones[self.milestones.len() - 1]
    }

    /// Value at a (possibly fractional) tick.
    ///
    /// Clamps below the first milestone, interpolates linearly between the two bracketing
    /// milestones, and past the last milestone extrapolates the final segment's slope with its
    /// magnitude capped at `max_tail_slope`. The result is always clamped to [0, 1].
    pub fn value_at(&self, tick: f64) -> f64 {
        let first = self.first_milestone() as f64;
        let last = self.last_milestone() as f64;

        let raw = if tick <= first {
            self.values[0]
        } else if tick >= last {
            self.extrapolate(tick - last)
        } else {
            // Index of the first milestone strictly above `tick`
            let upper = self.milestones.partition_point(|&m| (m as f64) <= tick);
            let lower = upper - 1;
            let (x0, x1) = (self.milestones[lower] as f64, self.milestones[upper] as f64);
            let (y0, y1) = (self.values[lower], self.values[upper]);
            let t = (tick - x0) / (x1 - x0);
            y0 + t * (y1 - y0)
        };

        raw.clamp(0.0, 1.0)
    }

    fn extrapolate(&self, past_last: f64) -> f64 {
        let n = self.values.len();
        let last_value = self.values[n - 1];
        if n < 2 {
            return last_value;
        }
        let span = (self.milestones[n - 1] - self.milestones[n - 2]) as f64;
        let slope = (self.values[n - 1] - self.values[n - 2]) / span;
        let capped = slope.clamp(-self.max_tail_slope, self.max_tail_slope);
        last_value + capped * past_last
    }
}

/// The two static tables the survival model is built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub survival: CalibrationCurve,
    pub long_round: CalibrationCurve,
}

impl Calibration {
    /// Validate and assemble both tables.
    ///
    /// Survival must be non-increasing and the conditional long-round curve non-decreasing.
    pub fn new(
        milestones: Vec<u32>,
        survival: Vec<f64>,
        long_round: Vec<f64>,
        max_tail_slope: f64,
    ) -> Result<Self, CalibrationError> {
        let survival = CalibrationCurve::new("survival", milestones.clone(), survival, max_tail_slope)?;
        let long_round = CalibrationCurve::new("long_round", milestones, long_round, max_tail_slope)?;
        Self::from_curves(survival, long_round)
    }

    pub fn from_curves(
        survival: CalibrationCurve,
        long_round: CalibrationCurve,
    ) -> Result<Self, CalibrationError> {
        if survival.milestones() != long_round.milestones() {
            return Err(CalibrationError::MilestoneMismatch);
        }
        if let Some(index) = survival.values().windows(2).position(|w| w[1] > w[0]) {
            return Err(CalibrationError::SurvivalIncreases { index: index + 1 });
        }
        if let Some(index) = long_round.values().windows(2).position(|w| w[1] < w[0]) {
            return Err(CalibrationError::LongRoundDecreases { index: index + 1 });
        }
        Ok(Self {
            survival,
            long_round,
        })
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            survival: CalibrationCurve {
                milestones: DEFAULT_MILESTONES.to_vec(),
                values: DEFAULT_SURVIVAL.to_vec(),
                max_tail_slope: DEFAULT_MAX_TAIL_SLOPE,
            },
            long_round: CalibrationCurve {
                milestones: DEFAULT_MILESTONES.to_vec(),
                values: DEFAULT_LONG_ROUND.to_vec(),
                max_tail_slope: DEFAULT_MAX_TAIL_SLOPE,
            },
        }
    }
}
