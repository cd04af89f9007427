//! Plateau: the value is stuck inside a narrow band
//!
//! Applies a multiplicative penalty that grows with how long the plateau has lasted.

use super::{DetectorContext, PatternDetector, Signal};
use crate::config::PlateauConfig;
use crate::types::AdjustmentSource;

pub struct PlateauDetector {
    config: PlateauConfig,
}

impl PlateauDetector {
    pub fn new(config: PlateauConfig) -> Self {
        Self { config }
    }

    fn is_flat(&self, min: f64, max: f64, sum: f64, count: usize) -> bool {
        let mean = sum / count as f64;
        mean > 0.0 && (max - min) / mean < self.config.max_relative_range
    }

    /// Length of the longest trailing run of observations that stays flat
    fn persistence(&self, ctx: &DetectorContext<'_>) -> usize {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut run = 0;

        for obs in ctx.window.iter().rev() {
            let (next_min, next_max) = (min.min(obs.value), max.max(obs.value));
            if run > 0 && !self.is_flat(next_min, next_max, sum + obs.value, run + 1) {
                break;
            }
            min = next_min;
            max = next_max;
            sum += obs.value;
            run += 1;
        }

        run
    }
}

impl PatternDetector for PlateauDetector {
    fn detect(&self, ctx: &DetectorContext<'_>) -> Signal {
        let c = &self.config;
        if ctx.window.len() < c.window {
            return Signal::NotTriggered;
        }

        let persisted = self.persistence(ctx);
        if persisted < c.window {
            return Signal::NotTriggered;
        }

        let extra = (persisted - c.window) as f64;
        let factor = (c.base_multiplier + c.per_tick_penalty * extra).min(c.max_multiplier);
        Signal::Multiplier {
            factor,
            confidence: (persisted as f64 / (2 * c.window) as f64).min(1.0),
        }
    }

    fn source(&self) -> AdjustmentSource {
        AdjustmentSource::Plateau
    }

    fn name(&self) -> &'static str {
        "Plateau"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::series;

    fn detect(values: &[f64]) -> Signal {
        let window = series(values, 200);
        let ctx = DetectorContext {
            window: &window,
            tick: 200,
            peak_value: 3.0,
            volatility: None,
            peak_crossed_at: None,
        };
        PlateauDetector::new(PlateauConfig::default()).detect(&ctx)
    }

    #[test]
    fn test_flat_window_triggers_base_penalty() {
        let values = [2.00, 2.01, 2.00, 2.02, 2.01, 2.00, 2.01, 2.02, 2.01, 2.00];
        match detect(&values) {
            Signal::Multiplier { factor, .. } => assert!((factor - 1.10).abs() < 1e-9),
            other => panic!("expected multiplier, got {:?}", other),
        }
    }

    #[test]
    fn test_penalty_grows_with_persistence() {
        let values = vec![2.0; 25];
        match detect(&values) {
            Signal::Multiplier { factor, .. } => assert!((factor - 1.25).abs() < 1e-9),
            other => panic!("expected multiplier, got {:?}", other),
        }

        let values = vec![2.0; 50];
        match detect(&values) {
            Signal::Multiplier { factor, .. } => assert!((factor - 1.35).abs() < 1e-9),
            other => panic!("expected multiplier, got {:?}", other),
        }
    }

    #[test]
    fn test_moving_value_is_silent() {
        let values: Vec<f64> = (0..12).map(|i| 1.0 + 0.1 * i as f64).collect();
        assert_eq!(detect(&values), Signal::NotTriggered);
    }

    #[test]
    fn test_short_window_is_silent() {
        assert_eq!(detect(&[2.0, 2.0, 2.0]), Signal::NotTriggered);
    }

    #[test]
    fn test_persistence_stops_at_break() {
        // Rising run then 12 flat observations
        let mut values: Vec<f64> = (0..8).map(|i| 1.0 + 0.2 * i as f64).collect();
        values.extend(std::iter::repeat(3.0).take(12));
        match detect(&values) {
            Signal::Multiplier { factor, .. } => assert!((factor - 1.12).abs() < 1e-9),
            other => panic!("expected multiplier, got {:?}", other),
        }
    }
}
