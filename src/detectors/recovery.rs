//! Post-dip recovery
//!
//! A value that dropped hard and has since climbed back toward its prior peak tends to keep
//! running, so this detector discounts the probability instead of flooring it.

use super::{DetectorContext, PatternDetector, Signal};
use crate::config::RecoveryConfig;
use crate::types::AdjustmentSource;

pub struct RecoveryDetector {
    config: RecoveryConfig,
}

/// Deepest peak-to-trough drop in the window
#[derive(Debug, Clone, Copy, PartialEq)]
struct Drawdown {
    peak: f64,
    trough_index: usize,
    depth: f64,
}

impl RecoveryDetector {
    pub fn new(config: RecoveryConfig) -> Self {
        Self { config }
    }

    fn deepest_drawdown(values: &[f64]) -> Option<Drawdown> {
        let mut running_peak = *values.first()?;
        let mut deepest: Option<Drawdown> = None;

        for (i, &v) in values.iter().enumerate().skip(1) {
            if v > running_peak {
                running_peak = v;
                continue;
            }
            if running_peak <= 0.0 {
                continue;
            }
            let depth = (running_peak - v) / running_peak;
            if deepest.map(|d| depth > d.depth).unwrap_or(depth > 0.0) {
                deepest = Some(Drawdown {
                    peak: running_peak,
                    trough_index: i,
                    depth,
                });
            }
        }

        deepest
    }
}

impl PatternDetector for RecoveryDetector {
    fn detect(&self, ctx: &DetectorContext<'_>) -> Signal {
        let values: Vec<f64> = ctx.window.iter().map(|o| o.value).collect();
        let Some(current) = values.last().copied() else {
            return Signal::NotTriggered;
        };
        let Some(drawdown) = Self::deepest_drawdown(&values) else {
            return Signal::NotTriggered;
        };

        let c = &self.config;
        let recovered = drawdown.trough_index < values.len() - 1
            && current >= c.recovery_fraction * drawdown.peak;

        if drawdown.depth >= c.min_dip && recovered {
            Signal::Multiplier {
                factor: c.multiplier,
                confidence: (drawdown.depth / (2.0 * c.min_dip)).min(1.0),
            }
        } else {
            Signal::NotTriggered
        }
    }

    fn source(&self) -> AdjustmentSource {
        AdjustmentSource::Recovery
    }

    fn name(&self) -> &'static str {
        "Recovery"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::series;

    fn detect(values: &[f64]) -> Signal {
        let window = series(values, 150);
        let ctx = DetectorContext {
            window: &window,
            tick: 150,
            peak_value: values.iter().cloned().fold(f64::MIN, f64::max),
            volatility: None,
            peak_crossed_at: None,
        };
        RecoveryDetector::new(RecoveryConfig::default()).detect(&ctx)
    }

    #[test]
    fn test_dip_and_recovery_discounts() {
        let signal = detect(&[2.0, 3.0, 4.0, 2.4, 2.0, 2.8, 3.4]);
        match signal {
            Signal::Multiplier { factor, confidence } => {
                assert!((factor - 0.85).abs() < 1e-12);
                assert!((confidence - 0.8333).abs() < 1e-3);
            }
            other => panic!("expected multiplier, got {:?}", other),
        }
    }

    #[test]
    fn test_dip_without_recovery_is_silent() {
        assert_eq!(detect(&[2.0, 4.0, 2.0, 2.2, 2.5]), Signal::NotTriggered);
    }

    #[test]
    fn test_shallow_dip_is_silent() {
        assert_eq!(detect(&[2.0, 4.0, 3.2, 3.9]), Signal::NotTriggered);
    }

    #[test]
    fn test_still_at_trough_is_silent() {
        assert_eq!(detect(&[2.0, 4.0, 1.0]), Signal::NotTriggered);
    }

    #[test]
    fn test_drawdown_search() {
        let d = RecoveryDetector::deepest_drawdown(&[1.0, 2.0, 1.5, 3.0, 1.2, 2.5]).unwrap();
        assert_eq!(d.peak, 3.0);
        assert_eq!(d.trough_index, 4);
        assert!((d.depth - 0.6).abs() < 1e-12);
        assert!(RecoveryDetector::deepest_drawdown(&[1.0, 2.0, 3.0]).is_none());
    }
}
