//! Late-round volatility spike
//!
//! Compares the current volatility reading to the mean of the readings that preceded it.
//! A large ratio sets a floor, a moderate one nudges the probability up.

use super::{DetectorContext, PatternDetector, Signal};
use crate::config::VolatilityConfig;
use crate::types::AdjustmentSource;

pub struct VolatilitySpikeDetector {
    config: VolatilityConfig,
}

impl VolatilitySpikeDetector {
    pub fn new(config: VolatilityConfig) -> Self {
        Self { config }
    }

    /// Current reading: the caller's value, else the latest observation's
    fn current(&self, ctx: &DetectorContext<'_>) -> Option<f64> {
        ctx.volatility
            .or_else(|| ctx.window.last().and_then(|o| o.volatility))
    }

    /// Mean of up to `lookback` readings from ticks before the current one
    fn reference(&self, ctx: &DetectorContext<'_>) -> Option<f64> {
        let readings: Vec<f64> = ctx
            .window
            .iter()
            .rev()
            .filter(|o| o.tick < ctx.tick)
            .filter_map(|o| o.volatility)
            .take(self.config.lookback)
            .collect();

        if readings.len() < self.config.min_samples {
            return None;
        }
        Some(readings.iter().sum::<f64>() / readings.len() as f64)
    }
}

impl PatternDetector for VolatilitySpikeDetector {
    fn detect(&self, ctx: &DetectorContext<'_>) -> Signal {
        let (Some(current), Some(reference)) = (self.current(ctx), self.reference(ctx)) else {
            return Signal::NotTriggered;
        };
        if reference <= 0.0 || current <= 0.0 {
            return Signal::NotTriggered;
        }

        let ratio = current / reference;
        let c = &self.config;

        if ratio >= c.spike_ratio {
            Signal::Floor {
                floor: c.spike_floor,
                confidence: (ratio / (2.0 * c.spike_ratio)).min(1.0),
            }
        } else if ratio >= c.elevated_ratio {
            let factor = (1.0 + c.elevated_slope * (ratio - 1.0)).min(c.max_elevated_multiplier);
            Signal::Multiplier {
                factor,
                confidence: (ratio / c.spike_ratio).min(1.0),
            }
        } else {
            Signal::NotTriggered
        }
    }

    fn source(&self) -> AdjustmentSource {
        AdjustmentSource::VolatilitySpike
    }

    fn name(&self) -> &'static str {
        "Volatility Spike"
    }
}
