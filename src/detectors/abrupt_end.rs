//! Abrupt end after a big win
//!
//! Rounds that spike past a large multiplier have historically ended soon after. While the first
//! crossing of the threshold is still inside the decision window the probability is held at a
//! high floor. The crossing tick comes from the caller when it tracked one; otherwise it must be
//! visible in the window as a step from below the threshold to at or above it.

use super::{DetectorContext, PatternDetector, Signal};
use crate::config::AbruptEndConfig;
use crate::types::AdjustmentSource;

pub struct AbruptEndDetector {
    config: AbruptEndConfig,
}

impl AbruptEndDetector {
    pub fn new(config: AbruptEndConfig) -> Self {
        Self { config }
    }

    /// Tick of the first crossing: the caller's if supplied, else a below-to-above step in the
    /// window. `None` when neither is available.
    fn first_crossing(&self, ctx: &DetectorContext<'_>) -> Option<u32> {
        if ctx.peak_crossed_at.is_some() {
            return ctx.peak_crossed_at;
        }
        let threshold = self.config.peak_threshold;
        ctx.window
            .windows(2)
            .find(|pair| pair[0].value < threshold && pair[1].value >= threshold)
            .map(|pair| pair[1].tick)
    }
}

impl PatternDetector for AbruptEndDetector {
    fn detect(&self, ctx: &DetectorContext<'_>) -> Signal {
        if ctx.peak_value < self.config.peak_threshold {
            return Signal::NotTriggered;
        }

        let Some(crossed_at) = self.first_crossing(ctx) else {
            return Signal::NotTriggered;
        };

        let elapsed = ctx.tick.saturating_sub(crossed_at);
        if elapsed <= self.config.window_ticks {
            Signal::Floor {
                floor: self.config.floor,
                confidence: self.config.confidence,
            }
        } else {
            Signal::NotTriggered
        }
    }

    fn source(&self) -> AdjustmentSource {
        AdjustmentSource::AbruptEnd
    }

    fn name(&self) -> &'static str {
        "Abrupt End"
    }
}
