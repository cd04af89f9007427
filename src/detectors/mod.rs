//! In-round pattern detectors
//!
//! Each detector inspects the trailing observation window and either stays silent, imposes a
//! probability floor, or contributes a multiplicative adjustment. Detectors never see each other;
//! `DetectorSet` combines them with a single rule: multipliers multiply, floors reduce by max.

pub mod abrupt_end;
pub mod plateau;
pub mod recovery;
pub mod volatility;

pub use abrupt_end::AbruptEndDetector;
pub use plateau::PlateauDetector;
pub use recovery::RecoveryDetector;
pub use volatility::VolatilitySpikeDetector;

use crate::config::DetectorConfig;
use crate::types::{Adjustment, AdjustmentSource, AppliedFloor, RoundObservation};
use tracing::debug;

/// Everything a detector may look at
#[derive(Debug, Clone, Copy)]
pub struct DetectorContext<'a> {
    /// Trailing observations, oldest first
    pub window: &'a [RoundObservation],
    pub tick: u32,
    /// Highest value reached so far this round
    pub peak_value: f64,
    /// Current volatility reading, if the caller has one
    pub volatility: Option<f64>,
    /// Tick at which the round first reached the abrupt-end threshold, when the caller tracked it
    pub peak_crossed_at: Option<u32>,
}

impl<'a> DetectorContext<'a> {
    /// Values of the last `n` observations (fewer if the window is shorter)
    pub fn trailing_values(&self, n: usize) -> impl Iterator<Item = f64> + 'a {
        let window: &'a [RoundObservation] = self.window;
        let start = window.len().saturating_sub(n);
        window[start..].iter().map(|o| o.value)
    }
}

/// Result of a single detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    NotTriggered,
    Floor { floor: f64, confidence: f64 },
    Multiplier { factor: f64, confidence: f64 },
}

/// Trait for in-round pattern detectors
pub trait PatternDetector: Send + Sync {
    /// Inspect the window and report a floor, a multiplier, or nothing
    fn detect(&self, ctx: &DetectorContext<'_>) -> Signal;

    /// Tag attached to adjustments this detector produces
    fn source(&self) -> AdjustmentSource;

    /// Detector name for logs
    fn name(&self) -> &'static str;
}

/// Combined output of every detector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectorOutcome {
    pub multipliers: Vec<Adjustment>,
    pub floor: Option<AppliedFloor>,
}

impl DetectorOutcome {
    pub fn combined_multiplier(&self) -> f64 {
        self.multipliers.iter().map(|a| a.multiplier).product()
    }
}

/// Ordered list of detectors evaluated together
pub struct DetectorSet {
    detectors: Vec<Box<dyn PatternDetector>>,
}

impl DetectorSet {
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// All enabled built-in detectors
    pub fn from_config(config: &DetectorConfig) -> Self {
        let mut set = Self::new();
        if config.abrupt_end.enabled {
            set.push(AbruptEndDetector::new(config.abrupt_end.clone()));
        }
        if config.volatility.enabled {
            set.push(VolatilitySpikeDetector::new(config.volatility.clone()));
        }
        if config.plateau.enabled {
            set.push(PlateauDetector::new(config.plateau.clone()));
        }
        if config.recovery.enabled {
            set.push(RecoveryDetector::new(config.recovery.clone()));
        }
        set
    }

    pub fn push<D: PatternDetector + 'static>(&mut self, detector: D) {
        self.detectors.push(Box::new(detector));
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Run every detector. Multipliers are all kept; of the floors only the highest survives.
    pub fn evaluate(&self, ctx: &DetectorContext<'_>) -> DetectorOutcome {
        let mut outcome = DetectorOutcome::default();

        for detector in &self.detectors {
            match detector.detect(ctx) {
                Signal::NotTriggered => {}
                Signal::Multiplier { factor, confidence } => {
                    debug!(
                        "[Detector] {} multiplier {:.3} (confidence {:.2}) at tick {}",
                        detector.name(),
                        factor,
                        confidence,
                        ctx.tick
                    );
                    outcome.multipliers.push(Adjustment {
                        source: detector.source(),
                        multiplier: factor,
                    });
                }
                Signal::Floor { floor, confidence } => {
                    debug!(
                        "[Detector] {} floor {:.3} (confidence {:.2}) at tick {}",
                        detector.name(),
                        floor,
                        confidence,
                        ctx.tick
                    );
                    let higher = outcome.floor.map(|f| floor > f.floor).unwrap_or(true);
                    if higher {
                        outcome.floor = Some(AppliedFloor {
                            source: detector.source(),
                            floor,
                            confidence,
                        });
                    }
                }
            }
        }

        outcome
    }
}

impl Default for DetectorSet {
    fn default() -> Self {
        Self::from_config(&DetectorConfig::default())
    }
}
