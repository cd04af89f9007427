//! Side-bet Decision Engine Library
//!
//! Real-time rug-risk engine for tick-based rounds with a fixed-payout side bet:
//!
//! 1. **Survival model**: interpolates an empirical survival curve and turns the round's age into
//!    the conditional probability that it ends within the next decision window.
//!
//! 2. **Sequence tracking**: rounds right after a long round behave differently, and long rounds
//!    cluster. Both shift the probability.
//!
//! 3. **Pattern detectors**: abrupt end after a big win, volatility spikes, plateaus and recoveries
//!    floor or scale the probability.
//!
//! 4. **Zones and staking**: the final probability maps onto one of six zones, and the stake
//!    manager turns it into a Martingale progression stake or a fractional Kelly alternative.
//!
//! Everything is synchronous. Each engine and stake manager is an owned instance; nothing is shared
//! between them.

pub mod bankroll;
pub mod config;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod features;
pub mod model;
pub mod sequence;
pub mod simulation;
pub mod types;
pub mod zones;

pub use bankroll::{PurseHealth, Settlement, StakeAdvice, StakeManager};
pub use config::EngineConfig;
pub use detectors::{DetectorSet, PatternDetector, Signal};
pub use engine::{DecisionEngine, DecisionQuery};
pub use error::{CalibrationError, ConfigError, StakeError};
pub use features::{FeatureExtractor, RoundTelemetry, RoundTradingFeatures, TickFeatures};
pub use model::{Calibration, SurvivalModel};
pub use sequence::{SequenceState, SequenceTracker};
pub use simulation::{Simulation, SimulationConfig, SimulationReport};
pub use types::{ProbabilityResult, RoundObservation, RoundOutcome, Zone};
pub use zones::ZoneClassifier;
