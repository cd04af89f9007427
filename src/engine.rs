//! Decision engine: composes the survival model, sequence tracker, detectors and zone classifier
//!
//! Composition order for one query:
//! 1. base probability from the survival curve
//! 2. multiplicative adjustments (sequence risk, 1/cycle, 1/clustering, detector multipliers)
//! 3. `max(adjusted, floor)` over the highest detector floor
//! 4. clamp to the configured bounds, flagging the result when clamping changed it

use crate::config::EngineConfig;
use crate::detectors::{DetectorContext, DetectorSet, PatternDetector};
use crate::error::ConfigError;
use crate::features::rolling_volatility;
use crate::model::{Calibration, SurvivalModel};
use crate::sequence::{SequenceTracker, SequenceTransition};
use crate::types::{
    Adjustment, AdjustmentSource, ProbabilityResult, RoundObservation, RoundOutcome, Zone,
};
use crate::zones::{ZoneAssessment, ZoneClassifier};
use std::borrow::Cow;
use tracing::debug;

/// One decision request
#[derive(Debug, Clone, Copy)]
pub struct DecisionQuery<'a> {
    pub tick: u32,
    /// Trailing in-round observations, oldest first
    pub observations: &'a [RoundObservation],
    /// Peak value so far; defaults to the highest observed value
    pub peak_value: Option<f64>,
    /// Current volatility; defaults to the latest observation's
    pub volatility: Option<f64>,
    /// Lookahead override; defaults to the configured decision window
    pub window: Option<u32>,
    /// Tick the round first crossed the abrupt-end threshold, if known
    pub peak_crossed_at: Option<u32>,
}

impl<'a> DecisionQuery<'a> {
    pub fn new(tick: u32, observations: &'a [RoundObservation]) -> Self {
        Self {
            tick,
            observations,
            peak_value: None,
            volatility: None,
            window: None,
            peak_crossed_at: None,
        }
    }

    pub fn with_peak(mut self, peak: f64) -> Self {
        self.peak_value = Some(peak);
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = Some(volatility);
        self
    }

    pub fn with_window(mut self, window: u32) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_peak_crossed_at(mut self, tick: u32) -> Self {
        self.peak_crossed_at = Some(tick);
        self
    }
}

/// Owned engine instance. Independent rounds need independent engines.
pub struct DecisionEngine {
    config: EngineConfig,
    model: SurvivalModel,
    tracker: SequenceTracker,
    detectors: DetectorSet,
    zones: ZoneClassifier,
}

impl DecisionEngine {
    /// Build an engine on the default calibration tables
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_calibration(config, Calibration::default())
    }

    pub fn with_calibration(
        config: EngineConfig,
        calibration: Calibration,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let model = SurvivalModel::new(
            calibration,
            config.model.decision_window,
            config.model.probability_cap,
        );
        let tracker = SequenceTracker::new(config.sequence.clone());
        let detectors = DetectorSet::from_config(&config.detectors);
        let zones = ZoneClassifier::new(config.payout_ratio, &config.zones);

        debug!(
            "[Engine] payout {}:1, window {} ticks, {} detectors",
            config.payout_ratio,
            config.model.decision_window,
            detectors.len()
        );

        Ok(Self {
            config,
            model,
            tracker,
            detectors,
            zones,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model(&self) -> &SurvivalModel {
        &self.model
    }

    pub fn tracker(&self) -> &SequenceTracker {
        &self.tracker
    }

    pub fn zones(&self) -> &ZoneClassifier {
        &self.zones
    }

    /// Register an extra detector after the built-in ones
    pub fn add_detector<D: PatternDetector + 'static>(&mut self, detector: D) {
        self.detectors.push(detector);
    }

    /// Feed a completed round to the sequence tracker
    pub fn record_round(&mut self, outcome: RoundOutcome) -> SequenceTransition {
        self.tracker.record(outcome)
    }

    /// Probability query over the default decision window
    pub fn compute_probability(
        &self,
        tick: u32,
        recent: &[RoundObservation],
    ) -> ProbabilityResult {
        self.evaluate(&DecisionQuery::new(tick, recent))
    }

    pub fn classify(&self, probability: f64) -> Zone {
        self.zones.classify(probability)
    }

    pub fn assess(&self, probability: f64) -> ZoneAssessment {
        self.zones.assess(probability)
    }

    pub fn evaluate(&self, query: &DecisionQuery<'_>) -> ProbabilityResult {
        let tick = query.tick;
        let window = query.window.unwrap_or(self.model.window());
        let base = self.model.rug_probability_within(tick, window);

        let sequence = self.tracker.adjustment();
        let mut adjustments = vec![
            Adjustment {
                source: AdjustmentSource::SequencePosition,
                multiplier: sequence.risk_multiplier,
            },
            Adjustment {
                source: AdjustmentSource::Cycle,
                multiplier: 1.0 / sequence.cycle_multiplier,
            },
            Adjustment {
                source: AdjustmentSource::Clustering,
                multiplier: 1.0 / sequence.clustering_multiplier,
            },
        ];

        let observations = with_volatility(query.observations);
        let peak_value = query.peak_value.unwrap_or_else(|| {
            observations.iter().map(|o| o.value).fold(0.0, f64::max)
        });
        let ctx = DetectorContext {
            window: &*observations,
            tick,
            peak_value,
            volatility: query.volatility,
            peak_crossed_at: query.peak_crossed_at,
        };
        let detected = self.detectors.evaluate(&ctx);
        adjustments.extend(detected.multipliers.iter().copied());

        let adjusted = base * adjustments.iter().map(|a| a.multiplier).product::<f64>();
        let floored = match detected.floor {
            Some(floor) => adjusted.max(floor.floor),
            None => adjusted,
        };

        let bounds = &self.config.model;
        let final_probability = floored.clamp(bounds.min_probability, bounds.max_probability);
        let clamped = final_probability != floored;
        if clamped {
            debug!(
                "[Engine] tick {}: probability {:.4} clamped to {:.4}",
                tick, floored, final_probability
            );
        }

        let zone = self.zones.classify(final_probability);
        let long_round_probability = (self.model.long_round_probability(tick)
            * sequence.long_round_multiplier())
        .clamp(0.0, 1.0);

        debug!(
            "[Engine] tick {}: base {:.4} adjusted {:.4} final {:.4} -> {}",
            tick, base, adjusted, final_probability, zone
        );

        ProbabilityResult {
            tick,
            window,
            base_probability: base,
            adjustments,
            adjusted_probability: adjusted,
            floor: detected.floor,
            final_probability,
            clamped,
            zone,
            expected_value: self.zones.expected_value(final_probability),
            long_round_probability,
            risk_multiplier: sequence.risk_multiplier,
        }
    }
}

/// Fill missing volatility readings from the value series
fn with_volatility(observations: &[RoundObservation]) -> Cow<'_, [RoundObservation]> {
    if observations.iter().all(|o| o.volatility.is_some()) {
        return Cow::Borrowed(observations);
    }

    let values: Vec<f64> = observations.iter().map(|o| o.value).collect();
    let filled = observations
        .iter()
        .enumerate()
        .map(|(i, o)| match o.volatility {
            Some(_) => o.clone(),
            None => o.clone().with_volatility(rolling_volatility(&values[..=i])),
        })
        .collect();
    Cow::Owned(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::{DetectorContext, Signal};

    fn engine() -> DecisionEngine {
        DecisionEngine::new(EngineConfig::default()).unwrap()
    }

    fn observations(values: &[f64], last_tick: u32) -> Vec<RoundObservation> {
        let first = last_tick + 1 - values.len() as u32;
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| RoundObservation::new(first + i as u32, v))
            .collect()
    }

    #[test]
    fn test_presale_probability() {
        let e = engine();
        let r = e.compute_probability(0, &[]);
        assert!((r.base_probability - 0.15).abs() < 1e-9);
        assert!((r.final_probability - 0.15).abs() < 1e-9);
        assert!((r.combined_multiplier() - 1.0).abs() < 1e-12);
        assert!(!r.clamped);
        assert!(r.floor.is_none());
    }

    #[test]
    fn test_late_round_is_certainty() {
        let e = engine();
        let r = e.compute_probability(500, &[]);
        assert!(r.final_probability >= 0.90);
        assert_eq!(r.zone, Zone::Certainty);
        assert!(r.expected_value > 0.0);
    }

    #[test]
    fn test_sequence_position_raises_risk_and_clamps() {
        let mut e = engine();
        e.record_round(RoundOutcome::new(520, 6.0));
        e.record_round(RoundOutcome::new(40, 1.3));
        e.record_round(RoundOutcome::new(25, 1.1));
        assert_eq!(e.tracker().position(), 2);

        let r = e.compute_probability(500, &[]);
        assert_eq!(r.adjustment(AdjustmentSource::SequencePosition), Some(1.30));
        // Early in the gap the cycle dampens long rounds, so the rug side is amplified
        assert!(r.adjustment(AdjustmentSource::Cycle).unwrap() > 1.0);
        assert!(r.clamped);
        assert!((r.final_probability - 0.98).abs() < 1e-12);
        assert!((r.risk_multiplier - 1.30).abs() < 1e-12);
    }

    #[test]
    fn test_lower_bound_is_flagged() {
        let mut config = EngineConfig::default();
        config.model.min_probability = 0.2;
        let e = DecisionEngine::new(config).unwrap();
        let r = e.compute_probability(0, &[]);
        assert!(r.clamped);
        assert!((r.final_probability - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_abrupt_end_floor() {
        let e = engine();
        let obs = observations(&[20.0, 35.0, 48.0, 52.0, 61.0], 200);
        let r = e.compute_probability(200, &obs);
        let floor = r.floor.unwrap();
        assert_eq!(floor.source, AdjustmentSource::AbruptEnd);
        assert!(r.adjusted_probability < 0.84);
        assert!((r.final_probability - 0.84).abs() < 1e-12);
        assert_eq!(r.zone, Zone::Certainty);
    }

    #[test]
    fn test_abrupt_end_floor_uses_supplied_crossing() {
        let e = engine();
        let obs = observations(&[60.0; 30], 400);
        let stale = e.evaluate(&DecisionQuery::new(400, &obs));
        assert!(stale.floor.map(|f| f.source) != Some(AdjustmentSource::AbruptEnd));

        let recent = e.evaluate(&DecisionQuery::new(400, &obs).with_peak_crossed_at(390));
        assert_eq!(recent.floor.unwrap().source, AdjustmentSource::AbruptEnd);
        assert!(recent.final_probability >= 0.84);
    }

    #[test]
    fn test_missing_volatility_is_derived() {
        let e = engine();
        let mut values = Vec::new();
        let mut v = 1.0;
        for i in 0..19 {
            v += if i % 2 == 0 { 0.01 } else { 0.02 };
            values.push(v);
        }
        values.push(v + 0.5);
        let obs = observations(&values, 200);

        let r = e.compute_probability(200, &obs);
        let floor = r.floor.unwrap();
        assert_eq!(floor.source, AdjustmentSource::VolatilitySpike);
        assert!((r.final_probability - 0.78).abs() < 1e-12);
    }

    #[test]
    fn test_window_override() {
        let e = engine();
        let short = e.evaluate(&DecisionQuery::new(200, &[]).with_window(10));
        let long = e.evaluate(&DecisionQuery::new(200, &[]).with_window(80));
        assert_eq!(short.window, 10);
        assert!(short.base_probability < long.base_probability);
    }

    #[test]
    fn test_engines_are_independent() {
        let mut a = engine();
        let b = engine();
        a.record_round(RoundOutcome::new(700, 12.0));
        a.record_round(RoundOutcome::new(30, 1.0));
        assert_eq!(a.tracker().position(), 1);
        assert_eq!(b.tracker().position(), 0);
        assert!(a.compute_probability(300, &[]).final_probability
            > b.compute_probability(300, &[]).final_probability);
    }

    #[test]
    fn test_custom_detector_multiplier() {
        struct Doubler;
        impl PatternDetector for Doubler {
            fn detect(&self, _ctx: &DetectorContext<'_>) -> Signal {
                Signal::Multiplier {
                    factor: 2.0,
                    confidence: 1.0,
                }
            }
            fn source(&self) -> AdjustmentSource {
                AdjustmentSource::Plateau
            }
            fn name(&self) -> &'static str {
                "doubler"
            }
        }

        let mut e = engine();
        let before = e.compute_probability(150, &[]).final_probability;
        e.add_detector(Doubler);
        let after = e.compute_probability(150, &[]).final_probability;
        assert!((after - 2.0 * before).abs() < 1e-9);
    }

    #[test]
    fn test_long_round_probability_follows_sequence() {
        let mut e = engine();
        let neutral = e.compute_probability(450, &[]).long_round_probability;
        e.record_round(RoundOutcome::new(510, 5.0));
        e.record_round(RoundOutcome::new(20, 1.0));
        e.record_round(RoundOutcome::new(20, 1.0));
        let after = e.compute_probability(450, &[]).long_round_probability;
        assert!(after < neutral);
        assert!((0.0..=1.0).contains(&after));
    }
}
