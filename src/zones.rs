//! Zone classification and expected value
//!
//! Zones are upper-inclusive bands whose edges are multiples of the breakeven probability
//! `1 / payout_ratio`. With the default multiples and a 5:1 payout this gives
//! Avoid ≤ 0.10 < Danger ≤ 0.15 < Breakeven ≤ 0.20 < Profit ≤ 0.30 < High Profit ≤ 0.50 < Certainty.

use crate::config::ZoneConfig;
use crate::types::Zone;
use serde::Serialize;

/// One zone and the probabilities it covers: `(lower, upper]`, or `[0, upper]` for the first
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneBand {
    pub zone: Zone,
    pub lower: f64,
    pub upper: f64,
}

impl ZoneBand {
    /// Zones can be empty when a low payout ratio pushes edges to 1.0
    pub fn is_empty(&self) -> bool {
        self.upper <= self.lower && self.zone != Zone::Avoid
    }
}

/// Zone plus what the player should do about it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneAssessment {
    pub zone: Zone,
    pub recommendation: &'static str,
    pub confidence: f64,
    pub expected_value: f64,
}

#[derive(Debug, Clone)]
pub struct ZoneClassifier {
    payout_ratio: f64,
    /// Upper edges of the first five zones; Certainty runs to 1.0
    edges: [f64; 5],
}

impl ZoneClassifier {
    pub fn new(payout_ratio: f64, config: &ZoneConfig) -> Self {
        let breakeven = 1.0 / payout_ratio;
        let mut edges = [0.0; 5];
        for (edge, multiple) in edges.iter_mut().zip(config.breakeven_multiples.iter()) {
            *edge = (breakeven * multiple).min(1.0);
        }
        Self {
            payout_ratio,
            edges,
        }
    }

    pub fn payout_ratio(&self) -> f64 {
        self.payout_ratio
    }

    /// Probability at which the side bet breaks even
    pub fn breakeven(&self) -> f64 {
        1.0 / self.payout_ratio
    }

    pub fn classify(&self, probability: f64) -> Zone {
        if probability.is_nan() {
            return Zone::Avoid;
        }
        let p = probability.clamp(0.0, 1.0);
        self.edges
            .iter()
            .position(|&edge| p <= edge)
            .map(|i| Zone::ALL[i])
            .unwrap_or(Zone::Certainty)
    }

    /// Expected value of a unit wager: `p * payout - (1 - p)`
    pub fn expected_value(&self, probability: f64) -> f64 {
        probability * self.payout_ratio - (1.0 - probability)
    }

    pub fn assess(&self, probability: f64) -> ZoneAssessment {
        let zone = self.classify(probability);
        ZoneAssessment {
            zone,
            recommendation: zone.recommendation(),
            confidence: zone.confidence(),
            expected_value: self.expected_value(probability),
        }
    }

    /// The full partition of [0, 1], in zone order
    pub fn bands(&self) -> Vec<ZoneBand> {
        let mut lower = 0.0;
        Zone::ALL
            .iter()
            .enumerate()
            .map(|(i, &zone)| {
                let upper = self.edges.get(i).copied().unwrap_or(1.0);
                let band = ZoneBand { zone, lower, upper };
                lower = upper;
                band
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn classifier(payout: f64) -> ZoneClassifier {
        ZoneClassifier::new(payout, &ZoneConfig::default())
    }

    #[test]
    fn test_default_boundaries() {
        let c = classifier(5.0);
        let uppers: Vec<f64> = c.bands().iter().map(|b| b.upper).collect();
        let expected = [0.10, 0.15, 0.20, 0.30, 0.50, 1.0];
        for (u, e) in uppers.iter().zip(expected.iter()) {
            assert!((u - e).abs() < 1e-12);
        }

        assert_eq!(c.classify(0.0), Zone::Avoid);
        assert_eq!(c.classify(0.12), Zone::Danger);
        assert_eq!(c.classify(0.17), Zone::Breakeven);
        assert_eq!(c.classify(0.25), Zone::Profit);
        assert_eq!(c.classify(0.45), Zone::HighProfit);
        assert_eq!(c.classify(0.91), Zone::Certainty);
        assert_eq!(c.classify(1.0), Zone::Certainty);
    }

    #[test]
    fn test_partition_is_complete() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let payout = rng.gen_range(1.05..25.0);
            let c = classifier(payout);
            let bands = c.bands();

            // Contiguous and covering [0, 1]
            assert_eq!(bands[0].lower, 0.0);
            assert_eq!(bands[5].upper, 1.0);
            for pair in bands.windows(2) {
                assert_eq!(pair[0].upper, pair[1].lower);
            }

            for _ in 0..200 {
                let p: f64 = rng.gen_range(0.0..=1.0);
                let matching: Vec<&ZoneBand> = bands
                    .iter()
                    .filter(|b| {
                        let above = if b.zone == Zone::Avoid { p >= b.lower } else { p > b.lower };
                        above && p <= b.upper
                    })
                    .collect();
                assert_eq!(matching.len(), 1, "p = {} payout = {}", p, payout);
                assert_eq!(matching[0].zone, c.classify(p));
            }
        }
    }

    #[test]
    fn test_breakeven_lands_in_breakeven_zone() {
        for payout in [1.5, 2.0, 3.0, 4.0, 5.0, 7.5, 10.0, 20.0, 50.0] {
            let c = classifier(payout);
            assert_eq!(c.classify(1.0 / payout), Zone::Breakeven, "payout {}", payout);
        }
    }

    #[test]
    fn test_small_payout_leaves_upper_zones_empty() {
        let c = classifier(2.0);
        let bands = c.bands();
        assert!(bands[5].is_empty());
        assert_eq!(c.classify(0.99), Zone::HighProfit);
    }

    #[test]
    fn test_expected_value_uses_payout_ratio() {
        let c = classifier(5.0);
        assert!((c.expected_value(0.5) - 2.0).abs() < 1e-12);
        assert!((c.expected_value(1.0 / 6.0)).abs() < 1e-12);
        assert!((c.expected_value(0.0) + 1.0).abs() < 1e-12);

        let c = classifier(8.0);
        assert!((c.expected_value(0.25) - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_assessment() {
        let c = classifier(5.0);
        let a = c.assess(0.35);
        assert_eq!(a.zone, Zone::HighProfit);
        assert_eq!(a.recommendation, "STANDARD+");
        assert!((a.expected_value - 1.1).abs() < 1e-12);
        assert_eq!(c.classify(f64::NAN), Zone::Avoid);
    }
}
