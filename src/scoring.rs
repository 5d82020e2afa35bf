//! Per-category offer scoring: min-max normalization folded into a single
//! preference-weighted attractiveness score in [0, 1].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Offer;

/// Guards against division by zero when a dimension has no spread; in that
/// degenerate case the normalized value is ~1 for every offer, which is
/// correct since there is nothing to discriminate.
pub const EPSILON: f64 = 1e-9;

/// Tolerance for the weights-sum-to-one invariant.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("preference weights must sum to 1.0, got {sum}")]
    InvalidWeights { sum: f64 },
}

/// Relative importance of price, delivery speed and quality. The three must
/// sum to 1.0 so scores read as a convex combination.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PreferenceWeights {
    pub price_weight: f64,
    pub delivery_weight: f64,
    pub quality_weight: f64,
}

impl PreferenceWeights {
    pub fn new(price: f64, delivery: f64, quality: f64) -> Result<Self, ScoringError> {
        let weights = Self {
            price_weight: price,
            delivery_weight: delivery,
            quality_weight: quality,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        let sum = self.price_weight + self.delivery_weight + self.quality_weight;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ScoringError::InvalidWeights { sum });
        }
        Ok(())
    }
}

impl Default for PreferenceWeights {
    fn default() -> Self {
        Self {
            price_weight: 0.4,
            delivery_weight: 0.3,
            quality_weight: 0.3,
        }
    }
}

/// Score every offer in one category against its peers. Price and delivery
/// are lower-is-better so they are inverted; quality is not.
pub fn score_category(offers: &[Offer], weights: &PreferenceWeights) -> BTreeMap<String, f64> {
    let mut scores = BTreeMap::new();
    if offers.is_empty() {
        return scores;
    }

    let prices: Vec<f64> = offers.iter().map(|o| o.price).collect();
    let deliveries: Vec<f64> = offers.iter().map(|o| f64::from(o.delivery_days)).collect();
    let qualities: Vec<f64> = offers.iter().map(|o| o.quality_score).collect();

    let (min_price, max_price) = min_max(&prices);
    let (min_delivery, max_delivery) = min_max(&deliveries);
    let (min_quality, max_quality) = min_max(&qualities);

    for offer in offers {
        let norm_price = 1.0 - (offer.price - min_price) / (max_price - min_price + EPSILON);
        let norm_delivery = 1.0
            - (f64::from(offer.delivery_days) - min_delivery)
                / (max_delivery - min_delivery + EPSILON);
        let norm_quality =
            (offer.quality_score - min_quality) / (max_quality - min_quality + EPSILON);

        let score = norm_price * weights.price_weight
            + norm_delivery * weights.delivery_weight
            + norm_quality * weights.quality_weight;
        scores.insert(offer.name.clone(), score);
    }
    scores
}

fn min_max(values: &[f64]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        min = min.min(*v);
        max = max.max(*v);
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Offer;

    fn sample_offers() -> Vec<Offer> {
        vec![
            Offer::new("Budget", 120.0, 10, 0.6, "http://example.com/a"),
            Offer::new("Express", 250.0, 2, 0.8, "http://example.com/b"),
            Offer::new("Premium", 400.0, 7, 0.95, "http://example.com/c"),
        ]
    }

    #[test]
    fn valid_weights_construct() {
        let w = PreferenceWeights::new(0.4, 0.3, 0.3).expect("valid weights");
        assert!((w.price_weight - 0.4).abs() < 1e-12);
    }

    #[test]
    fn weights_must_sum_to_one() {
        assert!(PreferenceWeights::new(0.5, 0.3, 0.3).is_err());
        assert!(PreferenceWeights::new(0.1, 0.1, 0.1).is_err());
        // Inside tolerance passes.
        assert!(PreferenceWeights::new(0.4, 0.3, 0.3 + 5e-10).is_ok());
    }

    #[test]
    fn scores_stay_in_unit_interval_for_extreme_weights() {
        let offers = sample_offers();
        let extremes = [
            PreferenceWeights::new(1.0, 0.0, 0.0).unwrap(),
            PreferenceWeights::new(0.0, 1.0, 0.0).unwrap(),
            PreferenceWeights::new(0.0, 0.0, 1.0).unwrap(),
        ];
        for weights in extremes {
            for (_, score) in score_category(&offers, &weights) {
                assert!(
                    (-1e-9..=1.0 + 1e-9).contains(&score),
                    "score {score} out of range"
                );
            }
        }
    }

    #[test]
    fn cheapest_wins_on_pure_price_weight() {
        let offers = sample_offers();
        let weights = PreferenceWeights::new(1.0, 0.0, 0.0).unwrap();
        let scores = score_category(&offers, &weights);
        assert!(scores["Budget"] > scores["Express"]);
        assert!(scores["Express"] > scores["Premium"]);
    }

    #[test]
    fn identical_dimension_gives_no_signal() {
        let offers = vec![
            Offer::new("A", 100.0, 5, 0.5, ""),
            Offer::new("B", 100.0, 5, 0.5, ""),
        ];
        let scores = score_category(&offers, &PreferenceWeights::default());
        // Every normalized dimension collapses to ~1, so scores are ~equal.
        assert!((scores["A"] - scores["B"]).abs() < 1e-6);
    }

    #[test]
    fn empty_category_scores_nothing() {
        assert!(score_category(&[], &PreferenceWeights::default()).is_empty());
    }
}
