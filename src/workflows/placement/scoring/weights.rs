use serde::{Deserialize, Serialize};

use super::FactorScores;

/// Overall score at or above which a matching is recommended outright.
pub const HIGH_RECOMMENDATION_FLOOR: u8 = 80;
/// Overall score at or above which a matching warrants coordinator review.
pub const MEDIUM_RECOMMENDATION_FLOOR: u8 = 60;

/// Fixed factor weights behind the overall compatibility score.
///
/// The defaults are business policy and are pinned by tests; they must sum
/// to 1.0 so the overall score stays within 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub age_range: f64,
    pub special_needs: f64,
    pub family_size: f64,
    pub experience: f64,
    pub availability: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            age_range: 0.25,
            special_needs: 0.30,
            family_size: 0.15,
            experience: 0.20,
            availability: 0.10,
        }
    }
}

impl ScoringWeights {
    /// Weighted sum of the five factors, rounded to the nearest integer.
    pub(crate) fn weighted_total(&self, factors: &FactorScores) -> u8 {
        let total = self.age_range * f64::from(factors.age_range)
            + self.special_needs * f64::from(factors.special_needs)
            + self.family_size * f64::from(factors.family_size)
            + self.experience * f64::from(factors.experience)
            + self.availability * f64::from(factors.availability);
        total.round().clamp(0.0, 100.0) as u8
    }
}
