//! Compatibility scoring between a child and a candidate host family.
//!
//! The scorer is a pure function of two entity snapshots plus a
//! [`ScoringContext`]: the caller supplies the evaluation date and the
//! family's true active-placement count so the scorer itself never touches
//! a store or a clock and can run from any number of concurrent readers.

mod factors;
mod weights;

pub use weights::{ScoringWeights, HIGH_RECOMMENDATION_FLOOR, MEDIUM_RECOMMENDATION_FLOOR};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{Child, ChildId, Family, FamilyId};

/// Inputs the scorer needs beyond the two entity snapshots.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext {
    pub today: NaiveDate,
    /// Number of placements currently active with the family, as counted by
    /// the store. Capacity is always derived from this, never assumed.
    pub active_placements: usize,
}

/// The five named factor scores, each in 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorScores {
    pub age_range: u8,
    pub special_needs: u8,
    pub family_size: u8,
    pub experience: u8,
    pub availability: u8,
}

/// Coordinator-facing recommendation tier derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationTier {
    High,
    Medium,
    Low,
}

impl RecommendationTier {
    pub fn for_score(overall: u8) -> Self {
        if overall >= HIGH_RECOMMENDATION_FLOOR {
            Self::High
        } else if overall >= MEDIUM_RECOMMENDATION_FLOOR {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Full scoring outcome for one child/family pair.
///
/// `notes` are deterministic boundary-condition explanations in factor
/// order; they support audits and are never themselves scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityScore {
    pub child: ChildId,
    pub family: FamilyId,
    pub overall: u8,
    pub factors: FactorScores,
    pub recommendation: RecommendationTier,
    pub notes: Vec<String>,
}

/// Stateless scorer applying the weighted factor rubric.
#[derive(Debug, Clone, Default)]
pub struct CompatibilityScorer {
    weights: ScoringWeights,
}

impl CompatibilityScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Scores one pair. Never fails: disqualifying conditions surface as
    /// zero-valued factors with explanatory notes.
    pub fn score(&self, child: &Child, family: &Family, ctx: &ScoringContext) -> CompatibilityScore {
        let (factors, notes) = factors::score_factors(child, family, ctx);
        let overall = self.weights.weighted_total(&factors);

        CompatibilityScore {
            child: child.id.clone(),
            family: family.id.clone(),
            overall,
            factors,
            recommendation: RecommendationTier::for_score(overall),
            notes,
        }
    }
}
