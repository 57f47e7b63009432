//! Placement lifecycle: compatibility scoring, matching review, the
//! placement state machine, the approximation process, and cost
//! allocation.
//!
//! Storage and event delivery are injected through the [`EntityStore`] and
//! [`Notifier`] traits; [`InMemoryStore`] and [`LogNotifier`] back the CLI
//! and the tests.

pub mod costs;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod matching;
pub mod process;
pub mod scoring;
pub mod store;
pub mod transitions;

#[cfg(test)]
mod tests;

pub use costs::{BudgetError, BudgetLedger, CostAllocator, CostPolicy};
pub use domain::{
    ActorId, Address, AgeRange, Child, ChildId, ChildStatus, EntityKind, Family, FamilyBackground,
    FamilyId, FamilyPreferences, FamilyStatus, Gender, GenderPreference, HouseholdMember,
    Matching, MatchingId, MatchingStatus, PastPlacement, PaymentRecord, PersonalInfo, Placement,
    PlacementBudget, PlacementId, PlacementOutcome, PlacementStatus, SpecialNeeds, StageId,
};
pub use error::EngineError;
pub use lifecycle::PlacementService;
pub use matching::{MatchingService, RankedCandidates};
pub use process::{
    ApproximationProcess, ProgressMetrics, Stage, StageCompletion,
    DEFAULT_EXPECTED_DURATION_DAYS, ON_TRACK_TOLERANCE,
};
pub use scoring::{
    CompatibilityScore, CompatibilityScorer, FactorScores, RecommendationTier, ScoringContext,
    ScoringWeights,
};
pub use store::{
    EngineEvent, EntityStore, EntityWrite, EventKind, InMemoryStore, LogNotifier, Notifier,
    NotifierError, StoreError, Versioned,
};
pub use transitions::{
    child_transition, family_transition, placement_transition, InvalidStatusTransition,
};
