use super::costs::BudgetError;
use super::domain::{ChildId, EntityKind, FamilyId, MatchingId, PlacementId, StageId};
use super::store::StoreError;
use super::transitions::InvalidStatusTransition;

/// Failure modes surfaced by the matching and lifecycle services.
///
/// Guard violations carry the ids and statuses a caller needs to render a
/// useful message; infrastructure problems wrap the store error unchanged.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("child {child} is not awaiting placement (status: {status})")]
    ChildNotAvailable { child: ChildId, status: String },
    #[error("family {family} is not available (status: {status})")]
    FamilyNotAvailable { family: FamilyId, status: String },
    #[error("family {family} is already hosting its maximum of {max_children} children")]
    FamilyAtCapacity {
        family: FamilyId,
        max_children: u8,
    },
    #[error("matching {matching} is not in a state that allows this operation (status: {status})")]
    InvalidState {
        matching: MatchingId,
        status: String,
    },
    #[error("placement {placement} has no stage {stage}")]
    StageNotFound {
        placement: PlacementId,
        stage: StageId,
    },
    #[error("placement {placement} is not active (status: {status})")]
    PlacementNotActive {
        placement: PlacementId,
        status: String,
    },
    #[error(transparent)]
    Transition(#[from] InvalidStatusTransition),
    #[error(transparent)]
    Budget(#[from] BudgetError),
    #[error("{} {id} was modified concurrently; reload and retry", entity.as_str())]
    ConcurrentModification { entity: EntityKind, id: String },
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict { entity, id } => {
                Self::ConcurrentModification { entity, id }
            }
            other => Self::Store(other),
        }
    }
}

impl EngineError {
    /// Whether the caller can expect the same call to succeed later.
    /// Concurrent modifications clear on reload; an unavailable store may
    /// come back. Guard violations never do.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentModification { .. } | Self::Store(StoreError::Unavailable(_))
        )
    }
}
