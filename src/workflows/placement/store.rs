use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    ActorId, Child, ChildId, EntityKind, Family, FamilyId, FamilyStatus, Matching, MatchingId,
    Placement, PlacementId, PlacementStatus,
};

/// Entity snapshot paired with its optimistic-locking version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub entity: T,
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{} {id} not found", entity.as_str())]
    NotFound { entity: EntityKind, id: String },
    #[error("{} {id} already exists", entity.as_str())]
    AlreadyExists { entity: EntityKind, id: String },
    #[error("{} {id} was modified concurrently", entity.as_str())]
    VersionConflict { entity: EntityKind, id: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One write inside an atomic commit.
///
/// Updates carry the version the caller read; the store rejects the whole
/// commit when any carried version is stale, so a multi-entity mutation is
/// never partially visible.
#[derive(Debug, Clone)]
pub enum EntityWrite {
    Child(Versioned<Child>),
    Family(Versioned<Family>),
    Matching(Versioned<Matching>),
    Placement(Versioned<Placement>),
    InsertPlacement(Placement),
}

/// Storage abstraction supplied by the hosting service.
///
/// Implementations are expected to bound every call (no indefinite
/// blocking) and surface transport problems as [`StoreError::Unavailable`].
pub trait EntityStore: Send + Sync {
    fn child(&self, id: &ChildId) -> Result<Versioned<Child>, StoreError>;
    fn family(&self, id: &FamilyId) -> Result<Versioned<Family>, StoreError>;
    fn matching(&self, id: &MatchingId) -> Result<Versioned<Matching>, StoreError>;
    fn placement(&self, id: &PlacementId) -> Result<Versioned<Placement>, StoreError>;

    /// Families currently in `Available` status, ordered by id.
    fn available_families(&self) -> Result<Vec<Versioned<Family>>, StoreError>;
    /// Placements in `Active` status hosted by the family, ordered by id.
    fn active_placements_for_family(
        &self,
        id: &FamilyId,
    ) -> Result<Vec<Versioned<Placement>>, StoreError>;

    fn insert_child(&self, child: Child) -> Result<Versioned<Child>, StoreError>;
    fn insert_family(&self, family: Family) -> Result<Versioned<Family>, StoreError>;
    fn insert_matching(&self, matching: Matching) -> Result<Versioned<Matching>, StoreError>;

    /// Applies every write or none of them.
    fn commit(&self, writes: Vec<EntityWrite>) -> Result<(), StoreError>;
}

/// Event names emitted to the notifier, one per audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MatchingProposed,
    MatchingApproved,
    MatchingRejected,
    PlacementCreated,
    PlacementCompleted,
    PlacementInterrupted,
    PlacementTransferred,
    PlacementResumed,
    ChildReturnedFamily,
    StageCompleted,
    AllocationUpdated,
    PaymentRecorded,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MatchingProposed => "matching-proposed",
            Self::MatchingApproved => "matching-approved",
            Self::MatchingRejected => "matching-rejected",
            Self::PlacementCreated => "placement-created",
            Self::PlacementCompleted => "placement-completed",
            Self::PlacementInterrupted => "placement-interrupted",
            Self::PlacementTransferred => "placement-transferred",
            Self::PlacementResumed => "placement-resumed",
            Self::ChildReturnedFamily => "child-returned-family",
            Self::StageCompleted => "stage-completed",
            Self::AllocationUpdated => "allocation-updated",
            Self::PaymentRecorded => "payment-recorded",
        }
    }
}

/// Payload handed to the notifier for downstream delivery (dashboards,
/// messaging). The engine treats emission as fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub kind: EventKind,
    pub subject: String,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
    pub details: BTreeMap<String, String>,
}

impl EngineEvent {
    pub fn new(kind: EventKind, subject: impl Into<String>, actor: &ActorId) -> Self {
        Self {
            kind,
            subject: subject.into(),
            actor: actor.clone(),
            occurred_at: Utc::now(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Trait describing outbound event hooks.
pub trait Notifier: Send + Sync {
    fn emit(&self, event: EngineEvent) -> Result<(), NotifierError>;
}

/// Event dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("notifier transport unavailable: {0}")]
    Transport(String),
}

/// Notifier that writes events to the tracing log. Suits the CLI and any
/// embedding that has no delivery channel wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn emit(&self, event: EngineEvent) -> Result<(), NotifierError> {
        info!(
            kind = event.kind.as_str(),
            subject = %event.subject,
            actor = %event.actor.0,
            "engine event"
        );
        Ok(())
    }
}

#[derive(Default)]
struct StoreState {
    children: HashMap<ChildId, Versioned<Child>>,
    families: HashMap<FamilyId, Versioned<Family>>,
    matchings: HashMap<MatchingId, Versioned<Matching>>,
    placements: HashMap<PlacementId, Versioned<Placement>>,
}

/// Bundled store implementation: all four entity maps behind one mutex, so
/// `commit` is trivially transactional. Used by the CLI, the tests, and any
/// embedding that does not bring its own store.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl EntityStore for InMemoryStore {
    fn child(&self, id: &ChildId) -> Result<Versioned<Child>, StoreError> {
        self.state()
            .children
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: EntityKind::Child,
                id: id.0.clone(),
            })
    }

    fn family(&self, id: &FamilyId) -> Result<Versioned<Family>, StoreError> {
        self.state()
            .families
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: EntityKind::Family,
                id: id.0.clone(),
            })
    }

    fn matching(&self, id: &MatchingId) -> Result<Versioned<Matching>, StoreError> {
        self.state()
            .matchings
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: EntityKind::Matching,
                id: id.0.clone(),
            })
    }

    fn placement(&self, id: &PlacementId) -> Result<Versioned<Placement>, StoreError> {
        self.state()
            .placements
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: EntityKind::Placement,
                id: id.0.clone(),
            })
    }

    fn available_families(&self) -> Result<Vec<Versioned<Family>>, StoreError> {
        let state = self.state();
        let mut families: Vec<Versioned<Family>> = state
            .families
            .values()
            .filter(|record| record.entity.status == FamilyStatus::Available)
            .cloned()
            .collect();
        families.sort_by(|a, b| a.entity.id.cmp(&b.entity.id));
        Ok(families)
    }

    fn active_placements_for_family(
        &self,
        id: &FamilyId,
    ) -> Result<Vec<Versioned<Placement>>, StoreError> {
        let state = self.state();
        let mut placements: Vec<Versioned<Placement>> = state
            .placements
            .values()
            .filter(|record| {
                record.entity.family == *id && record.entity.status == PlacementStatus::Active
            })
            .cloned()
            .collect();
        placements.sort_by(|a, b| a.entity.id.0.cmp(&b.entity.id.0));
        Ok(placements)
    }

    fn insert_child(&self, child: Child) -> Result<Versioned<Child>, StoreError> {
        let mut state = self.state();
        if state.children.contains_key(&child.id) {
            return Err(StoreError::AlreadyExists {
                entity: EntityKind::Child,
                id: child.id.0.clone(),
            });
        }
        let record = Versioned {
            version: 1,
            entity: child,
        };
        state
            .children
            .insert(record.entity.id.clone(), record.clone());
        Ok(record)
    }

    fn insert_family(&self, family: Family) -> Result<Versioned<Family>, StoreError> {
        let mut state = self.state();
        if state.families.contains_key(&family.id) {
            return Err(StoreError::AlreadyExists {
                entity: EntityKind::Family,
                id: family.id.0.clone(),
            });
        }
        let record = Versioned {
            version: 1,
            entity: family,
        };
        state
            .families
            .insert(record.entity.id.clone(), record.clone());
        Ok(record)
    }

    fn insert_matching(&self, matching: Matching) -> Result<Versioned<Matching>, StoreError> {
        let mut state = self.state();
        if state.matchings.contains_key(&matching.id) {
            return Err(StoreError::AlreadyExists {
                entity: EntityKind::Matching,
                id: matching.id.0.clone(),
            });
        }
        let record = Versioned {
            version: 1,
            entity: matching,
        };
        state
            .matchings
            .insert(record.entity.id.clone(), record.clone());
        Ok(record)
    }

    fn commit(&self, writes: Vec<EntityWrite>) -> Result<(), StoreError> {
        let mut state = self.state();

        // Validate every write before touching anything.
        for write in &writes {
            match write {
                EntityWrite::Child(record) => {
                    check_version(
                        state.children.get(&record.entity.id),
                        record.version,
                        EntityKind::Child,
                        &record.entity.id.0,
                    )?;
                }
                EntityWrite::Family(record) => {
                    check_version(
                        state.families.get(&record.entity.id),
                        record.version,
                        EntityKind::Family,
                        &record.entity.id.0,
                    )?;
                }
                EntityWrite::Matching(record) => {
                    check_version(
                        state.matchings.get(&record.entity.id),
                        record.version,
                        EntityKind::Matching,
                        &record.entity.id.0,
                    )?;
                }
                EntityWrite::Placement(record) => {
                    check_version(
                        state.placements.get(&record.entity.id),
                        record.version,
                        EntityKind::Placement,
                        &record.entity.id.0,
                    )?;
                }
                EntityWrite::InsertPlacement(placement) => {
                    if state.placements.contains_key(&placement.id) {
                        return Err(StoreError::AlreadyExists {
                            entity: EntityKind::Placement,
                            id: placement.id.0.clone(),
                        });
                    }
                }
            }
        }

        for write in writes {
            match write {
                EntityWrite::Child(record) => {
                    state.children.insert(
                        record.entity.id.clone(),
                        Versioned {
                            version: record.version + 1,
                            entity: record.entity,
                        },
                    );
                }
                EntityWrite::Family(record) => {
                    state.families.insert(
                        record.entity.id.clone(),
                        Versioned {
                            version: record.version + 1,
                            entity: record.entity,
                        },
                    );
                }
                EntityWrite::Matching(record) => {
                    state.matchings.insert(
                        record.entity.id.clone(),
                        Versioned {
                            version: record.version + 1,
                            entity: record.entity,
                        },
                    );
                }
                EntityWrite::Placement(record) => {
                    state.placements.insert(
                        record.entity.id.clone(),
                        Versioned {
                            version: record.version + 1,
                            entity: record.entity,
                        },
                    );
                }
                EntityWrite::InsertPlacement(placement) => {
                    state.placements.insert(
                        placement.id.clone(),
                        Versioned {
                            version: 1,
                            entity: placement,
                        },
                    );
                }
            }
        }

        Ok(())
    }
}

fn check_version<T>(
    current: Option<&Versioned<T>>,
    expected: u64,
    entity: EntityKind,
    id: &str,
) -> Result<(), StoreError> {
    match current {
        None => Err(StoreError::NotFound {
            entity,
            id: id.to_string(),
        }),
        Some(record) if record.version != expected => Err(StoreError::VersionConflict {
            entity,
            id: id.to_string(),
        }),
        Some(_) => Ok(()),
    }
}
