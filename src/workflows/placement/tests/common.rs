use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};

use crate::workflows::placement::costs::{CostAllocator, CostPolicy};
use crate::workflows::placement::domain::{
    ActorId, Address, AgeRange, Child, ChildId, ChildStatus, EntityKind, Family, FamilyBackground,
    FamilyId, FamilyPreferences, FamilyStatus, Gender, GenderPreference, HouseholdMember, Matching,
    MatchingId, MatchingStatus, PersonalInfo, Placement, PlacementId, SpecialNeeds,
};
use crate::workflows::placement::lifecycle::PlacementService;
use crate::workflows::placement::matching::MatchingService;
use crate::workflows::placement::scoring::{CompatibilityScore, CompatibilityScorer, ScoringContext};
use crate::workflows::placement::store::{
    EngineEvent, EntityStore, EntityWrite, EventKind, InMemoryStore, Notifier, NotifierError,
    StoreError, Versioned,
};

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date")
}

pub(super) fn coordinator() -> ActorId {
    ActorId("coord-alves".to_string())
}

/// Ten years old on [`today`], no special needs, no siblings.
pub(super) fn awaiting_child(id: &str) -> Child {
    Child {
        id: ChildId(id.to_string()),
        personal: PersonalInfo {
            name: "Rafael Lima".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2015, 3, 1).expect("valid date"),
            gender: Gender::Male,
        },
        special_needs: SpecialNeeds::default(),
        background: FamilyBackground::default(),
        status: ChildStatus::Awaiting,
        current_placement: None,
    }
}

/// Same child with two declared care needs (complexity 2).
pub(super) fn child_with_needs(id: &str) -> Child {
    let mut child = awaiting_child(id);
    child.special_needs = SpecialNeeds {
        has_special_needs: true,
        health_conditions: vec!["asthma".to_string()],
        medications: vec!["inhaler".to_string()],
        educational_needs: Vec::new(),
    };
    child
}

/// Two-adult household, approved for ages 5-15, one slot, no history.
pub(super) fn available_family(id: &str) -> Family {
    Family {
        id: FamilyId(id.to_string()),
        primary_contact: "Marta Alves".to_string(),
        address: Address {
            city: "Santa Clara".to_string(),
            state: "SP".to_string(),
        },
        composition: vec![
            HouseholdMember {
                relationship: "parent".to_string(),
                age: 38,
                monthly_income: 4200,
            },
            HouseholdMember {
                relationship: "parent".to_string(),
                age: 36,
                monthly_income: 3600,
            },
        ],
        preferences: FamilyPreferences {
            age_range: AgeRange { min: 5, max: 15 },
            gender_preference: GenderPreference::Any,
            special_needs_accepted: true,
            max_children: 1,
        },
        status: FamilyStatus::Available,
        history: Vec::new(),
    }
}

pub(super) fn spacious_family(id: &str) -> Family {
    let mut family = available_family(id);
    family.preferences.max_children = 3;
    family
}

pub(super) fn context(active_placements: usize) -> ScoringContext {
    ScoringContext {
        today: today(),
        active_placements,
    }
}

pub(super) fn score_pair(child: &Child, family: &Family, active: usize) -> CompatibilityScore {
    CompatibilityScorer::default().score(child, family, &context(active))
}

/// An already-approved matching record for seeding stores directly.
pub(super) fn approved_matching(child: &Child, family: &Family) -> Matching {
    Matching {
        id: MatchingId("match-fixture".to_string()),
        child: child.id.clone(),
        family: family.id.clone(),
        compatibility: score_pair(child, family, 0),
        status: MatchingStatus::Approved,
        proposed_by: coordinator(),
        proposed_at: Utc::now(),
        approved_by: Some(coordinator()),
        approved_at: Some(Utc::now()),
        placement: None,
        notes: Vec::new(),
    }
}

pub(super) fn seeded_store(children: Vec<Child>, families: Vec<Family>) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    for child in children {
        store.insert_child(child).expect("seed child");
    }
    for family in families {
        store.insert_family(family).expect("seed family");
    }
    store
}

pub(super) fn update_child<F>(store: &InMemoryStore, id: &ChildId, mutate: F)
where
    F: FnOnce(&mut Child),
{
    let mut record = store.child(id).expect("child present");
    mutate(&mut record.entity);
    store
        .commit(vec![EntityWrite::Child(record)])
        .expect("child update");
}

pub(super) fn update_family<F>(store: &InMemoryStore, id: &FamilyId, mutate: F)
where
    F: FnOnce(&mut Family),
{
    let mut record = store.family(id).expect("family present");
    mutate(&mut record.entity);
    store
        .commit(vec![EntityWrite::Family(record)])
        .expect("family update");
}

pub(super) fn matching_service(
    store: Arc<InMemoryStore>,
) -> (
    MatchingService<InMemoryStore, RecordingNotifier>,
    Arc<RecordingNotifier>,
) {
    let notifier = Arc::new(RecordingNotifier::default());
    (MatchingService::new(store, notifier.clone()), notifier)
}

pub(super) fn placement_service(
    store: Arc<InMemoryStore>,
) -> (
    PlacementService<InMemoryStore, RecordingNotifier>,
    Arc<RecordingNotifier>,
    Arc<CostAllocator>,
) {
    placement_service_with_policy(store, CostPolicy::default())
}

pub(super) fn placement_service_with_policy(
    store: Arc<InMemoryStore>,
    policy: CostPolicy,
) -> (
    PlacementService<InMemoryStore, RecordingNotifier>,
    Arc<RecordingNotifier>,
    Arc<CostAllocator>,
) {
    let notifier = Arc::new(RecordingNotifier::default());
    let allocator = Arc::new(CostAllocator::new(policy));
    (
        PlacementService::new(store, notifier.clone(), allocator.clone()),
        notifier,
        allocator,
    )
}

pub(super) fn workflow_services(
    store: Arc<InMemoryStore>,
) -> (
    MatchingService<InMemoryStore, RecordingNotifier>,
    PlacementService<InMemoryStore, RecordingNotifier>,
    Arc<RecordingNotifier>,
    Arc<CostAllocator>,
) {
    let notifier = Arc::new(RecordingNotifier::default());
    let allocator = Arc::new(CostAllocator::default());
    (
        MatchingService::new(store.clone(), notifier.clone()),
        PlacementService::new(store, notifier.clone(), allocator.clone()),
        notifier,
        allocator,
    )
}

/// Propose and approve a matching for the pair, returning its id.
pub(super) fn approve_pair<N: Notifier + 'static>(
    matching: &MatchingService<InMemoryStore, N>,
    child: &ChildId,
    family: &FamilyId,
) -> MatchingId {
    let proposed = matching
        .propose_matching(child, family, &coordinator(), today())
        .expect("proposal accepted");
    matching
        .approve_matching(&proposed.entity.id, &coordinator())
        .expect("approval accepted");
    proposed.entity.id
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingNotifier {
    pub(super) fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(|event| event.kind).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn emit(&self, event: EngineEvent) -> Result<(), NotifierError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(event);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn emit(&self, _event: EngineEvent) -> Result<(), NotifierError> {
        Err(NotifierError::Transport("webhook offline".to_string()))
    }
}

/// Store that reads normally but rejects every commit with a version
/// conflict, as if another coordinator always wins the race.
pub(super) struct ConflictStore(pub(super) InMemoryStore);

impl EntityStore for ConflictStore {
    fn child(&self, id: &ChildId) -> Result<Versioned<Child>, StoreError> {
        self.0.child(id)
    }

    fn family(&self, id: &FamilyId) -> Result<Versioned<Family>, StoreError> {
        self.0.family(id)
    }

    fn matching(&self, id: &MatchingId) -> Result<Versioned<Matching>, StoreError> {
        self.0.matching(id)
    }

    fn placement(&self, id: &PlacementId) -> Result<Versioned<Placement>, StoreError> {
        self.0.placement(id)
    }

    fn available_families(&self) -> Result<Vec<Versioned<Family>>, StoreError> {
        self.0.available_families()
    }

    fn active_placements_for_family(
        &self,
        id: &FamilyId,
    ) -> Result<Vec<Versioned<Placement>>, StoreError> {
        self.0.active_placements_for_family(id)
    }

    fn insert_child(&self, child: Child) -> Result<Versioned<Child>, StoreError> {
        self.0.insert_child(child)
    }

    fn insert_family(&self, family: Family) -> Result<Versioned<Family>, StoreError> {
        self.0.insert_family(family)
    }

    fn insert_matching(&self, matching: Matching) -> Result<Versioned<Matching>, StoreError> {
        self.0.insert_matching(matching)
    }

    fn commit(&self, _writes: Vec<EntityWrite>) -> Result<(), StoreError> {
        Err(StoreError::VersionConflict {
            entity: EntityKind::Child,
            id: "contended".to_string(),
        })
    }
}

pub(super) struct UnavailableStore;

impl EntityStore for UnavailableStore {
    fn child(&self, _id: &ChildId) -> Result<Versioned<Child>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn family(&self, _id: &FamilyId) -> Result<Versioned<Family>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn matching(&self, _id: &MatchingId) -> Result<Versioned<Matching>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn placement(&self, _id: &PlacementId) -> Result<Versioned<Placement>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn available_families(&self) -> Result<Vec<Versioned<Family>>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn active_placements_for_family(
        &self,
        _id: &FamilyId,
    ) -> Result<Vec<Versioned<Placement>>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn insert_child(&self, _child: Child) -> Result<Versioned<Child>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn insert_family(&self, _family: Family) -> Result<Versioned<Family>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn insert_matching(&self, _matching: Matching) -> Result<Versioned<Matching>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn commit(&self, _writes: Vec<EntityWrite>) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}
