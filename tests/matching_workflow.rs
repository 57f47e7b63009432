//! Integration scenarios for the matching workflow: candidate ranking,
//! proposal, coordinator review, and handoff into placement creation,
//! all through the public service facade.

mod common {
    use std::sync::{Arc, Mutex};

    use chrono::NaiveDate;

    use fostering_engine::workflows::placement::{
        ActorId, Address, AgeRange, Child, ChildId, ChildStatus, CostAllocator, EngineEvent,
        EntityStore, Family, FamilyBackground, FamilyId, FamilyPreferences, FamilyStatus, Gender,
        GenderPreference, HouseholdMember, InMemoryStore, MatchingService, Notifier,
        NotifierError, PastPlacement, PersonalInfo, PlacementOutcome, PlacementService,
        SpecialNeeds,
    };

    pub(super) fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date")
    }

    pub(super) fn coordinator() -> ActorId {
        ActorId("coord-alves".to_string())
    }

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
                    relationship: "mother".to_string(),
                    age: 38,
                    monthly_income: 4200,
                },
                HouseholdMember {
                    relationship: "father".to_string(),
                    age: 41,
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

    /// Same profile with one long-past interruption on record, which costs
    /// a few experience points without touching availability.
    pub(super) fn family_with_interruption(id: &str) -> Family {
        let mut family = available_family(id);
        family.history.push(PastPlacement {
            child: ChildId("child-archived".to_string()),
            outcome: PlacementOutcome::Interrupted,
            ended_on: NaiveDate::from_ymd_opt(2024, 1, 10).expect("valid date"),
        });
        family
    }

    #[derive(Default)]
    pub(super) struct RecordingNotifier {
        events: Mutex<Vec<EngineEvent>>,
    }

    impl RecordingNotifier {
        pub(super) fn kinds(&self) -> Vec<&'static str> {
            self.events
                .lock()
                .expect("lock")
                .iter()
                .map(|event| event.kind.as_str())
                .collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn emit(&self, event: EngineEvent) -> Result<(), NotifierError> {
            self.events.lock().expect("lock").push(event);
            Ok(())
        }
    }

    pub(super) fn seeded_store(children: Vec<Child>, families: Vec<Family>) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for child in children {
            store.insert_child(child).expect("child inserted");
        }
        for family in families {
            store.insert_family(family).expect("family inserted");
        }
        store
    }

    pub(super) fn services(
        store: Arc<InMemoryStore>,
    ) -> (
        MatchingService<InMemoryStore, RecordingNotifier>,
        PlacementService<InMemoryStore, RecordingNotifier>,
        Arc<RecordingNotifier>,
        Arc<CostAllocator>,
    ) {
        let notifier = Arc::new(RecordingNotifier::default());
        let allocator = Arc::new(CostAllocator::default());
        let matching = MatchingService::new(store.clone(), notifier.clone());
        let placements = PlacementService::new(store, notifier.clone(), allocator.clone());
        (matching, placements, notifier, allocator)
    }
}

mod ranking {
    use std::sync::atomic::AtomicBool;

    use super::common::*;
    use fostering_engine::workflows::placement::{ChildId, EntityStore, FamilyId, FamilyStatus};

    #[test]
    fn rank_orders_scores_and_respects_the_limit() {
        let mut paused = available_family("family-paused");
        paused.status = FamilyStatus::UnderEvaluation;
        let store = seeded_store(
            vec![awaiting_child("child-1")],
            vec![
                family_with_interruption("family-a"),
                available_family("family-b"),
                paused,
            ],
        );
        let (matching, _, _, _) = services(store);
        let child = ChildId("child-1".to_string());

        let candidates = matching
            .rank_candidate_families(&child, 10, today())
            .expect("ranking succeeds");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].family.0, "family-b");
        assert_eq!(candidates[0].overall, 92);
        assert_eq!(candidates[1].family.0, "family-a");
        assert_eq!(candidates[1].overall, 91);

        let top = matching
            .rank_candidate_families(&child, 1, today())
            .expect("ranking succeeds");
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].family.0, "family-b");
    }

    #[test]
    fn batch_ranking_honours_the_cancel_flag() {
        let store = seeded_store(
            vec![awaiting_child("child-1"), awaiting_child("child-2")],
            vec![available_family("family-a")],
        );
        let (matching, _, _, _) = services(store);
        let children = [
            ChildId("child-1".to_string()),
            ChildId("child-2".to_string()),
        ];

        let complete = matching
            .rank_for_children(&children, 5, today(), &AtomicBool::new(false))
            .expect("batch ranking succeeds");
        assert_eq!(complete.len(), 2);

        let cancelled = matching
            .rank_for_children(&children, 5, today(), &AtomicBool::new(true))
            .expect("cancelled ranking still succeeds");
        assert!(cancelled.is_empty());
    }

    #[test]
    fn scoring_never_writes_to_the_store() {
        let store = seeded_store(
            vec![awaiting_child("child-1")],
            vec![available_family("family-a")],
        );
        let (matching, _, notifier, _) = services(store.clone());

        matching
            .score_compatibility(
                &ChildId("child-1".to_string()),
                &FamilyId("family-a".to_string()),
                today(),
            )
            .expect("scoring succeeds");

        assert!(notifier.kinds().is_empty());
        let child = store
            .child(&ChildId("child-1".to_string()))
            .expect("child present");
        assert_eq!(child.version, 1);
    }
}

mod review {
    use super::common::*;
    use fostering_engine::workflows::placement::{
        ChildId, ChildStatus, EngineError, EntityStore, FamilyId, FamilyStatus, MatchingStatus,
        PlacementStatus,
    };

    #[test]
    fn proposal_review_and_placement_complete_the_pipeline() {
        let store = seeded_store(
            vec![awaiting_child("child-1")],
            vec![available_family("family-a")],
        );
        let (matching, placements, notifier, allocator) = services(store.clone());
        let child_id = ChildId("child-1".to_string());
        let family_id = FamilyId("family-a".to_string());
        let actor = coordinator();

        let proposal = matching
            .propose_matching(&child_id, &family_id, &actor, today())
            .expect("proposal succeeds");
        assert_eq!(proposal.entity.status, MatchingStatus::Proposed);
        assert_eq!(proposal.entity.compatibility.overall, 92);

        let approved = matching
            .approve_matching(&proposal.entity.id, &actor)
            .expect("approval succeeds");
        assert_eq!(approved.entity.status, MatchingStatus::Approved);
        assert_eq!(approved.entity.approved_by, Some(actor.clone()));

        let placement = placements
            .create_placement(&approved.entity.id, &actor)
            .expect("placement succeeds");
        assert_eq!(placement.entity.status, PlacementStatus::Active);
        assert_eq!(placement.entity.child, child_id);
        assert_eq!(placement.entity.budget.monthly_allocation, 1320);

        let child = store.child(&child_id).expect("child present");
        assert_eq!(child.entity.status, ChildStatus::InPlacement);
        assert_eq!(child.entity.current_placement, Some(placement.entity.id.clone()));

        let family = store.family(&family_id).expect("family present");
        assert_eq!(family.entity.status, FamilyStatus::ActivePlacement);

        let matching_record = store
            .matching(&proposal.entity.id)
            .expect("matching present");
        assert_eq!(matching_record.entity.placement, Some(placement.entity.id));

        assert_eq!(allocator.allocated(), 1320);
        assert_eq!(
            notifier.kinds(),
            vec!["matching-proposed", "matching-approved", "placement-created"]
        );
    }

    #[test]
    fn rejection_closes_the_matching_for_good() {
        let store = seeded_store(
            vec![awaiting_child("child-1")],
            vec![available_family("family-a")],
        );
        let (matching, _, _, _) = services(store.clone());
        let actor = coordinator();

        let proposal = matching
            .propose_matching(
                &ChildId("child-1".to_string()),
                &FamilyId("family-a".to_string()),
                &actor,
                today(),
            )
            .expect("proposal succeeds");
        let rejected = matching
            .reject_matching(&proposal.entity.id, &actor, "household moving out of state")
            .expect("rejection succeeds");
        assert_eq!(rejected.entity.status, MatchingStatus::Rejected);
        assert_eq!(
            rejected.entity.notes,
            vec!["rejected: household moving out of state".to_string()]
        );

        match matching.approve_matching(&proposal.entity.id, &actor) {
            Err(EngineError::InvalidState { status, .. }) => assert_eq!(status, "rejected"),
            other => panic!("expected invalid state, got {other:?}"),
        }
    }

    #[test]
    fn a_consumed_matching_cannot_place_twice() {
        let store = seeded_store(
            vec![awaiting_child("child-1")],
            vec![available_family("family-a")],
        );
        let (matching, placements, _, _) = services(store);
        let actor = coordinator();

        let proposal = matching
            .propose_matching(
                &ChildId("child-1".to_string()),
                &FamilyId("family-a".to_string()),
                &actor,
                today(),
            )
            .expect("proposal succeeds");
        matching
            .approve_matching(&proposal.entity.id, &actor)
            .expect("approval succeeds");
        placements
            .create_placement(&proposal.entity.id, &actor)
            .expect("first placement succeeds");

        match placements.create_placement(&proposal.entity.id, &actor) {
            Err(EngineError::InvalidState { status, .. }) => assert_eq!(status, "consumed"),
            other => panic!("expected consumed matching, got {other:?}"),
        }
    }

    #[test]
    fn a_placed_child_cannot_be_proposed_again() {
        let store = seeded_store(
            vec![awaiting_child("child-1")],
            vec![available_family("family-a"), available_family("family-b")],
        );
        let (matching, placements, _, _) = services(store);
        let actor = coordinator();
        let child_id = ChildId("child-1".to_string());

        let proposal = matching
            .propose_matching(&child_id, &FamilyId("family-a".to_string()), &actor, today())
            .expect("proposal succeeds");
        matching
            .approve_matching(&proposal.entity.id, &actor)
            .expect("approval succeeds");
        placements
            .create_placement(&proposal.entity.id, &actor)
            .expect("placement succeeds");

        match matching.propose_matching(&child_id, &FamilyId("family-b".to_string()), &actor, today()) {
            Err(EngineError::ChildNotAvailable { status, .. }) => {
                assert_eq!(status, "in_placement");
            }
            other => panic!("expected child guard, got {other:?}"),
        }
    }
}
