//! Status-transition tables for children, families, and placements.
//!
//! Every table is closed: a pairing not listed here is rejected with
//! [`InvalidStatusTransition`], and terminal statuses have no outgoing
//! edges. Services route every status change through these three functions
//! so the rules live in exactly one place.

use super::domain::{ChildStatus, EntityKind, FamilyStatus, PlacementStatus};

/// A status change outside the transition tables, carrying enough context
/// for audit logging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {} status transition for {id}: {from} -> {to}", entity.as_str())]
pub struct InvalidStatusTransition {
    pub entity: EntityKind,
    pub id: String,
    pub from: &'static str,
    pub to: &'static str,
}

/// Validates a child status change against the child state machine.
pub fn child_transition(
    id: &super::domain::ChildId,
    from: ChildStatus,
    to: ChildStatus,
) -> Result<(), InvalidStatusTransition> {
    use ChildStatus::*;
    let allowed = matches!(
        (from, to),
        (Awaiting, InPlacement)
            | (Awaiting, ReturnedFamily)
            | (InPlacement, Discharged)
            | (InPlacement, ReturnedFamily)
            | (InPlacement, Awaiting)
    );
    if allowed {
        Ok(())
    } else {
        Err(InvalidStatusTransition {
            entity: EntityKind::Child,
            id: id.0.clone(),
            from: from.label(),
            to: to.label(),
        })
    }
}

/// Validates a family status change against the family state machine.
pub fn family_transition(
    id: &super::domain::FamilyId,
    from: FamilyStatus,
    to: FamilyStatus,
) -> Result<(), InvalidStatusTransition> {
    use FamilyStatus::*;
    let allowed = matches!(
        (from, to),
        (Available, Unavailable)
            | (Available, UnderEvaluation)
            | (Available, ActivePlacement)
            | (ActivePlacement, Available)
            | (ActivePlacement, UnderEvaluation)
            | (UnderEvaluation, Available)
            | (UnderEvaluation, Unavailable)
            | (UnderEvaluation, ActivePlacement)
            | (Unavailable, Available)
    );
    if allowed {
        Ok(())
    } else {
        Err(InvalidStatusTransition {
            entity: EntityKind::Family,
            id: id.0.clone(),
            from: from.label(),
            to: to.label(),
        })
    }
}

/// Validates a placement status change against the placement state machine.
pub fn placement_transition(
    id: &super::domain::PlacementId,
    from: PlacementStatus,
    to: PlacementStatus,
) -> Result<(), InvalidStatusTransition> {
    use PlacementStatus::*;
    let allowed = matches!(
        (from, to),
        (Active, Completed)
            | (Active, Interrupted)
            | (Active, Transferred)
            | (Interrupted, Active)
            | (Transferred, Active)
    );
    if allowed {
        Ok(())
    } else {
        Err(InvalidStatusTransition {
            entity: EntityKind::Placement,
            id: id.0.clone(),
            from: from.label(),
            to: to.label(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::placement::domain::{ChildId, FamilyId, PlacementId};

    fn child_id() -> ChildId {
        ChildId("child-1".to_string())
    }

    #[test]
    fn terminal_child_statuses_have_no_outgoing_edges() {
        use ChildStatus::*;
        for terminal in [Discharged, ReturnedFamily] {
            for target in [Awaiting, InPlacement, Discharged, ReturnedFamily] {
                let err = child_transition(&child_id(), terminal, target)
                    .expect_err("terminal status must not transition");
                assert_eq!(err.from, terminal.label());
                assert_eq!(err.to, target.label());
            }
        }
    }

    #[test]
    fn child_table_matches_specified_edges() {
        use ChildStatus::*;
        assert!(child_transition(&child_id(), Awaiting, InPlacement).is_ok());
        assert!(child_transition(&child_id(), Awaiting, ReturnedFamily).is_ok());
        assert!(child_transition(&child_id(), InPlacement, Discharged).is_ok());
        assert!(child_transition(&child_id(), InPlacement, ReturnedFamily).is_ok());
        assert!(child_transition(&child_id(), InPlacement, Awaiting).is_ok());
        assert!(child_transition(&child_id(), Awaiting, Discharged).is_err());
        assert!(child_transition(&child_id(), Awaiting, Awaiting).is_err());
    }

    #[test]
    fn completed_placement_is_terminal_but_interruptions_can_resume() {
        use PlacementStatus::*;
        let id = PlacementId("plc-1".to_string());
        assert!(placement_transition(&id, Active, Completed).is_ok());
        assert!(placement_transition(&id, Interrupted, Active).is_ok());
        assert!(placement_transition(&id, Transferred, Active).is_ok());
        for target in [Active, Interrupted, Transferred] {
            assert!(placement_transition(&id, Completed, target).is_err());
        }
        assert!(placement_transition(&id, Interrupted, Completed).is_err());
        assert!(placement_transition(&id, Transferred, Interrupted).is_err());
    }

    #[test]
    fn family_table_round_trips_evaluation_states() {
        use FamilyStatus::*;
        let id = FamilyId("fam-1".to_string());
        assert!(family_transition(&id, Available, ActivePlacement).is_ok());
        assert!(family_transition(&id, ActivePlacement, Available).is_ok());
        assert!(family_transition(&id, ActivePlacement, UnderEvaluation).is_ok());
        assert!(family_transition(&id, UnderEvaluation, ActivePlacement).is_ok());
        assert!(family_transition(&id, Unavailable, UnderEvaluation).is_err());
        assert!(family_transition(&id, Unavailable, ActivePlacement).is_err());
    }

    #[test]
    fn error_display_names_entity_and_attempted_edge() {
        let err = child_transition(&child_id(), ChildStatus::Discharged, ChildStatus::Awaiting)
            .expect_err("terminal");
        let rendered = err.to_string();
        assert!(rendered.contains("child"));
        assert!(rendered.contains("child-1"));
        assert!(rendered.contains("discharged -> awaiting"));
    }
}
