use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use super::domain::{
    ActorId, ChildId, ChildStatus, FamilyId, FamilyStatus, Matching, MatchingId, MatchingStatus,
};
use super::error::EngineError;
use super::scoring::{CompatibilityScore, CompatibilityScorer, ScoringContext};
use super::store::{EngineEvent, EntityStore, EntityWrite, EventKind, Notifier, Versioned};

static MATCHING_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_matching_id() -> MatchingId {
    let id = MATCHING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    MatchingId(format!("match-{id:06}"))
}

/// Ranked candidate families for one child, best match first.
#[derive(Debug, Clone)]
pub struct RankedCandidates {
    pub child: ChildId,
    pub candidates: Vec<CompatibilityScore>,
}

/// Service composing the scorer, store, and notifier for the proposal and
/// review stage of the placement workflow.
pub struct MatchingService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    scorer: CompatibilityScorer,
}

impl<S, N> MatchingService<S, N>
where
    S: EntityStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self::with_scorer(store, notifier, CompatibilityScorer::default())
    }

    pub fn with_scorer(store: Arc<S>, notifier: Arc<N>, scorer: CompatibilityScorer) -> Self {
        Self {
            store,
            notifier,
            scorer,
        }
    }

    /// Score a child/family pairing without recording anything.
    pub fn score_compatibility(
        &self,
        child_id: &ChildId,
        family_id: &FamilyId,
        today: NaiveDate,
    ) -> Result<CompatibilityScore, EngineError> {
        let child = self.store.child(child_id)?;
        let family = self.store.family(family_id)?;
        let active = self.store.active_placements_for_family(family_id)?.len();
        let context = ScoringContext {
            today,
            active_placements: active,
        };
        Ok(self.scorer.score(&child.entity, &family.entity, &context))
    }

    /// Record a scored proposal for coordinator review.
    ///
    /// The child must be awaiting placement and the family available; the
    /// score itself never blocks a proposal, even at zero.
    pub fn propose_matching(
        &self,
        child_id: &ChildId,
        family_id: &FamilyId,
        actor: &ActorId,
        today: NaiveDate,
    ) -> Result<Versioned<Matching>, EngineError> {
        let child = self.store.child(child_id)?;
        if child.entity.status != ChildStatus::Awaiting {
            return Err(EngineError::ChildNotAvailable {
                child: child_id.clone(),
                status: child.entity.status.label().to_string(),
            });
        }
        let family = self.store.family(family_id)?;
        if family.entity.status != FamilyStatus::Available {
            return Err(EngineError::FamilyNotAvailable {
                family: family_id.clone(),
                status: family.entity.status.label().to_string(),
            });
        }

        let active = self.store.active_placements_for_family(family_id)?.len();
        let context = ScoringContext {
            today,
            active_placements: active,
        };
        let compatibility = self.scorer.score(&child.entity, &family.entity, &context);

        let matching = Matching {
            id: next_matching_id(),
            child: child_id.clone(),
            family: family_id.clone(),
            compatibility,
            status: MatchingStatus::Proposed,
            proposed_by: actor.clone(),
            proposed_at: Utc::now(),
            approved_by: None,
            approved_at: None,
            placement: None,
            notes: Vec::new(),
        };
        let stored = self.store.insert_matching(matching)?;

        info!(
            matching = %stored.entity.id,
            child = %child_id,
            family = %family_id,
            score = stored.entity.compatibility.overall,
            "matching proposed"
        );
        self.emit(
            EngineEvent::new(EventKind::MatchingProposed, stored.entity.id.0.clone(), actor)
                .with_detail("child", child_id.0.clone())
                .with_detail("family", family_id.0.clone())
                .with_detail("score", stored.entity.compatibility.overall.to_string())
                .with_detail(
                    "recommendation",
                    stored.entity.compatibility.recommendation.label(),
                ),
        );
        Ok(stored)
    }

    /// Approve a proposed matching, stamping the approving coordinator.
    pub fn approve_matching(
        &self,
        matching_id: &MatchingId,
        actor: &ActorId,
    ) -> Result<Versioned<Matching>, EngineError> {
        let Versioned {
            version,
            entity: mut matching,
        } = self.store.matching(matching_id)?;
        if matching.status != MatchingStatus::Proposed {
            return Err(EngineError::InvalidState {
                matching: matching_id.clone(),
                status: matching.status.label().to_string(),
            });
        }
        matching.status = MatchingStatus::Approved;
        matching.approved_by = Some(actor.clone());
        matching.approved_at = Some(Utc::now());

        self.store.commit(vec![EntityWrite::Matching(Versioned {
            version,
            entity: matching.clone(),
        })])?;

        info!(matching = %matching_id, approver = %actor, "matching approved");
        self.emit(
            EngineEvent::new(EventKind::MatchingApproved, matching_id.0.clone(), actor)
                .with_detail("child", matching.child.0.clone())
                .with_detail("family", matching.family.0.clone()),
        );
        Ok(Versioned {
            version: version + 1,
            entity: matching,
        })
    }

    /// Reject a proposed matching, recording the reason in its notes.
    /// Rejection is terminal.
    pub fn reject_matching(
        &self,
        matching_id: &MatchingId,
        actor: &ActorId,
        reason: &str,
    ) -> Result<Versioned<Matching>, EngineError> {
        let Versioned {
            version,
            entity: mut matching,
        } = self.store.matching(matching_id)?;
        if matching.status != MatchingStatus::Proposed {
            return Err(EngineError::InvalidState {
                matching: matching_id.clone(),
                status: matching.status.label().to_string(),
            });
        }
        matching.status = MatchingStatus::Rejected;
        matching.notes.push(format!("rejected: {reason}"));

        self.store.commit(vec![EntityWrite::Matching(Versioned {
            version,
            entity: matching.clone(),
        })])?;

        info!(matching = %matching_id, reviewer = %actor, reason, "matching rejected");
        self.emit(
            EngineEvent::new(EventKind::MatchingRejected, matching_id.0.clone(), actor)
                .with_detail("reason", reason),
        );
        Ok(Versioned {
            version: version + 1,
            entity: matching,
        })
    }

    /// Append an audit annotation. Notes stay open in every status.
    pub fn append_note(
        &self,
        matching_id: &MatchingId,
        actor: &ActorId,
        note: &str,
    ) -> Result<Versioned<Matching>, EngineError> {
        let Versioned {
            version,
            entity: mut matching,
        } = self.store.matching(matching_id)?;
        matching.notes.push(note.to_string());

        self.store.commit(vec![EntityWrite::Matching(Versioned {
            version,
            entity: matching.clone(),
        })])?;

        info!(matching = %matching_id, author = %actor, "note appended");
        Ok(Versioned {
            version: version + 1,
            entity: matching,
        })
    }

    /// Score the child against every available family, best match first.
    /// Ties on the overall score break toward the lower family id so the
    /// ordering is reproducible.
    pub fn rank_candidate_families(
        &self,
        child_id: &ChildId,
        limit: usize,
        today: NaiveDate,
    ) -> Result<Vec<CompatibilityScore>, EngineError> {
        let child = self.store.child(child_id)?;
        let mut candidates = Vec::new();
        for family in self.store.available_families()? {
            let active = self
                .store
                .active_placements_for_family(&family.entity.id)?
                .len();
            let context = ScoringContext {
                today,
                active_placements: active,
            };
            candidates.push(self.scorer.score(&child.entity, &family.entity, &context));
        }
        candidates.sort_by(|a, b| {
            b.overall
                .cmp(&a.overall)
                .then_with(|| a.family.cmp(&b.family))
        });
        candidates.truncate(limit);
        Ok(candidates)
    }

    /// Rank candidates for a batch of children. The cancellation flag is
    /// checked between children; once set, the rankings computed so far are
    /// returned.
    pub fn rank_for_children(
        &self,
        children: &[ChildId],
        limit: usize,
        today: NaiveDate,
        cancel: &AtomicBool,
    ) -> Result<Vec<RankedCandidates>, EngineError> {
        let mut rankings = Vec::with_capacity(children.len());
        for child_id in children {
            if cancel.load(Ordering::Relaxed) {
                info!(completed = rankings.len(), total = children.len(), "ranking cancelled");
                break;
            }
            let candidates = self.rank_candidate_families(child_id, limit, today)?;
            rankings.push(RankedCandidates {
                child: child_id.clone(),
                candidates,
            });
        }
        Ok(rankings)
    }

    fn emit(&self, event: EngineEvent) {
        if let Err(err) = self.notifier.emit(event) {
            warn!(error = %err, "event emission failed");
        }
    }
}
