use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use super::costs::CostAllocator;
use super::domain::{
    ActorId, Child, ChildId, ChildStatus, EntityKind, FamilyStatus, MatchingId, MatchingStatus,
    PastPlacement, PaymentRecord, Placement, PlacementBudget, PlacementId, PlacementOutcome,
    PlacementStatus, StageId,
};
use super::error::EngineError;
use super::process::{ApproximationProcess, StageCompletion, UnknownStage};
use super::store::{
    EngineEvent, EntityStore, EntityWrite, EventKind, Notifier, StoreError, Versioned,
};
use super::transitions::{child_transition, family_transition, placement_transition};

static PLACEMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_placement_id() -> PlacementId {
    let id = PLACEMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    PlacementId(format!("plc-{id:06}"))
}

fn business_today() -> NaiveDate {
    Utc::now().date_naive()
}

fn siblings_in_care(child: &Child, active: &[Versioned<Placement>]) -> u32 {
    active
        .iter()
        .filter(|record| child.background.siblings.contains(&record.entity.child))
        .count() as u32
}

/// Service driving placements from creation through termination, including
/// the approximation process and the budget ledger.
///
/// Every mutation is a single store commit of all touched entities; ledger
/// reservations happen before the commit and are rolled back if it fails.
pub struct PlacementService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    allocator: Arc<CostAllocator>,
}

impl<S, N> PlacementService<S, N>
where
    S: EntityStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, allocator: Arc<CostAllocator>) -> Self {
        Self {
            store,
            notifier,
            allocator,
        }
    }

    /// Turn an approved matching into an active placement.
    ///
    /// Both parties are re-validated here: an approval can go stale while
    /// other placements land. Capacity is checked against the store's
    /// active-placement count before the family status, so a family holding
    /// its last slot reports `FamilyAtCapacity` rather than a status error.
    pub fn create_placement(
        &self,
        matching_id: &MatchingId,
        actor: &ActorId,
    ) -> Result<Versioned<Placement>, EngineError> {
        let Versioned {
            version: matching_version,
            entity: mut matching,
        } = self.store.matching(matching_id)?;
        if matching.status != MatchingStatus::Approved || matching.placement.is_some() {
            let status = if matching.placement.is_some() {
                "consumed".to_string()
            } else {
                matching.status.label().to_string()
            };
            return Err(EngineError::InvalidState {
                matching: matching_id.clone(),
                status,
            });
        }

        let Versioned {
            version: child_version,
            entity: mut child,
        } = self.store.child(&matching.child)?;
        if child.status != ChildStatus::Awaiting {
            return Err(EngineError::ChildNotAvailable {
                child: child.id.clone(),
                status: child.status.label().to_string(),
            });
        }

        let Versioned {
            version: family_version,
            entity: mut family,
        } = self.store.family(&matching.family)?;
        let active = self.store.active_placements_for_family(&family.id)?;
        let max_children = family.preferences.max_children;
        if active.len() >= usize::from(max_children) {
            return Err(EngineError::FamilyAtCapacity {
                family: family.id.clone(),
                max_children,
            });
        }
        if family.status != FamilyStatus::Available {
            return Err(EngineError::FamilyNotAvailable {
                family: family.id.clone(),
                status: family.status.label().to_string(),
            });
        }

        child_transition(&child.id, child.status, ChildStatus::InPlacement)?;
        let hosting = active.len() + 1;
        let family_target = if hosting == usize::from(max_children) {
            FamilyStatus::ActivePlacement
        } else {
            family.status
        };
        if family.status != family_target {
            family_transition(&family.id, family.status, family_target)?;
        }

        let start_date = business_today();
        let allocation = self
            .allocator
            .monthly_allocation(child.special_needs.has_special_needs, siblings_in_care(&child, &active));
        let available = self.allocator.reserve(allocation)?;

        let placement = Placement {
            id: next_placement_id(),
            child: child.id.clone(),
            family: family.id.clone(),
            matching: matching_id.clone(),
            start_date,
            end_date: None,
            status: PlacementStatus::Active,
            process: ApproximationProcess::standard(start_date),
            budget: PlacementBudget::new(allocation),
        };

        child.status = ChildStatus::InPlacement;
        child.current_placement = Some(placement.id.clone());
        family.status = family_target;
        matching.placement = Some(placement.id.clone());

        // The family write rides along even when its status is unchanged so
        // concurrent creates against the same family serialize on its version.
        let committed = self.store.commit(vec![
            EntityWrite::Child(Versioned {
                version: child_version,
                entity: child,
            }),
            EntityWrite::Family(Versioned {
                version: family_version,
                entity: family,
            }),
            EntityWrite::Matching(Versioned {
                version: matching_version,
                entity: matching,
            }),
            EntityWrite::InsertPlacement(placement.clone()),
        ]);
        if let Err(err) = committed {
            self.allocator.release(allocation);
            return Err(err.into());
        }

        info!(
            placement = %placement.id,
            child = %placement.child,
            family = %placement.family,
            actor = %actor,
            allocation,
            budget_available = available,
            "placement created"
        );
        self.emit(
            EngineEvent::new(EventKind::PlacementCreated, placement.id.0.clone(), actor)
                .with_detail("child", placement.child.0.clone())
                .with_detail("family", placement.family.0.clone())
                .with_detail("matching", matching_id.0.clone())
                .with_detail("allocation", allocation.to_string()),
        );
        Ok(Versioned {
            version: 1,
            entity: placement,
        })
    }

    /// Close a placement as successfully completed.
    pub fn end_placement(
        &self,
        placement_id: &PlacementId,
        reason: &str,
        actor: &ActorId,
    ) -> Result<Versioned<Placement>, EngineError> {
        let Versioned {
            version: placement_version,
            entity: mut placement,
        } = self.store.placement(placement_id)?;
        if placement.status != PlacementStatus::Active {
            return Err(EngineError::PlacementNotActive {
                placement: placement_id.clone(),
                status: placement.status.label().to_string(),
            });
        }
        placement_transition(&placement.id, placement.status, PlacementStatus::Completed)?;

        let Versioned {
            version: child_version,
            entity: mut child,
        } = self.store.child(&placement.child)?;
        child_transition(&child.id, child.status, ChildStatus::Discharged)?;

        let Versioned {
            version: family_version,
            entity: mut family,
        } = self.store.family(&placement.family)?;
        if family.status == FamilyStatus::ActivePlacement {
            family_transition(&family.id, family.status, FamilyStatus::Available)?;
            family.status = FamilyStatus::Available;
        }

        let end_date = business_today();
        placement.status = PlacementStatus::Completed;
        placement.end_date = Some(end_date);
        child.status = ChildStatus::Discharged;
        child.current_placement = None;
        family.history.push(PastPlacement {
            child: child.id.clone(),
            outcome: PlacementOutcome::Successful,
            ended_on: end_date,
        });

        self.store.commit(vec![
            EntityWrite::Placement(Versioned {
                version: placement_version,
                entity: placement.clone(),
            }),
            EntityWrite::Child(Versioned {
                version: child_version,
                entity: child,
            }),
            EntityWrite::Family(Versioned {
                version: family_version,
                entity: family,
            }),
        ])?;
        self.allocator.release(placement.budget.monthly_allocation);

        info!(
            placement = %placement_id,
            child = %placement.child,
            family = %placement.family,
            actor = %actor,
            from = "active",
            to = "completed",
            reason,
            "placement completed"
        );
        self.emit(
            EngineEvent::new(EventKind::PlacementCompleted, placement_id.0.clone(), actor)
                .with_detail("child", placement.child.0.clone())
                .with_detail("family", placement.family.0.clone())
                .with_detail("end_date", end_date.to_string())
                .with_detail("reason", reason),
        );
        Ok(Versioned {
            version: placement_version + 1,
            entity: placement,
        })
    }

    /// Interrupt a placement that is not working out. The child returns to
    /// the awaiting pool and the family goes under evaluation.
    pub fn interrupt_placement(
        &self,
        placement_id: &PlacementId,
        reason: &str,
        actor: &ActorId,
    ) -> Result<Versioned<Placement>, EngineError> {
        let Versioned {
            version: placement_version,
            entity: mut placement,
        } = self.store.placement(placement_id)?;
        if placement.status != PlacementStatus::Active {
            return Err(EngineError::PlacementNotActive {
                placement: placement_id.clone(),
                status: placement.status.label().to_string(),
            });
        }
        placement_transition(&placement.id, placement.status, PlacementStatus::Interrupted)?;

        let Versioned {
            version: child_version,
            entity: mut child,
        } = self.store.child(&placement.child)?;
        child_transition(&child.id, child.status, ChildStatus::Awaiting)?;

        let Versioned {
            version: family_version,
            entity: mut family,
        } = self.store.family(&placement.family)?;
        if family.status != FamilyStatus::UnderEvaluation {
            family_transition(&family.id, family.status, FamilyStatus::UnderEvaluation)?;
            family.status = FamilyStatus::UnderEvaluation;
        }

        let end_date = business_today();
        placement.status = PlacementStatus::Interrupted;
        placement.end_date = Some(end_date);
        child.status = ChildStatus::Awaiting;
        child.current_placement = None;
        family.history.push(PastPlacement {
            child: child.id.clone(),
            outcome: PlacementOutcome::Interrupted,
            ended_on: end_date,
        });

        self.store.commit(vec![
            EntityWrite::Placement(Versioned {
                version: placement_version,
                entity: placement.clone(),
            }),
            EntityWrite::Child(Versioned {
                version: child_version,
                entity: child,
            }),
            EntityWrite::Family(Versioned {
                version: family_version,
                entity: family,
            }),
        ])?;
        self.allocator.release(placement.budget.monthly_allocation);

        info!(
            placement = %placement_id,
            child = %placement.child,
            family = %placement.family,
            actor = %actor,
            from = "active",
            to = "interrupted",
            reason,
            "placement interrupted"
        );
        self.emit(
            EngineEvent::new(EventKind::PlacementInterrupted, placement_id.0.clone(), actor)
                .with_detail("child", placement.child.0.clone())
                .with_detail("family", placement.family.0.clone())
                .with_detail("reason", reason),
        );
        Ok(Versioned {
            version: placement_version + 1,
            entity: placement,
        })
    }

    /// Transfer the child away because the family's circumstances changed.
    /// No history entry is recorded: a transfer is not a family outcome.
    pub fn transfer_placement(
        &self,
        placement_id: &PlacementId,
        reason: &str,
        actor: &ActorId,
    ) -> Result<Versioned<Placement>, EngineError> {
        let Versioned {
            version: placement_version,
            entity: mut placement,
        } = self.store.placement(placement_id)?;
        if placement.status != PlacementStatus::Active {
            return Err(EngineError::PlacementNotActive {
                placement: placement_id.clone(),
                status: placement.status.label().to_string(),
            });
        }
        placement_transition(&placement.id, placement.status, PlacementStatus::Transferred)?;

        let Versioned {
            version: child_version,
            entity: mut child,
        } = self.store.child(&placement.child)?;
        child_transition(&child.id, child.status, ChildStatus::Awaiting)?;

        let Versioned {
            version: family_version,
            entity: mut family,
        } = self.store.family(&placement.family)?;
        if family.status == FamilyStatus::ActivePlacement {
            family_transition(&family.id, family.status, FamilyStatus::Available)?;
            family.status = FamilyStatus::Available;
        }

        let end_date = business_today();
        placement.status = PlacementStatus::Transferred;
        placement.end_date = Some(end_date);
        child.status = ChildStatus::Awaiting;
        child.current_placement = None;

        self.store.commit(vec![
            EntityWrite::Placement(Versioned {
                version: placement_version,
                entity: placement.clone(),
            }),
            EntityWrite::Child(Versioned {
                version: child_version,
                entity: child,
            }),
            EntityWrite::Family(Versioned {
                version: family_version,
                entity: family,
            }),
        ])?;
        self.allocator.release(placement.budget.monthly_allocation);

        info!(
            placement = %placement_id,
            child = %placement.child,
            family = %placement.family,
            actor = %actor,
            from = "active",
            to = "transferred",
            reason,
            "placement transferred"
        );
        self.emit(
            EngineEvent::new(EventKind::PlacementTransferred, placement_id.0.clone(), actor)
                .with_detail("child", placement.child.0.clone())
                .with_detail("family", placement.family.0.clone())
                .with_detail("reason", reason),
        );
        Ok(Versioned {
            version: placement_version + 1,
            entity: placement,
        })
    }

    /// Reactivate an interrupted or transferred placement with the same
    /// family. Both parties and the budget are re-validated: the pause may
    /// have lasted long enough for either to have moved on.
    pub fn resume_placement(
        &self,
        placement_id: &PlacementId,
        actor: &ActorId,
    ) -> Result<Versioned<Placement>, EngineError> {
        let Versioned {
            version: placement_version,
            entity: mut placement,
        } = self.store.placement(placement_id)?;
        placement_transition(&placement.id, placement.status, PlacementStatus::Active)?;

        let Versioned {
            version: child_version,
            entity: mut child,
        } = self.store.child(&placement.child)?;
        if child.status != ChildStatus::Awaiting {
            return Err(EngineError::ChildNotAvailable {
                child: child.id.clone(),
                status: child.status.label().to_string(),
            });
        }
        child_transition(&child.id, child.status, ChildStatus::InPlacement)?;

        let Versioned {
            version: family_version,
            entity: mut family,
        } = self.store.family(&placement.family)?;
        let active = self.store.active_placements_for_family(&family.id)?;
        let max_children = family.preferences.max_children;
        if active.len() >= usize::from(max_children) {
            return Err(EngineError::FamilyAtCapacity {
                family: family.id.clone(),
                max_children,
            });
        }
        if family.status == FamilyStatus::Unavailable {
            return Err(EngineError::FamilyNotAvailable {
                family: family.id.clone(),
                status: family.status.label().to_string(),
            });
        }
        let hosting = active.len() + 1;
        let family_target = if hosting == usize::from(max_children) {
            FamilyStatus::ActivePlacement
        } else {
            FamilyStatus::Available
        };
        if family.status != family_target {
            family_transition(&family.id, family.status, family_target)?;
        }

        let allocation = self
            .allocator
            .monthly_allocation(child.special_needs.has_special_needs, siblings_in_care(&child, &active));
        self.allocator.reserve(allocation)?;

        placement.status = PlacementStatus::Active;
        placement.end_date = None;
        placement.budget.monthly_allocation = allocation;
        child.status = ChildStatus::InPlacement;
        child.current_placement = Some(placement.id.clone());
        family.status = family_target;

        let committed = self.store.commit(vec![
            EntityWrite::Placement(Versioned {
                version: placement_version,
                entity: placement.clone(),
            }),
            EntityWrite::Child(Versioned {
                version: child_version,
                entity: child,
            }),
            EntityWrite::Family(Versioned {
                version: family_version,
                entity: family,
            }),
        ]);
        if let Err(err) = committed {
            self.allocator.release(allocation);
            return Err(err.into());
        }

        info!(
            placement = %placement_id,
            child = %placement.child,
            family = %placement.family,
            actor = %actor,
            allocation,
            "placement resumed"
        );
        self.emit(
            EngineEvent::new(EventKind::PlacementResumed, placement_id.0.clone(), actor)
                .with_detail("child", placement.child.0.clone())
                .with_detail("family", placement.family.0.clone())
                .with_detail("allocation", allocation.to_string()),
        );
        Ok(Versioned {
            version: placement_version + 1,
            entity: placement,
        })
    }

    /// Record a child's return to their biological family.
    ///
    /// An awaiting child transitions directly. A child in placement first
    /// has that placement completed as successful, then transitions.
    pub fn mark_returned_family(
        &self,
        child_id: &ChildId,
        reason: &str,
        actor: &ActorId,
    ) -> Result<Versioned<Child>, EngineError> {
        let Versioned {
            version: child_version,
            entity: mut child,
        } = self.store.child(child_id)?;
        child_transition(&child.id, child.status, ChildStatus::ReturnedFamily)?;

        if child.status == ChildStatus::Awaiting {
            child.status = ChildStatus::ReturnedFamily;
            self.store.commit(vec![EntityWrite::Child(Versioned {
                version: child_version,
                entity: child.clone(),
            })])?;

            info!(child = %child_id, actor = %actor, reason, "child returned to biological family");
            self.emit(
                EngineEvent::new(EventKind::ChildReturnedFamily, child_id.0.clone(), actor)
                    .with_detail("reason", reason),
            );
            return Ok(Versioned {
                version: child_version + 1,
                entity: child,
            });
        }

        let placement_id = child.current_placement.clone().ok_or_else(|| {
            EngineError::Store(StoreError::NotFound {
                entity: EntityKind::Placement,
                id: format!("for child {child_id}"),
            })
        })?;
        let Versioned {
            version: placement_version,
            entity: mut placement,
        } = self.store.placement(&placement_id)?;
        placement_transition(&placement.id, placement.status, PlacementStatus::Completed)?;

        let Versioned {
            version: family_version,
            entity: mut family,
        } = self.store.family(&placement.family)?;
        if family.status == FamilyStatus::ActivePlacement {
            family_transition(&family.id, family.status, FamilyStatus::Available)?;
            family.status = FamilyStatus::Available;
        }

        let end_date = business_today();
        placement.status = PlacementStatus::Completed;
        placement.end_date = Some(end_date);
        child.status = ChildStatus::ReturnedFamily;
        child.current_placement = None;
        family.history.push(PastPlacement {
            child: child.id.clone(),
            outcome: PlacementOutcome::Successful,
            ended_on: end_date,
        });

        self.store.commit(vec![
            EntityWrite::Child(Versioned {
                version: child_version,
                entity: child.clone(),
            }),
            EntityWrite::Family(Versioned {
                version: family_version,
                entity: family,
            }),
            EntityWrite::Placement(Versioned {
                version: placement_version,
                entity: placement.clone(),
            }),
        ])?;
        self.allocator.release(placement.budget.monthly_allocation);

        info!(
            child = %child_id,
            placement = %placement_id,
            actor = %actor,
            reason,
            "child returned to biological family"
        );
        self.emit(
            EngineEvent::new(EventKind::ChildReturnedFamily, child_id.0.clone(), actor)
                .with_detail("placement", placement_id.0.clone())
                .with_detail("reason", reason),
        );
        Ok(Versioned {
            version: child_version + 1,
            entity: child,
        })
    }

    /// Complete one stage of the approximation process.
    ///
    /// Completing a stage that is already complete changes nothing and
    /// emits nothing.
    pub fn complete_stage(
        &self,
        placement_id: &PlacementId,
        stage_id: &StageId,
        note: Option<&str>,
        actor: &ActorId,
    ) -> Result<Versioned<Placement>, EngineError> {
        let Versioned {
            version: placement_version,
            entity: mut placement,
        } = self.store.placement(placement_id)?;
        if placement.status != PlacementStatus::Active {
            return Err(EngineError::PlacementNotActive {
                placement: placement_id.clone(),
                status: placement.status.label().to_string(),
            });
        }

        let today = business_today();
        let completion = placement
            .process
            .complete_stage(stage_id, today, note.map(str::to_string))
            .map_err(|UnknownStage(stage)| EngineError::StageNotFound {
                placement: placement_id.clone(),
                stage,
            })?;
        if completion == StageCompletion::AlreadyComplete {
            return Ok(Versioned {
                version: placement_version,
                entity: placement,
            });
        }

        self.store.commit(vec![EntityWrite::Placement(Versioned {
            version: placement_version,
            entity: placement.clone(),
        })])?;

        let metrics = placement.process.progress(today);
        info!(
            placement = %placement_id,
            stage = %stage_id,
            actor = %actor,
            actual = metrics.actual_progress,
            expected = metrics.expected_progress,
            on_track = metrics.is_on_track,
            "stage completed"
        );
        self.emit(
            EngineEvent::new(EventKind::StageCompleted, placement_id.0.clone(), actor)
                .with_detail("stage", stage_id.0.clone())
                .with_detail("actual_progress", metrics.actual_progress.to_string())
                .with_detail("expected_progress", metrics.expected_progress.to_string())
                .with_detail("on_track", metrics.is_on_track.to_string()),
        );
        Ok(Versioned {
            version: placement_version + 1,
            entity: placement,
        })
    }

    /// Recompute the monthly allocation after the child's needs or the
    /// co-placed siblings changed, adjusting the ledger by the delta.
    pub fn refresh_allocation(
        &self,
        placement_id: &PlacementId,
        actor: &ActorId,
    ) -> Result<Versioned<Placement>, EngineError> {
        let Versioned {
            version: placement_version,
            entity: mut placement,
        } = self.store.placement(placement_id)?;
        if placement.status != PlacementStatus::Active {
            return Err(EngineError::PlacementNotActive {
                placement: placement_id.clone(),
                status: placement.status.label().to_string(),
            });
        }

        let child = self.store.child(&placement.child)?;
        let active = self.store.active_placements_for_family(&placement.family)?;
        let previous = placement.budget.monthly_allocation;
        let current = self.allocator.monthly_allocation(
            child.entity.special_needs.has_special_needs,
            siblings_in_care(&child.entity, &active),
        );
        if current == previous {
            return Ok(Versioned {
                version: placement_version,
                entity: placement,
            });
        }

        if current > previous {
            self.allocator.reserve(current - previous)?;
        }
        placement.budget.monthly_allocation = current;

        let committed = self.store.commit(vec![EntityWrite::Placement(Versioned {
            version: placement_version,
            entity: placement.clone(),
        })]);
        if let Err(err) = committed {
            if current > previous {
                self.allocator.release(current - previous);
            }
            return Err(err.into());
        }
        if current < previous {
            self.allocator.release(previous - current);
        }

        info!(
            placement = %placement_id,
            actor = %actor,
            previous,
            current,
            "allocation refreshed"
        );
        self.emit(
            EngineEvent::new(EventKind::AllocationUpdated, placement_id.0.clone(), actor)
                .with_detail("previous", previous.to_string())
                .with_detail("current", current.to_string()),
        );
        Ok(Versioned {
            version: placement_version + 1,
            entity: placement,
        })
    }

    /// Post one monthly charge at the current allocation.
    pub fn record_payment(
        &self,
        placement_id: &PlacementId,
        note: Option<&str>,
        actor: &ActorId,
    ) -> Result<Versioned<Placement>, EngineError> {
        let Versioned {
            version: placement_version,
            entity: mut placement,
        } = self.store.placement(placement_id)?;
        if placement.status != PlacementStatus::Active {
            return Err(EngineError::PlacementNotActive {
                placement: placement_id.clone(),
                status: placement.status.label().to_string(),
            });
        }

        let amount = placement.budget.monthly_allocation;
        placement.budget.payments.push(PaymentRecord {
            paid_on: business_today(),
            amount,
            note: note.map(str::to_string),
        });
        placement.budget.total_cost += u64::from(amount);

        self.store.commit(vec![EntityWrite::Placement(Versioned {
            version: placement_version,
            entity: placement.clone(),
        })])?;

        info!(
            placement = %placement_id,
            actor = %actor,
            amount,
            total = placement.budget.total_cost,
            "payment recorded"
        );
        self.emit(
            EngineEvent::new(EventKind::PaymentRecorded, placement_id.0.clone(), actor)
                .with_detail("amount", amount.to_string())
                .with_detail("total_cost", placement.budget.total_cost.to_string()),
        );
        Ok(Versioned {
            version: placement_version + 1,
            entity: placement,
        })
    }

    fn emit(&self, event: EngineEvent) {
        if let Err(err) = self.notifier.emit(event) {
            warn!(error = %err, "event emission failed");
        }
    }
}
