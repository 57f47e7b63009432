//! Approximation process: the staged introduction of a child into a
//! family, from first contact through to full placement.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::StageId;

/// Expected length of the standard approximation process.
pub const DEFAULT_EXPECTED_DURATION_DAYS: u32 = 90;

/// Allowed gap, in percentage points, between actual and expected progress
/// before the process is flagged as behind schedule.
pub const ON_TRACK_TOLERANCE: u8 = 15;

const STANDARD_STAGES: [(&str, &str); 4] = [
    ("initial_contact", "Initial Contact"),
    ("orientation_visit", "Orientation Visit"),
    ("trial_period", "Trial Period"),
    ("full_placement", "Full Placement"),
];

/// One step of the approximation process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub name: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_on: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Outcome of a stage completion attempt. Completing a stage twice is not
/// an error; the second call reports `AlreadyComplete` and changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageCompletion {
    Completed,
    AlreadyComplete,
}

/// Raised when a stage id does not belong to the process.
#[derive(Debug, thiserror::Error)]
#[error("unknown stage {0}")]
pub struct UnknownStage(pub StageId);

/// Progress snapshot comparing stage completion against elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressMetrics {
    pub days_elapsed: i64,
    /// Percentage of stages completed.
    pub actual_progress: u8,
    /// Percentage of the expected duration elapsed, capped at 100.
    pub expected_progress: u8,
    pub is_on_track: bool,
}

/// Ordered stage checklist attached to every placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproximationProcess {
    pub stages: Vec<Stage>,
    pub current_stage: StageId,
    pub started_on: NaiveDate,
    pub expected_duration_days: u32,
}

impl ApproximationProcess {
    /// The standard four-stage process starting on the placement date.
    pub fn standard(started_on: NaiveDate) -> Self {
        let stages: Vec<Stage> = STANDARD_STAGES
            .iter()
            .map(|(id, name)| Stage {
                id: StageId(id.to_string()),
                name: name.to_string(),
                completed: false,
                completed_on: None,
                note: None,
            })
            .collect();
        let current_stage = stages[0].id.clone();
        Self {
            stages,
            current_stage,
            started_on,
            expected_duration_days: DEFAULT_EXPECTED_DURATION_DAYS,
        }
    }

    pub fn completed_count(&self) -> usize {
        self.stages.iter().filter(|stage| stage.completed).count()
    }

    pub fn is_complete(&self) -> bool {
        self.stages.iter().all(|stage| stage.completed)
    }

    pub fn stage(&self, id: &StageId) -> Option<&Stage> {
        self.stages.iter().find(|stage| stage.id == *id)
    }

    /// Marks a stage complete and moves `current_stage` to the first
    /// stage still pending. Stages may be completed out of order.
    pub fn complete_stage(
        &mut self,
        stage_id: &StageId,
        on: NaiveDate,
        note: Option<String>,
    ) -> Result<StageCompletion, UnknownStage> {
        let stage = self
            .stages
            .iter_mut()
            .find(|stage| stage.id == *stage_id)
            .ok_or_else(|| UnknownStage(stage_id.clone()))?;
        if stage.completed {
            return Ok(StageCompletion::AlreadyComplete);
        }
        stage.completed = true;
        stage.completed_on = Some(on);
        stage.note = note;

        if let Some(pending) = self.stages.iter().find(|stage| !stage.completed) {
            self.current_stage = pending.id.clone();
        } else if let Some(last) = self.stages.last() {
            self.current_stage = last.id.clone();
        }
        Ok(StageCompletion::Completed)
    }

    /// Progress as of a reporting date. Actual progress is the share of
    /// stages completed; expected progress is the share of the expected
    /// duration elapsed. The process counts as on track while actual
    /// progress is within [`ON_TRACK_TOLERANCE`] points of expected.
    pub fn progress(&self, as_of: NaiveDate) -> ProgressMetrics {
        let days_elapsed = (as_of - self.started_on).num_days().max(0);

        let total = self.stages.len();
        let actual_progress = if total == 0 {
            100
        } else {
            ((self.completed_count() * 100) as f64 / total as f64).round() as u8
        };

        let expected_progress = if self.expected_duration_days == 0 {
            100
        } else {
            let ratio = days_elapsed as f64 / f64::from(self.expected_duration_days);
            (ratio * 100.0).round().min(100.0) as u8
        };

        let is_on_track =
            actual_progress.saturating_add(ON_TRACK_TOLERANCE) >= expected_progress;

        ProgressMetrics {
            days_elapsed,
            actual_progress,
            expected_progress,
            is_on_track,
        }
    }
}
