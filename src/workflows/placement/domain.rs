use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::process::ApproximationProcess;
use super::scoring::CompatibilityScore;

/// Identifier wrapper for children awaiting or in care.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChildId(pub String);

/// Identifier wrapper for candidate host families.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FamilyId(pub String);

/// Identifier wrapper for proposed child/family matchings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchingId(pub String);

/// Identifier wrapper for placements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementId(pub String);

/// Identifier wrapper for approximation-process stages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageId(pub String);

/// Authenticated coordinator recorded on every mutating call for audit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl fmt::Display for ChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for MatchingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PlacementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entity discriminator carried on transition and store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Child,
    Family,
    Matching,
    Placement,
}

impl EntityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::Family => "family",
            Self::Matching => "matching",
            Self::Placement => "placement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
    Other,
}

/// Civil identification captured at intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub name: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
}

/// Care requirements used by the special-needs compatibility factor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpecialNeeds {
    pub has_special_needs: bool,
    pub health_conditions: Vec<String>,
    pub medications: Vec<String>,
    pub educational_needs: Vec<String>,
}

impl SpecialNeeds {
    /// Combined count of conditions, medications, and educational needs.
    pub fn complexity(&self) -> usize {
        self.health_conditions.len() + self.medications.len() + self.educational_needs.len()
    }
}

/// Biological background relevant to placement decisions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FamilyBackground {
    pub siblings: Vec<ChildId>,
}

/// Lifecycle status of a child within the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildStatus {
    Awaiting,
    InPlacement,
    Discharged,
    ReturnedFamily,
}

impl ChildStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Awaiting => "awaiting",
            Self::InPlacement => "in_placement",
            Self::Discharged => "discharged",
            Self::ReturnedFamily => "returned_family",
        }
    }
}

/// A child awaiting or receiving foster care.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub id: ChildId,
    pub personal: PersonalInfo,
    pub special_needs: SpecialNeeds,
    pub background: FamilyBackground,
    pub status: ChildStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_placement: Option<PlacementId>,
}

impl Child {
    /// Age in whole years on the given date, floored at the birthday.
    pub fn age_on(&self, date: NaiveDate) -> u8 {
        let birth = self.personal.birth_date;
        let mut years = date.year() - birth.year();
        if (date.month(), date.day()) < (birth.month(), birth.day()) {
            years -= 1;
        }
        years.clamp(0, u8::MAX as i32) as u8
    }
}

/// Household member as declared during the family home study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdMember {
    pub relationship: String,
    pub age: u8,
    pub monthly_income: u32,
}

/// Contact address kept on the family record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub city: String,
    pub state: String,
}

/// Age interval a family is approved to host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderPreference {
    Any,
    Female,
    Male,
}

/// Hosting preferences declared by the family and validated by coordinators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyPreferences {
    pub age_range: AgeRange,
    pub gender_preference: GenderPreference,
    pub special_needs_accepted: bool,
    pub max_children: u8,
}

/// Availability status of a host family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyStatus {
    Available,
    Unavailable,
    UnderEvaluation,
    ActivePlacement,
}

impl FamilyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::UnderEvaluation => "under_evaluation",
            Self::ActivePlacement => "active_placement",
        }
    }
}

/// Terminal outcome of a past placement kept on the family ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementOutcome {
    Successful,
    Interrupted,
}

/// History entry recorded whenever a hosted placement ends or is interrupted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastPlacement {
    pub child: ChildId,
    pub outcome: PlacementOutcome,
    pub ended_on: NaiveDate,
}

/// A host family eligible to receive placements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub id: FamilyId,
    pub primary_contact: String,
    pub address: Address,
    pub composition: Vec<HouseholdMember>,
    pub preferences: FamilyPreferences,
    pub status: FamilyStatus,
    pub history: Vec<PastPlacement>,
}

/// Workflow status of a proposed matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingStatus {
    Proposed,
    Approved,
    Rejected,
}

impl MatchingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// A scored child/family pairing awaiting coordinator review.
///
/// Immutable once approved or rejected, except for `notes`, which stays open
/// for audit annotations. `placement` marks the matching as consumed once a
/// placement has been created from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matching {
    pub id: MatchingId,
    pub child: ChildId,
    pub family: FamilyId,
    pub compatibility: CompatibilityScore,
    pub status: MatchingStatus,
    pub proposed_by: ActorId,
    pub proposed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<ActorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<PlacementId>,
    pub notes: Vec<String>,
}

/// Lifecycle status of a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStatus {
    Active,
    Completed,
    Interrupted,
    Transferred,
}

impl PlacementStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Transferred => "transferred",
        }
    }
}

/// One posted monthly charge against a placement budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub paid_on: NaiveDate,
    pub amount: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Recurring allocation and cumulative spend for one placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementBudget {
    pub monthly_allocation: u32,
    pub total_cost: u64,
    pub payments: Vec<PaymentRecord>,
}

impl PlacementBudget {
    pub fn new(monthly_allocation: u32) -> Self {
        Self {
            monthly_allocation,
            total_cost: 0,
            payments: Vec::new(),
        }
    }
}

/// An active or historical foster-care arrangement. Never deleted; terminated
/// through `status` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub id: PlacementId,
    pub child: ChildId,
    pub family: FamilyId,
    pub matching: MatchingId,
    pub start_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub status: PlacementStatus,
    pub process: ApproximationProcess,
    pub budget: PlacementBudget,
}
