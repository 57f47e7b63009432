use chrono::{Months, NaiveDate};

use super::super::domain::{AgeRange, Child, Family, FamilyStatus, PlacementOutcome};
use super::{FactorScores, ScoringContext};

const NEEDS_BASE: usize = 80;
const NEEDS_FLOOR: usize = 50;
const NEEDS_COMPLEXITY_STEP: usize = 5;
const NEEDS_MAX_DEDUCTION: usize = 30;

const SIZE_BASE: i32 = 100;
const LARGE_HOUSEHOLD_BONUS: i32 = 10;
const LARGE_HOUSEHOLD_OVER: usize = 4;
const SIBLING_BONUS: i32 = 20;
const SIBLING_PENALTY: i32 = 10;

const EXPERIENCE_BASE: i32 = 60;
const SUCCESS_BONUS: i32 = 10;
const SUCCESS_BONUS_CAP: i32 = 30;
const INTERRUPTION_PENALTY: i32 = 5;
const INTERRUPTION_PENALTY_CAP: i32 = 20;
const PARENTING_BONUS: i32 = 10;

const AVAILABILITY_FULL: i32 = 100;
const RECENT_END_PENALTY: i32 = 10;
const RECENT_END_WINDOW_MONTHS: u32 = 3;

/// Scores the five compatibility factors and collects the boundary-condition
/// notes in factor order. Never fails: disqualifying conditions produce
/// zero-valued factors instead of errors.
pub(crate) fn score_factors(
    child: &Child,
    family: &Family,
    ctx: &ScoringContext,
) -> (FactorScores, Vec<String>) {
    let mut notes = Vec::new();

    let (age_range, note) = age_range_factor(child.age_on(ctx.today), family.preferences.age_range);
    notes.extend(note);

    let (special_needs, note) = special_needs_factor(child, family);
    notes.extend(note);

    let (family_size, note) =
        family_size_factor(family, child.background.siblings.len(), ctx.active_placements);
    notes.extend(note);

    let experience = experience_factor(family);

    let (availability, note) = availability_factor(family, ctx.today);
    notes.extend(note);

    (
        FactorScores {
            age_range,
            special_needs,
            family_size,
            experience,
            availability,
        },
        notes,
    )
}

/// Triangular profile peaking at the midpoint of the preferred range and
/// falling to zero at (and beyond) its edges.
fn age_range_factor(age: u8, range: AgeRange) -> (u8, Option<String>) {
    if age < range.min || age > range.max {
        return (
            0,
            Some(format!(
                "child age {age} outside preferred range {}-{}",
                range.min, range.max
            )),
        );
    }

    let span = f64::from(range.max - range.min);
    if span == 0.0 {
        // Single-age range: being inside it is an exact match.
        return (100, None);
    }

    let center = span / 2.0;
    let position = f64::from(age - range.min);
    let score = 100.0 * (1.0 - (position - center).abs() / center);
    (score.max(0.0).round() as u8, None)
}

fn special_needs_factor(child: &Child, family: &Family) -> (u8, Option<String>) {
    if !child.special_needs.has_special_needs {
        return (100, None);
    }
    if !family.preferences.special_needs_accepted {
        return (0, Some("family does not accept special needs".to_string()));
    }

    let deduction = (NEEDS_COMPLEXITY_STEP * child.special_needs.complexity()).min(NEEDS_MAX_DEDUCTION);
    ((NEEDS_BASE - deduction).max(NEEDS_FLOOR) as u8, None)
}

fn family_size_factor(
    family: &Family,
    sibling_count: usize,
    active_placements: usize,
) -> (u8, Option<String>) {
    let max_children = family.preferences.max_children as usize;
    if active_placements >= max_children {
        return (
            0,
            Some(format!(
                "family already hosts {active_placements} of {max_children} children"
            )),
        );
    }

    let mut score = SIZE_BASE;
    if family.composition.len() > LARGE_HOUSEHOLD_OVER {
        score += LARGE_HOUSEHOLD_BONUS;
    }

    let mut note = None;
    if sibling_count > 0 {
        // Slots left for the siblings once this child takes one.
        let remaining = max_children - active_placements - 1;
        if remaining >= sibling_count {
            score += SIBLING_BONUS;
        } else {
            score -= SIBLING_PENALTY;
            note = Some(format!(
                "household cannot accommodate {sibling_count} sibling(s)"
            ));
        }
    }

    (score.clamp(0, 100) as u8, note)
}

fn experience_factor(family: &Family) -> u8 {
    let successes = family
        .history
        .iter()
        .filter(|past| past.outcome == PlacementOutcome::Successful)
        .count() as i32;
    let interruptions = family
        .history
        .iter()
        .filter(|past| past.outcome == PlacementOutcome::Interrupted)
        .count() as i32;

    let mut score = EXPERIENCE_BASE;
    score += (SUCCESS_BONUS * successes).min(SUCCESS_BONUS_CAP);
    score -= (INTERRUPTION_PENALTY * interruptions).min(INTERRUPTION_PENALTY_CAP);
    if family
        .composition
        .iter()
        .any(|member| member.relationship.eq_ignore_ascii_case("child"))
    {
        score += PARENTING_BONUS;
    }

    score.clamp(0, 100) as u8
}

fn availability_factor(family: &Family, today: NaiveDate) -> (u8, Option<String>) {
    if family.status != FamilyStatus::Available {
        return (
            0,
            Some(format!("family status is {}", family.status.label())),
        );
    }

    let cutoff = today
        .checked_sub_months(Months::new(RECENT_END_WINDOW_MONTHS))
        .unwrap_or(NaiveDate::MIN);
    if family.history.iter().any(|past| past.ended_on > cutoff) {
        (
            (AVAILABILITY_FULL - RECENT_END_PENALTY) as u8,
            Some("previous placement ended within the last three months".to_string()),
        )
    } else {
        (AVAILABILITY_FULL as u8, None)
    }
}
