use std::io::Read;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use super::{invalid, RosterImportError};
use crate::workflows::placement::{
    Address, AgeRange, Child, ChildId, ChildStatus, Family, FamilyBackground, FamilyId,
    FamilyPreferences, FamilyStatus, Gender, GenderPreference, HouseholdMember, PersonalInfo,
    SpecialNeeds,
};

pub(crate) fn parse_children<R: Read>(reader: R) -> Result<Vec<Child>, RosterImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut children = Vec::new();

    for (index, record) in csv_reader.deserialize::<ChildRow>().enumerate() {
        let line = data_line(index);
        let row = record?;
        children.push(row.into_child(line)?);
    }

    Ok(children)
}

pub(crate) fn parse_families<R: Read>(reader: R) -> Result<Vec<Family>, RosterImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut families = Vec::new();

    for (index, record) in csv_reader.deserialize::<FamilyRow>().enumerate() {
        let line = data_line(index);
        let row = record?;
        families.push(row.into_family(line)?);
    }

    Ok(families)
}

// Data rows start on line 2; line 1 is the header.
fn data_line(index: usize) -> u64 {
    index as u64 + 2
}

#[derive(Debug, Deserialize)]
struct ChildRow {
    id: String,
    name: String,
    birth_date: String,
    gender: String,
    status: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    has_special_needs: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    health_conditions: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    medications: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    educational_needs: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    siblings: Option<String>,
}

impl ChildRow {
    fn into_child(self, line: u64) -> Result<Child, RosterImportError> {
        if self.id.is_empty() {
            return Err(invalid(line, "child id is empty"));
        }

        let birth_date = parse_date(line, "birth_date", &self.birth_date)?;
        let gender = parse_gender(line, &self.gender)?;
        let status = parse_child_status(line, &self.status)?;
        if status == ChildStatus::InPlacement {
            return Err(invalid(
                line,
                format!("child {} is in placement; placements are not importable", self.id),
            ));
        }

        let has_special_needs = match self.has_special_needs.as_deref() {
            Some(value) => parse_bool(line, "has_special_needs", value)?,
            None => false,
        };

        Ok(Child {
            id: ChildId(self.id),
            personal: PersonalInfo {
                name: self.name,
                birth_date,
                gender,
            },
            special_needs: SpecialNeeds {
                has_special_needs,
                health_conditions: split_list(self.health_conditions.as_deref()),
                medications: split_list(self.medications.as_deref()),
                educational_needs: split_list(self.educational_needs.as_deref()),
            },
            background: FamilyBackground {
                siblings: split_list(self.siblings.as_deref())
                    .into_iter()
                    .map(ChildId)
                    .collect(),
            },
            status,
            current_placement: None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct FamilyRow {
    id: String,
    primary_contact: String,
    city: String,
    state: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    members: Option<String>,
    age_min: u8,
    age_max: u8,
    gender_preference: String,
    special_needs_accepted: String,
    max_children: u8,
    status: String,
}

impl FamilyRow {
    fn into_family(self, line: u64) -> Result<Family, RosterImportError> {
        if self.id.is_empty() {
            return Err(invalid(line, "family id is empty"));
        }
        if self.age_min > self.age_max {
            return Err(invalid(
                line,
                format!("age range {}-{} is inverted", self.age_min, self.age_max),
            ));
        }
        if self.max_children == 0 {
            return Err(invalid(line, "max_children must be at least 1"));
        }

        let status = parse_family_status(line, &self.status)?;
        if status == FamilyStatus::ActivePlacement {
            return Err(invalid(
                line,
                format!("family {} is hosting; placements are not importable", self.id),
            ));
        }

        Ok(Family {
            id: FamilyId(self.id),
            primary_contact: self.primary_contact,
            address: Address {
                city: self.city,
                state: self.state,
            },
            composition: parse_members(line, self.members.as_deref())?,
            preferences: FamilyPreferences {
                age_range: AgeRange {
                    min: self.age_min,
                    max: self.age_max,
                },
                gender_preference: parse_gender_preference(line, &self.gender_preference)?,
                special_needs_accepted: parse_bool(
                    line,
                    "special_needs_accepted",
                    &self.special_needs_accepted,
                )?,
                max_children: self.max_children,
            },
            status,
            history: Vec::new(),
        })
    }
}

fn parse_members(line: u64, raw: Option<&str>) -> Result<Vec<HouseholdMember>, RosterImportError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    raw.split('|')
        .filter(|part| !part.trim().is_empty())
        .map(|part| parse_member(line, part))
        .collect()
}

fn parse_member(line: u64, raw: &str) -> Result<HouseholdMember, RosterImportError> {
    let mut parts = raw.trim().splitn(3, ':');
    let relationship = parts.next().unwrap_or("").trim();
    let (Some(age), Some(income)) = (parts.next(), parts.next()) else {
        return Err(invalid(
            line,
            format!("household member '{}' must be relationship:age:income", raw.trim()),
        ));
    };
    if relationship.is_empty() {
        return Err(invalid(line, "household member relationship is empty"));
    }

    let age = age
        .trim()
        .parse::<u8>()
        .map_err(|_| invalid(line, format!("household member age '{}' is not a number", age)))?;
    let monthly_income = income.trim().parse::<u32>().map_err(|_| {
        invalid(
            line,
            format!("household member income '{}' is not a number", income),
        )
    })?;

    Ok(HouseholdMember {
        relationship: relationship.to_string(),
        age,
        monthly_income,
    })
}

fn parse_date(line: u64, column: &str, value: &str) -> Result<NaiveDate, RosterImportError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| invalid(line, format!("{column} '{value}' is not a YYYY-MM-DD date")))
}

fn parse_bool(line: u64, column: &str, value: &str) -> Result<bool, RosterImportError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(invalid(
            line,
            format!("{column} must be true or false, got '{other}'"),
        )),
    }
}

fn parse_gender(line: u64, value: &str) -> Result<Gender, RosterImportError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "female" | "f" => Ok(Gender::Female),
        "male" | "m" => Ok(Gender::Male),
        "other" => Ok(Gender::Other),
        other => Err(invalid(line, format!("unknown gender '{other}'"))),
    }
}

fn parse_gender_preference(line: u64, value: &str) -> Result<GenderPreference, RosterImportError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "any" => Ok(GenderPreference::Any),
        "female" | "f" => Ok(GenderPreference::Female),
        "male" | "m" => Ok(GenderPreference::Male),
        other => Err(invalid(line, format!("unknown gender preference '{other}'"))),
    }
}

fn parse_child_status(line: u64, value: &str) -> Result<ChildStatus, RosterImportError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "awaiting" => Ok(ChildStatus::Awaiting),
        "in_placement" => Ok(ChildStatus::InPlacement),
        "discharged" => Ok(ChildStatus::Discharged),
        "returned_family" => Ok(ChildStatus::ReturnedFamily),
        other => Err(invalid(line, format!("unknown child status '{other}'"))),
    }
}

fn parse_family_status(line: u64, value: &str) -> Result<FamilyStatus, RosterImportError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "available" => Ok(FamilyStatus::Available),
        "unavailable" => Ok(FamilyStatus::Unavailable),
        "under_evaluation" => Ok(FamilyStatus::UnderEvaluation),
        "active_placement" => Ok(FamilyStatus::ActivePlacement),
        other => Err(invalid(line, format!("unknown family status '{other}'"))),
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    raw.split('|')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
pub(crate) fn parse_member_for_tests(raw: &str) -> Result<HouseholdMember, RosterImportError> {
    parse_member(2, raw)
}
