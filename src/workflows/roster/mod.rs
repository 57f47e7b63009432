//! Roster import from the legacy case-management CSV exports.
//!
//! Two files travel together: `children.csv` and `families.csv`. List
//! columns (health conditions, medications, educational needs, siblings)
//! are pipe-separated; household members are `relationship:age:income`
//! triples. One malformed row fails the whole import, so a seeded store
//! never holds half a roster. Entities mid-placement are rejected: the
//! exports carry no placement records, and a child or family imported as
//! "hosting" would contradict an empty store.

mod parser;

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::workflows::placement::{Child, EntityStore, Family, StoreError};

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Invalid { line: u64, message: String },
}

impl fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read roster export: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid roster CSV data: {}", err),
            RosterImportError::Invalid { line, message } => {
                write!(f, "roster line {line}: {message}")
            }
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
            RosterImportError::Invalid { .. } => None,
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RosterImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

fn invalid(line: u64, message: impl Into<String>) -> RosterImportError {
    RosterImportError::Invalid {
        line,
        message: message.into(),
    }
}

/// Parsed roster, ready to seed a store.
#[derive(Debug)]
pub struct Roster {
    pub children: Vec<Child>,
    pub families: Vec<Family>,
}

impl Roster {
    /// Inserts every child, then every family. Stops at the first duplicate
    /// id or store fault.
    pub fn seed<S: EntityStore>(&self, store: &S) -> Result<(), StoreError> {
        for child in &self.children {
            store.insert_child(child.clone())?;
        }
        for family in &self.families {
            store.insert_family(family.clone())?;
        }
        Ok(())
    }
}

pub struct RosterImporter;

impl RosterImporter {
    pub fn from_paths<P: AsRef<Path>, Q: AsRef<Path>>(
        children: P,
        families: Q,
    ) -> Result<Roster, RosterImportError> {
        let children = File::open(children)?;
        let families = File::open(families)?;
        Self::from_readers(children, families)
    }

    pub fn from_readers<C: Read, F: Read>(
        children: C,
        families: F,
    ) -> Result<Roster, RosterImportError> {
        Ok(Roster {
            children: parser::parse_children(children)?,
            families: parser::parse_families(families)?,
        })
    }
}
