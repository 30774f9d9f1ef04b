//! Post-merge consistency verification.
//!
//! Read-only: checks are evaluated against a freshly fetched snapshot and
//! reported with the offending identifiers. The verifier never repairs
//! anything; a violation means the pass should be re-run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_key;
use crate::model::Snapshot;

/// One invariant violation, with enough identifiers to re-run against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Two or more surviving properties share a canonical key.
    DuplicateProperty { key: String, property_ids: Vec<String> },
    /// A property holds two occupants with the same folded (first, last).
    DuplicateOccupant { property_id: String, name: String, occupant_ids: Vec<String> },
    /// A (property, volunteer) pair holds more than one non-terminal
    /// assignment.
    DuplicateAssignment { property_id: String, volunteer_id: String, assignment_ids: Vec<String> },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateProperty { key, property_ids } => {
                write!(f, "duplicate properties for '{key}': {}", property_ids.join(", "))
            }
            Self::DuplicateOccupant { property_id, name, occupant_ids } => {
                write!(
                    f,
                    "property {property_id}: duplicate occupant '{name}': {}",
                    occupant_ids.join(", ")
                )
            }
            Self::DuplicateAssignment { property_id, volunteer_id, assignment_ids } => {
                write!(
                    f,
                    "property {property_id}, volunteer {volunteer_id}: duplicate live assignments: {}",
                    assignment_ids.join(", ")
                )
            }
        }
    }
}

/// Check every invariant against the snapshot. Output order is
/// deterministic: property duplicates first, then occupant duplicates,
/// then assignment duplicates, each sorted by key.
pub fn check(snapshot: &Snapshot) -> Vec<Violation> {
    let mut violations = Vec::new();

    let mut by_key: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for property in &snapshot.properties {
        if let Some(key) = canonical_key(property) {
            by_key.entry(key.as_str().to_owned()).or_default().push(property.id.clone());
        }
    }
    for (key, mut ids) in by_key {
        if ids.len() > 1 {
            ids.sort();
            violations.push(Violation::DuplicateProperty { key, property_ids: ids });
        }
    }

    let occupants = snapshot.occupants_by_property();
    let mut occupant_groups: BTreeMap<(&str, (String, String)), Vec<String>> = BTreeMap::new();
    for (property_id, list) in &occupants {
        for occ in list {
            occupant_groups
                .entry((*property_id, occ.merge_key()))
                .or_default()
                .push(occ.id.clone());
        }
    }
    for ((property_id, (first, last)), mut ids) in occupant_groups {
        if ids.len() > 1 {
            ids.sort();
            violations.push(Violation::DuplicateOccupant {
                property_id: property_id.to_owned(),
                name: format!("{first} {last}"),
                occupant_ids: ids,
            });
        }
    }

    let assignments = snapshot.assignments_by_property();
    let mut assignment_groups: BTreeMap<(&str, &str), Vec<String>> = BTreeMap::new();
    for (property_id, list) in &assignments {
        for asn in list {
            if !asn.status.is_terminal() {
                assignment_groups
                    .entry((*property_id, asn.volunteer_id.as_str()))
                    .or_default()
                    .push(asn.id.clone());
            }
        }
    }
    for ((property_id, volunteer_id), mut ids) in assignment_groups {
        if ids.len() > 1 {
            ids.sort();
            violations.push(Violation::DuplicateAssignment {
                property_id: property_id.to_owned(),
                volunteer_id: volunteer_id.to_owned(),
                assignment_ids: ids,
            });
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Assignment, AssignmentStatus, Occupant, OccupantRole, Property, Volunteer,
    };
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn property(id: &str, street: &str) -> Property {
        Property {
            id: id.into(),
            unit_number: None,
            street: street.into(),
            city: "Broadlands".into(),
            state: Some("VA".into()),
            postal_code: None,
            mailing_street: None,
            mailing_city: None,
            mailing_state: None,
            mailing_postal_code: None,
            absentee_owner: false,
            lat: None,
            lng: None,
            created_at: ts(0),
        }
    }

    fn occupant(id: &str, property_id: &str, first: &str, last: &str) -> Occupant {
        Occupant {
            id: id.into(),
            property_id: property_id.into(),
            first_name: first.into(),
            last_name: last.into(),
            role: OccupantRole::PrimaryOwner,
            has_signed: false,
            email: None,
            mobile_phone: None,
            created_at: ts(0),
        }
    }

    fn assignment(id: &str, property_id: &str, volunteer_id: &str, status: AssignmentStatus) -> Assignment {
        Assignment {
            id: id.into(),
            property_id: property_id.into(),
            volunteer_id: volunteer_id.into(),
            status,
            assigned_at: None,
            created_at: ts(0),
        }
    }

    fn volunteer(id: &str) -> Volunteer {
        Volunteer { id: id.into(), display_name: None, email: None }
    }

    #[test]
    fn clean_snapshot_has_no_violations() {
        let snapshot = Snapshot::new(
            vec![property("h1", "100 Main St"), property("h2", "200 Oak Ave")],
            vec![occupant("p1", "h1", "Michael", "Simpson")],
            vec![assignment("a1", "h1", "v1", AssignmentStatus::NotStarted)],
            vec![volunteer("v1")],
        );
        assert!(check(&snapshot).is_empty());
    }

    #[test]
    fn shared_canonical_key_is_reported() {
        let snapshot = Snapshot::new(
            vec![property("h1", "100 Main St"), property("h2", "100 MAIN ST")],
            vec![],
            vec![],
            vec![],
        );
        let violations = check(&snapshot);
        assert_eq!(
            violations,
            vec![Violation::DuplicateProperty {
                key: "100 main st, broadlands, va".into(),
                property_ids: vec!["h1".into(), "h2".into()],
            }]
        );
    }

    #[test]
    fn duplicate_occupants_reported_per_property() {
        let snapshot = Snapshot::new(
            vec![property("h1", "100 Main St")],
            vec![
                occupant("p1", "h1", "Michael", "Simpson"),
                occupant("p2", "h1", "MICHAEL", "simpson"),
            ],
            vec![],
            vec![],
        );
        let violations = check(&snapshot);
        assert_eq!(
            violations,
            vec![Violation::DuplicateOccupant {
                property_id: "h1".into(),
                name: "michael simpson".into(),
                occupant_ids: vec!["p1".into(), "p2".into()],
            }]
        );
    }

    #[test]
    fn terminal_assignments_do_not_violate_pair_invariant() {
        let snapshot = Snapshot::new(
            vec![property("h1", "100 Main St")],
            vec![],
            vec![
                assignment("a1", "h1", "v1", AssignmentStatus::Done),
                assignment("a2", "h1", "v1", AssignmentStatus::NotStarted),
            ],
            vec![volunteer("v1")],
        );
        assert!(check(&snapshot).is_empty());
    }

    #[test]
    fn two_live_assignments_for_one_pair_reported() {
        let snapshot = Snapshot::new(
            vec![property("h1", "100 Main St")],
            vec![],
            vec![
                assignment("a1", "h1", "v1", AssignmentStatus::NotStarted),
                assignment("a2", "h1", "v1", AssignmentStatus::InProgress),
            ],
            vec![volunteer("v1")],
        );
        let violations = check(&snapshot);
        assert_eq!(
            violations,
            vec![Violation::DuplicateAssignment {
                property_id: "h1".into(),
                volunteer_id: "v1".into(),
                assignment_ids: vec!["a1".into(), "a2".into()],
            }]
        );
    }
}
