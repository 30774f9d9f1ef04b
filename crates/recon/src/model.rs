use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::squash;

// ---------------------------------------------------------------------------
// Store records
// ---------------------------------------------------------------------------

/// A canvassable address, as stored in the remote document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    #[serde(default)]
    pub unit_number: Option<String>,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub mailing_street: Option<String>,
    #[serde(default)]
    pub mailing_city: Option<String>,
    #[serde(default)]
    pub mailing_state: Option<String>,
    #[serde(default)]
    pub mailing_postal_code: Option<String>,
    #[serde(default)]
    pub absentee_owner: bool,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Property {
    /// Both coordinates present.
    pub fn has_coordinates(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }
}

/// A person attached to exactly one property.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupant {
    pub id: String,
    pub property_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: OccupantRole,
    #[serde(default)]
    pub has_signed: bool,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile_phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Occupant {
    /// Case-folded (first, last) pair used to detect duplicate people
    /// within a single property's occupant set.
    pub fn merge_key(&self) -> (String, String) {
        (squash(&self.first_name), squash(&self.last_name))
    }

    /// Case-folded, whitespace-collapsed full name, as matched by the
    /// synthetic-data deny-list.
    pub fn folded_full_name(&self) -> String {
        squash(&format!("{} {}", self.first_name, self.last_name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OccupantRole {
    PrimaryOwner,
    SecondaryOwner,
    Renter,
    #[serde(other)]
    Other,
}

impl Default for OccupantRole {
    fn default() -> Self {
        Self::Other
    }
}

/// A canvasser-to-property work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub property_id: String,
    pub volunteer_id: String,
    #[serde(default)]
    pub status: AssignmentStatus,
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    NotStarted,
    InProgress,
    Done,
    Cancelled,
}

impl AssignmentStatus {
    /// Terminal assignments are canvassing history; the one-per-pair
    /// invariant only covers non-terminal records.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl Default for AssignmentStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

/// Read-only; used to resolve assignment ownership and report orphans.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volunteer {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Immutable in-memory copy of the store, fetched with exhaustive
/// pagination at the start of a pass. All planning reads from here;
/// nothing mutates it.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub properties: Vec<Property>,
    pub occupants: Vec<Occupant>,
    pub assignments: Vec<Assignment>,
    pub volunteers: Vec<Volunteer>,
}

/// Records whose foreign keys no longer resolve. Reported, excluded from
/// merging, never deleted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Orphans {
    pub occupants: Vec<String>,
    pub assignments: Vec<String>,
}

impl Snapshot {
    pub fn new(
        properties: Vec<Property>,
        occupants: Vec<Occupant>,
        assignments: Vec<Assignment>,
        volunteers: Vec<Volunteer>,
    ) -> Self {
        Self { properties, occupants, assignments, volunteers }
    }

    pub fn property_ids(&self) -> HashSet<&str> {
        self.properties.iter().map(|p| p.id.as_str()).collect()
    }

    pub fn volunteer_ids(&self) -> HashSet<&str> {
        self.volunteers.iter().map(|v| v.id.as_str()).collect()
    }

    /// Occupants grouped by owning property, in deterministic
    /// (created_at, id) order. Orphaned occupants are excluded.
    pub fn occupants_by_property(&self) -> HashMap<&str, Vec<&Occupant>> {
        let ids = self.property_ids();
        let mut map: HashMap<&str, Vec<&Occupant>> = HashMap::new();
        for occ in &self.occupants {
            if ids.contains(occ.property_id.as_str()) {
                map.entry(occ.property_id.as_str()).or_default().push(occ);
            }
        }
        for list in map.values_mut() {
            list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        }
        map
    }

    /// Assignments grouped by owning property, in deterministic
    /// (created_at, id) order. Orphaned assignments are excluded.
    pub fn assignments_by_property(&self) -> HashMap<&str, Vec<&Assignment>> {
        let prop_ids = self.property_ids();
        let vol_ids = self.volunteer_ids();
        let mut map: HashMap<&str, Vec<&Assignment>> = HashMap::new();
        for asn in &self.assignments {
            if prop_ids.contains(asn.property_id.as_str())
                && vol_ids.contains(asn.volunteer_id.as_str())
            {
                map.entry(asn.property_id.as_str()).or_default().push(asn);
            }
        }
        for list in map.values_mut() {
            list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        }
        map
    }

    /// Occupants whose property is gone, and assignments whose property
    /// or volunteer is gone.
    pub fn orphans(&self) -> Orphans {
        let prop_ids = self.property_ids();
        let vol_ids = self.volunteer_ids();

        let mut orphans = Orphans::default();
        for occ in &self.occupants {
            if !prop_ids.contains(occ.property_id.as_str()) {
                orphans.occupants.push(occ.id.clone());
            }
        }
        for asn in &self.assignments {
            if !prop_ids.contains(asn.property_id.as_str())
                || !vol_ids.contains(asn.volunteer_id.as_str())
            {
                orphans.assignments.push(asn.id.clone());
            }
        }
        orphans.occupants.sort();
        orphans.assignments.sort();
        orphans
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
