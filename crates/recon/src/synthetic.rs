//! Synthetic-data detection.
//!
//! Imports and manual repairs left placeholder people in the store. The
//! deny-list is configuration, not inference: exact full names are checked
//! first, then marker substrings, to keep false positives against real
//! residents at exact-match precision wherever possible.

use std::collections::HashSet;

use crate::canonical::squash;
use crate::model::Occupant;
use crate::plan::{Action, DeleteReason};

/// How a name matched the deny-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticMatch {
    /// Folded full name equals a deny-listed name.
    Exact,
    /// Folded full name contains a marker substring.
    Marker,
}

/// Versioned deny-list. Entries are folded at construction so matching is
/// a plain lookup.
#[derive(Debug, Clone)]
pub struct DenyList {
    version: u32,
    exact: HashSet<String>,
    markers: Vec<String>,
}

impl DenyList {
    pub fn new(version: u32, exact: &[String], markers: &[String]) -> Self {
        Self {
            version,
            exact: exact.iter().map(|s| squash(s)).collect(),
            markers: markers.iter().map(|s| squash(s)).filter(|s| !s.is_empty()).collect(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Match a folded full name. Exact entries take precedence over
    /// markers so reporting can distinguish the two.
    pub fn matches(&self, folded_full_name: &str) -> Option<SyntheticMatch> {
        if self.exact.contains(folded_full_name) {
            return Some(SyntheticMatch::Exact);
        }
        if self.markers.iter().any(|m| folded_full_name.contains(m.as_str())) {
            return Some(SyntheticMatch::Marker);
        }
        None
    }
}

/// Emit a delete for every occupant matching the deny-list, in input
/// order. Runs over the whole occupant set regardless of clustering.
pub fn scrub(occupants: &[Occupant], deny_list: &DenyList) -> Vec<Action> {
    occupants
        .iter()
        .filter(|occ| deny_list.matches(&occ.folded_full_name()).is_some())
        .map(|occ| Action::DeleteOccupant { id: occ.id.clone(), reason: DeleteReason::Synthetic })
        .collect()
}
