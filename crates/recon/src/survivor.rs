//! Survivor selection for duplicate clusters.
//!
//! Records that already accumulated real occupant or assignment data are
//! worth more than bare imported shells, even when older. One fixed scoring
//! policy replaces the keep-newest / keep-first variants the repair scripts
//! disagreed on.

use std::collections::HashMap;

use crate::cluster::DuplicateCluster;
use crate::model::{Assignment, Occupant, Property};

/// Completeness score: +2 for at least one occupant, +1 for at least one
/// assignment, +1 for both coordinates.
pub fn completeness_score(
    property: &Property,
    occupants: &HashMap<&str, Vec<&Occupant>>,
    assignments: &HashMap<&str, Vec<&Assignment>>,
) -> u8 {
    let mut score = 0;
    if occupants.get(property.id.as_str()).is_some_and(|o| !o.is_empty()) {
        score += 2;
    }
    if assignments.get(property.id.as_str()).is_some_and(|a| !a.is_empty()) {
        score += 1;
    }
    if property.has_coordinates() {
        score += 1;
    }
    score
}

/// The chosen survivor plus the records to eliminate, in cluster order.
#[derive(Debug)]
pub struct Selection<'a> {
    pub survivor: &'a Property,
    pub eliminated: Vec<&'a Property>,
}

/// Pick exactly one survivor per cluster.
///
/// Highest completeness score wins; ties go to the most recent
/// `created_at`, then the greatest id. The comparison is a total order
/// over the cluster, so the same input always selects the same survivor.
pub fn select_survivor<'a>(
    cluster: &DuplicateCluster<'a>,
    occupants: &HashMap<&str, Vec<&Occupant>>,
    assignments: &HashMap<&str, Vec<&Assignment>>,
) -> Selection<'a> {
    let mut survivor = cluster.members[0];
    for candidate in cluster.members.iter().copied().skip(1) {
        let ordering = completeness_score(candidate, occupants, assignments)
            .cmp(&completeness_score(survivor, occupants, assignments))
            .then_with(|| candidate.created_at.cmp(&survivor.created_at))
            .then_with(|| candidate.id.cmp(&survivor.id));
        if ordering.is_gt() {
            survivor = candidate;
        }
    }

    let eliminated = cluster
        .members
        .iter()
        .copied()
        .filter(|p| p.id != survivor.id)
        .collect();

    Selection { survivor, eliminated }
}
