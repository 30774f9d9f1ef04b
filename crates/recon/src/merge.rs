//! Occupant and assignment merging for a selected cluster.
//!
//! Both mergers are planning-only: they read grouped snapshot data and
//! emit [`Action`]s, never touching the store. Each runs independently of
//! the other, so the two can be planned for the same cluster in any order.

use std::collections::{BTreeMap, HashSet};

use crate::model::{Assignment, Occupant, Property};
use crate::plan::{Action, DeleteReason};

/// Plan the occupant moves for one cluster.
///
/// The survivor's own occupants claim their merge keys first, in
/// (created_at, id) order, so first-seen-on-survivor wins. Later holders
/// of a claimed key are deleted rather than overwritten. Occupants of
/// eliminated records are re-parented when their key is new, deleted when
/// it is already claimed. With no eliminated records this degenerates to
/// intra-property dedup, which every surviving property gets.
pub fn merge_occupants(
    survivor: &Property,
    eliminated: &[&Property],
    occupants: &std::collections::HashMap<&str, Vec<&Occupant>>,
) -> Vec<Action> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut actions = Vec::new();

    if let Some(own) = occupants.get(survivor.id.as_str()) {
        for occ in own {
            if !seen.insert(occ.merge_key()) {
                actions.push(Action::DeleteOccupant {
                    id: occ.id.clone(),
                    reason: DeleteReason::DuplicatePerson,
                });
            }
        }
    }

    for member in eliminated {
        let Some(theirs) = occupants.get(member.id.as_str()) else { continue };
        for occ in theirs {
            if seen.insert(occ.merge_key()) {
                actions.push(Action::ReparentOccupant {
                    id: occ.id.clone(),
                    to_property: survivor.id.clone(),
                });
            } else {
                actions.push(Action::DeleteOccupant {
                    id: occ.id.clone(),
                    reason: DeleteReason::DuplicatePerson,
                });
            }
        }
    }

    actions
}

/// Plan the assignment moves for one cluster.
///
/// Terminal assignments (DONE, CANCELLED) are canvassing history: ones on
/// eliminated records are re-parented, none are ever deleted. Non-terminal
/// assignments are grouped per volunteer across the whole cluster; the
/// most recently created one wins (greatest id on a timestamp tie) and the
/// rest are deleted. The winner is re-parented when it lives on an
/// eliminated record.
pub fn merge_assignments(
    survivor: &Property,
    eliminated: &[&Property],
    assignments: &std::collections::HashMap<&str, Vec<&Assignment>>,
) -> Vec<Action> {
    let mut actions = Vec::new();
    let mut live: BTreeMap<&str, Vec<&Assignment>> = BTreeMap::new();

    let mut collect = |property: &Property, on_survivor: bool| {
        let Some(list) = assignments.get(property.id.as_str()) else { return };
        for asn in list {
            if asn.status.is_terminal() {
                if !on_survivor {
                    actions.push(Action::ReparentAssignment {
                        id: asn.id.clone(),
                        to_property: survivor.id.clone(),
                    });
                }
            } else {
                live.entry(asn.volunteer_id.as_str()).or_default().push(*asn);
            }
        }
    };

    collect(survivor, true);
    for member in eliminated {
        collect(member, false);
    }

    for (_, mut contenders) in live {
        contenders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let winner = match contenders.pop() {
            Some(winner) => winner,
            None => continue,
        };
        for loser in contenders {
            actions.push(Action::DeleteAssignment { id: loser.id.clone() });
        }
        if winner.property_id != survivor.id {
            actions.push(Action::ReparentAssignment {
                id: winner.id.clone(),
                to_property: survivor.id.clone(),
            });
        }
    }

    actions
}
