//! Plan construction.
//!
//! One pass over an immutable snapshot: detect clusters, pick survivors,
//! plan occupant and assignment moves, scrub synthetic occupants, correct
//! absentee flags. The output is a two-wave plan; nothing here talks to
//! the store.

use std::collections::HashSet;

use crate::absentee;
use crate::cluster::detect_clusters;
use crate::config::ReconcileConfig;
use crate::merge::{merge_assignments, merge_occupants};
use crate::model::Snapshot;
use crate::plan::{Action, DeleteReason, ReconcilePlan};
use crate::report::PlanSummary;
use crate::survivor::select_survivor;
use crate::synthetic;

/// Build the full reconcile plan for a snapshot.
///
/// Synthetic occupants are excluded from merge planning, so a record never
/// receives both a re-parent and a delete. Eliminated properties land in
/// the second wave; everything that re-points or deletes their children
/// runs in the first.
pub fn build_plan(snapshot: &Snapshot, config: &ReconcileConfig) -> ReconcilePlan {
    let deny_list = config.deny_list();
    let scrub_actions = synthetic::scrub(&snapshot.occupants, &deny_list);
    let synthetic_ids: HashSet<&str> =
        scrub_actions.iter().map(|a| a.target_id()).collect();

    let mut occupants = snapshot.occupants_by_property();
    for list in occupants.values_mut() {
        list.retain(|occ| !synthetic_ids.contains(occ.id.as_str()));
    }
    let assignments = snapshot.assignments_by_property();

    let (clusters, stats) = detect_clusters(&snapshot.properties);
    let mut clustered: HashSet<&str> = HashSet::new();
    for cluster in &clusters {
        for member in &cluster.members {
            clustered.insert(member.id.as_str());
        }
    }

    let mut merge_actions = scrub_actions;
    let mut eliminate_actions = Vec::new();
    let mut surviving_flags = Vec::new();

    for cluster in &clusters {
        let selection = select_survivor(cluster, &occupants, &assignments);
        merge_actions.extend(merge_occupants(
            selection.survivor,
            &selection.eliminated,
            &occupants,
        ));
        merge_actions.extend(merge_assignments(
            selection.survivor,
            &selection.eliminated,
            &assignments,
        ));
        for gone in &selection.eliminated {
            eliminate_actions.push(Action::DeleteProperty { id: gone.id.clone() });
        }
        surviving_flags.push(selection.survivor.clone());
    }

    // Singletons still get intra-property dedup and flag correction.
    for property in &snapshot.properties {
        if clustered.contains(property.id.as_str()) {
            continue;
        }
        merge_actions.extend(merge_occupants(property, &[], &occupants));
        merge_actions.extend(merge_assignments(property, &[], &assignments));
        surviving_flags.push(property.clone());
    }

    merge_actions.extend(absentee::classify(&surviving_flags));

    let mut summary = PlanSummary {
        deny_list_version: deny_list.version(),
        clusters: stats,
        orphans: snapshot.orphans(),
        ..PlanSummary::default()
    };
    for action in merge_actions.iter().chain(&eliminate_actions) {
        match action {
            Action::ReparentOccupant { .. } => summary.occupants_reparented += 1,
            Action::DeleteOccupant { reason: DeleteReason::DuplicatePerson, .. } => {
                summary.occupants_deduped += 1
            }
            Action::DeleteOccupant { reason: DeleteReason::Synthetic, .. } => {
                summary.synthetic_occupants_removed += 1
            }
            Action::ReparentAssignment { .. } => summary.assignments_reparented += 1,
            Action::DeleteAssignment { .. } => summary.assignments_deduped += 1,
            Action::DeleteProperty { .. } => summary.properties_deleted += 1,
            Action::SetAbsentee { .. } => summary.absentee_corrections += 1,
        }
    }

    ReconcilePlan { merge_actions, eliminate_actions, summary }
}
