//! Projected summary of a reconcile plan.

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterStats;
use crate::model::Orphans;

/// Counts projected from a plan, before anything is executed. A dry run
/// prints these; a live run reconciles them against actual outcomes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanSummary {
    /// Deny-list revision the plan was computed against.
    pub deny_list_version: u32,
    #[serde(default)]
    pub clusters: ClusterStats,
    pub properties_deleted: usize,
    pub occupants_reparented: usize,
    pub occupants_deduped: usize,
    pub synthetic_occupants_removed: usize,
    pub assignments_reparented: usize,
    pub assignments_deduped: usize,
    pub absentee_corrections: usize,
    /// Reported only. Orphans are never mutated.
    #[serde(default)]
    pub orphans: Orphans,
}

impl PlanSummary {
    /// Total mutations the plan would perform.
    pub fn total_mutations(&self) -> usize {
        self.properties_deleted
            + self.occupants_reparented
            + self.occupants_deduped
            + self.synthetic_occupants_removed
            + self.assignments_reparented
            + self.assignments_deduped
            + self.absentee_corrections
    }
}
