//! Mutation plan produced by the engine.
//!
//! Planning never touches the store. Every mutation the pass intends to
//! perform is captured here first, so a dry run can print exactly what a
//! live run would do.

use serde::{Deserialize, Serialize};

use crate::report::PlanSummary;

/// One store mutation. Ordering inside a wave is deterministic; see
/// [`ReconcilePlan`] for the wave split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    /// Move an occupant onto the surviving property.
    ReparentOccupant { id: String, to_property: String },
    /// Delete a duplicate or deny-listed occupant.
    DeleteOccupant { id: String, reason: DeleteReason },
    /// Move an assignment onto the surviving property.
    ReparentAssignment { id: String, to_property: String },
    /// Delete a superseded non-terminal assignment.
    DeleteAssignment { id: String },
    /// Delete an eliminated duplicate property.
    DeleteProperty { id: String },
    /// Correct a stale absentee-owner flag.
    SetAbsentee { id: String, value: bool },
}

impl Action {
    /// Record id the action targets.
    pub fn target_id(&self) -> &str {
        match self {
            Action::ReparentOccupant { id, .. }
            | Action::DeleteOccupant { id, .. }
            | Action::ReparentAssignment { id, .. }
            | Action::DeleteAssignment { id }
            | Action::DeleteProperty { id }
            | Action::SetAbsentee { id, .. } => id,
        }
    }

    /// Short verb for log lines.
    pub fn verb(&self) -> &'static str {
        match self {
            Action::ReparentOccupant { .. } => "reparent-occupant",
            Action::DeleteOccupant { .. } => "delete-occupant",
            Action::ReparentAssignment { .. } => "reparent-assignment",
            Action::DeleteAssignment { .. } => "delete-assignment",
            Action::DeleteProperty { .. } => "delete-property",
            Action::SetAbsentee { .. } => "set-absentee",
        }
    }
}

/// Why an occupant is being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteReason {
    /// Same (first, last) as an earlier occupant of the same property.
    DuplicatePerson,
    /// Matched the synthetic-data deny-list.
    Synthetic,
}

/// Complete plan for one reconcile pass.
///
/// `merge_actions` run first (reparents, occupant dedup deletes,
/// absentee corrections). `eliminate_actions` run only after every merge
/// action succeeded, so a property is never deleted while children still
/// point at it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcilePlan {
    pub merge_actions: Vec<Action>,
    pub eliminate_actions: Vec<Action>,
    pub summary: PlanSummary,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.merge_actions.is_empty() && self.eliminate_actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.merge_actions.len() + self.eliminate_actions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_json_shape_is_tagged() {
        let action = Action::ReparentOccupant { id: "p1".into(), to_property: "h1".into() };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["op"], "reparent_occupant");
        assert_eq!(json["id"], "p1");
        assert_eq!(json["to_property"], "h1");

        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn delete_reason_serializes_snake_case() {
        let action = Action::DeleteOccupant { id: "p1".into(), reason: DeleteReason::Synthetic };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["reason"], "synthetic");
    }

    #[test]
    fn empty_plan() {
        let plan = ReconcilePlan::default();
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
    }
}
