//! Plan execution against the store.
//!
//! Two waves: merge actions first, eliminations only after the whole
//! merge wave has been attempted, so a property is never deleted while a
//! planned re-parent still points at it. Within a wave, actions run on a
//! bounded worker pool because the store rate-limits aggressive writers.
//!
//! Every store operation here is idempotent (delete a specific id, set a
//! field to a specific value), so each action gets a small retry budget
//! on transient errors and is then logged and skipped. Skips never abort
//! the wave; one bad record must not block thousands of good ones.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use porchlight_recon::plan::{Action, ReconcilePlan};
use porchlight_store::{Entity, StoreClient, StoreError};

const RETRY_DELAY: Duration = Duration::from_millis(500);

/// What actually happened, as opposed to what the plan projected.
#[derive(Debug, Default, serde::Serialize)]
pub struct ExecStats {
    pub attempted: usize,
    pub succeeded: usize,
    /// Target records that were already gone (another pass got there, or
    /// the record was an orphan by execution time).
    pub already_gone: usize,
    /// Actions skipped after exhausting their retry budget.
    pub skipped: Vec<String>,
}

impl ExecStats {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    fn merge(&mut self, other: ExecStats) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.already_gone += other.already_gone;
        self.skipped.extend(other.skipped);
    }
}

/// Execute the plan. Returns stats; failures are recorded, not raised.
pub fn execute(
    client: &StoreClient,
    plan: &ReconcilePlan,
    concurrency: usize,
    retry_budget: u32,
    quiet: bool,
) -> ExecStats {
    let mut stats = run_wave(client, &plan.merge_actions, concurrency, retry_budget, quiet);
    stats.merge(run_wave(client, &plan.eliminate_actions, concurrency, retry_budget, quiet));
    stats
}

/// Run one wave of actions striped across a fixed pool of workers.
fn run_wave(
    client: &StoreClient,
    actions: &[Action],
    concurrency: usize,
    retry_budget: u32,
    quiet: bool,
) -> ExecStats {
    if actions.is_empty() {
        return ExecStats::default();
    }

    let cursor = AtomicUsize::new(0);
    let succeeded = AtomicUsize::new(0);
    let already_gone = AtomicUsize::new(0);
    let skipped: Mutex<Vec<String>> = Mutex::new(Vec::new());
    let workers = concurrency.min(actions.len()).max(1);

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let index = cursor.fetch_add(1, Ordering::Relaxed);
                let Some(action) = actions.get(index) else { break };

                match apply_with_retry(client, action, retry_budget, quiet) {
                    Ok(Outcome::Applied) => {
                        succeeded.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Outcome::AlreadyGone) => {
                        already_gone.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        let detail =
                            format!("{} {}: {e}", action.verb(), action.target_id());
                        if !quiet {
                            eprintln!("warning: skipped {detail}");
                        }
                        if let Ok(mut skipped) = skipped.lock() {
                            skipped.push(detail);
                        }
                    }
                }
            });
        }
    });

    let mut skipped = skipped.into_inner().unwrap_or_default();
    skipped.sort();
    ExecStats {
        attempted: actions.len(),
        succeeded: succeeded.into_inner(),
        already_gone: already_gone.into_inner(),
        skipped,
    }
}

enum Outcome {
    Applied,
    AlreadyGone,
}

fn apply_with_retry(
    client: &StoreClient,
    action: &Action,
    retry_budget: u32,
    quiet: bool,
) -> Result<Outcome, StoreError> {
    let mut attempt = 0;
    loop {
        match apply(client, action) {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_transient() && attempt < retry_budget => {
                attempt += 1;
                if !quiet {
                    eprintln!(
                        "warning: {} {}: {e}; retrying ({attempt}/{retry_budget})",
                        action.verb(),
                        action.target_id(),
                    );
                }
                thread::sleep(RETRY_DELAY);
            }
            Err(e) => return Err(e),
        }
    }
}

fn apply(client: &StoreClient, action: &Action) -> Result<Outcome, StoreError> {
    match action {
        Action::ReparentOccupant { id, to_property } => reparent(
            client,
            Entity::Occupants,
            id,
            &serde_json::json!({ "propertyId": to_property }),
        ),
        Action::DeleteOccupant { id, .. } => {
            client.delete(Entity::Occupants, id)?;
            Ok(Outcome::Applied)
        }
        Action::ReparentAssignment { id, to_property } => reparent(
            client,
            Entity::Assignments,
            id,
            &serde_json::json!({ "propertyId": to_property }),
        ),
        Action::DeleteAssignment { id } => {
            client.delete(Entity::Assignments, id)?;
            Ok(Outcome::Applied)
        }
        Action::DeleteProperty { id } => {
            client.delete(Entity::Properties, id)?;
            Ok(Outcome::Applied)
        }
        Action::SetAbsentee { id, value } => reparent(
            client,
            Entity::Properties,
            id,
            &serde_json::json!({ "absenteeOwner": value }),
        ),
    }
}

/// PATCH that tolerates the record vanishing between planning and
/// execution. An update against a deleted record is an already-resolved
/// conflict, not a failure.
fn reparent(
    client: &StoreClient,
    entity: Entity,
    id: &str,
    patch: &serde_json::Value,
) -> Result<Outcome, StoreError> {
    match client.update(entity, id, patch) {
        Ok(()) => Ok(Outcome::Applied),
        Err(StoreError::NotFound) => Ok(Outcome::AlreadyGone),
        Err(e) => Err(e),
    }
}
