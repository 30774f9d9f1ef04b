//! Run report: what was planned, what was executed, what the verifier saw.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use porchlight_recon::report::PlanSummary;
use porchlight_recon::verify::Violation;
use serde::Serialize;

use crate::exit_codes;
use crate::executor::ExecStats;
use crate::CliError;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub meta: RunMeta,
    pub summary: PlanSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationReport>,
}

#[derive(Debug, Serialize)]
pub struct RunMeta {
    pub tool_version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub dry_run: bool,
}

impl RunMeta {
    pub fn new(dry_run: bool) -> Self {
        Self {
            tool_version: env!("CARGO_PKG_VERSION"),
            generated_at: Utc::now(),
            dry_run,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerificationReport {
    /// Read rounds consumed before the result settled.
    pub rounds_used: u32,
    pub violations: Vec<Violation>,
}

impl RunReport {
    /// Write the report: JSON to stdout or `--output`, human summary to
    /// stderr so it never corrupts piped JSON.
    pub fn emit(&self, json: bool, output: Option<&Path>, quiet: bool) -> Result<(), CliError> {
        if json || output.is_some() {
            let body = serde_json::to_string_pretty(self).map_err(|e| CliError {
                code: exit_codes::EXIT_ERROR,
                message: format!("cannot serialize report: {e}"),
                hint: None,
            })?;
            match output {
                Some(path) => {
                    std::fs::write(path, body.as_bytes()).map_err(|e| CliError {
                        code: exit_codes::EXIT_ERROR,
                        message: format!("cannot write {}: {e}", path.display()),
                        hint: None,
                    })?;
                }
                None => {
                    let stdout = std::io::stdout();
                    let mut handle = stdout.lock();
                    writeln!(handle, "{body}").map_err(|e| CliError {
                        code: exit_codes::EXIT_ERROR,
                        message: format!("cannot write report: {e}"),
                        hint: None,
                    })?;
                }
            }
        }

        if !quiet {
            self.print_human();
        }
        Ok(())
    }

    fn print_human(&self) {
        let s = &self.summary;
        if self.meta.dry_run {
            eprintln!("dry run: no store mutations performed");
        }
        eprintln!(
            "properties: {} total, {} unique addresses, {} duplicate clusters ({} extra records)",
            s.clusters.total_properties,
            s.clusters.unique_keys,
            s.clusters.duplicate_clusters,
            s.clusters.duplicate_records,
        );
        eprintln!(
            "planned: {} property deletions, {} occupant re-parents, {} occupant dedups, {} synthetic removals",
            s.properties_deleted,
            s.occupants_reparented,
            s.occupants_deduped,
            s.synthetic_occupants_removed,
        );
        eprintln!(
            "planned: {} assignment re-parents, {} assignment dedups, {} absentee corrections",
            s.assignments_reparented, s.assignments_deduped, s.absentee_corrections,
        );
        if !s.orphans.occupants.is_empty() || !s.orphans.assignments.is_empty() {
            eprintln!(
                "orphans (reported only): {} occupants, {} assignments",
                s.orphans.occupants.len(),
                s.orphans.assignments.len(),
            );
        }

        if let Some(ref exec) = self.execution {
            eprintln!(
                "executed: {}/{} succeeded, {} already gone, {} skipped",
                exec.succeeded,
                exec.attempted,
                exec.already_gone,
                exec.skipped.len(),
            );
        }

        if let Some(ref verification) = self.verification {
            if verification.violations.is_empty() {
                eprintln!("verification: clean ({} round(s))", verification.rounds_used);
            } else {
                eprintln!(
                    "verification: {} violation(s) after {} round(s):",
                    verification.violations.len(),
                    verification.rounds_used,
                );
                for violation in &verification.violations {
                    eprintln!("  {violation}");
                }
            }
        }
    }
}
