// Porchlight CLI - canvassing-data reconciliation against the campaign store

mod context;
mod executor;
mod exit_codes;
mod report;
mod snapshot;

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use porchlight_recon::cluster::detect_clusters;
use porchlight_recon::engine::build_plan;
use porchlight_recon::model::{Occupant, Property};
use porchlight_recon::plan::ReconcilePlan;
use porchlight_recon::{absentee, synthetic, verify, ReconcileConfig};
use porchlight_store::{Entity, StoreClient};

use exit_codes::{EXIT_ERROR, EXIT_RECON_PARTIAL, EXIT_RECON_VIOLATIONS, EXIT_SUCCESS};
use report::{RunMeta, RunReport, VerificationReport};

#[derive(Parser)]
#[command(name = "porchlight")]
#[command(about = "Canvassing-data maintenance: dedup, scrub, verify")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every command that talks to the store.
#[derive(Args)]
struct StoreOpts {
    /// Config file (porchlight.toml in the working directory by default)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Store API base URL (overrides PORCHLIGHT_STORE_URL and the config)
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Store API key (overrides PORCHLIGHT_API_KEY)
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,

    /// Suppress warnings and the human-readable summary
    #[arg(long, short = 'q')]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile duplicate records in the store
    Reconcile {
        #[command(subcommand)]
        command: ReconcileCommands,
    },

    /// Read-only duplicate-cluster analysis; mutates nothing
    Analyze {
        #[command(flatten)]
        store: StoreOpts,

        /// Emit the analysis as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Check dataset invariants against the live store (read-only)
    Verify {
        #[command(flatten)]
        store: StoreOpts,

        /// Emit violations as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Report properties whose absentee flag disagrees with the mailing address
    Absentee {
        #[command(flatten)]
        store: StoreOpts,

        /// Write the corrected flags back to the store
        #[arg(long)]
        fix: bool,

        /// Emit the report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Remove occupants matching the synthetic-data deny-list
    Scrub {
        #[command(flatten)]
        store: StoreOpts,

        /// Plan only; list matches without deleting
        #[arg(long)]
        dry_run: bool,

        /// Emit the matches as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ReconcileCommands {
    /// Full pipeline: snapshot, plan, execute, verify
    #[command(after_help = "\
Examples:
  porchlight reconcile run --dry-run
  porchlight reconcile run --json --output report.json
  porchlight reconcile run --base-url https://store.example.org --skip-verify")]
    Run {
        #[command(flatten)]
        store: StoreOpts,

        /// Plan and report without mutating the store
        #[arg(long)]
        dry_run: bool,

        /// Emit the full run report as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Write the JSON report to a file instead of stdout
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,

        /// Skip the post-run consistency verification
        #[arg(long)]
        skip_verify: bool,
    },

    /// Parse and validate the config file, then exit
    Validate {
        /// Config file (porchlight.toml in the working directory by default)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Reconcile { command } => match command {
            ReconcileCommands::Run { store, dry_run, json, output, skip_verify } => {
                cmd_reconcile_run(store, dry_run, json, output, skip_verify)
            }
            ReconcileCommands::Validate { config } => cmd_reconcile_validate(config),
        },
        Commands::Analyze { store, json } => cmd_analyze(store, json),
        Commands::Verify { store, json } => cmd_verify(store, json),
        Commands::Absentee { store, fix, json } => cmd_absentee(store, fix, json),
        Commands::Scrub { store, dry_run, json } => cmd_scrub(store, dry_run, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

/// Resolved config + client for one command invocation.
struct Session {
    config: ReconcileConfig,
    client: StoreClient,
}

fn open_session(store: &mut StoreOpts) -> Result<Session, CliError> {
    let config = context::load_config(store.config.as_deref())?;
    let client = context::store_client(store.base_url.take(), store.api_key.take(), &config)?;
    Ok(Session { config, client })
}

// ============================================================================
// reconcile run
// ============================================================================

fn cmd_reconcile_run(
    mut store: StoreOpts,
    dry_run: bool,
    json: bool,
    output: Option<PathBuf>,
    skip_verify: bool,
) -> Result<(), CliError> {
    let session = open_session(&mut store)?;
    let quiet = store.quiet;

    // Progress chatter only when a person is watching.
    if !quiet && atty::is(atty::Stream::Stderr) {
        eprintln!("fetching snapshot...");
    }
    let snap = snapshot::fetch_snapshot(&session.client, session.config.store.page_size, quiet)?;
    let plan = build_plan(&snap, &session.config);

    let execution = if dry_run {
        None
    } else {
        Some(executor::execute(
            &session.client,
            &plan,
            session.config.store.concurrency,
            session.config.store.retry_budget,
            quiet,
        ))
    };

    let verification = if dry_run || skip_verify {
        None
    } else {
        Some(verify_with_backoff(&session.client, &session.config, quiet)?)
    };

    let report = RunReport {
        meta: RunMeta::new(dry_run),
        summary: plan.summary.clone(),
        execution,
        verification,
    };
    report.emit(json, output.as_deref(), quiet)?;

    if let Some(ref verification) = report.verification {
        if !verification.violations.is_empty() {
            return Err(CliError {
                code: EXIT_RECON_VIOLATIONS,
                message: format!(
                    "{} invariant violation(s) remain; re-run to converge",
                    verification.violations.len()
                ),
                hint: None,
            });
        }
    }
    if let Some(ref execution) = report.execution {
        if !execution.is_complete() {
            return Err(CliError {
                code: EXIT_RECON_PARTIAL,
                message: format!(
                    "{} operation(s) skipped after retries; re-run to finish",
                    execution.skipped.len()
                ),
                hint: None,
            });
        }
    }

    Ok(())
}

fn cmd_reconcile_validate(config: Option<PathBuf>) -> Result<(), CliError> {
    let config = context::load_config(config.as_deref())?;
    println!(
        "config OK: deny-list v{} ({} exact, {} markers), page size {}, concurrency {}",
        config.deny_list.version,
        config.deny_list.exact.len(),
        config.deny_list.markers.len(),
        config.store.page_size,
        config.store.concurrency,
    );
    Ok(())
}

// ============================================================================
// analyze
// ============================================================================

#[derive(Debug, Serialize)]
struct AnalyzeReport {
    stats: porchlight_recon::cluster::ClusterStats,
    clusters: Vec<ClusterDetail>,
    orphans: porchlight_recon::model::Orphans,
}

#[derive(Debug, Serialize)]
struct ClusterDetail {
    key: String,
    member_ids: Vec<String>,
}

fn cmd_analyze(mut store: StoreOpts, json: bool) -> Result<(), CliError> {
    let session = open_session(&mut store)?;
    let snap = snapshot::fetch_snapshot(&session.client, session.config.store.page_size, store.quiet)?;

    let (clusters, stats) = detect_clusters(&snap.properties);
    let report = AnalyzeReport {
        stats,
        clusters: clusters
            .iter()
            .map(|c| ClusterDetail {
                key: c.key.to_string(),
                member_ids: c.members.iter().map(|m| m.id.clone()).collect(),
            })
            .collect(),
        orphans: snap.orphans(),
    };

    if json {
        print_json(&report)?;
    } else {
        println!(
            "{} properties, {} unique addresses, {} duplicate clusters ({} extra records)",
            report.stats.total_properties,
            report.stats.unique_keys,
            report.stats.duplicate_clusters,
            report.stats.duplicate_records,
        );
        for cluster in &report.clusters {
            println!("  {}: {}", cluster.key, cluster.member_ids.join(", "));
        }
        if !report.orphans.occupants.is_empty() || !report.orphans.assignments.is_empty() {
            println!(
                "orphans: {} occupants, {} assignments",
                report.orphans.occupants.len(),
                report.orphans.assignments.len(),
            );
        }
    }

    Ok(())
}

// ============================================================================
// verify
// ============================================================================

fn cmd_verify(mut store: StoreOpts, json: bool) -> Result<(), CliError> {
    let session = open_session(&mut store)?;
    let verification = verify_with_backoff(&session.client, &session.config, store.quiet)?;

    if json {
        print_json(&verification)?;
    } else if verification.violations.is_empty() {
        println!("verification: clean ({} round(s))", verification.rounds_used);
    } else {
        for violation in &verification.violations {
            println!("{violation}");
        }
    }

    if verification.violations.is_empty() {
        Ok(())
    } else {
        Err(CliError {
            code: EXIT_RECON_VIOLATIONS,
            message: format!("{} invariant violation(s)", verification.violations.len()),
            hint: Some("run `porchlight reconcile run` to repair".to_string()),
        })
    }
}

/// Re-read and re-check until the violations settle.
///
/// The store is eventually consistent, so fresh violations right after a
/// write wave are often just read lag. Each round re-fetches the snapshot;
/// the backoff doubles between rounds.
fn verify_with_backoff(
    client: &StoreClient,
    config: &ReconcileConfig,
    quiet: bool,
) -> Result<VerificationReport, CliError> {
    let rounds = config.verify.rounds;
    let mut backoff = Duration::from_millis(config.verify.backoff_ms);
    let mut violations = Vec::new();

    for round in 1..=rounds {
        let snap = snapshot::fetch_snapshot(client, config.store.page_size, quiet)?;
        violations = verify::check(&snap);
        if violations.is_empty() {
            return Ok(VerificationReport { rounds_used: round, violations });
        }
        if round < rounds {
            if !quiet {
                eprintln!(
                    "warning: {} violation(s), re-reading in {}ms (round {round}/{rounds})",
                    violations.len(),
                    backoff.as_millis(),
                );
            }
            thread::sleep(backoff);
            backoff *= 2;
        }
    }

    Ok(VerificationReport { rounds_used: rounds, violations })
}

// ============================================================================
// absentee
// ============================================================================

#[derive(Debug, Serialize)]
struct AbsenteeReport {
    total_properties: usize,
    corrections: Vec<AbsenteeCorrection>,
    fixed: bool,
}

#[derive(Debug, Serialize)]
struct AbsenteeCorrection {
    property_id: String,
    street: String,
    mailing_street: Option<String>,
    absentee: bool,
}

fn cmd_absentee(mut store: StoreOpts, fix: bool, json: bool) -> Result<(), CliError> {
    let session = open_session(&mut store)?;
    let properties: Vec<Property> = snapshot::fetch_entity(
        &session.client,
        Entity::Properties,
        session.config.store.page_size,
        store.quiet,
    )?;

    let actions = absentee::classify(&properties);
    let corrections: Vec<AbsenteeCorrection> = actions
        .iter()
        .filter_map(|action| {
            let porchlight_recon::plan::Action::SetAbsentee { id, value } = action else {
                return None;
            };
            let property = properties.iter().find(|p| &p.id == id)?;
            Some(AbsenteeCorrection {
                property_id: id.clone(),
                street: property.street.clone(),
                mailing_street: property.mailing_street.clone(),
                absentee: *value,
            })
        })
        .collect();

    let mut skipped = 0;
    if fix && !actions.is_empty() {
        let plan = ReconcilePlan { merge_actions: actions, ..ReconcilePlan::default() };
        let stats = executor::execute(
            &session.client,
            &plan,
            session.config.store.concurrency,
            session.config.store.retry_budget,
            store.quiet,
        );
        skipped = stats.skipped.len();
    }

    let report =
        AbsenteeReport { total_properties: properties.len(), corrections, fixed: fix };
    if json {
        print_json(&report)?;
    } else {
        println!(
            "{} of {} properties have a stale absentee flag{}",
            report.corrections.len(),
            report.total_properties,
            if fix { " (fixed)" } else { "" },
        );
        for c in &report.corrections {
            println!(
                "  {}: {} / mailing {} -> absentee={}",
                c.property_id,
                c.street,
                c.mailing_street.as_deref().unwrap_or("-"),
                c.absentee,
            );
        }
    }

    if skipped > 0 {
        return Err(CliError {
            code: EXIT_RECON_PARTIAL,
            message: format!("{skipped} correction(s) skipped after retries"),
            hint: None,
        });
    }
    Ok(())
}

// ============================================================================
// scrub
// ============================================================================

#[derive(Debug, Serialize)]
struct ScrubReport {
    deny_list_version: u32,
    matches: Vec<ScrubMatch>,
    deleted: bool,
}

#[derive(Debug, Serialize)]
struct ScrubMatch {
    occupant_id: String,
    property_id: String,
    full_name: String,
}

fn cmd_scrub(mut store: StoreOpts, dry_run: bool, json: bool) -> Result<(), CliError> {
    let session = open_session(&mut store)?;
    let occupants: Vec<Occupant> = snapshot::fetch_entity(
        &session.client,
        Entity::Occupants,
        session.config.store.page_size,
        store.quiet,
    )?;

    let deny_list = session.config.deny_list();
    let actions = synthetic::scrub(&occupants, &deny_list);
    let matches: Vec<ScrubMatch> = occupants
        .iter()
        .filter(|occ| deny_list.matches(&occ.folded_full_name()).is_some())
        .map(|occ| ScrubMatch {
            occupant_id: occ.id.clone(),
            property_id: occ.property_id.clone(),
            full_name: occ.folded_full_name(),
        })
        .collect();

    let mut skipped = 0;
    if !dry_run && !actions.is_empty() {
        let plan = ReconcilePlan { merge_actions: actions, ..ReconcilePlan::default() };
        let stats = executor::execute(
            &session.client,
            &plan,
            session.config.store.concurrency,
            session.config.store.retry_budget,
            store.quiet,
        );
        skipped = stats.skipped.len();
    }

    let report = ScrubReport {
        deny_list_version: deny_list.version(),
        matches,
        deleted: !dry_run,
    };
    if json {
        print_json(&report)?;
    } else {
        println!(
            "{} synthetic occupant(s) matched deny-list v{}{}",
            report.matches.len(),
            report.deny_list_version,
            if dry_run { " (dry run)" } else { " (deleted)" },
        );
        for m in &report.matches {
            println!("  {} on {}: {}", m.occupant_id, m.property_id, m.full_name);
        }
    }

    if skipped > 0 {
        return Err(CliError {
            code: EXIT_RECON_PARTIAL,
            message: format!("{skipped} deletion(s) skipped after retries"),
            hint: None,
        });
    }
    Ok(())
}

// ============================================================================
// helpers
// ============================================================================

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    let body = serde_json::to_string_pretty(value).map_err(|e| CliError {
        code: EXIT_ERROR,
        message: format!("cannot serialize output: {e}"),
        hint: None,
    })?;
    println!("{body}");
    Ok(())
}
