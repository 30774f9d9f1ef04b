//! `porchlight-recon` — duplicate-record reconciliation engine.
//!
//! Pure engine crate: receives an immutable snapshot of store records,
//! returns a mutation plan plus a projected summary. No CLI or IO
//! dependencies.

pub mod absentee;
pub mod canonical;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod merge;
pub mod model;
pub mod plan;
pub mod report;
pub mod survivor;
pub mod synthetic;
pub mod verify;

pub use config::ReconcileConfig;
pub use engine::build_plan;
pub use error::ReconError;
pub use model::Snapshot;
pub use plan::{Action, ReconcilePlan};
pub use report::PlanSummary;
