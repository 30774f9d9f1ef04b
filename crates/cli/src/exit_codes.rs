//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract — scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 10-19   | store            | Remote store access codes                |
//! | 20-29   | recon            | Reconciliation pipeline codes            |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use porchlight_store::StoreError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Store (10-19) — remote store access
// =============================================================================

/// No API key provided (neither flag nor env var).
pub const EXIT_STORE_NOT_AUTH: u8 = 10;

/// Token rejected by the store (401/403).
pub const EXIT_STORE_AUTH: u8 = 11;

/// Request rejected by the store (400).
pub const EXIT_STORE_VALIDATION: u8 = 12;

/// Rate limited after retries (429).
pub const EXIT_STORE_RATE_LIMIT: u8 = 13;

/// Store error (5xx), network failure, or broken pagination after retries.
pub const EXIT_STORE_UPSTREAM: u8 = 14;

// =============================================================================
// Recon (20-29) — reconciliation pipeline
// =============================================================================

/// Config file malformed or failed validation. Fatal before any mutation.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 20;

/// Snapshot fetch failed; nothing was planned or mutated.
pub const EXIT_RECON_SNAPSHOT: u8 = 21;

/// Verifier found invariant violations after the backoff rounds.
/// The dataset needs a re-run.
pub const EXIT_RECON_VIOLATIONS: u8 = 22;

/// Some planned operations were skipped after exhausting their retry
/// budget. The pass is incomplete but safe to re-run.
pub const EXIT_RECON_PARTIAL: u8 = 23;

/// Map a StoreError to its exit code.
pub fn store_exit_code(err: &StoreError) -> u8 {
    match err {
        StoreError::Auth(..) => EXIT_STORE_AUTH,
        StoreError::Validation(_) => EXIT_STORE_VALIDATION,
        StoreError::RateLimited(_) => EXIT_STORE_RATE_LIMIT,
        StoreError::Network(_)
        | StoreError::Http(..)
        | StoreError::Parse(_)
        | StoreError::Pagination(_)
        | StoreError::NotFound => EXIT_STORE_UPSTREAM,
    }
}
