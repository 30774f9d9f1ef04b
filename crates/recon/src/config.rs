use serde::Deserialize;

use crate::error::ReconError;
use crate::synthetic::DenyList;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub store: StoreConfig,
    pub deny_list: DenyListConfig,
    pub verify: VerifyConfig,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            deny_list: DenyListConfig::default(),
            verify: VerifyConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the store API. Overridable by flag and env var.
    pub base_url: Option<String>,
    /// Records per list page.
    pub page_size: u32,
    /// Worker threads for the mutation phase.
    pub concurrency: usize,
    /// Retries per failed store operation before it is skipped.
    pub retry_budget: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { base_url: None, page_size: 1000, concurrency: 8, retry_budget: 1 }
    }
}

// ---------------------------------------------------------------------------
// Deny-list
// ---------------------------------------------------------------------------

/// Synthetic-occupant deny-list. The defaults cover the placeholder people
/// and provenance markers the imports are known to have left behind; the
/// version is bumped whenever an entry is added so reports stay comparable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DenyListConfig {
    pub version: u32,
    pub exact: Vec<String>,
    pub markers: Vec<String>,
}

impl Default for DenyListConfig {
    fn default() -> Self {
        Self {
            version: 1,
            exact: vec![
                "jane doe".into(),
                "john doe".into(),
                "bob smith".into(),
                "alice smith".into(),
                "test person".into(),
            ],
            markers: vec![
                "test".into(),
                "manual".into(),
                "debug".into(),
                "sample".into(),
                "fake".into(),
                "demo".into(),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Re-read attempts before violations are considered real rather than
    /// read-after-write lag.
    pub rounds: u32,
    /// Initial backoff between rounds, doubled each round.
    pub backoff_ms: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self { rounds: 5, backoff_ms: 500 }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconcileConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconcileConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.store.page_size == 0 {
            return Err(ReconError::ConfigValidation("store.page_size must be positive".into()));
        }
        if self.store.concurrency == 0 {
            return Err(ReconError::ConfigValidation("store.concurrency must be positive".into()));
        }
        if self.verify.rounds == 0 {
            return Err(ReconError::ConfigValidation("verify.rounds must be positive".into()));
        }

        // A blank deny-list entry would match every occupant.
        if self.deny_list.exact.iter().any(|e| e.trim().is_empty()) {
            return Err(ReconError::ConfigValidation("deny_list.exact contains a blank entry".into()));
        }
        if self.deny_list.markers.iter().any(|m| m.trim().is_empty()) {
            return Err(ReconError::ConfigValidation(
                "deny_list.markers contains a blank entry".into(),
            ));
        }

        Ok(())
    }

    /// Build the matcher from the configured entries.
    pub fn deny_list(&self) -> DenyList {
        DenyList::new(self.deny_list.version, &self.deny_list.exact, &self.deny_list.markers)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
