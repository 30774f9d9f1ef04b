//! Config loading and credential resolution.
//!
//! Resolution order, for both the key and the base URL: flag > env var >
//! config file. Config errors are fatal before any store traffic.

use std::path::{Path, PathBuf};

use porchlight_recon::ReconcileConfig;
use porchlight_store::StoreClient;

use crate::exit_codes;
use crate::CliError;

pub const API_KEY_ENV: &str = "PORCHLIGHT_API_KEY";
pub const BASE_URL_ENV: &str = "PORCHLIGHT_STORE_URL";
const DEFAULT_CONFIG_FILE: &str = "porchlight.toml";

/// Load the reconcile config.
///
/// An explicit `--config` path must exist; without one, `porchlight.toml`
/// in the working directory is used when present, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<ReconcileConfig, CliError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(ReconcileConfig::default());
            }
            default
        }
    };

    let input = std::fs::read_to_string(&path).map_err(|e| CliError {
        code: exit_codes::EXIT_USAGE,
        message: format!("cannot read {}: {e}", path.display()),
        hint: None,
    })?;

    ReconcileConfig::from_toml(&input).map_err(|e| CliError {
        code: exit_codes::EXIT_RECON_INVALID_CONFIG,
        message: format!("{}: {e}", path.display()),
        hint: None,
    })
}

pub fn resolve_api_key(flag: Option<String>) -> Result<String, CliError> {
    if let Some(key) = flag {
        let trimmed = key.trim().to_string();
        if !trimmed.is_empty() {
            return Ok(trimmed);
        }
    } else if let Ok(key) = std::env::var(API_KEY_ENV) {
        let trimmed = key.trim().to_string();
        if !trimmed.is_empty() {
            return Ok(trimmed);
        }
    }

    Err(CliError {
        code: exit_codes::EXIT_STORE_NOT_AUTH,
        message: format!("missing store API key (use --api-key or set {API_KEY_ENV})"),
        hint: None,
    })
}

pub fn resolve_base_url(
    flag: Option<String>,
    config: &ReconcileConfig,
) -> Result<String, CliError> {
    if let Some(url) = flag {
        let trimmed = url.trim().to_string();
        if !trimmed.is_empty() {
            return Ok(trimmed);
        }
    } else if let Ok(url) = std::env::var(BASE_URL_ENV) {
        let trimmed = url.trim().to_string();
        if !trimmed.is_empty() {
            return Ok(trimmed);
        }
    } else if let Some(ref url) = config.store.base_url {
        return Ok(url.clone());
    }

    Err(CliError {
        code: exit_codes::EXIT_USAGE,
        message: format!(
            "missing store URL (use --base-url, set {BASE_URL_ENV}, or set store.base_url in {DEFAULT_CONFIG_FILE})"
        ),
        hint: None,
    })
}

/// Build the store client from resolved credentials.
pub fn store_client(
    base_url: Option<String>,
    api_key: Option<String>,
    config: &ReconcileConfig,
) -> Result<StoreClient, CliError> {
    let key = resolve_api_key(api_key)?;
    let url = resolve_base_url(base_url, config)?;
    Ok(StoreClient::new(&url, &key))
}
