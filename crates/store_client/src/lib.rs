//! Canvassing store HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required).
//! Covers the four entity collections behind the store API: list with
//! cursor pagination, get, create, update, delete. Retry and error
//! classification live here so callers only see [`StoreError`].

mod client;
mod paginate;

pub use client::{Entity, StoreClient, StoreError, MAX_RETRIES};
pub use paginate::{fetch_all, Page};
