//! Cursor pagination over store collections.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::client::{Entity, StoreClient, StoreError};

/// One page of a listing.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Fetch a complete collection, following `next_token` until the store
/// returns null.
///
/// Two defenses against a misbehaving cursor: a token identical to the
/// one just used means the listing is stuck, and a hard page cap bounds
/// the loop even if the store hands out fresh tokens forever.
pub fn fetch_all<T: DeserializeOwned>(
    client: &StoreClient,
    entity: Entity,
    page_size: u32,
) -> Result<Vec<T>, StoreError> {
    const MAX_PAGES: u32 = 10_000;

    let mut records = Vec::new();
    let mut token: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let page: Page<T> = client.list_page(entity, page_size, token.as_deref())?;
        records.extend(page.data);

        match page.next_token {
            None => return Ok(records),
            Some(next) => {
                if token.as_deref() == Some(next.as_str()) {
                    return Err(StoreError::Pagination(format!(
                        "{entity} listing returned the same token twice: {next}"
                    )));
                }
                token = Some(next);
            }
        }
    }

    Err(StoreError::Pagination(format!(
        "{entity} listing did not terminate within {MAX_PAGES} pages"
    )))
}
