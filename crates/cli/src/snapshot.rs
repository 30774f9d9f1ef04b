//! Snapshot assembly.
//!
//! Fetches every collection exhaustively and decodes record by record.
//! One malformed record is warned about and skipped; a collection where
//! nothing decodes means the store schema does not match and the run
//! stops before planning anything.

use porchlight_recon::model::{Assignment, Occupant, Property, Snapshot, Volunteer};
use porchlight_store::{fetch_all, Entity, StoreClient};

use crate::exit_codes::{self, store_exit_code};
use crate::CliError;

pub fn fetch_snapshot(
    client: &StoreClient,
    page_size: u32,
    quiet: bool,
) -> Result<Snapshot, CliError> {
    let properties: Vec<Property> = fetch_entity(client, Entity::Properties, page_size, quiet)?;
    let occupants: Vec<Occupant> = fetch_entity(client, Entity::Occupants, page_size, quiet)?;
    let assignments: Vec<Assignment> =
        fetch_entity(client, Entity::Assignments, page_size, quiet)?;
    let volunteers: Vec<Volunteer> = fetch_entity(client, Entity::Volunteers, page_size, quiet)?;

    Ok(Snapshot::new(properties, occupants, assignments, volunteers))
}

pub fn fetch_entity<T: serde::de::DeserializeOwned>(
    client: &StoreClient,
    entity: Entity,
    page_size: u32,
    quiet: bool,
) -> Result<Vec<T>, CliError> {
    let raw: Vec<serde_json::Value> =
        fetch_all(client, entity, page_size).map_err(|e| CliError {
            code: store_exit_code(&e),
            message: format!("fetching {entity}: {e}"),
            hint: None,
        })?;

    let total = raw.len();
    let mut records = Vec::with_capacity(total);
    for value in raw {
        let id = value.get("id").and_then(|v| v.as_str()).unwrap_or("<no id>").to_string();
        match serde_json::from_value(value) {
            Ok(record) => records.push(record),
            Err(e) => {
                if !quiet {
                    eprintln!("warning: skipping undecodable {entity} record {id}: {e}");
                }
            }
        }
    }

    if records.is_empty() && total > 0 {
        return Err(CliError {
            code: exit_codes::EXIT_RECON_SNAPSHOT,
            message: format!("no {entity} record decoded ({total} fetched); wrong store schema?"),
            hint: None,
        });
    }

    Ok(records)
}
