//! Address canonicalization.
//!
//! Two property records cluster together iff a canvasser would treat them
//! as the same door. The key is derived from unit + street + city (+ state
//! where present), case-folded and whitespace-normalized.

use std::fmt;

use serde::Serialize;

use crate::model::Property;

/// Normalized cluster key. Ordered so cluster iteration is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim, case-fold, and collapse inner whitespace.
pub fn squash(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Canonical key for a property, or `None` when the street is blank.
///
/// A blank street must never cluster with anything (each such record is
/// its own singleton), so incomplete imports are not merged together.
/// The unit designator is prepended only when it differs from the street
/// itself; some imports copied the street into the unit field.
pub fn canonical_key(property: &Property) -> Option<CanonicalKey> {
    let street = squash(&property.street);
    if street.is_empty() {
        return None;
    }

    let mut key = String::new();
    if let Some(ref unit) = property.unit_number {
        let unit = squash(unit);
        if !unit.is_empty() && unit != street {
            key.push_str(&unit);
            key.push(' ');
        }
    }
    key.push_str(&street);

    let city = squash(&property.city);
    if !city.is_empty() {
        key.push_str(", ");
        key.push_str(&city);
    }
    if let Some(ref state) = property.state {
        let state = squash(state);
        if !state.is_empty() {
            key.push_str(", ");
            key.push_str(&state);
        }
    }

    Some(CanonicalKey(key))
}
