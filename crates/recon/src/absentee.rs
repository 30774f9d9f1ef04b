//! Absentee-owner classification.

use crate::model::Property;
use crate::plan::Action;

/// A property is absentee-owned iff a mailing street is present, non-blank
/// after trimming, and differs from the property street. The comparison is
/// case-sensitive and exact: an identical mailing address means the owner
/// lives there and filed the duplicate anyway.
pub fn is_absentee(property: &Property) -> bool {
    let Some(ref mailing) = property.mailing_street else { return false };
    let mailing = mailing.trim();
    !mailing.is_empty() && mailing != property.street.trim()
}

/// Emit a correction for every property whose persisted flag disagrees
/// with the derived value. Input order is preserved.
pub fn classify(properties: &[Property]) -> Vec<Action> {
    properties
        .iter()
        .filter_map(|p| {
            let derived = is_absentee(p);
            (derived != p.absentee_owner)
                .then(|| Action::SetAbsentee { id: p.id.clone(), value: derived })
        })
        .collect()
}
