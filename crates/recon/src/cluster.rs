//! Duplicate-cluster detection.

use std::collections::BTreeMap;

use crate::canonical::{canonical_key, CanonicalKey};
use crate::model::Property;

/// Transient grouping of property records sharing a canonical key.
/// Never persisted. Members are ordered by (created_at, id).
#[derive(Debug)]
pub struct DuplicateCluster<'a> {
    pub key: CanonicalKey,
    pub members: Vec<&'a Property>,
}

/// Cluster statistics over a full property set, duplicates or not.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ClusterStats {
    pub total_properties: usize,
    pub unique_keys: usize,
    pub blank_street_singletons: usize,
    pub duplicate_clusters: usize,
    pub duplicate_records: usize,
}

/// Group properties by canonical key and return the clusters holding more
/// than one record. Singleton keys (including every blank-street record)
/// pass through untouched. Output order is deterministic: clusters sorted
/// by key, members by (created_at, id).
pub fn detect_clusters(properties: &[Property]) -> (Vec<DuplicateCluster<'_>>, ClusterStats) {
    let mut by_key: BTreeMap<CanonicalKey, Vec<&Property>> = BTreeMap::new();
    let mut stats = ClusterStats {
        total_properties: properties.len(),
        ..ClusterStats::default()
    };

    for property in properties {
        match canonical_key(property) {
            Some(key) => by_key.entry(key).or_default().push(property),
            None => stats.blank_street_singletons += 1,
        }
    }

    stats.unique_keys = by_key.len() + stats.blank_street_singletons;

    let mut clusters = Vec::new();
    for (key, mut members) in by_key {
        if members.len() < 2 {
            continue;
        }
        members.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        stats.duplicate_clusters += 1;
        stats.duplicate_records += members.len() - 1;
        clusters.push(DuplicateCluster { key, members });
    }

    (clusters, stats)
}
