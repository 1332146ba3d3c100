//! Browse results.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::Explanation;
use crate::facet::accessible::{BrowseFacet, FacetAccessible, FacetCounts};

/// One hit of a browse result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseHit {
    /// Global document id.
    pub doc_id: u64,
    /// Partition the document lives in.
    pub partition: usize,
    /// Partition-local document id.
    pub local_doc_id: u32,
    /// Score, after facet boosting.
    pub score: f32,
    /// Facet values of the document, by handler name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_values: BTreeMap<String, Vec<String>>,
    /// Stored fields, when requested.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stored_fields: BTreeMap<String, Vec<String>>,
    /// Values of each group-by field, when grouping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_value: Option<Vec<Vec<String>>>,
    /// Total matches of the hit's group.
    #[serde(default)]
    pub group_hit_count: u64,
    /// Score explanation, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
}

/// Result of a browse call.
#[derive(Debug, Clone, Default)]
pub struct BrowseResult {
    /// Hits of the requested page.
    pub hits: Vec<BrowseHit>,
    /// Number of matching documents across partitions.
    pub total_hits: u64,
    /// Number of distinct groups, zero without grouping.
    pub total_groups: u64,
    /// Documents across partitions.
    pub total_docs: u64,
    /// Merged facet counts, by handler name.
    pub facets: BTreeMap<String, FacetCounts>,
    /// Counts of each group-by field over the matching documents, largest
    /// group first.
    pub group_facets: BTreeMap<String, FacetCounts>,
    /// Wall time of the call.
    pub elapsed: Duration,
    /// Non-fatal problems.
    pub errors: Vec<String>,
    /// Side aggregate result.
    pub map_reduce_result: Option<Value>,
    /// Trace identifier of the request.
    pub tid: Option<String>,
}

impl BrowseResult {
    /// Merged counts of one facet.
    pub fn facet_map(&self, name: &str) -> Option<&dyn FacetAccessible> {
        self.facets.get(name).map(|f| f as &dyn FacetAccessible)
    }

    /// Values of one facet as shaped by its facet spec.
    pub fn facet_values(&self, name: &str) -> Vec<BrowseFacet> {
        self.facet_map(name).map(|f| f.facets()).unwrap_or_default()
    }

    /// Groups of one group-by field with their match counts.
    pub fn group_values(&self, name: &str) -> Vec<BrowseFacet> {
        self.group_facets
            .get(name)
            .map(|f| f.facets())
            .unwrap_or_default()
    }

    /// Global ids of the hits.
    pub fn doc_ids(&self) -> Vec<u64> {
        self.hits.iter().map(|h| h.doc_id).collect()
    }

    /// Whether any non-fatal problem was recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// JSON view of the result.
    pub fn to_json(&self) -> Value {
        let shaped = |facets: &BTreeMap<String, FacetCounts>| -> BTreeMap<String, Vec<BrowseFacet>> {
            facets
                .iter()
                .map(|(name, counts)| (name.clone(), counts.facets()))
                .collect()
        };
        serde_json::json!({
            "tid": self.tid,
            "total_hits": self.total_hits,
            "total_groups": self.total_groups,
            "total_docs": self.total_docs,
            "elapsed_ms": self.elapsed.as_secs_f64() * 1000.0,
            "hits": self.hits,
            "facets": shaped(&self.facets),
            "group_facets": shaped(&self.group_facets),
            "errors": self.errors,
            "map_reduce": self.map_reduce_result,
        })
    }
}
