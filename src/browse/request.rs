//! Browse requests.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::browse::deadline::CancellationToken;
use crate::browse::map_reduce::MapReduceAggregator;
use crate::engine::Query;
use crate::error::{DrilldownError, Result};
use crate::facet::FacetSpec;
use crate::scoring::{FacetTermScoringFunctionFactory, MultiplicativeScoringFactory};
use crate::sort::SortField;

/// How the selected values of one field combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueOperation {
    /// A document passes when it has any selected value.
    #[default]
    Or,
    /// A document passes when it has every selected value.
    And,
}

/// A filter on the values of one facet field.
///
/// A document passes iff (`values` is empty or the document matches
/// `values` under `operation`) and it carries none of `not_values`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BrowseSelection {
    /// Facet handler name.
    pub field: String,
    /// Selected values.
    #[serde(default)]
    pub values: Vec<String>,
    /// Excluded values.
    #[serde(default)]
    pub not_values: Vec<String>,
    /// Combination of `values`.
    #[serde(default)]
    pub operation: ValueOperation,
}

impl BrowseSelection {
    /// Create an empty selection on `field`.
    pub fn new<S: Into<String>>(field: S) -> Self {
        BrowseSelection {
            field: field.into(),
            ..Default::default()
        }
    }

    /// Select a value.
    pub fn with_value<S: Into<String>>(mut self, value: S) -> Self {
        self.values.push(value.into());
        self
    }

    /// Exclude a value.
    pub fn with_not_value<S: Into<String>>(mut self, value: S) -> Self {
        self.not_values.push(value.into());
        self
    }

    /// Set the value combination.
    pub fn with_operation(mut self, operation: ValueOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Whether the selection constrains nothing.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.not_values.is_empty()
    }
}

/// Facet-weighted rescoring of hits.
#[derive(Clone)]
pub struct FacetBoost {
    /// Facet handler whose values carry weights.
    pub field: String,
    /// Weight per display value.
    pub weights: BTreeMap<String, f32>,
    /// How weights combine with the base score.
    pub factory: Arc<dyn FacetTermScoringFunctionFactory>,
}

impl FacetBoost {
    /// Boost `field` values with the default multiplicative policy.
    pub fn new<S: Into<String>>(field: S, weights: BTreeMap<String, f32>) -> Self {
        FacetBoost {
            field: field.into(),
            weights,
            factory: Arc::new(MultiplicativeScoringFactory),
        }
    }

    /// Use another scoring policy.
    pub fn with_factory(mut self, factory: Arc<dyn FacetTermScoringFunctionFactory>) -> Self {
        self.factory = factory;
        self
    }
}

impl fmt::Debug for FacetBoost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacetBoost")
            .field("field", &self.field)
            .field("weights", &self.weights)
            .field("factory", &self.factory)
            .finish()
    }
}

/// Shared handle to a side aggregate.
pub type SharedAggregator = Arc<Mutex<dyn MapReduceAggregator>>;

/// A search plus drill-down request.
#[derive(Clone, Default)]
pub struct BrowseRequest {
    /// Engine query; `None` browses every document.
    pub query: Option<Box<dyn Query>>,
    /// Facets to count, by handler name.
    pub facet_specs: BTreeMap<String, FacetSpec>,
    /// Selections, by handler name.
    pub selections: BTreeMap<String, BrowseSelection>,
    /// Sort order; empty means relevance.
    pub sort: Vec<SortField>,
    /// Index of the first hit to return.
    pub offset: i64,
    /// Number of hits to return.
    pub count: i64,
    /// Group-by handler names.
    pub group_by: Vec<String>,
    /// Hits kept per group; 0 is treated as 1.
    pub max_per_group: usize,
    /// Attach score explanations to hits.
    pub explain: bool,
    /// Attach stored fields to hits.
    pub fetch_stored_fields: bool,
    /// Facet-weighted rescoring.
    pub facet_boost: Option<FacetBoost>,
    /// Side aggregate run over every accepted hit.
    pub map_reduce: Option<SharedAggregator>,
    /// Cooperative cancellation.
    pub cancellation: Option<CancellationToken>,
    /// Time budget per browse call.
    pub timeout: Option<Duration>,
    /// Trace identifier echoed into the result.
    pub tid: Option<String>,
}

impl BrowseRequest {
    /// Create a request returning the first `count` hits.
    pub fn new(count: i64) -> Self {
        BrowseRequest {
            count,
            ..Default::default()
        }
    }

    /// Set the engine query.
    pub fn with_query(mut self, query: Box<dyn Query>) -> Self {
        self.query = Some(query);
        self
    }

    /// Count a facet.
    pub fn with_facet_spec<S: Into<String>>(mut self, field: S, spec: FacetSpec) -> Self {
        self.facet_specs.insert(field.into(), spec);
        self
    }

    /// Add a selection, replacing any previous one on the same field.
    pub fn with_selection(mut self, selection: BrowseSelection) -> Self {
        self.selections.insert(selection.field.clone(), selection);
        self
    }

    /// Append a sort field.
    pub fn with_sort(mut self, field: SortField) -> Self {
        self.sort.push(field);
        self
    }

    /// Set paging.
    pub fn with_paging(mut self, offset: i64, count: i64) -> Self {
        self.offset = offset;
        self.count = count;
        self
    }

    /// Group hits.
    pub fn with_group_by<S: Into<String>>(mut self, field: S, max_per_group: usize) -> Self {
        self.group_by.push(field.into());
        self.max_per_group = max_per_group;
        self
    }

    /// Attach explanations.
    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    /// Rescore hits by facet weights.
    pub fn with_facet_boost(mut self, boost: FacetBoost) -> Self {
        self.facet_boost = Some(boost);
        self
    }

    /// Run a side aggregate.
    pub fn with_map_reduce(mut self, aggregator: SharedAggregator) -> Self {
        self.map_reduce = Some(aggregator);
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set a time budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the trace identifier.
    pub fn with_tid<S: Into<String>>(mut self, tid: S) -> Self {
        self.tid = Some(tid.into());
        self
    }

    /// Validated `(offset, count)`.
    pub fn paging(&self) -> Result<(usize, usize)> {
        if self.offset < 0 {
            return Err(DrilldownError::invalid_argument(format!(
                "offset must be >= 0, got {}",
                self.offset
            )));
        }
        if self.count < 0 {
            return Err(DrilldownError::invalid_argument(format!(
                "count must be >= 0, got {}",
                self.count
            )));
        }
        let to_usize = |v: i64| usize::try_from(v).unwrap_or(usize::MAX);
        Ok((to_usize(self.offset), to_usize(self.count)))
    }
}

impl fmt::Debug for BrowseRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowseRequest")
            .field("query", &self.query.as_ref().map(|q| q.description()))
            .field("facet_specs", &self.facet_specs)
            .field("selections", &self.selections)
            .field("sort", &self.sort)
            .field("offset", &self.offset)
            .field("count", &self.count)
            .field("group_by", &self.group_by)
            .field("max_per_group", &self.max_per_group)
            .field("explain", &self.explain)
            .field("facet_boost", &self.facet_boost)
            .field("map_reduce", &self.map_reduce.is_some())
            .field("timeout", &self.timeout)
            .field("tid", &self.tid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_validation() {
        assert_eq!(BrowseRequest::new(10).with_paging(5, 10).paging().unwrap(), (5, 10));
        assert!(matches!(
            BrowseRequest::new(10).with_paging(-1, 10).paging(),
            Err(DrilldownError::InvalidArgument(_))
        ));
        assert!(matches!(
            BrowseRequest::new(-3).paging(),
            Err(DrilldownError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_selection_builder() {
        let selection = BrowseSelection::new("color")
            .with_value("red")
            .with_not_value("blue")
            .with_operation(ValueOperation::And);
        assert_eq!(selection.values, vec!["red"]);
        assert_eq!(selection.not_values, vec!["blue"]);
        assert!(!selection.is_empty());
        assert!(BrowseSelection::new("color").is_empty());
    }

    #[test]
    fn test_selection_replaces_same_field() {
        let request = BrowseRequest::new(10)
            .with_selection(BrowseSelection::new("color").with_value("red"))
            .with_selection(BrowseSelection::new("color").with_value("blue"));
        assert_eq!(request.selections["color"].values, vec!["blue"]);
    }
}
