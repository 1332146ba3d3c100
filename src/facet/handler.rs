//! The facet handler trait.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;

use crate::browse::request::{BrowseSelection, ValueOperation};
use crate::dictionary::{RawValue, TermValues};
use crate::engine::{DocId, IndexReader};
use crate::error::Result;
use crate::facet::FacetSpec;
use crate::facet::accessible::FacetCounts;
use crate::facet::collector::{FacetCountCollector, OrdinalCountCollector};
use crate::facet::data::{FacetData, FacetDataMap, OrdinalSource, as_ordinal_source};
use crate::facet::filter::{AndFilter, DocFilter, EmptyFilter, NotFilter, OrdinalFilter};
use crate::sort::comparator::DocComparator;

/// Trait for facet handlers.
///
/// A handler is built once per field definition and shared by every
/// partition; it holds no per-partition state. `load` runs once per
/// partition and returns the data every other method is then given.
///
/// # Selection composition
///
/// A document passes a [`BrowseSelection`] iff (`values` is empty or the
/// document matches `values` under the selection's operation) and it carries
/// none of `not_values`.
pub trait FacetHandler: Send + Sync + Debug {
    /// Handler name, unique within a browser.
    fn name(&self) -> &str;

    /// Names of the handlers whose loaded data `load` reads.
    fn depends_on(&self) -> &BTreeSet<String>;

    /// Load partition data. `deps` holds the data of every dependency loaded
    /// before this handler; unregistered dependencies are simply missing.
    fn load(&self, reader: &dyn IndexReader, deps: &FacetDataMap) -> Result<Arc<FacetData>>;

    /// Display values of a local document.
    fn field_values(&self, data: &FacetData, doc: DocId) -> Result<Vec<String>>;

    /// Raw values of a local document.
    fn raw_field_values(&self, data: &FacetData, doc: DocId) -> Result<Vec<RawValue>>;

    /// Filter passing documents that match `values` under `operation`.
    fn value_filter<'a>(
        &self,
        data: &'a FacetData,
        values: &[String],
        operation: ValueOperation,
    ) -> Result<Box<dyn DocFilter + 'a>>;

    /// Filter for a selection, `None` when it constrains nothing.
    fn selection_filter<'a>(
        &self,
        data: &'a FacetData,
        selection: &BrowseSelection,
    ) -> Result<Option<Box<dyn DocFilter + 'a>>> {
        let mut filters: Vec<Box<dyn DocFilter + 'a>> = Vec::with_capacity(2);
        if !selection.values.is_empty() {
            filters.push(self.value_filter(data, &selection.values, selection.operation)?);
        }
        if !selection.not_values.is_empty() {
            let excluded = self.value_filter(data, &selection.not_values, ValueOperation::Or)?;
            filters.push(Box::new(NotFilter::new(excluded)));
        }
        Ok(match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Box::new(AndFilter::new(filters))),
        })
    }

    /// Counting structure for one browse in one partition.
    fn count_collector<'a>(
        &self,
        data: &'a FacetData,
        spec: &FacetSpec,
        selection: Option<&BrowseSelection>,
    ) -> Result<Box<dyn FacetCountCollector + 'a>>;

    /// Comparator ordering documents by this field.
    fn doc_comparator<'a>(&self, data: &'a FacetData) -> Result<Box<dyn DocComparator + 'a>>;

    /// Ordinal view of the data, when the handler stores ordinals.
    fn ordinal_source<'a>(&self, data: &'a FacetData) -> Option<&'a dyn OrdinalSource> {
        as_ordinal_source(data)
    }

    /// Merge per-partition counts of this field.
    fn merge(&self, spec: &FacetSpec, parts: Vec<FacetCounts>) -> Result<FacetCounts> {
        FacetCounts::merge(self.name(), spec.clone(), parts)
    }
}

/// Ordinals of the readable, present `values`.
pub(crate) fn ordinals_of(source: &dyn OrdinalSource, values: &[String]) -> Vec<Option<usize>> {
    let terms = source.term_values();
    values
        .iter()
        .map(|v| terms.ordinal_of(v).ok().flatten())
        .collect()
}

/// Value filter over ordinal data.
///
/// Values missing from the dictionary match nothing, so an `And` over a
/// missing value passes no document.
pub(crate) fn ordinal_value_filter<'a>(
    source: &'a dyn OrdinalSource,
    values: &[String],
    operation: ValueOperation,
) -> Box<dyn DocFilter + 'a> {
    let ordinals = ordinals_of(source, values);
    if operation == ValueOperation::And && ordinals.iter().any(Option::is_none) {
        return Box::new(EmptyFilter);
    }
    Box::new(OrdinalFilter::new(
        source,
        ordinals.into_iter().flatten(),
        operation,
    ))
}

/// Selected values of a selection in display form.
///
/// Values absent from this partition are formatted the way the list would
/// format them, so every partition reports a selected value under one
/// spelling. Values the list cannot read are dropped.
pub(crate) fn selected_display_values(
    source: &dyn OrdinalSource,
    selection: Option<&BrowseSelection>,
) -> BTreeSet<String> {
    let Some(selection) = selection else {
        return BTreeSet::new();
    };
    let terms = source.term_values();
    selection
        .values
        .iter()
        .zip(ordinals_of(source, &selection.values))
        .filter_map(|(value, ord)| match ord.and_then(|o| terms.value_at(o)) {
            Some(display) => Some(display),
            None => terms.display_form(value).ok(),
        })
        .collect()
}

/// Ordinal counting collector named after `handler`.
pub(crate) fn ordinal_count_collector<'a>(
    handler: &str,
    source: &'a dyn OrdinalSource,
    spec: &FacetSpec,
    selection: Option<&BrowseSelection>,
) -> Box<dyn FacetCountCollector + 'a> {
    Box::new(OrdinalCountCollector::new(
        handler,
        source,
        spec.clone(),
        selected_display_values(source, selection),
    ))
}
