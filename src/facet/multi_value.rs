//! Multi-valued facet handler.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::browse::request::{BrowseSelection, ValueOperation};
use crate::dictionary::{NumberFormat, RawValue, TermType};
use crate::engine::{DocId, IndexReader};
use crate::error::Result;
use crate::facet::FacetSpec;
use crate::facet::collector::FacetCountCollector;
use crate::facet::data::{
    FacetData, FacetDataMap, MultiValueFacetDataCache, OrdinalSource, downcast_data,
};
use crate::facet::filter::DocFilter;
use crate::facet::handler::{FacetHandler, ordinal_count_collector, ordinal_value_filter};
use crate::sort::comparator::{DocComparator, OrdinalComparator};

/// Facet over a field with any number of values per document.
///
/// Selections combine their values with [`ValueOperation::Or`] (any value)
/// or [`ValueOperation::And`] (all values). Sorting compares the sorted value
/// lists of two documents lexicographically.
#[derive(Debug, Clone)]
pub struct MultiValueFacetHandler {
    name: String,
    field: String,
    term_type: TermType,
    format: Option<NumberFormat>,
    depends_on: BTreeSet<String>,
}

impl MultiValueFacetHandler {
    /// Create a text facet named `name` over index field `field`.
    pub fn new<N: Into<String>, F: Into<String>>(name: N, field: F) -> Self {
        MultiValueFacetHandler {
            name: name.into(),
            field: field.into(),
            term_type: TermType::Text,
            format: None,
            depends_on: BTreeSet::new(),
        }
    }

    /// Set the value type.
    pub fn with_term_type(mut self, term_type: TermType) -> Self {
        self.term_type = term_type;
        self
    }

    /// Set the display format of numeric values.
    pub fn with_format(mut self, format: NumberFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Declare a dependency.
    pub fn with_dependency<S: Into<String>>(mut self, name: S) -> Self {
        self.depends_on.insert(name.into());
        self
    }

    /// Index field the handler reads.
    pub fn field(&self) -> &str {
        &self.field
    }

    fn cache<'a>(&self, data: &'a FacetData) -> Result<&'a MultiValueFacetDataCache> {
        downcast_data::<MultiValueFacetDataCache>(&self.name, data)
    }
}

impl FacetHandler for MultiValueFacetHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    fn load(&self, reader: &dyn IndexReader, _deps: &FacetDataMap) -> Result<Arc<FacetData>> {
        let cache =
            MultiValueFacetDataCache::load(reader, &self.field, self.term_type, self.format.clone())?;
        Ok(Arc::new(cache))
    }

    fn field_values(&self, data: &FacetData, doc: DocId) -> Result<Vec<String>> {
        Ok(self.cache(data)?.values_of(doc))
    }

    fn raw_field_values(&self, data: &FacetData, doc: DocId) -> Result<Vec<RawValue>> {
        Ok(self.cache(data)?.raw_values_of(doc))
    }

    fn value_filter<'a>(
        &self,
        data: &'a FacetData,
        values: &[String],
        operation: ValueOperation,
    ) -> Result<Box<dyn DocFilter + 'a>> {
        Ok(ordinal_value_filter(self.cache(data)?, values, operation))
    }

    fn count_collector<'a>(
        &self,
        data: &'a FacetData,
        spec: &FacetSpec,
        selection: Option<&BrowseSelection>,
    ) -> Result<Box<dyn FacetCountCollector + 'a>> {
        Ok(ordinal_count_collector(&self.name, self.cache(data)?, spec, selection))
    }

    fn doc_comparator<'a>(&self, data: &'a FacetData) -> Result<Box<dyn DocComparator + 'a>> {
        let source: &'a dyn OrdinalSource = self.cache(data)?;
        Ok(Box::new(OrdinalComparator::new(source)))
    }
}
