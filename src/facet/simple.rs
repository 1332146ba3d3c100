//! Single-valued facet handler.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::browse::request::{BrowseSelection, ValueOperation};
use crate::dictionary::{NumberFormat, RawValue, TermType};
use crate::engine::{DocId, IndexReader};
use crate::error::Result;
use crate::facet::FacetSpec;
use crate::facet::collector::FacetCountCollector;
use crate::facet::data::{FacetData, FacetDataCache, FacetDataMap, OrdinalSource, downcast_data};
use crate::facet::filter::DocFilter;
use crate::facet::handler::{FacetHandler, ordinal_count_collector, ordinal_value_filter};
use crate::sort::comparator::{DocComparator, OrdinalComparator};

/// Facet over a field with at most one value per document.
#[derive(Debug, Clone)]
pub struct SimpleFacetHandler {
    name: String,
    field: String,
    term_type: TermType,
    format: Option<NumberFormat>,
    depends_on: BTreeSet<String>,
}

impl SimpleFacetHandler {
    /// Create a text facet named `name` over index field `field`.
    pub fn new<N: Into<String>, F: Into<String>>(name: N, field: F) -> Self {
        SimpleFacetHandler {
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

    /// Value type.
    pub fn term_type(&self) -> TermType {
        self.term_type
    }

    fn cache<'a>(&self, data: &'a FacetData) -> Result<&'a FacetDataCache> {
        downcast_data::<FacetDataCache>(&self.name, data)
    }
}

impl FacetHandler for SimpleFacetHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    fn load(&self, reader: &dyn IndexReader, _deps: &FacetDataMap) -> Result<Arc<FacetData>> {
        let cache = FacetDataCache::load(reader, &self.field, self.term_type, self.format.clone())?;
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
        // a single value can not match two distinct values at once
        let operation = if values.len() > 1 {
            operation
        } else {
            ValueOperation::Or
        };
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::{Document, MemoryIndex};
    use crate::facet::accessible::FacetAccessible;

    fn index() -> MemoryIndex {
        MemoryIndex::from_documents(vec![
            Document::new().with_field("color", "red").with_field("price", "12"),
            Document::new().with_field("color", "blue").with_field("price", "-3"),
            Document::new().with_field("color", "red").with_field("price", "7"),
            Document::new(),
        ])
    }

    fn matching(filter: &dyn DocFilter) -> Vec<DocId> {
        (0..4).filter(|d| filter.matches(*d)).collect()
    }

    #[test]
    fn test_selection_with_not_values() {
        let index = index();
        let handler = SimpleFacetHandler::new("color", "color");
        let data = handler.load(&index, &FacetDataMap::new()).unwrap();

        let selection = BrowseSelection::new("color").with_not_value("red");
        let filter = handler.selection_filter(data.as_ref(), &selection).unwrap().unwrap();
        assert_eq!(matching(filter.as_ref()), vec![1, 3]);

        let selection = BrowseSelection::new("color")
            .with_value("red")
            .with_value("blue")
            .with_not_value("blue");
        let filter = handler.selection_filter(data.as_ref(), &selection).unwrap().unwrap();
        assert_eq!(matching(filter.as_ref()), vec![0, 2]);

        let empty = BrowseSelection::new("color");
        assert!(handler.selection_filter(data.as_ref(), &empty).unwrap().is_none());
    }

    #[test]
    fn test_numeric_values_and_counts() {
        let index = index();
        let handler = SimpleFacetHandler::new("price", "price")
            .with_term_type(TermType::Int)
            .with_format(NumberFormat::plain());
        let data = handler.load(&index, &FacetDataMap::new()).unwrap();

        assert_eq!(handler.field_values(data.as_ref(), 1).unwrap(), vec!["-3"]);
        assert_eq!(handler.raw_field_values(data.as_ref(), 0).unwrap(), vec![RawValue::Int(12)]);

        let selection = BrowseSelection::new("price").with_value("7");
        let filter = handler.selection_filter(data.as_ref(), &selection).unwrap().unwrap();
        assert_eq!(matching(filter.as_ref()), vec![2]);

        let mut collector = handler
            .count_collector(data.as_ref(), &FacetSpec::default(), Some(&selection))
            .unwrap();
        for doc in 0..4 {
            collector.collect(doc);
        }
        let counts = collector.into_counts();
        assert_eq!(counts.facet_hit_count("12"), 1);
        assert_eq!(counts.total_count(), 3);
    }

    #[test]
    fn test_wrong_data_type_is_an_error() {
        let handler = SimpleFacetHandler::new("color", "color");
        let data: Arc<FacetData> = Arc::new(42u32);
        assert!(handler.field_values(data.as_ref(), 0).is_err());
    }
}
