//! Range facet handler.
//!
//! Ranges are written `[lo TO hi]`: `[`/`]` include the bound, `(`/`)`
//! exclude it and `*` leaves a side open. They are evaluated against the
//! loaded data of another handler, so `[10 TO 20)` over a price facet counts
//! every hit priced from 10 up to, but not including, 20.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use bit_vec::BitVec;
use lazy_static::lazy_static;
use regex::Regex;

use crate::browse::request::{BrowseSelection, ValueOperation};
use crate::dictionary::{RawValue, TermValues};
use crate::engine::{DocId, IndexReader};
use crate::error::{DrilldownError, Result};
use crate::facet::FacetSpec;
use crate::facet::collector::{BucketCountCollector, FacetCountCollector};
use crate::facet::data::{FacetData, FacetDataMap, OrdinalSource, as_ordinal_source, downcast_data};
use crate::facet::filter::{AndFilter, DocFilter, EmptyFilter, OrdinalFilter};
use crate::facet::handler::FacetHandler;
use crate::sort::comparator::{DocComparator, MissingValueComparator, OrdinalComparator};

lazy_static! {
    static ref RANGE_PATTERN: std::result::Result<Regex, regex::Error> =
        Regex::new(r"^\s*([\[(])\s*(\S+)\s+TO\s+(\S+)\s*([\])])\s*$");
}

/// A value range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetRange {
    label: String,
    lower: Bound<String>,
    upper: Bound<String>,
}

impl FacetRange {
    /// Parse a range expression.
    pub fn parse(expr: &str) -> Result<Self> {
        let pattern = RANGE_PATTERN
            .as_ref()
            .map_err(|e| DrilldownError::other(format!("invalid range pattern: {e}")))?;
        let caps = pattern.captures(expr).ok_or_else(|| {
            DrilldownError::parse(format!("'{expr}' is not a range like [lo TO hi]"))
        })?;

        let bound = |value: &str, inclusive: bool| {
            if value == "*" {
                Bound::Unbounded
            } else if inclusive {
                Bound::Included(value.to_string())
            } else {
                Bound::Excluded(value.to_string())
            }
        };

        Ok(FacetRange {
            label: expr.trim().to_string(),
            lower: bound(&caps[2], &caps[1] == "["),
            upper: bound(&caps[3], &caps[4] == "]"),
        })
    }

    /// Display label, the expression as written.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Ordinal span `[start, end)` of the range in `terms`.
    pub fn ordinal_span(&self, terms: &dyn TermValues) -> Result<(usize, usize)> {
        let start = match &self.lower {
            Bound::Unbounded => 0,
            Bound::Included(lo) => terms.lower_bound(lo)?,
            Bound::Excluded(lo) => terms.upper_bound(lo)?,
        };
        let end = match &self.upper {
            Bound::Unbounded => terms.len(),
            Bound::Included(hi) => terms.upper_bound(hi)?,
            Bound::Excluded(hi) => terms.lower_bound(hi)?,
        };
        Ok((start, end.max(start)))
    }
}

impl fmt::Display for FacetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Loaded range data: the dependency's data and each range's ordinal span.
#[derive(Debug)]
pub struct RangeFacetData {
    source: Option<Arc<FacetData>>,
    buckets: Vec<(String, usize, usize)>,
}

impl RangeFacetData {
    fn source(&self) -> Option<&dyn OrdinalSource> {
        self.source.as_deref().and_then(as_ordinal_source)
    }
}

/// Facet of predefined ranges over another handler's values.
///
/// When the handler it depends on is not registered, it loads empty data:
/// nothing is counted and every selection on it matches nothing.
#[derive(Debug, Clone)]
pub struct RangeFacetHandler {
    name: String,
    source: String,
    ranges: Vec<FacetRange>,
    depends_on: BTreeSet<String>,
}

impl RangeFacetHandler {
    /// Create a range facet over the handler named `source`.
    pub fn new<N: Into<String>, S: Into<String>>(name: N, source: S, ranges: Vec<FacetRange>) -> Self {
        let source = source.into();
        RangeFacetHandler {
            name: name.into(),
            depends_on: BTreeSet::from([source.clone()]),
            source,
            ranges,
        }
    }

    /// Create a range facet from range expressions.
    pub fn parse<N, S, I, R>(name: N, source: S, ranges: I) -> Result<Self>
    where
        N: Into<String>,
        S: Into<String>,
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        let ranges = ranges
            .into_iter()
            .map(|r| FacetRange::parse(r.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(RangeFacetHandler::new(name, source, ranges))
    }

    /// Ranges in declaration order.
    pub fn ranges(&self) -> &[FacetRange] {
        &self.ranges
    }

    fn data<'a>(&self, data: &'a FacetData) -> Result<&'a RangeFacetData> {
        downcast_data::<RangeFacetData>(&self.name, data)
    }

    fn selection_span(&self, source: &dyn OrdinalSource, value: &str) -> Option<(usize, usize)> {
        let range = match FacetRange::parse(value) {
            Ok(range) => range,
            Err(e) => {
                log::warn!("Ignoring selection on '{}': {e}", self.name);
                return None;
            }
        };
        match range.ordinal_span(source.term_values()) {
            Ok(span) => Some(span),
            Err(e) => {
                log::warn!("Ignoring selection on '{}': {e}", self.name);
                None
            }
        }
    }
}

impl FacetHandler for RangeFacetHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    fn load(&self, _reader: &dyn IndexReader, deps: &FacetDataMap) -> Result<Arc<FacetData>> {
        let Some(source_data) = deps.get(&self.source) else {
            log::debug!(
                "Range facet '{}' has no data for '{}'; it will count nothing",
                self.name,
                self.source
            );
            return Ok(Arc::new(RangeFacetData {
                source: None,
                buckets: Vec::new(),
            }));
        };
        let source = as_ordinal_source(source_data.as_ref()).ok_or_else(|| {
            DrilldownError::facet(format!(
                "range facet '{}' needs ordinal data from '{}'",
                self.name, self.source
            ))
        })?;

        let terms = source.term_values();
        let mut buckets = Vec::with_capacity(self.ranges.len());
        for range in &self.ranges {
            let (start, end) = range.ordinal_span(terms)?;
            buckets.push((range.label.clone(), start, end));
        }

        Ok(Arc::new(RangeFacetData {
            source: Some(Arc::clone(source_data)),
            buckets,
        }))
    }

    fn field_values(&self, data: &FacetData, doc: DocId) -> Result<Vec<String>> {
        let data = self.data(data)?;
        let Some(source) = data.source() else {
            return Ok(Vec::new());
        };
        let ordinals = source.ordinals(doc);
        Ok(data
            .buckets
            .iter()
            .filter(|(_, start, end)| ordinals.iter().any(|o| o >= start && o < end))
            .map(|(label, _, _)| label.clone())
            .collect())
    }

    fn raw_field_values(&self, data: &FacetData, doc: DocId) -> Result<Vec<RawValue>> {
        Ok(self
            .data(data)?
            .source()
            .map(|source| source.raw_values_of(doc))
            .unwrap_or_default())
    }

    fn value_filter<'a>(
        &self,
        data: &'a FacetData,
        values: &[String],
        operation: ValueOperation,
    ) -> Result<Box<dyn DocFilter + 'a>> {
        let Some(source) = self.data(data)?.source() else {
            return Ok(Box::new(EmptyFilter));
        };
        let spans: Vec<Option<(usize, usize)>> =
            values.iter().map(|v| self.selection_span(source, v)).collect();

        match operation {
            ValueOperation::Or => {
                let mut bits = BitVec::from_elem(source.term_values().len(), false);
                for (start, end) in spans.into_iter().flatten() {
                    for ord in start..end {
                        bits.set(ord, true);
                    }
                }
                Ok(Box::new(OrdinalFilter::from_bits(source, bits)))
            }
            ValueOperation::And => {
                if spans.iter().any(Option::is_none) {
                    return Ok(Box::new(EmptyFilter));
                }
                let filters: Vec<Box<dyn DocFilter + 'a>> = spans
                    .into_iter()
                    .flatten()
                    .map(|(start, end)| {
                        Box::new(OrdinalFilter::range(source, start, end)) as Box<dyn DocFilter + 'a>
                    })
                    .collect();
                Ok(Box::new(AndFilter::new(filters)))
            }
        }
    }

    fn count_collector<'a>(
        &self,
        data: &'a FacetData,
        spec: &FacetSpec,
        selection: Option<&BrowseSelection>,
    ) -> Result<Box<dyn FacetCountCollector + 'a>> {
        let data = self.data(data)?;
        let selected = selection
            .map(|s| s.values.iter().map(|v| v.trim().to_string()).collect())
            .unwrap_or_default();
        Ok(Box::new(BucketCountCollector::new(
            self.name.clone(),
            data.source(),
            data.buckets.clone(),
            spec.clone(),
            selected,
        )))
    }

    fn doc_comparator<'a>(&self, data: &'a FacetData) -> Result<Box<dyn DocComparator + 'a>> {
        Ok(match self.data(data)?.source() {
            Some(source) => Box::new(OrdinalComparator::new(source)),
            None => Box::new(MissingValueComparator),
        })
    }

    fn ordinal_source<'a>(&self, _data: &'a FacetData) -> Option<&'a dyn OrdinalSource> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::TermType;
    use crate::engine::memory::{Document, MemoryIndex};
    use crate::facet::accessible::FacetAccessible;
    use crate::facet::simple::SimpleFacetHandler;

    fn index() -> MemoryIndex {
        MemoryIndex::from_documents(
            [5, 10, 15, 20, -7]
                .iter()
                .map(|p| Document::new().with_field("price", p.to_string())),
        )
    }

    fn loaded(index: &MemoryIndex, ranges: &[&str]) -> (RangeFacetHandler, Arc<FacetData>) {
        let price = SimpleFacetHandler::new("price", "price").with_term_type(TermType::Int);
        let mut deps = FacetDataMap::new();
        deps.insert("price".to_string(), price.load(index, &FacetDataMap::new()).unwrap());
        let handler = RangeFacetHandler::parse("price_range", "price", ranges).unwrap();
        let data = handler.load(index, &deps).unwrap();
        (handler, data)
    }

    #[test]
    fn test_parse_ranges() {
        let range = FacetRange::parse("[10 TO 20)").unwrap();
        assert_eq!(range.lower, Bound::Included("10".to_string()));
        assert_eq!(range.upper, Bound::Excluded("20".to_string()));
        let open = FacetRange::parse("(* TO 5]").unwrap();
        assert_eq!(open.lower, Bound::Unbounded);
        assert!(FacetRange::parse("10 - 20").is_err());
    }

    #[test]
    fn test_bucket_counts_respect_bounds() {
        let index = index();
        let (handler, data) = loaded(&index, &["[* TO 10)", "[10 TO 20]", "(15 TO *]"]);
        let mut collector = handler
            .count_collector(data.as_ref(), &FacetSpec::default(), None)
            .unwrap();
        for doc in 0..5 {
            collector.collect(doc);
        }
        let counts = collector.into_counts();
        assert_eq!(counts.facet_hit_count("[* TO 10)"), 2);
        assert_eq!(counts.facet_hit_count("[10 TO 20]"), 3);
        assert_eq!(counts.facet_hit_count("(15 TO *]"), 1);
        assert_eq!(handler.field_values(data.as_ref(), 2).unwrap(), vec!["[10 TO 20]"]);
    }

    #[test]
    fn test_range_selection() {
        let index = index();
        let (handler, data) = loaded(&index, &["[* TO 10)"]);
        let selection = BrowseSelection::new("price_range").with_value("[0 TO 12]");
        let filter = handler.selection_filter(data.as_ref(), &selection).unwrap().unwrap();
        let docs: Vec<DocId> = (0..5).filter(|d| filter.matches(*d)).collect();
        assert_eq!(docs, vec![0, 1]);
    }

    #[test]
    fn test_missing_dependency_counts_nothing() {
        let index = index();
        let handler = RangeFacetHandler::parse("price_range", "price", ["[* TO *]"]).unwrap();
        let data = handler.load(&index, &FacetDataMap::new()).unwrap();
        let selection = BrowseSelection::new("price_range").with_value("[* TO *]");
        let filter = handler.selection_filter(data.as_ref(), &selection).unwrap().unwrap();
        assert!(!filter.matches(0));
        assert!(handler.field_values(data.as_ref(), 0).unwrap().is_empty());
    }
}
