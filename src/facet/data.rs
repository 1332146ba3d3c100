//! Per-partition facet data.
//!
//! A handler's `load` produces one immutable data object per partition. The
//! concrete type is private to the handler family; everything else holds it
//! as [`FacetData`] and downcasts where needed.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use ahash::AHashMap;

use crate::dictionary::{NumberFormat, RawValue, TermType, TermValueList, TermValues};
use crate::engine::{DocId, IndexReader};
use crate::error::{DrilldownError, Result};

/// Type-erased facet data of one handler in one partition.
pub type FacetData = dyn Any + Send + Sync;

/// Loaded facet data of a partition, by handler name.
pub type FacetDataMap = AHashMap<String, Arc<FacetData>>;

/// Marker of a document without a value.
pub const NO_VALUE: u32 = u32::MAX;

/// Downcast facet data to the type a handler expects.
pub fn downcast_data<'a, T: Any>(handler: &str, data: &'a FacetData) -> Result<&'a T> {
    data.downcast_ref::<T>().ok_or_else(|| {
        DrilldownError::facet(format!(
            "facet data of '{handler}' is not a {}",
            std::any::type_name::<T>()
        ))
    })
}

/// View of facet data that maps documents to term ordinals.
pub trait OrdinalSource: Send + Sync + Debug {
    /// Term dictionary the ordinals point into.
    fn term_values(&self) -> &TermValueList;

    /// Call `f` with each ordinal of `doc`, ascending.
    fn for_each_ordinal(&self, doc: DocId, f: &mut dyn FnMut(usize));

    /// Number of documents carrying the ordinal, deleted documents included.
    fn doc_freq(&self, ordinal: usize) -> u32;

    /// Smallest ordinal of `doc`.
    fn first_ordinal(&self, doc: DocId) -> Option<usize> {
        let mut first = None;
        self.for_each_ordinal(doc, &mut |ord| {
            if first.is_none() {
                first = Some(ord);
            }
        });
        first
    }

    /// Ordinals of `doc`, ascending.
    fn ordinals(&self, doc: DocId) -> Vec<usize> {
        let mut out = Vec::new();
        self.for_each_ordinal(doc, &mut |ord| out.push(ord));
        out
    }

    /// Display values of `doc`.
    fn values_of(&self, doc: DocId) -> Vec<String> {
        let values = self.term_values();
        self.ordinals(doc)
            .into_iter()
            .filter_map(|ord| values.value_at(ord))
            .collect()
    }

    /// Raw values of `doc`.
    fn raw_values_of(&self, doc: DocId) -> Vec<RawValue> {
        let values = self.term_values();
        self.ordinals(doc)
            .into_iter()
            .filter_map(|ord| values.raw_at(ord))
            .collect()
    }

    /// Whether each document has at most one ordinal.
    fn is_single_valued(&self) -> bool;
}

/// View `data` as an ordinal source, if it is one of the cache types.
pub fn as_ordinal_source(data: &FacetData) -> Option<&dyn OrdinalSource> {
    if let Some(cache) = data.downcast_ref::<FacetDataCache>() {
        return Some(cache);
    }
    if let Some(cache) = data.downcast_ref::<MultiValueFacetDataCache>() {
        return Some(cache);
    }
    None
}

fn load_terms(
    reader: &dyn IndexReader,
    field: &str,
    term_type: TermType,
    format: Option<NumberFormat>,
) -> Result<(TermValueList, Vec<(usize, Vec<DocId>)>)> {
    let mut values = term_type.new_list(format);
    let entries: Vec<(&str, &[DocId])> = reader.terms(field).map(|e| (e.term, e.docs)).collect();
    for (term, _) in &entries {
        values.add(term)?;
    }
    values.seal();

    let mut postings = Vec::with_capacity(entries.len());
    for (term, docs) in entries {
        let ordinal = values.ordinal_of(term)?.ok_or_else(|| {
            DrilldownError::facet(format!("term {term:?} of '{field}' vanished after sealing"))
        })?;
        postings.push((ordinal, docs.to_vec()));
    }
    Ok((values, postings))
}

/// Single-valued field data: one ordinal per document.
#[derive(Debug)]
pub struct FacetDataCache {
    values: TermValueList,
    order: Vec<u32>,
    freqs: Vec<u32>,
}

impl FacetDataCache {
    /// Load the terms of `field` from a partition.
    ///
    /// Fails when a document carries more than one distinct value.
    pub fn load(
        reader: &dyn IndexReader,
        field: &str,
        term_type: TermType,
        format: Option<NumberFormat>,
    ) -> Result<Self> {
        let (values, postings) = load_terms(reader, field, term_type, format)?;
        let mut order = vec![NO_VALUE; reader.max_doc() as usize];
        let mut freqs = vec![0u32; values.len()];

        for (ordinal, docs) in postings {
            let ord = ordinal as u32;
            for doc in docs {
                let slot = order.get_mut(doc as usize).ok_or_else(|| {
                    DrilldownError::index(format!("posting of '{field}' points past max doc: {doc}"))
                })?;
                if *slot == ord {
                    continue;
                }
                if *slot != NO_VALUE {
                    return Err(DrilldownError::facet(format!(
                        "field '{field}' has more than one value in document {doc}; \
                         use a multi-value handler"
                    )));
                }
                *slot = ord;
                freqs[ordinal] += 1;
            }
        }

        Ok(FacetDataCache {
            values,
            order,
            freqs,
        })
    }

    /// Ordinal of `doc`, `None` when it has no value.
    pub fn ordinal(&self, doc: DocId) -> Option<usize> {
        match self.order.get(doc as usize) {
            Some(&ord) if ord != NO_VALUE => Some(ord as usize),
            _ => None,
        }
    }
}

impl OrdinalSource for FacetDataCache {
    fn term_values(&self) -> &TermValueList {
        &self.values
    }

    fn first_ordinal(&self, doc: DocId) -> Option<usize> {
        self.ordinal(doc)
    }

    fn for_each_ordinal(&self, doc: DocId, f: &mut dyn FnMut(usize)) {
        if let Some(ord) = self.ordinal(doc) {
            f(ord);
        }
    }

    fn doc_freq(&self, ordinal: usize) -> u32 {
        self.freqs.get(ordinal).copied().unwrap_or(0)
    }

    fn is_single_valued(&self) -> bool {
        true
    }
}

/// Multi-valued field data: a sorted ordinal list per document.
#[derive(Debug)]
pub struct MultiValueFacetDataCache {
    values: TermValueList,
    ords: Vec<Vec<u32>>,
    freqs: Vec<u32>,
}

impl MultiValueFacetDataCache {
    /// Load the terms of `field` from a partition.
    pub fn load(
        reader: &dyn IndexReader,
        field: &str,
        term_type: TermType,
        format: Option<NumberFormat>,
    ) -> Result<Self> {
        let (values, postings) = load_terms(reader, field, term_type, format)?;
        let mut ords: Vec<Vec<u32>> = vec![Vec::new(); reader.max_doc() as usize];

        for (ordinal, docs) in postings {
            for doc in docs {
                let slot = ords.get_mut(doc as usize).ok_or_else(|| {
                    DrilldownError::index(format!("posting of '{field}' points past max doc: {doc}"))
                })?;
                slot.push(ordinal as u32);
            }
        }

        let mut freqs = vec![0u32; values.len()];
        for doc_ords in &mut ords {
            doc_ords.sort_unstable();
            doc_ords.dedup();
            doc_ords.shrink_to_fit();
            for ord in doc_ords.iter() {
                freqs[*ord as usize] += 1;
            }
        }

        Ok(MultiValueFacetDataCache {
            values,
            ords,
            freqs,
        })
    }
}

impl OrdinalSource for MultiValueFacetDataCache {
    fn term_values(&self) -> &TermValueList {
        &self.values
    }

    fn for_each_ordinal(&self, doc: DocId, f: &mut dyn FnMut(usize)) {
        if let Some(doc_ords) = self.ords.get(doc as usize) {
            for ord in doc_ords {
                f(*ord as usize);
            }
        }
    }

    fn doc_freq(&self, ordinal: usize) -> u32 {
        self.freqs.get(ordinal).copied().unwrap_or(0)
    }

    fn is_single_valued(&self) -> bool {
        false
    }
}

/// Value distribution of a loaded field, for diagnostics.
pub fn value_histogram(source: &dyn OrdinalSource) -> BTreeMap<String, u32> {
    let values = source.term_values();
    (0..values.len())
        .filter_map(|ord| values.value_at(ord).map(|v| (v, source.doc_freq(ord))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::{Document, MemoryIndex};

    fn index() -> MemoryIndex {
        MemoryIndex::from_documents(vec![
            Document::new().with_field("n", "-3").with_field("tag", "a"),
            Document::new().with_field("n", "10").with_field("tag", "a").with_field("tag", "b"),
            Document::new().with_field("tag", "c"),
            Document::new().with_field("n", "2"),
        ])
    }

    #[test]
    fn test_single_value_cache() {
        let index = index();
        let cache = FacetDataCache::load(&index, "n", TermType::Int, None).unwrap();

        assert_eq!(cache.ordinal(0), Some(0));
        assert_eq!(cache.ordinal(1), Some(2));
        assert_eq!(cache.ordinal(2), None);
        assert_eq!(cache.ordinal(3), Some(1));
        assert_eq!(cache.raw_values_of(1), vec![RawValue::Int(10)]);
        assert_eq!(cache.doc_freq(1), 1);
    }

    #[test]
    fn test_single_value_cache_rejects_multi_values() {
        let index = index();
        let err = FacetDataCache::load(&index, "tag", TermType::Text, None).unwrap_err();
        assert!(matches!(err, DrilldownError::Facet(_)));
    }

    #[test]
    fn test_multi_value_cache() {
        let index = index();
        let cache = MultiValueFacetDataCache::load(&index, "tag", TermType::Text, None).unwrap();

        assert_eq!(cache.values_of(1), vec!["a", "b"]);
        assert!(cache.values_of(3).is_empty());
        assert_eq!(cache.doc_freq(0), 2);

        let histogram = value_histogram(&cache);
        assert_eq!(histogram["c"], 1);
    }

    #[test]
    fn test_downcast_data() {
        let index = index();
        let data: Arc<FacetData> =
            Arc::new(FacetDataCache::load(&index, "n", TermType::Int, None).unwrap());
        assert!(downcast_data::<FacetDataCache>("n", data.as_ref()).is_ok());
        assert!(downcast_data::<MultiValueFacetDataCache>("n", data.as_ref()).is_err());
        assert!(as_ordinal_source(data.as_ref()).is_some());
    }
}
