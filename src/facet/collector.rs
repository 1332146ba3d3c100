//! Facet count collectors.

use std::collections::BTreeSet;

use crate::dictionary::{RawValue, TermValues};
use crate::engine::DocId;
use crate::facet::FacetSpec;
use crate::facet::accessible::{FacetCounts, FacetEntry};
use crate::facet::data::OrdinalSource;

/// Trait for per-partition facet counting.
///
/// A collector is fed every accepted hit of one partition and then turned
/// into the partition's partial [`FacetCounts`].
pub trait FacetCountCollector: Send {
    /// Field the counts belong to.
    fn name(&self) -> &str;

    /// Count one local document.
    fn collect(&mut self, doc: DocId);

    /// Finish counting.
    fn into_counts(self: Box<Self>) -> FacetCounts;
}

/// Counts hits per term ordinal.
#[derive(Debug)]
pub struct OrdinalCountCollector<'a> {
    name: String,
    source: &'a dyn OrdinalSource,
    spec: FacetSpec,
    selected: BTreeSet<String>,
    counts: Vec<u64>,
}

impl<'a> OrdinalCountCollector<'a> {
    /// Create a collector over `source`.
    pub fn new<S: Into<String>>(
        name: S,
        source: &'a dyn OrdinalSource,
        spec: FacetSpec,
        selected: BTreeSet<String>,
    ) -> Self {
        OrdinalCountCollector {
            name: name.into(),
            source,
            spec,
            selected,
            counts: vec![0; source.term_values().len()],
        }
    }
}

impl FacetCountCollector for OrdinalCountCollector<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect(&mut self, doc: DocId) {
        let counts = &mut self.counts;
        self.source.for_each_ordinal(doc, &mut |ord| {
            if let Some(count) = counts.get_mut(ord) {
                *count += 1;
            }
        });
    }

    fn into_counts(self: Box<Self>) -> FacetCounts {
        let source = self.source;
        let values = source.term_values();
        let entries = self
            .counts
            .iter()
            .enumerate()
            .filter_map(|(ord, count)| {
                Some(FacetEntry {
                    value: values.value_at(ord)?,
                    sort_key: values.raw_at(ord)?,
                    count: *count,
                })
            })
            .collect();
        FacetCounts::new(self.name, self.spec, entries).with_selected(self.selected)
    }
}

/// Counts hits into fixed, labelled buckets.
///
/// A document counts at most once per bucket however many of its values
/// fall into it.
#[derive(Debug)]
pub struct BucketCountCollector<'a> {
    name: String,
    source: Option<&'a dyn OrdinalSource>,
    buckets: Vec<(String, usize, usize)>,
    spec: FacetSpec,
    selected: BTreeSet<String>,
    counts: Vec<u64>,
}

impl<'a> BucketCountCollector<'a> {
    /// Create a collector; each bucket is `(label, start, end)` over the
    /// ordinals of `source`.
    pub fn new<S: Into<String>>(
        name: S,
        source: Option<&'a dyn OrdinalSource>,
        buckets: Vec<(String, usize, usize)>,
        spec: FacetSpec,
        selected: BTreeSet<String>,
    ) -> Self {
        let counts = vec![0; buckets.len()];
        BucketCountCollector {
            name: name.into(),
            source,
            buckets,
            spec,
            selected,
            counts,
        }
    }
}

impl FacetCountCollector for BucketCountCollector<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect(&mut self, doc: DocId) {
        let Some(source) = self.source else {
            return;
        };
        let ordinals = source.ordinals(doc);
        if ordinals.is_empty() {
            return;
        }
        for (i, (_, start, end)) in self.buckets.iter().enumerate() {
            if ordinals.iter().any(|ord| ord >= start && ord < end) {
                self.counts[i] += 1;
            }
        }
    }

    fn into_counts(self: Box<Self>) -> FacetCounts {
        let entries = self
            .buckets
            .iter()
            .zip(&self.counts)
            .enumerate()
            .map(|(i, ((label, _, _), count))| FacetEntry {
                value: label.clone(),
                sort_key: RawValue::Long(i as i64),
                count: *count,
            })
            .collect();
        FacetCounts::new(self.name, self.spec, entries).with_selected(self.selected)
    }
}
