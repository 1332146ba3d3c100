//! Side aggregates computed over every accepted hit.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde_json::{Value, json};

use crate::browse::partition::Partition;
use crate::engine::DocId;
use crate::error::Result;

/// An accepted hit as seen by a side aggregate.
pub struct MappedDocument<'a> {
    /// Partition index.
    pub partition: usize,
    /// Partition-local document id.
    pub doc: DocId,
    /// Global document id.
    pub global_doc: u64,
    /// Score after facet boosting.
    pub score: f32,
    source: &'a Partition,
}

impl<'a> MappedDocument<'a> {
    pub(crate) fn new(partition: usize, doc: DocId, global_doc: u64, score: f32, source: &'a Partition) -> Self {
        MappedDocument {
            partition,
            doc,
            global_doc,
            score,
            source,
        }
    }

    /// Display values of a facet of the document; empty when the facet is
    /// not loaded in its partition.
    pub fn field_values(&self, field: &str) -> Vec<String> {
        self.source.field_values(self.doc, field).unwrap_or_default()
    }
}

/// A streaming aggregate attached to a browse request.
///
/// `map_document` sees every accepted hit of every partition,
/// `finalize_partition` runs after each partition's scan and `finalize`
/// runs exactly once after all partitions reached a terminal state, failed
/// ones included.
pub trait MapReduceAggregator: Send + Debug {
    /// Observe one accepted hit.
    fn map_document(&mut self, doc: &MappedDocument<'_>) -> Result<()>;

    /// Called when a partition finished scanning.
    fn finalize_partition(&mut self, _partition: usize) -> Result<()> {
        Ok(())
    }

    /// Called once per browse after every partition.
    fn finalize(&mut self) {}

    /// Aggregate result, copied into the browse result.
    fn result(&self) -> Option<Value>;
}

/// Counts accepted hits per value of one facet and per partition.
#[derive(Debug, Default)]
pub struct FieldValueCounter {
    field: String,
    counts: BTreeMap<String, u64>,
    partition_hits: BTreeMap<usize, u64>,
    finalized: u64,
}

impl FieldValueCounter {
    /// Count values of `field`.
    pub fn new<S: Into<String>>(field: S) -> Self {
        FieldValueCounter {
            field: field.into(),
            ..Default::default()
        }
    }

    /// Counts so far.
    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    /// How many times `finalize` ran.
    pub fn finalized(&self) -> u64 {
        self.finalized
    }
}

impl MapReduceAggregator for FieldValueCounter {
    fn map_document(&mut self, doc: &MappedDocument<'_>) -> Result<()> {
        for value in doc.field_values(&self.field) {
            *self.counts.entry(value).or_default() += 1;
        }
        *self.partition_hits.entry(doc.partition).or_default() += 1;
        Ok(())
    }

    fn finalize(&mut self) {
        self.finalized += 1;
    }

    fn result(&self) -> Option<Value> {
        Some(json!({
            "field": self.field,
            "counts": self.counts,
            "partition_hits": self.partition_hits,
        }))
    }
}
