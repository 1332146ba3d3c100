//! Document comparators.
//!
//! Inside a partition documents are compared directly (by score, local id or
//! term ordinal). Hits from different partitions are compared through the
//! partition-independent [`SortValue`] each comparator produces; the two
//! orders agree because ordinal order equals value order.

use std::cmp::Ordering;

use crate::dictionary::RawValue;
use crate::engine::DocId;
use crate::facet::data::OrdinalSource;

/// A matched document with its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreDoc {
    /// Partition-local document id.
    pub doc: DocId,
    /// Relevance score.
    pub score: f32,
}

impl ScoreDoc {
    /// Create a new scored document.
    pub fn new(doc: DocId, score: f32) -> Self {
        ScoreDoc { doc, score }
    }
}

/// Comparable value of a hit. Smaller values rank first.
#[derive(Debug, Clone)]
pub enum SortValue {
    /// Relevance score; higher scores rank first.
    Score(f32),
    /// Global document id.
    Doc(u64),
    /// Single field value; missing values rank first.
    Value(Option<RawValue>),
    /// All values of a multi-valued field, compared lexicographically.
    Values(Vec<RawValue>),
    /// Composite of several sort fields.
    Multi(Vec<SortValue>),
    /// Reversed value.
    Reverse(Box<SortValue>),
}

impl SortValue {
    fn rank(&self) -> u8 {
        match self {
            SortValue::Score(_) => 0,
            SortValue::Doc(_) => 1,
            SortValue::Value(_) => 2,
            SortValue::Values(_) => 3,
            SortValue::Multi(_) => 4,
            SortValue::Reverse(_) => 5,
        }
    }
}

impl PartialEq for SortValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortValue {}

impl PartialOrd for SortValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Score(a), SortValue::Score(b)) => b.total_cmp(a),
            (SortValue::Doc(a), SortValue::Doc(b)) => a.cmp(b),
            (SortValue::Value(a), SortValue::Value(b)) => a.cmp(b),
            (SortValue::Values(a), SortValue::Values(b)) => a.cmp(b),
            (SortValue::Multi(a), SortValue::Multi(b)) => a.cmp(b),
            (SortValue::Reverse(a), SortValue::Reverse(b)) => b.cmp(a),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

/// Trait for comparing documents of one partition.
pub trait DocComparator: Send + Sync {
    /// Compare two documents; `Less` means `a` ranks first.
    fn compare(&self, a: &ScoreDoc, b: &ScoreDoc) -> Ordering;

    /// Partition-independent comparable value of a document.
    fn value(&self, doc: &ScoreDoc) -> SortValue;
}

/// Orders by descending score.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScoreComparator;

impl DocComparator for ScoreComparator {
    fn compare(&self, a: &ScoreDoc, b: &ScoreDoc) -> Ordering {
        b.score.total_cmp(&a.score)
    }

    fn value(&self, doc: &ScoreDoc) -> SortValue {
        SortValue::Score(doc.score)
    }
}

/// Orders by ascending document id.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocIdComparator {
    base: u64,
}

impl DocIdComparator {
    /// Create a comparator for a partition starting at global id `base`.
    pub fn new(base: u64) -> Self {
        DocIdComparator { base }
    }
}

impl DocComparator for DocIdComparator {
    fn compare(&self, a: &ScoreDoc, b: &ScoreDoc) -> Ordering {
        a.doc.cmp(&b.doc)
    }

    fn value(&self, doc: &ScoreDoc) -> SortValue {
        SortValue::Doc(self.base + u64::from(doc.doc))
    }
}

/// Orders by term ordinal; documents without a value rank first.
#[derive(Debug)]
pub struct OrdinalComparator<'a> {
    source: &'a dyn OrdinalSource,
}

impl<'a> OrdinalComparator<'a> {
    /// Create a comparator over loaded field data.
    pub fn new(source: &'a dyn OrdinalSource) -> Self {
        OrdinalComparator { source }
    }
}

impl DocComparator for OrdinalComparator<'_> {
    fn compare(&self, a: &ScoreDoc, b: &ScoreDoc) -> Ordering {
        if self.source.is_single_valued() {
            self.source
                .first_ordinal(a.doc)
                .cmp(&self.source.first_ordinal(b.doc))
        } else {
            self.source
                .ordinals(a.doc)
                .cmp(&self.source.ordinals(b.doc))
        }
    }

    fn value(&self, doc: &ScoreDoc) -> SortValue {
        if self.source.is_single_valued() {
            SortValue::Value(self.source.raw_values_of(doc.doc).into_iter().next())
        } else {
            SortValue::Values(self.source.raw_values_of(doc.doc))
        }
    }
}

/// Treats every document as having no value.
#[derive(Debug, Default, Clone, Copy)]
pub struct MissingValueComparator;

impl DocComparator for MissingValueComparator {
    fn compare(&self, _a: &ScoreDoc, _b: &ScoreDoc) -> Ordering {
        Ordering::Equal
    }

    fn value(&self, _doc: &ScoreDoc) -> SortValue {
        SortValue::Value(None)
    }
}

/// Reverses another comparator. Reversing twice restores the inner order.
pub struct ReverseComparator<'a> {
    inner: Box<dyn DocComparator + 'a>,
}

impl<'a> ReverseComparator<'a> {
    /// Wrap a comparator.
    pub fn new(inner: Box<dyn DocComparator + 'a>) -> Self {
        ReverseComparator { inner }
    }
}

impl DocComparator for ReverseComparator<'_> {
    fn compare(&self, a: &ScoreDoc, b: &ScoreDoc) -> Ordering {
        self.inner.compare(b, a)
    }

    fn value(&self, doc: &ScoreDoc) -> SortValue {
        SortValue::Reverse(Box::new(self.inner.value(doc)))
    }
}

/// Compares by each comparator in turn.
pub struct CompositeComparator<'a> {
    comparators: Vec<Box<dyn DocComparator + 'a>>,
}

impl<'a> CompositeComparator<'a> {
    /// Chain comparators; earlier ones take precedence.
    pub fn new(comparators: Vec<Box<dyn DocComparator + 'a>>) -> Self {
        CompositeComparator { comparators }
    }
}

impl DocComparator for CompositeComparator<'_> {
    fn compare(&self, a: &ScoreDoc, b: &ScoreDoc) -> Ordering {
        for comparator in &self.comparators {
            let ord = comparator.compare(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    fn value(&self, doc: &ScoreDoc) -> SortValue {
        SortValue::Multi(self.comparators.iter().map(|c| c.value(doc)).collect())
    }
}
