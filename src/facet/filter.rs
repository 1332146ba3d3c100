//! Document filters built from facet selections.

use bit_vec::BitVec;

use crate::browse::request::ValueOperation;
use crate::dictionary::TermValues;
use crate::engine::DocId;
use crate::facet::data::OrdinalSource;

/// A per-partition document predicate.
pub trait DocFilter: Send + Sync {
    /// Whether the local document passes.
    fn matches(&self, doc: DocId) -> bool;
}

/// Matches documents by their term ordinals.
///
/// With [`ValueOperation::Or`] a document passes when any of its ordinals is
/// in the set; with [`ValueOperation::And`] it must carry all of them.
#[derive(Debug)]
pub struct OrdinalFilter<'a> {
    source: &'a dyn OrdinalSource,
    set: BitVec,
    required: usize,
    operation: ValueOperation,
}

impl<'a> OrdinalFilter<'a> {
    /// Create a filter over the given ordinals.
    pub fn new<I>(source: &'a dyn OrdinalSource, ordinals: I, operation: ValueOperation) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut set = BitVec::from_elem(source.term_values().len(), false);
        let mut required = 0;
        for ord in ordinals {
            if ord < set.len() && !set[ord] {
                set.set(ord, true);
                required += 1;
            }
        }
        OrdinalFilter {
            source,
            set,
            required,
            operation,
        }
    }

    /// Create a filter over a contiguous ordinal range `[start, end)`.
    pub fn range(source: &'a dyn OrdinalSource, start: usize, end: usize) -> Self {
        OrdinalFilter::new(source, start..end, ValueOperation::Or)
    }

    /// Filter that passes documents holding any ordinal in `set`.
    pub fn from_bits(source: &'a dyn OrdinalSource, set: BitVec) -> Self {
        let required = set.iter().filter(|b| *b).count();
        OrdinalFilter {
            source,
            set,
            required,
            operation: ValueOperation::Or,
        }
    }
}

impl DocFilter for OrdinalFilter<'_> {
    fn matches(&self, doc: DocId) -> bool {
        if self.required == 0 {
            return false;
        }
        let mut hits = 0;
        self.source.for_each_ordinal(doc, &mut |ord| {
            if self.set.get(ord).unwrap_or(false) {
                hits += 1;
            }
        });
        match self.operation {
            ValueOperation::Or => hits > 0,
            ValueOperation::And => hits == self.required,
        }
    }
}

/// Inverts another filter.
pub struct NotFilter<'a> {
    inner: Box<dyn DocFilter + 'a>,
}

impl<'a> NotFilter<'a> {
    /// Wrap a filter.
    pub fn new(inner: Box<dyn DocFilter + 'a>) -> Self {
        NotFilter { inner }
    }
}

impl DocFilter for NotFilter<'_> {
    fn matches(&self, doc: DocId) -> bool {
        !self.inner.matches(doc)
    }
}

/// Passes documents accepted by every inner filter.
pub struct AndFilter<'a> {
    filters: Vec<Box<dyn DocFilter + 'a>>,
}

impl<'a> AndFilter<'a> {
    /// Combine filters.
    pub fn new(filters: Vec<Box<dyn DocFilter + 'a>>) -> Self {
        AndFilter { filters }
    }
}

impl DocFilter for AndFilter<'_> {
    fn matches(&self, doc: DocId) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }
}

/// Matches nothing.
#[derive(Debug, Default)]
pub struct EmptyFilter;

impl DocFilter for EmptyFilter {
    fn matches(&self, _doc: DocId) -> bool {
        false
    }
}
