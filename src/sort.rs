//! Hit ordering: comparators and the top-k/merge collectors.

pub mod collector;
pub mod comparator;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use self::collector::{
    CollectedHit, CollectedHits, GroupKey, PartitionHits, PartitionSortCollector, SortCollector,
};
pub use self::comparator::{
    CompositeComparator, DocComparator, DocIdComparator, MissingValueComparator,
    OrdinalComparator, ReverseComparator, ScoreComparator, ScoreDoc, SortValue,
};

/// Sort field name for relevance.
pub const SCORE_FIELD: &str = "_score";

/// Sort field name for document order.
pub const DOC_FIELD: &str = "_doc";

/// One component of a sort order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    /// `_score`, `_doc` or a facet handler name.
    pub field: String,
    /// Reverse the field's natural order.
    #[serde(default)]
    pub reverse: bool,
}

impl SortField {
    /// Sort by a field in its natural order.
    pub fn new<S: Into<String>>(field: S) -> Self {
        SortField {
            field: field.into(),
            reverse: false,
        }
    }

    /// Sort by a field in reversed order.
    pub fn reversed<S: Into<String>>(field: S) -> Self {
        SortField {
            field: field.into(),
            reverse: true,
        }
    }

    /// Relevance order.
    pub fn score() -> Self {
        SortField::new(SCORE_FIELD)
    }

    /// Whether the field is handled without facet data.
    pub fn is_builtin(&self) -> bool {
        self.field == SCORE_FIELD || self.field == DOC_FIELD
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.reverse)
    }
}
