//! Browse requests, their execution over partitions, and results.
//!
//! A [`MultiPartitionBrowser`] runs a [`BrowseRequest`] against every
//! [`Partition`], then merges hits through the sort collector and facet
//! counts through each field's handler.

pub mod browser;
pub mod deadline;
pub mod map_reduce;
pub mod parser;
pub mod partition;
pub mod request;
pub mod result;

pub use self::browser::MultiPartitionBrowser;
pub use self::deadline::{CancellationToken, Deadline};
pub use self::map_reduce::{FieldValueCounter, MapReduceAggregator, MappedDocument};
pub use self::parser::{parse_facet_spec, parse_page, parse_selection, parse_sort, parse_term_query};
pub use self::partition::{Partition, PartitionOutcome, PartitionTask};
pub use self::request::{
    BrowseRequest, BrowseSelection, FacetBoost, SharedAggregator, ValueOperation,
};
pub use self::result::{BrowseHit, BrowseResult};
