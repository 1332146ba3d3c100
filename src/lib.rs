//! # drilldown
//!
//! Faceted browsing over an inverted index, split into partitions.
//!
//! ## Features
//!
//! - Ordinal term dictionaries for text and numeric fields
//! - Single-valued, multi-valued and range facet handlers with dependencies
//! - Selections with negation and drill-sideways counting
//! - Top-k sorting, grouping and facet-weighted scoring
//! - Merging of hits and facet counts across partitions, sequential or on a
//!   thread pool
//!
//! ```
//! use std::sync::Arc;
//!
//! use drilldown::prelude::*;
//!
//! let index = MemoryIndex::from_documents(vec![
//!     Document::new().with_field("color", "red"),
//!     Document::new().with_field("color", "blue"),
//!     Document::new().with_field("color", "red"),
//! ]);
//! let mut registry = FacetHandlerRegistry::new();
//! registry.register(Arc::new(SimpleFacetHandler::new("color", "color")));
//!
//! let readers: Vec<Arc<dyn IndexReader>> = vec![Arc::new(index)];
//! let browser =
//!     MultiPartitionBrowser::open(readers, &registry, BrowseContext::default()).unwrap();
//! let request = BrowseRequest::new(10).with_facet_spec("color", FacetSpec::default());
//! let result = browser.browse(&request).unwrap();
//!
//! assert_eq!(result.total_hits, 3);
//! assert_eq!(result.facet_values("color")[0].value, "red");
//! ```

pub mod browse;
pub mod cli;
pub mod config;
pub mod context;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod facet;
pub mod scoring;
pub mod sort;

pub mod prelude {
    pub use crate::browse::{
        BrowseHit, BrowseRequest, BrowseResult, BrowseSelection, CancellationToken, FacetBoost,
        MultiPartitionBrowser, Partition, ValueOperation,
    };
    pub use crate::config::{BrowseConfig, FacetHandlerConfig, HandlerSetConfig};
    pub use crate::context::BrowseContext;
    pub use crate::engine::memory::{Document, MemoryIndex};
    pub use crate::engine::{BooleanQuery, IndexReader, MatchAllQuery, Query, TermQuery};
    pub use crate::error::{DrilldownError, Result};
    pub use crate::facet::{
        FacetAccessible, FacetHandler, FacetHandlerRegistry, FacetSortOrder, FacetSpec,
        MultiValueFacetHandler, RangeFacetHandler, SimpleFacetHandler,
    };
    pub use crate::sort::SortField;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
