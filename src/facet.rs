//! Facet handlers, facet data and facet counting.
//!
//! A [`FacetHandler`] is declared once per field and shared by every
//! partition. Opening a partition loads each registered handler against the
//! partition's reader, in dependency order, producing partition-scoped
//! [`FacetData`](data::FacetData). During a browse the handler turns that
//! data into selection filters, count collectors and sort comparators.

pub mod accessible;
pub mod collector;
pub mod data;
pub mod filter;
pub mod handler;
pub mod multi_value;
pub mod range;
pub mod registry;
pub mod simple;

use serde::{Deserialize, Serialize};

pub use self::accessible::{BrowseFacet, FacetAccessible, FacetCounts, FacetEntry};
pub use self::collector::{BucketCountCollector, FacetCountCollector, OrdinalCountCollector};
pub use self::data::{FacetData, FacetDataCache, FacetDataMap, MultiValueFacetDataCache};
pub use self::filter::DocFilter;
pub use self::handler::FacetHandler;
pub use self::multi_value::MultiValueFacetHandler;
pub use self::range::{FacetRange, RangeFacetHandler};
pub use self::registry::FacetHandlerRegistry;
pub use self::simple::SimpleFacetHandler;

/// Order of the values a facet returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FacetSortOrder {
    /// Highest hit count first, ties by value.
    #[default]
    #[serde(rename = "hits")]
    HitsDesc,
    /// Ascending value.
    #[serde(rename = "value")]
    ValueAsc,
}

/// Per-request facet configuration of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetSpec {
    /// Smallest hit count a value needs to be returned.
    pub min_hit_count: u32,
    /// Maximum number of values returned; 0 returns all.
    pub max_count: usize,
    /// Keep selected values and count this field drill-sideways.
    pub expand_selection: bool,
    /// Value order.
    pub order_by: FacetSortOrder,
}

/// Minimum hit count used when none is given.
pub const DEFAULT_MIN_HIT_COUNT: u32 = 1;

/// Maximum value count used when none is given.
pub const DEFAULT_MAX_COUNT: usize = 5;

impl Default for FacetSpec {
    fn default() -> Self {
        FacetSpec {
            min_hit_count: DEFAULT_MIN_HIT_COUNT,
            max_count: DEFAULT_MAX_COUNT,
            expand_selection: false,
            order_by: FacetSortOrder::HitsDesc,
        }
    }
}

impl FacetSpec {
    /// Create a spec.
    pub fn new(min_hit_count: u32, max_count: usize, expand_selection: bool, order_by: FacetSortOrder) -> Self {
        FacetSpec {
            min_hit_count,
            max_count,
            expand_selection,
            order_by,
        }
    }
}
