//! Queryable facet counts.
//!
//! [`FacetCounts`] keeps the complete, untruncated value distribution of one
//! field, zero counts included. The facet spec (minimum count, maximum count, order, expand) is
//! applied on read, so per-partition counts can be summed first and the
//! spec applied once to the merged distribution.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::dictionary::RawValue;
use crate::error::{DrilldownError, Result};
use crate::facet::{FacetSortOrder, FacetSpec};

/// One facet value with its hit count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseFacet {
    /// Display value.
    pub value: String,
    /// Number of hits carrying the value.
    pub count: u64,
}

/// Read access to the facet values of one field.
pub trait FacetAccessible: Send + Sync + Debug {
    /// Values selected by the facet spec, in spec order.
    fn facets(&self) -> Vec<BrowseFacet>;

    /// Count of a single value, whether or not the spec would return it.
    fn facet(&self, value: &str) -> Option<BrowseFacet>;

    /// Hit count of a value, zero when absent.
    fn facet_hit_count(&self, value: &str) -> u64 {
        self.facet(value).map_or(0, |f| f.count)
    }
}

/// A counted value together with the key it orders by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetEntry {
    /// Display value.
    pub value: String,
    /// Ordering key; ordinal order within a partition and raw value order
    /// across partitions.
    pub sort_key: RawValue,
    /// Hit count.
    pub count: u64,
}

/// Complete value counts of one field.
#[derive(Debug, Clone)]
pub struct FacetCounts {
    name: String,
    spec: FacetSpec,
    entries: Vec<FacetEntry>,
    selected: BTreeSet<String>,
}

impl FacetCounts {
    /// Build counts from entries, kept in sort key order. Zero counts stay
    /// and are only returned when `min_hit_count` is 0.
    pub fn new<S: Into<String>>(name: S, spec: FacetSpec, mut entries: Vec<FacetEntry>) -> Self {
        entries.sort_by(|a, b| a.sort_key.cmp(&b.sort_key).then_with(|| a.value.cmp(&b.value)));
        FacetCounts {
            name: name.into(),
            spec,
            entries,
            selected: BTreeSet::new(),
        }
    }

    /// Counts with no values.
    pub fn empty<S: Into<String>>(name: S, spec: FacetSpec) -> Self {
        FacetCounts::new(name, spec, Vec::new())
    }

    /// Remember the values selected on this field, kept when the spec expands
    /// the selection.
    pub fn with_selected<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected.extend(values.into_iter().map(Into::into));
        self
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spec applied on read.
    pub fn spec(&self) -> &FacetSpec {
        &self.spec
    }

    /// Every counted value in ascending value order.
    pub fn entries(&self) -> &[FacetEntry] {
        &self.entries
    }

    /// Every counted value as a map, ignoring the spec.
    pub fn counts(&self) -> BTreeMap<String, u64> {
        self.entries
            .iter()
            .map(|e| (e.value.clone(), e.count))
            .collect()
    }

    /// Sum of all counts.
    pub fn total_count(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Sum partial counts of the same field by value.
    ///
    /// The result does not depend on the order of `parts`. Fails when two
    /// parts disagree on the ordering key of one value.
    pub fn merge<S: Into<String>>(name: S, spec: FacetSpec, parts: Vec<FacetCounts>) -> Result<Self> {
        let name = name.into();
        let mut merged: BTreeMap<String, FacetEntry> = BTreeMap::new();
        let mut selected = BTreeSet::new();

        for part in parts {
            selected.extend(part.selected);
            for entry in part.entries {
                match merged.get_mut(&entry.value) {
                    Some(existing) => {
                        if existing.sort_key.is_numeric() != entry.sort_key.is_numeric() {
                            return Err(DrilldownError::partial_merge(
                                name,
                                format!(
                                    "value {:?} is numeric in one partition and text in another",
                                    entry.value
                                ),
                            ));
                        }
                        existing.count += entry.count;
                    }
                    None => {
                        merged.insert(entry.value.clone(), entry);
                    }
                }
            }
        }

        let mut counts = FacetCounts::new(name, spec, merged.into_values().collect());
        counts.selected = selected;
        Ok(counts)
    }

    fn ordered(&self) -> Vec<&FacetEntry> {
        let mut list: Vec<&FacetEntry> = self
            .entries
            .iter()
            .filter(|e| e.count >= u64::from(self.spec.min_hit_count))
            .collect();
        if self.spec.order_by == FacetSortOrder::HitsDesc {
            // stable: value order stays the tie-break
            list.sort_by(|a, b| b.count.cmp(&a.count));
        }
        list
    }
}

impl FacetAccessible for FacetCounts {
    fn facets(&self) -> Vec<BrowseFacet> {
        let mut list = self.ordered();
        if self.spec.max_count > 0 {
            list.truncate(self.spec.max_count);
        }
        let mut out: Vec<BrowseFacet> = list
            .iter()
            .map(|e| BrowseFacet {
                value: e.value.clone(),
                count: e.count,
            })
            .collect();

        if self.spec.expand_selection {
            for value in &self.selected {
                if out.iter().all(|f| &f.value != value) {
                    out.push(BrowseFacet {
                        value: value.clone(),
                        count: self.facet_hit_count(value),
                    });
                }
            }
        }
        out
    }

    fn facet(&self, value: &str) -> Option<BrowseFacet> {
        self.entries
            .iter()
            .find(|e| e.value == value)
            .map(|e| BrowseFacet {
                value: e.value.clone(),
                count: e.count,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: &str, count: u64) -> FacetEntry {
        FacetEntry {
            value: value.to_string(),
            sort_key: RawValue::from(value),
            count,
        }
    }

    fn spec(min: u32, max: usize, order_by: FacetSortOrder) -> FacetSpec {
        FacetSpec {
            min_hit_count: min,
            max_count: max,
            expand_selection: false,
            order_by,
        }
    }

    fn values(facets: &[BrowseFacet]) -> Vec<(&str, u64)> {
        facets.iter().map(|f| (f.value.as_str(), f.count)).collect()
    }

    #[test]
    fn test_hits_order_breaks_ties_by_value() {
        let counts = FacetCounts::new(
            "color",
            spec(1, 0, FacetSortOrder::HitsDesc),
            vec![entry("red", 2), entry("blue", 3), entry("green", 2), entry("pink", 0)],
        );
        assert_eq!(
            values(&counts.facets()),
            vec![("blue", 3), ("green", 2), ("red", 2)]
        );
    }

    #[test]
    fn test_min_and_max_count() {
        let counts = FacetCounts::new(
            "color",
            spec(2, 1, FacetSortOrder::ValueAsc),
            vec![entry("red", 2), entry("blue", 1), entry("green", 5)],
        );
        assert_eq!(values(&counts.facets()), vec![("green", 5)]);
        assert_eq!(counts.facet_hit_count("blue"), 1);
        assert_eq!(counts.facet_hit_count("black"), 0);
    }

    #[test]
    fn test_zero_min_hit_count_lists_empty_values() {
        let entries = vec![entry("red", 1), entry("blue", 0)];
        let counts = FacetCounts::new("color", spec(0, 0, FacetSortOrder::ValueAsc), entries.clone());
        assert_eq!(values(&counts.facets()), vec![("blue", 0), ("red", 1)]);

        let counts = FacetCounts::new("color", spec(1, 0, FacetSortOrder::ValueAsc), entries);
        assert_eq!(values(&counts.facets()), vec![("red", 1)]);
    }

    #[test]
    fn test_expand_keeps_selected_values() {
        let mut facet_spec = spec(1, 1, FacetSortOrder::HitsDesc);
        facet_spec.expand_selection = true;
        let counts = FacetCounts::new(
            "color",
            facet_spec,
            vec![entry("red", 1), entry("blue", 4)],
        )
        .with_selected(["red"]);
        assert_eq!(values(&counts.facets()), vec![("blue", 4), ("red", 1)]);
    }

    #[test]
    fn test_merge_applies_spec_after_summing() {
        let part_spec = spec(3, 1, FacetSortOrder::HitsDesc);
        let a = FacetCounts::new("color", part_spec.clone(), vec![entry("red", 2), entry("blue", 2)]);
        let b = FacetCounts::new("color", part_spec.clone(), vec![entry("red", 2), entry("green", 3)]);

        let ab = FacetCounts::merge("color", part_spec.clone(), vec![a.clone(), b.clone()]).unwrap();
        let ba = FacetCounts::merge("color", part_spec, vec![b, a]).unwrap();

        assert_eq!(values(&ab.facets()), vec![("red", 4)]);
        assert_eq!(ab.counts(), ba.counts());
        assert_eq!(ab.total_count(), 9);
    }

    #[test]
    fn test_merge_rejects_mixed_key_types() {
        let a = FacetCounts::new("n", FacetSpec::default(), vec![entry("1", 1)]);
        let b = FacetCounts::new(
            "n",
            FacetSpec::default(),
            vec![FacetEntry {
                value: "1".to_string(),
                sort_key: RawValue::Int(1),
                count: 1,
            }],
        );
        let err = FacetCounts::merge("n", FacetSpec::default(), vec![a, b]).unwrap_err();
        assert!(matches!(err, DrilldownError::PartialMerge { .. }));
    }
}
