//! One partition (shard) of a browser.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::browse::deadline::Deadline;
use crate::browse::map_reduce::MappedDocument;
use crate::browse::request::{BrowseRequest, FacetBoost};
use crate::dictionary::{RawValue, TermValues};
use crate::engine::{DocId, IndexReader, Query, Weight};
use crate::error::{DrilldownError, Result};
use crate::facet::accessible::FacetCounts;
use crate::facet::collector::FacetCountCollector;
use crate::facet::data::{FacetData, FacetDataMap, OrdinalSource};
use crate::facet::filter::{DocFilter, EmptyFilter};
use crate::facet::handler::FacetHandler;
use crate::facet::registry::FacetHandlerRegistry;
use crate::facet::{FacetSortOrder, FacetSpec};
use crate::scoring::FacetTermScoringFunction;
use crate::sort::collector::{GroupKey, GroupKeyFn, PartitionHits, PartitionSortCollector};
use crate::sort::comparator::{
    CompositeComparator, DocComparator, DocIdComparator, MissingValueComparator,
    ReverseComparator, ScoreComparator, ScoreDoc,
};
use crate::sort::{DOC_FIELD, SCORE_FIELD, SortField};

/// Facet spec of group-by field counts: every group, largest first.
pub fn group_facet_spec() -> FacetSpec {
    FacetSpec::new(1, 0, false, FacetSortOrder::HitsDesc)
}

/// Where and how one partition runs within a browse.
#[derive(Debug, Clone)]
pub struct PartitionTask<'a> {
    /// Partition index.
    pub partition: usize,
    /// Global id of the partition's first document.
    pub doc_base: u64,
    /// Hits to retain.
    pub capacity: usize,
    /// Deadline of the browse.
    pub deadline: &'a Deadline,
    /// Matches scanned between deadline checks.
    pub check_interval: usize,
}

/// What one partition contributes to a browse.
#[derive(Debug, Clone, Default)]
pub struct PartitionOutcome {
    /// Retained hits.
    pub hits: PartitionHits,
    /// Partial facet counts, by handler name.
    pub facets: BTreeMap<String, FacetCounts>,
    /// Partial counts of the group-by fields over accepted hits.
    pub groups: BTreeMap<String, FacetCounts>,
}

struct FacetSlot<'a> {
    collector: Box<dyn FacetCountCollector + 'a>,
    own_filter: Option<usize>,
}

enum BoostWeights<'a> {
    Ordinals(&'a dyn OrdinalSource, Vec<Option<f32>>),
    Values(&'a dyn FacetHandler, &'a FacetData, &'a BTreeMap<String, f32>),
}

struct Booster<'a> {
    function: Box<dyn FacetTermScoringFunction>,
    weights: BoostWeights<'a>,
}

impl Booster<'_> {
    fn apply(&mut self, doc: DocId, base: f32) -> f32 {
        let function = &mut self.function;
        function.clear_scores();
        match &self.weights {
            BoostWeights::Ordinals(source, weights) => {
                source.for_each_ordinal(doc, &mut |ord| {
                    if let Some(Some(weight)) = weights.get(ord) {
                        function.score_and_collect(*weight);
                    }
                });
            }
            BoostWeights::Values(handler, data, weights) => {
                for value in handler.field_values(*data, doc).unwrap_or_default() {
                    if let Some(weight) = weights.get(&value) {
                        function.score_and_collect(*weight);
                    }
                }
            }
        }
        function.combine(base)
    }
}

/// A shard's reader plus its loaded facet handlers.
#[derive(Debug)]
pub struct Partition {
    reader: Arc<dyn IndexReader>,
    registry: FacetHandlerRegistry,
    data: FacetDataMap,
    disposed: bool,
}

impl Partition {
    /// Open a partition, loading every handler of `registry` in dependency
    /// order. Fails when any handler fails to load.
    pub fn open(reader: Arc<dyn IndexReader>, registry: &FacetHandlerRegistry) -> Result<Self> {
        let data = registry.load_all(reader.as_ref())?;
        log::debug!(
            "Opened partition with {} docs and {} facets",
            reader.num_docs(),
            data.len()
        );
        Ok(Partition {
            reader,
            registry: registry.clone(),
            data,
            disposed: false,
        })
    }

    /// Index reader of the partition.
    pub fn reader(&self) -> &dyn IndexReader {
        self.reader.as_ref()
    }

    /// Number of live documents.
    pub fn num_docs(&self) -> u32 {
        self.reader.num_docs()
    }

    /// One past the largest local document id.
    pub fn max_doc(&self) -> u32 {
        self.reader.max_doc()
    }

    /// Names of the loaded facets.
    pub fn facet_names(&self) -> BTreeSet<String> {
        self.registry
            .resolve_all_names()
            .into_iter()
            .filter(|name| self.data.contains_key(name))
            .collect()
    }

    /// Handler registered under `name`.
    pub fn facet_handler(&self, name: &str) -> Option<Arc<dyn FacetHandler>> {
        self.registry.get(name).cloned()
    }

    /// Loaded data of a facet.
    pub fn facet_data(&self, name: &str) -> Option<&FacetData> {
        self.data.get(name).map(|d| d.as_ref())
    }

    /// Load and register a handler at runtime, replacing one of the same
    /// name. The handler sees the data of every facet already loaded.
    pub fn set_facet_handler(&mut self, handler: Arc<dyn FacetHandler>) -> Result<()> {
        self.ensure_open()?;
        let loaded = handler.load(self.reader.as_ref(), &self.data)?;
        self.data.insert(handler.name().to_string(), loaded);
        self.registry.register(handler);
        Ok(())
    }

    fn handler_and_data(&self, name: &str) -> Option<(&dyn FacetHandler, &FacetData)> {
        let handler = self.registry.get(name)?;
        let data = self.data.get(name)?;
        Some((handler.as_ref(), data.as_ref()))
    }

    /// Display values of a local document; empty for an unknown facet.
    pub fn field_values(&self, doc: DocId, field: &str) -> Result<Vec<String>> {
        match self.handler_and_data(field) {
            Some((handler, data)) => handler.field_values(data, doc),
            None => Ok(Vec::new()),
        }
    }

    /// Raw values of a local document; empty for an unknown facet.
    pub fn raw_field_values(&self, doc: DocId, field: &str) -> Result<Vec<RawValue>> {
        match self.handler_and_data(field) {
            Some((handler, data)) => handler.raw_field_values(data, doc),
            None => Ok(Vec::new()),
        }
    }

    /// Values of every loaded facet of a local document.
    pub fn all_field_values(&self, doc: DocId) -> BTreeMap<String, Vec<String>> {
        self.facet_names()
            .into_iter()
            .filter_map(|name| {
                let values = self.field_values(doc, &name).ok()?;
                (!values.is_empty()).then_some((name, values))
            })
            .collect()
    }

    /// Compile a query against this partition.
    pub fn compile(&self, query: &dyn Query) -> Result<Box<dyn Weight + '_>> {
        self.ensure_open()?;
        self.reader.compile(query)
    }

    /// Release the loaded facet data. Later browses fail.
    pub fn dispose(&mut self) {
        self.data.clear();
        self.disposed = true;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.disposed {
            return Err(DrilldownError::invalid_operation("partition is disposed"));
        }
        Ok(())
    }

    fn comparator(&self, sort: &[SortField], doc_base: u64) -> Result<Box<dyn DocComparator + '_>> {
        let mut comparators: Vec<Box<dyn DocComparator + '_>> = Vec::with_capacity(sort.len());
        for field in sort {
            let comparator: Box<dyn DocComparator + '_> = match field.field.as_str() {
                SCORE_FIELD => Box::new(ScoreComparator),
                DOC_FIELD => Box::new(DocIdComparator::new(doc_base)),
                name => match self.handler_and_data(name) {
                    Some((handler, data)) => handler.doc_comparator(data)?,
                    None => Box::new(MissingValueComparator),
                },
            };
            comparators.push(if field.reverse {
                Box::new(ReverseComparator::new(comparator))
            } else {
                comparator
            });
        }
        Ok(match comparators.len() {
            0 => Box::new(ScoreComparator),
            1 => comparators.remove(0),
            _ => Box::new(CompositeComparator::new(comparators)),
        })
    }

    fn group_key(&self, group_by: &[String]) -> Option<GroupKeyFn<'_>> {
        if group_by.is_empty() {
            return None;
        }
        let fields: Vec<Option<(&dyn FacetHandler, &FacetData)>> =
            group_by.iter().map(|f| self.handler_and_data(f)).collect();
        Some(Box::new(move |doc: DocId| -> GroupKey {
            fields
                .iter()
                .map(|field| match field {
                    Some((handler, data)) => handler.field_values(*data, doc).unwrap_or_default(),
                    None => Vec::new(),
                })
                .collect()
        }))
    }

    fn booster<'a>(&'a self, boost: &'a FacetBoost) -> Option<Booster<'a>> {
        let (handler, data) = self.handler_and_data(&boost.field)?;
        let weights = match handler.ordinal_source(data) {
            Some(source) => {
                let terms = source.term_values();
                let mut weights = vec![None; terms.len()];
                for (value, weight) in &boost.weights {
                    if let Ok(Some(ord)) = terms.ordinal_of(value) {
                        weights[ord] = Some(*weight);
                    }
                }
                BoostWeights::Ordinals(source, weights)
            }
            None => BoostWeights::Values(handler, data, &boost.weights),
        };
        Some(Booster {
            function: boost
                .factory
                .scoring_function(boost.weights.len(), self.num_docs()),
            weights,
        })
    }

    /// Run a compiled query over this partition.
    ///
    /// Every match passing all selections is collected for sorting and
    /// counted by every requested facet. A match failing only the selection
    /// of a facet whose spec expands the selection is still counted by that
    /// facet.
    pub fn browse(
        &self,
        request: &BrowseRequest,
        weight: &dyn Weight,
        task: &PartitionTask<'_>,
    ) -> Result<PartitionOutcome> {
        self.ensure_open()?;
        let what = format!("partition {}", task.partition);
        task.deadline.check(&what)?;

        let mut filters: Vec<(&str, Box<dyn DocFilter + '_>)> = Vec::new();
        for (field, selection) in &request.selections {
            if selection.is_empty() {
                continue;
            }
            match self.handler_and_data(field) {
                Some((handler, data)) => {
                    if let Some(filter) = handler.selection_filter(data, selection)? {
                        filters.push((field.as_str(), filter));
                    }
                }
                // no document here carries any value of the field
                None if selection.values.is_empty() => {}
                None => filters.push((field.as_str(), Box::new(EmptyFilter))),
            }
        }

        let mut slots = Vec::with_capacity(request.facet_specs.len());
        for (name, spec) in &request.facet_specs {
            let Some((handler, data)) = self.handler_and_data(name) else {
                continue;
            };
            let collector = handler.count_collector(data, spec, request.selections.get(name))?;
            let own_filter = if spec.expand_selection {
                filters.iter().position(|(field, _)| field == name)
            } else {
                None
            };
            slots.push(FacetSlot {
                collector,
                own_filter,
            });
        }

        let group_spec = group_facet_spec();
        let mut group_slots = Vec::with_capacity(request.group_by.len());
        for name in &request.group_by {
            if let Some((handler, data)) = self.handler_and_data(name) {
                group_slots.push(handler.count_collector(data, &group_spec, None)?);
            }
        }

        let mut collector = PartitionSortCollector::new(
            self.comparator(&request.sort, task.doc_base)?,
            task.capacity,
        );
        if let Some(key) = self.group_key(&request.group_by) {
            collector = collector.with_grouping(key, request.max_per_group);
        }
        let mut booster = request.facet_boost.as_ref().and_then(|b| self.booster(b));

        let interval = task.check_interval.max(1);
        let mut scanned = 0usize;
        weight.for_each_match(&mut |doc, score| {
            scanned += 1;
            if scanned % interval == 0 {
                task.deadline.check(&what)?;
            }

            let mut failures = 0;
            let mut failed = None;
            for (i, (_, filter)) in filters.iter().enumerate() {
                if !filter.matches(doc) {
                    failures += 1;
                    failed = Some(i);
                    if failures > 1 {
                        break;
                    }
                }
            }
            if failures == 1 {
                for slot in slots.iter_mut().filter(|s| s.own_filter == failed) {
                    slot.collector.collect(doc);
                }
                return Ok(());
            }
            if failures > 1 {
                return Ok(());
            }

            let score = match booster.as_mut() {
                Some(booster) => booster.apply(doc, score),
                None => score,
            };
            collector.collect(ScoreDoc::new(doc, score));
            for slot in slots.iter_mut() {
                slot.collector.collect(doc);
            }
            for group in group_slots.iter_mut() {
                group.collect(doc);
            }
            if let Some(aggregator) = &request.map_reduce {
                let mapped = MappedDocument::new(
                    task.partition,
                    doc,
                    task.doc_base + u64::from(doc),
                    score,
                    self,
                );
                aggregator.lock().map_document(&mapped)?;
            }
            Ok(())
        })?;

        if let Some(aggregator) = &request.map_reduce {
            aggregator.lock().finalize_partition(task.partition)?;
        }

        let facets = slots
            .into_iter()
            .map(|slot| {
                let counts = slot.collector.into_counts();
                (counts.name().to_string(), counts)
            })
            .collect();
        let groups = group_slots
            .into_iter()
            .map(|group| {
                let counts = group.into_counts();
                (counts.name().to_string(), counts)
            })
            .collect();

        Ok(PartitionOutcome {
            hits: collector.finish(task.partition, task.doc_base),
            facets,
            groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browse::request::BrowseSelection;
    use crate::engine::MatchAllQuery;
    use crate::engine::memory::{Document, MemoryIndex};
    use crate::facet::accessible::FacetAccessible;
    use crate::facet::simple::SimpleFacetHandler;

    fn partition() -> Partition {
        let index = MemoryIndex::from_documents(vec![
            Document::new().with_field("color", "red").with_field("size", "s"),
            Document::new().with_field("color", "blue").with_field("size", "m"),
            Document::new().with_field("color", "red").with_field("size", "m"),
            Document::new().with_field("color", "green").with_field("size", "s"),
        ]);
        let mut registry = FacetHandlerRegistry::new();
        registry.register(Arc::new(SimpleFacetHandler::new("color", "color")));
        registry.register(Arc::new(SimpleFacetHandler::new("size", "size")));
        Partition::open(Arc::new(index), &registry).unwrap()
    }

    fn run(partition: &Partition, request: &BrowseRequest) -> Result<PartitionOutcome> {
        let deadline = Deadline::none();
        let task = PartitionTask {
            partition: 0,
            doc_base: 100,
            capacity: 10,
            deadline: &deadline,
            check_interval: 1,
        };
        let weight = partition.compile(&MatchAllQuery::new())?;
        partition.browse(request, weight.as_ref(), &task)
    }

    #[test]
    fn test_selection_and_counts() {
        let partition = partition();
        let request = BrowseRequest::new(10)
            .with_selection(BrowseSelection::new("color").with_value("red"))
            .with_facet_spec("size", FacetSpec::default())
            .with_facet_spec("color", FacetSpec::default());
        let outcome = run(&partition, &request).unwrap();

        assert_eq!(outcome.hits.total_hits, 2);
        let globals: Vec<u64> = outcome.hits.hits.iter().map(|h| h.global_doc).collect();
        assert_eq!(globals, vec![100, 102]);
        assert_eq!(outcome.facets["size"].facet_hit_count("s"), 1);
        assert_eq!(outcome.facets["color"].facet_hit_count("blue"), 0);
    }

    #[test]
    fn test_expanded_facet_counts_sideways() {
        let partition = partition();
        let mut expand = FacetSpec::default();
        expand.expand_selection = true;
        let request = BrowseRequest::new(10)
            .with_selection(BrowseSelection::new("color").with_value("red"))
            .with_selection(BrowseSelection::new("size").with_value("m"))
            .with_facet_spec("color", expand);
        let outcome = run(&partition, &request).unwrap();

        assert_eq!(outcome.hits.total_hits, 1);
        let color = &outcome.facets["color"];
        assert_eq!(color.facet_hit_count("red"), 1);
        assert_eq!(color.facet_hit_count("blue"), 1);
        assert_eq!(color.facet_hit_count("green"), 0);
    }

    #[test]
    fn test_unknown_selection_field_matches_nothing() {
        let partition = partition();
        let request = BrowseRequest::new(10)
            .with_selection(BrowseSelection::new("brand").with_value("acme"));
        assert_eq!(run(&partition, &request).unwrap().hits.total_hits, 0);

        let request = BrowseRequest::new(10)
            .with_selection(BrowseSelection::new("brand").with_not_value("acme"));
        assert_eq!(run(&partition, &request).unwrap().hits.total_hits, 4);
    }

    #[test]
    fn test_group_key_keeps_values_apart() {
        use crate::facet::multi_value::MultiValueFacetHandler;

        let index = MemoryIndex::from_documents(vec![
            Document::new().with_field("tag", "a,b"),
            Document::new().with_field("tag", "a").with_field("tag", "b"),
            Document::new().with_field("tag", "b").with_field("tag", "a"),
        ]);
        let mut registry = FacetHandlerRegistry::new();
        registry.register(Arc::new(MultiValueFacetHandler::new("tag", "tag")));
        let partition = Partition::open(Arc::new(index), &registry).unwrap();

        let outcome = run(&partition, &BrowseRequest::new(10).with_group_by("tag", 5)).unwrap();
        let totals = &outcome.hits.group_totals;
        assert_eq!(totals.len(), 2);
        assert_eq!(totals.get(&vec![vec!["a,b".to_string()]]), Some(&1));
        assert_eq!(totals.get(&vec![vec!["a".to_string(), "b".to_string()]]), Some(&2));
    }

    #[test]
    fn test_runtime_handler_and_dispose() {
        let mut partition = partition();
        partition
            .set_facet_handler(Arc::new(SimpleFacetHandler::new("shade", "color")))
            .unwrap();
        assert!(partition.facet_names().contains("shade"));
        assert_eq!(partition.field_values(1, "shade").unwrap(), vec!["blue"]);
        assert!(partition.field_values(1, "nope").unwrap().is_empty());

        partition.dispose();
        assert!(run(&partition, &BrowseRequest::new(10)).is_err());
    }
}
