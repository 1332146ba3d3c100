//! Browsing across partitions.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::browse::deadline::Deadline;
use crate::browse::partition::{Partition, PartitionOutcome, PartitionTask, group_facet_spec};
use crate::browse::request::{BrowseRequest, SharedAggregator};
use crate::browse::result::{BrowseHit, BrowseResult};
use crate::context::BrowseContext;
use crate::dictionary::RawValue;
use crate::engine::{BooleanQuery, DocId, IndexReader, MatchAllQuery, Query, Weight};
use crate::error::{DrilldownError, Result};
use crate::facet::FacetSpec;
use crate::facet::accessible::FacetCounts;
use crate::facet::handler::FacetHandler;
use crate::facet::registry::FacetHandlerRegistry;
use crate::sort::collector::{CollectedHit, SortCollector};

/// Runs the side aggregate's finalize hook when dropped.
struct FinalizeGuard<'a> {
    aggregator: Option<&'a SharedAggregator>,
}

impl Drop for FinalizeGuard<'_> {
    fn drop(&mut self) {
        if let Some(aggregator) = self.aggregator.take() {
            aggregator.lock().finalize();
        }
    }
}

/// Browses a set of partitions as one index.
///
/// Global document ids number the partitions back to back: a partition's
/// base is the sum of `max_doc` of every partition before it.
pub struct MultiPartitionBrowser {
    partitions: Vec<Partition>,
    doc_bases: Vec<u64>,
    context: BrowseContext,
    thread_pool: Option<Arc<ThreadPool>>,
}

impl MultiPartitionBrowser {
    /// Create a browser with the default context.
    pub fn new(partitions: Vec<Partition>) -> Result<Self> {
        Self::with_context(partitions, BrowseContext::default())
    }

    /// Create a browser.
    pub fn with_context(partitions: Vec<Partition>, context: BrowseContext) -> Result<Self> {
        let mut doc_bases = Vec::with_capacity(partitions.len());
        let mut base = 0u64;
        for partition in &partitions {
            doc_bases.push(base);
            base += u64::from(partition.max_doc());
        }

        let thread_pool = if context.config.parallel && partitions.len() > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(context.config.thread_count().min(partitions.len()))
                .thread_name(|i| format!("drilldown-partition-{i}"))
                .build()
                .map_err(|e| DrilldownError::other(format!("Failed to create thread pool: {e}")))?;
            Some(Arc::new(pool))
        } else {
            None
        };

        Ok(MultiPartitionBrowser {
            partitions,
            doc_bases,
            context,
            thread_pool,
        })
    }

    /// Open one partition per reader with the handlers of `registry`.
    pub fn open(
        readers: Vec<Arc<dyn IndexReader>>,
        registry: &FacetHandlerRegistry,
        context: BrowseContext,
    ) -> Result<Self> {
        let partitions = readers
            .into_iter()
            .map(|reader| Partition::open(reader, registry))
            .collect::<Result<Vec<_>>>()?;
        Self::with_context(partitions, context)
    }

    /// Browser context.
    pub fn context(&self) -> &BrowseContext {
        &self.context
    }

    /// Partitions in global id order.
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// One partition, for changes such as a handler only that shard carries.
    pub fn partition_mut(&mut self, partition: usize) -> Option<&mut Partition> {
        self.partitions.get_mut(partition)
    }

    /// Global id of the first document of `partition`.
    pub fn doc_base(&self, partition: usize) -> Option<u64> {
        self.doc_bases.get(partition).copied()
    }

    /// Live documents across partitions.
    pub fn num_docs(&self) -> u64 {
        self.partitions.iter().map(|p| u64::from(p.num_docs())).sum()
    }

    /// Facets loaded in any partition.
    pub fn facet_names(&self) -> BTreeSet<String> {
        self.partitions.iter().flat_map(|p| p.facet_names()).collect()
    }

    /// Handler of `name` from the first partition that has one.
    pub fn facet_handler(&self, name: &str) -> Option<Arc<dyn FacetHandler>> {
        self.partitions.iter().find_map(|p| p.facet_handler(name))
    }

    /// Load and register a handler in every partition.
    pub fn set_facet_handler(&mut self, handler: Arc<dyn FacetHandler>) -> Result<()> {
        for partition in &mut self.partitions {
            partition.set_facet_handler(Arc::clone(&handler))?;
        }
        Ok(())
    }

    /// Partition and local id of a global document id.
    pub fn locate(&self, global_doc: u64) -> Option<(usize, DocId)> {
        let partition = self.doc_bases.partition_point(|base| *base <= global_doc);
        let index = partition.checked_sub(1)?;
        let local = global_doc - self.doc_bases[index];
        if local >= u64::from(self.partitions[index].max_doc()) {
            return None;
        }
        Some((index, local as DocId))
    }

    fn located(&self, global_doc: u64) -> Result<(&Partition, DocId)> {
        let (index, doc) = self.locate(global_doc).ok_or_else(|| {
            DrilldownError::invalid_argument(format!("no document with global id {global_doc}"))
        })?;
        Ok((&self.partitions[index], doc))
    }

    /// Display values of a facet for a global document id.
    pub fn field_values(&self, global_doc: u64, field: &str) -> Result<Vec<String>> {
        let (partition, doc) = self.located(global_doc)?;
        partition.field_values(doc, field)
    }

    /// Raw values of a facet for a global document id.
    pub fn raw_field_values(&self, global_doc: u64, field: &str) -> Result<Vec<RawValue>> {
        let (partition, doc) = self.located(global_doc)?;
        partition.raw_field_values(doc, field)
    }

    /// Release every partition.
    pub fn dispose(&mut self) {
        for partition in &mut self.partitions {
            partition.dispose();
        }
    }

    fn validate(&self, request: &BrowseRequest) -> Result<()> {
        let known = self.facet_names();
        for field in &request.sort {
            if !field.is_builtin() && !known.contains(&field.field) {
                return Err(DrilldownError::invalid_argument(format!(
                    "unknown sort field '{}'",
                    field.field
                )));
            }
        }
        for field in &request.group_by {
            if !known.contains(field) {
                return Err(DrilldownError::invalid_argument(format!(
                    "unknown group-by field '{field}'"
                )));
            }
        }
        Ok(())
    }

    /// The request query ANDed with a zero-weight match-all clause, which
    /// drops deleted documents without changing scores.
    fn effective_query(request: &BrowseRequest) -> Box<dyn Query> {
        match &request.query {
            None => Box::new(MatchAllQuery::new()),
            Some(query) => Box::new(
                BooleanQuery::new()
                    .must(query.clone())
                    .must(Box::new(MatchAllQuery::new().with_boost(0.0))),
            ),
        }
    }

    fn run_partition(
        &self,
        index: usize,
        request: &BrowseRequest,
        weight: &dyn Weight,
        capacity: usize,
        deadline: &Deadline,
    ) -> Result<PartitionOutcome> {
        let task = PartitionTask {
            partition: index,
            doc_base: self.doc_bases[index],
            capacity,
            deadline,
            check_interval: self.context.config.deadline_check_interval,
        };
        let partition = &self.partitions[index];
        panic::catch_unwind(AssertUnwindSafe(|| partition.browse(request, weight, &task)))
            .unwrap_or_else(|_| Err(DrilldownError::other(format!("partition {index} panicked"))))
    }

    fn run_partitions(
        &self,
        request: &BrowseRequest,
        weights: &[Box<dyn Weight + '_>],
        capacity: usize,
        deadline: &Deadline,
    ) -> Vec<Result<PartitionOutcome>> {
        match &self.thread_pool {
            Some(pool) => pool.install(|| {
                weights
                    .par_iter()
                    .enumerate()
                    .map(|(i, weight)| self.run_partition(i, request, weight.as_ref(), capacity, deadline))
                    .collect::<Vec<_>>()
            }),
            None => weights
                .iter()
                .enumerate()
                .map(|(i, weight)| self.run_partition(i, request, weight.as_ref(), capacity, deadline))
                .collect(),
        }
    }

    fn record(&self, result: &mut BrowseResult, message: String) {
        self.context.error(result.tid.as_deref(), message.as_str());
        result.errors.push(message);
    }

    /// Run a browse over every partition and merge the results.
    ///
    /// Fails only for a malformed request or when the query can not be
    /// compiled. Failures of single partitions, facet merges and hit
    /// explanations are recorded in [`BrowseResult::errors`].
    pub fn browse(&self, request: &BrowseRequest) -> Result<BrowseResult> {
        let started = Instant::now();
        let (offset, count) = request.paging()?;
        self.validate(request)?;

        let query = Self::effective_query(request);
        let weights = self
            .partitions
            .iter()
            .enumerate()
            .map(|(i, partition)| {
                partition.compile(query.as_ref()).map_err(|e| {
                    DrilldownError::query_build(format!(
                        "{} on partition {i}: {e}",
                        query.description()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = BrowseResult {
            tid: request.tid.clone(),
            total_docs: self.num_docs(),
            ..Default::default()
        };

        let mut sort = SortCollector::new(self.partitions.len(), offset, count);
        if !request.group_by.is_empty() {
            sort = sort.with_max_per_group(request.max_per_group);
        }
        let deadline = Deadline::new(
            request.timeout.or(self.context.config.partition_timeout),
            request.cancellation.clone(),
        );

        let outcomes = {
            let _finalize = FinalizeGuard {
                aggregator: request.map_reduce.as_ref(),
            };
            self.run_partitions(request, &weights, sort.capacity(), &deadline)
        };

        let mut partials: BTreeMap<String, Vec<FacetCounts>> = BTreeMap::new();
        let mut group_partials: BTreeMap<String, Vec<FacetCounts>> = BTreeMap::new();
        for (i, outcome) in outcomes.into_iter().enumerate() {
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.record(&mut result, format!("partition {i}: {e}"));
                    continue;
                }
            };
            if let Err(e) = sort.absorb(i, outcome.hits) {
                self.record(&mut result, format!("partition {i}: {e}"));
                continue;
            }
            for (name, counts) in outcome.facets {
                partials.entry(name).or_default().push(counts);
            }
            for (name, counts) in outcome.groups {
                group_partials.entry(name).or_default().push(counts);
            }
        }

        for (name, spec) in &request.facet_specs {
            let parts = partials.remove(name).unwrap_or_default();
            if let Some(counts) = self.merge_facet(name, spec, parts, &mut result) {
                result.facets.insert(name.clone(), counts);
            }
        }
        let group_spec = group_facet_spec();
        for name in &request.group_by {
            let parts = group_partials.remove(name).unwrap_or_default();
            if let Some(counts) = self.merge_facet(name, &group_spec, parts, &mut result) {
                result.group_facets.insert(name.clone(), counts);
            }
        }

        let collected = sort.close()?;
        result.total_hits = collected.total_hits;
        result.total_groups = collected.total_groups;

        for hit in collected.hits {
            let browse_hit = self.browse_hit(request, &weights, hit, &mut result);
            result.hits.push(browse_hit);
        }

        if let Some(aggregator) = &request.map_reduce {
            result.map_reduce_result = aggregator.lock().result();
        }
        result.elapsed = started.elapsed();
        log::debug!(
            "Browse {} matched {} hits in {:?}",
            query.description(),
            result.total_hits,
            result.elapsed
        );
        Ok(result)
    }

    /// Merge partial counts of one field; a failure is recorded and yields
    /// `None`.
    fn merge_facet(
        &self,
        name: &str,
        spec: &FacetSpec,
        parts: Vec<FacetCounts>,
        result: &mut BrowseResult,
    ) -> Option<FacetCounts> {
        let merged = match self.facet_handler(name) {
            Some(handler) => handler.merge(spec, parts),
            None => FacetCounts::merge(name, spec.clone(), parts),
        };
        match merged {
            Ok(counts) => Some(counts),
            Err(e) => {
                let e = match e {
                    partial @ DrilldownError::PartialMerge { .. } => partial,
                    other => DrilldownError::partial_merge(name, other.to_string()),
                };
                self.record(result, e.to_string());
                None
            }
        }
    }

    fn browse_hit(
        &self,
        request: &BrowseRequest,
        weights: &[Box<dyn Weight + '_>],
        hit: CollectedHit,
        result: &mut BrowseResult,
    ) -> BrowseHit {
        let partition = &self.partitions[hit.partition];
        let mut browse_hit = BrowseHit {
            doc_id: hit.global_doc,
            partition: hit.partition,
            local_doc_id: hit.doc,
            score: hit.score,
            field_values: BTreeMap::new(),
            stored_fields: BTreeMap::new(),
            group_value: hit.group_key,
            group_hit_count: hit.group_hit_count,
            explanation: None,
        };

        if self.context.config.fetch_field_values {
            browse_hit.field_values = partition.all_field_values(hit.doc);
        }
        if request.fetch_stored_fields {
            match partition.reader().stored_fields(hit.doc) {
                Ok(fields) => browse_hit.stored_fields = fields,
                Err(e) => self.record(
                    result,
                    DrilldownError::partial_merge(format!("doc {}", hit.global_doc), e.to_string())
                        .to_string(),
                ),
            }
        }
        if request.explain {
            match weights[hit.partition].explain(hit.doc) {
                Ok(explanation) => browse_hit.explanation = Some(explanation),
                Err(e) => self.record(
                    result,
                    DrilldownError::partial_merge(format!("doc {}", hit.global_doc), e.to_string())
                        .to_string(),
                ),
            }
        }
        browse_hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::{Document, MemoryIndex};
    use crate::facet::simple::SimpleFacetHandler;

    fn browser() -> MultiPartitionBrowser {
        let mut registry = FacetHandlerRegistry::new();
        registry.register(Arc::new(SimpleFacetHandler::new("color", "color")));
        let readers: Vec<Arc<dyn IndexReader>> = vec![
            Arc::new(MemoryIndex::from_documents(vec![
                Document::new().with_field("color", "red"),
                Document::new().with_field("color", "blue"),
            ])),
            Arc::new(MemoryIndex::from_documents(vec![
                Document::new().with_field("color", "red"),
            ])),
        ];
        MultiPartitionBrowser::open(readers, &registry, BrowseContext::default()).unwrap()
    }

    #[test]
    fn test_locate_global_ids() {
        let browser = browser();
        assert_eq!(browser.locate(0), Some((0, 0)));
        assert_eq!(browser.locate(2), Some((1, 0)));
        assert_eq!(browser.locate(3), None);
        assert_eq!(browser.field_values(1, "color").unwrap(), vec!["blue"]);
        assert!(browser.field_values(9, "color").is_err());
    }

    #[test]
    fn test_unknown_sort_field_is_rejected() {
        let browser = browser();
        let request = BrowseRequest::new(10).with_sort(crate::sort::SortField::new("weight"));
        assert!(matches!(
            browser.browse(&request),
            Err(DrilldownError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_effective_query_adds_zero_weight_match_all() {
        let request = BrowseRequest::new(10)
            .with_query(Box::new(crate::engine::TermQuery::new("color", "red")));
        let query = MultiPartitionBrowser::effective_query(&request);
        assert_eq!(query.description(), "(+color:red +*:*^0)");
        let all = MultiPartitionBrowser::effective_query(&BrowseRequest::new(10));
        assert_eq!(all.description(), "*:*");
    }
}
