//! Integration tests for browsing across partitions.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use drilldown::browse::{FieldValueCounter, MapReduceAggregator, SharedAggregator};
use drilldown::config::BrowseConfig;
use drilldown::context::{MemorySink, Severity};
use drilldown::dictionary::{NumberFormat, TermType};
use drilldown::engine::{DocId, Explanation, TermEntry, Weight};
use drilldown::error::Result;
use drilldown::prelude::*;
use drilldown::scoring::AdditiveScoringFactory;

const COLORS: [&str; 4] = ["red", "blue", "green", "black"];
const TAGS: [&str; 3] = ["new", "sale", "old"];

fn random_documents(count: usize, seed: u64) -> Vec<Document> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let mut doc = Document::new()
                .with_field("color", COLORS[rng.random_range(0..COLORS.len())])
                .with_field("price", rng.random_range(0..100).to_string());
            for tag in TAGS {
                if rng.random_bool(0.4) {
                    doc.add_field("tag", tag);
                }
            }
            doc
        })
        .collect()
}

fn registry() -> FacetHandlerRegistry {
    let mut registry = FacetHandlerRegistry::new();
    registry.register(Arc::new(SimpleFacetHandler::new("color", "color")));
    registry.register(Arc::new(
        SimpleFacetHandler::new("price", "price")
            .with_term_type(TermType::Int)
            .with_format(NumberFormat::plain()),
    ));
    registry.register(Arc::new(MultiValueFacetHandler::new("tag", "tag")));
    registry.register(Arc::new(
        RangeFacetHandler::parse("price_range", "price", ["[* TO 50)", "[50 TO *]"]).unwrap(),
    ));
    registry
}

/// Contiguous split, so global ids match those of a single partition.
fn split(documents: &[Document], sizes: &[usize]) -> Vec<Arc<dyn IndexReader>> {
    let mut readers: Vec<Arc<dyn IndexReader>> = Vec::new();
    let mut start = 0;
    for size in sizes {
        let index = MemoryIndex::from_documents(documents[start..start + size].to_vec());
        readers.push(Arc::new(index));
        start += size;
    }
    readers
}

fn browser(readers: Vec<Arc<dyn IndexReader>>, config: BrowseConfig) -> MultiPartitionBrowser {
    MultiPartitionBrowser::open(readers, &registry(), BrowseContext::new(config)).unwrap()
}

fn colors() -> Vec<Document> {
    vec![
        Document::new().with_field("color", "red").with_field("price", "10"),
        Document::new().with_field("color", "blue").with_field("price", "30"),
        Document::new().with_field("color", "red").with_field("price", "70"),
        Document::new().with_field("color", "green").with_field("price", "50"),
        Document::new().with_field("color", "red").with_field("price", "20"),
        Document::new().with_field("color", "blue"),
    ]
}

fn full_request() -> BrowseRequest {
    let mut expand = FacetSpec::default();
    expand.expand_selection = true;
    BrowseRequest::new(15)
        .with_selection(BrowseSelection::new("tag").with_value("sale"))
        .with_selection(BrowseSelection::new("color").with_not_value("black"))
        .with_facet_spec("color", FacetSpec::new(1, 0, false, FacetSortOrder::HitsDesc))
        .with_facet_spec("tag", expand)
        .with_facet_spec("price_range", FacetSpec::default())
}

#[test]
fn test_partitioned_browse_matches_single_partition() -> Result<()> {
    let documents = random_documents(60, 42);
    let single = browser(split(&documents, &[60]), BrowseConfig::default());
    let multi = browser(split(&documents, &[25, 5, 30]), BrowseConfig::default());

    let request = full_request();
    let expected = single.browse(&request)?;
    let actual = multi.browse(&request)?;

    assert!(expected.total_hits > 0);
    assert_eq!(actual.total_hits, expected.total_hits);
    assert_eq!(actual.doc_ids(), expected.doc_ids());
    for name in ["color", "tag", "price_range"] {
        assert_eq!(actual.facets[name].counts(), expected.facets[name].counts());
        assert_eq!(actual.facet_values(name), expected.facet_values(name));
    }
    assert!(actual.errors.is_empty());
    Ok(())
}

#[test]
fn test_parallel_matches_sequential() -> Result<()> {
    let documents = random_documents(80, 7);
    let sequential = browser(split(&documents, &[20, 20, 20, 20]), BrowseConfig::default());
    let parallel = browser(
        split(&documents, &[20, 20, 20, 20]),
        BrowseConfig {
            parallel: true,
            thread_pool_size: Some(3),
            ..Default::default()
        },
    );

    let request = full_request().with_sort(SortField::reversed("price"));
    let expected = sequential.browse(&request)?;
    let actual = parallel.browse(&request)?;
    assert_eq!(actual.doc_ids(), expected.doc_ids());
    assert_eq!(actual.facets["tag"].counts(), expected.facets["tag"].counts());
    Ok(())
}

#[test]
fn test_sort_by_numeric_facet_with_missing_first() -> Result<()> {
    let browser = browser(split(&colors(), &[3, 3]), BrowseConfig::default());
    let result = browser.browse(&BrowseRequest::new(10).with_sort(SortField::new("price")))?;
    assert_eq!(result.doc_ids(), vec![5, 0, 4, 1, 3, 2]);
    assert_eq!(result.hits[1].field_values["price"], vec!["10"]);

    let result = browser.browse(&BrowseRequest::new(2).with_sort(SortField::reversed("price")))?;
    assert_eq!(result.doc_ids(), vec![2, 3]);
    Ok(())
}

#[test]
fn test_paging_past_the_end() -> Result<()> {
    let browser = browser(split(&colors(), &[2, 4]), BrowseConfig::default());
    let page = browser.browse(&BrowseRequest::new(2).with_paging(4, 2))?;
    assert_eq!(page.doc_ids(), vec![4, 5]);

    let past = browser.browse(&BrowseRequest::new(2).with_paging(10, 2))?;
    assert!(past.hits.is_empty());
    assert_eq!(past.total_hits, 6);

    let negative = browser.browse(&BrowseRequest::new(2).with_paging(-1, 2));
    assert!(matches!(negative, Err(DrilldownError::InvalidArgument(_))));
    Ok(())
}

#[test]
fn test_grouping_caps_hits_per_group() -> Result<()> {
    let browser = browser(split(&colors(), &[3, 3]), BrowseConfig::default());
    let result = browser.browse(&BrowseRequest::new(10).with_group_by("color", 1))?;

    assert_eq!(result.total_hits, 6);
    assert_eq!(result.total_groups, 3);
    assert_eq!(result.doc_ids(), vec![0, 1, 3]);
    let red = &result.hits[0];
    assert_eq!(red.group_value, Some(vec![vec!["red".to_string()]]));
    assert_eq!(red.group_hit_count, 3);

    let groups: Vec<(String, u64)> = result
        .group_values("color")
        .into_iter()
        .map(|f| (f.value, f.count))
        .collect();
    assert_eq!(
        groups,
        vec![("red".to_string(), 3), ("blue".to_string(), 2), ("green".to_string(), 1)]
    );
    assert!(result.facets.is_empty());
    Ok(())
}

#[test]
fn test_facet_boost_reorders_hits() -> Result<()> {
    let browser = browser(split(&colors(), &[3, 3]), BrowseConfig::default());
    let weights: BTreeMap<String, f32> = [("blue".to_string(), 3.0)].into_iter().collect();

    let result = browser.browse(
        &BrowseRequest::new(3).with_facet_boost(FacetBoost::new("color", weights.clone())),
    )?;
    assert_eq!(result.doc_ids(), vec![1, 5, 0]);
    assert_eq!(result.hits[0].score, 3.0);
    assert_eq!(result.hits[2].score, 1.0);

    let additive = FacetBoost::new("color", weights).with_factory(Arc::new(AdditiveScoringFactory));
    let result = browser.browse(&BrowseRequest::new(1).with_facet_boost(additive))?;
    assert_eq!(result.hits[0].score, 4.0);
    Ok(())
}

#[test]
fn test_map_reduce_sees_accepted_hits_and_finalizes_once() -> Result<()> {
    let browser = browser(split(&colors(), &[3, 3]), BrowseConfig::default());
    let counter = Arc::new(Mutex::new(FieldValueCounter::new("color")));
    let shared: SharedAggregator = counter.clone();

    let request = BrowseRequest::new(1)
        .with_selection(BrowseSelection::new("color").with_not_value("green"))
        .with_map_reduce(shared);
    let result = browser.browse(&request)?;

    let counter = counter.lock();
    assert_eq!(counter.counts()["red"], 3);
    assert_eq!(counter.counts()["blue"], 2);
    assert!(!counter.counts().contains_key("green"));
    assert_eq!(counter.finalized(), 1);
    let aggregate = result.map_reduce_result.unwrap();
    assert_eq!(aggregate["partition_hits"]["1"], 2);
    assert_eq!(counter.result().unwrap(), aggregate);
    Ok(())
}

#[test]
fn test_cancelled_browse_reports_partition_errors() -> Result<()> {
    let sink = Arc::new(MemorySink::new());
    let context = BrowseContext::default().with_diagnostics(sink.clone());
    let browser =
        MultiPartitionBrowser::open(split(&colors(), &[3, 3]), &registry(), context)?;

    let token = CancellationToken::new();
    token.cancel();
    let result = browser.browse(
        &BrowseRequest::new(10)
            .with_cancellation(token)
            .with_tid("cancel-1")
            .with_facet_spec("color", FacetSpec::default()),
    )?;

    assert_eq!(result.total_hits, 0);
    assert_eq!(result.errors.len(), 2);
    assert!(result.facets["color"].entries().is_empty());
    let diagnostics = sink.diagnostics();
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0].severity, Severity::Error);
    assert_eq!(diagnostics[0].tid.as_deref(), Some("cancel-1"));
    Ok(())
}

#[test]
fn test_deleted_documents_never_match() -> Result<()> {
    let mut index = MemoryIndex::from_documents(colors());
    index.delete_document(0)?;
    let readers: Vec<Arc<dyn IndexReader>> = vec![Arc::new(index)];
    let browser = browser(readers, BrowseConfig::default());

    let request = BrowseRequest::new(10)
        .with_query(Box::new(TermQuery::new("color", "red")))
        .with_explain(true)
        .with_facet_spec("color", FacetSpec::default());
    let result = browser.browse(&request)?;

    assert_eq!(result.doc_ids(), vec![2, 4]);
    assert_eq!(result.facets["color"].facet_hit_count("red"), 2);
    assert_eq!(result.total_docs, 5);
    let explanation = result.hits[0].explanation.as_ref().unwrap();
    assert_eq!(explanation.value, result.hits[0].score);
    Ok(())
}

#[derive(Debug, Clone)]
struct PhraseQuery;

impl Query for PhraseQuery {
    fn boost(&self) -> f32 {
        1.0
    }

    fn set_boost(&mut self, _boost: f32) {}

    fn description(&self) -> String {
        "\"red shoes\"".to_string()
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_uncompilable_query_is_fatal() {
    let browser = browser(split(&colors(), &[3, 3]), BrowseConfig::default());
    let result = browser.browse(&BrowseRequest::new(10).with_query(Box::new(PhraseQuery)));
    assert!(matches!(result, Err(DrilldownError::QueryBuild(_))));
}

#[test]
fn test_unknown_facet_is_empty() -> Result<()> {
    let browser = browser(split(&colors(), &[6]), BrowseConfig::default());
    let result = browser.browse(&BrowseRequest::new(1).with_facet_spec("brand", FacetSpec::default()))?;
    assert!(result.facet_values("brand").is_empty());
    assert!(result.facets.contains_key("brand"));
    Ok(())
}

#[test]
fn test_range_selection_with_value_facet() -> Result<()> {
    let browser = browser(split(&colors(), &[3, 3]), BrowseConfig::default());
    let request = BrowseRequest::new(10)
        .with_selection(BrowseSelection::new("price_range").with_value("[* TO 50)"))
        .with_facet_spec("color", FacetSpec::new(1, 5, false, FacetSortOrder::ValueAsc));
    let result = browser.browse(&request)?;

    assert_eq!(result.doc_ids(), vec![0, 1, 4]);
    let colors: Vec<(String, u64)> = result
        .facet_values("color")
        .into_iter()
        .map(|f| (f.value, f.count))
        .collect();
    assert_eq!(colors, vec![("blue".to_string(), 1), ("red".to_string(), 2)]);
    Ok(())
}

fn facet_pairs(result: &BrowseResult, name: &str) -> Vec<(String, u64)> {
    result
        .facet_values(name)
        .into_iter()
        .map(|f| (f.value, f.count))
        .collect()
}

#[test]
fn test_expanded_numeric_selection_is_partition_independent() -> Result<()> {
    let documents: Vec<Document> = ["7", "7", "7", "5"]
        .iter()
        .map(|n| Document::new().with_field("n", *n))
        .collect();
    let mut registry = FacetHandlerRegistry::new();
    registry.register(Arc::new(
        SimpleFacetHandler::new("n", "n").with_term_type(TermType::Int),
    ));
    let request = BrowseRequest::new(10)
        .with_selection(BrowseSelection::new("n").with_value("5"))
        .with_facet_spec("n", FacetSpec::new(1, 1, true, FacetSortOrder::HitsDesc));

    let single = MultiPartitionBrowser::open(split(&documents, &[4]), &registry, BrowseContext::default())?
        .browse(&request)?;
    let multi = MultiPartitionBrowser::open(split(&documents, &[3, 1]), &registry, BrowseContext::default())?
        .browse(&request)?;

    assert_eq!(multi.doc_ids(), vec![3]);
    assert_eq!(
        facet_pairs(&multi, "n"),
        vec![("0000000007".to_string(), 3), ("0000000005".to_string(), 1)]
    );
    assert_eq!(facet_pairs(&multi, "n"), facet_pairs(&single, "n"));
    Ok(())
}

#[test]
fn test_zero_min_hit_count_lists_unmatched_values() -> Result<()> {
    let documents = vec![
        Document::new().with_field("color", "red"),
        Document::new().with_field("color", "blue"),
    ];
    let browser = browser(split(&documents, &[1, 1]), BrowseConfig::default());
    let request = BrowseRequest::new(10)
        .with_selection(BrowseSelection::new("color").with_value("red"))
        .with_facet_spec("color", FacetSpec::new(0, 0, false, FacetSortOrder::ValueAsc));
    let result = browser.browse(&request)?;

    assert_eq!(result.doc_ids(), vec![0]);
    assert_eq!(
        facet_pairs(&result, "color"),
        vec![("blue".to_string(), 0), ("red".to_string(), 1)]
    );
    Ok(())
}

fn sized() -> Vec<Document> {
    ["5", "7", "5", "9"]
        .iter()
        .zip(["red", "blue", "red", "green"])
        .map(|(size, color)| Document::new().with_field("size", *size).with_field("color", color))
        .collect()
}

#[test]
fn test_failed_facet_merge_keeps_other_facets() -> Result<()> {
    let mut registry = FacetHandlerRegistry::new();
    registry.register(Arc::new(SimpleFacetHandler::new("color", "color")));
    registry.register(Arc::new(SimpleFacetHandler::new("size", "size")));
    let mut browser =
        MultiPartitionBrowser::open(split(&sized(), &[2, 2]), &registry, BrowseContext::default())?;
    let numeric = SimpleFacetHandler::new("size", "size")
        .with_term_type(TermType::Int)
        .with_format(NumberFormat::plain());
    browser
        .partition_mut(1)
        .unwrap()
        .set_facet_handler(Arc::new(numeric))?;

    let request = BrowseRequest::new(10)
        .with_facet_spec("color", FacetSpec::default())
        .with_facet_spec("size", FacetSpec::default());
    let result = browser.browse(&request)?;

    assert_eq!(result.total_hits, 4);
    assert!(!result.facets.contains_key("size"));
    assert_eq!(result.facets["color"].facet_hit_count("red"), 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("'size'"));
    Ok(())
}

#[test]
fn test_facet_loaded_in_one_partition() -> Result<()> {
    let mut browser = browser(split(&colors(), &[3, 3]), BrowseConfig::default());
    browser
        .partition_mut(1)
        .unwrap()
        .set_facet_handler(Arc::new(SimpleFacetHandler::new("shade", "color")))?;
    assert!(browser.facet_names().contains("shade"));

    let request = BrowseRequest::new(10)
        .with_facet_spec("shade", FacetSpec::new(1, 0, false, FacetSortOrder::ValueAsc));
    let result = browser.browse(&request)?;

    assert_eq!(result.total_hits, 6);
    assert_eq!(
        facet_pairs(&result, "shade"),
        vec![("blue".to_string(), 1), ("green".to_string(), 1), ("red".to_string(), 1)]
    );
    assert!(!result.hits[0].field_values.contains_key("shade"));
    assert_eq!(result.hits[3].field_values["shade"], vec!["green"]);
    assert!(result.errors.is_empty());
    Ok(())
}

/// In-memory index whose compiled queries can fail on demand.
#[derive(Debug)]
struct FlakyIndex {
    inner: MemoryIndex,
    fail_matches: bool,
    fail_explain: bool,
}

impl FlakyIndex {
    fn new(documents: &[Document], fail_matches: bool, fail_explain: bool) -> Self {
        FlakyIndex {
            inner: MemoryIndex::from_documents(documents.to_vec()),
            fail_matches,
            fail_explain,
        }
    }
}

struct FlakyWeight<'a> {
    inner: Box<dyn Weight + 'a>,
    fail_matches: bool,
    fail_explain: bool,
}

impl Weight for FlakyWeight<'_> {
    fn for_each_match(&self, visitor: &mut dyn FnMut(DocId, f32) -> Result<()>) -> Result<()> {
        if self.fail_matches {
            return Err(DrilldownError::index("postings unreadable"));
        }
        self.inner.for_each_match(visitor)
    }

    fn explain(&self, doc: DocId) -> Result<Explanation> {
        if self.fail_explain {
            return Err(DrilldownError::index(format!("no explanation for local doc {doc}")));
        }
        self.inner.explain(doc)
    }
}

impl IndexReader for FlakyIndex {
    fn max_doc(&self) -> u32 {
        self.inner.max_doc()
    }

    fn num_docs(&self) -> u32 {
        self.inner.num_docs()
    }

    fn is_deleted(&self, doc: DocId) -> bool {
        self.inner.is_deleted(doc)
    }

    fn field_names(&self) -> Vec<String> {
        self.inner.field_names()
    }

    fn terms<'a>(&'a self, field: &str) -> Box<dyn Iterator<Item = TermEntry<'a>> + 'a> {
        self.inner.terms(field)
    }

    fn stored_fields(&self, doc: DocId) -> Result<BTreeMap<String, Vec<String>>> {
        self.inner.stored_fields(doc)
    }

    fn compile<'a>(&'a self, query: &dyn Query) -> Result<Box<dyn Weight + 'a>> {
        Ok(Box::new(FlakyWeight {
            inner: self.inner.compile(query)?,
            fail_matches: self.fail_matches,
            fail_explain: self.fail_explain,
        }))
    }
}

#[test]
fn test_failed_partition_leaves_others_intact() -> Result<()> {
    let documents = colors();
    let readers: Vec<Arc<dyn IndexReader>> = vec![
        Arc::new(FlakyIndex::new(&documents[..3], false, false)),
        Arc::new(FlakyIndex::new(&documents[3..], true, false)),
    ];
    let browser = browser(readers, BrowseConfig::default());
    let result = browser.browse(&BrowseRequest::new(10).with_facet_spec("color", FacetSpec::default()))?;

    assert_eq!(result.doc_ids(), vec![0, 1, 2]);
    assert_eq!(result.total_hits, 3);
    assert_eq!(result.total_docs, 6);
    assert_eq!(result.facets["color"].facet_hit_count("red"), 2);
    assert_eq!(result.facets["color"].facet_hit_count("green"), 0);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("partition 1"));
    Ok(())
}

#[test]
fn test_failed_explanation_keeps_hit() -> Result<()> {
    let documents = colors();
    let readers: Vec<Arc<dyn IndexReader>> = vec![
        Arc::new(FlakyIndex::new(&documents[..3], false, false)),
        Arc::new(FlakyIndex::new(&documents[3..], false, true)),
    ];
    let browser = browser(readers, BrowseConfig::default());
    let result = browser.browse(&BrowseRequest::new(10).with_explain(true))?;

    assert_eq!(result.doc_ids(), vec![0, 1, 2, 3, 4, 5]);
    assert!(result.hits[..3].iter().all(|h| h.explanation.is_some()));
    assert!(result.hits[3..].iter().all(|h| h.explanation.is_none()));
    assert_eq!(result.errors.len(), 3);
    assert!(result.errors[0].contains("doc 3"));
    Ok(())
}
