//! Command implementations for the drilldown CLI.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::browse::parser::{
    parse_facet_spec, parse_page, parse_selection, parse_sort, parse_term_query,
};
use crate::browse::{BrowseRequest, BrowseResult, MultiPartitionBrowser};
use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::{BrowseConfig, HandlerSetConfig};
use crate::context::BrowseContext;
use crate::engine::memory::{Document, MemoryIndex};
use crate::engine::{BooleanQuery, IndexReader, Query};
use crate::error::{DrilldownError, Result};
use crate::facet::registry::FacetHandlerRegistry;
use crate::facet::multi_value::MultiValueFacetHandler;

/// Execute a CLI command.
pub fn execute_command(args: DrilldownArgs) -> Result<()> {
    match &args.command {
        Command::Browse(browse_args) => {
            let result = run_browse(browse_args)?;
            output_result(&result, &args)
        }
        Command::Describe(describe_args) => {
            let description = run_describe(describe_args)?;
            output_result(&description, &args)
        }
    }
}

/// Read JSON-lines documents. Blank lines are skipped.
pub fn load_documents<P: AsRef<Path>>(path: P) -> Result<Vec<Document>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut documents = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).map_err(|e| {
            DrilldownError::parse(format!("line {}: {e}", line_num + 1))
        })?;
        documents.push(Document::from_json(&value)?);
    }
    log::info!(
        "Loaded {} documents from {}",
        documents.len(),
        path.as_ref().display()
    );
    Ok(documents)
}

/// Deal documents round-robin into `partitions` in-memory partitions.
pub fn build_partitions(
    documents: Vec<Document>,
    partitions: usize,
) -> Result<Vec<Arc<dyn IndexReader>>> {
    if partitions == 0 {
        return Err(DrilldownError::invalid_argument(
            "at least one partition is required",
        ));
    }
    let mut indexes: Vec<MemoryIndex> = (0..partitions).map(|_| MemoryIndex::new()).collect();
    for (i, doc) in documents.into_iter().enumerate() {
        indexes[i % partitions].add_document(doc);
    }
    Ok(indexes
        .into_iter()
        .map(|index| Arc::new(index) as Arc<dyn IndexReader>)
        .collect())
}

/// Handlers from a definition file, or one multi-valued handler per field.
pub fn load_registry(handlers: Option<&Path>, documents: &[Document]) -> Result<FacetHandlerRegistry> {
    if let Some(path) = handlers {
        return HandlerSetConfig::from_json_file(path)?.into_registry();
    }
    let fields: BTreeSet<&String> = documents.iter().flat_map(|d| d.fields().keys()).collect();
    let mut registry = FacetHandlerRegistry::new();
    for field in fields {
        registry.register(Arc::new(MultiValueFacetHandler::new(field.clone(), field.as_str())));
    }
    Ok(registry)
}

fn open_browser(source: &SourceArgs, config: BrowseConfig) -> Result<MultiPartitionBrowser> {
    let documents = load_documents(&source.documents)?;
    let registry = load_registry(source.handlers.as_deref(), &documents)?;
    let readers = build_partitions(documents, source.partitions)?;
    MultiPartitionBrowser::open(readers, &registry, BrowseContext::new(config))
}

/// Build the request described by the arguments. Without `--facet`, every
/// facet in `facet_names` is requested with `config`'s default spec.
pub fn build_request(
    args: &BrowseArgs,
    config: &BrowseConfig,
    facet_names: &BTreeSet<String>,
) -> Result<BrowseRequest> {
    let (offset, count) = parse_page(&args.page)?;
    let mut request = BrowseRequest::new(count).with_paging(offset, count);

    let mut queries = args
        .query
        .iter()
        .map(|q| parse_term_query(q).map(|q| Box::new(q) as Box<dyn Query>))
        .collect::<Result<Vec<_>>>()?;
    if queries.len() == 1 {
        request = request.with_query(queries.remove(0));
    } else if !queries.is_empty() {
        let query = queries
            .into_iter()
            .fold(BooleanQuery::new(), |query, clause| query.must(clause));
        request = request.with_query(Box::new(query));
    }

    if args.facet.is_empty() {
        for name in facet_names {
            request = request.with_facet_spec(name.clone(), config.default_facet_spec.clone());
        }
    }
    for facet in &args.facet {
        let (name, spec) = parse_facet_spec(facet)?;
        request = request.with_facet_spec(name, spec);
    }
    for selection in &args.select {
        request = request.with_selection(parse_selection(selection)?);
    }
    if let Some(sort) = &args.sort {
        for field in parse_sort(sort)? {
            request = request.with_sort(field);
        }
    }
    if let Some(group_by) = &args.group_by {
        request = request.with_group_by(group_by.clone(), args.max_per_group);
    }
    if let Some(timeout) = args.timeout_ms {
        request = request.with_timeout(Duration::from_millis(timeout));
    }

    let tid = args
        .tid
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    request.explain = args.explain;
    request.fetch_stored_fields = args.stored_fields;
    Ok(request.with_tid(tid))
}

/// Load documents and run one browse.
pub fn run_browse(args: &BrowseArgs) -> Result<BrowseResult> {
    let mut config = match &args.config {
        Some(path) => BrowseConfig::from_json_file(path)?,
        None => BrowseConfig::default(),
    };
    config.parallel |= args.parallel;

    let browser = open_browser(&args.source, config.clone())?;
    let request = build_request(args, &config, &browser.facet_names())?;
    log::debug!("Browse request: {request:?}");
    browser.browse(&request)
}

/// Load documents and summarize the partitions.
pub fn run_describe(args: &DescribeArgs) -> Result<IndexDescription> {
    let browser = open_browser(&args.source, BrowseConfig::default())?;
    let partitions = browser
        .partitions()
        .iter()
        .enumerate()
        .map(|(i, partition)| PartitionSummary {
            partition: i,
            doc_base: browser.doc_base(i).unwrap_or_default(),
            num_docs: partition.num_docs(),
            max_doc: partition.max_doc(),
        })
        .collect();
    Ok(IndexDescription {
        total_docs: browser.num_docs(),
        partitions,
        facets: browser.facet_names().into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_documents(dir: &Path) -> PathBuf {
        let path = dir.join("docs.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"color": "red", "tag": ["new", "sale"]}}"#).unwrap();
        writeln!(file, r#"{{"color": "blue", "tag": ["old"]}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"color": "red", "tag": ["old", "sale"]}}"#).unwrap();
        path
    }

    fn browse_args(documents: PathBuf, partitions: usize) -> BrowseArgs {
        BrowseArgs {
            source: SourceArgs {
                documents,
                handlers: None,
                partitions,
            },
            config: None,
            query: Vec::new(),
            facet: Vec::new(),
            select: Vec::new(),
            sort: None,
            page: "0:10".to_string(),
            group_by: None,
            max_per_group: 1,
            explain: false,
            stored_fields: false,
            parallel: false,
            timeout_ms: None,
            tid: Some("cli-test".to_string()),
        }
    }

    #[test]
    fn test_load_and_partition() {
        let dir = tempfile::tempdir().unwrap();
        let documents = load_documents(write_documents(dir.path())).unwrap();
        assert_eq!(documents.len(), 3);

        let readers = build_partitions(documents, 2).unwrap();
        assert_eq!(readers[0].num_docs(), 2);
        assert_eq!(readers[1].num_docs(), 1);
        assert!(build_partitions(Vec::new(), 0).is_err());
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"color\": \"red\"}\nnot json\n").unwrap();
        let error = load_documents(&path).unwrap_err();
        assert!(error.to_string().contains("line 2"));
    }

    #[test]
    fn test_run_browse_with_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = browse_args(write_documents(dir.path()), 2);
        args.select = vec!["tag:sale".to_string()];
        args.facet = vec!["color:1,5,false,hits".to_string()];

        let result = run_browse(&args).unwrap();
        assert_eq!(result.total_hits, 2);
        assert_eq!(result.tid.as_deref(), Some("cli-test"));
        let colors = result.facet_values("color");
        assert_eq!(colors.len(), 1);
        assert_eq!(colors[0].value, "red");
        assert_eq!(colors[0].count, 2);
    }

    #[test]
    fn test_default_facets_and_tid() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = browse_args(write_documents(dir.path()), 1);
        args.tid = None;
        let facet_names: BTreeSet<String> = ["color", "tag"].iter().map(|s| s.to_string()).collect();
        let request = build_request(&args, &BrowseConfig::default(), &facet_names).unwrap();
        assert_eq!(request.facet_specs.len(), 2);
        assert_eq!(request.tid.as_ref().map(|t| t.len()), Some(36));
    }

    #[test]
    fn test_run_describe() {
        let dir = tempfile::tempdir().unwrap();
        let args = DescribeArgs {
            source: SourceArgs {
                documents: write_documents(dir.path()),
                handlers: None,
                partitions: 2,
            },
        };
        let description = run_describe(&args).unwrap();
        assert_eq!(description.total_docs, 3);
        assert_eq!(description.partitions[1].doc_base, 2);
        assert_eq!(description.facets, vec!["color", "tag"]);
    }
}
