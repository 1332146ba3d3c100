//! In-memory index engine.
//!
//! Each document is a map from field name to string terms. Term postings keep
//! deleted documents, as segment postings do until a merge; only
//! [`MatchAllQuery`] consults the deletion bitmap.

use std::collections::BTreeMap;

use bit_vec::BitVec;
use serde_json::Value;

use crate::engine::{
    BooleanQuery, DocId, Explanation, IndexReader, MatchAllQuery, Query, TermEntry, TermQuery,
    Weight,
};
use crate::error::{DrilldownError, Result};

/// A document to be added to a [`MemoryIndex`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: BTreeMap<String, Vec<String>>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Document::default()
    }

    /// Add a value to a field.
    pub fn with_field<F: Into<String>, V: Into<String>>(mut self, field: F, value: V) -> Self {
        self.add_field(field, value);
        self
    }

    /// Add a value to a field.
    pub fn add_field<F: Into<String>, V: Into<String>>(&mut self, field: F, value: V) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(value.into());
    }

    /// Field values.
    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.fields
    }

    /// Build a document from a JSON object. Scalars become one term, arrays
    /// one term per element; nulls are skipped.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(DrilldownError::parse(format!(
                "expected a JSON object per document, got {value}"
            )));
        };
        let mut doc = Document::new();
        for (field, value) in map {
            match value {
                Value::Array(items) => {
                    for item in items {
                        if let Some(term) = json_term(item)? {
                            doc.add_field(field.as_str(), term);
                        }
                    }
                }
                other => {
                    if let Some(term) = json_term(other)? {
                        doc.add_field(field.as_str(), term);
                    }
                }
            }
        }
        Ok(doc)
    }
}

fn json_term(value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(DrilldownError::parse(format!(
            "nested value {other} cannot be indexed"
        ))),
    }
}

/// An in-memory inverted index holding one partition.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    postings: BTreeMap<String, BTreeMap<String, Vec<DocId>>>,
    stored: Vec<BTreeMap<String, Vec<String>>>,
    deleted: BitVec,
}

impl MemoryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        MemoryIndex::default()
    }

    /// Build an index from documents, numbered in order.
    pub fn from_documents<I: IntoIterator<Item = Document>>(docs: I) -> Self {
        let mut index = MemoryIndex::new();
        for doc in docs {
            index.add_document(doc);
        }
        index
    }

    /// Add a document and return its id.
    pub fn add_document(&mut self, doc: Document) -> DocId {
        let id = self.stored.len() as DocId;
        for (field, values) in &doc.fields {
            let terms = self.postings.entry(field.clone()).or_default();
            for value in values {
                let docs = terms.entry(value.clone()).or_default();
                if docs.last() != Some(&id) {
                    docs.push(id);
                }
            }
        }
        self.stored.push(doc.fields);
        self.deleted.push(false);
        id
    }

    /// Mark a document deleted. Its postings stay in place.
    pub fn delete_document(&mut self, doc: DocId) -> Result<()> {
        if doc as usize >= self.stored.len() {
            return Err(DrilldownError::index(format!(
                "document {doc} does not exist"
            )));
        }
        self.deleted.set(doc as usize, true);
        Ok(())
    }

    fn compile_node<'a>(&'a self, query: &dyn Query) -> Result<MemoryWeight<'a>> {
        let any = query.as_any();
        if any.downcast_ref::<MatchAllQuery>().is_some() {
            return Ok(MemoryWeight::All {
                boost: query.boost(),
            });
        }
        if let Some(term) = any.downcast_ref::<TermQuery>() {
            let docs = self
                .postings
                .get(term.field())
                .and_then(|terms| terms.get(term.term()))
                .map_or(&[][..], Vec::as_slice);
            let idf = 1.0 + (self.max_doc() as f32 / (docs.len() as f32 + 1.0)).ln();
            return Ok(MemoryWeight::Term {
                description: term.description(),
                docs,
                idf,
                boost: query.boost(),
            });
        }
        if let Some(boolean) = any.downcast_ref::<BooleanQuery>() {
            let clauses = boolean
                .clauses()
                .iter()
                .map(|clause| self.compile_node(clause.as_ref()))
                .collect::<Result<Vec<_>>>()?;
            return Ok(MemoryWeight::Conjunction {
                clauses,
                boost: query.boost(),
            });
        }
        Err(DrilldownError::query(format!(
            "unsupported query type: {}",
            query.description()
        )))
    }
}

impl IndexReader for MemoryIndex {
    fn max_doc(&self) -> u32 {
        self.stored.len() as u32
    }

    fn num_docs(&self) -> u32 {
        self.deleted.iter().filter(|d| !d).count() as u32
    }

    fn is_deleted(&self, doc: DocId) -> bool {
        self.deleted.get(doc as usize).unwrap_or(false)
    }

    fn field_names(&self) -> Vec<String> {
        self.postings.keys().cloned().collect()
    }

    fn terms<'a>(&'a self, field: &str) -> Box<dyn Iterator<Item = TermEntry<'a>> + 'a> {
        match self.postings.get(field) {
            Some(terms) => Box::new(terms.iter().map(|(term, docs)| TermEntry {
                term: term.as_str(),
                docs: docs.as_slice(),
            })),
            None => Box::new(std::iter::empty()),
        }
    }

    fn stored_fields(&self, doc: DocId) -> Result<BTreeMap<String, Vec<String>>> {
        self.stored
            .get(doc as usize)
            .cloned()
            .ok_or_else(|| DrilldownError::index(format!("document {doc} does not exist")))
    }

    fn compile<'a>(&'a self, query: &dyn Query) -> Result<Box<dyn Weight + 'a>> {
        let root = self.compile_node(query)?;
        Ok(Box::new(MemoryScorer { index: self, root }))
    }

    fn doc_freq(&self, field: &str, term: &str) -> usize {
        self.postings
            .get(field)
            .and_then(|terms| terms.get(term))
            .map_or(0, Vec::len)
    }
}

#[derive(Debug)]
enum MemoryWeight<'a> {
    All {
        boost: f32,
    },
    Term {
        description: String,
        docs: &'a [DocId],
        idf: f32,
        boost: f32,
    },
    Conjunction {
        clauses: Vec<MemoryWeight<'a>>,
        boost: f32,
    },
}

impl MemoryWeight<'_> {
    fn matches(&self, index: &MemoryIndex) -> Vec<(DocId, f32)> {
        match self {
            MemoryWeight::All { boost } => (0..index.max_doc())
                .filter(|doc| !index.is_deleted(*doc))
                .map(|doc| (doc, *boost))
                .collect(),
            MemoryWeight::Term {
                docs, idf, boost, ..
            } => docs.iter().map(|doc| (*doc, idf * boost)).collect(),
            MemoryWeight::Conjunction { clauses, boost } => {
                let mut iter = clauses.iter();
                let Some(first) = iter.next() else {
                    return Vec::new();
                };
                let mut acc = first.matches(index);
                for clause in iter {
                    acc = intersect(&acc, &clause.matches(index));
                    if acc.is_empty() {
                        break;
                    }
                }
                acc.into_iter()
                    .map(|(doc, score)| (doc, score * boost))
                    .collect()
            }
        }
    }

    fn explain(&self, index: &MemoryIndex, doc: DocId) -> Explanation {
        match self {
            MemoryWeight::All { boost } => {
                if index.is_deleted(doc) {
                    Explanation::new(0.0, "*:* (deleted)")
                } else {
                    Explanation::new(*boost, format!("*:*, boost {boost}"))
                }
            }
            MemoryWeight::Term {
                description,
                docs,
                idf,
                boost,
            } => {
                if docs.binary_search(&doc).is_ok() {
                    Explanation::new(idf * boost, format!("weight({description})"))
                        .with_detail(Explanation::new(*idf, "idf"))
                        .with_detail(Explanation::new(*boost, "boost"))
                } else {
                    Explanation::new(0.0, format!("no match on {description}"))
                }
            }
            MemoryWeight::Conjunction { clauses, boost } => {
                let details: Vec<Explanation> =
                    clauses.iter().map(|c| c.explain(index, doc)).collect();
                let matched = clauses.iter().all(|c| c.matches_doc(index, doc));
                let value = if matched {
                    details.iter().map(|d| d.value).sum::<f32>() * boost
                } else {
                    0.0
                };
                let mut explanation = Explanation::new(
                    value,
                    if matched {
                        format!("sum of, boost {boost}:")
                    } else {
                        "no match, a required clause failed:".to_string()
                    },
                );
                explanation.details = details;
                explanation
            }
        }
    }

    fn matches_doc(&self, index: &MemoryIndex, doc: DocId) -> bool {
        match self {
            MemoryWeight::All { .. } => !index.is_deleted(doc),
            MemoryWeight::Term { docs, .. } => docs.binary_search(&doc).is_ok(),
            MemoryWeight::Conjunction { clauses, .. } => {
                clauses.iter().all(|c| c.matches_doc(index, doc))
            }
        }
    }
}

fn intersect(a: &[(DocId, f32)], b: &[(DocId, f32)]) -> Vec<(DocId, f32)> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push((a[i].0, a[i].1 + b[j].1));
                i += 1;
                j += 1;
            }
        }
    }
    out
}

struct MemoryScorer<'a> {
    index: &'a MemoryIndex,
    root: MemoryWeight<'a>,
}

impl Weight for MemoryScorer<'_> {
    fn for_each_match(&self, visitor: &mut dyn FnMut(DocId, f32) -> Result<()>) -> Result<()> {
        for (doc, score) in self.root.matches(self.index) {
            visitor(doc, score)?;
        }
        Ok(())
    }

    fn explain(&self, doc: DocId) -> Result<Explanation> {
        if doc >= self.index.max_doc() {
            return Err(DrilldownError::index(format!(
                "document {doc} does not exist"
            )));
        }
        Ok(self.root.explain(self.index, doc))
    }
}
