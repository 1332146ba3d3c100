//! Boundary to the inverted index engine.
//!
//! Browsing never touches index files directly. It consumes an
//! [`IndexReader`] per partition, compiles engine queries into a [`Weight`],
//! and walks the matching documents. [`memory::MemoryIndex`] is the in-memory
//! engine used by the command-line tool and the tests.

pub mod memory;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{self, Debug};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Partition-local document number.
pub type DocId = u32;

/// Trait for engine queries.
pub trait Query: Send + Sync + Debug {
    /// Get the boost factor for this query.
    fn boost(&self) -> f32;

    /// Set the boost factor for this query.
    fn set_boost(&mut self, boost: f32);

    /// Get a human-readable description of this query.
    fn description(&self) -> String;

    /// Clone this query.
    fn clone_box(&self) -> Box<dyn Query>;

    /// Get this query as Any for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn Query> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A query compiled against one reader.
pub trait Weight: Send + Sync {
    /// Visit every matching document in ascending id order with its score.
    ///
    /// The visitor may abort the walk by returning an error.
    fn for_each_match(&self, visitor: &mut dyn FnMut(DocId, f32) -> Result<()>) -> Result<()>;

    /// Explain the score of `doc`.
    fn explain(&self, doc: DocId) -> Result<Explanation>;
}

/// One term of a field with its posting list.
#[derive(Debug, Clone, Copy)]
pub struct TermEntry<'a> {
    /// Term text.
    pub term: &'a str,
    /// Documents containing the term, ascending. May include deleted documents.
    pub docs: &'a [DocId],
}

/// Read access to one partition of the index.
pub trait IndexReader: Send + Sync + Debug {
    /// One past the largest document id, deleted documents included.
    fn max_doc(&self) -> u32;

    /// Number of live documents.
    fn num_docs(&self) -> u32;

    /// Whether a document is logically deleted.
    fn is_deleted(&self, doc: DocId) -> bool;

    /// Names of all indexed fields.
    fn field_names(&self) -> Vec<String>;

    /// Terms of `field` in lexicographic order.
    fn terms<'a>(&'a self, field: &str) -> Box<dyn Iterator<Item = TermEntry<'a>> + 'a>;

    /// Stored field values of a document.
    fn stored_fields(&self, doc: DocId) -> Result<BTreeMap<String, Vec<String>>>;

    /// Compile a query for this reader.
    fn compile<'a>(&'a self, query: &dyn Query) -> Result<Box<dyn Weight + 'a>>;

    /// Number of documents containing `term` in `field`.
    fn doc_freq(&self, field: &str, term: &str) -> usize {
        self.terms(field)
            .find(|entry| entry.term == term)
            .map_or(0, |entry| entry.docs.len())
    }
}

/// A query matching every live document.
#[derive(Debug, Clone)]
pub struct MatchAllQuery {
    boost: f32,
}

impl MatchAllQuery {
    /// Create a new match-all query.
    pub fn new() -> Self {
        MatchAllQuery { boost: 1.0 }
    }

    /// Set the boost factor.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }
}

impl Default for MatchAllQuery {
    fn default() -> Self {
        MatchAllQuery::new()
    }
}

impl Query for MatchAllQuery {
    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        if self.boost == 1.0 {
            "*:*".to_string()
        } else {
            format!("*:*^{}", self.boost)
        }
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A query that matches documents containing a specific term.
///
/// The term is matched as-is, without analysis.
#[derive(Debug, Clone)]
pub struct TermQuery {
    field: String,
    term: String,
    boost: f32,
}

impl TermQuery {
    /// Create a new term query.
    pub fn new<F, T>(field: F, term: T) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        TermQuery {
            field: field.into(),
            term: term.into(),
            boost: 1.0,
        }
    }

    /// Get the field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Get the term.
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Set the boost factor.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }
}

impl Query for TermQuery {
    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        if self.boost == 1.0 {
            format!("{}:{}", self.field, self.term)
        } else {
            format!("{}:{}^{}", self.field, self.term, self.boost)
        }
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Conjunction of queries. Scores are the boosted sum of clause scores.
#[derive(Debug, Clone)]
pub struct BooleanQuery {
    clauses: Vec<Box<dyn Query>>,
    boost: f32,
}

impl BooleanQuery {
    /// Create an empty conjunction.
    pub fn new() -> Self {
        BooleanQuery {
            clauses: Vec::new(),
            boost: 1.0,
        }
    }

    /// Add a required clause.
    pub fn must(mut self, query: Box<dyn Query>) -> Self {
        self.clauses.push(query);
        self
    }

    /// Required clauses.
    pub fn clauses(&self) -> &[Box<dyn Query>] {
        &self.clauses
    }
}

impl Default for BooleanQuery {
    fn default() -> Self {
        BooleanQuery::new()
    }
}

impl Query for BooleanQuery {
    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        let inner: Vec<String> = self
            .clauses
            .iter()
            .map(|c| format!("+{}", c.description()))
            .collect();
        if self.boost == 1.0 {
            format!("({})", inner.join(" "))
        } else {
            format!("({})^{}", inner.join(" "), self.boost)
        }
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Score explanation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Contribution of this node.
    pub value: f32,
    /// What the value stands for.
    pub description: String,
    /// Sub-contributions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Explanation>,
}

impl Explanation {
    /// Create a leaf explanation.
    pub fn new<S: Into<String>>(value: f32, description: S) -> Self {
        Explanation {
            value,
            description: description.into(),
            details: Vec::new(),
        }
    }

    /// Attach a sub-explanation.
    pub fn with_detail(mut self, detail: Explanation) -> Self {
        self.details.push(detail);
        self
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_node(node: &Explanation, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            writeln!(f, "{:indent$}{} = {}", "", node.value, node.description, indent = depth * 2)?;
            for detail in &node.details {
                write_node(detail, depth + 1, f)?;
            }
            Ok(())
        }
        write_node(self, 0, f)
    }
}
