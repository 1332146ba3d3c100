//! Error types for drilldown.
//!
//! All failures are represented by [`DrilldownError`]. A browse call either
//! fails outright with one of the fatal kinds (request shape, query
//! construction, unsupported term encoding) or returns a best-effort result
//! whose non-fatal problems are listed in `BrowseResult::errors`.
//!
//! # Examples
//!
//! ```
//! use drilldown::error::{DrilldownError, Result};
//!
//! fn check_paging(offset: i64) -> Result<()> {
//!     if offset < 0 {
//!         return Err(DrilldownError::invalid_argument("offset must be >= 0"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_paging(-1).is_err());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for drilldown operations.
#[derive(Error, Debug)]
pub enum DrilldownError {
    /// Negative paging values, malformed mini-language input and similar
    /// request-shape problems.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The effective query could not be built or compiled. Fatal for a browse.
    #[error("Query build failure: {0}")]
    QueryBuild(String),

    /// A numeric term looks like a pre-encoded (prefix coded) token.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Post-processing of a single field or hit failed.
    #[error("Merge failure for '{field}': {message}")]
    PartialMerge {
        /// Facet field or hit the failure belongs to.
        field: String,
        /// What went wrong.
        message: String,
    },

    /// Value parsing errors.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Facet handler or facet data errors.
    #[error("Facet error: {0}")]
    Facet(String),

    /// Errors reported by the underlying index engine.
    #[error("Index error: {0}")]
    Index(String),

    /// Query execution errors.
    #[error("Query error: {0}")]
    Query(String),

    /// Operation not allowed in the current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Operation cancelled through a cancellation token.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// A partition ran past its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with DrilldownError.
pub type Result<T> = std::result::Result<T, DrilldownError>;

impl DrilldownError {
    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        DrilldownError::InvalidArgument(msg.into())
    }

    /// Create a new query build error.
    pub fn query_build<S: Into<String>>(msg: S) -> Self {
        DrilldownError::QueryBuild(msg.into())
    }

    /// Create a new unsupported encoding error.
    pub fn unsupported_encoding<S: Into<String>>(msg: S) -> Self {
        DrilldownError::UnsupportedEncoding(msg.into())
    }

    /// Create a new partial merge error.
    pub fn partial_merge<F: Into<String>, S: Into<String>>(field: F, msg: S) -> Self {
        DrilldownError::PartialMerge {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Create a new parse error.
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        DrilldownError::Parse(msg.into())
    }

    /// Create a new facet error.
    pub fn facet<S: Into<String>>(msg: S) -> Self {
        DrilldownError::Facet(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        DrilldownError::Index(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        DrilldownError::Query(msg.into())
    }

    /// Create a new invalid operation error.
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        DrilldownError::InvalidOperation(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        DrilldownError::Cancelled(msg.into())
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        DrilldownError::Timeout(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DrilldownError::Other(msg.into())
    }

    /// Whether this error aborts a whole browse call rather than a single
    /// partition, field or hit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DrilldownError::InvalidArgument(_)
                | DrilldownError::QueryBuild(_)
                | DrilldownError::UnsupportedEncoding(_)
        )
    }
}
