//! Browser context: configuration plus a diagnostic sink.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::BrowseConfig;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Worth knowing, nothing failed.
    Warning,
    /// A partition, field or hit could not be processed.
    Error,
}

/// A message reported while browsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Trace identifier of the request, if any.
    pub tid: Option<String>,
    /// Message.
    pub message: String,
}

/// Receives diagnostics.
pub trait DiagnosticSink: Send + Sync + Debug {
    /// Report one diagnostic.
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: Diagnostic) {
        let tid = diagnostic.tid.as_deref().unwrap_or("-");
        match diagnostic.severity {
            Severity::Warning => log::warn!("[{tid}] {}", diagnostic.message),
            Severity::Error => log::error!("[{tid}] {}", diagnostic.message),
        }
    }
}

/// Keeps diagnostics in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything reported so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }

    /// Drop everything reported so far.
    pub fn clear(&self) {
        self.diagnostics.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.lock().push(diagnostic);
    }
}

/// Configuration and diagnostics handed to a browser.
#[derive(Debug, Clone)]
pub struct BrowseContext {
    /// Browser configuration.
    pub config: BrowseConfig,
    /// Where diagnostics go.
    pub diagnostics: Arc<dyn DiagnosticSink>,
}

impl BrowseContext {
    /// Create a context logging through `log`.
    pub fn new(config: BrowseConfig) -> Self {
        BrowseContext {
            config,
            diagnostics: Arc::new(LogSink),
        }
    }

    /// Replace the diagnostic sink.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Report a warning.
    pub fn warn<S: Into<String>>(&self, tid: Option<&str>, message: S) {
        self.report(Severity::Warning, tid, message.into());
    }

    /// Report an error.
    pub fn error<S: Into<String>>(&self, tid: Option<&str>, message: S) {
        self.report(Severity::Error, tid, message.into());
    }

    fn report(&self, severity: Severity, tid: Option<&str>, message: String) {
        self.diagnostics.report(Diagnostic {
            severity,
            tid: tid.map(str::to_string),
            message,
        });
    }
}

impl Default for BrowseContext {
    fn default() -> Self {
        BrowseContext::new(BrowseConfig::default())
    }
}
