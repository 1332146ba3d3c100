//! Configuration for browsers and facet handlers.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dictionary::{NumberFormat, NumberLocale, TermType};
use crate::error::Result;
use crate::facet::FacetSpec;
use crate::facet::handler::FacetHandler;
use crate::facet::multi_value::MultiValueFacetHandler;
use crate::facet::range::RangeFacetHandler;
use crate::facet::registry::FacetHandlerRegistry;
use crate::facet::simple::SimpleFacetHandler;

/// Configuration of a multi-partition browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseConfig {
    /// Run partitions on a thread pool instead of one after another.
    pub parallel: bool,

    /// Thread pool size for parallel execution.
    /// If None, uses the number of CPU cores.
    pub thread_pool_size: Option<usize>,

    /// Default time budget of one browse call.
    pub partition_timeout: Option<Duration>,

    /// Matches scanned between two deadline checks.
    pub deadline_check_interval: usize,

    /// Facet spec used for facets requested without one.
    pub default_facet_spec: FacetSpec,

    /// Attach the facet values of every loaded facet to each hit.
    pub fetch_field_values: bool,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            thread_pool_size: None,
            partition_timeout: None,
            deadline_check_interval: 1024,
            default_facet_spec: FacetSpec::default(),
            fetch_field_values: true,
        }
    }
}

impl BrowseConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Threads to run partitions on.
    pub fn thread_count(&self) -> usize {
        self.thread_pool_size.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Definition of a handler over one index field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldHandlerConfig {
    /// Handler name.
    pub name: String,
    /// Index field; defaults to the handler name.
    #[serde(default)]
    pub field: Option<String>,
    /// Value type.
    #[serde(default)]
    pub term_type: TermType,
    /// Display pattern of numeric values, e.g. `0000000000`.
    #[serde(default)]
    pub format: Option<String>,
    /// Number locale used for display and parsing.
    #[serde(default)]
    pub locale: Option<NumberLocale>,
    /// Handlers this one depends on.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl FieldHandlerConfig {
    fn field(&self) -> &str {
        self.field.as_deref().unwrap_or(&self.name)
    }

    fn number_format(&self) -> Option<NumberFormat> {
        if self.format.is_none() && self.locale.is_none() {
            return None;
        }
        Some(NumberFormat {
            pattern: self.format.clone(),
            locale: self.locale.clone(),
        })
    }
}

/// Definition of a range handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeHandlerConfig {
    /// Handler name.
    pub name: String,
    /// Handler whose values the ranges apply to.
    pub source: String,
    /// Range expressions such as `[* TO 10)`.
    pub ranges: Vec<String>,
}

/// Definition of one facet handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FacetHandlerConfig {
    /// Single-valued field.
    Simple(FieldHandlerConfig),
    /// Multi-valued field.
    Multi(FieldHandlerConfig),
    /// Ranges over another handler.
    Range(RangeHandlerConfig),
}

impl FacetHandlerConfig {
    /// Handler name.
    pub fn name(&self) -> &str {
        match self {
            FacetHandlerConfig::Simple(c) | FacetHandlerConfig::Multi(c) => &c.name,
            FacetHandlerConfig::Range(c) => &c.name,
        }
    }

    /// Build the handler.
    pub fn build(&self) -> Result<Arc<dyn FacetHandler>> {
        Ok(match self {
            FacetHandlerConfig::Simple(c) => {
                let mut handler =
                    SimpleFacetHandler::new(c.name.clone(), c.field()).with_term_type(c.term_type);
                if let Some(format) = c.number_format() {
                    handler = handler.with_format(format);
                }
                for dep in &c.depends_on {
                    handler = handler.with_dependency(dep.clone());
                }
                Arc::new(handler)
            }
            FacetHandlerConfig::Multi(c) => {
                let mut handler = MultiValueFacetHandler::new(c.name.clone(), c.field())
                    .with_term_type(c.term_type);
                if let Some(format) = c.number_format() {
                    handler = handler.with_format(format);
                }
                for dep in &c.depends_on {
                    handler = handler.with_dependency(dep.clone());
                }
                Arc::new(handler)
            }
            FacetHandlerConfig::Range(c) => Arc::new(RangeFacetHandler::parse(
                c.name.clone(),
                c.source.clone(),
                &c.ranges,
            )?),
        })
    }
}

/// A set of facet handler definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlerSetConfig {
    /// Definitions in registration order.
    #[serde(default)]
    pub handlers: Vec<FacetHandlerConfig>,
}

impl HandlerSetConfig {
    /// Parse definitions from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load definitions from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Build and register every handler, in definition order.
    pub fn into_registry(self) -> Result<FacetHandlerRegistry> {
        let mut registry = FacetHandlerRegistry::new();
        for definition in &self.handlers {
            registry.register(definition.build()?);
        }
        Ok(registry)
    }
}
