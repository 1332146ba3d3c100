//! Command line argument parsing for the drilldown CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// drilldown - faceted browsing over partitioned documents
#[derive(Parser, Debug, Clone)]
#[command(name = "drilldown")]
#[command(about = "Faceted browsing over JSON-lines documents split into partitions")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct DrilldownArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl DrilldownArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run one browse request
    Browse(BrowseArgs),

    /// Show partitions and loaded facets
    Describe(DescribeArgs),
}

/// Where documents come from and how they are split.
#[derive(Parser, Debug, Clone)]
pub struct SourceArgs {
    /// Documents, one JSON object per line
    #[arg(value_name = "DOCUMENTS")]
    pub documents: PathBuf,

    /// Facet handler definitions (JSON); every field becomes a
    /// multi-valued facet when omitted
    #[arg(short = 'H', long, value_name = "HANDLERS_FILE")]
    pub handlers: Option<PathBuf>,

    /// Number of partitions documents are dealt into
    #[arg(short, long, default_value = "1")]
    pub partitions: usize,
}

/// Arguments for browsing
#[derive(Parser, Debug, Clone)]
pub struct BrowseArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Browser configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Term query `field:term`; repeated queries are ANDed
    #[arg(long)]
    pub query: Vec<String>,

    /// Facet spec `name:minHitCount,maxCount,isExpand,orderBy`
    #[arg(long)]
    pub facet: Vec<String>,

    /// Selection `name:value,!value`
    #[arg(long)]
    pub select: Vec<String>,

    /// Sort order `field:reverse,field:reverse`
    #[arg(long)]
    pub sort: Option<String>,

    /// Page `offset:count`
    #[arg(long, default_value = "0:10")]
    pub page: String,

    /// Group hits by a facet
    #[arg(long)]
    pub group_by: Option<String>,

    /// Hits kept per group
    #[arg(long, default_value = "1")]
    pub max_per_group: usize,

    /// Attach score explanations
    #[arg(long)]
    pub explain: bool,

    /// Attach stored fields
    #[arg(long)]
    pub stored_fields: bool,

    /// Run partitions in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Time budget in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Trace identifier; a random one is generated when omitted
    #[arg(long, env = "DRILLDOWN_TID")]
    pub tid: Option<String>,
}

/// Arguments for describing partitions
#[derive(Parser, Debug, Clone)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
