//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::browse::BrowseResult;
use crate::cli::args::{DrilldownArgs, OutputFormat};
use crate::error::Result;
use crate::facet::accessible::FacetAccessible;

/// One partition of a described index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSummary {
    pub partition: usize,
    pub doc_base: u64,
    pub num_docs: u32,
    pub max_doc: u32,
}

/// Result structure for the describe command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescription {
    pub total_docs: u64,
    pub partitions: Vec<PartitionSummary>,
    pub facets: Vec<String>,
}

/// Something a command prints.
pub trait CommandOutput {
    /// JSON form.
    fn to_json_value(&self) -> Result<Value>;

    /// Human form.
    fn print_human(&self, args: &DrilldownArgs);
}

impl CommandOutput for BrowseResult {
    fn to_json_value(&self) -> Result<Value> {
        Ok(self.to_json())
    }

    fn print_human(&self, args: &DrilldownArgs) {
        println!("Browse Results:");
        println!("═══════════════");

        for (i, hit) in self.hits.iter().enumerate() {
            println!();
            println!(
                "Hit {}: doc {} (partition {}, score {:.3})",
                i + 1,
                hit.doc_id,
                hit.partition,
                hit.score
            );
            println!("─────────────");
            if let Some(group) = &hit.group_value {
                let fields: Vec<String> = group.iter().map(|values| values.join(", ")).collect();
                println!("group: [{}] ({} hits)", fields.join("] ["), hit.group_hit_count);
            }
            for (field, values) in &hit.field_values {
                println!("{field}: {}", values.join(", "));
            }
            for (field, values) in &hit.stored_fields {
                println!("{field} (stored): {}", values.join(", "));
            }
            if let Some(explanation) = &hit.explanation {
                println!("explanation: {}", serde_json::to_string(explanation).unwrap_or_default());
            }
        }

        println!();
        println!("Total hits: {} of {} documents", self.total_hits, self.total_docs);
        if self.total_groups > 0 {
            println!("Total groups: {}", self.total_groups);
        }
        if args.verbosity() > 1 {
            println!("Browse time: {}ms", self.elapsed.as_millis());
            if let Some(tid) = &self.tid {
                println!("Trace id: {tid}");
            }
        }

        if !self.facets.is_empty() {
            println!();
            println!("Facets:");
            println!("───────");
            for name in self.facets.keys() {
                println!("{name}:");
                for facet in self.facet_values(name) {
                    println!("  {} ({})", facet.value, facet.count);
                }
            }
        }

        for (name, counts) in &self.group_facets {
            println!();
            println!("Groups by {name}:");
            for facet in counts.facets() {
                println!("  {} ({})", facet.value, facet.count);
            }
        }

        if let Some(aggregate) = &self.map_reduce_result {
            println!();
            println!("Aggregate: {aggregate}");
        }

        if !self.errors.is_empty() {
            println!();
            println!("Errors:");
            for error in &self.errors {
                println!("  {error}");
            }
        }
    }
}

impl CommandOutput for IndexDescription {
    fn to_json_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn print_human(&self, _args: &DrilldownArgs) {
        println!("Index Description:");
        println!("══════════════════");
        println!("Total documents: {}", self.total_docs);
        println!();
        for partition in &self.partitions {
            println!(
                "Partition {}: {} documents ({} slots, base {})",
                partition.partition, partition.num_docs, partition.max_doc, partition.doc_base
            );
        }
        println!();
        println!("Facets: {}", self.facets.join(", "));
    }
}

/// Output a result in the specified format.
pub fn output_result<T: CommandOutput>(result: &T, args: &DrilldownArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            result.print_human(args);
            Ok(())
        }
        OutputFormat::Json => output_json(&result.to_json_value()?, args),
    }
}

fn output_json(value: &Value, args: &DrilldownArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}
