//! Schema Initialization
//!
//! Uniqueness constraints on the `name` natural key, with a plain-index
//! fallback for stores that reject constraint creation. Every attempt is
//! fault-tolerant so one label's failure never blocks the rest.

use neo4rs::query;
use tracing::{info, warn};

/// Ensure a uniqueness constraint (or at least an index) on `name` for each
/// label. Failures are logged and skipped; this never aborts the pipeline.
pub async fn init_schema(graph: &neo4rs::Graph, labels: &[&str]) {
    for label in labels {
        let constraint = format!(
            "CREATE CONSTRAINT IF NOT EXISTS FOR (n:{}) REQUIRE n.name IS UNIQUE",
            quote_label(label)
        );
        match graph.run(query(&constraint)).await {
            Ok(_) => {
                info!("   Ensured uniqueness constraint on :{}(name)", label);
                continue;
            }
            Err(e) => {
                warn!(
                    "   Constraint on :{}(name) failed ({}), falling back to plain index",
                    label, e
                );
            }
        }

        let index = format!(
            "CREATE INDEX IF NOT EXISTS FOR (n:{}) ON (n.name)",
            quote_label(label)
        );
        match graph.run(query(&index)).await {
            Ok(_) => info!("   Ensured index on :{}(name)", label),
            Err(e) => warn!("   Index on :{}(name) failed: {}", label, e),
        }
    }
}

fn quote_label(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
