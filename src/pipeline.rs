//! Pipeline Driver
//!
//! Fixed ETL order: load and create all node types, initialize schema, then
//! load and create all relationship types. Constraints go in after nodes
//! exist and before relationships so the by-name endpoint lookups are
//! index-backed.

use crate::graph_store::GraphStore;
use crate::records::load_records;
use crate::schema;
use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

pub const NODE_LABELS: [&str; 3] = ["company", "product", "industry"];

/// (label, data file) pairs, loaded and created in this order.
const NODE_FILES: [(&str, &str); 3] = [
    ("company", "company.json"),
    ("product", "product.json"),
    ("industry", "industry.json"),
];

pub async fn run(store: &GraphStore, data_dir: &Path) -> Result<()> {
    create_graph_nodes(store, data_dir).await?;

    info!("🔧 Initializing schema constraints...");
    schema::init_schema(store.graph(), &NODE_LABELS).await;

    create_graph_relationships(store, data_dir).await?;
    Ok(())
}

/// Load each node file and bulk-create its label. A failed statement is
/// logged and the remaining labels still load; a missing file is fatal.
async fn create_graph_nodes(store: &GraphStore, data_dir: &Path) -> Result<()> {
    info!("📦 Creating graph nodes...");

    for (label, file_name) in NODE_FILES {
        let records = load_records(&data_dir.join(file_name))?;
        info!("   Loaded {} '{}' records from {}", records.len(), label, file_name);

        if let Err(e) = store.create_nodes(label, records).await {
            warn!("   Failed to create '{}' nodes: {:#}", label, e);
        }
    }

    Ok(())
}

/// Load each edge file and bulk-create its relationships. Statement failures
/// are logged and the remaining files still load; a missing file is fatal.
async fn create_graph_relationships(store: &GraphStore, data_dir: &Path) -> Result<()> {
    info!("🔗 Creating graph relationships...");

    let edges = load_records(&data_dir.join("company_industry.json"))?;
    if let Err(e) = store
        .create_relationships("company", "industry", "BELONGS_TO", edges, "company_name", "industry_name", &[])
        .await
    {
        warn!("   Failed to create 'BELONGS_TO' relationships: {:#}", e);
    }

    let edges = load_records(&data_dir.join("company_product.json"))?;
    if let Err(e) = store
        .create_relationships("company", "product", "PRODUCES", edges, "company_name", "product_name", &["rel_weight"])
        .await
    {
        warn!("   Failed to create 'PRODUCES' relationships: {:#}", e);
    }

    let edges = load_records(&data_dir.join("product_product.json"))?;
    if let Err(e) = store
        .create_relationships("product", "product", "SIMILAR_TO", edges, "from_entity", "to_entity", &[])
        .await
    {
        warn!("   Failed to create 'SIMILAR_TO' relationships: {:#}", e);
    }

    // industry_industry carries its relationship type per record
    let edges = load_records(&data_dir.join("industry_industry.json"))?;
    if let Err(e) = store
        .create_relationships_by_type("industry", "industry", edges, "from_industry", "to_industry", &[])
        .await
    {
        warn!("   Failed to create industry relationships: {:#}", e);
    }

    Ok(())
}
