//! Neo4j Batch Graph Writer
//!
//! Bulk node and relationship creation using parameterized UNWIND queries.
//! The dynamic relationship writer groups edges by a per-record `rel` field
//! and isolates failures per group; the fixed-type writer shares the same
//! statement core without grouping.

use crate::records::Record;
use anyhow::{Context, Result};
use neo4rs::{query, BoltType};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

// ============================================================================
// Configuration
// ============================================================================

const DEFAULT_BATCH_SIZE: usize = 500;

/// Field carrying the per-record relationship type for dynamic grouping.
const REL_TYPE_KEY: &str = "rel";

pub struct BatchConfig {
    pub batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

// ============================================================================
// Graph Store Handle
// ============================================================================

/// Write handle over a single Neo4j connection, held for the process
/// lifetime and used sequentially.
pub struct GraphStore {
    graph: neo4rs::Graph,
    config: BatchConfig,
}

impl GraphStore {
    pub fn new(graph: neo4rs::Graph) -> Self {
        Self::with_config(graph, None)
    }

    pub fn with_config(graph: neo4rs::Graph, config: Option<BatchConfig>) -> Self {
        Self {
            graph,
            config: config.unwrap_or_default(),
        }
    }

    pub fn graph(&self) -> &neo4rs::Graph {
        &self.graph
    }

    /// Bulk-create one node per record under the given label.
    ///
    /// Keys whose value is JSON null or an empty string are treated as unset
    /// and stripped before submission. All chunks commit in one transaction,
    /// so a mid-batch failure leaves no nodes written for the label. This is
    /// CREATE, not MERGE: re-running the same input duplicates nodes unless
    /// the store's uniqueness constraint rejects them.
    pub async fn create_nodes(&self, label: &str, records: Vec<Record>) -> Result<()> {
        if records.is_empty() {
            info!("   No '{}' records, skipping node batch", label);
            return Ok(());
        }

        let rows: Vec<HashMap<String, BoltType>> =
            records.into_iter().map(clean_record).collect();
        let total = rows.len();
        let q_text = node_query(label);

        let mut txn = self
            .graph
            .start_txn()
            .await
            .context("Failed to start transaction")?;
        for chunk in rows.chunks(self.config.batch_size) {
            let q = query(&q_text).param("batch", chunk.to_vec());
            if let Err(e) = txn.run(q).await {
                txn.rollback().await.context("Failed to rollback transaction")?;
                return Err(e).with_context(|| format!("Failed to batch create '{label}' nodes"));
            }
        }
        txn.commit().await.context("Failed to commit transaction")?;

        info!("   Created {} nodes of type '{}'", total, label);
        Ok(())
    }

    /// Bulk-create relationships of a single fixed type.
    ///
    /// Endpoints are matched by label + `name`; rows whose endpoints match no
    /// node produce no relationship. `attr_keys` names edge fields to copy
    /// onto the relationship when present.
    pub async fn create_relationships(
        &self,
        start_label: &str,
        end_label: &str,
        rel_type: &str,
        edges: Vec<Record>,
        from_key: &str,
        to_key: &str,
        attr_keys: &[&str],
    ) -> Result<()> {
        if edges.is_empty() {
            info!("   No edge records for '{}', skipping", rel_type);
            return Ok(());
        }

        let count = self
            .run_relationship_batch(start_label, end_label, rel_type, &edges, from_key, to_key, attr_keys)
            .await?;
        info!("   Created {} relationships of type '{}'", count, rel_type);
        Ok(())
    }

    /// Bulk-create relationships whose type is read per-record from the
    /// `rel` field.
    ///
    /// Records missing `rel` or either endpoint key are dropped. Surviving
    /// records are partitioned by type in encounter order and each group is
    /// written with its own statement; a failed group is logged and does not
    /// stop the remaining groups.
    pub async fn create_relationships_by_type(
        &self,
        start_label: &str,
        end_label: &str,
        edges: Vec<Record>,
        from_key: &str,
        to_key: &str,
        attr_keys: &[&str],
    ) -> Result<()> {
        if edges.is_empty() {
            info!("   No edge records for {} -> {}, skipping", start_label, end_label);
            return Ok(());
        }

        let groups = group_edges_by_type(edges, from_key, to_key);
        for (rel_type, group) in groups {
            let present = present_attr_keys(&group, attr_keys);
            match self
                .run_relationship_batch(start_label, end_label, &rel_type, &group, from_key, to_key, &present)
                .await
            {
                Ok(count) => {
                    info!("   Created {} relationships of type '{}'", count, rel_type);
                }
                Err(e) => {
                    warn!("   Failed to create '{}' relationships: {:#}", rel_type, e);
                }
            }
        }
        Ok(())
    }

    async fn run_relationship_batch(
        &self,
        start_label: &str,
        end_label: &str,
        rel_type: &str,
        edges: &[Record],
        from_key: &str,
        to_key: &str,
        attr_keys: &[&str],
    ) -> Result<usize> {
        let rows: Vec<HashMap<String, BoltType>> = edges
            .iter()
            .filter_map(|edge| edge_row(edge, from_key, to_key, attr_keys))
            .collect();
        if rows.is_empty() {
            return Ok(0);
        }

        let total = rows.len();
        let q_text = relationship_query(start_label, end_label, rel_type, attr_keys);

        // One transaction per group: a mid-batch failure rolls the whole
        // group back instead of leaving it partially written.
        let mut txn = self
            .graph
            .start_txn()
            .await
            .context("Failed to start transaction")?;
        for chunk in rows.chunks(self.config.batch_size) {
            let q = query(&q_text).param("batch", chunk.to_vec());
            if let Err(e) = txn.run(q).await {
                txn.rollback().await.context("Failed to rollback transaction")?;
                return Err(e)
                    .with_context(|| format!("Failed to batch create '{rel_type}' relationships"));
            }
        }
        txn.commit().await.context("Failed to commit transaction")?;

        Ok(total)
    }
}

// ============================================================================
// Row Construction
// ============================================================================

/// Convert a JSON value into a Bolt parameter. Nulls have no Bolt
/// counterpart here and are dropped by the caller.
fn json_to_bolt(value: Value) -> Option<BoltType> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.into()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.into())
            } else {
                Some(n.as_f64().unwrap_or_default().into())
            }
        }
        Value::String(s) => Some(s.into()),
        Value::Array(items) => {
            let list: Vec<BoltType> = items.into_iter().filter_map(json_to_bolt).collect();
            Some(list.into())
        }
        Value::Object(map) => {
            let bolt_map: HashMap<String, BoltType> = map
                .into_iter()
                .filter_map(|(k, v)| json_to_bolt(v).map(|b| (k, b)))
                .collect();
            Some(bolt_map.into())
        }
    }
}

/// Strip unset attributes (JSON null or empty string) and convert the rest
/// to Bolt parameters. Falsy-but-set values like `0` and `false` survive.
fn clean_record(record: Record) -> HashMap<String, BoltType> {
    record
        .into_iter()
        .filter(|(_, v)| !v.is_null() && v.as_str() != Some(""))
        .filter_map(|(k, v)| json_to_bolt(v).map(|b| (k, b)))
        .collect()
}

/// Build a `{from, to, <attrs>}` row for one edge record. Returns None when
/// either endpoint key is missing, dropping the record.
fn edge_row(
    edge: &Record,
    from_key: &str,
    to_key: &str,
    attr_keys: &[&str],
) -> Option<HashMap<String, BoltType>> {
    let mut row = HashMap::new();
    row.insert("from".to_string(), json_to_bolt(edge.get(from_key)?.clone())?);
    row.insert("to".to_string(), json_to_bolt(edge.get(to_key)?.clone())?);

    for key in attr_keys {
        if let Some(value) = edge.get(*key) {
            if let Some(bolt) = json_to_bolt(value.clone()) {
                row.insert((*key).to_string(), bolt);
            }
        }
    }

    Some(row)
}

/// Partition edges by their `rel` field, preserving first-encounter group
/// order and input order within each group. Records missing `rel` (or
/// carrying a non-string/empty value) or missing either endpoint key are
/// dropped.
fn group_edges_by_type(
    edges: Vec<Record>,
    from_key: &str,
    to_key: &str,
) -> Vec<(String, Vec<Record>)> {
    let mut groups: Vec<(String, Vec<Record>)> = Vec::new();

    for edge in edges {
        if !edge.contains_key(from_key) || !edge.contains_key(to_key) {
            continue;
        }
        let rel_type = match edge.get(REL_TYPE_KEY).and_then(Value::as_str) {
            Some(r) if !r.is_empty() => r.to_string(),
            _ => continue,
        };
        match groups.iter_mut().find(|(t, _)| *t == rel_type) {
            Some((_, rows)) => rows.push(edge),
            None => groups.push((rel_type, vec![edge])),
        }
    }

    groups
}

/// Restrict requested attribute keys to those present in at least one edge
/// of the group, so the SET clause never references an all-absent field.
fn present_attr_keys<'a>(group: &[Record], attr_keys: &[&'a str]) -> Vec<&'a str> {
    attr_keys
        .iter()
        .copied()
        .filter(|key| group.iter().any(|edge| edge.contains_key(*key)))
        .collect()
}

// ============================================================================
// Query Construction
// ============================================================================

/// Backtick-quote a label, relationship type, or property name so arbitrary
/// characters are legal in the generated Cypher.
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn node_query(label: &str) -> String {
    format!(
        "UNWIND $batch AS row\n         CREATE (n:{})\n         SET n = row",
        quote_ident(label)
    )
}

fn relationship_query(
    start_label: &str,
    end_label: &str,
    rel_type: &str,
    attr_keys: &[&str],
) -> String {
    let mut q = format!(
        "UNWIND $batch AS row\n         MATCH (a:{} {{name: row.from}})\n         MATCH (b:{} {{name: row.to}})\n         CREATE (a)-[rel:{}]->(b)",
        quote_ident(start_label),
        quote_ident(end_label),
        quote_ident(rel_type)
    );

    if !attr_keys.is_empty() {
        let assignments: Vec<String> = attr_keys
            .iter()
            .map(|key| format!("rel.{} = row.{}", quote_ident(key), quote_ident(key)))
            .collect();
        q.push_str("\n         SET ");
        q.push_str(&assignments.join(", "));
    }

    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().expect("fixture must be an object").clone()
    }

    #[test]
    fn test_clean_record_strips_null_and_empty_string() {
        let input = record(json!({
            "name": "Acme",
            "ticker": "",
            "founded": null,
            "employees": 0,
            "public": false
        }));

        let cleaned = clean_record(input);

        assert!(!cleaned.contains_key("ticker"));
        assert!(!cleaned.contains_key("founded"));
        assert!(matches!(cleaned.get("name"), Some(BoltType::String(s)) if s.value == "Acme"));
        assert!(matches!(cleaned.get("employees"), Some(BoltType::Integer(i)) if i.value == 0));
        assert!(matches!(cleaned.get("public"), Some(BoltType::Boolean(b)) if !b.value));
    }

    #[test]
    fn test_json_to_bolt_preserves_number_kinds() {
        assert!(matches!(json_to_bolt(json!(42)), Some(BoltType::Integer(i)) if i.value == 42));
        assert!(
            matches!(json_to_bolt(json!(0.5)), Some(BoltType::Float(f)) if (f.value - 0.5).abs() < f64::EPSILON)
        );
        assert!(json_to_bolt(Value::Null).is_none());
    }

    #[test]
    fn test_edge_row_copies_present_attrs_only() {
        let edge = record(json!({
            "company_name": "Acme",
            "product_name": "Widget",
            "rel_weight": 3
        }));

        let row = edge_row(&edge, "company_name", "product_name", &["rel_weight", "since"])
            .expect("row should build");

        assert!(matches!(row.get("from"), Some(BoltType::String(s)) if s.value == "Acme"));
        assert!(matches!(row.get("to"), Some(BoltType::String(s)) if s.value == "Widget"));
        assert!(matches!(row.get("rel_weight"), Some(BoltType::Integer(i)) if i.value == 3));
        assert!(!row.contains_key("since"));
    }

    #[test]
    fn test_edge_row_drops_record_missing_endpoint() {
        let edge = record(json!({"company_name": "Acme"}));

        assert!(edge_row(&edge, "company_name", "product_name", &[]).is_none());
    }

    #[test]
    fn test_grouping_drops_records_missing_rel_or_endpoint() {
        let edges = vec![
            record(json!({"company_name": "Acme", "industry_name": "Tech", "rel": "BELONGS_TO"})),
            record(json!({"company_name": "Foo", "industry_name": "Tech"})),
        ];

        let groups = group_edges_by_type(edges, "company_name", "industry_name");

        assert_eq!(groups.len(), 1);
        let (rel_type, rows) = &groups[0];
        assert_eq!(rel_type, "BELONGS_TO");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("company_name"), Some(&json!("Acme")));
        assert_eq!(rows[0].get("industry_name"), Some(&json!("Tech")));
    }

    #[test]
    fn test_grouping_preserves_encounter_order() {
        let edges = vec![
            record(json!({"from_industry": "a", "to_industry": "b", "rel": "SUBCLASS_OF"})),
            record(json!({"from_industry": "c", "to_industry": "d", "rel": "RELATED_TO"})),
            record(json!({"from_industry": "e", "to_industry": "f", "rel": "SUBCLASS_OF"})),
            record(json!({"from_industry": "g", "to_industry": "h", "rel": 7})),
        ];

        let groups = group_edges_by_type(edges, "from_industry", "to_industry");

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "SUBCLASS_OF");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[0].1[0].get("from_industry"), Some(&json!("a")));
        assert_eq!(groups[0].1[1].get("from_industry"), Some(&json!("e")));
        assert_eq!(groups[1].0, "RELATED_TO");
        assert_eq!(groups[1].1.len(), 1);
    }

    #[test]
    fn test_present_attr_keys_requires_at_least_one_row() {
        let group = vec![
            record(json!({"from_industry": "a", "to_industry": "b", "rel": "X", "weight": 1})),
            record(json!({"from_industry": "c", "to_industry": "d", "rel": "X"})),
        ];

        let present = present_attr_keys(&group, &["weight", "since"]);

        assert_eq!(present, vec!["weight"]);
    }

    #[test]
    fn test_grouping_empty_input_yields_no_groups() {
        let groups = group_edges_by_type(Vec::new(), "from_industry", "to_industry");

        assert!(groups.is_empty());
        assert!(present_attr_keys(&[], &["weight"]).is_empty());
    }

    #[test]
    fn test_batch_config_default_and_override() {
        assert_eq!(BatchConfig::default().batch_size, DEFAULT_BATCH_SIZE);

        let config = BatchConfig { batch_size: 2 };
        let rows: Vec<i64> = (0..5).collect();
        assert_eq!(rows.chunks(config.batch_size).count(), 3);
    }

    #[test]
    fn test_large_batch_splits_into_bounded_statements() {
        let rows: Vec<HashMap<String, BoltType>> = (0..1001)
            .map(|i| clean_record(record(json!({ "name": format!("n{i}") }))))
            .collect();

        let chunks: Vec<_> = rows.chunks(DEFAULT_BATCH_SIZE).collect();

        // 1001 rows -> 3 statements, all inside a single transaction
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= DEFAULT_BATCH_SIZE));
        assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), 1001);
    }

    #[test]
    fn test_quote_ident_escapes_backticks() {
        assert_eq!(quote_ident("BELONGS_TO"), "`BELONGS_TO`");
        assert_eq!(quote_ident("weird`type"), "`weird``type`");
    }

    #[test]
    fn test_node_query_tags_label() {
        let q = node_query("company");

        assert!(q.contains("UNWIND $batch AS row"));
        assert!(q.contains("CREATE (n:`company`)"));
        assert!(q.contains("SET n = row"));
    }

    #[test]
    fn test_relationship_query_sets_attrs_only_when_present() {
        let bare = relationship_query("company", "industry", "BELONGS_TO", &[]);
        assert!(bare.contains("MATCH (a:`company` {name: row.from})"));
        assert!(bare.contains("MATCH (b:`industry` {name: row.to})"));
        assert!(bare.contains("CREATE (a)-[rel:`BELONGS_TO`]->(b)"));
        assert!(!bare.contains("SET"));

        let with_attrs = relationship_query("company", "product", "PRODUCES", &["rel_weight"]);
        assert!(with_attrs.contains("SET rel.`rel_weight` = row.`rel_weight`"));
    }
}
