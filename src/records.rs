//! JSONL Record Loader
//!
//! Reads newline-delimited JSON data files into attribute maps, one map
//! per valid line.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One parsed data record: attribute name -> JSON value.
pub type Record = serde_json::Map<String, Value>;

/// Load all records from a newline-delimited JSON file.
///
/// Blank lines, lines that are not valid JSON objects, and empty objects
/// are skipped; a skipped line never aborts the load. A missing or
/// unreadable file is an error and propagates to the caller.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open data file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("Failed to read line from {}", path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(trimmed) {
            Ok(record) if !record.is_empty() => records.push(record),
            // Empty objects carry no attributes, nothing to create
            Ok(_) => continue,
            // Malformed line, skip it and keep reading
            Err(_) => continue,
        }
    }

    Ok(records)
}
