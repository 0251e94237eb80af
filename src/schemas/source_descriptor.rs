//! Curated source list
//!
//! One row per upstream entity to harvest, read from a CSV file with the
//! header `source,source_ref,name,notes`.

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Platform tag, lower-cased (`youtube`)
    #[serde(default)]
    pub source: String,
    /// Free-form reference: URL, handle, or bare id
    #[serde(rename = "source_ref", default)]
    pub reference: String,
    #[serde(rename = "name", default)]
    pub display_name: String,
    #[serde(default)]
    pub notes: String,
}

impl SourceDescriptor {
    pub fn new(source: &str, reference: &str, display_name: &str) -> Self {
        Self {
            source: source.trim().to_lowercase(),
            reference: reference.trim().to_string(),
            display_name: display_name.trim().to_string(),
            notes: String::new(),
        }
    }

    pub fn is_source(&self, platform: &str) -> bool {
        self.source.eq_ignore_ascii_case(platform)
    }
}

/// Reads descriptors from any CSV reader
pub fn parse_sources<R: Read>(reader: R) -> Result<Vec<SourceDescriptor>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for row in csv_reader.deserialize::<SourceDescriptor>() {
        let mut row = row?;
        row.source = row.source.to_lowercase();
        rows.push(row);
    }
    Ok(rows)
}

/// Reads descriptors from a CSV file
pub fn load_sources(path: &Path) -> Result<Vec<SourceDescriptor>> {
    let file = std::fs::File::open(path)?;
    parse_sources(file)
}
