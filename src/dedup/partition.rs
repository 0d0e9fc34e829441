//! Candidate-duplicate partitions keyed by capture time or content hash.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dedup::record::{FieldPolicy, MetadataRecord};

/// Placeholder for a missing key component.
pub const UNDEFINED: &str = "undefined";

/// Partition key to the records sharing it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionIndex {
    partitions: BTreeMap<String, Vec<MetadataRecord>>,
}

impl PartitionIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, record: MetadataRecord) {
        self.partitions.entry(key.into()).or_default().push(record);
    }

    /// Merge another index by concatenating same-keyed partitions.
    pub fn merge(&mut self, other: Self) {
        for (key, records) in other.partitions {
            self.partitions.entry(key).or_default().extend(records);
        }
    }

    /// Parse a serialized index.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse index JSON")
    }

    /// Load and merge serialized index files in the given order.
    ///
    /// Deny-listed attributes from older files are dropped on load.
    pub fn load(paths: &[impl AsRef<Path>], policy: &FieldPolicy) -> Result<Self> {
        let mut index = Self::new();
        for path in paths {
            let path = path.as_ref();
            let content =
                fs::read_to_string(path).with_context(|| format!("Failed to read index file: {}", path.display()))?;
            let loaded = Self::from_json_str(&content)
                .with_context(|| format!("Failed to load index file: {}", path.display()))?;
            index.merge(loaded);
        }
        for record in index.partitions.values_mut().flatten() {
            record.strip_denied(policy);
        }
        Ok(index)
    }

    /// Write the index as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize index")?;
        fs::write(path, json).with_context(|| format!("Failed to write index file: {}", path.display()))
    }

    /// Re-key all records by content hash. Records without a hash go to the undefined partition.
    #[must_use]
    pub fn by_hash(&self) -> Self {
        let mut index = Self::new();
        for record in self.partitions.values().flatten() {
            let key = record.hash.clone().unwrap_or_else(|| UNDEFINED.to_string());
            index.insert(key, record.clone());
        }
        index
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<MetadataRecord>)> {
        self.partitions.iter()
    }

    pub fn partitions_mut(&mut self) -> impl Iterator<Item = (&String, &mut Vec<MetadataRecord>)> {
        self.partitions.iter_mut()
    }

    pub fn records(&self) -> impl Iterator<Item = &MetadataRecord> {
        self.partitions.values().flatten()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Vec<MetadataRecord>> {
        self.partitions.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.partitions.values().map(Vec::len).sum()
    }

    /// Partition keys with their record counts, smallest partitions first.
    #[must_use]
    pub fn key_counts(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = self
            .partitions
            .iter()
            .map(|(key, records)| (key.as_str(), records.len()))
            .collect();
        counts.sort_by_key(|&(_, count)| count);
        counts
    }
}

/// Check if the key has a missing component.
#[must_use]
pub fn is_undefined_key(key: &str) -> bool {
    key.contains(UNDEFINED)
}

/// Check if the capture date alone is too ambiguous to be a partition key.
#[must_use]
pub fn needs_disambiguation(date: Option<&str>, year: Option<&str>, size: u64, min_size: u64, earliest_year: i32) -> bool {
    date.is_none_or(str::is_empty)
        || year.is_none_or(|year| !crate::date::is_plausible_year(year, earliest_year))
        || size < min_size
}

/// Temporal key for a photo, with the year and image size appended when disambiguation is needed.
#[must_use]
pub fn photo_key(date: Option<&str>, disambiguation: Option<(Option<&str>, Option<&str>)>) -> String {
    let date = date.filter(|d| !d.is_empty()).unwrap_or(UNDEFINED);
    match disambiguation {
        None => date.to_string(),
        Some((year, image_size)) => format!(
            "{date} ({}) - ({})",
            year.unwrap_or(UNDEFINED),
            image_size.unwrap_or(UNDEFINED)
        ),
    }
}

/// Temporal key for a video: creation time and duration.
#[must_use]
pub fn video_key(create_time: Option<&str>, duration: Option<&str>) -> String {
    format!(
        "{} DUR:{}",
        create_time.unwrap_or(UNDEFINED),
        duration.unwrap_or(UNDEFINED)
    )
}
