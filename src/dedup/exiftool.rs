//! Access to the external `exiftool` command.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, trace};

use crate::dedup::record::Fields;

/// External metadata lookups.
///
/// Failures never propagate: lookups return an empty list and payloads return `None`.
pub trait MetadataTool {
    /// Tag maps for the given files, in the same order.
    fn lookup(&self, paths: &[&Path]) -> Vec<Fields>;

    /// File contents with all metadata stripped.
    fn stripped_payload(&self, path: &Path) -> Option<Vec<u8>>;
}

/// Runs `exiftool` as a child process.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: String,
}

impl ExifTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run_lookup(&self, paths: &[&Path]) -> Result<Vec<Fields>> {
        let output = Command::new(&self.program)
            .arg("-j")
            .args(paths)
            .output()
            .with_context(|| format!("Failed to execute {}", self.program))?;

        // exiftool exits with an error when any file fails but still prints the others
        if !output.status.success() && output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{} failed: {}", self.program, stderr.trim());
        }

        let tags = parse_json_output(&String::from_utf8_lossy(&output.stdout))?;
        Ok(order_by_source(paths, tags))
    }

    fn run_strip(&self, path: &Path) -> Result<Vec<u8>> {
        let output = Command::new(&self.program)
            .arg(path)
            .args(["-all=", "-o", "-"])
            .output()
            .with_context(|| format!("Failed to execute {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{} failed: {}", self.program, stderr.trim());
        }
        Ok(output.stdout)
    }
}

impl Default for ExifTool {
    fn default() -> Self {
        Self::new("exiftool")
    }
}

impl MetadataTool for ExifTool {
    fn lookup(&self, paths: &[&Path]) -> Vec<Fields> {
        if paths.is_empty() {
            return Vec::new();
        }
        trace!("exiftool lookup: {paths:?}");
        match self.run_lookup(paths) {
            Ok(tags) => tags,
            Err(error) => {
                info!("ERROR {error:#}");
                Vec::new()
            }
        }
    }

    fn stripped_payload(&self, path: &Path) -> Option<Vec<u8>> {
        trace!("Getting hash for image portion of {}", path.display());
        match self.run_strip(path) {
            Ok(payload) => Some(payload),
            Err(error) => {
                error!("Unable to get hash for {}: {error:#}", path.display());
                None
            }
        }
    }
}

/// Parse the JSON array printed by `exiftool -j`.
pub fn parse_json_output(json: &str) -> Result<Vec<Fields>> {
    let value: Value = serde_json::from_str(json).context("Failed to parse exiftool output")?;
    let Value::Array(items) = value else {
        anyhow::bail!("Expected a JSON array from exiftool");
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(fields) => Some(fields),
            _ => None,
        })
        .collect())
}

/// Match exiftool entries to the requested paths by their `SourceFile`.
///
/// Files exiftool skipped get an empty map so positions stay aligned.
pub fn order_by_source(paths: &[&Path], tags: Vec<Fields>) -> Vec<Fields> {
    let mut by_source: HashMap<String, Fields> = tags
        .into_iter()
        .filter_map(|fields| {
            let source = fields.get("SourceFile")?.as_str()?.to_string();
            Some((source, fields))
        })
        .collect();

    paths
        .iter()
        .map(|path| {
            by_source.remove(path.to_string_lossy().as_ref()).unwrap_or_else(|| {
                debug!("No exiftool tags for {}", path.display());
                Fields::new()
            })
        })
        .collect()
}

/// SHA-256 hex digest of the file contents with metadata stripped.
pub fn content_hash(tool: &dyn MetadataTool, path: &Path) -> Option<String> {
    let payload = tool.stripped_payload(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&payload);
    let hash = format!("{:x}", hasher.finalize());
    trace!(
        "filehash: \tName:\t{}\timage size\t{}\t{hash}",
        path.display(),
        payload.len()
    );
    Some(hash)
}
