//! Metadata records and the field allow/deny lists.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flat mapping from attribute name to a scalar or nested value.
pub type Fields = Map<String, Value>;

/// Attributes kept from photo metadata.
pub const ALLOWED_FIELDS: &[&str] = &[
    "DateTimeOriginal",
    "GPSTimeStamp",
    "GPSImgDirection",
    "BrightnessValue",
    "HasExtendedXMP",
    "ShutterSpeedValue",
    "ExposureTime",
    "SubSecTime",
    "SubSecTimeDigitized",
    "ISO",
    "SubSecTimeOriginal",
    "Description",
    "ModifyDate",
    "UserComment",
    "Subject",
    "Software",
    "ImageSize",
];

/// Filesystem and source attributes that are noise for duplicate detection.
pub const DENIED_FIELDS: &[&str] = &[
    "FileInodeChangeDate",
    "FileModifyDate",
    "FileAccessDate",
    "SourceFile",
    "Directory",
    "filepath",
    "FileName",
    "FilePermissions",
    "MediaDataOffset",
];

pub const THUMBNAIL_FIELD: &str = "ThumbnailLength";

/// Which attributes are recorded and which are never compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPolicy {
    allowed: BTreeSet<String>,
    denied: BTreeSet<String>,
}

/// Metadata for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(rename = "filepath")]
    pub path: PathBuf,
    pub size: u64,
    /// Digest of the file contents with metadata stripped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl FieldPolicy {
    pub fn new<A, D>(allowed: A, denied: D) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            denied: denied.into_iter().map(Into::into).collect(),
        }
    }

    /// The default photo field lists, optionally including the thumbnail length.
    #[must_use]
    pub fn standard(include_thumbnail: bool) -> Self {
        let allowed = ALLOWED_FIELDS
            .iter()
            .copied()
            .chain(include_thumbnail.then_some(THUMBNAIL_FIELD));
        Self::new(allowed, DENIED_FIELDS.iter().copied())
    }

    #[must_use]
    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed.contains(name) && !self.is_denied(name)
    }

    #[must_use]
    pub fn is_denied(&self, name: &str) -> bool {
        self.denied.contains(name)
    }

    /// Keep only allowed attributes.
    #[must_use]
    pub fn select(&self, tags: &Fields) -> Fields {
        tags.iter()
            .filter(|(name, _)| self.is_allowed(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Keep everything except denied attributes.
    #[must_use]
    pub fn without_denied(&self, tags: &Fields) -> Fields {
        tags.iter()
            .filter(|(name, _)| !self.is_denied(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl Default for FieldPolicy {
    fn default() -> Self {
        Self::standard(true)
    }
}

impl MetadataRecord {
    pub fn new(path: impl Into<PathBuf>, size: u64, fields: Fields) -> Self {
        Self {
            path: path.into(),
            size,
            hash: None,
            fields,
        }
    }

    /// Build a record from photo tags, keeping allow-listed attributes only.
    #[must_use]
    pub fn from_photo_tags(path: &Path, size: u64, tags: &Fields, policy: &FieldPolicy) -> Self {
        Self::new(path, size, policy.select(tags))
    }

    /// Build a record from video tags, keeping everything that is not deny-listed.
    #[must_use]
    pub fn from_video_tags(path: &Path, size: u64, tags: &Fields, policy: &FieldPolicy) -> Self {
        Self::new(path, size, policy.without_denied(tags))
    }

    /// Add allowed attributes from another lookup, overwriting existing values.
    pub fn merge_fields(&mut self, tags: &Fields, policy: &FieldPolicy) {
        self.fields.extend(policy.select(tags));
    }

    /// Drop deny-listed attributes, for example after loading an older index file.
    pub fn strip_denied(&mut self, policy: &FieldPolicy) {
        self.fields.retain(|name, _| !policy.is_denied(name));
    }

    /// Get an attribute rendered as a string.
    #[must_use]
    pub fn field_string(&self, name: &str) -> Option<String> {
        self.fields.get(name).and_then(value_to_string)
    }
}

/// Render a scalar value as a string. Null renders as `None`.
#[must_use]
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Get an attribute from a tag map rendered as a string.
#[must_use]
pub fn field_string(fields: &Fields, name: &str) -> Option<String> {
    fields.get(name).and_then(value_to_string)
}

/// Check that a value is present and not empty, zero or false.
#[must_use]
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}
