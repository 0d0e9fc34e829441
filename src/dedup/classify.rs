//! Decide whether a file lives in the archive directory of the year it was taken.

use std::fs;
use std::path::{Component, Path};

use serde_json::Value;
use tracing::{trace, warn};

use crate::date;
use crate::dedup::record::{Fields, field_string};

/// Default name of the archive root directory that contains the year directories.
pub const DEFAULT_ARCHIVE_DIR: &str = "sortedByYear";

/// Camera filename prefixes that never encode the capture year.
pub const NO_YEAR_PREFIXES: &[&str] = &["DSCN"];

const INCORRECT_TIME_WARNING: &str = "incorrect time";

/// Metadata available for deriving the capture year.
#[derive(Debug, Clone, Copy)]
pub enum YearHint<'a> {
    /// A raw date string, such as the partition key.
    Key(&'a str),
    /// Tag map of the file.
    Fields(&'a Fields),
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_ok: bool,
    pub year_taken: Option<String>,
    pub file_year: Option<String>,
}

#[derive(Debug, Clone)]
pub struct YearClassifier {
    archive_dir: String,
    no_year_prefixes: Vec<String>,
}

impl YearClassifier {
    pub fn new(archive_dir: impl Into<String>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            no_year_prefixes: NO_YEAR_PREFIXES.iter().map(ToString::to_string).collect(),
        }
    }

    #[must_use]
    pub fn archive_dir(&self) -> &str {
        &self.archive_dir
    }

    /// Classify the file at `path` against the year directory it is stored in.
    #[must_use]
    pub fn classify(&self, path: &Path, hint: YearHint<'_>) -> Classification {
        let year_taken = self.year_taken(path, hint);
        let Some(file_year) = self.file_year(path) else {
            trace!("File does not appear in {}: {}", self.archive_dir, path.display());
            return Classification {
                is_ok: false,
                year_taken,
                file_year: None,
            };
        };

        trace!(
            "directory YEAR: {file_year}, year taken: {year_taken:?} - file: {}",
            path.display()
        );
        let is_ok = year_taken
            .as_deref()
            .is_some_and(|year| date::years_equal(&file_year, year));

        Classification {
            is_ok,
            year_taken,
            file_year: Some(file_year),
        }
    }

    /// Best-effort capture year, trying each metadata source in priority order.
    #[must_use]
    pub fn year_taken(&self, path: &Path, hint: YearHint<'_>) -> Option<String> {
        let mut year = sidecar_year(path);

        if year.is_none() {
            year = match hint {
                YearHint::Key(key) => date::year_from_date_string(key),
                YearHint::Fields(fields) => field_string(fields, "DateTimeOriginal").and_then(|d| date::leading_year(&d)),
                YearHint::None => None,
            };
        }

        let YearHint::Fields(fields) = hint else {
            return year.or_else(|| self.filename_year(path));
        };

        if year.is_none() {
            year = field_string(fields, "MediaCreateDate").and_then(|d| date::leading_year(&d));
        }

        if let Some(warning) = field_string(fields, "Warning")
            && warning.contains(INCORRECT_TIME_WARNING)
            && let Some(filename_year) = self.filename_year(path)
            && year.as_deref() != Some(filename_year.as_str())
        {
            warn!(
                "Using file year rather than exif due to warning: {} - file year: {filename_year} - year taken: {year:?}, warn: {warning}",
                path.display()
            );
            year = Some(filename_year);
        }

        if year.is_none() {
            trace!("no year taken: {}", path.display());
            year = field_string(fields, "CreationDate").and_then(|d| date::year_before_colon(&d));
        }

        year.or_else(|| self.filename_year(path))
    }

    /// Name of the directory directly under the archive root, if the path is inside the archive.
    ///
    /// The archive root is the first directory whose name ends with the archive dir name.
    #[must_use]
    pub fn file_year(&self, path: &Path) -> Option<String> {
        let mut components = path.components();
        components.by_ref().find(|component| {
            matches!(component, Component::Normal(name) if name.to_string_lossy().ends_with(self.archive_dir.as_str()))
        })?;

        match components.next() {
            Some(Component::Normal(name)) if components.clone().next().is_some() => Some(crate::os_str_to_string(name)),
            _ => None,
        }
    }

    fn filename_year(&self, path: &Path) -> Option<String> {
        date::extract_year_from_filename(path, &self.no_year_prefixes)
    }
}

impl Default for YearClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_ARCHIVE_DIR)
    }
}

/// Year from a `<path>.json` sidecar file with a photo taken or creation timestamp.
fn sidecar_year(path: &Path) -> Option<String> {
    let sidecar = crate::append_extension_to_path(path.to_path_buf(), "json");
    if !sidecar.is_file() {
        return None;
    }
    trace!("Getting year from json file: {}", sidecar.display());

    let content = match fs::read_to_string(&sidecar) {
        Ok(content) => content,
        Err(error) => {
            warn!("Error reading json for year: {}: {error}", sidecar.display());
            return None;
        }
    };
    let json: Value = match serde_json::from_str(&content) {
        Ok(json) => json,
        Err(error) => {
            warn!("Error reading json for year: {}: {error}", sidecar.display());
            return None;
        }
    };

    let timestamp = json
        .get("photoTakenTime")
        .or_else(|| json.get("createTime"))
        .and_then(|time| time.get("timestamp"))
        .and_then(|timestamp| match timestamp {
            Value::String(s) => s.trim().parse::<i64>().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        });

    let Some(seconds) = timestamp else {
        warn!("No timestamp in json sidecar: {}", sidecar.display());
        return None;
    };

    date::year_from_epoch_seconds(seconds).and_then(|year| date::valid_year(&format!("{year:04}")))
}
