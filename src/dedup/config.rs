//! Configuration for the duplicate engine.
//!
//! `PhotoDedupConfig` is the `[photodedup]` section of the user config file,
//! `DedupConfig` is the final set of options the engine runs with.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;
use tracing::error;

use crate::dedup::classify::DEFAULT_ARCHIVE_DIR;
use crate::dedup::guard::DeleteMode;
use crate::dedup::record::FieldPolicy;
use crate::dedup::relocate::RelocateOptions;
use crate::dedup::resolve::ResolveOptions;
use crate::log::LogLevel;

/// Config from the user config file.
#[derive(Debug, Default, Deserialize)]
pub struct PhotoDedupConfig {
    #[serde(default)]
    pub archive_dir: Option<String>,
    #[serde(default)]
    pub close_size: bool,
    #[serde(default)]
    pub delete_match: Vec<String>,
    #[serde(default)]
    pub dirs: Vec<PathBuf>,
    #[serde(default)]
    pub exiftool: bool,
    #[serde(default)]
    pub keep_match: Option<String>,
    #[serde(default)]
    pub log_file: bool,
    #[serde(default)]
    pub move_dir: Option<PathBuf>,
    #[serde(default)]
    pub no_thumb: bool,
    #[serde(default)]
    pub picasa: bool,
    #[serde(default)]
    pub skip: Vec<String>,
    #[serde(default)]
    pub trash: bool,
    #[serde(default)]
    pub verbose: Option<LogLevel>,
}

/// Wrapper needed for parsing the config file section.
#[derive(Debug, Default, Deserialize)]
struct UserConfig {
    #[serde(default)]
    photodedup: PhotoDedupConfig,
}

/// Options for the engine passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupConfig {
    pub archive_dir: String,
    pub close_size: bool,
    pub compare_thumbnails: bool,
    pub delete: bool,
    pub delete_match: Vec<String>,
    pub exiftool: bool,
    pub hash: bool,
    pub keep_match: Option<String>,
    pub move_dir: Option<PathBuf>,
    pub move_files: bool,
    pub no_year: bool,
    pub only: bool,
    pub picasa: bool,
    pub skip: Vec<String>,
    pub trash: bool,
    pub undefined: bool,
}

impl PhotoDedupConfig {
    /// Try to read user config from the file if it exists.
    /// Otherwise, fall back to default config.
    ///
    /// # Errors
    /// Returns an error if config file exists but cannot be read or parsed.
    pub fn get_user_config() -> Result<Self> {
        let Some(path) = crate::config::CONFIG_PATH.as_deref() else {
            return Ok(Self::default());
        };

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse config file {}:\n{e}", path.display())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(anyhow::anyhow!(
                "Failed to read config file {}: {error}",
                path.display()
            )),
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the TOML string is invalid.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str::<UserConfig>(toml_str)
            .map(|config| config.photodedup)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {e}"))
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            archive_dir: DEFAULT_ARCHIVE_DIR.to_string(),
            close_size: false,
            compare_thumbnails: true,
            delete: false,
            delete_match: Vec::new(),
            exiftool: false,
            hash: false,
            keep_match: None,
            move_dir: None,
            move_files: false,
            no_year: false,
            only: false,
            picasa: false,
            skip: Vec::new(),
            trash: false,
            undefined: false,
        }
    }
}

impl DedupConfig {
    /// Check option combinations, disabling the move path if it has no destination.
    pub fn validate(&mut self) {
        if self.move_files && self.move_dir.is_none() {
            error!("Must have move dir option with move. Not moving files");
            self.move_files = false;
        }
    }

    #[must_use]
    pub fn field_policy(&self) -> FieldPolicy {
        FieldPolicy::standard(self.compare_thumbnails)
    }

    /// Deletions only happen with the delete flag, trash changes how.
    #[must_use]
    pub const fn delete_mode(&self) -> DeleteMode {
        match (self.delete, self.trash) {
            (true, true) => DeleteMode::Trash,
            (true, false) => DeleteMode::Delete,
            (false, _) => DeleteMode::DryRun,
        }
    }

    #[must_use]
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            keep_match: self.keep_match.clone(),
            delete_match: self.delete_match.clone(),
            skip: self.skip.clone(),
            only: self.only,
            no_year: self.no_year,
            exiftool: self.exiftool,
            hash: self.hash,
        }
    }

    #[must_use]
    pub fn relocate_options(&self) -> RelocateOptions {
        RelocateOptions {
            move_root: self.move_dir.clone(),
            move_files: self.move_files,
            picasa: self.picasa,
            compare_thumbnails: self.compare_thumbnails,
        }
    }
}
