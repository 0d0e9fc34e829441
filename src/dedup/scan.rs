//! Build the partition index by walking photo and video directories.

use std::path::Path;

use walkdir::WalkDir;
use tracing::{debug, error, info, trace};

use crate::dedup::classify::{YearClassifier, YearHint};
use crate::dedup::exiftool::{MetadataTool, content_hash};
use crate::dedup::extract::TagExtractor;
use crate::dedup::partition::{PartitionIndex, needs_disambiguation, photo_key, video_key};
use crate::dedup::record::{FieldPolicy, MetadataRecord, field_string};

pub const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "mpg", "avi"];

/// Photos smaller than this get the image size added to their key.
pub const SMALL_FILE_SIZE: u64 = 200_000;

/// Capture years before this are treated as a camera with an unset clock.
pub const MIN_PLAUSIBLE_YEAR: i32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Photo,
    Video,
}

/// Reads metadata for every supported file under a directory.
pub struct Scanner<'a> {
    policy: &'a FieldPolicy,
    classifier: &'a YearClassifier,
    extractor: &'a dyn TagExtractor,
    tool: &'a dyn MetadataTool,
    hash: bool,
}

impl<'a> Scanner<'a> {
    #[must_use]
    pub fn new(
        policy: &'a FieldPolicy,
        classifier: &'a YearClassifier,
        extractor: &'a dyn TagExtractor,
        tool: &'a dyn MetadataTool,
        hash: bool,
    ) -> Self {
        Self {
            policy,
            classifier,
            extractor,
            tool,
            hash,
        }
    }

    /// Add all JPEG files under `dir` to the index. Returns the number of records added.
    pub fn scan_photos(&self, dir: &Path, index: &mut PartitionIndex) -> usize {
        self.scan(dir, index, MediaKind::Photo)
    }

    /// Add all video files under `dir` to the index. Returns the number of records added.
    pub fn scan_videos(&self, dir: &Path, index: &mut PartitionIndex) -> usize {
        self.scan(dir, index, MediaKind::Video)
    }

    fn scan(&self, dir: &Path, index: &mut PartitionIndex, kind: MediaKind) -> usize {
        info!("getting files: {}", dir.display());
        let spinner = crate::spinner(crate::log::is_verbose());
        let mut added = 0;

        for entry in WalkDir::new(dir)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !crate::is_hidden(e))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    error!("Error reading files: {error}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(error) => {
                    error!("Error getting file {}: {error}", entry.path().display());
                    continue;
                }
            };

            trace!("{} is a file", entry.path().display());
            let result = match kind {
                MediaKind::Photo => self.photo_entry(entry.path(), size),
                MediaKind::Video => self.video_entry(entry.path(), size),
            };
            if let Some((key, record)) = result {
                trace!("using key: {key}");
                index.insert(key, record);
                added += 1;
                spinner.inc(1);
            }
        }

        spinner.finish_and_clear();
        debug!("Found {added} files in {}", dir.display());
        added
    }

    /// Record and temporal key for a JPEG file, or `None` for other file types.
    pub fn photo_entry(&self, path: &Path, size: u64) -> Option<(String, MetadataRecord)> {
        if !has_extension(path, PHOTO_EXTENSIONS) {
            trace!("not getting non JPEG: {}", path.display());
            return None;
        }

        let tags = self.extractor.extract(path);
        let mut record = MetadataRecord::from_photo_tags(path, size, &tags, self.policy);
        if self.hash {
            record.hash = content_hash(self.tool, path);
        }

        let date = field_string(&tags, "DateTimeOriginal").or_else(|| field_string(&tags, "ModifyDate"));
        let year = self.classifier.year_taken(path, YearHint::Fields(&tags));

        let key = if needs_disambiguation(
            date.as_deref(),
            year.as_deref(),
            size,
            SMALL_FILE_SIZE,
            MIN_PLAUSIBLE_YEAR,
        ) {
            let lookup = self.tool.lookup(&[path]).into_iter().next();
            let image_size = lookup.as_ref().and_then(|tags| field_string(tags, "ImageSize"));
            if let Some(extra) = &lookup {
                record.merge_fields(extra, self.policy);
            }
            photo_key(date.as_deref(), Some((year.as_deref(), image_size.as_deref())))
        } else {
            photo_key(date.as_deref(), None)
        };

        Some((key, record))
    }

    /// Record and temporal key for a video file, or `None` for other file types.
    pub fn video_entry(&self, path: &Path, size: u64) -> Option<(String, MetadataRecord)> {
        if !has_extension(path, VIDEO_EXTENSIONS) {
            trace!("not getting non movie: {}", path.display());
            return None;
        }

        debug!("Getting video info for: {}", path.display());
        let tags = self.tool.lookup(&[path]).into_iter().next()?;
        let mut record = MetadataRecord::from_video_tags(path, size, &tags, self.policy);
        if self.hash {
            record.hash = content_hash(self.tool, path);
        }

        let create_time = field_string(&tags, "DateTimeOriginal").or_else(|| field_string(&tags, "MediaCreateDate"));
        let duration = field_string(&tags, "TrackDuration").or_else(|| field_string(&tags, "Duration"));
        Some((video_key(create_time.as_deref(), duration.as_deref()), record))
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let extension = crate::path_to_file_extension_string(path);
    extensions.contains(&extension.as_str())
}
