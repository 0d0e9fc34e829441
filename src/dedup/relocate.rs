//! Move files that are stored under the wrong year into the right year directory.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::dedup::compare::Comparator;
use crate::dedup::exiftool::MetadataTool;
use crate::dedup::guard::MutationGuard;
use crate::dedup::record::{Fields, field_string, is_truthy};
use crate::date;

/// Subdirectory of a year directory that receives moved files.
pub const MOVED_DIR: &str = "moved";

/// `Creator` tag written by Picasa exports.
pub const PICASA_CREATOR: &str = "Picasa";

/// `Encoder` tag of Google recoded videos.
pub const RECODE_ENCODER: &str = "Google";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocateOptions {
    /// Archive root that contains the year directories.
    pub move_root: Option<PathBuf>,
    /// Actually move files instead of only reporting.
    pub move_files: bool,
    /// Detect lower quality Picasa copies.
    pub picasa: bool,
    /// Include the thumbnail length in the Picasa field check.
    pub compare_thumbnails: bool,
}

pub struct Relocator {
    comparator: Comparator,
    options: RelocateOptions,
}

impl Relocator {
    #[must_use]
    pub const fn new(comparator: Comparator, options: RelocateOptions) -> Self {
        Self { comparator, options }
    }

    #[must_use]
    pub const fn options(&self) -> &RelocateOptions {
        &self.options
    }

    /// Move a misfiled file into `<root>/<year>/moved`.
    ///
    /// Returns true if the file was moved, or would have been with the move flag on.
    pub fn resolve_misfiled(
        &self,
        path: &Path,
        year_taken: Option<&str>,
        guard: &mut MutationGuard,
        tool: &dyn MetadataTool,
    ) -> bool {
        let Some(root) = self.options.move_root.as_deref() else {
            trace!("not moving {} because move root is not set", path.display());
            return false;
        };
        let Some(year) = year_taken.filter(|year| !year.is_empty()) else {
            trace!("not moving {} to unknown year", path.display());
            return false;
        };

        let year_dir = root.join(year);
        if !year_dir.exists() {
            warn!("not moving {} because {} does not exist", path.display(), year_dir.display());
            return false;
        }
        if !year_dir.is_dir() {
            warn!("not moving {} because {} is not a directory", path.display(), year_dir.display());
            return false;
        }

        let Some(file_name) = path.file_name() else {
            return false;
        };
        let target = target_dir(root, year, path).join(file_name);
        trace!("NEWDIR: {}", target.display());

        if target.exists() && !self.resolve_existing(path, &target, guard, tool) {
            return false;
        }

        // A dry-run replace leaves the old target in place
        let enabled = self.options.move_files && !target.exists();
        guard.guarded_move(path, &target, enabled)
    }

    /// Handle a same-named file at the move target.
    ///
    /// Returns true if the source should still be moved.
    fn resolve_existing(&self, source: &Path, target: &Path, guard: &mut MutationGuard, tool: &dyn MetadataTool) -> bool {
        let tags = tool.lookup(&[source, target]);
        let (source_tags, target_tags) = match tags.as_slice() {
            [source_tags, target_tags] if !source_tags.is_empty() && !target_tags.is_empty() => {
                (source_tags, target_tags)
            }
            _ => {
                warn!(
                    "not moving {} because {} already exists and could not be compared",
                    source.display(),
                    target.display()
                );
                return false;
            }
        };

        if self.options.picasa {
            if is_lower_quality_copy(source_tags, target_tags, self.options.compare_thumbnails) {
                info!(
                    "PICASA: {} is a better version of picasa file {}",
                    source.display(),
                    target.display()
                );
                if !self.options.move_files {
                    warn!(
                        "not deleting {} because it exists, and move option not set to move {} to replace it",
                        target.display(),
                        source.display()
                    );
                    return false;
                }
                return guard.guarded_delete(target, source);
            }
            if is_lower_quality_copy(target_tags, source_tags, self.options.compare_thumbnails) {
                info!(
                    "PICASA (reverse): {} is a better version of picasa file {}",
                    target.display(),
                    source.display()
                );
                guard.guarded_delete(source, target);
                return false;
            }
            trace!("{} and {} not picasa dups", source.display(), target.display());
        }

        warn!("not moving {} because {} already exists", source.display(), target.display());
        let comparison = self.comparator.compare_fields(source_tags, target_tags);
        debug!(
            "Differences with existing files: {}/{}",
            comparison.diffs,
            comparison.checks
        );
        if comparison.diffs == 0 {
            info!("SAME file in {} and {}", source.display(), target.display());
            if self.options.move_files {
                guard.guarded_delete(source, target);
            }
        } else if is_recode(source_tags, target_tags) {
            warn!(
                "RECODE: {} appears to be google recode of {}",
                source.display(),
                target.display()
            );
        }
        false
    }
}

/// Directory a misfiled file is moved to.
///
/// Files from a year directory go to `<root>/<year>/moved`,
/// files from any other directory keep that directory name under it.
#[must_use]
pub fn target_dir(root: &Path, year: &str, source: &Path) -> PathBuf {
    let moved = root.join(year).join(MOVED_DIR);
    let parent_name = source
        .parent()
        .and_then(Path::file_name)
        .map(crate::os_str_to_string)
        .unwrap_or_default();

    if parent_name.is_empty() || date::is_year_name(&parent_name) {
        moved
    } else {
        moved.join(parent_name)
    }
}

/// Check if `candidate` is a Picasa export of `original` with the same or lower quality.
#[must_use]
pub fn is_lower_quality_copy(original: &Fields, candidate: &Fields, compare_thumbnails: bool) -> bool {
    if field_string(candidate, "Creator").as_deref() != Some(PICASA_CREATOR) {
        trace!("Not from picasa: Creator: {:?}", candidate.get("Creator"));
        return false;
    }

    let mut identity_fields = vec!["DateTimeOriginal", "Make", "Model"];
    if compare_thumbnails {
        identity_fields.push("ThumbnailLength");
    }
    let different = identity_fields.iter().any(|&field| {
        let (a, b) = (original.get(field), candidate.get(field));
        !is_truthy(a) || !is_truthy(b) || a != b
    });
    if different {
        trace!("Not a picasa match because identity fields differ");
        return false;
    }

    let at_least = |field: &str| match (number(original, field), number(candidate, field)) {
        (Some(a), Some(b)) => a >= b,
        _ => false,
    };
    let same_subject = original.get("SubjectArea") == candidate.get("SubjectArea");
    let same_dimensions = original.get("ImageWidth").is_some()
        && original.get("ImageWidth") == candidate.get("RelatedImageWidth")
        && original.get("ImageHeight") == candidate.get("ImageHeight");

    at_least("Megapixels") && at_least("ImageWidth") && at_least("ImageHeight") && (same_subject || same_dimensions)
}

/// Check if `recode` looks like a Google re-encode of `original`.
#[must_use]
pub fn is_recode(recode: &Fields, original: &Fields) -> bool {
    const SIGNATURE: [&str; 4] = ["Duration", "SourceImageWidth", "SourceImageHeight", "Megapixels"];
    field_string(recode, "Encoder").as_deref() == Some(RECODE_ENCODER)
        && SIGNATURE
            .iter()
            .all(|&field| is_truthy(recode.get(field)) && recode.get(field) == original.get(field))
}

fn number(fields: &Fields, name: &str) -> Option<f64> {
    match fields.get(name)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
