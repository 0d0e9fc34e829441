//! Re-validate the filesystem before deleting or moving anything.

use std::fs;
use std::path::Path;

use tracing::{debug, error, info, trace, warn};

use crate::dedup::action_log::ActionLog;

/// A file marked as disposable may be larger than the kept copy by less than this many bytes.
pub const DELETE_MATCH_SIZE_TOLERANCE: u64 = 50;

/// How deletions are carried out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeleteMode {
    /// Only report what would be deleted.
    #[default]
    DryRun,
    /// Unlink the file.
    Delete,
    /// Move the file to the system trash.
    Trash,
}

/// Counts of mutations, performed or reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationCounts {
    pub deleted: usize,
    pub moved: usize,
    pub refused: usize,
    pub failed: usize,
}

/// Gatekeeper for every destructive filesystem action.
pub struct MutationGuard {
    mode: DeleteMode,
    keep_match: Option<String>,
    delete_match: Vec<String>,
    action_log: Option<ActionLog>,
    counts: MutationCounts,
}

impl MutationGuard {
    #[must_use]
    pub const fn new(mode: DeleteMode, keep_match: Option<String>, delete_match: Vec<String>) -> Self {
        Self {
            mode,
            keep_match,
            delete_match,
            action_log: None,
            counts: MutationCounts {
                deleted: 0,
                moved: 0,
                refused: 0,
                failed: 0,
            },
        }
    }

    /// Also write every decision to the given action log.
    #[must_use]
    pub fn with_action_log(mut self, action_log: Option<ActionLog>) -> Self {
        self.action_log = action_log;
        self
    }

    #[must_use]
    pub const fn mode(&self) -> DeleteMode {
        self.mode
    }

    #[must_use]
    pub const fn counts(&self) -> MutationCounts {
        self.counts
    }

    pub fn action_log_mut(&mut self) -> Option<&mut ActionLog> {
        self.action_log.as_mut()
    }

    /// Delete `to_delete` in favour of `keep` if it is still safe to do so.
    ///
    /// Returns true if the duplicate was resolved, either deleted or reported in dry-run mode.
    pub fn guarded_delete(&mut self, to_delete: &Path, keep: &Path) -> bool {
        if !keep.exists() {
            warn!(
                "Not deleting {} because SRC: {} does not exist",
                to_delete.display(),
                keep.display()
            );
            return false;
        }
        if !to_delete.exists() {
            warn!(
                "Not deleting {} because DEST: {} does not exist",
                keep.display(),
                to_delete.display()
            );
            return false;
        }

        let sizes = fs::metadata(keep).and_then(|keep_meta| Ok((keep_meta.len(), fs::metadata(to_delete)?.len())));
        let (keep_size, delete_size) = match sizes {
            Ok(sizes) => sizes,
            Err(error) => {
                error!("Unable to delete file {}: {error}", to_delete.display());
                self.counts.failed += 1;
                return false;
            }
        };

        let keep_is_at_least_as_big = keep_size >= delete_size;
        let slightly_larger_delete = self.matches_delete(to_delete)
            && delete_size.saturating_sub(keep_size) < DELETE_MATCH_SIZE_TOLERANCE;
        trace!(
            "delete check: keep is at least as big: {keep_is_at_least_as_big}, slightly larger delete: {slightly_larger_delete}"
        );

        if !keep_is_at_least_as_big && !slightly_larger_delete {
            info!(
                "Not deleting {} because size is larger than {} ({delete_size} > {keep_size})",
                to_delete.display(),
                keep.display()
            );
            self.counts.refused += 1;
            return false;
        }

        if let Some(keep_match) = &self.keep_match
            && crate::path_contains(to_delete, keep_match)
            && !crate::path_contains(keep, keep_match)
        {
            info!(
                "{} matches {keep_match}, while src: {} does not, not deleting",
                to_delete.display(),
                keep.display()
            );
            self.counts.refused += 1;
            return false;
        }

        let size_delta = delete_size.cast_signed() - keep_size.cast_signed();
        let result = match self.mode {
            DeleteMode::DryRun => {
                info!(
                    "\twould be DELETED, but not because flag is off\t{}\tMATCH:\t{}\tSIZE:\t{size_delta}\t{delete_size}\t{keep_size}",
                    to_delete.display(),
                    keep.display()
                );
                Ok(())
            }
            DeleteMode::Delete => fs::remove_file(to_delete).map_err(|e| e.to_string()),
            DeleteMode::Trash => trash::delete(to_delete).map_err(|e| e.to_string()),
        };

        match result {
            Ok(()) => {
                let performed = self.mode != DeleteMode::DryRun;
                if performed {
                    info!(
                        "\tDELETED\t{}\tMATCH:\t{}\tSIZE:\t{size_delta}\t{delete_size}\t{keep_size}",
                        to_delete.display(),
                        keep.display()
                    );
                }
                if let Some(log) = self.action_log.as_mut() {
                    log.log_delete(to_delete, keep, delete_size, keep_size, performed);
                }
                self.counts.deleted += 1;
                true
            }
            Err(error) => {
                error!("Unable to delete file {}: {error}", to_delete.display());
                if let Some(log) = self.action_log.as_mut() {
                    log.log_failure(to_delete, "delete", &error);
                }
                self.counts.failed += 1;
                false
            }
        }
    }

    /// Move `source` to `target`, creating parent directories.
    ///
    /// Only touches the filesystem when `enabled`; otherwise reports the intended move.
    /// Returns true if the move was performed or would have been.
    pub fn guarded_move(&mut self, source: &Path, target: &Path, enabled: bool) -> bool {
        if !source.exists() {
            warn!("Not moving {} because it does not exist", source.display());
            return false;
        }

        if !enabled {
            debug!("not MOVING (move flag off) {} to {}", source.display(), target.display());
            if let Some(log) = self.action_log.as_mut() {
                log.log_move(source, target, false);
            }
            self.counts.moved += 1;
            return true;
        }

        if target.exists() {
            debug!("... really not moving because {} already exists", target.display());
            self.counts.refused += 1;
            return false;
        }

        let result = target
            .parent()
            .map_or(Ok(()), |parent| {
                if parent.exists() {
                    Ok(())
                } else {
                    debug!("CREATING DIRECTORY FOR MOVE: {}", parent.display());
                    fs::create_dir_all(parent)
                }
            })
            .and_then(|()| fs::rename(source, target));

        match result {
            Ok(()) => {
                debug!("MOVED {} to {}", source.display(), target.display());
                if let Some(log) = self.action_log.as_mut() {
                    log.log_move(source, target, true);
                }
                self.counts.moved += 1;
                true
            }
            Err(error) => {
                error!("Error moving {} to {}: {error}", source.display(), target.display());
                if let Some(log) = self.action_log.as_mut() {
                    log.log_failure(source, "move", &error.to_string());
                }
                self.counts.failed += 1;
                false
            }
        }
    }

    fn matches_delete(&self, path: &Path) -> bool {
        crate::path_contains_any(path, &self.delete_match)
    }
}
