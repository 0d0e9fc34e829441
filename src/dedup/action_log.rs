use std::fs;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;

use crate::dedup::config::DedupConfig;

/// Simple file logger for delete and move decisions with buffered writes
pub struct ActionLog {
    writer: BufWriter<File>,
}

impl ActionLog {
    /// Create a new action log, writing to ~/logs/photo-dedup/photodedup_<timestamp>.log
    pub fn new() -> Result<Self> {
        let log_dir = crate::config::LOG_DIR
            .as_deref()
            .context("Failed to get home directory")?;
        Self::new_in(log_dir)
    }

    /// Create a new action log in the given directory.
    pub fn new_in(log_dir: &Path) -> Result<Self> {
        if !log_dir.exists() {
            fs::create_dir_all(log_dir).context("Failed to create log directory")?;
        }

        let log_path = log_dir.join(format!(
            "photodedup_{}.log",
            Local::now().format("%Y-%m-%d_%H-%M-%S")
        ));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn timestamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Log when starting the program
    pub fn log_init(&mut self, config: &DedupConfig) {
        let _ = writeln!(self.writer, "[{}] INIT", Self::timestamp());
        let _ = writeln!(self.writer, "  archive_dir: {}", config.archive_dir);
        let _ = writeln!(self.writer, "  delete: {}", config.delete);
        let _ = writeln!(self.writer, "  trash: {}", config.trash);
        if let Some(keep_match) = &config.keep_match {
            let _ = writeln!(self.writer, "  keep_match: {keep_match}");
        }
        if !config.delete_match.is_empty() {
            let _ = writeln!(self.writer, "  delete_match: {:?}", config.delete_match);
        }
        if !config.skip.is_empty() {
            let _ = writeln!(self.writer, "  skip: {:?}", config.skip);
        }
        if let Some(move_dir) = &config.move_dir {
            let _ = writeln!(self.writer, "  move_dir: {}", move_dir.display());
        }
        let _ = writeln!(self.writer, "  move: {}", config.move_files);
        let _ = writeln!(self.writer, "  only: {}", config.only);
        let _ = writeln!(self.writer, "  no_year: {}", config.no_year);
        let _ = self.writer.flush();
    }

    /// Log a deletion, performed or dry-run
    pub fn log_delete(&mut self, to_delete: &Path, keep: &Path, delete_size: u64, keep_size: u64, performed: bool) {
        let _ = writeln!(
            self.writer,
            "[{}] {} \"{}\" | MATCH \"{}\" | {} vs {}",
            Self::timestamp(),
            if performed { "DELETE " } else { "DRYRUN DELETE" },
            to_delete.display(),
            keep.display(),
            delete_size,
            keep_size
        );
        let _ = self.writer.flush();
    }

    /// Log a move, performed or dry-run
    pub fn log_move(&mut self, source: &Path, target: &Path, performed: bool) {
        let _ = writeln!(
            self.writer,
            "[{}] {} \"{}\" -> \"{}\"",
            Self::timestamp(),
            if performed { "MOVE   " } else { "DRYRUN MOVE" },
            source.display(),
            target.display()
        );
        let _ = self.writer.flush();
    }

    /// Log a failed mutation
    pub fn log_failure(&mut self, path: &Path, operation: &str, error: &str) {
        let _ = writeln!(
            self.writer,
            "[{}] ERROR   {} \"{}\" | {}",
            Self::timestamp(),
            operation.to_uppercase(),
            path.display(),
            error
        );
        let _ = self.writer.flush();
    }

    /// Log final counts
    pub fn log_summary(&mut self, deleted: usize, moved: usize, duplicates: usize) {
        let _ = writeln!(self.writer, "[{}] SUMMARY", Self::timestamp());
        let _ = writeln!(self.writer, "  Duplicates: {duplicates}");
        let _ = writeln!(self.writer, "  Deleted:    {deleted}");
        let _ = writeln!(self.writer, "  Moved:      {moved}");
        let _ = writeln!(self.writer, "[{}] END", Self::timestamp());
        let _ = self.writer.flush();
    }
}
