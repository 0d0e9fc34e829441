use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use photo_dedup::dedup::{ActionLog, DedupEngine, DeleteMode, ExifReader, ExifTool, MutationCounts, print_key_stats};
use photo_dedup::log::{self, LogLevel};
use photo_dedup::{print_bold, print_error, print_warning};

use crate::config::Config;

pub struct PhotoDedup {
    config: Config,
}

impl PhotoDedup {
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build the index and run the requested passes over it.
    pub fn run(self) -> Result<()> {
        let start = Instant::now();
        log::init(self.config.verbose)?;

        let action_log = if self.config.log_file {
            match ActionLog::new() {
                Ok(action_log) => Some(action_log),
                Err(error) => {
                    print_warning!("Failed to create log file: {error}");
                    None
                }
            }
        } else {
            None
        };

        let mut engine = DedupEngine::new(
            self.config.dedup.clone(),
            Box::new(ExifTool::default()),
            Box::new(ExifReader),
        )
        .with_action_log(action_log);

        if let Some(file) = &self.config.file {
            Self::inspect(&engine, file)?;
        }

        if !self.config.load.is_empty() {
            engine.load(&self.config.load)?;
        }
        for dir in &self.config.dirs {
            engine.scan_photos(dir);
        }
        for dir in &self.config.video_dirs {
            engine.scan_videos(dir);
        }

        if let Some(save) = &self.config.save {
            engine
                .save(save)
                .with_context(|| format!("Failed to save index to {}", save.display()))?;
        }

        if self.config.stats {
            print_key_stats(engine.index());
        }

        let duplicates = if self.config.compare { engine.compare_all() } else { 0 };

        if self.config.dedup.move_dir.is_some() || self.config.verbose >= LogLevel::Debug {
            engine.audit_years().print_summary();
        }

        let counts = engine.counts();
        if self.config.compare || counts.moved > 0 {
            let dryrun = self.config.dedup.delete_mode() == DeleteMode::DryRun;
            Self::print_counts(dryrun, duplicates, counts);
        }
        engine.finish(duplicates);
        info!("Done in {}", photo_dedup::format_duration(start.elapsed()));
        Ok(())
    }

    /// Print all tags of a single file with its year classification.
    fn inspect(engine: &DedupEngine, file: &Path) -> Result<()> {
        if !file.is_file() {
            print_error!("File does not exist: {}", file.display());
            return Ok(());
        }
        let (tags, classification) = engine.inspect(file);
        print_bold!("{}", photo_dedup::path_to_string_relative(file));
        println!(
            "{}",
            serde_json::to_string_pretty(&tags).context("Failed to serialize tags")?
        );
        println!(
            "File year: {}  Taken: {}  Correct: {}",
            classification.file_year.as_deref().unwrap_or("null"),
            classification.year_taken.as_deref().unwrap_or("null"),
            photo_dedup::colorize_bool(classification.is_ok)
        );
        Ok(())
    }

    fn print_counts(dryrun: bool, duplicates: usize, counts: MutationCounts) {
        let heading = if dryrun {
            "--- Dryrun ---".cyan().bold()
        } else {
            "--- Summary ---".magenta().bold()
        };
        println!("{heading}");
        println!("Duplicates: {duplicates}");
        println!("Deleted:    {}", counts.deleted);
        println!("Moved:      {}", counts.moved);
        if counts.refused > 0 {
            println!("Refused:    {}", counts.refused.to_string().yellow());
        }
        if counts.failed > 0 {
            println!("Failed:     {}", counts.failed.to_string().red());
        }
    }
}
