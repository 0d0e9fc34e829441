use std::collections::BTreeMap;

use colored::Colorize;
use tracing::info;

use crate::dedup::partition::PartitionIndex;

/// Size and count totals for the year audit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YearStats {
    pub total_size: u64,
    pub correct_size: u64,
    pub wrong_size: u64,
    pub count: usize,
    pub correct_count: usize,
    pub wrong_count: usize,
    pub skipped_count: usize,
    pub moved_count: usize,
}

/// Year audit totals overall and per partition key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearAudit {
    pub overall: YearStats,
    pub by_key: BTreeMap<String, YearStats>,
}

/// How one record was counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearOutcome {
    Correct,
    Wrong { moved: bool },
    Skipped,
}

impl YearStats {
    pub const fn add(&mut self, size: u64, outcome: YearOutcome) {
        self.total_size += size;
        self.count += 1;
        match outcome {
            YearOutcome::Correct => {
                self.correct_size += size;
                self.correct_count += 1;
            }
            YearOutcome::Wrong { moved } => {
                self.wrong_size += size;
                self.wrong_count += 1;
                if moved {
                    self.moved_count += 1;
                }
            }
            YearOutcome::Skipped => self.skipped_count += 1,
        }
    }
}

impl YearAudit {
    pub fn add(&mut self, key: &str, size: u64, outcome: YearOutcome) {
        self.overall.add(size, outcome);
        self.by_key.entry(key.to_string()).or_default().add(size, outcome);
    }

    pub fn print_summary(&self) {
        let stats = &self.overall;
        println!("{}", "\n--- Files by correct year ---".bold().magenta());
        println!("Total     size: {}", crate::format_size(stats.total_size));
        println!(
            "Bad year  size: {}",
            if stats.wrong_size > 0 {
                crate::format_size(stats.wrong_size).red()
            } else {
                crate::format_size(0).normal()
            }
        );
        println!("Good year size: {}", crate::format_size(stats.correct_size));
        println!("Total    files: {}", stats.count);
        println!("Wrong yr files: {}", stats.wrong_count);
        if stats.skipped_count > 0 {
            println!("Skipped  files: {}", stats.skipped_count);
        }
        println!("Moved    files: {}", stats.moved_count);

        let wrong_keys = self.wrong_year_keys();
        if !wrong_keys.is_empty() {
            println!("{}", "--- Wrong year by key ---".bold());
            for (key, stats) in wrong_keys {
                println!(
                    "{:>5}  {:>10}  {key}",
                    stats.wrong_count,
                    crate::format_size(stats.wrong_size)
                );
            }
        }
    }

    /// Partition keys that have files in the wrong year, most wrong files first.
    #[must_use]
    pub fn wrong_year_keys(&self) -> Vec<(&str, &YearStats)> {
        let mut keys: Vec<(&str, &YearStats)> = self
            .by_key
            .iter()
            .filter(|(_, stats)| stats.wrong_count > 0)
            .map(|(key, stats)| (key.as_str(), stats))
            .collect();
        keys.sort_by(|a, b| b.1.wrong_count.cmp(&a.1.wrong_count));
        keys
    }
}

/// Print partition keys with their record counts, smallest first.
pub fn print_key_stats(index: &PartitionIndex) {
    info!("============= Files by time key ====================");
    for (key, count) in index.key_counts() {
        info!("\t{count}\t{key}");
    }
    info!(
        "{} keys, {} files",
        index.len(),
        index.record_count()
    );
}
