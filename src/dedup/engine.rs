//! Run context that owns the partition index and drives the passes over it.

use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::dedup::action_log::ActionLog;
use crate::dedup::classify::{Classification, YearClassifier, YearHint};
use crate::dedup::compare::Comparator;
use crate::dedup::config::DedupConfig;
use crate::dedup::exiftool::MetadataTool;
use crate::dedup::extract::TagExtractor;
use crate::dedup::guard::{MutationCounts, MutationGuard};
use crate::dedup::partition::{PartitionIndex, is_undefined_key};
use crate::dedup::record::{FieldPolicy, Fields};
use crate::dedup::relocate::Relocator;
use crate::dedup::report::{YearAudit, YearOutcome};
use crate::dedup::resolve::DuplicateResolver;
use crate::dedup::scan::{PHOTO_EXTENSIONS, Scanner};

pub struct DedupEngine {
    config: DedupConfig,
    policy: FieldPolicy,
    classifier: YearClassifier,
    resolver: DuplicateResolver,
    relocator: Relocator,
    guard: MutationGuard,
    tool: Box<dyn MetadataTool>,
    extractor: Box<dyn TagExtractor>,
    index: PartitionIndex,
}

impl DedupEngine {
    #[must_use]
    pub fn new(mut config: DedupConfig, tool: Box<dyn MetadataTool>, extractor: Box<dyn TagExtractor>) -> Self {
        config.validate();
        let policy = config.field_policy();
        let classifier = YearClassifier::new(config.archive_dir.clone());
        let resolver = DuplicateResolver::new(
            Comparator::new(policy.clone(), config.close_size),
            classifier.clone(),
            config.resolve_options(),
        );
        let relocator = Relocator::new(
            Comparator::new(policy.clone(), config.close_size),
            config.relocate_options(),
        );
        let guard = MutationGuard::new(
            config.delete_mode(),
            config.keep_match.clone(),
            config.delete_match.clone(),
        );

        Self {
            config,
            policy,
            classifier,
            resolver,
            relocator,
            guard,
            tool,
            extractor,
            index: PartitionIndex::new(),
        }
    }

    /// Write every delete and move decision to the action log.
    #[must_use]
    pub fn with_action_log(mut self, mut action_log: Option<ActionLog>) -> Self {
        if let Some(log) = action_log.as_mut() {
            log.log_init(&self.config);
        }
        self.guard = self.guard.with_action_log(action_log);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &DedupConfig {
        &self.config
    }

    #[must_use]
    pub const fn index(&self) -> &PartitionIndex {
        &self.index
    }

    pub const fn index_mut(&mut self) -> &mut PartitionIndex {
        &mut self.index
    }

    #[must_use]
    pub const fn counts(&self) -> MutationCounts {
        self.guard.counts()
    }

    /// Load saved index files and merge them into the current index.
    pub fn load(&mut self, paths: &[impl AsRef<Path>]) -> Result<()> {
        let loaded = PartitionIndex::load(paths, &self.policy)?;
        info!("Loaded {} files in {} partitions", loaded.record_count(), loaded.len());
        self.index.merge(loaded);
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        info!("Saving to {}", path.display());
        self.index.save(path)
    }

    /// Add photos from a directory tree to the index.
    pub fn scan_photos(&mut self, dir: &Path) -> usize {
        let scanner = Scanner::new(
            &self.policy,
            &self.classifier,
            self.extractor.as_ref(),
            self.tool.as_ref(),
            self.config.hash,
        );
        scanner.scan_photos(dir, &mut self.index)
    }

    /// Add videos from a directory tree to the index.
    pub fn scan_videos(&mut self, dir: &Path) -> usize {
        let scanner = Scanner::new(
            &self.policy,
            &self.classifier,
            self.extractor.as_ref(),
            self.tool.as_ref(),
            self.config.hash,
        );
        scanner.scan_videos(dir, &mut self.index)
    }

    /// All tags of a single file and its year classification.
    #[must_use]
    pub fn inspect(&self, path: &Path) -> (Fields, Classification) {
        let extension = crate::path_to_file_extension_string(path);
        let tags = if PHOTO_EXTENSIONS.contains(&extension.as_str()) {
            self.extractor.extract(path)
        } else {
            self.tool.lookup(&[path]).into_iter().next().unwrap_or_default()
        };
        let classification = self.classifier.classify(path, YearHint::Fields(&tags));
        (tags, classification)
    }

    /// Resolve every partition and return the total number of duplicates.
    pub fn compare_all(&mut self) -> usize {
        let mut by_hash = if self.config.hash {
            debug!("Converting time index to hash index");
            Some(self.index.by_hash())
        } else {
            None
        };
        let index = by_hash.as_mut().unwrap_or(&mut self.index);

        let progress_bar = crate::progress_bar(index.len() as u64, crate::log::is_verbose());
        let mut dup_count = 0;
        for (key, records) in index.partitions_mut() {
            progress_bar.inc(1);
            if !should_resolve(key, records.len(), self.config.undefined) {
                continue;
            }
            debug!("Fileset to compare:\t{}\t{key}", records.len());
            dup_count += self
                .resolver
                .resolve_partition(records, key, &mut self.guard, self.tool.as_ref());
        }
        progress_bar.finish_and_clear();

        info!("============== Compare duplicates ================");
        info!("Number of duplicates: {dup_count}");
        let conflicts = self.resolver.hash_conflicts();
        if conflicts > 0 {
            warn!("Hash matches with unequal fields: {conflicts}");
        }
        dup_count
    }

    /// Sum file sizes by year correctness, moving misfiled files when a move root is set.
    pub fn audit_years(&mut self) -> YearAudit {
        let mut audit = YearAudit::default();
        let progress_bar = crate::progress_bar(self.index.record_count() as u64, crate::log::is_verbose());

        for (key, records) in self.index.iter() {
            for record in records {
                progress_bar.inc(1);
                let Ok(metadata) = fs::metadata(&record.path) else {
                    continue;
                };
                let size = metadata.len();
                let class = self.classifier.classify(&record.path, YearHint::Fields(&record.fields));
                let file_year = class.file_year.as_deref().unwrap_or("null");
                let year_taken = class.year_taken.as_deref().unwrap_or("null");

                let outcome = if class.is_ok {
                    YearOutcome::Correct
                } else if crate::path_contains_any(&record.path, &self.config.skip) {
                    debug!(
                        "File in EXCLUDE LIST (not counting in stats):\tFile year:\t{file_year}\tTaken:\t{year_taken}\t{}\tSize:\t{size}",
                        record.path.display()
                    );
                    YearOutcome::Skipped
                } else {
                    debug!(
                        "File in wrong year:\tFile year:\t{file_year}\tTaken:\t{year_taken}\t{}\tSize:\t{size}",
                        record.path.display()
                    );
                    let moved = self.config.move_dir.is_some()
                        && class.year_taken.is_some()
                        && self.relocator.resolve_misfiled(
                            &record.path,
                            class.year_taken.as_deref(),
                            &mut self.guard,
                            self.tool.as_ref(),
                        );
                    YearOutcome::Wrong { moved }
                };
                audit.add(key, size, outcome);
            }
        }
        progress_bar.finish_and_clear();
        audit
    }

    /// Write final counts to the action log.
    pub fn finish(&mut self, duplicates: usize) {
        let counts = self.guard.counts();
        if let Some(log) = self.guard.action_log_mut() {
            log.log_summary(counts.deleted, counts.moved, duplicates);
        }
    }
}

/// Check if a partition should be resolved.
/// Undefined keys are only resolved when asked for.
fn should_resolve(key: &str, len: usize, undefined: bool) -> bool {
    if key.is_empty() {
        return false;
    }
    if is_undefined_key(key) {
        return undefined;
    }
    len > 1
}

#[cfg(test)]
mod engine_tests {
    use super::*;

    use serde_json::json;
    use tempfile::tempdir;

    use crate::dedup::record::MetadataRecord;

    struct NoTool;

    impl MetadataTool for NoTool {
        fn lookup(&self, _paths: &[&Path]) -> Vec<Fields> {
            Vec::new()
        }

        fn stripped_payload(&self, _path: &Path) -> Option<Vec<u8>> {
            None
        }
    }

    struct NoTags;

    impl TagExtractor for NoTags {
        fn extract(&self, _path: &Path) -> Fields {
            Fields::new()
        }
    }

    fn engine(config: DedupConfig) -> DedupEngine {
        DedupEngine::new(config, Box::new(NoTool), Box::new(NoTags))
    }

    fn record(path: &Path, date: &str) -> MetadataRecord {
        let fields = json!({"DateTimeOriginal": date, "ISO": 100, "Software": "x"});
        MetadataRecord::new(path, 10, fields.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn partition_selection() {
        assert!(!should_resolve("", 5, true));
        assert!(!should_resolve("undefined (undefined) - (undefined)", 5, false));
        assert!(should_resolve("undefined (undefined) - (undefined)", 5, true));
        assert!(!should_resolve("2019:07:01 10:00:00", 1, false));
        assert!(should_resolve("2019:07:01 10:00:00", 2, false));
    }

    #[test]
    fn compare_all_counts_duplicates() {
        let dir = tempdir().expect("tempdir");
        let year_dir = dir.path().join("sortedByYear/2019");
        fs::create_dir_all(&year_dir).expect("create dirs");
        let first = year_dir.join("IMG_1.jpg");
        let second = year_dir.join("IMG_1 (1).jpg");
        fs::write(&first, vec![0u8; 10]).expect("write");
        fs::write(&second, vec![0u8; 10]).expect("write");

        let mut engine = engine(DedupConfig::default());
        let key = "2019:07:01 10:00:00";
        engine.index_mut().insert(key, record(&first, key));
        engine.index_mut().insert(key, record(&second, key));

        assert_eq!(engine.compare_all(), 1);
        assert!(second.exists());
        assert_eq!(engine.counts().deleted, 1);
    }

    #[test]
    fn audit_counts_wrong_years() {
        let dir = tempdir().expect("tempdir");
        let root = dir.path().join("sortedByYear");
        fs::create_dir_all(root.join("2018")).expect("create dirs");
        fs::create_dir_all(root.join("2019")).expect("create dirs");
        let right = root.join("2019/IMG_1.jpg");
        let wrong = root.join("2018/IMG_2.jpg");
        let skipped = root.join("2018/skipme/IMG_3.jpg");
        fs::create_dir_all(root.join("2018/skipme")).expect("create dirs");
        for path in [&right, &wrong, &skipped] {
            fs::write(path, vec![0u8; 10]).expect("write");
        }

        let mut engine = engine(DedupConfig {
            move_dir: Some(root.clone()),
            move_files: true,
            skip: vec!["skipme".to_string()],
            ..DedupConfig::default()
        });
        let date = "2019:07:01 10:00:00";
        engine.index_mut().insert("a", record(&right, date));
        engine.index_mut().insert("a", record(&wrong, date));
        engine.index_mut().insert("b", record(&skipped, date));
        engine
            .index_mut()
            .insert("b", record(&dir.path().join("missing.jpg"), date));

        let audit = engine.audit_years();
        assert_eq!(audit.overall.count, 3);
        assert_eq!(audit.overall.total_size, 30);
        assert_eq!(audit.overall.correct_size, 10);
        assert_eq!(audit.overall.wrong_count, 1);
        assert_eq!(audit.overall.skipped_count, 1);
        assert_eq!(audit.overall.moved_count, 1);
        assert!(root.join("2019/moved/IMG_2.jpg").exists());
        assert!(skipped.exists());
    }
}
