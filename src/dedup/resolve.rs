//! Pick which copy of a duplicate is kept and which one is deleted.

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use crate::dedup::classify::{Classification, YearClassifier, YearHint};
use crate::dedup::compare::Comparator;
use crate::dedup::exiftool::{MetadataTool, content_hash};
use crate::dedup::guard::MutationGuard;
use crate::dedup::record::{Fields, MetadataRecord};

/// Operator choices that steer resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Paths containing this are kept in favour of others.
    pub keep_match: Option<String>,
    /// Paths containing any of these are deleted in favour of others.
    pub delete_match: Vec<String>,
    /// Paths containing any of these are ignored.
    pub skip: Vec<String>,
    /// Only use sources matching `keep_match`.
    pub only: bool,
    /// Delete duplicates even when the source is in the wrong year.
    pub no_year: bool,
    /// Look up the capture year with the external tool.
    pub exiftool: bool,
    /// Compute missing content hashes.
    pub hash: bool,
}

/// Outcome for a duplicate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    DeleteDestination,
    DeleteSource,
    Keep,
}

pub struct DuplicateResolver {
    comparator: Comparator,
    classifier: YearClassifier,
    options: ResolveOptions,
    hash_conflicts: Cell<usize>,
}

impl ResolveOptions {
    fn is_keep(&self, path: &Path) -> bool {
        self.keep_match
            .as_deref()
            .is_some_and(|keep| crate::path_contains(path, keep))
    }

    fn is_delete_preferred(&self, path: &Path) -> bool {
        crate::path_contains_any(path, &self.delete_match)
    }

    fn is_skipped(&self, path: &Path) -> bool {
        crate::path_contains_any(path, &self.skip)
    }

    /// Sort order: keep matches first, delete matches last, then names with parentheses last.
    #[must_use]
    pub fn preference(&self, a: &Path, b: &Path) -> Ordering {
        self.is_keep(b)
            .cmp(&self.is_keep(a))
            .then_with(|| self.is_delete_preferred(a).cmp(&self.is_delete_preferred(b)))
            .then_with(|| crate::path_contains(a, "(").cmp(&crate::path_contains(b, "(")))
    }

    /// Can this record act as the source of a pair.
    #[must_use]
    pub fn source_allowed(&self, path: &Path) -> bool {
        !self.only || self.is_keep(path)
    }

    /// Decide the fate of a duplicate pair from the year classification of both.
    ///
    /// The destination is only classified when needed.
    pub fn decide(&self, source_ok: bool, destination: &Path, destination_ok: impl FnOnce() -> bool) -> Resolution {
        if source_ok || self.no_year {
            return Resolution::DeleteDestination;
        }
        if self.only && self.is_keep(destination) && destination_ok() {
            return Resolution::DeleteSource;
        }
        Resolution::Keep
    }
}

impl DuplicateResolver {
    #[must_use]
    pub const fn new(comparator: Comparator, classifier: YearClassifier, options: ResolveOptions) -> Self {
        Self {
            comparator,
            classifier,
            options,
            hash_conflicts: Cell::new(0),
        }
    }

    /// Pairs seen so far with equal content hashes but differing fields.
    #[must_use]
    pub fn hash_conflicts(&self) -> usize {
        self.hash_conflicts.get()
    }

    #[must_use]
    pub const fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Indices of records worth comparing, in preference order.
    #[must_use]
    pub fn candidates(&self, records: &[MetadataRecord]) -> Vec<usize> {
        let mut indices: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                if !record.path.exists() {
                    trace!("{} does not exist", record.path.display());
                    return false;
                }
                if self.options.is_skipped(&record.path) {
                    trace!("not looking up because {} is skipped", record.path.display());
                    return false;
                }
                true
            })
            .map(|(index, _)| index)
            .collect();

        // Stable sort keeps the original order within each tier
        indices.sort_by(|&a, &b| self.options.preference(&records[a].path, &records[b].path));
        indices
    }

    /// Resolve one partition and return the number of duplicates removed.
    pub fn resolve_partition(
        &self,
        records: &mut [MetadataRecord],
        key: &str,
        guard: &mut MutationGuard,
        tool: &dyn MetadataTool,
    ) -> usize {
        let order = self.candidates(records);
        trace!("Filtered from {} to {}", records.len(), order.len());
        if order.len() < 2 {
            return 0;
        }

        let lookups: Vec<Fields> = if self.options.exiftool {
            let paths: Vec<&Path> = order.iter().map(|&i| records[i].path.as_path()).collect();
            tool.lookup(&paths)
        } else {
            Vec::new()
        };

        if self.options.hash {
            for &index in &order {
                let record = &mut records[index];
                if record.hash.is_none() {
                    debug!("No hash for {}", record.path.display());
                    record.hash = content_hash(tool, &record.path);
                }
            }
        }

        let hint = |position: usize| {
            lookups
                .get(position)
                .filter(|tags| !tags.is_empty())
                .map_or(YearHint::Key(key), YearHint::Fields)
        };

        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut dup_count = 0;

        for (src_pos, &src_index) in order.iter().enumerate() {
            let src = &records[src_index];
            if !self.options.source_allowed(&src.path) {
                trace!("not comparing because {} does not match the keep pattern", src.path.display());
                continue;
            }

            for (dst_pos, &dst_index) in order.iter().enumerate().skip(src_pos + 1) {
                let dst = &records[dst_index];
                if claimed.contains(&src.path) {
                    break;
                }
                if claimed.contains(&dst.path) {
                    trace!("not comparing files because already marked as dup");
                    continue;
                }

                debug!(
                    "%%%% comparing files: \t{key}\t{}\t{}",
                    src.path.display(),
                    dst.path.display()
                );
                let comparison = self.comparator.compare(src, dst);

                if let (Some(src_hash), Some(dst_hash)) = (&src.hash, &dst.hash)
                    && src_hash == dst_hash
                    && !comparison.is_duplicate_candidate()
                {
                    self.hash_conflicts.set(self.hash_conflicts.get() + 1);
                    warn!(
                        "HASH match but unequal fields:\t{}/{}\t{key}\t{}\t{}\t{src_hash}",
                        comparison.diffs,
                        comparison.checks,
                        src.path.display(),
                        dst.path.display()
                    );
                }

                if !comparison.is_duplicate_candidate() {
                    debug!(
                        "Checked {}, found {} differences, declaring different",
                        comparison.checks,
                        comparison.diffs
                    );
                    continue;
                }
                debug!(
                    "Possible duplicate: Checked {}, found {} differences",
                    comparison.checks,
                    comparison.diffs
                );

                let src_class = self.classifier.classify(&src.path, hint(src_pos));
                let dst_class = || self.classifier.classify(&dst.path, hint(dst_pos));
                let resolution = if src_class.is_ok {
                    let dst_class = dst_class();
                    log_pair(&dst_class, "DST", key, src, dst);
                    self.options.decide(true, &dst.path, || dst_class.is_ok)
                } else {
                    log_pair(&src_class, "SRC", key, src, dst);
                    self.options.decide(false, &dst.path, || dst_class().is_ok)
                };

                match resolution {
                    Resolution::DeleteDestination => {
                        if guard.guarded_delete(&dst.path, &src.path) {
                            claimed.insert(dst.path.clone());
                            dup_count += 1;
                        }
                    }
                    Resolution::DeleteSource => {
                        info!(
                            "Swapping SRC and DST since DST matches {} and is in the right year",
                            self.options.keep_match.as_deref().unwrap_or_default()
                        );
                        if guard.guarded_delete(&src.path, &dst.path) {
                            claimed.insert(src.path.clone());
                            dup_count += 1;
                        }
                    }
                    Resolution::Keep => {}
                }
            }
        }

        debug!(
            "Number of duplicates for set ({key}): {dup_count}/{}",
            records.len()
        );
        dup_count
    }
}

fn log_pair(class: &Classification, which: &str, key: &str, src: &MetadataRecord, dst: &MetadataRecord) {
    let file_year = class.file_year.as_deref().unwrap_or("null");
    let year_taken = class.year_taken.as_deref().unwrap_or("null");
    if class.is_ok {
        info!(
            "Duplicate images in correct year:\t({file_year} == {year_taken})\t{key}\tSRC:\t{}\t{}\tDUP:\t{}\t{}",
            src.path.display(),
            src.size,
            dst.path.display(),
            dst.size
        );
    } else {
        info!(
            "{which} Image in wrong year:\t({file_year} != {year_taken})\t{key}\tSRC:\t{}\t{}\tDUP:\t{}\t{}",
            src.path.display(),
            src.size,
            dst.path.display(),
            dst.size
        );
    }
}

#[cfg(test)]
mod resolve_tests {
    use super::*;

    use std::fs;

    use serde_json::json;
    use tempfile::{TempDir, tempdir};

    use crate::dedup::guard::DeleteMode;
    use crate::dedup::record::FieldPolicy;

    struct NoTool;

    impl MetadataTool for NoTool {
        fn lookup(&self, _paths: &[&Path]) -> Vec<Fields> {
            Vec::new()
        }

        fn stripped_payload(&self, path: &Path) -> Option<Vec<u8>> {
            fs::read(path).ok()
        }
    }

    const KEY: &str = "2019:07:01 10:00:00";

    fn write_record(dir: &TempDir, name: &str, size: usize) -> MetadataRecord {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
        fs::write(&path, vec![7u8; size]).expect("write file");
        let fields = json!({
            "DateTimeOriginal": KEY,
            "ISO": 100,
            "ExposureTime": 0.01,
        });
        let Some(fields) = fields.as_object().cloned() else {
            panic!("object")
        };
        MetadataRecord::new(path, 1000, fields)
    }

    fn resolver(options: ResolveOptions) -> DuplicateResolver {
        DuplicateResolver::new(
            Comparator::new(FieldPolicy::default(), false),
            YearClassifier::default(),
            options,
        )
    }

    fn guard(mode: DeleteMode, options: &ResolveOptions) -> MutationGuard {
        MutationGuard::new(mode, options.keep_match.clone(), options.delete_match.clone())
    }

    #[test]
    fn deletes_duplicate_in_correct_year() {
        let dir = tempdir().expect("tempdir");
        let mut records = vec![
            write_record(&dir, "sortedByYear/2019/IMG_1.jpg", 1000),
            write_record(&dir, "sortedByYear/2019/IMG_1 (1).jpg", 1000),
        ];
        let options = ResolveOptions::default();
        let mut guard = guard(DeleteMode::Delete, &options);

        let count = resolver(options).resolve_partition(&mut records, KEY, &mut guard, &NoTool);
        assert_eq!(count, 1);
        assert!(records[0].path.exists());
        assert!(!records[1].path.exists());
    }

    #[test]
    fn dry_run_counts_but_keeps_files() {
        let dir = tempdir().expect("tempdir");
        let mut records = vec![
            write_record(&dir, "sortedByYear/2019/IMG_1 (1).jpg", 1000),
            write_record(&dir, "sortedByYear/2019/IMG_1.jpg", 1000),
        ];
        let options = ResolveOptions::default();
        let mut guard = guard(DeleteMode::DryRun, &options);

        let resolver = resolver(options);
        assert_eq!(resolver.resolve_partition(&mut records, KEY, &mut guard, &NoTool), 1);
        assert!(records.iter().all(|r| r.path.exists()));

        // Same decisions on a second pass
        assert_eq!(resolver.resolve_partition(&mut records, KEY, &mut guard, &NoTool), 1);
    }

    #[test]
    fn parenthesis_names_sort_last() {
        let dir = tempdir().expect("tempdir");
        let records = vec![
            write_record(&dir, "sortedByYear/2019/IMG_1 (1).jpg", 1000),
            write_record(&dir, "sortedByYear/2019/IMG_1.jpg", 1000),
        ];
        assert_eq!(resolver(ResolveOptions::default()).candidates(&records), vec![1, 0]);
    }

    #[test]
    fn sort_tiers() {
        let options = ResolveOptions {
            keep_match: Some("sortedByYear".to_string()),
            delete_match: vec!["Takeout".to_string()],
            ..ResolveOptions::default()
        };
        let keep = Path::new("/a/sortedByYear/2019/x.jpg");
        let delete = Path::new("/a/Takeout/x.jpg");
        let paren = Path::new("/a/other/x (1).jpg");
        let plain = Path::new("/a/other/x.jpg");
        assert_eq!(options.preference(keep, plain), Ordering::Less);
        assert_eq!(options.preference(delete, plain), Ordering::Greater);
        assert_eq!(options.preference(paren, plain), Ordering::Greater);
        assert_eq!(options.preference(delete, paren), Ordering::Greater);
    }

    #[test]
    fn missing_and_skipped_records_are_filtered() {
        let dir = tempdir().expect("tempdir");
        let mut records = vec![
            write_record(&dir, "sortedByYear/2019/IMG_1.jpg", 1000),
            write_record(&dir, "backup/IMG_1.jpg", 1000),
        ];
        records.push(MetadataRecord::new(dir.path().join("gone.jpg"), 1000, Fields::new()));
        let options = ResolveOptions {
            skip: vec!["backup".to_string()],
            ..ResolveOptions::default()
        };
        let mut guard = guard(DeleteMode::Delete, &options);
        let resolver = resolver(options);
        assert_eq!(resolver.candidates(&records), vec![0]);
        assert_eq!(resolver.resolve_partition(&mut records, KEY, &mut guard, &NoTool), 0);
        assert!(records[1].path.exists());
    }

    #[test]
    fn larger_destination_is_kept() {
        let dir = tempdir().expect("tempdir");
        let mut records = vec![
            write_record(&dir, "sortedByYear/2019/IMG_1.jpg", 1000),
            write_record(&dir, "sortedByYear/2019/IMG_1 (1).jpg", 2000),
        ];
        let options = ResolveOptions::default();
        let mut guard = guard(DeleteMode::Delete, &options);
        assert_eq!(resolver(options).resolve_partition(&mut records, KEY, &mut guard, &NoTool), 0);
        assert!(records[1].path.exists());
    }

    #[test]
    fn source_in_wrong_year_keeps_both() {
        let dir = tempdir().expect("tempdir");
        let mut records = vec![
            write_record(&dir, "sortedByYear/2018/IMG_1.jpg", 1000),
            write_record(&dir, "sortedByYear/2018/IMG_1 (1).jpg", 1000),
        ];
        let options = ResolveOptions::default();
        let mut guard = guard(DeleteMode::Delete, &options);
        assert_eq!(resolver(options).resolve_partition(&mut records, KEY, &mut guard, &NoTool), 0);
        assert!(records.iter().all(|r| r.path.exists()));
    }

    #[test]
    fn no_year_deletes_regardless() {
        let dir = tempdir().expect("tempdir");
        let mut records = vec![
            write_record(&dir, "incoming/IMG_1.jpg", 1000),
            write_record(&dir, "incoming/IMG_1 (1).jpg", 1000),
        ];
        let options = ResolveOptions {
            no_year: true,
            ..ResolveOptions::default()
        };
        let mut guard = guard(DeleteMode::Delete, &options);
        assert_eq!(resolver(options).resolve_partition(&mut records, KEY, &mut guard, &NoTool), 1);
        assert!(!records[1].path.exists());
    }

    #[test]
    fn only_mode_inverts_roles() {
        let dir = tempdir().expect("tempdir");
        let mut records = vec![
            write_record(&dir, "sortedByYear/2018/IMG_1.jpg", 1000),
            write_record(&dir, "sortedByYear/2019/IMG_1.jpg", 1000),
        ];
        let options = ResolveOptions {
            keep_match: Some("sortedByYear".to_string()),
            only: true,
            ..ResolveOptions::default()
        };
        let mut guard = guard(DeleteMode::Delete, &options);
        assert_eq!(resolver(options).resolve_partition(&mut records, KEY, &mut guard, &NoTool), 1);
        assert!(!records[0].path.exists());
        assert!(records[1].path.exists());
    }

    #[test]
    fn only_without_keep_match_compares_nothing() {
        let dir = tempdir().expect("tempdir");
        let mut records = vec![
            write_record(&dir, "sortedByYear/2019/IMG_1.jpg", 1000),
            write_record(&dir, "sortedByYear/2019/IMG_1 (1).jpg", 1000),
        ];
        let options = ResolveOptions {
            only: true,
            ..ResolveOptions::default()
        };
        let mut guard = guard(DeleteMode::Delete, &options);
        assert_eq!(resolver(options).resolve_partition(&mut records, KEY, &mut guard, &NoTool), 0);
    }

    #[test]
    fn claimed_records_are_not_compared_again() {
        let dir = tempdir().expect("tempdir");
        let mut records = vec![
            write_record(&dir, "sortedByYear/2019/IMG_1.jpg", 1000),
            write_record(&dir, "sortedByYear/2019/IMG_1 (1).jpg", 1000),
            write_record(&dir, "sortedByYear/2019/IMG_1 (2).jpg", 1000),
        ];
        let options = ResolveOptions::default();
        let mut guard = guard(DeleteMode::DryRun, &options);
        assert_eq!(resolver(options).resolve_partition(&mut records, KEY, &mut guard, &NoTool), 2);
        assert_eq!(guard.counts().deleted, 2);
    }

    #[test]
    fn hash_is_added_lazily() {
        let dir = tempdir().expect("tempdir");
        let mut records = vec![
            write_record(&dir, "sortedByYear/2019/IMG_1.jpg", 1000),
            write_record(&dir, "sortedByYear/2019/IMG_2.jpg", 1000),
        ];
        let options = ResolveOptions {
            hash: true,
            ..ResolveOptions::default()
        };
        let mut guard = guard(DeleteMode::DryRun, &options);
        let _ = resolver(options).resolve_partition(&mut records, KEY, &mut guard, &NoTool);
        assert!(records.iter().all(|r| r.hash.is_some()));
        assert_eq!(records[0].hash, records[1].hash);
    }

    #[test]
    fn equal_hash_with_unequal_fields_is_kept_and_counted() {
        let dir = tempdir().expect("tempdir");
        let mut records = vec![
            write_record(&dir, "sortedByYear/2019/IMG_1.jpg", 1000),
            write_record(&dir, "sortedByYear/2019/IMG_1 (1).jpg", 1000),
        ];
        records[1].fields.insert("ISO".to_string(), json!(400));
        let options = ResolveOptions {
            hash: true,
            ..ResolveOptions::default()
        };
        let mut guard = guard(DeleteMode::Delete, &options);
        let resolver = resolver(options);

        assert_eq!(resolver.resolve_partition(&mut records, KEY, &mut guard, &NoTool), 0);
        assert_eq!(records[0].hash, records[1].hash);
        assert!(records.iter().all(|r| r.path.exists()));
        assert_eq!(resolver.hash_conflicts(), 1);
        assert_eq!(guard.counts().deleted, 0);
    }

    #[test]
    fn decision_table() {
        let options = ResolveOptions {
            keep_match: Some("keep".to_string()),
            only: true,
            ..ResolveOptions::default()
        };
        let dst = Path::new("/keep/IMG.jpg");
        assert_eq!(options.decide(true, dst, || false), Resolution::DeleteDestination);
        assert_eq!(options.decide(false, dst, || true), Resolution::DeleteSource);
        assert_eq!(options.decide(false, dst, || false), Resolution::Keep);
        assert_eq!(options.decide(false, Path::new("/other/IMG.jpg"), || true), Resolution::Keep);
    }
}
