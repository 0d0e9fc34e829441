//! Photo and video duplicate resolution.
//!
//! Files are indexed into partitions by capture time,
//! records within a partition are compared by their metadata fields,
//! and duplicates are deleted or moved into the correct year directory.

mod action_log;
mod classify;
mod compare;
mod config;
mod engine;
mod exiftool;
mod extract;
mod guard;
mod partition;
mod record;
mod relocate;
mod report;
mod resolve;
mod scan;

pub use action_log::ActionLog;
pub use classify::{Classification, DEFAULT_ARCHIVE_DIR, YearClassifier, YearHint};
pub use compare::{Comparator, Comparison};
pub use config::{DedupConfig, PhotoDedupConfig};
pub use engine::DedupEngine;
pub use exiftool::{ExifTool, MetadataTool, content_hash};
pub use extract::{ExifReader, TagExtractor};
pub use guard::{DeleteMode, MutationCounts, MutationGuard};
pub use partition::{PartitionIndex, photo_key, video_key};
pub use record::{FieldPolicy, Fields, MetadataRecord};
pub use relocate::{RelocateOptions, Relocator};
pub use report::{YearAudit, YearOutcome, YearStats, print_key_stats};
pub use resolve::{DuplicateResolver, Resolution, ResolveOptions};
pub use scan::Scanner;
