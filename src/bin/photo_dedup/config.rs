use std::path::PathBuf;

use anyhow::{Context, Result};
use itertools::Itertools;

use photo_dedup::dedup::{DEFAULT_ARCHIVE_DIR, DedupConfig, PhotoDedupConfig};
use photo_dedup::log::LogLevel;

use crate::Args;

/// Final config combined from CLI arguments and user config file.
#[derive(Debug, Default)]
pub struct Config {
    pub(crate) compare: bool,
    pub(crate) dedup: DedupConfig,
    pub(crate) dirs: Vec<PathBuf>,
    pub(crate) file: Option<PathBuf>,
    pub(crate) load: Vec<PathBuf>,
    pub(crate) log_file: bool,
    pub(crate) save: Option<PathBuf>,
    pub(crate) stats: bool,
    pub(crate) verbose: LogLevel,
    pub(crate) video_dirs: Vec<PathBuf>,
}

impl Config {
    /// Create config from given command line args and user config file.
    ///
    /// # Errors
    /// Returns an error if a given directory does not exist,
    /// or if `--only` is used without any keep match.
    pub(crate) fn try_from_args(args: Args, user_config: PhotoDedupConfig) -> Result<Self> {
        let dirs: Vec<PathBuf> = args
            .dirs
            .into_iter()
            .chain(args.dir)
            .chain(user_config.dirs)
            .unique()
            .map(|dir| resolve_dir(&dir))
            .collect::<Result<_>>()?;

        let video_dirs: Vec<PathBuf> = args
            .video_dir
            .into_iter()
            .unique()
            .map(|dir| resolve_dir(&dir))
            .collect::<Result<_>>()?;

        let delete_match: Vec<String> = args
            .delete_match
            .into_iter()
            .chain(user_config.delete_match)
            .unique()
            .collect();

        let skip: Vec<String> = args.skip.into_iter().chain(user_config.skip).unique().collect();

        let keep_match = args.keep_match.or(user_config.keep_match);
        if args.only && keep_match.is_none() {
            anyhow::bail!("--only requires a keep match from --keep-match or the config file");
        }

        let dedup = DedupConfig {
            archive_dir: args
                .archive_dir
                .or(user_config.archive_dir)
                .unwrap_or_else(|| DEFAULT_ARCHIVE_DIR.to_string()),
            close_size: args.close_size || user_config.close_size,
            compare_thumbnails: !(args.no_thumb || user_config.no_thumb),
            delete: args.delete,
            delete_match,
            exiftool: args.exiftool || user_config.exiftool,
            hash: args.hash,
            keep_match,
            move_dir: args.move_dir.or(user_config.move_dir),
            move_files: args.move_files,
            no_year: args.no_year,
            only: args.only,
            picasa: args.picasa || user_config.picasa,
            skip,
            trash: args.trash || user_config.trash,
            undefined: args.undefined,
        };

        Ok(Self {
            compare: args.compare,
            dedup,
            dirs,
            file: args.file,
            load: args.load,
            log_file: args.log_file || user_config.log_file,
            save: args.save,
            stats: args.stats,
            verbose: args.verbose.or(user_config.verbose).unwrap_or_default(),
            video_dirs,
        })
    }

    /// Check if there is anything to read files from.
    pub(crate) const fn has_inputs(&self) -> bool {
        self.file.is_some() || !self.dirs.is_empty() || !self.load.is_empty() || !self.video_dirs.is_empty()
    }
}

fn resolve_dir(dir: &std::path::Path) -> Result<PathBuf> {
    photo_dedup::resolve_input_path(Some(dir)).with_context(|| format!("Invalid directory: {}", dir.display()))
}

#[cfg(test)]
mod config_from_args_tests {
    use super::*;

    use clap::Parser;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("photodedup").chain(args.iter().copied())).expect("should parse")
    }

    #[test]
    fn defaults_without_inputs() {
        let config = Config::try_from_args(parse(&[]), PhotoDedupConfig::default()).expect("config");
        assert!(!config.has_inputs());
        assert_eq!(config.verbose, LogLevel::Info);
        assert_eq!(config.dedup, DedupConfig::default());
    }

    #[test]
    fn cli_and_user_lists_are_merged() {
        let user_config = PhotoDedupConfig {
            delete_match: vec!["Takeout".to_string(), "(1)".to_string()],
            skip: vec!["@eaDir".to_string()],
            ..PhotoDedupConfig::default()
        };
        let args = parse(&["-D", "(1)", "-D", "copy", "-e", "@eaDir"]);
        let config = Config::try_from_args(args, user_config).expect("config");
        assert_eq!(config.dedup.delete_match, vec!["(1)", "copy", "Takeout"]);
        assert_eq!(config.dedup.skip, vec!["@eaDir"]);
    }

    #[test]
    fn cli_scalars_override_user_config() {
        let user_config = PhotoDedupConfig {
            archive_dir: Some("Photos".to_string()),
            keep_match: Some("Photos".to_string()),
            verbose: Some(LogLevel::Warn),
            ..PhotoDedupConfig::default()
        };
        let args = parse(&["-k", "sortedByYear", "-v", "debug"]);
        let config = Config::try_from_args(args, user_config).expect("config");
        assert_eq!(config.dedup.keep_match.as_deref(), Some("sortedByYear"));
        assert_eq!(config.dedup.archive_dir, "Photos");
        assert_eq!(config.verbose, LogLevel::Debug);
    }

    #[test]
    fn user_booleans_are_combined() {
        let user_config = PhotoDedupConfig {
            close_size: true,
            no_thumb: true,
            log_file: true,
            trash: true,
            ..PhotoDedupConfig::default()
        };
        let config = Config::try_from_args(parse(&["-p"]), user_config).expect("config");
        assert!(config.dedup.close_size);
        assert!(!config.dedup.compare_thumbnails);
        assert!(config.log_file);
        assert!(config.dedup.trash);
        assert!(config.dedup.picasa);
        assert!(!config.dedup.delete);
    }

    #[test]
    fn only_accepts_keep_match_from_user_config() {
        let user_config = PhotoDedupConfig {
            keep_match: Some("sortedByYear".to_string()),
            ..PhotoDedupConfig::default()
        };
        let config = Config::try_from_args(parse(&["--only"]), user_config).expect("config");
        assert!(config.dedup.only);
        assert_eq!(config.dedup.keep_match.as_deref(), Some("sortedByYear"));
    }

    #[test]
    fn only_without_any_keep_match_is_an_error() {
        assert!(Config::try_from_args(parse(&["--only"]), PhotoDedupConfig::default()).is_err());
    }

    #[test]
    fn directories_are_resolved() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().to_string_lossy().to_string();
        let args = parse(&[&path, "--dir", &path]);
        let config = Config::try_from_args(args, PhotoDedupConfig::default()).expect("config");
        assert_eq!(config.dirs.len(), 1);
        assert!(config.has_inputs());

        let missing = dir.path().join("missing").to_string_lossy().to_string();
        assert!(Config::try_from_args(parse(&[&missing]), PhotoDedupConfig::default()).is_err());
    }

    #[test]
    fn load_only_counts_as_input() {
        let config = Config::try_from_args(parse(&["-L", "index.json"]), PhotoDedupConfig::default()).expect("config");
        assert!(config.has_inputs());
        assert!(config.dirs.is_empty());
    }
}
