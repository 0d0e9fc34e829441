mod config;
mod photodedup;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;

use photo_dedup::dedup::PhotoDedupConfig;
use photo_dedup::log::LogLevel;

use crate::config::Config;
use crate::photodedup::PhotoDedup;

#[derive(Parser)]
#[command(
    author,
    version,
    name = env!("CARGO_BIN_NAME"),
    about = "Find and resolve duplicate photos in a year-sorted archive using capture metadata"
)]
pub struct Args {
    /// Photo directories to scan
    #[arg(value_hint = clap::ValueHint::DirPath)]
    dirs: Vec<PathBuf>,

    /// Additional photo directory to scan
    #[arg(long = "dir", num_args = 1, action = clap::ArgAction::Append, value_name = "DIR", value_hint = clap::ValueHint::DirPath)]
    dir: Vec<PathBuf>,

    /// Video directory to scan
    #[arg(short = 'w', long, num_args = 1, action = clap::ArgAction::Append, value_name = "VIDEO_DIR", value_hint = clap::ValueHint::DirPath)]
    video_dir: Vec<PathBuf>,

    /// Print extracted tags and year classification for a single file
    #[arg(short, long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    file: Option<PathBuf>,

    /// Save the index to a JSON file
    #[arg(short, long, value_name = "SAVE_FILE", value_hint = clap::ValueHint::FilePath)]
    save: Option<PathBuf>,

    /// Load a saved index file
    #[arg(short = 'L', long, num_args = 1, action = clap::ArgAction::Append, value_name = "LOAD_FILE", value_hint = clap::ValueHint::FilePath)]
    load: Vec<PathBuf>,

    /// Compare files within each partition
    #[arg(short, long)]
    compare: bool,

    /// Print partition keys with file counts
    #[arg(short = 'S', long)]
    stats: bool,

    /// Use exiftool to look up the capture year when comparing
    #[arg(short = 'x', long)]
    exiftool: bool,

    /// Keep files whose path contains this string
    #[arg(short, long, value_name = "KEEP")]
    keep_match: Option<String>,

    /// Prefer deleting files whose path contains this string
    #[arg(short = 'D', long, num_args = 1, action = clap::ArgAction::Append, value_name = "DELETE")]
    delete_match: Vec<String>,

    /// Only use files matching the keep pattern as the kept copy
    #[arg(short, long)]
    only: bool,

    /// Delete duplicates instead of only printing them
    #[arg(short, long)]
    delete: bool,

    /// Move deleted files to trash
    #[arg(short, long)]
    trash: bool,

    /// Archive root with year directories for misfiled files
    #[arg(short, long, value_name = "MOVE_DIR", value_hint = clap::ValueHint::DirPath)]
    move_dir: Option<PathBuf>,

    /// Move misfiled files instead of only printing them
    #[arg(short = 'M', long = "move")]
    move_files: bool,

    /// Ignore files whose path contains this string
    #[arg(short = 'e', long, num_args = 1, action = clap::ArgAction::Append, value_name = "SKIP")]
    skip: Vec<String>,

    /// Detect lower quality Picasa copies when moving
    #[arg(short, long)]
    picasa: bool,

    /// Do not compare thumbnail length
    #[arg(short = 'T', long)]
    no_thumb: bool,

    /// Also compare files without a capture time
    #[arg(short, long)]
    undefined: bool,

    /// Delete duplicates regardless of year correctness
    #[arg(short = 'y', long)]
    no_year: bool,

    /// Allow a small file size difference between duplicates
    #[arg(short = 'z', long)]
    close_size: bool,

    /// Compare by content hash instead of capture time
    #[arg(short = 'H', long)]
    hash: bool,

    /// Name of the archive directory that contains the year directories
    #[arg(short, long, value_name = "ARCHIVE_DIR")]
    archive_dir: Option<String>,

    /// Write delete and move decisions to a log file
    #[arg(short = 'g', long)]
    log_file: bool,

    /// Generate shell completion
    #[arg(short = 'l', long, value_name = "SHELL")]
    completion: Option<Shell>,

    /// Log level as a number 0-6 or a name
    #[arg(short, long, value_name = "LEVEL")]
    verbose: Option<LogLevel>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(ref shell) = args.completion {
        photo_dedup::generate_shell_completion(*shell, Args::command(), true, env!("CARGO_BIN_NAME"))
    } else {
        let user_config = PhotoDedupConfig::get_user_config()?;
        let config = Config::try_from_args(args, user_config)?;
        if config.has_inputs() {
            PhotoDedup::new(config).run()
        } else {
            Args::command().print_help()?;
            Ok(())
        }
    }
}
