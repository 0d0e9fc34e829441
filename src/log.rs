//! Console logging on top of `tracing`.
//!
//! Verbosity levels `FATAL` to `ALL` map onto a tracing `LevelFilter`.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use colored::{ColoredString, Colorize};
use serde::{Deserialize, Deserializer};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Fatal = 0,
    Error = 1,
    Warn = 2,
    #[default]
    Info = 3,
    Debug = 4,
    Trace = 5,
    All = 6,
}

impl LogLevel {
    pub const ALL_LEVELS: [Self; 7] = [
        Self::Fatal,
        Self::Error,
        Self::Warn,
        Self::Info,
        Self::Debug,
        Self::Trace,
        Self::All,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
            Self::All => "ALL",
        }
    }

    /// Most verbose tracing level shown for this verbosity.
    ///
    /// `FATAL` silences everything below a fatal exit,
    /// `ALL` is the same as `TRACE`.
    #[must_use]
    pub const fn level_filter(self) -> LevelFilter {
        match self {
            Self::Fatal => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace | Self::All => LevelFilter::TRACE,
        }
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        Self::ALL_LEVELS
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| format!("Log level must be between 0 and 6, got {value}"))
    }
}

impl FromStr for LogLevel {
    type Err = String;

    /// Parse either a numeric level or a level name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(number) = s.parse::<u8>() {
            return Self::try_from(number);
        }
        Self::ALL_LEVELS
            .iter()
            .find(|level| level.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("Unknown log level: '{s}'"))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawLevel {
            Number(u8),
            Name(String),
        }

        match RawLevel::deserialize(deserializer)? {
            RawLevel::Number(number) => Self::try_from(number).map_err(serde::de::Error::custom),
            RawLevel::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        level.level_filter()
    }
}

/// Install the global console subscriber.
///
/// Warnings and errors go to stderr, everything else to stdout.
///
/// # Errors
/// Returns an error if a global subscriber has already been set.
pub fn init(level: LogLevel) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(level.level_filter())
        .with_writer(std::io::stderr.with_max_level(Level::WARN).or_else(std::io::stdout))
        .event_format(LevelFormat)
        .try_init()
        .map_err(|error| anyhow!("Failed to initialize logging: {error}"))
}

/// True when debug output or more is shown.
#[must_use]
pub fn is_verbose() -> bool {
    LevelFilter::current() > LevelFilter::INFO
}

/// Colored level label followed by the message fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelFormat;

impl LevelFormat {
    fn label(level: Level) -> ColoredString {
        match level {
            Level::ERROR => "ERROR".red(),
            Level::WARN => "WARN".yellow(),
            Level::INFO => "INFO".cyan(),
            Level::DEBUG => "DEBUG".dimmed(),
            _ => "TRACE".dimmed(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for LevelFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        write!(writer, "{} ", Self::label(*event.metadata().level()))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
