use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;

// Static variables that are initialised at runtime the first time they are accessed.

pub static CURRENT_YEAR: LazyLock<i32> = LazyLock::new(|| chrono::Utc::now().year());

/// EXIF native datetime format: `2019:07:01 10:00:00`
pub static RE_EXIF_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}:\d\d:\d\d \d\d:\d\d:\d\d").expect("Failed to create regex pattern for exif datetime")
});

/// Uppercase prefix followed by a year, like `VID_2022-03-04` or `PXL-20220304`
static RE_PREFIX_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z_-]+([12][90]\d{2})").expect("Failed to create regex pattern for prefixed year")
});

/// Filename starting with a year, like `20220304_120000`
static RE_LEADING_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(20\d{2})").expect("Failed to create regex pattern for leading year"));

static RE_FOUR_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("Failed to create regex pattern for four digits"));

/// Formats tried in order when parsing a free-form date string.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%a %b %d %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%B %d, %Y", "%b %d %Y"];

/// Check if the string is exactly four digits, like a year directory name.
#[must_use]
pub fn is_year_name(name: &str) -> bool {
    RE_FOUR_DIGITS.is_match(name)
}

/// Return the year if the value is a four-digit, non-zero year.
#[must_use]
pub fn valid_year(value: &str) -> Option<String> {
    let value = value.trim();
    if is_year_name(value) && value.parse::<u32>().is_ok_and(|year| year > 0) {
        Some(value.to_string())
    } else {
        None
    }
}

/// Take the first four characters of a date value.
///
/// Works for both `2019:07:01 10:00:00` and ISO `2019-07-01T10:00:00` formats.
#[must_use]
pub fn leading_year(value: &str) -> Option<String> {
    let year: String = value.chars().take(4).collect();
    valid_year(&year)
}

/// Strip everything from the first colon, leaving the year of an EXIF datetime.
#[must_use]
pub fn year_before_colon(value: &str) -> Option<String> {
    let year = value.split_once(':').map_or(value, |(year, _)| year);
    valid_year(year)
}

/// Get the year from an EXIF datetime string, or parse it as a generic date.
#[must_use]
pub fn year_from_date_string(value: &str) -> Option<String> {
    if RE_EXIF_DATETIME.is_match(value) {
        return year_before_colon(value);
    }
    parse_date_year(value).and_then(|year| valid_year(&format!("{year:04}")))
}

/// Parse a free-form date string and return its year.
#[must_use]
pub fn parse_date_year(value: &str) -> Option<i32> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.year());
    }
    if let Ok(datetime) = DateTime::parse_from_rfc2822(value) {
        return Some(datetime.year());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|datetime| datetime.year())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .map(|date| date.year())
        })
}

/// Convert Unix epoch seconds to a UTC year.
#[must_use]
pub fn year_from_epoch_seconds(seconds: i64) -> Option<i32> {
    DateTime::from_timestamp(seconds, 0).map(|datetime| datetime.year())
}

/// Extract the capture year encoded in a filename.
///
/// Recognizes `PREFIX_YYYY...`, `PREFIX-YYYY...` and a bare `YYYY` at the start of the name.
/// Files whose name starts with one of `no_year_prefixes` never carry a year.
#[must_use]
pub fn extract_year_from_filename(path: &Path, no_year_prefixes: &[String]) -> Option<String> {
    let filename = crate::path_to_filename_string(path);
    if no_year_prefixes
        .iter()
        .any(|prefix| filename.starts_with(prefix.as_str()))
    {
        return None;
    }
    if let Some(captures) = RE_PREFIX_YEAR.captures(&filename) {
        return captures.get(1).map(|m| m.as_str().to_string());
    }
    RE_LEADING_YEAR
        .captures(&filename)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Compare years the loose way: numerically when both parse, otherwise as strings.
#[must_use]
pub fn years_equal(first: &str, second: &str) -> bool {
    match (first.trim().parse::<i64>(), second.trim().parse::<i64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => first == second,
    }
}

/// Check that a year is within the range of plausible capture years.
#[must_use]
pub fn is_plausible_year(year: &str, earliest: i32) -> bool {
    year.parse::<i32>()
        .is_ok_and(|year| year >= earliest && year <= *CURRENT_YEAR)
}
