//! Integration tests for config loading from fixture files.

use std::fs;
use std::path::{Path, PathBuf};

use photo_dedup::dedup::PhotoDedupConfig;
use photo_dedup::log::LogLevel;

/// Read the sample config file content.
fn read_sample_config() -> String {
    let config_path = Path::new("tests/fixtures/sample_config.toml");
    fs::read_to_string(config_path).expect("Failed to read sample config file")
}

#[test]
fn sample_config_file_exists() {
    let config_path = Path::new("tests/fixtures/sample_config.toml");
    assert!(config_path.exists(), "Sample config file should exist");
}

#[test]
fn sample_config_is_valid_toml() {
    let config_content = read_sample_config();
    let result: Result<toml::Value, _> = toml::from_str(&config_content);
    assert!(result.is_ok(), "Sample config should be valid TOML: {:?}", result.err());
}

#[test]
fn sample_config_has_photodedup_section() {
    let config_content = read_sample_config();
    let value: toml::Value = toml::from_str(&config_content).expect("should parse");
    let table = value.as_table().expect("should be a table");
    assert!(table.contains_key("photodedup"), "Config should have [photodedup] section");
}

#[test]
fn photodedup_section_parses() {
    let config = PhotoDedupConfig::from_toml_str(&read_sample_config()).expect("should parse sample config");

    assert_eq!(config.archive_dir.as_deref(), Some("sortedByYear"));
    assert_eq!(config.delete_match, vec!["Takeout", "(1)"]);
    assert_eq!(config.dirs.len(), 2);
    assert_eq!(config.keep_match.as_deref(), Some("sortedByYear"));
    assert_eq!(config.move_dir, Some(PathBuf::from("/media/photos/sortedByYear")));
    assert_eq!(config.skip, vec!["@eaDir", ".picasaoriginals"]);
    assert_eq!(config.verbose, Some(LogLevel::Info));
    assert!(config.log_file);
    assert!(config.picasa);
    assert!(config.trash);
    assert!(!config.close_size);
    assert!(!config.exiftool);
    assert!(!config.no_thumb);
}

#[test]
fn config_values_have_correct_types() {
    let config_content = read_sample_config();
    let value: toml::Value = toml::from_str(&config_content).expect("should parse");
    let section = value.get("photodedup").expect("should have photodedup section");

    let is_bool = |key: &str| section.get(key).is_some_and(toml::Value::is_bool);
    let is_str = |key: &str| section.get(key).is_some_and(toml::Value::is_str);
    let is_array = |key: &str| section.get(key).is_some_and(toml::Value::is_array);

    for key in ["close_size", "exiftool", "log_file", "no_thumb", "picasa", "trash"] {
        assert!(is_bool(key), "{key} should be a bool");
    }
    for key in ["archive_dir", "keep_match", "move_dir", "verbose"] {
        assert!(is_str(key), "{key} should be a string");
    }
    for key in ["delete_match", "dirs", "skip"] {
        assert!(is_array(key), "{key} should be an array");
    }
}
