//! In-process EXIF extraction for JPEG files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use exif::{In, Reader, Tag, Value as ExifValue};
use serde_json::{Number, Value};
use tracing::{debug, error};

use crate::dedup::record::Fields;

/// Reads tags from a single file.
///
/// Failures return an empty map.
pub trait TagExtractor {
    fn extract(&self, path: &Path) -> Fields;
}

/// Tag extractor backed by `kamadak-exif`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifReader;

impl TagExtractor for ExifReader {
    fn extract(&self, path: &Path) -> Fields {
        debug!("Getting info for: {}", path.display());
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) => {
                error!("Error getting tags for {}: {error}", path.display());
                return Fields::new();
            }
        };

        let mut reader = BufReader::new(file);
        match Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif_to_fields(&exif),
            Err(error) => {
                debug!("No EXIF data in {}: {error}", path.display());
                Fields::new()
            }
        }
    }
}

/// Exif tag names as exiftool reports them.
fn field_name(tag: Tag) -> String {
    match tag {
        Tag::DateTime => "ModifyDate".to_string(),
        Tag::PhotographicSensitivity => "ISO".to_string(),
        _ => tag.to_string(),
    }
}

fn exif_to_fields(exif: &exif::Exif) -> Fields {
    let mut fields = Fields::new();
    for field in exif.fields() {
        if field.ifd_num != In::PRIMARY {
            continue;
        }
        if let Some(value) = convert_value(&field.value) {
            fields.insert(field_name(field.tag), value);
        }
    }

    if let Some(length) = exif
        .get_field(Tag::JPEGInterchangeFormatLength, In::THUMBNAIL)
        .and_then(|field| field.value.get_uint(0))
    {
        fields.insert("ThumbnailLength".to_string(), Value::from(length));
    }

    let width = exif
        .get_field(Tag::PixelXDimension, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0));
    let height = exif
        .get_field(Tag::PixelYDimension, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0));
    if let (Some(width), Some(height)) = (width, height) {
        fields.insert("ImageSize".to_string(), Value::from(format!("{width}x{height}")));
    }

    fields
}

/// Convert an EXIF value to JSON. Single-element lists become scalars and binary data becomes base64.
fn convert_value(value: &ExifValue) -> Option<Value> {
    match value {
        ExifValue::Ascii(strings) => {
            let text = strings
                .iter()
                .map(|bytes| String::from_utf8_lossy(bytes).trim_end_matches(['\0', ' ']).to_string())
                .collect::<Vec<_>>()
                .join(" ");
            Some(Value::String(text))
        }
        ExifValue::Byte(bytes) | ExifValue::Undefined(bytes, _) => Some(Value::String(STANDARD.encode(bytes))),
        ExifValue::Short(values) => numbers(values.iter().map(|&v| Value::from(v))),
        ExifValue::Long(values) => numbers(values.iter().map(|&v| Value::from(v))),
        ExifValue::SByte(values) => numbers(values.iter().map(|&v| Value::from(v))),
        ExifValue::SShort(values) => numbers(values.iter().map(|&v| Value::from(v))),
        ExifValue::SLong(values) => numbers(values.iter().map(|&v| Value::from(v))),
        ExifValue::Rational(values) => numbers(values.iter().map(|v| float(v.to_f64()))),
        ExifValue::SRational(values) => numbers(values.iter().map(|v| float(v.to_f64()))),
        ExifValue::Float(values) => numbers(values.iter().map(|&v| float(f64::from(v)))),
        ExifValue::Double(values) => numbers(values.iter().map(|&v| float(v))),
        _ => None,
    }
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn numbers(values: impl Iterator<Item = Value>) -> Option<Value> {
    let mut values: Vec<Value> = values.collect();
    match values.len() {
        0 => None,
        1 => values.pop(),
        _ => Some(Value::Array(values)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn ascii_values_are_trimmed() {
        let value = ExifValue::Ascii(vec![b"2019:07:01 10:00:00\0".to_vec()]);
        assert_eq!(convert_value(&value), Some(Value::from("2019:07:01 10:00:00")));
    }

    #[test]
    fn single_numbers_become_scalars() {
        assert_eq!(convert_value(&ExifValue::Short(vec![100])), Some(Value::from(100)));
        assert_eq!(
            convert_value(&ExifValue::Long(vec![1, 2])),
            Some(Value::Array(vec![Value::from(1), Value::from(2)]))
        );
        assert_eq!(convert_value(&ExifValue::Short(Vec::new())), None);
    }

    #[test]
    fn rationals_become_floats() {
        let value = ExifValue::Rational(vec![exif::Rational::from((1, 4))]);
        assert_eq!(convert_value(&value), Some(float(0.25)));
    }

    #[test]
    fn binary_values_become_base64() {
        let value = ExifValue::Undefined(vec![0x30, 0x32, 0x33, 0x30], 0);
        assert_eq!(convert_value(&value), Some(Value::from("MDIzMA==")));
    }

    #[test]
    fn renamed_tags() {
        assert_eq!(field_name(Tag::DateTime), "ModifyDate");
        assert_eq!(field_name(Tag::PhotographicSensitivity), "ISO");
        assert_eq!(field_name(Tag::DateTimeOriginal), "DateTimeOriginal");
    }

    #[test]
    fn unreadable_files_give_empty_fields() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("IMG_1.jpg");
        std::fs::write(&path, b"not a jpeg").expect("write");
        assert!(ExifReader.extract(&path).is_empty());
        assert!(ExifReader.extract(&dir.path().join("missing.jpg")).is_empty());
    }
}
