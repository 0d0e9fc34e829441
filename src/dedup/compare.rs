//! Tolerant field-by-field comparison of metadata records.

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::dedup::record::{FieldPolicy, Fields, MetadataRecord};

/// Relative size difference still treated as equal in close-size mode.
pub const CLOSE_SIZE_RATIO: f64 = 0.001;

/// A duplicate needs more than this many checked fields.
pub const MIN_CHECKED_FIELDS: usize = 2;

const SIZE_FIELD: &str = "size";
const WARNING_FIELD: &str = "Warning";

/// Result of comparing two records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Comparison {
    /// Number of mismatching leaves.
    pub diffs: usize,
    /// Number of visited leaves.
    pub checks: usize,
}

#[derive(Debug, Clone)]
pub struct Comparator {
    policy: FieldPolicy,
    close_size: bool,
}

impl Comparison {
    /// No differences over a non-trivial number of fields.
    #[must_use]
    pub const fn is_duplicate_candidate(&self) -> bool {
        self.diffs == 0 && self.checks > MIN_CHECKED_FIELDS
    }
}

impl Comparator {
    #[must_use]
    pub const fn new(policy: FieldPolicy, close_size: bool) -> Self {
        Self { policy, close_size }
    }

    /// Compare the size and fields of two records.
    #[must_use]
    pub fn compare(&self, first: &MetadataRecord, second: &MetadataRecord) -> Comparison {
        let mut result = Comparison::default();
        let first_size = Value::from(first.size);
        let second_size = Value::from(second.size);
        self.compare_values(SIZE_FIELD, Some(&first_size), Some(&second_size), &mut result);
        self.compare_maps("", &first.fields, &second.fields, &mut result);
        result
    }

    /// Compare two raw tag maps, such as external tool output.
    #[must_use]
    pub fn compare_fields(&self, first: &Fields, second: &Fields) -> Comparison {
        let mut result = Comparison::default();
        self.compare_maps("", first, second, &mut result);
        result
    }

    fn compare_maps(&self, prefix: &str, first: &Map<String, Value>, second: &Map<String, Value>, result: &mut Comparison) {
        let mut names: Vec<&String> = first.keys().chain(second.keys()).collect();
        names.sort_unstable();
        names.dedup();

        for name in names {
            if self.policy.is_denied(name) {
                trace!("...not comparing {name}");
                continue;
            }
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };
            self.compare_values(&path, first.get(name), second.get(name), result);
        }
    }

    fn compare_arrays(&self, prefix: &str, first: &[Value], second: &[Value], result: &mut Comparison) {
        for index in 0..first.len().max(second.len()) {
            let path = format!("{prefix}.{index}");
            self.compare_values(&path, first.get(index), second.get(index), result);
        }
    }

    fn compare_values(&self, name: &str, first: Option<&Value>, second: Option<&Value>, result: &mut Comparison) {
        match (first, second) {
            (Some(Value::Object(a)), Some(Value::Object(b))) => self.compare_maps(name, a, b, result),
            (Some(Value::Array(a)), Some(Value::Array(b))) => self.compare_arrays(name, a, b, result),
            (Some(Value::Object(_) | Value::Array(_)), _) => {
                debug!("{name} SOURCE ONLY");
                result.diffs += 1;
                result.checks += 1;
            }
            (_, Some(Value::Object(_) | Value::Array(_))) => {
                debug!("{name} DEST ONLY");
                result.diffs += 1;
                result.checks += 1;
            }
            _ => {
                result.checks += 1;
                if !self.leaves_equal(name, first, second) {
                    debug!("{name} DIF: {first:?} <=> {second:?}");
                    result.diffs += 1;
                }
            }
        }
    }

    fn leaves_equal(&self, name: &str, first: Option<&Value>, second: Option<&Value>) -> bool {
        if scalars_equal(first, second) {
            return true;
        }
        if name == WARNING_FIELD {
            debug!("Ignoring warning: ({first:?}) - ({second:?})");
            return true;
        }
        if name == SIZE_FIELD
            && self.close_size
            && let (Some(a), Some(b)) = (first.and_then(Value::as_f64), second.and_then(Value::as_f64))
        {
            let ratio = ((a - b) / a).abs();
            if ratio < CLOSE_SIZE_RATIO {
                debug!("{name} CLOSE SIZE (not dif): {a} within 0.1% of {b} ({ratio})");
                return true;
            }
        }
        false
    }
}

/// Exact equality, with numbers compared by value regardless of integer or float representation.
fn scalars_equal(first: Option<&Value>, second: Option<&Value>) -> bool {
    match (first, second) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            a == b || matches!((a.as_f64(), b.as_f64()), (Some(x), Some(y)) if x == y)
        }
        _ => first == second,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(size: u64, fields: Value) -> MetadataRecord {
        let Value::Object(fields) = fields else {
            panic!("fields must be an object")
        };
        MetadataRecord::new("/photos/IMG_0001.jpg", size, fields)
    }

    fn comparator(close_size: bool) -> Comparator {
        Comparator::new(FieldPolicy::standard(true), close_size)
    }

    #[test]
    fn identical_records_are_candidates() {
        let a = record(1000, json!({"DateTimeOriginal": "2019:07:01 10:00:00", "ISO": 100}));
        let b = record(1000, json!({"DateTimeOriginal": "2019:07:01 10:00:00", "ISO": 100}));
        let result = comparator(false).compare(&a, &b);
        assert_eq!(result, Comparison { diffs: 0, checks: 3 });
        assert!(result.is_duplicate_candidate());
    }

    #[test]
    fn two_fields_are_never_enough() {
        let a = record(1000, json!({"ISO": 100}));
        let b = record(1000, json!({"ISO": 100}));
        let result = comparator(false).compare(&a, &b);
        assert_eq!(result, Comparison { diffs: 0, checks: 2 });
        assert!(!result.is_duplicate_candidate());
    }

    #[test]
    fn three_identical_fields_without_size() {
        let a = json!({"DateTimeOriginal": "2019:07:01 10:00:00", "ISO": 100, "Software": "x"});
        let Value::Object(a) = a else { panic!() };
        let result = comparator(false).compare_fields(&a, &a.clone());
        assert_eq!(result, Comparison { diffs: 0, checks: 3 });
        assert!(result.is_duplicate_candidate());
    }

    #[test]
    fn mismatch_counting_is_symmetric() {
        let a = record(1000, json!({"ISO": 100, "Software": "a", "SubSecTime": "12"}));
        let b = record(1200, json!({"ISO": 200, "Description": "b", "ExposureTime": 0.01}));
        let cmp = comparator(false);
        assert_eq!(cmp.compare(&a, &b).diffs, cmp.compare(&b, &a).diffs);
        assert_eq!(cmp.compare(&a, &b).checks, cmp.compare(&b, &a).checks);
    }

    #[test]
    fn denied_fields_never_change_result() {
        let a = record(1000, json!({"ISO": 100, "Software": "a"}));
        let mut b = a.clone();
        let cmp = comparator(false);
        let baseline = cmp.compare(&a, &b);

        b.fields.insert("FileModifyDate".to_string(), json!("2024:01:01 00:00:00"));
        b.fields.insert("SourceFile".to_string(), json!("/elsewhere/IMG.jpg"));
        assert_eq!(cmp.compare(&a, &b), baseline);
        assert_eq!(cmp.compare(&b, &a), baseline);
    }

    #[test]
    fn close_size_tolerance() {
        // 0.05% difference
        let a = record(1_000_000, json!({"ISO": 100, "Software": "a"}));
        let b = record(1_000_500, json!({"ISO": 100, "Software": "a"}));
        assert_eq!(comparator(true).compare(&a, &b).diffs, 0);
        assert_eq!(comparator(false).compare(&a, &b).diffs, 1);
    }

    #[test]
    fn close_size_has_a_limit() {
        // 0.2% difference
        let a = record(1_000_000, json!({"ISO": 100}));
        let b = record(1_002_000, json!({"ISO": 100}));
        assert_eq!(comparator(true).compare(&a, &b).diffs, 1);
    }

    #[test]
    fn warning_is_checked_but_ignored() {
        let a = record(10, json!({"ISO": 100, "Warning": "[minor] incorrect time"}));
        let b = record(10, json!({"ISO": 100, "Warning": "something else"}));
        let result = comparator(false).compare(&a, &b);
        assert_eq!(result, Comparison { diffs: 0, checks: 3 });
    }

    #[test]
    fn nested_against_scalar_is_one_difference() {
        let a = record(10, json!({"ISO": 100, "Subject": {"a": 1, "b": 2}}));
        let b = record(10, json!({"ISO": 100, "Subject": "people"}));
        let result = comparator(false).compare(&a, &b);
        assert_eq!(result.diffs, 1);
        assert_eq!(result.checks, 3);

        let c = record(10, json!({"ISO": 100}));
        assert_eq!(comparator(false).compare(&a, &c).diffs, 1);
        assert_eq!(comparator(false).compare(&c, &a).diffs, 1);
    }

    #[test]
    fn nested_values_are_walked() {
        let a = record(10, json!({"Subject": {"a": 1, "b": [1, 2]}}));
        let b = record(10, json!({"Subject": {"a": 1, "b": [1, 3]}}));
        let result = comparator(false).compare(&a, &b);
        assert_eq!(result, Comparison { diffs: 1, checks: 4 });
    }

    #[test]
    fn absent_field_is_a_difference() {
        let a = record(10, json!({"ISO": 100, "Software": "a"}));
        let b = record(10, json!({"ISO": 100}));
        assert_eq!(comparator(false).compare(&a, &b), Comparison { diffs: 1, checks: 3 });
    }

    #[test]
    fn integer_and_float_numbers_are_equal() {
        let a = record(10, json!({"ISO": 100, "ExposureTime": 1}));
        let b = record(10, json!({"ISO": 100, "ExposureTime": 1.0}));
        assert_eq!(comparator(false).compare(&a, &b).diffs, 0);
    }

    #[test]
    fn comparison_does_not_mutate_inputs() {
        let a = record(10, json!({"ISO": 100}));
        let b = record(11, json!({"ISO": 101}));
        let (a_before, b_before) = (a.clone(), b.clone());
        let _ = comparator(true).compare(&a, &b);
        assert_eq!(a, a_before);
        assert_eq!(b, b_before);
    }
}
