//! Field conversion and validation.
//!
//! [`convert`] turns one raw value into a typed [`FieldValue`] according to a
//! [`FieldSpec`]. It is a pure function: no logging, no I/O, no shared state.
//!
//! # Rules
//!
//! 1. Absent values (missing, `null`, blank string): required fields fail,
//!    otherwise the default is used, otherwise the field is omitted.
//! 2. Type coercion by [`FieldType`].
//! 3. Range, length, pattern and choice checks on the converted value.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use ldifgen::models::{FieldType, FieldValue};
//! use ldifgen::schema::FieldSpec;
//! use ldifgen::validation::convert;
//!
//! let spec = FieldSpec::new(FieldType::Integer).range(Some(0.0), Some(150.0));
//! assert_eq!(convert(Some(&json!("25")), &spec).unwrap(), Some(FieldValue::Integer(25)));
//! assert!(convert(Some(&json!("200")), &spec).is_err());
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;

use crate::models::{FieldType, FieldValue};
use crate::schema::FieldSpec;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)+$").expect("valid email regex")
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9 ().\-]+$").expect("valid phone regex"));

const PHONE_MIN_DIGITS: usize = 7;
const PHONE_MAX_DIGITS: usize = 15;

/// Date layouts, tried in order. The first successful parse wins, so
/// `03/04/2024` is read as March 4th.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Why a single field was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFailure {
    pub message: String,
}

impl FieldFailure {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FieldFailure {}

/// Convert and validate one raw value.
///
/// Returns `Ok(None)` for an absent optional field without a default.
pub fn convert(raw: Option<&Value>, spec: &FieldSpec) -> Result<Option<FieldValue>, FieldFailure> {
    let raw = match raw {
        Some(value) if !is_absent(value) => value,
        _ => {
            if spec.required {
                return Err(FieldFailure::new("missing required field"));
            }
            return match &spec.default {
                Some(default) => coerce(default, spec.field_type).map(Some),
                None => Ok(None),
            };
        }
    };

    let value = coerce(raw, spec.field_type)?;
    check_constraints(&value, spec)?;
    Ok(Some(value))
}

/// Missing, `null`, or a blank string.
pub fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn coerce(raw: &Value, field_type: FieldType) -> Result<FieldValue, FieldFailure> {
    match field_type {
        FieldType::Boolean => coerce_boolean(raw),
        FieldType::Integer => coerce_integer(raw),
        FieldType::Float => coerce_float(raw),
        FieldType::String => Ok(FieldValue::String(scalar_text(raw)?)),
        FieldType::Email => {
            let text = scalar_text(raw)?;
            if EMAIL_RE.is_match(text.trim()) {
                Ok(FieldValue::String(text.trim().to_string()))
            } else {
                Err(FieldFailure::new(format!("invalid email address: {}", text)))
            }
        }
        FieldType::Phone => {
            let text = scalar_text(raw)?;
            let text = text.trim();
            let digits = text.chars().filter(char::is_ascii_digit).count();
            if PHONE_RE.is_match(text) && (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits) {
                Ok(FieldValue::String(text.to_string()))
            } else {
                Err(FieldFailure::new(format!("invalid phone number: {}", text)))
            }
        }
        FieldType::Date => match raw {
            Value::String(s) => parse_date(s.trim())
                .ok_or_else(|| FieldFailure::new(format!("unrecognized date format: {}", s))),
            other => Err(FieldFailure::new(format!("expected a date string, got {}", other))),
        },
    }
}

fn coerce_boolean(raw: &Value) -> Result<FieldValue, FieldFailure> {
    let parsed = match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 1.0 => Some(true),
            Some(v) if v == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed
        .map(FieldValue::Boolean)
        .ok_or_else(|| FieldFailure::new(format!("invalid boolean value: {}", display_raw(raw))))
}

fn coerce_integer(raw: &Value) -> Result<FieldValue, FieldFailure> {
    let invalid = || FieldFailure::new(format!("invalid integer: {}", display_raw(raw)));
    match raw {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(FieldValue::Integer(i));
            }
            n.as_f64().and_then(whole_float_to_i64).map(FieldValue::Integer).ok_or_else(invalid)
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(FieldValue::Integer(i));
            }
            s.parse::<f64>()
                .ok()
                .and_then(whole_float_to_i64)
                .map(FieldValue::Integer)
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

/// Accepts floats with no fractional part that fit in an `i64`.
fn whole_float_to_i64(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

fn coerce_float(raw: &Value) -> Result<FieldValue, FieldFailure> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .map(FieldValue::Float)
        .ok_or_else(|| FieldFailure::new(format!("invalid number: {}", display_raw(raw))))
}

fn parse_date(s: &str) -> Option<FieldValue> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(FieldValue::Date)
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
                .ok()
                .map(FieldValue::DateTime)
        })
}

/// Text of a scalar; arrays and objects are rejected.
fn scalar_text(raw: &Value) -> Result<String, FieldFailure> {
    match raw {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(FieldFailure::new(format!("expected a scalar value, got {}", other))),
    }
}

fn display_raw(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn check_constraints(value: &FieldValue, spec: &FieldSpec) -> Result<(), FieldFailure> {
    if let Some(n) = value.as_f64() {
        if let Some(min) = spec.min_value {
            if n < min {
                return Err(FieldFailure::new(format!("value {} is below minimum {}", value, min)));
            }
        }
        if let Some(max) = spec.max_value {
            if n > max {
                return Err(FieldFailure::new(format!("value {} is above maximum {}", value, max)));
            }
        }
    }

    if let Some(text) = value.as_str() {
        let len = text.chars().count();
        if let Some(min) = spec.min_length {
            if len < min {
                return Err(FieldFailure::new(format!("length {} is shorter than {}", len, min)));
            }
        }
        if let Some(max) = spec.max_length {
            if len > max {
                return Err(FieldFailure::new(format!("length {} is longer than {}", len, max)));
            }
        }
    }

    if let Some(pattern) = &spec.pattern {
        let text = value.to_string();
        if !pattern.is_full_match(&text) {
            return Err(FieldFailure::new(format!(
                "value '{}' does not match pattern '{}'",
                text,
                pattern.as_str()
            )));
        }
    }

    if let Some(choices) = &spec.choices {
        let allowed = choices
            .iter()
            .any(|choice| coerce(choice, spec.field_type).is_ok_and(|c| &c == value));
        if !allowed {
            return Err(FieldFailure::new(format!("value '{}' is not one of the allowed choices", value)));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldPattern;
    use serde_json::json;

    fn ok(raw: Value, spec: &FieldSpec) -> FieldValue {
        convert(Some(&raw), spec).unwrap().unwrap()
    }

    fn err(raw: Value, spec: &FieldSpec) -> String {
        convert(Some(&raw), spec).unwrap_err().message
    }

    #[test]
    fn test_absent_required() {
        let spec = FieldSpec::new(FieldType::String).required();
        assert_eq!(convert(None, &spec).unwrap_err().message, "missing required field");
        assert_eq!(err(json!(""), &spec), "missing required field");
        assert_eq!(err(json!(null), &spec), "missing required field");
        assert_eq!(err(json!("   "), &spec), "missing required field");
    }

    #[test]
    fn test_absent_optional_uses_default() {
        let spec = FieldSpec::new(FieldType::Boolean).default_value(true);
        assert_eq!(convert(None, &spec).unwrap(), Some(FieldValue::Boolean(true)));

        let spec = FieldSpec::new(FieldType::Integer);
        assert_eq!(convert(Some(&json!("")), &spec).unwrap(), None);
    }

    #[test]
    fn test_boolean_literals() {
        let spec = FieldSpec::new(FieldType::Boolean);
        for truthy in ["true", "TRUE", "1", "yes", "On"] {
            assert_eq!(ok(json!(truthy), &spec), FieldValue::Boolean(true), "{}", truthy);
        }
        for falsy in ["false", "0", "No", "OFF"] {
            assert_eq!(ok(json!(falsy), &spec), FieldValue::Boolean(false), "{}", falsy);
        }
        assert_eq!(ok(json!(false), &spec), FieldValue::Boolean(false));
        assert_eq!(ok(json!(1), &spec), FieldValue::Boolean(true));
        assert!(err(json!("maybe"), &spec).contains("invalid boolean"));
        assert!(err(json!(2), &spec).contains("invalid boolean"));
    }

    #[test]
    fn test_integer_coercion() {
        let spec = FieldSpec::new(FieldType::Integer);
        assert_eq!(ok(json!("42"), &spec), FieldValue::Integer(42));
        assert_eq!(ok(json!(-7), &spec), FieldValue::Integer(-7));
        assert_eq!(ok(json!(3.0), &spec), FieldValue::Integer(3));
        assert_eq!(ok(json!("3.0"), &spec), FieldValue::Integer(3));
        assert!(err(json!(3.5), &spec).contains("invalid integer"));
        assert!(err(json!("abc"), &spec).contains("invalid integer"));
        assert!(err(json!(true), &spec).contains("invalid integer"));
    }

    #[test]
    fn test_float_widens_integers() {
        let spec = FieldSpec::new(FieldType::Float);
        assert_eq!(ok(json!(5), &spec), FieldValue::Float(5.0));
        assert_eq!(ok(json!("19.99"), &spec), FieldValue::Float(19.99));
        assert!(err(json!("NaN"), &spec).contains("invalid number"));
        assert!(err(json!("ten"), &spec).contains("invalid number"));
    }

    #[test]
    fn test_string_length_bounds() {
        let spec = FieldSpec::new(FieldType::String).length(Some(2), Some(4));
        assert_eq!(ok(json!("abc"), &spec), FieldValue::String("abc".into()));
        assert!(err(json!("a"), &spec).contains("shorter"));
        assert!(err(json!("abcde"), &spec).contains("longer"));
        // Counted in characters, not bytes.
        assert_eq!(ok(json!("éèà"), &spec), FieldValue::String("éèà".into()));
    }

    #[test]
    fn test_string_accepts_numbers() {
        let spec = FieldSpec::new(FieldType::String);
        assert_eq!(ok(json!(1001), &spec), FieldValue::String("1001".into()));
        assert!(err(json!([1, 2]), &spec).contains("scalar"));
    }

    #[test]
    fn test_email() {
        let spec = FieldSpec::new(FieldType::Email);
        assert_eq!(ok(json!("john@example.com"), &spec), FieldValue::String("john@example.com".into()));
        assert!(err(json!("bad"), &spec).contains("invalid email"));
        assert!(err(json!("john@localhost"), &spec).contains("invalid email"));
        assert!(err(json!("a@@b.com"), &spec).contains("invalid email"));
    }

    #[test]
    fn test_phone() {
        let spec = FieldSpec::new(FieldType::Phone);
        assert!(convert(Some(&json!("+1 (555) 123-4567")), &spec).is_ok());
        assert!(convert(Some(&json!("555.123.4567")), &spec).is_ok());
        assert!(err(json!("12345"), &spec).contains("invalid phone"));
        assert!(err(json!("call me"), &spec).contains("invalid phone"));
    }

    #[test]
    fn test_date_formats() {
        let spec = FieldSpec::new(FieldType::Date);
        let d = |y, m, day| FieldValue::Date(NaiveDate::from_ymd_opt(y, m, day).unwrap());

        assert_eq!(ok(json!("2024-01-15"), &spec), d(2024, 1, 15));
        assert_eq!(ok(json!("12/25/2023"), &spec), d(2023, 12, 25));
        // Only parses as DD/MM/YYYY.
        assert_eq!(ok(json!("25/12/2023"), &spec), d(2023, 12, 25));
        match ok(json!("2024-01-15T10:30:00"), &spec) {
            FieldValue::DateTime(dt) => assert_eq!(dt.to_string(), "2024-01-15 10:30:00"),
            other => panic!("expected datetime, got {:?}", other),
        }
        assert!(err(json!("15.01.2024"), &spec).contains("unrecognized date"));
        assert!(err(json!(20240115), &spec).contains("date string"));
    }

    #[test]
    fn test_ambiguous_date_prefers_month_first() {
        let spec = FieldSpec::new(FieldType::Date);
        assert_eq!(
            ok(json!("03/04/2024"), &spec),
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
        );
    }

    #[test]
    fn test_numeric_bounds_inclusive() {
        let spec = FieldSpec::new(FieldType::Integer).range(Some(0.0), Some(150.0));
        assert_eq!(ok(json!(0), &spec), FieldValue::Integer(0));
        assert_eq!(ok(json!(150), &spec), FieldValue::Integer(150));
        assert!(err(json!(-1), &spec).contains("below minimum"));
        assert!(err(json!("151"), &spec).contains("above maximum"));
    }

    #[test]
    fn test_pattern_full_match() {
        let spec = FieldSpec::new(FieldType::String).pattern(FieldPattern::new("[A-Z]{2}[0-9]{3}").unwrap());
        assert!(convert(Some(&json!("AB123")), &spec).is_ok());
        assert!(err(json!("AB1234"), &spec).contains("does not match"));
    }

    #[test]
    fn test_choices() {
        let spec = FieldSpec::new(FieldType::String).choices(["pending", "completed"]);
        assert!(convert(Some(&json!("pending")), &spec).is_ok());
        assert!(err(json!("lost"), &spec).contains("allowed choices"));

        let spec = FieldSpec::new(FieldType::Integer).choices([1, 2, 3]);
        assert_eq!(ok(json!("2"), &spec), FieldValue::Integer(2));
        assert!(err(json!(4), &spec).contains("allowed choices"));
    }

    #[test]
    fn test_single_failure_per_field() {
        // Both too short and not matching the pattern: only the first rule reports.
        let spec = FieldSpec::new(FieldType::String)
            .length(Some(5), None)
            .pattern(FieldPattern::new("[0-9]+").unwrap());
        assert!(err(json!("ab"), &spec).contains("shorter"));
    }
}
