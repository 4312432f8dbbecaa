//! JSON variant.
//!
//! Accepted shapes:
//!
//! ```text
//! [ {...}, {...} ]
//! { "data": [ ... ] }      // also "records" or "items"
//! { ... }                  // a single record
//! ```

use serde_json::Value;

use super::{decode_content, Encoding, RawBatch, RecordParser};
use crate::error::{ParseError, ParseResult};
use crate::models::{RawRecord, RowError};

/// Wrapper keys checked, in order, on a top-level object.
const WRAPPER_KEYS: [&str; 3] = ["data", "records", "items"];

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl RecordParser for JsonParser {
    fn parse(&self, bytes: &[u8], encoding: Encoding) -> ParseResult<RawBatch> {
        let content = decode_content(bytes, encoding);
        let parsed: Value = serde_json::from_str(&content).map_err(|e| ParseError::Json(e.to_string()))?;

        let items = extract_items(parsed)?;

        let mut batch = RawBatch::default();
        for (idx, item) in items.into_iter().enumerate() {
            let row_number = idx + 1;
            match item {
                Value::Object(fields) => batch.records.push(RawRecord::new(row_number, fields)),
                other => batch.errors.push(RowError::new(
                    row_number,
                    format!("expected an object, found {}", kind_of(&other)),
                )),
            }
        }

        Ok(batch)
    }
}

fn extract_items(parsed: Value) -> ParseResult<Vec<Value>> {
    match parsed {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => {
            for key in WRAPPER_KEYS {
                if matches!(obj.get(key), Some(Value::Array(_))) {
                    if let Some(Value::Array(items)) = obj.remove(key) {
                        return Ok(items);
                    }
                }
            }
            Ok(vec![Value::Object(obj)])
        }
        other => Err(ParseError::UnsupportedShape(format!(
            "top-level {} (expected an array or object)",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(input: &str) -> ParseResult<RawBatch> {
        JsonParser.parse(input.as_bytes(), Encoding::Utf8)
    }

    #[test]
    fn test_top_level_array() {
        let batch = parse(r#"[{"id":1},{"id":2}]"#).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[1].row_number, 2);
        assert_eq!(batch.records[1].get("id"), Some(&json!(2)));
    }

    #[test]
    fn test_wrapper_keys() {
        for key in ["data", "records", "items"] {
            let input = format!(r#"{{"{}":[{{"id":1}},{{"id":2}},{{"id":3}}]}}"#, key);
            let batch = parse(&input).unwrap();
            assert_eq!(batch.records.len(), 3, "wrapper key {}", key);
        }
    }

    #[test]
    fn test_single_object() {
        let batch = parse(r#"{"id":7,"name":"Solo"}"#).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].get("name"), Some(&json!("Solo")));
    }

    #[test]
    fn test_wrapper_key_without_array_is_single_record() {
        let batch = parse(r#"{"data":"not a list","id":1}"#).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].get("data"), Some(&json!("not a list")));
    }

    #[test]
    fn test_non_object_items_skipped() {
        let batch = parse(r#"[{"id":1}, 42, {"id":3}]"#).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[1].row_number, 3);
        assert_eq!(batch.errors, vec![RowError::new(2, "expected an object, found number")]);
    }

    #[test]
    fn test_scalar_top_level_is_fatal() {
        assert!(matches!(parse("42"), Err(ParseError::UnsupportedShape(_))));
        assert!(matches!(parse(r#""text""#), Err(ParseError::UnsupportedShape(_))));
    }

    #[test]
    fn test_malformed_json_is_fatal() {
        assert!(matches!(parse(r#"[{"id":1"#), Err(ParseError::Json(_))));
    }

    #[test]
    fn test_preserves_key_order() {
        let batch = parse(r#"[{"zeta":1,"alpha":2}]"#).unwrap();
        let keys: Vec<&String> = batch.records[0].fields.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }
}
