//! Validation pipeline: parse a batch, then convert every record against a
//! schema.
//!
//! ```text
//! bytes ──▶ RecordParser ──▶ RawBatch ──▶ validate_batch ──▶ ParsingResult
//! ```
//!
//! Field failures never abort the run. They are collected (up to
//! `max_errors`) into the summary and the row is counted as invalid.

use std::time::Instant;

use crate::error::ParseResult;
use crate::models::{DataFormat, ParsingResult, RawRecord, SummaryStats, ValidatedRecord, ValidationError};
use crate::parser::{parse_records, Encoding, RawBatch};
use crate::schema::Schema;
use crate::validation::convert;

/// Default cap on reported validation errors.
pub const DEFAULT_MAX_ERRORS: usize = 100;

/// Options for one validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum number of validation errors kept in the summary.
    pub max_errors: usize,
    pub encoding: Encoding,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_errors: DEFAULT_MAX_ERRORS,
            encoding: Encoding::default(),
        }
    }
}

/// Parse `bytes` as `format` and validate every record against `schema`.
///
/// Only structural failures return `Err`. `processing_time_ms` covers both
/// steps.
pub fn parse(bytes: &[u8], format: DataFormat, schema: &Schema, options: &ParseOptions) -> ParseResult<ParsingResult> {
    let started = Instant::now();
    let batch = parse_records(bytes, format, options.encoding)?;
    Ok(validate_batch(batch, format, schema, options.max_errors, started))
}

/// Validate an already parsed batch.
pub fn validate_batch(
    batch: RawBatch,
    format: DataFormat,
    schema: &Schema,
    max_errors: usize,
    started: Instant,
) -> ParsingResult {
    let total_records = batch.records.len();
    let mut records = Vec::with_capacity(total_records);
    let mut errors = Vec::new();
    let mut invalid_records = 0;
    let mut truncated = false;

    for raw in &batch.records {
        match validate_record(raw, schema) {
            Ok(record) => records.push(record),
            Err(row_errors) => {
                invalid_records += 1;
                for error in row_errors {
                    if errors.len() < max_errors {
                        errors.push(error);
                    } else {
                        truncated = true;
                    }
                }
            }
        }
    }

    tracing::debug!(
        schema = %schema.name,
        total = total_records,
        valid = records.len(),
        invalid = invalid_records,
        "Validated batch"
    );

    let summary = SummaryStats {
        total_records,
        valid_records: records.len(),
        invalid_records,
        processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        data_format: format,
        parse_errors: batch.errors.len(),
        errors,
        truncated,
    };

    ParsingResult {
        records,
        errors: batch.errors,
        summary,
    }
}

/// Convert every schema field of one record. Fields not declared in the
/// schema are ignored.
pub fn validate_record(raw: &RawRecord, schema: &Schema) -> Result<ValidatedRecord, Vec<ValidationError>> {
    let mut record = ValidatedRecord::new(raw.row_number);
    let mut errors = Vec::new();

    for (name, spec) in &schema.fields {
        let value = raw.get(name);
        match convert(value, spec) {
            Ok(Some(converted)) => record.insert(name.clone(), converted),
            Ok(None) => {}
            Err(failure) => errors.push(ValidationError {
                row_number: raw.row_number,
                field: name.clone(),
                message: failure.message,
                value: value.cloned().unwrap_or_default(),
            }),
        }
    }

    if errors.is_empty() {
        Ok(record)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;
    use crate::schema::user_schema;

    const USERS_CSV: &str = "id,name,email,age\n\
        1,John Doe,john@example.com,25\n\
        2,,jane@example.com,30\n\
        3,Bob,not-an-email,abc\n";

    #[test]
    fn test_mixed_batch() {
        let result = parse(USERS_CSV.as_bytes(), DataFormat::Csv, &user_schema(), &ParseOptions::default()).unwrap();

        assert_eq!(result.summary.total_records, 3);
        assert_eq!(result.summary.valid_records, 1);
        assert_eq!(result.summary.invalid_records, 2);
        assert_eq!(result.summary.data_format, DataFormat::Csv);
        assert!(!result.summary.truncated);

        // row 2: name missing; row 3: email and age
        assert_eq!(result.summary.errors.len(), 3);
        assert_eq!(result.summary.errors[0].row_number, 2);
        assert_eq!(result.summary.errors[0].field, "name");
        assert_eq!(result.summary.errors[0].message, "missing required field");
        assert_eq!(result.summary.errors[1].field, "email");
        assert_eq!(result.summary.errors[2].field, "age");

        let record = &result.records[0];
        assert_eq!(record.get("id"), Some(&FieldValue::Integer(1)));
        assert_eq!(record.get("active"), Some(&FieldValue::Boolean(true)));
    }

    #[test]
    fn test_error_cap() {
        let mut csv = String::from("id,name,email\n");
        for i in 0..20 {
            csv.push_str(&format!("{},,bad\n", i));
        }
        let options = ParseOptions {
            max_errors: 5,
            ..Default::default()
        };
        let result = parse(csv.as_bytes(), DataFormat::Csv, &user_schema(), &options).unwrap();

        assert_eq!(result.summary.errors.len(), 5);
        assert!(result.summary.truncated);
        assert_eq!(result.summary.invalid_records, 20);
        assert_eq!(result.summary.valid_records + result.summary.invalid_records, result.summary.total_records);
    }

    #[test]
    fn test_extra_fields_ignored() {
        let json = r#"[{"id":1,"name":"A B","email":"a@example.com","nickname":"ab"}]"#;
        let result = parse(json.as_bytes(), DataFormat::Json, &user_schema(), &ParseOptions::default()).unwrap();
        assert_eq!(result.summary.valid_records, 1);
        assert!(result.records[0].get("nickname").is_none());
    }

    #[test]
    fn test_parse_errors_carried() {
        let csv = "id,name,email\n1,A,a@example.com\n2,B\n";
        let result = parse(csv.as_bytes(), DataFormat::Csv, &user_schema(), &ParseOptions::default()).unwrap();
        assert_eq!(result.summary.total_records, 1);
        assert_eq!(result.summary.parse_errors, 1);
        assert_eq!(result.errors[0].row_number, 2);
    }

    #[test]
    fn test_structural_failure_is_err() {
        let result = parse(b"42", DataFormat::Json, &user_schema(), &ParseOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_deterministic_apart_from_timing() {
        let schema = user_schema();
        let options = ParseOptions::default();
        let mut a = parse(USERS_CSV.as_bytes(), DataFormat::Csv, &schema, &options).unwrap();
        let mut b = parse(USERS_CSV.as_bytes(), DataFormat::Csv, &schema, &options).unwrap();
        a.summary.processing_time_ms = 0.0;
        b.summary.processing_time_ms = 0.0;
        assert_eq!(a, b);
    }
}
