//! Domain models shared by the parser, validator, generator and job layer.
//!
//! - [`DataFormat`] - input format selector (`csv` / `json`)
//! - [`FieldType`] / [`FieldValue`] - declared and converted field types
//! - [`RawRecord`] - one input row before validation
//! - [`ValidatedRecord`] - one row after conversion
//! - [`ValidationError`] - a per-field problem, reported not thrown
//! - [`RowError`] - a row the parser skipped
//! - [`SummaryStats`] / [`ParsingResult`] - output of the validation pipeline

use chrono::{NaiveDate, NaiveDateTime};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// =============================================================================
// Data Format
// =============================================================================

/// Input format selector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    #[default]
    Csv,
    Json,
}

impl DataFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "tsv" | "txt" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(format!("unsupported data format '{}' (expected csv or json)", other)),
        }
    }
}

// =============================================================================
// Field Types
// =============================================================================

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Email,
    Phone,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }

    /// Types whose converted value is text and honours length bounds.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Email | Self::Phone)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A converted, typed field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used for range checks.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Textual form used in LDIF attribute values.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// One input row, as extracted from CSV or JSON, before validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRecord {
    /// 1-based position in the input batch.
    pub row_number: usize,
    pub fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(row_number: usize, fields: Map<String, Value>) -> Self {
        Self { row_number, fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// A row whose required fields all converted successfully.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedRecord {
    pub row_number: usize,
    /// Converted values in schema field order. Absent optional fields are omitted.
    #[serde(serialize_with = "serialize_ordered")]
    pub fields: Vec<(String, FieldValue)>,
}

impl ValidatedRecord {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            fields: Vec::new(),
        }
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.push((field.into(), value));
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn serialize_ordered<S: Serializer>(
    fields: &[(String, FieldValue)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(fields.len()))?;
    for (name, value) in fields {
        map.serialize_entry(name, value)?;
    }
    map.end()
}

// =============================================================================
// Validation Results
// =============================================================================

/// A single field failure. Reported in the summary, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub row_number: usize,
    pub field: String,
    pub message: String,
    /// The offending raw value (null when the field was absent).
    pub value: Value,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}, field '{}': {}", self.row_number, self.field, self.message)
    }
}

/// Counters and capped error list for one parse + validate run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    /// Wall-clock duration of parse + validate.
    pub processing_time_ms: f64,
    pub data_format: DataFormat,
    /// Rows the parser skipped before validation.
    pub parse_errors: usize,
    /// At most `max_errors` entries, in row order.
    pub errors: Vec<ValidationError>,
    /// True when some validation errors were dropped by the cap.
    pub truncated: bool,
}

/// A row the parser had to skip (wrong column count, non-object JSON item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row_number: usize,
    pub message: String,
}

impl RowError {
    pub fn new(row_number: usize, message: impl Into<String>) -> Self {
        Self {
            row_number,
            message: message.into(),
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {}", self.row_number, self.message)
    }
}

/// Output of the validation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsingResult {
    pub records: Vec<ValidatedRecord>,
    /// Row-level parse problems (skipped rows), distinct from validation errors.
    pub errors: Vec<RowError>,
    pub summary: SummaryStats,
}
