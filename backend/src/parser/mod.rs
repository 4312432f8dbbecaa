//! Record parsers: raw bytes in, ordered [`RawRecord`]s out.
//!
//! Two variants share the [`RecordParser`] contract and are selected by
//! [`DataFormat`]:
//!
//! - [`CsvParser`] - header row + delimiter auto-detection
//! - [`JsonParser`] - array, `{data|records|items: [...]}` or a bare object
//!
//! Parsers know nothing about schemas. Rows they cannot use are reported as
//! [`RowError`]s and skipped; only structural failures abort the batch.

mod csv;
mod json;

pub use self::csv::{detect_delimiter, CsvParser};
pub use self::json::JsonParser;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{ParseError, ParseResult};
use crate::models::{DataFormat, RawRecord, RowError};

// =============================================================================
// Encoding
// =============================================================================

/// Character encoding of the raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
    Latin9,
    Windows1252,
    /// Detect with chardet.
    Auto,
}

impl FromStr for Encoding {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "utf-8" | "utf8" | "ascii" | "us-ascii" => Ok(Self::Utf8),
            "iso-8859-1" | "latin-1" | "latin1" => Ok(Self::Latin1),
            "iso-8859-15" | "latin-9" | "latin9" => Ok(Self::Latin9),
            "windows-1252" | "cp1252" => Ok(Self::Windows1252),
            "auto" => Ok(Self::Auto),
            other => Err(ParseError::Encoding(other.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "iso-8859-1",
            Self::Latin9 => "iso-8859-15",
            Self::Windows1252 => "windows-1252",
            Self::Auto => "auto",
        })
    }
}

impl Serialize for Encoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Encoding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> Encoding {
    let (charset, _confidence, _language) = chardet::detect(bytes);

    match charset.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => Encoding::Latin1,
        "iso-8859-15" => Encoding::Latin9,
        "windows-1252" | "cp1252" => Encoding::Windows1252,
        // ascii, utf-8 and anything we cannot decode natively
        _ => Encoding::Utf8,
    }
}

/// Decode bytes to text. A leading byte-order mark is dropped.
pub fn decode_content(bytes: &[u8], encoding: Encoding) -> String {
    let text = match encoding {
        Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        // ISO-8859-1 maps every byte to the code point of the same value.
        Encoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        Encoding::Latin9 => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        Encoding::Windows1252 => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        Encoding::Auto => return decode_content(bytes, detect_encoding(bytes)),
    };

    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}

// =============================================================================
// Parser contract
// =============================================================================

/// Rows extracted from one input, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    pub records: Vec<RawRecord>,
    /// Rows that were skipped.
    pub errors: Vec<RowError>,
}

impl RawBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Turns raw bytes into records.
pub trait RecordParser {
    fn parse(&self, bytes: &[u8], encoding: Encoding) -> ParseResult<RawBatch>;
}

/// Parser for a given input format.
pub fn parser_for(format: DataFormat) -> &'static dyn RecordParser {
    match format {
        DataFormat::Csv => &CsvParser,
        DataFormat::Json => &JsonParser,
    }
}

/// Parse raw bytes with the parser matching `format`.
pub fn parse_records(bytes: &[u8], format: DataFormat, encoding: Encoding) -> ParseResult<RawBatch> {
    parser_for(format).parse(bytes, encoding)
}
