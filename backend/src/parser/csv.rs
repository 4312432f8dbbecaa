//! CSV variant: the header row names the fields, later rows map positionally.

use std::collections::HashSet;

use serde_json::{Map, Value};

use super::{decode_content, Encoding, RawBatch, RecordParser};
use crate::error::{ParseError, ParseResult};
use crate::models::{RawRecord, RowError};

/// Candidate delimiters. Comma wins ties.
const SEPARATORS: [char; 4] = [',', ';', '\t', '|'];

/// Detect the delimiter by counting occurrences in the first line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &SEPARATORS {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// CSV parser built on the `csv` crate (RFC 4180 quoting, trimmed cells).
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvParser;

impl RecordParser for CsvParser {
    fn parse(&self, bytes: &[u8], encoding: Encoding) -> ParseResult<RawBatch> {
        let content = decode_content(bytes, encoding);
        let delimiter = detect_delimiter(&content);

        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(delimiter as u8)
            .has_headers(true)
            .flexible(true)
            .trim(::csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ParseError::Csv(e.to_string()))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(ParseError::NoHeaders);
        }
        let mut seen = HashSet::with_capacity(headers.len());
        if let Some(dup) = headers.iter().find(|h| !h.is_empty() && !seen.insert(h.as_str())) {
            return Err(ParseError::DuplicateHeader(dup.clone()));
        }

        let mut batch = RawBatch::default();

        for (idx, row) in reader.records().enumerate() {
            let row_number = idx + 1;
            let row = row.map_err(|e| ParseError::Csv(e.to_string()))?;

            if row.len() != headers.len() {
                batch.errors.push(RowError::new(
                    row_number,
                    format!("expected {} columns, found {}", headers.len(), row.len()),
                ));
                continue;
            }

            let fields: Map<String, Value> = headers
                .iter()
                .zip(row.iter())
                .map(|(header, cell)| (header.clone(), Value::String(cell.to_string())))
                .collect();

            batch.records.push(RawRecord::new(row_number, fields));
        }

        Ok(batch)
    }
}
