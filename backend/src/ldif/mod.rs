//! LDIF generation.
//!
//! ```text
//! ValidatedRecord ──▶ build_entry ──▶ LdapEntry ──▶ write_ldif ──▶ LDIF text
//!        ▲                 ▲
//!   LdapMapping    base DN + object classes
//! ```
//!
//! Each entry is laid out as: `dn`, the `objectClass` values (`top`, the
//! schema chain, then caller classes), the naming attribute, then the
//! remaining fields in schema order. A derived `sn` follows the attribute of
//! its source field.

mod writer;

pub use writer::{
    attribute_line, encode_entry, escape_dn_value, fold_line, is_attribute_name, is_safe_string, write_ldif,
    MAX_LINE_WIDTH,
};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::GenerationError;
use crate::models::ValidatedRecord;
use crate::schema::LdapMapping;

/// Base DN used when the caller leaves it empty.
pub const DEFAULT_BASE_DN: &str = "dc=example,dc=com";

const OBJECT_CLASS: &str = "objectClass";
const SURNAME_ATTRIBUTE: &str = "sn";

// =============================================================================
// Entry
// =============================================================================

/// One LDAP entry. Attributes are ordered and may repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapEntry {
    dn: String,
    attributes: Vec<(String, String)>,
}

impl LdapEntry {
    pub fn new(dn: impl Into<String>, attributes: Vec<(String, String)>) -> Self {
        Self {
            dn: dn.into(),
            attributes,
        }
    }

    pub fn dn(&self) -> &str {
        &self.dn
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// All values of one attribute, matched case-insensitively.
    pub fn values<'a>(&'a self, attribute: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.attributes
            .iter()
            .filter(move |(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, value)| value.as_str())
    }

    pub fn object_classes(&self) -> Vec<&str> {
        self.values(OBJECT_CLASS).collect()
    }

    /// JSON form: `{dn, objectClass: [...], attributes: {name: [values]}}`.
    pub fn to_json(&self) -> Value {
        let mut attributes = Map::new();
        for (name, value) in &self.attributes {
            if name == OBJECT_CLASS {
                continue;
            }
            match attributes.get_mut(name) {
                Some(Value::Array(values)) => values.push(Value::String(value.clone())),
                _ => {
                    attributes.insert(name.clone(), json!([value]));
                }
            }
        }
        json!({
            "dn": self.dn,
            "objectClass": self.object_classes(),
            "attributes": attributes,
        })
    }
}

impl fmt::Display for LdapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_entry(self))
    }
}

/// `top`, then the schema chain, then caller classes; case-insensitive
/// de-duplication keeping the first spelling.
pub fn merge_object_classes(schema_chain: &[String], extra: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(schema_chain.len() + extra.len() + 1);
    let candidates = std::iter::once("top")
        .chain(schema_chain.iter().map(String::as_str))
        .chain(extra.iter().map(String::as_str));

    for class in candidates {
        let class = class.trim();
        if class.is_empty() || merged.iter().any(|c| c.eq_ignore_ascii_case(class)) {
            continue;
        }
        merged.push(class.to_string());
    }
    merged
}

/// Normalize a caller-supplied base DN.
pub fn effective_base_dn(base_dn: &str) -> &str {
    match base_dn.trim() {
        "" => DEFAULT_BASE_DN,
        trimmed => trimmed,
    }
}

/// Build the entry for one validated record.
///
/// `object_classes` is the already merged list, see [`merge_object_classes`].
pub fn build_entry(
    record: &ValidatedRecord,
    base_dn: &str,
    object_classes: &[String],
    mapping: &LdapMapping,
) -> Result<LdapEntry, GenerationError> {
    let identifier = record
        .get(&mapping.identifier_field)
        .map(|value| value.to_string())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| GenerationError::MissingIdentifier {
            row_number: record.row_number,
            field: mapping.identifier_field.clone(),
        })?;

    let base_dn = effective_base_dn(base_dn);
    if !base_dn.contains('=') {
        return Err(GenerationError::InvalidEntry {
            row_number: record.row_number,
            message: format!("base DN '{}' is not a distinguished name", base_dn),
        });
    }
    let dn = format!("{}={},{}", mapping.naming_attribute, escape_dn_value(&identifier), base_dn);

    let mut attributes: Vec<(String, String)> = object_classes
        .iter()
        .map(|class| (OBJECT_CLASS.to_string(), class.clone()))
        .collect();
    attributes.push((mapping.naming_attribute.clone(), identifier));

    let mut push = |attribute: &str, value: String| {
        let exists = attributes
            .iter()
            .any(|(a, v)| a.eq_ignore_ascii_case(attribute) && *v == value);
        if !exists {
            attributes.push((attribute.to_string(), value));
        }
    };

    for (field, value) in &record.fields {
        if *field == mapping.identifier_field {
            continue;
        }
        let text = value.to_string();
        push(mapping.attribute_for(field), text.clone());

        if mapping.surname_from.as_deref() == Some(field.as_str()) {
            if let Some(surname) = text.split_whitespace().last() {
                push(SURNAME_ATTRIBUTE, surname.to_string());
            }
        }
    }

    Ok(LdapEntry::new(dn, attributes))
}

// =============================================================================
// Generation
// =============================================================================

/// Rendering of the generated entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Ldif,
    Json,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Ldif => "text/x-ldif",
            Self::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ldif => "ldif",
            Self::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ldif" => Ok(Self::Ldif),
            "json" => Ok(Self::Json),
            other => Err(format!("unsupported output format '{}' (expected ldif or json)", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Entries built from a batch, plus the records that were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub entries: Vec<LdapEntry>,
    pub errors: Vec<GenerationError>,
}

impl GenerationOutput {
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// RFC 2849 text.
    pub fn to_ldif(&self) -> String {
        write_ldif(&self.entries)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let entries: Vec<Value> = self.entries.iter().map(LdapEntry::to_json).collect();
        serde_json::to_string_pretty(&entries)
    }

    pub fn render(&self, format: OutputFormat) -> serde_json::Result<String> {
        match format {
            OutputFormat::Ldif => Ok(self.to_ldif()),
            OutputFormat::Json => self.to_json(),
        }
    }
}

/// Build one entry per record. Records that cannot be named are reported in
/// [`GenerationOutput::errors`] and skipped.
pub fn generate(
    records: &[ValidatedRecord],
    base_dn: &str,
    object_classes: &[String],
    mapping: &LdapMapping,
) -> GenerationOutput {
    let classes = merge_object_classes(&mapping.object_classes, object_classes);

    let mut entries = Vec::with_capacity(records.len());
    let mut errors = Vec::new();

    for record in records {
        match build_entry(record, base_dn, &classes, mapping) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(row = e.row_number(), "Skipping record: {}", e);
                errors.push(e);
            }
        }
    }

    GenerationOutput { entries, errors }
}
