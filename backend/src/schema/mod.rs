//! Schema definitions: field contracts plus the LDAP attribute mapping.
//!
//! A [`Schema`] is an ordered set of named [`FieldSpec`]s. Schemas are checked
//! once when registered (see [`Schema::check`]) and are immutable afterwards.

mod builtin;
mod registry;

pub use builtin::{builtin_schemas, product_schema, transaction_schema, user_schema};
pub use registry::{FieldSummary, SchemaLoadReport, SchemaRegistry, SchemaSummary};

use regex::Regex;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::{SchemaError, SchemaResult};
use crate::ldif::is_attribute_name;
use crate::models::FieldType;
use crate::validation::convert;

const DEFAULT_VERSION: &str = "1.0.0";
const DEFAULT_NAMING_ATTRIBUTE: &str = "uid";
const DEFAULT_OBJECT_CLASS: &str = "extensibleObject";

// =============================================================================
// Field Pattern
// =============================================================================

/// A regex constraint that must match the whole value.
///
/// Compiled on construction, so a bad pattern never reaches validation.
#[derive(Clone)]
pub struct FieldPattern {
    source: String,
    regex: Regex,
}

impl FieldPattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", source))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_full_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl fmt::Debug for FieldPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldPattern").field(&self.source).finish()
    }
}

impl PartialEq for FieldPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for FieldPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for FieldPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        FieldPattern::new(&source).map_err(D::Error::custom)
    }
}

// =============================================================================
// Field Spec
// =============================================================================

/// Contract for a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<FieldPattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            min_length: None,
            max_length: None,
            min_value: None,
            max_value: None,
            pattern: None,
            choices: None,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_value = min;
        self.max_value = max;
        self
    }

    pub fn pattern(mut self, pattern: FieldPattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    fn check(&self, schema: &str, field: &str) -> SchemaResult<()> {
        let invalid = |message: String| SchemaError::invalid(schema, format!("field '{}': {}", field, message));

        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(invalid(format!("min_length {} exceeds max_length {}", min, max)));
            }
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(invalid(format!("min_value {} exceeds max_value {}", min, max)));
            }
        }
        if (self.min_length.is_some() || self.max_length.is_some()) && !self.field_type.is_textual() {
            return Err(invalid(format!("length bounds do not apply to {} fields", self.field_type)));
        }
        if (self.min_value.is_some() || self.max_value.is_some()) && !self.field_type.is_numeric() {
            return Err(invalid(format!("value bounds do not apply to {} fields", self.field_type)));
        }

        // Choices only need to be representable in the field's type.
        if let Some(choices) = &self.choices {
            if choices.is_empty() {
                return Err(invalid("choices must not be empty".into()));
            }
            let bare = FieldSpec::new(self.field_type);
            for choice in choices {
                if let Err(failure) = convert(Some(choice), &bare) {
                    return Err(invalid(format!("choice {} is not a valid {}: {}", choice, self.field_type, failure)));
                }
            }
        }

        if let Some(default) = &self.default {
            let mut without_default = self.clone();
            without_default.default = None;
            match convert(Some(default), &without_default) {
                Ok(Some(_)) => {}
                Ok(None) => return Err(invalid("default must not be empty".into())),
                Err(failure) => return Err(invalid(format!("default {} rejected: {}", default, failure))),
            }
        }

        Ok(())
    }
}

// =============================================================================
// LDAP Mapping
// =============================================================================

/// How validated records of a schema become LDAP entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LdapMapping {
    /// Field whose value names the entry.
    pub identifier_field: String,
    /// RDN attribute, e.g. `uid`.
    #[serde(default = "default_naming_attribute")]
    pub naming_attribute: String,
    /// Structural object-class chain emitted after `top`.
    #[serde(default = "default_object_classes")]
    pub object_classes: Vec<String>,
    /// Field name -> attribute name. Unmapped fields keep their own name.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Field whose last whitespace-delimited token becomes `sn`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname_from: Option<String>,
}

fn default_naming_attribute() -> String {
    DEFAULT_NAMING_ATTRIBUTE.to_string()
}

fn default_object_classes() -> Vec<String> {
    vec![DEFAULT_OBJECT_CLASS.to_string()]
}

impl LdapMapping {
    pub fn new(identifier_field: impl Into<String>) -> Self {
        Self {
            identifier_field: identifier_field.into(),
            naming_attribute: default_naming_attribute(),
            object_classes: default_object_classes(),
            attributes: BTreeMap::new(),
            surname_from: None,
        }
    }

    pub fn naming_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.naming_attribute = attribute.into();
        self
    }

    pub fn object_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.object_classes = classes.into_iter().map(Into::into).collect();
        self
    }

    pub fn map(mut self, field: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.attributes.insert(field.into(), attribute.into());
        self
    }

    pub fn surname_from(mut self, field: impl Into<String>) -> Self {
        self.surname_from = Some(field.into());
        self
    }

    /// Attribute name for a schema field.
    pub fn attribute_for<'a>(&'a self, field: &'a str) -> &'a str {
        if field == self.identifier_field {
            return &self.naming_attribute;
        }
        self.attributes.get(field).map(String::as_str).unwrap_or(field)
    }
}

// =============================================================================
// Schema
// =============================================================================

/// A named, versioned set of field contracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(serialize_with = "serialize_fields", deserialize_with = "deserialize_fields")]
    pub fields: Vec<(String, FieldSpec)>,
    /// Omitted: identify by the first required field, `uid` naming, `extensibleObject`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldap: Option<LdapMapping>,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn serialize_fields<S: Serializer>(fields: &[(String, FieldSpec)], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(fields.len()))?;
    for (name, spec) in fields {
        map.serialize_entry(name, spec)?;
    }
    map.end()
}

fn deserialize_fields<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<(String, FieldSpec)>, D::Error> {
    // serde_json's preserve_order keeps the declaration order of the object.
    let raw = Map::<String, Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(name, spec)| {
            let spec = serde_json::from_value(spec)
                .map_err(|e| D::Error::custom(format!("field '{}': {}", name, e)))?;
            Ok((name, spec))
        })
        .collect()
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            version: default_version(),
            fields: Vec::new(),
            ldap: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.push((name.into(), spec));
        self
    }

    pub fn ldap(mut self, mapping: LdapMapping) -> Self {
        self.ldap = Some(mapping);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, spec)| spec)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// The LDAP mapping, falling back to a generic one.
    pub fn ldap_mapping(&self) -> LdapMapping {
        if let Some(mapping) = &self.ldap {
            return mapping.clone();
        }
        let identifier = self
            .fields
            .iter()
            .find(|(_, spec)| spec.required)
            .or_else(|| self.fields.first())
            .map(|(name, _)| name.clone())
            .unwrap_or_default();
        LdapMapping::new(identifier)
    }

    /// Structural checks run once, at registration.
    pub fn check(&self) -> SchemaResult<()> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::invalid(&self.name, "schema name must not be empty"));
        }
        if self.fields.is_empty() {
            return Err(SchemaError::invalid(&self.name, "schema must have at least one field"));
        }

        let mut seen = HashSet::new();
        for (name, spec) in &self.fields {
            if name.trim().is_empty() {
                return Err(SchemaError::invalid(&self.name, "field names must not be empty"));
            }
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::invalid(&self.name, format!("duplicate field '{}'", name)));
            }
            spec.check(&self.name, name)?;
        }

        let mapping = self.ldap_mapping();
        if self.get_field(&mapping.identifier_field).is_none() {
            return Err(SchemaError::invalid(
                &self.name,
                format!("identifier field '{}' is not declared", mapping.identifier_field),
            ));
        }
        if !is_attribute_name(&mapping.naming_attribute) {
            return Err(SchemaError::invalid(
                &self.name,
                format!("naming attribute '{}' is not a valid LDAP attribute name", mapping.naming_attribute),
            ));
        }
        for (name, _) in &self.fields {
            let attribute = mapping.attribute_for(name);
            if !is_attribute_name(attribute) {
                return Err(SchemaError::invalid(
                    &self.name,
                    format!("field '{}' maps to invalid LDAP attribute name '{}'", name, attribute),
                ));
            }
        }
        if let Some(surname) = &mapping.surname_from {
            if self.get_field(surname).is_none() {
                return Err(SchemaError::invalid(
                    &self.name,
                    format!("surname field '{}' is not declared", surname),
                ));
            }
        }

        Ok(())
    }
}
