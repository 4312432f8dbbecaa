//! Schema Registry - named schemas, registered once and looked up by name.
//!
//! Schemas can also be loaded from a directory of `*.json` files at startup.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{builtin_schemas, Schema};
use crate::error::{SchemaError, SchemaResult};
use crate::models::FieldType;

/// Field metadata exposed by [`SchemaRegistry::list`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
}

/// Introspection view of a registered schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaSummary {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FieldSummary>,
}

impl From<&Schema> for SchemaSummary {
    fn from(schema: &Schema) -> Self {
        Self {
            name: schema.name.clone(),
            version: schema.version.clone(),
            description: schema.description.clone(),
            fields: schema
                .fields
                .iter()
                .map(|(name, spec)| FieldSummary {
                    name: name.clone(),
                    field_type: spec.field_type,
                    required: spec.required,
                })
                .collect(),
        }
    }
}

/// Outcome of [`SchemaRegistry::load_dir`].
#[derive(Debug, Default)]
pub struct SchemaLoadReport {
    pub loaded: Vec<String>,
    pub failures: Vec<(PathBuf, String)>,
}

/// Registry of named schemas.
///
/// Registration takes a short write lock; lookups hand out `Arc<Schema>` so
/// callers never hold the lock while validating.
#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: RwLock<BTreeMap<String, Arc<Schema>>>,
}

impl SchemaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            schemas: RwLock::new(BTreeMap::new()),
        }
    }

    /// A registry holding the `user`, `product` and `transaction` schemas.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for schema in builtin_schemas() {
            // Built-ins are unique and pass their own tests; a failure here is a bug.
            if let Err(e) = registry.register(schema) {
                tracing::error!("built-in schema rejected: {}", e);
            }
        }
        registry
    }

    /// Register a schema. Fails on duplicate names and malformed definitions.
    pub fn register(&self, schema: Schema) -> SchemaResult<Arc<Schema>> {
        schema.check()?;

        let mut schemas = self.schemas.write();
        if schemas.contains_key(&schema.name) {
            return Err(SchemaError::Duplicate(schema.name));
        }
        let schema = Arc::new(schema);
        schemas.insert(schema.name.clone(), Arc::clone(&schema));
        tracing::debug!(schema = %schema.name, fields = schema.fields.len(), "schema registered");
        Ok(schema)
    }

    /// Look a schema up by name.
    pub fn get(&self, name: &str) -> SchemaResult<Arc<Schema>> {
        self.schemas
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.read().contains_key(name)
    }

    /// All registered schemas, sorted by name.
    pub fn list(&self) -> Vec<SchemaSummary> {
        self.schemas
            .read()
            .values()
            .map(|schema| SchemaSummary::from(schema.as_ref()))
            .collect()
    }

    /// Register every `*.json` schema file in `dir`, in file-name order.
    ///
    /// A file that cannot be read, parsed or registered is recorded in the
    /// report and does not stop the others.
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> std::io::Result<SchemaLoadReport> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir.as_ref())?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| SchemaFileFormat::from_path(path).is_some())
            .collect();
        paths.sort();

        let mut report = SchemaLoadReport::default();
        for path in paths {
            match self.load_file(&path) {
                Ok(name) => {
                    tracing::info!(schema = %name, path = %path.display(), "loaded schema");
                    report.loaded.push(name);
                }
                Err(message) => {
                    tracing::warn!(path = %path.display(), "skipping schema file: {}", message);
                    report.failures.push((path, message));
                }
            }
        }
        Ok(report)
    }

    fn load_file(&self, path: &Path) -> Result<String, String> {
        let content = fs::read_to_string(path).map_err(|e| format!("Failed to read file: {}", e))?;
        let schema: Schema = match SchemaFileFormat::from_path(path) {
            Some(SchemaFileFormat::Yaml) => {
                serde_yaml::from_str(&content).map_err(|e| format!("Invalid schema YAML: {}", e))?
            }
            _ => serde_json::from_str(&content).map_err(|e| format!("Invalid schema JSON: {}", e))?,
        };
        self.register(schema)
            .map(|s| s.name.clone())
            .map_err(|e| e.to_string())
    }
}

/// Schema file syntax, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaFileFormat {
    Json,
    Yaml,
}

impl SchemaFileFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
