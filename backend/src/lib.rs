//! # ldifgen - schema-validated CSV/JSON to LDIF
//!
//! ldifgen reads tabular (CSV) or semi-structured (JSON) records, validates and
//! type-converts each one against a named schema, and writes LDAP Data
//! Interchange Format (RFC 2849) entries.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ CSV / JSON  │────▶│   Parser    │────▶│ Validation  │────▶│    LDIF     │
//! │ (UTF-8/ISO) │     │ (auto-delim)│     │  (schema)   │     │ (RFC 2849)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                              ▲ sequenced by the JobManager ▲
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use ldifgen::{GenerationOptions, JobInput, JobManager, JobStatus};
//!
//! let manager = JobManager::default();
//! let csv = "id,name,email\n1,John Doe,john@example.com\n";
//!
//! let job = manager
//!     .generate_now(JobInput::csv(csv), "user", GenerationOptions::default())
//!     .unwrap();
//! assert_eq!(job.status, JobStatus::Completed);
//! assert!(job.output.unwrap().starts_with("dn: uid=1,dc=example,dc=com"));
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per concern
//! - [`models`] - Records, typed values, summaries
//! - [`schema`] - Field specifications, LDAP mappings, the registry
//! - [`validation`] - Single-field conversion
//! - [`parser`] - CSV and JSON record extraction
//! - [`pipeline`] - Batch validation with an error cap
//! - [`ldif`] - Entry construction and RFC 2849 output
//! - [`jobs`] - Job state machine and store
//! - [`config`] - Environment settings
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Schemas and field conversion
pub mod schema;
pub mod validation;

// Parsing and validation
pub mod parser;
pub mod pipeline;

// Output
pub mod ldif;

// Jobs
pub mod jobs;

// Configuration
pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, GenerationError, JobError, JobResult, ParseError, ParseResult, PipelineError, PipelineResult,
    SchemaError, SchemaResult, ServerError, ServerResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    DataFormat, FieldType, FieldValue, ParsingResult, RawRecord, RowError, SummaryStats, ValidatedRecord,
    ValidationError,
};

// =============================================================================
// Re-exports - Schemas
// =============================================================================

pub use schema::{FieldPattern, FieldSpec, LdapMapping, Schema, SchemaRegistry, SchemaSummary};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use ldif::{generate, GenerationOutput, LdapEntry, OutputFormat};
pub use parser::{parse_records, CsvParser, Encoding, JsonParser, RawBatch, RecordParser};
pub use pipeline::{parse, ParseOptions};
pub use validation::convert;

// =============================================================================
// Re-exports - Jobs, config, server
// =============================================================================

pub use api::start_server;
pub use config::Settings;
pub use jobs::{GenerationJob, GenerationOptions, JobInput, JobManager, JobOutput, JobStatus};
