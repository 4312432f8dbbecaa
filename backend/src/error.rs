//! Error types for the ldifgen pipeline.
//!
//! One enum per concern, with `From` conversions so `?` works across
//! boundaries:
//!
//! - [`SchemaError`] - registry lookups and schema checks
//! - [`ParseError`] - structural CSV/JSON failures (fatal for a batch)
//! - [`GenerationError`] - a record that could not become an LDAP entry
//! - [`JobError`] - job state machine misuse
//! - [`PipelineError`] - top-level wrapper used by the service layer
//! - [`ConfigError`] - environment configuration
//! - [`ServerError`] - HTTP binding
//!
//! Per-field validation problems are data, not faults: they are carried by
//! [`crate::models::ValidationError`] inside a parsing summary.

use thiserror::Error;

use crate::jobs::JobStatus;

// =============================================================================
// Schema Registry Errors
// =============================================================================

/// Errors raised by the schema registry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    /// No schema registered under this name.
    #[error("Schema '{0}' not found")]
    NotFound(String),

    /// A schema with this name already exists.
    #[error("Schema '{0}' is already registered")]
    Duplicate(String),

    /// The schema definition is malformed.
    #[error("Invalid schema '{schema}': {message}")]
    Invalid { schema: String, message: String },
}

impl SchemaError {
    pub fn invalid(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            schema: schema.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Parse Errors
// =============================================================================

/// Structural input failure. Aborts the whole batch.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Input contained no header row.
    #[error("CSV input has no header row")]
    NoHeaders,

    /// The same column name appears twice in the header row.
    #[error("Duplicate CSV header '{0}'")]
    DuplicateHeader(String),

    /// The CSV reader could not tokenize the input.
    #[error("Invalid CSV: {0}")]
    Csv(String),

    /// The bytes are not valid JSON.
    #[error("Invalid JSON: {0}")]
    Json(String),

    /// Valid JSON, but not one of the accepted record shapes.
    #[error("Unsupported JSON structure: {0}")]
    UnsupportedShape(String),

    /// Unknown or unusable character encoding.
    #[error("Unsupported encoding: {0}")]
    Encoding(String),
}

// =============================================================================
// Generation Errors
// =============================================================================

/// A record that was skipped while building LDAP entries.
#[derive(Debug, Error, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum GenerationError {
    /// The designated identifier field has no value.
    #[error("Row {row_number}: missing identifier field '{field}'")]
    MissingIdentifier { row_number: usize, field: String },

    /// The built entry is unusable (empty DN or RDN).
    #[error("Row {row_number}: invalid entry: {message}")]
    InvalidEntry { row_number: usize, message: String },
}

impl GenerationError {
    pub fn row_number(&self) -> usize {
        match self {
            Self::MissingIdentifier { row_number, .. } | Self::InvalidEntry { row_number, .. } => {
                *row_number
            }
        }
    }
}

// =============================================================================
// Job Errors
// =============================================================================

/// Errors from the job manager.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JobError {
    /// Unknown job identifier.
    #[error("Job '{0}' not found")]
    NotFound(String),

    /// The requested transition is not allowed from the current status.
    #[error("Job '{job_id}' is {status}, cannot {action}")]
    InvalidState {
        job_id: String,
        status: JobStatus,
        action: &'static str,
    },

    /// Result requested before the job completed.
    #[error("Job '{job_id}' is not ready (status: {status})")]
    NotReady { job_id: String, status: JobStatus },

    /// Schema lookup failed at creation.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level errors for the synchronous entry points.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Schema lookup or registration failed.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Structural parse failure.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Job state machine error.
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    /// Validation left nothing to generate from.
    #[error("No valid records to generate from ({0} rows rejected)")]
    NoValidRecords(usize),

    /// Every validated record was skipped by the generator.
    #[error("No LDAP entries generated ({0} records skipped)")]
    NoEntries(usize),

    /// JSON rendering of the output failed.
    #[error("Output serialization failed: {0}")]
    Output(#[from] serde_json::Error),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {message}")]
    InvalidValue {
        key: &'static str,
        value: String,
        message: String,
    },

    /// Schema directory could not be loaded.
    #[error("Schema directory error: {0}")]
    SchemaDir(#[from] std::io::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<JobError> for ServerError {
    fn from(err: JobError) -> Self {
        Self::Pipeline(err.into())
    }
}

impl From<SchemaError> for ServerError {
    fn from(err: SchemaError) -> Self {
        Self::Pipeline(err.into())
    }
}

impl From<ParseError> for ServerError {
    fn from(err: ParseError) -> Self {
        Self::Pipeline(err.into())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for registry operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
