//! Request and response types for the HTTP API, and the mapping from
//! pipeline errors to status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::Settings;
use crate::error::{JobError, ParseError, PipelineError, SchemaError, ServerError};
use crate::jobs::{GenerationOptions, JobInput, JobManager, JobStatus};
use crate::ldif::OutputFormat;
use crate::models::DataFormat;
use crate::parser::Encoding;
use crate::pipeline::ParseOptions;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<JobManager>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(manager: Arc<JobManager>, settings: Settings) -> Self {
        Self {
            manager,
            settings: Arc::new(settings),
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Body of `POST /api/jobs` and `POST /api/generate`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRequest {
    pub schema: String,
    /// Format of `data` when it is text. Record arrays are always JSON.
    #[serde(default)]
    pub format: DataFormat,
    pub data: RequestData,
    #[serde(default)]
    pub base_dn: Option<String>,
    #[serde(default)]
    pub object_classes: Vec<String>,
    #[serde(default)]
    pub max_errors: Option<usize>,
    #[serde(default)]
    pub encoding: Option<Encoding>,
    #[serde(default)]
    pub output_format: OutputFormat,
}

/// Payload of a [`JobRequest`]: raw CSV/JSON text, or records inline.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RequestData {
    Text(String),
    Records(Vec<Map<String, Value>>),
}

impl JobRequest {
    pub fn input(&self) -> JobInput {
        match &self.data {
            RequestData::Text(text) => JobInput::new(text.as_bytes(), self.format),
            RequestData::Records(records) => {
                let array = Value::Array(records.iter().cloned().map(Value::Object).collect());
                JobInput::new(array.to_string(), DataFormat::Json)
            }
        }
    }

    /// Request values over server defaults.
    pub fn options(&self, settings: &Settings) -> GenerationOptions {
        let defaults = settings.generation_options();
        GenerationOptions {
            base_dn: self.base_dn.clone().unwrap_or(defaults.base_dn),
            object_classes: self.object_classes.clone(),
            max_errors: self.max_errors.unwrap_or(defaults.max_errors),
            encoding: self.encoding.unwrap_or(defaults.encoding),
            output_format: self.output_format,
        }
    }
}

/// Query of `POST /api/parse`.
#[derive(Debug, Clone, Deserialize)]
pub struct ParseQuery {
    pub schema: String,
    /// Inferred from the uploaded file name when omitted.
    pub format: Option<DataFormat>,
    pub max_errors: Option<usize>,
    pub encoding: Option<Encoding>,
}

impl ParseQuery {
    pub fn options(&self, settings: &Settings) -> ParseOptions {
        ParseOptions {
            max_errors: self.max_errors.unwrap_or(settings.max_errors),
            encoding: self.encoding.unwrap_or(settings.encoding),
        }
    }
}

/// Query of `POST /api/upload/{format}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadQuery {
    pub schema: String,
    pub base_dn: Option<String>,
    /// Comma-separated extra object classes.
    pub object_classes: Option<String>,
    pub max_errors: Option<usize>,
    pub encoding: Option<Encoding>,
    #[serde(default)]
    pub output_format: OutputFormat,
}

impl UploadQuery {
    pub fn options(&self, settings: &Settings) -> GenerationOptions {
        let defaults = settings.generation_options();
        GenerationOptions {
            base_dn: self.base_dn.clone().unwrap_or(defaults.base_dn),
            object_classes: self
                .object_classes
                .as_deref()
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            max_errors: self.max_errors.unwrap_or(defaults.max_errors),
            encoding: self.encoding.unwrap_or(defaults.encoding),
            output_format: self.output_format,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<JobStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultQuery {
    #[serde(default)]
    pub download: bool,
}

// =============================================================================
// Errors
// =============================================================================

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
    pub timestamp: DateTime<Utc>,
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Pipeline(err) => match err {
                PipelineError::Schema(e) | PipelineError::Job(JobError::Schema(e)) => match e {
                    SchemaError::NotFound(_) => StatusCode::NOT_FOUND,
                    SchemaError::Duplicate(_) => StatusCode::CONFLICT,
                    SchemaError::Invalid { .. } => StatusCode::BAD_REQUEST,
                },
                PipelineError::Parse(_) => StatusCode::BAD_REQUEST,
                PipelineError::Job(JobError::NotFound(_)) => StatusCode::NOT_FOUND,
                PipelineError::Job(JobError::InvalidState { .. } | JobError::NotReady { .. }) => StatusCode::CONFLICT,
                PipelineError::NoValidRecords(_) | PipelineError::NoEntries(_) => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::Output(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
            Self::Pipeline(err) => match err {
                PipelineError::Schema(SchemaError::NotFound(_))
                | PipelineError::Job(JobError::Schema(SchemaError::NotFound(_))) => "schema_not_found",
                PipelineError::Schema(SchemaError::Duplicate(_))
                | PipelineError::Job(JobError::Schema(SchemaError::Duplicate(_))) => "duplicate_schema",
                PipelineError::Schema(_) | PipelineError::Job(JobError::Schema(_)) => "invalid_schema",
                PipelineError::Parse(ParseError::Encoding(_)) => "unsupported_encoding",
                PipelineError::Parse(_) => "parse_error",
                PipelineError::Job(JobError::NotFound(_)) => "job_not_found",
                PipelineError::Job(JobError::InvalidState { .. }) => "invalid_state",
                PipelineError::Job(JobError::NotReady { .. }) => "job_not_ready",
                PipelineError::NoValidRecords(_) | PipelineError::NoEntries(_) => "no_output",
                PipelineError::Output(_) => "output_error",
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Server error: {}", self);
        } else {
            tracing::debug!("Client error: {}", self);
        }

        let body = ErrorResponse {
            error: self.error_code().to_string(),
            message: self.to_string(),
            status: status.as_u16(),
            timestamp: Utc::now(),
        };
        (status, Json(body)).into_response()
    }
}
