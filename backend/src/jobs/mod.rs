//! Generation jobs: a state machine around one parse, validate and generate
//! run.
//!
//! ```text
//! pending ──process──▶ processing ──▶ completed
//!    │                      └───────▶ failed
//!    └──cancel──▶ cancelled
//! ```
//!
//! Status never moves backwards. `output` is set only when completed and
//! `error_message` only when failed.

mod manager;
mod store;

pub use manager::JobManager;
pub use store::JobStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GenerationError;
use crate::ldif::{OutputFormat, DEFAULT_BASE_DN};
use crate::models::{DataFormat, SummaryStats};
use crate::parser::Encoding;
use crate::pipeline::{ParseOptions, DEFAULT_MAX_ERRORS};

// =============================================================================
// Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Caller options for LDIF generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub base_dn: String,
    /// Extra object classes appended after the schema chain.
    pub object_classes: Vec<String>,
    pub max_errors: usize,
    pub encoding: Encoding,
    pub output_format: OutputFormat,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            base_dn: DEFAULT_BASE_DN.to_string(),
            object_classes: Vec::new(),
            max_errors: DEFAULT_MAX_ERRORS,
            encoding: Encoding::default(),
            output_format: OutputFormat::default(),
        }
    }
}

impl GenerationOptions {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_errors: self.max_errors,
            encoding: self.encoding,
        }
    }
}

/// Raw payload submitted with a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInput {
    pub bytes: Vec<u8>,
    pub format: DataFormat,
}

impl JobInput {
    pub fn new(bytes: impl Into<Vec<u8>>, format: DataFormat) -> Self {
        Self {
            bytes: bytes.into(),
            format,
        }
    }

    pub fn csv(text: impl Into<String>) -> Self {
        Self::new(text.into().into_bytes(), DataFormat::Csv)
    }

    pub fn json(text: impl Into<String>) -> Self {
        Self::new(text.into().into_bytes(), DataFormat::Json)
    }
}

// =============================================================================
// Job snapshot
// =============================================================================

/// Snapshot of a job, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationJob {
    pub job_id: String,
    pub status: JobStatus,
    pub schema_name: String,
    pub data_format: DataFormat,
    pub options: GenerationOptions,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub input_records: usize,
    pub output_records: usize,
    pub progress_percentage: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryStats>,
    pub generation_errors: Vec<GenerationError>,
}

impl GenerationJob {
    pub(crate) fn new(
        job_id: String,
        schema_name: String,
        data_format: DataFormat,
        options: GenerationOptions,
        input_records: usize,
    ) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            schema_name,
            data_format,
            options,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            input_records,
            output_records: 0,
            progress_percentage: 0,
            output: None,
            error_message: None,
            summary: None,
            generation_errors: Vec::new(),
        }
    }

    /// Progress only moves forward.
    pub(crate) fn advance(&mut self, progress: u8) {
        self.progress_percentage = self.progress_percentage.max(progress.min(100));
    }

    pub(crate) fn complete(&mut self, output: String, output_records: usize) {
        self.status = JobStatus::Completed;
        self.output = Some(output);
        self.output_records = output_records;
        self.progress_percentage = 100;
        self.completed_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
    }

    /// Same snapshot without the generated text.
    pub fn without_output(&self) -> Self {
        Self {
            output: None,
            ..self.clone()
        }
    }
}

/// Generated text of a completed job, with what a caller needs to serve it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOutput {
    pub job_id: String,
    pub output: String,
    pub output_records: usize,
    pub output_format: OutputFormat,
    pub completed_at: Option<DateTime<Utc>>,
}
