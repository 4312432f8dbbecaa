//! HTTP API module.
//!
//! Thin axum binding over [`crate::jobs::JobManager`], plus the SSE log
//! stream.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::{log_info, log_job, LogEntry, LogLevel, LOG_BROADCASTER};
pub use server::{router, start_server};
pub use types::{AppState, ErrorResponse, JobRequest, RequestData};
