//! Job manager: owns the schema registry and the job store, and sequences
//! parse, validate and generate behind a job id.

use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::store::{JobHandle, JobRecord};
use super::{GenerationJob, GenerationOptions, JobInput, JobOutput, JobStatus, JobStore};
use crate::api::logs::{log_job, LogLevel};
use crate::error::{JobError, JobResult, PipelineError, PipelineResult, SchemaResult};
use crate::ldif::{self, GenerationOutput};
use crate::models::{DataFormat, ParsingResult, ValidatedRecord};
use crate::parser::parse_records;
use crate::pipeline::{self, ParseOptions};
use crate::schema::{Schema, SchemaRegistry, SchemaSummary};

/// Progress checkpoints while processing.
const PROGRESS_STARTED: u8 = 10;
const PROGRESS_VALIDATED: u8 = 50;
const PROGRESS_GENERATED: u8 = 90;

/// Entry point for every core operation.
#[derive(Debug, Default)]
pub struct JobManager {
    registry: SchemaRegistry,
    store: JobStore,
}

impl JobManager {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self {
            registry,
            store: JobStore::new(),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    // =========================================================================
    // Schemas
    // =========================================================================

    pub fn register_schema(&self, schema: Schema) -> SchemaResult<Arc<Schema>> {
        self.registry.register(schema)
    }

    pub fn get_schema(&self, name: &str) -> SchemaResult<Arc<Schema>> {
        self.registry.get(name)
    }

    pub fn list_schemas(&self) -> Vec<SchemaSummary> {
        self.registry.list()
    }

    // =========================================================================
    // Synchronous pipeline
    // =========================================================================

    /// Parse and validate without creating a job.
    pub fn parse(
        &self,
        bytes: &[u8],
        format: DataFormat,
        schema_name: &str,
        options: &ParseOptions,
    ) -> PipelineResult<ParsingResult> {
        let schema = self.registry.get(schema_name)?;
        Ok(pipeline::parse(bytes, format, &schema, options)?)
    }

    /// Build LDIF from already validated records using the schema's mapping.
    pub fn generate(
        &self,
        records: &[ValidatedRecord],
        schema_name: &str,
        options: &GenerationOptions,
    ) -> PipelineResult<GenerationOutput> {
        let schema = self.registry.get(schema_name)?;
        let mapping = schema.ldap_mapping();
        Ok(ldif::generate(records, &options.base_dn, &options.object_classes, &mapping))
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    /// Register a pending job. The schema is resolved now; input problems
    /// surface when the job is processed.
    pub fn create(&self, input: JobInput, schema_name: &str, options: GenerationOptions) -> JobResult<GenerationJob> {
        let schema = self.registry.get(schema_name)?;

        let input_records = parse_records(&input.bytes, input.format, options.encoding)
            .map(|batch| batch.len())
            .unwrap_or(0);

        let job = GenerationJob::new(
            Uuid::new_v4().to_string(),
            schema.name.clone(),
            input.format,
            options,
            input_records,
        );
        let snapshot = job.clone();
        self.store.insert(job, input, schema);

        log_job(
            &snapshot.job_id,
            LogLevel::Info,
            format!(
                "Created job for schema '{}' ({} {} records)",
                snapshot.schema_name, snapshot.input_records, snapshot.data_format
            ),
        );
        Ok(snapshot)
    }

    /// Run a pending job to completion on the calling thread.
    ///
    /// Pipeline failures (and panics) end the job as `failed` and are
    /// reported through the returned snapshot, not as `Err`.
    pub fn process(&self, job_id: &str) -> JobResult<GenerationJob> {
        let handle = self.handle(job_id)?;

        let (input, schema, options) = {
            let mut record = handle.lock();
            if record.job.status != JobStatus::Pending {
                return Err(JobError::InvalidState {
                    job_id: job_id.to_string(),
                    status: record.job.status,
                    action: "process",
                });
            }
            record.job.status = JobStatus::Processing;
            record.job.started_at = Some(Utc::now());
            record.job.advance(PROGRESS_STARTED);
            (
                Arc::clone(&record.input),
                Arc::clone(&record.schema),
                record.job.options.clone(),
            )
        };
        log_job(job_id, LogLevel::Info, "Processing started");

        let reporter = Reporter { handle: &handle };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| run(&input, &schema, &options, &reporter)));

        let mut record = handle.lock();
        match outcome {
            Ok(Ok((output, entries))) => {
                record.job.complete(output, entries);
                log_job(job_id, LogLevel::Success, format!("Generated {} entries", entries));
            }
            Ok(Err(e)) => {
                record.job.fail(e.to_string());
                log_job(job_id, LogLevel::Error, format!("Job failed: {}", e));
            }
            Err(payload) => {
                let message = format!("internal error: {}", panic_message(payload.as_ref()));
                log_job(job_id, LogLevel::Error, format!("Job failed: {}", message));
                record.job.fail(message);
            }
        }
        Ok(record.job.clone())
    }

    pub fn get(&self, job_id: &str) -> JobResult<GenerationJob> {
        self.store
            .snapshot(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    /// Jobs in creation order.
    pub fn list(&self, status: Option<JobStatus>) -> Vec<GenerationJob> {
        self.store.list(status)
    }

    /// Generated text of a completed job, read under one lock.
    pub fn result(&self, job_id: &str) -> JobResult<JobOutput> {
        let handle = self.handle(job_id)?;
        let record = handle.lock();
        let job = &record.job;
        match (job.status, &job.output) {
            (JobStatus::Completed, Some(output)) => Ok(JobOutput {
                job_id: job.job_id.clone(),
                output: output.clone(),
                output_records: job.output_records,
                output_format: job.options.output_format,
                completed_at: job.completed_at,
            }),
            (status, _) => Err(JobError::NotReady {
                job_id: job_id.to_string(),
                status,
            }),
        }
    }

    /// Cancel a job that has not started.
    pub fn cancel(&self, job_id: &str) -> JobResult<GenerationJob> {
        let handle = self.handle(job_id)?;
        let mut record = handle.lock();
        if record.job.status != JobStatus::Pending {
            return Err(JobError::InvalidState {
                job_id: job_id.to_string(),
                status: record.job.status,
                action: "cancel",
            });
        }
        record.job.status = JobStatus::Cancelled;
        record.job.completed_at = Some(Utc::now());
        log_job(job_id, LogLevel::Warning, "Job cancelled");
        Ok(record.job.clone())
    }

    /// Create and process in one call.
    pub fn generate_now(
        &self,
        input: JobInput,
        schema_name: &str,
        options: GenerationOptions,
    ) -> JobResult<GenerationJob> {
        let job = self.create(input, schema_name, options)?;
        self.process(&job.job_id)
    }

    fn handle(&self, job_id: &str) -> JobResult<JobHandle> {
        self.store
            .handle(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }
}

/// Publishes intermediate state with short lock holds.
struct Reporter<'a> {
    handle: &'a Mutex<JobRecord>,
}

impl Reporter<'_> {
    fn validated(&self, parsed: &ParsingResult) {
        let mut record = self.handle.lock();
        record.job.summary = Some(parsed.summary.clone());
        record.job.advance(PROGRESS_VALIDATED);
    }

    fn generated(&self, output: &GenerationOutput) {
        let mut record = self.handle.lock();
        record.job.generation_errors = output.errors.clone();
        record.job.advance(PROGRESS_GENERATED);
    }
}

/// Parse, validate and generate. Returns the rendered output and its entry
/// count.
fn run(
    input: &JobInput,
    schema: &Schema,
    options: &GenerationOptions,
    reporter: &Reporter<'_>,
) -> PipelineResult<(String, usize)> {
    let parsed = pipeline::parse(&input.bytes, input.format, schema, &options.parse_options())?;
    reporter.validated(&parsed);

    if parsed.records.is_empty() {
        return Err(PipelineError::NoValidRecords(parsed.summary.invalid_records));
    }

    let mapping = schema.ldap_mapping();
    let generated = ldif::generate(&parsed.records, &options.base_dn, &options.object_classes, &mapping);
    reporter.generated(&generated);

    if generated.entries.is_empty() {
        return Err(PipelineError::NoEntries(generated.errors.len()));
    }

    let output = generated.render(options.output_format)?;
    Ok((output, generated.entry_count()))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::ldif::OutputFormat;

    const USERS: &str = "id,name,email,age\n1,John Doe,john@example.com,25\n2,Jane Roe,jane@example.com,31\n";

    fn manager() -> JobManager {
        JobManager::default()
    }

    #[test]
    fn test_create_then_process() {
        let manager = manager();
        let job = manager
            .create(JobInput::csv(USERS), "user", GenerationOptions::default())
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress_percentage, 0);
        assert_eq!(job.input_records, 2);

        let done = manager.process(&job.job_id).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress_percentage, 100);
        assert_eq!(done.output_records, 2);
        assert!(done.started_at.is_some() && done.completed_at.is_some());
        assert!(done.error_message.is_none());
        assert_eq!(done.summary.as_ref().unwrap().valid_records, 2);

        let result = manager.result(&job.job_id).unwrap();
        assert!(result.output.starts_with("dn: uid=1,dc=example,dc=com\n"));
        assert_eq!(result.job_id, job.job_id);
        assert_eq!(result.output_records, 2);
        assert_eq!(result.output_format, OutputFormat::Ldif);
        assert_eq!(result.completed_at, done.completed_at);
    }

    #[test]
    fn test_unknown_schema_stores_nothing() {
        let manager = manager();
        let err = manager
            .create(JobInput::csv(USERS), "nope", GenerationOptions::default())
            .unwrap_err();
        assert_eq!(err, JobError::Schema(SchemaError::NotFound("nope".into())));
        assert!(manager.list(None).is_empty());
    }

    #[test]
    fn test_process_twice_is_invalid() {
        let manager = manager();
        let job = manager
            .create(JobInput::csv(USERS), "user", GenerationOptions::default())
            .unwrap();
        manager.process(&job.job_id).unwrap();

        let err = manager.process(&job.job_id).unwrap_err();
        assert!(matches!(
            err,
            JobError::InvalidState {
                status: JobStatus::Completed,
                action: "process",
                ..
            }
        ));
    }

    #[test]
    fn test_result_before_completion() {
        let manager = manager();
        let job = manager
            .create(JobInput::csv(USERS), "user", GenerationOptions::default())
            .unwrap();
        assert_eq!(
            manager.result(&job.job_id),
            Err(JobError::NotReady {
                job_id: job.job_id.clone(),
                status: JobStatus::Pending
            })
        );
        assert_eq!(manager.result("missing"), Err(JobError::NotFound("missing".into())));
    }

    #[test]
    fn test_no_valid_records_fails_job() {
        let manager = manager();
        let job = manager
            .generate_now(JobInput::csv("id,name,email\nx,,bad\n"), "user", GenerationOptions::default())
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.output.is_none());
        assert!(job.error_message.as_deref().unwrap().contains("No valid records"));
        assert_eq!(job.summary.as_ref().unwrap().invalid_records, 1);
        assert!(job.progress_percentage < 100);
    }

    #[test]
    fn test_unparseable_input_fails_at_process() {
        let manager = manager();
        let job = manager
            .create(JobInput::json("not json"), "user", GenerationOptions::default())
            .unwrap();
        assert_eq!(job.input_records, 0);

        let failed = manager.process(&job.job_id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.error_message.unwrap().contains("Invalid JSON"));
    }

    #[test]
    fn test_cancel() {
        let manager = manager();
        let job = manager
            .create(JobInput::csv(USERS), "user", GenerationOptions::default())
            .unwrap();
        let cancelled = manager.cancel(&job.job_id).unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);

        assert!(matches!(
            manager.process(&job.job_id),
            Err(JobError::InvalidState {
                status: JobStatus::Cancelled,
                ..
            })
        ));
        assert!(matches!(manager.cancel(&job.job_id), Err(JobError::InvalidState { .. })));
    }

    #[test]
    fn test_list_filters_by_status() {
        let manager = manager();
        let first = manager
            .create(JobInput::csv(USERS), "user", GenerationOptions::default())
            .unwrap();
        let second = manager
            .create(JobInput::csv(USERS), "user", GenerationOptions::default())
            .unwrap();
        manager.process(&second.job_id).unwrap();

        let all: Vec<String> = manager.list(None).into_iter().map(|j| j.job_id).collect();
        assert_eq!(all, vec![first.job_id.clone(), second.job_id.clone()]);
        assert_eq!(manager.list(Some(JobStatus::Pending))[0].job_id, first.job_id);
        assert_eq!(manager.list(Some(JobStatus::Completed))[0].job_id, second.job_id);
    }

    #[test]
    fn test_json_output_format() {
        let manager = manager();
        let options = GenerationOptions {
            output_format: crate::ldif::OutputFormat::Json,
            ..Default::default()
        };
        let job = manager.generate_now(JobInput::csv(USERS), "user", options).unwrap();
        let entries: serde_json::Value = serde_json::from_str(job.output.as_deref().unwrap()).unwrap();
        assert_eq!(entries.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "panic");
    }
}
