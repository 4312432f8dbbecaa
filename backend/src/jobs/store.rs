//! In-memory job repository.
//!
//! A read-mostly index maps ids to per-job mutexes, so work on one job never
//! blocks another beyond the brief index read.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{GenerationJob, JobInput, JobStatus};
use crate::schema::Schema;

/// Everything the store keeps for one job.
#[derive(Debug)]
pub struct JobRecord {
    pub job: GenerationJob,
    pub input: Arc<JobInput>,
    pub schema: Arc<Schema>,
    seq: u64,
}

pub type JobHandle = Arc<Mutex<JobRecord>>;

#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, JobHandle>>,
    next_seq: AtomicU64,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: GenerationJob, input: JobInput, schema: Arc<Schema>) -> JobHandle {
        let id = job.job_id.clone();
        let record = JobRecord {
            job,
            input: Arc::new(input),
            schema,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        let handle = Arc::new(Mutex::new(record));
        self.jobs.write().insert(id, Arc::clone(&handle));
        handle
    }

    pub fn handle(&self, job_id: &str) -> Option<JobHandle> {
        self.jobs.read().get(job_id).cloned()
    }

    pub fn snapshot(&self, job_id: &str) -> Option<GenerationJob> {
        self.handle(job_id).map(|handle| handle.lock().job.clone())
    }

    /// Snapshots in creation order, optionally filtered by status.
    pub fn list(&self, status: Option<JobStatus>) -> Vec<GenerationJob> {
        let handles: Vec<JobHandle> = self.jobs.read().values().cloned().collect();

        let mut jobs: Vec<(u64, GenerationJob)> = handles
            .iter()
            .map(|handle| {
                let record = handle.lock();
                (record.seq, record.job.clone())
            })
            .filter(|(_, job)| status.map_or(true, |s| job.status == s))
            .collect();

        jobs.sort_by_key(|(seq, _)| *seq);
        jobs.into_iter().map(|(_, job)| job).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
