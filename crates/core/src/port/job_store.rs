// Job Store Port (Interface)

use crate::domain::{JobId, JobStatus, ScanJob, Termination};
use crate::error::Result;
use async_trait::async_trait;

/// Persistence interface for scan jobs
///
/// Every state-changing call is a compare-and-set against the current
/// status, so a job that reached a terminal status never changes again no
/// matter how many writers race on it.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &ScanJob) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, job_id: &JobId) -> Result<Option<ScanJob>>;

    /// All jobs, newest `created_at` first
    async fn list_newest_first(&self) -> Result<Vec<ScanJob>>;

    /// All jobs currently in `status`
    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<ScanJob>>;

    /// `submitted -> running`; false when the job is gone or was not submitted
    async fn mark_running(&self, job_id: &JobId) -> Result<bool>;

    /// Raise progress of a running job; false when nothing was written
    async fn record_progress(&self, job_id: &JobId, progress: u8) -> Result<bool>;

    /// Move a non-terminal job to its terminal status; false when it was
    /// already terminal (or missing) and nothing was written
    async fn finish(&self, job_id: &JobId, termination: &Termination) -> Result<bool>;

    /// Delete a job row; false when no such job existed
    async fn delete(&self, job_id: &JobId) -> Result<bool>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory job store applying the domain transition rules
    #[derive(Default)]
    pub struct InMemoryJobStore {
        jobs: Mutex<HashMap<JobId, ScanJob>>,
        progress_log: Mutex<HashMap<JobId, Vec<u8>>>,
    }

    impl InMemoryJobStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every progress value that was actually written for a job, in order
        pub fn progress_history(&self, job_id: &str) -> Vec<u8> {
            self.progress_log
                .lock()
                .unwrap()
                .get(job_id)
                .cloned()
                .unwrap_or_default()
        }

        pub fn len(&self) -> usize {
            self.jobs.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait]
    impl JobStore for InMemoryJobStore {
        async fn insert(&self, job: &ScanJob) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            if jobs.contains_key(&job.job_id) {
                return Err(AppError::Database(format!(
                    "Unique constraint violation: job {}",
                    job.job_id
                )));
            }
            jobs.insert(job.job_id.clone(), job.clone());
            Ok(())
        }

        async fn find_by_id(&self, job_id: &JobId) -> Result<Option<ScanJob>> {
            Ok(self.jobs.lock().unwrap().get(job_id).cloned())
        }

        async fn list_newest_first(&self) -> Result<Vec<ScanJob>> {
            let mut jobs: Vec<ScanJob> = self.jobs.lock().unwrap().values().cloned().collect();
            jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(jobs)
        }

        async fn find_by_status(&self, status: JobStatus) -> Result<Vec<ScanJob>> {
            let mut jobs: Vec<ScanJob> = self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.status == status)
                .cloned()
                .collect();
            jobs.sort_by_key(|j| j.created_at);
            Ok(jobs)
        }

        async fn mark_running(&self, job_id: &JobId) -> Result<bool> {
            let mut jobs = self.jobs.lock().unwrap();
            Ok(jobs
                .get_mut(job_id)
                .map(|job| job.start().is_ok())
                .unwrap_or(false))
        }

        async fn record_progress(&self, job_id: &JobId, progress: u8) -> Result<bool> {
            let mut jobs = self.jobs.lock().unwrap();
            let written = jobs
                .get_mut(job_id)
                .map(|job| job.record_progress(progress))
                .unwrap_or(false);
            if written {
                self.progress_log
                    .lock()
                    .unwrap()
                    .entry(job_id.clone())
                    .or_default()
                    .push(progress.min(100));
            }
            Ok(written)
        }

        async fn finish(&self, job_id: &JobId, termination: &Termination) -> Result<bool> {
            let mut jobs = self.jobs.lock().unwrap();
            Ok(jobs
                .get_mut(job_id)
                .map(|job| job.finish(termination).is_ok())
                .unwrap_or(false))
        }

        async fn delete(&self, job_id: &JobId) -> Result<bool> {
            Ok(self.jobs.lock().unwrap().remove(job_id).is_some())
        }
    }
}
