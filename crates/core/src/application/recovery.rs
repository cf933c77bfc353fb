// Startup recovery - fail jobs that a restart interrupted
use crate::application::worker::constants::INTERRUPTED_BY_RESTART;
use crate::domain::{JobStatus, Termination};
use crate::error::Result;
use crate::port::JobStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Crash recovery service
///
/// Process handles are never persisted, so on startup no job can still have a
/// live scan behind it. Every job left `submitted` or `running` is moved to
/// `failed` with an interruption message.
pub struct RecoveryService {
    store: Arc<dyn JobStore>,
}

impl RecoveryService {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Returns the number of jobs transitioned
    ///
    /// Must run once, before any new job is submitted.
    pub async fn recover_interrupted_jobs(&self) -> Result<usize> {
        let mut recovered = 0;
        let termination = Termination::Failed(INTERRUPTED_BY_RESTART.to_string());

        for status in [JobStatus::Submitted, JobStatus::Running] {
            for job in self.store.find_by_status(status).await? {
                if self.store.finish(&job.job_id, &termination).await? {
                    warn!(
                        job_id = %job.job_id,
                        tool = %job.tool,
                        previous_status = %status,
                        "Marked interrupted job as failed"
                    );
                    recovered += 1;
                }
            }
        }

        info!(recovered, "Startup recovery completed");
        Ok(recovered)
    }
}
