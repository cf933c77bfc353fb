// Scan Orchestrator - submit, poll, cancel, delete, startup recovery

use crate::application::recovery::RecoveryService;
use crate::application::registry::ActiveJobRegistry;
use crate::application::submit::SubmitScan;
use crate::application::worker::ScanWorker;
use crate::domain::{JobId, ScanJob, Termination};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobStore, ScanLauncher, TimeProvider};
use std::sync::Arc;
use tracing::{debug, info};

/// Top-level API over scan jobs
///
/// Each submission gets its own worker task; the orchestrator itself never
/// waits on a scan. There is no bound on concurrent scans here.
pub struct ScanOrchestrator {
    store: Arc<dyn JobStore>,
    registry: Arc<ActiveJobRegistry>,
    worker: ScanWorker,
    recovery: RecoveryService,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl ScanOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        launcher: Arc<dyn ScanLauncher>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        let registry = Arc::new(ActiveJobRegistry::new());
        Self {
            worker: ScanWorker::new(Arc::clone(&store), launcher, Arc::clone(&registry)),
            recovery: RecoveryService::new(Arc::clone(&store)),
            store,
            registry,
            id_provider,
            time_provider,
        }
    }

    /// Validate, persist as `submitted`, start the worker, return the id
    ///
    /// Validation failures are returned here and never create a job.
    pub async fn submit(&self, submission: SubmitScan) -> Result<JobId> {
        let request = submission.validate()?;

        let job = ScanJob::new(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            request,
        );
        self.store.insert(&job).await?;

        info!(
            job_id = %job.job_id,
            tool = %job.tool,
            target = %job.target,
            scan_type = %job.scan_type,
            port = ?job.port,
            "Scan submitted"
        );

        self.worker.spawn(job.job_id.clone(), job.request());
        Ok(job.job_id)
    }

    pub async fn get_status(&self, job_id: &JobId) -> Result<ScanJob> {
        self.store
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))
    }

    /// All jobs, newest first
    pub async fn list_jobs(&self) -> Result<Vec<ScanJob>> {
        self.store.list_newest_first().await
    }

    /// Stop an active job
    ///
    /// Only a job with a live process can be stopped. The registry entry is
    /// claimed before anything else, so a second call (or a worker finishing
    /// at the same moment) sees the job as inactive.
    pub async fn cancel(&self, job_id: &JobId) -> Result<()> {
        let process = self
            .registry
            .lookup_for_cancel(job_id)
            .ok_or_else(|| AppError::NotFound(format!("No active scan for job {}", job_id)))?;

        info!(job_id = %job_id, pid = ?process.pid(), "Stopping scan");
        process.terminate().await;

        if !self.store.finish(job_id, &Termination::Stopped).await? {
            // Already terminal, or not yet running: the worker records the claim
            debug!(job_id = %job_id, "Stop not written by canceller");
        }
        Ok(())
    }

    /// Remove a job record, stopping it first when it is still active
    pub async fn delete(&self, job_id: &JobId) -> Result<()> {
        match self.cancel(job_id).await {
            Ok(()) | Err(AppError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        if !self.store.delete(job_id).await? {
            return Err(AppError::NotFound(format!("Job {} not found", job_id)));
        }
        info!(job_id = %job_id, "Job deleted");
        Ok(())
    }

    /// Fail every job a previous run left unfinished
    pub async fn recover_on_startup(&self) -> Result<usize> {
        self.recovery.recover_interrupted_jobs().await
    }

    /// Number of jobs with a live process
    pub fn active_jobs(&self) -> usize {
        self.registry.len()
    }
}
