// Worker - drives one job's update stream from launch to terminal state

pub mod constants;
mod panic_guard;

pub use panic_guard::{join_error_message, panic_message};

use crate::application::registry::ActiveJobRegistry;
use crate::domain::{JobId, ScanRequest, Termination};
use crate::error::Result;
use crate::port::{JobStore, ProcessRef, ScanLauncher, ScanUpdate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Message recorded when a launcher closes its stream without a terminal update
const STREAM_ENDED_EARLY: &str = "Scan ended without reporting a result";

/// Executes scans, one spawned task per job
///
/// The worker only receives the capabilities it needs (store, launcher,
/// registry); it never reaches for global state.
#[derive(Clone)]
pub struct ScanWorker {
    store: Arc<dyn JobStore>,
    launcher: Arc<dyn ScanLauncher>,
    registry: Arc<ActiveJobRegistry>,
}

/// Per-run bookkeeping shared between the guarded inner task and `run`
#[derive(Default)]
struct RunState {
    process: OnceLock<ProcessRef>,
    registered: AtomicBool,
    settled: AtomicBool,
}

impl ScanWorker {
    pub fn new(
        store: Arc<dyn JobStore>,
        launcher: Arc<dyn ScanLauncher>,
        registry: Arc<ActiveJobRegistry>,
    ) -> Self {
        Self {
            store,
            launcher,
            registry,
        }
    }

    /// Start a job in the background and return immediately
    pub fn spawn(&self, job_id: JobId, request: ScanRequest) -> JoinHandle<()> {
        let worker = self.clone();
        tokio::spawn(async move { worker.run(job_id, request).await })
    }

    /// Run one job to its terminal state
    ///
    /// The update loop runs in its own task; a panic or error there is
    /// recorded as the job's failure and never escapes this function.
    pub async fn run(&self, job_id: JobId, request: ScanRequest) {
        let state = Arc::new(RunState::default());

        let inner = {
            let worker = self.clone();
            let state = Arc::clone(&state);
            let job_id = job_id.clone();
            tokio::spawn(async move { worker.drive(&job_id, request, &state).await })
        };

        let failure = match inner.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                error!(job_id = %job_id, error = %e, "Scan worker failed");
                Some(e.to_string())
            }
            Err(join_err) => Some(join_error_message(join_err)),
        };

        if let Some(message) = failure {
            let termination = self.settle(&job_id, &state, Termination::Failed(message));
            if let Err(e) = self.record(&job_id, &termination).await {
                error!(job_id = %job_id, error = %e, "Failed to record scan failure");
            }
        }

        // Nothing may outlive the worker: no registry entry, no live process
        self.registry.remove(&job_id);
        if let Some(process) = state.process.get() {
            if !process.has_exited() {
                warn!(job_id = %job_id, pid = ?process.pid(), "Terminating leftover scan process");
                process.terminate().await;
            }
        }
    }

    async fn drive(&self, job_id: &JobId, request: ScanRequest, state: &RunState) -> Result<()> {
        info!(
            job_id = %job_id,
            tool = %request.tool,
            target = %request.target,
            scan_type = %request.scan_type,
            "Launching scan"
        );

        let mut updates = self.launcher.launch(request);
        let mut last_progress = 0u8;

        while let Some(update) = updates.recv().await {
            if update.is_terminal() {
                // Nothing may follow the outcome
                updates.close();
            }
            match update {
                ScanUpdate::Process(process) => {
                    if state.process.set(Arc::clone(&process)).is_err() {
                        warn!(job_id = %job_id, "Ignoring duplicate process update");
                        continue;
                    }
                    self.registry.register(job_id.clone(), Arc::clone(&process));
                    state.registered.store(true, Ordering::SeqCst);
                    info!(job_id = %job_id, pid = ?process.pid(), "Scan process started");

                    // A stop claimed in between cannot finish a submitted job;
                    // the claim is honoured by `settle` once the job is running
                    if !self.store.mark_running(job_id).await? && self.job_vanished(job_id).await? {
                        self.abandon(job_id, state).await;
                        return Ok(());
                    }
                }
                ScanUpdate::Progress(progress) => {
                    let progress = progress.min(100);
                    if progress <= last_progress {
                        continue;
                    }
                    last_progress = progress;
                    debug!(job_id = %job_id, progress, "Scan progress");

                    if !self.store.record_progress(job_id, progress).await?
                        && self.job_vanished(job_id).await?
                    {
                        self.abandon(job_id, state).await;
                        return Ok(());
                    }
                }
                ScanUpdate::Result(report) => {
                    if !report.is_normalized() {
                        warn!(job_id = %job_id, "Scan report repeats a host or port");
                    }
                    info!(job_id = %job_id, hosts = report.hosts.len(), "Scan finished");
                    let termination = self.settle(job_id, state, Termination::Completed(report));
                    return self.record(job_id, &termination).await;
                }
                ScanUpdate::Error(failure) => {
                    warn!(job_id = %job_id, error = %failure, "Scan failed");
                    let termination =
                        self.settle(job_id, state, Termination::Failed(failure.to_string()));
                    return self.record(job_id, &termination).await;
                }
            }
        }

        warn!(job_id = %job_id, "Update stream closed without a terminal update");
        let termination = self.settle(
            job_id,
            state,
            Termination::Failed(STREAM_ENDED_EARLY.to_string()),
        );
        self.record(job_id, &termination).await
    }

    /// Decide the final outcome of a job
    ///
    /// Removing the registry entry is the single decision point. If a cancel
    /// claimed the entry first, the job ends `stopped` regardless of what the
    /// tool reported afterwards.
    fn settle(&self, job_id: &str, state: &RunState, observed: Termination) -> Termination {
        if !state.registered.load(Ordering::SeqCst) || state.settled.swap(true, Ordering::SeqCst) {
            return observed;
        }
        match self.registry.remove(job_id) {
            Some(_) => observed,
            None => {
                info!(job_id = %job_id, "Scan was stopped before it finished");
                Termination::Stopped
            }
        }
    }

    async fn record(&self, job_id: &JobId, termination: &Termination) -> Result<()> {
        let status = termination.status();
        if self.store.finish(job_id, termination).await? {
            info!(job_id = %job_id, status = %status, "Job reached terminal state");
        } else {
            debug!(job_id = %job_id, status = %status, "Job already terminal; outcome discarded");
        }
        Ok(())
    }

    async fn job_vanished(&self, job_id: &JobId) -> Result<bool> {
        Ok(self.store.find_by_id(job_id).await?.is_none())
    }

    /// The job row is gone: stop the process and walk away
    async fn abandon(&self, job_id: &JobId, state: &RunState) {
        warn!(job_id = %job_id, "Job record disappeared mid-scan; terminating process");
        state.settled.store(true, Ordering::SeqCst);
        self.registry.remove(job_id);
        if let Some(process) = state.process.get() {
            process.terminate().await;
        }
    }
}
