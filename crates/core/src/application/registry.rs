// Active job registry - job id -> live process handle, for cancellation

use crate::domain::JobId;
use crate::port::ProcessRef;
use dashmap::DashMap;
use std::fmt;
use tracing::warn;

/// Concurrent map of jobs whose process is currently alive
///
/// The worker that spawned a process owns it; the registry only keeps a
/// shared reference so a cancel request can reach it. Whoever removes an
/// entry first (worker finishing, or cancel claiming it) decides how the job
/// ends; every later removal is a no-op.
#[derive(Default)]
pub struct ActiveJobRegistry {
    handles: DashMap<JobId, ProcessRef>,
}

impl fmt::Debug for ActiveJobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveJobRegistry")
            .field("active", &self.handles.len())
            .finish()
    }
}

impl ActiveJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handle of a freshly spawned process
    pub fn register(&self, job_id: JobId, handle: ProcessRef) {
        if let Some(previous) = self.handles.insert(job_id.clone(), handle) {
            warn!(job_id = %job_id, pid = ?previous.pid(), "Replaced an existing process handle");
        }
    }

    /// Claim the handle for cancellation; None if the job is not active
    ///
    /// The entry is removed as part of the lookup, so two concurrent cancels
    /// cannot both succeed.
    pub fn lookup_for_cancel(&self, job_id: &str) -> Option<ProcessRef> {
        self.handles.remove(job_id).map(|(_, handle)| handle)
    }

    /// Drop the entry for a job; None if it was already gone
    pub fn remove(&self, job_id: &str) -> Option<ProcessRef> {
        self.handles.remove(job_id).map(|(_, handle)| handle)
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.handles.contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
