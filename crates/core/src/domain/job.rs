// Scan Job Domain Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::{DomainError, Result};
use crate::domain::report::ScanReport;

/// Job ID (UUID v4)
pub type JobId = String;

/// External scanner backing a job
///
/// Closed set: adding a tool means a new variant here and a new adapter arm
/// in the system layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanTool {
    Nmap,
    Zmap,
    Masscan,
}

impl ScanTool {
    pub const ALL: [ScanTool; 3] = [ScanTool::Nmap, ScanTool::Zmap, ScanTool::Masscan];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanTool::Nmap => "nmap",
            ScanTool::Zmap => "zmap",
            ScanTool::Masscan => "masscan",
        }
    }

    /// Executable name looked up on the search path
    pub fn binary(&self) -> &'static str {
        self.as_str()
    }

    /// Tools that open raw sockets and therefore need elevated privileges
    pub fn requires_raw_sockets(&self) -> bool {
        matches!(self, ScanTool::Zmap | ScanTool::Masscan)
    }
}

impl std::fmt::Display for ScanTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanTool {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nmap" => Ok(ScanTool::Nmap),
            "zmap" => Ok(ScanTool::Zmap),
            "masscan" => Ok(ScanTool::Masscan),
            other => Err(DomainError::UnknownTool(other.to_string())),
        }
    }
}

/// Job status
///
/// `submitted -> running -> {completed | failed | stopped}`, plus
/// `submitted -> failed` when no process ever ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Submitted,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Stopped
        )
    }

    /// Statuses a job may be in right before entering `self`
    pub fn allowed_sources(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::Submitted => &[],
            JobStatus::Running => &[JobStatus::Submitted],
            JobStatus::Completed => &[JobStatus::Running],
            JobStatus::Failed => &[JobStatus::Submitted, JobStatus::Running],
            JobStatus::Stopped => &[JobStatus::Running],
        }
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        next.allowed_sources().contains(self)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "submitted" => Ok(JobStatus::Submitted),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "stopped" => Ok(JobStatus::Stopped),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Terminal payload of a job: either the canonical report or an error message
///
/// Serialized untagged, so the stored blob is `{"hosts": [...]}` or
/// `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobResult {
    Report(ScanReport),
    Error { error: String },
}

impl JobResult {
    pub fn error(message: impl Into<String>) -> Self {
        JobResult::Error {
            error: message.into(),
        }
    }

    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            JobResult::Report(report) => Some(report),
            JobResult::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            JobResult::Report(_) => None,
            JobResult::Error { error } => Some(error),
        }
    }
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Completed(ScanReport),
    Failed(String),
    Stopped,
}

impl Termination {
    pub fn status(&self) -> JobStatus {
        match self {
            Termination::Completed(_) => JobStatus::Completed,
            Termination::Failed(_) => JobStatus::Failed,
            Termination::Stopped => JobStatus::Stopped,
        }
    }

    pub fn result(&self) -> Option<JobResult> {
        match self {
            Termination::Completed(report) => Some(JobResult::Report(report.clone())),
            Termination::Failed(message) => Some(JobResult::error(message.clone())),
            Termination::Stopped => None,
        }
    }

    /// Progress to store alongside the terminal status (completed jobs read 100)
    pub fn final_progress(&self) -> Option<u8> {
        match self {
            Termination::Completed(_) => Some(100),
            Termination::Failed(_) | Termination::Stopped => None,
        }
    }
}

/// Validated request parameters, immutable for the lifetime of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub tool: ScanTool,
    pub target: String,
    pub scan_type: String,
    pub port: Option<u16>,
}

impl ScanRequest {
    pub fn new(
        tool: ScanTool,
        target: impl Into<String>,
        scan_type: impl Into<String>,
        port: Option<u16>,
    ) -> Self {
        Self {
            tool,
            target: target.into(),
            scan_type: scan_type.into(),
            port,
        }
    }
}

/// Scan Job Entity (one persisted row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanJob {
    pub job_id: JobId,
    pub tool: ScanTool,
    pub target: String,
    pub scan_type: String,
    pub port: Option<u16>,
    pub status: JobStatus,
    pub progress: u8,
    pub result: Option<JobResult>,
    pub created_at: i64, // epoch ms
}

impl ScanJob {
    /// Create a new job in `submitted` state
    ///
    /// # Arguments
    ///
    /// * `job_id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `request` - Validated scan parameters
    pub fn new(job_id: impl Into<String>, created_at: i64, request: ScanRequest) -> Self {
        Self {
            job_id: job_id.into(),
            tool: request.tool,
            target: request.target,
            scan_type: request.scan_type,
            port: request.port,
            status: JobStatus::Submitted,
            progress: 0,
            result: None,
            created_at,
        }
    }

    /// Create a job with a deterministic ID and timestamp (for tests only)
    pub fn new_test(request: ScanRequest) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self::new(format!("test-{}", counter), (counter * 1000) as i64, request)
    }

    pub fn request(&self) -> ScanRequest {
        ScanRequest {
            tool: self.tool,
            target: self.target.clone(),
            scan_type: self.scan_type.clone(),
            port: self.port,
        }
    }

    /// Transition `submitted -> running`
    pub fn start(&mut self) -> Result<()> {
        self.transition(JobStatus::Running)
    }

    /// Record a progress value; returns false when nothing changed
    ///
    /// Only running jobs move, and only forward.
    pub fn record_progress(&mut self, progress: u8) -> bool {
        let progress = progress.min(100);
        if self.status != JobStatus::Running || progress <= self.progress {
            return false;
        }
        self.progress = progress;
        true
    }

    /// Apply a terminal outcome; terminal states are absorbing
    pub fn finish(&mut self, termination: &Termination) -> Result<()> {
        self.transition(termination.status())?;
        self.result = termination.result();
        if let Some(progress) = termination.final_progress() {
            self.progress = progress;
        }
        Ok(())
    }

    fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::ScanReportBuilder;

    fn nmap_job() -> ScanJob {
        ScanJob::new_test(ScanRequest::new(ScanTool::Nmap, "127.0.0.1", "quick", None))
    }

    #[test]
    fn test_tool_round_trips_through_str() {
        for tool in ScanTool::ALL {
            assert_eq!(tool.as_str().parse::<ScanTool>().unwrap(), tool);
        }
        assert!(matches!(
            "nessus".parse::<ScanTool>(),
            Err(DomainError::UnknownTool(name)) if name == "nessus"
        ));
    }

    #[test]
    fn test_lifecycle_to_completed() {
        let mut job = nmap_job();
        assert_eq!(job.status, JobStatus::Submitted);
        assert_eq!(job.progress, 0);

        job.start().unwrap();
        assert!(job.record_progress(40));
        assert!(!job.record_progress(20), "progress must not go backwards");
        assert_eq!(job.progress, 40);

        let report = ScanReportBuilder::default().build();
        job.finish(&Termination::Completed(report)).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.result.as_ref().unwrap().report().is_some());
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        let mut job = nmap_job();
        job.start().unwrap();
        job.finish(&Termination::Stopped).unwrap();

        assert!(job.finish(&Termination::Failed("late".into())).is_err());
        assert!(!job.record_progress(90));
        assert_eq!(job.status, JobStatus::Stopped);
        assert!(job.result.is_none());
    }

    #[test]
    fn test_submitted_can_fail_but_not_complete_or_stop() {
        let mut job = nmap_job();
        assert!(job
            .finish(&Termination::Completed(ScanReport::default()))
            .is_err());
        assert!(job.finish(&Termination::Stopped).is_err());
        assert_eq!(job.status, JobStatus::Submitted);
        job.finish(&Termination::Failed("spawn failed".into())).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.result.unwrap().error_message(), Some("spawn failed"));
    }

    #[test]
    fn test_progress_ignored_before_running() {
        let mut job = nmap_job();
        assert!(!job.record_progress(10));
        assert_eq!(job.progress, 0);
    }

    #[test]
    fn test_job_result_serializes_untagged() {
        let err = JobResult::error("boom");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({"error": "boom"})
        );

        let parsed: JobResult = serde_json::from_value(serde_json::json!({"hosts": []})).unwrap();
        assert_eq!(parsed, JobResult::Report(ScanReport::default()));

        let parsed: JobResult =
            serde_json::from_value(serde_json::json!({"error": "nope"})).unwrap();
        assert_eq!(parsed.error_message(), Some("nope"));
    }
}
