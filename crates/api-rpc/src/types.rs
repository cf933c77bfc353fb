//! RPC Request/Response Types
//!
//! Parameters accept `snake_case` names and their `camelCase` aliases;
//! results are `camelCase`.

use chrono::{DateTime, SecondsFormat};
use scanhive_core::application::SubmitScan;
use scanhive_core::domain::{JobResult, ScanJob};
use serde::{Deserialize, Serialize};

/// scan.create.v1 - Submit a scan
#[derive(Debug, Default, Deserialize)]
pub struct CreateScanRequest {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default, alias = "scanType")]
    pub scan_type: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl From<CreateScanRequest> for SubmitScan {
    fn from(req: CreateScanRequest) -> Self {
        SubmitScan {
            target: req.target,
            tool: req.tool,
            scan_type: req.scan_type,
            port: req.port,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScanResponse {
    pub job_id: String,
    pub status: String,
}

/// scan.get.v1 / scan.stop.v1 / scan.delete.v1
#[derive(Debug, Deserialize)]
pub struct JobIdRequest {
    #[serde(alias = "jobId")]
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopScanResponse {
    pub job_id: String,
    pub stopped: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteScanResponse {
    pub job_id: String,
    pub deleted: bool,
}

/// system.health.v1 - Liveness plus a glance at the workload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Jobs with a live tool process
    pub active_jobs: usize,
    /// Job records in storage
    pub total_jobs: usize,
}

/// One job as returned by scan.list.v1 and scan.get.v1
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanJobView {
    pub job_id: String,
    pub tool: String,
    pub target: String,
    pub scan_type: String,
    pub port: Option<u16>,
    pub status: String,
    pub progress: u8,
    pub result: Option<JobResult>,
    pub created_at: String,
}

impl From<ScanJob> for ScanJobView {
    fn from(job: ScanJob) -> Self {
        Self {
            created_at: rfc3339(job.created_at),
            job_id: job.job_id,
            tool: job.tool.to_string(),
            target: job.target,
            scan_type: job.scan_type,
            port: job.port,
            status: job.status.to_string(),
            progress: job.progress,
            result: job.result,
        }
    }
}

fn rfc3339(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| millis.to_string())
}
