//! RPC Method Handlers
//!
//! Thin translation between wire types and [`ScanOrchestrator`].

use crate::error::to_rpc_error;
use crate::types::{
    CreateScanRequest, CreateScanResponse, DeleteScanResponse, HealthResponse, JobIdRequest,
    ScanJobView, StopScanResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use scanhive_core::application::ScanOrchestrator;
use scanhive_core::domain::JobStatus;
use std::sync::Arc;
use tracing::debug;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    orchestrator: Arc<ScanOrchestrator>,
}

impl RpcHandler {
    pub fn new(orchestrator: Arc<ScanOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// scan.create.v1
    pub async fn create(
        &self,
        params: CreateScanRequest,
    ) -> Result<CreateScanResponse, ErrorObjectOwned> {
        let job_id = self
            .orchestrator
            .submit(params.into())
            .await
            .map_err(to_rpc_error)?;

        Ok(CreateScanResponse {
            job_id,
            status: JobStatus::Submitted.to_string(),
        })
    }

    /// scan.list.v1
    pub async fn list(&self) -> Result<Vec<ScanJobView>, ErrorObjectOwned> {
        let jobs = self.orchestrator.list_jobs().await.map_err(to_rpc_error)?;
        debug!(count = jobs.len(), "Listing scan jobs");
        Ok(jobs.into_iter().map(ScanJobView::from).collect())
    }

    /// scan.get.v1
    pub async fn get(&self, params: JobIdRequest) -> Result<ScanJobView, ErrorObjectOwned> {
        let job = self
            .orchestrator
            .get_status(&params.job_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(job.into())
    }

    /// scan.stop.v1
    pub async fn stop(&self, params: JobIdRequest) -> Result<StopScanResponse, ErrorObjectOwned> {
        self.orchestrator
            .cancel(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(StopScanResponse {
            job_id: params.job_id,
            stopped: true,
        })
    }

    /// scan.delete.v1
    pub async fn delete(
        &self,
        params: JobIdRequest,
    ) -> Result<DeleteScanResponse, ErrorObjectOwned> {
        self.orchestrator
            .delete(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(DeleteScanResponse {
            job_id: params.job_id,
            deleted: true,
        })
    }

    /// system.health.v1
    ///
    /// Reads storage, so a broken database shows up as an error here.
    pub async fn health(&self) -> Result<HealthResponse, ErrorObjectOwned> {
        let total_jobs = self
            .orchestrator
            .list_jobs()
            .await
            .map_err(to_rpc_error)?
            .len();

        Ok(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            active_jobs: self.orchestrator.active_jobs(),
            total_jobs,
        })
    }

    /// system.ping.v1
    pub fn ping(&self) -> Result<String, ErrorObjectOwned> {
        Ok("pong".to_string())
    }
}
