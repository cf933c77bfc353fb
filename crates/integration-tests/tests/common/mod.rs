//! Shared wiring for integration tests

#![allow(dead_code)]

use scanhive_core::application::ScanOrchestrator;
use scanhive_core::domain::{JobId, JobStatus, ScanJob};
use scanhive_core::port::id_provider::SequentialIdProvider;
use scanhive_core::port::time_provider::TickingTimeProvider;
use scanhive_core::port::ScanLauncher;
use scanhive_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};
use std::sync::Arc;
use std::time::Duration;

pub async fn memory_store() -> Arc<SqliteJobStore> {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteJobStore::new(pool))
}

pub fn orchestrator(store: Arc<SqliteJobStore>, launcher: Arc<dyn ScanLauncher>) -> ScanOrchestrator {
    ScanOrchestrator::new(
        store,
        launcher,
        Arc::new(SequentialIdProvider::default()),
        Arc::new(TickingTimeProvider::starting_at(1_700_000_000_000)),
    )
}

/// Poll until the job reaches `status` (real processes get a generous limit)
pub async fn wait_for_status(
    orchestrator: &ScanOrchestrator,
    job_id: &JobId,
    status: JobStatus,
) -> ScanJob {
    for _ in 0..1000 {
        let job = orchestrator.get_status(job_id).await.unwrap();
        if job.status == status {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let job = orchestrator.get_status(job_id).await.unwrap();
    panic!("job {} never reached {}: {:?}", job_id, status, job);
}

pub async fn wait_until_terminal(orchestrator: &ScanOrchestrator, job_id: &JobId) -> ScanJob {
    for _ in 0..1000 {
        let job = orchestrator.get_status(job_id).await.unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never finished", job_id);
}

pub async fn wait_until_active(orchestrator: &ScanOrchestrator, job_id: &JobId) {
    for _ in 0..1000 {
        let job = orchestrator.get_status(job_id).await.unwrap();
        if job.status == JobStatus::Running && orchestrator.active_jobs() > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never became active", job_id);
}
