// SQLite JobStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use scanhive_core::domain::{JobId, JobResult, JobStatus, ScanJob, Termination};
use scanhive_core::error::{AppError, Result};
use scanhive_core::port::JobStore;
use sqlx::SqlitePool;

const SELECT_COLUMNS: &str =
    "SELECT job_id, tool, target, scan_type, port, status, progress, result, created_at FROM scan_jobs";

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, job: &ScanJob) -> Result<()> {
        let result_json = job.result.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO scan_jobs (
                job_id, tool, target, scan_type, port,
                status, progress, result, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.job_id)
        .bind(job.tool.as_str())
        .bind(&job.target)
        .bind(&job.scan_type)
        .bind(job.port.map(i64::from))
        .bind(job.status.as_str())
        .bind(i64::from(job.progress))
        .bind(result_json)
        .bind(job.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, job_id: &JobId) -> Result<Option<ScanJob>> {
        let row = sqlx::query_as::<_, ScanJobRow>(&format!("{} WHERE job_id = ?", SELECT_COLUMNS))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(ScanJobRow::into_job).transpose()
    }

    async fn list_newest_first(&self) -> Result<Vec<ScanJob>> {
        // rowid breaks ties between jobs created in the same millisecond
        let rows: Vec<ScanJobRow> = sqlx::query_as(&format!(
            "{} ORDER BY created_at DESC, rowid DESC",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(ScanJobRow::into_job).collect()
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<ScanJob>> {
        let rows: Vec<ScanJobRow> = sqlx::query_as(&format!(
            "{} WHERE status = ? ORDER BY created_at ASC, rowid ASC",
            SELECT_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(ScanJobRow::into_job).collect()
    }

    async fn mark_running(&self, job_id: &JobId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scan_jobs
            SET status = ?
            WHERE job_id = ? AND status = ?
            "#,
        )
        .bind(JobStatus::Running.as_str())
        .bind(job_id)
        .bind(JobStatus::Submitted.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_progress(&self, job_id: &JobId, progress: u8) -> Result<bool> {
        let progress = i64::from(progress.min(100));

        // Only running jobs move, and only forward
        let result = sqlx::query(
            r#"
            UPDATE scan_jobs
            SET progress = ?
            WHERE job_id = ? AND status = ? AND progress < ?
            "#,
        )
        .bind(progress)
        .bind(job_id)
        .bind(JobStatus::Running.as_str())
        .bind(progress)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn finish(&self, job_id: &JobId, termination: &Termination) -> Result<bool> {
        let status = termination.status();
        let sources = status.allowed_sources();
        if sources.is_empty() {
            return Err(AppError::Internal(format!(
                "{} is not a terminal status",
                status
            )));
        }

        let result_json = termination
            .result()
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let final_progress = termination.final_progress().map(i64::from);

        // Compare-and-set: terminal rows never match, so they never change
        let placeholders = vec!["?"; sources.len()].join(", ");
        let sql = format!(
            r#"
            UPDATE scan_jobs
            SET status = ?, result = ?, progress = COALESCE(?, progress)
            WHERE job_id = ? AND status IN ({})
            "#,
            placeholders
        );

        let mut query = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(result_json)
            .bind(final_progress)
            .bind(job_id);
        for source in sources {
            query = query.bind(source.as_str());
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, job_id: &JobId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scan_jobs WHERE job_id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct ScanJobRow {
    job_id: String,
    tool: String,
    target: String,
    scan_type: String,
    port: Option<i64>,
    status: String,
    progress: i64,
    result: Option<String>,
    created_at: i64,
}

impl ScanJobRow {
    fn into_job(self) -> Result<ScanJob> {
        let port = self
            .port
            .map(|p| {
                u16::try_from(p).map_err(|_| {
                    AppError::Database(format!("Job {} has invalid port {}", self.job_id, p))
                })
            })
            .transpose()?;

        let result = self
            .result
            .as_deref()
            .map(serde_json::from_str::<JobResult>)
            .transpose()?;

        Ok(ScanJob {
            tool: self.tool.parse()?,
            status: self.status.parse()?,
            progress: self.progress.clamp(0, 100) as u8,
            job_id: self.job_id,
            target: self.target,
            scan_type: self.scan_type,
            port,
            result,
            created_at: self.created_at,
        })
    }
}
