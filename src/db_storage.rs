use crate::errors::{AppError, ResultExt};
use crate::job_store::JobStore;
use crate::models::{Job, JobParams, JobStatus, Lead, Progress};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

const NON_TERMINAL: &str = "('pending', 'running')";

/// Postgres-backed job store over `customer_import_jobs`.
///
/// Each write is a single guarded `UPDATE`, so the status check and the field update
/// are atomic per document even while an external canceller writes to the same row.
pub struct ImportJobStorage {
    pool: PgPool,
}

impl ImportJobStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the jobs table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS customer_import_jobs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL DEFAULT 'pending',
                params JSONB NOT NULL,
                progress JSONB NOT NULL DEFAULT '{"current":0,"total":0,"phase":"searching"}',
                results JSONB NOT NULL DEFAULT '[]',
                error TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                completed_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Creating customer_import_jobs table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS customer_import_jobs_created_status_idx \
             ON customer_import_jobs (created_at DESC, status)",
        )
        .execute(&self.pool)
        .await
        .context("Creating customer_import_jobs index")?;

        Ok(())
    }

    /// Inserts a job record. Job creation normally happens outside this crate; this is
    /// here for seeding and tests.
    pub async fn create_job(&self, job: &Job) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO customer_import_jobs
                (id, status, params, progress, results, error, created_at, updated_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&job.id)
        .bind(job.status.as_str())
        .bind(Json(&job.params))
        .bind(Json(&job.progress))
        .bind(Json(&job.results))
        .bind(&job.error)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Inserting job {}", job.id))?;

        Ok(())
    }
}

fn parse_status(raw: &str) -> Result<JobStatus, AppError> {
    raw.parse()
        .map_err(|e: String| AppError::UnexpectedError(format!("Corrupt job record: {}", e)))
}

/// Decodes one JSONB column of a job row. Bad documents surface as `InvalidJob` so
/// the worker can claim the job and fail it instead of leaving it pending.
fn decode_document<T: DeserializeOwned>(
    job_id: &str,
    column: &str,
    value: Value,
) -> Result<T, AppError> {
    serde_json::from_value(value).map_err(|e| AppError::InvalidJob {
        job_id: job_id.to_string(),
        reason: format!("{}: {}", column, e),
    })
}

#[async_trait]
impl JobStore for ImportJobStorage {
    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, status, params, progress, results, error,
                   created_at, updated_at, completed_at
            FROM customer_import_jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Loading job {}", job_id))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        let status = parse_status(&status)?;

        // Raw JSON first; typed decoding reports which document is broken.
        let params: Json<Value> = row.try_get("params")?;
        let progress: Json<Value> = row.try_get("progress")?;
        let results: Json<Value> = row.try_get("results")?;
        let params: JobParams = decode_document(&id, "params", params.0)?;
        let progress: Progress = decode_document(&id, "progress", progress.0)?;
        let results: Vec<Lead> = decode_document(&id, "results", results.0)?;

        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        Ok(Some(Job {
            id,
            status,
            params,
            progress,
            results,
            error: row.try_get("error")?,
            created_at,
            updated_at,
            completed_at: row.try_get("completed_at")?,
        }))
    }

    async fn get_status(&self, job_id: &str) -> Result<Option<JobStatus>, AppError> {
        let status: Option<(String,)> =
            sqlx::query_as("SELECT status FROM customer_import_jobs WHERE id = $1")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Reading status of job {}", job_id))?;

        status.map(|(raw,)| parse_status(&raw)).transpose()
    }

    async fn mark_running(&self, job_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query(&format!(
            "UPDATE customer_import_jobs SET status = 'running', updated_at = NOW() \
             WHERE id = $1 AND status IN {}",
            NON_TERMINAL
        ))
        .bind(job_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Claiming job {}", job_id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_progress(&self, job_id: &str, progress: Progress) -> Result<bool, AppError> {
        let result = sqlx::query(&format!(
            "UPDATE customer_import_jobs SET progress = $2, updated_at = NOW() \
             WHERE id = $1 AND status IN {}",
            NON_TERMINAL
        ))
        .bind(job_id)
        .bind(Json(progress))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Writing progress of job {}", job_id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn complete(&self, job_id: &str, results: &[Lead]) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE customer_import_jobs
            SET status = 'completed', results = $2, completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .bind(Json(results))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Completing job {}", job_id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn fail(&self, job_id: &str, error: &str) -> Result<bool, AppError> {
        let result = sqlx::query(&format!(
            "UPDATE customer_import_jobs SET status = 'failed', error = $2, updated_at = NOW() \
             WHERE id = $1 AND status IN {}",
            NON_TERMINAL
        ))
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failing job {}", job_id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn cancel(&self, job_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query(&format!(
            "UPDATE customer_import_jobs SET status = 'cancelled', updated_at = NOW() \
             WHERE id = $1 AND status IN {}",
            NON_TERMINAL
        ))
        .bind(job_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Cancelling job {}", job_id))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_document_accepts_wire_params() {
        let params: JobParams = decode_document(
            "job-1",
            "params",
            json!({"branche": "Maler", "standort": "Köln", "anzahlErgebnisse": 3}),
        )
        .unwrap();
        assert_eq!(params.location, "Köln");
        assert_eq!(params.max_results, 3);
    }

    #[test]
    fn test_decode_document_rejects_missing_result_count() {
        let err = decode_document::<JobParams>(
            "job-2",
            "params",
            json!({"branche": "Maler", "standort": "Köln"}),
        )
        .unwrap_err();

        match err {
            AppError::InvalidJob { job_id, reason } => {
                assert_eq!(job_id, "job-2");
                assert!(reason.starts_with("params:"));
                assert!(reason.contains("anzahlErgebnisse"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_decode_document_rejects_negative_result_count() {
        let err = decode_document::<JobParams>(
            "job-3",
            "params",
            json!({"branche": "Maler", "standort": "Köln", "anzahlErgebnisse": -5}),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidJob { .. }));
    }
}
