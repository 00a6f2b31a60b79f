use std::env;

use chrono::Utc;
use lead_import_worker::db::Database;
use lead_import_worker::errors::AppError;
use lead_import_worker::job_store::JobStore;
use lead_import_worker::models::{Job, JobParams, JobPhase, JobStatus, Progress};

fn unique_job_id(prefix: &str) -> String {
    format!(
        "{}-{}",
        prefix,
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

fn params() -> JobParams {
    JobParams {
        industry_query: "Dachdecker".to_string(),
        location: "Berlin".to_string(),
        max_results: 5,
        analyze_website: false,
        extract_contacts: false,
    }
}

/// Integration smoke test for the Postgres job store.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn job_store_lifecycle_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let storage = db.job_storage().await?;

    let job_id = unique_job_id("smoke");
    storage
        .create_job(&Job::new_pending(job_id.clone(), params()))
        .await?;

    assert!(storage.mark_running(&job_id).await?);
    assert!(
        storage
            .update_progress(&job_id, Progress::new(1, 5, JobPhase::LoadingDetails))
            .await?
    );
    assert!(storage.complete(&job_id, &[]).await?);

    let job = storage
        .get_job(&job_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("job {} vanished", job_id))?;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress.current, 1);
    assert_eq!(job.params, params());
    assert!(job.completed_at.is_some());
    Ok(())
}

/// A cancelled row must not be overwritten by later worker writes.
#[tokio::test]
#[ignore]
async fn cancelled_job_rejects_worker_writes() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let storage = db.job_storage().await?;

    let job_id = unique_job_id("cancel");
    storage
        .create_job(&Job::new_pending(job_id.clone(), params()))
        .await?;
    assert!(storage.mark_running(&job_id).await?);
    assert!(storage.cancel(&job_id).await?);

    assert!(!storage.complete(&job_id, &[]).await?);
    assert!(!storage.fail(&job_id, "late failure").await?);
    assert!(!storage.mark_running(&job_id).await?);
    assert_eq!(
        storage.get_status(&job_id).await?,
        Some(JobStatus::Cancelled)
    );
    Ok(())
}

/// A row whose params document does not decode is reported as invalid, and can still
/// be claimed and failed.
#[tokio::test]
#[ignore]
async fn undecodable_params_are_reported_and_failable() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let storage = db.job_storage().await?;

    let job_id = unique_job_id("broken");
    sqlx::query(
        "INSERT INTO customer_import_jobs (id, status, params) \
         VALUES ($1, 'pending', '{\"branche\": \"Maler\", \"standort\": \"Köln\"}')",
    )
    .bind(&job_id)
    .execute(&db.pool)
    .await?;

    let err = storage.get_job(&job_id).await.unwrap_err();
    assert!(matches!(err.root(), AppError::InvalidJob { .. }));

    assert!(storage.mark_running(&job_id).await?);
    assert!(storage.fail(&job_id, &err.to_string()).await?);
    assert_eq!(storage.get_status(&job_id).await?, Some(JobStatus::Failed));
    Ok(())
}
