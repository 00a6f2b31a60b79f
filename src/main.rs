use lead_import_worker::config::Config;
use lead_import_worker::db::Database;
use lead_import_worker::importer::LeadImporter;
use lead_import_worker::registry::JobRegistry;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Runs the import for every job id given on the command line.
///
/// Ctrl-C cancels all runs; each run records the cancellation on its job before
/// exiting.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_import_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let job_ids: Vec<String> = std::env::args().skip(1).collect();
    if job_ids.is_empty() {
        anyhow::bail!("usage: lead-import-worker <job-id>...");
    }

    // Load configuration
    let config = Config::from_env()?;

    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");
    let storage = db.job_storage().await?;

    let importer = LeadImporter::from_config(Arc::new(storage), &config)?;
    let registry = JobRegistry::new(Arc::new(importer));

    let mut handles = Vec::with_capacity(job_ids.len());
    for job_id in &job_ids {
        match registry.trigger(job_id).await {
            Ok(handle) => handles.push(handle),
            Err(e) => tracing::warn!("Not starting job {}: {}", job_id, e),
        }
    }

    let watcher = registry.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let cancelled = watcher.cancel_all();
            tracing::warn!("Interrupted, cancelling {} running jobs", cancelled);
        }
    });

    let mut failures = 0;
    for handle in handles {
        let summary = handle.await?;
        match &summary.result {
            Ok(outcome) => tracing::info!("Job {} finished: {:?}", summary.job_id, outcome),
            Err(e) => {
                failures += 1;
                tracing::error!("Job {} errored: {}", summary.job_id, e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} jobs could not be processed", failures, job_ids.len());
    }
    Ok(())
}
