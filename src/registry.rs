//! In-process registry of import runs.
//!
//! Keeps one entry per job id so the same job is never imported twice at once, and
//! holds the cancellation token of every active run. Finished entries stay around
//! for a day so callers can ask how a run ended.

use crate::errors::AppError;
use crate::importer::{LeadImporter, RunOutcome};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const RUN_STATE_TTL: Duration = Duration::from_secs(86400);
const MAX_TRACKED_RUNS: u64 = 10_000;

/// Result of a run as seen by the registry. Errors are flattened to text so the
/// summary can be cached and cloned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub job_id: String,
    pub result: Result<RunOutcome, String>,
}

#[derive(Debug, Clone)]
pub enum RunState {
    Running {
        started_at: DateTime<Utc>,
        token: CancellationToken,
    },
    Finished {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        summary: RunSummary,
    },
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running { .. })
    }
}

#[derive(Clone)]
pub struct JobRegistry {
    importer: Arc<LeadImporter>,
    runs: Cache<String, RunState>,
}

impl JobRegistry {
    pub fn new(importer: Arc<LeadImporter>) -> Self {
        let runs = Cache::builder()
            .time_to_live(RUN_STATE_TTL)
            .max_capacity(MAX_TRACKED_RUNS)
            .build();

        Self { importer, runs }
    }

    /// Starts a run for `job_id` on its own task.
    ///
    /// Fails with `AlreadyRunning` if this registry already has an active run for the
    /// id. The claim is atomic per key, so concurrent triggers cannot both succeed.
    pub async fn trigger(&self, job_id: &str) -> Result<JoinHandle<RunSummary>, AppError> {
        let token = CancellationToken::new();
        let started_at = Utc::now();

        let claim = token.clone();
        let result = self
            .runs
            .entry(job_id.to_string())
            .and_compute_with(move |existing| {
                let op = match existing {
                    Some(entry) if entry.value().is_running() => Op::Nop,
                    _ => Op::Put(RunState::Running {
                        started_at,
                        token: claim,
                    }),
                };
                std::future::ready(op)
            })
            .await;

        match result {
            CompResult::Inserted(_) | CompResult::ReplacedWith(_) => {}
            _ => {
                tracing::warn!("⏭️  Job {} is already running, ignoring trigger", job_id);
                return Err(AppError::AlreadyRunning(job_id.to_string()));
            }
        }

        tracing::info!("Job {} registered", job_id);

        let registry = self.clone();
        let job_id = job_id.to_string();
        Ok(tokio::spawn(async move {
            let importer = Arc::clone(&registry.importer);
            let run_id = job_id.clone();
            let run = tokio::spawn(async move { importer.run(&run_id, &token).await });

            let result = match run.await {
                Ok(Ok(outcome)) => Ok(outcome),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => Err(format!("Import task aborted: {}", e)),
            };

            let summary = RunSummary {
                job_id: job_id.clone(),
                result,
            };
            registry
                .runs
                .insert(
                    job_id,
                    RunState::Finished {
                        started_at,
                        finished_at: Utc::now(),
                        summary: summary.clone(),
                    },
                )
                .await;

            summary
        }))
    }

    pub async fn status(&self, job_id: &str) -> Option<RunState> {
        self.runs.get(job_id).await
    }

    /// Cancels a job: marks it `cancelled` in the store and fires the token of a
    /// local run, if any. Returns whether either took effect.
    pub async fn cancel(&self, job_id: &str) -> Result<bool, AppError> {
        let stored = self.importer.store().cancel(job_id).await?;

        let signalled = match self.runs.get(job_id).await {
            Some(RunState::Running { token, .. }) => {
                token.cancel();
                true
            }
            _ => false,
        };

        if stored || signalled {
            tracing::info!("🛑 Cancellation requested for job {}", job_id);
        }
        Ok(stored || signalled)
    }

    /// Fires the token of every active run. Each run writes the cancellation through
    /// to the store when it next checks.
    pub fn cancel_all(&self) -> usize {
        let mut cancelled = 0;
        for (job_id, state) in self.runs.iter() {
            if let RunState::Running { token, .. } = state {
                tracing::info!("Cancelling job {}", job_id);
                token.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }
}
