//! Access to the shared job record.
//!
//! The importer only ever performs single-document field updates. Every write is
//! guarded by the record's current status so that a terminal state set by someone
//! else (usually an external cancel) is never overwritten. Write methods return
//! `true` when the update was applied.

use crate::errors::AppError;
use crate::models::{Job, JobStatus, Lead, Progress};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Loads the whole record. A record whose documents do not decode is reported as
    /// `AppError::InvalidJob` rather than a storage error.
    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, AppError>;

    async fn get_status(&self, job_id: &str) -> Result<Option<JobStatus>, AppError>;

    /// Claims the job for this worker. Accepts `pending`, and `running` so that a job
    /// orphaned by a crashed worker can be picked up again.
    async fn mark_running(&self, job_id: &str) -> Result<bool, AppError>;

    /// Overwrites `progress`; ignored once the job is terminal.
    async fn update_progress(&self, job_id: &str, progress: Progress) -> Result<bool, AppError>;

    /// `running → completed`, persisting the results and stamping `completedAt`.
    async fn complete(&self, job_id: &str, results: &[Lead]) -> Result<bool, AppError>;

    /// Non-terminal → `failed` with the error description.
    async fn fail(&self, job_id: &str, error: &str) -> Result<bool, AppError>;

    /// Non-terminal → `cancelled`.
    async fn cancel(&self, job_id: &str) -> Result<bool, AppError>;
}

/// In-process job store. Used by tests and by embedders that keep jobs in memory.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job: Job) {
        self.jobs.write().await.insert(job.id.clone(), job);
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Applies `update` if the job exists and `allowed` accepts its current status.
    async fn guarded_update<A, F>(&self, job_id: &str, allowed: A, update: F) -> bool
    where
        A: FnOnce(JobStatus) -> bool,
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(job_id) {
            Some(job) if allowed(job.status) => {
                update(job);
                job.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, AppError> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn get_status(&self, job_id: &str) -> Result<Option<JobStatus>, AppError> {
        Ok(self.jobs.read().await.get(job_id).map(|job| job.status))
    }

    async fn mark_running(&self, job_id: &str) -> Result<bool, AppError> {
        Ok(self
            .guarded_update(
                job_id,
                |status| matches!(status, JobStatus::Pending | JobStatus::Running),
                |job| job.status = JobStatus::Running,
            )
            .await)
    }

    async fn update_progress(&self, job_id: &str, progress: Progress) -> Result<bool, AppError> {
        Ok(self
            .guarded_update(
                job_id,
                |status| !status.is_terminal(),
                |job| job.progress = progress,
            )
            .await)
    }

    async fn complete(&self, job_id: &str, results: &[Lead]) -> Result<bool, AppError> {
        Ok(self
            .guarded_update(
                job_id,
                |status| status.can_transition_to(JobStatus::Completed),
                |job| {
                    job.status = JobStatus::Completed;
                    job.results = results.to_vec();
                    job.completed_at = Some(Utc::now());
                },
            )
            .await)
    }

    async fn fail(&self, job_id: &str, error: &str) -> Result<bool, AppError> {
        Ok(self
            .guarded_update(
                job_id,
                |status| !status.is_terminal(),
                |job| {
                    job.status = JobStatus::Failed;
                    job.error = Some(error.to_string());
                },
            )
            .await)
    }

    async fn cancel(&self, job_id: &str) -> Result<bool, AppError> {
        Ok(self
            .guarded_update(
                job_id,
                |status| status.can_transition_to(JobStatus::Cancelled),
                |job| job.status = JobStatus::Cancelled,
            )
            .await)
    }
}
