//! Job orchestration: search, details, optional website analysis, scoring, and
//! persistence of one import job.
//!
//! The job record is the only shared state. Every write goes through the store's
//! guarded updates, so an external cancel always wins over anything written here.

use crate::config::Config;
use crate::errors::AppError;
use crate::job_store::JobStore;
use crate::models::{JobParams, JobPhase, JobStatus, Lead, PlaceCandidate, Progress};
use crate::normalize::{map_industry, parse_address};
use crate::places::PlacesService;
use crate::scoring::{apply_website_analysis, BASE_SCORE};
use crate::website::WebsiteAnalyzer;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// How a single `run` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Results were persisted and the job is `completed`.
    Completed { leads: usize },
    /// The job was cancelled while running; `processed` leads were discarded.
    Cancelled { processed: usize },
    /// The run aborted and the job is `failed`.
    Failed { error: String },
    /// Someone else made the job terminal, either before the claim or before the
    /// results could be saved. `status` is what the store holds now.
    Skipped { status: JobStatus },
}

enum LoopEnd {
    Finished(Vec<Lead>),
    Cancelled { processed: usize },
}

pub struct LeadImporter {
    store: Arc<dyn JobStore>,
    places: PlacesService,
    analyzer: WebsiteAnalyzer,
    candidate_delay: Duration,
}

impl LeadImporter {
    pub fn new(
        store: Arc<dyn JobStore>,
        places: PlacesService,
        analyzer: WebsiteAnalyzer,
        candidate_delay: Duration,
    ) -> Self {
        Self {
            store,
            places,
            analyzer,
            candidate_delay,
        }
    }

    pub fn from_config(store: Arc<dyn JobStore>, config: &Config) -> Result<Self, AppError> {
        Ok(Self::new(
            store,
            PlacesService::new(config)?,
            WebsiteAnalyzer::from_config(config)?,
            config.candidate_delay(),
        ))
    }

    pub fn with_candidate_delay(mut self, delay: Duration) -> Self {
        self.candidate_delay = delay;
        self
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Runs the import for `job_id` to completion, failure, or cancellation.
    ///
    /// Returns `Err` only when the job does not exist or the store cannot be reached
    /// for the final bookkeeping write.
    pub async fn run(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, AppError> {
        let span = tracing::info_span!("import_job", job_id = %job_id);
        self.run_job(job_id, cancel).instrument(span).await
    }

    async fn run_job(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, AppError> {
        let job = match self.store.get_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::error!("Import job {} not found", job_id);
                return Err(AppError::JobNotFound(job_id.to_string()));
            }
            Err(e) if matches!(e.root(), AppError::InvalidJob { .. }) => {
                return self.fail_unreadable(job_id, e).await;
            }
            Err(e) => return Err(e),
        };

        if job.status.is_terminal() {
            tracing::warn!("Job already {}, nothing to do", job.status);
            return Ok(RunOutcome::Skipped { status: job.status });
        }

        if !self.store.mark_running(job_id).await? {
            let status = self.store.get_status(job_id).await?.unwrap_or(job.status);
            tracing::warn!("Job moved to {} before it could be claimed", status);
            return Ok(RunOutcome::Skipped { status });
        }

        tracing::info!(
            "🚀 Import started: '{}' in '{}' (max {})",
            job.params.industry_query,
            job.params.location,
            job.params.max_results
        );

        match self.import(job_id, &job.params, cancel).await {
            Ok(LoopEnd::Finished(leads)) => {
                if self.store.complete(job_id, &leads).await? {
                    tracing::info!("✅ Import completed with {} leads", leads.len());
                    Ok(RunOutcome::Completed { leads: leads.len() })
                } else {
                    self.refused_outcome(job_id, leads.len()).await
                }
            }
            Ok(LoopEnd::Cancelled { processed }) => {
                tracing::info!("🛑 Import cancelled after {} leads", processed);
                Ok(RunOutcome::Cancelled { processed })
            }
            Err(e) => {
                let error = e.to_string();
                tracing::error!("Import failed: {}", error);
                self.store.fail(job_id, &error).await?;
                Ok(RunOutcome::Failed { error })
            }
        }
    }

    /// A record that cannot be decoded still gets claimed and failed, so pollers see
    /// a terminal status instead of a job stuck in `pending`.
    async fn fail_unreadable(&self, job_id: &str, e: AppError) -> Result<RunOutcome, AppError> {
        let error = e.to_string();
        tracing::error!("Job record cannot be read: {}", error);

        if !self.store.mark_running(job_id).await? {
            let status = self
                .store
                .get_status(job_id)
                .await?
                .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))?;
            return Ok(RunOutcome::Skipped { status });
        }

        self.store.fail(job_id, &error).await?;
        Ok(RunOutcome::Failed { error })
    }

    /// Outcome when `complete` was not applied: someone else made the job terminal.
    async fn refused_outcome(
        &self,
        job_id: &str,
        processed: usize,
    ) -> Result<RunOutcome, AppError> {
        match self.store.get_status(job_id).await? {
            Some(JobStatus::Cancelled) => {
                tracing::info!("Job was cancelled before results could be saved");
                Ok(RunOutcome::Cancelled { processed })
            }
            Some(status) => {
                tracing::warn!("Job became {} before results could be saved", status);
                Ok(RunOutcome::Skipped { status })
            }
            None => Err(AppError::JobNotFound(job_id.to_string())),
        }
    }

    async fn import(
        &self,
        job_id: &str,
        params: &JobParams,
        cancel: &CancellationToken,
    ) -> Result<LoopEnd, AppError> {
        let total = params.max_results;
        self.store
            .update_progress(job_id, Progress::new(0, total, JobPhase::Searching))
            .await?;

        let mut candidates = match self
            .places
            .search_places(&params.industry_query, &params.location)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!("Places search failed: {}", e);
                Vec::new()
            }
        };
        candidates.truncate(total as usize);

        let mut leads = Vec::with_capacity(candidates.len());

        for (index, candidate) in candidates.iter().enumerate() {
            let current = index as u32;

            if self.is_cancelled(job_id, cancel).await? {
                return Ok(LoopEnd::Cancelled {
                    processed: leads.len(),
                });
            }

            self.store
                .update_progress(
                    job_id,
                    Progress::new(current, total, JobPhase::LoadingDetails),
                )
                .await?;

            let Some(place_id) = candidate.id.as_deref() else {
                tracing::warn!("Skipping candidate {} without place id", index);
                continue;
            };

            let details = match self.places.get_place_details(place_id).await {
                Ok(details) => details,
                Err(e) => {
                    tracing::warn!(place_id = %place_id, "Skipping candidate: {}", e);
                    continue;
                }
            };

            let mut lead = build_lead(place_id, &details, &params.location);

            if params.wants_website_analysis() {
                if let Some(website) = lead.website.clone() {
                    self.store
                        .update_progress(
                            job_id,
                            Progress::new(current, total, JobPhase::AnalyzingWebsites),
                        )
                        .await?;
                    self.enrich(&mut lead, website, place_id).await;
                }
            }

            leads.push(lead);

            if !self.candidate_delay.is_zero() {
                tokio::time::sleep(self.candidate_delay).await;
            }
        }

        Ok(LoopEnd::Finished(leads))
    }

    /// Checks both the explicit token and the stored status. A fired token is
    /// written through to the store so pollers see it.
    async fn is_cancelled(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, AppError> {
        if cancel.is_cancelled() {
            self.store.cancel(job_id).await?;
            return Ok(true);
        }

        Ok(matches!(
            self.store.get_status(job_id).await?,
            Some(JobStatus::Cancelled)
        ))
    }

    /// Website analysis runs on its own task so a panic in the parser only costs
    /// this lead its enrichment.
    async fn enrich(&self, lead: &mut Lead, website: String, place_id: &str) {
        let analyzer = self.analyzer.clone();
        let task = tokio::spawn(
            async move { analyzer.analyze(&website).await }.in_current_span(),
        );

        match task.await {
            Ok(analysis) => apply_website_analysis(lead, analysis),
            Err(e) => {
                tracing::warn!(place_id = %place_id, "Website analysis aborted: {}", e);
            }
        }
    }
}

/// Assembles an unenriched lead from a place detail record.
pub fn build_lead(place_id: &str, details: &PlaceCandidate, fallback_city: &str) -> Lead {
    let address = parse_address(&details.address_components);
    let location = address
        .city
        .clone()
        .unwrap_or_else(|| fallback_city.to_string());

    Lead {
        id: place_id.to_string(),
        external_id: place_id.to_string(),
        company_name: details.display_name().to_string(),
        location,
        address,
        industry: map_industry(&details.types),
        phone: details.national_phone_number.clone(),
        website: details.website_uri.clone(),
        email: None,
        website_analysis: None,
        primary_contact: None,
        score: BASE_SCORE,
    }
}
