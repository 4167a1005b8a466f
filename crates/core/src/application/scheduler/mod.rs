// Durable delayed-job scheduler
//
// Jobs are persisted through `JobRepository`; firing claims due rows
// atomically (SCHEDULED -> FIRING) so each claim is won by one instance.

mod registry;

pub use registry::{mocks, HandlerRegistry, JobHandler, Registration};

use crate::application::retry::RetryDecision;
use crate::application::worker::constants::{DEFAULT_CLAIM_BATCH_SIZE, DEFAULT_MIN_LEAD_MS};
use crate::domain::{CorrelationId, JobId, JobKind, JobPayload, ScheduledJob};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobInsert, JobRepository, QueueDepth, TimeProvider};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Scheduler tuning
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// `fire_at` must be later than `now + min_lead`
    pub min_lead_ms: i64,
    /// Due jobs claimed per `run_due`
    pub batch_size: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_lead_ms: DEFAULT_MIN_LEAD_MS,
            batch_size: DEFAULT_CLAIM_BATCH_SIZE,
        }
    }
}

/// Reference to a scheduled job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobHandle {
    pub job_id: JobId,
    pub correlation_id: CorrelationId,
    pub kind: JobKind,
    pub fire_at: DateTime<Utc>,
    /// false when an existing job with the same key was returned
    pub created: bool,
}

impl JobHandle {
    fn from_insert(insert: JobInsert) -> Self {
        let created = matches!(insert, JobInsert::Created(_));
        let job = insert.into_job();
        Self {
            job_id: job.id,
            correlation_id: job.correlation_id,
            kind: job.kind,
            fire_at: job.fire_at,
            created,
        }
    }
}

/// Delayed-job scheduler with per-kind handlers and exponential retry
pub struct JobScheduler {
    job_repo: Arc<dyn JobRepository>,
    registry: HandlerRegistry,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    config: SchedulerConfig,
}

impl JobScheduler {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        registry: HandlerRegistry,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            job_repo,
            registry,
            id_provider,
            time_provider,
            config,
        }
    }

    /// Persist a job to fire at `fire_at`.
    ///
    /// Idempotent on `(correlation_id, kind)`: when such a job exists in any
    /// state, its handle is returned and nothing is written.
    pub async fn schedule(
        &self,
        correlation_id: &str,
        kind: JobKind,
        fire_at: DateTime<Utc>,
        payload: JobPayload,
    ) -> Result<JobHandle> {
        let registration = self.registry.get(kind).ok_or_else(|| {
            AppError::Config(format!("No handler registered for job kind {}", kind))
        })?;

        let now = self.time_provider.now();
        let earliest = now + Duration::milliseconds(self.config.min_lead_ms);
        if fire_at <= earliest {
            return Err(AppError::TooLate {
                correlation_id: correlation_id.to_string(),
                kind,
                fire_at,
                earliest,
            });
        }

        let job = ScheduledJob::new(
            self.id_provider.generate_id(),
            correlation_id,
            kind,
            fire_at,
            payload,
            registration.retry.max_attempts(),
            now,
        );

        let handle = JobHandle::from_insert(self.job_repo.insert_unique(&job).await?);
        if handle.created {
            info!(
                job_id = %handle.job_id,
                correlation_id = %correlation_id,
                kind = %kind,
                fire_at = %handle.fire_at,
                "Job scheduled"
            );
        } else {
            debug!(
                job_id = %handle.job_id,
                correlation_id = %correlation_id,
                kind = %kind,
                "Job already scheduled, returning existing handle"
            );
        }
        Ok(handle)
    }

    /// Cancel every not-yet-fired job of `correlation_id` (retry-pending included).
    ///
    /// Returns the number of jobs cancelled; zero is not an error.
    pub async fn cancel(&self, correlation_id: &str) -> Result<u64> {
        let now = self.time_provider.now();
        let cancelled = self
            .job_repo
            .cancel_by_correlation(correlation_id, now)
            .await?;

        if cancelled > 0 {
            info!(correlation_id = %correlation_id, cancelled = cancelled, "Jobs cancelled");
        }
        Ok(cancelled)
    }

    /// Claim a batch of due jobs and fire them concurrently.
    ///
    /// Returns how many jobs were claimed. Handler failures never surface
    /// here; they are recorded on the job.
    pub async fn run_due(&self) -> Result<usize> {
        let now = self.time_provider.now();
        let claimed = self.job_repo.claim_due(now, self.config.batch_size).await?;
        if claimed.is_empty() {
            return Ok(0);
        }

        let count = claimed.len();
        debug!(claimed = count, "Firing due jobs");
        join_all(claimed.into_iter().map(|job| self.fire(job))).await;
        Ok(count)
    }

    pub async fn queue_depth(&self) -> Result<QueueDepth> {
        self.job_repo.queue_depth().await
    }

    /// Every job of `correlation_id`, ordered by fire time
    pub async fn jobs_for(&self, correlation_id: &str) -> Result<Vec<ScheduledJob>> {
        self.job_repo.find_by_correlation(correlation_id).await
    }

    /// Run one claimed job and record the outcome
    async fn fire(&self, job: ScheduledJob) {
        let Some(registration) = self.registry.get(job.kind) else {
            let reason = format!("No handler registered for job kind {}", job.kind);
            error!(job_id = %job.id, kind = %job.kind, "{}", reason);
            self.record_exhausted(&job, job.attempt + 1, &reason).await;
            return;
        };

        info!(
            job_id = %job.id,
            kind = %job.kind,
            attempt = job.attempt + 1,
            "Firing job"
        );

        // Spawned so a panicking handler surfaces as a JoinError
        let handler = Arc::clone(&registration.handler);
        let job_for_exec = job.clone();
        let outcome =
            tokio::task::spawn(async move { handler.handle(&job_for_exec).await }).await;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(join_err) if join_err.is_panic() => {
                error!(job_id = %job.id, "Job handler panicked: {:?}", join_err);
                Some(format!("handler panicked: {}", join_err))
            }
            Err(join_err) => Some(format!("handler task aborted: {}", join_err)),
        };

        let now = self.time_provider.now();
        match failure {
            None => match self.job_repo.mark_succeeded(&job.id, now).await {
                Ok(true) => info!(job_id = %job.id, "Job succeeded"),
                Ok(false) => warn!(job_id = %job.id, "Job left FIRING before success was recorded"),
                Err(e) => error!(job_id = %job.id, error = %e, "Failed to record job success"),
            },
            Some(reason) => match registration.retry.decide(&job, now) {
                RetryDecision::Retry { attempt, fire_at } => {
                    warn!(
                        job_id = %job.id,
                        attempt = attempt,
                        retry_at = %fire_at,
                        error = %reason,
                        "Job attempt failed, retry scheduled"
                    );
                    if let Err(e) = self
                        .job_repo
                        .reschedule(&job.id, attempt, fire_at, &reason)
                        .await
                    {
                        error!(job_id = %job.id, error = %e, "Failed to reschedule job");
                    }
                }
                RetryDecision::Exhausted { attempt } => {
                    self.record_exhausted(&job, attempt, &reason).await;
                }
            },
        }
    }

    async fn record_exhausted(&self, job: &ScheduledJob, attempt: u32, reason: &str) {
        let now = self.time_provider.now();
        let exhausted = AppError::JobExhausted {
            job_id: job.id.clone(),
            attempts: attempt,
            last_error: reason.to_string(),
        };
        error!(
            job_id = %job.id,
            correlation_id = %job.correlation_id,
            kind = %job.kind,
            error = %exhausted,
            "Job failed permanently"
        );
        if let Err(e) = self.job_repo.mark_failed(&job.id, attempt, reason, now).await {
            error!(job_id = %job.id, error = %e, "Failed to record job failure");
        }
    }
}
