// Job Repository Port (durable delayed-job queue)

use crate::domain::{JobState, ScheduledJob};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of inserting a job keyed by `(correlation_id, kind)`
#[derive(Debug, Clone, PartialEq)]
pub enum JobInsert {
    Created(ScheduledJob),
    /// A job with the same key exists already (any state)
    Existing(ScheduledJob),
}

impl JobInsert {
    pub fn into_job(self) -> ScheduledJob {
        match self {
            JobInsert::Created(job) | JobInsert::Existing(job) => job,
        }
    }
}

/// Queue depth by state (monitoring read path)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    /// SCHEDULED, never attempted
    pub scheduled: i64,
    /// SCHEDULED after at least one failed attempt
    pub retry_pending: i64,
    pub firing: i64,
    pub failed: i64,
    pub succeeded: i64,
    pub cancelled: i64,
}

impl QueueDepth {
    pub fn add(&mut self, state: JobState, attempt: u32, count: i64) {
        match state {
            JobState::Scheduled if attempt > 0 => self.retry_pending += count,
            JobState::Scheduled => self.scheduled += count,
            JobState::Firing => self.firing += count,
            JobState::Failed => self.failed += count,
            JobState::Succeeded => self.succeeded += count,
            JobState::Cancelled => self.cancelled += count,
        }
    }
}

/// Repository interface for scheduled jobs.
///
/// Every state change is guarded by the expected current state so that
/// claim, cancel and completion never overwrite each other.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a job unless one with the same `(correlation_id, kind)` exists
    async fn insert_unique(&self, job: &ScheduledJob) -> Result<JobInsert>;

    /// Find job by ID
    async fn find_by_id(&self, id: &str) -> Result<Option<ScheduledJob>>;

    /// All jobs for a correlation id, ordered by fire time
    async fn find_by_correlation(&self, correlation_id: &str) -> Result<Vec<ScheduledJob>>;

    /// SCHEDULED -> CANCELLED for every job of `correlation_id`; returns rows changed
    async fn cancel_by_correlation(&self, correlation_id: &str, now: DateTime<Utc>)
        -> Result<u64>;

    /// Atomically move up to `limit` due SCHEDULED jobs to FIRING and return them
    async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<ScheduledJob>>;

    /// FIRING -> SUCCEEDED; false if the job was not FIRING
    async fn mark_succeeded(&self, id: &str, now: DateTime<Utc>) -> Result<bool>;

    /// FIRING -> SCHEDULED at `fire_at` with the failed attempt recorded
    async fn reschedule(
        &self,
        id: &str,
        attempt: u32,
        fire_at: DateTime<Utc>,
        error: &str,
    ) -> Result<bool>;

    /// FIRING -> FAILED (terminal)
    async fn mark_failed(
        &self,
        id: &str,
        attempt: u32,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// FIRING -> SCHEDULED for jobs claimed before `claimed_before` (crash recovery)
    async fn release_stale(&self, claimed_before: DateTime<Utc>) -> Result<Vec<ScheduledJob>>;

    /// Count jobs by state
    async fn queue_depth(&self) -> Result<QueueDepth>;

    /// Delete terminal jobs finished before `finished_before`
    async fn purge_finished(&self, finished_before: DateTime<Utc>) -> Result<u64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory job queue driven through the domain transitions
    #[derive(Default)]
    pub struct InMemoryJobRepository {
        jobs: Mutex<HashMap<String, ScheduledJob>>,
    }

    impl InMemoryJobRepository {
        pub fn new() -> Self {
            Self::default()
        }

        fn update<F>(&self, id: &str, f: F) -> Result<bool>
        where
            F: FnOnce(&mut ScheduledJob) -> crate::domain::error::Result<()>,
        {
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get_mut(id) {
                Some(job) => Ok(f(job).is_ok()),
                None => Ok(false),
            }
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn insert_unique(&self, job: &ScheduledJob) -> Result<JobInsert> {
            let mut jobs = self.jobs.lock().unwrap();
            if let Some(existing) = jobs
                .values()
                .find(|j| j.correlation_id == job.correlation_id && j.kind == job.kind)
            {
                return Ok(JobInsert::Existing(existing.clone()));
            }
            jobs.insert(job.id.clone(), job.clone());
            Ok(JobInsert::Created(job.clone()))
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<ScheduledJob>> {
            Ok(self.jobs.lock().unwrap().get(id).cloned())
        }

        async fn find_by_correlation(&self, correlation_id: &str) -> Result<Vec<ScheduledJob>> {
            let jobs = self.jobs.lock().unwrap();
            let mut found: Vec<_> = jobs
                .values()
                .filter(|j| j.correlation_id == correlation_id)
                .cloned()
                .collect();
            found.sort_by_key(|j| j.fire_at);
            Ok(found)
        }

        async fn cancel_by_correlation(
            &self,
            correlation_id: &str,
            now: DateTime<Utc>,
        ) -> Result<u64> {
            let mut jobs = self.jobs.lock().unwrap();
            let cancelled = jobs
                .values_mut()
                .filter(|j| j.correlation_id == correlation_id)
                .filter_map(|j| j.cancel(now).ok())
                .count();
            Ok(cancelled as u64)
        }

        async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<ScheduledJob>> {
            let mut jobs = self.jobs.lock().unwrap();
            let mut due: Vec<_> = jobs.values_mut().filter(|j| j.is_due(now)).collect();
            due.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then(a.id.cmp(&b.id)));

            let mut claimed = Vec::new();
            for job in due.into_iter().take(limit as usize) {
                job.claim(now)?;
                claimed.push(job.clone());
            }
            Ok(claimed)
        }

        async fn mark_succeeded(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
            self.update(id, |job| job.succeed(now))
        }

        async fn reschedule(
            &self,
            id: &str,
            attempt: u32,
            fire_at: DateTime<Utc>,
            error: &str,
        ) -> Result<bool> {
            self.update(id, |job| job.retry_at(attempt, fire_at, error))
        }

        async fn mark_failed(
            &self,
            id: &str,
            attempt: u32,
            error: &str,
            now: DateTime<Utc>,
        ) -> Result<bool> {
            self.update(id, |job| job.exhaust(attempt, error, now))
        }

        async fn release_stale(
            &self,
            claimed_before: DateTime<Utc>,
        ) -> Result<Vec<ScheduledJob>> {
            let mut jobs = self.jobs.lock().unwrap();
            let mut released = Vec::new();
            for job in jobs.values_mut() {
                let stale = job.state == JobState::Firing
                    && job.claimed_at.map_or(true, |at| at < claimed_before);
                if stale {
                    job.release()?;
                    released.push(job.clone());
                }
            }
            Ok(released)
        }

        async fn queue_depth(&self) -> Result<QueueDepth> {
            let jobs = self.jobs.lock().unwrap();
            let mut depth = QueueDepth::default();
            for job in jobs.values() {
                depth.add(job.state, job.attempt, 1);
            }
            Ok(depth)
        }

        async fn purge_finished(&self, finished_before: DateTime<Utc>) -> Result<u64> {
            let mut jobs = self.jobs.lock().unwrap();
            let before = jobs.len();
            jobs.retain(|_, j| {
                !(j.state.is_terminal() && j.finished_at.is_some_and(|at| at < finished_before))
            });
            Ok((before - jobs.len()) as u64)
        }
    }
}
