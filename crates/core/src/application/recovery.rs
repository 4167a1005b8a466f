// Crash recovery: release jobs stranded in FIRING
use crate::port::{JobRepository, TimeProvider};
use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::worker::constants::DEFAULT_RECOVERY_WINDOW_MS;

/// Crash recovery service
///
/// On daemon startup, returns jobs that were FIRING when the previous
/// process died to SCHEDULED so they fire again (at-least-once).
pub struct RecoveryService {
    job_repo: Arc<dyn JobRepository>,
    time_provider: Arc<dyn TimeProvider>,
    recovery_window_ms: i64,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `job_repo` - Job repository
    /// * `time_provider` - Time provider
    /// * `recovery_window_ms` - Optional custom recovery window (default: 5 minutes)
    ///
    /// # Example
    /// ```ignore
    /// let recovery = RecoveryService::new(job_repo, time_provider, None);
    /// recovery.recover_orphaned_jobs().await?;
    /// ```
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        time_provider: Arc<dyn TimeProvider>,
        recovery_window_ms: Option<i64>,
    ) -> Self {
        Self {
            job_repo,
            time_provider,
            recovery_window_ms: recovery_window_ms.unwrap_or(DEFAULT_RECOVERY_WINDOW_MS),
        }
    }

    /// Release FIRING jobs claimed before `now - recovery_window`.
    ///
    /// The failed attempt count is left untouched: an interrupted run is
    /// not a handler failure.
    ///
    /// # Returns
    /// Number of jobs released
    pub async fn recover_orphaned_jobs(&self) -> crate::error::Result<usize> {
        let now = self.time_provider.now();
        let cutoff = now - Duration::milliseconds(self.recovery_window_ms);

        info!(
            cutoff = %cutoff,
            recovery_window_ms = self.recovery_window_ms,
            "Starting orphaned job recovery"
        );

        let released = self.job_repo.release_stale(cutoff).await?;
        for job in &released {
            warn!(
                job_id = %job.id,
                correlation_id = %job.correlation_id,
                kind = %job.kind,
                "Released orphaned job, it will fire again"
            );
        }

        info!(recovered_count = released.len(), "Orphaned job recovery complete");
        Ok(released.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobKind, JobPayload, JobState, ScheduledJob};
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::time_provider::mocks::ManualClock;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_releases_only_stale_firing_jobs() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let repo = Arc::new(InMemoryJobRepository::new());
        for (id, correlation) in [("a-old", "b-1"), ("b-fresh", "b-2")] {
            repo.insert_unique(&ScheduledJob::new(
                id,
                correlation,
                JobKind::Reminder1h,
                t0,
                JobPayload::new(serde_json::json!({})),
                3,
                t0,
            ))
            .await
            .unwrap();
        }

        // "a-old" claimed at t0, "b-fresh" 9 minutes later (claims go in id order)
        repo.claim_due(t0, 1).await.unwrap();
        repo.claim_due(t0 + Duration::minutes(9), 1).await.unwrap();

        let clock = Arc::new(ManualClock::new(t0 + Duration::minutes(10)));
        let recovery = RecoveryService::new(repo.clone(), clock, None);

        assert_eq!(recovery.recover_orphaned_jobs().await.unwrap(), 1);
        let old = repo.find_by_id("a-old").await.unwrap().unwrap();
        assert_eq!(old.state, JobState::Scheduled);
        assert_eq!(old.attempt, 0);
        let fresh = repo.find_by_id("b-fresh").await.unwrap().unwrap();
        assert_eq!(fresh.state, JobState::Firing);
    }
}
