// Retry logic for failed job attempts
use crate::domain::ScheduledJob;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::application::worker::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Fire again at `fire_at`; `attempt` is the failed-attempt count to record
    Retry { attempt: u32, fire_at: DateTime<Utc> },
    /// Attempts exhausted, the job is failed for good
    Exhausted { attempt: u32 },
}

/// Exponential backoff policy
///
/// `backoff(attempt) = base_delay * 2^(attempt - 1)` where `attempt` counts
/// failed attempts (1 after the first failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay_ms: i64,
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `base_delay_ms` - Delay before the first retry
    /// * `max_attempts` - Total handler invocations allowed (at least 1)
    pub fn new(base_delay_ms: i64, max_attempts: u32) -> Self {
        Self {
            base_delay_ms: base_delay_ms.max(0),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30);
        Duration::milliseconds(self.base_delay_ms.saturating_mul(1i64 << exponent))
    }

    /// Decide what happens after the current attempt of `job` failed.
    ///
    /// Uses the job's own `max_attempts`, fixed when it was scheduled.
    pub fn decide(&self, job: &ScheduledJob, now: DateTime<Utc>) -> RetryDecision {
        let attempt = job.attempt + 1;

        if attempt >= job.max_attempts {
            warn!(
                job_id = %job.id,
                attempt = attempt,
                max_attempts = job.max_attempts,
                "Max attempts reached"
            );
            return RetryDecision::Exhausted { attempt };
        }

        let delay = self.backoff(attempt);
        let Some(fire_at) = now.checked_add_signed(delay) else {
            warn!(
                job_id = %job.id,
                attempt = attempt,
                delay_ms = delay.num_milliseconds(),
                "Retry time out of range, giving up"
            );
            return RetryDecision::Exhausted { attempt };
        };
        info!(
            job_id = %job.id,
            attempt = attempt,
            max_attempts = job.max_attempts,
            delay_ms = delay.num_milliseconds(),
            "Scheduling retry"
        );

        RetryDecision::Retry { attempt, fire_at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobKind, JobPayload};
    use chrono::TimeZone;

    fn job_with_attempts(attempt: u32) -> ScheduledJob {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut job = ScheduledJob::new(
            "job-1",
            "booking-1",
            JobKind::Reminder24h,
            now,
            JobPayload::new(serde_json::json!({})),
            3,
            now,
        );
        job.attempt = attempt;
        job
    }

    #[test]
    fn test_backoff_doubles_from_base() {
        let policy = RetryPolicy::new(1_000, 3);
        assert_eq!(policy.backoff(1), Duration::seconds(1));
        assert_eq!(policy.backoff(2), Duration::seconds(2));
        assert_eq!(policy.backoff(3), Duration::seconds(4));
        assert_eq!(policy.backoff(5), Duration::seconds(16));
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::new(i64::MAX / 2, 3);
        assert_eq!(policy.backoff(64).num_milliseconds(), i64::MAX);
    }

    #[test]
    fn test_decide_retries_until_budget_spent() {
        let policy = RetryPolicy::new(60_000, 3);
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();

        assert_eq!(
            policy.decide(&job_with_attempts(0), now),
            RetryDecision::Retry {
                attempt: 1,
                fire_at: now + Duration::seconds(60)
            }
        );
        assert_eq!(
            policy.decide(&job_with_attempts(1), now),
            RetryDecision::Retry {
                attempt: 2,
                fire_at: now + Duration::seconds(120)
            }
        );
        assert_eq!(
            policy.decide(&job_with_attempts(2), now),
            RetryDecision::Exhausted { attempt: 3 }
        );
    }

    #[test]
    fn test_retry_time_past_calendar_end_exhausts() {
        let policy = RetryPolicy::new(i64::MAX / 4, 5);
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let mut job = job_with_attempts(0);
        job.max_attempts = 5;

        assert_eq!(
            policy.decide(&job, now),
            RetryDecision::Exhausted { attempt: 1 }
        );
    }

    #[test]
    fn test_single_attempt_policy_never_retries() {
        let policy = RetryPolicy::new(1_000, 0);
        assert_eq!(policy.max_attempts(), 1);
        let mut job = job_with_attempts(0);
        job.max_attempts = policy.max_attempts();
        assert!(matches!(
            policy.decide(&job, job.created_at),
            RetryDecision::Exhausted { attempt: 1 }
        ));
    }
}
