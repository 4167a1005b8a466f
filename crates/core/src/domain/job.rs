// Scheduled Job Domain Model

use super::error::{DomainError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Job ID (UUID v4)
pub type JobId = String;

/// Groups every job derived from one source entity (the booking id for reminders)
pub type CorrelationId = String;

/// Job kind. Each kind maps to exactly one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    #[serde(rename = "REMINDER_24H")]
    Reminder24h,
    #[serde(rename = "REMINDER_1H")]
    Reminder1h,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::Reminder24h, JobKind::Reminder1h];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Reminder24h => "REMINDER_24H",
            JobKind::Reminder1h => "REMINDER_1H",
        }
    }

    /// How long before the session start a reminder of this kind fires
    pub fn lead_time(&self) -> Duration {
        match self {
            JobKind::Reminder24h => Duration::hours(24),
            JobKind::Reminder1h => Duration::hours(1),
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "REMINDER_24H" => Ok(JobKind::Reminder24h),
            "REMINDER_1H" => Ok(JobKind::Reminder1h),
            other => Err(DomainError::ValidationError(format!("unknown job kind {other}"))),
        }
    }
}

/// Job State
///
/// ```text
/// SCHEDULED -> FIRING -> SUCCEEDED
///     |          |-----> SCHEDULED (retry, attempt += 1)
///     |          '-----> FAILED    (attempts exhausted)
///     '--> CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Scheduled,
    Firing,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Scheduled => "SCHEDULED",
            JobState::Firing => "FIRING",
            JobState::Succeeded => "SUCCEEDED",
            JobState::Failed => "FAILED",
            JobState::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SCHEDULED" => Ok(JobState::Scheduled),
            "FIRING" => Ok(JobState::Firing),
            "SUCCEEDED" => Ok(JobState::Succeeded),
            "FAILED" => Ok(JobState::Failed),
            "CANCELLED" => Ok(JobState::Cancelled),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Job Payload (JSON serializable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Decode the payload into a typed structure
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.0.clone())
    }
}

/// Scheduled Job Entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: JobId,
    pub correlation_id: CorrelationId,
    pub kind: JobKind,
    pub state: JobState,
    pub fire_at: DateTime<Utc>,
    pub payload: JobPayload,

    /// Failed attempts so far
    pub attempt: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScheduledJob {
    /// Create a new SCHEDULED job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `correlation_id` - Grouping key used by cancel
    /// * `kind` - Handler selector
    /// * `fire_at` - First firing instant
    /// * `payload` - Handler input
    /// * `max_attempts` - Retry budget, copied from the handler's retry policy
    /// * `created_at` - Creation timestamp (injected, not system time)
    pub fn new(
        id: impl Into<String>,
        correlation_id: impl Into<String>,
        kind: JobKind,
        fire_at: DateTime<Utc>,
        payload: JobPayload,
        max_attempts: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            correlation_id: correlation_id.into(),
            kind,
            state: JobState::Scheduled,
            fire_at,
            payload,
            attempt: 0,
            max_attempts,
            last_error: None,
            created_at,
            claimed_at: None,
            finished_at: None,
        }
    }

    /// Key shared by every delivery of this job, including re-fires after a crash
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.correlation_id, self.kind)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Scheduled && self.fire_at <= now
    }

    pub fn is_retry_pending(&self) -> bool {
        self.state == JobState::Scheduled && self.attempt > 0
    }

    /// SCHEDULED -> FIRING
    pub fn claim(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.guard(JobState::Scheduled, JobState::Firing)?;
        self.state = JobState::Firing;
        self.claimed_at = Some(now);
        Ok(())
    }

    /// FIRING -> SUCCEEDED
    pub fn succeed(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.guard(JobState::Firing, JobState::Succeeded)?;
        self.state = JobState::Succeeded;
        self.finished_at = Some(now);
        Ok(())
    }

    /// FIRING -> SCHEDULED with the failed attempt recorded
    pub fn retry_at(&mut self, attempt: u32, fire_at: DateTime<Utc>, error: &str) -> Result<()> {
        self.guard(JobState::Firing, JobState::Scheduled)?;
        self.state = JobState::Scheduled;
        self.attempt = attempt;
        self.fire_at = fire_at;
        self.claimed_at = None;
        self.last_error = Some(error.to_string());
        Ok(())
    }

    /// FIRING -> FAILED (terminal)
    pub fn exhaust(&mut self, attempt: u32, error: &str, now: DateTime<Utc>) -> Result<()> {
        self.guard(JobState::Firing, JobState::Failed)?;
        self.state = JobState::Failed;
        self.attempt = attempt;
        self.last_error = Some(error.to_string());
        self.finished_at = Some(now);
        Ok(())
    }

    /// FIRING -> SCHEDULED without consuming an attempt (crash recovery)
    pub fn release(&mut self) -> Result<()> {
        self.guard(JobState::Firing, JobState::Scheduled)?;
        self.state = JobState::Scheduled;
        self.claimed_at = None;
        Ok(())
    }

    /// SCHEDULED -> CANCELLED
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.guard(JobState::Scheduled, JobState::Cancelled)?;
        self.state = JobState::Cancelled;
        self.finished_at = Some(now);
        Ok(())
    }

    fn guard(&self, expected: JobState, to: JobState) -> Result<()> {
        if self.state != expected {
            return Err(DomainError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}
