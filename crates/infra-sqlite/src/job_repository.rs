// SQLite JobRepository Implementation

use crate::error::map_sqlx_error;
use crate::time::{from_millis, from_millis_opt, to_millis};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reservo_core::domain::{JobKind, JobPayload, JobState, ScheduledJob};
use reservo_core::error::{AppError, Result};
use reservo_core::port::{JobInsert, JobRepository, QueueDepth};
use sqlx::SqlitePool;

const JOB_COLUMNS: &str = "id, correlation_id, kind, state, fire_at, payload, attempt, \
                           max_attempts, last_error, created_at, claimed_at, finished_at";

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_by_key(&self, correlation_id: &str, kind: JobKind) -> Result<Option<ScheduledJob>> {
        let sql = format!(
            "SELECT {} FROM jobs WHERE correlation_id = ? AND kind = ?",
            JOB_COLUMNS
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(correlation_id)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert_unique(&self, job: &ScheduledJob) -> Result<JobInsert> {
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (
                id, correlation_id, kind, state, fire_at, payload,
                attempt, max_attempts, last_error, created_at, claimed_at, finished_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (correlation_id, kind) DO NOTHING
            "#,
        )
        .bind(&job.id)
        .bind(&job.correlation_id)
        .bind(job.kind.as_str())
        .bind(job.state.as_str())
        .bind(to_millis(job.fire_at))
        .bind(job.payload.as_value().to_string())
        .bind(job.attempt)
        .bind(job.max_attempts)
        .bind(&job.last_error)
        .bind(to_millis(job.created_at))
        .bind(job.claimed_at.map(to_millis))
        .bind(job.finished_at.map(to_millis))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 1 {
            return Ok(JobInsert::Created(job.clone()));
        }

        self.find_by_key(&job.correlation_id, job.kind)
            .await?
            .map(JobInsert::Existing)
            .ok_or_else(|| {
                AppError::Database(format!(
                    "Job {}:{} neither inserted nor found",
                    job.correlation_id, job.kind
                ))
            })
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ScheduledJob>> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS);
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn find_by_correlation(&self, correlation_id: &str) -> Result<Vec<ScheduledJob>> {
        let sql = format!(
            "SELECT {} FROM jobs WHERE correlation_id = ? ORDER BY fire_at ASC, id ASC",
            JOB_COLUMNS
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(correlation_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn cancel_by_correlation(
        &self,
        correlation_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE jobs SET state = ?, finished_at = ? WHERE correlation_id = ? AND state = ?",
        )
        .bind(JobState::Cancelled.as_str())
        .bind(to_millis(now))
        .bind(correlation_id)
        .bind(JobState::Scheduled.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<ScheduledJob>> {
        // One statement: a row can only move SCHEDULED -> FIRING once
        let sql = format!(
            r#"
            UPDATE jobs
            SET state = ?, claimed_at = ?
            WHERE id IN (
                SELECT id FROM jobs
                WHERE state = ? AND fire_at <= ?
                ORDER BY fire_at ASC, id ASC
                LIMIT ?
            )
            RETURNING {}
            "#,
            JOB_COLUMNS
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(JobState::Firing.as_str())
            .bind(to_millis(now))
            .bind(JobState::Scheduled.as_str())
            .bind(to_millis(now))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        // RETURNING order is unspecified
        let mut jobs = rows
            .into_iter()
            .map(JobRow::into_job)
            .collect::<Result<Vec<_>>>()?;
        jobs.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then(a.id.cmp(&b.id)));
        Ok(jobs)
    }

    async fn mark_succeeded(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let result =
            sqlx::query("UPDATE jobs SET state = ?, finished_at = ? WHERE id = ? AND state = ?")
                .bind(JobState::Succeeded.as_str())
                .bind(to_millis(now))
                .bind(id)
                .bind(JobState::Firing.as_str())
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn reschedule(
        &self,
        id: &str,
        attempt: u32,
        fire_at: DateTime<Utc>,
        error: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, attempt = ?, fire_at = ?, last_error = ?, claimed_at = NULL
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(JobState::Scheduled.as_str())
        .bind(attempt)
        .bind(to_millis(fire_at))
        .bind(error)
        .bind(id)
        .bind(JobState::Firing.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_failed(
        &self,
        id: &str,
        attempt: u32,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, attempt = ?, last_error = ?, finished_at = ?
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(JobState::Failed.as_str())
        .bind(attempt)
        .bind(error)
        .bind(to_millis(now))
        .bind(id)
        .bind(JobState::Firing.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_stale(&self, claimed_before: DateTime<Utc>) -> Result<Vec<ScheduledJob>> {
        let sql = format!(
            r#"
            UPDATE jobs
            SET state = ?, claimed_at = NULL
            WHERE state = ? AND (claimed_at IS NULL OR claimed_at < ?)
            RETURNING {}
            "#,
            JOB_COLUMNS
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(JobState::Scheduled.as_str())
            .bind(JobState::Firing.as_str())
            .bind(to_millis(claimed_before))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn queue_depth(&self) -> Result<QueueDepth> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT state, CASE WHEN attempt > 0 THEN 1 ELSE 0 END AS retried, COUNT(*)
            FROM jobs
            GROUP BY state, retried
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut depth = QueueDepth::default();
        for (state, retried, count) in rows {
            let state = state
                .parse::<JobState>()
                .map_err(|e| AppError::Database(format!("Corrupt job state: {}", e)))?;
            depth.add(state, retried as u32, count);
        }
        Ok(depth)
    }

    async fn purge_finished(&self, finished_before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM jobs WHERE state IN (?, ?, ?) AND finished_at IS NOT NULL AND finished_at < ?",
        )
        .bind(JobState::Succeeded.as_str())
        .bind(JobState::Failed.as_str())
        .bind(JobState::Cancelled.as_str())
        .bind(to_millis(finished_before))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    correlation_id: String,
    kind: String,
    state: String,
    fire_at: i64,
    payload: String,
    attempt: i64,
    max_attempts: i64,
    last_error: Option<String>,
    created_at: i64,
    claimed_at: Option<i64>,
    finished_at: Option<i64>,
}

impl JobRow {
    fn into_job(self) -> Result<ScheduledJob> {
        let corrupt = |what: &str, detail: String| {
            AppError::Database(format!("Corrupt job {} ({}): {}", self.id, what, detail))
        };

        let kind = self
            .kind
            .parse::<JobKind>()
            .map_err(|e| corrupt("kind", e.to_string()))?;
        let state = self
            .state
            .parse::<JobState>()
            .map_err(|e| corrupt("state", e.to_string()))?;
        let payload: serde_json::Value =
            serde_json::from_str(&self.payload).map_err(|e| corrupt("payload", e.to_string()))?;
        let attempt =
            u32::try_from(self.attempt).map_err(|e| corrupt("attempt", e.to_string()))?;
        let max_attempts = u32::try_from(self.max_attempts)
            .map_err(|e| corrupt("max_attempts", e.to_string()))?;

        Ok(ScheduledJob {
            kind,
            state,
            fire_at: from_millis(self.fire_at)?,
            payload: JobPayload::new(payload),
            attempt,
            max_attempts,
            created_at: from_millis(self.created_at)?,
            claimed_at: from_millis_opt(self.claimed_at)?,
            finished_at: from_millis_opt(self.finished_at)?,
            id: self.id,
            correlation_id: self.correlation_id,
            last_error: self.last_error,
        })
    }
}
