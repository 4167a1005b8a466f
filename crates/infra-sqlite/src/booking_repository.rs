// SQLite BookingRepository Implementation

use crate::error::map_sqlx_error;
use crate::time::{from_millis, to_millis};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reservo_core::domain::{Booking, BookingStatus, DomainError, Interval};
use reservo_core::error::{AppError, Result};
use reservo_core::port::{BookingRepository, SlotClaim};
use sqlx::SqlitePool;
use tracing::debug;

/// A conflict seen by the insert can be gone by the time it is read back
/// (declined or cancelled in between); the insert is retried this many times.
const INSERT_MAX_ROUNDS: usize = 3;

const NON_BLOCKING: [BookingStatus; 3] = [
    BookingStatus::Declined,
    BookingStatus::Completed,
    BookingStatus::Cancelled,
];

const BOOKING_COLUMNS: &str = "id, listing_id, creator_id, provider_id, start_at, end_at, \
                               status, price_cents, created_at, updated_at";

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Single statement: the overlap check and the insert are one atomic write
    async fn try_insert(&self, booking: &Booking) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO bookings (
                id, listing_id, creator_id, provider_id, start_at, end_at,
                status, price_cents, created_at, updated_at
            )
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM bookings
                WHERE listing_id = ?
                  AND status IN (?, ?)
                  AND start_at < ?
                  AND ? < end_at
            )
            "#,
        )
        .bind(&booking.id)
        .bind(&booking.listing_id)
        .bind(&booking.creator_id)
        .bind(&booking.provider_id)
        .bind(to_millis(booking.start_at))
        .bind(to_millis(booking.end_at))
        .bind(booking.status.as_str())
        .bind(booking.price_cents)
        .bind(to_millis(booking.created_at))
        .bind(to_millis(booking.updated_at))
        .bind(&booking.listing_id)
        .bind(BookingStatus::Pending.as_str())
        .bind(BookingStatus::Confirmed.as_str())
        .bind(to_millis(booking.end_at))
        .bind(to_millis(booking.start_at))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_where(
        &self,
        filter: &str,
        status: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE status = ? AND {} ORDER BY start_at ASC, id ASC",
            BOOKING_COLUMNS, filter
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(status.as_str())
            .bind(to_millis(at))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(BookingRow::into_booking).collect()
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn insert_if_free(&self, booking: &Booking) -> Result<SlotClaim> {
        let slot = booking.interval()?;

        for _ in 0..INSERT_MAX_ROUNDS {
            if self.try_insert(booking).await? {
                return Ok(SlotClaim::Inserted);
            }

            if let Some(existing) = self
                .find_conflict(&booking.listing_id, &slot, &NON_BLOCKING)
                .await?
            {
                return Ok(SlotClaim::Conflict(existing));
            }

            debug!(
                booking_id = %booking.id,
                listing_id = %booking.listing_id,
                "Conflicting booking vanished, retrying insert"
            );
        }

        Err(AppError::Database(format!(
            "Could not settle slot for booking {} on listing {}",
            booking.id, booking.listing_id
        )))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = ?", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(BookingRow::into_booking).transpose()
    }

    async fn find_conflict(
        &self,
        listing_id: &str,
        slot: &Interval,
        exclude_statuses: &[BookingStatus],
    ) -> Result<Option<Booking>> {
        // Statuses are a closed enum, so they are inlined as literals
        let excluded = exclude_statuses
            .iter()
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let status_filter = if excluded.is_empty() {
            String::new()
        } else {
            format!("AND status NOT IN ({})", excluded)
        };

        let sql = format!(
            "SELECT {} FROM bookings \
             WHERE listing_id = ? AND start_at < ? AND ? < end_at {} \
             ORDER BY start_at ASC, id ASC LIMIT 1",
            BOOKING_COLUMNS, status_filter
        );

        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(listing_id)
            .bind(to_millis(slot.end()))
            .bind(to_millis(slot.start()))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(BookingRow::into_booking).transpose()
    }

    async fn transition_status(
        &self,
        id: &str,
        expected: BookingStatus,
        next: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>> {
        if !expected.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: expected.to_string(),
                to: next.to_string(),
            }
            .into());
        }

        let sql = format!(
            "UPDATE bookings SET status = ?, updated_at = ? \
             WHERE id = ? AND status = ? RETURNING {}",
            BOOKING_COLUMNS
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(next.as_str())
            .bind(to_millis(now))
            .bind(id)
            .bind(expected.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(BookingRow::into_booking).transpose()
    }

    async fn list_starting_after(
        &self,
        status: BookingStatus,
        after: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        self.list_where("start_at > ?", status, after).await
    }

    async fn list_ending_before(
        &self,
        status: BookingStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        self.list_where("end_at <= ?", status, before).await
    }

    async fn list_by_listing(&self, listing_id: &str) -> Result<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE listing_id = ? ORDER BY start_at ASC, id ASC",
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(listing_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(BookingRow::into_booking).collect()
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: String,
    listing_id: String,
    creator_id: String,
    provider_id: String,
    start_at: i64,
    end_at: i64,
    status: String,
    price_cents: i64,
    created_at: i64,
    updated_at: i64,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking> {
        let status = self
            .status
            .parse::<BookingStatus>()
            .map_err(|e| AppError::Database(format!("Corrupt booking {}: {}", self.id, e)))?;

        Ok(Booking {
            status,
            start_at: from_millis(self.start_at)?,
            end_at: from_millis(self.end_at)?,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
            id: self.id,
            listing_id: self.listing_id,
            creator_id: self.creator_id,
            provider_id: self.provider_id,
            price_cents: self.price_cents,
        })
    }
}
