// Booking Repository Port (Interval Store)

use crate::domain::{Booking, BookingStatus, Interval};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Outcome of an atomic check-and-insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotClaim {
    Inserted,
    /// A blocking booking already holds an overlapping slot
    Conflict(Booking),
}

/// Repository interface for booking persistence and overlap queries.
///
/// All status changes go through `transition_status`, which is a
/// compare-and-swap on the current status.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert `booking` unless a PENDING/CONFIRMED booking on the same listing
    /// overlaps its slot. Check and insert are one atomic unit.
    async fn insert_if_free(&self, booking: &Booking) -> Result<SlotClaim>;

    /// Find booking by ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>>;

    /// First booking on `listing_id` overlapping `slot` whose status is not in
    /// `exclude_statuses` (earliest start first)
    async fn find_conflict(
        &self,
        listing_id: &str,
        slot: &Interval,
        exclude_statuses: &[BookingStatus],
    ) -> Result<Option<Booking>>;

    /// Set status to `next` only if it is currently `expected`.
    ///
    /// Returns the updated booking, or `None` when the row is missing or its
    /// status no longer matches (another writer won).
    async fn transition_status(
        &self,
        id: &str,
        expected: BookingStatus,
        next: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>>;

    /// Bookings in `status` whose start is after `after` (reminder reconciliation)
    async fn list_starting_after(
        &self,
        status: BookingStatus,
        after: DateTime<Utc>,
    ) -> Result<Vec<Booking>>;

    /// Bookings in `status` whose end is at or before `before` (completion sweep)
    async fn list_ending_before(
        &self,
        status: BookingStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<Booking>>;

    /// All bookings of a listing ordered by start
    async fn list_by_listing(&self, listing_id: &str) -> Result<Vec<Booking>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory interval store. One mutex covers check and insert.
    #[derive(Default)]
    pub struct InMemoryBookingRepository {
        bookings: Mutex<HashMap<String, Booking>>,
    }

    impl InMemoryBookingRepository {
        pub fn new() -> Self {
            Self::default()
        }

        fn overlapping(
            bookings: &HashMap<String, Booking>,
            listing_id: &str,
            slot: &Interval,
            participates: impl Fn(BookingStatus) -> bool,
        ) -> Option<Booking> {
            bookings
                .values()
                .filter(|b| b.listing_id == listing_id && participates(b.status))
                .filter(|b| b.start_at < slot.end() && slot.start() < b.end_at)
                .min_by_key(|b| b.start_at)
                .cloned()
        }

        fn sorted(mut bookings: Vec<Booking>) -> Vec<Booking> {
            bookings.sort_by(|a, b| a.start_at.cmp(&b.start_at).then(a.id.cmp(&b.id)));
            bookings
        }
    }

    #[async_trait]
    impl BookingRepository for InMemoryBookingRepository {
        async fn insert_if_free(&self, booking: &Booking) -> Result<SlotClaim> {
            let slot = booking.interval()?;
            let mut bookings = self.bookings.lock().unwrap();
            if let Some(existing) =
                Self::overlapping(&bookings, &booking.listing_id, &slot, |s| s.blocks_slot())
            {
                return Ok(SlotClaim::Conflict(existing));
            }
            bookings.insert(booking.id.clone(), booking.clone());
            Ok(SlotClaim::Inserted)
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<Booking>> {
            Ok(self.bookings.lock().unwrap().get(id).cloned())
        }

        async fn find_conflict(
            &self,
            listing_id: &str,
            slot: &Interval,
            exclude_statuses: &[BookingStatus],
        ) -> Result<Option<Booking>> {
            let bookings = self.bookings.lock().unwrap();
            Ok(Self::overlapping(&bookings, listing_id, slot, |s| {
                !exclude_statuses.contains(&s)
            }))
        }

        async fn transition_status(
            &self,
            id: &str,
            expected: BookingStatus,
            next: BookingStatus,
            now: DateTime<Utc>,
        ) -> Result<Option<Booking>> {
            let mut bookings = self.bookings.lock().unwrap();
            match bookings.get_mut(id) {
                Some(booking) if booking.status == expected => {
                    booking.transition(next, now)?;
                    Ok(Some(booking.clone()))
                }
                _ => Ok(None),
            }
        }

        async fn list_starting_after(
            &self,
            status: BookingStatus,
            after: DateTime<Utc>,
        ) -> Result<Vec<Booking>> {
            let bookings = self.bookings.lock().unwrap();
            Ok(Self::sorted(
                bookings
                    .values()
                    .filter(|b| b.status == status && b.start_at > after)
                    .cloned()
                    .collect(),
            ))
        }

        async fn list_ending_before(
            &self,
            status: BookingStatus,
            before: DateTime<Utc>,
        ) -> Result<Vec<Booking>> {
            let bookings = self.bookings.lock().unwrap();
            Ok(Self::sorted(
                bookings
                    .values()
                    .filter(|b| b.status == status && b.end_at <= before)
                    .cloned()
                    .collect(),
            ))
        }

        async fn list_by_listing(&self, listing_id: &str) -> Result<Vec<Booking>> {
            let bookings = self.bookings.lock().unwrap();
            Ok(Self::sorted(
                bookings
                    .values()
                    .filter(|b| b.listing_id == listing_id)
                    .cloned()
                    .collect(),
            ))
        }
    }
}
