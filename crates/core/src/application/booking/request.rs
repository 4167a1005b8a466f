// Request Booking Use Case

use crate::domain::{Booking, Interval};
use crate::error::{AppError, Result};
use crate::port::{BookingRepository, IdProvider, ListingDirectory, SlotClaim, TimeProvider};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Booking request as submitted by a creator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub listing_id: String,
    pub creator_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

/// Reject requests that can never succeed before touching storage
pub fn validate_request(req: &BookingRequest) -> Result<()> {
    if req.listing_id.trim().is_empty() {
        return Err(AppError::Validation("listing_id must not be empty".into()));
    }
    if req.creator_id.trim().is_empty() {
        return Err(AppError::Validation("creator_id must not be empty".into()));
    }
    Ok(())
}

/// Execute the request use case
///
/// # Arguments
///
/// * `bookings` - Interval store (atomic check-and-insert)
/// * `listings` - Listing lookup
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Clock (injected for determinism)
/// * `req` - Booking request
pub async fn execute(
    bookings: &dyn BookingRepository,
    listings: &dyn ListingDirectory,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    req: BookingRequest,
) -> Result<Booking> {
    validate_request(&req)?;

    // Storage keeps milliseconds; clip here so the overlap check and the
    // stored row see the same instants.
    let slot = Interval::new(req.start_at.trunc_subsecs(3), req.end_at.trunc_subsecs(3))?;
    let now = time_provider.now();
    if slot.start() <= now {
        return Err(AppError::Validation(format!(
            "slot must start in the future (start_at {})",
            slot.start()
        )));
    }

    let listing = listings
        .get_listing(&req.listing_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Listing {}", req.listing_id)))?;

    if !listing.is_active {
        return Err(AppError::Validation(format!(
            "listing {} is not accepting bookings",
            listing.id
        )));
    }
    if listing.owner_id == req.creator_id {
        return Err(AppError::Forbidden(
            "providers cannot book their own listing".into(),
        ));
    }

    let booking = Booking::new(id_provider.generate_id(), &listing, req.creator_id, slot, now);

    match bookings.insert_if_free(&booking).await? {
        SlotClaim::Inserted => {
            info!(
                booking_id = %booking.id,
                listing_id = %booking.listing_id,
                slot = %slot,
                "Booking requested"
            );
            Ok(booking)
        }
        SlotClaim::Conflict(existing) => {
            info!(
                listing_id = %booking.listing_id,
                slot = %slot,
                conflicting_booking_id = %existing.id,
                "Booking request rejected, slot taken"
            );
            Err(AppError::SlotConflict {
                conflicting_booking_id: existing.id,
                start: existing.start_at,
                end: existing.end_at,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(listing_id: &str, creator_id: &str) -> BookingRequest {
        let start = chrono::Utc::now() + chrono::Duration::days(1);
        BookingRequest {
            listing_id: listing_id.into(),
            creator_id: creator_id.into(),
            start_at: start,
            end_at: start + chrono::Duration::hours(1),
        }
    }

    #[test]
    fn test_validate_request_rejects_blank_ids() {
        assert!(validate_request(&request("l-1", "u-1")).is_ok());
        assert!(matches!(
            validate_request(&request("  ", "u-1")),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_request(&request("l-1", "")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_request_deserializes_rfc3339_instants() {
        let req: BookingRequest = serde_json::from_value(serde_json::json!({
            "listing_id": "l-1",
            "creator_id": "u-1",
            "start_at": "2025-06-01T10:00:00Z",
            "end_at": "2025-06-01T11:00:00Z"
        }))
        .unwrap();
        assert_eq!(req.end_at - req.start_at, chrono::Duration::hours(1));
    }

    mod execute {
        use super::super::*;
        use crate::domain::Listing;
        use crate::error::ErrorKind;
        use crate::port::booking_repository::mocks::InMemoryBookingRepository;
        use crate::port::directory::mocks::StaticDirectory;
        use crate::port::id_provider::mocks::SequentialIds;
        use crate::port::time_provider::mocks::ManualClock;
        use chrono::{Duration, TimeZone};

        struct Deps {
            bookings: InMemoryBookingRepository,
            directory: StaticDirectory,
            ids: SequentialIds,
            clock: ManualClock,
        }

        fn deps() -> Deps {
            Deps {
                bookings: InMemoryBookingRepository::new(),
                directory: StaticDirectory::new().with_listing(Listing {
                    id: "l".into(),
                    owner_id: "p".into(),
                    price_cents: 5000,
                    is_active: true,
                }),
                ids: SequentialIds::new("b"),
                clock: ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()),
            }
        }

        async fn run(d: &Deps, start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Result<Booking> {
            execute(
                &d.bookings,
                &d.directory,
                &d.ids,
                &d.clock,
                BookingRequest {
                    listing_id: "l".into(),
                    creator_id: "c".into(),
                    start_at,
                    end_at,
                },
            )
            .await
        }

        fn nine() -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
        }

        #[tokio::test]
        async fn test_sub_millisecond_instants_are_clipped() {
            let d = deps();
            let start = nine() + Duration::nanoseconds(1_500_700);
            let end = nine() + Duration::hours(1) + Duration::nanoseconds(999_999);

            let booking = run(&d, start, end).await.unwrap();
            assert_eq!(booking.start_at, nine() + Duration::milliseconds(1));
            assert_eq!(booking.end_at, nine() + Duration::hours(1));
        }

        #[tokio::test]
        async fn test_slot_shorter_than_a_millisecond_is_rejected() {
            let d = deps();
            let start = nine() + Duration::nanoseconds(100);
            let end = nine() + Duration::nanoseconds(900);

            let err = run(&d, start, end).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        #[tokio::test]
        async fn test_neighbours_overlapping_below_a_millisecond_become_adjacent() {
            let d = deps();
            let ten = nine() + Duration::hours(1);

            let first = run(&d, nine(), ten + Duration::microseconds(900)).await.unwrap();
            let second = run(&d, ten + Duration::microseconds(500), ten + Duration::hours(1))
                .await
                .unwrap();

            assert_eq!(first.end_at, second.start_at);
            assert!(!first
                .interval()
                .unwrap()
                .overlaps(&second.interval().unwrap()));
        }
    }
}
