// Booking Service - request, decision and termination use cases

pub mod request;

pub use request::BookingRequest;

use crate::application::hooks::{LifecycleEvent, PostCommitHooks};
use crate::domain::{Booking, BookingStatus};
use crate::error::{AppError, Result};
use crate::port::{BookingRepository, IdProvider, ListingDirectory, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

/// Bounded re-reads when a cancel races another writer
const CANCEL_MAX_ROUNDS: usize = 3;

/// Booking lifecycle service.
///
/// Status changes are compare-and-swap writes; post-commit hooks run only
/// after a write succeeded and never change its outcome.
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    listings: Arc<dyn ListingDirectory>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    hooks: PostCommitHooks,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        listings: Arc<dyn ListingDirectory>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        hooks: PostCommitHooks,
    ) -> Self {
        Self {
            bookings,
            listings,
            id_provider,
            time_provider,
            hooks,
        }
    }

    /// Create a PENDING booking if the slot is free
    pub async fn request_booking(&self, req: BookingRequest) -> Result<Booking> {
        request::execute(
            self.bookings.as_ref(),
            self.listings.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            req,
        )
        .await
    }

    /// Provider accepts a PENDING booking
    pub async fn confirm(&self, booking_id: &str, acting_user_id: &str) -> Result<Booking> {
        self.decide(booking_id, acting_user_id, BookingStatus::Confirmed)
            .await
    }

    /// Provider rejects a PENDING booking; the slot is released
    pub async fn decline(&self, booking_id: &str, acting_user_id: &str) -> Result<Booking> {
        self.decide(booking_id, acting_user_id, BookingStatus::Declined)
            .await
    }

    /// Either party withdraws a PENDING or CONFIRMED booking
    pub async fn cancel(&self, booking_id: &str, acting_user_id: &str) -> Result<Booking> {
        let mut booking = self.load(booking_id).await?;
        if !booking.is_party(acting_user_id) {
            return Err(AppError::Forbidden(format!(
                "user {} is not a party to booking {}",
                acting_user_id, booking_id
            )));
        }

        for _ in 0..CANCEL_MAX_ROUNDS {
            if !booking.status.can_transition_to(BookingStatus::Cancelled) {
                return Err(AppError::InvalidState {
                    booking_id: booking.id,
                    current: booking.status,
                });
            }

            let now = self.time_provider.now();
            if let Some(updated) = self
                .bookings
                .transition_status(booking_id, booking.status, BookingStatus::Cancelled, now)
                .await?
            {
                info!(
                    booking_id = %updated.id,
                    from = %booking.status,
                    acting_user_id = %acting_user_id,
                    "Booking cancelled"
                );
                self.hooks
                    .dispatch(LifecycleEvent::Terminated, &updated)
                    .await;
                return Ok(updated);
            }

            // Lost the race (e.g. confirmed meanwhile); look again
            booking = self.load(booking_id).await?;
        }

        warn!(booking_id = %booking_id, "Cancel kept losing to concurrent writers");
        Err(AppError::InvalidState {
            booking_id: booking.id,
            current: booking.status,
        })
    }

    /// Move every CONFIRMED booking whose end has passed to COMPLETED.
    ///
    /// Returns the number of bookings completed by this call.
    pub async fn complete_elapsed(&self) -> Result<usize> {
        let now = self.time_provider.now();
        let elapsed = self
            .bookings
            .list_ending_before(BookingStatus::Confirmed, now)
            .await?;

        let mut completed = 0;
        for booking in elapsed {
            if let Some(updated) = self
                .bookings
                .transition_status(
                    &booking.id,
                    BookingStatus::Confirmed,
                    BookingStatus::Completed,
                    now,
                )
                .await?
            {
                info!(booking_id = %updated.id, "Booking completed");
                self.hooks
                    .dispatch(LifecycleEvent::Terminated, &updated)
                    .await;
                completed += 1;
            }
        }
        Ok(completed)
    }

    pub async fn get_booking(&self, booking_id: &str) -> Result<Booking> {
        self.load(booking_id).await
    }

    /// Confirm or decline: listing owner only, PENDING only
    async fn decide(
        &self,
        booking_id: &str,
        acting_user_id: &str,
        next: BookingStatus,
    ) -> Result<Booking> {
        let booking = self.load(booking_id).await?;

        // Current owner when the listing is still known, else the owner at request time
        let owner_id = match self.listings.get_listing(&booking.listing_id).await? {
            Some(listing) => listing.owner_id,
            None => booking.provider_id.clone(),
        };
        if owner_id != acting_user_id {
            return Err(AppError::Forbidden(format!(
                "only the listing owner may {} booking {}",
                verb(next),
                booking_id
            )));
        }

        if booking.status != BookingStatus::Pending {
            return Err(AppError::InvalidState {
                booking_id: booking.id,
                current: booking.status,
            });
        }

        let now = self.time_provider.now();
        let Some(updated) = self
            .bookings
            .transition_status(booking_id, BookingStatus::Pending, next, now)
            .await?
        else {
            let current = self.load(booking_id).await?;
            return Err(AppError::InvalidState {
                booking_id: current.id,
                current: current.status,
            });
        };

        info!(
            booking_id = %updated.id,
            status = %updated.status,
            acting_user_id = %acting_user_id,
            "Booking decided"
        );

        let event = if next == BookingStatus::Confirmed {
            LifecycleEvent::Confirmed
        } else {
            LifecycleEvent::Terminated
        };
        self.hooks.dispatch(event, &updated).await;

        Ok(updated)
    }

    async fn load(&self, booking_id: &str) -> Result<Booking> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {}", booking_id)))
    }
}

fn verb(next: BookingStatus) -> &'static str {
    match next {
        BookingStatus::Confirmed => "confirm",
        BookingStatus::Declined => "decline",
        _ => "change",
    }
}
