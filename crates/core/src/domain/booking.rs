// Booking Domain Model

use super::error::{DomainError, Result};
use super::interval::Interval;
use super::listing::{Listing, ListingId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Booking ID (UUID v4)
pub type BookingId = String;

/// User ID (issued by the identity provider)
pub type UserId = String;

/// Booking lifecycle status.
///
/// Legal transitions:
///
/// ```text
/// PENDING   -> CONFIRMED | DECLINED | CANCELLED
/// CONFIRMED -> COMPLETED | CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Declined,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Statuses that hold a slot on the listing calendar
    pub const BLOCKING: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::Confirmed];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Declined => "DECLINED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn blocks_slot(&self) -> bool {
        Self::BLOCKING.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Declined | BookingStatus::Completed | BookingStatus::Cancelled
        )
    }

    /// The transition table. Every status change goes through here.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Declined)
                | (Pending, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "DECLINED" => Ok(BookingStatus::Declined),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Booking Entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub listing_id: ListingId,
    pub creator_id: UserId,
    /// Owner of the listing at request time
    pub provider_id: UserId,

    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: BookingStatus,

    /// Listing price snapshot, never updated after creation
    pub price_cents: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Create a new PENDING booking for `slot` on `listing`.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique booking ID (injected, not generated)
    /// * `listing` - Listing snapshot; provides owner and price
    /// * `creator_id` - Requesting user
    /// * `slot` - Requested interval
    /// * `now` - Creation timestamp (injected, not system time)
    pub fn new(
        id: impl Into<String>,
        listing: &Listing,
        creator_id: impl Into<String>,
        slot: Interval,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            listing_id: listing.id.clone(),
            creator_id: creator_id.into(),
            provider_id: listing.owner_id.clone(),
            start_at: slot.start(),
            end_at: slot.end(),
            status: BookingStatus::Pending,
            price_cents: listing.price_cents,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn interval(&self) -> Result<Interval> {
        Interval::new(self.start_at, self.end_at)
    }

    /// Apply a status change if the transition table allows it
    pub fn transition(&mut self, next: BookingStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Whether `user_id` is a party to this booking (creator or provider)
    pub fn is_party(&self, user_id: &str) -> bool {
        self.creator_id == user_id || self.provider_id == user_id
    }
}
