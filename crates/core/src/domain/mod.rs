// Domain Layer - Pure business logic and entities

pub mod booking;
pub mod error;
pub mod interval;
pub mod job;
pub mod listing;

// Re-exports
pub use booking::{Booking, BookingId, BookingStatus, UserId};
pub use error::DomainError;
pub use interval::Interval;
pub use job::{CorrelationId, JobId, JobKind, JobPayload, JobState, ScheduledJob};
pub use listing::{Listing, ListingId, UserIdentity};
