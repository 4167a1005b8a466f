// Port Layer - Interfaces for external dependencies

pub mod booking_repository;
pub mod directory;
pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod notification_sender;
pub mod time_provider;

// Re-exports
pub use booking_repository::{BookingRepository, SlotClaim};
pub use directory::{IdentityProvider, ListingDirectory};
pub use id_provider::IdProvider;
pub use job_repository::{JobInsert, JobRepository, QueueDepth};
pub use notification_sender::{EmailTemplate, NotificationError, NotificationSender};
pub use time_provider::TimeProvider;
