// Reservo Infrastructure - SQLite Adapter
// Implements: BookingRepository, JobRepository, ListingDirectory, IdentityProvider

mod booking_repository;
mod connection;
mod directory;
mod error;
mod job_repository;
mod migration;
mod time;

pub use booking_repository::SqliteBookingRepository;
pub use connection::create_pool;
pub use directory::SqliteDirectory;
pub use job_repository::SqliteJobRepository;
pub use migration::run_migrations;

// Note: sqlx::Error conversion is handled by `error::map_sqlx_error`
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
