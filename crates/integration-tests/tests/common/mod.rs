//! Shared wiring for SQLite-backed scenarios

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use reservo_core::application::{
    BookingRequest, BookingService, HandlerRegistry, JobScheduler, PostCommitHooks,
    ReminderHandler, ReminderOrchestrator, RetryPolicy, SchedulerConfig,
};
use reservo_core::domain::{Booking, JobKind, Listing, UserIdentity};
use reservo_core::port::id_provider::UuidProvider;
use reservo_core::port::notification_sender::mocks::RecordingSender;
use reservo_core::port::time_provider::mocks::ManualClock;
use reservo_infra_sqlite::{
    create_pool, run_migrations, SqliteBookingRepository, SqliteDirectory, SqliteJobRepository,
};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const LISTING: &str = "listing-L";
pub const PROVIDER: &str = "provider-P";
pub const CREATOR: &str = "creator-C";
pub const CREATOR_EMAIL: &str = "c@example.com";

pub struct Harness {
    pub pool: SqlitePool,
    pub clock: Arc<ManualClock>,
    pub bookings: Arc<BookingService>,
    pub scheduler: Arc<JobScheduler>,
    pub reminders: Arc<ReminderOrchestrator>,
    pub booking_repo: Arc<SqliteBookingRepository>,
    pub job_repo: Arc<SqliteJobRepository>,
    pub sender: Arc<RecordingSender>,
    db_path: PathBuf,
}

pub fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

/// Fresh database file under the system temp dir
pub fn temp_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("reservo-it-{}.db", uuid::Uuid::new_v4()))
}

pub async fn open_pool(path: &PathBuf) -> SqlitePool {
    let pool = create_pool(&format!("sqlite://{}", path.display()))
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

impl Harness {
    pub async fn new(now: DateTime<Utc>) -> Self {
        Self::with_sender(now, RecordingSender::new()).await
    }

    pub async fn with_sender(now: DateTime<Utc>, sender: RecordingSender) -> Self {
        let db_path = temp_db_path();
        let pool = open_pool(&db_path).await;

        let directory = Arc::new(SqliteDirectory::new(pool.clone()));
        directory
            .upsert_listing(&Listing {
                id: LISTING.into(),
                owner_id: PROVIDER.into(),
                price_cents: 15_000,
                is_active: true,
            })
            .await
            .unwrap();
        for (id, email) in [(CREATOR, CREATOR_EMAIL), (PROVIDER, "p@example.com")] {
            directory
                .upsert_user(&UserIdentity {
                    id: id.into(),
                    email: email.into(),
                })
                .await
                .unwrap();
        }

        let clock = Arc::new(ManualClock::new(now));
        let booking_repo = Arc::new(SqliteBookingRepository::new(pool.clone()));
        let job_repo = Arc::new(SqliteJobRepository::new(pool.clone()));
        let sender = Arc::new(sender);

        let handler = Arc::new(ReminderHandler::new(
            booking_repo.clone(),
            directory.clone(),
            sender.clone(),
        ));
        let retry = RetryPolicy::new(60_000, 3);
        let registry = HandlerRegistry::new()
            .register(JobKind::Reminder24h, handler.clone(), retry)
            .register(JobKind::Reminder1h, handler, retry);

        let scheduler = Arc::new(JobScheduler::new(
            job_repo.clone(),
            registry,
            Arc::new(UuidProvider),
            clock.clone(),
            SchedulerConfig::default(),
        ));
        let reminders = Arc::new(ReminderOrchestrator::new(
            scheduler.clone(),
            booking_repo.clone(),
            clock.clone(),
        ));
        let bookings = Arc::new(BookingService::new(
            booking_repo.clone(),
            directory,
            Arc::new(UuidProvider),
            clock.clone(),
            PostCommitHooks::new(Duration::from_secs(2)).with_hook(reminders.clone()),
        ));

        Self {
            pool,
            clock,
            bookings,
            scheduler,
            reminders,
            booking_repo,
            job_repo,
            sender,
            db_path,
        }
    }

    pub async fn request(&self, start: &str, end: &str) -> reservo_core::Result<Booking> {
        self.bookings
            .request_booking(BookingRequest {
                listing_id: LISTING.into(),
                creator_id: CREATOR.into(),
                start_at: utc(start),
                end_at: utc(end),
            })
            .await
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.db_path.display(), suffix));
        }
    }
}
