// Housekeeping - periodic booking completion, reminder repair and job purge

use crate::application::booking::BookingService;
use crate::application::reminder::ReminderOrchestrator;
use crate::application::worker::ShutdownToken;
use crate::error::Result;
use crate::port::{JobRepository, TimeProvider};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

/// Housekeeping configuration
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// How often a pass runs
    pub interval: Duration,

    /// Terminal jobs older than this are deleted (days)
    pub job_retention_days: i64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            job_retention_days: 7,
        }
    }
}

/// What one pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub bookings_completed: usize,
    pub reminders_rescheduled: usize,
    pub jobs_purged: u64,
}

/// Maintenance scheduler
///
/// Runs housekeeping in the background. Each step is independent; a
/// failing step is logged and the others still run.
pub struct MaintenanceScheduler {
    bookings: Arc<BookingService>,
    reminders: Arc<ReminderOrchestrator>,
    job_repo: Arc<dyn JobRepository>,
    time_provider: Arc<dyn TimeProvider>,
    config: MaintenanceConfig,
}

impl MaintenanceScheduler {
    pub fn new(
        bookings: Arc<BookingService>,
        reminders: Arc<ReminderOrchestrator>,
        job_repo: Arc<dyn JobRepository>,
        time_provider: Arc<dyn TimeProvider>,
        config: MaintenanceConfig,
    ) -> Self {
        Self {
            bookings,
            reminders,
            job_repo,
            time_provider,
            config,
        }
    }

    /// Run maintenance loop until shutdown (spawn it)
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            retention_days = self.config.job_retention_days,
            "Maintenance scheduler started"
        );

        let mut tick = interval(self.config.interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {},
                _ = shutdown.wait() => break,
            }

            let report = self.run_now().await;
            if report != MaintenanceReport::default() {
                info!(
                    bookings_completed = report.bookings_completed,
                    reminders_rescheduled = report.reminders_rescheduled,
                    jobs_purged = report.jobs_purged,
                    "Maintenance pass completed"
                );
            }
        }

        info!("Maintenance scheduler stopped");
    }

    /// Run one pass immediately
    pub async fn run_now(&self) -> MaintenanceReport {
        MaintenanceReport {
            bookings_completed: step("complete_elapsed", self.bookings.complete_elapsed().await),
            reminders_rescheduled: step("reconcile_reminders", self.reminders.reconcile().await),
            jobs_purged: step("purge_jobs", self.purge_finished_jobs().await),
        }
    }

    async fn purge_finished_jobs(&self) -> Result<u64> {
        let cutoff =
            self.time_provider.now() - chrono::Duration::days(self.config.job_retention_days);
        self.job_repo.purge_finished(cutoff).await
    }
}

fn step<T: Default>(name: &'static str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        error!(step = name, error = %e, "Maintenance step failed");
        T::default()
    })
}
