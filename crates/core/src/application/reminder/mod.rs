// Reminder Orchestrator - maps booking lifecycle to reminder jobs

mod handler;

pub use handler::{ReminderHandler, ReminderPayload};

use crate::application::hooks::BookingLifecycleHook;
use crate::application::scheduler::{JobHandle, JobScheduler};
use crate::domain::{Booking, BookingStatus, JobKind, JobPayload};
use crate::error::{AppError, Result};
use crate::port::{BookingRepository, TimeProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Schedules 24h/1h reminders on confirmation, cancels them on termination
pub struct ReminderOrchestrator {
    scheduler: Arc<JobScheduler>,
    bookings: Arc<dyn BookingRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl ReminderOrchestrator {
    pub fn new(
        scheduler: Arc<JobScheduler>,
        bookings: Arc<dyn BookingRepository>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            scheduler,
            bookings,
            time_provider,
        }
    }

    /// Schedule each reminder whose fire time is still ahead.
    ///
    /// Reminders already in the past, or too close to schedule, are skipped.
    /// Safe to call repeatedly: the scheduler dedupes on `(booking, kind)`.
    pub async fn on_confirmed(&self, booking: &Booking) -> Result<Vec<JobHandle>> {
        let now = self.time_provider.now();
        let payload = JobPayload::new(serde_json::to_value(ReminderPayload {
            booking_id: booking.id.clone(),
        })?);

        let mut handles = Vec::new();
        for kind in JobKind::ALL {
            let fire_at = booking.start_at - kind.lead_time();
            if fire_at <= now {
                debug!(booking_id = %booking.id, kind = %kind, "Reminder time already passed");
                continue;
            }

            match self
                .scheduler
                .schedule(&booking.id, kind, fire_at, payload.clone())
                .await
            {
                Ok(handle) => handles.push(handle),
                Err(AppError::TooLate { .. }) => {
                    debug!(booking_id = %booking.id, kind = %kind, "Reminder too close to schedule");
                }
                Err(e) => return Err(e),
            }
        }

        // A termination that committed while we were scheduling may have run
        // its cancel before our inserts landed; re-read and sweep.
        let still_confirmed = self
            .bookings
            .find_by_id(&booking.id)
            .await?
            .is_some_and(|current| current.status == BookingStatus::Confirmed);
        if !still_confirmed {
            let cancelled = self.scheduler.cancel(&booking.id).await?;
            info!(
                booking_id = %booking.id,
                cancelled = cancelled,
                "Booking no longer confirmed, dropped its reminders"
            );
            return Ok(Vec::new());
        }

        Ok(handles)
    }

    /// Cancel every pending reminder of the booking
    pub async fn on_terminated(&self, booking: &Booking) -> Result<u64> {
        self.scheduler.cancel(&booking.id).await
    }

    /// Re-schedule reminders for confirmed future bookings that lack them.
    ///
    /// Repairs misses left by a failed or timed-out post-commit hook.
    /// Returns the number of jobs created.
    pub async fn reconcile(&self) -> Result<usize> {
        let now = self.time_provider.now();
        let upcoming = self
            .bookings
            .list_starting_after(BookingStatus::Confirmed, now)
            .await?;

        let mut created = 0;
        for booking in &upcoming {
            match self.on_confirmed(booking).await {
                Ok(handles) => created += handles.iter().filter(|h| h.created).count(),
                Err(e) => {
                    warn!(booking_id = %booking.id, error = %e, "Reminder reconciliation failed");
                }
            }
        }

        if created > 0 {
            info!(
                created = created,
                checked = upcoming.len(),
                "Reconciled missing reminders"
            );
        }
        Ok(created)
    }
}

#[async_trait]
impl BookingLifecycleHook for ReminderOrchestrator {
    fn name(&self) -> &'static str {
        "reminders"
    }

    async fn on_confirmed(&self, booking: &Booking) -> Result<()> {
        ReminderOrchestrator::on_confirmed(self, booking).await?;
        Ok(())
    }

    async fn on_terminated(&self, booking: &Booking) -> Result<()> {
        ReminderOrchestrator::on_terminated(self, booking).await?;
        Ok(())
    }
}
