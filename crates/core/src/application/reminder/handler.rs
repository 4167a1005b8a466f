// Reminder job handler: one email to the booking creator

use crate::application::scheduler::JobHandler;
use crate::domain::{BookingStatus, ScheduledJob};
use crate::error::{AppError, Result};
use crate::port::{BookingRepository, EmailTemplate, IdentityProvider, NotificationSender};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Payload stored with every reminder job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPayload {
    pub booking_id: String,
}

/// Sends the reminder email for `REMINDER_24H` / `REMINDER_1H` jobs
pub struct ReminderHandler {
    bookings: Arc<dyn BookingRepository>,
    identities: Arc<dyn IdentityProvider>,
    sender: Arc<dyn NotificationSender>,
}

impl ReminderHandler {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        identities: Arc<dyn IdentityProvider>,
        sender: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            bookings,
            identities,
            sender,
        }
    }
}

#[async_trait]
impl JobHandler for ReminderHandler {
    async fn handle(&self, job: &ScheduledJob) -> Result<()> {
        let payload: ReminderPayload = job.payload.decode()?;

        let Some(booking) = self.bookings.find_by_id(&payload.booking_id).await? else {
            debug!(job_id = %job.id, booking_id = %payload.booking_id, "Booking gone, reminder skipped");
            return Ok(());
        };

        // Cancellation can race the claim; re-check instead of relying on it
        if booking.status != BookingStatus::Confirmed {
            debug!(
                job_id = %job.id,
                booking_id = %booking.id,
                status = %booking.status,
                "Booking no longer confirmed, reminder skipped"
            );
            return Ok(());
        }

        let creator = self
            .identities
            .find_user(&booking.creator_id)
            .await?
            .ok_or_else(|| {
                AppError::HandlerFailure(format!("no contact data for user {}", booking.creator_id))
            })?;

        let template = EmailTemplate::from(job.kind);
        let context = serde_json::json!({
            "booking_id": booking.id,
            "listing_id": booking.listing_id,
            "start_at": booking.start_at,
            "end_at": booking.end_at,
            "price_cents": booking.price_cents,
        });

        self.sender
            .send_email(&creator.email, template, &context, &job.idempotency_key())
            .await?;

        info!(
            job_id = %job.id,
            booking_id = %booking.id,
            template = %template,
            "Reminder sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Booking, Interval, JobKind, JobPayload, Listing};
    use crate::port::booking_repository::mocks::InMemoryBookingRepository;
    use crate::port::directory::mocks::StaticDirectory;
    use crate::port::notification_sender::{MockNotificationSender, NotificationError};
    use chrono::{Duration, TimeZone, Utc};
    use mockall::predicate::{always, eq};

    async fn confirmed_booking(repo: &InMemoryBookingRepository) -> Booking {
        let now = Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap();
        let listing = Listing {
            id: "l-1".into(),
            owner_id: "p".into(),
            price_cents: 4200,
            is_active: true,
        };
        let start = now + Duration::days(2);
        let slot = Interval::new(start, start + Duration::hours(1)).unwrap();
        let booking = Booking::new("b-1", &listing, "c", slot, now);
        repo.insert_if_free(&booking).await.unwrap();
        repo.transition_status("b-1", BookingStatus::Pending, BookingStatus::Confirmed, now)
            .await
            .unwrap()
            .unwrap()
    }

    fn job(kind: JobKind) -> ScheduledJob {
        let now = Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap();
        ScheduledJob::new(
            "job-1",
            "b-1",
            kind,
            now,
            JobPayload::new(serde_json::json!({ "booking_id": "b-1" })),
            3,
            now,
        )
    }

    #[tokio::test]
    async fn test_sends_template_with_booking_context_and_idempotency_key() {
        let repo = Arc::new(InMemoryBookingRepository::new());
        let booking = confirmed_booking(&repo).await;
        let directory = Arc::new(StaticDirectory::new().with_user("c", "c@example.com"));

        let mut sender = MockNotificationSender::new();
        sender
            .expect_send_email()
            .with(
                eq("c@example.com"),
                eq(EmailTemplate::SessionReminder1h),
                always(),
                eq("b-1:REMINDER_1H"),
            )
            .times(1)
            .returning(move |_, _, context, _| {
                assert_eq!(context["price_cents"], 4200);
                assert_eq!(context["listing_id"], "l-1");
                assert_eq!(
                    context["start_at"],
                    serde_json::to_value(booking.start_at).unwrap()
                );
                Ok(())
            });

        let handler = ReminderHandler::new(repo, directory, Arc::new(sender));
        handler.handle(&job(JobKind::Reminder1h)).await.unwrap();
    }

    #[tokio::test]
    async fn test_skips_when_booking_not_confirmed() {
        let repo = Arc::new(InMemoryBookingRepository::new());
        let booking = confirmed_booking(&repo).await;
        repo.transition_status(
            &booking.id,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            booking.updated_at,
        )
        .await
        .unwrap();
        let directory = Arc::new(StaticDirectory::new().with_user("c", "c@example.com"));

        let mut sender = MockNotificationSender::new();
        sender.expect_send_email().times(0);

        let handler = ReminderHandler::new(repo, directory, Arc::new(sender));
        handler.handle(&job(JobKind::Reminder24h)).await.unwrap();
    }

    #[tokio::test]
    async fn test_sender_failure_is_handler_failure() {
        let repo = Arc::new(InMemoryBookingRepository::new());
        confirmed_booking(&repo).await;
        let directory = Arc::new(StaticDirectory::new().with_user("c", "c@example.com"));

        let mut sender = MockNotificationSender::new();
        sender
            .expect_send_email()
            .returning(|_, _, _, _| Err(NotificationError::Transport("connection reset".into())));

        let handler = ReminderHandler::new(repo, directory, Arc::new(sender));
        let err = handler.handle(&job(JobKind::Reminder24h)).await.unwrap_err();
        assert!(matches!(err, AppError::Notification(_)));
    }

    #[tokio::test]
    async fn test_unknown_recipient_fails() {
        let repo = Arc::new(InMemoryBookingRepository::new());
        confirmed_booking(&repo).await;

        let mut sender = MockNotificationSender::new();
        sender.expect_send_email().times(0);

        let handler =
            ReminderHandler::new(repo, Arc::new(StaticDirectory::new()), Arc::new(sender));
        let err = handler.handle(&job(JobKind::Reminder24h)).await.unwrap_err();
        assert!(matches!(err, AppError::HandlerFailure(_)));
    }
}
