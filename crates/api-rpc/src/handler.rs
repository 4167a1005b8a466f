//! RPC Method Handlers
//!
//! Thin adapters from JSON-RPC params to the booking service and scheduler.

use crate::error::to_rpc_error;
use crate::types::{
    BookingActionParams, BookingResponse, GetBookingParams, QueueDepthParams, QueueDepthResponse,
    RequestBookingParams,
};
use jsonrpsee::types::ErrorObjectOwned;
use reservo_core::application::{BookingRequest, BookingService, JobScheduler};
use std::sync::Arc;
use tracing::info;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    bookings: Arc<BookingService>,
    scheduler: Arc<JobScheduler>,
}

impl RpcHandler {
    pub fn new(bookings: Arc<BookingService>, scheduler: Arc<JobScheduler>) -> Self {
        Self {
            bookings,
            scheduler,
        }
    }

    /// booking.request.v1
    pub async fn request_booking(
        &self,
        params: RequestBookingParams,
    ) -> Result<BookingResponse, ErrorObjectOwned> {
        let booking = self
            .bookings
            .request_booking(BookingRequest {
                listing_id: params.listing_id,
                creator_id: params.creator_id,
                start_at: params.start_at,
                end_at: params.end_at,
            })
            .await
            .map_err(to_rpc_error)?;

        info!(booking_id = %booking.id, listing_id = %booking.listing_id, "Booking requested");
        Ok(BookingResponse { booking })
    }

    /// booking.confirm.v1
    pub async fn confirm(
        &self,
        params: BookingActionParams,
    ) -> Result<BookingResponse, ErrorObjectOwned> {
        let booking = self
            .bookings
            .confirm(&params.booking_id, &params.acting_user_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(BookingResponse { booking })
    }

    /// booking.decline.v1
    pub async fn decline(
        &self,
        params: BookingActionParams,
    ) -> Result<BookingResponse, ErrorObjectOwned> {
        let booking = self
            .bookings
            .decline(&params.booking_id, &params.acting_user_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(BookingResponse { booking })
    }

    /// booking.cancel.v1
    pub async fn cancel(
        &self,
        params: BookingActionParams,
    ) -> Result<BookingResponse, ErrorObjectOwned> {
        let booking = self
            .bookings
            .cancel(&params.booking_id, &params.acting_user_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(BookingResponse { booking })
    }

    /// booking.get.v1
    pub async fn get(&self, params: GetBookingParams) -> Result<BookingResponse, ErrorObjectOwned> {
        let booking = self
            .bookings
            .get_booking(&params.booking_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(BookingResponse { booking })
    }

    /// admin.queue_depth.v1
    pub async fn queue_depth(
        &self,
        _params: QueueDepthParams,
    ) -> Result<QueueDepthResponse, ErrorObjectOwned> {
        let depth = self.scheduler.queue_depth().await.map_err(to_rpc_error)?;
        Ok(depth.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use reservo_core::application::{HandlerRegistry, PostCommitHooks, SchedulerConfig};
    use reservo_core::domain::{BookingStatus, Listing};
    use reservo_core::port::booking_repository::mocks::InMemoryBookingRepository;
    use reservo_core::port::directory::mocks::StaticDirectory;
    use reservo_core::port::id_provider::mocks::SequentialIds;
    use reservo_core::port::job_repository::mocks::InMemoryJobRepository;
    use reservo_core::port::time_provider::mocks::ManualClock;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    fn handler() -> RpcHandler {
        let clock = Arc::new(ManualClock::new(now()));
        let directory = Arc::new(StaticDirectory::new().with_listing(Listing {
            id: "L".into(),
            owner_id: "P".into(),
            price_cents: 12_000,
            is_active: true,
        }));
        let bookings = Arc::new(BookingService::new(
            Arc::new(InMemoryBookingRepository::new()),
            directory,
            Arc::new(SequentialIds::new("booking")),
            clock.clone(),
            PostCommitHooks::default(),
        ));
        let scheduler = Arc::new(JobScheduler::new(
            Arc::new(InMemoryJobRepository::new()),
            HandlerRegistry::new(),
            Arc::new(SequentialIds::new("job")),
            clock,
            SchedulerConfig::default(),
        ));
        RpcHandler::new(bookings, scheduler)
    }

    fn slot(offset_min: i64) -> RequestBookingParams {
        let start = Utc.with_ymd_and_hms(2025, 1, 10, 10, 0, 0).unwrap()
            + Duration::minutes(offset_min);
        RequestBookingParams {
            listing_id: "L".into(),
            creator_id: "C".into(),
            start_at: start,
            end_at: start + Duration::hours(1),
        }
    }

    fn action(booking_id: &str, user: &str) -> BookingActionParams {
        BookingActionParams {
            booking_id: booking_id.into(),
            acting_user_id: user.into(),
        }
    }

    #[tokio::test]
    async fn test_request_confirm_and_get() {
        let h = handler();

        let created = h.request_booking(slot(0)).await.unwrap().booking;
        assert_eq!(created.status, BookingStatus::Pending);

        let confirmed = h.confirm(action(&created.id, "P")).await.unwrap().booking;
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let fetched = h
            .get(GetBookingParams {
                booking_id: created.id.clone(),
            })
            .await
            .unwrap()
            .booking;
        assert_eq!(fetched, confirmed);
    }

    #[tokio::test]
    async fn test_overlap_maps_to_conflict_code() {
        let h = handler();
        h.request_booking(slot(0)).await.unwrap();

        let err = h.request_booking(slot(30)).await.unwrap_err();
        assert_eq!(err.code(), code::CONFLICT);
    }

    #[tokio::test]
    async fn test_decline_after_confirm_is_conflict() {
        let h = handler();
        let b = h.request_booking(slot(0)).await.unwrap().booking;
        h.confirm(action(&b.id, "P")).await.unwrap();

        let err = h.decline(action(&b.id, "P")).await.unwrap_err();
        assert_eq!(err.code(), code::CONFLICT);
    }

    #[tokio::test]
    async fn test_cancel_by_stranger_is_forbidden() {
        let h = handler();
        let b = h.request_booking(slot(0)).await.unwrap().booking;

        let err = h.cancel(action(&b.id, "X")).await.unwrap_err();
        assert_eq!(err.code(), code::FORBIDDEN);

        let cancelled = h.cancel(action(&b.id, "C")).await.unwrap().booking;
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_get_unknown_booking_is_not_found() {
        let h = handler();
        let err = h
            .get(GetBookingParams {
                booking_id: "missing".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_queue_depth_starts_empty() {
        let h = handler();
        let depth = h.queue_depth(QueueDepthParams::default()).await.unwrap();
        assert_eq!(depth.total, 0);
    }
}
