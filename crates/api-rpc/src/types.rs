//! RPC Request/Response Types

use chrono::{DateTime, Utc};
use reservo_core::domain::Booking;
use reservo_core::port::QueueDepth;
use serde::{Deserialize, Serialize};

/// booking.request.v1 - Request a slot
#[derive(Debug, Deserialize)]
pub struct RequestBookingParams {
    pub listing_id: String,
    pub creator_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

/// booking.confirm.v1 / booking.decline.v1 / booking.cancel.v1
#[derive(Debug, Deserialize)]
pub struct BookingActionParams {
    pub booking_id: String,
    /// Authenticated caller
    pub acting_user_id: String,
}

/// booking.get.v1
#[derive(Debug, Deserialize)]
pub struct GetBookingParams {
    pub booking_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub booking: Booking,
}

/// admin.queue_depth.v1
#[derive(Debug, Default, Deserialize)]
pub struct QueueDepthParams {}

#[derive(Debug, Clone, Serialize)]
pub struct QueueDepthResponse {
    #[serde(flatten)]
    pub depth: QueueDepth,
    pub total: i64,
}

impl From<QueueDepth> for QueueDepthResponse {
    fn from(depth: QueueDepth) -> Self {
        let total = depth.scheduled
            + depth.retry_pending
            + depth.firing
            + depth.failed
            + depth.succeeded
            + depth.cancelled;
        Self { depth, total }
    }
}
