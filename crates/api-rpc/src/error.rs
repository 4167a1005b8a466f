//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error objects. The `data` member
//! carries the stable tag: `{kind, detail, conflicting_booking_id?}`.

use jsonrpsee::types::ErrorObjectOwned;
use reservo_core::error::{AppError, ErrorKind};
use serde::Serialize;
use tracing::error;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const FORBIDDEN: i32 = 4003;
    pub const TOO_LATE: i32 = 4004;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
    pub const DELIVERY_ERROR: i32 = 5002;
}

#[derive(Debug, Serialize)]
struct ErrorData {
    kind: ErrorKind,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    conflicting_booking_id: Option<String>,
}

fn code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Validation => code::VALIDATION_ERROR,
        ErrorKind::NotFound => code::NOT_FOUND,
        ErrorKind::SlotConflict | ErrorKind::InvalidState | ErrorKind::InvalidTransition => {
            code::CONFLICT
        }
        ErrorKind::Forbidden => code::FORBIDDEN,
        ErrorKind::TooLate => code::TOO_LATE,
        ErrorKind::Database => code::DB_ERROR,
        ErrorKind::Notification | ErrorKind::HandlerFailure | ErrorKind::JobExhausted => {
            code::DELIVERY_ERROR
        }
        ErrorKind::Config | ErrorKind::Internal => code::INTERNAL_ERROR,
    }
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let kind = err.kind();
    let detail = err.to_string();

    if !err.is_client_error() {
        error!(kind = ?kind, error = %detail, "RPC call failed");
    }

    let conflicting_booking_id = match err {
        AppError::SlotConflict {
            conflicting_booking_id,
            ..
        } => Some(conflicting_booking_id),
        _ => None,
    };

    ErrorObjectOwned::owned(
        code_for(kind),
        detail.clone(),
        Some(ErrorData {
            kind,
            detail,
            conflicting_booking_id,
        }),
    )
}
