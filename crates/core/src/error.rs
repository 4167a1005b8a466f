// Central Error Type for the Application

use crate::domain::{BookingId, BookingStatus, DomainError, JobId, JobKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Requested slot overlaps booking {conflicting_booking_id} [{start}, {end})")]
    SlotConflict {
        conflicting_booking_id: BookingId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Booking {booking_id} was already {current}")]
    InvalidState {
        booking_id: BookingId,
        current: BookingStatus,
    },

    #[error("Too late to schedule {kind} for {correlation_id}: {fire_at} is before {earliest}")]
    TooLate {
        correlation_id: String,
        kind: JobKind,
        fire_at: DateTime<Utc>,
        earliest: DateTime<Utc>,
    },

    #[error("Handler failure: {0}")]
    HandlerFailure(String),

    #[error("Job {job_id} exhausted after {attempts} attempts: {last_error}")]
    JobExhausted {
        job_id: JobId,
        attempts: u32,
        last_error: String,
    },

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable tag exposed to callers as `{kind, detail}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    SlotConflict,
    InvalidState,
    InvalidTransition,
    Forbidden,
    NotFound,
    TooLate,
    HandlerFailure,
    JobExhausted,
    Validation,
    Notification,
    Database,
    Config,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Domain(DomainError::InvalidTransition { .. }) => ErrorKind::InvalidTransition,
            AppError::Domain(_) | AppError::Validation(_) => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Forbidden(_) => ErrorKind::Forbidden,
            AppError::SlotConflict { .. } => ErrorKind::SlotConflict,
            AppError::InvalidState { .. } => ErrorKind::InvalidState,
            AppError::TooLate { .. } => ErrorKind::TooLate,
            AppError::HandlerFailure(_) => ErrorKind::HandlerFailure,
            AppError::JobExhausted { .. } => ErrorKind::JobExhausted,
            AppError::Notification(_) => ErrorKind::Notification,
            AppError::Database(_) => ErrorKind::Database,
            AppError::Serialization(_) => ErrorKind::Validation,
            AppError::Config(_) => ErrorKind::Config,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Caller-fixable errors; everything else is an operational failure
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::SlotConflict
                | ErrorKind::InvalidState
                | ErrorKind::InvalidTransition
                | ErrorKind::Forbidden
                | ErrorKind::NotFound
                | ErrorKind::Validation
        )
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_reads_as_already_handled() {
        let err = AppError::InvalidState {
            booking_id: "b-1".to_string(),
            current: BookingStatus::Confirmed,
        };
        assert_eq!(err.to_string(), "Booking b-1 was already CONFIRMED");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(err.is_client_error());
    }

    #[test]
    fn test_domain_transition_error_keeps_its_own_kind() {
        let err: AppError = DomainError::InvalidTransition {
            from: "DECLINED".to_string(),
            to: "CONFIRMED".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(
            serde_json::to_value(err.kind()).unwrap(),
            serde_json::json!("INVALID_TRANSITION")
        );
    }

    #[test]
    fn test_operational_errors_are_not_client_errors() {
        assert!(!AppError::Database("locked".into()).is_client_error());
        assert!(!AppError::HandlerFailure("smtp".into()).is_client_error());
    }
}
