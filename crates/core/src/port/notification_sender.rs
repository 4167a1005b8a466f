// Notification Sender Port (email delivery, external)

use crate::domain::JobKind;
use crate::error::AppError;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Email template selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmailTemplate {
    #[serde(rename = "SESSION_REMINDER_24H")]
    SessionReminder24h,
    #[serde(rename = "SESSION_REMINDER_1H")]
    SessionReminder1h,
}

impl EmailTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailTemplate::SessionReminder24h => "SESSION_REMINDER_24H",
            EmailTemplate::SessionReminder1h => "SESSION_REMINDER_1H",
        }
    }
}

impl From<JobKind> for EmailTemplate {
    fn from(kind: JobKind) -> Self {
        match kind {
            JobKind::Reminder24h => EmailTemplate::SessionReminder24h,
            JobKind::Reminder1h => EmailTemplate::SessionReminder1h,
        }
    }
}

impl std::fmt::Display for EmailTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rejected by mail provider ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        AppError::Notification(err.to_string())
    }
}

/// Email sender
///
/// Delivery is at-least-once: the same `idempotency_key` may arrive more than
/// once after a crash, and implementations should pass it on to the provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_email(
        &self,
        to: &str,
        template: EmailTemplate,
        context: &serde_json::Value,
        idempotency_key: &str,
    ) -> Result<(), NotificationError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// A delivered email as seen by `RecordingSender`
    #[derive(Debug, Clone, PartialEq)]
    pub struct SentEmail {
        pub to: String,
        pub template: EmailTemplate,
        pub context: serde_json::Value,
        pub idempotency_key: String,
    }

    /// Records every call; fails the first `failures` calls (or all of them)
    #[derive(Default)]
    pub struct RecordingSender {
        sent: Mutex<Vec<SentEmail>>,
        calls: Mutex<usize>,
        failures_left: Mutex<Option<usize>>,
    }

    impl RecordingSender {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the next `n` calls, then succeed
        pub fn failing_first(n: usize) -> Self {
            let sender = Self::default();
            *sender.failures_left.lock().unwrap() = Some(n);
            sender
        }

        /// Fail every call
        pub fn always_failing() -> Self {
            Self::failing_first(usize::MAX)
        }

        pub fn sent(&self) -> Vec<SentEmail> {
            self.sent.lock().unwrap().clone()
        }

        /// Number of send attempts, failed ones included
        pub fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl NotificationSender for RecordingSender {
        async fn send_email(
            &self,
            to: &str,
            template: EmailTemplate,
            context: &serde_json::Value,
            idempotency_key: &str,
        ) -> Result<(), NotificationError> {
            *self.calls.lock().unwrap() += 1;

            {
                let mut failures = self.failures_left.lock().unwrap();
                if let Some(left) = failures.as_mut() {
                    if *left > 0 {
                        *left = left.saturating_sub(1);
                        return Err(NotificationError::Transport("simulated outage".into()));
                    }
                }
            }

            self.sent.lock().unwrap().push(SentEmail {
                to: to.to_string(),
                template,
                context: context.clone(),
                idempotency_key: idempotency_key.to_string(),
            });
            Ok(())
        }
    }
}
