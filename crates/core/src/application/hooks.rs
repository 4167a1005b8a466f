// Post-commit booking lifecycle hooks
//
// Hooks run after a status change is durable. They may fail or time out
// without affecting the committed transition; failures are logged and
// repaired by the reminder reconciliation pass.

use crate::domain::Booking;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::application::worker::constants::DEFAULT_HOOK_TIMEOUT;

/// Observer of committed booking transitions
#[async_trait]
pub trait BookingLifecycleHook: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Booking moved PENDING -> CONFIRMED
    async fn on_confirmed(&self, booking: &Booking) -> Result<()>;

    /// Booking reached DECLINED, CANCELLED or COMPLETED
    async fn on_terminated(&self, booking: &Booking) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Confirmed,
    Terminated,
}

/// Ordered hook list with a per-hook time limit
#[derive(Clone)]
pub struct PostCommitHooks {
    hooks: Vec<Arc<dyn BookingLifecycleHook>>,
    timeout: Duration,
}

impl Default for PostCommitHooks {
    fn default() -> Self {
        Self::new(DEFAULT_HOOK_TIMEOUT)
    }
}

impl PostCommitHooks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            hooks: Vec::new(),
            timeout,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn BookingLifecycleHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Run every hook for `event` in registration order.
    ///
    /// Returns the names of hooks that failed or timed out. Callers are not
    /// expected to act on it; the transition has already committed.
    pub async fn dispatch(&self, event: LifecycleEvent, booking: &Booking) -> Vec<&'static str> {
        let mut failed = Vec::new();

        for hook in &self.hooks {
            let call = async {
                match event {
                    LifecycleEvent::Confirmed => hook.on_confirmed(booking).await,
                    LifecycleEvent::Terminated => hook.on_terminated(booking).await,
                }
            };

            match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(())) => {
                    debug!(hook = hook.name(), booking_id = %booking.id, ?event, "Hook completed");
                }
                Ok(Err(e)) => {
                    error!(
                        hook = hook.name(),
                        booking_id = %booking.id,
                        ?event,
                        error = %e,
                        "Post-commit hook failed"
                    );
                    failed.push(hook.name());
                }
                Err(_) => {
                    error!(
                        hook = hook.name(),
                        booking_id = %booking.id,
                        ?event,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Post-commit hook timed out"
                    );
                    failed.push(hook.name());
                }
            }
        }

        failed
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// How a `RecordingHook` behaves when called
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum HookBehavior {
        Succeed,
        Fail,
        Hang,
    }

    /// Records `(event, booking_id)` pairs
    pub struct RecordingHook {
        behavior: HookBehavior,
        events: Mutex<Vec<(LifecycleEvent, String)>>,
    }

    impl RecordingHook {
        pub fn new(behavior: HookBehavior) -> Self {
            Self {
                behavior,
                events: Mutex::new(Vec::new()),
            }
        }

        pub fn events(&self) -> Vec<(LifecycleEvent, String)> {
            self.events.lock().unwrap().clone()
        }

        async fn record(&self, event: LifecycleEvent, booking: &Booking) -> Result<()> {
            self.events.lock().unwrap().push((event, booking.id.clone()));
            match self.behavior {
                HookBehavior::Succeed => Ok(()),
                HookBehavior::Fail => Err(AppError::Internal("hook failure".into())),
                HookBehavior::Hang => {
                    std::future::pending::<()>().await;
                    Ok(())
                }
            }
        }
    }

    #[async_trait]
    impl BookingLifecycleHook for RecordingHook {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn on_confirmed(&self, booking: &Booking) -> Result<()> {
            self.record(LifecycleEvent::Confirmed, booking).await
        }

        async fn on_terminated(&self, booking: &Booking) -> Result<()> {
            self.record(LifecycleEvent::Terminated, booking).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::{HookBehavior, RecordingHook};
    use super::*;
    use crate::domain::{Interval, Listing};
    use chrono::{TimeZone, Utc};

    fn booking() -> Booking {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let listing = Listing {
            id: "l-1".into(),
            owner_id: "provider".into(),
            price_cents: 5000,
            is_active: true,
        };
        let start = now + chrono::Duration::days(1);
        let slot = Interval::new(start, start + chrono::Duration::hours(1)).unwrap();
        Booking::new("b-1", &listing, "creator", slot, now)
    }

    #[tokio::test]
    async fn test_failing_hook_does_not_stop_later_hooks() {
        let failing = Arc::new(RecordingHook::new(HookBehavior::Fail));
        let ok = Arc::new(RecordingHook::new(HookBehavior::Succeed));
        let hooks = PostCommitHooks::new(Duration::from_millis(100))
            .with_hook(failing.clone())
            .with_hook(ok.clone());

        let failed = hooks.dispatch(LifecycleEvent::Confirmed, &booking()).await;

        assert_eq!(failed, vec!["recording"]);
        assert_eq!(ok.events(), vec![(LifecycleEvent::Confirmed, "b-1".to_string())]);
    }

    #[tokio::test]
    async fn test_hanging_hook_is_cut_off_by_timeout() {
        let hanging = Arc::new(RecordingHook::new(HookBehavior::Hang));
        let hooks = PostCommitHooks::new(Duration::from_millis(50)).with_hook(hanging.clone());

        let failed = hooks.dispatch(LifecycleEvent::Terminated, &booking()).await;

        assert_eq!(failed.len(), 1);
        assert_eq!(hanging.events().len(), 1);
    }
}
