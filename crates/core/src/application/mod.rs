// Application Layer - Use Cases and Business Logic

pub mod booking;
pub mod hooks;
pub mod maintenance;
pub mod recovery;
pub mod reminder;
pub mod retry;
pub mod scheduler;
pub mod worker;

// Re-exports
pub use booking::{BookingRequest, BookingService};
pub use hooks::{BookingLifecycleHook, LifecycleEvent, PostCommitHooks};
pub use maintenance::{MaintenanceConfig, MaintenanceReport, MaintenanceScheduler};
pub use recovery::RecoveryService;
pub use reminder::{ReminderHandler, ReminderOrchestrator, ReminderPayload};
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{HandlerRegistry, JobHandle, JobHandler, JobScheduler, SchedulerConfig};
pub use worker::{shutdown_channel, SchedulerWorker, ShutdownSender, ShutdownToken};
