// Worker - polls the scheduler for due jobs

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::scheduler::JobScheduler;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

/// Drives `JobScheduler::run_due` until shutdown
pub struct SchedulerWorker {
    name: String,
    scheduler: Arc<JobScheduler>,
    poll_interval: Duration,
}

impl SchedulerWorker {
    pub fn new(name: impl Into<String>, scheduler: Arc<JobScheduler>) -> Self {
        Self {
            name: name.into(),
            scheduler,
            poll_interval: IDLE_SLEEP_DURATION,
        }
    }

    /// Sleep between polls when nothing was due
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run worker loop with graceful shutdown support.
    ///
    /// A batch already claimed is finished before the loop exits.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(worker = %self.name, "Worker started");
        loop {
            if shutdown.is_shutdown() {
                info!(worker = %self.name, "Worker shutting down");
                break;
            }
            match self.process_once().await {
                Ok(fired) => {
                    if fired == 0 {
                        // Nothing due, sleep briefly (or wait for shutdown)
                        tokio::select! {
                            _ = sleep(self.poll_interval) => {},
                            _ = shutdown.wait() => {
                                info!(worker = %self.name, "Worker interrupted during idle");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(worker = %self.name, error = %e, "Worker error");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!(worker = %self.name, "Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!(worker = %self.name, "Worker stopped");
        Ok(())
    }

    /// Fire one batch of due jobs; returns how many were claimed
    pub async fn process_once(&self) -> Result<usize> {
        self.scheduler.run_due().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::retry::RetryPolicy;
    use crate::application::scheduler::mocks::{Outcome, ScriptedHandler};
    use crate::application::scheduler::{HandlerRegistry, SchedulerConfig};
    use crate::domain::{JobKind, JobPayload, JobState};
    use crate::port::id_provider::mocks::SequentialIds;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::time_provider::mocks::ManualClock;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_worker_fires_due_job_and_stops_on_shutdown() {
        let start = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let handler = Arc::new(ScriptedHandler::new(vec![Outcome::Ok]));
        let scheduler = Arc::new(JobScheduler::new(
            Arc::new(InMemoryJobRepository::new()),
            HandlerRegistry::new().register(
                JobKind::Reminder1h,
                handler.clone(),
                RetryPolicy::default(),
            ),
            Arc::new(SequentialIds::new("job")),
            clock.clone(),
            SchedulerConfig::default(),
        ));
        let fire_at = start + chrono::Duration::minutes(1);
        scheduler
            .schedule(
                "b-1",
                JobKind::Reminder1h,
                fire_at,
                JobPayload::new(serde_json::json!({})),
            )
            .await
            .unwrap();
        clock.set(fire_at);

        let worker = SchedulerWorker::new("test", scheduler.clone())
            .with_poll_interval(Duration::from_millis(10));
        let (sender, token) = shutdown_channel();
        let task = tokio::spawn(async move { worker.run(token).await });

        for _ in 0..100 {
            if handler.calls().len() == 1 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        sender.shutdown();
        task.await.unwrap().unwrap();

        assert_eq!(handler.calls().len(), 1);
        let job = &scheduler.jobs_for("b-1").await.unwrap()[0];
        assert_eq!(job.state, JobState::Succeeded);
    }
}
