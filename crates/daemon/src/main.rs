//! Reservo - Main Entry Point
//!
//! Composition root: settings, logging, storage, scheduler, booking
//! service, background workers and the JSON-RPC server.

mod settings;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use reservo_api_rpc::{RpcServer, RpcServerConfig};
use reservo_core::application::{
    shutdown_channel, BookingService, HandlerRegistry, JobScheduler, MaintenanceConfig,
    MaintenanceScheduler, PostCommitHooks, RecoveryService, ReminderHandler,
    ReminderOrchestrator, RetryPolicy, SchedulerConfig, SchedulerWorker,
};
use reservo_core::domain::JobKind;
use reservo_core::port::id_provider::UuidProvider;
use reservo_core::port::time_provider::SystemTimeProvider;
use reservo_core::port::NotificationSender;
use reservo_infra_mail::{HttpMailConfig, HttpMailSender, LogMailSender};
use reservo_infra_sqlite::{
    create_pool, run_migrations, SqliteBookingRepository, SqliteDirectory, SqliteJobRepository,
};

use crate::settings::{Cli, MailSettings, Settings};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Settings and logging
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    let _log_guard = logging::init(&settings.log)?;

    info!(version = VERSION, "Reservo starting...");

    // 2. Database
    let db_url = settings.database.expanded_url();
    if let Some(dir) = settings.database.file_parent() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
    }
    info!(db_url = %db_url, "Initializing database...");

    let pool = create_pool(&db_url)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 3. Adapters
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let booking_repo = Arc::new(SqliteBookingRepository::new(pool.clone()));
    let job_repo = Arc::new(SqliteJobRepository::new(pool.clone()));
    let directory = Arc::new(SqliteDirectory::new(pool.clone()));
    let sender = build_sender(&settings.mail)?;

    // 4. Scheduler with reminder handlers
    let sched = &settings.scheduler;
    let reminder_retry = RetryPolicy::new(
        sched.reminder_base_delay_secs.saturating_mul(1000),
        sched.max_attempts,
    );
    let reminder_handler = Arc::new(ReminderHandler::new(
        booking_repo.clone(),
        directory.clone(),
        sender,
    ));
    let registry = HandlerRegistry::new()
        .register(JobKind::Reminder24h, reminder_handler.clone(), reminder_retry)
        .register(JobKind::Reminder1h, reminder_handler, reminder_retry);

    let scheduler = Arc::new(JobScheduler::new(
        job_repo.clone(),
        registry,
        id_provider.clone(),
        time_provider.clone(),
        SchedulerConfig {
            min_lead_ms: sched.min_lead_secs * 1000,
            batch_size: sched.batch_size,
        },
    ));

    // 5. Booking service with the reminder hook
    let reminders = Arc::new(ReminderOrchestrator::new(
        scheduler.clone(),
        booking_repo.clone(),
        time_provider.clone(),
    ));
    let hooks = PostCommitHooks::new(Duration::from_millis(settings.booking.hook_timeout_ms))
        .with_hook(reminders.clone());
    let bookings = Arc::new(BookingService::new(
        booking_repo,
        directory,
        id_provider,
        time_provider.clone(),
        hooks,
    ));

    // 6. Crash recovery (before any worker claims)
    info!("Running crash recovery...");
    let recovery = RecoveryService::new(
        job_repo.clone(),
        time_provider.clone(),
        Some(sched.recovery_window_secs * 1000),
    );
    match recovery.recover_orphaned_jobs().await {
        Ok(count) => info!(recovered_jobs = count, "Crash recovery completed"),
        Err(e) => error!(error = %e, "Crash recovery failed"),
    }

    // 7. Workers
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let mut worker_handles = Vec::with_capacity(sched.workers);
    for n in 0..sched.workers {
        let worker = SchedulerWorker::new(format!("worker-{}", n), scheduler.clone())
            .with_poll_interval(sched.poll_interval());
        let token = shutdown_rx.clone();
        worker_handles.push(tokio::spawn(async move {
            if let Err(e) = worker.run(token).await {
                error!(error = %e, "Worker failed");
            }
        }));
    }
    info!(workers = sched.workers, "Workers started");

    // 8. Housekeeping
    let maintenance = MaintenanceScheduler::new(
        bookings.clone(),
        reminders,
        job_repo,
        time_provider,
        MaintenanceConfig {
            interval: Duration::from_secs(settings.housekeeping.interval_secs),
            job_retention_days: settings.housekeeping.job_retention_days,
        },
    );
    let maintenance_handle = tokio::spawn(maintenance.run(shutdown_rx));

    // 9. JSON-RPC server
    let rpc_config = RpcServerConfig {
        host: settings.rpc.host.clone(),
        port: settings.rpc.port,
    };
    let (rpc_addr, rpc_handle) = RpcServer::new(rpc_config, bookings, scheduler)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(rpc_addr = %rpc_addr, "System ready. Press Ctrl+C to shutdown");

    // 10. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 11. Graceful shutdown
    shutdown_tx.shutdown();
    if let Err(e) = rpc_handle.stop() {
        warn!(error = %e, "RPC server was already stopped");
    }

    let drain = async {
        for handle in worker_handles {
            let _ = handle.await;
        }
        let _ = maintenance_handle.await;
        rpc_handle.stopped().await;
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "Workers did not stop in time"
        );
    }

    pool.close().await;
    info!("Shutdown complete.");
    Ok(())
}

fn build_sender(mail: &MailSettings) -> Result<Arc<dyn NotificationSender>> {
    match &mail.endpoint {
        Some(endpoint) => {
            let sender = HttpMailSender::new(HttpMailConfig {
                endpoint: endpoint.clone(),
                api_key: mail.api_key.clone(),
                from: mail.from.clone(),
                timeout: Duration::from_secs(mail.timeout_secs),
            })
            .map_err(|e| anyhow::anyhow!("Mail sender setup failed: {}", e))?;
            info!(endpoint = %endpoint, "Sending email through HTTP mail API");
            Ok(Arc::new(sender))
        }
        None => {
            warn!("mail.endpoint not set; emails will only be logged");
            Ok(Arc::new(LogMailSender))
        }
    }
}
