//! JSON-RPC Server
//!
//! Serves the booking and admin methods over HTTP/WebSocket on TCP.

use crate::handler::RpcHandler;
use crate::types::{BookingActionParams, GetBookingParams, QueueDepthParams, RequestBookingParams};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use reservo_core::application::{BookingService, JobScheduler};
use reservo_core::error::{AppError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9640;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        bookings: Arc<BookingService>,
        scheduler: Arc<JobScheduler>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(bookings, scheduler)),
        }
    }

    /// Build the method table without binding a socket
    pub fn into_module(self) -> Result<RpcModule<()>> {
        build_module(self.handler)
    }

    /// Bind and start serving; returns the bound address and a stop handle
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| AppError::Config(format!("Failed to bind RPC server on {}: {}", addr, e)))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| AppError::Internal(format!("RPC server has no local address: {}", e)))?;

        let module = build_module(self.handler)?;
        let handle = server.start(module);

        info!(addr = %local_addr, "JSON-RPC server started");
        Ok((local_addr, handle))
    }
}

fn build_module(handler: Arc<RpcHandler>) -> Result<RpcModule<()>> {
    let mut module = RpcModule::new(());

    let h = handler.clone();
    module
        .register_async_method("booking.request.v1", move |params, _, _| {
            let h = h.clone();
            async move {
                let req: RequestBookingParams = params.parse()?;
                h.request_booking(req).await
            }
        })
        .map_err(register_error)?;

    let h = handler.clone();
    module
        .register_async_method("booking.confirm.v1", move |params, _, _| {
            let h = h.clone();
            async move {
                let req: BookingActionParams = params.parse()?;
                h.confirm(req).await
            }
        })
        .map_err(register_error)?;

    let h = handler.clone();
    module
        .register_async_method("booking.decline.v1", move |params, _, _| {
            let h = h.clone();
            async move {
                let req: BookingActionParams = params.parse()?;
                h.decline(req).await
            }
        })
        .map_err(register_error)?;

    let h = handler.clone();
    module
        .register_async_method("booking.cancel.v1", move |params, _, _| {
            let h = h.clone();
            async move {
                let req: BookingActionParams = params.parse()?;
                h.cancel(req).await
            }
        })
        .map_err(register_error)?;

    let h = handler.clone();
    module
        .register_async_method("booking.get.v1", move |params, _, _| {
            let h = h.clone();
            async move {
                let req: GetBookingParams = params.parse()?;
                h.get(req).await
            }
        })
        .map_err(register_error)?;

    let h = handler;
    module
        .register_async_method("admin.queue_depth.v1", move |params, _, _| {
            let h = h.clone();
            async move {
                let req: QueueDepthParams = params.parse().unwrap_or_default();
                h.queue_depth(req).await
            }
        })
        .map_err(register_error)?;

    Ok(module)
}

fn register_error(e: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("Failed to register RPC method: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BookingResponse;
    use chrono::{TimeZone, Utc};
    use jsonrpsee::core::params::ObjectParams;
    use reservo_core::application::{HandlerRegistry, PostCommitHooks, SchedulerConfig};
    use reservo_core::domain::{BookingStatus, Listing};
    use reservo_core::port::booking_repository::mocks::InMemoryBookingRepository;
    use reservo_core::port::directory::mocks::StaticDirectory;
    use reservo_core::port::id_provider::mocks::SequentialIds;
    use reservo_core::port::job_repository::mocks::InMemoryJobRepository;
    use reservo_core::port::time_provider::mocks::ManualClock;

    fn module() -> RpcModule<()> {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
        ));
        let directory = Arc::new(StaticDirectory::new().with_listing(Listing {
            id: "L".into(),
            owner_id: "P".into(),
            price_cents: 100,
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
        RpcServer::new(RpcServerConfig::default(), bookings, scheduler)
            .into_module()
            .unwrap()
    }

    #[tokio::test]
    async fn test_methods_are_registered() {
        let module = module();
        let names: Vec<&str> = module.method_names().collect();
        for name in [
            "booking.request.v1",
            "booking.confirm.v1",
            "booking.decline.v1",
            "booking.cancel.v1",
            "booking.get.v1",
            "admin.queue_depth.v1",
        ] {
            assert!(names.contains(&name), "missing {}", name);
        }
    }

    #[tokio::test]
    async fn test_request_then_confirm_over_module() {
        let module = module();

        let mut params = ObjectParams::new();
        params.insert("listing_id", "L").unwrap();
        params.insert("creator_id", "C").unwrap();
        params.insert("start_at", "2025-01-10T10:00:00Z").unwrap();
        params.insert("end_at", "2025-01-10T11:00:00Z").unwrap();
        let created: BookingResponse = module.call("booking.request.v1", params).await.unwrap();
        assert_eq!(created.booking.status, BookingStatus::Pending);

        let mut params = ObjectParams::new();
        params.insert("booking_id", &created.booking.id).unwrap();
        params.insert("acting_user_id", "P").unwrap();
        let confirmed: BookingResponse = module.call("booking.confirm.v1", params).await.unwrap();
        assert_eq!(confirmed.booking.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_malformed_params_are_rejected() {
        let module = module();

        let mut params = ObjectParams::new();
        params.insert("booking_id", 42).unwrap();
        let result: std::result::Result<BookingResponse, _> =
            module.call("booking.get.v1", params).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_start_binds_ephemeral_port() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let bookings = Arc::new(BookingService::new(
            Arc::new(InMemoryBookingRepository::new()),
            Arc::new(StaticDirectory::new()),
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
        let config = RpcServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
        };

        let (addr, handle) = RpcServer::new(config, bookings, scheduler)
            .start()
            .await
            .unwrap();
        assert_ne!(addr.port(), 0);

        handle.stop().unwrap();
        handle.stopped().await;
    }
}
