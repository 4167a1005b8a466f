//! JSON-RPC API Layer
//!
//! Exposes booking operations and the queue-depth read path over JSON-RPC 2.0.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
