//! JSON-RPC API Layer
//!
//! Exposes scan submission, listing, status, stop and delete as JSON-RPC 2.0
//! methods over HTTP on localhost.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
