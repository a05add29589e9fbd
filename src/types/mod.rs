//! Core types for the RPC transport.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (ConnectionId, ContentType)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for the server, logging and transport

mod config;
mod errors;
mod ids;

pub use config::{Config, ObservabilityConfig, RpcConfig, ServerConfig};
pub use errors::{Error, HandshakeError, Result};
pub use ids::{ConnectionId, ContentType};
