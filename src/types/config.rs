//! Configuration structures.
//!
//! Configuration defaults live here and can be overridden from environment
//! variables with [`Config::from_env`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{Error, Result};

/// Global server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// RPC transport configuration.
    #[serde(default)]
    pub rpc: RpcConfig,
}

impl Config {
    /// Defaults overlaid with `SRPC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("SRPC_LISTEN") {
            config.server.listen_addr = addr;
        }
        if let Some(raw) = lookup("SRPC_MAX_FRAME_BYTES") {
            config.rpc.max_frame_bytes = parse_var("SRPC_MAX_FRAME_BYTES", &raw)?;
        }
        if let Some(raw) = lookup("SRPC_MAX_INFLIGHT_REQUESTS") {
            config.rpc.max_inflight_requests = parse_var("SRPC_MAX_INFLIGHT_REQUESTS", &raw)?;
        }
        if let Some(format) = lookup("SRPC_LOG_FORMAT") {
            config.observability.json_logs = format.eq_ignore_ascii_case("json");
        }
        if let Some(level) = lookup("RUST_LOG") {
            config.observability.log_level = level;
        }

        config.rpc.validate()?;
        Ok(config)
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::validation(format!("{}: cannot parse {:?}", key, raw)))
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// RPC server bind address (TCP).
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:50051".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// RPC transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Maximum frame payload size in bytes (handshake, header and body frames).
    pub max_frame_bytes: u32,

    /// Maximum requests dispatched concurrently on one connection. Once
    /// reached, the connection stops reading until a request completes.
    pub max_inflight_requests: usize,
}

impl RpcConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_bytes == 0 {
            return Err(Error::validation("max_frame_bytes must be positive"));
        }
        if self.max_inflight_requests == 0 {
            return Err(Error::validation("max_inflight_requests must be positive"));
        }
        Ok(())
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 5 * 1024 * 1024,
            max_inflight_requests: 1024,
        }
    }
}
