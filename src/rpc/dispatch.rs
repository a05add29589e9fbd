//! Method dispatch seam.
//!
//! The transport hands every decoded request to a [`Dispatcher`]; looking up
//! services and invoking real methods is the dispatcher's business.

use async_trait::async_trait;
use serde_json::Value;

use crate::codec::{Body, Header};
use crate::types::Result;

/// One decoded request frame. Owned by the task processing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub header: Header,
    /// Undecoded argument; typed decoding is up to the dispatcher
    /// (`argv.decode::<T>()`).
    pub argv: Body,
}

impl Request {
    pub fn new(header: Header, argv: Body) -> Self {
        Self { header, argv }
    }
}

/// Computes the reply for a request.
///
/// `Err` is reported to the caller through the response header's `Error`
/// field with a null body.
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    async fn dispatch(&self, request: &Request) -> Result<Value>;
}

/// Stand-in until a service registry exists: ignores the method and the
/// argument and replies with an empty string.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderDispatcher;

#[async_trait]
impl Dispatcher for PlaceholderDispatcher {
    async fn dispatch(&self, request: &Request) -> Result<Value> {
        tracing::debug!(
            "rpc server: {} argv={} bytes ({})",
            request.header,
            request.argv.len(),
            request.argv.content_type()
        );
        Ok(Value::String(String::new()))
    }
}
