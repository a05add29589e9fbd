//! # srpc - RPC transport core
//!
//! Transport half of a minimal RPC framework:
//! - Pluggable codecs (MessagePack, JSON) selected per connection
//! - A fixed JSON handshake carrying a magic number and the codec identifier
//! - A per-connection loop that reads requests sequentially, processes each on
//!   its own task and serializes responses through one write lock
//!
//! ## Architecture
//!
//! ```text
//!   TcpListener ─accept─▶ connection task ──handshake──▶ CodecRegistry
//!                              │
//!                              ├─ read header/body ─▶ request task ─▶ Dispatcher
//!                              │                          │
//!                              │                  write lock (one per connection)
//!                              │                          │
//!                              └─ drain, close ◀──────── Codec write half
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

// Re-export public API
pub mod codec;
pub mod rpc;
pub mod types;

// Internal utilities
pub mod observability;

pub use codec::{Body, Codec, CodecRegistry, Header};
pub use rpc::{Dispatcher, Options, Request, Server, MAGIC_NUMBER};
pub use types::{Config, Error, Result, RpcConfig};
