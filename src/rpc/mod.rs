//! RPC server: handshake, accept loop and per-connection request handling.

pub mod dispatch;
pub mod handshake;
pub mod server;

pub use dispatch::{Dispatcher, PlaceholderDispatcher, Request};
pub use handshake::{Options, MAGIC_NUMBER};
pub use server::{ConnState, ConnectionReport, Server};
