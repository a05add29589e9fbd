//! TCP RPC server — accept loop and per-connection handler.
//!
//! Each connection walks `AwaitingHandshake → Serving → Draining → Closed`.
//! Headers are read sequentially on the connection task; every request is
//! processed on its own task. Responses go out through a single write lock per
//! connection, so at most one response is on the wire at a time. The codec is
//! closed only after every request task of the connection has finished.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::codec::{CodecReader, CodecRegistry, CodecWriter, DuplexStream, Header};
use crate::rpc::dispatch::{Dispatcher, PlaceholderDispatcher, Request};
use crate::rpc::handshake;
use crate::types::{ConnectionId, ContentType, Error, Result, RpcConfig};

/// Pause after a failed `accept()` so persistent failures (fd exhaustion)
/// do not spin the accept loop.
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(50);

/// The write half of a connection's codec. Holding the lock is the only way to
/// write a response.
type SharedWriter = Arc<Mutex<Box<dyn CodecWriter>>>;

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    AwaitingHandshake,
    Serving,
    Draining,
    Closed,
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnState::AwaitingHandshake => "awaiting_handshake",
            ConnState::Serving => "serving",
            ConnState::Draining => "draining",
            ConnState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Summary of a connection that ended gracefully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    /// Codec negotiated during the handshake.
    pub content_type: ContentType,
    /// Requests handed to the dispatcher.
    pub requests: u64,
    /// Requests whose body failed to decode (answered with an error header).
    pub decode_errors: u64,
}

/// RPC server sharing one codec registry and one dispatcher across all
/// connections.
pub struct Server {
    registry: Arc<CodecRegistry>,
    dispatcher: Arc<dyn Dispatcher>,
    config: RpcConfig,
    cancel: CancellationToken,
}

impl Server {
    pub fn new(
        registry: Arc<CodecRegistry>,
        dispatcher: Arc<dyn Dispatcher>,
        config: RpcConfig,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Bind `addr` and accept connections until [`Server::shutdown`].
    pub async fn serve(&self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.accept(listener).await
    }

    /// Accept connections from `listener` until [`Server::shutdown`].
    ///
    /// Every accepted stream is served on its own task. A failed `accept()`
    /// is logged and the loop keeps going.
    pub async fn accept(&self, listener: TcpListener) -> std::io::Result<()> {
        tracing::info!(
            "RPC server listening on {} (codecs: {})",
            listener.local_addr()?,
            self.registry
                .content_types()
                .iter()
                .map(|ct| ct.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("RPC server shutting down");
                    break;
                }
                accept = listener.accept() => {
                    let (stream, peer) = match accept {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!("Accept failed: {}", e);
                            tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                            continue;
                        }
                    };

                    let conn_id = ConnectionId::new();
                    let span = tracing::debug_span!("conn", id = %conn_id, %peer);
                    let registry = self.registry.clone();
                    let dispatcher = self.dispatcher.clone();
                    let config = self.config.clone();
                    tokio::spawn(
                        async move {
                            tracing::debug!("RPC connection from {}", peer);
                            match handle_connection(stream, registry, dispatcher, config).await {
                                Ok(report) => tracing::debug!(
                                    "Connection from {} done: codec={} requests={} decode_errors={}",
                                    peer,
                                    report.content_type,
                                    report.requests,
                                    report.decode_errors,
                                ),
                                Err(Error::Handshake(e)) => {
                                    tracing::warn!("Connection from {} rejected: {}", peer, e)
                                }
                                Err(e) => tracing::warn!("Connection from {} error: {}", peer, e),
                            }
                        }
                        .instrument(span),
                    );
                }
            }
        }
        Ok(())
    }

    /// Serve one already-accepted stream to completion on the current task.
    pub async fn serve_conn<S: DuplexStream>(&self, stream: S) -> Result<ConnectionReport> {
        handle_connection(
            stream,
            self.registry.clone(),
            self.dispatcher.clone(),
            self.config.clone(),
        )
        .await
    }

    /// Stop accepting new connections. Connections already being served run
    /// until their peers close them.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Default for Server {
    /// Default codecs, placeholder dispatcher, default limits.
    fn default() -> Self {
        Self::new(
            Arc::new(CodecRegistry::default()),
            Arc::new(PlaceholderDispatcher),
            RpcConfig::default(),
        )
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

fn transition(state: &mut ConnState, next: ConnState) {
    tracing::debug!("connection {} -> {}", state, next);
    *state = next;
}

/// Handle a single connection: handshake → read requests → dispatch → drain → close.
async fn handle_connection<S: DuplexStream>(
    stream: S,
    registry: Arc<CodecRegistry>,
    dispatcher: Arc<dyn Dispatcher>,
    config: RpcConfig,
) -> Result<ConnectionReport> {
    let mut state = ConnState::AwaitingHandshake;

    let codec = match handshake::negotiate(Box::new(stream), &registry, config.max_frame_bytes).await {
        Ok(codec) => codec,
        Err(e) => {
            transition(&mut state, ConnState::Closed);
            return Err(e);
        }
    };

    let mut report = ConnectionReport {
        content_type: codec.content_type().clone(),
        requests: 0,
        decode_errors: 0,
    };
    let (mut reader, writer) = codec.into_split();
    let writer: SharedWriter = Arc::new(Mutex::new(writer));
    let tracker = TaskTracker::new();
    let inflight = Arc::new(Semaphore::new(config.max_inflight_requests));
    transition(&mut state, ConnState::Serving);

    let fatal = loop {
        // Taking the permit before reading stops the read side while the
        // connection is at its in-flight cap.
        let permit = match inflight.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break Some(Error::internal("in-flight semaphore closed")),
        };

        match read_request(&mut *reader).await {
            Ok(ReadOutcome::Eof) => break None,
            Ok(ReadOutcome::Request(request)) => {
                report.requests += 1;
                tracker.spawn(handle_request(request, dispatcher.clone(), writer.clone(), permit));
            }
            Ok(ReadOutcome::InvalidBody(header, e)) => {
                report.decode_errors += 1;
                tracing::warn!("rpc server: read body of {} failed: {}", header, e);
                let response = header.with_error(format!("rpc server: invalid request body: {}", e));
                let writer = writer.clone();
                tracker.spawn(async move {
                    send_response(&writer, &response, &Value::Null).await;
                    drop(permit);
                });
            }
            Err(e) => break Some(e),
        }
    };

    match &fatal {
        None => tracing::debug!("Peer closed connection, draining {} task(s)", tracker.len()),
        Some(e) => tracing::warn!("rpc server: read header error: {}", e),
    }
    transition(&mut state, ConnState::Draining);

    tracker.close();
    tracker.wait().await;

    if let Err(e) = writer.lock().await.close().await {
        tracing::debug!("Closing codec failed: {}", e);
    }
    drop(reader);
    transition(&mut state, ConnState::Closed);

    match fatal {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

enum ReadOutcome {
    Request(Request),
    /// Header decoded, body frame consumed but not decodable.
    InvalidBody(Header, Error),
    Eof,
}

async fn read_request(reader: &mut dyn CodecReader) -> Result<ReadOutcome> {
    let header = match reader.read_header().await? {
        Some(header) => header,
        None => return Ok(ReadOutcome::Eof),
    };

    match reader.read_body().await {
        Ok(argv) => Ok(ReadOutcome::Request(Request::new(header, argv))),
        Err(e) if e.is_recoverable() => Ok(ReadOutcome::InvalidBody(header, e)),
        Err(e) => Err(e),
    }
}

/// Dispatch one request and write its response. The permit is released when
/// the task ends.
async fn handle_request(
    request: Request,
    dispatcher: Arc<dyn Dispatcher>,
    writer: SharedWriter,
    _permit: OwnedSemaphorePermit,
) {
    let (header, body) = match dispatcher.dispatch(&request).await {
        Ok(reply) => (request.header, reply),
        Err(e) => {
            let message = match e {
                Error::Dispatch(msg) => msg,
                other => other.to_string(),
            };
            (request.header.with_error(message), Value::Null)
        }
    };
    send_response(&writer, &header, &body).await;
}

/// Write one response under the connection's write lock. Failures are logged
/// and do not end the connection.
async fn send_response(writer: &SharedWriter, header: &Header, body: &Value) {
    let mut guard = writer.lock().await;
    if let Err(e) = guard.write(header, body).await {
        tracing::warn!("rpc server: write response {} failed: {}", header, e);
    }
}
