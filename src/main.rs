//! srpc server - main entry point.
//!
//! Serves the built-in codecs (MessagePack, JSON) with the placeholder
//! dispatcher until Ctrl-C.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

use srpc::rpc::PlaceholderDispatcher;
use srpc::{CodecRegistry, Config, Server};

#[derive(Debug, Parser)]
#[command(name = "srpc-server", version, about = "Minimal RPC transport server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "SRPC_LISTEN")]
    listen: Option<SocketAddr>,

    /// Largest accepted frame payload in bytes.
    #[arg(long, env = "SRPC_MAX_FRAME_BYTES")]
    max_frame_bytes: Option<u32>,

    /// Requests processed concurrently per connection.
    #[arg(long, env = "SRPC_MAX_INFLIGHT_REQUESTS")]
    max_inflight_requests: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    if let Some(max) = args.max_frame_bytes {
        config.rpc.max_frame_bytes = max;
    }
    if let Some(max) = args.max_inflight_requests {
        config.rpc.max_inflight_requests = max;
    }
    config.rpc.validate()?;

    // Initialize observability
    srpc::observability::init_with(&config.observability);

    let addr = match args.listen {
        Some(addr) => addr,
        None => config.server.listen_addr.parse()?,
    };

    let server = Arc::new(Server::new(
        Arc::new(CodecRegistry::default()),
        Arc::new(PlaceholderDispatcher),
        config.rpc.clone(),
    ));

    let serving = {
        let server = server.clone();
        tokio::spawn(async move { server.serve(addr).await })
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Ctrl-C received");
            server.shutdown();
        }
        result = serving => result??,
    }

    Ok(())
}
