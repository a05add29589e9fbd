//! RPC integration tests — handshake → request frames → dispatch → response frames over TCP.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use srpc::codec::frame::{write_frame, FRAME_HEADER};
use srpc::codec::{new_framed_codec, Codec, MsgPack};
use srpc::rpc::handshake::write_options;
use srpc::rpc::{Dispatcher, Options, PlaceholderDispatcher, Request};
use srpc::{CodecRegistry, Header, RpcConfig, Server};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

const MAX_FRAME: u32 = 1024 * 1024;

/// Helper: start a server on a random port, return (addr, server, accept_task).
async fn start_test_server(
    dispatcher: impl Dispatcher,
) -> (SocketAddr, Arc<Server>, tokio::task::JoinHandle<std::io::Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = Arc::new(Server::new(
        Arc::new(CodecRegistry::default()),
        Arc::new(dispatcher),
        RpcConfig {
            max_frame_bytes: MAX_FRAME,
            max_inflight_requests: 64,
        },
    ));

    let handle = {
        let server = server.clone();
        tokio::spawn(async move { server.accept(listener).await })
    };

    (addr, server, handle)
}

/// Helper: connect, perform the handshake and wrap the stream in a msgpack codec.
async fn connect(addr: SocketAddr) -> Codec {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    write_options(&mut stream, &Options::default()).await.unwrap();
    new_framed_codec::<MsgPack>(Box::new(stream), MAX_FRAME)
}

/// Helper: read responses until the server closes the connection.
async fn read_responses(client: &mut Codec) -> Vec<(Header, Value)> {
    let mut responses = Vec::new();
    while let Some(header) = client.read_header().await.unwrap() {
        let body = client.read_body().await.unwrap().decode::<Value>().unwrap();
        responses.push((header, body));
    }
    responses
}

/// Echoes the argument back after a seq-dependent delay, so completion order
/// differs from request order.
#[derive(Debug)]
struct DelayedEcho;

#[async_trait::async_trait]
impl Dispatcher for DelayedEcho {
    async fn dispatch(&self, request: &Request) -> srpc::Result<Value> {
        let delay = (request.header.seq * 7) % 20;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        request.argv.decode::<Value>()
    }
}

#[tokio::test]
async fn test_foo_bar_round_trip() {
    let (addr, _server, _handle) = start_test_server(PlaceholderDispatcher).await;
    let mut client = connect(addr).await;

    client
        .write(&Header::new("Foo.Bar", 1), &json!("hello"))
        .await
        .unwrap();
    client.close().await.unwrap();

    let responses = read_responses(&mut client).await;
    assert_eq!(responses.len(), 1);
    let (header, body) = &responses[0];
    assert_eq!(header.seq, 1);
    assert_eq!(header.error, "");
    assert_eq!(body, &json!(""));
}

#[tokio::test]
async fn test_concurrent_requests_all_answered() {
    let (addr, _server, _handle) = start_test_server(DelayedEcho).await;
    let mut client = connect(addr).await;

    let n = 50u64;
    for seq in 0..n {
        client
            .write(&Header::new("Echo.Delayed", seq), &json!({ "seq": seq }))
            .await
            .unwrap();
    }
    client.close().await.unwrap();

    let responses = read_responses(&mut client).await;
    let by_seq: BTreeMap<u64, Value> = responses
        .into_iter()
        .map(|(header, body)| {
            assert!(!header.is_error(), "unexpected error: {}", header.error);
            (header.seq, body)
        })
        .collect();

    let expected: BTreeMap<u64, Value> = (0..n).map(|seq| (seq, json!({ "seq": seq }))).collect();
    assert_eq!(by_seq, expected);
}

/// Helper: the server must close the stream without writing anything back.
async fn assert_closed_without_reply(mut stream: TcpStream) {
    let mut rest = Vec::new();
    match tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest)).await {
        Ok(Ok(_)) => assert!(rest.is_empty(), "server replied after a rejected stream"),
        // Closing with unread input resets the connection; still a close.
        Ok(Err(_)) => {}
        Err(_) => panic!("server kept the connection open"),
    }
}

#[tokio::test]
async fn test_wrong_magic_is_dropped() {
    let (addr, _server, _handle) = start_test_server(PlaceholderDispatcher).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let options = Options {
        magic_number: 0x3bef5d,
        codec_type: "application/msgpack".to_string(),
    };
    write_options(&mut stream, &options).await.unwrap();
    let header = rmp_serde::to_vec_named(&Header::new("Foo.Bar", 1)).unwrap();
    write_frame(&mut stream, FRAME_HEADER, &header).await.unwrap();

    assert_closed_without_reply(stream).await;
}

#[tokio::test]
async fn test_unregistered_codec_is_dropped() {
    let (addr, _server, _handle) = start_test_server(PlaceholderDispatcher).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    write_options(&mut stream, &Options::new("application/gob"))
        .await
        .unwrap();

    assert_closed_without_reply(stream).await;
}

#[tokio::test]
async fn test_garbage_after_handshake_does_not_affect_other_connections() {
    let (addr, _server, handle) = start_test_server(PlaceholderDispatcher).await;

    // Connection 1: valid handshake, then an options-shaped payload in place
    // of a header.
    let mut bad = TcpStream::connect(addr).await.unwrap();
    write_options(&mut bad, &Options::default()).await.unwrap();
    write_frame(&mut bad, FRAME_HEADER, br#"{"MagicNumber":3927900,"CodecType":"x"}"#)
        .await
        .unwrap();
    assert_closed_without_reply(bad).await;

    // Connection 2 is still served.
    let mut client = connect(addr).await;
    client
        .write(&Header::new("Foo.Bar", 2), &json!("still here"))
        .await
        .unwrap();
    client.close().await.unwrap();
    let responses = read_responses(&mut client).await;
    assert_eq!(responses, vec![(Header::new("Foo.Bar", 2), json!(""))]);

    assert!(!handle.is_finished());
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let (addr, server, handle) = start_test_server(PlaceholderDispatcher).await;

    server.shutdown();
    handle.await.unwrap().unwrap();

    assert!(TcpStream::connect(addr).await.is_err());
}
