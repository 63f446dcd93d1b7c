//! Integration tests for contractwire.
//!
//! These tests drive a running connection manager over real sockets using
//! only the public API.

use std::sync::Arc;
use std::time::Duration;

use contractwire::protocol::{Envelope, FrameBuffer, Header};
use contractwire::{
    Container, ConnectionManager, ContractSchema, DispatchMode, HandlerRegistry,
    MemorySchemaRegistry, MessageType, ServerOptions, WireCodec,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

#[derive(Default)]
struct Calculator;

fn schemas() -> Arc<MemorySchemaRegistry> {
    let registry = MemorySchemaRegistry::builder()
        .contract(
            ContractSchema::new("calc", 1)
                .message(MessageType::new("AddRequest").field("a").field("b"))
                .message(MessageType::new("DivideRequest").field("a").field("b"))
                .message(MessageType::new("Sum").field("value")),
        )
        .build()
        .unwrap();
    Arc::new(registry)
}

fn handlers() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .controller::<Calculator>()
        .contract("calc")
        .message("AddRequest", "add")
        .data("add", 0)
        .socket("add", 1)
        .handler("add", |_calc, args| async move {
            let req = args.data(0)?;
            let value = req["a"].as_i64().unwrap_or(0) + req["b"].as_i64().unwrap_or(0);
            args.socket(1)?
                .send_message("calc", "Sum", &json!({ "value": value }))
                .await
        })
        .message("DivideRequest", "divide")
        .data("divide", 0)
        .socket("divide", 1)
        .handler("divide", |_calc, args| async move {
            let req = args.data(0)?;
            let conn = args.socket(1)?;
            match (req["a"].as_i64(), req["b"].as_i64()) {
                (Some(a), Some(b)) if b != 0 => {
                    conn.send_message("calc", "Sum", &json!({ "value": a / b })).await
                }
                _ => conn.send_error("division by zero", Some(400), Some("divide")).await,
            }
        })
        .construct_default();
    registry
}

async fn serve(options: ServerOptions) -> (ConnectionManager, std::net::SocketAddr) {
    let schemas = schemas();
    let manager = ConnectionManager::new(&handlers(), schemas, &Container::new(), options).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    manager.start(listener);
    (manager, addr)
}

async fn read_envelopes(stream: &mut TcpStream, count: usize) -> Vec<Envelope> {
    let mut frames = FrameBuffer::new();
    let mut envelopes = Vec::new();
    let mut buf = [0u8; 1024];
    while envelopes.len() < count {
        let n = timeout(Duration::from_secs(2), stream.read(&mut buf))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        assert!(n > 0, "server closed the connection");
        envelopes.extend(frames.push(&buf[..n]).unwrap());
    }
    envelopes
}

fn codec() -> WireCodec {
    WireCodec::new(schemas())
}

#[tokio::test]
async fn test_request_reply_over_tcp() {
    let (manager, addr) = serve(ServerOptions::default()).await;
    let codec = codec();
    let mut client = TcpStream::connect(addr).await.unwrap();

    let request = codec.pack("calc", "AddRequest", &json!({"a": 2, "b": 40})).unwrap();
    client.write_all(&request).await.unwrap();

    let reply = read_envelopes(&mut client, 1).await.remove(0);
    let (type_name, data) = codec.decode_payload(&reply).unwrap().unwrap();
    assert_eq!(type_name, "Sum");
    assert_eq!(data, json!({"value": 42}));

    manager.close().await;
}

#[tokio::test]
async fn test_error_envelope_reaches_peer() {
    let (manager, addr) = serve(ServerOptions::default()).await;
    let codec = codec();
    let mut client = TcpStream::connect(addr).await.unwrap();

    let request = codec.pack("calc", "DivideRequest", &json!({"a": 1, "b": 0})).unwrap();
    client.write_all(&request).await.unwrap();

    let reply = read_envelopes(&mut client, 1).await.remove(0);
    assert!(reply.header.is_error());
    let error = codec.decode_error(&reply.encode()).unwrap();
    assert_eq!(error.message, "division by zero");
    assert_eq!(error.code, Some(400));
    assert_eq!(error.context.as_deref(), Some("divide"));

    manager.close().await;
}

#[tokio::test]
async fn test_garbage_on_one_connection_does_not_affect_another() {
    let (manager, addr) = serve(ServerOptions::default()).await;
    let codec = codec();
    let mut noisy = TcpStream::connect(addr).await.unwrap();
    let mut quiet = TcpStream::connect(addr).await.unwrap();

    // Oversize header: the server gives up on this connection only.
    noisy
        .write_all(&Header::new(1, 0, u32::MAX).encode())
        .await
        .unwrap();
    let mut buf = [0u8; 16];
    let n = timeout(Duration::from_secs(2), noisy.read(&mut buf))
        .await
        .expect("noisy connection was not closed")
        .unwrap_or(0);
    assert_eq!(n, 0);

    let request = codec.pack("calc", "AddRequest", &json!({"a": 1, "b": 1})).unwrap();
    quiet.write_all(&request).await.unwrap();
    let reply = read_envelopes(&mut quiet, 1).await.remove(0);
    assert_eq!(codec.decode_payload(&reply).unwrap().unwrap().1, json!({"value": 2}));

    manager.close().await;
}

#[tokio::test]
async fn test_sequential_mode_from_json_config() {
    let options = ServerOptions::from_json(r#"{"dispatch_mode": "sequential", "channel_capacity": 8}"#).unwrap();
    assert_eq!(options.dispatch_mode, DispatchMode::Sequential);

    let (manager, addr) = serve(options).await;
    let codec = codec();
    let mut client = TcpStream::connect(addr).await.unwrap();

    let mut batch = Vec::new();
    for i in 0..5 {
        batch.extend_from_slice(&codec.pack("calc", "AddRequest", &json!({"a": i, "b": 0})).unwrap());
    }
    client.write_all(&batch).await.unwrap();

    let values: Vec<_> = read_envelopes(&mut client, 5)
        .await
        .iter()
        .map(|e| codec.decode_payload(e).unwrap().unwrap().1["value"].clone())
        .collect();
    assert_eq!(values, (0..5).map(|i| json!(i)).collect::<Vec<_>>());

    manager.close().await;
}

#[tokio::test]
async fn test_unknown_contract_gets_no_reply() {
    let (manager, addr) = serve(ServerOptions::default()).await;
    let codec = codec();
    let mut client = TcpStream::connect(addr).await.unwrap();

    client
        .write_all(&Envelope::new(999, 0, bytes::Bytes::new()).encode())
        .await
        .unwrap();
    let request = codec.pack("calc", "AddRequest", &json!({"a": 3, "b": 4})).unwrap();
    client.write_all(&request).await.unwrap();

    // Only the valid request is answered.
    let reply = read_envelopes(&mut client, 1).await.remove(0);
    assert_eq!(codec.decode_payload(&reply).unwrap().unwrap().1, json!({"value": 7}));
    assert_eq!(manager.connection_count(), 1);

    manager.close().await;
}
