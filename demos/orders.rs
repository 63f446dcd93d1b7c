//! Orders service - handlers, dependencies and a round trip over TCP.
//!
//! This example demonstrates:
//! - Declaring an `order` contract and its message types
//! - Registering a handler type with a constructor dependency
//! - Injecting the decoded payload and the connection into handler methods
//! - Talking to the server with plain envelopes from a TCP client
//!
//! ```text
//! RUST_LOG=debug cargo run --example orders
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use contractwire::protocol::{Header, HEADER_SIZE};
use contractwire::{
    Container, ConnectionManager, ContractSchema, Envelope, HandlerRegistry, MemorySchemaRegistry,
    MessageType, ServerOptions, WireError,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Order {
    id: String,
    item: String,
}

/// In-memory order storage shared by handler instances.
#[derive(Default)]
struct OrderStore {
    orders: Mutex<Vec<Order>>,
}

impl OrderStore {
    fn add(&self, order: Order) -> contractwire::Result<()> {
        let mut orders = self
            .orders
            .lock()
            .map_err(|_| WireError::Handler("order store poisoned".into()))?;
        orders.push(order);
        Ok(())
    }

    fn all(&self) -> Vec<Order> {
        self.orders.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

/// Handlers for the `order` contract.
struct OrderController {
    store: Arc<OrderStore>,
}

fn schemas() -> contractwire::Result<MemorySchemaRegistry> {
    MemorySchemaRegistry::builder()
        .contract(
            ContractSchema::new("order", 3)
                .message(MessageType::new("AddOrderRequest").field("id").field("item"))
                .message(MessageType::new("AddOrderResponse").field("id"))
                .message(MessageType::new("GetAllOrderRequest"))
                .message(MessageType::new("OrderList").field("orders")),
        )
        .build()
}

fn handlers() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .controller::<OrderController>()
        .contract("order")
        .message("AddOrderRequest", "add")
        .data("add", 0)
        .socket("add", 1)
        .handler("add", |this, args| async move {
            let order: Order = args.data_as(0)?;
            let id = order.id.clone();
            this.store.add(order)?;
            args.socket(1)?
                .send_message("order", "AddOrderResponse", &json!({ "id": id }))
                .await
        })
        .message("GetAllOrderRequest", "get_all")
        .socket("get_all", 0)
        .handler("get_all", |this, args| async move {
            let orders = serde_json::to_value(this.store.all())?;
            args.socket(0)?
                .send_message("order", "OrderList", &json!({ "orders": orders }))
                .await
        })
        .construct(&["OrderStore"], |deps| {
            Ok(OrderController {
                store: deps.get::<OrderStore>("OrderStore")?,
            })
        });
    registry
}

async fn read_envelope(stream: &mut TcpStream) -> contractwire::Result<Envelope> {
    let mut header = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header).await?;
    let header = Header::decode(&header)
        .ok_or_else(|| WireError::Protocol("short header".into()))?;
    let mut payload = vec![0u8; header.payload_length as usize];
    stream.read_exact(&mut payload).await?;
    Ok(Envelope::new(header.contract, header.message, payload.into()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut container = Container::new();
    container.provide("OrderStore", OrderStore::default());

    let manager = ConnectionManager::new(
        &handlers(),
        Arc::new(schemas()?),
        &container,
        ServerOptions::default(),
    )?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    manager.start(listener);
    println!("orders service listening on {addr}");

    // Client side: same schemas, plain envelopes.
    let codec = manager.codec().clone();
    let mut client = TcpStream::connect(addr).await?;

    for (id, item) in [("1", "keyboard"), ("2", "monitor")] {
        let request = codec.pack("order", "AddOrderRequest", &json!({ "id": id, "item": item }))?;
        client.write_all(&request).await?;
        let reply = read_envelope(&mut client).await?;
        if let Some((type_name, data)) = codec.decode_payload(&reply)? {
            println!("{type_name}: {data}");
        }
    }

    client
        .write_all(&codec.pack("order", "GetAllOrderRequest", &json!({}))?)
        .await?;
    let reply = tokio::time::timeout(Duration::from_secs(1), read_envelope(&mut client)).await??;
    if let Some((type_name, data)) = codec.decode_payload(&reply)? {
        println!("{type_name}: {data}");
    }

    manager.close().await;
    Ok(())
}
