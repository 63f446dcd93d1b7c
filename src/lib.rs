//! # contractwire
//!
//! Contract-addressed binary RPC dispatch over persistent connections.
//!
//! Peers exchange envelopes that name a contract by index and a message
//! type by slot. A server declares handler types, binds their methods to
//! message types, and lets the [`ConnectionManager`] route each inbound
//! envelope to the right method with the decoded payload and the
//! connection injected as arguments.
//!
//! ## Architecture
//!
//! - **Schemas**: [`SchemaRegistry`] maps contracts and message slots to
//!   type names and payload codecs
//! - **Handlers**: [`HandlerRegistry`] records which method handles which
//!   message, validated into a [`DispatchTable`] at startup
//! - **Connections**: one read loop and one writer task per connection
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use contractwire::{
//!     Container, ConnectionManager, ContractSchema, HandlerRegistry, MemorySchemaRegistry,
//!     MessageType, ServerOptions,
//! };
//! use serde_json::json;
//!
//! #[derive(Default)]
//! struct Orders;
//!
//! #[tokio::main]
//! async fn main() -> contractwire::Result<()> {
//!     let schemas = MemorySchemaRegistry::builder()
//!         .contract(
//!             ContractSchema::new("order", 3)
//!                 .message(MessageType::new("GetAllOrderRequest"))
//!                 .message(MessageType::new("OrderList").field("orders")),
//!         )
//!         .build()?;
//!
//!     let mut handlers = HandlerRegistry::new();
//!     handlers
//!         .controller::<Orders>()
//!         .contract("order")
//!         .message("GetAllOrderRequest", "get_all")
//!         .socket("get_all", 0)
//!         .handler("get_all", |_orders, args| async move {
//!             args.socket(0)?
//!                 .send_message("order", "OrderList", &json!({"orders": []}))
//!                 .await
//!         })
//!         .construct_default();
//!
//!     let manager = ConnectionManager::new(
//!         &handlers,
//!         Arc::new(schemas),
//!         &Container::new(),
//!         ServerOptions::default(),
//!     )?;
//!     manager.start(tokio::net::TcpListener::bind("127.0.0.1:7400").await?);
//!
//!     tokio::signal::ctrl_c().await?;
//!     manager.close().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod handler;
pub mod inject;
pub mod protocol;
pub mod schema;
pub mod server;
pub mod transport;
pub mod writer;

pub use codec::{ErrorMessage, WireCodec};
pub use error::{Result, WireError};
pub use handler::{Argument, Arguments, ClassKey, HandlerRegistry, ParamKind};
pub use inject::{Container, Dependencies, DependencyProvider};
pub use protocol::Envelope;
pub use schema::{ContractSchema, MemorySchemaRegistry, MessageType, SchemaRegistry};
pub use server::{
    Connection, ConnectionManager, DispatchMode, DispatchOutcome, DispatchTable, DropReason,
    ServerOptions,
};
