//! Codec module - payload serialization and envelope building.
//!
//! - [`MsgPackCodec`] - MessagePack via `rmp-serde` (struct-as-map)
//! - [`WireCodec`] - builds outbound envelopes and standard error envelopes
//!   against a [`SchemaRegistry`](crate::schema::SchemaRegistry)
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use contractwire::codec::WireCodec;
//! use contractwire::schema::{ContractSchema, MemorySchemaRegistry, MessageType};
//! use serde_json::json;
//!
//! let schemas = MemorySchemaRegistry::builder()
//!     .contract(ContractSchema::new("order", 3).message(MessageType::new("AddOrderRequest")))
//!     .build()
//!     .unwrap();
//! let codec = WireCodec::new(Arc::new(schemas));
//!
//! let bytes = codec.pack("order", "AddOrderRequest", &json!({"id": "1"})).unwrap();
//! let envelope = codec.unpack(&bytes).unwrap();
//! assert_eq!(envelope.contract(), 3);
//! ```

mod msgpack;
mod wire;

pub use msgpack::MsgPackCodec;
pub use wire::{ErrorMessage, WireCodec};
