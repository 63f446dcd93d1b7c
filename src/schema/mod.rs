//! Schema module - contracts, message types and their registry.
//!
//! - [`SchemaRegistry`] - contract name ⇄ index, `(index, slot)` → type name
//! - [`ContractSchema`] - ordered message types of one contract
//! - [`MessageType`] - encode/decode/from_object for one payload shape
//! - [`MemorySchemaRegistry`] - in-process implementation with the error contract built in
//!
//! # Example
//!
//! ```
//! use contractwire::schema::{ContractSchema, MemorySchemaRegistry, MessageType, SchemaRegistry};
//!
//! let registry = MemorySchemaRegistry::builder()
//!     .contract(ContractSchema::new("order", 3).message(MessageType::new("GetAllOrderRequest")))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(registry.retrieve_index("order"), Some(3));
//! assert_eq!(registry.retrieve_type(3, 0).as_deref(), Some("GetAllOrderRequest"));
//! ```

mod message;
mod registry;

pub use message::{ContractSchema, MessageType};
pub use registry::{
    error_contract, MemorySchemaRegistry, SchemaRegistry, SchemaRegistryBuilder, ERROR_CONTRACT,
    ERROR_MESSAGE,
};
