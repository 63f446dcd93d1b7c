//! Contract lookup by name and by index.

use std::collections::HashMap;
use std::sync::Arc;

use super::{ContractSchema, MessageType};
use crate::error::{Result, WireError};
use crate::protocol::ERROR_CONTRACT_INDEX;

/// Name of the built-in error contract.
pub const ERROR_CONTRACT: &str = "error";

/// Name of the single message type in the error contract.
pub const ERROR_MESSAGE: &str = "Error";

/// Resolves contracts and message types in both directions.
///
/// The engine only consumes this trait; how schemas are produced is up to
/// the host. [`MemorySchemaRegistry`] is the in-process implementation.
pub trait SchemaRegistry: Send + Sync {
    /// Contract schema by name (the schema key).
    fn retrieve(&self, key: &str) -> Option<Arc<ContractSchema>>;

    /// Index assigned to a contract name.
    fn retrieve_index(&self, contract: &str) -> Option<u32> {
        self.retrieve(contract).map(|c| c.index())
    }

    /// Contract schema by index.
    fn retrieve_by_index(&self, index: u32) -> Option<Arc<ContractSchema>>;

    /// Fully-qualified message type name at `(contract index, slot)`.
    fn retrieve_type(&self, index: u32, slot: u16) -> Option<String> {
        self.retrieve_by_index(index)?
            .type_at(slot)
            .map(str::to_owned)
    }
}

/// The built-in error contract at index 0.
pub fn error_contract() -> ContractSchema {
    ContractSchema::new(ERROR_CONTRACT, ERROR_CONTRACT_INDEX).message(
        MessageType::new(ERROR_MESSAGE)
            .field("message")
            .field("code")
            .field("context"),
    )
}

/// Immutable in-memory schema registry.
///
/// Always contains the error contract at index 0.
#[derive(Debug, Clone)]
pub struct MemorySchemaRegistry {
    by_name: HashMap<String, Arc<ContractSchema>>,
    by_index: HashMap<u32, Arc<ContractSchema>>,
}

impl MemorySchemaRegistry {
    /// Start declaring contracts.
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::new()
    }

    /// Number of contracts, the error contract included.
    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    /// Always false; the error contract is always present.
    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }
}

impl SchemaRegistry for MemorySchemaRegistry {
    fn retrieve(&self, key: &str) -> Option<Arc<ContractSchema>> {
        self.by_name.get(key).cloned()
    }

    fn retrieve_by_index(&self, index: u32) -> Option<Arc<ContractSchema>> {
        self.by_index.get(&index).cloned()
    }
}

/// Builder for [`MemorySchemaRegistry`].
pub struct SchemaRegistryBuilder {
    contracts: Vec<ContractSchema>,
}

impl SchemaRegistryBuilder {
    /// Create a builder holding only the error contract.
    pub fn new() -> Self {
        Self {
            contracts: vec![error_contract()],
        }
    }

    /// Add a contract.
    #[must_use]
    pub fn contract(mut self, contract: ContractSchema) -> Self {
        self.contracts.push(contract);
        self
    }

    /// Validate and freeze the registry.
    ///
    /// # Errors
    ///
    /// Fails when two contracts share a name or an index, when a user
    /// contract claims the reserved index, when a contract repeats a
    /// message type name, or when a contract has more slots than fit in
    /// the envelope.
    pub fn build(self) -> Result<MemorySchemaRegistry> {
        let mut by_name = HashMap::new();
        let mut by_index = HashMap::new();

        for (position, contract) in self.contracts.into_iter().enumerate() {
            if position > 0 && contract.index() == ERROR_CONTRACT_INDEX {
                return Err(WireError::InvalidSchema(format!(
                    "contract `{}` uses reserved index {ERROR_CONTRACT_INDEX}",
                    contract.name()
                )));
            }
            if contract.types().len() >= usize::from(crate::protocol::UNRESOLVED_MESSAGE) {
                return Err(WireError::InvalidSchema(format!(
                    "contract `{}` declares too many message types",
                    contract.name()
                )));
            }
            for (slot, message) in contract.types().iter().enumerate() {
                if contract.slot_of(message.name()) != Some(slot as u16) {
                    return Err(WireError::InvalidSchema(format!(
                        "contract `{}` declares `{}` twice",
                        contract.name(),
                        message.name()
                    )));
                }
            }

            let contract = Arc::new(contract);
            if by_name
                .insert(contract.name().to_owned(), contract.clone())
                .is_some()
            {
                return Err(WireError::InvalidSchema(format!(
                    "duplicate contract name `{}`",
                    contract.name()
                )));
            }
            if by_index.insert(contract.index(), contract.clone()).is_some() {
                return Err(WireError::InvalidSchema(format!(
                    "duplicate contract index {}",
                    contract.index()
                )));
            }
        }

        Ok(MemorySchemaRegistry { by_name, by_index })
    }
}

impl Default for SchemaRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
