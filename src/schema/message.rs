//! Contract schemas and the message types they contain.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::codec::MsgPackCodec;
use crate::error::Result;

/// A named payload shape within a contract.
///
/// A message type may declare its fields; objects passing through it then
/// keep only those fields. Without a field list every object passes unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageType {
    name: String,
    fields: Option<Vec<String>>,
}

impl MessageType {
    /// Message type accepting any object.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: None,
        }
    }

    /// Declare a field. The first declared field switches the type to strict mode.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.get_or_insert_with(Vec::new).push(name.into());
        self
    }

    /// Fully-qualified type name used as the dispatch key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields, if any.
    pub fn fields(&self) -> Option<&[String]> {
        self.fields.as_deref()
    }

    /// Normalise a plain object into a message of this type.
    pub fn from_object(&self, value: &Value) -> Value {
        match (&self.fields, value) {
            (Some(fields), Value::Object(map)) => {
                let kept: Map<String, Value> = map
                    .iter()
                    .filter(|(key, _)| fields.iter().any(|f| f == *key))
                    .map(|(key, v)| (key.clone(), v.clone()))
                    .collect();
                Value::Object(kept)
            }
            _ => value.clone(),
        }
    }

    /// Encode an object as this message type.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        MsgPackCodec::encode(&self.from_object(value))
    }

    /// Decode bytes into an object of this message type.
    ///
    /// An empty payload decodes to an empty object.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        if bytes.is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        let value: Value = MsgPackCodec::decode(bytes)?;
        Ok(self.from_object(&value))
    }
}

/// A contract: a named, indexed group of message types.
///
/// The slot of a message type is its declaration position.
#[derive(Debug, Clone)]
pub struct ContractSchema {
    name: String,
    index: u32,
    types: Vec<Arc<MessageType>>,
}

impl ContractSchema {
    /// Create an empty contract.
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
            types: Vec::new(),
        }
    }

    /// Append a message type; it takes the next slot.
    #[must_use]
    pub fn message(mut self, message: MessageType) -> Self {
        self.types.push(Arc::new(message));
        self
    }

    /// Contract name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Contract index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// All message types in slot order.
    pub fn types(&self) -> &[Arc<MessageType>] {
        &self.types
    }

    /// Look up a message type by name.
    pub fn lookup_type(&self, name: &str) -> Option<Arc<MessageType>> {
        self.types.iter().find(|t| t.name() == name).cloned()
    }

    /// Slot of the named message type.
    pub fn slot_of(&self, name: &str) -> Option<u16> {
        self.types
            .iter()
            .position(|t| t.name() == name)
            .and_then(|pos| u16::try_from(pos).ok())
    }

    /// Type name stored at `slot`.
    pub fn type_at(&self, slot: u16) -> Option<&str> {
        self.types.get(usize::from(slot)).map(|t| t.name())
    }
}
