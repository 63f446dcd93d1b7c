//! Outbound envelope building.
//!
//! [`WireCodec::pack`] is the path handlers use to answer on a connection.
//! It fails fast on an unknown contract because outbound addressing is
//! under the caller's control. [`WireCodec::encode`] returns `None` for an
//! unknown schema so optional encodings can be skipped.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, WireError};
use crate::protocol::{Envelope, UNRESOLVED_MESSAGE};
use crate::schema::{SchemaRegistry, ERROR_CONTRACT, ERROR_MESSAGE};

/// Payload of the built-in error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Human-readable message.
    pub message: String,
    /// Optional numeric code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// Optional free-form context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Builds and reads envelopes against a schema registry.
///
/// Cheap to clone; the registry is shared.
#[derive(Clone)]
pub struct WireCodec {
    schemas: Arc<dyn SchemaRegistry>,
}

impl WireCodec {
    /// Create a codec over the given registry.
    pub fn new(schemas: Arc<dyn SchemaRegistry>) -> Self {
        Self { schemas }
    }

    /// The registry this codec resolves against.
    pub fn schemas(&self) -> &Arc<dyn SchemaRegistry> {
        &self.schemas
    }

    /// Encode `data` as `type_name` of the schema stored under `schema_key`.
    ///
    /// Returns `Ok(None)` when the schema or the type is unknown.
    pub fn encode(&self, schema_key: &str, type_name: &str, data: &Value) -> Result<Option<Bytes>> {
        let Some(message) = self
            .schemas
            .retrieve(schema_key)
            .and_then(|schema| schema.lookup_type(type_name))
        else {
            return Ok(None);
        };
        Ok(Some(Bytes::from(message.encode(data)?)))
    }

    /// Build a complete envelope for `message_type` of `contract`.
    ///
    /// When the contract lacks the message type the envelope still goes out,
    /// with an empty payload and the unresolved slot.
    ///
    /// # Errors
    ///
    /// [`WireError::UnknownContract`] when the contract is not registered.
    pub fn pack(&self, contract: &str, message_type: &str, data: &Value) -> Result<Bytes> {
        let schema = self
            .schemas
            .retrieve(contract)
            .ok_or_else(|| WireError::UnknownContract(contract.to_owned()))?;

        let (slot, payload) = match (schema.slot_of(message_type), schema.lookup_type(message_type)) {
            (Some(slot), Some(message)) => (slot, Bytes::from(message.encode(data)?)),
            _ => (UNRESOLVED_MESSAGE, Bytes::new()),
        };

        Ok(Envelope::new(schema.index(), slot, payload).encode())
    }

    /// Build an envelope of the built-in error message.
    pub fn error(&self, message: &str, code: Option<i64>, context: Option<&str>) -> Result<Bytes> {
        let body = ErrorMessage {
            message: message.to_owned(),
            code,
            context: context.map(str::to_owned),
        };
        self.pack(ERROR_CONTRACT, ERROR_MESSAGE, &serde_json::to_value(body)?)
    }

    /// Decode one complete envelope.
    pub fn unpack(&self, bytes: &[u8]) -> Result<Envelope> {
        Envelope::decode(bytes)
    }

    /// Resolve an envelope's type name and decode its payload.
    ///
    /// Returns `Ok(None)` when the contract or slot is unknown.
    pub fn decode_payload(&self, envelope: &Envelope) -> Result<Option<(String, Value)>> {
        let Some(schema) = self.schemas.retrieve_by_index(envelope.contract()) else {
            return Ok(None);
        };
        let Some(message) = schema
            .type_at(envelope.message())
            .and_then(|name| schema.lookup_type(name))
        else {
            return Ok(None);
        };
        let value = message.decode(envelope.payload())?;
        Ok(Some((message.name().to_owned(), value)))
    }

    /// Decode an error envelope produced by [`WireCodec::error`].
    pub fn decode_error(&self, bytes: &[u8]) -> Result<ErrorMessage> {
        let envelope = self.unpack(bytes)?;
        match self.decode_payload(&envelope)? {
            Some((name, value)) if name == ERROR_MESSAGE && envelope.header.is_error() => {
                Ok(serde_json::from_value(value)?)
            }
            _ => Err(WireError::Protocol(format!(
                "envelope for contract {} slot {} is not an error",
                envelope.contract(),
                envelope.message()
            ))),
        }
    }
}

impl std::fmt::Debug for WireCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireCodec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HEADER_SIZE;
    use crate::schema::{ContractSchema, MemorySchemaRegistry, MessageType};
    use serde_json::json;

    fn codec() -> WireCodec {
        let schemas = MemorySchemaRegistry::builder()
            .contract(
                ContractSchema::new("order", 3)
                    .message(MessageType::new("GetAllOrderRequest"))
                    .message(MessageType::new("AddOrderRequest").field("id")),
            )
            .build()
            .unwrap();
        WireCodec::new(Arc::new(schemas))
    }

    #[test]
    fn test_pack_resolves_contract_and_slot() {
        let codec = codec();
        let bytes = codec
            .pack("order", "AddOrderRequest", &json!({"id": "1", "dropped": 2}))
            .unwrap();

        let envelope = codec.unpack(&bytes).unwrap();
        assert_eq!(envelope.contract(), 3);
        assert_eq!(envelope.message(), 1);

        let (name, value) = codec.decode_payload(&envelope).unwrap().unwrap();
        assert_eq!(name, "AddOrderRequest");
        assert_eq!(value, json!({"id": "1"}));
    }

    #[test]
    fn test_pack_unknown_contract_fails() {
        let err = codec().pack("invoice", "X", &json!({})).unwrap_err();
        assert!(matches!(err, WireError::UnknownContract(name) if name == "invoice"));
    }

    #[test]
    fn test_pack_unknown_type_sends_empty_payload() {
        let codec = codec();
        let bytes = codec
            .pack("order", "AddOrderResponse", &json!({"id": "1"}))
            .unwrap();

        assert_eq!(bytes.len(), HEADER_SIZE);
        let envelope = codec.unpack(&bytes).unwrap();
        assert_eq!(envelope.contract(), 3);
        assert_eq!(envelope.message(), UNRESOLVED_MESSAGE);
        assert!(envelope.payload().is_empty());
        assert!(codec.decode_payload(&envelope).unwrap().is_none());
    }

    #[test]
    fn test_encode_unknown_schema_is_none() {
        let codec = codec();
        assert!(codec.encode("invoice", "X", &json!({})).unwrap().is_none());
        assert!(codec.encode("order", "Missing", &json!({})).unwrap().is_none());
        assert!(codec
            .encode("order", "GetAllOrderRequest", &json!({}))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_error_round_trip() {
        let codec = codec();
        let bytes = codec.error("x", Some(42), Some("ctx")).unwrap();

        let decoded = codec.decode_error(&bytes).unwrap();
        assert_eq!(
            decoded,
            ErrorMessage {
                message: "x".to_string(),
                code: Some(42),
                context: Some("ctx".to_string()),
            }
        );
    }

    #[test]
    fn test_error_without_optional_fields() {
        let codec = codec();
        let bytes = codec.error("boom", None, None).unwrap();
        let decoded = codec.decode_error(&bytes).unwrap();
        assert_eq!(decoded.message, "boom");
        assert!(decoded.code.is_none());
        assert!(decoded.context.is_none());
    }

    #[test]
    fn test_decode_error_rejects_regular_message() {
        let codec = codec();
        let bytes = codec.pack("order", "GetAllOrderRequest", &json!({})).unwrap();
        assert!(codec.decode_error(&bytes).is_err());
    }
}
