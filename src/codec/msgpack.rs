//! MsgPack codec using `rmp-serde`.
//!
//! Always `to_vec_named`: structs go on the wire as maps with field names,
//! which is what dynamic peers decoding into plain objects expect.
//!
//! # Example
//!
//! ```
//! use contractwire::codec::MsgPackCodec;
//! use serde_json::json;
//!
//! let encoded = MsgPackCodec::encode(&json!({"id": "1"})).unwrap();
//! let decoded: serde_json::Value = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded["id"], "1");
//! ```

use crate::error::Result;

/// MessagePack codec for payload objects.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map).
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Order {
        id: String,
        amount: u32,
    }

    #[test]
    fn test_struct_is_encoded_as_map() {
        let encoded = MsgPackCodec::encode(&Order {
            id: "1".to_string(),
            amount: 3,
        })
        .unwrap();

        // 0x82 = fixmap with 2 entries; positional encoding would be 0x92
        assert_eq!(encoded[0], 0x82);
    }

    #[test]
    fn test_struct_decodes_as_dynamic_object() {
        let encoded = MsgPackCodec::encode(&Order {
            id: "9".to_string(),
            amount: 12,
        })
        .unwrap();

        let value: Value = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(value, json!({"id": "9", "amount": 12}));
    }

    #[test]
    fn test_dynamic_object_decodes_as_struct() {
        let encoded = MsgPackCodec::encode(&json!({"id": "2", "amount": 5})).unwrap();
        let order: Order = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(
            order,
            Order {
                id: "2".to_string(),
                amount: 5
            }
        );
    }

    #[test]
    fn test_null_is_msgpack_nil() {
        let encoded = MsgPackCodec::encode(&Value::Null).unwrap();
        assert_eq!(encoded, vec![0xc0]);
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let result: Result<Order> = MsgPackCodec::decode(b"not valid msgpack");
        assert!(result.is_err());
    }
}
