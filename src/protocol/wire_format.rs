//! Envelope header encoding and decoding.
//!
//! Every envelope starts with a fixed 10-byte header:
//! ```text
//! ┌────────────┬────────────┬────────────┐
//! │ Contract   │ Message    │ Length     │
//! │ 4 bytes    │ 2 bytes    │ 4 bytes    │
//! │ uint32 BE  │ uint16 BE  │ uint32 BE  │
//! └────────────┴────────────┴────────────┘
//! ```
//!
//! `Contract` is the contract index assigned by the schema registry,
//! `Message` is the slot of the message type inside that contract and
//! `Length` is the number of payload bytes that follow.

use crate::error::{Result, WireError};

/// Header size in bytes (fixed, exactly 10).
pub const HEADER_SIZE: usize = 10;

/// Default maximum payload size (16 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Contract index reserved for the built-in error contract.
pub const ERROR_CONTRACT_INDEX: u32 = 0;

/// Message slot written when the contract has no such message type.
///
/// Never resolves to a type name, so receivers drop it.
pub const UNRESOLVED_MESSAGE: u16 = 0xFFFF;

/// Decoded envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Contract index.
    pub contract: u32,
    /// Message slot within the contract.
    pub message: u16,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(contract: u32, message: u16, payload_length: u32) -> Self {
        Self {
            contract,
            message,
            payload_length,
        }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use contractwire::protocol::Header;
    ///
    /// let bytes = Header::new(3, 1, 100).encode();
    /// assert_eq!(bytes.len(), 10);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.contract.to_be_bytes());
        buf[4..6].copy_from_slice(&self.message.to_be_bytes());
        buf[6..10].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            contract: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            message: u16::from_be_bytes([buf[4], buf[5]]),
            payload_length: u32::from_be_bytes([buf[6], buf[7], buf[8], buf[9]]),
        })
    }

    /// Reject payloads larger than `max_payload_size`.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length > max_payload_size {
            return Err(WireError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }
        Ok(())
    }

    /// Whether the message slot is the unresolved marker.
    #[inline]
    pub fn is_unresolved(&self) -> bool {
        self.message == UNRESOLVED_MESSAGE
    }

    /// Whether the envelope targets the built-in error contract.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.contract == ERROR_CONTRACT_INDEX
    }
}
