//! The `Call` envelope: contract index, message slot and opaque payload.
//!
//! Uses `bytes::Bytes` so payloads taken out of a [`FrameBuffer`](super::FrameBuffer)
//! are shared, not copied.
//!
//! # Example
//!
//! ```
//! use contractwire::protocol::Envelope;
//! use bytes::Bytes;
//!
//! let env = Envelope::new(3, 0, Bytes::from_static(b"hi"));
//! let bytes = env.encode();
//! let back = Envelope::decode(&bytes).unwrap();
//! assert_eq!(back.contract(), 3);
//! assert_eq!(back.payload(), b"hi");
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::{Header, HEADER_SIZE};
use crate::error::{Result, WireError};

/// A complete envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes.
    pub payload: Bytes,
}

impl Envelope {
    /// Create an envelope; the header length is taken from `payload`.
    pub fn new(contract: u32, message: u16, payload: Bytes) -> Self {
        Self {
            header: Header::new(contract, message, payload.len() as u32),
            payload,
        }
    }

    /// Build from an already decoded header and its payload.
    pub(crate) fn from_parts(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Decode exactly one envelope from `buf`.
    ///
    /// The buffer must hold the header and exactly `payload_length` bytes.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = Header::decode(buf).ok_or_else(|| {
            WireError::Protocol(format!(
                "Envelope of {} bytes is shorter than the {HEADER_SIZE}-byte header",
                buf.len()
            ))
        })?;

        let body = &buf[HEADER_SIZE..];
        if body.len() != header.payload_length as usize {
            return Err(WireError::Protocol(format!(
                "Envelope declares {} payload bytes but carries {}",
                header.payload_length,
                body.len()
            )));
        }

        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(body),
        })
    }

    /// Encode header and payload into one contiguous buffer.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_slice(&self.header.encode());
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Contract index.
    #[inline]
    pub fn contract(&self) -> u32 {
        self.header.contract
    }

    /// Message slot.
    #[inline]
    pub fn message(&self) -> u16 {
        self.header.message
    }

    /// Payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Total encoded size.
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}
