//! Reassembles envelopes from a byte stream.
//!
//! Reads on a persistent connection deliver arbitrary chunks: half a
//! header, several envelopes at once, a payload split across reads. The
//! buffer runs a two-state machine:
//! - `WaitingForHeader`: need at least 10 bytes
//! - `WaitingForPayload`: header parsed and validated, need N more bytes
//!
//! # Example
//!
//! ```
//! use contractwire::protocol::{Envelope, FrameBuffer};
//! use bytes::Bytes;
//!
//! let bytes = Envelope::new(3, 0, Bytes::from_static(b"abc")).encode();
//! let mut buffer = FrameBuffer::new();
//!
//! assert!(buffer.push(&bytes[..4]).unwrap().is_empty());
//! let envelopes = buffer.push(&bytes[4..]).unwrap();
//! assert_eq!(envelopes.len(), 1);
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Envelope;
use crate::error::Result;

#[derive(Debug, Clone)]
enum State {
    WaitingForHeader,
    WaitingForPayload { header: Header },
}

/// Buffer for accumulating incoming bytes and extracting complete envelopes.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Create a frame buffer with a 64KB initial capacity and the default payload cap.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a frame buffer with a custom payload cap.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForHeader,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete envelopes.
    ///
    /// Partial data stays buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a header announces a payload larger than
    /// the configured cap. The stream cannot be resynchronised after that,
    /// so callers should drop the connection.
    ///
    /// Envelopes completed before an oversize header are lost with the
    /// error; use [`extend`](Self::extend) and
    /// [`next_envelope`](Self::next_envelope) to keep them.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Envelope>> {
        self.extend(data);

        let mut envelopes = Vec::new();
        while let Some(envelope) = self.next_envelope()? {
            envelopes.push(envelope);
        }
        Ok(envelopes)
    }

    /// Append data without extracting anything.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next complete envelope, if one is buffered.
    ///
    /// # Errors
    ///
    /// Returns a protocol error when the next header announces an oversize
    /// payload. Envelopes returned by earlier calls are unaffected.
    pub fn next_envelope(&mut self) -> Result<Option<Envelope>> {
        loop {
            match &self.state {
                State::WaitingForHeader => {
                    let Some(header) = Header::decode(&self.buffer) else {
                        return Ok(None);
                    };
                    header.validate(self.max_payload_size)?;

                    let _ = self.buffer.split_to(HEADER_SIZE);

                    if header.payload_length == 0 {
                        return Ok(Some(Envelope::from_parts(header, Bytes::new())));
                    }
                    self.state = State::WaitingForPayload { header };
                }
                State::WaitingForPayload { header } => {
                    let header = *header;
                    let remaining = header.payload_length as usize;
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }

                    let payload = self.buffer.split_to(remaining).freeze();
                    self.state = State::WaitingForHeader;
                    return Ok(Some(Envelope::from_parts(header, payload)));
                }
            }
        }
    }

    /// Number of buffered bytes not yet returned as envelopes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
