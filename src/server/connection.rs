//! Handle for one accepted connection.

use std::fmt;
use std::time::{Duration, Instant, SystemTime};

use bytes::Bytes;
use serde_json::Value;

use crate::codec::WireCodec;
use crate::error::Result;
use crate::writer::WriterHandle;

/// An accepted connection, shared between its read loop and handlers.
pub struct Connection {
    id: String,
    opened_at: SystemTime,
    started: Instant,
    writer: Option<WriterHandle>,
    codec: WireCodec,
}

impl Connection {
    pub(crate) fn new(id: String, writer: WriterHandle, codec: WireCodec) -> Self {
        Self {
            id,
            opened_at: SystemTime::now(),
            started: Instant::now(),
            writer: Some(writer),
            codec,
        }
    }

    /// A connection without a transport; sends are accepted and discarded.
    ///
    /// Useful for calling handlers directly in tests.
    pub fn detached(id: impl Into<String>, codec: WireCodec) -> Self {
        Self {
            id: id.into(),
            opened_at: SystemTime::now(),
            started: Instant::now(),
            writer: None,
            codec,
        }
    }

    /// Unique connection id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the connection was accepted.
    pub fn opened_at(&self) -> SystemTime {
        self.opened_at
    }

    /// Time since the connection was accepted.
    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether this connection has no transport.
    pub fn is_detached(&self) -> bool {
        self.writer.is_none()
    }

    /// Codec bound to the server's schema registry.
    pub fn codec(&self) -> &WireCodec {
        &self.codec
    }

    /// Send an already encoded envelope.
    pub async fn send(&self, envelope: Bytes) -> Result<()> {
        match &self.writer {
            Some(writer) => writer.send(envelope).await,
            None => Ok(()),
        }
    }

    /// Pack and send `data` as `message_type` of `contract`.
    pub async fn send_message(&self, contract: &str, message_type: &str, data: &Value) -> Result<()> {
        let envelope = self.codec.pack(contract, message_type, data)?;
        self.send(envelope).await
    }

    /// Send an error envelope.
    pub async fn send_error(&self, message: &str, code: Option<i64>, context: Option<&str>) -> Result<()> {
        let envelope = self.codec.error(message, code, context)?;
        self.send(envelope).await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("opened_at", &self.opened_at)
            .field("detached", &self.writer.is_none())
            .finish()
    }
}
