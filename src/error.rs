//! Error types for contractwire.

use thiserror::Error;

/// Main error type for all contractwire operations.
#[derive(Debug, Error)]
pub enum WireError {
    /// I/O error on a connection or listener.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON conversion error (payload objects, configuration).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (truncated envelope, oversize payload, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Outbound message addressed to a contract the schema registry does not know.
    #[error("Unknown contract: {0}")]
    UnknownContract(String),

    /// Schema registry definition is inconsistent.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Handler registrations failed validation when the dispatch table was built.
    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    /// A handler constructor asked for a dependency nobody provides.
    #[error("Missing dependency `{dependency}` for {class}")]
    MissingDependency {
        /// Handler type being constructed.
        class: String,
        /// Declared dependency name.
        dependency: String,
    },

    /// Handler argument at the given index is absent or of another kind.
    #[error("Invalid argument at index {0}")]
    InvalidArgument(usize),

    /// Error raised by handler code.
    #[error("Handler error: {0}")]
    Handler(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using WireError.
pub type Result<T> = std::result::Result<T, WireError>;
