//! Protocol module - envelope header, envelope and stream reassembly.
//!
//! - 10-byte header encoding/decoding
//! - [`Envelope`], the `Call` frame carrying contract, message slot and payload
//! - [`FrameBuffer`] for accumulating partial reads on a stream

mod envelope;
mod frame_buffer;
mod wire_format;

pub use envelope::Envelope;
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    Header, DEFAULT_MAX_PAYLOAD_SIZE, ERROR_CONTRACT_INDEX, HEADER_SIZE, UNRESOLVED_MESSAGE,
};
