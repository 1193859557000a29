//! # avrpc-wire
//!
//! Message framing and handshake envelopes for avrpc.
//!
//! A message body is a sequence of length-prefixed frames closed by a
//! zero-length terminator. Decoded values are not aligned to frame
//! boundaries; [`MessageReader`] pools payloads and retries decoding as
//! frames arrive. The handshake, call-header, and response-header records
//! in [`handshake`] ride at fixed positions in every body under schemas
//! both peers hard-code.

pub mod error;
pub mod frame;
pub mod handshake;

pub use error::WireError;
pub use frame::{frame, frames, unframe, Frames, MessageBuilder, MessageReader, FRAME_HEADER_SIZE};
pub use handshake::{
    CallHeader, HandshakeMatch, HandshakeRequest, HandshakeResponse, Meta, ResponseHeader,
};
