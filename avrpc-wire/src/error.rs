//! Wire-level error types.

use thiserror::Error;

/// Errors raised while framing or unframing messages.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("frame declares {needed} payload bytes but only {available} remain")]
    TruncatedFrame { needed: usize, available: usize },

    #[error("message ended before a complete value was decoded")]
    TruncatedMessage,

    #[error("frame payload of {0} bytes exceeds the 32-bit length prefix")]
    FrameTooLarge(usize),

    #[error("malformed envelope: {0}")]
    BadEnvelope(&'static str),

    #[error(transparent)]
    Codec(#[from] avrpc_codec::CodecError),
}
