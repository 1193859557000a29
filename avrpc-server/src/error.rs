//! Server-side error types.

use thiserror::Error;

/// Errors raised during handshake negotiation. These are request-level
/// faults (a malformed or unverifiable handshake), distinct from the
/// `NONE` outcome, which is a well-formed but incompatible handshake.
#[derive(Debug, Error)]
pub enum NegotiateError {
    #[error("handshake carries an unknown client hash and no protocol text")]
    MissingClientProtocol,

    #[error("client protocol hash mismatch: claimed {claimed}, digest {actual}")]
    HashMismatch { claimed: String, actual: String },

    #[error("protocol does not declare message {0}")]
    UnknownMessage(String),

    #[error(transparent)]
    Protocol(#[from] avrpc_schema::SchemaError),
}

/// Errors raised while turning one request body into one response body.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Negotiate(#[from] NegotiateError),

    #[error(transparent)]
    Wire(#[from] avrpc_wire::WireError),

    #[error(transparent)]
    Codec(#[from] avrpc_codec::CodecError),

    #[error("no handler registered for message {0}")]
    NoHandler(String),
}
