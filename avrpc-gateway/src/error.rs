//! Client-side error types.

use avrpc_codec::Value;
use thiserror::Error;

/// Failure of one transport exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("endpoint returned status {0}")]
    Status(u16),

    #[error("transport failure: {0}")]
    Io(String),
}

impl TransportError {
    /// Whether retrying the same request can plausibly succeed.
    pub fn is_retryable(&self, retryable_status: &[u16]) -> bool {
        match self {
            TransportError::Status(code) => retryable_status.contains(code),
            TransportError::Io(_) => true,
        }
    }
}

/// Errors raised by [`crate::Gateway::call`].
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Wire(#[from] avrpc_wire::WireError),

    #[error(transparent)]
    Codec(#[from] avrpc_codec::CodecError),

    #[error(transparent)]
    Schema(#[from] avrpc_schema::SchemaError),

    #[error("local protocol does not declare message {0}")]
    UnknownMessage(String),

    /// The server answered `NONE`: the protocols cannot interoperate.
    /// Retrying the same protocol cannot succeed.
    #[error("server rejected the protocol as incompatible")]
    Incompatible,

    /// The callee raised a declared application error; the decoded
    /// error-union value rides along.
    #[error("application error: {0:?}")]
    Application(Value),
}

impl GatewayError {
    /// Whether the whole call may be retried. Application errors and
    /// protocol incompatibility never are; transport failures follow the
    /// configured status list.
    pub fn is_retryable(&self, retryable_status: &[u16]) -> bool {
        match self {
            GatewayError::Transport(e) => e.is_retryable(retryable_status),
            _ => false,
        }
    }
}
