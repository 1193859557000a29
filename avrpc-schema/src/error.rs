//! Schema error types.

use thiserror::Error;

/// Errors raised while deriving, parsing, or serializing schemas.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("unknown type name: {0}")]
    UnknownType(String),

    #[error("type {0} defined more than once")]
    DuplicateType(String),

    #[error("invalid schema document: {0}")]
    InvalidSchema(String),

    #[error("invalid protocol document: {0}")]
    InvalidProtocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
