//! Codec error types.

use thiserror::Error;

/// Errors raised while encoding or decoding binary values.
///
/// `Incomplete` is an internal signal: the top-level decode entry point
/// turns it into [`crate::Decoded::Incomplete`] so callers can pull more
/// frames without treating truncation as corruption.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("type mismatch: {value} does not fit schema {schema}")]
    TypeMismatch { schema: String, value: String },

    #[error("not enough bytes to complete a value")]
    Incomplete,

    #[error("unknown symbol {symbol} for enum {name}")]
    UnknownSymbol { name: String, symbol: String },

    #[error("enum index {index} out of range for enum {name}")]
    BadEnumIndex { name: String, index: i64 },

    #[error("union branch index {index} out of range ({count} branches)")]
    BadBranchIndex { index: i64, count: usize },

    #[error("no union branch accepts value {0}")]
    NoBranch(String),

    #[error("invalid boolean byte {0:#04x}")]
    InvalidBoolean(u8),

    #[error("invalid length {0}")]
    InvalidLength(i64),

    #[error("int value {0} out of range")]
    IntOutOfRange(i64),

    #[error("invalid UTF-8 in string value")]
    InvalidUtf8,

    #[error("invalid uuid text: {0}")]
    InvalidUuid(String),

    #[error("invalid {what} value {value}")]
    InvalidLogical { what: &'static str, value: i64 },

    #[error("decimal of {0} bytes exceeds the supported 16-byte range")]
    DecimalTooWide(usize),

    #[error("decimal does not fit in fixed of size {0}")]
    DecimalTooLarge(usize),

    #[error("variable-length integer longer than 10 bytes")]
    VarintOverflow,

    #[error("cannot resolve reader schema {reader} against writer schema {writer}")]
    Unresolvable { reader: String, writer: String },

    #[error("reader field {field} absent from writer data and has no default")]
    MissingDefault { field: String },

    #[error("invalid default for field {field}: {detail}")]
    BadDefault { field: String, detail: String },
}

impl CodecError {
    pub(crate) fn mismatch(schema: &avrpc_schema::Schema, value: &crate::Value) -> Self {
        CodecError::TypeMismatch {
            schema: schema.to_string(),
            value: value.type_name().to_string(),
        }
    }
}
