//! Handshake and call envelopes.
//!
//! These records ride at fixed positions in every request and response
//! body, encoded under schemas both sides hard-code, so they decode before
//! any protocol negotiation has happened. Hash fields are 16-byte MD5
//! digests of canonical protocol text; protocol payload fields are nullable
//! strings so a side only ships the full text when the other side needs it.

use crate::error::WireError;
use crate::frame::MessageReader;
use avrpc_codec::Value;
use avrpc_schema::{EnumSchema, Field, FixedSchema, ProtocolHash, RecordSchema, Schema};
use std::collections::HashMap;
use std::sync::OnceLock;

fn md5_fixed() -> Schema {
    Schema::Fixed(FixedSchema {
        name: "MD5".to_string(),
        size: 16,
    })
}

fn nullable_string() -> Schema {
    Schema::Union(vec![Schema::Null, Schema::String])
}

fn nullable_meta() -> Schema {
    Schema::Union(vec![Schema::Null, Schema::Map(Box::new(Schema::Bytes))])
}

/// Schema every peer uses for the leading request record.
pub fn handshake_request_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::Record(RecordSchema {
            name: "HandshakeRequest".to_string(),
            namespace: Some("org.apache.avro.ipc".to_string()),
            fields: vec![
                Field::new("clientHash", md5_fixed()),
                Field::new("clientProtocol", nullable_string()),
                Field::new("serverHash", md5_fixed()),
                Field::new("meta", nullable_meta()),
            ],
        })
    })
}

/// Schema every peer uses for the leading response record.
pub fn handshake_response_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::Record(RecordSchema {
            name: "HandshakeResponse".to_string(),
            namespace: Some("org.apache.avro.ipc".to_string()),
            fields: vec![
                Field::new(
                    "match",
                    Schema::Enum(EnumSchema {
                        name: "HandshakeMatch".to_string(),
                        symbols: vec![
                            "BOTH".to_string(),
                            "CLIENT".to_string(),
                            "NONE".to_string(),
                        ],
                    }),
                ),
                Field::new("serverProtocol", nullable_string()),
                Field::new(
                    "serverHash",
                    Schema::Union(vec![Schema::Null, md5_fixed()]),
                ),
                Field::new("meta", nullable_meta()),
            ],
        })
    })
}

fn call_header_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::Record(RecordSchema {
            name: "CallHeader".to_string(),
            namespace: None,
            fields: vec![
                Field::new("meta", Schema::Map(Box::new(Schema::Bytes))),
                Field::new("message", Schema::String),
            ],
        })
    })
}

fn response_header_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::Record(RecordSchema {
            name: "ResponseHeader".to_string(),
            namespace: None,
            fields: vec![
                Field::new("meta", Schema::Map(Box::new(Schema::Bytes))),
                Field::new("error", Schema::Boolean),
            ],
        })
    })
}

/// Per-call metadata, opaque byte values keyed by name.
pub type Meta = HashMap<String, Vec<u8>>;

/// Leading record of every request body.
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeRequest {
    /// Hash of the protocol the client is speaking.
    pub client_hash: ProtocolHash,
    /// Full client protocol text, sent only when the server may not have it.
    pub client_protocol: Option<String>,
    /// Hash of the protocol the client believes the server speaks.
    pub server_hash: ProtocolHash,
    pub meta: Option<Meta>,
}

impl HandshakeRequest {
    pub fn schema() -> &'static Schema {
        handshake_request_schema()
    }

    pub fn to_value(&self) -> Value {
        Value::record(vec![
            ("clientHash", Value::Fixed(self.client_hash.to_vec())),
            ("clientProtocol", opt_string_value(&self.client_protocol)),
            ("serverHash", Value::Fixed(self.server_hash.to_vec())),
            ("meta", meta_value(&self.meta)),
        ])
    }

    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        Ok(Self {
            client_hash: hash_field(value, "clientHash")?,
            client_protocol: opt_string_field(value, "clientProtocol")?,
            server_hash: hash_field(value, "serverHash")?,
            meta: meta_field(value, "meta")?,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        Ok(avrpc_codec::encode(Self::schema(), &self.to_value())?)
    }

    pub fn read(reader: &mut MessageReader<'_>) -> Result<Self, WireError> {
        Self::from_value(&reader.read_one(Self::schema())?)
    }
}

/// Outcome of handshake negotiation, as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMatch {
    /// Both hashes known: the call was also processed.
    Both,
    /// Client protocol understood, server protocol differs: the call was
    /// processed, and the server's protocol text rides along.
    Client,
    /// Client protocol unknown or incompatible: the call was not processed.
    None,
}

impl HandshakeMatch {
    pub fn symbol(self) -> &'static str {
        match self {
            HandshakeMatch::Both => "BOTH",
            HandshakeMatch::Client => "CLIENT",
            HandshakeMatch::None => "NONE",
        }
    }

    fn from_symbol(symbol: &str) -> Result<Self, WireError> {
        match symbol {
            "BOTH" => Ok(HandshakeMatch::Both),
            "CLIENT" => Ok(HandshakeMatch::Client),
            "NONE" => Ok(HandshakeMatch::None),
            _ => Err(WireError::BadEnvelope("unknown handshake match symbol")),
        }
    }
}

/// Leading record of every response body.
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeResponse {
    pub outcome: HandshakeMatch,
    /// Full server protocol text, attached on `CLIENT` and `NONE`.
    pub server_protocol: Option<String>,
    pub server_hash: Option<ProtocolHash>,
    pub meta: Option<Meta>,
}

impl HandshakeResponse {
    pub fn schema() -> &'static Schema {
        handshake_response_schema()
    }

    /// The `BOTH` response carries no protocol payload.
    pub fn both() -> Self {
        Self {
            outcome: HandshakeMatch::Both,
            server_protocol: None,
            server_hash: None,
            meta: None,
        }
    }

    pub fn to_value(&self) -> Value {
        Value::record(vec![
            ("match", Value::Enum(self.outcome.symbol().to_string())),
            ("serverProtocol", opt_string_value(&self.server_protocol)),
            (
                "serverHash",
                match &self.server_hash {
                    Some(hash) => Value::Fixed(hash.to_vec()),
                    None => Value::Null,
                },
            ),
            ("meta", meta_value(&self.meta)),
        ])
    }

    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        let outcome = match value.get("match") {
            Some(Value::Enum(symbol)) => HandshakeMatch::from_symbol(symbol)?,
            _ => return Err(WireError::BadEnvelope("missing handshake match")),
        };
        let server_hash = match value.get("serverHash") {
            Some(Value::Null) | None => None,
            Some(Value::Fixed(bytes)) => Some(
                bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| WireError::BadEnvelope("server hash is not 16 bytes"))?,
            ),
            Some(_) => return Err(WireError::BadEnvelope("server hash has wrong type")),
        };
        Ok(Self {
            outcome,
            server_protocol: opt_string_field(value, "serverProtocol")?,
            server_hash,
            meta: meta_field(value, "meta")?,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        Ok(avrpc_codec::encode(Self::schema(), &self.to_value())?)
    }

    pub fn read(reader: &mut MessageReader<'_>) -> Result<Self, WireError> {
        Self::from_value(&reader.read_one(Self::schema())?)
    }
}

/// Call metadata and message name, following the handshake request.
#[derive(Debug, Clone, PartialEq)]
pub struct CallHeader {
    pub meta: Meta,
    pub message: String,
}

impl CallHeader {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            meta: Meta::new(),
            message: message.into(),
        }
    }

    pub fn schema() -> &'static Schema {
        call_header_schema()
    }

    pub fn to_value(&self) -> Value {
        Value::record(vec![
            ("meta", plain_meta_value(&self.meta)),
            ("message", Value::String(self.message.clone())),
        ])
    }

    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        let message = match value.get("message") {
            Some(Value::String(name)) => name.clone(),
            _ => return Err(WireError::BadEnvelope("missing call message name")),
        };
        Ok(Self {
            meta: plain_meta_field(value, "meta")?,
            message,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        Ok(avrpc_codec::encode(Self::schema(), &self.to_value())?)
    }

    pub fn read(reader: &mut MessageReader<'_>) -> Result<Self, WireError> {
        Self::from_value(&reader.read_one(Self::schema())?)
    }
}

/// Response metadata and the error flag, following the handshake response.
///
/// `error = false` means the next value is the message's response schema;
/// `error = true` means it is the message's error union.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHeader {
    pub meta: Meta,
    pub error: bool,
}

impl ResponseHeader {
    pub fn ok() -> Self {
        Self {
            meta: Meta::new(),
            error: false,
        }
    }

    pub fn fault() -> Self {
        Self {
            meta: Meta::new(),
            error: true,
        }
    }

    pub fn schema() -> &'static Schema {
        response_header_schema()
    }

    pub fn to_value(&self) -> Value {
        Value::record(vec![
            ("meta", plain_meta_value(&self.meta)),
            ("error", Value::Boolean(self.error)),
        ])
    }

    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        let error = match value.get("error") {
            Some(Value::Boolean(flag)) => *flag,
            _ => return Err(WireError::BadEnvelope("missing response error flag")),
        };
        Ok(Self {
            meta: plain_meta_field(value, "meta")?,
            error,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        Ok(avrpc_codec::encode(Self::schema(), &self.to_value())?)
    }

    pub fn read(reader: &mut MessageReader<'_>) -> Result<Self, WireError> {
        Self::from_value(&reader.read_one(Self::schema())?)
    }
}

fn opt_string_value(text: &Option<String>) -> Value {
    match text {
        Some(s) => Value::String(s.clone()),
        None => Value::Null,
    }
}

fn plain_meta_value(meta: &Meta) -> Value {
    Value::Map(
        meta.iter()
            .map(|(k, v)| (k.clone(), Value::Bytes(v.clone())))
            .collect(),
    )
}

fn meta_value(meta: &Option<Meta>) -> Value {
    match meta {
        Some(m) => plain_meta_value(m),
        None => Value::Null,
    }
}

fn hash_field(value: &Value, name: &'static str) -> Result<ProtocolHash, WireError> {
    match value.get(name) {
        Some(Value::Fixed(bytes)) => bytes
            .as_slice()
            .try_into()
            .map_err(|_| WireError::BadEnvelope("hash is not 16 bytes")),
        _ => Err(WireError::BadEnvelope("missing hash field")),
    }
}

fn opt_string_field(value: &Value, name: &'static str) -> Result<Option<String>, WireError> {
    match value.get(name) {
        Some(Value::Null) | None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(WireError::BadEnvelope("string field has wrong type")),
    }
}

fn raw_meta(value: &Value) -> Result<Meta, WireError> {
    let Value::Map(entries) = value else {
        return Err(WireError::BadEnvelope("meta has wrong type"));
    };
    entries
        .iter()
        .map(|(k, v)| match v {
            Value::Bytes(b) => Ok((k.clone(), b.clone())),
            _ => Err(WireError::BadEnvelope("meta value is not bytes")),
        })
        .collect()
}

fn plain_meta_field(value: &Value, name: &'static str) -> Result<Meta, WireError> {
    match value.get(name) {
        Some(v) => raw_meta(v),
        None => Err(WireError::BadEnvelope("missing meta field")),
    }
}

fn meta_field(value: &Value, name: &'static str) -> Result<Option<Meta>, WireError> {
    match value.get(name) {
        Some(Value::Null) | None => Ok(None),
        Some(v) => raw_meta(v).map(Some),
    }
}
