//! Runtime values carried through the codec.

use crate::error::CodecError;
use avrpc_schema::{LogicalKind, Schema};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value as Json;
use std::collections::HashMap;
use uuid::Uuid;

/// A runtime value. The codec dispatches on the schema, not on the value's
/// variant alone, so a value either fits its schema position or encoding
/// fails with a type mismatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Fixed(Vec<u8>),
    /// An enum instance, carried by symbol name. Resolution is name-based
    /// so that symbol reordering between schema versions is harmless.
    Enum(String),
    Array(Vec<Value>),
    Map(HashMap<String, Value>),
    /// Record fields in host order; encoding follows schema order.
    Record(Vec<(String, Value)>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Decimal(Decimal),
}

/// An unscaled integer plus scale: the value is `unscaled * 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    pub unscaled: i128,
    pub scale: u32,
}

impl Decimal {
    pub fn new(unscaled: i128, scale: u32) -> Self {
        Self { unscaled, scale }
    }
}

impl Value {
    pub fn record<S: Into<String>>(fields: Vec<(S, Value)>) -> Value {
        Value::Record(fields.into_iter().map(|(n, v)| (n.into(), v)).collect())
    }

    /// Field lookup by name for record values.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Variant name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Fixed(_) => "fixed",
            Value::Enum(_) => "enum",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
            Value::Decimal(_) => "decimal",
        }
    }

    /// Materializes a field's JSON default under its schema, used when a
    /// reader field is absent from the writer's data.
    pub fn from_default(schema: &Schema, default: &Json) -> Result<Value, CodecError> {
        let bad = |detail: &str| CodecError::BadDefault {
            field: schema.to_string(),
            detail: detail.to_string(),
        };
        match schema {
            Schema::Null => match default {
                Json::Null => Ok(Value::Null),
                _ => Err(bad("expected null")),
            },
            Schema::Boolean => default
                .as_bool()
                .map(Value::Boolean)
                .ok_or_else(|| bad("expected boolean")),
            Schema::Int => default
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .map(Value::Int)
                .ok_or_else(|| bad("expected int")),
            Schema::Long => default
                .as_i64()
                .map(Value::Long)
                .ok_or_else(|| bad("expected long")),
            Schema::Float => default
                .as_f64()
                .map(|n| Value::Float(n as f32))
                .ok_or_else(|| bad("expected float")),
            Schema::Double => default
                .as_f64()
                .map(Value::Double)
                .ok_or_else(|| bad("expected double")),
            Schema::String => default
                .as_str()
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(|| bad("expected string")),
            // Avro encodes byte defaults as strings of code points 0-255.
            Schema::Bytes => default
                .as_str()
                .map(|s| Value::Bytes(s.chars().map(|c| c as u8).collect()))
                .ok_or_else(|| bad("expected string of bytes")),
            Schema::Fixed(f) => {
                let bytes: Vec<u8> = default
                    .as_str()
                    .map(|s| s.chars().map(|c| c as u8).collect())
                    .ok_or_else(|| bad("expected string of bytes"))?;
                if bytes.len() != f.size {
                    return Err(bad("fixed default has wrong size"));
                }
                Ok(Value::Fixed(bytes))
            }
            Schema::Enum(e) => {
                let symbol = default.as_str().ok_or_else(|| bad("expected symbol"))?;
                if !e.has_symbol(symbol) {
                    return Err(bad("symbol not in enum"));
                }
                Ok(Value::Enum(symbol.to_string()))
            }
            Schema::Array(items) => default
                .as_array()
                .ok_or_else(|| bad("expected array"))?
                .iter()
                .map(|item| Value::from_default(items, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Schema::Map(values) => default
                .as_object()
                .ok_or_else(|| bad("expected object"))?
                .iter()
                .map(|(k, v)| Ok((k.clone(), Value::from_default(values, v)?)))
                .collect::<Result<HashMap<_, _>, CodecError>>()
                .map(Value::Map),
            Schema::Record(r) => {
                let obj = default.as_object().ok_or_else(|| bad("expected object"))?;
                let mut fields = Vec::with_capacity(r.fields.len());
                for f in &r.fields {
                    let value = match obj.get(&f.name) {
                        Some(v) => Value::from_default(&f.schema, v)?,
                        None => match &f.default {
                            Some(d) => Value::from_default(&f.schema, d)?,
                            None => return Err(bad("record default missing a field")),
                        },
                    };
                    fields.push((f.name.clone(), value));
                }
                Ok(Value::Record(fields))
            }
            Schema::Union(branches) => {
                // The default belongs to the first branch it fits.
                for branch in branches {
                    if let Ok(v) = Value::from_default(branch, default) {
                        return Ok(v);
                    }
                }
                Err(bad("default fits no union branch"))
            }
            Schema::Logical { kind, inner } => {
                let raw = Value::from_default(inner, default)?;
                crate::decode::apply_logical(*kind, raw)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
