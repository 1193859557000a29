//! Schema derivation from structural type descriptors.
//!
//! The host model layer describes a type as an ordered field list with
//! primitive tags, optional date/time/uuid/decimal markers, and nesting.
//! Derivation maps that description onto an Avro schema: primitives go
//! through a fixed table, markers become logical types, optional fields are
//! wrapped in `union[T, null]` with default `null`, and nested named types
//! are derived once and referenced thereafter.

use crate::error::SchemaError;
use crate::schema::{EnumSchema, Field, RecordSchema, Schema};
use crate::LogicalKind;
use serde_json::Value as Json;
use std::collections::HashMap;

/// A structural type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDesc {
    /// Maps to Avro `string`.
    String,
    /// Maps to Avro `long`.
    Integer,
    /// Maps to Avro `double`.
    Number,
    /// Maps to Avro `boolean`.
    Boolean,
    /// Maps to Avro `bytes`.
    Bytes,
    /// Maps to `int` + `date`.
    Date,
    /// Maps to `long` + `timestamp-micros`.
    DateTime,
    /// Maps to `long` + `time-micros`.
    Time,
    /// Maps to `string` + `uuid`.
    Uuid,
    /// Maps to `bytes` + `decimal`.
    Decimal { precision: u32, scale: u32 },
    Enum(EnumDesc),
    Array(Box<TypeDesc>),
    Map(Box<TypeDesc>),
    Object(ObjectDesc),
}

/// An enum descriptor: name plus ordered symbol list.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDesc {
    pub name: String,
    pub symbols: Vec<String>,
}

/// One field of an object descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDesc {
    pub name: String,
    pub ty: TypeDesc,
    pub required: bool,
    pub default: Option<Json>,
}

impl FieldDesc {
    pub fn required(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Json) -> Self {
        self.default = Some(default);
        self
    }
}

/// A named object descriptor: the source of a derived record schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDesc {
    pub name: String,
    pub namespace: Option<String>,
    pub fields: Vec<FieldDesc>,
}

impl ObjectDesc {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDesc>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            fields,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// Derives a record schema from an object descriptor.
pub fn derive_record(desc: &ObjectDesc) -> Result<Schema, SchemaError> {
    let mut seen = HashMap::new();
    derive_object(desc, &mut seen)
}

fn derive_object(
    desc: &ObjectDesc,
    seen: &mut HashMap<String, Schema>,
) -> Result<Schema, SchemaError> {
    if let Some(existing) = seen.get(&desc.name) {
        return Ok(existing.clone());
    }
    let mut fields = Vec::with_capacity(desc.fields.len());
    for fd in &desc.fields {
        fields.push(derive_field(fd, seen)?);
    }
    if fields.iter().enumerate().any(|(i, f)| {
        fields[..i].iter().any(|g| g.name == f.name)
    }) {
        return Err(SchemaError::UnsupportedType(format!(
            "object {} has duplicate field names",
            desc.name
        )));
    }
    let schema = Schema::Record(RecordSchema {
        name: desc.name.clone(),
        namespace: desc.namespace.clone(),
        fields,
    });
    seen.insert(desc.name.clone(), schema.clone());
    Ok(schema)
}

fn derive_field(desc: &FieldDesc, seen: &mut HashMap<String, Schema>) -> Result<Field, SchemaError> {
    let inner = derive_type(&desc.ty, seen)?;
    let (schema, default) = if desc.required {
        (inner, desc.default.clone())
    } else {
        // Optional fields become nullable and default to null unless the
        // descriptor supplies its own default.
        let default = desc.default.clone().unwrap_or(Json::Null);
        (Schema::nullable(inner), Some(default))
    };
    Ok(Field {
        name: desc.name.clone(),
        schema,
        default,
    })
}

fn derive_type(desc: &TypeDesc, seen: &mut HashMap<String, Schema>) -> Result<Schema, SchemaError> {
    match desc {
        TypeDesc::String => Ok(Schema::String),
        TypeDesc::Integer => Ok(Schema::Long),
        TypeDesc::Number => Ok(Schema::Double),
        TypeDesc::Boolean => Ok(Schema::Boolean),
        TypeDesc::Bytes => Ok(Schema::Bytes),
        TypeDesc::Date => Ok(Schema::logical(LogicalKind::Date, Schema::Int)),
        TypeDesc::DateTime => Ok(Schema::logical(LogicalKind::TimestampMicros, Schema::Long)),
        TypeDesc::Time => Ok(Schema::logical(LogicalKind::TimeMicros, Schema::Long)),
        TypeDesc::Uuid => Ok(Schema::logical(LogicalKind::Uuid, Schema::String)),
        TypeDesc::Decimal { precision, scale } => {
            if *precision == 0 || scale > precision {
                return Err(SchemaError::UnsupportedType(format!(
                    "decimal with precision {precision} and scale {scale}"
                )));
            }
            Ok(Schema::logical(
                LogicalKind::Decimal {
                    precision: *precision,
                    scale: *scale,
                },
                Schema::Bytes,
            ))
        }
        TypeDesc::Enum(e) => {
            if e.symbols.is_empty() {
                return Err(SchemaError::UnsupportedType(format!(
                    "enum {} has no symbols",
                    e.name
                )));
            }
            if e.symbols
                .iter()
                .enumerate()
                .any(|(i, s)| e.symbols[..i].contains(s))
            {
                return Err(SchemaError::UnsupportedType(format!(
                    "enum {} has duplicate symbols",
                    e.name
                )));
            }
            let schema = Schema::Enum(EnumSchema {
                name: e.name.clone(),
                symbols: e.symbols.clone(),
            });
            if let Some(existing) = seen.get(&e.name) {
                if existing != &schema {
                    return Err(SchemaError::DuplicateType(e.name.clone()));
                }
                return Ok(existing.clone());
            }
            seen.insert(e.name.clone(), schema.clone());
            Ok(schema)
        }
        TypeDesc::Array(items) => Ok(Schema::Array(Box::new(derive_type(items, seen)?))),
        TypeDesc::Map(values) => Ok(Schema::Map(Box::new(derive_type(values, seen)?))),
        TypeDesc::Object(obj) => derive_object(obj, seen),
    }
}
