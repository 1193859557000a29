//! In-memory Avro schema representation.
//!
//! Schemas are a closed sum type so that the binary codec can match
//! exhaustively over every kind. Named types (`fixed`, `enum`, `record`)
//! are defined once per serialized document; later occurrences are emitted
//! as bare name references, and the parser resolves references by inlining
//! the registered definition.

use crate::error::SchemaError;
use serde_json::{json, Value as Json};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// An Avro schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    String,
    Bytes,
    Fixed(FixedSchema),
    Enum(EnumSchema),
    Array(Box<Schema>),
    Map(Box<Schema>),
    Record(RecordSchema),
    Union(Vec<Schema>),
    /// A logical-type annotation over its underlying primitive. The wire
    /// bytes are those of the underlying type; only the host value mapping
    /// changes.
    Logical {
        kind: LogicalKind,
        inner: Box<Schema>,
    },
}

/// A `fixed` named type: exactly `size` raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedSchema {
    pub name: String,
    pub size: usize,
}

/// An `enum` named type with an ordered, unique symbol list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSchema {
    pub name: String,
    pub symbols: Vec<String>,
}

impl EnumSchema {
    /// Position of a symbol in the declared order.
    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }
}

/// A `record` named type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub fields: Vec<Field>,
}

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Namespace-qualified name used for the document name registry.
    pub fn fullname(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

/// One record field. The default, if any, is kept in Avro's JSON encoding
/// and only materialized when schema resolution needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    pub default: Option<Json>,
}

impl Field {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Json) -> Self {
        self.default = Some(default);
        self
    }
}

/// Logical-type tags. Each attaches to a specific underlying primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalKind {
    /// Days since the Unix epoch, on `int`.
    Date,
    /// Milliseconds since midnight, on `int`.
    TimeMillis,
    /// Microseconds since midnight, on `long`.
    TimeMicros,
    /// Milliseconds since the Unix epoch, on `long`.
    TimestampMillis,
    /// Microseconds since the Unix epoch, on `long`.
    TimestampMicros,
    /// RFC 4122 textual form, on `string`.
    Uuid,
    /// Scaled two's-complement integer, on `bytes` or `fixed`.
    Decimal { precision: u32, scale: u32 },
}

impl LogicalKind {
    pub fn tag(&self) -> &'static str {
        match self {
            LogicalKind::Date => "date",
            LogicalKind::TimeMillis => "time-millis",
            LogicalKind::TimeMicros => "time-micros",
            LogicalKind::TimestampMillis => "timestamp-millis",
            LogicalKind::TimestampMicros => "timestamp-micros",
            LogicalKind::Uuid => "uuid",
            LogicalKind::Decimal { .. } => "decimal",
        }
    }
}

impl Schema {
    /// Convenience constructor for a logical-type-tagged primitive.
    pub fn logical(kind: LogicalKind, inner: Schema) -> Schema {
        Schema::Logical {
            kind,
            inner: Box::new(inner),
        }
    }

    /// Convenience constructor for the `union[T, null]` wrapping used for
    /// optional fields.
    pub fn nullable(inner: Schema) -> Schema {
        Schema::Union(vec![inner, Schema::Null])
    }

    /// The registry name of a named type, `None` for anonymous kinds.
    pub fn name(&self) -> Option<String> {
        match self {
            Schema::Fixed(f) => Some(f.name.clone()),
            Schema::Enum(e) => Some(e.name.clone()),
            Schema::Record(r) => Some(r.fullname()),
            _ => None,
        }
    }

    /// Whether this schema is a union containing a `null` branch.
    pub fn is_nullable(&self) -> bool {
        matches!(self, Schema::Union(branches) if branches.iter().any(|b| matches!(b, Schema::Null)))
    }

    /// Serializes to the deterministic JSON form used for hashing and for
    /// the protocol documents exchanged during the handshake.
    pub fn canonical_json(&self) -> Json {
        self.to_json(&mut HashSet::new())
    }

    /// Parses an Avro schema JSON document.
    pub fn parse(text: &str) -> Result<Schema, SchemaError> {
        let doc: Json = serde_json::from_str(text)?;
        Schema::from_json(&doc, &mut HashMap::new())
    }

    pub(crate) fn to_json(&self, seen: &mut HashSet<String>) -> Json {
        match self {
            Schema::Null => json!("null"),
            Schema::Boolean => json!("boolean"),
            Schema::Int => json!("int"),
            Schema::Long => json!("long"),
            Schema::Float => json!("float"),
            Schema::Double => json!("double"),
            Schema::String => json!("string"),
            Schema::Bytes => json!("bytes"),
            Schema::Fixed(f) => {
                if !seen.insert(f.name.clone()) {
                    return json!(f.name);
                }
                json!({"type": "fixed", "name": f.name, "size": f.size})
            }
            Schema::Enum(e) => {
                if !seen.insert(e.name.clone()) {
                    return json!(e.name);
                }
                json!({"type": "enum", "name": e.name, "symbols": e.symbols})
            }
            Schema::Array(items) => json!({"type": "array", "items": items.to_json(seen)}),
            Schema::Map(values) => json!({"type": "map", "values": values.to_json(seen)}),
            Schema::Record(r) => {
                if !seen.insert(r.fullname()) {
                    return json!(r.fullname());
                }
                let fields: Vec<Json> = r
                    .fields
                    .iter()
                    .map(|f| {
                        let mut obj = json!({"name": f.name, "type": f.schema.to_json(seen)});
                        if let Some(default) = &f.default {
                            obj["default"] = default.clone();
                        }
                        obj
                    })
                    .collect();
                match &r.namespace {
                    Some(ns) => {
                        json!({"type": "record", "name": r.name, "namespace": ns, "fields": fields})
                    }
                    None => json!({"type": "record", "name": r.name, "fields": fields}),
                }
            }
            Schema::Union(branches) => {
                Json::Array(branches.iter().map(|b| b.to_json(seen)).collect())
            }
            Schema::Logical { kind, inner } => {
                let mut obj = match inner.as_ref() {
                    Schema::Fixed(f) => {
                        if !seen.insert(f.name.clone()) {
                            return json!(f.name);
                        }
                        json!({"type": "fixed", "name": f.name, "size": f.size})
                    }
                    other => json!({"type": other.to_json(seen)}),
                };
                obj["logicalType"] = json!(kind.tag());
                if let LogicalKind::Decimal { precision, scale } = kind {
                    obj["precision"] = json!(precision);
                    obj["scale"] = json!(scale);
                }
                obj
            }
        }
    }

    pub(crate) fn from_json(
        doc: &Json,
        names: &mut HashMap<String, Schema>,
    ) -> Result<Schema, SchemaError> {
        match doc {
            Json::String(s) => Schema::from_name(s, names),
            Json::Array(branches) => {
                let parsed = branches
                    .iter()
                    .map(|b| Schema::from_json(b, names))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Schema::Union(parsed))
            }
            Json::Object(obj) => {
                let type_field = obj
                    .get("type")
                    .ok_or_else(|| SchemaError::InvalidSchema("missing \"type\"".into()))?;

                // A complex "type" value is a nested schema in its own right.
                let type_name = match type_field {
                    Json::String(s) => s.as_str(),
                    other => return Schema::from_json(other, names),
                };

                if let Some(tag) = obj.get("logicalType").and_then(Json::as_str) {
                    if let Some(schema) = Schema::logical_from_json(tag, type_name, obj, names)? {
                        return Ok(schema);
                    }
                    // Unknown logical tags fall through to the underlying type.
                }

                match type_name {
                    "record" => {
                        let name = require_str(obj, "name", "record")?;
                        let namespace = obj.get("namespace").and_then(Json::as_str).map(String::from);
                        let fields_doc = obj
                            .get("fields")
                            .and_then(Json::as_array)
                            .ok_or_else(|| {
                                SchemaError::InvalidSchema(format!("record {name} has no fields"))
                            })?;
                        let mut fields = Vec::with_capacity(fields_doc.len());
                        for fd in fields_doc {
                            let fobj = fd.as_object().ok_or_else(|| {
                                SchemaError::InvalidSchema(format!("bad field in record {name}"))
                            })?;
                            let fname = require_str(fobj, "name", "field")?;
                            let ftype = fobj.get("type").ok_or_else(|| {
                                SchemaError::InvalidSchema(format!("field {fname} has no type"))
                            })?;
                            fields.push(Field {
                                name: fname.to_string(),
                                schema: Schema::from_json(ftype, names)?,
                                default: fobj.get("default").cloned(),
                            });
                        }
                        let record = RecordSchema {
                            name: name.to_string(),
                            namespace,
                            fields,
                        };
                        let schema = Schema::Record(record);
                        register(names, &schema)?;
                        Ok(schema)
                    }
                    "enum" => {
                        let name = require_str(obj, "name", "enum")?;
                        let symbols = obj
                            .get("symbols")
                            .and_then(Json::as_array)
                            .ok_or_else(|| {
                                SchemaError::InvalidSchema(format!("enum {name} has no symbols"))
                            })?
                            .iter()
                            .map(|s| {
                                s.as_str().map(String::from).ok_or_else(|| {
                                    SchemaError::InvalidSchema(format!(
                                        "enum {name} has a non-string symbol"
                                    ))
                                })
                            })
                            .collect::<Result<Vec<_>, _>>()?;
                        let schema = Schema::Enum(EnumSchema {
                            name: name.to_string(),
                            symbols,
                        });
                        register(names, &schema)?;
                        Ok(schema)
                    }
                    "fixed" => {
                        let schema = Schema::Fixed(fixed_from_json(obj)?);
                        register(names, &schema)?;
                        Ok(schema)
                    }
                    "array" => {
                        let items = obj.get("items").ok_or_else(|| {
                            SchemaError::InvalidSchema("array has no items".into())
                        })?;
                        Ok(Schema::Array(Box::new(Schema::from_json(items, names)?)))
                    }
                    "map" => {
                        let values = obj.get("values").ok_or_else(|| {
                            SchemaError::InvalidSchema("map has no values".into())
                        })?;
                        Ok(Schema::Map(Box::new(Schema::from_json(values, names)?)))
                    }
                    primitive => Schema::from_name(primitive, names),
                }
            }
            other => Err(SchemaError::InvalidSchema(format!(
                "schema must be a string, array, or object, got {other}"
            ))),
        }
    }

    fn from_name(name: &str, names: &HashMap<String, Schema>) -> Result<Schema, SchemaError> {
        match name {
            "null" => Ok(Schema::Null),
            "boolean" => Ok(Schema::Boolean),
            "int" => Ok(Schema::Int),
            "long" => Ok(Schema::Long),
            "float" => Ok(Schema::Float),
            "double" => Ok(Schema::Double),
            "string" => Ok(Schema::String),
            "bytes" => Ok(Schema::Bytes),
            other => names
                .get(other)
                .cloned()
                .ok_or_else(|| SchemaError::UnknownType(other.to_string())),
        }
    }

    /// Returns `Ok(Some(..))` for a known logicalType+underlying pairing,
    /// `Ok(None)` to fall through to the plain underlying type.
    fn logical_from_json(
        tag: &str,
        type_name: &str,
        obj: &serde_json::Map<String, Json>,
        names: &mut HashMap<String, Schema>,
    ) -> Result<Option<Schema>, SchemaError> {
        let kind = match (tag, type_name) {
            ("date", "int") => LogicalKind::Date,
            ("time-millis", "int") => LogicalKind::TimeMillis,
            ("time-micros", "long") => LogicalKind::TimeMicros,
            ("timestamp-millis", "long") => LogicalKind::TimestampMillis,
            ("timestamp-micros", "long") => LogicalKind::TimestampMicros,
            ("uuid", "string") => LogicalKind::Uuid,
            ("decimal", "bytes") | ("decimal", "fixed") => {
                let precision = obj.get("precision").and_then(Json::as_u64).ok_or_else(|| {
                    SchemaError::InvalidSchema("decimal without precision".into())
                })? as u32;
                let scale = obj.get("scale").and_then(Json::as_u64).unwrap_or(0) as u32;
                LogicalKind::Decimal { precision, scale }
            }
            _ => return Ok(None),
        };
        let inner = if type_name == "fixed" {
            let schema = Schema::Fixed(fixed_from_json(obj)?);
            register(names, &schema)?;
            schema
        } else {
            Schema::from_name(type_name, names)?
        };
        Ok(Some(Schema::logical(kind, inner)))
    }
}

fn fixed_from_json(obj: &serde_json::Map<String, Json>) -> Result<FixedSchema, SchemaError> {
    let name = require_str(obj, "name", "fixed")?;
    let size = obj
        .get("size")
        .and_then(Json::as_u64)
        .ok_or_else(|| SchemaError::InvalidSchema(format!("fixed {name} has no size")))?;
    Ok(FixedSchema {
        name: name.to_string(),
        size: size as usize,
    })
}

fn require_str<'a>(
    obj: &'a serde_json::Map<String, Json>,
    key: &str,
    what: &str,
) -> Result<&'a str, SchemaError> {
    obj.get(key)
        .and_then(Json::as_str)
        .ok_or_else(|| SchemaError::InvalidSchema(format!("{what} missing \"{key}\"")))
}

fn register(names: &mut HashMap<String, Schema>, schema: &Schema) -> Result<(), SchemaError> {
    let name = schema.name().unwrap_or_default();
    match names.get(&name) {
        Some(existing) if existing != schema => Err(SchemaError::DuplicateType(name)),
        Some(_) => Ok(()),
        None => {
            names.insert(name, schema.clone());
            Ok(())
        }
    }
}

impl fmt::Display for Schema {
    /// Short description used in error messages: the kind, plus the name
    /// for named types.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Null => write!(f, "null"),
            Schema::Boolean => write!(f, "boolean"),
            Schema::Int => write!(f, "int"),
            Schema::Long => write!(f, "long"),
            Schema::Float => write!(f, "float"),
            Schema::Double => write!(f, "double"),
            Schema::String => write!(f, "string"),
            Schema::Bytes => write!(f, "bytes"),
            Schema::Fixed(x) => write!(f, "fixed {}({})", x.name, x.size),
            Schema::Enum(e) => write!(f, "enum {}", e.name),
            Schema::Array(_) => write!(f, "array"),
            Schema::Map(_) => write!(f, "map"),
            Schema::Record(r) => write!(f, "record {}", r.fullname()),
            Schema::Union(branches) => write!(f, "union of {} branches", branches.len()),
            Schema::Logical { kind, inner } => write!(f, "{} ({})", kind.tag(), inner),
        }
    }
}
