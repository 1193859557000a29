//! Reader/writer schema compatibility.
//!
//! `can_read(reader, writer)` answers whether bytes written under `writer`
//! can be decoded under `reader` following Avro schema resolution: records
//! match field-by-name with defaults covering reader-only fields, numeric
//! types widen int -> long -> float -> double, enums require the writer's
//! symbols to be a subset of the reader's, and unions resolve branch-wise.

use crate::schema::Schema;

/// Whether a reader using `reader` can decode values written under `writer`.
pub fn can_read(reader: &Schema, writer: &Schema) -> bool {
    let reader = unwrap_logical(reader);
    let writer = unwrap_logical(writer);
    match (reader, writer) {
        // Every writer branch must be readable; a non-union writer must be
        // readable by some reader branch.
        (Schema::Union(rs), Schema::Union(ws)) => {
            ws.iter().all(|w| rs.iter().any(|r| can_read(r, w)))
        }
        (Schema::Union(rs), w) => rs.iter().any(|r| can_read(r, w)),
        (r, Schema::Union(ws)) => ws.iter().all(|w| can_read(r, w)),

        (Schema::Null, Schema::Null)
        | (Schema::Boolean, Schema::Boolean)
        | (Schema::Int, Schema::Int)
        | (Schema::String, Schema::String)
        | (Schema::Bytes, Schema::Bytes) => true,

        (Schema::Long, Schema::Int | Schema::Long) => true,
        (Schema::Float, Schema::Int | Schema::Long | Schema::Float) => true,
        (Schema::Double, Schema::Int | Schema::Long | Schema::Float | Schema::Double) => true,

        (Schema::Array(r), Schema::Array(w)) => can_read(r, w),
        (Schema::Map(r), Schema::Map(w)) => can_read(r, w),

        (Schema::Fixed(r), Schema::Fixed(w)) => r.name == w.name && r.size == w.size,

        (Schema::Enum(r), Schema::Enum(w)) => {
            r.name == w.name && w.symbols.iter().all(|s| r.has_symbol(s))
        }

        (Schema::Record(r), Schema::Record(w)) => {
            r.name == w.name
                && r.fields.iter().all(|rf| match w.field(&rf.name) {
                    // Shared fields must themselves resolve.
                    Some(wf) => can_read(&rf.schema, &wf.schema),
                    // Reader-only fields need a default; a nullable union
                    // counts as defaulted to null.
                    None => rf.default.is_some() || rf.schema.is_nullable(),
                })
        }

        _ => false,
    }
}

/// Resolution works on the underlying primitive of a logical type; the
/// annotation only changes host value mapping.
fn unwrap_logical(schema: &Schema) -> &Schema {
    match schema {
        Schema::Logical { inner, .. } => inner,
        other => other,
    }
}
