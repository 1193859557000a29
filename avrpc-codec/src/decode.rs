//! Resolving binary decode.
//!
//! Decoding takes both a reader and a writer schema. When they differ the
//! Avro resolution rules apply: record fields match by name, writer-only
//! fields are skipped, reader-only fields take their defaults, numeric
//! types widen, enums resolve by symbol name, and unions re-branch against
//! the reader.
//!
//! The top-level entry points return an explicit three-way outcome:
//! [`Decoded::Complete`] with the bytes consumed, [`Decoded::Incomplete`]
//! when the buffer ends mid-value, or `Err` for genuine corruption. Callers
//! assembling values from frames treat `Incomplete` as "read more", never
//! as a failure.

use crate::error::CodecError;
use crate::value::{Decimal, Value};
use avrpc_schema::{can_read, LogicalKind, Schema};
use std::collections::HashMap;

/// Outcome of an incremental decode attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A full value was decoded from the first `consumed` bytes.
    Complete { value: Value, consumed: usize },
    /// The buffer ended before the value did; feed more bytes and retry.
    Incomplete,
}

/// Decodes bytes written under `writer` into a value shaped by `reader`.
pub fn decode(reader: &Schema, writer: &Schema, bytes: &[u8]) -> Result<Decoded, CodecError> {
    let mut cursor = Cursor::new(bytes);
    match decode_value(reader, writer, &mut cursor) {
        Ok(value) => Ok(Decoded::Complete {
            value,
            consumed: cursor.pos,
        }),
        Err(CodecError::Incomplete) => Ok(Decoded::Incomplete),
        Err(other) => Err(other),
    }
}

/// Decodes with identical reader and writer schemas.
pub fn decode_one(schema: &Schema, bytes: &[u8]) -> Result<Decoded, CodecError> {
    decode(schema, schema, bytes)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_byte(&mut self) -> Result<u8, CodecError> {
        let byte = *self.buf.get(self.pos).ok_or(CodecError::Incomplete)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.buf.len() - self.pos < n {
            return Err(CodecError::Incomplete);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Zig-zag variable-length long.
    fn read_long(&mut self) -> Result<i64, CodecError> {
        let mut z: u64 = 0;
        for shift in (0..64).step_by(7) {
            let byte = self.read_byte()?;
            z |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(((z >> 1) as i64) ^ -((z & 1) as i64));
            }
        }
        Err(CodecError::VarintOverflow)
    }

    fn read_len(&mut self) -> Result<usize, CodecError> {
        let n = self.read_long()?;
        usize::try_from(n).map_err(|_| CodecError::InvalidLength(n))
    }
}

fn decode_value(
    reader: &Schema,
    writer: &Schema,
    cursor: &mut Cursor<'_>,
) -> Result<Value, CodecError> {
    // The writer's union branch index comes off the wire first; the result
    // then belongs to whichever reader branch can read that branch.
    if let Schema::Union(wb) = writer {
        let index = cursor.read_long()?;
        let branch = wb
            .get(usize::try_from(index).unwrap_or(usize::MAX))
            .ok_or(CodecError::BadBranchIndex {
                index,
                count: wb.len(),
            })?;
        return match reader {
            Schema::Union(_) => decode_value(resolve_branch(reader, branch)?, branch, cursor),
            _ => decode_value(reader, branch, cursor),
        };
    }
    if let Schema::Union(_) = reader {
        let branch = resolve_branch(reader, writer)?;
        return decode_value(branch, writer, cursor);
    }

    // Logical annotations do not change wire bytes; read under the writer's
    // underlying type, then apply the reader's host mapping.
    if let Schema::Logical { kind, inner } = reader {
        let raw = decode_value(inner, unwrap_logical(writer), cursor)?;
        return apply_logical(*kind, raw);
    }
    if let Schema::Logical { inner, .. } = writer {
        return decode_value(reader, inner, cursor);
    }

    match (reader, writer) {
        (Schema::Null, Schema::Null) => Ok(Value::Null),
        (Schema::Boolean, Schema::Boolean) => match cursor.read_byte()? {
            0 => Ok(Value::Boolean(false)),
            1 => Ok(Value::Boolean(true)),
            other => Err(CodecError::InvalidBoolean(other)),
        },
        (Schema::Int, Schema::Int) => {
            let n = cursor.read_long()?;
            i32::try_from(n)
                .map(Value::Int)
                .map_err(|_| CodecError::IntOutOfRange(n))
        }
        (Schema::Long, Schema::Int | Schema::Long) => cursor.read_long().map(Value::Long),
        (Schema::Float, Schema::Int | Schema::Long) => {
            cursor.read_long().map(|n| Value::Float(n as f32))
        }
        (Schema::Float, Schema::Float) => {
            let bytes = cursor.read_exact(4)?;
            Ok(Value::Float(f32::from_le_bytes(
                bytes.try_into().expect("4 bytes"),
            )))
        }
        (Schema::Double, Schema::Int | Schema::Long) => {
            cursor.read_long().map(|n| Value::Double(n as f64))
        }
        (Schema::Double, Schema::Float) => {
            let bytes = cursor.read_exact(4)?;
            Ok(Value::Double(f64::from(f32::from_le_bytes(
                bytes.try_into().expect("4 bytes"),
            ))))
        }
        (Schema::Double, Schema::Double) => {
            let bytes = cursor.read_exact(8)?;
            Ok(Value::Double(f64::from_le_bytes(
                bytes.try_into().expect("8 bytes"),
            )))
        }
        (Schema::String, Schema::String) => {
            let len = cursor.read_len()?;
            let bytes = cursor.read_exact(len)?;
            String::from_utf8(bytes.to_vec())
                .map(Value::String)
                .map_err(|_| CodecError::InvalidUtf8)
        }
        (Schema::Bytes, Schema::Bytes) => {
            let len = cursor.read_len()?;
            Ok(Value::Bytes(cursor.read_exact(len)?.to_vec()))
        }
        (Schema::Fixed(r), Schema::Fixed(w)) if r.name == w.name && r.size == w.size => {
            Ok(Value::Fixed(cursor.read_exact(w.size)?.to_vec()))
        }
        (Schema::Enum(r), Schema::Enum(w)) => {
            let index = cursor.read_long()?;
            let symbol = usize::try_from(index)
                .ok()
                .and_then(|i| w.symbols.get(i))
                .ok_or(CodecError::BadEnumIndex {
                    name: w.name.clone(),
                    index,
                })?;
            // Name-based resolution: the reader's symbol order is irrelevant,
            // but the symbol must exist for the reader.
            if !r.has_symbol(symbol) {
                return Err(CodecError::UnknownSymbol {
                    name: r.name.clone(),
                    symbol: symbol.clone(),
                });
            }
            Ok(Value::Enum(symbol.clone()))
        }
        (Schema::Array(r), Schema::Array(w)) => {
            let mut elems = Vec::new();
            loop {
                let count = cursor.read_long()?;
                if count == 0 {
                    break;
                }
                // A negative count is followed by the block's byte size.
                let count = if count < 0 {
                    cursor.read_long()?;
                    count.unsigned_abs()
                } else {
                    count as u64
                };
                for _ in 0..count {
                    elems.push(decode_value(r, w, cursor)?);
                }
            }
            Ok(Value::Array(elems))
        }
        (Schema::Map(r), Schema::Map(w)) => {
            let mut entries = HashMap::new();
            loop {
                let count = cursor.read_long()?;
                if count == 0 {
                    break;
                }
                let count = if count < 0 {
                    cursor.read_long()?;
                    count.unsigned_abs()
                } else {
                    count as u64
                };
                for _ in 0..count {
                    let key_len = cursor.read_len()?;
                    let key = String::from_utf8(cursor.read_exact(key_len)?.to_vec())
                        .map_err(|_| CodecError::InvalidUtf8)?;
                    entries.insert(key, decode_value(r, w, cursor)?);
                }
            }
            Ok(Value::Map(entries))
        }
        (Schema::Record(r), Schema::Record(w)) => {
            let mut decoded: HashMap<&str, Value> = HashMap::new();
            // Writer order governs the wire; fields the reader does not
            // know are consumed and discarded.
            for wf in &w.fields {
                match r.field(&wf.name) {
                    Some(rf) => {
                        let value = decode_value(&rf.schema, &wf.schema, cursor)?;
                        decoded.insert(rf.name.as_str(), value);
                    }
                    None => skip_value(&wf.schema, cursor)?,
                }
            }
            // Assemble in reader order, filling reader-only fields from
            // their defaults.
            let mut fields = Vec::with_capacity(r.fields.len());
            for rf in &r.fields {
                let value = match decoded.remove(rf.name.as_str()) {
                    Some(v) => v,
                    None => match &rf.default {
                        Some(default) => Value::from_default(&rf.schema, default)?,
                        None if rf.schema.is_nullable() => Value::Null,
                        None => {
                            return Err(CodecError::MissingDefault {
                                field: rf.name.clone(),
                            })
                        }
                    },
                };
                fields.push((rf.name.clone(), value));
            }
            Ok(Value::Record(fields))
        }
        (r, w) => Err(CodecError::Unresolvable {
            reader: r.to_string(),
            writer: w.to_string(),
        }),
    }
}

/// First reader branch able to read the writer schema.
fn resolve_branch<'a>(reader: &'a Schema, writer: &Schema) -> Result<&'a Schema, CodecError> {
    let Schema::Union(branches) = reader else {
        return Ok(reader);
    };
    branches
        .iter()
        .find(|b| can_read(b, writer))
        .ok_or_else(|| CodecError::Unresolvable {
            reader: reader.to_string(),
            writer: writer.to_string(),
        })
}

fn unwrap_logical(schema: &Schema) -> &Schema {
    match schema {
        Schema::Logical { inner, .. } => inner,
        other => other,
    }
}

/// Lifts a raw primitive value into the reader's logical host type.
pub(crate) fn apply_logical(kind: LogicalKind, raw: Value) -> Result<Value, CodecError> {
    match (kind, raw) {
        (LogicalKind::Date, Value::Int(days)) => crate::encode::epoch_date()
            .checked_add_signed(chrono::Duration::days(i64::from(days)))
            .map(Value::Date)
            .ok_or(CodecError::InvalidLogical {
                what: "date",
                value: i64::from(days),
            }),
        (LogicalKind::TimeMillis, Value::Int(millis)) => {
            time_from_micros(i64::from(millis) * 1_000, "time-millis")
        }
        (LogicalKind::TimeMicros, Value::Long(micros)) => time_from_micros(micros, "time-micros"),
        (LogicalKind::TimestampMillis, Value::Long(millis)) => {
            chrono::DateTime::from_timestamp_millis(millis)
                .map(Value::Timestamp)
                .ok_or(CodecError::InvalidLogical {
                    what: "timestamp-millis",
                    value: millis,
                })
        }
        (LogicalKind::TimestampMicros, Value::Long(micros)) => {
            chrono::DateTime::from_timestamp_micros(micros)
                .map(Value::Timestamp)
                .ok_or(CodecError::InvalidLogical {
                    what: "timestamp-micros",
                    value: micros,
                })
        }
        (LogicalKind::Uuid, Value::String(text)) => uuid::Uuid::parse_str(&text)
            .map(Value::Uuid)
            .map_err(|_| CodecError::InvalidUuid(text)),
        (LogicalKind::Decimal { scale, .. }, Value::Bytes(bytes) | Value::Fixed(bytes)) => {
            Ok(Value::Decimal(Decimal::new(
                twos_complement_to_i128(&bytes)?,
                scale,
            )))
        }
        (_, other) => Err(CodecError::TypeMismatch {
            schema: kind.tag().to_string(),
            value: other.type_name().to_string(),
        }),
    }
}

fn time_from_micros(micros: i64, what: &'static str) -> Result<Value, CodecError> {
    let secs = u32::try_from(micros / 1_000_000);
    let nanos = u32::try_from((micros % 1_000_000) * 1_000);
    match (secs, nanos) {
        (Ok(s), Ok(n)) => chrono::NaiveTime::from_num_seconds_from_midnight_opt(s, n)
            .map(Value::Time)
            .ok_or(CodecError::InvalidLogical {
                what,
                value: micros,
            }),
        _ => Err(CodecError::InvalidLogical {
            what,
            value: micros,
        }),
    }
}

/// Sign-extends a big-endian two's-complement byte string into an i128.
fn twos_complement_to_i128(bytes: &[u8]) -> Result<i128, CodecError> {
    if bytes.len() > 16 {
        return Err(CodecError::DecimalTooWide(bytes.len()));
    }
    if bytes.is_empty() {
        return Ok(0);
    }
    let fill = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut wide = [fill; 16];
    wide[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(i128::from_be_bytes(wide))
}

/// Consumes one value's bytes without materializing it, used for writer
/// fields the reader does not declare.
fn skip_value(schema: &Schema, cursor: &mut Cursor<'_>) -> Result<(), CodecError> {
    match schema {
        Schema::Null => Ok(()),
        Schema::Boolean => cursor.read_byte().map(|_| ()),
        Schema::Int | Schema::Long => cursor.read_long().map(|_| ()),
        Schema::Float => cursor.read_exact(4).map(|_| ()),
        Schema::Double => cursor.read_exact(8).map(|_| ()),
        Schema::String | Schema::Bytes => {
            let len = cursor.read_len()?;
            cursor.read_exact(len).map(|_| ())
        }
        Schema::Fixed(f) => cursor.read_exact(f.size).map(|_| ()),
        Schema::Enum(_) => cursor.read_long().map(|_| ()),
        Schema::Array(items) => skip_blocks(cursor, |c| skip_value(items, c)),
        Schema::Map(values) => skip_blocks(cursor, |c| {
            let key_len = c.read_len()?;
            c.read_exact(key_len)?;
            skip_value(values, c)
        }),
        Schema::Union(branches) => {
            let index = cursor.read_long()?;
            let branch = branches
                .get(usize::try_from(index).unwrap_or(usize::MAX))
                .ok_or(CodecError::BadBranchIndex {
                    index,
                    count: branches.len(),
                })?;
            skip_value(branch, cursor)
        }
        Schema::Record(r) => {
            for field in &r.fields {
                skip_value(&field.schema, cursor)?;
            }
            Ok(())
        }
        Schema::Logical { inner, .. } => skip_value(inner, cursor),
    }
}

fn skip_blocks(
    cursor: &mut Cursor<'_>,
    mut skip_item: impl FnMut(&mut Cursor<'_>) -> Result<(), CodecError>,
) -> Result<(), CodecError> {
    loop {
        let count = cursor.read_long()?;
        if count == 0 {
            return Ok(());
        }
        if count < 0 {
            // Blocks with negative counts carry their byte size: skip whole.
            let size = cursor.read_len()?;
            cursor.read_exact(size)?;
            continue;
        }
        for _ in 0..count {
            skip_item(cursor)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;
    use avrpc_schema::{EnumSchema, Field, LogicalKind, RecordSchema};
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use serde_json::json;
    use uuid::Uuid;

    fn roundtrip(schema: &Schema, value: Value) {
        let bytes = encode(schema, &value).unwrap();
        match decode_one(schema, &bytes).unwrap() {
            Decoded::Complete { value: out, consumed } => {
                assert_eq!(out, value);
                assert_eq!(consumed, bytes.len());
            }
            Decoded::Incomplete => panic!("complete value reported incomplete"),
        }
    }

    #[test]
    fn test_primitive_roundtrips() {
        roundtrip(&Schema::Null, Value::Null);
        roundtrip(&Schema::Boolean, Value::Boolean(true));
        roundtrip(&Schema::Int, Value::Int(-65536));
        roundtrip(&Schema::Long, Value::Long(-123456789));
        roundtrip(&Schema::Float, Value::Float(2.5));
        roundtrip(&Schema::Double, Value::Double(3.25));
        roundtrip(&Schema::String, Value::from("héllo"));
        roundtrip(&Schema::Bytes, Value::Bytes(vec![0, 1, 255]));
    }

    #[test]
    fn test_container_roundtrips() {
        roundtrip(
            &Schema::Array(Box::new(Schema::Long)),
            Value::Array(vec![Value::Long(1), Value::Long(-2), Value::Long(3)]),
        );
        let mut map = HashMap::new();
        map.insert("a".to_string(), Value::Boolean(true));
        map.insert("b".to_string(), Value::Boolean(false));
        roundtrip(&Schema::Map(Box::new(Schema::Boolean)), Value::Map(map));
    }

    #[test]
    fn test_nested_record_roundtrip() {
        let inner = Schema::Record(RecordSchema {
            name: "Inner".to_string(),
            namespace: None,
            fields: vec![Field::new("x", Schema::Long)],
        });
        let outer = Schema::Record(RecordSchema {
            name: "Outer".to_string(),
            namespace: None,
            fields: vec![
                Field::new("inner", inner),
                Field::new("tag", Schema::nullable(Schema::String)),
            ],
        });
        roundtrip(
            &outer,
            Value::record(vec![
                ("inner", Value::record(vec![("x", Value::Long(9))])),
                ("tag", Value::from("t")),
            ]),
        );
    }

    #[test]
    fn test_logical_roundtrips() {
        roundtrip(
            &Schema::logical(LogicalKind::Date, Schema::Int),
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
        );
        roundtrip(
            &Schema::logical(LogicalKind::TimeMillis, Schema::Int),
            Value::Time(NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap()),
        );
        roundtrip(
            &Schema::logical(LogicalKind::TimeMicros, Schema::Long),
            Value::Time(NaiveTime::from_hms_micro_opt(13, 37, 5, 250).unwrap()),
        );
        roundtrip(
            &Schema::logical(LogicalKind::TimestampMillis, Schema::Long),
            Value::Timestamp(chrono::DateTime::from_timestamp_millis(1_700_000_000_123).unwrap()),
        );
        roundtrip(
            &Schema::logical(LogicalKind::TimestampMicros, Schema::Long),
            Value::Timestamp(Utc.with_ymd_and_hms(2021, 6, 1, 8, 30, 0).unwrap()),
        );
        roundtrip(
            &Schema::logical(LogicalKind::Uuid, Schema::String),
            Value::Uuid(Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap()),
        );
        for scale in [0u32, 2, 6] {
            roundtrip(
                &Schema::logical(
                    LogicalKind::Decimal {
                        precision: 20,
                        scale,
                    },
                    Schema::Bytes,
                ),
                Value::Decimal(Decimal::new(-1234567, scale)),
            );
        }
    }

    #[test]
    fn test_decimal_on_fixed_roundtrip() {
        let schema = Schema::logical(
            LogicalKind::Decimal {
                precision: 10,
                scale: 2,
            },
            Schema::Fixed(avrpc_schema::FixedSchema {
                name: "Dec8".to_string(),
                size: 8,
            }),
        );
        let bytes = encode(&schema, &Value::Decimal(Decimal::new(-42, 2))).unwrap();
        assert_eq!(bytes.len(), 8);
        // Left-padded with the sign byte.
        assert_eq!(&bytes[..7], &[0xFF; 7]);
        let Decoded::Complete { value, .. } = decode_one(&schema, &bytes).unwrap() else {
            panic!("incomplete");
        };
        assert_eq!(value, Value::Decimal(Decimal::new(-42, 2)));
    }

    #[test]
    fn test_schema_evolution_drops_and_defaults() {
        let writer = Schema::Record(RecordSchema {
            name: "V".to_string(),
            namespace: None,
            fields: vec![
                Field::new("a", Schema::Long),
                Field::new("b", Schema::String),
            ],
        });
        let reader = Schema::Record(RecordSchema {
            name: "V".to_string(),
            namespace: None,
            fields: vec![
                Field::new("a", Schema::Long),
                Field::new("c", Schema::String).with_default(json!("fallback")),
            ],
        });
        let bytes = encode(
            &writer,
            &Value::record(vec![("a", Value::Long(5)), ("b", Value::from("dropped"))]),
        )
        .unwrap();
        let Decoded::Complete { value, .. } = decode(&reader, &writer, &bytes).unwrap() else {
            panic!("incomplete");
        };
        assert_eq!(
            value,
            Value::record(vec![("a", Value::Long(5)), ("c", Value::from("fallback"))])
        );
    }

    #[test]
    fn test_skips_writer_only_container_fields() {
        let writer = Schema::Record(RecordSchema {
            name: "V".to_string(),
            namespace: None,
            fields: vec![
                Field::new("a", Schema::Long),
                Field::new("tags", Schema::Array(Box::new(Schema::String))),
                Field::new("attrs", Schema::Map(Box::new(Schema::Long))),
                Field::new("b", Schema::String),
            ],
        });
        let reader = Schema::Record(RecordSchema {
            name: "V".to_string(),
            namespace: None,
            fields: vec![
                Field::new("a", Schema::Long),
                Field::new("b", Schema::String),
            ],
        });
        let mut attrs = HashMap::new();
        attrs.insert("k".to_string(), Value::Long(1));
        let bytes = encode(
            &writer,
            &Value::record(vec![
                ("a", Value::Long(5)),
                (
                    "tags",
                    Value::Array(vec![Value::from("x"), Value::from("y")]),
                ),
                ("attrs", Value::Map(attrs)),
                ("b", Value::from("kept")),
            ]),
        )
        .unwrap();
        let Decoded::Complete { value, consumed } = decode(&reader, &writer, &bytes).unwrap()
        else {
            panic!("incomplete");
        };
        assert_eq!(consumed, bytes.len());
        assert_eq!(
            value,
            Value::record(vec![("a", Value::Long(5)), ("b", Value::from("kept"))])
        );
    }

    #[test]
    fn test_skips_size_prefixed_array_blocks() {
        // A writer-only array field encoded with a negative block count,
        // which carries the block's byte size: the skip consumes the whole
        // block without walking the items.
        let writer = Schema::Record(RecordSchema {
            name: "V".to_string(),
            namespace: None,
            fields: vec![
                Field::new("n", Schema::Array(Box::new(Schema::Long))),
                Field::new("z", Schema::Boolean),
            ],
        });
        let reader = Schema::Record(RecordSchema {
            name: "V".to_string(),
            namespace: None,
            fields: vec![Field::new("z", Schema::Boolean)],
        });
        // count -2, block size 2, items 1 and 2, terminator, then z = true.
        let bytes = [0x03, 0x04, 0x02, 0x04, 0x00, 0x01];
        let Decoded::Complete { value, .. } = decode(&reader, &writer, &bytes).unwrap() else {
            panic!("incomplete");
        };
        assert_eq!(value, Value::record(vec![("z", Value::Boolean(true))]));
    }

    #[test]
    fn test_numeric_widening_on_decode() {
        let bytes = encode(&Schema::Int, &Value::Int(7)).unwrap();
        let Decoded::Complete { value, .. } = decode(&Schema::Long, &Schema::Int, &bytes).unwrap()
        else {
            panic!("incomplete");
        };
        assert_eq!(value, Value::Long(7));

        let bytes = encode(&Schema::Long, &Value::Long(7)).unwrap();
        let Decoded::Complete { value, .. } =
            decode(&Schema::Double, &Schema::Long, &bytes).unwrap()
        else {
            panic!("incomplete");
        };
        assert_eq!(value, Value::Double(7.0));
    }

    #[test]
    fn test_enum_symbol_survives_reorder() {
        let writer = Schema::Enum(EnumSchema {
            name: "Color".to_string(),
            symbols: vec!["RED".to_string(), "GREEN".to_string(), "BLUE".to_string()],
        });
        let reader = Schema::Enum(EnumSchema {
            name: "Color".to_string(),
            symbols: vec!["BLUE".to_string(), "RED".to_string(), "GREEN".to_string()],
        });
        let bytes = encode(&writer, &Value::Enum("BLUE".to_string())).unwrap();
        let Decoded::Complete { value, .. } = decode(&reader, &writer, &bytes).unwrap() else {
            panic!("incomplete");
        };
        assert_eq!(value, Value::Enum("BLUE".to_string()));
    }

    #[test]
    fn test_unknown_symbol_is_error() {
        let writer = Schema::Enum(EnumSchema {
            name: "Color".to_string(),
            symbols: vec!["RED".to_string(), "MAUVE".to_string()],
        });
        let reader = Schema::Enum(EnumSchema {
            name: "Color".to_string(),
            symbols: vec!["RED".to_string()],
        });
        let bytes = encode(&writer, &Value::Enum("MAUVE".to_string())).unwrap();
        assert!(matches!(
            decode(&reader, &writer, &bytes),
            Err(CodecError::UnknownSymbol { .. })
        ));
    }

    #[test]
    fn test_union_rebranch_against_reader() {
        let writer = Schema::Union(vec![Schema::String, Schema::Null]);
        let reader = Schema::Union(vec![Schema::Null, Schema::String]);
        let bytes = encode(&writer, &Value::from("x")).unwrap();
        let Decoded::Complete { value, .. } = decode(&reader, &writer, &bytes).unwrap() else {
            panic!("incomplete");
        };
        assert_eq!(value, Value::String("x".to_string()));
    }

    #[test]
    fn test_truncated_input_is_incomplete_not_error() {
        let bytes = encode(&Schema::String, &Value::from("truncate me")).unwrap();
        for cut in 0..bytes.len() {
            assert_eq!(
                decode_one(&Schema::String, &bytes[..cut]).unwrap(),
                Decoded::Incomplete,
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn test_trailing_bytes_reported_via_consumed() {
        let mut bytes = encode(&Schema::Long, &Value::Long(1)).unwrap();
        let value_len = bytes.len();
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        let Decoded::Complete { consumed, .. } = decode_one(&Schema::Long, &bytes).unwrap() else {
            panic!("incomplete");
        };
        assert_eq!(consumed, value_len);
    }

    #[test]
    fn test_malformed_boolean_is_error() {
        assert!(matches!(
            decode_one(&Schema::Boolean, &[7]),
            Err(CodecError::InvalidBoolean(7))
        ));
    }

    #[test]
    fn test_bad_union_index_is_error() {
        let schema = Schema::nullable(Schema::Long);
        // Index 9 with no such branch.
        assert!(matches!(
            decode_one(&schema, &[0x12]),
            Err(CodecError::BadBranchIndex { .. })
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_long_roundtrip(n in any::<i64>()) {
                let bytes = encode(&Schema::Long, &Value::Long(n)).unwrap();
                let Decoded::Complete { value, consumed } =
                    decode_one(&Schema::Long, &bytes).unwrap()
                else {
                    panic!("incomplete");
                };
                prop_assert_eq!(value, Value::Long(n));
                prop_assert_eq!(consumed, bytes.len());
            }

            #[test]
            fn prop_string_roundtrip(s in ".{0,64}") {
                let bytes = encode(&Schema::String, &Value::from(s.as_str())).unwrap();
                let Decoded::Complete { value, .. } =
                    decode_one(&Schema::String, &bytes).unwrap()
                else {
                    panic!("incomplete");
                };
                prop_assert_eq!(value, Value::String(s));
            }

            #[test]
            fn prop_bytes_roundtrip(b in proptest::collection::vec(any::<u8>(), 0..64)) {
                let bytes = encode(&Schema::Bytes, &Value::Bytes(b.clone())).unwrap();
                let Decoded::Complete { value, .. } =
                    decode_one(&Schema::Bytes, &bytes).unwrap()
                else {
                    panic!("incomplete");
                };
                prop_assert_eq!(value, Value::Bytes(b));
            }

            #[test]
            fn prop_decimal_roundtrip(n in any::<i64>(), scale in 0u32..10) {
                let schema = Schema::logical(
                    LogicalKind::Decimal { precision: 38, scale },
                    Schema::Bytes,
                );
                let d = Value::Decimal(Decimal::new(i128::from(n), scale));
                let bytes = encode(&schema, &d).unwrap();
                let Decoded::Complete { value, .. } = decode_one(&schema, &bytes).unwrap()
                else {
                    panic!("incomplete");
                };
                prop_assert_eq!(value, d);
            }
        }
    }
}
