//! Schema-directed binary encoding.

use crate::error::CodecError;
use crate::value::{Decimal, Value};
use avrpc_schema::{EnumSchema, LogicalKind, Schema};
use chrono::Timelike;

/// Encodes a value against a schema into fresh bytes.
pub fn encode(schema: &Schema, value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    encode_into(schema, value, &mut buf)?;
    Ok(buf)
}

/// Encodes a value against a schema, appending to `buf`.
pub fn encode_into(schema: &Schema, value: &Value, buf: &mut Vec<u8>) -> Result<(), CodecError> {
    match schema {
        Schema::Null => match value {
            Value::Null => Ok(()),
            other => Err(CodecError::mismatch(schema, other)),
        },
        Schema::Boolean => match value {
            Value::Boolean(b) => {
                buf.push(u8::from(*b));
                Ok(())
            }
            other => Err(CodecError::mismatch(schema, other)),
        },
        Schema::Int => match value {
            Value::Int(n) => {
                write_long(i64::from(*n), buf);
                Ok(())
            }
            other => Err(CodecError::mismatch(schema, other)),
        },
        Schema::Long => match value {
            Value::Long(n) => {
                write_long(*n, buf);
                Ok(())
            }
            Value::Int(n) => {
                write_long(i64::from(*n), buf);
                Ok(())
            }
            other => Err(CodecError::mismatch(schema, other)),
        },
        Schema::Float => match value {
            Value::Float(x) => {
                buf.extend_from_slice(&x.to_le_bytes());
                Ok(())
            }
            other => Err(CodecError::mismatch(schema, other)),
        },
        Schema::Double => match value {
            Value::Double(x) => {
                buf.extend_from_slice(&x.to_le_bytes());
                Ok(())
            }
            other => Err(CodecError::mismatch(schema, other)),
        },
        Schema::String => match value {
            Value::String(s) => {
                write_len_prefixed(s.as_bytes(), buf);
                Ok(())
            }
            other => Err(CodecError::mismatch(schema, other)),
        },
        Schema::Bytes => match value {
            Value::Bytes(b) => {
                write_len_prefixed(b, buf);
                Ok(())
            }
            other => Err(CodecError::mismatch(schema, other)),
        },
        Schema::Fixed(f) => match value {
            Value::Fixed(b) | Value::Bytes(b) if b.len() == f.size => {
                buf.extend_from_slice(b);
                Ok(())
            }
            other => Err(CodecError::mismatch(schema, other)),
        },
        Schema::Enum(e) => {
            let symbol = enum_symbol(value).ok_or_else(|| CodecError::mismatch(schema, value))?;
            let index = e.index_of(symbol).ok_or_else(|| CodecError::UnknownSymbol {
                name: e.name.clone(),
                symbol: symbol.to_string(),
            })?;
            write_long(index as i64, buf);
            Ok(())
        }
        Schema::Array(items) => match value {
            Value::Array(elems) => {
                if !elems.is_empty() {
                    write_long(elems.len() as i64, buf);
                    for elem in elems {
                        encode_into(items, elem, buf)?;
                    }
                }
                write_long(0, buf);
                Ok(())
            }
            other => Err(CodecError::mismatch(schema, other)),
        },
        Schema::Map(values) => match value {
            Value::Map(entries) => {
                if !entries.is_empty() {
                    write_long(entries.len() as i64, buf);
                    for (key, elem) in entries {
                        write_len_prefixed(key.as_bytes(), buf);
                        encode_into(values, elem, buf)?;
                    }
                }
                write_long(0, buf);
                Ok(())
            }
            other => Err(CodecError::mismatch(schema, other)),
        },
        Schema::Union(branches) => {
            let index = branches
                .iter()
                .position(|b| accepts(b, value))
                .ok_or_else(|| CodecError::NoBranch(value.type_name().to_string()))?;
            write_long(index as i64, buf);
            encode_into(&branches[index], value, buf)
        }
        Schema::Record(r) => match value {
            Value::Record(_) => {
                // Schema order wins regardless of the host value's order.
                for field in &r.fields {
                    let fv = value
                        .get(&field.name)
                        .ok_or_else(|| CodecError::TypeMismatch {
                            schema: schema.to_string(),
                            value: format!("record missing field {}", field.name),
                        })?;
                    encode_into(&field.schema, fv, buf)?;
                }
                Ok(())
            }
            other => Err(CodecError::mismatch(schema, other)),
        },
        Schema::Logical { kind, inner } => encode_logical(*kind, inner, value, buf)
            .ok_or_else(|| CodecError::mismatch(schema, value))?,
    }
}

/// Maps a logical host value down to its underlying primitive and encodes
/// it. Returns `None` when the value does not fit the logical kind.
fn encode_logical(
    kind: LogicalKind,
    inner: &Schema,
    value: &Value,
    buf: &mut Vec<u8>,
) -> Option<Result<(), CodecError>> {
    match (kind, value) {
        (LogicalKind::Date, Value::Date(d)) => {
            let days = (*d - epoch_date()).num_days();
            write_long(days, buf);
            Some(Ok(()))
        }
        (LogicalKind::Date, Value::Int(_)) => Some(encode_into(inner, value, buf)),
        (LogicalKind::TimeMillis, Value::Time(t)) => {
            let millis =
                i64::from(t.num_seconds_from_midnight()) * 1_000 + i64::from(t.nanosecond()) / 1_000_000;
            write_long(millis, buf);
            Some(Ok(()))
        }
        (LogicalKind::TimeMicros, Value::Time(t)) => {
            let micros =
                i64::from(t.num_seconds_from_midnight()) * 1_000_000 + i64::from(t.nanosecond()) / 1_000;
            write_long(micros, buf);
            Some(Ok(()))
        }
        (LogicalKind::TimestampMillis, Value::Timestamp(ts)) => {
            write_long(ts.timestamp_millis(), buf);
            Some(Ok(()))
        }
        (LogicalKind::TimestampMicros, Value::Timestamp(ts)) => {
            write_long(ts.timestamp_micros(), buf);
            Some(Ok(()))
        }
        (LogicalKind::TimeMillis | LogicalKind::TimeMicros, Value::Int(_) | Value::Long(_))
        | (
            LogicalKind::TimestampMillis | LogicalKind::TimestampMicros,
            Value::Long(_),
        ) => Some(encode_into(inner, value, buf)),
        (LogicalKind::Uuid, Value::Uuid(u)) => {
            write_len_prefixed(u.to_string().as_bytes(), buf);
            Some(Ok(()))
        }
        (LogicalKind::Uuid, Value::String(_)) => Some(encode_into(inner, value, buf)),
        (LogicalKind::Decimal { scale, .. }, Value::Decimal(d)) => {
            if d.scale != scale {
                return None;
            }
            Some(encode_decimal(*d, inner, buf))
        }
        _ => None,
    }
}

fn encode_decimal(d: Decimal, inner: &Schema, buf: &mut Vec<u8>) -> Result<(), CodecError> {
    let minimal = minimal_twos_complement(d.unscaled);
    match inner {
        Schema::Bytes => {
            write_len_prefixed(&minimal, buf);
            Ok(())
        }
        Schema::Fixed(f) => {
            if minimal.len() > f.size {
                return Err(CodecError::DecimalTooLarge(f.size));
            }
            // Left-pad with the sign byte out to the fixed size.
            let pad = if d.unscaled < 0 { 0xFF } else { 0x00 };
            buf.extend(std::iter::repeat(pad).take(f.size - minimal.len()));
            buf.extend_from_slice(&minimal);
            Ok(())
        }
        other => Err(CodecError::TypeMismatch {
            schema: other.to_string(),
            value: "decimal".to_string(),
        }),
    }
}

/// The minimal big-endian two's-complement representation: all redundant
/// leading sign bytes stripped.
fn minimal_twos_complement(n: i128) -> Vec<u8> {
    let bytes = n.to_be_bytes();
    let mut start = 0;
    while start < 15 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

/// The symbol an enum-valued position resolves through; plain strings are
/// accepted so callers need not wrap symbols.
fn enum_symbol(value: &Value) -> Option<&str> {
    match value {
        Value::Enum(s) | Value::String(s) => Some(s),
        _ => None,
    }
}

/// Structural branch acceptance for union encoding: the first branch whose
/// kind fits the value's runtime shape is chosen.
fn accepts(schema: &Schema, value: &Value) -> bool {
    match (schema, value) {
        (Schema::Null, Value::Null) => true,
        (Schema::Boolean, Value::Boolean(_)) => true,
        (Schema::Int, Value::Int(_)) => true,
        (Schema::Long, Value::Long(_) | Value::Int(_)) => true,
        (Schema::Float, Value::Float(_)) => true,
        (Schema::Double, Value::Double(_)) => true,
        (Schema::String, Value::String(_)) => true,
        (Schema::Bytes, Value::Bytes(_)) => true,
        (Schema::Fixed(f), Value::Fixed(b) | Value::Bytes(b)) => b.len() == f.size,
        (Schema::Enum(e), _) => enum_accepts(e, value),
        (Schema::Array(_), Value::Array(_)) => true,
        (Schema::Map(_), Value::Map(_)) => true,
        (Schema::Record(r), Value::Record(_)) => r
            .fields
            .iter()
            .all(|f| value.get(&f.name).is_some() || f.default.is_some()),
        (Schema::Logical { kind, .. }, _) => logical_accepts(*kind, value),
        _ => false,
    }
}

/// Enum branch selection goes through the symbol name, not the ordinal.
fn enum_accepts(e: &EnumSchema, value: &Value) -> bool {
    enum_symbol(value).is_some_and(|s| e.has_symbol(s))
}

fn logical_accepts(kind: LogicalKind, value: &Value) -> bool {
    matches!(
        (kind, value),
        (LogicalKind::Date, Value::Date(_))
            | (LogicalKind::TimeMillis | LogicalKind::TimeMicros, Value::Time(_))
            | (
                LogicalKind::TimestampMillis | LogicalKind::TimestampMicros,
                Value::Timestamp(_)
            )
            | (LogicalKind::Uuid, Value::Uuid(_))
    ) || matches!((kind, value), (LogicalKind::Decimal { scale, .. }, Value::Decimal(d)) if d.scale == scale)
}

/// Zig-zag variable-length encoding of a long.
pub(crate) fn write_long(n: i64, buf: &mut Vec<u8>) {
    let mut z = ((n << 1) ^ (n >> 63)) as u64;
    loop {
        let mut byte = (z & 0x7F) as u8;
        z >>= 7;
        if z != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if z == 0 {
            break;
        }
    }
}

pub(crate) fn write_len_prefixed(bytes: &[u8], buf: &mut Vec<u8>) {
    write_long(bytes.len() as i64, buf);
    buf.extend_from_slice(bytes);
}

pub(crate) fn epoch_date() -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrpc_schema::{Field, FixedSchema, RecordSchema};

    #[test]
    fn test_zigzag_wire_bytes() {
        // Reference vectors from the Avro specification.
        let cases: &[(i64, &[u8])] = &[
            (0, &[0x00]),
            (-1, &[0x01]),
            (1, &[0x02]),
            (-2, &[0x03]),
            (2, &[0x04]),
            (-64, &[0x7F]),
            (64, &[0x80, 0x01]),
        ];
        for (n, expected) in cases {
            let mut buf = Vec::new();
            write_long(*n, &mut buf);
            assert_eq!(&buf, expected, "encoding {n}");
        }
    }

    #[test]
    fn test_null_encodes_to_nothing() {
        assert!(encode(&Schema::Null, &Value::Null).unwrap().is_empty());
        assert!(matches!(
            encode(&Schema::Null, &Value::Long(1)),
            Err(CodecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_string_is_length_prefixed() {
        let bytes = encode(&Schema::String, &Value::from("foo")).unwrap();
        assert_eq!(bytes, vec![0x06, b'f', b'o', b'o']);
    }

    #[test]
    fn test_record_encodes_in_schema_order() {
        let schema = Schema::Record(RecordSchema {
            name: "R".to_string(),
            namespace: None,
            fields: vec![
                Field::new("a", Schema::Boolean),
                Field::new("b", Schema::Long),
            ],
        });
        // Host value lists b first; wire bytes still put a first.
        let value = Value::record(vec![("b", Value::Long(1)), ("a", Value::Boolean(true))]);
        let bytes = encode(&schema, &value).unwrap();
        assert_eq!(bytes, vec![0x01, 0x02]);
    }

    #[test]
    fn test_union_null_branch_selection() {
        let schema = Schema::nullable(Schema::Long);
        assert_eq!(encode(&schema, &Value::Long(1)).unwrap(), vec![0x00, 0x02]);
        assert_eq!(encode(&schema, &Value::Null).unwrap(), vec![0x02]);
    }

    #[test]
    fn test_enum_resolves_by_name() {
        let schema = Schema::Enum(avrpc_schema::EnumSchema {
            name: "Color".to_string(),
            symbols: vec!["RED".to_string(), "GREEN".to_string()],
        });
        assert_eq!(
            encode(&schema, &Value::Enum("GREEN".to_string())).unwrap(),
            vec![0x02]
        );
        assert!(matches!(
            encode(&schema, &Value::Enum("MAUVE".to_string())),
            Err(CodecError::UnknownSymbol { .. })
        ));
    }

    #[test]
    fn test_fixed_size_enforced() {
        let schema = Schema::Fixed(FixedSchema {
            name: "Four".to_string(),
            size: 4,
        });
        assert!(encode(&schema, &Value::Fixed(vec![1, 2, 3, 4])).is_ok());
        assert!(matches!(
            encode(&schema, &Value::Fixed(vec![1, 2, 3])),
            Err(CodecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_minimal_twos_complement() {
        assert_eq!(minimal_twos_complement(0), vec![0x00]);
        assert_eq!(minimal_twos_complement(1), vec![0x01]);
        assert_eq!(minimal_twos_complement(-1), vec![0xFF]);
        assert_eq!(minimal_twos_complement(127), vec![0x7F]);
        assert_eq!(minimal_twos_complement(128), vec![0x00, 0x80]);
        assert_eq!(minimal_twos_complement(-128), vec![0x80]);
        assert_eq!(minimal_twos_complement(-129), vec![0xFF, 0x7F]);
    }

    #[test]
    fn test_decimal_scale_must_match() {
        let schema = Schema::logical(
            avrpc_schema::LogicalKind::Decimal {
                precision: 10,
                scale: 2,
            },
            Schema::Bytes,
        );
        assert!(encode(&schema, &Value::Decimal(Decimal::new(1234, 2))).is_ok());
        assert!(matches!(
            encode(&schema, &Value::Decimal(Decimal::new(1234, 3))),
            Err(CodecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_encoding_never_coerces() {
        assert!(matches!(
            encode(&Schema::Boolean, &Value::Long(1)),
            Err(CodecError::TypeMismatch { .. })
        ));
        assert!(matches!(
            encode(&Schema::String, &Value::Bytes(vec![1])),
            Err(CodecError::TypeMismatch { .. })
        ));
        assert!(matches!(
            encode(&Schema::Double, &Value::Long(1)),
            Err(CodecError::TypeMismatch { .. })
        ));
    }
}
