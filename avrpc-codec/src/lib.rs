//! # avrpc-codec
//!
//! Avro binary codec for avrpc.
//!
//! This crate provides:
//! - The runtime [`Value`] representation, including logical-type host
//!   values (dates, times, timestamps, uuids, decimals)
//! - Schema-directed binary encoding
//! - Resolving decode: bytes written under one schema read back under a
//!   different but compatible reader schema
//! - An explicit three-way incremental decode result, so "not enough bytes
//!   yet" is a value, not an error

pub mod decode;
pub mod encode;
pub mod error;
pub mod value;

pub use decode::{decode, decode_one, Decoded};
pub use encode::{encode, encode_into};
pub use error::CodecError;
pub use value::{Decimal, Value};
