//! # avrpc-schema
//!
//! Avro schema model for avrpc.
//!
//! This crate provides:
//! - The in-memory schema representation (primitives, named types, unions,
//!   logical types)
//! - Schema derivation from structural type descriptors
//! - Canonical JSON serialization and parsing for schemas and protocols
//! - MD5 protocol hashing
//! - Reader/writer schema compatibility checking

pub mod compat;
pub mod derive;
pub mod error;
pub mod protocol;
pub mod schema;

pub use compat::can_read;
pub use derive::{derive_record, EnumDesc, FieldDesc, ObjectDesc, TypeDesc};
pub use error::SchemaError;
pub use protocol::{hash_of, Message, Protocol, ProtocolHash};
pub use schema::{EnumSchema, Field, FixedSchema, LogicalKind, RecordSchema, Schema};
