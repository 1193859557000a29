//! # avrpc
//!
//! An implementation of the Avro RPC wire protocol: schema derivation,
//! canonical binary encoding, length-prefixed framing, and the
//! three-outcome protocol handshake.
//!
//! This crate is a facade over the workspace members:
//!
//! - [`schema`] — schema model, derivation from type descriptors,
//!   canonical JSON, protocol documents and MD5 hashing, reader/writer
//!   compatibility
//! - [`codec`] — runtime values and the resolving binary codec
//! - [`wire`] — message framing and the handshake/call envelopes
//! - [`server`] — handshake negotiation and the request responder
//! - [`gateway`] — client-side call orchestration with retry
//!
//! ## Example
//!
//! ```
//! use avrpc::codec::Value;
//! use avrpc::schema::{Field, Message, Protocol, Schema};
//! use avrpc::server::{Negotiator, Responder};
//!
//! let mut protocol = Protocol::new("Echo");
//! protocol.add_message(
//!     "ping",
//!     Message::new(vec![Field::new("id", Schema::Long)], Schema::Boolean),
//! );
//! let responder = Responder::new(Negotiator::new(protocol))
//!     .on("ping", |_params| Ok(Value::Boolean(true)));
//! # let _ = responder;
//! ```

pub use avrpc_codec as codec;
pub use avrpc_gateway as gateway;
pub use avrpc_schema as schema;
pub use avrpc_server as server;
pub use avrpc_wire as wire;

pub use avrpc_codec::{Decoded, Value};
pub use avrpc_gateway::{Gateway, GatewayConfig, Transport};
pub use avrpc_schema::{Protocol, Schema};
pub use avrpc_server::{Negotiator, Responder};
pub use avrpc_wire::{HandshakeMatch, HandshakeRequest, HandshakeResponse};
