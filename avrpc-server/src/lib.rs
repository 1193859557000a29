//! # avrpc-server
//!
//! Server-side handshake negotiation and request handling for avrpc.
//!
//! [`Negotiator`] implements the three-outcome handshake over a bounded
//! cache of validated client protocols. [`Responder`] composes it with the
//! wire envelopes and the codec to turn one request body into one response
//! body; plugging that function into an HTTP server is left to the caller.

pub mod cache;
pub mod error;
pub mod negotiate;
pub mod responder;

pub use cache::ClientCache;
pub use error::{NegotiateError, ServerError};
pub use negotiate::{Negotiated, Negotiator, NegotiatorConfig, Session};
pub use responder::{Fault, Responder};
