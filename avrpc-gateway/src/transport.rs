//! Transport seam.
//!
//! The gateway is transport-agnostic: anything that can exchange one
//! request body for one response body works. Production deployments POST
//! the body as `avro/binary`; tests plug in an in-memory responder.

use crate::error::TransportError;
use bytes::Bytes;
use std::future::Future;

/// One request/response exchange of opaque framed bodies.
pub trait Transport {
    fn send(&self, body: Bytes)
        -> impl Future<Output = Result<Bytes, TransportError>> + Send;
}
