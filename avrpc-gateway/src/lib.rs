//! # avrpc-gateway
//!
//! Client-side call orchestration for avrpc.
//!
//! [`Gateway`] owns the local protocol and a [`Transport`], performs the
//! handshake as part of every call, caches the server's protocol once
//! learned, and retries transient transport failures with exponential
//! backoff. `NONE` handshakes fail the call without retry: resending the
//! same incompatible protocol cannot succeed.

pub mod error;
pub mod gateway;
pub mod transport;

pub use error::{GatewayError, TransportError};
pub use gateway::{Gateway, GatewayConfig};
pub use transport::Transport;
