//! Client call orchestration.
//!
//! One [`Gateway::call`] builds the framed request (handshake + call
//! header + parameters), sends it, interprets the handshake outcome, and
//! decodes the response or error-union payload under the server's writer
//! schemas. Transient transport failures are retried with exponential
//! backoff; `NONE` handshakes and application errors are not.

use crate::error::{GatewayError, TransportError};
use crate::transport::Transport;
use avrpc_codec::Value;
use avrpc_schema::{hash_of, Protocol, ProtocolHash, Schema};
use avrpc_wire::{
    CallHeader, HandshakeMatch, HandshakeRequest, HandshakeResponse, MessageBuilder,
    MessageReader, ResponseHeader,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Gateway tuning.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// First retry delay; doubled on each subsequent attempt.
    pub backoff_base: Duration,
    /// Transport status codes treated as transient.
    pub retryable_status: Vec<u16>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(100),
            retryable_status: vec![502, 503, 504],
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_retryable_status(mut self, status: Vec<u16>) -> Self {
        self.retryable_status = status;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt)
    }
}

/// The gateway's view of the remote endpoint, updated only after a
/// successfully negotiated exchange.
#[derive(Clone)]
struct Remote {
    server_hash: ProtocolHash,
    server_protocol: Option<Arc<Protocol>>,
    /// Last outcome was `BOTH`: the server holds our protocol, so the
    /// handshake can omit the text.
    matched: bool,
}

pub struct Gateway<T: Transport> {
    protocol: Arc<Protocol>,
    text: String,
    hash: ProtocolHash,
    transport: T,
    config: GatewayConfig,
    remote: Mutex<Remote>,
}

impl<T: Transport> Gateway<T> {
    pub fn new(protocol: Protocol, transport: T) -> Self {
        Self::with_config(protocol, transport, GatewayConfig::default())
    }

    pub fn with_config(protocol: Protocol, transport: T, config: GatewayConfig) -> Self {
        let text = protocol.text();
        let hash = hash_of(&text);
        Self {
            protocol: Arc::new(protocol),
            text,
            // Until told otherwise, assume the server speaks our protocol.
            remote: Mutex::new(Remote {
                server_hash: hash,
                server_protocol: None,
                matched: false,
            }),
            hash,
            transport,
            config,
        }
    }

    /// Performs one logical call: encodes `params` under the local request
    /// schema, exchanges one framed body, and decodes the response under
    /// the server's writer schema.
    pub async fn call(&self, message: &str, params: Value) -> Result<Value, GatewayError> {
        let local = self
            .protocol
            .message(message)
            .ok_or_else(|| GatewayError::UnknownMessage(message.to_string()))?;

        // Copy the remote view out; the lock is never held across awaits.
        let remote = self.remote.lock().clone();
        let handshake = HandshakeRequest {
            client_hash: self.hash,
            client_protocol: (!remote.matched).then(|| self.text.clone()),
            server_hash: remote.server_hash,
            meta: None,
        };

        let mut body = handshake.encode()?;
        body.extend(CallHeader::new(message).encode()?);
        body.extend(avrpc_codec::encode(
            &local.request_record(message),
            &params,
        )?);
        let mut builder = MessageBuilder::new();
        builder.push(&body)?;
        let request = builder.finish();

        let response = self.exchange(request).await?;
        let mut reader = MessageReader::new(&response);
        let handshake = HandshakeResponse::read(&mut reader)?;

        // Interpret the handshake before touching the payload.
        let writer_protocol = match handshake.outcome {
            HandshakeMatch::None => {
                warn!(message, "server rejected the protocol");
                return Err(GatewayError::Incompatible);
            }
            HandshakeMatch::Both => {
                let mut remote = self.remote.lock();
                remote.matched = true;
                remote.server_hash = self.hash;
                remote.server_protocol.clone()
            }
            HandshakeMatch::Client => {
                let parsed = match &handshake.server_protocol {
                    Some(text) => Some(Arc::new(Protocol::parse(text)?)),
                    None => None,
                };
                debug!(message, "caching server protocol from CLIENT handshake");
                let mut remote = self.remote.lock();
                remote.matched = false;
                if let Some(hash) = handshake.server_hash {
                    remote.server_hash = hash;
                }
                if parsed.is_some() {
                    remote.server_protocol = parsed;
                }
                remote.server_protocol.clone()
            }
        };

        // The server writes under its own protocol; ours is the fallback
        // when the protocols matched outright.
        let writer = writer_protocol
            .as_deref()
            .and_then(|p| p.message(message))
            .unwrap_or(local);

        let header = ResponseHeader::read(&mut reader)?;
        if header.error {
            let fault = reader.read_value(&local.error_union(), &writer.error_union())?;
            return Err(GatewayError::Application(fault));
        }
        Ok(reader.read_value(&local.response, &writer.response)?)
    }

    /// Sends one body, retrying transient transport failures.
    async fn exchange(&self, body: Bytes) -> Result<Bytes, TransportError> {
        let mut attempt = 0;
        loop {
            match self.transport.send(body.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.config.max_attempts
                        || !err.is_retryable(&self.config.retryable_status)
                    {
                        return Err(err);
                    }
                    let delay = self.config.backoff(attempt - 1);
                    warn!(%err, attempt, ?delay, "transport failure, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// The hash of the local protocol.
    pub fn hash(&self) -> ProtocolHash {
        self.hash
    }

    /// The server's response schema for `message`, as currently known.
    pub fn server_response_schema(&self, message: &str) -> Option<Schema> {
        self.remote
            .lock()
            .server_protocol
            .as_deref()
            .and_then(|p| p.message(message))
            .map(|m| m.response.clone())
    }
}
