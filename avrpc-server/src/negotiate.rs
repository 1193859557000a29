//! Server-side handshake negotiation.
//!
//! For each call the negotiator resolves the client's protocol (own, cached,
//! or freshly validated from the handshake text), checks request and
//! response compatibility for the target message, and produces both the
//! handshake response and a per-call [`Session`].
//!
//! Outcomes:
//! - `BOTH` — the client already holds the current server protocol and the
//!   response path is compatible; neither side needs to ship protocol text.
//! - `CLIENT` — the call proceeds, but the server attaches its protocol
//!   text and hash so the client can update its view.
//! - `NONE` — the client's request schema cannot be read; the call is not
//!   processed and the server protocol rides along for future reference.

use crate::cache::ClientCache;
use crate::error::NegotiateError;
use avrpc_schema::{can_read, hash_of, Protocol, ProtocolHash, Schema};
use avrpc_wire::{HandshakeMatch, HandshakeRequest, HandshakeResponse};
use std::sync::Arc;
use tracing::{debug, warn};

/// Negotiator tuning.
#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    /// Maximum number of validated client protocols retained.
    pub cache_capacity: usize,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 128,
        }
    }
}

impl NegotiatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

/// Per-call context produced by a successful negotiation.
#[derive(Debug, Clone)]
pub struct Session {
    pub message: String,
    /// The client's request schema, used as the writer when decoding call
    /// parameters.
    pub request_writer: Schema,
    /// Whether the client can read responses written under the server's
    /// response schema. When false the call still runs; the client is told
    /// via `CLIENT` to refresh its protocol.
    pub response_compatible: bool,
    pub outcome: HandshakeMatch,
}

/// Result of negotiating one handshake.
#[derive(Debug)]
pub enum Negotiated {
    /// The call proceeds under `session`.
    Ready {
        response: HandshakeResponse,
        session: Session,
    },
    /// Incompatible request schema: respond `NONE`, do not process the call.
    Rejected { response: HandshakeResponse },
}

pub struct Negotiator {
    protocol: Arc<Protocol>,
    text: String,
    hash: ProtocolHash,
    cache: ClientCache,
}

impl Negotiator {
    pub fn new(protocol: Protocol) -> Self {
        Self::with_config(protocol, NegotiatorConfig::default())
    }

    pub fn with_config(protocol: Protocol, config: NegotiatorConfig) -> Self {
        let text = protocol.text();
        let hash = hash_of(&text);
        Self {
            protocol: Arc::new(protocol),
            text,
            hash,
            cache: ClientCache::new(config.cache_capacity),
        }
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn hash(&self) -> ProtocolHash {
        self.hash
    }

    /// Number of client protocols currently cached.
    pub fn cached_clients(&self) -> usize {
        self.cache.len()
    }

    /// Negotiates one handshake against the target `message`.
    pub fn negotiate(
        &self,
        message: &str,
        request: &HandshakeRequest,
    ) -> Result<Negotiated, NegotiateError> {
        let server_msg = self
            .protocol
            .message(message)
            .ok_or_else(|| NegotiateError::UnknownMessage(message.to_string()))?;

        // Resolve the client's protocol: the server's own, a cached one, or
        // the text carried in this handshake after hash verification.
        let mut validated = None;
        let client = if request.client_hash == self.hash {
            self.protocol.clone()
        } else if let Some(cached) = self.cache.get(&request.client_hash) {
            debug!(
                message,
                client_hash = %hex::encode(request.client_hash),
                "client protocol served from cache"
            );
            cached
        } else {
            let text = request
                .client_protocol
                .as_deref()
                .ok_or(NegotiateError::MissingClientProtocol)?;
            let actual = hash_of(text);
            if actual != request.client_hash {
                warn!(
                    claimed = %hex::encode(request.client_hash),
                    actual = %hex::encode(actual),
                    "client protocol hash mismatch"
                );
                return Err(NegotiateError::HashMismatch {
                    claimed: hex::encode(request.client_hash),
                    actual: hex::encode(actual),
                });
            }
            let parsed = Arc::new(Protocol::parse(text)?);
            validated = Some(parsed.clone());
            parsed
        };

        // The client must declare the message, and the server must be able
        // to read its request schema.
        let reader = server_msg.request_record(message);
        let Some(client_msg) = client.message(message) else {
            warn!(message, "client protocol does not declare the message");
            return Ok(Negotiated::Rejected {
                response: self.full_response(HandshakeMatch::None),
            });
        };
        let request_writer = client_msg.request_record(message);
        if !can_read(&reader, &request_writer) {
            warn!(message, "client request schema is not readable");
            return Ok(Negotiated::Rejected {
                response: self.full_response(HandshakeMatch::None),
            });
        }

        // The server writes the response; the client is the reader.
        let response_compatible = can_read(&client_msg.response, &server_msg.response);

        // Only a fully validated protocol is cached.
        if let Some(parsed) = validated {
            self.cache.insert(request.client_hash, parsed);
        }

        let outcome = if request.server_hash == self.hash && response_compatible {
            HandshakeMatch::Both
        } else {
            HandshakeMatch::Client
        };
        let response = match outcome {
            HandshakeMatch::Both => HandshakeResponse::both(),
            _ => self.full_response(outcome),
        };
        debug!(
            message,
            outcome = outcome.symbol(),
            response_compatible,
            "handshake negotiated"
        );
        Ok(Negotiated::Ready {
            response,
            session: Session {
                message: message.to_string(),
                request_writer,
                response_compatible,
                outcome,
            },
        })
    }

    /// A response carrying the server's protocol text and hash.
    fn full_response(&self, outcome: HandshakeMatch) -> HandshakeResponse {
        HandshakeResponse {
            outcome,
            server_protocol: Some(self.text.clone()),
            server_hash: Some(self.hash),
            meta: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrpc_schema::{Field, Message};

    fn server_protocol() -> Protocol {
        let mut p = Protocol::new("Echo");
        p.add_message(
            "ping",
            Message::new(vec![Field::new("id", Schema::Long)], Schema::Boolean),
        );
        p
    }

    fn request_for(client: &Protocol, server_hash: ProtocolHash, with_text: bool) -> HandshakeRequest {
        HandshakeRequest {
            client_hash: client.hash(),
            client_protocol: with_text.then(|| client.text()),
            server_hash,
            meta: None,
        }
    }

    #[test]
    fn test_identical_protocol_matches_both() {
        let negotiator = Negotiator::new(server_protocol());
        let client = server_protocol();
        let request = request_for(&client, negotiator.hash(), false);
        let Negotiated::Ready { response, session } =
            negotiator.negotiate("ping", &request).unwrap()
        else {
            panic!("rejected");
        };
        assert_eq!(response.outcome, HandshakeMatch::Both);
        assert_eq!(response.server_protocol, None);
        assert!(session.response_compatible);
    }

    #[test]
    fn test_superset_request_is_compatible() {
        let negotiator = Negotiator::new(server_protocol());
        let mut client = Protocol::new("Echo");
        client.add_message(
            "ping",
            Message::new(
                vec![
                    Field::new("id", Schema::Long),
                    Field::new("extra", Schema::String),
                ],
                Schema::Boolean,
            ),
        );
        // The client has not seen the server protocol yet, so its idea of
        // the server hash is stale.
        let request = request_for(&client, [0; 16], true);
        let Negotiated::Ready { response, session } =
            negotiator.negotiate("ping", &request).unwrap()
        else {
            panic!("rejected");
        };
        // Extra writer fields are skipped, so the request path is fine and
        // the client only needs a protocol refresh via CLIENT.
        assert_eq!(response.outcome, HandshakeMatch::Client);
        assert!(session.response_compatible);
        assert!(response.server_protocol.is_some());
    }

    #[test]
    fn test_client_omitting_defaulted_request_field_is_compatible() {
        // The server's request record grew a defaulted field; an older
        // client that never sends it still negotiates cleanly.
        let mut server = Protocol::new("Echo");
        server.add_message(
            "ping",
            Message::new(
                vec![
                    Field::new("id", Schema::Long),
                    Field::new("tag", Schema::String).with_default(serde_json::json!("none")),
                ],
                Schema::Boolean,
            ),
        );
        let negotiator = Negotiator::new(server);
        let client = server_protocol();
        let request = request_for(&client, negotiator.hash(), true);
        let Negotiated::Ready { response, session } =
            negotiator.negotiate("ping", &request).unwrap()
        else {
            panic!("rejected");
        };
        assert_eq!(response.outcome, HandshakeMatch::Both);
        assert!(session.response_compatible);
    }

    #[test]
    fn test_incompatible_response_degrades_to_client() {
        let negotiator = Negotiator::new(server_protocol());
        let mut client = Protocol::new("Echo");
        client.add_message(
            "ping",
            Message::new(vec![Field::new("id", Schema::Long)], Schema::String),
        );
        let request = request_for(&client, negotiator.hash(), true);
        let Negotiated::Ready { response, session } =
            negotiator.negotiate("ping", &request).unwrap()
        else {
            panic!("rejected");
        };
        assert_eq!(response.outcome, HandshakeMatch::Client);
        assert!(!session.response_compatible);
        assert_eq!(response.server_hash, Some(negotiator.hash()));
    }

    #[test]
    fn test_incompatible_request_is_rejected_with_none() {
        let negotiator = Negotiator::new(server_protocol());
        let mut client = Protocol::new("Echo");
        // Writer string where the server reads long: unresolvable.
        client.add_message(
            "ping",
            Message::new(vec![Field::new("id", Schema::String)], Schema::Boolean),
        );
        let request = request_for(&client, negotiator.hash(), true);
        let Negotiated::Rejected { response } = negotiator.negotiate("ping", &request).unwrap()
        else {
            panic!("should be rejected");
        };
        assert_eq!(response.outcome, HandshakeMatch::None);
        assert!(response.server_protocol.is_some());
        // Rejected protocols are never cached.
        assert_eq!(negotiator.cached_clients(), 0);
    }

    #[test]
    fn test_hash_mismatch_is_always_an_error() {
        let negotiator = Negotiator::new(server_protocol());
        let client = server_protocol();
        let request = HandshakeRequest {
            client_hash: [0xEE; 16],
            client_protocol: Some(client.text()),
            server_hash: negotiator.hash(),
            meta: None,
        };
        assert!(matches!(
            negotiator.negotiate("ping", &request),
            Err(NegotiateError::HashMismatch { .. })
        ));
        assert_eq!(negotiator.cached_clients(), 0);
    }

    #[test]
    fn test_unknown_hash_without_text_is_an_error() {
        let negotiator = Negotiator::new(server_protocol());
        let request = HandshakeRequest {
            client_hash: [0x11; 16],
            client_protocol: None,
            server_hash: negotiator.hash(),
            meta: None,
        };
        assert!(matches!(
            negotiator.negotiate("ping", &request),
            Err(NegotiateError::MissingClientProtocol)
        ));
    }

    #[test]
    fn test_unknown_message_is_an_error() {
        let negotiator = Negotiator::new(server_protocol());
        let client = server_protocol();
        let request = request_for(&client, negotiator.hash(), true);
        assert!(matches!(
            negotiator.negotiate("pong", &request),
            Err(NegotiateError::UnknownMessage(_))
        ));
    }

    #[test]
    fn test_validated_protocol_is_served_from_cache() {
        let negotiator = Negotiator::new(server_protocol());
        let mut client = Protocol::new("Echo");
        client.add_message(
            "ping",
            Message::new(
                vec![
                    Field::new("id", Schema::Long),
                    Field::new("extra", Schema::String),
                ],
                Schema::Boolean,
            ),
        );
        let first = request_for(&client, negotiator.hash(), true);
        negotiator.negotiate("ping", &first).unwrap();
        assert_eq!(negotiator.cached_clients(), 1);

        // Same hash, no text this time: served from cache.
        let second = request_for(&client, negotiator.hash(), false);
        let Negotiated::Ready { .. } = negotiator.negotiate("ping", &second).unwrap() else {
            panic!("rejected");
        };
    }

    #[test]
    fn test_cache_bound_evicts_single_oldest() {
        let capacity = 3;
        let negotiator = Negotiator::with_config(
            server_protocol(),
            NegotiatorConfig::new().with_cache_capacity(capacity),
        );
        let mut clients = Vec::new();
        for i in 0..capacity + 1 {
            let mut client = Protocol::new(format!("Echo{i}"));
            client.add_message(
                "ping",
                Message::new(vec![Field::new("id", Schema::Long)], Schema::Boolean),
            );
            let request = request_for(&client, negotiator.hash(), true);
            negotiator.negotiate("ping", &request).unwrap();
            clients.push(client);
        }
        assert_eq!(negotiator.cached_clients(), capacity);

        // Only the first-inserted client must re-send its text.
        let oldest = request_for(&clients[0], negotiator.hash(), false);
        assert!(matches!(
            negotiator.negotiate("ping", &oldest),
            Err(NegotiateError::MissingClientProtocol)
        ));
        for client in &clients[1..] {
            let request = request_for(client, negotiator.hash(), false);
            assert!(negotiator.negotiate("ping", &request).is_ok());
        }
    }
}
