//! Request responder.
//!
//! Turns one framed request body into one framed response body by
//! composing the wire envelopes, the negotiator, and the codec: read the
//! handshake and call header, negotiate, decode the call parameters under
//! the client's writer schema, run the registered handler, and encode
//! either the response value or a fault under the message's error union.
//!
//! Transport is someone else's job; this type is pure bytes-to-bytes.

use crate::error::ServerError;
use crate::negotiate::{Negotiated, Negotiator, Session};
use avrpc_codec::Value;
use avrpc_wire::{
    CallHeader, HandshakeRequest, HandshakeResponse, MessageBuilder, MessageReader, ResponseHeader,
};
use bytes::Bytes;
use std::collections::HashMap;
use tracing::debug;

/// An application-level fault, encoded under the message's error union.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub value: Value,
}

impl Fault {
    /// A plain string fault, the implicit first branch of every error union.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            value: Value::String(text.into()),
        }
    }

    /// A fault carrying one of the message's declared error schemas.
    pub fn value(value: Value) -> Self {
        Self { value }
    }
}

type Handler = Box<dyn Fn(Value) -> Result<Value, Fault> + Send + Sync>;

pub struct Responder {
    negotiator: Negotiator,
    handlers: HashMap<String, Handler>,
}

impl Responder {
    pub fn new(negotiator: Negotiator) -> Self {
        Self {
            negotiator,
            handlers: HashMap::new(),
        }
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    /// Registers the handler for a message. The handler receives the call
    /// parameters as a record value and returns the response value or a
    /// fault.
    pub fn on(
        mut self,
        message: impl Into<String>,
        handler: impl Fn(Value) -> Result<Value, Fault> + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(message.into(), Box::new(handler));
        self
    }

    /// Processes one request body into one response body.
    ///
    /// A `NONE` handshake still produces a well-formed response (with an
    /// `error = true` string fault); `Err` is reserved for malformed
    /// requests the transport layer should reject outright.
    pub fn respond(&self, body: &[u8]) -> Result<Bytes, ServerError> {
        let mut reader = MessageReader::new(body);
        let handshake = HandshakeRequest::read(&mut reader)?;
        let header = CallHeader::read(&mut reader)?;
        debug!(message = %header.message, "handling call");

        match self.negotiator.negotiate(&header.message, &handshake)? {
            Negotiated::Rejected { response } => self.reject(&header.message, response),
            Negotiated::Ready { response, session } => {
                self.run(&mut reader, response, &session)
            }
        }
    }

    fn run(
        &self,
        reader: &mut MessageReader<'_>,
        handshake: HandshakeResponse,
        session: &Session,
    ) -> Result<Bytes, ServerError> {
        // The message exists: negotiation already looked it up.
        let message = self
            .negotiator
            .protocol()
            .message(&session.message)
            .ok_or_else(|| ServerError::NoHandler(session.message.clone()))?;
        let request_schema = message.request_record(&session.message);
        let params = reader.read_value(&request_schema, &session.request_writer)?;

        let handler = self
            .handlers
            .get(&session.message)
            .ok_or_else(|| ServerError::NoHandler(session.message.clone()))?;

        let (header, payload) = match handler(params) {
            Ok(value) => (
                ResponseHeader::ok(),
                avrpc_codec::encode(&message.response, &value)?,
            ),
            Err(fault) => {
                debug!(message = %session.message, "handler returned a fault");
                (
                    ResponseHeader::fault(),
                    avrpc_codec::encode(&message.error_union(), &fault.value)?,
                )
            }
        };
        build_response(&handshake, &header, &payload)
    }

    fn reject(
        &self,
        message_name: &str,
        handshake: HandshakeResponse,
    ) -> Result<Bytes, ServerError> {
        // The call was not processed; the body carries a string fault on
        // the message's error union.
        let message = self
            .negotiator
            .protocol()
            .message(message_name)
            .ok_or_else(|| ServerError::NoHandler(message_name.to_string()))?;
        let fault = Value::String("incompatible client protocol".to_string());
        let payload = avrpc_codec::encode(&message.error_union(), &fault)?;
        build_response(&handshake, &ResponseHeader::fault(), &payload)
    }
}

fn build_response(
    handshake: &HandshakeResponse,
    header: &ResponseHeader,
    payload: &[u8],
) -> Result<Bytes, ServerError> {
    let mut body = handshake.encode()?;
    body.extend(header.encode()?);
    body.extend_from_slice(payload);
    let mut builder = MessageBuilder::new();
    builder.push(&body)?;
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrpc_schema::{Field, Message, Protocol, Schema};
    use avrpc_wire::HandshakeMatch;

    fn echo_protocol() -> Protocol {
        let mut p = Protocol::new("Echo");
        p.add_message(
            "ping",
            Message::new(vec![Field::new("id", Schema::Long)], Schema::Boolean),
        );
        p
    }

    fn responder() -> Responder {
        Responder::new(Negotiator::new(echo_protocol())).on("ping", |params| {
            match params.get("id") {
                Some(Value::Long(n)) if *n >= 0 => Ok(Value::Boolean(true)),
                Some(Value::Long(_)) => Err(Fault::message("negative id")),
                _ => Err(Fault::message("missing id")),
            }
        })
    }

    fn request_body(client: &Protocol, server_hash: [u8; 16], id: i64) -> Bytes {
        let handshake = HandshakeRequest {
            client_hash: client.hash(),
            client_protocol: Some(client.text()),
            server_hash,
            meta: None,
        };
        let message = client.message("ping").unwrap();
        let params = avrpc_codec::encode(
            &message.request_record("ping"),
            &Value::record(vec![("id", Value::Long(id))]),
        )
        .unwrap();
        let mut body = handshake.encode().unwrap();
        body.extend(CallHeader::new("ping").encode().unwrap());
        body.extend(params);
        let mut builder = MessageBuilder::new();
        builder.push(&body).unwrap();
        builder.finish()
    }

    fn read_response(
        protocol: &Protocol,
        body: &[u8],
    ) -> (HandshakeResponse, ResponseHeader, Value) {
        let mut reader = MessageReader::new(body);
        let handshake = HandshakeResponse::read(&mut reader).unwrap();
        let header = ResponseHeader::read(&mut reader).unwrap();
        let message = protocol.message("ping").unwrap();
        let payload = if header.error {
            reader.read_one(&message.error_union()).unwrap()
        } else {
            reader.read_one(&message.response).unwrap()
        };
        (handshake, header, payload)
    }

    #[test]
    fn test_successful_call() {
        let responder = responder();
        let client = echo_protocol();
        let server_hash = responder.negotiator().hash();
        let response = responder.respond(&request_body(&client, server_hash, 7)).unwrap();
        let (handshake, header, payload) = read_response(&client, &response);
        assert_eq!(handshake.outcome, HandshakeMatch::Both);
        assert!(!header.error);
        assert_eq!(payload, Value::Boolean(true));
    }

    #[test]
    fn test_handler_fault_sets_error_flag() {
        let responder = responder();
        let client = echo_protocol();
        let server_hash = responder.negotiator().hash();
        let response = responder
            .respond(&request_body(&client, server_hash, -1))
            .unwrap();
        let (_, header, payload) = read_response(&client, &response);
        assert!(header.error);
        assert_eq!(payload, Value::String("negative id".to_string()));
    }

    #[test]
    fn test_rejected_handshake_carries_string_fault() {
        let responder = responder();
        let mut client = Protocol::new("Echo");
        client.add_message(
            "ping",
            Message::new(vec![Field::new("id", Schema::String)], Schema::Boolean),
        );
        let handshake = HandshakeRequest {
            client_hash: client.hash(),
            client_protocol: Some(client.text()),
            server_hash: responder.negotiator().hash(),
            meta: None,
        };
        let mut body = handshake.encode().unwrap();
        body.extend(CallHeader::new("ping").encode().unwrap());
        // No parameters: a NONE response never reads them.
        let mut builder = MessageBuilder::new();
        builder.push(&body).unwrap();
        let request = builder.finish();

        let response = responder.respond(&request).unwrap();
        let (handshake, header, payload) = read_response(&echo_protocol(), &response);
        assert_eq!(handshake.outcome, HandshakeMatch::None);
        assert!(header.error);
        assert!(matches!(payload, Value::String(_)));
    }

    #[test]
    fn test_unregistered_message_is_an_error() {
        let responder = Responder::new(Negotiator::new(echo_protocol()));
        let client = echo_protocol();
        let server_hash = responder.negotiator().hash();
        assert!(matches!(
            responder.respond(&request_body(&client, server_hash, 1)),
            Err(ServerError::NoHandler(_))
        ));
    }
}
