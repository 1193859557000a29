//! Avro protocol documents.
//!
//! A protocol names a set of messages, each with a request field list, a
//! response schema, and declared error schemas. Protocols are value types:
//! their identity is the canonical JSON text, and the protocol hash is the
//! MD5 digest of that text. The hash is computed on demand so a mutated
//! protocol can never serve a stale digest.

use crate::error::SchemaError;
use crate::schema::{Field, RecordSchema, Schema};
use md5::{Digest, Md5};
use serde_json::{json, Value as Json};
use std::collections::{BTreeMap, HashMap, HashSet};

/// MD5 digest of a protocol's canonical JSON text.
pub type ProtocolHash = [u8; 16];

/// MD5 of an arbitrary protocol text, e.g. the client protocol received
/// during a handshake. Hash verification must digest the text as sent, not
/// a re-serialization.
pub fn hash_of(text: &str) -> ProtocolHash {
    let mut hasher = Md5::new();
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

/// One RPC message: request fields, response schema, declared errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub request: Vec<Field>,
    pub response: Schema,
    /// Declared error schemas. Every message error union additionally has
    /// `string` as its first branch, per Avro protocol semantics; `string`
    /// is implicit and never listed here.
    pub errors: Vec<Schema>,
}

impl Message {
    pub fn new(request: Vec<Field>, response: Schema) -> Self {
        Self {
            request,
            response,
            errors: Vec::new(),
        }
    }

    pub fn with_error(mut self, error: Schema) -> Self {
        self.errors.push(error);
        self
    }

    /// The request field list viewed as a record, which is how the codec
    /// encodes call parameters. Both sides derive the record name from the
    /// message name, so resolution matches by name.
    pub fn request_record(&self, message_name: &str) -> Schema {
        Schema::Record(RecordSchema {
            name: format!("{message_name}_request"),
            namespace: None,
            fields: self.request.clone(),
        })
    }

    /// The union a fault payload is encoded under: `string` first, then the
    /// declared error schemas in order.
    pub fn error_union(&self) -> Schema {
        let mut branches = vec![Schema::String];
        branches.extend(self.errors.iter().cloned());
        Schema::Union(branches)
    }
}

/// A named set of messages plus the named types they share.
#[derive(Debug, Clone, PartialEq)]
pub struct Protocol {
    pub name: String,
    pub namespace: Option<String>,
    messages: BTreeMap<String, Message>,
}

impl Protocol {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            messages: BTreeMap::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Registers a message (a route). Any previously computed hash no
    /// longer describes this protocol; `hash()` always digests the current
    /// canonical text.
    pub fn add_message(&mut self, name: impl Into<String>, message: Message) -> &mut Self {
        self.messages.insert(name.into(), message);
        self
    }

    pub fn message(&self, name: &str) -> Option<&Message> {
        self.messages.get(name)
    }

    pub fn messages(&self) -> impl Iterator<Item = (&String, &Message)> {
        self.messages.iter()
    }

    /// Canonical JSON document: named types hoisted into `types` in first
    /// use order, messages referencing them by name.
    pub fn canonical_json(&self) -> Json {
        let mut seen = HashSet::new();
        let mut types = Vec::new();
        for message in self.messages.values() {
            for field in &message.request {
                collect_named(&field.schema, &mut seen, &mut types);
            }
            collect_named(&message.response, &mut seen, &mut types);
            for error in &message.errors {
                collect_named(error, &mut seen, &mut types);
            }
        }

        let mut messages = serde_json::Map::new();
        for (name, message) in &self.messages {
            let request: Vec<Json> = message
                .request
                .iter()
                .map(|f| {
                    let mut obj = json!({"name": f.name, "type": f.schema.to_json(&mut seen)});
                    if let Some(default) = &f.default {
                        obj["default"] = default.clone();
                    }
                    obj
                })
                .collect();
            let mut doc = json!({
                "request": request,
                "response": message.response.to_json(&mut seen),
            });
            if !message.errors.is_empty() {
                doc["errors"] = Json::Array(
                    message
                        .errors
                        .iter()
                        .map(|e| e.to_json(&mut seen))
                        .collect(),
                );
            }
            messages.insert(name.clone(), doc);
        }

        let mut doc = json!({
            "protocol": self.name,
            "types": types,
            "messages": messages,
        });
        if let Some(ns) = &self.namespace {
            doc["namespace"] = json!(ns);
        }
        doc
    }

    /// The canonical text whose MD5 is the protocol hash.
    pub fn text(&self) -> String {
        self.canonical_json().to_string()
    }

    /// MD5 of the canonical text, computed on demand.
    pub fn hash(&self) -> ProtocolHash {
        hash_of(&self.text())
    }

    /// Parses a protocol JSON document.
    pub fn parse(text: &str) -> Result<Protocol, SchemaError> {
        let doc: Json = serde_json::from_str(text)?;
        let obj = doc
            .as_object()
            .ok_or_else(|| SchemaError::InvalidProtocol("document is not an object".into()))?;
        let name = obj
            .get("protocol")
            .and_then(Json::as_str)
            .ok_or_else(|| SchemaError::InvalidProtocol("missing \"protocol\" name".into()))?;
        let namespace = obj.get("namespace").and_then(Json::as_str).map(String::from);

        let mut names = HashMap::new();
        if let Some(types) = obj.get("types").and_then(Json::as_array) {
            for t in types {
                Schema::from_json(t, &mut names)?;
            }
        }

        let mut protocol = Protocol {
            name: name.to_string(),
            namespace,
            messages: BTreeMap::new(),
        };

        if let Some(messages) = obj.get("messages").and_then(Json::as_object) {
            for (msg_name, msg_doc) in messages {
                let msg_obj = msg_doc.as_object().ok_or_else(|| {
                    SchemaError::InvalidProtocol(format!("message {msg_name} is not an object"))
                })?;

                let mut request = Vec::new();
                if let Some(fields) = msg_obj.get("request").and_then(Json::as_array) {
                    for fd in fields {
                        let fobj = fd.as_object().ok_or_else(|| {
                            SchemaError::InvalidProtocol(format!(
                                "bad request field in message {msg_name}"
                            ))
                        })?;
                        let fname =
                            fobj.get("name").and_then(Json::as_str).ok_or_else(|| {
                                SchemaError::InvalidProtocol(format!(
                                    "unnamed request field in message {msg_name}"
                                ))
                            })?;
                        let ftype = fobj.get("type").ok_or_else(|| {
                            SchemaError::InvalidProtocol(format!(
                                "request field {fname} has no type"
                            ))
                        })?;
                        request.push(Field {
                            name: fname.to_string(),
                            schema: Schema::from_json(ftype, &mut names)?,
                            default: fobj.get("default").cloned(),
                        });
                    }
                }

                let response = match msg_obj.get("response") {
                    Some(r) => Schema::from_json(r, &mut names)?,
                    None => Schema::Null,
                };

                let mut errors = Vec::new();
                if let Some(errs) = msg_obj.get("errors").and_then(Json::as_array) {
                    for e in errs {
                        errors.push(Schema::from_json(e, &mut names)?);
                    }
                }

                protocol.messages.insert(
                    msg_name.clone(),
                    Message {
                        request,
                        response,
                        errors,
                    },
                );
            }
        }

        Ok(protocol)
    }
}

/// Hoists the first definition of every named type reachable from `schema`
/// into `types`, in depth-first order.
fn collect_named(schema: &Schema, seen: &mut HashSet<String>, types: &mut Vec<Json>) {
    match schema {
        Schema::Fixed(_) | Schema::Enum(_) | Schema::Record(_) => {
            let name = schema.name().unwrap_or_default();
            if !seen.contains(&name) {
                types.push(schema.to_json(seen));
            }
        }
        Schema::Array(items) => collect_named(items, seen, types),
        Schema::Map(values) => collect_named(values, seen, types),
        Schema::Union(branches) => {
            for b in branches {
                collect_named(b, seen, types);
            }
        }
        Schema::Logical { inner, .. } => collect_named(inner, seen, types),
        _ => {}
    }
}
