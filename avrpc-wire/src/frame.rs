//! Length-prefixed message framing.
//!
//! Frame layout (4-byte header + payload):
//!
//! ```text
//! +-------------+---------------------+
//! | payload_len | payload             |
//! |  4 bytes BE | payload_len bytes   |
//! +-------------+---------------------+
//! ```
//!
//! A message is a run of frames followed by a zero-length terminator frame.
//! Decoded values may span frame boundaries, so consumers concatenate
//! payloads and decode from the pooled bytes; [`MessageReader`] does exactly
//! that, pulling one more frame whenever the codec reports an incomplete
//! value.

use crate::error::WireError;
use avrpc_codec::{decode, Decoded, Value};
use avrpc_schema::Schema;
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the frame length prefix in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Encodes a single frame: big-endian length prefix plus payload.
pub fn frame(payload: &[u8]) -> Result<Bytes, WireError> {
    let len = u32::try_from(payload.len()).map_err(|_| WireError::FrameTooLarge(payload.len()))?;
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Accumulates frames into a complete message body.
#[derive(Debug, Default)]
pub struct MessageBuilder {
    buf: BytesMut,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one frame carrying `payload`. Empty payloads are dropped so
    /// a message can never contain a premature terminator.
    pub fn push(&mut self, payload: &[u8]) -> Result<&mut Self, WireError> {
        if !payload.is_empty() {
            self.buf.extend_from_slice(&frame(payload)?);
        }
        Ok(self)
    }

    /// Appends the zero-length terminator and returns the message body.
    pub fn finish(mut self) -> Bytes {
        self.buf.put_u32(0);
        self.buf.freeze()
    }
}

/// Iterates the payload segments of a framed message.
///
/// Yields each non-empty payload in order and stops at the zero-length
/// terminator. A frame whose declared length overruns the buffer, or a
/// buffer that ends before the terminator, yields an error. The iterator
/// borrows the buffer, so restarting is just calling [`frames`] again.
pub fn frames(message: &[u8]) -> Frames<'_> {
    Frames {
        buf: message,
        pos: 0,
        done: false,
    }
}

#[derive(Debug, Clone)]
pub struct Frames<'a> {
    buf: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Iterator for Frames<'a> {
    type Item = Result<&'a [u8], WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let remaining = &self.buf[self.pos..];
        if remaining.len() < FRAME_HEADER_SIZE {
            self.done = true;
            return Some(Err(WireError::TruncatedFrame {
                needed: FRAME_HEADER_SIZE,
                available: remaining.len(),
            }));
        }
        let len = u32::from_be_bytes(
            remaining[..FRAME_HEADER_SIZE]
                .try_into()
                .expect("4-byte prefix"),
        ) as usize;
        if len == 0 {
            // Terminator.
            self.pos += FRAME_HEADER_SIZE;
            self.done = true;
            return None;
        }
        let body = &remaining[FRAME_HEADER_SIZE..];
        if body.len() < len {
            self.done = true;
            return Some(Err(WireError::TruncatedFrame {
                needed: len,
                available: body.len(),
            }));
        }
        self.pos += FRAME_HEADER_SIZE + len;
        Some(Ok(&body[..len]))
    }
}

/// Concatenates all frame payloads of a message into one buffer.
pub fn unframe(message: &[u8]) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    for payload in frames(message) {
        out.extend_from_slice(payload?);
    }
    Ok(out)
}

/// Decodes a stream of values out of a framed message.
///
/// Values are not aligned to frames: a value may span several frames and a
/// frame may carry several values. `read_value` decodes from the bytes
/// pooled so far and pulls the next frame whenever the codec needs more;
/// running out of frames mid-value is a truncated message.
pub struct MessageReader<'a> {
    frames: Frames<'a>,
    pool: BytesMut,
    consumed: usize,
}

impl<'a> MessageReader<'a> {
    pub fn new(message: &'a [u8]) -> Self {
        Self {
            frames: frames(message),
            pool: BytesMut::new(),
            consumed: 0,
        }
    }

    /// Decodes the next value, written under `writer`, into the shape of
    /// `reader`.
    pub fn read_value(&mut self, reader: &Schema, writer: &Schema) -> Result<Value, WireError> {
        loop {
            match decode(reader, writer, &self.pool[self.consumed..])? {
                Decoded::Complete { value, consumed } => {
                    self.consumed += consumed;
                    return Ok(value);
                }
                Decoded::Incomplete => match self.frames.next() {
                    Some(payload) => self.pool.extend_from_slice(payload?),
                    None => return Err(WireError::TruncatedMessage),
                },
            }
        }
    }

    /// Decodes the next value with identical reader and writer schemas.
    pub fn read_one(&mut self, schema: &Schema) -> Result<Value, WireError> {
        self.read_value(schema, schema)
    }
}
