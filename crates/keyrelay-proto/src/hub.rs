//! JSON hub protocol framing.
//!
//! The relay speaks a text hub protocol over a single stream (a WebSocket in
//! production). After connecting, the client sends a handshake record naming
//! the protocol; the relay answers with an empty object or an error. From then
//! on every record is one JSON object terminated by the record separator
//! `0x1E`. A transport message may carry several records, and a record may be
//! split across transport messages, so readers go through [`FrameBuffer`].
//!
//! Only three message types matter to the client:
//!
//! - `1` invocation: `{"type":1,"target":"...","arguments":[...]}`
//! - `6` ping: keepalive, ignored
//! - `7` close: `{"type":7,"error":"...","allowReconnect":true}`
//!
//! Every other type (stream items, completions, acks) is decoded as
//! [`HubMessage::Ignored`] so newer relays do not break older clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ProtocolError, Result};

/// Terminates every record on the wire.
pub const RECORD_SEPARATOR: u8 = 0x1E;

/// Protocol name announced in the handshake.
pub const PROTOCOL_NAME: &str = "json";

/// Protocol version announced in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound on a single buffered record. Anything larger is dropped.
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;

const TYPE_INVOCATION: u8 = 1;
const TYPE_PING: u8 = 6;
const TYPE_CLOSE: u8 = 7;

/// A named call with positional JSON arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Event name.
    pub target: String,
    /// Positional arguments.
    pub arguments: Vec<Value>,
}

impl Invocation {
    /// Create an invocation.
    pub fn new(target: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self { target: target.into(), arguments }
    }
}

/// Decoded hub record.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Fire-and-forget call.
    Invocation(Invocation),
    /// Keepalive.
    Ping,
    /// Relay is closing the connection.
    Close {
        /// Reason supplied by the relay.
        error: Option<String>,
        /// Whether the relay allows an automatic reconnect.
        allow_reconnect: bool,
    },
    /// Message type the client does not act on.
    Ignored {
        /// Raw `type` value.
        kind: u8,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arguments: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    allow_reconnect: Option<bool>,
}

impl RawMessage {
    fn of_kind(kind: u8) -> Self {
        Self { kind, target: None, arguments: None, error: None, allow_reconnect: None }
    }
}

impl HubMessage {
    /// Decode one record (without its separator).
    pub fn decode(record: &[u8]) -> Result<Self> {
        let raw: RawMessage = serde_json::from_slice(record)?;
        match raw.kind {
            TYPE_INVOCATION => {
                let target = raw.target.ok_or(ProtocolError::MissingTarget)?;
                Ok(Self::Invocation(Invocation::new(target, raw.arguments.unwrap_or_default())))
            },
            TYPE_PING => Ok(Self::Ping),
            TYPE_CLOSE => Ok(Self::Close {
                error: raw.error,
                allow_reconnect: raw.allow_reconnect.unwrap_or(false),
            }),
            kind => Ok(Self::Ignored { kind }),
        }
    }

    /// Encode as a record, separator included.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let raw = match self {
            Self::Invocation(invocation) => RawMessage {
                target: Some(invocation.target.clone()),
                arguments: Some(invocation.arguments.clone()),
                ..RawMessage::of_kind(TYPE_INVOCATION)
            },
            Self::Ping => RawMessage::of_kind(TYPE_PING),
            Self::Close { error, allow_reconnect } => RawMessage {
                error: error.clone(),
                allow_reconnect: Some(*allow_reconnect),
                ..RawMessage::of_kind(TYPE_CLOSE)
            },
            Self::Ignored { kind } => RawMessage::of_kind(*kind),
        };
        to_record(&raw)
    }
}

/// First record a client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    /// Protocol name.
    pub protocol: String,
    /// Protocol version.
    pub version: u32,
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self { protocol: PROTOCOL_NAME.to_string(), version: PROTOCOL_VERSION }
    }
}

impl HandshakeRequest {
    /// Encode as a record, separator included.
    pub fn encode(&self) -> Result<Vec<u8>> {
        to_record(self)
    }
}

/// Relay answer to the handshake. An empty object means accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    /// Rejection reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HandshakeResponse {
    /// Decode one record and fail if the relay rejected the handshake.
    pub fn decode(record: &[u8]) -> Result<Self> {
        let response: Self = serde_json::from_slice(record)?;
        match response.error {
            Some(reason) => Err(ProtocolError::HandshakeRejected(reason)),
            None => Ok(response),
        }
    }
}

fn to_record<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(value)?;
    bytes.push(RECORD_SEPARATOR);
    Ok(bytes)
}

/// Reassembles separator-terminated records from arbitrary chunks.
///
/// # Invariants
///
/// - Records are yielded in arrival order.
/// - A partial record is held until its separator arrives.
/// - A partial record larger than [`MAX_RECORD_SIZE`] is discarded.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk received from the transport.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
        if self.buf.len() > MAX_RECORD_SIZE && !self.buf.contains(&RECORD_SEPARATOR) {
            self.buf.clear();
        }
    }

    /// Pop the next complete record, separator stripped.
    pub fn next_record(&mut self) -> Option<Vec<u8>> {
        let end = self.buf.iter().position(|&b| b == RECORD_SEPARATOR)?;
        let mut record: Vec<u8> = self.buf.drain(..=end).collect();
        record.pop();
        Some(record)
    }

    /// Bytes buffered but not yet terminated.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}
