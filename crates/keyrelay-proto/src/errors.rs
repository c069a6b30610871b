//! Wire-level error types.

use thiserror::Error;

/// Errors decoding or encoding relay traffic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Record is not valid JSON or does not match the expected shape.
    #[error("malformed json: {0}")]
    Json(String),

    /// Invocation names an event this client does not understand.
    #[error("unknown event target: {0}")]
    UnknownTarget(String),

    /// Invocation carries the wrong number of positional arguments.
    #[error("{target}: expected {expected} arguments, got {actual}")]
    ArgumentCount {
        /// Event target name.
        target: &'static str,
        /// Number of arguments the event requires.
        expected: usize,
        /// Number of arguments received.
        actual: usize,
    },

    /// A positional argument has the wrong type or shape.
    #[error("{target}: invalid argument {index}: {reason}")]
    InvalidArgument {
        /// Event target name.
        target: &'static str,
        /// Zero-based argument position.
        index: usize,
        /// Decoder message.
        reason: String,
    },

    /// Invocation message without a `target` field.
    #[error("invocation without target")]
    MissingTarget,

    /// The relay refused the protocol handshake.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result alias for wire operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
