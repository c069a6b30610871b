//! Error types for the keyrelay core.
//!
//! Connection lifecycle errors and environment failures. Protocol and crypto
//! errors live in their own crates.

use std::time::Duration;

use thiserror::Error;

use crate::connection::ConnectionState;

/// The environment could not supply secure random bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("entropy unavailable: {reason}")]
pub struct EntropyError {
    /// What the random source reported.
    pub reason: String,
}

/// Errors that can occur during connection lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: String,
    },

    /// Every reconnect attempt allowed by the policy failed
    #[error("gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted {
        /// Attempts made since the last successful connection
        attempts: u32,
    },

    /// Relay handshake did not complete within timeout
    #[error("handshake timeout after {elapsed:?}")]
    HandshakeTimeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// Underlying transport error
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnectionError {
    /// Returns true if this error is transient and may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::HandshakeTimeout { .. } | Self::Transport(_))
    }
}

impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
