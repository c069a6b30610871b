//! Client errors.

use keyrelay_crypto::CryptoError;
use thiserror::Error;

/// Errors raised while handling a [`crate::ClientEvent`].
///
/// `Client::handle` never returns these directly. Errors that callers should
/// hear about surface as [`crate::ClientAction::Failed`]; skipped operations
/// (not connected, unknown peer) surface as [`crate::ClientAction::Log`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No secure randomness at startup; the session has no identity.
    #[error("crypto unavailable: {reason}")]
    CryptoUnavailable {
        /// What failed.
        reason: String,
    },

    /// A peer advertised a key we could not import.
    #[error("malformed key from {peer}: {reason}")]
    MalformedKey {
        /// Peer that sent the key.
        peer: String,
        /// Why import failed.
        reason: String,
    },

    /// Encrypting a message for a peer failed.
    #[error("encryption for {peer} failed: {reason}")]
    EncryptionFailed {
        /// Intended recipient.
        peer: String,
        /// Why encryption failed.
        reason: String,
    },

    /// A message from a peer could not be decrypted.
    #[error("decryption of message from {peer} failed: {reason}")]
    DecryptionFailed {
        /// Claimed sender.
        peer: String,
        /// Why decryption failed.
        reason: String,
    },

    /// The relay link is down.
    #[error("cannot {operation}: not connected to relay")]
    TransportNotConnected {
        /// What was attempted.
        operation: &'static str,
    },

    /// The relay accepted the link but the send did not go out.
    #[error("send to {peer} failed: {reason}")]
    SendFailed {
        /// Intended recipient.
        peer: String,
        /// Transport error text.
        reason: String,
    },

    /// The display name is not in the roster.
    #[error("unknown peer: {peer}")]
    UnknownPeer {
        /// Name that was looked up.
        peer: String,
    },

    /// Messaging attempted before the peer's key arrived.
    #[error("no public key for {peer} yet")]
    KeyNotEstablished {
        /// Peer without a key.
        peer: String,
    },

    /// The session has no identity (crypto unavailable at startup).
    #[error("no local identity")]
    NoIdentity,
}

impl ClientError {
    /// Wrap a crypto error with the peer it concerns.
    pub fn from_crypto(err: CryptoError, peer: &str) -> Self {
        let peer = peer.to_string();
        match err {
            CryptoError::CryptoUnavailable { reason } => Self::CryptoUnavailable { reason },
            CryptoError::MalformedKey { reason } => Self::MalformedKey { peer, reason },
            CryptoError::EncryptionFailed { reason } => Self::EncryptionFailed { peer, reason },
            CryptoError::DecryptionFailed { reason } => Self::DecryptionFailed { peer, reason },
        }
    }

    /// Whether the session can no longer exchange messages.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CryptoUnavailable { .. })
    }

    /// Whether the failure stays out of the user's view. The affected
    /// message is dropped and only the log records it.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::EncryptionFailed { .. } | Self::DecryptionFailed { .. })
    }

    /// Whether the operation is quietly skipped rather than reported.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::TransportNotConnected { .. }
                | Self::UnknownPeer { .. }
                | Self::KeyNotEstablished { .. }
                | Self::NoIdentity
        )
    }
}
