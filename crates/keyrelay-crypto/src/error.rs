//! Crypto adapter errors.

use thiserror::Error;

/// Errors from key handling and envelope operations.
///
/// Only [`CryptoError::CryptoUnavailable`] is fatal to a session. The others
/// abort a single operation and leave all state untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// No usable entropy source; no identity can be created.
    #[error("crypto unavailable: {reason}")]
    CryptoUnavailable {
        /// What failed.
        reason: String,
    },

    /// Portable key text could not be imported.
    #[error("malformed key: {reason}")]
    MalformedKey {
        /// Why the key was rejected.
        reason: String,
    },

    /// Plaintext could not be sealed (e.g. over the size bound).
    #[error("encryption failed: {reason}")]
    EncryptionFailed {
        /// Why sealing failed.
        reason: String,
    },

    /// Envelope is corrupt, truncated or not addressed to this identity.
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Why opening failed.
        reason: String,
    },
}

impl CryptoError {
    /// Whether the session can continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CryptoUnavailable { .. })
    }
}
