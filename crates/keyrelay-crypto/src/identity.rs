//! Session identity and public key handles.

use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::{envelope, error::CryptoError, portable::PortableKey};

/// Bytes of entropy consumed by [`Identity::generate`].
pub const ENTROPY_SIZE: usize = 32;

/// Size of a raw public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Fixed scalar used to probe public keys for small-subgroup points.
///
/// Clamping makes every X25519 scalar a multiple of the cofactor, so a
/// low-order point maps to the identity for any scalar, including this one.
const PROBE_SCALAR: [u8; 32] = [0x55; 32];

/// Imported public key of a peer; the target of [`crate::encrypt`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKeyHandle(PublicKey);

impl PublicKeyHandle {
    /// Build a handle from raw bytes, rejecting small-subgroup points.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Result<Self, CryptoError> {
        let key = PublicKey::from(bytes);
        let probe = StaticSecret::from(PROBE_SCALAR);
        if !probe.diffie_hellman(&key).was_contributory() {
            return Err(CryptoError::MalformedKey {
                reason: "public key is a low-order point".to_string(),
            });
        }
        Ok(Self(key))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.0.as_bytes()
    }

    /// Short hex digest for logs. Never log the key itself.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..8])
    }

    pub(crate) fn inner(&self) -> &PublicKey {
        &self.0
    }
}

impl std::fmt::Debug for PublicKeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKeyHandle({})", self.fingerprint())
    }
}

/// A session's keypair.
///
/// Created once per process, never persisted. The secret half is only used
/// by [`Identity::decrypt`] and is zeroized when the identity is dropped.
pub struct Identity {
    secret: StaticSecret,
    public: PublicKeyHandle,
}

impl Identity {
    /// Derive a fresh identity from caller-provided entropy.
    ///
    /// # Errors
    ///
    /// - `CryptoUnavailable` if the entropy is all zeroes, which is what a
    ///   failed or absent random source typically yields.
    pub fn generate(entropy: [u8; ENTROPY_SIZE]) -> Result<Self, CryptoError> {
        let entropy = Zeroizing::new(entropy);
        if entropy.iter().all(|&b| b == 0) {
            return Err(CryptoError::CryptoUnavailable {
                reason: "entropy source returned only zero bytes".to_string(),
            });
        }

        let secret = StaticSecret::from(*entropy);
        let public = PublicKeyHandle::from_bytes(PublicKey::from(&secret).to_bytes())?;
        Ok(Self { secret, public })
    }

    /// Our public key.
    pub fn public_key(&self) -> &PublicKeyHandle {
        &self.public
    }

    /// Export our public key in portable form.
    pub fn export_public_key(&self) -> PortableKey {
        PortableKey::from_handle(&self.public)
    }

    /// Open an envelope addressed to this identity.
    ///
    /// # Errors
    ///
    /// - `DecryptionFailed` on truncation, unknown version, wrong recipient or
    ///   tampering.
    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>, CryptoError> {
        envelope::open(&self.secret, &self.public, envelope)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity").field("public", &self.public).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identities_from_different_entropy_differ() {
        let a = Identity::generate([1; ENTROPY_SIZE]).unwrap();
        let b = Identity::generate([2; ENTROPY_SIZE]).unwrap();

        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn same_entropy_same_public_key() {
        let a = Identity::generate([7; ENTROPY_SIZE]).unwrap();
        let b = Identity::generate([7; ENTROPY_SIZE]).unwrap();

        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn zero_entropy_is_unavailable() {
        let result = Identity::generate([0; ENTROPY_SIZE]);

        assert!(matches!(result, Err(CryptoError::CryptoUnavailable { .. })));
        assert!(result.unwrap_err().is_fatal());
    }

    #[test]
    fn low_order_points_are_rejected() {
        // u = 0 and u = 1 are both small-order
        assert!(PublicKeyHandle::from_bytes([0; PUBLIC_KEY_SIZE]).is_err());

        let mut one = [0u8; PUBLIC_KEY_SIZE];
        one[0] = 1;
        assert!(PublicKeyHandle::from_bytes(one).is_err());
    }

    #[test]
    fn debug_does_not_expose_secret() {
        let id = Identity::generate([9; ENTROPY_SIZE]).unwrap();
        let rendered = format!("{id:?}");

        assert!(rendered.contains(&id.public_key().fingerprint()));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn fingerprint_is_sixteen_hex_chars() {
        let id = Identity::generate([3; ENTROPY_SIZE]).unwrap();
        let fp = id.public_key().fingerprint();

        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
