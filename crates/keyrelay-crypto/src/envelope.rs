//! Hybrid envelope encryption.
//!
//! See the crate docs for the envelope layout.

use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::{error::CryptoError, identity::PublicKeyHandle};

/// Envelope format version.
pub const ENVELOPE_VERSION: u8 = 0x01;

const EPHEMERAL_SIZE: usize = 32;
const NONCE_SIZE: usize = 24;
const TAG_SIZE: usize = 16;
const HEADER_SIZE: usize = 1 + EPHEMERAL_SIZE;

/// Random bytes consumed per envelope: ephemeral secret then nonce.
pub const ENVELOPE_RANDOM_SIZE: usize = EPHEMERAL_SIZE + NONCE_SIZE;

/// Envelope bytes added on top of the plaintext length.
pub const ENVELOPE_OVERHEAD: usize = HEADER_SIZE + NONCE_SIZE + TAG_SIZE;

/// Largest plaintext accepted by [`encrypt`].
pub const MAX_PLAINTEXT_SIZE: usize = 64 * 1024;

const KDF_INFO: &[u8] = b"keyrelay envelope v1";

/// Seal `plaintext` so only the holder of `recipient`'s identity can read it.
///
/// # Errors
///
/// - `EncryptionFailed` if the plaintext exceeds [`MAX_PLAINTEXT_SIZE`] or the
///   AEAD rejects the input.
pub fn encrypt(
    recipient: &PublicKeyHandle,
    plaintext: &[u8],
    random: [u8; ENVELOPE_RANDOM_SIZE],
) -> Result<Vec<u8>, CryptoError> {
    if plaintext.len() > MAX_PLAINTEXT_SIZE {
        return Err(CryptoError::EncryptionFailed {
            reason: format!(
                "plaintext is {} bytes, limit is {MAX_PLAINTEXT_SIZE}",
                plaintext.len()
            ),
        });
    }

    let random = Zeroizing::new(random);
    let mut ephemeral_bytes = Zeroizing::new([0u8; EPHEMERAL_SIZE]);
    ephemeral_bytes.copy_from_slice(&random[..EPHEMERAL_SIZE]);
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&random[EPHEMERAL_SIZE..]);

    let ephemeral = StaticSecret::from(*ephemeral_bytes);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(recipient.inner());

    let key = derive_key(shared.as_bytes(), ephemeral_public.as_bytes(), recipient.as_bytes())
        .map_err(|reason| CryptoError::EncryptionFailed { reason })?;

    let mut envelope = Vec::with_capacity(plaintext.len() + ENVELOPE_OVERHEAD);
    envelope.push(ENVELOPE_VERSION);
    envelope.extend_from_slice(ephemeral_public.as_bytes());

    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
    let sealed = cipher
        .encrypt(XNonce::from_slice(&nonce), Payload { msg: plaintext, aad: &envelope })
        .map_err(|_| CryptoError::EncryptionFailed { reason: "AEAD seal failed".to_string() })?;

    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&sealed);
    Ok(envelope)
}

pub(crate) fn open(
    secret: &StaticSecret,
    recipient_public: &PublicKeyHandle,
    envelope: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if envelope.len() < ENVELOPE_OVERHEAD {
        return Err(CryptoError::DecryptionFailed {
            reason: format!(
                "envelope is {} bytes, minimum is {ENVELOPE_OVERHEAD}",
                envelope.len()
            ),
        });
    }

    let (header, body) = envelope.split_at(HEADER_SIZE);
    if header[0] != ENVELOPE_VERSION {
        return Err(CryptoError::DecryptionFailed {
            reason: format!("unknown envelope version {:#04x}", header[0]),
        });
    }

    let mut ephemeral_bytes = [0u8; EPHEMERAL_SIZE];
    ephemeral_bytes.copy_from_slice(&header[1..]);
    let ephemeral_public = PublicKey::from(ephemeral_bytes);

    let shared = secret.diffie_hellman(&ephemeral_public);
    if !shared.was_contributory() {
        return Err(CryptoError::DecryptionFailed {
            reason: "ephemeral key is a low-order point".to_string(),
        });
    }

    let key = derive_key(shared.as_bytes(), &ephemeral_bytes, recipient_public.as_bytes())
        .map_err(|reason| CryptoError::DecryptionFailed { reason })?;

    let (nonce, sealed) = body.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
    cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: sealed, aad: header })
        .map_err(|_| CryptoError::DecryptionFailed {
            reason: "authentication failed".to_string(),
        })
}

fn derive_key(
    shared: &[u8; 32],
    ephemeral_public: &[u8; EPHEMERAL_SIZE],
    recipient_public: &[u8; 32],
) -> Result<Zeroizing<[u8; 32]>, String> {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(ephemeral_public);
    salt[32..].copy_from_slice(recipient_public);

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared);
    let mut key = Zeroizing::new([0u8; 32]);
    hk.expand(KDF_INFO, &mut key[..]).map_err(|e| format!("key derivation failed: {e}"))?;
    Ok(key)
}
