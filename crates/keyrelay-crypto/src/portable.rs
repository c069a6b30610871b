//! Portable public key text.
//!
//! Public keys travel as a JSON Web Key for an X25519 octet key pair:
//!
//! ```text
//! {"kty":"OKP","crv":"X25519","x":"<base64url, no padding>"}
//! ```
//!
//! Export always produces exactly these three members in this order, so the
//! text is stable for a given key. Import ignores extra members (`ext`,
//! `key_ops`, ...) that other JWK producers add.
//!
//! Keys are X25519 because messages are sealed in a hybrid envelope (see
//! [`crate::envelope`]). RSA keys in the modulus/exponent JWK form
//! (`{"kty":"RSA","n":..,"e":..}`) are not accepted; importing one fails
//! with [`CryptoError::MalformedKey`], so a peer still on RSA-OAEP cannot
//! complete a key exchange with this client.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::{
    error::CryptoError,
    identity::{PUBLIC_KEY_SIZE, PublicKeyHandle},
};

const KEY_TYPE: &str = "OKP";
const CURVE: &str = "X25519";

/// Transport-safe text form of a public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortableKey(String);

impl PortableKey {
    pub(crate) fn from_handle(handle: &PublicKeyHandle) -> Self {
        let jwk = Jwk {
            kty: KEY_TYPE.to_string(),
            crv: CURVE.to_string(),
            x: URL_SAFE_NO_PAD.encode(handle.as_bytes()),
        };
        // Three string members cannot fail to serialize.
        Self(serde_json::to_string(&jwk).unwrap_or_default())
    }

    /// Key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the key text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for PortableKey {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for PortableKey {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl std::fmt::Display for PortableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize)]
struct Jwk {
    kty: String,
    crv: String,
    x: String,
}

/// Import a peer's advertised key.
///
/// # Errors
///
/// - `MalformedKey` if the text is not a JWK, names another key type or
///   curve, has an undecodable or wrong-length `x`, or encodes a low-order
///   point.
pub fn import_public_key(key: &PortableKey) -> Result<PublicKeyHandle, CryptoError> {
    let jwk: Jwk = serde_json::from_str(key.as_str())
        .map_err(|e| CryptoError::MalformedKey { reason: format!("not a JWK: {e}") })?;

    if jwk.kty != KEY_TYPE {
        return Err(CryptoError::MalformedKey {
            reason: format!("unsupported key type {:?}", jwk.kty),
        });
    }
    if jwk.crv != CURVE {
        return Err(CryptoError::MalformedKey { reason: format!("unsupported curve {:?}", jwk.crv) });
    }

    let raw = URL_SAFE_NO_PAD
        .decode(jwk.x.as_bytes())
        .map_err(|e| CryptoError::MalformedKey { reason: format!("bad base64 in x: {e}") })?;

    let bytes: [u8; PUBLIC_KEY_SIZE] = raw.try_into().map_err(|raw: Vec<u8>| {
        CryptoError::MalformedKey {
            reason: format!("expected {PUBLIC_KEY_SIZE} key bytes, got {}", raw.len()),
        }
    })?;

    PublicKeyHandle::from_bytes(bytes)
}
