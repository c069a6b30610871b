//! Keyrelay Cryptographic Primitives
//!
//! The crypto adapter for keyrelay: a per-session [`Identity`], a portable
//! text form for public keys, and a hybrid envelope that encrypts chat
//! messages for a single recipient. All functions are pure; callers provide
//! random bytes so protocol code stays deterministic under simulation.
//!
//! # Envelope
//!
//! Asymmetric keys only wrap a per-message symmetric key; the message body is
//! sealed with that key. This removes the payload-size ceiling of raw
//! public-key encryption while keeping a single `encrypt`/`decrypt` contract.
//!
//! ```text
//! random ──► ephemeral X25519 secret ──┐
//!                                      ├─ ECDH ─► HKDF-SHA256 ─► message key
//! recipient public key ────────────────┘                            │
//!                                                                   ▼
//! plaintext ─────────────────────────────────► XChaCha20-Poly1305 ─► ciphertext
//!
//! envelope = 0x01 || ephemeral_public (32) || nonce (24) || ciphertext || tag (16)
//! ```
//!
//! # Security
//!
//! Confidentiality:
//! - The private half of an [`Identity`] never leaves this crate and is
//!   zeroized on drop
//! - Every envelope uses a fresh ephemeral key and nonce
//!
//! Integrity:
//! - The AEAD tag covers the ciphertext and the envelope header
//! - Any modified byte fails decryption
//!
//! Not provided:
//! - Sender authentication: anyone holding a public key can encrypt to it
//! - Forward secrecy: a leaked identity decrypts every envelope sent to it

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
pub mod error;
pub mod identity;
pub mod portable;

pub use envelope::{ENVELOPE_OVERHEAD, ENVELOPE_RANDOM_SIZE, MAX_PLAINTEXT_SIZE, encrypt};
pub use error::CryptoError;
pub use identity::{ENTROPY_SIZE, Identity, PublicKeyHandle};
pub use portable::{PortableKey, import_public_key};
