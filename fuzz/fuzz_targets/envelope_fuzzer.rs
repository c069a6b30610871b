//! Fuzz target for untrusted key and envelope input
//!
//! # Strategy
//!
//! - Arbitrary text imported as a portable public key
//! - Arbitrary bytes opened as an envelope
//! - Valid envelopes with one byte flipped
//!
//! # Invariants
//!
//! - Import and decrypt return structured errors, NEVER panic
//! - A flipped byte anywhere in an envelope fails decryption

#![no_main]

use arbitrary::Arbitrary;
use keyrelay_crypto::{ENVELOPE_RANDOM_SIZE, Identity, PortableKey, encrypt, import_public_key};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Attack {
    ImportKey { text: String },
    OpenGarbage { bytes: Vec<u8> },
    FlipByte { plaintext: Vec<u8>, position: usize, mask: u8 },
}

fuzz_target!(|input: (Attack, [u8; 32], [u8; ENVELOPE_RANDOM_SIZE])| {
    let (attack, entropy, random) = input;
    let Ok(identity) = Identity::generate(entropy) else {
        return;
    };

    match attack {
        Attack::ImportKey { text } => {
            let _ = import_public_key(&PortableKey::from(text));
        },
        Attack::OpenGarbage { bytes } => {
            let _ = identity.decrypt(&bytes);
        },
        Attack::FlipByte { plaintext, position, mask } => {
            let Ok(mut envelope) = encrypt(identity.public_key(), &plaintext, random) else {
                return;
            };
            if mask == 0 {
                return;
            }
            let index = position % envelope.len();
            envelope[index] ^= mask;
            assert!(identity.decrypt(&envelope).is_err());
        },
    }
});
