//! Relay wire contract.
//!
//! The relay is an external real-time hub. It routes named events between
//! connected clients and never interprets their payloads. This crate defines
//! the two halves of that contract:
//!
//! - [`events`]: the typed events a client sends ([`OutboundEvent`]) and
//!   receives ([`InboundEvent`]), and their positional-argument encoding.
//! - [`hub`]: the JSON hub protocol that carries those events over a text
//!   stream (handshake, `0x1E`-terminated records, ping and close messages).
//!
//! # Invariants
//!
//! - Every event maps to exactly one hub target name, and decoding the
//!   invocation produced by encoding an event yields the same event.
//! - Ciphertext travels as an explicit JSON array of byte values, never as a
//!   binary blob, so it survives any JSON-only transport.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod events;
pub mod hub;

pub use errors::{ProtocolError, Result};
pub use events::{InboundEvent, KeyOffer, KeyRequest, OutboundEvent, PeerMessage};
pub use hub::{FrameBuffer, HandshakeRequest, HandshakeResponse, HubMessage, Invocation};
