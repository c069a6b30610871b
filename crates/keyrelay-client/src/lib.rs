//! Client
//!
//! Action-based client state machine for keyrelay. Exchanges public keys with
//! peers through the relay and sends them end-to-end encrypted messages.
//!
//! # Architecture
//!
//! The client follows the Sans-IO pattern of [`keyrelay_core`]. It receives
//! events ([`ClientEvent`]), processes them through pure state machine logic,
//! and returns actions ([`ClientAction`]) for the caller to execute.
//!
//! # Components
//!
//! - [`Client`]: Session state machine (identity, connection flag, sends in
//!   flight)
//! - [`PeerDirectory`]: Roster, installed keys and history per peer
//! - [`ClientEvent`]: Events fed into the client
//! - [`ClientAction`]: Actions produced by the client
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::RelayConnection`]: WebSocket link speaking the JSON hub
//!   protocol
//! - [`transport::connect`]: Connect to a relay

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod directory;
mod error;
mod event;

#[cfg(feature = "transport")]
pub mod transport;

pub use client::Client;
pub use directory::{Direction, KeyState, Message, Peer, PeerDirectory};
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent, SendReceipt};
pub use keyrelay_core::env::Environment;
