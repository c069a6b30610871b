//! Application input events.
//!
//! This module defines [`AppEvent`], the set of inputs that drive the
//! [`crate::App`] state machine.
//!
//! Events originate from two distinct sources:
//! - User input lines and system ticks.
//! - Protocol and connection notifications translated by the runtime and the
//!   [`crate::Bridge`].

use keyrelay_client::{KeyState, Message};

/// Events processed by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// One line typed by the user.
    Input(String),

    /// Periodic tick.
    Tick,

    /// Connection attempt in progress.
    Connecting {
        /// Retries since the last successful connection.
        attempt: u32,
    },

    /// Relay link is up.
    Connected,

    /// Relay link dropped or an attempt failed.
    Disconnected {
        /// What happened.
        reason: String,
    },

    /// Reconnect attempts exhausted.
    ConnectionClosed {
        /// Why the connection gave up.
        reason: String,
    },

    /// The relay roster changed.
    RosterChanged {
        /// Peers in name order, local user excluded.
        peers: Vec<String>,
    },

    /// Directory listing requested with `/peers`.
    PeerList {
        /// Peers in name order with their key exchange progress.
        peers: Vec<(String, KeyState)>,
    },

    /// A peer's public key was installed.
    KeyEstablished {
        /// Peer display name.
        peer: String,
        /// Short key fingerprint.
        fingerprint: String,
    },

    /// A decrypted message arrived.
    MessageReceived {
        /// Sender display name.
        peer: String,
        /// Stored message.
        message: Message,
    },

    /// An outbound message reached the relay.
    MessageSent {
        /// Recipient display name.
        peer: String,
        /// Stored message.
        message: Message,
    },

    /// Informational note, e.g. a skipped operation.
    Notice {
        /// Note text.
        message: String,
    },

    /// Recoverable error.
    Error {
        /// Error description.
        message: String,
    },

    /// Messaging is permanently unavailable for this session.
    Fatal {
        /// Error description.
        message: String,
    },
}
