//! Application side-effects and intents.
//!
//! This module defines the [`AppAction`] enum, which represents instructions
//! produced by the [`crate::App`] state machine for the runtime to execute.

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the current state.
    Render,

    /// Quit the application.
    Quit,

    /// Start the relay connection lifecycle.
    Connect {
        /// Relay WebSocket URL.
        relay_url: String,
    },

    /// Announce the local display name.
    SetUser {
        /// Display name.
        name: String,
    },

    /// Ask the relay to broker a key exchange with a peer.
    StartConversation {
        /// Peer display name.
        peer: String,
    },

    /// Report who is online and which peers have a key.
    ListPeers,

    /// Encrypt and send a chat message.
    SendMessage {
        /// Peer display name.
        peer: String,
        /// Message plaintext.
        text: String,
    },
}
