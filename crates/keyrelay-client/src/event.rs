//! Client events and actions.

use keyrelay_proto::{InboundEvent, OutboundEvent};

use crate::{directory::Message, error::ClientError};

/// Identifies an outbound chat message between [`ClientAction::SendChat`]
/// and its completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SendReceipt(pub u64);

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Reporting relay link status
/// - Decoding relay pushes into [`InboundEvent`]s
/// - Forwarding user intents
/// - Reporting the outcome of every [`ClientAction::SendChat`]
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The local user picked a display name.
    SetUser {
        /// Display name to announce.
        name: String,
    },

    /// Relay link is up (first connect or reconnect).
    Connected,

    /// Relay link dropped.
    Disconnected,

    /// Relay pushed an event.
    RelayReceived(InboundEvent),

    /// User opened a conversation with a peer.
    StartConversation {
        /// Peer display name.
        peer: String,
    },

    /// User wants to send a chat message.
    SendMessage {
        /// Peer display name.
        peer: String,
        /// Message plaintext.
        text: String,
    },

    /// A [`ClientAction::SendChat`] reached the relay.
    MessageSent {
        /// Receipt from the action.
        receipt: SendReceipt,
    },

    /// A [`ClientAction::SendChat`] could not be delivered to the relay.
    SendFailed {
        /// Receipt from the action.
        receipt: SendReceipt,
        /// Transport error text.
        reason: String,
    },
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Send this event to the relay.
    Send(OutboundEvent),

    /// Send a chat message and report the outcome with
    /// [`ClientEvent::MessageSent`] or [`ClientEvent::SendFailed`].
    SendChat {
        /// Receipt to echo back.
        receipt: SendReceipt,
        /// `SendMessage` event carrying the ciphertext.
        event: OutboundEvent,
    },

    /// The roster changed.
    RosterChanged {
        /// Current peers in name order.
        peers: Vec<String>,
    },

    /// A peer's public key was installed.
    KeyEstablished {
        /// Peer display name.
        peer: String,
        /// Short key fingerprint for display.
        fingerprint: String,
    },

    /// A decrypted message was added to a peer's history.
    MessageReceived {
        /// Sender display name.
        peer: String,
        /// The stored message.
        message: Message,
    },

    /// An outbound message reached the relay and was added to history.
    MessageSent {
        /// Recipient display name.
        peer: String,
        /// The stored message.
        message: Message,
    },

    /// A recoverable or fatal failure to report.
    Failed {
        /// What went wrong.
        error: ClientError,
    },

    /// Log message for debugging.
    Log {
        /// Log message.
        message: String,
    },
}
