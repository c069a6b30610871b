//! Observable application state types.
//!
//! This module defines the data structures that represent the application's
//! current view of the world: [`ConnectionState`] and per-peer
//! [`PeerState`].
//!
//! These hold presentation state only. Keys and conversation history live in
//! the client's [`keyrelay_client::PeerDirectory`], which drivers read when
//! rendering.

/// Connection state as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected to the relay.
    Disconnected,
    /// Connection attempt in progress.
    Connecting {
        /// Retries since the last successful connection.
        attempt: u32,
    },
    /// Relay link is up.
    Connected,
    /// Gave up reconnecting.
    Closed,
}

/// Per-peer view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerState {
    /// Display name.
    pub name: String,
    /// Has messages the user has not looked at.
    pub unread: bool,
}

impl PeerState {
    /// Create a peer view with nothing unread.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), unread: false }
    }
}
