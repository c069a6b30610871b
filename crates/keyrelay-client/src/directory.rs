//! Peer directory.
//!
//! The single source of truth for everyone we can talk to: who is online,
//! whose public key we hold, and the conversation history with each of them.
//! Keyed by display name, which the relay guarantees to be unique.

use std::collections::BTreeMap;

use keyrelay_crypto::PublicKeyHandle;

/// Which side wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sent by the local user.
    Outbound,
    /// Received from the peer.
    Inbound,
}

/// One entry in a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Plaintext.
    pub text: String,
    /// Unix milliseconds when the message was recorded locally.
    pub timestamp: u64,
    /// Who wrote it.
    pub direction: Direction,
}

impl Message {
    /// Message written by the local user.
    pub fn outbound(text: impl Into<String>, timestamp: u64) -> Self {
        Self { text: text.into(), timestamp, direction: Direction::Outbound }
    }

    /// Message written by the peer.
    pub fn inbound(text: impl Into<String>, timestamp: u64) -> Self {
        Self { text: text.into(), timestamp, direction: Direction::Inbound }
    }
}

/// Key exchange progress for a display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// Not in the roster.
    Unknown,
    /// In the roster, no public key yet.
    KeyPending,
    /// Public key installed; messaging allowed.
    KeyEstablished,
}

/// A remote participant.
#[derive(Debug, Clone)]
pub struct Peer {
    name: String,
    public_key: Option<PublicKeyHandle>,
    history: Vec<Message>,
}

impl Peer {
    fn new(name: String) -> Self {
        Self { name, public_key: None, history: Vec::new() }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Imported public key, once exchanged.
    pub fn public_key(&self) -> Option<&PublicKeyHandle> {
        self.public_key.as_ref()
    }

    /// Conversation history, oldest first.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Key exchange progress.
    pub fn key_state(&self) -> KeyState {
        if self.public_key.is_some() { KeyState::KeyEstablished } else { KeyState::KeyPending }
    }
}

/// All known peers, ordered by display name.
#[derive(Debug, Clone, Default)]
pub struct PeerDirectory {
    peers: BTreeMap<String, Peer>,
}

impl PeerDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory for a new roster, carrying over state for names that remain.
    ///
    /// Surviving peers keep their key and history, new names start empty,
    /// names missing from `names` are dropped along with their history.
    /// Duplicate names collapse to one peer.
    pub fn merged<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let mut peers = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            let peer = self.peers.get(name).cloned().unwrap_or_else(|| Peer::new(name.to_string()));
            peers.insert(name.to_string(), peer);
        }
        Self { peers }
    }

    /// Replace the roster in place. See [`PeerDirectory::merged`].
    pub fn replace_roster<S: AsRef<str>>(&mut self, names: &[S]) {
        *self = self.merged(names);
    }

    /// Install a peer's public key.
    ///
    /// Returns `false` and changes nothing if the peer is unknown. Installing
    /// the same key again is a no-op; a different key replaces the old one.
    pub fn set_public_key(&mut self, name: &str, key: PublicKeyHandle) -> bool {
        let Some(peer) = self.peers.get_mut(name) else {
            return false;
        };

        if let Some(existing) = peer.public_key
            && existing != key
        {
            tracing::debug!(
                peer = name,
                old = %existing.fingerprint(),
                new = %key.fingerprint(),
                "peer re-sent a different public key"
            );
        }

        peer.public_key = Some(key);
        true
    }

    /// Append to a peer's history.
    ///
    /// Returns `false` and logs if the peer is unknown; the message is lost.
    pub fn append_message(&mut self, name: &str, message: Message) -> bool {
        match self.peers.get_mut(name) {
            Some(peer) => {
                peer.history.push(message);
                true
            },
            None => {
                tracing::warn!(peer = name, "dropping message for peer not in roster");
                false
            },
        }
    }

    /// Look up a peer.
    pub fn get(&self, name: &str) -> Option<&Peer> {
        self.peers.get(name)
    }

    /// Whether `name` is in the roster.
    pub fn contains(&self, name: &str) -> bool {
        self.peers.contains_key(name)
    }

    /// Key exchange progress for `name`.
    pub fn key_state(&self, name: &str) -> KeyState {
        self.peers.get(name).map_or(KeyState::Unknown, Peer::key_state)
    }

    /// Display names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.peers.keys().map(String::as_str)
    }

    /// All peers in name order.
    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    /// Number of peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
