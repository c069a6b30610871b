//! Client state machine.
//!
//! The `Client` owns the session identity and the [`PeerDirectory`], and turns
//! relay pushes and user intents into relay sends.
//!
//! # Per-peer key state
//!
//! ```text
//! ┌─────────┐ ListUsers ┌────────────┐ ReceivedPublicKey ┌────────────────┐
//! │ Unknown │──────────>│ KeyPending │──────────────────>│ KeyEstablished │
//! └─────────┘           └────────────┘                   └────────────────┘
//!      ^                      │                                  │
//!      └──────────────────────┴──── dropped from ListUsers ──────┘
//! ```
//!
//! `StartConversation` asks the relay to broker a key exchange but never
//! changes local state. Messaging is only allowed in `KeyEstablished`.

use std::collections::HashMap;

use keyrelay_core::env::Environment;
use keyrelay_crypto::{
    ENTROPY_SIZE, ENVELOPE_RANDOM_SIZE, Identity, PortableKey, PublicKeyHandle, encrypt,
    import_public_key,
};
use keyrelay_proto::{InboundEvent, KeyOffer, KeyRequest, OutboundEvent, PeerMessage};

use crate::{
    directory::{KeyState, Message, PeerDirectory},
    error::ClientError,
    event::{ClientAction, ClientEvent, SendReceipt},
};

/// Chat message waiting for its send outcome.
#[derive(Debug, Clone)]
struct PendingSend {
    peer: String,
    text: String,
}

/// Key exchange and encrypted messaging state machine.
///
/// Sans-IO: [`Client::handle`] consumes one event and returns the actions the
/// caller must execute. All session state lives here; nothing is global.
pub struct Client<E: Environment> {
    /// Environment for randomness and wall-clock timestamps.
    env: E,

    /// Session keypair. `None` when crypto was unavailable at startup.
    identity: Option<Identity>,

    /// Why the identity could not be created.
    startup_failure: Option<ClientError>,

    /// Display name announced to the relay.
    local_name: Option<String>,

    /// Whether the relay link is up.
    connected: bool,

    /// Everyone we can talk to.
    directory: PeerDirectory,

    /// Chat messages sent but not yet confirmed.
    pending_sends: HashMap<SendReceipt, PendingSend>,

    /// Next receipt number.
    next_receipt: u64,
}

impl<E: Environment> Client<E> {
    /// Create a client with a fresh identity drawn from the environment.
    ///
    /// If the environment has no entropy the client starts degraded; see
    /// [`Client::startup_failure`].
    pub fn new(env: E) -> Self {
        let identity = env
            .random_array::<ENTROPY_SIZE>()
            .map_err(|e| ClientError::CryptoUnavailable { reason: e.reason })
            .and_then(|entropy| {
                Identity::generate(entropy).map_err(|e| ClientError::from_crypto(e, ""))
            });

        match identity {
            Ok(identity) => Self::with_identity(env, identity),
            Err(error) => {
                tracing::error!(%error, "no identity; messaging disabled");
                let mut client = Self::build(env, None);
                client.startup_failure = Some(error);
                client
            },
        }
    }

    /// Create a client around an existing identity.
    pub fn with_identity(env: E, identity: Identity) -> Self {
        tracing::debug!(fingerprint = %identity.public_key().fingerprint(), "identity ready");
        Self::build(env, Some(identity))
    }

    fn build(env: E, identity: Option<Identity>) -> Self {
        Self {
            env,
            identity,
            startup_failure: None,
            local_name: None,
            connected: false,
            directory: PeerDirectory::new(),
            pending_sends: HashMap::new(),
            next_receipt: 0,
        }
    }

    /// Fatal error from startup, reported once by the caller.
    pub fn startup_failure(&self) -> Option<&ClientError> {
        self.startup_failure.as_ref()
    }

    /// Whether the session can encrypt and decrypt.
    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }

    /// Our public key.
    pub fn public_key(&self) -> Option<&PublicKeyHandle> {
        self.identity.as_ref().map(Identity::public_key)
    }

    /// Our public key in the form sent to peers.
    pub fn export_public_key(&self) -> Option<PortableKey> {
        self.identity.as_ref().map(Identity::export_public_key)
    }

    /// Announced display name.
    pub fn local_name(&self) -> Option<&str> {
        self.local_name.as_deref()
    }

    /// Whether the relay link is up.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Read access to the peer directory.
    pub fn directory(&self) -> &PeerDirectory {
        &self.directory
    }

    /// Number of chat messages awaiting a send outcome.
    pub fn pending_send_count(&self) -> usize {
        self.pending_sends.len()
    }

    /// Process an event and return resulting actions.
    ///
    /// Never fails: recoverable errors become [`ClientAction::Failed`] or,
    /// for skipped operations, [`ClientAction::Log`].
    pub fn handle(&mut self, event: ClientEvent) -> Vec<ClientAction> {
        let result = match event {
            ClientEvent::SetUser { name } => Ok(self.handle_set_user(name)),
            ClientEvent::Connected => Ok(self.handle_connected()),
            ClientEvent::Disconnected => {
                self.connected = false;
                Ok(vec![])
            },
            ClientEvent::RelayReceived(event) => self.handle_relay_event(event),
            ClientEvent::StartConversation { peer } => self.handle_start_conversation(&peer),
            ClientEvent::SendMessage { peer, text } => self.handle_send_message(peer, text),
            ClientEvent::MessageSent { receipt } => Ok(self.handle_message_sent(receipt)),
            ClientEvent::SendFailed { receipt, reason } => self.handle_send_failed(receipt, reason),
        };

        match result {
            Ok(actions) => actions,
            Err(error) if error.is_skip() => {
                tracing::debug!(%error, "skipped");
                vec![ClientAction::Log { message: format!("skipped: {error}") }]
            },
            Err(error) => {
                if error.is_fatal() {
                    tracing::error!(%error, "client failure");
                } else {
                    tracing::warn!(%error, "client failure");
                }
                vec![ClientAction::Failed { error }]
            },
        }
    }

    fn handle_set_user(&mut self, name: String) -> Vec<ClientAction> {
        if let Some(current) = &self.local_name {
            return vec![ClientAction::Log {
                message: format!("display name already set to {current}, ignoring {name}"),
            }];
        }

        self.local_name = Some(name.clone());
        self.announce()
    }

    fn handle_connected(&mut self) -> Vec<ClientAction> {
        self.connected = true;
        self.announce()
    }

    /// `Init` with our name, if we have one and the link is up. Runs on the
    /// first connect and again after every reconnect.
    fn announce(&self) -> Vec<ClientAction> {
        match (&self.local_name, self.connected) {
            (Some(name), true) => vec![ClientAction::Send(OutboundEvent::Init { name: name.clone() })],
            _ => vec![],
        }
    }

    fn handle_relay_event(&mut self, event: InboundEvent) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            InboundEvent::ListUsers(names) => Ok(self.handle_roster(&names)),
            InboundEvent::RequestedPublicKey(request) => self.handle_key_request(request),
            InboundEvent::ReceivedPublicKey(offer) => self.handle_key_offer(offer),
            InboundEvent::ReceivedMessage(message) => self.handle_peer_message(message),
        }
    }

    fn handle_roster(&mut self, names: &[String]) -> Vec<ClientAction> {
        let local = self.local_name.as_deref();
        let others: Vec<&str> =
            names.iter().map(String::as_str).filter(|name| Some(*name) != local).collect();

        self.directory.replace_roster(&others);

        vec![ClientAction::RosterChanged {
            peers: self.directory.names().map(str::to_string).collect(),
        }]
    }

    /// Unconditional auto-reply: whoever asks gets our public key.
    fn handle_key_request(&self, request: KeyRequest) -> Result<Vec<ClientAction>, ClientError> {
        let identity = self.identity.as_ref().ok_or(ClientError::NoIdentity)?;

        Ok(vec![ClientAction::Send(OutboundEvent::SendPublicKey {
            target: request.from_user,
            public_key: identity.export_public_key().into_string(),
        })])
    }

    fn handle_key_offer(&mut self, offer: KeyOffer) -> Result<Vec<ClientAction>, ClientError> {
        let KeyOffer { from_user, public_key } = offer;

        // A failed import leaves any earlier key in place.
        let handle = import_public_key(&PortableKey::from(public_key))
            .map_err(|e| ClientError::from_crypto(e, &from_user))?;

        if !self.directory.set_public_key(&from_user, handle) {
            return Err(ClientError::UnknownPeer { peer: from_user });
        }

        Ok(vec![ClientAction::KeyEstablished { peer: from_user, fingerprint: handle.fingerprint() }])
    }

    fn handle_peer_message(&mut self, message: PeerMessage) -> Result<Vec<ClientAction>, ClientError> {
        let PeerMessage { from_user, message: ciphertext } = message;
        let identity = self.identity.as_ref().ok_or(ClientError::NoIdentity)?;

        let plaintext =
            identity.decrypt(&ciphertext).map_err(|e| ClientError::from_crypto(e, &from_user))?;

        let message =
            Message::inbound(String::from_utf8_lossy(&plaintext), self.env.wall_clock_millis());

        if !self.directory.append_message(&from_user, message.clone()) {
            return Err(ClientError::UnknownPeer { peer: from_user });
        }

        Ok(vec![ClientAction::MessageReceived { peer: from_user, message }])
    }

    fn handle_start_conversation(&self, peer: &str) -> Result<Vec<ClientAction>, ClientError> {
        if !self.connected {
            return Err(ClientError::TransportNotConnected { operation: "start conversation" });
        }

        match self.directory.key_state(peer) {
            KeyState::Unknown => Err(ClientError::UnknownPeer { peer: peer.to_string() }),
            KeyState::KeyEstablished => Ok(vec![ClientAction::Log {
                message: format!("key for {peer} already established"),
            }]),
            KeyState::KeyPending => Ok(vec![ClientAction::Send(OutboundEvent::StartConversation {
                target: peer.to_string(),
            })]),
        }
    }

    fn handle_send_message(
        &mut self,
        peer: String,
        text: String,
    ) -> Result<Vec<ClientAction>, ClientError> {
        if self.identity.is_none() {
            return Err(ClientError::NoIdentity);
        }
        if !self.connected {
            return Err(ClientError::TransportNotConnected { operation: "send message" });
        }

        let recipient = match self.directory.get(&peer) {
            None => return Err(ClientError::UnknownPeer { peer }),
            Some(entry) => match entry.public_key() {
                None => return Err(ClientError::KeyNotEstablished { peer }),
                Some(key) => *key,
            },
        };

        let random = self
            .env
            .random_array::<ENVELOPE_RANDOM_SIZE>()
            .map_err(|e| ClientError::EncryptionFailed { peer: peer.clone(), reason: e.reason })?;

        let ciphertext =
            encrypt(&recipient, text.as_bytes(), random).map_err(|e| ClientError::from_crypto(e, &peer))?;

        let receipt = SendReceipt(self.next_receipt);
        self.next_receipt += 1;

        let event = OutboundEvent::SendMessage { target: peer.clone(), ciphertext };
        self.pending_sends.insert(receipt, PendingSend { peer, text });

        Ok(vec![ClientAction::SendChat { receipt, event }])
    }

    /// History is only written once the relay has the ciphertext. The peer
    /// may have left the roster while the send was in flight.
    fn handle_message_sent(&mut self, receipt: SendReceipt) -> Vec<ClientAction> {
        let Some(PendingSend { peer, text }) = self.pending_sends.remove(&receipt) else {
            return vec![ClientAction::Log { message: format!("unknown send receipt {}", receipt.0) }];
        };

        let message = Message::outbound(text, self.env.wall_clock_millis());
        if !self.directory.append_message(&peer, message.clone()) {
            return vec![ClientAction::Log {
                message: format!("{peer} left before send completed; not recorded"),
            }];
        }

        vec![ClientAction::MessageSent { peer, message }]
    }

    fn handle_send_failed(
        &mut self,
        receipt: SendReceipt,
        reason: String,
    ) -> Result<Vec<ClientAction>, ClientError> {
        match self.pending_sends.remove(&receipt) {
            Some(PendingSend { peer, .. }) => Err(ClientError::SendFailed { peer, reason }),
            None => Ok(vec![ClientAction::Log { message: format!("unknown send receipt {}", receipt.0) }]),
        }
    }
}
