//! In-memory relay hub.
//!
//! Routes events between simulated connections the way the real relay does:
//!
//! - `Init` names the connection and broadcasts `ListUsers` to everyone
//! - `StartConversation` asks both ends for their key: the target receives
//!   `RequestedPublicKey` from the initiator and the initiator receives
//!   `RequestedPublicKey` from the target
//! - `SendPublicKey` and `SendMessage` are forwarded to the named target
//!
//! Payloads are never inspected. Every accepted event is recorded so tests
//! can assert on exactly what each client sent.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use keyrelay_proto::{InboundEvent, KeyOffer, KeyRequest, OutboundEvent, PeerMessage};

/// Handle for one simulated connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

/// Relay-side failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimRelayError {
    /// The connection is closed or never existed.
    UnknownConnection(ConnectionId),
}

impl std::fmt::Display for SimRelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownConnection(id) => write!(f, "connection {} is closed", id.0),
        }
    }
}

impl std::error::Error for SimRelayError {}

#[derive(Debug, Default)]
struct Link {
    name: Option<String>,
    inbox: VecDeque<InboundEvent>,
}

/// In-memory relay.
#[derive(Debug, Default)]
pub struct SimRelay {
    links: BTreeMap<ConnectionId, Link>,
    next_id: u64,
    /// Every accepted event with the sender's name at the time.
    log: Vec<(Option<String>, OutboundEvent)>,
}

/// Relay shared by every simulated driver.
pub type SharedSimRelay = Arc<Mutex<SimRelay>>;

/// Create a relay that several drivers can share.
pub fn create_shared_relay() -> SharedSimRelay {
    Arc::new(Mutex::new(SimRelay::new()))
}

/// Lock a shared relay, ignoring poisoning from a panicked test thread.
pub fn lock_relay(relay: &SharedSimRelay) -> MutexGuard<'_, SimRelay> {
    relay.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimRelay {
    /// Create an empty relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a new connection.
    pub fn connect(&mut self) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        self.links.insert(id, Link::default());
        tracing::debug!(connection = id.0, "sim relay: connection opened");
        id
    }

    /// Close a connection. Named users leaving triggers a roster broadcast.
    pub fn disconnect(&mut self, id: ConnectionId) {
        let Some(link) = self.links.remove(&id) else {
            return;
        };
        tracing::debug!(connection = id.0, name = ?link.name, "sim relay: connection closed");
        if link.name.is_some() {
            self.broadcast_roster();
        }
    }

    /// Whether the connection is open.
    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.links.contains_key(&id)
    }

    /// Accept an event from a connection and route it.
    pub fn deliver(&mut self, from: ConnectionId, event: &OutboundEvent) -> Result<(), SimRelayError> {
        let sender = self.links.get(&from).ok_or(SimRelayError::UnknownConnection(from))?.name.clone();
        self.log.push((sender.clone(), event.clone()));

        if let OutboundEvent::Init { name } = event {
            if let Some(link) = self.links.get_mut(&from) {
                link.name = Some(name.clone());
            }
            self.broadcast_roster();
            return Ok(());
        }

        // The relay drops traffic from connections that never announced.
        let Some(sender) = sender else {
            tracing::debug!(connection = from.0, "sim relay: event before Init dropped");
            return Ok(());
        };

        match event {
            OutboundEvent::Init { .. } => {},
            OutboundEvent::StartConversation { target } => {
                if self.find(target).is_some() {
                    self.push_to(target, InboundEvent::RequestedPublicKey(KeyRequest {
                        from_user: sender.clone(),
                    }));
                    self.push_to(&sender, InboundEvent::RequestedPublicKey(KeyRequest {
                        from_user: target.clone(),
                    }));
                }
            },
            OutboundEvent::SendPublicKey { target, public_key } => {
                self.push_to(target, InboundEvent::ReceivedPublicKey(KeyOffer {
                    from_user: sender,
                    public_key: public_key.clone(),
                }));
            },
            OutboundEvent::SendMessage { target, ciphertext } => {
                self.push_to(target, InboundEvent::ReceivedMessage(PeerMessage {
                    from_user: sender,
                    message: ciphertext.clone(),
                }));
            },
        }
        Ok(())
    }

    /// Next event waiting for a connection.
    pub fn poll(&mut self, id: ConnectionId) -> Option<InboundEvent> {
        self.links.get_mut(&id).and_then(|link| link.inbox.pop_front())
    }

    /// Push an arbitrary event to a named user, bypassing routing.
    ///
    /// Returns `false` if nobody by that name is connected.
    pub fn inject(&mut self, to: &str, event: InboundEvent) -> bool {
        self.push_to(to, event)
    }

    /// Names announced by open connections, in connection order.
    pub fn roster(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.links.values().filter_map(|link| link.name.as_ref()) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Events accepted from the named user.
    pub fn sent_by(&self, name: &str) -> Vec<OutboundEvent> {
        self.log
            .iter()
            .filter(|(sender, _)| sender.as_deref() == Some(name))
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Number of events waiting across all connections.
    pub fn pending(&self) -> usize {
        self.links.values().map(|link| link.inbox.len()).sum()
    }

    fn find(&self, name: &str) -> Option<ConnectionId> {
        self.links
            .iter()
            .find(|(_, link)| link.name.as_deref() == Some(name))
            .map(|(id, _)| *id)
    }

    fn push_to(&mut self, name: &str, event: InboundEvent) -> bool {
        let Some(id) = self.find(name) else {
            tracing::debug!(name, "sim relay: no such user, event dropped");
            return false;
        };
        if let Some(link) = self.links.get_mut(&id) {
            link.inbox.push_back(event);
        }
        true
    }

    fn broadcast_roster(&mut self) {
        let roster = self.roster();
        for link in self.links.values_mut().filter(|link| link.name.is_some()) {
            link.inbox.push_back(InboundEvent::ListUsers(roster.clone()));
        }
    }
}
