//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks. A [`ClientSnapshot`] that is observed
//! repeatedly also keeps a per-peer history, which transition invariants
//! (key monotonicity, append-only history) check.

use std::collections::BTreeMap;

use keyrelay_app::{App, ConnectionState};
use keyrelay_client::{Client, Environment, PeerDirectory};

/// Snapshot of the entire system state.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-client state snapshots.
    pub clients: Vec<ClientSnapshot>,
    /// Relay roster, when the system is quiescent. `None` skips roster
    /// agreement checks.
    pub relay_roster: Option<Vec<String>>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no clients).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot with a single client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client], relay_roster: None }
    }

    /// Create a snapshot from multiple clients.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients, relay_roster: None }
    }

    /// Add a client snapshot.
    pub fn add_client(&mut self, client: ClientSnapshot) {
        self.clients.push(client);
    }

    /// Attach the relay's roster.
    #[must_use]
    pub fn with_relay_roster(mut self, roster: Vec<String>) -> Self {
        self.relay_roster = Some(roster);
        self
    }
}

/// What a client knows about one peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSnapshot {
    /// Key fingerprint, `None` while the exchange is pending.
    pub fingerprint: Option<String>,
    /// Messages in the conversation.
    pub message_count: usize,
}

impl PeerSnapshot {
    /// Whether a key is installed.
    pub fn has_key(&self) -> bool {
        self.fingerprint.is_some()
    }
}

/// Snapshot of a single client's observable state.
#[derive(Debug, Clone, Default)]
pub struct ClientSnapshot {
    /// Local display name.
    pub name: String,
    /// Relay link is up.
    pub connected: bool,
    /// Open conversation.
    pub active_peer: Option<String>,
    /// Current peers.
    pub peers: BTreeMap<String, PeerSnapshot>,
    /// Observations per peer since it last joined the roster.
    pub peer_history: BTreeMap<String, Vec<PeerSnapshot>>,
}

impl ClientSnapshot {
    /// Create an empty snapshot for a named client.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Snapshot of an App's view.
    pub fn from_app(app: &App) -> Self {
        let mut snapshot = Self::new(app.local_name());
        snapshot.observe_app(app);
        snapshot
    }

    /// Snapshot of a client's peer directory.
    pub fn from_client<E: Environment>(client: &Client<E>) -> Self {
        let mut snapshot = Self::new(client.local_name().unwrap_or_default());
        snapshot.observe_client(client);
        snapshot
    }

    /// Set active peer.
    #[must_use]
    pub fn with_active_peer(mut self, peer: Option<&str>) -> Self {
        self.active_peer = peer.map(str::to_string);
        self
    }

    /// Add a peer.
    #[must_use]
    pub fn with_peer(mut self, name: impl Into<String>, peer: PeerSnapshot) -> Self {
        self.peers.insert(name.into(), peer);
        self
    }

    /// Record a new observation of an App on its own. Only the roster and
    /// the open conversation are visible; keys and history are not.
    pub fn observe_app(&mut self, app: &App) {
        self.observe_focus(app);
        let peers = app.peers().keys().map(|name| (name.clone(), PeerSnapshot::default())).collect();
        self.record(peers);
    }

    /// Record what a rendered node shows: the App's focus over the
    /// client's directory.
    pub fn observe_view(&mut self, app: &App, directory: &PeerDirectory) {
        self.observe_focus(app);
        self.record(directory_peers(directory));
    }

    fn observe_focus(&mut self, app: &App) {
        self.connected = matches!(app.connection_state(), ConnectionState::Connected);
        self.active_peer = app.active_peer().map(str::to_string);
    }

    /// Record a new observation of a client's directory.
    pub fn observe_client<E: Environment>(&mut self, client: &Client<E>) {
        self.connected = client.is_connected();
        self.record(directory_peers(client.directory()));
    }

    /// Replace the current peers and extend each present peer's history.
    /// Peers that left lose their history.
    pub fn record(&mut self, peers: BTreeMap<String, PeerSnapshot>) {
        self.peer_history.retain(|name, _| peers.contains_key(name));
        for (name, peer) in &peers {
            self.peer_history.entry(name.clone()).or_default().push(peer.clone());
        }
        self.peers = peers;
    }
}

fn directory_peers(directory: &PeerDirectory) -> BTreeMap<String, PeerSnapshot> {
    directory
        .peers()
        .map(|peer| {
            let snapshot = PeerSnapshot {
                fingerprint: peer.public_key().map(|key| key.fingerprint()),
                message_count: peer.history().len(),
            };
            (peer.name().to_string(), snapshot)
        })
        .collect()
}
