//! Application state machine.
//!
//! This module defines the [`App`] state machine, which manages the
//! user-facing state of a keyrelay session decoupled from I/O and protocol
//! mechanics.
//!
//! This is a pure state machine: it consumes [`crate::AppEvent`] inputs and
//! produces [`crate::AppAction`] instructions for the runtime to execute.
//!
//! # Responsibilities
//!
//! - Parses input lines into commands.
//! - Tracks the roster, the open conversation and unread markers.
//! - Tracks high-level connection state for user feedback.

use std::collections::BTreeMap;

use keyrelay_client::KeyState;

use crate::{
    AppAction, AppEvent, Command, ConnectionState, PeerState,
    input::{CommandError, USAGE},
};

/// Application state machine.
///
/// Pure state machine that processes events and produces actions.
/// No I/O dependencies - fully testable in simulation.
#[derive(Debug, Clone)]
pub struct App {
    /// Connection state.
    state: ConnectionState,
    /// Relay URL for connection.
    relay_url: String,
    /// Local display name.
    local_name: String,
    /// Per-peer views keyed by display name.
    peers: BTreeMap<String, PeerState>,
    /// Open conversation. `None` if none is open.
    active_peer: Option<String>,
    /// Transient status message. `None` if no message.
    status_message: Option<String>,
    /// Set once messaging became permanently unavailable.
    fatal: Option<String>,
}

impl App {
    /// Create a new App for the given relay and display name.
    pub fn new(relay_url: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            relay_url: relay_url.into(),
            local_name: local_name.into(),
            peers: BTreeMap::new(),
            active_peer: None,
            status_message: None,
            fatal: None,
        }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: AppEvent) -> Vec<AppAction> {
        match event {
            AppEvent::Input(line) => match line.parse::<Command>() {
                Ok(command) => self.execute(command),
                Err(CommandError::Empty) => vec![],
                Err(error) => {
                    self.status_message = Some(error.to_string());
                    vec![AppAction::Render]
                },
            },
            AppEvent::Tick => vec![],
            AppEvent::Connecting { attempt } => {
                self.state = ConnectionState::Connecting { attempt };
                if attempt > 0 {
                    self.status_message = Some(format!("Reconnecting (attempt {attempt})..."));
                }
                vec![AppAction::Render]
            },
            AppEvent::Connected => {
                self.state = ConnectionState::Connected;
                self.status_message = Some(format!("Connected to {}", self.relay_url));
                vec![AppAction::Render]
            },
            AppEvent::Disconnected { reason } => {
                self.state = ConnectionState::Disconnected;
                self.status_message = Some(format!("Disconnected: {reason}"));
                vec![AppAction::Render]
            },
            AppEvent::ConnectionClosed { reason } => {
                self.state = ConnectionState::Closed;
                self.status_message = Some(format!("Relay unreachable: {reason}"));
                vec![AppAction::Render, AppAction::Quit]
            },
            AppEvent::RosterChanged { peers } => {
                self.merge_roster(&peers);
                vec![AppAction::Render]
            },
            AppEvent::PeerList { peers } => {
                self.status_message = Some(self.roster_summary(&peers));
                vec![AppAction::Render]
            },
            AppEvent::KeyEstablished { peer, fingerprint } => {
                self.status_message = Some(format!("Secure channel with {peer} ({fingerprint})"));
                vec![AppAction::Render]
            },
            AppEvent::MessageReceived { peer, .. } => {
                let active = self.active_peer.as_deref() == Some(peer.as_str());
                if let Some(view) = self.peers.get_mut(&peer)
                    && !active
                {
                    view.unread = true;
                }
                vec![AppAction::Render]
            },
            AppEvent::MessageSent { .. } => vec![AppAction::Render],
            AppEvent::Notice { message } => {
                self.status_message = Some(message);
                vec![AppAction::Render]
            },
            AppEvent::Error { message } => {
                self.status_message = Some(format!("Error: {message}"));
                vec![AppAction::Render]
            },
            AppEvent::Fatal { message } => {
                self.status_message = Some(format!("Messaging disabled: {message}"));
                self.fatal = Some(message);
                vec![AppAction::Render]
            },
        }
    }

    fn execute(&mut self, command: Command) -> Vec<AppAction> {
        match command {
            Command::Open { peer } => self.open_conversation(peer),
            Command::Msg { peer, text } => self.send_message(peer, text),
            Command::Say { text } => match self.active_peer.clone() {
                Some(peer) => self.send_message(peer, text),
                None => {
                    self.status_message = Some("No open conversation; use /open <peer>".into());
                    vec![AppAction::Render]
                },
            },
            Command::Peers => vec![AppAction::ListPeers],
            Command::Help => {
                self.status_message = Some(USAGE.to_string());
                vec![AppAction::Render]
            },
            Command::Quit => self.quit(),
        }
    }

    /// Surviving peers keep their view; removed peers are dropped.
    fn merge_roster(&mut self, names: &[String]) {
        self.peers.retain(|name, _| names.contains(name));
        for name in names {
            self.peers.entry(name.clone()).or_insert_with(|| PeerState::new(name.clone()));
        }

        if let Some(active) = &self.active_peer
            && !self.peers.contains_key(active)
        {
            self.status_message = Some(format!("{active} left"));
            self.active_peer = None;
        }
    }

    /// `*` marks an established key.
    fn roster_summary(&self, peers: &[(String, KeyState)]) -> String {
        if peers.is_empty() {
            return "Nobody else is online".to_string();
        }
        let names: Vec<String> = peers
            .iter()
            .map(|(name, key_state)| {
                let marker = if *key_state == KeyState::KeyEstablished { "*" } else { "" };
                let unread = self.peers.get(name).is_some_and(|view| view.unread);
                let unread = if unread { " (unread)" } else { "" };
                format!("{name}{marker}{unread}")
            })
            .collect();
        format!("Online: {}", names.join(", "))
    }

    /// Set a status message to display to the user.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    /// Initiate connection to the relay.
    pub fn connect(&mut self) -> Vec<AppAction> {
        self.state = ConnectionState::Connecting { attempt: 0 };
        vec![AppAction::Connect { relay_url: self.relay_url.clone() }, AppAction::Render]
    }

    /// Announce the local display name.
    pub fn set_user(&self) -> Vec<AppAction> {
        vec![AppAction::SetUser { name: self.local_name.clone() }]
    }

    /// Open a conversation: focus it and ask the relay to broker keys.
    ///
    /// The client skips the request if the key is already in place.
    pub fn open_conversation(&mut self, peer: String) -> Vec<AppAction> {
        if let Some(view) = self.peers.get_mut(&peer) {
            view.unread = false;
            self.active_peer = Some(peer.clone());
            self.status_message = Some(format!("Opened conversation with {peer}"));
        }
        vec![AppAction::StartConversation { peer }, AppAction::Render]
    }

    /// Send a message to a peer.
    pub fn send_message(&self, peer: String, text: String) -> Vec<AppAction> {
        vec![AppAction::SendMessage { peer, text }, AppAction::Render]
    }

    /// Quit the application.
    pub fn quit(&self) -> Vec<AppAction> {
        vec![AppAction::Quit]
    }

    /// Current connection state.
    pub fn connection_state(&self) -> &ConnectionState {
        &self.state
    }

    /// Relay URL.
    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    /// Local display name.
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// All peers in the roster.
    pub fn peers(&self) -> &BTreeMap<String, PeerState> {
        &self.peers
    }

    /// Open conversation. `None` if none is open.
    pub fn active_peer(&self) -> Option<&str> {
        self.active_peer.as_deref()
    }

    /// View of the open conversation.
    pub fn active_peer_state(&self) -> Option<&PeerState> {
        self.active_peer.as_ref().and_then(|name| self.peers.get(name))
    }

    /// Transient status message. `None` if no message.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Why messaging is disabled, if it is.
    pub fn fatal_error(&self) -> Option<&str> {
        self.fatal.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use keyrelay_client::Message;

    use super::*;

    fn connected_app() -> App {
        let mut app = App::new("ws://relay.test/chat", "alice");
        app.handle(AppEvent::Connected);
        app.handle(AppEvent::RosterChanged { peers: vec!["bob".into(), "carol".into()] });
        app
    }

    #[test]
    fn roster_merge_preserves_unread() {
        let mut app = connected_app();
        app.handle(AppEvent::MessageReceived {
            peer: "bob".into(),
            message: Message::inbound("hello", 1),
        });

        app.handle(AppEvent::RosterChanged { peers: vec!["bob".into(), "dave".into()] });

        assert_eq!(app.peers().get("bob").map(|p| p.unread), Some(true));
        assert!(!app.peers().contains_key("carol"));
        assert!(app.peers().contains_key("dave"));
    }

    #[test]
    fn open_focuses_and_requests_exchange() {
        let mut app = connected_app();
        let actions = app.handle(AppEvent::Input("/open bob".into()));

        assert_eq!(actions, vec![
            AppAction::StartConversation { peer: "bob".into() },
            AppAction::Render
        ]);
        assert_eq!(app.active_peer(), Some("bob"));
    }

    #[test]
    fn plain_text_goes_to_open_conversation() {
        let mut app = connected_app();
        app.handle(AppEvent::Input("/open bob".into()));

        let actions = app.handle(AppEvent::Input("hi bob".into()));

        assert!(matches!(
            actions.as_slice(),
            [AppAction::SendMessage { peer, text }, AppAction::Render] if peer == "bob" && text == "hi bob"
        ));
    }

    #[test]
    fn plain_text_without_conversation_sets_status() {
        let mut app = connected_app();
        let actions = app.handle(AppEvent::Input("anyone?".into()));

        assert_eq!(actions, vec![AppAction::Render]);
        assert!(app.status_message().is_some_and(|s| s.contains("/open")));
    }

    #[test]
    fn unread_set_only_for_background_peer() {
        let mut app = connected_app();
        app.handle(AppEvent::Input("/open bob".into()));

        app.handle(AppEvent::MessageReceived { peer: "bob".into(), message: Message::inbound("a", 1) });
        app.handle(AppEvent::MessageReceived {
            peer: "carol".into(),
            message: Message::inbound("b", 2),
        });

        assert_eq!(app.peers().get("bob").map(|p| p.unread), Some(false));
        assert_eq!(app.peers().get("carol").map(|p| p.unread), Some(true));
    }

    #[test]
    fn active_peer_cleared_when_peer_leaves() {
        let mut app = connected_app();
        app.handle(AppEvent::Input("/open carol".into()));

        app.handle(AppEvent::RosterChanged { peers: vec!["bob".into()] });

        assert_eq!(app.active_peer(), None);
    }

    #[test]
    fn connection_closed_quits() {
        let mut app = connected_app();
        let actions = app.handle(AppEvent::ConnectionClosed { reason: "gone".into() });

        assert_eq!(actions, vec![AppAction::Render, AppAction::Quit]);
        assert_eq!(app.connection_state(), &ConnectionState::Closed);
    }

    #[test]
    fn api_connect() {
        let mut app = App::new("ws://relay.test/chat", "alice");
        let actions = app.connect();

        assert!(matches!(actions.as_slice(), [AppAction::Connect { .. }, AppAction::Render]));
        assert_eq!(app.connection_state(), &ConnectionState::Connecting { attempt: 0 });
    }

    #[test]
    fn key_established_shows_fingerprint() {
        let mut app = connected_app();
        app.handle(AppEvent::KeyEstablished { peer: "bob".into(), fingerprint: "abcd".into() });

        assert!(app.status_message().is_some_and(|s| s.contains("bob") && s.contains("abcd")));
    }

    #[test]
    fn peer_list_marks_keys_and_unread() {
        let mut app = connected_app();
        app.handle(AppEvent::MessageReceived { peer: "carol".into(), message: Message::inbound("b", 2) });

        assert_eq!(app.handle(AppEvent::Input("/peers".into())), vec![AppAction::ListPeers]);

        let listing =
            vec![("bob".to_string(), KeyState::KeyEstablished), ("carol".to_string(), KeyState::KeyPending)];
        app.handle(AppEvent::PeerList { peers: listing });

        assert_eq!(app.status_message(), Some("Online: bob*, carol (unread)"));
    }
}
