//! Protocol-to-Application translation layer.
//!
//! The [`Bridge`] wraps the Sans-IO [`keyrelay_client::Client`] and adapts
//! it to the application lifecycle.
//!
//! # Responsibilities
//!
//! - Converts [`crate::AppAction`]s into client events.
//! - Accumulates outgoing relay events to be sent by the driver in the next
//!   I/O cycle, tagging chat messages with their send receipt.
//! - Interprets client actions and converts them back into
//!   [`crate::AppEvent`]s to update the App.

use keyrelay_client::{Client, ClientAction, ClientEvent, SendReceipt};
use keyrelay_core::env::Environment;
use keyrelay_proto::{InboundEvent, OutboundEvent};

use crate::{AppAction, AppEvent};

/// One relay send queued for the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    /// Event to send.
    pub event: OutboundEvent,
    /// Set for chat messages; the outcome must go back through
    /// [`Bridge::complete_send`].
    pub receipt: Option<SendReceipt>,
}

/// Bridge between App and Client protocol logic.
///
/// Generic over Environment to support both production and simulation.
pub struct Bridge<E: Environment> {
    client: Client<E>,
    outgoing: Vec<Outgoing>,
    startup_reported: bool,
}

impl<E: Environment> Bridge<E> {
    /// Create a new Bridge with a fresh client identity.
    pub fn new(env: E) -> Self {
        Self::from_client(Client::new(env))
    }

    /// Create a Bridge around an existing client.
    pub fn from_client(client: Client<E>) -> Self {
        Self { client, outgoing: Vec::new(), startup_reported: false }
    }

    /// Underlying protocol client.
    pub fn client(&self) -> &Client<E> {
        &self.client
    }

    /// Startup failure, reported exactly once.
    pub fn take_startup_failure(&mut self) -> Option<AppEvent> {
        if self.startup_reported {
            return None;
        }
        self.startup_reported = true;
        self.client.startup_failure().map(|error| AppEvent::Fatal { message: error.to_string() })
    }

    /// Process an App action and return resulting App events.
    pub fn process_app_action(&mut self, action: AppAction) -> Vec<AppEvent> {
        let event = match action {
            AppAction::SetUser { name } => ClientEvent::SetUser { name },
            AppAction::StartConversation { peer } => ClientEvent::StartConversation { peer },
            AppAction::SendMessage { peer, text } => ClientEvent::SendMessage { peer, text },
            AppAction::ListPeers => return vec![self.peer_list()],
            AppAction::Render | AppAction::Quit | AppAction::Connect { .. } => return vec![],
        };
        self.dispatch(event)
    }

    fn peer_list(&self) -> AppEvent {
        let peers = self
            .client
            .directory()
            .peers()
            .map(|peer| (peer.name().to_string(), peer.key_state()))
            .collect();
        AppEvent::PeerList { peers }
    }

    /// Handle an event pushed by the relay.
    pub fn handle_relay_event(&mut self, event: InboundEvent) -> Vec<AppEvent> {
        self.dispatch(ClientEvent::RelayReceived(event))
    }

    /// The relay link came up.
    pub fn handle_connected(&mut self) -> Vec<AppEvent> {
        self.dispatch(ClientEvent::Connected)
    }

    /// The relay link dropped.
    pub fn handle_disconnected(&mut self) -> Vec<AppEvent> {
        self.dispatch(ClientEvent::Disconnected)
    }

    /// Report the outcome of a queued chat message.
    pub fn complete_send(&mut self, receipt: SendReceipt, outcome: Result<(), String>) -> Vec<AppEvent> {
        let event = match outcome {
            Ok(()) => ClientEvent::MessageSent { receipt },
            Err(reason) => ClientEvent::SendFailed { receipt, reason },
        };
        self.dispatch(event)
    }

    /// Take pending outgoing relay events.
    pub fn take_outgoing(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outgoing)
    }

    fn dispatch(&mut self, event: ClientEvent) -> Vec<AppEvent> {
        let actions = self.client.handle(event);
        self.process_client_actions(actions)
    }

    fn process_client_actions(&mut self, actions: Vec<ClientAction>) -> Vec<AppEvent> {
        let mut events = Vec::new();

        for action in actions {
            match action {
                ClientAction::Send(event) => {
                    self.outgoing.push(Outgoing { event, receipt: None });
                },
                ClientAction::SendChat { receipt, event } => {
                    self.outgoing.push(Outgoing { event, receipt: Some(receipt) });
                },
                ClientAction::RosterChanged { peers } => {
                    events.push(AppEvent::RosterChanged { peers });
                },
                ClientAction::KeyEstablished { peer, fingerprint } => {
                    events.push(AppEvent::KeyEstablished { peer, fingerprint });
                },
                ClientAction::MessageReceived { peer, message } => {
                    events.push(AppEvent::MessageReceived { peer, message });
                },
                ClientAction::MessageSent { peer, message } => {
                    events.push(AppEvent::MessageSent { peer, message });
                },
                ClientAction::Failed { error } if error.is_fatal() => {
                    events.push(AppEvent::Fatal { message: error.to_string() });
                },
                // A message that could not be sealed or opened never appears.
                ClientAction::Failed { error } if error.is_silent() => {
                    tracing::debug!(%error, "message dropped");
                },
                ClientAction::Failed { error } => {
                    events.push(AppEvent::Error { message: error.to_string() });
                },
                ClientAction::Log { message } => {
                    events.push(AppEvent::Notice { message });
                },
            }
        }

        events
    }
}
