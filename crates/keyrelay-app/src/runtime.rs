//! Generic runtime for application orchestration.
//!
//! The Runtime drives the application event loop, coordinating between:
//! - [`App`]: user-facing state machine
//! - [`Bridge`]: Protocol bridge to Client
//! - [`Driver`]: Platform-specific I/O
//! - [`Connection`]: relay link lifecycle and reconnect schedule
//!
//! Every successful (re)connect feeds `Connected` to the client, which
//! re-announces the local name. The peer directory survives reconnects.

use std::collections::VecDeque;

use keyrelay_core::{
    connection::{Connection, ConnectionAction, ConnectionConfig},
    env::Environment,
};

use crate::{App, AppAction, AppEvent, Bridge, Driver, Outgoing};

/// Relay URL used when none is configured.
pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:5000/chat";

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Relay WebSocket URL.
    pub relay_url: String,
    /// Display name announced to the relay.
    pub name: String,
    /// Handshake timeout and reconnect schedule.
    pub connection: ConnectionConfig,
}

impl RuntimeConfig {
    /// Configuration with the default connection policy.
    pub fn new(relay_url: impl Into<String>, name: impl Into<String>) -> Self {
        Self { relay_url: relay_url.into(), name: name.into(), connection: ConnectionConfig::default() }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_RELAY_URL, "guest")
    }
}

/// Generic runtime that orchestrates App, Bridge, and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `E`: Environment for identity generation and encryption randomness
pub struct Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    app: App,
    bridge: Bridge<E>,
    lifecycle: Connection<D::Instant>,
}

impl<D, E> Runtime<D, E>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
{
    /// Create a new runtime with the given driver and environment.
    pub fn new(driver: D, env: E, config: RuntimeConfig) -> Self {
        Self::with_bridge(driver, Bridge::new(env), config)
    }

    /// Create a runtime around an existing bridge.
    pub fn with_bridge(driver: D, bridge: Bridge<E>, config: RuntimeConfig) -> Self {
        let lifecycle = Connection::new(driver.now(), config.connection);
        let app = App::new(config.relay_url, config.name);
        Self { driver, app, bridge, lifecycle }
    }

    /// Run the main event loop until the user quits or the relay is given up
    /// on.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to poll input or render.
    pub async fn run(mut self) -> Result<(), D::Error> {
        let mut quit = self.start().await?;
        while !quit {
            quit = self.step().await?;
        }

        self.driver.stop();
        Ok(())
    }

    /// Report a startup failure, set the display name and begin connecting.
    ///
    /// Returns `true` if the application should quit.
    pub async fn start(&mut self) -> Result<bool, D::Error> {
        self.driver.render(&self.app, self.bridge.client().directory())?;

        let mut actions = Vec::new();
        if let Some(event) = self.bridge.take_startup_failure() {
            actions.extend(self.app.handle(event));
        }
        actions.extend(self.app.set_user());
        actions.extend(self.app.connect());

        self.process_actions(actions).await
    }

    /// Process one cycle of the event loop.
    ///
    /// 1. Polls for an input event from the driver
    /// 2. Drains relay events, or notices a dropped link
    /// 3. Advances the connection lifecycle (handshake timeout, backoff)
    ///
    /// Returns `true` if the application should quit.
    pub async fn step(&mut self) -> Result<bool, D::Error> {
        if let Some(event) = self.driver.poll_event().await? {
            let actions = self.app.handle(event);
            if self.process_actions(actions).await? {
                return Ok(true);
            }
        }

        if self.lifecycle.is_connected() {
            let actions = if self.driver.is_connected() {
                self.drain_relay().await
            } else {
                self.link_lost("relay link closed").await
            };
            if self.process_actions(actions).await? {
                return Ok(true);
            }
        }

        let now = self.driver.now();
        let connection_actions = self.lifecycle.tick(now);
        let actions = self.run_connection_actions(connection_actions).await;
        self.process_actions(actions).await
    }

    /// Process actions returned by the App.
    ///
    /// Returns `true` if should quit.
    async fn process_actions(&mut self, initial_actions: Vec<AppAction>) -> Result<bool, D::Error> {
        let mut pending_actions = initial_actions;

        while !pending_actions.is_empty() {
            let actions = std::mem::take(&mut pending_actions);

            for action in actions {
                match action {
                    AppAction::Render => self.driver.render(&self.app, self.bridge.client().directory())?,
                    AppAction::Quit => return Ok(true),
                    AppAction::Connect { .. } => match self.lifecycle.start(self.driver.now()) {
                        Ok(connection_actions) => {
                            pending_actions.extend(self.run_connection_actions(connection_actions).await);
                        },
                        Err(error) => tracing::debug!(%error, "connect ignored"),
                    },

                    // Protocol operations go through the bridge
                    AppAction::SetUser { .. }
                    | AppAction::StartConversation { .. }
                    | AppAction::SendMessage { .. }
                    | AppAction::ListPeers => {
                        let events = self.bridge.process_app_action(action);
                        pending_actions.extend(self.dispatch(events));
                        let completions = self.send_outgoing().await;
                        pending_actions.extend(self.dispatch(completions));
                    },
                }
            }
        }
        Ok(false)
    }

    /// Execute connection lifecycle actions and return the App's reaction.
    async fn run_connection_actions(&mut self, actions: Vec<ConnectionAction>) -> Vec<AppAction> {
        let mut queue: VecDeque<ConnectionAction> = actions.into();
        let mut app_actions = Vec::new();

        while let Some(action) = queue.pop_front() {
            match action {
                ConnectionAction::Connect { attempt } => {
                    app_actions.extend(self.app.handle(AppEvent::Connecting { attempt }));

                    let url = self.app.relay_url().to_string();
                    match self.driver.connect(&url).await {
                        Ok(()) => {
                            if let Err(error) = self.lifecycle.on_connected(self.driver.now()) {
                                tracing::warn!(%error, "unexpected connect completion");
                            }
                            tracing::info!(url, attempt, "connected to relay");

                            app_actions.extend(self.app.handle(AppEvent::Connected));
                            let events = self.bridge.handle_connected();
                            app_actions.extend(self.dispatch(events));
                            let completions = self.send_outgoing().await;
                            app_actions.extend(self.dispatch(completions));
                        },
                        Err(error) => {
                            let reason = error.to_string();
                            tracing::warn!(%reason, attempt, "relay connection failed");

                            app_actions
                                .extend(self.app.handle(AppEvent::Disconnected { reason: reason.clone() }));
                            queue.extend(self.lifecycle.on_disconnected(self.driver.now(), &reason));
                        },
                    }
                },
                ConnectionAction::Close { reason } => {
                    tracing::error!(%reason, "giving up on relay");
                    app_actions.extend(self.app.handle(AppEvent::ConnectionClosed { reason }));
                },
            }
        }

        app_actions
    }

    /// Feed every ready relay event through the bridge.
    async fn drain_relay(&mut self) -> Vec<AppAction> {
        let mut actions = Vec::new();
        while let Some(event) = self.driver.recv_event().await {
            let events = self.bridge.handle_relay_event(event);
            actions.extend(self.dispatch(events));
        }

        let completions = self.send_outgoing().await;
        actions.extend(self.dispatch(completions));
        actions
    }

    async fn link_lost(&mut self, reason: &str) -> Vec<AppAction> {
        tracing::warn!(reason, "relay link lost");

        let events = self.bridge.handle_disconnected();
        let mut actions = self.dispatch(events);
        actions.extend(self.app.handle(AppEvent::Disconnected { reason: reason.to_string() }));

        let connection_actions = self.lifecycle.on_disconnected(self.driver.now(), reason);
        actions.extend(self.run_connection_actions(connection_actions).await);
        actions
    }

    /// Send all pending relay events. Returns completion events for chat
    /// messages.
    async fn send_outgoing(&mut self) -> Vec<AppEvent> {
        let mut completions = Vec::new();

        for Outgoing { event, receipt } in self.bridge.take_outgoing() {
            let result = self.driver.send_event(&event).await;
            if let Err(error) = &result {
                tracing::warn!(%error, name = event.target(), "relay send failed");
            }

            if let Some(receipt) = receipt {
                let outcome = result.map_err(|e| e.to_string());
                completions.extend(self.bridge.complete_send(receipt, outcome));
            }
        }

        completions
    }

    /// Feed bridge events into the App.
    fn dispatch(&mut self, events: Vec<AppEvent>) -> Vec<AppAction> {
        events.into_iter().flat_map(|event| self.app.handle(event)).collect()
    }

    /// Get a reference to the App
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Get a mutable reference to the App
    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    /// Get a reference to the Bridge
    pub fn bridge(&self) -> &Bridge<E> {
        &self.bridge
    }

    /// Relay link lifecycle.
    pub fn lifecycle(&self) -> &Connection<D::Instant> {
        &self.lifecycle
    }
}
