//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the command-line driver but
//! for deterministic testing. It implements [`Driver`] so the same
//! [`keyrelay_app::Runtime`] orchestration code runs in both production and
//! simulation. Relay traffic goes through a shared [`crate::SimRelay`];
//! time comes from the shared [`SimEnv`] clock.
//!
//! Clones share state, so a test keeps one clone to inject input and
//! inspect results while the runtime owns the other.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use keyrelay_app::{App, AppEvent, Driver};
use keyrelay_client::PeerDirectory;
use keyrelay_core::env::Environment;
use keyrelay_proto::{InboundEvent, OutboundEvent};

use crate::{
    invariants::{ClientSnapshot, InvariantRegistry, SystemSnapshot},
    sim_env::{SimEnv, SimInstant},
    sim_relay::{ConnectionId, SharedSimRelay, lock_relay},
};

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// Shared state for event injection.
#[derive(Default)]
struct SharedState {
    pending_events: VecDeque<AppEvent>,
    link: Option<ConnectionId>,
    refuse_connections: bool,
    fail_sends: bool,
    connect_attempts: u32,
    renders: usize,
    stopped: bool,
    observed: ClientSnapshot,
}

/// Simulation driver for deterministic testing.
#[derive(Clone)]
pub struct SimDriver {
    env: SimEnv,
    relay: SharedSimRelay,
    state: Arc<Mutex<SharedState>>,
    invariants: Option<Arc<InvariantRegistry>>,
}

impl SimDriver {
    /// Create a driver attached to a shared relay.
    pub fn new(env: SimEnv, relay: SharedSimRelay) -> Self {
        Self { env, relay, state: Arc::new(Mutex::new(SharedState::default())), invariants: None }
    }

    /// Check invariants on every render. A violation fails the render.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(Arc::new(registry));
        self
    }

    /// Inject an `AppEvent` for processing.
    pub fn inject_event(&self, event: AppEvent) {
        self.lock().pending_events.push_back(event);
    }

    /// Inject a line of user input.
    pub fn type_line(&self, line: &str) {
        self.inject_event(AppEvent::Input(line.to_string()));
    }

    /// Make subsequent connection attempts fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.lock().refuse_connections = refuse;
    }

    /// Make subsequent relay sends fail.
    pub fn fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    /// Cut the relay link as if the network dropped.
    pub fn drop_link(&self) {
        let link = self.lock().link.take();
        if let Some(id) = link {
            lock_relay(&self.relay).disconnect(id);
        }
    }

    /// Connection attempts made so far.
    pub fn connect_attempts(&self) -> u32 {
        self.lock().connect_attempts
    }

    /// Renders performed so far.
    pub fn render_count(&self) -> usize {
        self.lock().renders
    }

    /// Whether the runtime stopped the driver.
    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Check if there are pending input events.
    pub fn has_pending(&self) -> bool {
        !self.lock().pending_events.is_empty()
    }

    /// Accumulated observation of what the node rendered.
    pub fn snapshot(&self) -> ClientSnapshot {
        self.lock().observed.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_link(&self) -> Option<ConnectionId> {
        let link = self.lock().link?;
        lock_relay(&self.relay).is_open(link).then_some(link)
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = SimInstant;

    async fn poll_event(&mut self) -> Result<Option<AppEvent>, Self::Error> {
        Ok(self.lock().pending_events.pop_front())
    }

    async fn send_event(&mut self, event: &OutboundEvent) -> Result<(), Self::Error> {
        if self.lock().fail_sends {
            return Err(SimDriverError("simulated send failure".to_string()));
        }
        let link = self.open_link().ok_or_else(|| SimDriverError("not connected".to_string()))?;
        lock_relay(&self.relay).deliver(link, event).map_err(|e| SimDriverError(e.to_string()))
    }

    async fn recv_event(&mut self) -> Option<InboundEvent> {
        let link = self.open_link()?;
        lock_relay(&self.relay).poll(link)
    }

    async fn connect(&mut self, url: &str) -> Result<(), Self::Error> {
        let mut state = self.lock();
        state.connect_attempts += 1;
        if state.refuse_connections {
            return Err(SimDriverError(format!("connection to {url} refused")));
        }

        let id = lock_relay(&self.relay).connect();
        if let Some(previous) = state.link.replace(id) {
            lock_relay(&self.relay).disconnect(previous);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.open_link().is_some()
    }

    fn now(&self) -> Self::Instant {
        self.env.now()
    }

    fn render(&mut self, app: &App, directory: &PeerDirectory) -> Result<(), Self::Error> {
        let mut state = self.lock();
        state.renders += 1;
        state.observed.name = app.local_name().to_string();
        state.observed.observe_view(app, directory);

        if let Some(registry) = &self.invariants {
            let snapshot = SystemSnapshot::single(state.observed.clone());
            if let Err(violations) = registry.check_all(&snapshot) {
                let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
                return Err(SimDriverError(messages.join("; ")));
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.lock().stopped = true;
        self.drop_link();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim_relay::create_shared_relay;

    fn driver() -> SimDriver {
        SimDriver::new(SimEnv::with_seed(1), create_shared_relay())
    }

    #[test]
    fn inject_event_queues_event() {
        let driver = driver();
        driver.type_line("/peers");

        assert!(driver.has_pending());
    }

    #[tokio::test]
    async fn send_requires_link() {
        let mut driver = driver();
        let init = OutboundEvent::Init { name: "alice".into() };

        assert!(driver.send_event(&init).await.is_err());

        driver.connect("sim://relay").await.unwrap();
        driver.send_event(&init).await.unwrap();
        assert!(matches!(driver.recv_event().await, Some(InboundEvent::ListUsers(_))));
    }

    #[tokio::test]
    async fn refused_connection_counts_attempt() {
        let mut driver = driver();
        driver.refuse_connections(true);

        assert!(driver.connect("sim://relay").await.is_err());
        assert_eq!(driver.connect_attempts(), 1);
        assert!(!driver.is_connected());
    }

    #[tokio::test]
    async fn drop_link_disconnects() {
        let mut driver = driver();
        driver.connect("sim://relay").await.unwrap();
        let handle = driver.clone();

        handle.drop_link();

        assert!(!driver.is_connected());
    }

    #[test]
    fn render_checks_invariants() {
        let mut driver = driver().with_invariants(InvariantRegistry::standard());
        let mut app = App::new("sim://relay", "alice");
        app.handle(AppEvent::RosterChanged { peers: vec!["bob".into()] });

        let mut directory = PeerDirectory::new();
        directory.replace_roster(&["bob"]);

        driver.render(&app, &directory).unwrap();
        assert_eq!(driver.render_count(), 1);
        assert_eq!(driver.snapshot().peers.len(), 1);
    }
}
