//! Relay connection lifecycle.
//!
//! Tracks whether the relay link is up and decides when to retry after it
//! drops. Uses the action pattern: methods take time as input and return
//! actions for the driver to execute, so the state machine does no I/O.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ start  ┌────────────┐ connected ┌───────────┐
//! │ Idle │───────>│ Connecting │──────────>│ Connected │
//! └──────┘        └────────────┘           └───────────┘
//!                   ^   │ failed/timeout        │ dropped
//!        delay over │   ↓                       ↓
//!                 ┌─────────┐ <─────────────────┘
//!                 │ Backoff │
//!                 └─────────┘
//!                      │ policy exhausted
//!                      ↓
//!                 ┌────────┐
//!                 │ Closed │
//!                 └────────┘
//! ```

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use crate::error::ConnectionError;

/// Time allowed for the transport plus relay handshake to complete.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Retry delays used by [`ReconnectPolicy::default`].
pub const DEFAULT_RECONNECT_DELAYS: [Duration; 4] = [
    Duration::ZERO,
    Duration::from_secs(2),
    Duration::from_secs(10),
    Duration::from_secs(30),
];

/// Actions returned by the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a transport to the relay.
    Connect {
        /// Retries since the last successful connection (0 for the first try).
        attempt: u32,
    },

    /// Stop trying; the session is over.
    Close {
        /// Why the connection gave up.
        reason: String,
    },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never started
    Idle,
    /// Transport or handshake in progress
    Connecting,
    /// Relay link is up
    Connected,
    /// Waiting before the next retry
    Backoff,
    /// Given up or closed by the user
    Closed,
}

/// Delays between reconnect attempts after the relay link drops.
///
/// Retry `n` waits `delays[n]`. Once the list is exhausted the connection
/// closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    delays: Vec<Duration>,
}

impl ReconnectPolicy {
    /// Policy with explicit delays.
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Policy that never reconnects.
    pub fn never() -> Self {
        Self { delays: Vec::new() }
    }

    /// Delay before retry number `retry`, or `None` when retries are exhausted.
    pub fn delay(&self, retry: u32) -> Option<Duration> {
        self.delays.get(retry as usize).copied()
    }

    /// Maximum number of retries.
    pub fn max_retries(&self) -> u32 {
        self.delays.len() as u32
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAYS.to_vec())
    }
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for connecting and completing the relay handshake
    pub handshake_timeout: Duration,
    /// Retry schedule after the link drops
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT, reconnect: ReconnectPolicy::default() }
    }
}

/// Relay connection state machine.
///
/// Pure: no I/O, time is passed into every method that needs it. Generic over
/// `Instant` so simulations can drive it with virtual time.
#[derive(Debug, Clone)]
pub struct Connection<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    state: ConnectionState,
    config: ConnectionConfig,
    /// When the current state was entered
    since: I,
    /// Delay to wait in `Backoff`
    backoff: Duration,
    /// Retries since the last successful connection
    retries: u32,
}

impl<I> Connection<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a connection in [`ConnectionState::Idle`].
    pub fn new(now: I, config: ConnectionConfig) -> Self {
        Self { state: ConnectionState::Idle, config, since: now, backoff: Duration::ZERO, retries: 0 }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the relay link is up.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Retries since the last successful connection.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Begin the first connection attempt.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if not in `Idle`
    pub fn start(&mut self, now: I) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.state != ConnectionState::Idle {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "start".to_string(),
            });
        }

        self.enter(ConnectionState::Connecting, now);
        Ok(vec![ConnectionAction::Connect { attempt: 0 }])
    }

    /// Transport and relay handshake completed.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if no attempt is in progress
    pub fn on_connected(&mut self, now: I) -> Result<(), ConnectionError> {
        if self.state != ConnectionState::Connecting {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "on_connected".to_string(),
            });
        }

        self.retries = 0;
        self.enter(ConnectionState::Connected, now);
        Ok(())
    }

    /// The link dropped or an attempt failed. Schedules the next retry.
    ///
    /// Ignored in `Idle`, `Backoff` and `Closed`.
    pub fn on_disconnected(&mut self, now: I, reason: &str) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Connected | ConnectionState::Connecting => {},
            _ => return Vec::new(),
        }

        tracing::debug!(reason, retries = self.retries, "relay link lost");

        let Some(delay) = self.config.reconnect.delay(self.retries) else {
            let error = ConnectionError::ReconnectExhausted { attempts: self.retries };
            self.enter(ConnectionState::Closed, now);
            return vec![ConnectionAction::Close { reason: error.to_string() }];
        };

        self.backoff = delay;
        self.enter(ConnectionState::Backoff, now);

        if delay.is_zero() { self.retry(now) } else { Vec::new() }
    }

    /// Process periodic maintenance (handshake timeout and retry scheduling).
    pub fn tick(&mut self, now: I) -> Vec<ConnectionAction> {
        let elapsed = now - self.since;

        match self.state {
            ConnectionState::Connecting if elapsed > self.config.handshake_timeout => {
                let error = ConnectionError::HandshakeTimeout { elapsed };
                self.on_disconnected(now, &error.to_string())
            },
            ConnectionState::Backoff if elapsed >= self.backoff => self.retry(now),
            _ => Vec::new(),
        }
    }

    /// Close for good. No further attempts are made.
    pub fn close(&mut self, now: I) {
        self.enter(ConnectionState::Closed, now);
    }

    fn retry(&mut self, now: I) -> Vec<ConnectionAction> {
        self.retries += 1;
        self.enter(ConnectionState::Connecting, now);
        vec![ConnectionAction::Connect { attempt: self.retries }]
    }

    fn enter(&mut self, state: ConnectionState, now: I) {
        tracing::debug!(from = ?self.state, to = ?state, "connection state");
        self.state = state;
        self.since = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(now: Instant) -> Connection {
        Connection::new(now, ConnectionConfig::default())
    }

    #[test]
    fn start_emits_first_connect() {
        let t0 = Instant::now();
        let mut conn = connection(t0);

        assert_eq!(conn.start(t0).unwrap(), vec![ConnectionAction::Connect { attempt: 0 }]);
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }

    #[test]
    fn start_twice_is_rejected() {
        let t0 = Instant::now();
        let mut conn = connection(t0);
        conn.start(t0).unwrap();

        assert!(matches!(conn.start(t0), Err(ConnectionError::InvalidState { .. })));
    }

    #[test]
    fn first_retry_after_drop_is_immediate() {
        let t0 = Instant::now();
        let mut conn = connection(t0);
        conn.start(t0).unwrap();
        conn.on_connected(t0).unwrap();

        let actions = conn.on_disconnected(t0, "reset");

        assert_eq!(actions, vec![ConnectionAction::Connect { attempt: 1 }]);
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }

    #[test]
    fn second_retry_waits_for_backoff() {
        let t0 = Instant::now();
        let mut conn = connection(t0);
        conn.start(t0).unwrap();
        conn.on_connected(t0).unwrap();
        conn.on_disconnected(t0, "reset");

        assert!(conn.on_disconnected(t0, "refused").is_empty());
        assert_eq!(conn.state(), ConnectionState::Backoff);

        assert!(conn.tick(t0 + Duration::from_secs(1)).is_empty());
        assert_eq!(
            conn.tick(t0 + Duration::from_secs(2)),
            vec![ConnectionAction::Connect { attempt: 2 }]
        );
    }

    #[test]
    fn gives_up_after_policy_is_exhausted() {
        let t0 = Instant::now();
        let mut conn = Connection::new(t0, ConnectionConfig {
            reconnect: ReconnectPolicy::new(vec![Duration::ZERO]),
            ..ConnectionConfig::default()
        });
        conn.start(t0).unwrap();
        conn.on_connected(t0).unwrap();
        conn.on_disconnected(t0, "reset");

        let actions = conn.on_disconnected(t0, "refused");

        assert!(matches!(actions.as_slice(), [ConnectionAction::Close { .. }]));
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn success_resets_retry_budget() {
        let t0 = Instant::now();
        let mut conn = connection(t0);
        conn.start(t0).unwrap();
        conn.on_connected(t0).unwrap();
        conn.on_disconnected(t0, "reset");
        conn.on_disconnected(t0, "refused");
        conn.tick(t0 + Duration::from_secs(2));
        conn.on_connected(t0 + Duration::from_secs(3)).unwrap();

        assert_eq!(conn.retries(), 0);
        assert_eq!(
            conn.on_disconnected(t0 + Duration::from_secs(4), "reset"),
            vec![ConnectionAction::Connect { attempt: 1 }]
        );
    }

    #[test]
    fn handshake_timeout_counts_as_failure() {
        let t0 = Instant::now();
        let mut conn = connection(t0);
        conn.start(t0).unwrap();

        let actions = conn.tick(t0 + DEFAULT_HANDSHAKE_TIMEOUT + Duration::from_secs(1));

        assert_eq!(actions, vec![ConnectionAction::Connect { attempt: 1 }]);
    }

    #[test]
    fn never_policy_closes_on_first_drop() {
        let t0 = Instant::now();
        let mut conn = Connection::new(t0, ConnectionConfig {
            reconnect: ReconnectPolicy::never(),
            ..ConnectionConfig::default()
        });
        conn.start(t0).unwrap();
        conn.on_connected(t0).unwrap();

        assert!(matches!(conn.on_disconnected(t0, "bye").as_slice(), [ConnectionAction::Close { .. }]));
    }

    #[test]
    fn closed_ignores_disconnects_and_ticks() {
        let t0 = Instant::now();
        let mut conn = connection(t0);
        conn.start(t0).unwrap();
        conn.close(t0);

        assert!(conn.on_disconnected(t0, "late").is_empty());
        assert!(conn.tick(t0 + Duration::from_secs(60)).is_empty());
        assert_eq!(conn.state(), ConnectionState::Closed);
    }
}
