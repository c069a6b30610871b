//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from specific I/O
//! implementations. Each frontend implements the trait to provide
//! platform-specific I/O, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::{future::Future, ops::Sub, time::Duration};

use keyrelay_client::PeerDirectory;
use keyrelay_proto::{InboundEvent, OutboundEvent};

use crate::{App, AppEvent};

/// Abstracts I/O operations for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. This ensures
/// the same orchestration code runs in the command-line node and in
/// simulation.
///
/// # Implementations
///
/// - **CLI**: stdin lines for input, WebSocket hub connection for the relay
/// - **Simulation**: injected events and an in-memory relay
///
/// # Associated Types
///
/// - [`Error`](Driver::Error): Platform-specific error type
/// - [`Instant`](Driver::Instant): Time representation (real or virtual)
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Poll for the next input event.
    ///
    /// Returns an event or `None` if nothing is ready. Must return within a
    /// short tick so relay events and reconnect timers keep moving.
    fn poll_event(&mut self) -> impl Future<Output = Result<Option<AppEvent>, Self::Error>> + Send;

    /// Send an event to the relay.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is down or the write fails.
    fn send_event(
        &mut self,
        event: &OutboundEvent,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Next event the relay pushed, or `None` if none is ready.
    ///
    /// A dropped link is reported through [`Driver::is_connected`].
    fn recv_event(&mut self) -> impl Future<Output = Option<InboundEvent>> + Send;

    /// Connect to the relay and complete the hub handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    fn connect(&mut self, url: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Check if the relay link is up.
    fn is_connected(&self) -> bool;

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Render the application state. Keys and conversations come from the
    /// client's `directory`; the App holds only presentation state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, app: &App, directory: &PeerDirectory) -> Result<(), Self::Error>;

    /// Stop the connection and clean up resources.
    fn stop(&mut self);
}
