//! Deterministic simulation harness for keyrelay protocol testing.
//!
//! In-memory implementations of the Environment, relay and Driver so whole
//! sessions (several users, key exchanges, reconnects) run reproducibly from
//! a seed without sockets or wall-clock time.
//!
//! # Components
//!
//! - [`SimEnv`]: seeded RNG and virtual clock
//! - [`SimRelay`]: in-memory relay hub with the real routing rules
//! - [`SimDriver`]: [`keyrelay_app::Driver`] over the simulated relay
//! - [`SimWorld`]: several runtimes stepped in a fixed order
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the common
//! set.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_relay;
pub mod world;

pub use invariants::{
    ActivePeerInRoster, ClientSnapshot, HistoryAppendOnly, Invariant, InvariantRegistry,
    InvariantResult, KeyMonotonicity, LocalUserNotPeer, PeerSnapshot, RosterAgreement,
    SystemSnapshot, Violation,
};
pub use sim_driver::{SimDriver, SimDriverError};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_relay::{
    ConnectionId, SharedSimRelay, SimRelay, SimRelayError, create_shared_relay, lock_relay,
};
pub use world::{SIM_RELAY_URL, SimNode, SimWorld};
