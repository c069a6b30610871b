//! Application layer for keyrelay
//!
//! Pure state machines and a generic runtime for user commands and protocol
//! orchestration, so deterministic simulation tests run the same code as the
//! command-line node.
//!
//! # Components
//!
//! - [`App`]: user-facing state machine (commands, peer views, status line)
//! - [`Bridge`]: protocol bridge (translates App actions to Client events)
//! - [`Driver`]: Trait for platform-specific I/O abstraction
//! - [`Runtime`]: Generic orchestration loop with reconnect and re-announce

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod app;
mod bridge;
mod driver;
mod event;
mod input;
mod runtime;
mod state;

pub use action::AppAction;
pub use app::App;
pub use bridge::{Bridge, Outgoing};
pub use driver::Driver;
pub use event::AppEvent;
pub use input::{Command, CommandError};
pub use runtime::{DEFAULT_RELAY_URL, Runtime, RuntimeConfig};
pub use state::{ConnectionState, PeerState};
