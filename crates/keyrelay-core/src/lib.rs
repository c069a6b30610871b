//! Keyrelay Core
//!
//! Pieces shared by every keyrelay layer that are independent of the relay
//! wire format and of cryptography:
//!
//! - [`env::Environment`]: time and randomness, swapped for a seeded
//!   simulation in tests
//! - [`connection::Connection`]: relay link lifecycle with a
//!   [`connection::ReconnectPolicy`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;
pub mod error;

pub use connection::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionState, ReconnectPolicy,
};
pub use env::Environment;
pub use error::{ConnectionError, EntropyError};
