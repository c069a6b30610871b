//! Command-line node for keyrelay
//!
//! A thin shell over [`keyrelay_app::Driver`] that reads commands from stdin
//! and prints the conversation as plain lines. All orchestration logic lives
//! in the generic [`keyrelay_app::Runtime`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod console;
pub mod system_env;
pub mod transcript;

pub use console::{ConsoleDriver, ConsoleError};
pub use system_env::SystemEnv;
pub use transcript::Transcript;
