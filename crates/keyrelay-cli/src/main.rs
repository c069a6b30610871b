//! keyrelay command-line node.
//!
//! # Usage
//!
//! ```bash
//! # Join the default local relay as alice
//! keyrelay --name alice
//!
//! # Pick the relay from the environment
//! KEYRELAY_RELAY=ws://relay.example:5000/chat keyrelay --name bob
//! ```
//!
//! Type `/help` once connected for the command list.

use clap::Parser;
use keyrelay_app::{DEFAULT_RELAY_URL, Runtime, RuntimeConfig};
use keyrelay_cli::{ConsoleDriver, SystemEnv};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// End-to-end encrypted chat over a keyrelay relay
#[derive(Parser, Debug)]
#[command(name = "keyrelay")]
#[command(about = "End-to-end encrypted chat over a keyrelay relay")]
#[command(version)]
struct Args {
    /// Relay WebSocket URL
    #[arg(short, long, env = "KEYRELAY_RELAY", default_value = DEFAULT_RELAY_URL)]
    relay: String,

    /// Display name announced to the relay
    #[arg(short, long, env = "KEYRELAY_NAME")]
    name: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // Logs go to stderr so the conversation on stdout stays readable.
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    tracing::info!(relay = %args.relay, name = %args.name, "keyrelay starting");

    let config = RuntimeConfig::new(args.relay, args.name);
    let driver = ConsoleDriver::new(std::io::stdout());
    let runtime = Runtime::new(driver, SystemEnv::new(), config);

    runtime.run().await?;

    Ok(())
}
