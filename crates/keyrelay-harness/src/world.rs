//! Several runtimes sharing one relay and one clock.
//!
//! Each node is a full [`Runtime`] driven by a [`SimDriver`]; the world steps
//! them in a fixed order so a seed fully determines the run.

use std::time::Duration;

use keyrelay_app::{Runtime, RuntimeConfig};
use keyrelay_client::Client;

use crate::{
    invariants::{ClientSnapshot, InvariantRegistry, SystemSnapshot},
    sim_driver::{SimDriver, SimDriverError},
    sim_env::SimEnv,
    sim_relay::{SharedSimRelay, create_shared_relay, lock_relay},
};

/// Relay URL handed to simulated runtimes.
pub const SIM_RELAY_URL: &str = "sim://relay";

/// One simulated user.
pub struct SimNode {
    /// Display name.
    pub name: String,
    /// Handle to the node's driver for injection and inspection.
    pub driver: SimDriver,
    runtime: Runtime<SimDriver, SimEnv>,
    quit: bool,
}

impl SimNode {
    /// The node's runtime.
    pub fn runtime(&self) -> &Runtime<SimDriver, SimEnv> {
        &self.runtime
    }

    /// The node's protocol client.
    pub fn client(&self) -> &Client<SimEnv> {
        self.runtime.bridge().client()
    }

    /// Whether the runtime asked to quit.
    pub fn has_quit(&self) -> bool {
        self.quit
    }
}

/// Simulated world.
pub struct SimWorld {
    env: SimEnv,
    relay: SharedSimRelay,
    nodes: Vec<SimNode>,
}

impl SimWorld {
    /// Empty world whose randomness is determined by `seed`.
    pub fn new(seed: u64) -> Self {
        Self { env: SimEnv::with_seed(seed), relay: create_shared_relay(), nodes: Vec::new() }
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Shared relay.
    pub fn relay(&self) -> &SharedSimRelay {
        &self.relay
    }

    /// Add a user with the default connection policy. Returns its index.
    pub fn add_node(&mut self, name: &str) -> usize {
        self.add_node_with(name, self.env.clone(), RuntimeConfig::new(SIM_RELAY_URL, name))
    }

    /// Add a user with its own environment and configuration.
    pub fn add_node_with(&mut self, name: &str, env: SimEnv, config: RuntimeConfig) -> usize {
        let driver = SimDriver::new(self.env.clone(), self.relay.clone())
            .with_invariants(InvariantRegistry::standard());
        let runtime = Runtime::new(driver.clone(), env, config);

        self.nodes.push(SimNode { name: name.to_string(), driver, runtime, quit: false });
        self.nodes.len() - 1
    }

    /// Node by index.
    pub fn node(&self, index: usize) -> &SimNode {
        &self.nodes[index]
    }

    /// All nodes.
    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    /// Type a line into a node.
    pub fn type_line(&self, index: usize, line: &str) {
        self.nodes[index].driver.type_line(line);
    }

    /// Move the shared clock forward.
    pub fn advance(&self, duration: Duration) {
        self.env.advance(duration);
    }

    /// Start every node that has not started yet.
    pub async fn start_all(&mut self) -> Result<(), SimDriverError> {
        for node in &mut self.nodes {
            if node.driver.connect_attempts() == 0 && !node.quit {
                node.quit = node.runtime.start().await?;
            }
        }
        Ok(())
    }

    /// Step every running node once, in order.
    pub async fn step_all(&mut self) -> Result<(), SimDriverError> {
        for node in self.nodes.iter_mut().filter(|node| !node.quit) {
            node.quit = node.runtime.step().await?;
        }
        Ok(())
    }

    /// Step until no input or relay traffic is pending, up to `max_rounds`.
    ///
    /// Returns the number of rounds taken.
    pub async fn settle(&mut self, max_rounds: usize) -> Result<usize, SimDriverError> {
        for round in 1..=max_rounds {
            self.step_all().await?;
            if self.is_quiet() {
                return Ok(round);
            }
        }
        Err(SimDriverError(format!("world did not settle in {max_rounds} rounds")))
    }

    fn is_quiet(&self) -> bool {
        let relay_idle = lock_relay(&self.relay).pending() == 0;
        relay_idle && self.nodes.iter().all(|node| node.quit || !node.driver.has_pending())
    }

    /// Directory snapshot of every node plus the relay roster.
    pub fn snapshot(&self) -> SystemSnapshot {
        let clients = self.nodes.iter().map(|node| ClientSnapshot::from_client(node.client())).collect();
        let roster = lock_relay(&self.relay).roster();
        SystemSnapshot::from_clients(clients).with_relay_roster(roster)
    }
}
