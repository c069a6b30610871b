//! Fuzz target for the relay connection lifecycle
//!
//! # Strategy
//!
//! - Arbitrary interleavings of start, connect, disconnect, tick and close
//! - Arbitrary clock advances, including none
//!
//! # Invariants
//!
//! - NEVER panic, whatever the order of calls
//! - Retries never exceed the policy's budget
//! - A closed connection emits no further actions

#![no_main]

use std::time::{Duration, Instant};

use arbitrary::Arbitrary;
use keyrelay_core::connection::{Connection, ConnectionConfig, ConnectionState};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Start,
    Connected,
    Disconnected,
    Tick,
    Close,
    Advance { millis: u16 },
}

fuzz_target!(|ops: Vec<Op>| {
    let mut now = Instant::now();
    let config = ConnectionConfig::default();
    let budget = config.reconnect.max_retries();
    let mut connection = Connection::new(now, config);

    for op in ops {
        let closed = connection.state() == ConnectionState::Closed;
        let actions = match op {
            Op::Start => connection.start(now).unwrap_or_default(),
            Op::Connected => {
                let _ = connection.on_connected(now);
                vec![]
            },
            Op::Disconnected => connection.on_disconnected(now, "fuzz"),
            Op::Tick => connection.tick(now),
            Op::Close => {
                connection.close(now);
                vec![]
            },
            Op::Advance { millis } => {
                now += Duration::from_millis(u64::from(millis));
                vec![]
            },
        };

        assert!(connection.retries() <= budget);
        if closed {
            assert!(actions.is_empty());
        }
    }
});
