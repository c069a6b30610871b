//! Property-based tests over whole simulated worlds.
//!
//! Three users type random commands, drop their links and wait out backoff.
//! After each burst the world is settled and every invariant, including
//! roster agreement with the relay, must hold.

use std::time::Duration;

use keyrelay_client::KeyState;
use keyrelay_harness::{InvariantRegistry, SimWorld};
use proptest::prelude::*;

const USERS: [&str; 3] = ["alice", "bob", "carol"];
const ROUNDS: usize = 64;

#[derive(Debug, Clone)]
enum Op {
    Open { from: usize, to: usize },
    Msg { from: usize, to: usize, text: String },
    Say { from: usize, text: String },
    DropLink { node: usize },
    Wait { secs: u64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let node = 0..USERS.len();
    prop_oneof![
        3 => (node.clone(), node.clone()).prop_map(|(from, to)| Op::Open { from, to }),
        4 => (node.clone(), node.clone(), "[a-z]{1,10}").prop_map(|(from, to, text)| Op::Msg { from, to, text }),
        1 => (node.clone(), "[a-z]{1,10}").prop_map(|(from, text)| Op::Say { from, text }),
        1 => node.prop_map(|node| Op::DropLink { node }),
        1 => (0u64..3).prop_map(|secs| Op::Wait { secs }),
    ]
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread().build().expect("runtime").block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_world_invariants_hold_after_settling(
        seed in any::<u64>(),
        ops in prop::collection::vec(op_strategy(), 1..25),
    ) {
        let result: Result<(), TestCaseError> = block_on(async move {
            let mut world = SimWorld::new(seed);
            for name in USERS {
                world.add_node(name);
            }
            world.start_all().await.map_err(|e| TestCaseError::fail(e.0))?;
            world.settle(ROUNDS).await.map_err(|e| TestCaseError::fail(e.0))?;

            let invariants = InvariantRegistry::standard();
            for op in ops {
                match op {
                    Op::Open { from, to } => world.type_line(from, &format!("/open {}", USERS[to])),
                    Op::Msg { from, to, text } => {
                        world.type_line(from, &format!("/msg {} {text}", USERS[to]));
                    },
                    Op::Say { from, text } => world.type_line(from, &text),
                    Op::DropLink { node } => world.node(node).driver.drop_link(),
                    Op::Wait { secs } => world.advance(Duration::from_secs(secs)),
                }
                world.settle(ROUNDS).await.map_err(|e| TestCaseError::fail(e.0))?;

                if let Err(violations) = invariants.check_all(&world.snapshot()) {
                    return Err(TestCaseError::fail(format!("{violations:?}")));
                }
            }
            Ok(())
        });
        result?;
    }

    #[test]
    fn prop_keys_match_live_identities(seed in any::<u64>()) {
        let result: Result<(), TestCaseError> = block_on(async move {
            let mut world = SimWorld::new(seed);
            let alice = world.add_node("alice");
            let bob = world.add_node("bob");
            world.start_all().await.map_err(|e| TestCaseError::fail(e.0))?;
            world.settle(ROUNDS).await.map_err(|e| TestCaseError::fail(e.0))?;
            world.type_line(alice, "/open bob");
            world.settle(ROUNDS).await.map_err(|e| TestCaseError::fail(e.0))?;

            let directory = world.node(alice).client().directory();
            prop_assert_eq!(directory.key_state("bob"), KeyState::KeyEstablished);
            let installed = directory.get("bob").and_then(|peer| peer.public_key()).copied();
            prop_assert_eq!(installed.as_ref(), world.node(bob).client().public_key());
            Ok(())
        });
        result?;
    }
}
