//! Property-based tests for the client state machine.
//!
//! Arbitrary sequences of relay pushes and user intents, valid or not, must
//! never break the peer directory's invariants or leak plaintext history for
//! sends that never completed.

use keyrelay_client::{Client, ClientAction, ClientEvent, SendReceipt};
use keyrelay_crypto::Identity;
use keyrelay_harness::{ClientSnapshot, InvariantRegistry, SimEnv, SystemSnapshot};
use keyrelay_proto::{InboundEvent, KeyOffer, KeyRequest, PeerMessage};
use proptest::prelude::*;

static OTHERS: [&str; 3] = ["bob", "carol", "dave"];

fn peer_name() -> impl Strategy<Value = String> {
    prop::sample::select(&OTHERS[..]).prop_map(str::to_string)
}

/// Rosters sometimes include the local user, as the relay's do.
fn roster() -> impl Strategy<Value = Vec<String>> {
    (prop::sample::subsequence(&OTHERS[..], 0..=3), any::<bool>()).prop_map(|(names, with_self)| {
        let mut roster: Vec<String> = names.into_iter().map(str::to_string).collect();
        if with_self {
            roster.push("alice".to_string());
        }
        roster
    })
}

/// Portable key text for a fixed peer identity.
fn peer_key(seed: u8) -> String {
    Identity::generate([seed; 32]).map(|identity| identity.export_public_key().into_string()).unwrap_or_default()
}

#[derive(Debug, Clone)]
enum Step {
    Event(ClientEvent),
    /// Complete the oldest send still in flight.
    Complete { ok: bool },
}

fn step_strategy() -> impl Strategy<Value = Step> {
    let event = prop_oneof![
        3 => roster().prop_map(|names| ClientEvent::RelayReceived(InboundEvent::ListUsers(names))),
        2 => peer_name().prop_map(|from_user| {
            ClientEvent::RelayReceived(InboundEvent::RequestedPublicKey(KeyRequest { from_user }))
        }),
        3 => (peer_name(), 1u8..4).prop_map(|(from_user, seed)| {
            ClientEvent::RelayReceived(InboundEvent::ReceivedPublicKey(KeyOffer {
                from_user,
                public_key: peer_key(seed),
            }))
        }),
        1 => (peer_name(), "[a-z{}\":]{0,16}").prop_map(|(from_user, public_key)| {
            ClientEvent::RelayReceived(InboundEvent::ReceivedPublicKey(KeyOffer { from_user, public_key }))
        }),
        1 => (peer_name(), prop::collection::vec(any::<u8>(), 0..96)).prop_map(|(from_user, message)| {
            ClientEvent::RelayReceived(InboundEvent::ReceivedMessage(PeerMessage { from_user, message }))
        }),
        2 => peer_name().prop_map(|peer| ClientEvent::StartConversation { peer }),
        3 => (peer_name(), "[a-z ]{0,16}").prop_map(|(peer, text)| ClientEvent::SendMessage { peer, text }),
        1 => Just(ClientEvent::Connected),
        1 => Just(ClientEvent::Disconnected),
        1 => (1_000u64..1_004).prop_map(|n| ClientEvent::MessageSent { receipt: SendReceipt(n) }),
    ];

    prop_oneof![
        6 => event.prop_map(Step::Event),
        2 => any::<bool>().prop_map(|ok| Step::Complete { ok }),
    ]
}

fn connected_alice(seed: u64) -> Client<SimEnv> {
    let mut client = Client::new(SimEnv::with_seed(seed));
    client.handle(ClientEvent::SetUser { name: "alice".into() });
    client.handle(ClientEvent::Connected);
    client
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_directory_invariants_hold(seed in any::<u64>(), steps in prop::collection::vec(step_strategy(), 0..50)) {
        let mut client = connected_alice(seed);
        let invariants = InvariantRegistry::standard();
        let mut observed = ClientSnapshot::new("alice");
        let mut in_flight: Vec<SendReceipt> = Vec::new();

        for step in steps {
            let event = match step {
                Step::Event(event) => event,
                Step::Complete { ok } => {
                    if in_flight.is_empty() {
                        continue;
                    }
                    let receipt = in_flight.remove(0);
                    if ok {
                        ClientEvent::MessageSent { receipt }
                    } else {
                        ClientEvent::SendFailed { receipt, reason: "link reset".into() }
                    }
                },
            };

            for action in client.handle(event) {
                if let ClientAction::SendChat { receipt, .. } = action {
                    in_flight.push(receipt);
                }
            }

            observed.observe_client(&client);
            let snapshot = SystemSnapshot::single(observed.clone());
            prop_assert!(invariants.check_all(&snapshot).is_ok(), "{:?}", invariants.check_all(&snapshot));
            prop_assert_eq!(client.pending_send_count(), in_flight.len());
        }
    }

    #[test]
    fn prop_local_user_never_in_directory(rosters in prop::collection::vec(roster(), 1..10)) {
        let mut client = connected_alice(7);

        for names in rosters {
            client.handle(ClientEvent::RelayReceived(InboundEvent::ListUsers(names.clone())));

            prop_assert!(!client.directory().contains("alice"));
            let expected: Vec<&str> = {
                let mut others: Vec<&str> = names.iter().map(String::as_str).filter(|n| *n != "alice").collect();
                others.sort_unstable();
                others.dedup();
                others
            };
            prop_assert_eq!(client.directory().names().collect::<Vec<_>>(), expected);
        }
    }

    #[test]
    fn prop_every_key_request_is_answered(requests in prop::collection::vec(peer_name(), 1..10)) {
        let mut client = connected_alice(9);

        for from_user in requests {
            let actions = client.handle(ClientEvent::RelayReceived(InboundEvent::RequestedPublicKey(
                KeyRequest { from_user },
            )));
            prop_assert_eq!(actions.len(), 1);
        }
    }
}
