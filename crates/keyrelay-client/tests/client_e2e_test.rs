//! End-to-end client tests with two clients wired by hand.
//!
//! The test plays the relay: it routes each client's outbound events to the
//! other as the hub would, so every step of the key exchange is visible.
//!
//! These tests verify properties a single client cannot show:
//! - Keys offered by one client install in the other
//! - Ciphertext produced by one client opens only for its recipient
//! - Tampered or misdirected ciphertext changes nothing
//! - History is only written once a send completes

use keyrelay_client::{Client, ClientAction, ClientError, ClientEvent, Direction, KeyState, SendReceipt};
use keyrelay_harness::SimEnv;
use keyrelay_proto::{InboundEvent, KeyOffer, KeyRequest, OutboundEvent, PeerMessage};

fn connected(name: &str, seed: u64) -> Client<SimEnv> {
    connected_with(name, SimEnv::with_seed(seed))
}

fn connected_with(name: &str, env: SimEnv) -> Client<SimEnv> {
    let mut client = Client::new(env);
    client.handle(ClientEvent::SetUser { name: name.to_string() });
    client.handle(ClientEvent::Connected);
    client
}

fn relay(client: &mut Client<SimEnv>, event: InboundEvent) -> Vec<ClientAction> {
    client.handle(ClientEvent::RelayReceived(event))
}

fn roster(names: &[&str]) -> InboundEvent {
    InboundEvent::ListUsers(names.iter().map(|name| (*name).to_string()).collect())
}

/// Turn a `SendPublicKey` reply into the offer the relay delivers.
fn forward_key(from: &str, actions: &[ClientAction]) -> InboundEvent {
    match actions {
        [ClientAction::Send(OutboundEvent::SendPublicKey { public_key, .. })] => {
            InboundEvent::ReceivedPublicKey(KeyOffer { from_user: from.to_string(), public_key: public_key.clone() })
        },
        other => panic!("expected a key reply, got {other:?}"),
    }
}

fn chat(actions: &[ClientAction]) -> (SendReceipt, Vec<u8>) {
    match actions {
        [ClientAction::SendChat { receipt, event: OutboundEvent::SendMessage { ciphertext, .. } }] => {
            (*receipt, ciphertext.clone())
        },
        other => panic!("expected a chat send, got {other:?}"),
    }
}

/// Alice and bob in the same roster with each other's keys.
fn keyed_pair() -> (Client<SimEnv>, Client<SimEnv>) {
    keyed_pair_with(SimEnv::with_seed(1))
}

/// Like [`keyed_pair`], with alice running on `env`.
fn keyed_pair_with(env: SimEnv) -> (Client<SimEnv>, Client<SimEnv>) {
    let mut alice = connected_with("alice", env);
    let mut bob = connected("bob", 2);
    relay(&mut alice, roster(&["alice", "bob"]));
    relay(&mut bob, roster(&["alice", "bob"]));

    let start = alice.handle(ClientEvent::StartConversation { peer: "bob".into() });
    assert_eq!(start, vec![ClientAction::Send(OutboundEvent::StartConversation { target: "bob".into() })]);

    // The relay asks both ends for their keys.
    let from_alice = relay(&mut alice, InboundEvent::RequestedPublicKey(KeyRequest { from_user: "bob".into() }));
    let from_bob = relay(&mut bob, InboundEvent::RequestedPublicKey(KeyRequest { from_user: "alice".into() }));

    relay(&mut bob, forward_key("alice", &from_alice));
    relay(&mut alice, forward_key("bob", &from_bob));

    (alice, bob)
}

#[test]
fn key_exchange_installs_both_keys() {
    let (alice, bob) = keyed_pair();

    assert_eq!(alice.directory().key_state("bob"), KeyState::KeyEstablished);
    assert_eq!(bob.directory().key_state("alice"), KeyState::KeyEstablished);

    let bob_fingerprint = bob.public_key().map(|key| key.fingerprint());
    let installed = alice.directory().get("bob").and_then(|peer| peer.public_key()).map(|key| key.fingerprint());
    assert_eq!(installed, bob_fingerprint);
}

#[test]
fn entropy_loss_mid_session_fails_only_that_send() {
    let env = SimEnv::with_seed(1);
    let (mut alice, mut bob) = keyed_pair_with(env.clone());

    env.set_entropy_available(false);
    for _ in 0..2 {
        let failed = alice.handle(ClientEvent::SendMessage { peer: "bob".into(), text: "lost".into() });
        match failed.as_slice() {
            [ClientAction::Failed { error: error @ ClientError::EncryptionFailed { peer, .. } }] => {
                assert_eq!(peer, "bob");
                assert!(!error.is_fatal());
            },
            other => panic!("expected EncryptionFailed, got {other:?}"),
        }
    }
    assert_eq!(alice.pending_send_count(), 0);
    assert!(alice.directory().get("bob").unwrap().history().is_empty());

    env.set_entropy_available(true);
    let (receipt, ciphertext) = chat(&alice.handle(ClientEvent::SendMessage {
        peer: "bob".into(),
        text: "back".into(),
    }));
    alice.handle(ClientEvent::MessageSent { receipt });

    let history = alice.directory().get("bob").unwrap().history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].text, "back");

    let received = relay(
        &mut bob,
        InboundEvent::ReceivedMessage(PeerMessage { from_user: "alice".into(), message: ciphertext }),
    );
    assert!(matches!(received.as_slice(), [ClientAction::MessageReceived { .. }]));
}

#[test]
fn message_reaches_recipient_after_send_completes() {
    let (mut alice, mut bob) = keyed_pair();

    let (receipt, ciphertext) = chat(&alice.handle(ClientEvent::SendMessage {
        peer: "bob".into(),
        text: "hello bob".into(),
    }));
    assert!(alice.directory().get("bob").unwrap().history().is_empty());
    assert_eq!(alice.pending_send_count(), 1);

    let sent = alice.handle(ClientEvent::MessageSent { receipt });
    assert!(matches!(sent.as_slice(), [ClientAction::MessageSent { peer, .. }] if peer == "bob"));

    let received = relay(
        &mut bob,
        InboundEvent::ReceivedMessage(PeerMessage { from_user: "alice".into(), message: ciphertext }),
    );
    match received.as_slice() {
        [ClientAction::MessageReceived { peer, message }] => {
            assert_eq!(peer, "alice");
            assert_eq!(message.text, "hello bob");
            assert_eq!(message.direction, Direction::Inbound);
        },
        other => panic!("expected delivery, got {other:?}"),
    }

    assert_eq!(alice.directory().get("bob").unwrap().history()[0].direction, Direction::Outbound);
    assert_eq!(alice.pending_send_count(), 0);
}

#[test]
fn empty_message_round_trips() {
    let (mut alice, mut bob) = keyed_pair();

    let (_, ciphertext) = chat(&alice.handle(ClientEvent::SendMessage { peer: "bob".into(), text: String::new() }));
    relay(&mut bob, InboundEvent::ReceivedMessage(PeerMessage { from_user: "alice".into(), message: ciphertext }));

    let history = bob.directory().get("alice").unwrap().history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].text, "");
}

#[test]
fn tampered_ciphertext_is_rejected() {
    let (mut alice, mut bob) = keyed_pair();

    let (_, mut ciphertext) = chat(&alice.handle(ClientEvent::SendMessage {
        peer: "bob".into(),
        text: "integrity matters".into(),
    }));
    let last = ciphertext.len() - 1;
    ciphertext[last] ^= 0x01;

    let actions = relay(
        &mut bob,
        InboundEvent::ReceivedMessage(PeerMessage { from_user: "alice".into(), message: ciphertext }),
    );

    assert!(matches!(
        actions.as_slice(),
        [ClientAction::Failed { error: ClientError::DecryptionFailed { peer, .. } }] if peer == "alice"
    ));
    assert!(bob.directory().get("alice").unwrap().history().is_empty());
}

#[test]
fn ciphertext_for_someone_else_does_not_open() {
    let (mut alice, _bob) = keyed_pair();
    let mut carol = connected("carol", 3);
    relay(&mut carol, roster(&["alice", "bob", "carol"]));

    let (_, ciphertext) = chat(&alice.handle(ClientEvent::SendMessage {
        peer: "bob".into(),
        text: "for bob only".into(),
    }));

    let actions = relay(
        &mut carol,
        InboundEvent::ReceivedMessage(PeerMessage { from_user: "alice".into(), message: ciphertext }),
    );

    assert!(matches!(actions.as_slice(), [ClientAction::Failed { error }] if !error.is_fatal()));
    assert!(carol.directory().get("alice").unwrap().history().is_empty());
}

#[test]
fn peer_leaving_mid_send_is_not_recorded() {
    let (mut alice, _bob) = keyed_pair();

    let (receipt, _) = chat(&alice.handle(ClientEvent::SendMessage { peer: "bob".into(), text: "bye".into() }));
    relay(&mut alice, roster(&["alice"]));

    let actions = alice.handle(ClientEvent::MessageSent { receipt });

    assert!(matches!(actions.as_slice(), [ClientAction::Log { .. }]));
    assert!(!alice.directory().contains("bob"));
    assert_eq!(alice.pending_send_count(), 0);
}

#[test]
fn rejoining_peer_starts_over() {
    let (mut alice, _bob) = keyed_pair();
    let (receipt, _) = chat(&alice.handle(ClientEvent::SendMessage { peer: "bob".into(), text: "one".into() }));
    alice.handle(ClientEvent::MessageSent { receipt });

    relay(&mut alice, roster(&["alice"]));
    relay(&mut alice, roster(&["alice", "bob"]));

    let bob = alice.directory().get("bob").unwrap();
    assert_eq!(bob.key_state(), KeyState::KeyPending);
    assert!(bob.history().is_empty());
}

#[test]
fn same_seed_same_ciphertext() {
    let run = || {
        let (mut alice, _) = keyed_pair();
        chat(&alice.handle(ClientEvent::SendMessage { peer: "bob".into(), text: "again".into() })).1
    };

    assert_eq!(run(), run());
}
