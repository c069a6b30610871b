//! Property-based tests for hub framing.
//!
//! Relay traffic arrives in transport chunks that do not respect record
//! boundaries. These tests split encoded streams at arbitrary points and check
//! that events come out whole and in order.

use keyrelay_proto::{FrameBuffer, HubMessage, InboundEvent, KeyOffer, OutboundEvent, PeerMessage};
use proptest::prelude::*;

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,12}"
}

fn inbound_strategy() -> impl Strategy<Value = InboundEvent> {
    prop_oneof![
        prop::collection::vec(name_strategy(), 0..6).prop_map(InboundEvent::ListUsers),
        (name_strategy(), "[ -~]{0,64}").prop_map(|(from_user, public_key)| {
            InboundEvent::ReceivedPublicKey(KeyOffer { from_user, public_key })
        }),
        (name_strategy(), prop::collection::vec(any::<u8>(), 0..256)).prop_map(
            |(from_user, message)| InboundEvent::ReceivedMessage(PeerMessage { from_user, message })
        ),
    ]
}

fn outbound_strategy() -> impl Strategy<Value = OutboundEvent> {
    prop_oneof![
        name_strategy().prop_map(|name| OutboundEvent::Init { name }),
        name_strategy().prop_map(|target| OutboundEvent::StartConversation { target }),
        (name_strategy(), prop::collection::vec(any::<u8>(), 0..256))
            .prop_map(|(target, ciphertext)| OutboundEvent::SendMessage { target, ciphertext }),
    ]
}

fn decode_all(buffer: &mut FrameBuffer) -> Vec<HubMessage> {
    let mut out = Vec::new();
    while let Some(record) = buffer.next_record() {
        out.push(HubMessage::decode(&record).unwrap());
    }
    out
}

proptest! {
    #[test]
    fn prop_inbound_survives_arbitrary_chunking(
        events in prop::collection::vec(inbound_strategy(), 1..8),
        chunk in 1usize..64,
    ) {
        let mut stream = Vec::new();
        for event in &events {
            let message = HubMessage::Invocation(event.to_invocation().unwrap());
            stream.extend(message.encode().unwrap());
        }

        let mut buffer = FrameBuffer::new();
        let mut decoded = Vec::new();
        for piece in stream.chunks(chunk) {
            buffer.push(piece);
            decoded.extend(decode_all(&mut buffer));
        }

        prop_assert_eq!(buffer.pending_len(), 0);
        let decoded: Vec<InboundEvent> = decoded
            .into_iter()
            .map(|m| match m {
                HubMessage::Invocation(invocation) => InboundEvent::from_invocation(invocation).unwrap(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        prop_assert_eq!(decoded, events);
    }

    #[test]
    fn prop_outbound_decodes_on_relay_side(event in outbound_strategy()) {
        let record = HubMessage::Invocation(event.to_invocation().unwrap()).encode().unwrap();

        let mut buffer = FrameBuffer::new();
        buffer.push(&record);
        let Some(HubMessage::Invocation(invocation)) =
            buffer.next_record().map(|r| HubMessage::decode(&r).unwrap())
        else {
            panic!("expected one invocation");
        };

        prop_assert_eq!(invocation.target.as_str(), event.target());
        prop_assert_eq!(OutboundEvent::from_invocation(invocation).unwrap(), event);
    }
}

#[test]
fn ping_between_invocations_is_preserved() {
    let mut buffer = FrameBuffer::new();
    let init = OutboundEvent::Init { name: "alice".into() }.to_invocation().unwrap();

    buffer.push(&HubMessage::Invocation(init.clone()).encode().unwrap());
    buffer.push(&HubMessage::Ping.encode().unwrap());
    buffer.push(&HubMessage::Invocation(init.clone()).encode().unwrap());

    assert_eq!(
        decode_all(&mut buffer),
        vec![HubMessage::Invocation(init.clone()), HubMessage::Ping, HubMessage::Invocation(init)]
    );
}
