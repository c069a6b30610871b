//! Fuzz target for relay record framing and decoding
//!
//! # Strategy
//!
//! - Arbitrary byte chunks pushed into a `FrameBuffer` in arbitrary splits
//! - Every complete record decoded as a `HubMessage`
//! - Every invocation decoded as an `InboundEvent`
//!
//! # Invariants
//!
//! - NEVER panic on malformed JSON, unknown types or unknown targets
//! - Records never contain the separator byte
//! - A partial record never grows past `MAX_RECORD_SIZE`

#![no_main]

use arbitrary::Arbitrary;
use keyrelay_proto::{
    FrameBuffer, HubMessage, InboundEvent,
    hub::{MAX_RECORD_SIZE, RECORD_SEPARATOR},
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    chunks: Vec<Vec<u8>>,
}

fuzz_target!(|input: Input| {
    let mut buffer = FrameBuffer::new();

    for chunk in &input.chunks {
        buffer.push(chunk);

        while let Some(record) = buffer.next_record() {
            assert!(!record.contains(&RECORD_SEPARATOR));

            if let Ok(HubMessage::Invocation(invocation)) = HubMessage::decode(&record) {
                let _ = InboundEvent::from_invocation(invocation);
            }
        }

        assert!(buffer.pending_len() <= MAX_RECORD_SIZE.max(chunk.len()));
    }
});
