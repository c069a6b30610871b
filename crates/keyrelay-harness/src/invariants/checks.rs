//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::BTreeSet;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// The open conversation must be with someone in the roster.
pub struct ActivePeerInRoster;

impl Invariant for ActivePeerInRoster {
    fn name(&self) -> &'static str {
        "active_peer_in_roster"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if let Some(active) = &client.active_peer
                && !client.peers.contains_key(active)
            {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: active peer {active} not in {:?}",
                        client.name,
                        client.peers.keys().collect::<Vec<_>>()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A client never lists itself as a peer.
pub struct LocalUserNotPeer;

impl Invariant for LocalUserNotPeer {
    fn name(&self) -> &'static str {
        "local_user_not_peer"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if !client.name.is_empty() && client.peers.contains_key(&client.name) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("client {} lists itself as a peer", client.name),
                });
            }
        }
        Ok(())
    }
}

/// Installed keys are never removed while the peer stays in the roster.
pub struct KeyMonotonicity;

impl Invariant for KeyMonotonicity {
    fn name(&self) -> &'static str {
        "key_monotonicity"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            for (peer, history) in &client.peer_history {
                for window in history.windows(2) {
                    if window[0].has_key() && !window[1].has_key() {
                        return Err(Violation {
                            invariant: self.name(),
                            message: format!("client {} peer {peer}: key removed", client.name),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Conversations only grow while the peer stays in the roster.
pub struct HistoryAppendOnly;

impl Invariant for HistoryAppendOnly {
    fn name(&self) -> &'static str {
        "history_append_only"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            for (peer, history) in &client.peer_history {
                for window in history.windows(2) {
                    if window[1].message_count < window[0].message_count {
                        return Err(Violation {
                            invariant: self.name(),
                            message: format!(
                                "client {} peer {peer}: history shrank {} → {}",
                                client.name, window[0].message_count, window[1].message_count
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Once the relay is quiet, every connected client sees the relay roster
/// minus itself.
pub struct RosterAgreement;

impl Invariant for RosterAgreement {
    fn name(&self) -> &'static str {
        "roster_agreement"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(roster) = &state.relay_roster else {
            return Ok(());
        };

        for client in state.clients.iter().filter(|c| c.connected) {
            let expected: BTreeSet<&str> =
                roster.iter().map(String::as_str).filter(|name| *name != client.name).collect();
            let actual: BTreeSet<&str> = client.peers.keys().map(String::as_str).collect();

            if expected != actual {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {} sees {actual:?}, relay has {expected:?}",
                        client.name
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::{ClientSnapshot, PeerSnapshot};

    fn keyed(fingerprint: Option<&str>, message_count: usize) -> PeerSnapshot {
        PeerSnapshot { fingerprint: fingerprint.map(str::to_string), message_count }
    }

    #[test]
    fn active_peer_must_be_present() {
        let client = ClientSnapshot::new("alice").with_active_peer(Some("bob"));
        assert!(ActivePeerInRoster.check(&SystemSnapshot::single(client)).is_err());

        let client = ClientSnapshot::new("alice")
            .with_peer("bob", PeerSnapshot::default())
            .with_active_peer(Some("bob"));
        assert!(ActivePeerInRoster.check(&SystemSnapshot::single(client)).is_ok());
    }

    #[test]
    fn self_listing_detected() {
        let client = ClientSnapshot::new("alice").with_peer("alice", PeerSnapshot::default());
        assert!(LocalUserNotPeer.check(&SystemSnapshot::single(client)).is_err());
    }

    #[test]
    fn key_removal_detected() {
        let mut client = ClientSnapshot::new("alice");
        client.peer_history.insert("bob".into(), vec![keyed(Some("aa"), 0), keyed(None, 0)]);

        assert!(KeyMonotonicity.check(&SystemSnapshot::single(client)).is_err());
    }

    #[test]
    fn key_replacement_allowed() {
        let mut client = ClientSnapshot::new("alice");
        client.peer_history.insert("bob".into(), vec![
            keyed(None, 0),
            keyed(Some("aa"), 0),
            keyed(Some("bb"), 0),
        ]);

        assert!(KeyMonotonicity.check(&SystemSnapshot::single(client)).is_ok());
    }

    #[test]
    fn shrinking_history_detected() {
        let mut client = ClientSnapshot::new("alice");
        client.peer_history.insert("bob".into(), vec![keyed(None, 2), keyed(None, 1)]);

        assert!(HistoryAppendOnly.check(&SystemSnapshot::single(client)).is_err());
    }

    #[test]
    fn roster_agreement_ignores_disconnected_clients() {
        let mut online = ClientSnapshot::new("alice").with_peer("bob", PeerSnapshot::default());
        online.connected = true;
        let offline = ClientSnapshot::new("carol");

        let snapshot = SystemSnapshot::from_clients(vec![online, offline])
            .with_relay_roster(vec!["alice".into(), "bob".into()]);

        assert!(RosterAgreement.check(&snapshot).is_ok());
    }

    #[test]
    fn roster_disagreement_detected() {
        let mut client = ClientSnapshot::new("alice");
        client.connected = true;

        let snapshot =
            SystemSnapshot::single(client).with_relay_roster(vec!["alice".into(), "bob".into()]);

        assert!(RosterAgreement.check(&snapshot).is_err());
    }
}
