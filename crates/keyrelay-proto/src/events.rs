//! Typed relay events.
//!
//! Each event is a hub invocation: a target name plus positional JSON
//! arguments. Outbound events are addressed to one peer by display name (or,
//! for `Init`, announce our own name). Inbound events carry a single object
//! naming the originating peer in `fromUser`.
//!
//! | Event | Direction | Arguments |
//! |---|---|---|
//! | `Init` | out | `[name]` |
//! | `ListUsers` | in | `[[name, ...]]` |
//! | `StartConversation` | out | `[target]` |
//! | `RequestedPublicKey` | in | `[{fromUser}]` |
//! | `SendPublicKey` | out | `[target, publicKey]` |
//! | `ReceivedPublicKey` | in | `[{fromUser, publicKey}]` |
//! | `SendMessage` | out | `[target, [byte, ...]]` |
//! | `ReceivedMessage` | in | `[{fromUser, message: [byte, ...]}]` |

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    errors::{ProtocolError, Result},
    hub::Invocation,
};

/// Hub target names.
pub mod target {
    /// Announce the local display name.
    pub const INIT: &str = "Init";
    /// Roster push from the relay.
    pub const LIST_USERS: &str = "ListUsers";
    /// Ask the relay to broker a key exchange with a peer.
    pub const START_CONVERSATION: &str = "StartConversation";
    /// A peer wants our public key.
    pub const REQUESTED_PUBLIC_KEY: &str = "RequestedPublicKey";
    /// Deliver our public key to a peer.
    pub const SEND_PUBLIC_KEY: &str = "SendPublicKey";
    /// A peer delivered its public key.
    pub const RECEIVED_PUBLIC_KEY: &str = "ReceivedPublicKey";
    /// Deliver ciphertext to a peer.
    pub const SEND_MESSAGE: &str = "SendMessage";
    /// A peer delivered ciphertext.
    pub const RECEIVED_MESSAGE: &str = "ReceivedMessage";
}

/// Payload of `RequestedPublicKey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRequest {
    /// Peer asking for our key.
    pub from_user: String,
}

/// Payload of `ReceivedPublicKey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyOffer {
    /// Peer that owns the key.
    pub from_user: String,
    /// Portable key text, opaque at this layer.
    pub public_key: String,
}

/// Payload of `ReceivedMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerMessage {
    /// Peer that sent the ciphertext.
    pub from_user: String,
    /// Ciphertext as an ordered sequence of byte values.
    pub message: Vec<u8>,
}

/// Events the relay pushes to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Full roster of connected display names.
    ListUsers(Vec<String>),
    /// A peer requests our public key.
    RequestedPublicKey(KeyRequest),
    /// A peer advertises its public key.
    ReceivedPublicKey(KeyOffer),
    /// A peer sent us ciphertext.
    ReceivedMessage(PeerMessage),
}

impl InboundEvent {
    /// Hub target name for this event.
    pub fn target(&self) -> &'static str {
        match self {
            Self::ListUsers(_) => target::LIST_USERS,
            Self::RequestedPublicKey(_) => target::REQUESTED_PUBLIC_KEY,
            Self::ReceivedPublicKey(_) => target::RECEIVED_PUBLIC_KEY,
            Self::ReceivedMessage(_) => target::RECEIVED_MESSAGE,
        }
    }

    /// Peer the event originates from. `None` for roster pushes.
    pub fn from_user(&self) -> Option<&str> {
        match self {
            Self::ListUsers(_) => None,
            Self::RequestedPublicKey(p) => Some(&p.from_user),
            Self::ReceivedPublicKey(p) => Some(&p.from_user),
            Self::ReceivedMessage(p) => Some(&p.from_user),
        }
    }

    /// Decode from a hub invocation.
    pub fn from_invocation(invocation: Invocation) -> Result<Self> {
        let Invocation { target: name, arguments } = invocation;
        match name.as_str() {
            target::LIST_USERS => {
                let [users] = take_args(target::LIST_USERS, arguments)?;
                Ok(Self::ListUsers(decode_arg(target::LIST_USERS, 0, users)?))
            },
            target::REQUESTED_PUBLIC_KEY => {
                let [request] = take_args(target::REQUESTED_PUBLIC_KEY, arguments)?;
                Ok(Self::RequestedPublicKey(decode_arg(target::REQUESTED_PUBLIC_KEY, 0, request)?))
            },
            target::RECEIVED_PUBLIC_KEY => {
                let [offer] = take_args(target::RECEIVED_PUBLIC_KEY, arguments)?;
                Ok(Self::ReceivedPublicKey(decode_arg(target::RECEIVED_PUBLIC_KEY, 0, offer)?))
            },
            target::RECEIVED_MESSAGE => {
                let [message] = take_args(target::RECEIVED_MESSAGE, arguments)?;
                Ok(Self::ReceivedMessage(decode_arg(target::RECEIVED_MESSAGE, 0, message)?))
            },
            _ => Err(ProtocolError::UnknownTarget(name)),
        }
    }

    /// Encode as a hub invocation (relay side of the contract).
    pub fn to_invocation(&self) -> Result<Invocation> {
        let argument = match self {
            Self::ListUsers(users) => serde_json::to_value(users)?,
            Self::RequestedPublicKey(p) => serde_json::to_value(p)?,
            Self::ReceivedPublicKey(p) => serde_json::to_value(p)?,
            Self::ReceivedMessage(p) => serde_json::to_value(p)?,
        };
        Ok(Invocation::new(self.target(), vec![argument]))
    }
}

/// Events a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// Announce our display name. Sent after every (re)connect.
    Init {
        /// Local display name.
        name: String,
    },
    /// Ask the relay to broker a key exchange with `target`.
    StartConversation {
        /// Peer display name.
        target: String,
    },
    /// Deliver our portable public key to `target`.
    SendPublicKey {
        /// Peer display name.
        target: String,
        /// Portable key text.
        public_key: String,
    },
    /// Deliver ciphertext to `target`.
    SendMessage {
        /// Peer display name.
        target: String,
        /// Envelope bytes.
        ciphertext: Vec<u8>,
    },
}

impl OutboundEvent {
    /// Hub target name for this event.
    pub fn target(&self) -> &'static str {
        match self {
            Self::Init { .. } => target::INIT,
            Self::StartConversation { .. } => target::START_CONVERSATION,
            Self::SendPublicKey { .. } => target::SEND_PUBLIC_KEY,
            Self::SendMessage { .. } => target::SEND_MESSAGE,
        }
    }

    /// Peer this event is addressed to. `None` for `Init`.
    pub fn recipient(&self) -> Option<&str> {
        match self {
            Self::Init { .. } => None,
            Self::StartConversation { target }
            | Self::SendPublicKey { target, .. }
            | Self::SendMessage { target, .. } => Some(target),
        }
    }

    /// Encode as a hub invocation.
    pub fn to_invocation(&self) -> Result<Invocation> {
        let arguments = match self {
            Self::Init { name } => vec![Value::from(name.as_str())],
            Self::StartConversation { target } => vec![Value::from(target.as_str())],
            Self::SendPublicKey { target, public_key } => {
                vec![Value::from(target.as_str()), Value::from(public_key.as_str())]
            },
            Self::SendMessage { target, ciphertext } => {
                vec![Value::from(target.as_str()), serde_json::to_value(ciphertext)?]
            },
        };
        Ok(Invocation::new(self.target(), arguments))
    }

    /// Decode from a hub invocation (relay side of the contract).
    pub fn from_invocation(invocation: Invocation) -> Result<Self> {
        let Invocation { target: name, arguments } = invocation;
        match name.as_str() {
            target::INIT => {
                let [name] = take_args(target::INIT, arguments)?;
                Ok(Self::Init { name: decode_arg(target::INIT, 0, name)? })
            },
            target::START_CONVERSATION => {
                let [peer] = take_args(target::START_CONVERSATION, arguments)?;
                Ok(Self::StartConversation {
                    target: decode_arg(target::START_CONVERSATION, 0, peer)?,
                })
            },
            target::SEND_PUBLIC_KEY => {
                let [peer, key] = take_args(target::SEND_PUBLIC_KEY, arguments)?;
                Ok(Self::SendPublicKey {
                    target: decode_arg(target::SEND_PUBLIC_KEY, 0, peer)?,
                    public_key: decode_arg(target::SEND_PUBLIC_KEY, 1, key)?,
                })
            },
            target::SEND_MESSAGE => {
                let [peer, bytes] = take_args(target::SEND_MESSAGE, arguments)?;
                Ok(Self::SendMessage {
                    target: decode_arg(target::SEND_MESSAGE, 0, peer)?,
                    ciphertext: decode_arg(target::SEND_MESSAGE, 1, bytes)?,
                })
            },
            _ => Err(ProtocolError::UnknownTarget(name)),
        }
    }
}

fn take_args<const N: usize>(target: &'static str, arguments: Vec<Value>) -> Result<[Value; N]> {
    <[Value; N]>::try_from(arguments).map_err(|rest| ProtocolError::ArgumentCount {
        target,
        expected: N,
        actual: rest.len(),
    })
}

fn decode_arg<T: DeserializeOwned>(target: &'static str, index: usize, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidArgument {
        target,
        index,
        reason: e.to_string(),
    })
}
