//! Line-oriented user commands.
//!
//! Lines starting with `/` are commands; anything else is a message for the
//! open conversation.

use std::str::FromStr;

use thiserror::Error;

/// Usage text shown by `/help`.
pub const USAGE: &str = "/open <peer> | /msg <peer> <text> | /peers | /help | /quit";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/open <peer>`: request a key exchange and focus the conversation.
    Open {
        /// Peer display name.
        peer: String,
    },
    /// `/msg <peer> <text>`: send to a named peer.
    Msg {
        /// Peer display name.
        peer: String,
        /// Message text.
        text: String,
    },
    /// Plain text for the open conversation.
    Say {
        /// Message text.
        text: String,
    },
    /// `/peers`: list the roster.
    Peers,
    /// `/help`: show usage.
    Help,
    /// `/quit`: leave.
    Quit,
}

/// Input line could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Nothing but whitespace.
    #[error("empty input")]
    Empty,

    /// Unrecognized `/command`.
    #[error("unknown command /{command}; try {USAGE}")]
    UnknownCommand {
        /// Command word without the slash.
        command: String,
    },

    /// Required argument absent.
    #[error("/{command} needs <{argument}>")]
    MissingArgument {
        /// Command word without the slash.
        command: &'static str,
        /// Argument name.
        argument: &'static str,
    },
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Self::Say { text: line.to_string() });
        };

        let (word, args) = split_word(rest);
        match word {
            "open" => {
                let (peer, _) = split_word(args);
                if peer.is_empty() {
                    return Err(CommandError::MissingArgument { command: "open", argument: "peer" });
                }
                Ok(Self::Open { peer: peer.to_string() })
            },
            "msg" => {
                let (peer, text) = split_word(args);
                if peer.is_empty() {
                    return Err(CommandError::MissingArgument { command: "msg", argument: "peer" });
                }
                if text.is_empty() {
                    return Err(CommandError::MissingArgument { command: "msg", argument: "text" });
                }
                Ok(Self::Msg { peer: peer.to_string(), text: text.to_string() })
            },
            "peers" => Ok(Self::Peers),
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::UnknownCommand { command: other.to_string() }),
        }
    }
}

/// First whitespace-delimited word and the trimmed remainder.
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}
