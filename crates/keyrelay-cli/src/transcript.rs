//! Line-oriented rendering of the application state.
//!
//! The console has no screen to redraw, so each render prints only what
//! changed since the last one: a new status line and any messages that
//! arrived or were sent.

use std::collections::BTreeMap;

use keyrelay_app::App;
use keyrelay_client::{Direction, PeerDirectory};

/// Tracks what has already been printed.
#[derive(Debug, Default)]
pub struct Transcript {
    status: Option<String>,
    /// Messages printed per peer.
    printed: BTreeMap<String, usize>,
}

impl Transcript {
    /// Empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines to print for the changes since the previous call. Status comes
    /// from the App, conversations from the directory.
    pub fn update(&mut self, app: &App, directory: &PeerDirectory) -> Vec<String> {
        let mut lines = Vec::new();

        let status = app.status_message().map(str::to_string);
        if status != self.status {
            if let Some(text) = &status {
                lines.push(format!("* {text}"));
            }
            self.status = status;
        }

        self.printed.retain(|name, _| directory.contains(name));
        for peer in directory.peers() {
            let name = peer.name();
            let history = peer.history();
            let printed = self.printed.entry(name.to_string()).or_default();
            // The peer left and came back with a fresh conversation.
            if history.len() < *printed {
                *printed = 0;
            }
            for message in &history[*printed..] {
                let arrow = match message.direction {
                    Direction::Inbound => '<',
                    Direction::Outbound => '>',
                };
                lines.push(format!("[{name}] {arrow} {}", message.text));
            }
            *printed = history.len();
        }

        lines
    }
}
