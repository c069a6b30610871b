//! Console driver for the command-line node.
//!
//! Implements the [`Driver`] trait with stdin lines for input, a WebSocket
//! hub connection for the relay and plain text lines for output.

use std::{
    io::{self, Write},
    time::{Duration, Instant},
};

use keyrelay_app::{App, AppEvent, Driver};
use keyrelay_client::PeerDirectory;
use keyrelay_client::transport::{self, RelayConnection, TransportError};
use keyrelay_proto::{InboundEvent, OutboundEvent};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

use crate::transcript::Transcript;

/// How long `poll_event` waits for input before reporting a tick.
const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Keepalive period; the relay times out silent links.
const PING_INTERVAL: Duration = Duration::from_secs(15);

const INPUT_CHANNEL_SIZE: usize = 16;

/// Console driver errors.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Writing to the console failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Relay transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No relay link.
    #[error("not connected to relay")]
    NotConnected,
}

/// Console driver implementing the [`Driver`] trait.
pub struct ConsoleDriver {
    lines: mpsc::Receiver<String>,
    connection: Option<RelayConnection>,
    last_ping: Instant,
    transcript: Transcript,
    out: Box<dyn Write + Send>,
}

impl ConsoleDriver {
    /// Driver reading lines from stdin and printing to `out`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(out: impl Write + Send + 'static) -> Self {
        let (tx, rx) = mpsc::channel(INPUT_CHANNEL_SIZE);
        tokio::spawn(read_stdin(tx));
        Self::with_input(rx, out)
    }

    /// Driver reading lines from a channel. The node quits when it closes.
    pub fn with_input(lines: mpsc::Receiver<String>, out: impl Write + Send + 'static) -> Self {
        Self {
            lines,
            connection: None,
            last_ping: Instant::now(),
            transcript: Transcript::new(),
            out: Box::new(out),
        }
    }

    async fn keepalive(&mut self) {
        if self.last_ping.elapsed() < PING_INTERVAL {
            return;
        }
        self.last_ping = Instant::now();

        if let Some(connection) = self.connection.as_mut()
            && let Err(error) = connection.ping().await
        {
            tracing::warn!(%error, "keepalive failed, dropping link");
            self.connection = None;
        }
    }
}

async fn read_stdin(tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).await.is_err() {
                    return;
                }
            },
            Ok(None) => return,
            Err(error) => {
                tracing::warn!(%error, "stdin read failed");
                return;
            },
        }
    }
}

impl Driver for ConsoleDriver {
    type Error = ConsoleError;
    type Instant = Instant;

    async fn poll_event(&mut self) -> Result<Option<AppEvent>, Self::Error> {
        self.keepalive().await;

        tokio::select! {
            biased;

            line = self.lines.recv() => match line {
                Some(line) => Ok(Some(AppEvent::Input(line))),
                // End of input ends the session.
                None => Ok(Some(AppEvent::Input("/quit".to_string()))),
            },

            () = tokio::time::sleep(TICK_INTERVAL) => Ok(Some(AppEvent::Tick)),
        }
    }

    async fn send_event(&mut self, event: &OutboundEvent) -> Result<(), Self::Error> {
        let connection = self.connection.as_mut().ok_or(ConsoleError::NotConnected)?;
        connection.send(event).await?;
        Ok(())
    }

    async fn recv_event(&mut self) -> Option<InboundEvent> {
        let connection = self.connection.as_mut()?;
        match connection.try_recv() {
            Ok(event) => event,
            Err(error) => {
                tracing::info!(%error, "relay link lost");
                self.connection = None;
                None
            },
        }
    }

    async fn connect(&mut self, url: &str) -> Result<(), Self::Error> {
        let connection = transport::connect(url).await?;
        tracing::info!(url, "connected to relay");
        self.connection = Some(connection);
        self.last_ping = Instant::now();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn render(&mut self, app: &App, directory: &PeerDirectory) -> Result<(), Self::Error> {
        for line in self.transcript.update(app, directory) {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn stop(&mut self) {
        // Dropping the link aborts its reader task.
        self.connection = None;
    }
}
