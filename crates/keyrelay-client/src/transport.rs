//! WebSocket transport for the client.
//!
//! Provides [`RelayConnection`] which handles WebSocket I/O and hub framing.
//! This is a thin layer that just sends and receives relay events; protocol
//! logic remains in the Sans-IO [`crate::Client`].
//!
//! The relay is reached directly over WebSocket; there is no HTTP negotiate
//! step, so relays must accept direct WebSocket connections.

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use keyrelay_core::connection::DEFAULT_HANDSHAKE_TIMEOUT;
use keyrelay_proto::{
    FrameBuffer, HandshakeRequest, HandshakeResponse, HubMessage, InboundEvent, OutboundEvent,
};
use thiserror::Error;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

/// Inbound events buffered between the reader task and the caller.
const INBOUND_CHANNEL_SIZE: usize = 64;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection or handshake failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Reading or writing the socket failed.
    #[error("stream error: {0}")]
    Stream(String),

    /// Relay sent something we could not understand.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Live link to the relay.
///
/// Outbound events are written directly so the caller learns whether each
/// send succeeded. Inbound events are decoded by a background task and
/// delivered through [`RelayConnection::recv`].
pub struct RelayConnection {
    sink: SplitSink<Socket, Message>,
    from_relay: mpsc::Receiver<InboundEvent>,
    reader: tokio::task::AbortHandle,
}

impl RelayConnection {
    /// Send one event to the relay.
    pub async fn send(&mut self, event: &OutboundEvent) -> Result<(), TransportError> {
        let invocation =
            event.to_invocation().map_err(|e| TransportError::Protocol(e.to_string()))?;
        self.write(&HubMessage::Invocation(invocation)).await
    }

    /// Send a keepalive so the relay does not time the link out.
    pub async fn ping(&mut self) -> Result<(), TransportError> {
        self.write(&HubMessage::Ping).await
    }

    /// Next event from the relay. `None` once the link is gone.
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.from_relay.recv().await
    }

    /// Next event if one is already buffered.
    ///
    /// `Ok(None)` means nothing is waiting; an error means the link is gone.
    pub fn try_recv(&mut self) -> Result<Option<InboundEvent>, TransportError> {
        match self.from_relay.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(TransportError::Connection("relay link closed".to_string()))
            },
        }
    }

    /// Close the link.
    pub async fn close(mut self) {
        if let Err(error) = self.sink.close().await {
            tracing::debug!(%error, "close handshake failed");
        }
        self.reader.abort();
    }

    async fn write(&mut self, message: &HubMessage) -> Result<(), TransportError> {
        let record = message.encode().map_err(|e| TransportError::Protocol(e.to_string()))?;
        self.sink
            .send(text_message(record)?)
            .await
            .map_err(|e| TransportError::Stream(format!("write failed: {e}")))
    }
}

impl Drop for RelayConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Connect to a relay and complete the hub handshake.
///
/// Returns a [`RelayConnection`] ready for `Init`.
pub async fn connect(url: &str) -> Result<RelayConnection, TransportError> {
    let (socket, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| TransportError::Connection(format!("websocket connect to {url} failed: {e}")))?;

    let (mut sink, mut stream) = socket.split();

    let request =
        HandshakeRequest::default().encode().map_err(|e| TransportError::Protocol(e.to_string()))?;
    sink.send(text_message(request)?)
        .await
        .map_err(|e| TransportError::Connection(format!("handshake send failed: {e}")))?;

    // The handshake reply may share a message with the first events, so the
    // buffer is handed on to the reader.
    let mut buffer = FrameBuffer::new();
    let reply = tokio::time::timeout(DEFAULT_HANDSHAKE_TIMEOUT, read_record(&mut stream, &mut buffer))
        .await
        .map_err(|_| TransportError::Connection("handshake timed out".to_string()))??;

    HandshakeResponse::decode(&reply).map_err(|e| TransportError::Connection(e.to_string()))?;
    tracing::debug!(url, "relay handshake complete");

    let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_SIZE);
    let handle = tokio::spawn(read_loop(stream, buffer, tx));

    Ok(RelayConnection { sink, from_relay: rx, reader: handle.abort_handle() })
}

fn text_message(record: Vec<u8>) -> Result<Message, TransportError> {
    let text = String::from_utf8(record).map_err(|e| TransportError::Protocol(e.to_string()))?;
    Ok(Message::text(text))
}

/// Feed one WebSocket message into the buffer. `false` when the link ended.
fn absorb(buffer: &mut FrameBuffer, message: Message) -> bool {
    match message {
        Message::Text(text) => buffer.push(text.as_str().as_bytes()),
        Message::Binary(data) => buffer.push(&data),
        Message::Close(_) => return false,
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {},
    }
    true
}

async fn read_record(
    stream: &mut SplitStream<Socket>,
    buffer: &mut FrameBuffer,
) -> Result<Vec<u8>, TransportError> {
    loop {
        if let Some(record) = buffer.next_record() {
            return Ok(record);
        }

        match stream.next().await {
            Some(Ok(message)) => {
                if !absorb(buffer, message) {
                    return Err(TransportError::Connection("relay closed during handshake".to_string()));
                }
            },
            Some(Err(e)) => return Err(TransportError::Stream(format!("read failed: {e}"))),
            None => return Err(TransportError::Connection("relay closed during handshake".to_string())),
        }
    }
}

/// Decode relay records until the link ends. Dropping `tx` signals the end
/// to [`RelayConnection::recv`].
async fn read_loop(
    mut stream: SplitStream<Socket>,
    mut buffer: FrameBuffer,
    tx: mpsc::Sender<InboundEvent>,
) {
    loop {
        while let Some(record) = buffer.next_record() {
            match HubMessage::decode(&record) {
                Ok(HubMessage::Invocation(invocation)) => {
                    match InboundEvent::from_invocation(invocation) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        },
                        Err(error) => tracing::warn!(%error, "skipping relay event"),
                    }
                },
                Ok(HubMessage::Close { error, allow_reconnect }) => {
                    tracing::info!(?error, allow_reconnect, "relay closed the connection");
                    return;
                },
                Ok(HubMessage::Ping | HubMessage::Ignored { .. }) => {},
                Err(error) => tracing::warn!(%error, "undecodable relay record"),
            }
        }

        match stream.next().await {
            Some(Ok(message)) => {
                if !absorb(&mut buffer, message) {
                    return;
                }
            },
            Some(Err(error)) => {
                tracing::warn!(%error, "relay read failed");
                return;
            },
            None => return,
        }
    }
}
