//! WebSocket connection manager.
//!
//! Owns the socket for one chat session. A single actor task holds
//! both halves of the stream: outbound frames arrive as commands (with
//! a oneshot reply so the dispatcher can observe transmission
//! failures), inbound traffic is published as [`ConnectionEvent`]s in
//! arrival order on one channel. The connection is opened exactly once,
//! with no retry or backoff: a dropped connection ends the ability to
//! send and the transcript stays readable.

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use tracing::{debug, warn};

use crate::error::ClientError;

/// Lifecycle of the one socket per session. Owned by the connection
/// actor; everyone else reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    /// Peer closed cleanly (or we shut down). Terminal.
    Closed,
    /// The socket died with an error. Terminal.
    Failed,
}

/// What the connection publishes to the session loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Opened,
    /// One raw inbound text frame, delivered strictly in arrival order.
    Frame(String),
    Errored(String),
    Closed,
}

enum ConnectionCommand {
    Transmit {
        text: String,
        respond_to: oneshot::Sender<Result<()>>,
    },
}

/// Handle to the connection actor.
#[derive(Clone)]
pub struct ChatConnection {
    sender: mpsc::Sender<ConnectionCommand>,
    state: Arc<RwLock<ConnectionState>>,
}

/// Buffered inbound frames before the reader starts applying
/// backpressure to the socket.
const EVENT_CHANNEL_CAPACITY: usize = 256;

impl ChatConnection {
    /// Connect to the chat endpoint and start the connection actor.
    /// This is attempted once, on construction.
    pub async fn open(url: &str) -> Result<(Self, mpsc::Receiver<ConnectionEvent>), ClientError> {
        let state = Arc::new(RwLock::new(ConnectionState::Connecting));

        let (ws_stream, _) = match tokio_tungstenite::connect_async(url).await {
            Ok(ok) => ok,
            Err(err) => {
                *state.write().await = ConnectionState::Failed;
                return Err(ClientError::from_tungstenite(err));
            }
        };
        *state.write().await = ConnectionState::Open;
        debug!(%url, "connected to chat server");

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let _ = event_tx.send(ConnectionEvent::Opened).await;
        tokio::spawn(run_connection(
            ws_stream,
            cmd_rx,
            event_tx,
            Arc::clone(&state),
        ));

        Ok((
            Self {
                sender: cmd_tx,
                state,
            },
            event_rx,
        ))
    }

    /// Current lifecycle state, for send-gating and status display.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Put one serialized frame on the wire. Resolves once the sink
    /// has accepted (or refused) the frame, so callers can report
    /// delivery failure.
    pub async fn transmit(&self, text: String) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ConnectionCommand::Transmit {
                text,
                respond_to: tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("connection is gone"))?;
        rx.await
            .map_err(|_| anyhow::anyhow!("connection dropped mid-send"))?
    }
}

async fn run_connection(
    ws_stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    mut cmd_rx: mpsc::Receiver<ConnectionCommand>,
    events: mpsc::Sender<ConnectionEvent>,
    state: Arc<RwLock<ConnectionState>>,
) {
    let (mut ws_write, mut ws_read) = ws_stream.split();
    let mut failed = false;

    loop {
        tokio::select! {
            Some(cmd) = cmd_rx.recv() => match cmd {
                ConnectionCommand::Transmit { text, respond_to } => {
                    let result = ws_write
                        .send(tungstenite::Message::Text(text.into()))
                        .await
                        .map_err(anyhow::Error::from);
                    let _ = respond_to.send(result);
                }
            },

            msg = ws_read.next() => match msg {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    if events.send(ConnectionEvent::Frame(text.to_string())).await.is_err() {
                        // Session is gone, nothing left to deliver to.
                        break;
                    }
                }
                Some(Ok(tungstenite::Message::Close(_))) | None => {
                    break;
                }
                Some(Ok(other)) => {
                    // Ping/pong handled by tungstenite; anything else is noise.
                    debug!(?other, "ignoring non-text frame");
                }
                Some(Err(err)) => {
                    warn!(%err, "websocket read error");
                    let _ = events.send(ConnectionEvent::Errored(err.to_string())).await;
                    failed = true;
                    break;
                }
            },
        }
    }

    *state.write().await = if failed {
        ConnectionState::Failed
    } else {
        ConnectionState::Closed
    };
    let _ = events.send(ConnectionEvent::Closed).await;
    debug!("connection actor exiting");
}
