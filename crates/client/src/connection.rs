//! Session Connection: the persistent, authenticated WebSocket channel.
//!
//! This module implements the channel with:
//! - A bounded readiness poll while the handshake runs in the background
//! - A writer task encoding outbound envelopes as binary MessagePack frames
//! - A reader task decoding inbound frames into typed [`InboundEvent`]s
//! - Terminal failure: any transport error, close, or undecodable frame
//!   moves the state to `Failed` and emits exactly one
//!   [`InboundEvent::Failed`]. There is no reconnection.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use protocol::http::{AUTH_TOKEN_QUERY, CHANNEL_PATH};
use protocol::messages::ListDirectoryResponse;
use protocol::{Envelope, Message};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use url::Url;

use crate::config::ClientConfig;
use crate::credential::Credential;
use crate::error::{ClientError, ClientResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `close` waits for the close frame to be flushed.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle of one channel. `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,
    /// Ready for traffic.
    Open,
    /// The channel is gone.
    Failed,
}

/// Typed event decoded from the channel.
#[derive(Debug)]
pub enum InboundEvent {
    /// Reply to a `ListDirectory` request.
    Listing {
        sequence: u64,
        response: ListDirectoryResponse,
    },
    /// Error not tied to a request.
    GeneralError { sequence: u64, code: i64 },
    /// The channel failed. Always the last event.
    Failed(ClientError),
}

/// Port through which navigation requests leave the client.
pub trait EnvelopeSink {
    /// Queue an envelope for sending. Never waits for a reply.
    fn dispatch(&self, envelope: Envelope) -> ClientResult<()>;
}

enum Outbound {
    Envelope(Envelope),
    Close,
}

/// Cloneable sending side of a [`Connection`].
#[derive(Clone)]
pub struct ConnectionHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
    state: Arc<RwLock<ConnectionState>>,
}

impl ConnectionHandle {
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Ask the writer to send a close frame and stop.
    pub fn shutdown(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }

    /// Mark the channel `Failed` now, then shut it down.
    ///
    /// No `InboundEvent::Failed` follows; the caller already knows.
    pub async fn abandon(&self) {
        *self.state.write().await = ConnectionState::Failed;
        self.shutdown();
    }
}

impl EnvelopeSink for ConnectionHandle {
    fn dispatch(&self, envelope: Envelope) -> ClientResult<()> {
        if let Ok(state) = self.state.try_read() {
            if *state == ConnectionState::Failed {
                return Err(ClientError::ConnectionClosed);
            }
        }
        self.outbound
            .send(Outbound::Envelope(envelope))
            .map_err(|_| ClientError::ConnectionClosed)
    }
}

/// An open channel and its supervisor tasks.
pub struct Connection {
    handle: ConnectionHandle,
    events: mpsc::UnboundedReceiver<InboundEvent>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

/// Channel URL for a server: `ws(s)://host/ws?auth_token=<token>`.
pub fn channel_url(server: &Url, token: &str) -> ClientResult<Url> {
    let mut url = server.clone();
    let scheme = match server.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(ClientError::Validation(format!(
                "unsupported server scheme: {}",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::Validation(format!("cannot derive channel url from {}", server)))?;
    url.set_path(CHANNEL_PATH);
    url.set_fragment(None);
    url.query_pairs_mut()
        .clear()
        .append_pair(AUTH_TOKEN_QUERY, token);
    Ok(url)
}

/// Decode one binary frame.
pub fn decode_frame(bytes: &[u8]) -> ClientResult<InboundEvent> {
    let envelope = Envelope::from_msgpack(bytes)?;
    match envelope.payload {
        Message::ListDirectoryResponse(response) => Ok(InboundEvent::Listing {
            sequence: envelope.sequence,
            response,
        }),
        Message::GeneralError(error) => Ok(InboundEvent::GeneralError {
            sequence: envelope.sequence,
            code: error.error_code,
        }),
        other => Err(ClientError::Protocol(format!(
            "unexpected message from server: {}",
            other.kind()
        ))),
    }
}

/// Move to `Failed` and emit the failure, once.
async fn fail(
    state: &RwLock<ConnectionState>,
    events: &mpsc::UnboundedSender<InboundEvent>,
    error: ClientError,
) {
    {
        let mut guard = state.write().await;
        if *guard == ConnectionState::Failed {
            return;
        }
        *guard = ConnectionState::Failed;
    }
    tracing::warn!(error = %error, "channel failed");
    let _ = events.send(InboundEvent::Failed(error));
}

impl Connection {
    /// Open the channel authenticated with `credential`.
    ///
    /// Readiness is polled `connect_attempts` times, one poll interval
    /// apart. If the handshake has not completed by the last poll it is
    /// aborted and the open fails with `ConnectTimeout`.
    pub async fn open(config: &ClientConfig, credential: &Credential) -> ClientResult<Self> {
        let url = channel_url(&config.server_url()?, credential.token())?;
        let attempts = config.connection.connect_attempts;
        let interval = config.connection.poll_interval();
        let state = Arc::new(RwLock::new(ConnectionState::Connecting));

        tracing::info!(server = %config.server.url, "opening channel");
        let mut handshake = tokio::spawn(connect_async(url.to_string()));

        for attempt in 1..=attempts {
            tokio::time::sleep(interval).await;
            if !handshake.is_finished() {
                tracing::debug!(attempt, attempts, "channel not ready");
                continue;
            }

            let outcome = (&mut handshake)
                .await
                .map_err(|e| ClientError::Network(format!("handshake task failed: {}", e)))?;
            return match outcome {
                Ok((stream, _response)) => {
                    tracing::info!(attempt, "channel open");
                    Ok(Self::start(stream, state).await)
                }
                Err(e) => {
                    *state.write().await = ConnectionState::Failed;
                    tracing::warn!(error = %e, "channel handshake failed");
                    Err(ClientError::Network(e.to_string()))
                }
            };
        }

        handshake.abort();
        *state.write().await = ConnectionState::Failed;
        tracing::warn!(attempts, "channel not open after last poll");
        Err(ClientError::ConnectTimeout { attempts })
    }

    async fn start(stream: WsStream, state: Arc<RwLock<ConnectionState>>) -> Self {
        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<InboundEvent>();

        *state.write().await = ConnectionState::Open;

        let writer_state = state.clone();
        let writer_events = event_tx.clone();
        let writer = tokio::spawn(async move {
            while let Some(item) = outbound_rx.recv().await {
                match item {
                    Outbound::Envelope(envelope) => {
                        let bytes = match envelope.to_msgpack() {
                            Ok(bytes) => bytes,
                            Err(e) => {
                                tracing::error!(error = %e, "failed to encode envelope");
                                continue;
                            }
                        };
                        tracing::debug!(
                            sequence = envelope.sequence,
                            kind = envelope.payload.kind(),
                            "sending"
                        );
                        if let Err(e) = sink.send(WsMessage::Binary(bytes)).await {
                            fail(&writer_state, &writer_events, ClientError::from(e)).await;
                            break;
                        }
                    }
                    Outbound::Close => {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        let _ = sink.close().await;
                        break;
                    }
                }
            }
        });

        let reader_state = state.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(WsMessage::Binary(bytes)) => match decode_frame(&bytes) {
                        Ok(event) => {
                            tracing::debug!(?event, "received");
                            if event_tx.send(event).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            fail(&reader_state, &event_tx, e).await;
                            return;
                        }
                    },
                    Ok(WsMessage::Text(text)) => {
                        let error = ClientError::Protocol(format!(
                            "text frame on binary channel ({} bytes)",
                            text.len()
                        ));
                        fail(&reader_state, &event_tx, error).await;
                        return;
                    }
                    Ok(WsMessage::Close(_)) => {
                        fail(&reader_state, &event_tx, ClientError::ConnectionClosed).await;
                        return;
                    }
                    Ok(_) => {
                        // ping/pong are answered by tungstenite
                    }
                    Err(e) => {
                        fail(&reader_state, &event_tx, ClientError::from(e)).await;
                        return;
                    }
                }
            }
            fail(&reader_state, &event_tx, ClientError::ConnectionClosed).await;
        });

        Self {
            handle: ConnectionHandle {
                outbound: outbound_tx,
                state,
            },
            events: event_rx,
            writer,
            reader,
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.handle.state().await
    }

    /// A cloneable sender for this channel.
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// Next inbound event. `None` once the channel is gone and drained.
    pub async fn next_event(&mut self) -> Option<InboundEvent> {
        self.events.recv().await
    }

    /// Send a close frame and stop both tasks.
    pub async fn close(mut self) {
        tracing::info!("closing channel");
        self.handle.shutdown();
        if tokio::time::timeout(CLOSE_GRACE, &mut self.writer).await.is_err() {
            tracing::debug!("close frame not flushed in time");
        }
        self.reader.abort();
        self.writer.abort();
        *self.handle.state.write().await = ConnectionState::Failed;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
