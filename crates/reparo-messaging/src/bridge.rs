//! # WebSocket Bridge Transport
//!
//! The messaging network's client library runs in a sidecar process. This
//! module is the [`Transport`] that talks to it.
//!
//! ## Tasks
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  BridgeTransport (held by the session)                                  │
//! │    send_text / logout                                                   │
//! │      │  1. register oneshot under requestId in `pending`                │
//! │      │  2. push frame onto `outgoing_tx`                                │
//! │      │  3. await Ack (request_timeout)                                  │
//! │      ▼                                                                  │
//! │  connection loop (one task per socket)                                  │
//! │    ├── outgoing frame   → socket                                        │
//! │    ├── Ack              → resolve pending[requestId]                    │
//! │    ├── ConnectionUpdate → TransportEvent::Connection                    │
//! │    ├── CredentialsUpdate→ TransportEvent::Credentials                   │
//! │    ├── ping tick        → Ping                                          │
//! │    └── socket gone      → fail all pending, emit ConnectionLost         │
//! │                                                                         │
//! │  Dropping the last BridgeTransport closes the socket.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use reparo_core::Address;

use crate::config::BridgeSettings;
use crate::error::{MessagingError, MessagingResult};
use crate::protocol::{blob_to_credentials, credentials_to_blob, AckPayload, BridgeMessage};
use crate::transport::{
    CloseReason, ConnectionUpdate, CredentialBlob, Transport, TransportConnection,
    TransportEvent, TransportFactory,
};

const CHANNEL_CAPACITY: usize = 64;

type PendingAcks = Arc<Mutex<HashMap<Uuid, oneshot::Sender<AckPayload>>>>;

// =============================================================================
// Bridge Configuration
// =============================================================================

/// Settings for one bridge connection.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// WebSocket URL of the bridge.
    pub url: String,

    /// Handshake timeout.
    pub connect_timeout: Duration,

    /// How long a request waits for its Ack.
    pub request_timeout: Duration,

    /// Keepalive ping interval.
    pub ping_interval: Duration,
}

impl From<&BridgeSettings> for BridgeConfig {
    fn from(settings: &BridgeSettings) -> Self {
        BridgeConfig {
            url: settings.url.clone(),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            ping_interval: Duration::from_secs(settings.ping_interval_secs),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig::from(&BridgeSettings::default())
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Opens [`BridgeTransport`]s.
#[derive(Debug, Clone)]
pub struct BridgeTransportFactory {
    config: BridgeConfig,
}

impl BridgeTransportFactory {
    pub fn new(config: BridgeConfig) -> Self {
        BridgeTransportFactory { config }
    }
}

#[async_trait]
impl TransportFactory for BridgeTransportFactory {
    async fn connect(
        &self,
        credentials: Option<CredentialBlob>,
    ) -> MessagingResult<TransportConnection> {
        info!(url = %self.config.url, resuming = credentials.is_some(), "Connecting to bridge");

        let ws_stream = match timeout(
            self.config.connect_timeout,
            connect_async(self.config.url.as_str()),
        )
        .await
        {
            Ok(Ok((ws_stream, response))) => {
                debug!(status = ?response.status(), "WebSocket handshake complete");
                ws_stream
            }
            Ok(Err(e)) => return Err(MessagingError::from(e)),
            Err(_) => {
                return Err(MessagingError::Timeout(
                    self.config.connect_timeout.as_secs(),
                ))
            }
        };

        let (mut write, read) = ws_stream.split();

        // Unreadable credentials mean a fresh pairing, not a failed connect
        let resume = credentials.as_ref().and_then(|blob| match blob_to_credentials(blob) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "Stored credentials unreadable, starting fresh pairing");
                None
            }
        });
        let frame = BridgeMessage::resume(resume).to_json()?;
        write.send(WsMessage::Text(frame.into())).await?;

        let (outgoing_tx, outgoing_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let pending: PendingAcks = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(connection_loop(
            write,
            read,
            outgoing_rx,
            event_tx,
            pending.clone(),
            self.config.ping_interval,
        ));

        let transport = BridgeTransport {
            outgoing_tx,
            pending,
            request_timeout: self.config.request_timeout,
        };

        Ok(TransportConnection {
            transport: Arc::new(transport),
            events: event_rx,
        })
    }
}

// =============================================================================
// Transport
// =============================================================================

/// A live bridge connection.
pub struct BridgeTransport {
    outgoing_tx: mpsc::Sender<BridgeMessage>,
    pending: PendingAcks,
    request_timeout: Duration,
}

impl BridgeTransport {
    /// Sends a frame and waits for its Ack.
    async fn request(&self, request_id: Uuid, frame: BridgeMessage) -> MessagingResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id, ack_tx);

        if self.outgoing_tx.send(frame).await.is_err() {
            self.pending.lock().await.remove(&request_id);
            return Err(MessagingError::Disconnected);
        }

        match timeout(self.request_timeout, ack_rx).await {
            Ok(Ok(ack)) if ack.ok => Ok(()),
            Ok(Ok(ack)) => Err(MessagingError::SendRejected(
                ack.error.unwrap_or_else(|| "rejected by bridge".to_string()),
            )),
            // Connection loop dropped the sender
            Ok(Err(_)) => Err(MessagingError::Disconnected),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                Err(MessagingError::Timeout(self.request_timeout.as_secs()))
            }
        }
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    async fn send_text(&self, to: &Address, text: &str) -> MessagingResult<()> {
        let request_id = Uuid::new_v4();
        debug!(%request_id, to = %to, "Sending text");
        self.request(request_id, BridgeMessage::send_text(request_id, to.as_str(), text))
            .await
    }

    async fn logout(&self) -> MessagingResult<()> {
        let request_id = Uuid::new_v4();
        info!(%request_id, "Requesting logout");
        self.request(request_id, BridgeMessage::logout(request_id)).await
    }
}

// =============================================================================
// Connection Loop
// =============================================================================

async fn connection_loop<W, R>(
    mut write: W,
    mut read: R,
    mut outgoing_rx: mpsc::Receiver<BridgeMessage>,
    event_tx: mpsc::Sender<TransportEvent>,
    pending: PendingAcks,
    ping_interval: Duration,
) where
    W: futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    R: Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let mut ping = tokio::time::interval(ping_interval);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick fires immediately
    ping.tick().await;

    let mut close_forwarded = false;

    loop {
        tokio::select! {
            outgoing = outgoing_rx.recv() => {
                let Some(msg) = outgoing else {
                    debug!("Transport dropped, closing bridge socket");
                    let _ = write.send(WsMessage::Close(None)).await;
                    // Nobody is listening for a close anymore
                    close_forwarded = true;
                    break;
                };

                let json = match msg.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        error!(?e, "Failed to serialize frame");
                        continue;
                    }
                };
                debug!(msg_type = %msg.type_name(), "Sending frame");
                if let Err(e) = write.send(WsMessage::Text(json.into())).await {
                    warn!(error = %e, "Bridge write failed");
                    break;
                }
            }

            incoming = read.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        let msg = match BridgeMessage::from_json(&text) {
                            Ok(msg) => msg,
                            Err(e) => {
                                warn!(?e, "Failed to parse bridge frame");
                                continue;
                            }
                        };
                        debug!(msg_type = %msg.type_name(), "Received frame");

                        match msg {
                            BridgeMessage::Ack(ack) => {
                                match pending.lock().await.remove(&ack.request_id) {
                                    Some(waiter) => {
                                        let _ = waiter.send(ack);
                                    }
                                    None => debug!(request_id = %ack.request_id, "Ack for unknown request"),
                                }
                            }
                            BridgeMessage::ConnectionUpdate(payload) => {
                                let update = ConnectionUpdate::from(payload);
                                let is_close = update.closed.is_some();
                                if event_tx.send(TransportEvent::Connection(update)).await.is_err() {
                                    debug!("Event receiver dropped");
                                }
                                if is_close {
                                    close_forwarded = true;
                                    break;
                                }
                            }
                            BridgeMessage::CredentialsUpdate(payload) => {
                                match credentials_to_blob(&payload.credentials) {
                                    Ok(blob) => {
                                        let _ = event_tx.send(TransportEvent::Credentials(blob)).await;
                                    }
                                    Err(e) => warn!(error = %e, "Failed to encode credentials"),
                                }
                            }
                            other => {
                                warn!(msg_type = %other.type_name(), "Unexpected frame from bridge");
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        if write.send(WsMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        debug!("Received pong");
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(?frame, "Bridge closed the socket");
                        break;
                    }
                    Some(Ok(WsMessage::Binary(_))) => {
                        warn!("Received unexpected binary frame");
                    }
                    Some(Ok(WsMessage::Frame(_))) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "Bridge socket error");
                        break;
                    }
                    None => {
                        info!("Bridge socket ended");
                        break;
                    }
                }
            }

            _ = ping.tick() => {
                if write.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                debug!("Sent ping");
            }
        }
    }

    // Dropping the senders fails every waiting request with Disconnected
    pending.lock().await.clear();

    if !close_forwarded {
        let update = ConnectionUpdate::closed(CloseReason::ConnectionLost);
        let _ = event_tx.send(TransportEvent::Connection(update)).await;
    }

    debug!("Bridge connection loop stopped");
}

// =============================================================================
// Unit Tests
// =============================================================================
