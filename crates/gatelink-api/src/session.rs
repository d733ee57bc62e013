//! Persistent gateway session.
//!
//! One [`GatewaySession`] owns one WebSocket connection to an assigned
//! gateway endpoint. The socket itself lives in a background task; the
//! session consumes its events from a channel inside [`tick`](GatewaySession::tick),
//! so the driving loop never blocks on network I/O. State transitions are
//! driven exclusively by transport events or explicit API calls.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{ClientRequestBuilder, Message};
use tokio_tungstenite::{Connector, connect_async_tls_with_config};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use futures_util::{SinkExt, StreamExt};

use crate::error::Error;
use crate::frame::{self, SessionMessage};
use crate::tls::websocket_connector;
use crate::transport::TlsMode;

/// Keep-alive cadence while connected.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(30_000);

/// Path of the gateway session endpoint on the assigned host.
const SESSION_PATH: &str = "/device-session";

// ── State machine ────────────────────────────────────────────────────

/// Connection state of a gateway session.
///
/// Only `Disconnected` sessions may start connecting, and only
/// `Connected` sessions may start disconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Raw event from the transport task.
#[derive(Debug)]
pub enum TransportEvent {
    /// The WebSocket upgrade completed.
    Connected,
    /// The socket dropped — clean close, error, or failed handshake alike.
    Disconnected,
    /// An inbound text frame.
    Text(String),
    /// An inbound binary frame (unsupported; carries the payload length).
    Binary(usize),
}

/// Decoded event the session hands to its owner after a tick.
#[derive(Debug)]
pub enum SessionEvent {
    /// The session reached `Connected`. Observers should be told `true`.
    Connected,
    /// The session fell back to `Disconnected`. Observers get `false`.
    Disconnected,
    /// A decoded inbound frame ready for dispatch.
    Message(SessionMessage),
}

/// Result of one [`tick`](GatewaySession::tick).
#[derive(Debug)]
pub struct TickOutcome {
    /// `true` while the session holds or is working on a connection.
    /// A non-busy session is idle and eligible for a (re)connect attempt.
    pub busy: bool,
    /// Events drained from the transport this tick, in arrival order.
    pub events: Vec<SessionEvent>,
}

// ── Session ──────────────────────────────────────────────────────────

enum Transport {
    /// `connect()` spawns a real WebSocket task.
    Websocket { tls: TlsMode },
    /// Events are injected externally (tests, custom transports).
    External,
}

/// A single persistent connection to an assigned gateway.
pub struct GatewaySession {
    auth_token: SecretString,
    firmware_version: String,
    state: ConnectionState,
    last_keepalive: Instant,
    transport: Transport,
    event_rx: mpsc::UnboundedReceiver<TransportEvent>,
    outbound_tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl GatewaySession {
    /// Create an idle session. No connection is attempted until
    /// [`connect`](Self::connect) is called with an assigned endpoint.
    pub fn new(
        auth_token: SecretString,
        firmware_version: impl Into<String>,
        tls: TlsMode,
    ) -> Self {
        debug!("creating gateway session");
        // Placeholder channels; connect() wires fresh ones to the task.
        let (_, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, _) = mpsc::unbounded_channel();

        Self {
            auth_token,
            firmware_version: firmware_version.into(),
            state: ConnectionState::Disconnected,
            last_keepalive: Instant::now(),
            transport: Transport::Websocket { tls },
            event_rx,
            outbound_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a session bound to an external transport.
    ///
    /// The caller feeds [`TransportEvent`]s through `event_rx`'s sender and
    /// observes outbound frames on `outbound_tx`'s receiver. `connect()`
    /// performs the state transition but spawns nothing.
    pub fn with_transport(
        auth_token: SecretString,
        firmware_version: impl Into<String>,
        event_rx: mpsc::UnboundedReceiver<TransportEvent>,
        outbound_tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            auth_token,
            firmware_version: firmware_version.into(),
            state: ConnectionState::Disconnected,
            last_keepalive: Instant::now(),
            transport: Transport::External,
            event_rx,
            outbound_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Start connecting to the assigned gateway host.
    ///
    /// No-op unless the session is `Disconnected`.
    pub fn connect(&mut self, fqdn: &str) -> Result<(), Error> {
        if self.state != ConnectionState::Disconnected {
            return Ok(());
        }

        if let Transport::Websocket { tls } = &self.transport {
            let uri: tokio_tungstenite::tungstenite::http::Uri =
                format!("wss://{fqdn}{SESSION_PATH}")
                    .parse()
                    .map_err(|e| Error::WebSocket(format!("invalid gateway host: {e}")))?;

            let request = ClientRequestBuilder::new(uri)
                .with_header("FirmwareVersion", self.firmware_version.clone())
                .with_header("DeviceToken", self.auth_token.expose_secret());

            let connector = websocket_connector(tls)?;

            let (event_tx, event_rx) = mpsc::unbounded_channel();
            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
            let cancel = CancellationToken::new();

            self.event_rx = event_rx;
            self.outbound_tx = outbound_tx;
            self.cancel = cancel.clone();

            tokio::spawn(session_task(request, connector, outbound_rx, event_tx, cancel));
        }

        info!(%fqdn, "connecting to gateway");
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// Begin a graceful disconnect.
    ///
    /// No-op unless the session is `Connected`. The transition to
    /// `Disconnected` completes when the transport reports the close.
    pub fn disconnect(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        self.state = ConnectionState::Disconnecting;
        self.cancel.cancel();
    }

    /// Pump the session once: drain transport events, advance the state
    /// machine, and send a keep-alive when due.
    ///
    /// An idle (`Disconnected`) session returns `busy: false` without
    /// touching the transport; the owner reacts by attempting discovery
    /// and reconnect.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state == ConnectionState::Disconnected {
            return TickOutcome {
                busy: false,
                events: Vec::new(),
            };
        }

        let mut events = Vec::new();

        while let Ok(transport_event) = self.event_rx.try_recv() {
            match transport_event {
                TransportEvent::Connected => {
                    info!("connected to gateway");
                    self.state = ConnectionState::Connected;
                    events.push(SessionEvent::Connected);
                    self.send_keepalive();
                }
                TransportEvent::Disconnected => {
                    info!("disconnected from gateway");
                    self.state = ConnectionState::Disconnected;
                    events.push(SessionEvent::Disconnected);
                }
                TransportEvent::Text(text) => {
                    trace!(len = text.len(), "inbound session frame");
                    if let Some(message) = frame::decode_frame(&text) {
                        events.push(SessionEvent::Message(message));
                    }
                }
                TransportEvent::Binary(len) => {
                    warn!(len, "binary session frames are not supported, dropping");
                }
            }
        }

        if self.state == ConnectionState::Connected
            && self.last_keepalive.elapsed() >= KEEPALIVE_INTERVAL
        {
            self.send_keepalive();
        }

        TickOutcome { busy: true, events }
    }

    fn send_keepalive(&mut self) {
        debug!("sending keep-alive");
        if self.outbound_tx.send(frame::KEEPALIVE_FRAME.to_owned()).is_err() {
            trace!("transport gone, keep-alive dropped");
        }
        self.last_keepalive = Instant::now();
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        debug!("destroying gateway session");
        self.cancel.cancel();
    }
}

// ── Transport task ───────────────────────────────────────────────────

/// Run one WebSocket connection to completion.
///
/// Emits `Connected` once the upgrade succeeds, forwards frames, sends
/// queued outbound text, and always emits a final `Disconnected` — a
/// failed handshake looks the same to the session as a dropped socket.
async fn session_task(
    request: ClientRequestBuilder,
    connector: Option<Connector>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = connect_async_tls_with_config(request, None, false, connector) => {
            match result {
                Ok((ws, _response)) => Some(ws),
                Err(e) => {
                    warn!(error = %e, "gateway connection failed");
                    None
                }
            }
        }
    };

    let Some(ws) = connected else {
        let _ = event_tx.send(TransportEvent::Disconnected);
        return;
    };

    let _ = event_tx.send(TransportEvent::Connected);
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(text) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            warn!(error = %e, "failed to send session frame");
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = read.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let _ = event_tx.send(TransportEvent::Text(text.to_string()));
                    }
                    Some(Ok(Message::Binary(payload))) => {
                        let _ = event_tx.send(TransportEvent::Binary(payload.len()));
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // tungstenite answers pings automatically
                        trace!("websocket ping/pong");
                    }
                    Some(Ok(Message::Close(close_frame))) => {
                        if let Some(ref cf) = close_frame {
                            info!(code = %cf.code, reason = %cf.reason, "gateway sent close frame");
                        } else {
                            info!("gateway sent close frame");
                        }
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket error");
                        break;
                    }
                    None => {
                        info!("websocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    let _ = event_tx.send(TransportEvent::Disconnected);
}

// ── Tests ────────────────────────────────────────────────────────────
