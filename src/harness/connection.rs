//! WebSocket connection attempts against the chat gateway.
//!
//! One [`GatewayConnection`] wraps exactly one transport connection. There
//! is no implicit reconnection: a reconnect is a new attempt with its own
//! timestamp, duration and state tracker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use url::Url;

use crate::auth::Session;
use crate::config::{HarnessConfig, TokenPlacement};
use crate::error::{Error, Result};
use crate::harness::state::AttemptState;
use crate::protocol::{Action, Event};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Open a connection attempt for a session.
///
/// The bearer token travels as a query parameter or `Authorization` header
/// per [`HarnessConfig::token_placement`]. The whole attempt, handshake
/// included, is bounded by the configured connect timeout. The inbound
/// reader is installed before this returns, so no early server push can be
/// lost to a listener race.
///
/// # Errors
///
/// - [`Error::MissingToken`] for sessions without a bearer token
/// - [`Error::ConnectTimeout`] when the hard bound elapses
/// - [`Error::HandshakeRejected`] for non-101 upgrade responses
/// - [`Error::Transport`] for refused/reset connections
///
/// Failed attempts are never retried here; reconnection scenarios start a
/// fresh attempt themselves.
pub async fn connect(config: &HarnessConfig, session: &Session) -> Result<GatewayConnection> {
    if !session.is_usable() {
        return Err(Error::MissingToken);
    }

    let request = upgrade_request(&config.ws_url, session, config.token_placement)?;
    let mut state = AttemptState::Connecting;
    debug!(state = %state, url = %config.ws_url, "opening gateway connection");
    let started_at = Instant::now();

    let (stream, response) = match timeout(config.timeouts.connect, connect_async(request)).await {
        Ok(Ok(pair)) => pair,
        Ok(Err(err)) => {
            state = AttemptState::Disconnected;
            debug!(state = %state, "connect attempt failed");
            return Err(err.into());
        }
        Err(_) => {
            state = AttemptState::Disconnected;
            debug!(state = %state, "connect attempt timed out");
            return Err(Error::ConnectTimeout(config.timeouts.connect));
        }
    };

    let status = response.status().as_u16();
    if status != 101 {
        return Err(Error::HandshakeRejected(status));
    }

    let connect_duration = started_at.elapsed();
    state = AttemptState::Connected;
    debug!(
        state = %state,
        connect_ms = connect_duration.as_millis() as u64,
        "gateway connection established"
    );

    let (sink, source) = stream.split();
    let (event_tx, events) = mpsc::unbounded_channel();
    let failed = Arc::new(AtomicBool::new(false));
    let parse_failures = Arc::new(AtomicU64::new(0));
    let frames_received = Arc::new(AtomicU64::new(0));
    let reader = spawn_reader(
        source,
        event_tx,
        failed.clone(),
        parse_failures.clone(),
        frames_received.clone(),
    );

    Ok(GatewayConnection {
        sink,
        events,
        state,
        established_at: started_at,
        connect_duration,
        failed,
        parse_failures,
        frames_received,
        actions_sent: 0,
        reader,
    })
}

fn upgrade_request(
    ws_url: &Url,
    session: &Session,
    placement: TokenPlacement,
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request> {
    match placement {
        TokenPlacement::QueryParam => {
            let mut url = ws_url.clone();
            url.query_pairs_mut().append_pair("token", &session.token);
            Ok(url.as_str().into_client_request()?)
        }
        TokenPlacement::Header => {
            let mut request = ws_url.as_str().into_client_request()?;
            let bearer =
                HeaderValue::from_str(&session.bearer()).map_err(|e| Error::Http(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, bearer);
            Ok(request)
        }
    }
}

fn spawn_reader(
    mut source: WsSource,
    event_tx: mpsc::UnboundedSender<Event>,
    failed: Arc<AtomicBool>,
    parse_failures: Arc<AtomicU64>,
    frames_received: Arc<AtomicU64>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(next) = source.next().await {
            match next {
                Ok(WsMessage::Text(text)) => {
                    frames_received.fetch_add(1, Ordering::Relaxed);
                    match Event::parse(text.as_str()) {
                        Ok(event) => {
                            if event_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            parse_failures.fetch_add(1, Ordering::Relaxed);
                            let raw: String = text.as_str().chars().take(100).collect();
                            warn!(error = %err, raw, "skipping unparseable frame");
                        }
                    }
                }
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "transport error while reading");
                    failed.store(true, Ordering::Relaxed);
                    break;
                }
            }
        }
    })
}

/// One WebSocket connection attempt tied to a session.
pub struct GatewayConnection {
    sink: WsSink,
    events: mpsc::UnboundedReceiver<Event>,
    state: AttemptState,
    established_at: Instant,
    connect_duration: Duration,
    failed: Arc<AtomicBool>,
    parse_failures: Arc<AtomicU64>,
    frames_received: Arc<AtomicU64>,
    actions_sent: u64,
    reader: JoinHandle<()>,
}

impl GatewayConnection {
    /// Current lifecycle state, reflecting transport errors observed by the
    /// reader.
    #[must_use]
    pub fn state(&self) -> AttemptState {
        if self.failed.load(Ordering::Relaxed) {
            AttemptState::Disconnected
        } else {
            self.state
        }
    }

    /// Check whether the handshake completed for this attempt.
    #[must_use]
    pub fn is_established(&self) -> bool {
        self.state.is_established()
    }

    /// Check whether a transport error has marked this attempt failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    /// When this attempt started connecting.
    #[must_use]
    pub fn established_at(&self) -> Instant {
        self.established_at
    }

    /// Wall-clock time from connect call to handshake completion.
    #[must_use]
    pub fn connect_duration(&self) -> Duration {
        self.connect_duration
    }

    /// Number of actions actually written to the transport.
    #[must_use]
    pub fn actions_sent(&self) -> u64 {
        self.actions_sent
    }

    /// Number of inbound frames that failed to parse and were skipped.
    #[must_use]
    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }

    /// Number of text frames received, parseable or not.
    #[must_use]
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    /// Send one action as a single text frame.
    ///
    /// Returns `Ok(true)` when the frame was written. After a transport
    /// error the connection is failed and sends become no-ops returning
    /// `Ok(false)` rather than errors.
    ///
    /// # Errors
    ///
    /// Only [`Error::Serialize`](crate::Error::Serialize) when the action
    /// cannot be encoded.
    pub async fn send_action(&mut self, action: &Action) -> Result<bool> {
        if self.is_failed() || !self.state.can_send() {
            debug!(action = action.tag(), "dropping send on failed connection");
            return Ok(false);
        }
        let frame = action.to_frame()?;
        match self.sink.send(WsMessage::text(frame)).await {
            Ok(()) => {
                self.actions_sent += 1;
                Ok(true)
            }
            Err(err) => {
                warn!(action = action.tag(), error = %err, "transport error while sending");
                self.failed.store(true, Ordering::Relaxed);
                Ok(false)
            }
        }
    }

    /// Wait up to `wait` for the next inbound event.
    ///
    /// Returns `None` on timeout or once the connection stops delivering.
    pub async fn next_event(&mut self, wait: Duration) -> Option<Event> {
        match timeout(wait, self.events.recv()).await {
            Ok(event) => event,
            Err(_) => None,
        }
    }

    /// Take an already-delivered event without waiting.
    pub fn try_event(&mut self) -> Option<Event> {
        self.events.try_recv().ok()
    }

    /// Close the attempt: send a close frame (best effort) and stop the
    /// reader. The attempt ends `Disconnected`.
    pub async fn close(mut self) {
        self.state = AttemptState::Disconnected;
        if !self.is_failed() {
            let _ = timeout(
                Duration::from_secs(1),
                self.sink.send(WsMessage::Close(None)),
            )
            .await;
        }
        self.reader.abort();
    }
}

impl Drop for GatewayConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for GatewayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConnection")
            .field("state", &self.state())
            .field("connect_duration", &self.connect_duration)
            .field("actions_sent", &self.actions_sent)
            .finish_non_exhaustive()
    }
}
