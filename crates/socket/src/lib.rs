//! Steve transport socket: one websocket connection with automatic reconnection
//! and a frame watchdog.
//!
//! The socket never interprets payloads. Text frames are surfaced as
//! [`SocketEvent::Message`]; callers subscribe to the event stream and decide
//! what to do with them.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

static NEXT_SOCKET_ID: AtomicU32 = AtomicU32::new(1);

const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub url: String,
    /// Silence on the wire longer than this force-closes the connection.
    pub frame_timeout: Duration,
    pub backoff_step: Duration,
    pub max_backoff: Duration,
    /// Retry even when the very first attempt fails.
    pub even_initially: bool,
    /// Scheme used for URLs that carry none.
    pub secure: bool,
}

impl SocketConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            frame_timeout: Duration::from_secs(32),
            backoff_step: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            even_initially: false,
            secure: true,
        }
    }

    /// `min(max_backoff, backoff_step * attempt)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt).min(self.max_backoff)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Connecting,
    Connected { tries: u32, after_ms: u64 },
    Disconnected,
    Message { raw: String },
    ConnectError { reason: String },
    FrameTimeout,
    Reconnecting { attempt: u32, delay_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closed {
    Local,
    Remote,
    FrameTimeout,
    Error,
}

struct Inner {
    state: SocketState,
    id: u32,
    metadata: Value,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

pub struct Socket {
    config: SocketConfig,
    inner: Mutex<Inner>,
    events: broadcast::Sender<SocketEvent>,
}

/// Rewrite `http(s)://` to `ws(s)://`, pick a scheme for bare URLs, and tag the socket id.
pub fn normalize_url(url: &str, secure: bool, sock_id: u32) -> String {
    let base = if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if url.starts_with("wss://") || url.starts_with("ws://") {
        url.to_string()
    } else {
        let scheme = if secure { "wss" } else { "ws" };
        format!("{}://{}", scheme, url.trim_start_matches('/'))
    };
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{}{}sockId={}", base, sep, sock_id)
}

impl Socket {
    pub fn new(config: SocketConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            config,
            inner: Mutex::new(Inner {
                state: SocketState::Disconnected,
                id: 0,
                metadata: Value::Null,
                outbound: None,
                cancel: None,
                task: None,
            }),
            events,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> { self.inner.lock().unwrap_or_else(PoisonError::into_inner) }

    fn emit(&self, ev: SocketEvent) { let _ = self.events.send(ev); }

    fn set_state(&self, state: SocketState) { self.lock().state = state; }

    pub fn config(&self) -> &SocketConfig { &self.config }
    pub fn state(&self) -> SocketState { self.lock().state }
    pub fn is_connected(&self) -> bool { self.state() == SocketState::Connected }
    pub fn id(&self) -> u32 { self.lock().id }
    pub fn metadata(&self) -> Value { self.lock().metadata.clone() }
    pub fn subscribe(&self) -> broadcast::Receiver<SocketEvent> { self.events.subscribe() }

    /// Open the connection in the background. No-op unless disconnected.
    /// Must be called from within a tokio runtime.
    pub fn connect(self: &Arc<Self>, metadata: Value) {
        let mut inner = self.lock();
        if inner.state != SocketState::Disconnected {
            debug!(state = ?inner.state, "socket connect ignored");
            return;
        }
        inner.id = NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed);
        inner.metadata = metadata;
        inner.state = SocketState::Connecting;
        let cancel = CancellationToken::new();
        inner.cancel = Some(cancel.clone());
        let url = normalize_url(&self.config.url, self.config.secure, inner.id);
        let me = Arc::clone(self);
        inner.task = Some(tokio::spawn(async move { me.run(url, cancel).await }));
    }

    /// Serialize and send; `false` when not connected so the caller can buffer.
    pub fn send<T: Serialize + ?Sized>(&self, data: &T) -> bool {
        match serde_json::to_string(data) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                warn!(error = %e, "socket send: serialize failed");
                false
            }
        }
    }

    pub fn send_text(&self, text: String) -> bool {
        let inner = self.lock();
        if inner.state != SocketState::Connected {
            return false;
        }
        match inner.outbound.as_ref() {
            Some(tx) => tx.send(Message::text(text)).is_ok(),
            None => false,
        }
    }

    /// Disable reconnection and close; resolves once the background task ends.
    pub async fn disconnect(&self) {
        let (cancel, task) = {
            let mut inner = self.lock();
            if inner.task.is_none() {
                return;
            }
            inner.state = SocketState::Disconnecting;
            (inner.cancel.take(), inner.task.take())
        };
        if let Some(c) = cancel { c.cancel(); }
        if let Some(t) = task { let _ = t.await; }
        self.set_state(SocketState::Disconnected);
    }

    async fn run(self: Arc<Self>, url: String, cancel: CancellationToken) {
        let mut tries: u32 = 0;
        let mut ever_opened = false;
        loop {
            let t0 = Instant::now();
            self.set_state(SocketState::Connecting);
            self.emit(SocketEvent::Connecting);
            let attempt = tokio::select! {
                _ = cancel.cancelled() => break,
                res = connect_async(url.as_str()) => res,
            };
            match attempt {
                Ok((ws, _resp)) => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    {
                        let mut inner = self.lock();
                        inner.outbound = Some(tx);
                        inner.state = SocketState::Connected;
                    }
                    ever_opened = true;
                    let after_ms = t0.elapsed().as_millis() as u64;
                    info!(url = %url, tries, after_ms, "socket connected");
                    self.emit(SocketEvent::Connected { tries, after_ms });
                    tries = 0;

                    let closed = self.pump(ws, rx, &cancel).await;
                    {
                        let mut inner = self.lock();
                        inner.outbound = None;
                        inner.state = SocketState::Disconnected;
                    }
                    if closed == Closed::FrameTimeout {
                        warn!(url = %url, timeout_ms = %self.config.frame_timeout.as_millis(), "socket frame timeout");
                        counter!("steve_socket_frame_timeouts_total", 1u64);
                        self.emit(SocketEvent::FrameTimeout);
                    }
                    info!(url = %url, reason = ?closed, "socket disconnected");
                    self.emit(SocketEvent::Disconnected);
                    if closed == Closed::Local {
                        break;
                    }
                }
                Err(e) => {
                    let reason = e.to_string();
                    if !ever_opened && !self.config.even_initially {
                        warn!(url = %url, error = %reason, "socket failed to open; not retrying");
                        self.set_state(SocketState::Disconnected);
                        self.emit(SocketEvent::ConnectError { reason });
                        break;
                    }
                    debug!(url = %url, error = %reason, "socket connect attempt failed");
                }
            }
            if cancel.is_cancelled() {
                break;
            }
            tries += 1;
            let delay = self.config.backoff_delay(tries);
            let delay_ms = delay.as_millis() as u64;
            counter!("steve_socket_reconnects_total", 1u64);
            info!(attempt = tries, delay_ms, "socket reconnecting");
            self.set_state(SocketState::Connecting);
            self.emit(SocketEvent::Reconnecting { attempt: tries, delay_ms });
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        let mut inner = self.lock();
        inner.state = SocketState::Disconnected;
        inner.outbound = None;
    }

    async fn pump<S>(
        &self,
        ws: WebSocketStream<S>,
        mut rx: mpsc::UnboundedReceiver<Message>,
        cancel: &CancellationToken,
    ) -> Closed
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut write, mut read) = ws.split();
        let watchdog = tokio::time::sleep(self.config.frame_timeout);
        tokio::pin!(watchdog);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = tokio::time::timeout(CLOSE_GRACE, write.close()).await;
                    return Closed::Local;
                }
                _ = &mut watchdog => {
                    let _ = tokio::time::timeout(CLOSE_GRACE, write.close()).await;
                    return Closed::FrameTimeout;
                }
                out = rx.recv() => match out {
                    Some(msg) => {
                        if let Err(e) = write.send(msg).await {
                            warn!(error = %e, "socket write failed");
                            return Closed::Error;
                        }
                    }
                    None => return Closed::Local,
                },
                frame = read.next() => {
                    watchdog.as_mut().reset(tokio::time::Instant::now() + self.config.frame_timeout);
                    match frame {
                        Some(Ok(Message::Text(text))) => self.emit(SocketEvent::Message { raw: text.as_str().to_string() }),
                        Some(Ok(Message::Close(_))) | None => return Closed::Remote,
                        // ping/pong/binary only feed the watchdog
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            debug!(error = %e, "socket read failed");
                            return Closed::Error;
                        }
                    }
                }
            }
        }
    }
}
