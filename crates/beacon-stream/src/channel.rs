//! # Notification Channel
//!
//! Owns one subscriber context: the event bus, the transport, the retry
//! schedule, and the connection lifecycle.
//!
//! ```text
//! Idle ──start──▶ Connecting ──open──▶ Streaming
//!                   │                     │
//!      no credential / failure     end / error
//!                   ▼                     │
//!             RetryScheduled ◀────────────┘
//!                   │ timer
//!                   └──────▶ Connecting
//!
//! any state ──stop──▶ Stopped (terminal)
//! ```
//!
//! Each attempt reads the credential fresh, opens one connection, and pumps
//! its body through a new [`Utf8Decoder`] and [`FrameParser`]. Every way an
//! attempt can end, except `stop`, arms exactly one retry timer. An attempt
//! is only ever started from `start` or from that timer, and never while
//! another attempt is active.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use secrecy::ExposeSecret;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use beacon_core::NotificationEvent;
use beacon_core::text::truncate_str;
use beacon_settings::ChannelSettings;

use crate::bus::{EventBus, Subscription, panic_message};
use crate::config::ChannelConfig;
use crate::credentials::CredentialProvider;
use crate::decoder::Utf8Decoder;
use crate::errors::{ChannelError, HandlerError, TransportError};
use crate::frame::FrameParser;
use crate::retry::RetrySchedule;
use crate::transport::{ByteStream, HttpTransport, Transport};

/// Lifecycle state of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    /// Created, not started.
    Idle,
    /// An attempt is reading the credential or waiting for response headers.
    Connecting,
    /// A connection is open and its body is being read.
    Streaming,
    /// The last attempt ended; a reconnect timer is pending.
    RetryScheduled,
    /// Stopped for good.
    Stopped,
}

/// State of one connection, from request to release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Request sent, headers not yet accepted.
    Connecting,
    /// Headers accepted, body being read.
    Open,
    /// The body ended or the read was cancelled.
    Closed,
    /// The request or the read failed.
    Failed,
}

/// Counters since the channel was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Connection attempts, including those skipped for lack of a credential.
    pub attempts: u64,
    /// Attempts that reached [`ConnectionState::Open`].
    pub connections_opened: u64,
    /// Events handed to the bus.
    pub events_published: u64,
    /// Frames whose payload could not be decoded.
    pub frames_dropped: u64,
    /// Subscriber invocations that returned `Err` or panicked.
    pub handler_failures: u64,
}

#[derive(Default)]
struct Counters {
    attempts: AtomicU64,
    connections_opened: AtomicU64,
    events_published: AtomicU64,
    frames_dropped: AtomicU64,
    handler_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        let _ = counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ChannelStats {
        ChannelStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }
}

/// How one attempt ended.
#[derive(Debug)]
enum AttemptOutcome {
    NoCredential,
    Failed(TransportError),
    Ended,
    Cancelled,
    /// The credential provider or the transport panicked.
    Panicked(String),
}

/// How the read loop of an open connection ended.
enum PumpEnd {
    EndOfStream,
    Cancelled,
}

struct Control {
    credentials: Option<Arc<dyn CredentialProvider>>,
    retry: RetrySchedule,
    /// An attempt task is running.
    active: bool,
    last_connection: Option<ConnectionState>,
}

struct ChannelInner {
    transport: Arc<dyn Transport>,
    config: ChannelConfig,
    bus: EventBus,
    control: Mutex<Control>,
    cancel: CancellationToken,
    state: watch::Sender<ChannelState>,
    counters: Counters,
}

/// A self-healing notification subscription.
///
/// Dropping the channel stops it.
pub struct NotificationChannel {
    inner: Arc<ChannelInner>,
}

impl NotificationChannel {
    /// Create an idle channel over `transport`.
    pub fn new(transport: Arc<dyn Transport>, config: ChannelConfig) -> Self {
        let retry = RetrySchedule::new(config.retry_delay, config.retry_jitter);
        let (state, _) = watch::channel(ChannelState::Idle);
        Self {
            inner: Arc::new(ChannelInner {
                transport,
                config,
                bus: EventBus::new(),
                control: Mutex::new(Control {
                    credentials: None,
                    retry,
                    active: false,
                    last_connection: None,
                }),
                cancel: CancellationToken::new(),
                state,
                counters: Counters::default(),
            }),
        }
    }

    /// Create an idle channel with an [`HttpTransport`] built from settings.
    pub fn from_settings(settings: &ChannelSettings) -> Result<Self, TransportError> {
        let transport = HttpTransport::from_settings(settings)?;
        Ok(Self::new(Arc::new(transport), ChannelConfig::from(settings)))
    }

    /// The channel's event bus. Clone it to hand to other parts of the application.
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Shorthand for [`EventBus::subscribe`] on this channel's bus.
    pub fn subscribe<F>(&self, kind: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&NotificationEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(kind, handler)
    }

    /// Start connecting. The credential is read from `credentials` on every attempt.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, credentials: impl CredentialProvider + 'static) -> Result<(), ChannelError> {
        let mut control = self.inner.control.lock();
        match self.state() {
            ChannelState::Idle => {}
            ChannelState::Stopped => return Err(ChannelError::Stopped),
            _ => return Err(ChannelError::AlreadyStarted),
        }
        control.credentials = Some(Arc::new(credentials));
        info!("notification channel starting");
        self.inner.spawn_attempt_locked(&mut control);
        Ok(())
    }

    /// Stop permanently: cancel the pending retry and signal the in-flight read.
    ///
    /// The read loop exits at its next suspension point. Idempotent.
    pub fn stop(&self) {
        let mut control = self.inner.control.lock();
        if self.inner.cancel.is_cancelled() {
            return;
        }
        self.inner.cancel.cancel();
        if control.retry.cancel() {
            debug!("cancelled pending retry timer");
        }
        let _ = self.inner.state.send_replace(ChannelState::Stopped);
        info!("notification channel stopped");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChannelState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    /// State of the most recent connection, if any attempt got that far.
    pub fn last_connection_state(&self) -> Option<ConnectionState> {
        self.inner.control.lock().last_connection
    }

    /// Whether a reconnect timer is pending.
    pub fn retry_pending(&self) -> bool {
        self.inner.control.lock().retry.is_pending()
    }

    /// Counters since creation.
    pub fn stats(&self) -> ChannelStats {
        self.inner.counters.snapshot()
    }
}

impl Drop for NotificationChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("state", &self.state())
            .field("bus", &self.inner.bus)
            .finish_non_exhaustive()
    }
}

impl ChannelInner {
    /// Move to `next` unless the channel has been stopped.
    fn set_state(&self, next: ChannelState) {
        let _ = self.state.send_if_modified(|state| {
            if *state == ChannelState::Stopped || *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
    }

    fn spawn_attempt(self: &Arc<Self>) {
        let mut control = self.control.lock();
        self.spawn_attempt_locked(&mut control);
    }

    fn spawn_attempt_locked(self: &Arc<Self>, control: &mut Control) {
        if self.cancel.is_cancelled() {
            return;
        }
        if control.active {
            warn!("connection attempt already active, not starting another");
            return;
        }
        control.active = true;
        self.set_state(ChannelState::Connecting);

        let credentials = control.credentials.clone();
        let inner = Arc::clone(self);
        drop(tokio::spawn(async move {
            let outcome = AssertUnwindSafe(inner.run_attempt(credentials))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    inner.record_connection(ConnectionState::Failed);
                    AttemptOutcome::Panicked(panic_message(payload.as_ref()).to_owned())
                });
            inner.finish_attempt(&outcome);
        }));
    }

    async fn run_attempt(
        &self,
        credentials: Option<Arc<dyn CredentialProvider>>,
    ) -> AttemptOutcome {
        Counters::bump(&self.counters.attempts, 1);
        metrics::counter!("notification_connection_attempts_total").increment(1);

        let credential = credentials
            .and_then(|provider| provider.credential())
            .filter(|token| !token.expose_secret().is_empty());
        let Some(credential) = credential else {
            return AttemptOutcome::NoCredential;
        };

        self.record_connection(ConnectionState::Connecting);
        let opened = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                self.record_connection(ConnectionState::Closed);
                return AttemptOutcome::Cancelled;
            }
            opened = self.transport.open(&credential) => opened,
        };
        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                self.record_connection(ConnectionState::Failed);
                return AttemptOutcome::Failed(e);
            }
        };

        self.record_connection(ConnectionState::Open);
        Counters::bump(&self.counters.connections_opened, 1);
        self.set_state(ChannelState::Streaming);
        info!("notification stream open");

        match self.pump(stream).await {
            Ok(PumpEnd::EndOfStream) => {
                self.record_connection(ConnectionState::Closed);
                AttemptOutcome::Ended
            }
            Ok(PumpEnd::Cancelled) => {
                self.record_connection(ConnectionState::Closed);
                AttemptOutcome::Cancelled
            }
            Err(e) => {
                self.record_connection(ConnectionState::Failed);
                AttemptOutcome::Failed(e)
            }
        }
    }

    /// Read the body until it ends, fails, or the channel is stopped.
    async fn pump(&self, mut stream: ByteStream) -> Result<PumpEnd, TransportError> {
        let mut decoder = Utf8Decoder::new();
        let mut parser = FrameParser::new();

        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(PumpEnd::Cancelled),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let text = decoder.decode(&chunk);
                    for payload in parser.push(&text) {
                        if self.cancel.is_cancelled() {
                            return Ok(PumpEnd::Cancelled);
                        }
                        self.dispatch(&payload);
                    }
                    let buffered = parser.buffered_len();
                    if buffered > self.config.max_buffer_bytes {
                        return Err(TransportError::BufferOverflow {
                            size: buffered,
                            limit: self.config.max_buffer_bytes,
                        });
                    }
                }
                Some(Err(e)) => return Err(e),
                None => {
                    let tail = decoder.finish();
                    for payload in parser.push(&tail) {
                        self.dispatch(&payload);
                    }
                    if parser.buffered_len() > 0 {
                        debug!(
                            buffered = parser.buffered_len(),
                            "stream ended inside a frame, discarding partial frame"
                        );
                    }
                    return Ok(PumpEnd::EndOfStream);
                }
            }
        }
    }

    /// Decode one payload and publish it. Malformed payloads are dropped.
    fn dispatch(&self, payload: &str) {
        let event = match NotificationEvent::from_payload(payload) {
            Ok(event) => event,
            Err(e) => {
                Counters::bump(&self.counters.frames_dropped, 1);
                metrics::counter!("notification_frames_dropped_total").increment(1);
                warn!(
                    error = %e,
                    category = e.category(),
                    data_preview = truncate_str(payload, 100),
                    "dropping malformed notification frame"
                );
                return;
            }
        };

        debug!(kind = %event.kind, "publishing notification");
        let report = self.bus.publish(&event);
        Counters::bump(&self.counters.events_published, 1);
        metrics::counter!("notification_events_total", "kind" => event.kind.clone()).increment(1);
        if report.failed > 0 {
            let failed = u64::try_from(report.failed).unwrap_or(u64::MAX);
            Counters::bump(&self.counters.handler_failures, failed);
            metrics::counter!("notification_handler_failures_total").increment(failed);
        }
    }

    fn record_connection(&self, state: ConnectionState) {
        self.control.lock().last_connection = Some(state);
    }

    /// Close out an attempt and arm the retry timer unless stopped.
    fn finish_attempt(self: &Arc<Self>, outcome: &AttemptOutcome) {
        let mut control = self.control.lock();
        control.active = false;

        if self.cancel.is_cancelled() {
            debug!(?outcome, "attempt ended after stop, not rescheduling");
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let delay = control.retry.schedule(move || {
            if let Some(inner) = weak.upgrade() {
                inner.spawn_attempt();
            }
        });
        self.set_state(ChannelState::RetryScheduled);

        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        match outcome {
            AttemptOutcome::NoCredential => {
                debug!(delay_ms, "no credential available, retry scheduled");
            }
            AttemptOutcome::Failed(e) => {
                warn!(error = %e, category = e.category(), delay_ms, "notification stream failed, retry scheduled");
            }
            AttemptOutcome::Panicked(message) => {
                warn!(panic = %message, delay_ms, "connection attempt panicked, retry scheduled");
            }
            AttemptOutcome::Ended | AttemptOutcome::Cancelled => {
                info!(delay_ms, "notification stream closed, retry scheduled");
            }
        }
    }
}
