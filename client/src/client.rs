//! # Log Stream Client
//!
//! Maintains one logical subscription to a resource's deployment-log
//! channel. Handles:
//! - Connection establishment and auto-reconnect with exponential backoff
//! - Fresh credential lookup on every attempt
//! - Decoding inbound frames and dispatching them to message observers
//! - Best-effort outbound sends while the connection is open
//! - Permanent shutdown on `disconnect()`
//!
//! ## Connection Lifecycle
//! 1. `connect()` spawns the connection loop and waits for the first outcome
//! 2. The loop resolves the URL (reading the token) and opens a transport
//! 3. Frames are dispatched until the transport closes or errors
//! 4. Close observers are notified
//! 5. Unless disconnected or out of budget, wait `base × 2^(n−1)` and go to 2
//!
//! A successful open resets the attempt counter, so every stable connection
//! gets the full reconnect budget again.

use crate::config::StreamConfig;
use crate::credentials::CredentialStore;
use crate::endpoint::{ChannelIdentity, Endpoint};
use crate::error::{StreamError, TransportError};
use crate::events::DeploymentEvent;
use crate::observers::{ObserverRegistry, Subscription};
use crate::transport::{Connection, Connector, WsConnector};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Connection state as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

// ─── Shared State ───────────────────────────────────────────────

/// Mutable bookkeeping guarded by a plain mutex. Never held across an
/// `.await` or while observers run.
#[derive(Default)]
struct Control {
    /// The connection loop has been spawned.
    started: bool,
    /// Set by `disconnect()`; suppresses every later reconnect.
    manual_close: bool,
    /// Consecutive reconnect attempts since the last successful open.
    reconnect_attempts: u32,
    /// The reconnect budget ran out.
    given_up: bool,
    /// Queue feeding the live connection's outbound half. `None` when closed.
    outbound: Option<mpsc::UnboundedSender<String>>,
}

struct Shared {
    endpoint: Endpoint,
    config: StreamConfig,
    credentials: Box<dyn CredentialStore>,
    connector: Arc<dyn Connector>,
    observers: ObserverRegistry,
    control: Mutex<Control>,
    state: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_replace(next);
    }

    /// `Connecting → Open`. Refused if `disconnect()` already moved the
    /// state on.
    fn mark_open(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Open;
                true
            } else {
                false
            }
        })
    }

    fn resource_id(&self) -> &str {
        &self.endpoint.identity().resource_id
    }

    fn resolve_url(&self) -> Url {
        // Read on every attempt so a refreshed token is used on reconnect.
        let token = self.credentials.get();
        self.endpoint.resolve(token.as_deref())
    }

    async fn establish(&self, url: &Url) -> Result<Connection, TransportError> {
        match self.config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, self.connector.open(url))
                .await
                .map_err(|_| TransportError::Timeout(limit))?,
            None => self.connector.open(url).await,
        }
    }

    fn handle_frame(&self, text: &str) {
        match DeploymentEvent::decode(text, Utc::now()) {
            Ok(event) => {
                debug!("Received {} frame for {}", event.kind(), self.resource_id());
                self.observers.notify_message(&event);
            }
            Err(e) => {
                error!("Failed to parse WebSocket message: {}", e);
            }
        }
    }

    fn report_error(&self, err: &TransportError) {
        error!("WebSocket error for {}: {}", self.resource_id(), err);
        self.observers.notify_error(err);
    }

    /// Runs one open connection until it closes, errors, or the client is
    /// shut down.
    async fn pump(&self, connection: Connection) {
        let Connection {
            mut inbound,
            mut outbound,
        } = connection;

        // Create the outbound message channel used by `send()`
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        self.control().outbound = Some(tx);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.set_state(ConnectionState::Closing);
                    if let Err(e) = outbound.close().await {
                        debug!("Error while closing WebSocket: {}", e);
                    }
                    break;
                }
                frame = inbound.next() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(e)) => {
                        self.report_error(&e);
                        break;
                    }
                    None => break,
                },
                Some(text) = rx.recv() => {
                    if let Err(e) = outbound.send(text).await {
                        self.report_error(&e);
                        break;
                    }
                }
            }
        }

        self.control().outbound = None;
    }

    /// Decides whether to retry after a close. Returns the attempt number to
    /// schedule, or `None` when the loop must stop.
    fn next_attempt(&self) -> Option<u32> {
        let mut control = self.control();
        if control.manual_close {
            return None;
        }
        if control.reconnect_attempts >= self.config.reconnect.max_attempts {
            control.given_up = true;
            return None;
        }
        control.reconnect_attempts += 1;
        Some(control.reconnect_attempts)
    }
}

// ─── Connection Loop ────────────────────────────────────────────

/// Drives physical connections for one client until it is disconnected or
/// the reconnect budget is spent. `ready` carries the outcome of the first
/// attempt back to the `connect()` caller.
async fn run_connection_loop(
    shared: Arc<Shared>,
    ready: oneshot::Sender<Result<(), StreamError>>,
) {
    let mut ready = Some(ready);

    loop {
        if shared.shutdown.is_cancelled() {
            break;
        }

        let url = shared.resolve_url();
        shared.set_state(ConnectionState::Connecting);
        info!("Connecting to deployment log stream for {}", shared.resource_id());

        let opened = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            result = shared.establish(&url) => result,
        };

        match opened {
            Ok(connection) => {
                if shared.mark_open() {
                    shared.control().reconnect_attempts = 0;
                    info!("WebSocket connected");
                    if let Some(ready) = ready.take() {
                        let _ = ready.send(Ok(()));
                    }
                }
                shared.pump(connection).await;
            }
            Err(e) => {
                shared.report_error(&e);
                // Only the first attempt has a caller still waiting on it.
                if let Some(ready) = ready.take() {
                    let _ = ready.send(Err(StreamError::Transport(e)));
                }
            }
        }

        shared.set_state(ConnectionState::Disconnected);
        info!("WebSocket closed");
        shared.observers.notify_close();

        let Some(attempt) = shared.next_attempt() else {
            if shared.control().given_up {
                warn!(
                    "Giving up on deployment log stream for {} after {} reconnect attempts",
                    shared.resource_id(),
                    shared.config.reconnect.max_attempts
                );
            }
            break;
        };

        let delay = shared.config.reconnect.delay_for(attempt);
        info!(
            "Reconnecting in {}ms... (attempt {}/{})",
            delay.as_millis(),
            attempt,
            shared.config.reconnect.max_attempts
        );

        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    shared.control().outbound = None;
    shared.set_state(ConnectionState::Disconnected);
}

// ─── Public Client ──────────────────────────────────────────────

/// A resilient stream of deployment events for exactly one resource.
///
/// Dropping the client stops its connection loop; call
/// [`disconnect`](Self::disconnect) to also release observers eagerly.
pub struct LogStreamClient {
    shared: Arc<Shared>,
}

impl LogStreamClient {
    /// Creates a client that connects over WebSocket.
    pub fn new(
        config: StreamConfig,
        resource_id: impl Into<String>,
        project_id: Option<String>,
        credentials: impl CredentialStore + 'static,
    ) -> Result<Self, StreamError> {
        Self::with_connector(
            config,
            resource_id,
            project_id,
            credentials,
            Arc::new(WsConnector),
        )
    }

    /// Creates a client on top of a custom transport.
    pub fn with_connector(
        config: StreamConfig,
        resource_id: impl Into<String>,
        project_id: Option<String>,
        credentials: impl CredentialStore + 'static,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, StreamError> {
        let endpoint = Endpoint::new(&config.ws_base_url, resource_id, project_id)?;
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            shared: Arc::new(Shared {
                endpoint,
                config,
                credentials: Box::new(credentials),
                connector,
                observers: ObserverRegistry::new(),
                control: Mutex::new(Control::default()),
                state,
                shutdown: CancellationToken::new(),
            }),
        })
    }

    pub fn identity(&self) -> &ChannelIdentity {
        self.shared.endpoint.identity()
    }

    /// Starts the connection loop and waits for the first attempt.
    ///
    /// Resolves once the stream is open. If the very first attempt fails the
    /// error is returned here (and also reported to error observers); the
    /// loop keeps retrying in the background either way. Later failures are
    /// only reported to error observers.
    pub async fn connect(&self) -> Result<(), StreamError> {
        {
            let mut control = self.shared.control();
            if control.manual_close {
                return Err(StreamError::Disposed);
            }
            if control.started {
                return Err(StreamError::AlreadyStarted);
            }
            control.started = true;
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(run_connection_loop(Arc::clone(&self.shared), ready_tx));

        ready_rx.await.unwrap_or(Err(StreamError::Closed))
    }

    /// Closes the stream for good.
    ///
    /// Suppresses any further reconnection, closes the live transport,
    /// cancels a pending backoff timer and clears every observer. Close
    /// observers therefore do not hear about this close; register interest
    /// in [`watch_state`](Self::watch_state) beforehand if confirmation is
    /// needed.
    pub fn disconnect(&self) {
        {
            let mut control = self.shared.control();
            control.manual_close = true;
            control.outbound = None;
        }
        self.shared.shutdown.cancel();
        self.shared.state.send_if_modified(|state| {
            if matches!(*state, ConnectionState::Connecting | ConnectionState::Open) {
                *state = ConnectionState::Closing;
                true
            } else {
                false
            }
        });
        self.shared.observers.clear();
        info!("Deployment log stream for {} disconnected", self.shared.resource_id());
    }

    /// Sends a JSON payload as one text frame.
    ///
    /// Only effective while the stream is open; otherwise logs a warning and
    /// does nothing. Never fails.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) {
        let outbound = if self.is_connected() {
            self.shared.control().outbound.clone()
        } else {
            None
        };

        let Some(tx) = outbound else {
            warn!("WebSocket is not connected");
            return;
        };

        match serde_json::to_string(payload) {
            Ok(text) => {
                if tx.send(text).is_err() {
                    warn!("WebSocket is not connected");
                }
            }
            Err(e) => warn!("Dropping outbound message that failed to serialize: {}", e),
        }
    }

    /// True iff a transport exists and is open.
    pub fn is_connected(&self) -> bool {
        *self.shared.state.borrow() == ConnectionState::Open
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Receiver notified on every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// True once the reconnect budget has been exhausted without a
    /// successful open. The state is `Disconnected` from then on.
    pub fn has_given_up(&self) -> bool {
        self.shared.control().given_up
    }

    pub fn on_message<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&DeploymentEvent) + Send + Sync + 'static,
    {
        self.shared.observers.add_message(Arc::new(observer))
    }

    pub fn on_error<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        self.shared.observers.add_error(Arc::new(observer))
    }

    pub fn on_close<F>(&self, observer: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.observers.add_close(Arc::new(observer))
    }
}

impl Drop for LogStreamClient {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}
