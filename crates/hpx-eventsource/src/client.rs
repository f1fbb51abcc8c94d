//! The event stream client: listener registry, connection state machine, and
//! receive loop.
//!
//! ```text
//! EventStreamClient::connect()
//!   └─ spawns receive task ──► tokio::spawn(receive_loop)
//!        │                          │
//!        ├── close() ── oneshot ───►│  (shutdown signal)
//!        │                          │
//!        └── state() ◄── watch ─────┘  (Idle/Connecting/Open/Closed)
//! ```
//!
//! The receive task dispatches frames one at a time, in arrival order, on the
//! task itself. Handlers run synchronously inside that step, so a slow handler
//! delays every later frame.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::{
    sync::{Mutex, oneshot, watch},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::ClientConfig,
    decode::PayloadDecoder,
    endpoint::Endpoint,
    error::{ClientError, ClientResult, ConnectionError, DecodeError, DispatchError, StreamError},
    frame::RawFrame,
    listener::{Listener, ListenerRegistry},
    stats::{ClientMetrics, ClientStats},
    transport::{ConnectionHandle, Transport},
};

// ---------------------------------------------------------------------------
// Client state
// ---------------------------------------------------------------------------

/// Client state machine states.
///
/// ```text
/// Idle       --connect()-->        Connecting
/// Connecting --success-->          Open
/// Connecting --failure-->          Closed (+ ConnectionError)
/// Open       --transport error-->  Closed (+ ConnectionError)
/// any        --close()-->          Closed
/// Closed     --connect()-->        Connecting
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClientState {
    /// Constructed, never connected.
    #[default]
    Idle,
    /// Opening the connection.
    Connecting,
    /// Receiving frames.
    Open,
    /// Not connected. Stays here until `connect()` is called again.
    Closed,
}

impl ClientState {
    /// Returns `true` if frames are being received.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` if the client is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` if a receive loop is starting or running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state between the client and its receive task
// ---------------------------------------------------------------------------

struct Shared {
    endpoint: Endpoint,
    connect_timeout: Duration,
    transport: Arc<dyn Transport>,
    decoder: Box<dyn PayloadDecoder>,
    registry: ListenerRegistry,
    state: watch::Sender<ClientState>,
    close_requested: AtomicBool,
    metrics: ClientMetrics,
}

impl Shared {
    fn set_state(&self, state: ClientState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(endpoint = %self.endpoint, from = %previous, to = %state, "Client state changed");
        }
    }

    /// Decode and deliver one frame.
    fn dispatch(&self, frame: RawFrame) {
        ClientMetrics::incr(&self.metrics.frames_received);

        let Some(listener) = self.registry.get(frame.event_name()) else {
            ClientMetrics::incr(&self.metrics.frames_discarded);
            debug!(event_name = %frame.event_name(), "No listener registered, frame discarded");
            return;
        };

        match listener {
            Listener::Raw(handler) => {
                let (_, payload) = frame.into_parts();
                handler(payload);
                ClientMetrics::incr(&self.metrics.frames_dispatched);
            }
            Listener::Decoded(handler) => {
                let result = self
                    .decoder
                    .decode(frame.payload())
                    .and_then(|value| handler(value));
                match result {
                    Ok(()) => ClientMetrics::incr(&self.metrics.frames_dispatched),
                    Err(cause) => {
                        ClientMetrics::incr(&self.metrics.dispatch_errors);
                        let (event_name, raw_payload) = frame.into_parts();
                        self.report(DispatchError::new(event_name, raw_payload, cause).into());
                    }
                }
            }
        }
    }

    /// Deliver an error to the error handler, or log and drop it.
    fn report(&self, err: StreamError) {
        if err.is_connection() {
            ClientMetrics::incr(&self.metrics.connection_errors);
        }

        match self.registry.error_handler() {
            Some(handler) => {
                debug!(endpoint = %self.endpoint, error = %err, "Reporting stream error");
                handler(err);
            }
            None => {
                ClientMetrics::incr(&self.metrics.unhandled_errors);
                warn!(endpoint = %self.endpoint, error = %err, "Stream error with no error handler registered");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Public API: EventStreamClient
// ---------------------------------------------------------------------------

struct ReceiveLoop {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Long-lived client for one server-push event stream.
///
/// Construct with [`new`](Self::new) (no connection is opened), register
/// listeners with [`on`](Self::on), then [`connect`](Self::connect). Errors
/// raised after `connect` returns are delivered to the handler registered with
/// [`on_error`](Self::on_error).
pub struct EventStreamClient {
    shared: Arc<Shared>,
    lifecycle: Mutex<Option<ReceiveLoop>>,
}

impl EventStreamClient {
    /// Create a client for `endpoint` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidEndpoint`] if the endpoint is empty or
    /// malformed.
    pub fn new(endpoint: &str, transport: impl Transport) -> ClientResult<Self> {
        Self::with_config(ClientConfig::new(endpoint), transport)
    }

    /// Create a client from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn with_config(config: ClientConfig, transport: impl Transport) -> ClientResult<Self> {
        let endpoint = config.validate()?;
        let (state, _) = watch::channel(ClientState::Idle);

        let shared = Shared {
            endpoint,
            connect_timeout: config.connect_timeout,
            transport: Arc::new(transport),
            decoder: config.decode_mode.decoder(),
            registry: ListenerRegistry::default(),
            state,
            close_requested: AtomicBool::new(false),
            metrics: ClientMetrics::default(),
        };

        Ok(Self {
            shared: Arc::new(shared),
            lifecycle: Mutex::new(None),
        })
    }

    /// Replace the payload decoder. Only possible while no receive task holds
    /// the client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] while a receive loop holds the client.
    pub fn with_decoder(mut self, decoder: impl PayloadDecoder) -> ClientResult<Self> {
        let shared = Arc::get_mut(&mut self.shared)
            .ok_or_else(|| {
                ClientError::config("Decoder cannot be changed while a receive loop holds the client")
            })?;
        shared.decoder = Box::new(decoder);
        Ok(self)
    }

    /// The endpoint this client connects to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    /// Current state.
    pub fn state(&self) -> ClientState {
        *self.shared.state.borrow()
    }

    /// Subscribe to state changes.
    pub fn watch_state(&self) -> watch::Receiver<ClientState> {
        self.shared.state.subscribe()
    }

    /// Returns `true` if the most recent transition to `Closed` was caused by
    /// [`close()`](Self::close) rather than a connection failure.
    pub fn close_requested(&self) -> bool {
        self.shared.close_requested.load(Ordering::SeqCst)
    }

    /// Snapshot of the client's counters.
    pub fn stats(&self) -> ClientStats {
        self.shared.metrics.snapshot()
    }

    /// Register a handler for `event_name`, replacing any existing one.
    ///
    /// The payload is decoded with the client's decoder before the handler
    /// runs. Use [`MESSAGE_EVENT`](crate::MESSAGE_EVENT) for frames that carry
    /// no event name.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::EmptyEventName`] if `event_name` is empty.
    pub fn on<F>(&self, event_name: &str, handler: F) -> ClientResult<()>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.register(
            event_name,
            Listener::Decoded(Arc::new(move |value| {
                handler(value);
                Ok(())
            })),
        )
    }

    /// Register a handler that receives the payload deserialized into `T`.
    ///
    /// A payload that decodes but does not match `T` is reported as a
    /// [`DispatchError`] and the handler is not called.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::EmptyEventName`] if `event_name` is empty.
    pub fn on_typed<T, F>(&self, event_name: &str, handler: F) -> ClientResult<()>
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.register(
            event_name,
            Listener::Decoded(Arc::new(move |value| {
                let typed = serde_json::from_value::<T>(value).map_err(DecodeError::from)?;
                handler(typed);
                Ok(())
            })),
        )
    }

    /// Register a handler that receives the undecoded payload text.
    ///
    /// This opts `event_name` out of decoding; its frames never produce a
    /// [`DispatchError`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::EmptyEventName`] if `event_name` is empty.
    pub fn on_raw<F>(&self, event_name: &str, handler: F) -> ClientResult<()>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.register(event_name, Listener::Raw(Arc::new(handler)))
    }

    /// Remove the handler for `event_name`. Returns `true` if one existed.
    pub fn off(&self, event_name: &str) -> bool {
        self.shared.registry.remove(event_name)
    }

    /// Returns `true` if a handler is registered for `event_name`.
    pub fn has_listener(&self, event_name: &str) -> bool {
        self.shared.registry.contains(event_name)
    }

    /// Number of registered event handlers (the error handler is not counted).
    pub fn listener_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Register the error handler, replacing any existing one.
    ///
    /// It receives every [`DispatchError`] and [`ConnectionError`]. Without
    /// one, those errors are logged and counted, then dropped.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(StreamError) + Send + Sync + 'static,
    {
        if self.shared.registry.set_error_handler(Arc::new(handler)) {
            debug!(endpoint = %self.shared.endpoint, "Error handler replaced");
        }
    }

    fn register(&self, event_name: &str, listener: Listener) -> ClientResult<()> {
        if event_name.is_empty() {
            return Err(ClientError::EmptyEventName);
        }
        if self.shared.registry.insert(event_name, listener) {
            debug!(event_name, "Listener replaced");
        }
        Ok(())
    }

    /// Start the receive loop.
    ///
    /// Returns once the loop is spawned; it does not wait for the connection
    /// to open. A no-op while `Connecting` or `Open`, so concurrent calls open
    /// at most one connection. Connection failures are reported through the
    /// error handler, never returned.
    pub async fn connect(&self) {
        let mut lifecycle = self.lifecycle.lock().await;

        let state = self.state();
        if state.is_active() {
            debug!(endpoint = %self.shared.endpoint, %state, "Already connected, ignoring connect()");
            return;
        }

        self.start(&mut lifecycle).await;
    }

    /// Reconnect only if the client is `Closed` because of a connection
    /// failure. Checked under the lifecycle lock so a concurrent `close()`
    /// always wins. Returns `true` if a new receive loop was started.
    pub(crate) async fn reconnect_after_failure(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock().await;
        if !self.state().is_closed() || self.close_requested() {
            return false;
        }
        self.start(&mut lifecycle).await;
        true
    }

    /// Join the previous receive task, then spawn a new one.
    ///
    /// A task that failed on its own may still be running the error handler;
    /// it must finish before the next loop starts so only one exists at a time.
    async fn start(&self, lifecycle: &mut Option<ReceiveLoop>) {
        if let Some(previous) = lifecycle.take() {
            self.join(previous.task).await;
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shared.close_requested.store(false, Ordering::SeqCst);
        self.shared.set_state(ClientState::Connecting);

        let task = tokio::spawn(receive_loop(Arc::clone(&self.shared), shutdown_rx));
        *lifecycle = Some(ReceiveLoop { shutdown_tx, task });
    }

    /// Stop the receive loop, release the connection, and move to `Closed`.
    ///
    /// Idempotent. When this returns the receive task has exited: no handler
    /// runs afterwards. A frame already being dispatched when the shutdown is
    /// observed finishes; frames not yet dispatched are discarded.
    pub async fn close(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let running = lifecycle.take();

        if running.is_none() && self.state().is_closed() {
            return;
        }

        self.shared.close_requested.store(true, Ordering::SeqCst);

        if let Some(ReceiveLoop { shutdown_tx, task }) = running {
            // Err means the loop already ended on its own.
            let _ = shutdown_tx.send(());
            self.join(task).await;
        }

        self.shared.set_state(ClientState::Closed);
        info!(endpoint = %self.shared.endpoint, "Event stream closed");
    }

    async fn join(&self, task: JoinHandle<()>) {
        if let Err(err) = task.await
            && err.is_panic()
        {
            error!(endpoint = %self.shared.endpoint, "Receive task panicked in a handler");
        }
    }
}

impl fmt::Debug for EventStreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStreamClient")
            .field("endpoint", &self.shared.endpoint.as_str())
            .field("state", &self.state())
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Internal: receive loop
// ---------------------------------------------------------------------------

/// Moves the client to `Closed` if the receive task unwinds out of a handler.
struct PanicGuard<'a>(&'a Shared);

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.set_state(ClientState::Closed);
        }
    }
}

/// The background task that owns the connection.
///
/// Opens the connection, then dispatches frames until shutdown is requested
/// or the transport fails. On failure the handle is released and the state
/// moves to `Closed` before the error is reported.
async fn receive_loop(shared: Arc<Shared>, mut shutdown_rx: oneshot::Receiver<()>) {
    let _guard = PanicGuard(&shared);
    let endpoint = &shared.endpoint;

    // --- Establish connection ---
    info!(endpoint = %endpoint, "Event stream connecting");
    let opened = tokio::select! {
        biased;

        _ = &mut shutdown_rx => {
            debug!(endpoint = %endpoint, "Close requested while connecting");
            return;
        }

        result = timeout(shared.connect_timeout, shared.transport.open(endpoint)) => result,
    };

    let mut connection: Box<dyn ConnectionHandle> = match opened {
        Ok(Ok(connection)) => connection,
        Ok(Err(err)) => {
            error!(endpoint = %endpoint, error = %err, "Event stream connection failed");
            shared.set_state(ClientState::Closed);
            shared.report(err.into());
            return;
        }
        Err(_) => {
            let err = ConnectionError::timeout(endpoint.as_str(), shared.connect_timeout);
            error!(endpoint = %endpoint, error = %err, "Event stream connection failed");
            shared.set_state(ClientState::Closed);
            shared.report(err.into());
            return;
        }
    };

    ClientMetrics::incr(&shared.metrics.connections_opened);
    shared.set_state(ClientState::Open);
    info!(endpoint = %endpoint, "Event stream open");

    // --- Event loop ---
    let failure = loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => {
                info!(endpoint = %endpoint, "Event stream closing (requested)");
                connection.close().await;
                return;
            }

            item = connection.recv() => {
                match item {
                    Some(Ok(frame)) => shared.dispatch(frame),
                    Some(Err(err)) => break err,
                    None => break ConnectionError::stream_ended(),
                }
            }
        }
    };

    error!(endpoint = %endpoint, error = %failure, "Event stream connection lost");
    connection.close().await;
    drop(connection);
    shared.set_state(ClientState::Closed);
    shared.report(failure.into());
}
