//! In-memory transport.
//!
//! Every successful [`open`](Transport::open) creates a bounded channel. The
//! receiving half becomes the client's [`ConnectionHandle`]; the sending half
//! is handed out as a [`FrameSender`] through [`Sessions`]. Useful for feeding
//! frames produced elsewhere in the process, and as a test double: it counts
//! `open` calls and can be scripted to fail.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::{ConnectionHandle, Transport};
use crate::{endpoint::Endpoint, error::ConnectionError, frame::RawFrame};

type FrameResult = Result<RawFrame, ConnectionError>;

struct Inner {
    capacity: usize,
    open_calls: AtomicUsize,
    failures: Mutex<VecDeque<ConnectionError>>,
    open_delay: Mutex<Option<Duration>>,
    sessions_tx: mpsc::UnboundedSender<FrameSender>,
}

/// In-memory [`Transport`]. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ChannelTransport {
    inner: Arc<Inner>,
}

impl ChannelTransport {
    /// Create a transport whose connections buffer up to `capacity` frames.
    ///
    /// The returned [`Sessions`] yields one [`FrameSender`] per opened
    /// connection. If it is dropped, new connections end immediately.
    pub fn new(capacity: usize) -> (Self, Sessions) {
        let (sessions_tx, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            capacity: capacity.max(1),
            open_calls: AtomicUsize::new(0),
            failures: Mutex::new(VecDeque::new()),
            open_delay: Mutex::new(None),
            sessions_tx,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            Sessions { rx },
        )
    }

    /// Number of times [`open`](Transport::open) was called, failures included.
    pub fn open_calls(&self) -> usize {
        self.inner.open_calls.load(Ordering::SeqCst)
    }

    /// Make the next `open` fail with `error`. Queued failures are used in order.
    pub fn fail_next_open(&self, error: ConnectionError) {
        self.inner.failures.lock().push_back(error);
    }

    /// Delay every subsequent `open` by `delay`.
    pub fn set_open_delay(&self, delay: Option<Duration>) {
        *self.inner.open_delay.lock() = delay;
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn ConnectionHandle>, ConnectionError> {
        let call = self.inner.open_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.inner.open_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.inner.failures.lock().pop_front();
        if let Some(err) = failure {
            debug!(endpoint = %endpoint, call, error = %err, "Channel transport open failed (scripted)");
            return Err(err);
        }

        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let sender = FrameSender {
            tx,
            endpoint: endpoint.clone(),
        };
        if self.inner.sessions_tx.send(sender).is_err() {
            debug!(endpoint = %endpoint, "No session receiver; connection will end immediately");
        }

        Ok(Box::new(ChannelConnection {
            rx,
            closed: false,
        }))
    }
}

/// Yields the sending side of each connection opened by a [`ChannelTransport`].
pub struct Sessions {
    rx: mpsc::UnboundedReceiver<FrameSender>,
}

impl Sessions {
    /// Wait for the next opened connection.
    pub async fn next(&mut self) -> Option<FrameSender> {
        self.rx.recv().await
    }

    /// Take an already-opened connection without waiting.
    pub fn try_next(&mut self) -> Option<FrameSender> {
        self.rx.try_recv().ok()
    }
}

/// Sending side of one in-memory connection.
///
/// Dropping every clone ends the stream cleanly, which the client reports as
/// [`ConnectionError::StreamEnded`].
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<FrameResult>,
    endpoint: Endpoint,
}

impl FrameSender {
    /// Push a frame. Returns `false` if the client has released the connection.
    pub async fn send(&self, frame: RawFrame) -> bool {
        self.tx.send(Ok(frame)).await.is_ok()
    }

    /// Push a frame built from an event name and payload.
    pub async fn send_event(&self, event_name: &str, payload: &str) -> bool {
        self.send(RawFrame::new(event_name, payload)).await
    }

    /// Inject a transport failure.
    pub async fn fail(&self, error: ConnectionError) -> bool {
        self.tx.send(Err(error)).await.is_ok()
    }

    /// Returns `true` once the client has released the connection.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Wait until the client has released the connection.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    /// The endpoint this connection was opened for.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

struct ChannelConnection {
    rx: mpsc::Receiver<FrameResult>,
    closed: bool,
}

#[async_trait]
impl ConnectionHandle for ChannelConnection {
    async fn recv(&mut self) -> Option<FrameResult> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.rx.close();
        }
    }
}
