//! Transport abstraction consumed by the client.
//!
//! The client never speaks a wire protocol itself. A [`Transport`] opens a
//! connection to an [`Endpoint`] and hands back a [`ConnectionHandle`] that
//! yields already-parsed [`RawFrame`]s until the stream ends.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChannelTransport`] | In-memory transport fed through [`FrameSender`]s |
//! | [`StreamConnection`] | Adapts any `Stream` of frames into a handle |

mod channel;
mod stream;

use async_trait::async_trait;

pub use channel::{ChannelTransport, FrameSender, Sessions};
pub use stream::StreamConnection;

use crate::{endpoint::Endpoint, error::ConnectionError, frame::RawFrame};

/// Opens connections to an endpoint.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection.
    ///
    /// Called once per successful [`connect()`](crate::EventStreamClient::connect).
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn ConnectionHandle>, ConnectionError>;
}

/// Exclusive ownership of one open connection.
///
/// Dropping a handle must release its resources as well; [`close`] exists so
/// the client can release them at a well-defined point.
///
/// [`close`]: ConnectionHandle::close
#[async_trait]
pub trait ConnectionHandle: Send + 'static {
    /// Receive the next frame.
    ///
    /// `None` means the stream ended cleanly; `Some(Err(_))` is a transport
    /// failure. Must be cancel-safe: the client drops a pending `recv` when it
    /// is asked to close.
    async fn recv(&mut self) -> Option<Result<RawFrame, ConnectionError>>;

    /// Release the connection. Idempotent.
    async fn close(&mut self);
}
