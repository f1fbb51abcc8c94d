//! [`ConnectionHandle`] over any [`Stream`] of frames.

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};

use super::ConnectionHandle;
use crate::{error::ConnectionError, frame::RawFrame};

/// Wraps a frame stream as a [`ConnectionHandle`].
///
/// Closing drops the inner stream; later `recv` calls return `None`.
pub struct StreamConnection<S> {
    stream: Option<S>,
}

impl<S> StreamConnection<S>
where
    S: Stream<Item = Result<RawFrame, ConnectionError>> + Send + Unpin + 'static,
{
    /// Wrap a stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// Returns `true` once the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

#[async_trait]
impl<S> ConnectionHandle for StreamConnection<S>
where
    S: Stream<Item = Result<RawFrame, ConnectionError>> + Send + Unpin + 'static,
{
    async fn recv(&mut self) -> Option<Result<RawFrame, ConnectionError>> {
        self.stream.as_mut()?.next().await
    }

    async fn close(&mut self) {
        self.stream = None;
    }
}
