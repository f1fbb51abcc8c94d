//! # hpx-eventsource
//!
//! Long-lived, single-connection client for server-push event streams.
//!
//! One [`EventStreamClient`] owns one connection, a registry mapping event
//! names to handlers, and the connection state machine
//! (`Idle → Connecting → Open → Closed`). Frames arrive already parsed from a
//! pluggable [`Transport`]; the client decodes each payload and invokes the
//! handler registered for its event name, in arrival order.
//!
//! ## Features
//!
//! - **Per-event dispatch**: one handler per event name, last registration
//!   wins; `"message"` receives unnamed frames.
//! - **Resilient decoding**: a malformed payload becomes a [`DispatchError`]
//!   on the error channel, and the stream keeps flowing.
//! - **Explicit lifecycle**: idempotent [`connect`](EventStreamClient::connect)
//!   and [`close`](EventStreamClient::close); after `close` returns no
//!   handler runs.
//! - **Optional reconnection**: [`ReconnectSupervisor`] layers exponential
//!   backoff on top without touching the core state machine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hpx_eventsource::{ChannelTransport, EventStreamClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (transport, mut sessions) = ChannelTransport::new(64);
//! let client = EventStreamClient::new("stream://notifications", transport)?;
//!
//! client.on("notify", |payload| println!("notify: {payload}"))?;
//! client.on_error(|err| eprintln!("stream error: {err}"));
//! client.connect().await;
//!
//! // Producer side of the in-memory transport.
//! if let Some(sender) = sessions.next().await {
//!     sender.send_event("notify", r#"{"id":1}"#).await;
//! }
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
pub mod decode;
mod endpoint;
pub mod error;
mod frame;
mod listener;
pub mod reconnect;
mod stats;
pub mod transport;

pub use client::{ClientState, EventStreamClient};
pub use config::ClientConfig;
pub use decode::{DecodeMode, JsonDecoder, PayloadDecoder, TextDecoder};
pub use endpoint::Endpoint;
pub use error::{
    ClientError, ClientResult, ConnectionError, DecodeError, DispatchError, StreamError,
};
pub use frame::{MESSAGE_EVENT, RawFrame};
pub use reconnect::{ReconnectPolicy, ReconnectSupervisor};
pub use stats::ClientStats;
pub use transport::{
    ChannelTransport, ConnectionHandle, FrameSender, Sessions, StreamConnection, Transport,
};
