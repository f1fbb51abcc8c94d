//! Event Stream Example
//!
//! Demonstrates an [`EventStreamClient`] over a custom transport that replays
//! a scripted feed, with typed, raw, and error handlers plus reconnection.
//!
//! Run with: `cargo run -p hpx-eventsource --example event_stream`

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures_util::stream;
use hpx_eventsource::{
    ClientConfig, ConnectionError, ConnectionHandle, Endpoint, EventStreamClient, RawFrame,
    ReconnectPolicy, ReconnectSupervisor, StreamConnection, Transport,
};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Replays the same short feed on every connection, then drops it.
struct ReplayTransport {
    connections: AtomicUsize,
}

#[async_trait]
impl Transport for ReplayTransport {
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn ConnectionHandle>, ConnectionError> {
        let n = self.connections.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(%endpoint, connection = n, "Replaying feed");

        let frames = vec![
            Ok(RawFrame::new("ticker", r#"{"symbol":"BTC","price":64000.5}"#)),
            Ok(RawFrame::new("heartbeat", "ping")),
            Ok(RawFrame::new("ticker", "{truncated")),
            Ok(RawFrame::message(r#"{"note":"unnamed frame"}"#)),
            Err(ConnectionError::lost(format!("feed {n} ended"))),
        ];
        Ok(Box::new(StreamConnection::new(stream::iter(frames))))
    }
}

#[derive(Debug, Deserialize)]
struct Ticker {
    symbol: String,
    price: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ClientConfig::new("https://feeds.example.com/v1/stream")
        .connect_timeout(Duration::from_secs(5));
    let transport = ReplayTransport {
        connections: AtomicUsize::new(0),
    };
    let client = Arc::new(EventStreamClient::with_config(config, transport)?);

    client.on_typed("ticker", |t: Ticker| {
        println!("ticker  {} @ {}", t.symbol, t.price);
    })?;
    client.on_raw("heartbeat", |payload| println!("heartbeat {payload}"))?;
    client.on("message", |value| println!("message {value}"))?;
    client.on_error(|err| eprintln!("error   {err}"));

    let policy = ReconnectPolicy::new()
        .initial_delay(Duration::from_millis(250))
        .max_attempts(Some(2));
    let supervisor = ReconnectSupervisor::spawn(Arc::clone(&client), policy)?;

    client.connect().await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    client.close().await;
    supervisor.stop().await;

    println!("{:?}", client.stats());
    Ok(())
}
