//! Optional reconnection on top of the client.
//!
//! The client itself never reconnects: a connection failure leaves it
//! `Closed`. A [`ReconnectSupervisor`] watches the client's state and, when a
//! failure (not [`close()`](crate::EventStreamClient::close)) closed it, waits
//! an exponential backoff delay and calls `connect()` again.
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use hpx_eventsource::{ChannelTransport, EventStreamClient, ReconnectPolicy, ReconnectSupervisor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (transport, _sessions) = ChannelTransport::new(64);
//! let client = Arc::new(EventStreamClient::new("stream://feed", transport)?);
//! let policy = ReconnectPolicy::new()
//!     .initial_delay(Duration::from_millis(200))
//!     .max_attempts(Some(5));
//!
//! let supervisor = ReconnectSupervisor::spawn(Arc::clone(&client), policy)?;
//! client.connect().await;
//! // ...
//! client.close().await;
//! supervisor.stop().await;
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Duration};

use rand::RngExt;
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    client::{ClientState, EventStreamClient},
    error::{ClientError, ClientResult},
};

/// Backoff settings for a [`ReconnectSupervisor`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub backoff_factor: f64,
    /// Random jitter factor (0.0–1.0).
    pub jitter: f64,
    /// Attempts per outage before giving up (None = infinite).
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            jitter: 0.1,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Create a policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial delay.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff factor.
    #[must_use]
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the jitter factor.
    #[must_use]
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the maximum number of attempts per outage.
    #[must_use]
    pub fn max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Validate the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if any field has an invalid value.
    pub fn validate(&self) -> ClientResult<()> {
        if self.initial_delay.is_zero() {
            return Err(ClientError::config("Initial reconnect delay must be > 0"));
        }
        if self.max_delay < self.initial_delay {
            return Err(ClientError::config(
                "Max reconnect delay must be >= initial reconnect delay",
            ));
        }
        if self.backoff_factor < 1.0 || !self.backoff_factor.is_finite() {
            return Err(ClientError::config("Backoff factor must be >= 1.0"));
        }
        if !(0.0..=1.0).contains(&self.jitter) || !self.jitter.is_finite() {
            return Err(ClientError::config("Jitter must be between 0.0 and 1.0"));
        }
        Ok(())
    }

    /// Delay before attempt number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let initial = self.initial_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();
        let exponent = self.backoff_factor.powf(f64::from(attempt));
        let base = (initial * exponent).min(max);

        if self.jitter == 0.0 {
            return Duration::from_secs_f64(base);
        }

        let mut rng = rand::rng();
        let randomized = rng.random_range(0.0..=base);
        let blended = base * (1.0 - self.jitter) + randomized * self.jitter;
        Duration::from_secs_f64(blended)
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}

/// Background task that reconnects a client after connection failures.
pub struct ReconnectSupervisor {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ReconnectSupervisor {
    /// Start supervising `client`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy is invalid.
    pub fn spawn(client: Arc<EventStreamClient>, policy: ReconnectPolicy) -> ClientResult<Self> {
        policy.validate()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(supervise(client, policy, shutdown_rx));
        Ok(Self { shutdown_tx, task })
    }

    /// Stop supervising. The client is left in its current state.
    pub async fn stop(self) {
        // Err means the task already ended.
        let _ = self.shutdown_tx.send(());
        if let Err(err) = self.task.await
            && err.is_panic()
        {
            error!("Reconnect supervisor task panicked");
        }
    }

    /// Returns `true` while the supervisor task is running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

async fn supervise(
    client: Arc<EventStreamClient>,
    policy: ReconnectPolicy,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut states = client.watch_state();
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => return,

            changed = states.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }

        let state = *states.borrow_and_update();
        match state {
            ClientState::Open => {
                if attempt > 0 {
                    info!(endpoint = %client.endpoint(), attempt, "Reconnected");
                }
                attempt = 0;
            }
            ClientState::Closed if client.close_requested() => {
                debug!(endpoint = %client.endpoint(), "Closed by request, not reconnecting");
                attempt = 0;
            }
            ClientState::Closed => {
                if policy.exhausted(attempt) {
                    warn!(endpoint = %client.endpoint(), attempts = attempt, "Max reconnect attempts exceeded");
                    continue;
                }

                let delay = policy.delay_for(attempt);
                attempt = attempt.saturating_add(1);
                warn!(
                    endpoint = %client.endpoint(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Reconnecting after backoff"
                );

                tokio::select! {
                    biased;

                    _ = &mut shutdown_rx => return,
                    () = tokio::time::sleep(delay) => {}
                }

                if !client.reconnect_after_failure().await {
                    debug!(endpoint = %client.endpoint(), "Reconnect skipped, client state changed");
                }
            }
            ClientState::Idle | ClientState::Connecting => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert_eq!(policy.backoff_factor, 2.0);
        assert_eq!(policy.jitter, 0.1);
        assert!(policy.max_attempts.is_none());
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_delay_without_jitter() {
        let policy = ReconnectPolicy::new()
            .initial_delay(Duration::from_millis(125))
            .max_delay(Duration::from_millis(375))
            .jitter(0.0);

        assert_eq!(policy.delay_for(0), Duration::from_millis(125));
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        // Capped at max_delay.
        assert_eq!(policy.delay_for(2), Duration::from_millis(375));
        assert_eq!(policy.delay_for(10), Duration::from_millis(375));
    }

    #[test]
    fn test_delay_with_jitter_stays_in_range() {
        let policy = ReconnectPolicy::new()
            .initial_delay(Duration::from_millis(125))
            .jitter(0.5);

        for _ in 0..32 {
            let delay = policy.delay_for(0);
            assert!(delay >= Duration::from_millis(62));
            assert!(delay <= Duration::from_millis(126));
        }
    }

    #[test]
    fn test_exhausted() {
        let policy = ReconnectPolicy::new().max_attempts(Some(2));
        assert!(!policy.exhausted(1));
        assert!(policy.exhausted(2));
        assert!(!ReconnectPolicy::new().exhausted(u32::MAX));
    }

    #[test]
    fn test_validation_invalid_backoff() {
        let result = ReconnectPolicy::new().backoff_factor(0.5).validate();
        assert_eq!(
            result.expect_err("should fail"),
            ClientError::config("Backoff factor must be >= 1.0")
        );
    }

    #[test]
    fn test_validation_invalid_jitter() {
        assert!(ReconnectPolicy::new().jitter(1.5).validate().is_err());
        assert!(ReconnectPolicy::new().jitter(-0.1).validate().is_err());
        assert!(ReconnectPolicy::new().jitter(0.0).validate().is_ok());
        assert!(ReconnectPolicy::new().jitter(1.0).validate().is_ok());
    }

    #[tokio::test]
    async fn test_stop_joins_task() {
        let (transport, _sessions) = crate::ChannelTransport::new(4);
        let client = Arc::new(EventStreamClient::new("stream://test", transport).expect("client"));
        let supervisor =
            ReconnectSupervisor::spawn(Arc::clone(&client), ReconnectPolicy::new()).expect("spawn");
        assert!(supervisor.is_running());

        supervisor.stop().await;
        // The task's clone of the client was released by the join.
        assert_eq!(Arc::strong_count(&client), 1);
    }

    #[test]
    fn test_validation_delays() {
        assert!(ReconnectPolicy::new()
            .initial_delay(Duration::ZERO)
            .validate()
            .is_err());
        assert!(ReconnectPolicy::new()
            .initial_delay(Duration::from_secs(10))
            .max_delay(Duration::from_secs(5))
            .validate()
            .is_err());
    }
}
