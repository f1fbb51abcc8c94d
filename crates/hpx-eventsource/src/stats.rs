//! Client counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated by the receive loop.
#[derive(Debug, Default)]
pub(crate) struct ClientMetrics {
    pub(crate) connections_opened: AtomicU64,
    pub(crate) frames_received: AtomicU64,
    pub(crate) frames_dispatched: AtomicU64,
    pub(crate) frames_discarded: AtomicU64,
    pub(crate) dispatch_errors: AtomicU64,
    pub(crate) connection_errors: AtomicU64,
    pub(crate) unhandled_errors: AtomicU64,
}

impl ClientMetrics {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ClientStats {
        ClientStats {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dispatched: self.frames_dispatched.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
            dispatch_errors: self.dispatch_errors.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            unhandled_errors: self.unhandled_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the client's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Connections successfully opened.
    pub connections_opened: u64,
    /// Frames read from any connection.
    pub frames_received: u64,
    /// Frames delivered to a listener.
    pub frames_dispatched: u64,
    /// Frames with no listener for their event name.
    pub frames_discarded: u64,
    /// Frames whose payload failed to decode.
    pub dispatch_errors: u64,
    /// Connection failures.
    pub connection_errors: u64,
    /// Errors dropped because no error handler was registered.
    pub unhandled_errors: u64,
}

impl ClientStats {
    /// Fraction of received frames that failed to decode.
    pub fn error_rate(&self) -> f64 {
        if self.frames_received == 0 {
            0.0
        } else {
            self.dispatch_errors as f64 / self.frames_received as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let metrics = ClientMetrics::default();
        ClientMetrics::incr(&metrics.frames_received);
        ClientMetrics::incr(&metrics.frames_received);
        ClientMetrics::incr(&metrics.dispatch_errors);

        let stats = metrics.snapshot();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.dispatch_errors, 1);
        assert_eq!(stats.frames_dispatched, 0);
        assert!((stats.error_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_error_rate_empty() {
        assert_eq!(ClientStats::default().error_rate(), 0.0);
    }
}
