//! Admission control and graceful shutdown.
//!
//! Every request holds an [`InflightGuard`] for as long as it is being served,
//! including the background task of a streaming response. Shutdown runs in
//! three phases:
//!
//! 1. Refuse new requests with [`Error::ServiceShutdown`].
//! 2. Wait up to the configured timeout for in-flight requests to drain.
//! 3. Cancel the shutdown token, which every request scope derives from.

use crate::server::telemetry::{decrement_streams_inflight, increment_streams_inflight};
use core::time::Duration;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use todohash_tonic_core::Error;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct Lifecycle {
    draining: AtomicBool,
    inflight: AtomicUsize,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl Lifecycle {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            draining: AtomicBool::new(false),
            inflight: AtomicUsize::new(0),
            shutdown_token: CancellationToken::new(),
            shutdown_timeout,
        }
    }

    /// Registers a new in-flight request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once shutdown has begun.
    pub fn admit(self: &Arc<Self>) -> Result<InflightGuard, Error> {
        if self.draining.load(Ordering::Acquire) {
            return Err(Error::ServiceShutdown);
        }
        self.inflight.fetch_add(1, Ordering::AcqRel);
        increment_streams_inflight();
        Ok(InflightGuard {
            lifecycle: Arc::clone(self),
        })
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    /// Cancelled in the last phase of [`Lifecycle::shutdown`].
    pub const fn token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    pub async fn shutdown(&self) {
        // === Phase 0: Stop accepting new requests ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new requests");
        self.draining.store(true, Ordering::Release);

        // === Phase 1: Wait for in-flight requests to drain ===
        #[cfg(feature = "tracing")]
        tracing::info!("Draining in-flight requests ({} active)", self.inflight());
        let drained = timeout(self.shutdown_timeout, async {
            while self.inflight() > 0 {
                sleep(DRAIN_POLL_INTERVAL).await;
            }
        })
        .await;

        match drained {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("All in-flight requests drained");
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Graceful drain timed out ({} requests still active)",
                    self.inflight()
                );
            }
        }

        // === Phase 2: Cancel whatever is left ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Cancelling remaining work via shutdown token");
        self.shutdown_token.cancel();
    }
}

/// Marks one request as in flight until dropped.
#[derive(Debug)]
pub struct InflightGuard {
    lifecycle: Arc<Lifecycle>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.lifecycle.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_streams_inflight();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn guards_track_inflight_requests() {
        let lifecycle = Arc::new(Lifecycle::new(Duration::from_secs(1)));
        let first = lifecycle.admit().unwrap();
        let second = lifecycle.admit().unwrap();
        assert_eq!(lifecycle.inflight(), 2);

        drop(first);
        assert_eq!(lifecycle.inflight(), 1);
        drop(second);
        assert_eq!(lifecycle.inflight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_drain_then_cancels() {
        let lifecycle = Arc::new(Lifecycle::new(Duration::from_secs(3)));
        let guard = lifecycle.admit().unwrap();

        let start = Instant::now();
        let shutdown = tokio::spawn({
            let lifecycle = Arc::clone(&lifecycle);
            async move { lifecycle.shutdown().await }
        });

        sleep(Duration::from_millis(450)).await;
        assert!(matches!(lifecycle.admit(), Err(Error::ServiceShutdown)));
        assert!(!lifecycle.token().is_cancelled());

        drop(guard);
        shutdown.await.unwrap();
        assert!(lifecycle.token().is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_gives_up_after_timeout() {
        let lifecycle = Arc::new(Lifecycle::new(Duration::from_secs(3)));
        let _stuck = lifecycle.admit().unwrap();

        let start = Instant::now();
        lifecycle.shutdown().await;

        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert!(lifecycle.token().is_cancelled());
        assert_eq!(lifecycle.inflight(), 1);
    }
}
