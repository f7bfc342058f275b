//! Best-effort side effects
//!
//! Audit inserts, snapshot writes and notification calls go through a
//! [`BestEffortSink`]. The call is bounded by a timeout, its failure is logged
//! and counted, and the caller only ever sees `Option<T>`.

use crate::utils::{bounded, TimeoutError};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Default)]
struct SinkStats {
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

/// Counters for a sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStatsSnapshot {
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
}

#[derive(Debug, Clone)]
pub struct BestEffortSink {
    timeout: Duration,
    stats: Arc<SinkStats>,
}

impl BestEffortSink {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            stats: Arc::new(SinkStats::default()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a side effect; `None` when it failed or exceeded the timeout
    pub async fn run<F, T, E>(&self, operation: &str, future: F) -> Option<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        match bounded(self.timeout, future).await {
            Ok(value) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(TimeoutError::Timeout(after)) => {
                self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
                warn!(operation, timeout_ms = after.as_millis() as u64, "best-effort call timed out, dropped");
                None
            }
            Err(TimeoutError::OperationError(error)) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(operation, %error, "best-effort call failed, dropped");
                None
            }
        }
    }

    pub fn stats(&self) -> SinkStatsSnapshot {
        SinkStatsSnapshot {
            completed: self.stats.completed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            timed_out: self.stats.timed_out.load(Ordering::Relaxed),
        }
    }
}
