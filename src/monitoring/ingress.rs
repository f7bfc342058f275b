//! Ingress guard for the capture entrypoints
//!
//! Fixed-window counters keyed by caller, e.g. `capture:client:<ip>` or
//! `flow-metric:<flow>:<user>`. When the counter store cannot answer (it
//! errors or is saturated with keys) the guard admits the request and counts
//! it in [`IngressGuard::failed_open`].

use crate::config::IngressConfig;
use crate::error::{Error, Result};
use crate::utils::SharedClock;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Counter state backing the guard
pub trait CounterStore: Send + Sync {
    /// Count one hit for `key` in the window containing `now`, returning the
    /// hits so far in that window
    fn hit(&self, key: &str, now: DateTime<Utc>, window: chrono::Duration) -> Result<u32>;
}

#[derive(Debug, Clone, Copy)]
struct FixedWindow {
    started_at: DateTime<Utc>,
    count: u32,
}

/// Process-local counters
pub struct MemoryCounterStore {
    windows: DashMap<String, FixedWindow>,
    max_keys: usize,
}

impl MemoryCounterStore {
    pub fn new(max_keys: usize) -> Self {
        Self {
            windows: DashMap::new(),
            max_keys,
        }
    }

    /// Drop windows that ended before `now`
    pub fn prune(&self, now: DateTime<Utc>, window: chrono::Duration) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| now - w.started_at < window);
        before - self.windows.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

impl CounterStore for MemoryCounterStore {
    fn hit(&self, key: &str, now: DateTime<Utc>, window: chrono::Duration) -> Result<u32> {
        if !self.windows.contains_key(key) && self.windows.len() >= self.max_keys {
            let pruned = self.prune(now, window);
            if pruned == 0 {
                return Err(Error::RateLimitExceeded(format!(
                    "counter store saturated at {} keys",
                    self.max_keys
                )));
            }
        }

        let mut entry = self.windows.entry(key.to_string()).or_insert(FixedWindow {
            started_at: now,
            count: 0,
        });
        if now - entry.started_at >= window {
            entry.started_at = now;
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);
        Ok(entry.count)
    }
}

pub struct IngressGuard {
    store: Arc<dyn CounterStore>,
    clock: SharedClock,
    enabled: bool,
    max_requests: u32,
    window: chrono::Duration,
    rejected: AtomicU64,
    failed_open: AtomicU64,
}

impl IngressGuard {
    pub fn new(config: &IngressConfig, clock: SharedClock) -> Self {
        let store = Arc::new(MemoryCounterStore::new(config.max_tracked_keys));
        Self::with_store(config, store, clock)
    }

    pub fn with_store(config: &IngressConfig, store: Arc<dyn CounterStore>, clock: SharedClock) -> Self {
        Self {
            store,
            clock,
            enabled: config.enabled,
            max_requests: config.max_requests.max(1),
            window: chrono::Duration::from_std(config.window)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
            rejected: AtomicU64::new(0),
            failed_open: AtomicU64::new(0),
        }
    }

    /// Whether a call under `key` may proceed
    pub fn is_allowed(&self, key: &str) -> bool {
        if !self.enabled {
            return true;
        }

        match self.store.hit(key, self.clock.now(), self.window) {
            Ok(count) if count <= self.max_requests => true,
            Ok(count) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(key, count, limit = self.max_requests, "ingress rate limit exceeded");
                false
            }
            Err(e) => {
                self.failed_open.fetch_add(1, Ordering::Relaxed);
                warn!(key, error = %e, "ingress counter unavailable, admitting");
                true
            }
        }
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn failed_open(&self) -> u64 {
        self.failed_open.load(Ordering::Relaxed)
    }
}
