//! Cooldown-gated alert dispatch
//!
//! Each deduplication key remembers when it last fired. An alert fires when
//! the key has never fired or its last firing is older than the cooldown for
//! the alert's severity. The check and the cooldown update happen under the
//! key's map entry, so concurrent evaluators cannot double-fire a key.
//! Delivery happens afterwards, bounded and best-effort: the cooldown
//! advances even when the channel is down.

use super::alert_types::Alert;
use super::notification_channels::NotificationChannel;
use crate::config::CooldownConfig;
use crate::monitoring::types::Severity;
use crate::resilience::BestEffortSink;
use crate::utils::SharedClock;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub fired: u64,
    pub suppressed: u64,
}

pub struct AlertDispatcher {
    cooldowns: DashMap<String, DateTime<Utc>>,
    windows: CooldownConfig,
    channel: Arc<dyn NotificationChannel>,
    sink: BestEffortSink,
    clock: SharedClock,
    fired: AtomicU64,
    suppressed: AtomicU64,
}

impl AlertDispatcher {
    pub fn new(
        windows: CooldownConfig,
        channel: Arc<dyn NotificationChannel>,
        sink: BestEffortSink,
        clock: SharedClock,
    ) -> Self {
        Self {
            cooldowns: DashMap::new(),
            windows,
            channel,
            sink,
            clock,
            fired: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Minimum time between two firings of one key at this severity
    pub fn cooldown_for(&self, severity: Severity) -> chrono::Duration {
        let window = match severity {
            Severity::Critical => self.windows.critical,
            Severity::Error => self.windows.error,
            Severity::Warning => self.windows.warning,
            Severity::Info => self.windows.info,
        };
        chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX)
    }

    /// Fire the alert unless its key is cooling down. Returns whether it fired.
    pub async fn dispatch(&self, alert: Alert) -> bool {
        let now = self.clock.now();
        let cooldown = self.cooldown_for(alert.severity);

        let fire = match self.cooldowns.entry(alert.deduplication_key.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
            Entry::Occupied(mut occupied) => {
                if now - *occupied.get() > cooldown {
                    occupied.insert(now);
                    true
                } else {
                    false
                }
            }
        };

        if !fire {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            debug!(
                key = %alert.deduplication_key,
                severity = %alert.severity,
                "alert suppressed by cooldown"
            );
            return false;
        }

        self.fired.fetch_add(1, Ordering::Relaxed);
        info!(
            key = %alert.deduplication_key,
            severity = %alert.severity,
            channel = self.channel.name(),
            "alert fired"
        );
        self.sink.run("notify", self.channel.send(&alert)).await;
        true
    }

    /// When a key last fired, if ever
    pub fn last_fired(&self, key: &str) -> Option<DateTime<Utc>> {
        self.cooldowns.get(key).map(|at| *at)
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            fired: self.fired.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
        }
    }
}
