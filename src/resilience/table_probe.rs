//! Table availability probe
//!
//! A per-table breaker: a probe result is cached for `ttl`, after which the
//! next caller re-probes. Writers that hit `TableMissing` trip the breaker
//! immediately so the following calls skip the store until the TTL expires.

use crate::database::{Filter, PersistenceAdapter};
use crate::utils::{bounded, SharedClock};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedProbe {
    availability: Availability,
    expires_at: DateTime<Utc>,
}

/// Cached availability checks for persistence tables
pub struct TableProbe {
    adapter: Arc<dyn PersistenceAdapter>,
    clock: SharedClock,
    ttl: chrono::Duration,
    timeout: Duration,
    cache: DashMap<String, CachedProbe>,
}

impl TableProbe {
    pub fn new(
        adapter: Arc<dyn PersistenceAdapter>,
        clock: SharedClock,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            adapter,
            clock,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(30)),
            timeout,
            cache: DashMap::new(),
        }
    }

    /// Availability of a table, probing the store when the cached result expired
    pub async fn probe(&self, table: &str) -> Availability {
        let now = self.clock.now();
        if let Some(cached) = self.cache.get(table) {
            if cached.expires_at > now {
                return cached.availability;
            }
        }

        let availability =
            match bounded(self.timeout, self.adapter.select(table, &Filter::new(), 1)).await {
                Ok(_) => Availability::Available,
                Err(e) => {
                    debug!(table, error = %e, "table probe failed, treating as unavailable");
                    Availability::Unavailable
                }
            };

        self.store(table, availability);
        availability
    }

    pub async fn is_available(&self, table: &str) -> bool {
        self.probe(table).await.is_available()
    }

    /// Trip the breaker for a table after a failed write
    pub fn mark_unavailable(&self, table: &str) {
        warn!(table, ttl_secs = self.ttl.num_seconds(), "table marked unavailable");
        self.store(table, Availability::Unavailable);
    }

    /// Forget a cached result so the next call re-probes
    pub fn invalidate(&self, table: &str) {
        self.cache.remove(table);
    }

    /// Cached result without probing, if one is still fresh
    pub fn cached(&self, table: &str) -> Option<Availability> {
        let now = self.clock.now();
        self.cache
            .get(table)
            .filter(|c| c.expires_at > now)
            .map(|c| c.availability)
    }

    fn store(&self, table: &str, availability: Availability) {
        let expires_at = self.clock.now() + self.ttl;
        self.cache.insert(
            table.to_string(),
            CachedProbe {
                availability,
                expires_at,
            },
        );
    }
}
