//! Shared fixtures for the integration suites
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use studyhub_sentinel::database::{Filter, MemoryBackend, PersistenceAdapter, Row};
use studyhub_sentinel::{Alert, Config, Error, ManualClock, NotificationChannel, Result, SentinelCore};

/// Channel that keeps every alert it was asked to deliver
#[derive(Default)]
pub struct RecordingChannel {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingChannel {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.alerts
            .lock()
            .iter()
            .map(|a| a.deduplication_key.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.alerts.lock().len()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        self.alerts.lock().push(alert.clone());
        Ok(())
    }
}

/// Adapter that errors or hangs on every call
pub struct FailingAdapter {
    pub hang: Option<Duration>,
}

impl FailingAdapter {
    pub fn erroring() -> Self {
        Self { hang: None }
    }

    pub fn hanging(delay: Duration) -> Self {
        Self { hang: Some(delay) }
    }

    async fn fail<T>(&self) -> Result<T> {
        if let Some(hang) = self.hang {
            tokio::time::sleep(hang).await;
        }
        Err(Error::Database("connection reset by peer".to_string()))
    }
}

#[async_trait]
impl PersistenceAdapter for FailingAdapter {
    async fn insert(&self, _table: &str, _rows: Vec<Row>) -> Result<()> {
        self.fail().await
    }

    async fn select(&self, _table: &str, _filter: &Filter, _limit: usize) -> Result<Vec<Row>> {
        self.fail().await
    }
}

pub struct Harness {
    pub core: Arc<SentinelCore>,
    pub clock: Arc<ManualClock>,
    pub channel: Arc<RecordingChannel>,
}

/// Quick timeouts so degraded-storage tests stay fast
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.persistence.timeout = Duration::from_millis(200);
    config.alerting.webhook_timeout = Duration::from_millis(200);
    config
}

pub fn harness() -> Harness {
    harness_with(test_config(), Arc::new(MemoryBackend::migrated()))
}

pub fn harness_with(config: Config, adapter: Arc<dyn PersistenceAdapter>) -> Harness {
    let clock = ManualClock::starting_now();
    let channel = Arc::new(RecordingChannel::default());
    let core = SentinelCore::new(config, adapter, channel.clone(), clock.clone());
    Harness {
        core: Arc::new(core),
        clock,
        channel,
    }
}
