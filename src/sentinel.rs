//! Component wiring
//!
//! [`SentinelCore`] owns every piece of shared state (incident store,
//! cooldown map, ingress counters, table probe cache). It is constructed once
//! at process start and handed to request handlers and schedulers as an
//! `Arc`, so there is no module-level mutable state.

use crate::config::{AlertingConfig, Config};
use crate::database::{MemoryBackend, PersistenceAdapter};
use crate::error::Result;
use crate::monitoring::alerting::{
    AlertDispatcher, FanoutChannel, LogChannel, NotificationChannel, WebhookChannel,
};
use crate::monitoring::{
    BurnRateEvaluator, CaptureFacade, CronHealthTracker, FlowMetricsRecorder, HealthService,
    IncidentAdmin, IncidentStore, IngressGuard, Severity,
};
use crate::resilience::{BestEffortSink, GuardedStore, TableProbe};
use crate::utils::{SharedClock, SystemClock};
use std::sync::Arc;
use tracing::info;

pub struct SentinelCore {
    pub config: Config,
    pub clock: SharedClock,
    pub store: GuardedStore,
    pub incidents: Arc<IncidentStore>,
    pub dispatcher: Arc<AlertDispatcher>,
    pub ingress: Arc<IngressGuard>,
    pub capture: CaptureFacade,
    pub flow_metrics: FlowMetricsRecorder,
    pub burn_rates: Arc<BurnRateEvaluator>,
    pub cron: CronHealthTracker,
    pub admin: Arc<IncidentAdmin>,
    pub health: HealthService,
}

impl SentinelCore {
    /// Wire every component over the given collaborators
    pub fn new(
        config: Config,
        adapter: Arc<dyn PersistenceAdapter>,
        channel: Arc<dyn NotificationChannel>,
        clock: SharedClock,
    ) -> Self {
        let sink = BestEffortSink::new(config.persistence.timeout);
        let probe = Arc::new(TableProbe::new(
            adapter.clone(),
            clock.clone(),
            config.persistence.probe_ttl,
            config.persistence.timeout,
        ));
        let store = GuardedStore::new(adapter, probe, sink);

        let incidents = Arc::new(IncidentStore::new(
            clock.clone(),
            config.incidents.max_recent_events,
            config.incidents.top_incidents,
        ));
        let dispatcher = Arc::new(AlertDispatcher::new(
            config.alerting.cooldowns.clone(),
            channel,
            BestEffortSink::new(config.alerting.webhook_timeout),
            clock.clone(),
        ));
        let ingress = Arc::new(IngressGuard::new(&config.ingress, clock.clone()));

        let capture = CaptureFacade::new(
            ingress.clone(),
            incidents.clone(),
            dispatcher.clone(),
            config.incidents.clone(),
        );
        let flow_metrics = FlowMetricsRecorder::new(
            store.clone(),
            ingress.clone(),
            clock.clone(),
            config.incidents.max_client_context_bytes,
        );
        let burn_rates = Arc::new(BurnRateEvaluator::new(
            config.slo.clone(),
            store.clone(),
            dispatcher.clone(),
            clock.clone(),
        ));
        let cron = CronHealthTracker::new(
            store.clone(),
            dispatcher.clone(),
            clock.clone(),
            config.cron.failure_threshold,
        );
        let admin = Arc::new(IncidentAdmin::new(incidents.clone(), store.clone(), clock.clone()));
        let health = HealthService::new(
            incidents.clone(),
            admin.clone(),
            store.clone(),
            config.persistence.recent_audit_logs,
        );

        Self {
            config,
            clock,
            store,
            incidents,
            dispatcher,
            ingress,
            capture,
            flow_metrics,
            burn_rates,
            cron,
            admin,
            health,
        }
    }

    /// Build from configuration: SQLite when a database path is configured
    /// (and the `sqlite` feature is enabled), in-memory storage otherwise.
    pub async fn from_config(config: Config) -> Result<Self> {
        let adapter = open_adapter(&config).await?;
        let channel = build_channel(&config.alerting);
        Ok(Self::new(config, adapter, channel, SystemClock::shared()))
    }
}

async fn open_adapter(config: &Config) -> Result<Arc<dyn PersistenceAdapter>> {
    match &config.persistence.database_path {
        #[cfg(feature = "sqlite")]
        Some(path) => {
            let backend = crate::database::SqliteBackend::open(path).await?;
            info!(path = %path.display(), "using sqlite persistence");
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "sqlite"))]
        Some(path) => {
            tracing::warn!(
                path = %path.display(),
                "database path configured but sqlite support is not compiled in, using memory"
            );
            Ok(Arc::new(MemoryBackend::migrated()))
        }
        None => {
            info!("using in-memory persistence");
            Ok(Arc::new(MemoryBackend::migrated()))
        }
    }
}

/// Log every alert; also post warning-and-above to the webhook when configured
pub fn build_channel(config: &AlertingConfig) -> Arc<dyn NotificationChannel> {
    match &config.webhook_url {
        Some(url) if !url.trim().is_empty() => Arc::new(
            FanoutChannel::new()
                .with_channel(Arc::new(LogChannel), Severity::Info)
                .with_channel(
                    Arc::new(WebhookChannel::new(url.clone(), config.webhook_timeout)),
                    Severity::Warning,
                ),
        ),
        _ => Arc::new(LogChannel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_default_config() {
        let core = SentinelCore::from_config(Config::default()).await.unwrap();
        assert!(core.incidents.is_empty());
        assert_eq!(core.dispatcher.stats().fired, 0);
    }

    #[test]
    fn test_channel_selection() {
        let mut config = AlertingConfig::default();
        assert_eq!(build_channel(&config).name(), "log");
        config.webhook_url = Some("https://hooks.slack.test/abc".to_string());
        assert_eq!(build_channel(&config).name(), "fanout");
    }
}
