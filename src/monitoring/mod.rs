//! Operational monitoring and incident management
//!
//! Leaves first:
//! - [`severity`] and [`fingerprint`]: pure classification and dedup keys
//! - [`incident_store`]: per-fingerprint incident lifecycle
//! - [`alerting`]: cooldown-gated dispatch and delivery channels
//! - [`burn_rate`], [`cron_health`]: scheduled evaluators that alert
//! - [`ingress`]: rate limiting in front of capture
//! - [`capture`]: the entrypoint everything else reports through

pub mod admin;
pub mod alerting;
pub mod burn_rate;
pub mod capture;
pub mod cron_health;
pub mod fingerprint;
pub mod flow_metrics;
pub mod health;
pub mod incident_store;
pub mod ingress;
pub mod severity;
pub mod types;

pub use admin::{ActionResult, Actor, AdminAuditEntry, IncidentAction, IncidentAdmin};
pub use alerting::{Alert, AlertDispatcher, LogChannel, NotificationChannel, WebhookChannel};
pub use burn_rate::{BurnRateEvaluation, BurnRateEvaluator, BurnRateReport};
pub use capture::{CaptureFacade, CaptureMeta, CaptureOutcome, CapturePayload, DropReason};
pub use cron_health::{CronExecutionRecord, CronHealth, CronHealthTracker, CronStatus};
pub use fingerprint::fingerprint;
pub use flow_metrics::{FlowMetricInput, FlowMetricSample, FlowMetricsRecorder, FlowStatus};
pub use health::{HealthReport, HealthService};
pub use incident_store::{Event, EventInput, Incident, IncidentSnapshot, IncidentStatus, IncidentStore};
pub use ingress::{CounterStore, IngressGuard, MemoryCounterStore};
pub use severity::{classify, ClassifyInput};
pub use types::{Context, EventSource, Severity};
