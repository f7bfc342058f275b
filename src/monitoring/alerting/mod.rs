//! Alerting: payloads, delivery channels and the cooldown-gated dispatcher

pub mod alert_types;
pub mod dispatcher;
pub mod notification_channels;

pub use alert_types::{burn_rate_key, cron_health_key, Alert};
pub use dispatcher::{AlertDispatcher, DispatchStats};
pub use notification_channels::{FanoutChannel, LogChannel, NotificationChannel, WebhookChannel};
