//! Notification channels
//!
//! The dispatcher decides whether an alert fires; a channel only delivers it.
//! Channels return errors, and the dispatcher logs and swallows them.

use super::alert_types::Alert;
use crate::error::{Error, Result};
use crate::monitoring::types::Severity;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Outbound alert transport
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, alert: &Alert) -> Result<()>;
}

/// Writes alerts to the log. Used when no webhook is configured.
#[derive(Debug, Default, Clone)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        match alert.severity {
            Severity::Critical | Severity::Error => error!(
                key = %alert.deduplication_key,
                severity = %alert.severity,
                summary = %alert.summary,
                "ALERT {}", alert.title
            ),
            Severity::Warning => warn!(
                key = %alert.deduplication_key,
                summary = %alert.summary,
                "ALERT {}", alert.title
            ),
            Severity::Info => info!(
                key = %alert.deduplication_key,
                summary = %alert.summary,
                "ALERT {}", alert.title
            ),
        }
        Ok(())
    }
}

/// Slack-compatible incoming webhook
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    fn color(severity: Severity) -> &'static str {
        match severity {
            Severity::Critical => "#8B0000",
            Severity::Error => "#FF0000",
            Severity::Warning => "#FFA500",
            Severity::Info => "#36A64F",
        }
    }

    fn icon(severity: Severity) -> &'static str {
        match severity {
            Severity::Critical => ":rotating_light:",
            Severity::Error => ":red_circle:",
            Severity::Warning => ":warning:",
            Severity::Info => ":information_source:",
        }
    }

    /// Slack attachment payload for an alert
    pub fn payload(alert: &Alert) -> serde_json::Value {
        let icon = Self::icon(alert.severity);
        json!({
            "text": format!("{} {}", icon, alert.title),
            "attachments": [{
                "color": Self::color(alert.severity),
                "title": alert.title,
                "text": alert.summary,
                "fields": [
                    {"title": "Severity", "value": alert.severity.as_str(), "short": true},
                    {"title": "Key", "value": &alert.deduplication_key, "short": true},
                    {"title": "Details", "value": alert.details.to_string(), "short": false}
                ],
                "footer": "StudyHub Sentinel",
                "ts": alert.triggered_at.timestamp(),
                "mrkdwn_in": ["text", "fields"]
            }]
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&Self::payload(alert))
            .send()
            .await?;

        if response.status().is_success() {
            debug!(channel = self.name(), key = %alert.deduplication_key, "webhook notification sent");
            Ok(())
        } else {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "No response body".to_string());
            Err(Error::Notification(format!(
                "{} returned status {}: {}",
                self.name(),
                status,
                body
            )))
        }
    }
}

/// Sends through several channels, each with its own severity floor
#[derive(Default)]
pub struct FanoutChannel {
    channels: Vec<(Arc<dyn NotificationChannel>, Severity)>,
}

impl FanoutChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>, min_severity: Severity) -> Self {
        self.channels.push((channel, min_severity));
        self
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait]
impl NotificationChannel for FanoutChannel {
    fn name(&self) -> &str {
        "fanout"
    }

    /// Delivers to every eligible channel concurrently. Succeeds when at least
    /// one delivered, or none was eligible.
    async fn send(&self, alert: &Alert) -> Result<()> {
        let eligible: Vec<&Arc<dyn NotificationChannel>> = self
            .channels
            .iter()
            .filter(|(channel, min_severity)| {
                let eligible = alert.severity >= *min_severity;
                if !eligible {
                    debug!(channel = channel.name(), key = %alert.deduplication_key, "below channel severity floor");
                }
                eligible
            })
            .map(|(channel, _)| channel)
            .collect();

        let results = join_all(eligible.iter().map(|channel| channel.send(alert))).await;

        let mut delivered = 0usize;
        let mut errors = Vec::new();
        for (channel, result) in eligible.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(channel = channel.name(), error = %e, "channel delivery failed");
                    errors.push(format!("{}: {}", channel.name(), e));
                }
            }
        }

        if delivered > 0 || errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Notification(format!(
                "all channels failed: {}",
                errors.join("; ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationChannel for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, alert: &Alert) -> Result<()> {
            if self.fail {
                return Err(Error::Notification("down".into()));
            }
            self.sent.lock().push(alert.deduplication_key.clone());
            Ok(())
        }
    }

    fn alert(severity: Severity) -> Alert {
        Alert::new("Checkout failing", severity, "5 errors", "fp_9", Utc::now())
    }

    #[test]
    fn test_slack_payload_shape() {
        let payload = WebhookChannel::payload(&alert(Severity::Critical));
        assert_eq!(payload["attachments"][0]["color"], "#8B0000");
        assert_eq!(payload["attachments"][0]["fields"][1]["value"], "fp_9");
        assert!(payload["text"].as_str().unwrap().contains("Checkout failing"));

        let channel = WebhookChannel::new("https://hooks.example.test/T000/B000", Duration::from_secs(1));
        assert_eq!(channel.name(), "webhook");
    }

    #[tokio::test]
    async fn test_fanout_respects_severity_floor() {
        let pager = Arc::new(Recording::default());
        let chat = Arc::new(Recording::default());
        let fanout = FanoutChannel::new()
            .with_channel(pager.clone(), Severity::Critical)
            .with_channel(chat.clone(), Severity::Warning);

        fanout.send(&alert(Severity::Warning)).await.unwrap();
        assert!(pager.sent.lock().is_empty());
        assert_eq!(chat.sent.lock().len(), 1);

        fanout.send(&alert(Severity::Critical)).await.unwrap();
        assert_eq!(pager.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_fanout_fails_only_when_every_channel_fails() {
        let broken = Arc::new(Recording {
            fail: true,
            ..Default::default()
        });
        let working = Arc::new(Recording::default());

        let partial = FanoutChannel::new()
            .with_channel(broken.clone(), Severity::Info)
            .with_channel(working, Severity::Info);
        assert!(partial.send(&alert(Severity::Error)).await.is_ok());

        let all_broken = FanoutChannel::new().with_channel(broken, Severity::Info);
        assert!(all_broken.send(&alert(Severity::Error)).await.is_err());
    }

    #[tokio::test]
    async fn test_log_channel_never_fails() {
        assert!(LogChannel.send(&alert(Severity::Info)).await.is_ok());
    }
}
