//! Configuration management for the monitoring core
//!
//! This module provides centralized configuration with:
//! - Environment-based loading (development, testing, staging, production)
//! - Environment variable overrides (`SENTINEL_*`)
//! - Validation of thresholds before any component is constructed
//!
//! Every section defaults sensibly, so a partial TOML file (or none at all)
//! yields a usable configuration.

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: Environment,
    pub incidents: IncidentConfig,
    pub alerting: AlertingConfig,
    pub slo: SloConfig,
    pub cron: CronConfig,
    pub ingress: IngressConfig,
    pub persistence: PersistenceConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Environment enumeration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Testing,
    Staging,
    Production,
}

impl Environment {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            "testing" | "test" => Environment::Testing,
            _ => Environment::Development,
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            Environment::Production => "production.toml",
            Environment::Staging => "staging.toml",
            Environment::Testing => "testing.toml",
            Environment::Development => "development.toml",
        }
    }
}

/// Incident store limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IncidentConfig {
    /// Events retained per incident; older events are dropped
    pub max_recent_events: usize,
    /// Incidents included in a snapshot's top list
    pub top_incidents: usize,
    /// Longest message kept on a captured event
    pub max_message_len: usize,
    /// Largest serialized context kept on a client-reported event
    pub max_client_context_bytes: usize,
}

impl Default for IncidentConfig {
    fn default() -> Self {
        Self {
            max_recent_events: 20,
            top_incidents: 25,
            max_message_len: 2_000,
            max_client_context_bytes: 4_096,
        }
    }
}

/// Per-severity alert cooldowns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    #[serde(with = "humantime_serde")]
    pub critical: Duration,
    #[serde(with = "humantime_serde")]
    pub error: Duration,
    #[serde(with = "humantime_serde")]
    pub warning: Duration,
    #[serde(with = "humantime_serde")]
    pub info: Duration,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            critical: Duration::from_secs(60),
            error: Duration::from_secs(5 * 60),
            warning: Duration::from_secs(15 * 60),
            info: Duration::from_secs(60 * 60),
        }
    }
}

/// Alert dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    pub cooldowns: CooldownConfig,
    /// Slack-compatible webhook; alerts are only logged when unset
    pub webhook_url: Option<String>,
    #[serde(with = "humantime_serde")]
    pub webhook_timeout: Duration,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            cooldowns: CooldownConfig::default(),
            webhook_url: None,
            webhook_timeout: Duration::from_secs(5),
        }
    }
}

/// One rolling window the burn rate is evaluated over
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BurnRateWindow {
    pub label: String,
    pub hours: u32,
    pub warning_burn_rate: f64,
    pub critical_burn_rate: f64,
}

impl BurnRateWindow {
    pub fn new(label: &str, hours: u32, warning_burn_rate: f64, critical_burn_rate: f64) -> Self {
        Self {
            label: label.to_string(),
            hours,
            warning_burn_rate,
            critical_burn_rate,
        }
    }
}

/// A tracked business flow and its availability objective
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowSlo {
    pub name: String,
    /// Overrides `SloConfig::default_target_pct` for this flow
    #[serde(default)]
    pub target_pct: Option<f64>,
}

impl FlowSlo {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            target_pct: None,
        }
    }
}

/// SLO and burn-rate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SloConfig {
    pub default_target_pct: f64,
    pub flows: Vec<FlowSlo>,
    pub windows: Vec<BurnRateWindow>,
    /// Below this many samples a window carries no signal
    pub min_samples: usize,
    /// Upper bound on samples pulled per flow and window
    pub max_samples_per_window: usize,
    #[serde(with = "humantime_serde")]
    pub evaluation_interval: Duration,
    pub persist_snapshots: bool,
}

impl Default for SloConfig {
    fn default() -> Self {
        Self {
            default_target_pct: 99.5,
            flows: vec![
                FlowSlo::named("login"),
                FlowSlo::named("today_load"),
                FlowSlo::named("task_mutation"),
                FlowSlo::named("focus_session_save"),
            ],
            windows: vec![
                BurnRateWindow::new("1h", 1, 6.0, 14.4),
                BurnRateWindow::new("6h", 6, 3.0, 6.0),
                BurnRateWindow::new("24h", 24, 1.0, 3.0),
            ],
            min_samples: 5,
            max_samples_per_window: 10_000,
            evaluation_interval: Duration::from_secs(5 * 60),
            persist_snapshots: true,
        }
    }
}

impl SloConfig {
    /// Target availability for a flow, falling back to the default
    pub fn target_for(&self, flow: &str) -> f64 {
        self.flows
            .iter()
            .find(|f| f.name == flow)
            .and_then(|f| f.target_pct)
            .unwrap_or(self.default_target_pct)
    }
}

/// Scheduled-job health configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CronConfig {
    pub failure_threshold: usize,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
        }
    }
}

/// Ingress rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    pub enabled: bool,
    pub max_requests: u32,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Distinct keys tracked before the limiter stops admitting new state
    pub max_tracked_keys: usize,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 60,
            window: Duration::from_secs(60),
            max_tracked_keys: 50_000,
        }
    }
}

/// Persistence adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// SQLite database path; in-memory storage is used when unset
    pub database_path: Option<PathBuf>,
    /// How long a table availability probe result is trusted
    #[serde(with = "humantime_serde")]
    pub probe_ttl: Duration,
    /// Bound on every best-effort storage call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Audit rows included in the health report
    pub recent_audit_logs: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            probe_ttl: Duration::from_secs(30),
            timeout: Duration::from_secs(3),
            recent_audit_logs: 20,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_address: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8787".to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let environment =
            Environment::from_name(&env::var("SENTINEL_ENV").unwrap_or_else(|_| "development".into()));

        let config_path = Self::get_config_path(&environment);
        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            tracing::info!(path = %config_path.display(), "config file not found, using defaults");
            Config::default()
        };
        config.environment = environment;
        config.finish()
    }

    /// Load an explicitly named file, still honouring environment overrides
    pub fn load_path(path: &Path) -> Result<Self> {
        let mut config = Self::load_from_file(path)?;
        if let Ok(name) = env::var("SENTINEL_ENV") {
            config.environment = Environment::from_name(&name);
        }
        config.finish()
    }

    fn finish(mut self) -> Result<Self> {
        self.override_from_env()?;
        self.validate()?;
        Ok(self)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn get_config_path(environment: &Environment) -> PathBuf {
        let base_path = env::var("SENTINEL_CONFIG_PATH").unwrap_or_else(|_| "config".to_string());
        PathBuf::from(base_path).join(environment.file_name())
    }

    /// Override configuration with environment variables
    fn override_from_env(&mut self) -> Result<()> {
        if let Ok(val) = env::var("SENTINEL_LISTEN_ADDRESS") {
            self.server.listen_address = val;
        }

        if let Ok(val) = env::var("SENTINEL_DATABASE_PATH") {
            self.persistence.database_path = Some(PathBuf::from(val));
        }

        if let Ok(val) = env::var("SENTINEL_ALERT_WEBHOOK") {
            self.alerting.webhook_url = Some(val);
        }

        if let Ok(val) = env::var("SENTINEL_SLO_TARGET") {
            self.slo.default_target_pct = val
                .parse()
                .map_err(|_| Error::Config("Invalid SLO target".to_string()))?;
        }

        if let Ok(val) = env::var("SENTINEL_INGRESS_MAX_REQUESTS") {
            self.ingress.max_requests = val
                .parse()
                .map_err(|_| Error::Config("Invalid ingress max requests".to_string()))?;
        }

        if let Ok(val) = env::var("SENTINEL_LOG_LEVEL") {
            self.logging.level = val;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.incidents.max_recent_events == 0 {
            return Err(Error::Config("max_recent_events must be > 0".to_string()));
        }

        if self.incidents.top_incidents == 0 {
            return Err(Error::Config("top_incidents must be > 0".to_string()));
        }

        let cooldowns = &self.alerting.cooldowns;
        if [cooldowns.critical, cooldowns.error, cooldowns.warning, cooldowns.info]
            .iter()
            .any(Duration::is_zero)
        {
            return Err(Error::Config("Alert cooldowns must be non-zero".to_string()));
        }

        let valid_target = |t: f64| t > 0.0 && t < 100.0;
        if !valid_target(self.slo.default_target_pct) {
            return Err(Error::Config(
                "SLO target must be between 0 and 100 (exclusive)".to_string(),
            ));
        }

        for flow in &self.slo.flows {
            if flow.name.trim().is_empty() {
                return Err(Error::Config("Flow names cannot be empty".to_string()));
            }
            if let Some(target) = flow.target_pct {
                if !valid_target(target) {
                    return Err(Error::Config(format!(
                        "SLO target for flow '{}' must be between 0 and 100",
                        flow.name
                    )));
                }
            }
        }

        if self.slo.windows.is_empty() {
            return Err(Error::Config("At least one burn-rate window is required".to_string()));
        }

        for window in &self.slo.windows {
            if window.hours == 0 {
                return Err(Error::Config(format!("Window '{}' must span > 0 hours", window.label)));
            }
            if window.warning_burn_rate >= window.critical_burn_rate {
                return Err(Error::Config(format!(
                    "Window '{}': warning burn rate must be below critical",
                    window.label
                )));
            }
        }

        if self.cron.failure_threshold == 0 {
            return Err(Error::Config("Cron failure threshold must be > 0".to_string()));
        }

        if self.ingress.enabled && (self.ingress.max_requests == 0 || self.ingress.window.is_zero()) {
            return Err(Error::Config(
                "Ingress limit and window must be > 0 when enabled".to_string(),
            ));
        }

        if self.persistence.timeout.is_zero() {
            return Err(Error::Config("Persistence timeout must be > 0".to_string()));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, contents)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }
}
