//! Structured logging setup
//!
//! Installs a `tracing` subscriber with an `EnvFilter` built from the
//! configured global level plus per-module overrides, writing either JSON
//! lines (production) or human-readable output (development).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Global logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    pub level: String,
    /// Module-specific log levels
    pub module_levels: HashMap<String, String>,
    /// Enable JSON output format
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_levels = HashMap::new();
        module_levels.insert("studyhub_sentinel::monitoring".to_string(), "info".to_string());
        module_levels.insert("hyper".to_string(), "warn".to_string());
        module_levels.insert("reqwest".to_string(), "warn".to_string());

        Self {
            level: "info".to_string(),
            module_levels,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Build the filter; `RUST_LOG` wins over the configured level when set
    pub fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.level));

        for (module, level) in &self.module_levels {
            let directive = format!("{}={}", module, level)
                .parse()
                .map_err(|e| Error::Config(format!("Invalid log directive for {}: {}", module, e)))?;
            filter = filter.add_directive(directive);
        }

        Ok(filter)
    }
}

/// Install the global subscriber. Calling this twice is an error.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = config.env_filter()?;

    let installed = if config.json_format {
        Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()
    } else {
        Registry::default()
            .with(filter)
            .with(fmt::layer().with_target(true).with_line_number(true))
            .try_init()
    };

    installed.map_err(|e| Error::Config(format!("Failed to install log subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json_format);
        assert!(config.module_levels.contains_key("hyper"));
    }

    #[test]
    fn test_invalid_module_level_is_rejected() {
        let mut config = LoggingConfig::default();
        config
            .module_levels
            .insert("studyhub_sentinel".to_string(), "loud".to_string());
        assert!(config.env_filter().is_err());
    }
}
