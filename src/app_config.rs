//! Command-line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "studyhub-sentinel")]
#[command(about = "Incident management and SLO monitoring for StudyHub", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file; defaults to config/<SENTINEL_ENV>.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level regardless of the configured level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Serve the HTTP API and run the periodic burn-rate evaluation
    Serve {
        /// Override the configured listen address
        #[arg(long)]
        listen: Option<String>,
    },

    /// Evaluate every flow's burn rate once and print the report
    EvaluateBurnRates,

    /// Report a cron job's health, alerting when it crossed the threshold
    CheckCron {
        name: String,
        /// Override the configured consecutive-failure threshold
        #[arg(long)]
        threshold: Option<usize>,
    },

    /// Create the monitoring tables in the configured database
    Migrate,
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Serve { .. } => "serve",
            Commands::EvaluateBurnRates => "evaluate-burn-rates",
            Commands::CheckCron { .. } => "check-cron",
            Commands::Migrate => "migrate",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_cron() {
        let cli = Cli::try_parse_from([
            "studyhub-sentinel",
            "check-cron",
            "nightly-digest",
            "--threshold",
            "2",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Commands::CheckCron {
                name: "nightly-digest".to_string(),
                threshold: Some(2),
            }
        );
        assert_eq!(cli.command.name(), "check-cron");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "studyhub-sentinel",
            "serve",
            "--config",
            "config/production.toml",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("config/production.toml")));
        assert_eq!(cli.command, Commands::Serve { listen: None });
    }
}
