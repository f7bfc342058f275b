use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::oneshot;
use tracing::{info, warn};

use studyhub_sentinel::logging::init_logging;
use studyhub_sentinel::services::router;
use studyhub_sentinel::utils::TimeoutExt;
use studyhub_sentinel::{Config, Error, Result, SentinelCore};

mod app_config;

use app_config::{Cli, Commands};

/// How long in-flight requests get to finish after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_path(path)?,
        None => Config::load()?,
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging)?;

    info!(command = cli.command.name(), environment = ?config.environment, "studyhub-sentinel starting");

    match cli.command {
        Commands::Serve { listen } => {
            if let Some(listen) = listen {
                config.server.listen_address = listen;
            }
            serve(config).await?;
        }

        Commands::EvaluateBurnRates => {
            let core = SentinelCore::from_config(config).await?;
            let report = core.burn_rates.evaluate_burn_rates().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::CheckCron { name, threshold } => {
            let core = SentinelCore::from_config(config).await?;
            let threshold = threshold.unwrap_or(core.config.cron.failure_threshold);
            let health = core.cron.check_cron_health_with(&name, threshold).await;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }

        Commands::Migrate => migrate(&config).await?,
    }

    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    let address = config.server.listen_address.clone();
    let core = Arc::new(SentinelCore::from_config(config).await?);
    let evaluator = core.burn_rates.clone().spawn_periodic();

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(address = %address, "http api listening");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(
        axum::serve(listener, router(core))
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .into_future(),
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received, draining requests");
    evaluator.abort();
    let _ = stop_tx.send(());

    match server.with_timeout(SHUTDOWN_GRACE).await {
        Ok(Ok(result)) => result?,
        Ok(Err(e)) => return Err(Error::Internal(format!("server task failed: {}", e))),
        Err(_) => warn!(grace = ?SHUTDOWN_GRACE, "requests still in flight at shutdown"),
    }

    info!("studyhub-sentinel stopped");
    Ok(())
}

#[cfg(feature = "sqlite")]
async fn migrate(config: &Config) -> Result<()> {
    let path = config
        .persistence
        .database_path
        .as_deref()
        .ok_or_else(|| Error::Config("persistence.database_path is not set".to_string()))?;
    let backend = studyhub_sentinel::database::SqliteBackend::open(path).await?;
    backend.migrate_all().await?;
    info!(path = %path.display(), "migration complete");
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
async fn migrate(_config: &Config) -> Result<()> {
    Err(Error::Config(
        "built without the `sqlite` feature; nothing to migrate".to_string(),
    ))
}
