mod cli;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Commands};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docshift_core::app::{App, AppBuilder, ExecutionStrategy, StatusBody};
use docshift_core::config::{
    Config, config_warnings, load_config, load_config_from_env, validate_config,
};
use docshift_core::queue::JobQueue as _;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Warnings to log at startup. `validate` prints them itself.
fn startup_warnings(command: &Commands, config: &Config) -> Vec<String> {
    match command {
        Commands::Validate => Vec::new(),
        _ => config_warnings(config),
    }
}

fn load(config_path: Option<&Path>) -> Result<Config> {
    let config = match config_path {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => load_config_from_env().context("failed to load config from environment")?,
    };
    validate_config(&config).context("invalid configuration")?;
    Ok(config)
}

fn build_app(config: &Config) -> Result<App> {
    AppBuilder::from_config(config)
        .context("failed to wire application")?
        .build()
        .context("failed to build application")
}

async fn convert(config: &Config, file: &Path, wait_secs: u64) -> Result<()> {
    let app = build_app(config)?;
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let filename = file.file_name().and_then(|n| n.to_str());

    let workers = match config.worker.strategy {
        ExecutionStrategy::Deferred => Some(app.spawn_workers(config.worker.concurrency)),
        ExecutionStrategy::Inline => None,
    };

    let job_id = app.intake().accept(bytes, filename).await?;
    tracing::info!(%job_id, "submitted {}", file.display());

    let raw_id = job_id.to_string();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(wait_secs);
    let status = loop {
        let status = app.service().status(&raw_id).await?;
        if status.is_terminal() || tokio::time::Instant::now() >= deadline {
            break status;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    if let Some(workers) = workers {
        app.queue().close().await?;
        workers.shutdown_and_join().await;
    }

    let body = StatusBody::from(status.clone());
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_terminal() {
        bail!("job {job_id} did not finish within {wait_secs}s");
    }
    Ok(())
}

async fn sweep(config: &Config) -> Result<()> {
    let app = build_app(config)?;
    let report = app
        .sweeper()
        .sweep_once()
        .await
        .context("retention sweep failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn serve(config: &Config, inbox: Option<PathBuf>) -> Result<()> {
    let app = build_app(config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = app.sweeper();
    let interval = config.retention.sweep_interval();
    let sweeper_rx = shutdown_rx.clone();
    let sweeper_handle = tokio::spawn(async move { sweeper.run(interval, sweeper_rx).await });

    let inbox_dir = inbox.or_else(|| config.inbox.dir.clone());
    let (workers, inbox_handle) = match inbox_dir {
        Some(dir) => {
            let workers = match config.worker.strategy {
                ExecutionStrategy::Deferred => Some(app.spawn_workers(config.worker.concurrency)),
                ExecutionStrategy::Inline => None,
            };
            let watcher = app.inbox(dir, config.inbox.settle());
            let poll = config.inbox.poll_interval();
            let handle = tokio::spawn(watcher.run(poll, shutdown_rx));
            (workers, Some(handle))
        }
        None => {
            tracing::warn!("no inbox configured, running the retention sweeper only");
            (None, None)
        }
    };

    tracing::info!(
        workers = workers.as_ref().map_or(0, |w| w.size()),
        store = %config.store.root.display(),
        "docshift is running, press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("shutting down");

    let _ = shutdown_tx.send(true);
    if let Some(handle) = inbox_handle {
        let _ = handle.await;
    }
    let revoked = app.queue().close().await?;
    if revoked > 0 {
        tracing::warn!(revoked, "pending jobs revoked at shutdown");
    }
    if let Some(workers) = workers {
        workers.shutdown_and_join().await;
    }
    let _ = sweeper_handle.await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load(cli.config.as_deref())?;
    for warning in startup_warnings(&cli.command, &config) {
        tracing::warn!("{warning}");
    }

    match cli.command {
        Commands::Convert { file, wait_secs } => convert(&config, &file, wait_secs).await,
        Commands::Sweep => sweep(&config).await,
        Commands::Serve { inbox } => serve(&config, inbox).await,
        Commands::Validate => {
            let warnings = config_warnings(&config);
            if warnings.is_empty() {
                println!("configuration is valid");
            } else {
                println!("configuration is valid, with {} warning(s):", warnings.len());
                for warning in warnings {
                    println!("  - {warning}");
                }
            }
            Ok(())
        }
    }
}
