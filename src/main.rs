//! # Herald - Controller Entry Point
//!
//! ## Initialization Sequence
//!
//! 1. **Configuration** - Defaults, config file, flags, environment
//! 2. **Store** - In-memory, optionally restored from the state file
//! 3. **Manifests** - Applied once, then watched for changes
//! 4. **Informer + Reconciler** - Cache, GitHub client (or dry run)
//! 5. **Controller** - Waits for cache sync, then runs the workers
//!
//! ## Shutdown
//!
//! Ctrl+C stops the manifest watch and the controller. Items already queued
//! are finished before exit.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use herald::cli::Cli;
use herald::config::{self, Config};
use herald_core::shutdown;
use herald_github::{CommentSender, DryRunSender, GithubClient, GithubConfig};
use herald_informer::Informer;
use herald_reconciler::{Controller, ReconcilerBuilder};
use herald_store::{InMemoryCommentApi, ManifestLoader};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::resolve(&cli, std::env::var("TOKEN").ok())
        .context("Configuration failed")?;

    init_tracing(&config.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "Herald starting");

    run(config).await
}

/// Initialize tracing; `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(config: Config) -> Result<()> {
    let api = Arc::new(match &config.state_file {
        Some(path) => InMemoryCommentApi::with_state_file(path)
            .await
            .with_context(|| format!("Failed to restore state from {}", path.display()))?,
        None => InMemoryCommentApi::new(),
    });

    let (trigger, signal) = shutdown::channel();

    let loader = Arc::new(ManifestLoader::new(&config.manifests, api.clone()));
    let summary = loader.apply().await.with_context(|| {
        format!("Failed to apply manifests from {}", config.manifests.display())
    })?;
    info!(
        created = summary.created,
        updated = summary.updated,
        deleted = summary.deleted,
        unchanged = summary.unchanged,
        "Initial manifests applied"
    );
    let watch = loader
        .spawn_watch(config.watch_debounce(), signal.clone())
        .context("Failed to watch manifest directory")?;

    let informer = Arc::new(Informer::new(api.clone(), config.resync_period()));
    let controller_config = config.controller_config();
    let target = config
        .target
        .clone()
        .context("target issue is required")?;

    let reconciler = ReconcilerBuilder::new()
        .with_lister(informer.lister())
        .with_api(api)
        .with_sender(build_sender(&config)?)
        .target(target)
        .call_timeout(controller_config.call_timeout)
        .build()
        .context("Failed to build reconciler")?;

    let controller = Arc::new(
        Controller::new(Arc::new(reconciler), controller_config)
            .context("Failed to build controller")?,
    );
    let controller_task = tokio::spawn(controller.run(informer, signal));

    info!("Herald is running. Press Ctrl+C to stop.");
    wait_for_shutdown().await;
    trigger.trigger();

    controller_task.await.context("Controller task failed")?;
    watch.await.context("Manifest watch task failed")?;

    info!("Herald stopped gracefully");
    Ok(())
}

fn build_sender(config: &Config) -> Result<Arc<dyn CommentSender>> {
    if config.dry_run {
        info!("Dry run, comments will only be logged");
        return Ok(Arc::new(DryRunSender));
    }

    let token = config
        .github
        .token
        .clone()
        .context("GitHub token is required")?;
    let mut github = GithubConfig::new(token)?
        .with_timeout(config.controller_config().call_timeout);
    if let Some(api_base) = &config.github.api_base {
        github = github.with_api_base(api_base.clone());
    }

    Ok(Arc::new(
        GithubClient::new(github).context("Failed to build GitHub client")?,
    ))
}

/// Wait for Ctrl+C.
async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(err) => error!("Failed to listen for shutdown signal: {}", err),
    }
}
