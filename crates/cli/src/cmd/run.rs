//! Run the watch daemon in the foreground

use anyhow::{Context, Result};
use cli_lib::daemon::StopReason;
use cli_lib::{config, daemon, logging};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn run(config_path: Option<&Path>, root: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let mut config = config::load(config_path)?;
    if let Some(root) = root {
        config.watch.root = Some(root);
    }
    if dry_run {
        config.remote.dry_run = true;
    }
    config.validate().context("Invalid configuration")?;

    let _guard = logging::init(&config.log)?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        info!("Interrupt received, shutting down");
        shutdown.cancel();
    });

    let summary = daemon::run(config, cancel).await?;
    if summary.reason != StopReason::Cancelled {
        anyhow::bail!("File watcher stopped unexpectedly: {}", summary.reason);
    }
    Ok(())
}
