mod achievements;
mod combat;
mod config;
mod events;
mod feed;
mod inventory;
mod kills;
mod protocol;
mod rewards;
mod sender;
mod skills;
mod state;
mod text;
mod tracker;
mod widgets;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::config::ScribeConfig;
use crate::events::{EventLog, PlayerInfoCell};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (config, config_path) = ScribeConfig::load_or_create()?;
    info!(config = %config_path.display(), "loaded configuration");
    let config = Arc::new(config);

    let log = Arc::new(EventLog::new());
    let player = Arc::new(PlayerInfoCell::new());
    let (notify_tx, notify_rx) = mpsc::channel::<String>(32);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let feed_handle = feed::spawn_feed_worker(
        Arc::clone(&config),
        Arc::clone(&log),
        Arc::clone(&player),
        notify_rx,
        shutdown_rx.clone(),
    );
    let sender_handle = sender::spawn_sender_worker(
        Arc::clone(&config),
        Arc::clone(&log),
        Arc::clone(&player),
        notify_tx,
        shutdown_rx,
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);

    feed_handle.await.context("joining feed worker")?;
    sender_handle.await.context("joining sender worker")?;
    Ok(())
}
