// SPDX-License-Identifier: GPL-3.0-only

//! Storage settings service
//!
//! Loads the preconfigured and persistent setting stores, keeps the catalog
//! (and its transient setting timers) alive, and stores persistent settings
//! again on shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use storage_service::config::DEFAULT_CONFIG_PATH;
use storage_service::{ServiceConfig, SettingCatalog, TokioTimerService};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "storage-settings-service")]
#[command(about = "Keep storage configuration settings and their on-disk stores")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storage_service=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!(
        "Starting storage settings service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = ServiceConfig::load(&args.config)?;
    tracing::info!(
        "Settings stores: preconfigured {:?}, persistent {:?}",
        config.preconfigured_dir,
        config.persistent_dir
    );

    let timers = Arc::new(TokioTimerService::current());
    let catalog = Arc::new(SettingCatalog::new(&config, timers));

    let loader = Arc::clone(&catalog);
    let report = tokio::task::spawn_blocking(move || loader.load_all()).await??;
    for failure in &report.failures {
        tracing::warn!(
            "Could not load {} settings of {}: {}",
            failure.kind,
            failure.class_name,
            failure.message
        );
    }
    tracing::info!(
        "Catalog ready with {} classes",
        catalog.classes().len()
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal");

    let saver = Arc::clone(&catalog);
    tokio::task::spawn_blocking(move || saver.save_all()).await??;

    tracing::info!("Storage settings service shutting down");
    Ok(())
}
