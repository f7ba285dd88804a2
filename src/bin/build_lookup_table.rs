use anyhow::{bail, Context, Result};
use clap::Parser;
use mcl_core::map::{self, ValidPositions};
use mcl_core::perception::sensors::{LookupTableBuilder, RayCastParams};
use mcl_core::{LocalizationError, MclConfig};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Precompute the lidar lookup table for a map
#[derive(Parser, Debug)]
#[command(name = "build_lookup_table", version, about)]
struct Args {
    /// TOML configuration; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to publish the table; `lookup_table.path` from the configuration when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => MclConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => MclConfig::default(),
    };
    let output = args
        .output
        .unwrap_or_else(|| config.lookup_table.path.clone());

    let grid = Arc::new(map::load_map(&config.map).context("failed to load map")?);
    let valid = ValidPositions::from_grid(&grid);
    if valid.is_empty() {
        bail!(LocalizationError::NoValidPositions);
    }
    let params = RayCastParams::from_config(&config.sensor, config.map.cells_per_unit);

    let cancel = Arc::new(AtomicBool::new(false));
    let watcher = {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping lookup table build");
                cancel.store(true, Ordering::Relaxed);
            }
        })
    };

    let build = {
        let cancel = Arc::clone(&cancel);
        let output = output.clone();
        tokio::task::spawn_blocking(move || {
            let table = LookupTableBuilder::new(grid, params).build_cancellable(&valid, &cancel)?;
            table.save(&output)
        })
    };

    let result = build.await.context("lookup table build task failed")?;
    watcher.abort();

    match result {
        Ok(()) => {
            info!(path = %output.display(), "done");
            Ok(())
        }
        Err(LocalizationError::Interrupted) => {
            bail!("build interrupted, nothing was written to {}", output.display())
        }
        Err(e) => Err(e).context("failed to build lookup table"),
    }
}
