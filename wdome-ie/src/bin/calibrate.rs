//! wdome-calibrate - one-shot calibration run
//!
//! Compares recent predicted and observed outages for every zone, stores a
//! calibration record per qualifying zone and prints the report.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use wdome_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use wdome_common::ZoneTable;
use wdome_ie::repository::{Repository, SqliteRepository};
use wdome_ie::services::CalibrationEngine;

#[derive(Parser, Debug)]
#[clap(name = "wdome-calibrate")]
#[clap(about = "Recalibrate outage predictions against observed outages")]
struct Args {
    /// Root folder holding the database
    #[clap(long)]
    root_folder: Option<PathBuf>,

    /// Configuration file (TOML)
    #[clap(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Calibrate a single zone
    #[clap(long)]
    zone: Option<String>,

    /// Lookback window in hours (overrides configuration)
    #[clap(long)]
    lookback_hours: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, config_source) =
        TomlConfig::load_with_source(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(hours) = args.lookback_hours {
        config.calibration.lookback_hours = hours;
    }
    config.validate().context("Invalid configuration")?;

    wdome_ie::logging::init_tracing(&config.logging.level);

    info!("Starting wdome-calibrate v{}", env!("CARGO_PKG_VERSION"));
    config_source.log();

    let root_folder = RootFolderResolver::new("calibrate")
        .with_cli_arg(args.root_folder)
        .with_toml_root(config.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let pool = wdome_ie::db::init_database_pool(&initializer.database_path())
        .await
        .context("Failed to open database")?;
    let repo: Arc<dyn Repository> = Arc::new(SqliteRepository::new(pool));

    let zones = match &args.zone {
        Some(zone_id) => match ZoneTable::builtin().get(zone_id) {
            Some(zone) => ZoneTable::new(vec![zone.clone()]),
            None => bail!("Unknown zone '{}'", zone_id),
        },
        None => ZoneTable::builtin().clone(),
    };

    let engine = CalibrationEngine::new(repo, zones, config.calibration.clone());
    let report = engine.run().await;
    println!("{}", report.render());

    if !report.failed.is_empty() {
        bail!("Calibration failed for {} zone(s)", report.failed.len());
    }
    Ok(())
}
