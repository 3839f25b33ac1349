//! wdome-ie - Impact Engine service
//!
//! Runs weather ingest, impact computation and calibration as independent
//! periodic jobs against the shared SQLite database, until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use wdome_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use wdome_common::ZoneTable;
use wdome_ie::repository::{Repository, SqliteRepository};
use wdome_ie::services::{
    CalibrationEngine, FileSnowStore, ImpactEngine, Scheduler, SnowDepthTracker, WeatherIngest,
    WeatherProvider,
};

/// Command-line arguments for wdome-ie
#[derive(Parser, Debug)]
#[command(name = "wdome-ie")]
#[command(about = "weather-dome impact scoring and self-calibration engine")]
#[command(version)]
struct Args {
    /// Root folder holding the database and snow state
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run one impact computation cycle and exit
    #[arg(long)]
    once: bool,

    /// Set the tracked snow depth of every zone (inches)
    #[arg(long, value_name = "INCHES")]
    set_snow_depth: Option<f64>,

    /// Set one zone's tracked snow depth, e.g. CONED-MAN=6.5 (repeatable)
    #[arg(long, value_name = "ZONE=INCHES", value_parser = parse_zone_depth)]
    zone_snow_depth: Vec<(String, f64)>,
}

fn parse_zone_depth(value: &str) -> std::result::Result<(String, f64), String> {
    let (zone, depth) = value
        .split_once('=')
        .ok_or_else(|| format!("expected ZONE=INCHES, got '{}'", value))?;
    let depth: f64 = depth
        .trim()
        .parse()
        .map_err(|e| format!("invalid depth '{}': {}", depth, e))?;
    if !depth.is_finite() || depth < 0.0 {
        return Err(format!("depth must be a non-negative number, got {}", depth));
    }
    Ok((zone.trim().to_string(), depth))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, config_source) =
        TomlConfig::load_with_source(args.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    wdome_ie::logging::init_tracing(&config.logging.level);

    info!("Starting wdome-ie (Impact Engine)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    config_source.log();

    // Root folder: CLI > env > TOML > OS default
    let root_folder = RootFolderResolver::new("impact-engine")
        .with_cli_arg(args.root_folder.clone())
        .with_toml_root(config.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let pool = wdome_ie::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;
    let repo: Arc<dyn Repository> = Arc::new(SqliteRepository::new(pool));

    let zones = ZoneTable::builtin().clone();
    let tracker = Arc::new(SnowDepthTracker::open(
        Box::new(FileSnowStore::new(initializer.snow_state_path())),
        zones.clone(),
    ));

    if let Some(depth) = args.set_snow_depth {
        tracker.set_all(depth);
    }
    for (zone_id, depth) in &args.zone_snow_depth {
        if zones.get(zone_id).is_none() {
            bail!("Unknown zone '{}'", zone_id);
        }
        tracker.set(zone_id, *depth);
    }

    let engine = Arc::new(ImpactEngine::new(repo.clone(), tracker, zones.clone(), &config));

    if args.once {
        let impacts = engine.compute_all_zones().await;
        for impact in &impacts {
            info!("{}", impact.summary);
        }
        return Ok(());
    }

    // Vendor adapters register here
    let providers: Vec<Arc<dyn WeatherProvider>> = Vec::new();
    let ingest = Arc::new(WeatherIngest::new(
        repo.clone(),
        providers,
        zones.clone(),
        Duration::from_secs(config.schedule.provider_timeout_secs),
    ));
    let calibration = Arc::new(CalibrationEngine::new(
        repo.clone(),
        zones,
        config.calibration.clone(),
    ));

    let mut scheduler = Scheduler::new();
    let minutes = |m: u64| Duration::from_secs(m * 60);

    scheduler.spawn_periodic("weather-ingest", minutes(config.schedule.weather_ingest_minutes), move || {
        let ingest = ingest.clone();
        async move {
            ingest.ingest_all_zones().await;
        }
    });
    scheduler.spawn_periodic("impact-compute", minutes(config.schedule.impact_compute_minutes), move || {
        let engine = engine.clone();
        async move {
            engine.compute_all_zones().await;
        }
    });
    scheduler.spawn_periodic("calibration", minutes(config.schedule.calibration_minutes), move || {
        let calibration = calibration.clone();
        async move {
            calibration.run().await;
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown requested");
    scheduler.shutdown().await;

    info!("wdome-ie stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_zone_depth() {
        assert_eq!(parse_zone_depth("CONED-MAN=6.5").unwrap(), ("CONED-MAN".to_string(), 6.5));
        assert!(parse_zone_depth("CONED-MAN").is_err());
        assert!(parse_zone_depth("CONED-MAN=-1").is_err());
        assert!(parse_zone_depth("CONED-MAN=deep").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "wdome-ie",
            "--once",
            "--zone-snow-depth",
            "OR-ORA=2",
            "--zone-snow-depth",
            "CONED-BKN=4",
        ]);
        assert!(args.once);
        assert_eq!(args.zone_snow_depth.len(), 2);
        assert_eq!(args.set_snow_depth, None);
    }
}
