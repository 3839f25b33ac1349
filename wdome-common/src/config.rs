//! Configuration loading and root folder resolution
//!
//! Root folder resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `WDOME_ROOT_FOLDER`
//! 3. TOML config file `root_folder`
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or partial TOML file never stops startup: absent sections take their
//! compiled defaults and a warning is logged.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "WDOME_ROOT_FOLDER";

/// Environment variable overriding the config file path
pub const CONFIG_PATH_ENV: &str = "WDOME_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "weather_dome.db";

/// Snow state document file name inside the root folder
pub const SNOW_STATE_FILE: &str = "snow_state.json";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub thresholds: ThresholdConfig,
    pub capacity: CapacityConfig,
    pub melt: MeltConfig,
    pub snow: SnowConfig,
    pub schedule: ScheduleConfig,
    pub calibration: CalibrationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing level when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Advisory / warning / extreme breakpoints of a piecewise-linear hazard ramp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RampThresholds {
    pub advisory: f64,
    pub warning: f64,
    pub extreme: f64,
}

impl RampThresholds {
    fn is_ascending(&self) -> bool {
        self.advisory > 0.0 && self.advisory < self.warning && self.warning < self.extreme
    }
}

/// Hazard thresholds shifting the scorer ramps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Wind speed ramp (mph)
    pub wind: RampThresholds,
    /// Ice accumulation ramp (in)
    pub ice: RampThresholds,
    pub heat_advisory_f: f64,
    pub cold_advisory_f: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            wind: RampThresholds {
                advisory: 35.0,
                warning: 58.0,
                extreme: 74.0,
            },
            ice: RampThresholds {
                advisory: 0.1,
                warning: 0.25,
                extreme: 0.5,
            },
            heat_advisory_f: 95.0,
            cold_advisory_f: 10.0,
        }
    }
}

/// Territory peak capacities (MW)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    pub coned_peak_mw: f64,
    pub or_peak_mw: f64,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            coned_peak_mw: 13_400.0,
            or_peak_mw: 1_300.0,
        }
    }
}

impl CapacityConfig {
    pub fn peak_mw(&self, territory: crate::Territory) -> f64 {
        match territory {
            crate::Territory::ConEd => self.coned_peak_mw,
            crate::Territory::OrangeRockland => self.or_peak_mw,
        }
    }
}

/// Melt risk thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeltConfig {
    pub freezing_point_f: f64,
    pub warm_threshold_f: f64,
    /// Warming rate (°F/hr) considered "rapid"
    pub rapid_warming_rate_f_per_hr: f64,
}

impl Default for MeltConfig {
    fn default() -> Self {
        Self {
            freezing_point_f: 32.0,
            warm_threshold_f: 40.0,
            rapid_warming_rate_f_per_hr: 1.5,
        }
    }
}

/// Snow depth estimation options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowConfig {
    /// Operator-supplied depth (in); bypasses automatic estimation when > 0
    pub manual_depth_override_in: f64,
}

impl SnowConfig {
    pub fn override_depth(&self) -> Option<f64> {
        (self.manual_depth_override_in.is_finite() && self.manual_depth_override_in > 0.0)
            .then_some(self.manual_depth_override_in)
    }
}

/// Periodic job cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub weather_ingest_minutes: u64,
    pub impact_compute_minutes: u64,
    pub calibration_minutes: u64,
    /// Upper bound on any single provider call
    pub provider_timeout_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            weather_ingest_minutes: 15,
            impact_compute_minutes: 30,
            calibration_minutes: 720,
            provider_timeout_secs: 15,
        }
    }
}

/// Calibration sample requirements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub lookback_hours: i64,
    pub min_snapshots: usize,
    pub min_assessments: usize,
    pub pairing_window_minutes: i64,
    pub min_pairs: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            lookback_hours: 24,
            min_snapshots: 5,
            min_assessments: 3,
            pairing_window_minutes: 30,
            min_pairs: 5,
        }
    }
}

impl TomlConfig {
    /// Parse TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the first file found, logging where it came from
    ///
    /// Search order: explicit path → `WDOME_CONFIG` → user config dir → /etc.
    /// An explicit path that does not exist is an error; otherwise a missing file
    /// yields defaults with a warning.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let (config, source) = Self::load_with_source(explicit_path)?;
        source.log();
        Ok(config)
    }

    /// Same search as [`TomlConfig::load`] without logging
    ///
    /// For callers that install tracing after reading the configuration; they
    /// call [`ConfigSource::log`] once the subscriber is up.
    pub fn load_with_source(explicit_path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        if let Some(path) = explicit_path {
            let content = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Read config {} failed: {}", path.display(), e))
            })?;
            let source = ConfigSource {
                path: Some(path.to_path_buf()),
                missing_env_path: None,
            };
            return Ok((Self::from_toml_str(&content)?, source));
        }

        let source = find_config_file();
        let config = match &source.path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        Ok((config, source))
    }

    /// Reject configurations that would make the scorer ramps meaningless
    pub fn validate(&self) -> Result<()> {
        if !self.thresholds.wind.is_ascending() {
            return Err(Error::Config(
                "wind thresholds must satisfy 0 < advisory < warning < extreme".to_string(),
            ));
        }
        if !self.thresholds.ice.is_ascending() {
            return Err(Error::Config(
                "ice thresholds must satisfy 0 < advisory < warning < extreme".to_string(),
            ));
        }
        if self.capacity.coned_peak_mw <= 0.0 || self.capacity.or_peak_mw <= 0.0 {
            return Err(Error::Config("peak capacities must be positive".to_string()));
        }
        if self.melt.freezing_point_f >= self.melt.warm_threshold_f {
            return Err(Error::Config(
                "melt freezing point must be below the warm threshold".to_string(),
            ));
        }
        if self.melt.rapid_warming_rate_f_per_hr <= 0.0 {
            return Err(Error::Config("rapid warming rate must be positive".to_string()));
        }
        let schedule = &self.schedule;
        if schedule.weather_ingest_minutes == 0
            || schedule.impact_compute_minutes == 0
            || schedule.calibration_minutes == 0
            || schedule.provider_timeout_secs == 0
        {
            return Err(Error::Config("schedule intervals must be non-zero".to_string()));
        }
        if self.calibration.lookback_hours <= 0 || self.calibration.pairing_window_minutes <= 0 {
            return Err(Error::Config(
                "calibration lookback and pairing window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the configuration was read from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSource {
    /// File that was read; `None` means compiled defaults
    pub path: Option<PathBuf>,
    /// `WDOME_CONFIG` value that named a missing file
    pub missing_env_path: Option<PathBuf>,
}

impl ConfigSource {
    pub fn log(&self) {
        if let Some(path) = &self.missing_env_path {
            warn!("{} points at missing file {}", CONFIG_PATH_ENV, path.display());
        }
        match &self.path {
            Some(path) => info!("Configuration loaded from {}", path.display()),
            None => warn!("No config file found, using compiled defaults"),
        }
    }
}

fn find_config_file() -> ConfigSource {
    let mut source = ConfigSource::default();

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            source.path = Some(path);
            return source;
        }
        source.missing_env_path = Some(path);
    }

    let user_config = dirs::config_dir().map(|d| d.join("weather-dome").join("config.toml"));
    if let Some(path) = user_config.filter(|p| p.exists()) {
        source.path = Some(path);
        return source;
    }

    let system_config = PathBuf::from("/etc/weather-dome/config.toml");
    source.path = system_config.exists().then_some(system_config);
    source
}

/// OS-dependent compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("weather-dome"))
            .unwrap_or_else(|| PathBuf::from("./weather_dome_data"));

        Self {
            root_folder,
            log_level: "info".to_string(),
        }
    }
}

/// Resolves the root folder holding the database and snow state
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml_root(mut self, path: Option<PathBuf>) -> Self {
        self.toml_root = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!("{}: root folder from command line", self.module_name);
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!("{}: root folder from {}", self.module_name, ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            info!("{}: root folder from config file", self.module_name);
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and names the files inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn snow_state_path(&self) -> PathBuf {
        self.root_folder.join(SNOW_STATE_FILE)
    }
}
