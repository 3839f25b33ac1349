//! Storage seams for the engine
//!
//! The orchestrators never touch global caches: they receive an
//! `Arc<dyn Repository>` and read the freshest weather, outage, impact and
//! calibration data through it. [`SqliteRepository`] backs the service;
//! [`MemoryRepository`] backs tests and dry runs.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use wdome_common::{OutageSnapshot, Result, WeatherAlert, WeatherObservation};

use crate::types::{CalibrationRecord, ForecastImpactPoint, ImpactAssessment};

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

/// Current observations, forecast timelines and alerts
#[async_trait]
pub trait WeatherRepository: Send + Sync {
    async fn save_observation(&self, obs: &WeatherObservation) -> Result<()>;

    async fn latest_observation(&self, zone_id: &str) -> Result<Option<WeatherObservation>>;

    /// Observations with `since <= observed_at < until`, ascending
    async fn observations_between(
        &self,
        zone_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<WeatherObservation>>;

    /// Replace the zone's forecast timeline
    async fn replace_forecast(&self, zone_id: &str, points: &[WeatherObservation]) -> Result<()>;

    /// Latest forecast timeline, ascending by valid time
    async fn forecast(&self, zone_id: &str) -> Result<Vec<WeatherObservation>>;

    /// Replace the zone's active alerts
    async fn replace_alerts(&self, zone_id: &str, alerts: &[WeatherAlert]) -> Result<()>;

    /// Alerts that have not expired at `at`
    async fn active_alerts(&self, zone_id: &str, at: DateTime<Utc>) -> Result<Vec<WeatherAlert>>;
}

/// Append-only outage snapshot log
#[async_trait]
pub trait OutageRepository: Send + Sync {
    async fn save_snapshot(&self, snapshot: &OutageSnapshot) -> Result<()>;

    async fn latest_snapshot(&self, zone_id: &str) -> Result<Option<OutageSnapshot>>;

    /// Snapshots at or after `since`, ascending
    async fn snapshots_since(&self, zone_id: &str, since: DateTime<Utc>) -> Result<Vec<OutageSnapshot>>;
}

/// Impact assessment log and latest forecast impacts
#[async_trait]
pub trait ImpactRepository: Send + Sync {
    async fn save_assessment(&self, assessment: &ImpactAssessment) -> Result<()>;

    /// Current-conditions (forecast_hour 0) assessments at or after `since`, ascending
    async fn current_assessments_since(
        &self,
        zone_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ImpactAssessment>>;

    async fn replace_forecast_impacts(&self, zone_id: &str, points: &[ForecastImpactPoint]) -> Result<()>;

    async fn forecast_impacts(&self, zone_id: &str) -> Result<Vec<ForecastImpactPoint>>;
}

/// Append-only calibration record log
#[async_trait]
pub trait CalibrationRepository: Send + Sync {
    async fn save_calibration(&self, record: &CalibrationRecord) -> Result<()>;

    /// Most recent record for a zone
    async fn latest_calibration(&self, zone_id: &str) -> Result<Option<CalibrationRecord>>;

    /// Most recent correction ratio per zone, clamped to [0.3, 3.0]
    async fn latest_corrections(&self) -> Result<HashMap<String, f64>>;
}

/// Everything the orchestrators need
pub trait Repository:
    WeatherRepository + OutageRepository + ImpactRepository + CalibrationRepository
{
}

impl<T> Repository for T where
    T: WeatherRepository + OutageRepository + ImpactRepository + CalibrationRepository
{
}
