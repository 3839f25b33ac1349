//! SQLite-backed repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use wdome_common::{OutageSnapshot, Result, WeatherAlert, WeatherObservation};

use super::{CalibrationRepository, ImpactRepository, OutageRepository, WeatherRepository};
use crate::db;
use crate::types::{CalibrationRecord, ForecastImpactPoint, ImpactAssessment};

/// Repository over a shared connection pool
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl WeatherRepository for SqliteRepository {
    async fn save_observation(&self, obs: &WeatherObservation) -> Result<()> {
        db::weather::insert_observation(&self.pool, obs).await
    }

    async fn latest_observation(&self, zone_id: &str) -> Result<Option<WeatherObservation>> {
        db::weather::latest_observation(&self.pool, zone_id).await
    }

    async fn observations_between(
        &self,
        zone_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<WeatherObservation>> {
        db::weather::observations_between(&self.pool, zone_id, since, until).await
    }

    async fn replace_forecast(&self, zone_id: &str, points: &[WeatherObservation]) -> Result<()> {
        db::weather::replace_forecast(&self.pool, zone_id, points).await
    }

    async fn forecast(&self, zone_id: &str) -> Result<Vec<WeatherObservation>> {
        db::weather::load_forecast(&self.pool, zone_id).await
    }

    async fn replace_alerts(&self, zone_id: &str, alerts: &[WeatherAlert]) -> Result<()> {
        db::weather::replace_alerts(&self.pool, zone_id, alerts).await
    }

    async fn active_alerts(&self, zone_id: &str, at: DateTime<Utc>) -> Result<Vec<WeatherAlert>> {
        db::weather::active_alerts(&self.pool, zone_id, at).await
    }
}

#[async_trait]
impl OutageRepository for SqliteRepository {
    async fn save_snapshot(&self, snapshot: &OutageSnapshot) -> Result<()> {
        db::outages::insert_snapshot(&self.pool, snapshot).await
    }

    async fn latest_snapshot(&self, zone_id: &str) -> Result<Option<OutageSnapshot>> {
        db::outages::latest_snapshot(&self.pool, zone_id).await
    }

    async fn snapshots_since(&self, zone_id: &str, since: DateTime<Utc>) -> Result<Vec<OutageSnapshot>> {
        db::outages::snapshots_since(&self.pool, zone_id, since).await
    }
}

#[async_trait]
impl ImpactRepository for SqliteRepository {
    async fn save_assessment(&self, assessment: &ImpactAssessment) -> Result<()> {
        db::impacts::insert_assessment(&self.pool, assessment).await
    }

    async fn current_assessments_since(
        &self,
        zone_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ImpactAssessment>> {
        db::impacts::current_assessments_since(&self.pool, zone_id, since).await
    }

    async fn replace_forecast_impacts(&self, zone_id: &str, points: &[ForecastImpactPoint]) -> Result<()> {
        db::impacts::replace_forecast_impacts(&self.pool, zone_id, points).await
    }

    async fn forecast_impacts(&self, zone_id: &str) -> Result<Vec<ForecastImpactPoint>> {
        db::impacts::load_forecast_impacts(&self.pool, zone_id).await
    }
}

#[async_trait]
impl CalibrationRepository for SqliteRepository {
    async fn save_calibration(&self, record: &CalibrationRecord) -> Result<()> {
        db::calibration::insert_record(&self.pool, record).await
    }

    async fn latest_calibration(&self, zone_id: &str) -> Result<Option<CalibrationRecord>> {
        db::calibration::latest_record(&self.pool, zone_id).await
    }

    async fn latest_corrections(&self) -> Result<HashMap<String, f64>> {
        db::calibration::latest_corrections(&self.pool).await
    }
}
