//! Repository wrapper that fails every zone-scoped call for one zone
//!
//! Used to check that one zone's storage errors never stop the others.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use wdome_common::{Error, OutageSnapshot, Result, WeatherAlert, WeatherObservation};
use wdome_ie::repository::{
    CalibrationRepository, ImpactRepository, MemoryRepository, OutageRepository, WeatherRepository,
};
use wdome_ie::types::{CalibrationRecord, ForecastImpactPoint, ImpactAssessment};

pub struct ZoneFailureRepository {
    inner: MemoryRepository,
    failing_zone: String,
}

impl ZoneFailureRepository {
    pub fn new(failing_zone: &str) -> Self {
        Self {
            inner: MemoryRepository::new(),
            failing_zone: failing_zone.to_string(),
        }
    }

    pub fn inner(&self) -> &MemoryRepository {
        &self.inner
    }

    fn check(&self, zone_id: &str) -> Result<()> {
        if zone_id == self.failing_zone {
            Err(Error::Internal(format!("storage unavailable for {}", zone_id)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WeatherRepository for ZoneFailureRepository {
    async fn save_observation(&self, obs: &WeatherObservation) -> Result<()> {
        self.check(&obs.zone_id)?;
        self.inner.save_observation(obs).await
    }

    async fn latest_observation(&self, zone_id: &str) -> Result<Option<WeatherObservation>> {
        self.check(zone_id)?;
        self.inner.latest_observation(zone_id).await
    }

    async fn observations_between(
        &self,
        zone_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<WeatherObservation>> {
        self.check(zone_id)?;
        self.inner.observations_between(zone_id, since, until).await
    }

    async fn replace_forecast(&self, zone_id: &str, points: &[WeatherObservation]) -> Result<()> {
        self.check(zone_id)?;
        self.inner.replace_forecast(zone_id, points).await
    }

    async fn forecast(&self, zone_id: &str) -> Result<Vec<WeatherObservation>> {
        self.check(zone_id)?;
        self.inner.forecast(zone_id).await
    }

    async fn replace_alerts(&self, zone_id: &str, alerts: &[WeatherAlert]) -> Result<()> {
        self.check(zone_id)?;
        self.inner.replace_alerts(zone_id, alerts).await
    }

    async fn active_alerts(&self, zone_id: &str, at: DateTime<Utc>) -> Result<Vec<WeatherAlert>> {
        self.check(zone_id)?;
        self.inner.active_alerts(zone_id, at).await
    }
}

#[async_trait]
impl OutageRepository for ZoneFailureRepository {
    async fn save_snapshot(&self, snapshot: &OutageSnapshot) -> Result<()> {
        self.check(&snapshot.zone_id)?;
        self.inner.save_snapshot(snapshot).await
    }

    async fn latest_snapshot(&self, zone_id: &str) -> Result<Option<OutageSnapshot>> {
        self.check(zone_id)?;
        self.inner.latest_snapshot(zone_id).await
    }

    async fn snapshots_since(&self, zone_id: &str, since: DateTime<Utc>) -> Result<Vec<OutageSnapshot>> {
        self.check(zone_id)?;
        self.inner.snapshots_since(zone_id, since).await
    }
}

#[async_trait]
impl ImpactRepository for ZoneFailureRepository {
    async fn save_assessment(&self, assessment: &ImpactAssessment) -> Result<()> {
        self.check(&assessment.zone_id)?;
        self.inner.save_assessment(assessment).await
    }

    async fn current_assessments_since(
        &self,
        zone_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ImpactAssessment>> {
        self.check(zone_id)?;
        self.inner.current_assessments_since(zone_id, since).await
    }

    async fn replace_forecast_impacts(&self, zone_id: &str, points: &[ForecastImpactPoint]) -> Result<()> {
        self.check(zone_id)?;
        self.inner.replace_forecast_impacts(zone_id, points).await
    }

    async fn forecast_impacts(&self, zone_id: &str) -> Result<Vec<ForecastImpactPoint>> {
        self.check(zone_id)?;
        self.inner.forecast_impacts(zone_id).await
    }
}

#[async_trait]
impl CalibrationRepository for ZoneFailureRepository {
    async fn save_calibration(&self, record: &CalibrationRecord) -> Result<()> {
        self.check(&record.zone_id)?;
        self.inner.save_calibration(record).await
    }

    async fn latest_calibration(&self, zone_id: &str) -> Result<Option<CalibrationRecord>> {
        self.check(zone_id)?;
        self.inner.latest_calibration(zone_id).await
    }

    async fn latest_corrections(&self) -> Result<HashMap<String, f64>> {
        self.inner.latest_corrections().await
    }
}
