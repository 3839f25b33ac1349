//! In-memory repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use wdome_common::{OutageSnapshot, Result, WeatherAlert, WeatherObservation};

use super::{CalibrationRepository, ImpactRepository, OutageRepository, WeatherRepository};
use crate::models::clamp_correction;
use crate::types::{CalibrationRecord, ForecastImpactPoint, ImpactAssessment};

#[derive(Default)]
struct Tables {
    observations: HashMap<String, Vec<WeatherObservation>>,
    forecasts: HashMap<String, Vec<WeatherObservation>>,
    alerts: HashMap<String, Vec<WeatherAlert>>,
    snapshots: HashMap<String, Vec<OutageSnapshot>>,
    assessments: HashMap<String, Vec<ImpactAssessment>>,
    forecast_impacts: HashMap<String, Vec<ForecastImpactPoint>>,
    calibrations: HashMap<String, Vec<CalibrationRecord>>,
}

/// Repository keeping every table in process memory
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn insert_sorted<T, K: PartialOrd>(rows: &mut Vec<T>, row: T, key: impl Fn(&T) -> K) {
    let row_key = key(&row);
    let at = rows.partition_point(|r| key(r) <= row_key);
    rows.insert(at, row);
}

#[async_trait]
impl WeatherRepository for MemoryRepository {
    async fn save_observation(&self, obs: &WeatherObservation) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.observations.entry(obs.zone_id.clone()).or_default();
        insert_sorted(rows, obs.clone(), |o| o.observed_at);
        Ok(())
    }

    async fn latest_observation(&self, zone_id: &str) -> Result<Option<WeatherObservation>> {
        let tables = self.tables.read().await;
        Ok(tables.observations.get(zone_id).and_then(|rows| rows.last().cloned()))
    }

    async fn observations_between(
        &self,
        zone_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<WeatherObservation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .observations
            .get(zone_id)
            .map(|rows| {
                rows.iter()
                    .filter(|o| o.observed_at >= since && o.observed_at < until)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn replace_forecast(&self, zone_id: &str, points: &[WeatherObservation]) -> Result<()> {
        let mut sorted = points.to_vec();
        sorted.sort_by_key(|p| p.observed_at);
        self.tables.write().await.forecasts.insert(zone_id.to_string(), sorted);
        Ok(())
    }

    async fn forecast(&self, zone_id: &str) -> Result<Vec<WeatherObservation>> {
        let tables = self.tables.read().await;
        Ok(tables.forecasts.get(zone_id).cloned().unwrap_or_default())
    }

    async fn replace_alerts(&self, zone_id: &str, alerts: &[WeatherAlert]) -> Result<()> {
        self.tables
            .write()
            .await
            .alerts
            .insert(zone_id.to_string(), alerts.to_vec());
        Ok(())
    }

    async fn active_alerts(&self, zone_id: &str, at: DateTime<Utc>) -> Result<Vec<WeatherAlert>> {
        let tables = self.tables.read().await;
        Ok(tables
            .alerts
            .get(zone_id)
            .map(|rows| {
                rows.iter()
                    .filter(|a| a.expires.map_or(true, |exp| exp > at))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl OutageRepository for MemoryRepository {
    async fn save_snapshot(&self, snapshot: &OutageSnapshot) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.snapshots.entry(snapshot.zone_id.clone()).or_default();
        insert_sorted(rows, snapshot.clone(), |s| s.snapshot_at);
        Ok(())
    }

    async fn latest_snapshot(&self, zone_id: &str) -> Result<Option<OutageSnapshot>> {
        let tables = self.tables.read().await;
        Ok(tables.snapshots.get(zone_id).and_then(|rows| rows.last().cloned()))
    }

    async fn snapshots_since(&self, zone_id: &str, since: DateTime<Utc>) -> Result<Vec<OutageSnapshot>> {
        let tables = self.tables.read().await;
        Ok(tables
            .snapshots
            .get(zone_id)
            .map(|rows| rows.iter().filter(|s| s.snapshot_at >= since).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ImpactRepository for MemoryRepository {
    async fn save_assessment(&self, assessment: &ImpactAssessment) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables.assessments.entry(assessment.zone_id.clone()).or_default();
        insert_sorted(rows, assessment.clone(), |a| a.assessed_at);
        Ok(())
    }

    async fn current_assessments_since(
        &self,
        zone_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ImpactAssessment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .assessments
            .get(zone_id)
            .map(|rows| {
                rows.iter()
                    .filter(|a| a.forecast_hour == 0 && a.assessed_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn replace_forecast_impacts(&self, zone_id: &str, points: &[ForecastImpactPoint]) -> Result<()> {
        self.tables
            .write()
            .await
            .forecast_impacts
            .insert(zone_id.to_string(), points.to_vec());
        Ok(())
    }

    async fn forecast_impacts(&self, zone_id: &str) -> Result<Vec<ForecastImpactPoint>> {
        let tables = self.tables.read().await;
        Ok(tables.forecast_impacts.get(zone_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl CalibrationRepository for MemoryRepository {
    async fn save_calibration(&self, record: &CalibrationRecord) -> Result<()> {
        let mut record = record.clone();
        record.correction_ratio = clamp_correction(record.correction_ratio);
        let mut tables = self.tables.write().await;
        let rows = tables.calibrations.entry(record.zone_id.clone()).or_default();
        insert_sorted(rows, record, |r| r.computed_at);
        Ok(())
    }

    async fn latest_calibration(&self, zone_id: &str) -> Result<Option<CalibrationRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.calibrations.get(zone_id).and_then(|rows| rows.last().cloned()))
    }

    async fn latest_corrections(&self) -> Result<HashMap<String, f64>> {
        let tables = self.tables.read().await;
        Ok(tables
            .calibrations
            .iter()
            .filter_map(|(zone_id, rows)| {
                rows.last()
                    .map(|r| (zone_id.clone(), clamp_correction(r.correction_ratio)))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use wdome_common::Provenance;

    #[tokio::test]
    async fn test_observations_kept_in_time_order() {
        let repo = MemoryRepository::new();
        let now = Utc::now();
        for hours in [1, 3, 2] {
            let obs = WeatherObservation::new("CONED-MAN", Provenance::Observed, now - Duration::hours(hours));
            repo.save_observation(&obs).await.unwrap();
        }
        let rows = repo
            .observations_between("CONED-MAN", now - Duration::hours(5), now)
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.windows(2).all(|w| w[0].observed_at <= w[1].observed_at));
        let latest = repo.latest_observation("CONED-MAN").await.unwrap().unwrap();
        assert_eq!(latest.observed_at, now - Duration::hours(1));
    }

    #[tokio::test]
    async fn test_expired_alerts_hidden() {
        let repo = MemoryRepository::new();
        let now = Utc::now();
        let alerts = vec![
            WeatherAlert {
                alert_id: "old".to_string(),
                zone_id: "OR-ORA".to_string(),
                expires: Some(now - Duration::hours(1)),
                ..Default::default()
            },
            WeatherAlert {
                alert_id: "live".to_string(),
                zone_id: "OR-ORA".to_string(),
                expires: Some(now + Duration::hours(6)),
                ..Default::default()
            },
        ];
        repo.replace_alerts("OR-ORA", &alerts).await.unwrap();
        let active = repo.active_alerts("OR-ORA", now).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].alert_id, "live");
    }
}
