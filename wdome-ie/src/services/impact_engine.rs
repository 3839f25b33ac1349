//! Impact engine
//!
//! Runs every hazard model for every zone once per compute cycle:
//!
//! 1. maintain the zone's tracked snow depth (snowfall in, melt out)
//! 2. resolve the effective depth through the priority chain
//! 3. melt risk, then outage risk with live outages and the melt score
//! 4. vegetation, load, equipment, jobs and crews
//! 5. overall score through the shared weighting policy
//! 6. summary of the material hazards
//!
//! The current impact is appended to the assessment log, and the zone's
//! forecast timeline is re-scored with simulated snow depth and decaying
//! outages.

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use wdome_common::config::TomlConfig;
use wdome_common::{time, Provenance, Result, WeatherObservation, ZoneDefinition, ZoneTable};

use crate::models::hazard::{clamp_score, round1};
use crate::models::weighting::{melt_active, weights};
use crate::models::{
    clamp_correction, CrewDeploymentModel, EquipmentStress, EquipmentStressModel, JobForecastModel,
    LoadForecast, LoadForecastModel, MeltRisk, MeltRiskModel, OutageRisk, OutageRiskModel,
    RiskLevel, VegetationRisk, VegetationRiskModel,
};
use crate::repository::Repository;
use crate::services::snow_depth::{ResolvedDepth, SnowDepthResolver, MIN_SIGNIFICANT_DEPTH_IN};
use crate::services::snow_tracker::{melt_decay, SnowDepthTracker};
use crate::types::{ForecastImpactPoint, ImpactAssessment, ZoneImpact};

/// Observation history window fed to the melt model (hours)
pub const HISTORY_WINDOW_HOURS: i64 = 48;

/// Forecast points per emitted impact point
pub const FORECAST_SAMPLE_STRIDE: usize = 3;

/// Half-life of active outages during forecast simulation (hours)
pub const OUTAGE_HALF_LIFE_HOURS: f64 = 24.0;

/// Longest gap credited to tracker maintenance in one cycle (hours)
const MAX_MAINTENANCE_HOURS: f64 = 24.0;

/// Forecast history points kept for the melt model
const FORECAST_HISTORY_POINTS: usize = 48;

/// All scorers, built once from configuration
#[derive(Debug, Clone)]
pub struct ImpactModels {
    pub outage: OutageRiskModel,
    pub melt: MeltRiskModel,
    pub vegetation: VegetationRiskModel,
    pub load: LoadForecastModel,
    pub equipment: EquipmentStressModel,
    pub jobs: JobForecastModel,
    pub crew: CrewDeploymentModel,
}

impl ImpactModels {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            outage: OutageRiskModel::new(&config.thresholds),
            melt: MeltRiskModel::new(&config.melt),
            vegetation: VegetationRiskModel::new(),
            load: LoadForecastModel::new(&config.capacity),
            equipment: EquipmentStressModel::new(),
            jobs: JobForecastModel::new(),
            crew: CrewDeploymentModel::new(),
        }
    }
}

/// Per-cycle orchestrator for all zones
pub struct ImpactEngine {
    repo: Arc<dyn Repository>,
    tracker: Arc<SnowDepthTracker>,
    zones: ZoneTable,
    models: ImpactModels,
    resolver: SnowDepthResolver,
    freezing_f: f64,
}

impl ImpactEngine {
    pub fn new(
        repo: Arc<dyn Repository>,
        tracker: Arc<SnowDepthTracker>,
        zones: ZoneTable,
        config: &TomlConfig,
    ) -> Self {
        Self {
            repo,
            tracker,
            zones,
            models: ImpactModels::from_config(config),
            resolver: SnowDepthResolver::new(config.snow.override_depth()),
            freezing_f: config.melt.freezing_point_f,
        }
    }

    pub fn zones(&self) -> &ZoneTable {
        &self.zones
    }

    /// Compute every zone concurrently
    ///
    /// A failing zone is logged and left out; the others still complete.
    pub async fn compute_all_zones(&self) -> Vec<ZoneImpact> {
        info!("Starting impact computation for {} zones", self.zones.len());

        let corrections = match self.repo.latest_corrections().await {
            Ok(corrections) => corrections,
            Err(e) => {
                warn!("Failed to load calibration corrections, using neutral ratios: {}", e);
                HashMap::new()
            }
        };

        let results = join_all(
            self.zones
                .all()
                .iter()
                .map(|zone| self.compute_zone(zone, &corrections)),
        )
        .await;

        let mut impacts = Vec::with_capacity(results.len());
        let mut failed = 0usize;
        for (zone, result) in self.zones.all().iter().zip(results) {
            match result {
                Ok(impact) => impacts.push(impact),
                Err(e) => {
                    failed += 1;
                    error!(zone_id = %zone.zone_id, "Impact computation failed: {}", e);
                }
            }
        }

        info!(
            computed = impacts.len(),
            failed, "Impact computation complete"
        );
        impacts
    }

    /// Compute, persist and return the current impact for one zone
    pub async fn compute_zone(
        &self,
        zone: &ZoneDefinition,
        corrections: &HashMap<String, f64>,
    ) -> Result<ZoneImpact> {
        let zone_id = zone.zone_id.as_str();
        let now = time::now();

        let obs = match self.repo.latest_observation(zone_id).await? {
            Some(obs) => obs,
            None => {
                debug!(zone_id, "No cached weather, using neutral conditions");
                WeatherObservation::neutral(zone_id, now)
            }
        };
        let history = self
            .repo
            .observations_between(
                zone_id,
                obs.observed_at - Duration::hours(HISTORY_WINDOW_HOURS),
                obs.observed_at,
            )
            .await?;
        let alerts = self.repo.active_alerts(zone_id, now).await?;
        let current_outages = self
            .repo
            .latest_snapshot(zone_id)
            .await?
            .map(|s| s.outage_count);
        let correction = corrections
            .get(zone_id)
            .copied()
            .map(clamp_correction)
            .unwrap_or(1.0);

        self.maintain_tracker(zone, &obs, now).await;

        let depth = self.resolver.resolve(
            self.tracker.get(zone_id),
            &obs,
            &history,
            &alerts,
            &zone.attributes,
        );
        debug!(zone_id, depth_in = depth.depth_in, source = depth.source.as_str(), "Snow depth resolved");

        let impact = self.score_zone(zone, &obs, &history, depth, current_outages, correction, now);

        if let Err(e) = self
            .repo
            .save_assessment(&ImpactAssessment::from_impact(&impact))
            .await
        {
            warn!(zone_id, "Failed to persist impact assessment: {}", e);
        }

        let forecast = self.repo.forecast(zone_id).await?;
        if !forecast.is_empty() {
            let timeline = self.forecast_timeline(zone, &forecast, depth, current_outages, correction);
            if let Err(e) = self.repo.replace_forecast_impacts(zone_id, &timeline).await {
                warn!(zone_id, "Failed to persist forecast impacts: {}", e);
            }
        }

        Ok(impact)
    }

    /// Bring the tracked depth up to date with the latest observation
    ///
    /// Synthetic neutral weather never changes the tracker. The state write
    /// runs on the blocking pool.
    async fn maintain_tracker(&self, zone: &ZoneDefinition, obs: &WeatherObservation, now: DateTime<Utc>) {
        if obs.provenance == Provenance::Default {
            return;
        }

        let result = tokio::task::spawn_blocking({
            let tracker = self.tracker.clone();
            let zone_id = zone.zone_id.clone();
            let temp = obs.temperature();
            let snow_rate = obs.snow_rate();
            let measured = obs.measured_snow_depth();
            let freezing = self.freezing_f;

            move || match tracker.state(&zone_id) {
                Some(state) => {
                    let hours = time::hours_between(state.last_update, now).clamp(0.0, MAX_MAINTENANCE_HOURS);
                    let snowfall = if snow_rate > 0.0 && temp <= freezing {
                        snow_rate * hours
                    } else {
                        0.0
                    };
                    tracker.advance(&zone_id, snowfall, temp, hours);
                }
                None => {
                    if let Some(measured) = measured.filter(|d| *d > MIN_SIGNIFICANT_DEPTH_IN) {
                        tracker.set(&zone_id, measured);
                    }
                }
            }
        })
        .await;

        if let Err(e) = result {
            warn!(zone_id = %zone.zone_id, "Snow tracker maintenance failed: {}", e);
        }
    }

    /// Run every scorer for one observation
    ///
    /// Pure: no repository or tracker access.
    #[allow(clippy::too_many_arguments)]
    pub fn score_zone(
        &self,
        zone: &ZoneDefinition,
        obs: &WeatherObservation,
        history: &[WeatherObservation],
        depth: ResolvedDepth,
        current_outages: Option<u32>,
        correction_ratio: f64,
        assessed_at: DateTime<Utc>,
    ) -> ZoneImpact {
        let attributes = &zone.attributes;
        let melt = self.models.melt.compute(obs, attributes, history, depth);
        let outage = self.models.outage.compute(
            obs,
            attributes,
            current_outages,
            melt.hazard.score,
            correction_ratio,
        );
        let vegetation = self.models.vegetation.compute(obs, attributes, depth.depth_in);
        let load = self.models.load.compute(obs, zone);
        let equipment = self.models.equipment.compute(obs, load.pct_capacity / 100.0);
        let jobs = self.models.jobs.compute(
            &outage,
            melt.hazard.score,
            attributes,
            assessed_at,
            correction_ratio,
        );
        let crew = self.models.crew.compute(&outage, &vegetation);

        let overall_score = overall_score(&outage, &vegetation, &load, &equipment, &melt);
        let overall_level = RiskLevel::from_score(overall_score);
        let summary = build_summary(zone, overall_level, &outage, &vegetation, &load, &equipment, &melt);

        ZoneImpact {
            zone_id: zone.zone_id.clone(),
            zone_name: zone.name.clone(),
            territory: zone.territory,
            assessed_at,
            weather_provenance: obs.provenance,
            overall_score,
            overall_level,
            outage,
            melt,
            vegetation,
            load,
            equipment,
            jobs,
            crew,
            correction_ratio: clamp_correction(correction_ratio),
            summary,
        }
    }

    /// Score a forecast timeline, emitting every third point
    ///
    /// Snow depth is simulated forward from `start_depth` point by point
    /// (forecast snowfall in, melt decay out) and live outages decay with a
    /// 24 h half-life. `forecast_hour` is measured from the first point.
    pub fn forecast_timeline(
        &self,
        zone: &ZoneDefinition,
        points: &[WeatherObservation],
        start_depth: ResolvedDepth,
        current_outages: Option<u32>,
        correction_ratio: f64,
    ) -> Vec<ForecastImpactPoint> {
        let Some(first) = points.first() else {
            return Vec::new();
        };
        let base = first.observed_at;
        let attributes = &zone.attributes;

        let mut depth_in = start_depth.depth_in;
        let mut prev_at = base;
        let mut results = Vec::with_capacity(points.len() / FORECAST_SAMPLE_STRIDE + 1);

        for (i, point) in points.iter().enumerate() {
            let step = time::hours_between(prev_at, point.observed_at).max(0.0);
            depth_in += point.snow_rate() * step;
            depth_in = melt_decay(depth_in, point.temperature(), step, attributes);
            prev_at = point.observed_at;

            if i % FORECAST_SAMPLE_STRIDE != 0 {
                continue;
            }

            let hours_ahead = time::hours_between(base, point.observed_at).max(0.0);
            let outages = current_outages.map(|n| decay_outages(n, hours_ahead));
            let history = &points[i.saturating_sub(FORECAST_HISTORY_POINTS)..i];
            let depth = ResolvedDepth::new(depth_in, start_depth.source);

            let impact = self.score_zone(
                zone,
                point,
                history,
                depth,
                outages,
                correction_ratio,
                point.observed_at,
            );

            results.push(ForecastImpactPoint {
                zone_id: zone.zone_id.clone(),
                forecast_for: point.observed_at,
                forecast_hour: hours_ahead.floor() as u32,
                overall_score: impact.overall_score,
                overall_level: impact.overall_level,
                outage_score: impact.outage.hazard.score,
                estimated_outages: impact.outage.estimated_outages,
                vegetation_score: impact.vegetation.hazard.score,
                load_pct_capacity: impact.load.pct_capacity,
                equipment_score: impact.equipment.hazard.score,
                melt_score: impact.melt.hazard.score,
                snow_depth_in: round1(depth_in),
                jobs_mid: impact.jobs.jobs_mid,
            });
        }

        results
    }
}

/// Live outages remaining after `hours` of restoration
pub fn decay_outages(outages: u32, hours: f64) -> u32 {
    let hours = if hours.is_finite() { hours.max(0.0) } else { 0.0 };
    (outages as f64 * 0.5f64.powf(hours / OUTAGE_HALF_LIFE_HOURS)).round() as u32
}

/// Load contribution to the overall blend: 40% of capacity scores 0, 100% scores 100
pub fn load_score(pct_capacity: f64) -> f64 {
    clamp_score((pct_capacity - 40.0) / 60.0 * 100.0)
}

/// Overall impact score through the shared weighting policy
pub fn overall_score(
    outage: &OutageRisk,
    vegetation: &VegetationRisk,
    load: &LoadForecast,
    equipment: &EquipmentStress,
    melt: &MeltRisk,
) -> f64 {
    let melt_score = melt.hazard.score;
    let w = weights(melt_active(melt_score)).overall;
    let raw = outage.hazard.score * w.outage
        + vegetation.hazard.score * w.vegetation
        + load_score(load.pct_capacity) * w.load
        + equipment.hazard.score * w.equipment
        + melt_score * w.melt;
    round1(clamp_score(raw))
}

fn build_summary(
    zone: &ZoneDefinition,
    level: RiskLevel,
    outage: &OutageRisk,
    vegetation: &VegetationRisk,
    load: &LoadForecast,
    equipment: &EquipmentStress,
    melt: &MeltRisk,
) -> String {
    let mut parts = vec![format!("{}: {} overall risk.", zone.name, level)];
    if outage.hazard.score > 30.0 {
        parts.push(format!(
            "Outage risk {} ({} est. outages).",
            outage.hazard.level, outage.estimated_outages
        ));
    }
    if vegetation.hazard.score > 30.0 {
        parts.push(format!("Vegetation risk {}.", vegetation.hazard.level));
    }
    if load.pct_capacity > 80.0 {
        parts.push(format!("Load at {}% capacity.", load.pct_capacity));
    }
    if equipment.hazard.score > 30.0 {
        parts.push(format!("Equipment stress {}.", equipment.hazard.level));
    }
    if melt.hazard.score > 20.0 {
        parts.push(format!(
            "Underground melt risk {} ({:.1} in snow).",
            melt.hazard.level, melt.snow_depth_in
        ));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{ImpactRepository, MemoryRepository, OutageRepository, WeatherRepository};
    use crate::services::snow_depth::DepthSource;
    use crate::services::snow_tracker::MemorySnowStore;
    use chrono::TimeZone;
    use wdome_common::OutageSnapshot;

    fn engine_with(repo: Arc<MemoryRepository>) -> (ImpactEngine, Arc<SnowDepthTracker>) {
        let zones = ZoneTable::builtin().clone();
        let tracker = Arc::new(SnowDepthTracker::open(
            Box::new(MemorySnowStore::new()),
            zones.clone(),
        ));
        let engine = ImpactEngine::new(repo, tracker.clone(), zones, &TomlConfig::default());
        (engine, tracker)
    }

    fn zone(id: &str) -> ZoneDefinition {
        ZoneTable::builtin().get(id).cloned().unwrap()
    }

    fn hourly(zone_id: &str, start: DateTime<Utc>, n: usize) -> Vec<WeatherObservation> {
        (0..n)
            .map(|i| {
                let mut p = WeatherObservation::new(
                    zone_id,
                    Provenance::Forecast,
                    start + Duration::hours(i as i64),
                );
                p.temperature_f = Some(30.0);
                p.wind_speed_mph = Some(10.0);
                p
            })
            .collect()
    }

    #[test]
    fn test_decay_outages_half_life() {
        assert_eq!(decay_outages(100, 0.0), 100);
        assert_eq!(decay_outages(100, 24.0), 50);
        assert_eq!(decay_outages(100, 48.0), 25);
    }

    #[test]
    fn test_load_score_bounds() {
        assert_eq!(load_score(40.0), 0.0);
        assert_eq!(load_score(100.0), 100.0);
        assert_eq!(load_score(10.0), 0.0);
        assert_eq!(load_score(110.0), 100.0);
    }

    #[test]
    fn test_forecast_samples_every_third_point() {
        let (engine, _) = engine_with(Arc::new(MemoryRepository::new()));
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let points = hourly("CONED-QNS", start, 12);

        let timeline = engine.forecast_timeline(&zone("CONED-QNS"), &points, ResolvedDepth::none(), None, 1.0);
        let hours: Vec<u32> = timeline.iter().map(|p| p.forecast_hour).collect();
        assert_eq!(hours, vec![0, 3, 6, 9]);
        assert!(engine.forecast_timeline(&zone("CONED-QNS"), &[], ResolvedDepth::none(), None, 1.0).is_empty());
    }

    #[test]
    fn test_forecast_accumulates_snow() {
        let (engine, _) = engine_with(Arc::new(MemoryRepository::new()));
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let mut points = hourly("CONED-BKN", start, 7);
        for p in &mut points {
            p.temperature_f = Some(20.0);
            p.snow_rate_in_hr = Some(1.0);
        }

        let timeline = engine.forecast_timeline(
            &zone("CONED-BKN"),
            &points,
            ResolvedDepth::new(2.0, DepthSource::Tracked),
            None,
            1.0,
        );
        assert_eq!(timeline[0].snow_depth_in, 2.0);
        assert_eq!(timeline[1].snow_depth_in, 5.0);
        assert_eq!(timeline[2].snow_depth_in, 8.0);
    }

    #[test]
    fn test_score_zone_neutral_is_low() {
        let (engine, _) = engine_with(Arc::new(MemoryRepository::new()));
        let at = Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap();
        let obs = WeatherObservation::neutral("CONED-MAN", at);
        let impact = engine.score_zone(&zone("CONED-MAN"), &obs, &[], ResolvedDepth::none(), None, 1.0, at);

        assert_eq!(impact.overall_level, RiskLevel::Low);
        assert_eq!(impact.melt.hazard.score, 0.0);
        assert!(impact.summary.starts_with("Manhattan: Low overall risk."));
    }

    #[tokio::test]
    async fn test_compute_all_zones_persists_assessments() {
        let repo = Arc::new(MemoryRepository::new());
        let (engine, _) = engine_with(repo.clone());

        let impacts = engine.compute_all_zones().await;
        assert_eq!(impacts.len(), ZoneTable::builtin().len());

        let since = time::now() - Duration::hours(1);
        let saved = repo.current_assessments_since("OR-SUL", since).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].forecast_hour, 0);
    }

    #[tokio::test]
    async fn test_compute_zone_uses_live_outages_and_correction() {
        let repo = Arc::new(MemoryRepository::new());
        let now = time::now();
        let mut obs = WeatherObservation::new("CONED-QNS", Provenance::Aggregated, now);
        obs.wind_speed_mph = Some(50.0);
        obs.temperature_f = Some(50.0);
        repo.save_observation(&obs).await.unwrap();
        repo.save_snapshot(&OutageSnapshot {
            zone_id: "CONED-QNS".to_string(),
            source: "coned".to_string(),
            snapshot_at: now,
            outage_count: 40,
            customers_affected: 900,
        })
        .await
        .unwrap();

        let (engine, _) = engine_with(repo.clone());
        let mut corrections = HashMap::new();
        corrections.insert("CONED-QNS".to_string(), 10.0);

        let impact = engine.compute_zone(&zone("CONED-QNS"), &corrections).await.unwrap();
        assert_eq!(impact.outage.actual_outages, Some(40));
        assert_eq!(impact.correction_ratio, 3.0);
        assert!(impact.outage.drivers.momentum > 0.0);
    }

    #[tokio::test]
    async fn test_measured_depth_seeds_tracker() {
        let repo = Arc::new(MemoryRepository::new());
        let now = time::now();
        let mut obs = WeatherObservation::new("CONED-SI", Provenance::Observed, now);
        obs.snow_depth_in = Some(4.0);
        obs.temperature_f = Some(20.0);
        repo.save_observation(&obs).await.unwrap();

        let (engine, tracker) = engine_with(repo);
        assert_eq!(tracker.get("CONED-SI"), None);

        let impact = engine.compute_zone(&zone("CONED-SI"), &HashMap::new()).await.unwrap();
        assert_eq!(tracker.get("CONED-SI"), Some(4.0));
        assert_eq!(impact.melt.depth_source, DepthSource::Tracked);
    }

    #[tokio::test]
    async fn test_neutral_weather_leaves_tracker_alone() {
        let repo = Arc::new(MemoryRepository::new());
        let (engine, tracker) = engine_with(repo);
        tracker.set("CONED-MAN", 6.0);

        engine.compute_zone(&zone("CONED-MAN"), &HashMap::new()).await.unwrap();
        assert_eq!(tracker.get("CONED-MAN"), Some(6.0));
    }
}
