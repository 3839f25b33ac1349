//! Records produced by the engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wdome_common::{Provenance, Territory};

use crate::models::{
    CrewRecommendation, EquipmentStress, JobForecast, LoadForecast, MeltRisk, OutageRisk,
    RiskLevel, VegetationRisk,
};

/// Full current-conditions impact for one zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneImpact {
    pub zone_id: String,
    pub zone_name: String,
    pub territory: Territory,
    pub assessed_at: DateTime<Utc>,
    /// Provenance of the weather the impact was scored from
    pub weather_provenance: Provenance,
    pub overall_score: f64,
    pub overall_level: RiskLevel,
    pub outage: OutageRisk,
    pub melt: MeltRisk,
    pub vegetation: VegetationRisk,
    pub load: LoadForecast,
    pub equipment: EquipmentStress,
    pub jobs: JobForecast,
    pub crew: CrewRecommendation,
    /// Calibration ratio applied to outage and job estimates
    pub correction_ratio: f64,
    pub summary: String,
}

/// Impact at one sampled point of the forecast timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastImpactPoint {
    pub zone_id: String,
    pub forecast_for: DateTime<Utc>,
    /// Whole hours after the first forecast point
    pub forecast_hour: u32,
    pub overall_score: f64,
    pub overall_level: RiskLevel,
    pub outage_score: f64,
    pub estimated_outages: u32,
    pub vegetation_score: f64,
    pub load_pct_capacity: f64,
    pub equipment_score: f64,
    pub melt_score: f64,
    pub snow_depth_in: f64,
    pub jobs_mid: u32,
}

/// Persisted row of the impact assessment log
///
/// `forecast_hour` 0 marks a current-conditions assessment; calibration only
/// reads those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactAssessment {
    pub assessment_id: Uuid,
    pub zone_id: String,
    pub territory: Territory,
    pub assessed_at: DateTime<Utc>,
    pub forecast_hour: u32,
    pub overall_score: f64,
    pub overall_level: RiskLevel,
    pub outage_score: f64,
    pub estimated_outages: u32,
    /// Calibration ratio that was applied to `estimated_outages`
    pub correction_ratio: f64,
    pub vegetation_score: f64,
    pub load_pct_capacity: f64,
    pub equipment_score: f64,
    pub melt_score: f64,
    pub jobs_mid: u32,
    pub snow_depth_in: f64,
    pub summary: String,
}

impl ImpactAssessment {
    pub fn from_impact(impact: &ZoneImpact) -> Self {
        Self {
            assessment_id: Uuid::new_v4(),
            zone_id: impact.zone_id.clone(),
            territory: impact.territory,
            assessed_at: impact.assessed_at,
            forecast_hour: 0,
            overall_score: impact.overall_score,
            overall_level: impact.overall_level,
            outage_score: impact.outage.hazard.score,
            estimated_outages: impact.outage.estimated_outages,
            correction_ratio: impact.correction_ratio,
            vegetation_score: impact.vegetation.hazard.score,
            load_pct_capacity: impact.load.pct_capacity,
            equipment_score: impact.equipment.hazard.score,
            melt_score: impact.melt.hazard.score,
            jobs_mid: impact.jobs.jobs_mid,
            snow_depth_in: impact.melt.snow_depth_in,
            summary: impact.summary.clone(),
        }
    }
}

/// One calibration run's result for one zone (append-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub zone_id: String,
    pub computed_at: DateTime<Utc>,
    /// actual / predicted outages, clamped to [0.3, 3.0]
    pub correction_ratio: f64,
    pub wind_correlation: Option<f64>,
    pub temp_correlation: Option<f64>,
    pub precip_correlation: Option<f64>,
    pub snow_correlation: Option<f64>,
    pub ice_correlation: Option<f64>,
    pub actual_outage_avg: f64,
    pub actual_outage_max: u32,
    pub actual_outage_min: u32,
    pub predicted_outage_avg: f64,
    pub predicted_score_avg: f64,
    pub predicted_jobs_avg: f64,
    pub wind_avg_mph: Option<f64>,
    pub temp_avg_f: Option<f64>,
    pub precip_avg_in_hr: Option<f64>,
    pub observation_count: u32,
    pub snapshot_count: u32,
    pub assessment_count: u32,
}
