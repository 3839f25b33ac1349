//! Restoration job count forecast
//!
//! Converts outage and melt risk into a low/mid/high job estimate. The mid value
//! is a smooth quadratic of the combined score, discounted by network
//! redundancy (meshed networks need fewer jobs per unit of risk than radial
//! feeds) and floored by the zone's baseline work. The low/high band depends on
//! which driver dominates: ice and melt outcomes are the least predictable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wdome_common::{time, ZoneAttributes};

use super::clamp_correction;
use super::hazard::{round1, RiskLevel};
use super::outage_risk::OutageRisk;
use super::weighting::melt_active;

/// Jobs per unit of squared combined score
const JOBS_PER_SCORE_SQ: f64 = 0.15;

/// Jobs generated per baseline outage
const JOBS_PER_BASELINE_OUTAGE: f64 = 0.3;

/// Staffing factor outside local day hours
const NIGHT_STAFFING: f64 = 0.6;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobForecast {
    pub combined_score: f64,
    pub jobs_low: u32,
    pub jobs_mid: u32,
    pub jobs_high: u32,
    pub risk_level: RiskLevel,
    pub contributing_factors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JobForecastModel;

impl JobForecastModel {
    pub fn new() -> Self {
        Self
    }

    pub fn compute(
        &self,
        outage: &OutageRisk,
        melt_score: f64,
        attributes: &ZoneAttributes,
        at: DateTime<Utc>,
        correction_ratio: f64,
    ) -> JobForecast {
        let outage_score = outage.hazard.score;
        let melt_score = if melt_score.is_finite() { melt_score.clamp(0.0, 100.0) } else { 0.0 };
        let combined = outage_score.max(melt_score * 0.4 + outage_score * 0.6);

        let weather_mid = weather_jobs(combined, attributes.network_redundancy, correction_ratio);
        let mid = weather_mid.max(baseline_jobs(attributes.baseline_outages, at));

        let (mut low_mult, mut high_mult) = uncertainty_band(outage, melt_score);
        if melt_score > 30.0 {
            low_mult = low_mult.min(0.4);
            high_mult = high_mult.max(2.0);
        }

        let mut factors = outage.hazard.contributing_factors.clone();
        let melt_label = "Underground melt risk";
        if melt_score > 20.0 && !factors.iter().any(|f| f == melt_label) {
            factors.push(melt_label.to_string());
        }

        JobForecast {
            combined_score: round1(combined),
            jobs_low: (mid as f64 * low_mult).floor() as u32,
            jobs_mid: mid,
            jobs_high: (mid as f64 * high_mult).floor() as u32,
            risk_level: RiskLevel::from_score(combined),
            contributing_factors: factors,
        }
    }
}

/// Weather-driven jobs: `floor(0.15 * score² * redundancy * correction)`
pub fn weather_jobs(score: f64, redundancy: f64, correction_ratio: f64) -> u32 {
    if !score.is_finite() || score < 3.0 {
        return 0;
    }
    let jobs = JOBS_PER_SCORE_SQ * score * score * redundancy.max(0.0) * clamp_correction(correction_ratio);
    jobs.floor() as u32
}

/// Calm-weather work floor, reduced overnight
pub fn baseline_jobs(baseline_outages: u32, at: DateTime<Utc>) -> u32 {
    let staffing = match time::local_hour(at) {
        7..=19 => 1.0,
        _ => NIGHT_STAFFING,
    };
    (baseline_outages as f64 * JOBS_PER_BASELINE_OUTAGE * staffing).floor() as u32
}

/// (low, high) multipliers for the dominant driver
fn uncertainty_band(outage: &OutageRisk, melt_score: f64) -> (f64, f64) {
    let d = &outage.drivers;
    if d.has_synergy() {
        (0.3, 3.0)
    } else if d.ice > 20.0 {
        (0.3, 2.5)
    } else if melt_active(melt_score) {
        (0.3, 2.5)
    } else if d.snow > 20.0 {
        (0.4, 2.0)
    } else if d.wind > 20.0 {
        (0.5, 1.8)
    } else {
        (0.5, 1.5)
    }
}
