//! Outage risk scoring
//!
//! Five weather drivers (wind, ice, snow, lightning, precipitation) are scored
//! independently on 0-100 ramps and blended with the adaptive weights from
//! [`crate::models::weighting`]. Two synergy bonuses model cascading failures,
//! and live outage counts add a bounded momentum bonus.

use serde::{Deserialize, Serialize};
use wdome_common::config::{RampThresholds, ThresholdConfig};
use wdome_common::{WeatherObservation, ZoneAttributes};

use super::hazard::{round1, HazardScore};
use super::weighting::{melt_active, weights};
use super::clamp_correction;

/// Upper bound on the live-outage momentum bonus (points)
pub const MOMENTUM_CAP: f64 = 25.0;

/// Live outages above which momentum applies
const MOMENTUM_MIN_OUTAGES: u32 = 5;

/// Live outages above which the trend is reported as rising
const RISING_MIN_OUTAGES: u32 = 10;

/// Direction of live outages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutageTrend {
    #[default]
    Stable,
    Rising,
}

/// Individual driver scores (0-100) and bonuses
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OutageDrivers {
    pub wind: f64,
    pub ice: f64,
    pub snow: f64,
    pub lightning: f64,
    pub precip: f64,
    pub wind_ice_synergy: f64,
    pub wind_snow_synergy: f64,
    pub momentum: f64,
}

impl OutageDrivers {
    pub fn has_synergy(&self) -> bool {
        self.wind_ice_synergy > 0.0 || self.wind_snow_synergy > 0.0
    }
}

/// Outage risk for one zone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutageRisk {
    #[serde(flatten)]
    pub hazard: HazardScore,
    pub drivers: OutageDrivers,
    pub estimated_outages: u32,
    pub actual_outages: Option<u32>,
    pub trend: OutageTrend,
}

/// Outage risk model
#[derive(Debug, Clone)]
pub struct OutageRiskModel {
    wind: RampThresholds,
    ice: RampThresholds,
}

impl OutageRiskModel {
    pub fn new(thresholds: &ThresholdConfig) -> Self {
        Self {
            wind: thresholds.wind,
            ice: thresholds.ice,
        }
    }

    /// Score a zone. Pure: identical inputs always give identical output.
    ///
    /// `correction_ratio` is the zone's latest calibration ratio (1.0 when none).
    pub fn compute(
        &self,
        obs: &WeatherObservation,
        attributes: &ZoneAttributes,
        current_outages: Option<u32>,
        melt_score: f64,
        correction_ratio: f64,
    ) -> OutageRisk {
        let mut drivers = OutageDrivers {
            wind: self.wind_score(obs.wind_speed(), obs.wind_gust()),
            ice: self.ice_score(obs.ice_accum()),
            snow: snow_score(obs.snow_rate()),
            lightning: (obs.lightning_probability() * 1.2).min(100.0),
            precip: precip_score(obs),
            ..Default::default()
        };

        let melt_score = if melt_score.is_finite() { melt_score.clamp(0.0, 100.0) } else { 0.0 };
        let melt_on = melt_active(melt_score);
        let w = weights(melt_on).outage;
        let base = drivers.wind * w.wind
            + drivers.ice * w.ice
            + drivers.snow * w.snow
            + drivers.lightning * w.lightning
            + drivers.precip * w.precip
            + melt_score * w.melt;

        if drivers.wind > 30.0 && drivers.ice > 30.0 {
            drivers.wind_ice_synergy = drivers.wind.min(drivers.ice) * 0.25;
        }
        if drivers.wind > 20.0 && drivers.snow > 20.0 {
            drivers.wind_snow_synergy = drivers.wind.min(drivers.snow) * 0.2;
        }

        let mut score = (base + drivers.wind_ice_synergy + drivers.wind_snow_synergy).min(100.0);

        if let Some(outages) = current_outages.filter(|&n| n > MOMENTUM_MIN_OUTAGES) {
            drivers.momentum = (outages as f64 * 0.2).min(MOMENTUM_CAP);
            score = (score + drivers.momentum).min(100.0);
        }

        let mut factors = Vec::new();
        if drivers.wind > 20.0 {
            factors.push(format!("Wind ({:.0} mph)", obs.wind_speed()));
        }
        if drivers.ice > 20.0 {
            factors.push(format!("Ice ({:.2} in)", obs.ice_accum()));
        }
        if drivers.snow > 20.0 {
            factors.push(format!("Snow ({:.1} in/hr)", obs.snow_rate()));
        }
        if drivers.lightning > 20.0 {
            factors.push("Lightning risk".to_string());
        }
        if drivers.precip > 20.0 {
            factors.push("Heavy precipitation".to_string());
        }
        if drivers.wind_ice_synergy > 0.0 {
            factors.push("Wind+Ice synergy".to_string());
        }
        if drivers.wind_snow_synergy > 0.0 {
            factors.push("Wind+Snow synergy".to_string());
        }
        if melt_on {
            factors.push("Underground melt risk".to_string());
        }
        if drivers.momentum > 0.0 {
            factors.push("Elevated active outages".to_string());
        }

        let hazard = HazardScore::new(round1(score), factors);
        let estimated_outages = estimate_outages(hazard.score, attributes.baseline_outages, correction_ratio);
        let trend = match current_outages {
            Some(n) if n > RISING_MIN_OUTAGES => OutageTrend::Rising,
            _ => OutageTrend::Stable,
        };

        OutageRisk {
            hazard,
            drivers,
            estimated_outages,
            actual_outages: current_outages,
            trend,
        }
    }

    fn wind_score(&self, speed: f64, gust: f64) -> f64 {
        let effective = speed.max(gust * 0.8);
        if effective < 15.0 {
            return 0.0;
        }
        ramp(effective, 15.0, &self.wind)
    }

    fn ice_score(&self, ice_in: f64) -> f64 {
        if ice_in <= 0.0 {
            return 0.0;
        }
        ramp(ice_in, 0.0, &self.ice)
    }
}

/// Piecewise-linear 0→30→70→90 ramp between `floor` and the three breakpoints,
/// 100 at or beyond extreme
fn ramp(value: f64, floor: f64, t: &RampThresholds) -> f64 {
    if value < t.advisory {
        ((value - floor) / (t.advisory - floor)).max(0.0) * 30.0
    } else if value < t.warning {
        30.0 + (value - t.advisory) / (t.warning - t.advisory) * 40.0
    } else if value < t.extreme {
        70.0 + (value - t.warning) / (t.extreme - t.warning) * 20.0
    } else {
        100.0
    }
}

/// Snowfall rate ramp: under 2 in/hr is light snow and scores nothing
fn snow_score(rate: f64) -> f64 {
    if rate < 2.0 {
        0.0
    } else if rate < 4.0 {
        (rate - 2.0) / 2.0 * 40.0
    } else if rate < 6.0 {
        40.0 + (rate - 4.0) / 2.0 * 30.0
    } else {
        (70.0 + (rate - 6.0) / 2.0 * 30.0).min(100.0)
    }
}

/// Heaviest of rain, snow and ice accretion rates plus a probability term
fn precip_score(obs: &WeatherObservation) -> f64 {
    let rain = (obs.precip_rate() * 50.0).min(100.0);
    let snow = (obs.snow_rate() * 30.0).min(100.0);
    let ice = (obs.ice_accum() * 100.0).min(100.0);
    (rain.max(snow).max(ice) + obs.precip_probability() * 0.3).min(100.0)
}

/// Weather-driven outages as a continuous function of score
///
/// Linear ramp from 3 to 25, then a quadratic that meets the ramp's value and
/// slope at 25 so there is no step at any boundary.
pub fn weather_outages(score: f64) -> f64 {
    if score.is_nan() || score < 3.0 {
        0.0
    } else if score < 25.0 {
        (score - 3.0) * 1.8
    } else {
        let over = score - 25.0;
        39.6 + 1.8 * over + 1.5 * over * over
    }
}

/// Baseline floor plus calibrated weather-driven outages
pub fn estimate_outages(score: f64, baseline: u32, correction_ratio: f64) -> u32 {
    let weather = (weather_outages(score) * clamp_correction(correction_ratio)).round();
    baseline.saturating_add(weather as u32)
}
