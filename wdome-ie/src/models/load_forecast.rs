//! Electric load forecast
//!
//! Base load of 40% of the zone's share of territory peak, plus a temperature
//! U-curve around 65°F and a small time-of-day term (local clock).

use serde::{Deserialize, Serialize};
use wdome_common::config::CapacityConfig;
use wdome_common::{time, Territory, WeatherObservation, ZoneDefinition};

use super::hazard::{round1, RiskLevel};

const BASE_LOAD_FRACTION: f64 = 0.40;
const WEATHER_LOAD_FRACTION: f64 = 0.55;
const TIME_OF_DAY_FRACTION: f64 = 0.05;
/// Allows a slight overload
const MAX_LOAD_FRACTION: f64 = 1.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadForecast {
    pub zone_id: String,
    pub territory: Territory,
    pub load_mw: f64,
    pub capacity_mw: f64,
    pub pct_capacity: f64,
    pub risk_level: RiskLevel,
    /// Estimated local hour of peak demand
    pub peak_hour: u32,
}

#[derive(Debug, Clone)]
pub struct LoadForecastModel {
    capacity: CapacityConfig,
}

impl LoadForecastModel {
    pub fn new(capacity: &CapacityConfig) -> Self {
        Self {
            capacity: capacity.clone(),
        }
    }

    pub fn compute(&self, obs: &WeatherObservation, zone: &ZoneDefinition) -> LoadForecast {
        let zone_capacity = self.capacity.peak_mw(zone.territory) * zone.peak_load_share;
        let temp = obs.temperature();

        let fraction = (BASE_LOAD_FRACTION
            + temperature_demand_factor(temp) * WEATHER_LOAD_FRACTION
            + time_of_day_factor(time::local_hour(obs.observed_at)) * TIME_OF_DAY_FRACTION)
            .min(MAX_LOAD_FRACTION);

        LoadForecast {
            zone_id: zone.zone_id.clone(),
            territory: zone.territory,
            load_mw: round1(zone_capacity * fraction),
            capacity_mw: round1(zone_capacity),
            pct_capacity: round1(fraction * 100.0),
            risk_level: load_risk_level(fraction),
            peak_hour: estimate_peak_hour(temp),
        }
    }
}

/// Minimum demand near 65°F, rising for heating and cooling
fn temperature_demand_factor(temp_f: f64) -> f64 {
    let deviation = (temp_f - 65.0).abs();
    if deviation < 5.0 {
        0.0
    } else if deviation < 15.0 {
        (deviation - 5.0) / 10.0 * 0.3
    } else if deviation < 30.0 {
        0.3 + (deviation - 15.0) / 15.0 * 0.4
    } else {
        (0.7 + (deviation - 30.0) / 20.0 * 0.3).min(1.0)
    }
}

fn time_of_day_factor(local_hour: u32) -> f64 {
    match local_hour {
        14..=18 => 1.0,
        7..=13 => 0.7,
        19..=22 => 0.6,
        _ => 0.3,
    }
}

fn estimate_peak_hour(temp_f: f64) -> u32 {
    if temp_f > 80.0 {
        16
    } else if temp_f < 30.0 {
        8
    } else {
        12
    }
}

/// Risk by fraction of capacity (70/85/95% breakpoints)
fn load_risk_level(fraction: f64) -> RiskLevel {
    if fraction < 0.70 {
        RiskLevel::Low
    } else if fraction < 0.85 {
        RiskLevel::Moderate
    } else if fraction < 0.95 {
        RiskLevel::High
    } else {
        RiskLevel::Extreme
    }
}
