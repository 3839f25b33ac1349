//! Vegetation risk for overhead distribution
//!
//! Wind on foliage, wet snow and ice on branches, and saturated soil, all scaled
//! by how much of the zone's system is overhead and how dense its canopy is.

use serde::{Deserialize, Serialize};
use wdome_common::{time, WeatherObservation, ZoneAttributes};

use super::hazard::{round1, HazardScore};

/// Soil moisture label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoilSaturation {
    #[default]
    Normal,
    Moist,
    Saturated,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VegetationRisk {
    #[serde(flatten)]
    pub hazard: HazardScore,
    pub foliage_factor: f64,
    pub soil_saturation: SoilSaturation,
}

/// Full leaf Jun-Sep, partial Apr/May/Oct, bare otherwise
pub fn foliage_factor(month: u32) -> f64 {
    match month {
        6..=9 => 1.0,
        4 | 5 | 10 => 0.7,
        _ => 0.3,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VegetationRiskModel;

impl VegetationRiskModel {
    pub fn new() -> Self {
        Self
    }

    /// `snow_depth_in` is the resolved ground depth for the zone
    pub fn compute(
        &self,
        obs: &WeatherObservation,
        attributes: &ZoneAttributes,
        snow_depth_in: f64,
    ) -> VegetationRisk {
        let foliage = foliage_factor(time::month(obs.observed_at));
        let wind = wind_score(obs.wind_speed(), obs.wind_gust(), foliage);
        let soil = soil_score(obs.precip_rate(), obs.precip_probability());
        let ice = ice_loading_score(obs.ice_accum());
        let snow = snow_loading_score(obs, snow_depth_in);

        let raw = wind * 0.35 + snow * 0.25 + ice * 0.25 + soil * 0.15;
        let exposure = attributes.overhead_exposure * (0.4 + 0.6 * attributes.canopy_density);
        let score = raw * exposure.max(0.05);

        let mut factors = Vec::new();
        if wind > 20.0 {
            factors.push("Wind on foliage".to_string());
        }
        if snow > 20.0 {
            factors.push("Snow loading on branches".to_string());
        }
        if ice > 20.0 {
            factors.push("Ice loading".to_string());
        }

        let soil_saturation = if soil > 60.0 {
            SoilSaturation::Saturated
        } else if soil > 30.0 {
            SoilSaturation::Moist
        } else {
            SoilSaturation::Normal
        };
        if soil_saturation == SoilSaturation::Saturated {
            factors.push("Saturated soil".to_string());
        }

        VegetationRisk {
            hazard: HazardScore::new(round1(score), factors),
            foliage_factor: foliage,
            soil_saturation,
        }
    }
}

fn wind_score(speed: f64, gust: f64, foliage: f64) -> f64 {
    let effective = speed.max(gust * 0.8);
    let base = if effective < 20.0 {
        0.0
    } else if effective < 40.0 {
        (effective - 20.0) / 20.0 * 50.0
    } else if effective < 60.0 {
        50.0 + (effective - 40.0) / 20.0 * 30.0
    } else {
        (80.0 + (effective - 60.0) * 1.5).min(100.0)
    };
    base * foliage
}

fn is_wet_snow_temp(temp: f64) -> bool {
    (28.0..=34.0).contains(&temp)
}

/// Branch loading from falling snow, snowy conditions and snow already down
///
/// Wet snow (28-34°F) weighs up to three times as much as dry snow.
fn snow_loading_score(obs: &WeatherObservation, depth_in: f64) -> f64 {
    let temp = obs.temperature();
    let rate = obs.snow_rate();
    let cond = obs.condition_lower();
    let wet = is_wet_snow_temp(temp);
    let mut score: f64 = 0.0;

    if rate > 0.0 {
        let wet_factor = if wet {
            3.0
        } else if (25.0..28.0).contains(&temp) || (temp > 34.0 && temp <= 37.0) {
            2.0
        } else {
            1.0
        };
        score = score.max((rate * 40.0 * wet_factor).min(100.0));
    }

    if cond.contains("heavy snow") || cond.contains("blizzard") {
        let wet_factor = if wet { 3.0 } else { 1.5 };
        score = score.max(70.0 * wet_factor / 3.0);
    } else if cond.contains("light snow") {
        let wet_factor = if wet { 2.0 } else { 1.0 };
        score = score.max(30.0 * wet_factor / 2.0);
    } else if cond.contains("snow") {
        let wet_factor = if wet { 2.5 } else { 1.2 };
        score = score.max(50.0 * wet_factor / 2.5);
    }

    if depth_in.is_finite() && depth_in > 2.0 {
        let depth_factor = (depth_in / 12.0).min(1.0);
        let temp_factor = if (28.0..=37.0).contains(&temp) { 1.5 } else { 0.8 };
        score = score.max(depth_factor * temp_factor * 60.0);
    }

    score.min(100.0)
}

fn soil_score(precip_rate: f64, precip_prob: f64) -> f64 {
    ((precip_rate * 40.0).min(100.0) + precip_prob * 0.5).min(100.0)
}

fn ice_loading_score(ice_in: f64) -> f64 {
    if ice_in <= 0.0 {
        0.0
    } else if ice_in < 0.1 {
        ice_in / 0.1 * 30.0
    } else if ice_in < 0.25 {
        30.0 + (ice_in - 0.1) / 0.15 * 40.0
    } else {
        (70.0 + (ice_in - 0.25) * 120.0).min(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wdome_common::{Provenance, ZoneTable};

    fn obs(month: u32) -> WeatherObservation {
        WeatherObservation::new(
            "CONED-WST",
            Provenance::Observed,
            Utc.with_ymd_and_hms(2026, month, 10, 15, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_summer_wind_beats_winter_wind() {
        let attrs = ZoneTable::builtin().attributes("CONED-WST");
        let model = VegetationRiskModel::new();
        let summer = WeatherObservation { wind_speed_mph: Some(50.0), ..obs(7) };
        let winter = WeatherObservation { wind_speed_mph: Some(50.0), ..obs(1) };
        assert!(model.compute(&summer, &attrs, 0.0).hazard.score > model.compute(&winter, &attrs, 0.0).hazard.score);
    }

    #[test]
    fn test_underground_zone_near_zero() {
        let man = ZoneTable::builtin().attributes("CONED-MAN");
        let wst = ZoneTable::builtin().attributes("CONED-WST");
        let storm = WeatherObservation {
            wind_speed_mph: Some(70.0),
            ice_accum_in: Some(0.5),
            ..obs(7)
        };
        let model = VegetationRiskModel::new();
        let man_score = model.compute(&storm, &man, 0.0).hazard.score;
        let wst_score = model.compute(&storm, &wst, 0.0).hazard.score;
        assert!(man_score < 5.0);
        assert!(wst_score > 10.0 * man_score);
    }

    #[test]
    fn test_wet_snow_heavier_than_dry() {
        let wet = WeatherObservation {
            snow_rate_in_hr: Some(0.5),
            temperature_f: Some(31.0),
            ..obs(1)
        };
        let dry = WeatherObservation { temperature_f: Some(15.0), ..wet.clone() };
        assert_eq!(snow_loading_score(&wet, 0.0), 60.0);
        assert_eq!(snow_loading_score(&dry, 0.0), 20.0);
    }

    #[test]
    fn test_ground_depth_implies_branch_load() {
        let o = WeatherObservation { temperature_f: Some(33.0), ..obs(2) };
        assert_eq!(snow_loading_score(&o, 12.0), 90.0);
        assert_eq!(snow_loading_score(&o, 1.0), 0.0);
    }
}
