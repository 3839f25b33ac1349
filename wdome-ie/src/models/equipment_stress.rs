//! Equipment stress: transformer heating and conductor sag

use serde::{Deserialize, Serialize};
use wdome_common::WeatherObservation;

use super::hazard::{round1, HazardScore};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquipmentStress {
    #[serde(flatten)]
    pub hazard: HazardScore,
    pub transformer_risk: f64,
    pub line_sag_risk: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EquipmentStressModel;

impl EquipmentStressModel {
    pub fn new() -> Self {
        Self
    }

    /// `load_fraction` is load as a fraction of capacity (1.0 = 100%)
    pub fn compute(&self, obs: &WeatherObservation, load_fraction: f64) -> EquipmentStress {
        let load = if load_fraction.is_finite() { load_fraction.clamp(0.0, 1.1) } else { 0.5 };
        let temp = obs.temperature();
        let wind = obs.wind_speed();
        let ice = obs.ice_accum();

        let transformer = transformer_stress(temp, load, wind);
        let line_sag = line_sag_risk(temp, load, wind, ice);
        let score = transformer * 0.55 + line_sag * 0.45;

        let mut factors = Vec::new();
        if transformer > 40.0 {
            factors.push("Transformer thermal stress".to_string());
        }
        if line_sag > 40.0 {
            factors.push("Conductor sag".to_string());
        }

        EquipmentStress {
            hazard: HazardScore::new(round1(score), factors),
            transformer_risk: round1(transformer),
            line_sag_risk: round1(line_sag),
        }
    }
}

/// Ambient heat above 85°F plus I²R load heating, less wind cooling
fn transformer_stress(ambient_f: f64, load: f64, wind_mph: f64) -> f64 {
    let temp_stress = ((ambient_f - 85.0) / 30.0).max(0.0) * 40.0;
    let load_stress = load * load * 60.0;
    let wind_cooling = (wind_mph * 0.5).min(20.0);
    (temp_stress + load_stress - wind_cooling).clamp(0.0, 100.0)
}

/// Thermal expansion, load heating, ice weight and galloping
fn line_sag_risk(temp_f: f64, load: f64, wind_mph: f64, ice_in: f64) -> f64 {
    let thermal = ((temp_f - 90.0) / 25.0).max(0.0) * 30.0;
    let load_heat = load.powf(1.5) * 25.0;
    let ice_weight = (ice_in * 160.0).min(40.0);
    let galloping = if ice_in > 0.05 && wind_mph > 15.0 {
        (wind_mph * 0.5 * ice_in * 20.0).min(30.0)
    } else {
        0.0
    };
    (thermal + load_heat + ice_weight + galloping).min(100.0)
}
