//! Hazard models
//!
//! Each scorer is a pure function of a weather observation and static zone
//! attributes (melt additionally takes observation history and snow depth).
//! Every score is clamped to [0, 100].

pub mod crew_deployment;
pub mod equipment_stress;
pub mod hazard;
pub mod job_forecast;
pub mod load_forecast;
pub mod melt_risk;
pub mod outage_risk;
pub mod vegetation_risk;
pub mod weighting;

pub use crew_deployment::{CrewDeploymentModel, CrewRecommendation};
pub use equipment_stress::{EquipmentStress, EquipmentStressModel};
pub use hazard::{HazardScore, RiskLevel};
pub use job_forecast::{JobForecast, JobForecastModel};
pub use load_forecast::{LoadForecast, LoadForecastModel};
pub use melt_risk::{MeltRisk, MeltRiskModel};
pub use outage_risk::{OutageDrivers, OutageRisk, OutageRiskModel, OutageTrend};
pub use vegetation_risk::{SoilSaturation, VegetationRisk, VegetationRiskModel};
pub use weighting::{weights, WeightSet};

/// Smallest calibration correction ratio
pub const MIN_CORRECTION: f64 = 0.3;

/// Largest calibration correction ratio
pub const MAX_CORRECTION: f64 = 3.0;

/// Clamp a correction ratio into [0.3, 3.0]; non-finite ratios are neutral
pub fn clamp_correction(ratio: f64) -> f64 {
    if ratio.is_finite() {
        ratio.clamp(MIN_CORRECTION, MAX_CORRECTION)
    } else {
        1.0
    }
}
