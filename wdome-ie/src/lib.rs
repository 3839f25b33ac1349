//! weather-dome Impact Engine (wdome-ie)
//!
//! Turns per-zone weather and outage observations into calibrated hazard
//! scores, job forecasts and crew recommendations.

pub mod db;
pub mod logging;
pub mod models;
pub mod repository;
pub mod services;
pub mod types;

pub use repository::{MemoryRepository, Repository, SqliteRepository};
pub use services::{CalibrationEngine, ImpactEngine, SnowDepthTracker};
pub use types::{CalibrationRecord, ForecastImpactPoint, ImpactAssessment, ZoneImpact};
