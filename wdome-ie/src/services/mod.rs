//! Orchestrators and stateful services

pub mod calibration;
pub mod impact_engine;
pub mod scheduler;
pub mod snow_depth;
pub mod snow_tracker;
pub mod weather_aggregator;
pub mod weather_ingest;

pub use calibration::{CalibrationEngine, CalibrationReport};
pub use impact_engine::{ImpactEngine, ImpactModels};
pub use scheduler::Scheduler;
pub use snow_depth::{DepthSource, ResolvedDepth, SnowDepthResolver};
pub use snow_tracker::{FileSnowStore, MemorySnowStore, SnowDepthTracker, SnowStateStore};
pub use weather_ingest::{IngestReport, WeatherIngest, WeatherProvider};
