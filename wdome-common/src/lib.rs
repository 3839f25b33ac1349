//! # weather-dome Common Library
//!
//! Shared code for the weather-dome services including:
//! - Error and result types
//! - Configuration loading and root folder resolution
//! - The static zone/territory table
//! - Canonical weather and outage records
//! - Time and file utilities

pub mod config;
pub mod error;
pub mod fs;
pub mod outage;
pub mod time;
pub mod weather;
pub mod zones;

pub use error::{Error, Result};
pub use outage::OutageSnapshot;
pub use weather::{Provenance, WeatherAlert, WeatherObservation};
pub use zones::{Territory, ZoneAttributes, ZoneDefinition, ZoneTable};
