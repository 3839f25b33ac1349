//! Canonical weather records
//!
//! A [`WeatherObservation`] is the single shape every scorer consumes. It represents
//! either a real observation or one point of a forecast timeline; the
//! [`Provenance`] tag tells them apart. Vendor adapters map their responses onto
//! this record and leave unknown fields as `None`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Temperature assumed when an observation has none (°F)
pub const NEUTRAL_TEMPERATURE_F: f64 = 65.0;

/// Wind speed used for the synthetic record of a zone with no weather (mph)
pub const NEUTRAL_WIND_MPH: f64 = 5.0;

/// Where an observation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Single-source measurement
    #[default]
    Observed,
    /// Multi-source conservative merge
    Aggregated,
    /// One point of a forecast timeline
    Forecast,
    /// Synthetic neutral record (no data available)
    Default,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Observed => "observed",
            Provenance::Aggregated => "aggregated",
            Provenance::Forecast => "forecast",
            Provenance::Default => "default",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "aggregated" => Provenance::Aggregated,
            "forecast" => Provenance::Forecast,
            "default" => Provenance::Default,
            _ => Provenance::Observed,
        }
    }
}

/// Weather at one zone and one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub zone_id: String,
    pub provenance: Provenance,
    /// Observation time, or the valid time of a forecast point
    pub observed_at: DateTime<Utc>,
    pub temperature_f: Option<f64>,
    pub wind_speed_mph: Option<f64>,
    pub wind_gust_mph: Option<f64>,
    pub precip_rate_in_hr: Option<f64>,
    pub precip_probability_pct: Option<f64>,
    pub snow_rate_in_hr: Option<f64>,
    /// Ground snow depth; frequently absent upstream
    pub snow_depth_in: Option<f64>,
    pub ice_accum_in: Option<f64>,
    pub lightning_probability_pct: Option<f64>,
    pub condition_text: Option<String>,
}

impl WeatherObservation {
    /// Empty record for a zone and time; every measurement unset
    pub fn new(zone_id: impl Into<String>, provenance: Provenance, observed_at: DateTime<Utc>) -> Self {
        Self {
            zone_id: zone_id.into(),
            provenance,
            observed_at,
            ..Default::default()
        }
    }

    /// Synthetic calm-weather record for a zone without any cached weather
    pub fn neutral(zone_id: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            temperature_f: Some(NEUTRAL_TEMPERATURE_F),
            wind_speed_mph: Some(NEUTRAL_WIND_MPH),
            ..Self::new(zone_id, Provenance::Default, observed_at)
        }
    }

    /// Temperature (°F), neutral default when missing or not finite
    pub fn temperature(&self) -> f64 {
        finite(self.temperature_f).unwrap_or(NEUTRAL_TEMPERATURE_F)
    }

    pub fn wind_speed(&self) -> f64 {
        non_negative(self.wind_speed_mph)
    }

    pub fn wind_gust(&self) -> f64 {
        non_negative(self.wind_gust_mph)
    }

    pub fn precip_rate(&self) -> f64 {
        non_negative(self.precip_rate_in_hr)
    }

    pub fn precip_probability(&self) -> f64 {
        non_negative(self.precip_probability_pct).min(100.0)
    }

    pub fn snow_rate(&self) -> f64 {
        non_negative(self.snow_rate_in_hr)
    }

    pub fn ice_accum(&self) -> f64 {
        non_negative(self.ice_accum_in)
    }

    pub fn lightning_probability(&self) -> f64 {
        non_negative(self.lightning_probability_pct).min(100.0)
    }

    /// Measured ground snow depth, if the source reported a usable one
    pub fn measured_snow_depth(&self) -> Option<f64> {
        finite(self.snow_depth_in).map(|d| d.max(0.0))
    }

    /// Lower-cased condition description ("" when absent)
    pub fn condition_lower(&self) -> String {
        self.condition_text
            .as_deref()
            .unwrap_or_default()
            .to_lowercase()
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn non_negative(value: Option<f64>) -> f64 {
    finite(value).unwrap_or(0.0).max(0.0)
}

/// Active weather alert for a zone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub alert_id: String,
    pub zone_id: String,
    /// Event type, e.g. "Winter Storm Warning"
    pub event: String,
    /// Minor, Moderate, Severe, Extreme
    pub severity: String,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub onset: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_degrade_to_neutral() {
        let obs = WeatherObservation::new("CONED-MAN", Provenance::Observed, Utc::now());
        assert_eq!(obs.temperature(), NEUTRAL_TEMPERATURE_F);
        assert_eq!(obs.wind_speed(), 0.0);
        assert_eq!(obs.ice_accum(), 0.0);
        assert!(obs.measured_snow_depth().is_none());
        assert_eq!(obs.condition_lower(), "");
    }

    #[test]
    fn test_non_finite_and_negative_values_sanitized() {
        let obs = WeatherObservation {
            temperature_f: Some(f64::NAN),
            wind_speed_mph: Some(-12.0),
            precip_probability_pct: Some(250.0),
            snow_depth_in: Some(-3.0),
            ..WeatherObservation::new("CONED-MAN", Provenance::Observed, Utc::now())
        };
        assert_eq!(obs.temperature(), NEUTRAL_TEMPERATURE_F);
        assert_eq!(obs.wind_speed(), 0.0);
        assert_eq!(obs.precip_probability(), 100.0);
        assert_eq!(obs.measured_snow_depth(), Some(0.0));
    }

    #[test]
    fn test_neutral_record() {
        let obs = WeatherObservation::neutral("OR-ORA", Utc::now());
        assert_eq!(obs.provenance, Provenance::Default);
        assert_eq!(obs.temperature(), 65.0);
        assert_eq!(obs.wind_speed(), 5.0);
    }

    #[test]
    fn test_provenance_round_trip_str() {
        for p in [Provenance::Observed, Provenance::Aggregated, Provenance::Forecast, Provenance::Default] {
            assert_eq!(Provenance::parse(p.as_str()), p);
        }
    }
}
