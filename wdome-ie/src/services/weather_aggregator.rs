//! Conservative multi-source weather merge
//!
//! Hazard fields take the worst value any source reports; temperature is the
//! mean of the reporting sources; condition text comes from the first source
//! that has one.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::collections::BTreeMap;
use wdome_common::{Provenance, WeatherObservation};

use crate::models::hazard::round1;

/// Longest merged forecast timeline (hourly points)
pub const MAX_FORECAST_POINTS: usize = 120;

fn safe_max(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values
        .flatten()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
}

fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let nums: Vec<f64> = values.flatten().filter(|v| v.is_finite()).collect();
    if nums.is_empty() {
        None
    } else {
        Some(round1(nums.iter().sum::<f64>() / nums.len() as f64))
    }
}

fn merge(
    zone_id: &str,
    provenance: Provenance,
    at: DateTime<Utc>,
    sources: &[&WeatherObservation],
) -> WeatherObservation {
    WeatherObservation {
        temperature_f: mean(sources.iter().map(|o| o.temperature_f)),
        wind_speed_mph: safe_max(sources.iter().map(|o| o.wind_speed_mph)),
        wind_gust_mph: safe_max(sources.iter().map(|o| o.wind_gust_mph)),
        precip_rate_in_hr: safe_max(sources.iter().map(|o| o.precip_rate_in_hr)),
        precip_probability_pct: safe_max(sources.iter().map(|o| o.precip_probability_pct)),
        snow_rate_in_hr: safe_max(sources.iter().map(|o| o.snow_rate_in_hr)),
        snow_depth_in: safe_max(sources.iter().map(|o| o.snow_depth_in)),
        ice_accum_in: safe_max(sources.iter().map(|o| o.ice_accum_in)),
        lightning_probability_pct: safe_max(sources.iter().map(|o| o.lightning_probability_pct)),
        condition_text: sources
            .iter()
            .find_map(|o| o.condition_text.clone().filter(|c| !c.trim().is_empty())),
        ..WeatherObservation::new(zone_id, provenance, at)
    }
}

/// Merge current observations from every source that answered
///
/// `None` when no source produced an observation. The merged record is
/// stamped with the newest source time.
pub fn aggregate_current(zone_id: &str, observations: &[WeatherObservation]) -> Option<WeatherObservation> {
    let latest = observations.iter().map(|o| o.observed_at).max()?;
    let sources: Vec<&WeatherObservation> = observations.iter().collect();
    Some(merge(zone_id, Provenance::Aggregated, latest, &sources))
}

/// Merge forecast timelines per UTC hour, ascending, capped at 120 points
pub fn aggregate_forecasts(zone_id: &str, forecasts: &[Vec<WeatherObservation>]) -> Vec<WeatherObservation> {
    let mut hourly: BTreeMap<DateTime<Utc>, Vec<&WeatherObservation>> = BTreeMap::new();
    for point in forecasts.iter().flatten() {
        let hour = point
            .observed_at
            .duration_trunc(TimeDelta::hours(1))
            .unwrap_or(point.observed_at);
        hourly.entry(hour).or_default().push(point);
    }

    hourly
        .into_iter()
        .take(MAX_FORECAST_POINTS)
        .map(|(hour, points)| merge(zone_id, Provenance::Forecast, hour, &points))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn obs(at: DateTime<Utc>, temp: f64, wind: Option<f64>, condition: Option<&str>) -> WeatherObservation {
        WeatherObservation {
            temperature_f: Some(temp),
            wind_speed_mph: wind,
            condition_text: condition.map(str::to_string),
            ..WeatherObservation::new("CONED-BKN", Provenance::Observed, at)
        }
    }

    #[test]
    fn test_current_takes_worst_hazard_and_mean_temperature() {
        let t0 = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap();
        let t1 = t0 + TimeDelta::minutes(5);
        let merged = aggregate_current(
            "CONED-BKN",
            &[
                obs(t0, 30.0, Some(20.0), None),
                obs(t1, 33.0, Some(35.0), Some("Snow")),
            ],
        )
        .unwrap();

        assert_eq!(merged.provenance, Provenance::Aggregated);
        assert_eq!(merged.observed_at, t1);
        assert_eq!(merged.temperature_f, Some(31.5));
        assert_eq!(merged.wind_speed_mph, Some(35.0));
        assert_eq!(merged.condition_text.as_deref(), Some("Snow"));
        assert_eq!(merged.ice_accum_in, None);
    }

    #[test]
    fn test_current_with_no_sources() {
        assert!(aggregate_current("CONED-BKN", &[]).is_none());
    }

    #[test]
    fn test_forecasts_merge_by_hour() {
        let t0 = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap();
        let a = vec![obs(t0, 30.0, Some(10.0), None), obs(t0 + TimeDelta::hours(1), 31.0, None, None)];
        let b = vec![obs(t0 + TimeDelta::minutes(20), 32.0, Some(25.0), None)];

        let merged = aggregate_forecasts("CONED-BKN", &[a, b]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].observed_at, t0);
        assert_eq!(merged[0].temperature_f, Some(31.0));
        assert_eq!(merged[0].wind_speed_mph, Some(25.0));
        assert_eq!(merged[1].provenance, Provenance::Forecast);
    }

    #[test]
    fn test_forecasts_capped() {
        let t0 = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let long: Vec<WeatherObservation> = (0..200)
            .map(|h| obs(t0 + TimeDelta::hours(h), 30.0, None, None))
            .collect();
        assert_eq!(aggregate_forecasts("CONED-BKN", &[long]).len(), MAX_FORECAST_POINTS);
    }
}
