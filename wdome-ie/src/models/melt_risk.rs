//! Underground melt risk
//!
//! Snowmelt and road-salt brine infiltrate manholes and cable vaults, causing
//! cable failures and manhole fires that peak in February and March. The score
//! blends six sub-scores:
//!
//! | sub-score | weight |
//! |---|---|
//! | snow-cover melt | 0.35 |
//! | salt brine contamination | 0.25 |
//! | melt potential | 0.15 |
//! | rain-on-snow | 0.10 |
//! | warming trend | 0.10 |
//! | freeze-thaw cycling | 0.05 |
//!
//! plus a rapid-warming premium of up to 25 points (first warm day after a storm),
//! scaled by the zone's underground vulnerability and the seasonal factor.

use serde::{Deserialize, Serialize};
use wdome_common::config::MeltConfig;
use wdome_common::{time, WeatherObservation, ZoneAttributes};

use super::hazard::{round1, HazardScore};
use crate::services::snow_depth::{resolve_unmeasured, DepthSource, ResolvedDepth, MIN_SIGNIFICANT_DEPTH_IN};

/// Largest rapid-warming premium (points)
pub const RAPID_WARMING_PREMIUM_MAX: f64 = 25.0;

/// Points per full freeze-thaw cycle (4 cycles saturate)
const POINTS_PER_FREEZE_THAW_CYCLE: f64 = 25.0;

/// Below this vulnerability or seasonal factor the zone cannot have melt risk
const GATE: f64 = 0.01;

/// Seasonal melt factor by calendar month
pub fn seasonal_factor(month: u32) -> f64 {
    match month {
        2 | 3 => 1.0,
        1 | 4 => 0.7,
        5 | 11 | 12 => 0.4,
        10 => 0.2,
        _ => 0.0,
    }
}

/// Melt risk for one zone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeltRisk {
    #[serde(flatten)]
    pub hazard: HazardScore,
    pub snow_depth_in: f64,
    pub depth_source: DepthSource,
    pub temperature_trend_f_per_hr: f64,
    pub snow_cover_melt: f64,
    pub salt_brine_risk: f64,
    pub melt_potential: f64,
    pub rain_on_snow_risk: f64,
    pub trend_score: f64,
    pub freeze_thaw_cycles: u32,
    pub rapid_warming_premium: f64,
}

impl MeltRisk {
    fn gated(depth: ResolvedDepth) -> Self {
        Self {
            snow_depth_in: round1(depth.depth_in),
            depth_source: depth.source,
            ..Default::default()
        }
    }
}

/// Melt risk model
#[derive(Debug, Clone)]
pub struct MeltRiskModel {
    freezing_f: f64,
    warm_f: f64,
    rapid_rate: f64,
}

impl MeltRiskModel {
    pub fn new(config: &MeltConfig) -> Self {
        Self {
            freezing_f: config.freezing_point_f,
            warm_f: config.warm_threshold_f,
            rapid_rate: config.rapid_warming_rate_f_per_hr,
        }
    }

    /// Score with the tracker's depth, deriving a depth when it is absent
    ///
    /// Tracked depth (> 0.1 in) wins; otherwise history accumulation and finally
    /// condition-text inference supply the depth.
    pub fn compute_with_tracked(
        &self,
        obs: &WeatherObservation,
        attributes: &ZoneAttributes,
        history: &[WeatherObservation],
        tracked_depth_in: Option<f64>,
    ) -> MeltRisk {
        let depth = match tracked_depth_in.filter(|d| d.is_finite() && *d > MIN_SIGNIFICANT_DEPTH_IN) {
            Some(depth) => ResolvedDepth::new(depth, DepthSource::Tracked),
            None => resolve_unmeasured(obs, history, &[], attributes),
        };
        self.compute(obs, attributes, history, depth)
    }

    /// Score with an already-resolved depth
    ///
    /// `history` is the up-to-48h window before `obs`, in ascending time order.
    pub fn compute(
        &self,
        obs: &WeatherObservation,
        attributes: &ZoneAttributes,
        history: &[WeatherObservation],
        depth: ResolvedDepth,
    ) -> MeltRisk {
        let vulnerability = attributes.underground_vulnerability;
        let season = seasonal_factor(time::month(obs.observed_at));
        if vulnerability < GATE || season < GATE {
            return MeltRisk::gated(depth);
        }

        let freezing = self.freezing_f;
        let zone_threshold = attributes.effective_melt_threshold_f;
        let temp = obs.temperature();
        let snow_rate = obs.snow_rate();
        let precip_rate = obs.precip_rate();
        let ice = obs.ice_accum();
        let depth_in = if depth.depth_in.is_finite() { depth.depth_in.max(0.0) } else { 0.0 };

        let mut temps: Vec<f64> = history
            .iter()
            .filter_map(|o| o.temperature_f.filter(|t| t.is_finite()))
            .collect();
        temps.push(temp);

        let snow_present = depth_in > MIN_SIGNIFICANT_DEPTH_IN || snow_rate > 0.0 || ice > 0.0;
        let mut factors = Vec::new();

        // Snow-cover melt: ground snow above the zone's salted-road threshold
        let mut snow_cover_melt = 0.0;
        if depth_in > MIN_SIGNIFICANT_DEPTH_IN && temp > zone_threshold {
            let temp_factor = ((temp - zone_threshold) / 15.0).min(1.0);
            let depth_factor = (depth_in / 12.0).min(1.0);
            snow_cover_melt = temp_factor * (0.4 + 0.6 * depth_factor) * 100.0;
            factors.push(format!("Snow cover melting ({:.1} in on ground)", depth_in));
        }

        // Salt brine: more snow means more salt, warmth dissolves it
        let mut salt_brine = 0.0;
        let effective_snow = depth_in + snow_rate;
        if temp >= zone_threshold && effective_snow > 0.5 {
            let snow_factor = (effective_snow / 4.0).min(1.0);
            let melt_intensity = ((temp - zone_threshold) / 10.0).min(1.0);
            salt_brine = snow_factor * melt_intensity * 100.0;
            if salt_brine > 15.0 {
                factors.push(format!(
                    "Salt-melt brine risk ({:.1} in snow, {:.0}F above melt threshold)",
                    effective_snow,
                    temp - zone_threshold
                ));
            }
        }

        // Melt potential
        let mut melt_potential = 0.0;
        if temp > freezing && snow_present {
            let temp_factor = ((temp - freezing) / 15.0).min(1.0);
            let snow_factor = ((depth_in + ice) / 2.0).min(1.0);
            melt_potential = (temp_factor * 0.5 + snow_factor * 0.5) * 100.0;
            factors.push("Active snowmelt conditions".to_string());
        }

        // Rain-on-snow
        let mut rain_on_snow = 0.0;
        if precip_rate > 0.0 && snow_present && temp > freezing {
            rain_on_snow = (precip_rate / 0.5).min(1.0) * 100.0;
            factors.push("Rain-on-snow accelerating melt".to_string());
        }

        // Warming trend: first-half minimum against the current reading
        let (trend_rate, trend_score) = self.trend(obs, history, &temps, temp);
        if trend_score > 0.0 && temps.len() >= 2 {
            factors.push(format!("Warming {:.1}F/hr", trend_rate));
        }

        // Freeze-thaw cycling
        let freeze_thaw_cycles = freeze_thaw_cycles(&temps, freezing);
        let freeze_thaw = (freeze_thaw_cycles as f64 * POINTS_PER_FREEZE_THAW_CYCLE).min(100.0);
        if freeze_thaw_cycles >= 2 {
            factors.push(format!("{} freeze-thaw cycles in 48h", freeze_thaw_cycles));
        }

        let mut premium = 0.0;
        if trend_rate > self.rapid_rate && snow_present {
            premium = RAPID_WARMING_PREMIUM_MAX * (trend_rate / (2.0 * self.rapid_rate)).min(1.0);
            factors.push("Rapid warming over fresh snow".to_string());
        }

        let raw = snow_cover_melt * 0.35
            + salt_brine * 0.25
            + melt_potential * 0.15
            + rain_on_snow * 0.10
            + trend_score * 0.10
            + freeze_thaw * 0.05
            + premium;

        if vulnerability >= 0.5 {
            factors.push("High underground infrastructure vulnerability".to_string());
        }

        MeltRisk {
            hazard: HazardScore::new(round1(raw * vulnerability * season), factors),
            snow_depth_in: round1(depth_in),
            depth_source: depth.source,
            temperature_trend_f_per_hr: (trend_rate * 100.0).round() / 100.0,
            snow_cover_melt: round1(snow_cover_melt),
            salt_brine_risk: round1(salt_brine),
            melt_potential: round1(melt_potential),
            rain_on_snow_risk: round1(rain_on_snow),
            trend_score: round1(trend_score),
            freeze_thaw_cycles,
            rapid_warming_premium: round1(premium),
        }
    }

    /// Warming rate (°F/hr) and its sub-score
    fn trend(
        &self,
        obs: &WeatherObservation,
        history: &[WeatherObservation],
        temps: &[f64],
        current: f64,
    ) -> (f64, f64) {
        if temps.len() < 2 {
            return (0.0, 0.0);
        }
        let half = (temps.len() / 2).max(1);
        let first_half_min = temps[..half].iter().copied().fold(f64::INFINITY, f64::min);
        let span_hours = history
            .first()
            .map(|first| time::hours_between(first.observed_at, obs.observed_at))
            .unwrap_or(0.0)
            .max(1.0);
        let rate = (current - first_half_min) / span_hours;

        let freezing = self.freezing_f;
        let score = if first_half_min < freezing && current > freezing {
            let rate_factor = (rate / self.rapid_rate).clamp(0.0, 1.0);
            let temp_above = ((current - freezing) / (self.warm_f - freezing)).min(1.0);
            (rate_factor * 0.6 + temp_above * 0.4) * 100.0
        } else if current > freezing && rate > 0.5 {
            (rate / self.rapid_rate * 50.0).min(50.0)
        } else {
            0.0
        };
        (rate, score)
    }
}

/// Full above/below-freezing cycles in a temperature series
pub fn freeze_thaw_cycles(temps: &[f64], freezing_f: f64) -> u32 {
    if temps.len() < 4 {
        return 0;
    }
    let mut above = temps[0] > freezing_f;
    let mut crossings = 0u32;
    for &t in &temps[1..] {
        let now_above = t > freezing_f;
        if now_above != above {
            crossings += 1;
            above = now_above;
        }
    }
    crossings / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use wdome_common::{Provenance, ZoneTable};

    fn model() -> MeltRiskModel {
        MeltRiskModel::new(&MeltConfig::default())
    }

    fn feb_obs(temp: f64) -> WeatherObservation {
        WeatherObservation {
            temperature_f: Some(temp),
            ..WeatherObservation::new(
                "CONED-BKN",
                Provenance::Observed,
                Utc.with_ymd_and_hms(2026, 2, 20, 18, 0, 0).unwrap(),
            )
        }
    }

    fn warming_history(current: &WeatherObservation) -> Vec<WeatherObservation> {
        // 12 hours climbing from 20F to 38F
        (1..=12)
            .rev()
            .map(|h| WeatherObservation {
                temperature_f: Some(38.0 - 1.5 * h as f64),
                observed_at: current.observed_at - Duration::hours(h),
                ..current.clone()
            })
            .collect()
    }

    #[test]
    fn test_seasonal_factor_table() {
        assert_eq!(seasonal_factor(2), 1.0);
        assert_eq!(seasonal_factor(4), 0.7);
        assert_eq!(seasonal_factor(12), 0.4);
        assert_eq!(seasonal_factor(10), 0.2);
        for month in 6..=9 {
            assert_eq!(seasonal_factor(month), 0.0);
        }
    }

    #[test]
    fn test_freeze_thaw_counting() {
        assert_eq!(freeze_thaw_cycles(&[30.0, 34.0, 30.0], 32.0), 0);
        assert_eq!(freeze_thaw_cycles(&[30.0, 34.0, 30.0, 34.0, 30.0], 32.0), 2);
    }

    #[test]
    fn test_storm_aftermath_scores_high_in_brooklyn() {
        let attrs = ZoneTable::builtin().attributes("CONED-BKN");
        let obs = feb_obs(38.0);
        let history = warming_history(&obs);
        let risk = model().compute(&obs, &attrs, &history, ResolvedDepth::new(14.0, DepthSource::Tracked));

        assert!(risk.snow_cover_melt > 50.0);
        assert!(risk.salt_brine_risk > 90.0);
        assert!(risk.hazard.score > 25.0, "score {}", risk.hazard.score);
        assert!(risk.hazard.score <= 100.0);
        assert_eq!(risk.depth_source, DepthSource::Tracked);
    }

    #[test]
    fn test_no_snow_no_melt_risk() {
        let attrs = ZoneTable::builtin().attributes("CONED-MAN");
        let obs = feb_obs(45.0);
        let risk = model().compute(&obs, &attrs, &[], ResolvedDepth::none());
        assert_eq!(risk.hazard.score, 0.0);
    }

    #[test]
    fn test_compute_with_tracked_falls_back_to_condition() {
        let attrs = ZoneTable::builtin().attributes("CONED-BKN");
        let obs = WeatherObservation {
            condition_text: Some("Heavy snow".to_string()),
            ..feb_obs(36.0)
        };
        let risk = model().compute_with_tracked(&obs, &attrs, &[], None);
        assert_eq!(risk.depth_source, DepthSource::Condition);
        assert_eq!(risk.snow_depth_in, 6.0);

        let tracked = model().compute_with_tracked(&obs, &attrs, &[], Some(9.0));
        assert_eq!(tracked.depth_source, DepthSource::Tracked);
        assert_eq!(tracked.snow_depth_in, 9.0);
    }
}
