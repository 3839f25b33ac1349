//! Self-calibration against observed outages
//!
//! A batch job. For every zone with enough recent data it compares live outage
//! counts with the outages the engine predicted over the same lookback and
//! records how strongly each weather field tracked the outage counts. The
//! predictions already carry the ratio that was applied when they were made,
//! so the stored ratio is `applied × actual / predicted`, clamped. Under a
//! steady bias this settles where predictions match observed outages. The
//! outage and job models read the latest ratio on their next run.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};
use wdome_common::config::CalibrationConfig;
use wdome_common::{time, OutageSnapshot, Result, WeatherObservation, ZoneTable};

use crate::models::clamp_correction;
use crate::models::hazard::round1;
use crate::repository::Repository;
use crate::types::CalibrationRecord;

/// Ratio below which the engine is over-predicting
const OVER_PREDICTING_BELOW: f64 = 0.9;

/// Ratio above which the engine is under-predicting
const UNDER_PREDICTING_ABOVE: f64 = 1.1;

/// Result of one calibration run
#[derive(Debug, Clone, Default)]
pub struct CalibrationReport {
    pub computed_at: DateTime<Utc>,
    pub records: Vec<CalibrationRecord>,
    /// Zones below the sample minimums
    pub skipped: Vec<String>,
    /// Zones whose calibration raised an error
    pub failed: Vec<String>,
}

impl CalibrationReport {
    /// Multi-line report, one line per calibrated zone
    pub fn render(&self) -> String {
        let mut lines = vec![format!(
            "=== Calibration Report {} ===",
            self.computed_at.format("%Y-%m-%d %H:%M UTC")
        )];
        for r in &self.records {
            lines.push(format!(
                "  {}: actual_avg={:.0} predicted_avg={:.0} ratio={:.2} ({}) jobs_avg={:.0} score_avg={:.1} snaps={} assessments={}",
                r.zone_id,
                r.actual_outage_avg,
                r.predicted_outage_avg,
                r.correction_ratio,
                bias_label(r.correction_ratio),
                r.predicted_jobs_avg,
                r.predicted_score_avg,
                r.snapshot_count,
                r.assessment_count,
            ));
        }
        if !self.skipped.is_empty() {
            lines.push(format!("  skipped (insufficient data): {}", self.skipped.join(", ")));
        }
        if !self.failed.is_empty() {
            lines.push(format!("  failed: {}", self.failed.join(", ")));
        }
        lines.join("\n")
    }
}

/// OVER when the engine predicts too many outages, UNDER when too few
pub fn bias_label(ratio: f64) -> &'static str {
    if ratio < OVER_PREDICTING_BELOW {
        "OVER"
    } else if ratio > UNDER_PREDICTING_ABOVE {
        "UNDER"
    } else {
        "OK"
    }
}

pub struct CalibrationEngine {
    repo: Arc<dyn Repository>,
    zones: ZoneTable,
    config: CalibrationConfig,
}

impl CalibrationEngine {
    pub fn new(repo: Arc<dyn Repository>, zones: ZoneTable, config: CalibrationConfig) -> Self {
        Self { repo, zones, config }
    }

    /// Calibrate every zone once
    ///
    /// A zone that errors is logged and skipped; the run continues.
    pub async fn run(&self) -> CalibrationReport {
        let now = time::now();
        let mut report = CalibrationReport {
            computed_at: now,
            ..Default::default()
        };

        for zone in self.zones.all() {
            match self.calibrate_zone(&zone.zone_id, now).await {
                Ok(Some(record)) => report.records.push(record),
                Ok(None) => report.skipped.push(zone.zone_id.clone()),
                Err(e) => {
                    error!(zone_id = %zone.zone_id, "Calibration failed: {}", e);
                    report.failed.push(zone.zone_id.clone());
                }
            }
        }

        if report.records.is_empty() {
            info!("Calibration: no zones with enough recent data");
        }
        info!("{}", report.render());
        report
    }

    /// Calibrate one zone and store the record
    ///
    /// `Ok(None)` when the zone is below the snapshot or assessment minimum.
    pub async fn calibrate_zone(&self, zone_id: &str, now: DateTime<Utc>) -> Result<Option<CalibrationRecord>> {
        let since = now - Duration::hours(self.config.lookback_hours);

        let snapshots = self.repo.snapshots_since(zone_id, since).await?;
        if snapshots.len() < self.config.min_snapshots {
            debug!(zone_id, snapshots = snapshots.len(), "Calibration skipped: too few outage snapshots");
            return Ok(None);
        }

        let assessments = self.repo.current_assessments_since(zone_id, since).await?;
        if assessments.len() < self.config.min_assessments {
            debug!(
                zone_id,
                assessments = assessments.len(),
                "Calibration skipped: too few impact assessments"
            );
            return Ok(None);
        }

        let observations = self.repo.observations_between(zone_id, since, now).await?;

        let actual: Vec<f64> = snapshots.iter().map(|s| s.outage_count as f64).collect();
        let actual_avg = average(&actual).unwrap_or(0.0);
        let predicted_avg =
            average(&assessments.iter().map(|a| a.estimated_outages as f64).collect::<Vec<_>>()).unwrap_or(0.0);
        let score_avg =
            average(&assessments.iter().map(|a| a.outage_score).collect::<Vec<_>>()).unwrap_or(0.0);
        let jobs_avg =
            average(&assessments.iter().map(|a| a.jobs_mid as f64).collect::<Vec<_>>()).unwrap_or(0.0);

        let applied_avg = average(
            &assessments
                .iter()
                .map(|a| clamp_correction(a.correction_ratio))
                .collect::<Vec<_>>(),
        )
        .unwrap_or(1.0);

        let ratio = if predicted_avg > 0.0 {
            clamp_correction(((applied_avg * actual_avg / predicted_avg) * 1000.0).round() / 1000.0)
        } else {
            1.0
        };

        let window = Duration::minutes(self.config.pairing_window_minutes);
        let min_pairs = self.config.min_pairs;
        let correlate = |field: fn(&WeatherObservation) -> Option<f64>| {
            pearson_paired(&observations, &snapshots, field, window, min_pairs)
        };

        let record = CalibrationRecord {
            zone_id: zone_id.to_string(),
            computed_at: now,
            correction_ratio: ratio,
            wind_correlation: correlate(|o| o.wind_speed_mph),
            temp_correlation: correlate(|o| o.temperature_f),
            precip_correlation: correlate(|o| o.precip_rate_in_hr),
            snow_correlation: correlate(|o| o.snow_rate_in_hr),
            ice_correlation: correlate(|o| o.ice_accum_in),
            actual_outage_avg: round1(actual_avg),
            actual_outage_max: snapshots.iter().map(|s| s.outage_count).max().unwrap_or(0),
            actual_outage_min: snapshots.iter().map(|s| s.outage_count).min().unwrap_or(0),
            predicted_outage_avg: round1(predicted_avg),
            predicted_score_avg: round1(score_avg),
            predicted_jobs_avg: round1(jobs_avg),
            wind_avg_mph: field_average(&observations, |o| o.wind_speed_mph).map(round1),
            temp_avg_f: field_average(&observations, |o| o.temperature_f).map(round1),
            precip_avg_in_hr: field_average(&observations, |o| o.precip_rate_in_hr)
                .map(|v| (v * 1000.0).round() / 1000.0),
            observation_count: observations.len() as u32,
            snapshot_count: snapshots.len() as u32,
            assessment_count: assessments.len() as u32,
        };

        self.repo.save_calibration(&record).await?;
        info!(
            zone_id,
            ratio = record.correction_ratio,
            label = bias_label(record.correction_ratio),
            "Calibration record stored"
        );
        Ok(Some(record))
    }
}

fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn field_average(observations: &[WeatherObservation], field: fn(&WeatherObservation) -> Option<f64>) -> Option<f64> {
    let values: Vec<f64> = observations
        .iter()
        .filter_map(field)
        .filter(|v| v.is_finite())
        .collect();
    average(&values)
}

/// Pearson correlation between a weather field and outage counts
///
/// Each snapshot is paired with the observation nearest in time, strictly
/// within `window`, that has the field set. `None` when fewer than
/// `min_pairs` pairs exist; 0.0 when either series is constant.
pub fn pearson_paired(
    observations: &[WeatherObservation],
    snapshots: &[OutageSnapshot],
    field: fn(&WeatherObservation) -> Option<f64>,
    window: Duration,
    min_pairs: usize,
) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = snapshots
        .iter()
        .filter_map(|snap| {
            observations
                .iter()
                .filter_map(|o| {
                    let value = field(o).filter(|v| v.is_finite())?;
                    let delta = (o.observed_at - snap.snapshot_at).abs();
                    (delta < window).then_some((delta, value))
                })
                .min_by_key(|(delta, _)| *delta)
                .map(|(_, value)| (value, snap.outage_count as f64))
        })
        .collect();

    if pairs.len() < min_pairs.max(2) {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return Some(0.0);
    }
    Some(((cov / denominator) * 1000.0).round() / 1000.0)
}
