//! Calibration record storage (append-only, most recent wins)

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use wdome_common::Result;

use super::{decode_count, decode_ts, encode_ts};
use crate::models::clamp_correction;
use crate::types::CalibrationRecord;

fn record_from_row(row: &SqliteRow) -> Result<CalibrationRecord> {
    let computed_at: String = row.try_get("computed_at")?;
    Ok(CalibrationRecord {
        zone_id: row.try_get("zone_id")?,
        computed_at: decode_ts(&computed_at)?,
        correction_ratio: clamp_correction(row.try_get("correction_ratio")?),
        wind_correlation: row.try_get("wind_correlation")?,
        temp_correlation: row.try_get("temp_correlation")?,
        precip_correlation: row.try_get("precip_correlation")?,
        snow_correlation: row.try_get("snow_correlation")?,
        ice_correlation: row.try_get("ice_correlation")?,
        actual_outage_avg: row.try_get("actual_outage_avg")?,
        actual_outage_max: decode_count(row.try_get("actual_outage_max")?),
        actual_outage_min: decode_count(row.try_get("actual_outage_min")?),
        predicted_outage_avg: row.try_get("predicted_outage_avg")?,
        predicted_score_avg: row.try_get("predicted_score_avg")?,
        predicted_jobs_avg: row.try_get("predicted_jobs_avg")?,
        wind_avg_mph: row.try_get("wind_avg_mph")?,
        temp_avg_f: row.try_get("temp_avg_f")?,
        precip_avg_in_hr: row.try_get("precip_avg_in_hr")?,
        observation_count: decode_count(row.try_get("observation_count")?),
        snapshot_count: decode_count(row.try_get("snapshot_count")?),
        assessment_count: decode_count(row.try_get("assessment_count")?),
    })
}

/// Append a record; the ratio is clamped before it is written
pub async fn insert_record(pool: &SqlitePool, r: &CalibrationRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO calibration_records (
            zone_id, computed_at, correction_ratio,
            wind_correlation, temp_correlation, precip_correlation, snow_correlation, ice_correlation,
            actual_outage_avg, actual_outage_max, actual_outage_min,
            predicted_outage_avg, predicted_score_avg, predicted_jobs_avg,
            wind_avg_mph, temp_avg_f, precip_avg_in_hr,
            observation_count, snapshot_count, assessment_count
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&r.zone_id)
    .bind(encode_ts(r.computed_at))
    .bind(clamp_correction(r.correction_ratio))
    .bind(r.wind_correlation)
    .bind(r.temp_correlation)
    .bind(r.precip_correlation)
    .bind(r.snow_correlation)
    .bind(r.ice_correlation)
    .bind(r.actual_outage_avg)
    .bind(r.actual_outage_max as i64)
    .bind(r.actual_outage_min as i64)
    .bind(r.predicted_outage_avg)
    .bind(r.predicted_score_avg)
    .bind(r.predicted_jobs_avg)
    .bind(r.wind_avg_mph)
    .bind(r.temp_avg_f)
    .bind(r.precip_avg_in_hr)
    .bind(r.observation_count as i64)
    .bind(r.snapshot_count as i64)
    .bind(r.assessment_count as i64)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn latest_record(pool: &SqlitePool, zone_id: &str) -> Result<Option<CalibrationRecord>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM calibration_records
        WHERE zone_id = ?
        ORDER BY computed_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(zone_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(record_from_row).transpose()
}

/// Latest clamped correction ratio for every zone with a record
pub async fn latest_corrections(pool: &SqlitePool) -> Result<HashMap<String, f64>> {
    let rows = sqlx::query(
        r#"
        SELECT c.zone_id, c.correction_ratio
        FROM calibration_records c
        WHERE c.id = (
            SELECT id FROM calibration_records
            WHERE zone_id = c.zone_id
            ORDER BY computed_at DESC, id DESC
            LIMIT 1
        )
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<(String, f64)> {
            let zone_id: String = row.try_get("zone_id")?;
            let ratio: f64 = row.try_get("correction_ratio")?;
            Ok((zone_id, clamp_correction(ratio)))
        })
        .collect()
}
