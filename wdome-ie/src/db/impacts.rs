//! Impact assessment log and forecast impact storage

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use wdome_common::{Error, Result, Territory};

use super::{decode_count, decode_ts, encode_ts};
use crate::models::RiskLevel;
use crate::types::{ForecastImpactPoint, ImpactAssessment};

fn assessment_from_row(row: &SqliteRow) -> Result<ImpactAssessment> {
    let assessment_id: String = row.try_get("assessment_id")?;
    let territory: String = row.try_get("territory")?;
    let assessed_at: String = row.try_get("assessed_at")?;
    let overall_level: String = row.try_get("overall_level")?;

    Ok(ImpactAssessment {
        assessment_id: Uuid::parse_str(&assessment_id)
            .map_err(|e| Error::Internal(format!("Invalid assessment id {}: {}", assessment_id, e)))?,
        zone_id: row.try_get("zone_id")?,
        territory: Territory::parse(&territory)
            .ok_or_else(|| Error::Internal(format!("Unknown territory {}", territory)))?,
        assessed_at: decode_ts(&assessed_at)?,
        forecast_hour: decode_count(row.try_get("forecast_hour")?),
        overall_score: row.try_get("overall_score")?,
        overall_level: RiskLevel::parse(&overall_level),
        outage_score: row.try_get("outage_score")?,
        estimated_outages: decode_count(row.try_get("estimated_outages")?),
        correction_ratio: row.try_get("correction_ratio")?,
        vegetation_score: row.try_get("vegetation_score")?,
        load_pct_capacity: row.try_get("load_pct_capacity")?,
        equipment_score: row.try_get("equipment_score")?,
        melt_score: row.try_get("melt_score")?,
        jobs_mid: decode_count(row.try_get("jobs_mid")?),
        snow_depth_in: row.try_get("snow_depth_in")?,
        summary: row.try_get("summary")?,
    })
}

/// Append one assessment
pub async fn insert_assessment(pool: &SqlitePool, a: &ImpactAssessment) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO impact_assessments (
            assessment_id, zone_id, territory, assessed_at, forecast_hour,
            overall_score, overall_level, outage_score, estimated_outages,
            correction_ratio, vegetation_score, load_pct_capacity, equipment_score,
            melt_score, jobs_mid, snow_depth_in, summary
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(a.assessment_id.to_string())
    .bind(&a.zone_id)
    .bind(a.territory.as_str())
    .bind(encode_ts(a.assessed_at))
    .bind(a.forecast_hour as i64)
    .bind(a.overall_score)
    .bind(a.overall_level.as_str())
    .bind(a.outage_score)
    .bind(a.estimated_outages as i64)
    .bind(a.correction_ratio)
    .bind(a.vegetation_score)
    .bind(a.load_pct_capacity)
    .bind(a.equipment_score)
    .bind(a.melt_score)
    .bind(a.jobs_mid as i64)
    .bind(a.snow_depth_in)
    .bind(&a.summary)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn current_assessments_since(
    pool: &SqlitePool,
    zone_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<ImpactAssessment>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM impact_assessments
        WHERE zone_id = ? AND forecast_hour = 0 AND assessed_at >= ?
        ORDER BY assessed_at ASC
        "#,
    )
    .bind(zone_id)
    .bind(encode_ts(since))
    .fetch_all(pool)
    .await?;
    rows.iter().map(assessment_from_row).collect()
}

/// Replace a zone's forecast impact timeline in one transaction
pub async fn replace_forecast_impacts(
    pool: &SqlitePool,
    zone_id: &str,
    points: &[ForecastImpactPoint],
) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM forecast_impacts WHERE zone_id = ?")
        .bind(zone_id)
        .execute(&mut *tx)
        .await?;
    for p in points {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO forecast_impacts (
                zone_id, forecast_hour, forecast_for, overall_score, overall_level,
                outage_score, estimated_outages, vegetation_score, load_pct_capacity,
                equipment_score, melt_score, snow_depth_in, jobs_mid
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(zone_id)
        .bind(p.forecast_hour as i64)
        .bind(encode_ts(p.forecast_for))
        .bind(p.overall_score)
        .bind(p.overall_level.as_str())
        .bind(p.outage_score)
        .bind(p.estimated_outages as i64)
        .bind(p.vegetation_score)
        .bind(p.load_pct_capacity)
        .bind(p.equipment_score)
        .bind(p.melt_score)
        .bind(p.snow_depth_in)
        .bind(p.jobs_mid as i64)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn load_forecast_impacts(pool: &SqlitePool, zone_id: &str) -> Result<Vec<ForecastImpactPoint>> {
    let rows = sqlx::query(
        "SELECT * FROM forecast_impacts WHERE zone_id = ? ORDER BY forecast_hour ASC",
    )
    .bind(zone_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<ForecastImpactPoint> {
            let forecast_for: String = row.try_get("forecast_for")?;
            let overall_level: String = row.try_get("overall_level")?;
            Ok(ForecastImpactPoint {
                zone_id: row.try_get("zone_id")?,
                forecast_for: decode_ts(&forecast_for)?,
                forecast_hour: decode_count(row.try_get("forecast_hour")?),
                overall_score: row.try_get("overall_score")?,
                overall_level: RiskLevel::parse(&overall_level),
                outage_score: row.try_get("outage_score")?,
                estimated_outages: decode_count(row.try_get("estimated_outages")?),
                vegetation_score: row.try_get("vegetation_score")?,
                load_pct_capacity: row.try_get("load_pct_capacity")?,
                equipment_score: row.try_get("equipment_score")?,
                melt_score: row.try_get("melt_score")?,
                snow_depth_in: row.try_get("snow_depth_in")?,
                jobs_mid: decode_count(row.try_get("jobs_mid")?),
            })
        })
        .collect()
}
