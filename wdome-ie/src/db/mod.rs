//! SQLite persistence
//!
//! Timestamps are stored as fixed-width RFC 3339 text (microseconds, `Z`
//! suffix) so lexical order equals time order.

pub mod calibration;
pub mod impacts;
pub mod outages;
pub mod weather;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use wdome_common::{Error, Result};

/// Initialize database connection pool and create tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema, for tests
pub async fn init_memory_pool() -> Result<SqlitePool> {
    // Single connection: each new connection to :memory: is a separate database
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create all tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weather_observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            zone_id TEXT NOT NULL,
            provenance TEXT NOT NULL,
            observed_at TEXT NOT NULL,
            temperature_f REAL,
            wind_speed_mph REAL,
            wind_gust_mph REAL,
            precip_rate_in_hr REAL,
            precip_probability_pct REAL,
            snow_rate_in_hr REAL,
            snow_depth_in REAL,
            ice_accum_in REAL,
            lightning_probability_pct REAL,
            condition_text TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_weather_observations_zone_time \
         ON weather_observations (zone_id, observed_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weather_forecasts (
            zone_id TEXT NOT NULL,
            provenance TEXT NOT NULL,
            observed_at TEXT NOT NULL,
            temperature_f REAL,
            wind_speed_mph REAL,
            wind_gust_mph REAL,
            precip_rate_in_hr REAL,
            precip_probability_pct REAL,
            snow_rate_in_hr REAL,
            snow_depth_in REAL,
            ice_accum_in REAL,
            lightning_probability_pct REAL,
            condition_text TEXT,
            PRIMARY KEY (zone_id, observed_at)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weather_alerts (
            zone_id TEXT NOT NULL,
            alert_id TEXT NOT NULL,
            event TEXT NOT NULL,
            severity TEXT NOT NULL,
            headline TEXT,
            description TEXT,
            onset TEXT,
            expires TEXT,
            PRIMARY KEY (zone_id, alert_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS outage_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            zone_id TEXT NOT NULL,
            source TEXT NOT NULL,
            snapshot_at TEXT NOT NULL,
            outage_count INTEGER NOT NULL,
            customers_affected INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_outage_snapshots_zone_time \
         ON outage_snapshots (zone_id, snapshot_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS impact_assessments (
            assessment_id TEXT PRIMARY KEY,
            zone_id TEXT NOT NULL,
            territory TEXT NOT NULL,
            assessed_at TEXT NOT NULL,
            forecast_hour INTEGER NOT NULL DEFAULT 0,
            overall_score REAL NOT NULL,
            overall_level TEXT NOT NULL,
            outage_score REAL NOT NULL,
            estimated_outages INTEGER NOT NULL,
            correction_ratio REAL NOT NULL DEFAULT 1.0,
            vegetation_score REAL NOT NULL,
            load_pct_capacity REAL NOT NULL,
            equipment_score REAL NOT NULL,
            melt_score REAL NOT NULL,
            jobs_mid INTEGER NOT NULL,
            snow_depth_in REAL NOT NULL,
            summary TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Databases created before the applied ratio was logged
    ensure_column(
        pool,
        "impact_assessments",
        "correction_ratio",
        "REAL NOT NULL DEFAULT 1.0",
    )
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_impact_assessments_zone_time \
         ON impact_assessments (zone_id, assessed_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS forecast_impacts (
            zone_id TEXT NOT NULL,
            forecast_hour INTEGER NOT NULL,
            forecast_for TEXT NOT NULL,
            overall_score REAL NOT NULL,
            overall_level TEXT NOT NULL,
            outage_score REAL NOT NULL,
            estimated_outages INTEGER NOT NULL,
            vegetation_score REAL NOT NULL,
            load_pct_capacity REAL NOT NULL,
            equipment_score REAL NOT NULL,
            melt_score REAL NOT NULL,
            snow_depth_in REAL NOT NULL,
            jobs_mid INTEGER NOT NULL,
            PRIMARY KEY (zone_id, forecast_hour)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS calibration_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            zone_id TEXT NOT NULL,
            computed_at TEXT NOT NULL,
            correction_ratio REAL NOT NULL,
            wind_correlation REAL,
            temp_correlation REAL,
            precip_correlation REAL,
            snow_correlation REAL,
            ice_correlation REAL,
            actual_outage_avg REAL NOT NULL,
            actual_outage_max INTEGER NOT NULL,
            actual_outage_min INTEGER NOT NULL,
            predicted_outage_avg REAL NOT NULL,
            predicted_score_avg REAL NOT NULL,
            predicted_jobs_avg REAL NOT NULL,
            wind_avg_mph REAL,
            temp_avg_f REAL,
            precip_avg_in_hr REAL,
            observation_count INTEGER NOT NULL,
            snapshot_count INTEGER NOT NULL,
            assessment_count INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!(
        "Database tables initialized (weather, outages, impacts, forecast impacts, calibration)"
    );

    Ok(())
}

/// Add a column to an existing table when `PRAGMA table_info` lacks it
async fn ensure_column(pool: &SqlitePool, table: &str, column: &str, definition: &str) -> Result<()> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
        .fetch_all(pool)
        .await?;
    let present = rows
        .iter()
        .any(|row| row.try_get::<String, _>("name").map_or(false, |name| name == column));
    if !present {
        tracing::info!("Adding column {}.{}", table, column);
        sqlx::query(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition))
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Encode a timestamp for storage
pub(crate) fn encode_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored timestamp
pub(crate) fn decode_ts(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp {:?}: {}", value, e)))
}

pub(crate) fn decode_opt_ts(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(decode_ts).transpose()
}

/// Counts are stored as INTEGER; negative values never occur but are floored at 0
pub(crate) fn decode_count(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_encoding_sorts_lexically() {
        let a = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
        let b = a + chrono::Duration::milliseconds(1500);
        assert!(encode_ts(a) < encode_ts(b));
        assert_eq!(encode_ts(a).len(), encode_ts(b).len());
        assert_eq!(decode_ts(&encode_ts(b)).unwrap(), b);
    }

    #[tokio::test]
    async fn test_database_file_created() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("weather_dome.db");
        let pool = init_database_pool(&db_path).await.unwrap();
        assert!(db_path.exists());

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'calibration_records'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);

        // Idempotent
        init_tables(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_ratio_column_added() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE impact_assessments \
             (assessment_id TEXT PRIMARY KEY, zone_id TEXT NOT NULL, assessed_at TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO impact_assessments (assessment_id, zone_id, assessed_at) \
             VALUES ('a', 'OR-ORA', '2026-01-01T00:00:00.000000Z')",
        )
        .execute(&pool)
        .await
        .unwrap();

        init_tables(&pool).await.unwrap();

        let ratio: f64 =
            sqlx::query_scalar("SELECT correction_ratio FROM impact_assessments WHERE assessment_id = 'a'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(ratio, 1.0);
    }
}
