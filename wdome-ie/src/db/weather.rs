//! Weather observation, forecast and alert storage

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use wdome_common::{Provenance, Result, WeatherAlert, WeatherObservation};

use super::{decode_opt_ts, decode_ts, encode_ts};

const OBSERVATION_COLUMNS: &str = "zone_id, provenance, observed_at, temperature_f, wind_speed_mph, \
    wind_gust_mph, precip_rate_in_hr, precip_probability_pct, snow_rate_in_hr, snow_depth_in, \
    ice_accum_in, lightning_probability_pct, condition_text";

fn observation_from_row(row: &SqliteRow) -> Result<WeatherObservation> {
    let provenance: String = row.try_get("provenance")?;
    let observed_at: String = row.try_get("observed_at")?;
    Ok(WeatherObservation {
        zone_id: row.try_get("zone_id")?,
        provenance: Provenance::parse(&provenance),
        observed_at: decode_ts(&observed_at)?,
        temperature_f: row.try_get("temperature_f")?,
        wind_speed_mph: row.try_get("wind_speed_mph")?,
        wind_gust_mph: row.try_get("wind_gust_mph")?,
        precip_rate_in_hr: row.try_get("precip_rate_in_hr")?,
        precip_probability_pct: row.try_get("precip_probability_pct")?,
        snow_rate_in_hr: row.try_get("snow_rate_in_hr")?,
        snow_depth_in: row.try_get("snow_depth_in")?,
        ice_accum_in: row.try_get("ice_accum_in")?,
        lightning_probability_pct: row.try_get("lightning_probability_pct")?,
        condition_text: row.try_get("condition_text")?,
    })
}

async fn insert_into<'e, E>(executor: E, table: &str, obs: &WeatherObservation) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let sql = format!(
        "INSERT INTO {} ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        table, OBSERVATION_COLUMNS
    );
    sqlx::query(&sql)
        .bind(&obs.zone_id)
        .bind(obs.provenance.as_str())
        .bind(encode_ts(obs.observed_at))
        .bind(obs.temperature_f)
        .bind(obs.wind_speed_mph)
        .bind(obs.wind_gust_mph)
        .bind(obs.precip_rate_in_hr)
        .bind(obs.precip_probability_pct)
        .bind(obs.snow_rate_in_hr)
        .bind(obs.snow_depth_in)
        .bind(obs.ice_accum_in)
        .bind(obs.lightning_probability_pct)
        .bind(&obs.condition_text)
        .execute(executor)
        .await?;
    Ok(())
}

/// Append a current observation
pub async fn insert_observation(pool: &SqlitePool, obs: &WeatherObservation) -> Result<()> {
    insert_into(pool, "weather_observations", obs).await
}

pub async fn latest_observation(pool: &SqlitePool, zone_id: &str) -> Result<Option<WeatherObservation>> {
    let sql = format!(
        "SELECT {} FROM weather_observations WHERE zone_id = ? ORDER BY observed_at DESC, id DESC LIMIT 1",
        OBSERVATION_COLUMNS
    );
    let row = sqlx::query(&sql).bind(zone_id).fetch_optional(pool).await?;
    row.as_ref().map(observation_from_row).transpose()
}

pub async fn observations_between(
    pool: &SqlitePool,
    zone_id: &str,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<WeatherObservation>> {
    let sql = format!(
        "SELECT {} FROM weather_observations \
         WHERE zone_id = ? AND observed_at >= ? AND observed_at < ? \
         ORDER BY observed_at ASC, id ASC",
        OBSERVATION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(zone_id)
        .bind(encode_ts(since))
        .bind(encode_ts(until))
        .fetch_all(pool)
        .await?;
    rows.iter().map(observation_from_row).collect()
}

/// Replace a zone's forecast timeline in one transaction
pub async fn replace_forecast(pool: &SqlitePool, zone_id: &str, points: &[WeatherObservation]) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM weather_forecasts WHERE zone_id = ?")
        .bind(zone_id)
        .execute(&mut *tx)
        .await?;
    for point in points {
        insert_into(&mut *tx, "weather_forecasts", point).await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn load_forecast(pool: &SqlitePool, zone_id: &str) -> Result<Vec<WeatherObservation>> {
    let sql = format!(
        "SELECT {} FROM weather_forecasts WHERE zone_id = ? ORDER BY observed_at ASC",
        OBSERVATION_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(zone_id).fetch_all(pool).await?;
    rows.iter().map(observation_from_row).collect()
}

/// Replace a zone's active alerts in one transaction
pub async fn replace_alerts(pool: &SqlitePool, zone_id: &str, alerts: &[WeatherAlert]) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM weather_alerts WHERE zone_id = ?")
        .bind(zone_id)
        .execute(&mut *tx)
        .await?;
    for alert in alerts {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO weather_alerts (
                zone_id, alert_id, event, severity, headline, description, onset, expires
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(zone_id)
        .bind(&alert.alert_id)
        .bind(&alert.event)
        .bind(&alert.severity)
        .bind(&alert.headline)
        .bind(&alert.description)
        .bind(alert.onset.map(encode_ts))
        .bind(alert.expires.map(encode_ts))
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn active_alerts(pool: &SqlitePool, zone_id: &str, at: DateTime<Utc>) -> Result<Vec<WeatherAlert>> {
    let rows = sqlx::query(
        r#"
        SELECT zone_id, alert_id, event, severity, headline, description, onset, expires
        FROM weather_alerts
        WHERE zone_id = ? AND (expires IS NULL OR expires > ?)
        ORDER BY alert_id
        "#,
    )
    .bind(zone_id)
    .bind(encode_ts(at))
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<WeatherAlert> {
            Ok(WeatherAlert {
                alert_id: row.try_get("alert_id")?,
                zone_id: row.try_get("zone_id")?,
                event: row.try_get("event")?,
                severity: row.try_get("severity")?,
                headline: row.try_get("headline")?,
                description: row.try_get("description")?,
                onset: decode_opt_ts(row.try_get("onset")?)?,
                expires: decode_opt_ts(row.try_get("expires")?)?,
            })
        })
        .collect()
}
