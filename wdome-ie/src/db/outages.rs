//! Outage snapshot storage

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use wdome_common::{OutageSnapshot, Result};

use super::{decode_count, decode_ts, encode_ts};

fn snapshot_from_row(row: &SqliteRow) -> Result<OutageSnapshot> {
    let snapshot_at: String = row.try_get("snapshot_at")?;
    Ok(OutageSnapshot {
        zone_id: row.try_get("zone_id")?,
        source: row.try_get("source")?,
        snapshot_at: decode_ts(&snapshot_at)?,
        outage_count: decode_count(row.try_get("outage_count")?),
        customers_affected: decode_count(row.try_get("customers_affected")?),
    })
}

pub async fn insert_snapshot(pool: &SqlitePool, snapshot: &OutageSnapshot) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO outage_snapshots (zone_id, source, snapshot_at, outage_count, customers_affected)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&snapshot.zone_id)
    .bind(&snapshot.source)
    .bind(encode_ts(snapshot.snapshot_at))
    .bind(snapshot.outage_count as i64)
    .bind(snapshot.customers_affected as i64)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn latest_snapshot(pool: &SqlitePool, zone_id: &str) -> Result<Option<OutageSnapshot>> {
    let row = sqlx::query(
        r#"
        SELECT zone_id, source, snapshot_at, outage_count, customers_affected
        FROM outage_snapshots
        WHERE zone_id = ?
        ORDER BY snapshot_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(zone_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(snapshot_from_row).transpose()
}

pub async fn snapshots_since(
    pool: &SqlitePool,
    zone_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<OutageSnapshot>> {
    let rows = sqlx::query(
        r#"
        SELECT zone_id, source, snapshot_at, outage_count, customers_affected
        FROM outage_snapshots
        WHERE zone_id = ? AND snapshot_at >= ?
        ORDER BY snapshot_at ASC, id ASC
        "#,
    )
    .bind(zone_id)
    .bind(encode_ts(since))
    .fetch_all(pool)
    .await?;
    rows.iter().map(snapshot_from_row).collect()
}
