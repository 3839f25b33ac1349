//! Observed outage records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observed outage state for one zone at one instant.
///
/// Produced by the outage-ingest collaborator; append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutageSnapshot {
    pub zone_id: String,
    /// Upstream feed name (e.g. "ods", "poweroutage_us")
    pub source: String,
    pub snapshot_at: DateTime<Utc>,
    pub outage_count: u32,
    pub customers_affected: u32,
}
