//! Per-zone ground snow depth tracker
//!
//! Holds the authoritative depth estimate for every zone that has been
//! initialised (by an operator `set`, by measured depth, or by snowfall). A zone
//! that was never initialised is *untracked* and reads as `None`, which is not
//! the same as a tracked depth of zero.
//!
//! Every mutation writes the whole state document back through a
//! [`SnowStateStore`]. Store failures are logged and the in-memory state stays
//! authoritative until the next successful write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use wdome_common::{time, Error, Result, ZoneAttributes, ZoneTable};

/// Melt rate per degree above threshold per hour, before the urban multiplier (in)
pub const MELT_RATE_IN_PER_DEG_HR: f64 = 0.005;

/// Depth and last-update time of one zone
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnowState {
    pub depth_in: f64,
    pub last_update: DateTime<Utc>,
}

/// Persisted state document keyed by zone id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnowStateDocument {
    #[serde(default)]
    pub zones: BTreeMap<String, SnowState>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Durable storage for the snow state document
pub trait SnowStateStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet
    fn load(&self) -> Result<Option<SnowStateDocument>>;

    fn save(&self, document: &SnowStateDocument) -> Result<()>;
}

/// JSON file store with atomic replace
pub struct FileSnowStore {
    path: PathBuf,
}

impl FileSnowStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnowStateStore for FileSnowStore {
    fn load(&self) -> Result<Option<SnowStateDocument>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let document = serde_json::from_str(&content)?;
        Ok(Some(document))
    }

    fn save(&self, document: &SnowStateDocument) -> Result<()> {
        let json = serde_json::to_vec_pretty(document)?;
        wdome_common::fs::atomic_write(&self.path, &json)?;
        Ok(())
    }
}

/// In-memory store, used by tests and one-shot runs
#[derive(Default)]
pub struct MemorySnowStore {
    document: Mutex<Option<SnowStateDocument>>,
    fail_saves: bool,
}

impl MemorySnowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with an existing document
    pub fn with_document(document: SnowStateDocument) -> Self {
        Self {
            document: Mutex::new(Some(document)),
            fail_saves: false,
        }
    }

    /// Store whose every save fails
    pub fn failing() -> Self {
        Self {
            document: Mutex::new(None),
            fail_saves: true,
        }
    }

    pub fn snapshot(&self) -> Option<SnowStateDocument> {
        lock(&self.document).clone()
    }
}

impl SnowStateStore for MemorySnowStore {
    fn load(&self) -> Result<Option<SnowStateDocument>> {
        Ok(lock(&self.document).clone())
    }

    fn save(&self, document: &SnowStateDocument) -> Result<()> {
        if self.fail_saves {
            return Err(Error::Internal("snow store unavailable".to_string()));
        }
        *lock(&self.document) = Some(document.clone());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn sanitize_depth(depth_in: f64) -> f64 {
    if depth_in.is_finite() {
        depth_in.max(0.0)
    } else {
        0.0
    }
}

/// Temperature-driven melt of ground snow
///
/// Above the zone's effective melt threshold, depth drops by
/// `(temp - threshold) * 0.005 * urban_multiplier` inches per hour, floored at
/// zero. At or below the threshold, or with no elapsed time, depth is unchanged.
pub fn melt_decay(depth_in: f64, temperature_f: f64, hours: f64, attributes: &ZoneAttributes) -> f64 {
    let depth = sanitize_depth(depth_in);
    if !(hours.is_finite() && hours > 0.0 && temperature_f.is_finite()) {
        return depth;
    }
    let threshold = attributes.effective_melt_threshold_f;
    if temperature_f <= threshold {
        return depth;
    }
    let melted =
        (temperature_f - threshold) * MELT_RATE_IN_PER_DEG_HR * attributes.urban_melt_multiplier * hours;
    (depth - melted).max(0.0)
}

/// Snow depth state machine
pub struct SnowDepthTracker {
    store: Box<dyn SnowStateStore>,
    zones: ZoneTable,
    state: Mutex<SnowStateDocument>,
}

impl SnowDepthTracker {
    /// Load state from the store; missing or unreadable state starts empty
    pub fn open(store: Box<dyn SnowStateStore>, zones: ZoneTable) -> Self {
        let document = match store.load() {
            Ok(Some(document)) => {
                info!(zones = document.zones.len(), "Snow state loaded");
                document
            }
            Ok(None) => {
                debug!("No snow state stored, all zones untracked");
                SnowStateDocument::default()
            }
            Err(e) => {
                warn!("Failed to load snow state, treating all zones as untracked: {}", e);
                SnowStateDocument::default()
            }
        };

        Self {
            store,
            zones,
            state: Mutex::new(document),
        }
    }

    /// Tracked depth, `None` when the zone was never initialised
    pub fn get(&self, zone_id: &str) -> Option<f64> {
        lock(&self.state).zones.get(zone_id).map(|s| s.depth_in)
    }

    pub fn state(&self, zone_id: &str) -> Option<SnowState> {
        lock(&self.state).zones.get(zone_id).copied()
    }

    pub fn tracked_zones(&self) -> Vec<String> {
        lock(&self.state).zones.keys().cloned().collect()
    }

    /// Set a zone's depth (negative and non-finite values become 0)
    pub fn set(&self, zone_id: &str, depth_in: f64) {
        let depth = sanitize_depth(depth_in);
        let mut state = lock(&self.state);
        state.zones.insert(
            zone_id.to_string(),
            SnowState {
                depth_in: depth,
                last_update: time::now(),
            },
        );
        self.persist(&mut state);
        info!(zone_id, depth_in = depth, "Snow depth set");
    }

    /// Set the same depth for every zone in the table
    pub fn set_all(&self, depth_in: f64) {
        let depth = sanitize_depth(depth_in);
        let now = time::now();
        let mut state = lock(&self.state);
        for zone in self.zones.all() {
            state.zones.insert(
                zone.zone_id.clone(),
                SnowState {
                    depth_in: depth,
                    last_update: now,
                },
            );
        }
        self.persist(&mut state);
        info!(zones = self.zones.len(), depth_in = depth, "Snow depth set for all zones");
    }

    /// Apply melt for `hours_elapsed` at `temperature_f`
    ///
    /// Returns the new depth, or `None` for an untracked zone (which stays
    /// untracked).
    pub fn decay(&self, zone_id: &str, temperature_f: f64, hours_elapsed: f64) -> Option<f64> {
        let attributes = self.zones.attributes(zone_id);
        let mut state = lock(&self.state);
        let entry = state.zones.get_mut(zone_id)?;
        let depth = melt_decay(entry.depth_in, temperature_f, hours_elapsed, &attributes);
        entry.depth_in = depth;
        entry.last_update = time::now();
        self.persist(&mut state);
        Some(depth)
    }

    /// Add new snowfall; starts tracking the zone if needed
    pub fn add_snowfall(&self, zone_id: &str, inches: f64) {
        let inches = sanitize_depth(inches);
        let now = time::now();
        let mut state = lock(&self.state);
        let entry = state.zones.entry(zone_id.to_string()).or_insert(SnowState {
            depth_in: 0.0,
            last_update: now,
        });
        entry.depth_in += inches;
        entry.last_update = now;
        self.persist(&mut state);
        debug!(zone_id, inches, "Snowfall added");
    }

    /// One maintenance step: add `snowfall_in`, then melt for `hours_elapsed`
    ///
    /// Writes the state once. `None` for an untracked zone, which stays untracked.
    pub fn advance(
        &self,
        zone_id: &str,
        snowfall_in: f64,
        temperature_f: f64,
        hours_elapsed: f64,
    ) -> Option<f64> {
        let attributes = self.zones.attributes(zone_id);
        let mut state = lock(&self.state);
        let entry = state.zones.get_mut(zone_id)?;
        let with_snowfall = entry.depth_in + sanitize_depth(snowfall_in);
        let depth = melt_decay(with_snowfall, temperature_f, hours_elapsed, &attributes);
        entry.depth_in = depth;
        entry.last_update = time::now();
        self.persist(&mut state);
        debug!(zone_id, snowfall_in, depth_in = depth, "Snow depth advanced");
        Some(depth)
    }

    fn persist(&self, state: &mut SnowStateDocument) {
        state.updated_at = Some(time::now());
        if let Err(e) = self.store.save(state) {
            warn!("Failed to save snow state, keeping in-memory copy: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn tracker() -> SnowDepthTracker {
        SnowDepthTracker::open(Box::new(MemorySnowStore::new()), ZoneTable::builtin().clone())
    }

    struct SharedStore(Arc<MemorySnowStore>);

    impl SnowStateStore for SharedStore {
        fn load(&self) -> Result<Option<SnowStateDocument>> {
            self.0.load()
        }

        fn save(&self, document: &SnowStateDocument) -> Result<()> {
            self.0.save(document)
        }
    }

    #[test]
    fn test_untracked_distinct_from_zero() {
        let tracker = tracker();
        assert_eq!(tracker.get("CONED-MAN"), None);
        tracker.set("CONED-MAN", 0.0);
        assert_eq!(tracker.get("CONED-MAN"), Some(0.0));
    }

    #[test]
    fn test_set_sanitizes() {
        let tracker = tracker();
        tracker.set("CONED-BKN", -4.0);
        assert_eq!(tracker.get("CONED-BKN"), Some(0.0));
        tracker.set("CONED-BKN", f64::INFINITY);
        assert_eq!(tracker.get("CONED-BKN"), Some(0.0));
    }

    #[test]
    fn test_set_all_covers_table() {
        let tracker = tracker();
        tracker.set_all(20.0);
        assert_eq!(tracker.tracked_zones().len(), ZoneTable::builtin().len());
        assert_eq!(tracker.get("OR-SSX"), Some(20.0));
    }

    #[test]
    fn test_decay_rate_matches_zone_attributes() {
        let tracker = tracker();
        tracker.set("CONED-MAN", 10.0);
        // 35F is 10 degrees above Manhattan's 25F threshold: 10 * 0.005 * 3.5 = 0.175 in/hr
        let depth = tracker.decay("CONED-MAN", 35.0, 4.0).unwrap();
        assert!((depth - 9.3).abs() < 1e-9);
    }

    #[test]
    fn test_decay_untracked_returns_none() {
        let tracker = tracker();
        assert_eq!(tracker.decay("CONED-QNS", 50.0, 2.0), None);
        assert_eq!(tracker.get("CONED-QNS"), None);
    }

    #[test]
    fn test_decay_floors_at_zero() {
        let tracker = tracker();
        tracker.set("CONED-MAN", 1.0);
        assert_eq!(tracker.decay("CONED-MAN", 70.0, 24.0), Some(0.0));
    }

    #[test]
    fn test_add_snowfall_starts_tracking() {
        let tracker = tracker();
        tracker.add_snowfall("OR-ORA", 2.5);
        tracker.add_snowfall("OR-ORA", 1.0);
        assert_eq!(tracker.get("OR-ORA"), Some(3.5));
    }

    #[test]
    fn test_state_survives_reopen() {
        let store = Arc::new(MemorySnowStore::new());
        let tracker = SnowDepthTracker::open(
            Box::new(SharedStore(store.clone())),
            ZoneTable::builtin().clone(),
        );
        tracker.set("CONED-SI", 6.0);
        drop(tracker);

        let reopened =
            SnowDepthTracker::open(Box::new(SharedStore(store)), ZoneTable::builtin().clone());
        assert_eq!(reopened.get("CONED-SI"), Some(6.0));
    }

    struct CountingStore(Arc<AtomicUsize>);

    impl SnowStateStore for CountingStore {
        fn load(&self) -> Result<Option<SnowStateDocument>> {
            Ok(None)
        }

        fn save(&self, _document: &SnowStateDocument) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_advance_adds_then_melts_with_one_write() {
        let writes = Arc::new(AtomicUsize::new(0));
        let tracker =
            SnowDepthTracker::open(Box::new(CountingStore(writes.clone())), ZoneTable::builtin().clone());

        assert_eq!(tracker.advance("CONED-MAN", 2.0, 20.0, 1.0), None);
        assert_eq!(tracker.get("CONED-MAN"), None);
        assert_eq!(writes.load(Ordering::SeqCst), 0);

        tracker.set("CONED-MAN", 4.0);
        assert_eq!(writes.load(Ordering::SeqCst), 1);

        // 1 in of snowfall, then 2 hours at 35F: 2 * 0.175 = 0.35 in melted
        let depth = tracker.advance("CONED-MAN", 1.0, 35.0, 2.0).unwrap();
        assert!((depth - 4.65).abs() < 1e-9);
        assert_eq!(writes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_advance_below_threshold_only_accumulates() {
        let tracker = tracker();
        tracker.set("CONED-QNS", 1.0);
        let depth = tracker.advance("CONED-QNS", 0.5, 20.0, 3.0).unwrap();
        assert!((depth - 1.5).abs() < 1e-9);
        assert_eq!(tracker.advance("CONED-QNS", -2.0, 20.0, 1.0), Some(1.5));
    }

    #[test]
    fn test_save_failure_keeps_memory_state() {
        let tracker =
            SnowDepthTracker::open(Box::new(MemorySnowStore::failing()), ZoneTable::builtin().clone());
        tracker.set("CONED-BRX", 4.0);
        assert_eq!(tracker.get("CONED-BRX"), Some(4.0));
    }

    #[test]
    fn test_file_store_round_trip_and_corruption() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("snow_state.json");

        let tracker = SnowDepthTracker::open(
            Box::new(FileSnowStore::new(&path)),
            ZoneTable::builtin().clone(),
        );
        tracker.set("CONED-WST", 12.0);
        assert!(path.exists());

        let reopened = SnowDepthTracker::open(
            Box::new(FileSnowStore::new(&path)),
            ZoneTable::builtin().clone(),
        );
        assert_eq!(reopened.get("CONED-WST"), Some(12.0));

        std::fs::write(&path, b"{ not json").unwrap();
        let corrupt = SnowDepthTracker::open(
            Box::new(FileSnowStore::new(&path)),
            ZoneTable::builtin().clone(),
        );
        assert_eq!(corrupt.get("CONED-WST"), None);
    }
}
