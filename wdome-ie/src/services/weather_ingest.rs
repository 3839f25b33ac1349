//! Weather ingest orchestration
//!
//! Vendor clients live outside this crate and plug in through
//! [`WeatherProvider`]. Every provider call is bounded by a timeout; a failed or
//! timed-out call is logged and simply contributes nothing to the merge.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use wdome_common::{Result, WeatherAlert, WeatherObservation, ZoneDefinition, ZoneTable};

use super::weather_aggregator::{aggregate_current, aggregate_forecasts};
use crate::repository::Repository;

/// One upstream weather source
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Short source name for logs
    fn name(&self) -> &str;

    /// Current conditions; `Ok(None)` when the source has nothing for the zone
    async fn fetch_current(&self, zone: &ZoneDefinition) -> Result<Option<WeatherObservation>>;

    /// Hourly forecast points, any order
    async fn fetch_forecast(&self, zone: &ZoneDefinition) -> Result<Vec<WeatherObservation>>;

    async fn fetch_alerts(&self, zone: &ZoneDefinition) -> Result<Vec<WeatherAlert>>;
}

/// Outcome of one ingest pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub zones_updated: usize,
    pub zones_without_data: usize,
    pub provider_failures: usize,
}

#[derive(Default)]
struct ZoneOutcome {
    updated: bool,
    failures: usize,
}

pub struct WeatherIngest {
    repo: Arc<dyn Repository>,
    providers: Vec<Arc<dyn WeatherProvider>>,
    zones: ZoneTable,
    timeout: Duration,
}

impl WeatherIngest {
    pub fn new(
        repo: Arc<dyn Repository>,
        providers: Vec<Arc<dyn WeatherProvider>>,
        zones: ZoneTable,
        timeout: Duration,
    ) -> Self {
        Self {
            repo,
            providers,
            zones,
            timeout,
        }
    }

    /// Fetch, merge and store weather for every zone concurrently
    pub async fn ingest_all_zones(&self) -> IngestReport {
        if self.providers.is_empty() {
            debug!("No weather providers configured, skipping ingest");
            return IngestReport {
                zones_without_data: self.zones.len(),
                ..Default::default()
            };
        }

        let outcomes = join_all(self.zones.all().iter().map(|zone| self.ingest_zone(zone))).await;

        let mut report = IngestReport::default();
        for outcome in outcomes {
            if outcome.updated {
                report.zones_updated += 1;
            } else {
                report.zones_without_data += 1;
            }
            report.provider_failures += outcome.failures;
        }

        info!(
            updated = report.zones_updated,
            without_data = report.zones_without_data,
            provider_failures = report.provider_failures,
            "Weather ingest complete"
        );
        report
    }

    async fn ingest_zone(&self, zone: &ZoneDefinition) -> ZoneOutcome {
        let zone_id = zone.zone_id.as_str();
        let mut outcome = ZoneOutcome::default();

        let current = join_all(self.providers.iter().map(|p| {
            self.bounded(p.name(), "current", zone_id, p.fetch_current(zone))
        }))
        .await;
        let forecasts = join_all(self.providers.iter().map(|p| {
            self.bounded(p.name(), "forecast", zone_id, p.fetch_forecast(zone))
        }))
        .await;
        let alerts = join_all(self.providers.iter().map(|p| {
            self.bounded(p.name(), "alerts", zone_id, p.fetch_alerts(zone))
        }))
        .await;

        outcome.failures = current.iter().filter(|r| r.is_none()).count()
            + forecasts.iter().filter(|r| r.is_none()).count()
            + alerts.iter().filter(|r| r.is_none()).count();

        let observations: Vec<WeatherObservation> = current.into_iter().flatten().flatten().collect();
        if let Some(merged) = aggregate_current(zone_id, &observations) {
            match self.repo.save_observation(&merged).await {
                Ok(()) => outcome.updated = true,
                Err(e) => warn!(zone_id, "Failed to store aggregated observation: {}", e),
            }
        }

        let timelines: Vec<Vec<WeatherObservation>> = forecasts.into_iter().flatten().collect();
        let merged_forecast = aggregate_forecasts(zone_id, &timelines);
        if !merged_forecast.is_empty() {
            match self.repo.replace_forecast(zone_id, &merged_forecast).await {
                Ok(()) => outcome.updated = true,
                Err(e) => warn!(zone_id, "Failed to store forecast: {}", e),
            }
        }

        // Keep the stored alerts when no source answered
        let answered: Vec<Vec<WeatherAlert>> = alerts.into_iter().flatten().collect();
        if !answered.is_empty() {
            let mut unique: BTreeMap<String, WeatherAlert> = BTreeMap::new();
            for alert in answered.into_iter().flatten() {
                unique.entry(alert.alert_id.clone()).or_insert(WeatherAlert {
                    zone_id: zone_id.to_string(),
                    ..alert
                });
            }
            let merged: Vec<WeatherAlert> = unique.into_values().collect();
            if let Err(e) = self.repo.replace_alerts(zone_id, &merged).await {
                warn!(zone_id, "Failed to store alerts: {}", e);
            }
        }

        outcome
    }

    /// Await a provider call under the timeout; `None` on error or timeout
    async fn bounded<T>(
        &self,
        provider: &str,
        what: &str,
        zone_id: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(zone_id, provider, "Weather {} fetch failed: {}", what, e);
                None
            }
            Err(_) => {
                warn!(
                    zone_id,
                    provider,
                    "Weather {} fetch timed out after {:?}",
                    what,
                    self.timeout
                );
                None
            }
        }
    }
}
