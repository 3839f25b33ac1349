//! Effective snow depth resolution
//!
//! Upstream weather sources rarely report ground snow depth, so the engine
//! resolves one from a priority chain. Explicit measurements always outrank
//! text inference:
//!
//! 1. operator override (> 0)
//! 2. tracked depth from [`SnowDepthTracker`](super::snow_tracker::SnowDepthTracker) (> 0.1 in)
//! 3. measured depth on the current observation (> 0.1 in)
//! 4. accumulation minus melt over the observation history (> 0.1 in)
//! 5. winter alert text
//! 6. condition text keywords
//! 7. none (0 in)

use serde::{Deserialize, Serialize};
use wdome_common::{time, WeatherAlert, WeatherObservation, ZoneAttributes};

use super::snow_tracker::melt_decay;

/// Depths at or below this are treated as "no snow" for source selection (in)
pub const MIN_SIGNIFICANT_DEPTH_IN: f64 = 0.1;

/// Longest gap between history observations credited with snowfall (hours)
const MAX_HISTORY_STEP_HOURS: f64 = 3.0;

/// Where a resolved depth came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthSource {
    Override,
    Tracked,
    Measured,
    History,
    Alert,
    Condition,
    #[default]
    None,
}

impl DepthSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepthSource::Override => "override",
            DepthSource::Tracked => "tracked",
            DepthSource::Measured => "measured",
            DepthSource::History => "history",
            DepthSource::Alert => "alert",
            DepthSource::Condition => "condition",
            DepthSource::None => "none",
        }
    }
}

/// Depth estimate with its provenance
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolvedDepth {
    pub depth_in: f64,
    pub source: DepthSource,
}

impl ResolvedDepth {
    pub fn new(depth_in: f64, source: DepthSource) -> Self {
        Self { depth_in, source }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

fn significant(depth: Option<f64>) -> Option<f64> {
    depth.filter(|d| d.is_finite() && *d > MIN_SIGNIFICANT_DEPTH_IN)
}

/// Resolves the effective depth for one zone
#[derive(Debug, Clone, Copy, Default)]
pub struct SnowDepthResolver {
    manual_override_in: Option<f64>,
}

impl SnowDepthResolver {
    pub fn new(manual_override_in: Option<f64>) -> Self {
        Self { manual_override_in }
    }

    /// Walk the priority chain
    ///
    /// `history` must be in ascending time order and end before `obs`.
    pub fn resolve(
        &self,
        tracked: Option<f64>,
        obs: &WeatherObservation,
        history: &[WeatherObservation],
        alerts: &[WeatherAlert],
        attributes: &ZoneAttributes,
    ) -> ResolvedDepth {
        if let Some(depth) = self.manual_override_in.filter(|d| d.is_finite() && *d > 0.0) {
            return ResolvedDepth::new(depth, DepthSource::Override);
        }
        if let Some(depth) = significant(tracked) {
            return ResolvedDepth::new(depth, DepthSource::Tracked);
        }
        if let Some(depth) = significant(obs.measured_snow_depth()) {
            return ResolvedDepth::new(depth, DepthSource::Measured);
        }
        resolve_unmeasured(obs, history, alerts, attributes)
    }
}

/// Tail of the chain used when no explicit depth is available
pub(crate) fn resolve_unmeasured(
    obs: &WeatherObservation,
    history: &[WeatherObservation],
    alerts: &[WeatherAlert],
    attributes: &ZoneAttributes,
) -> ResolvedDepth {
    if let Some(depth) = significant(Some(accumulate_history(history, obs, attributes))) {
        return ResolvedDepth::new(depth, DepthSource::History);
    }
    if let Some(depth) = infer_from_alerts(alerts) {
        return ResolvedDepth::new(depth, DepthSource::Alert);
    }
    if let Some(depth) = obs.condition_text.as_deref().and_then(infer_from_condition) {
        return ResolvedDepth::new(depth, DepthSource::Condition);
    }
    ResolvedDepth::none()
}

/// Net depth from snowfall minus melt across the history window
///
/// Each observation's snow rate is credited for the time until the next
/// observation (or `current`), capped at three hours per step, and melt is
/// applied at that observation's temperature with the zone's constants.
pub fn accumulate_history(
    history: &[WeatherObservation],
    current: &WeatherObservation,
    attributes: &ZoneAttributes,
) -> f64 {
    let mut depth = 0.0;
    for (i, obs) in history.iter().enumerate() {
        let next_at = history
            .get(i + 1)
            .map(|o| o.observed_at)
            .unwrap_or(current.observed_at);
        let hours = time::hours_between(obs.observed_at, next_at).clamp(0.0, MAX_HISTORY_STEP_HOURS);
        depth += obs.snow_rate() * hours;
        depth = melt_decay(depth, obs.temperature(), hours, attributes);
    }
    depth
}

/// Expected accumulation stated by active winter alerts (largest across alerts)
///
/// Looks for "N to M inches" / "N-M inches" / "N inches" in the headline and
/// description, taking the lower bound of a range. Falls back to a fixed depth
/// per event type when no amount is stated.
pub fn infer_from_alerts(alerts: &[WeatherAlert]) -> Option<f64> {
    alerts
        .iter()
        .filter_map(|alert| {
            let text = format!(
                "{} {}",
                alert.headline.as_deref().unwrap_or_default(),
                alert.description.as_deref().unwrap_or_default()
            );
            parse_inches(&text).or_else(|| event_default_depth(&alert.event))
        })
        .filter(|d| d.is_finite() && *d > 0.0)
        .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.max(d))))
}

fn event_default_depth(event: &str) -> Option<f64> {
    match event.trim() {
        "Blizzard Warning" => Some(10.0),
        "Winter Storm Warning" => Some(8.0),
        "Winter Storm Watch" => Some(6.0),
        "Winter Weather Advisory" => Some(3.0),
        _ => None,
    }
}

fn parse_number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

/// Lower bound of the first snowfall amount stated in inches
fn parse_inches(text: &str) -> Option<f64> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|t| {
            t.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-' && c != '.')
                .trim_end_matches('.')
        })
        .filter(|t| !t.is_empty())
        .collect();

    for (i, token) in tokens.iter().enumerate() {
        if !(token.starts_with("inch") && i > 0) {
            continue;
        }
        let amount = tokens[i - 1];
        // "6-10 inches"
        if let Some((low, _)) = amount.split_once('-') {
            if let Some(v) = parse_number(low) {
                return Some(v);
            }
        }
        if let Some(high) = parse_number(amount) {
            // "6 to 10 inches"
            if i >= 3 && tokens[i - 2] == "to" {
                if let Some(low) = parse_number(tokens[i - 3]) {
                    return Some(low);
                }
            }
            return Some(high);
        }
    }
    None
}

/// Conservative depth implied by condition wording (weak fallback)
pub fn infer_from_condition(condition_text: &str) -> Option<f64> {
    let cond = condition_text.to_lowercase();
    if cond.contains("blizzard") {
        Some(8.0)
    } else if cond.contains("heavy snow") {
        Some(6.0)
    } else if cond.contains("light snow") || cond.contains("flurries") {
        Some(1.0)
    } else if cond.contains("snow") {
        Some(3.0)
    } else {
        None
    }
}
