//! Shared hazard score value type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Four-level risk label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum RiskLevel {
    #[default]
    Low,
    Moderate,
    High,
    Extreme,
}

impl RiskLevel {
    /// Map a 0-100 score onto a level (breakpoints 25/50/75)
    pub fn from_score(score: f64) -> Self {
        if score < 25.0 {
            RiskLevel::Low
        } else if score < 50.0 {
            RiskLevel::Moderate
        } else if score < 75.0 {
            RiskLevel::High
        } else {
            RiskLevel::Extreme
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
            RiskLevel::Extreme => "Extreme",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Moderate" => RiskLevel::Moderate,
            "High" => RiskLevel::High,
            "Extreme" => RiskLevel::Extreme,
            _ => RiskLevel::Low,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp a raw score into [0, 100]; NaN becomes 0
pub fn clamp_score(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 100.0)
    }
}

/// Round to one decimal place for presentation
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Score, level and contributing factors produced by every scorer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HazardScore {
    pub score: f64,
    pub level: RiskLevel,
    pub contributing_factors: Vec<String>,
}

impl HazardScore {
    /// Build a score from a raw value, clamping it into range
    pub fn new(raw: f64, contributing_factors: Vec<String>) -> Self {
        let score = clamp_score(raw);
        Self {
            score,
            level: RiskLevel::from_score(score),
            contributing_factors,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}
