//! Adaptive weighting policy
//!
//! One function decides the weight sets for both the outage driver blend and the
//! overall impact blend, so the two call sites cannot drift apart. Melt is
//! "active" once its score exceeds [`MELT_ACTIVE_THRESHOLD`].

/// Melt score above which melt takes its own weight share
pub const MELT_ACTIVE_THRESHOLD: f64 = 5.0;

pub fn melt_active(melt_score: f64) -> bool {
    melt_score > MELT_ACTIVE_THRESHOLD
}

/// Weights for the outage driver blend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutageWeights {
    pub wind: f64,
    pub ice: f64,
    pub snow: f64,
    pub lightning: f64,
    pub precip: f64,
    pub melt: f64,
}

/// Weights for the overall impact blend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverallWeights {
    pub outage: f64,
    pub vegetation: f64,
    pub load: f64,
    pub equipment: f64,
    pub melt: f64,
}

/// Both weight sets for one melt state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSet {
    pub outage: OutageWeights,
    pub overall: OverallWeights,
}

/// Weight sets for normal and melt-active conditions
pub fn weights(melt_active: bool) -> WeightSet {
    if melt_active {
        WeightSet {
            outage: OutageWeights {
                wind: 0.30,
                ice: 0.22,
                snow: 0.10,
                lightning: 0.10,
                precip: 0.12,
                melt: 0.16,
            },
            overall: OverallWeights {
                outage: 0.32,
                vegetation: 0.16,
                load: 0.16,
                equipment: 0.16,
                melt: 0.20,
            },
        }
    } else {
        WeightSet {
            outage: OutageWeights {
                wind: 0.35,
                ice: 0.25,
                snow: 0.13,
                lightning: 0.12,
                precip: 0.15,
                melt: 0.0,
            },
            overall: OverallWeights {
                outage: 0.40,
                vegetation: 0.20,
                load: 0.20,
                equipment: 0.20,
                melt: 0.0,
            },
        }
    }
}
