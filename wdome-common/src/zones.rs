//! Static zone and territory table
//!
//! Every scored zone belongs to exactly one territory and carries a fixed set of
//! infrastructure attributes (underground vulnerability, overhead exposure, melt
//! behaviour, network redundancy, baseline outage floor). The table is built once
//! and is immutable for the process lifetime.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Utility service area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Territory {
    /// Con Edison: NYC boroughs + Westchester
    #[serde(rename = "CONED")]
    ConEd,
    /// Orange & Rockland: Orange, Rockland, Sullivan + northern NJ
    #[serde(rename = "OR")]
    OrangeRockland,
}

impl Territory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Territory::ConEd => "CONED",
            Territory::OrangeRockland => "OR",
        }
    }

    /// Parse a territory code, case-insensitive
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "CONED" => Some(Territory::ConEd),
            "OR" => Some(Territory::OrangeRockland),
            _ => None,
        }
    }
}

impl fmt::Display for Territory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-zone infrastructure constants used by the hazard models
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneAttributes {
    /// Susceptibility to melt-driven underground failures (0-1).
    /// Reflects plant age and drainage, not only underground share.
    pub underground_vulnerability: f64,
    /// Fraction of the distribution system that is overhead (0-1)
    pub overhead_exposure: f64,
    /// Tree canopy density (0-1)
    pub canopy_density: f64,
    /// Temperature (°F) above which ground snow melts; lowered by road salting
    pub effective_melt_threshold_f: f64,
    /// Melt-rate multiplier from surface heat absorption (urban cores melt faster)
    pub urban_melt_multiplier: f64,
    /// Jobs-per-risk discount; meshed networks < 1.0, radial feeds = 1.0
    pub network_redundancy: f64,
    /// Non-weather outage floor (equipment aging, animal contact, dig-ins)
    pub baseline_outages: u32,
}

impl ZoneAttributes {
    /// Attributes used for zone ids missing from the table
    pub const DEFAULT: ZoneAttributes = ZoneAttributes {
        underground_vulnerability: 0.0,
        overhead_exposure: 0.5,
        canopy_density: 0.5,
        effective_melt_threshold_f: 32.0,
        urban_melt_multiplier: 1.5,
        network_redundancy: 0.5,
        baseline_outages: 5,
    };
}

impl Default for ZoneAttributes {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Static definition of a scored zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDefinition {
    pub zone_id: String,
    pub name: String,
    pub territory: Territory,
    /// NWS public forecast zone code
    pub nws_zone: String,
    pub county: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Fraction of the territory's peak load served by this zone
    pub peak_load_share: f64,
    pub attributes: ZoneAttributes,
}

/// Immutable zone lookup table
#[derive(Debug, Clone)]
pub struct ZoneTable {
    zones: Vec<ZoneDefinition>,
    index: HashMap<String, usize>,
}

static BUILTIN: Lazy<ZoneTable> = Lazy::new(|| ZoneTable::new(builtin_zones()));

impl ZoneTable {
    /// Build a table from an explicit zone list (later duplicates win)
    pub fn new(zones: Vec<ZoneDefinition>) -> Self {
        let index = zones
            .iter()
            .enumerate()
            .map(|(i, z)| (z.zone_id.clone(), i))
            .collect();
        Self { zones, index }
    }

    /// The eleven built-in CONED and O&R zones
    pub fn builtin() -> &'static ZoneTable {
        &BUILTIN
    }

    pub fn get(&self, zone_id: &str) -> Option<&ZoneDefinition> {
        self.index.get(zone_id).map(|&i| &self.zones[i])
    }

    /// Attributes for a zone, falling back to [`ZoneAttributes::DEFAULT`]
    pub fn attributes(&self, zone_id: &str) -> ZoneAttributes {
        self.get(zone_id)
            .map(|z| z.attributes)
            .unwrap_or(ZoneAttributes::DEFAULT)
    }

    pub fn all(&self) -> &[ZoneDefinition] {
        &self.zones
    }

    pub fn zones_for_territory(&self, territory: Territory) -> Vec<&ZoneDefinition> {
        self.zones
            .iter()
            .filter(|z| z.territory == territory)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

#[allow(clippy::too_many_arguments)]
fn zone(
    zone_id: &str,
    name: &str,
    territory: Territory,
    nws_zone: &str,
    county: &str,
    (latitude, longitude): (f64, f64),
    peak_load_share: f64,
    attributes: ZoneAttributes,
) -> ZoneDefinition {
    ZoneDefinition {
        zone_id: zone_id.to_string(),
        name: name.to_string(),
        territory,
        nws_zone: nws_zone.to_string(),
        county: county.to_string(),
        latitude,
        longitude,
        peak_load_share,
        attributes,
    }
}

const fn attrs(
    underground_vulnerability: f64,
    overhead_exposure: f64,
    canopy_density: f64,
    effective_melt_threshold_f: f64,
    urban_melt_multiplier: f64,
    network_redundancy: f64,
    baseline_outages: u32,
) -> ZoneAttributes {
    ZoneAttributes {
        underground_vulnerability,
        overhead_exposure,
        canopy_density,
        effective_melt_threshold_f,
        urban_melt_multiplier,
        network_redundancy,
        baseline_outages,
    }
}

fn builtin_zones() -> Vec<ZoneDefinition> {
    use Territory::{ConEd, OrangeRockland};

    vec![
        // Manhattan: meshed network, heaviest salting, oldest vaults
        zone("CONED-MAN", "Manhattan", ConEd, "NYZ072", "New York",
             (40.7831, -73.9712), 0.30, attrs(1.0, 0.02, 0.10, 25.0, 3.5, 0.5, 60)),
        zone("CONED-BRX", "Bronx", ConEd, "NYZ073", "Bronx",
             (40.8448, -73.8648), 0.10, attrs(0.7, 0.35, 0.40, 27.0, 2.5, 0.9, 20)),
        // Brooklyn: radial feeds, 3-7x the melt-event customers of Manhattan
        zone("CONED-BKN", "Brooklyn", ConEd, "NYZ075", "Kings",
             (40.6782, -73.9442), 0.18, attrs(0.8, 0.25, 0.30, 27.0, 3.0, 1.0, 35)),
        zone("CONED-QNS", "Queens", ConEd, "NYZ076", "Queens",
             (40.7282, -73.7949), 0.16, attrs(0.7, 0.45, 0.45, 27.0, 3.0, 1.0, 30)),
        zone("CONED-SI", "Staten Island", ConEd, "NYZ074", "Richmond",
             (40.5795, -74.1502), 0.04, attrs(0.3, 0.70, 0.55, 29.0, 2.0, 0.8, 8)),
        zone("CONED-WST", "Westchester", ConEd, "NYZ067", "Westchester",
             (41.1220, -73.7949), 0.22, attrs(0.2, 0.85, 0.80, 28.0, 2.0, 0.7, 40)),
        zone("OR-ORA", "Orange County", OrangeRockland, "NYZ068", "Orange",
             (41.4018, -74.3118), 0.35, attrs(0.05, 0.90, 0.75, 31.0, 1.5, 0.4, 5)),
        zone("OR-ROC", "Rockland County", OrangeRockland, "NYZ069", "Rockland",
             (41.1489, -73.9830), 0.30, attrs(0.04, 0.90, 0.70, 30.0, 1.5, 0.3, 3)),
        // Deep rural: almost no underground plant
        zone("OR-SUL", "Sullivan County", OrangeRockland, "NYZ070", "Sullivan",
             (41.7170, -74.7713), 0.10, attrs(0.005, 0.95, 0.85, 31.0, 1.2, 0.2, 2)),
        zone("OR-BER", "Northern Bergen/Passaic", OrangeRockland, "NJZ006", "Bergen",
             (41.0534, -74.1310), 0.15, attrs(0.05, 0.85, 0.65, 30.0, 1.5, 0.3, 3)),
        zone("OR-SSX", "Sussex County", OrangeRockland, "NJZ008", "Sussex",
             (41.1394, -74.6904), 0.10, attrs(0.005, 0.95, 0.85, 31.0, 1.2, 0.2, 2)),
    ]
}
