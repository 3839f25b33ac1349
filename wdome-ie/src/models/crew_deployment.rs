//! Crew deployment recommendation
//!
//! Line, tree and service crew counts from estimated outages and vegetation risk,
//! with mutual-aid and pre-staging flags for severe events.

use serde::{Deserialize, Serialize};

use super::hazard::RiskLevel;
use super::outage_risk::OutageRisk;
use super::vegetation_risk::VegetationRisk;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrewRecommendation {
    pub line_crews: u32,
    pub tree_crews: u32,
    pub service_crews: u32,
    pub total_crews: u32,
    pub mutual_aid_needed: bool,
    pub pre_stage: bool,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CrewDeploymentModel;

impl CrewDeploymentModel {
    pub fn new() -> Self {
        Self
    }

    pub fn compute(&self, outage: &OutageRisk, vegetation: &VegetationRisk) -> CrewRecommendation {
        let outages = outage.estimated_outages;
        let score = outage.hazard.score;

        let line_crews = line_crew_count(outages);
        let tree_crews = tree_crew_count(vegetation.hazard.score, outages);
        let service_crews = service_crew_count(outages);
        let total_crews = line_crews + tree_crews + service_crews;

        let mutual_aid_needed = score >= 70.0 || total_crews > 15;
        let pre_stage = score >= 50.0;

        let mut notes = Vec::new();
        if mutual_aid_needed {
            notes.push("Request mutual aid from neighboring utilities".to_string());
        }
        if pre_stage {
            notes.push("Pre-stage crews in affected areas".to_string());
        }
        if vegetation.hazard.score >= 60.0 {
            notes.push("Prioritize tree crew deployment for vegetation hazards".to_string());
        }
        if outage.hazard.level == RiskLevel::Extreme {
            notes.push("Activate emergency operations center".to_string());
        }
        if outages > 1000 {
            notes.push(format!(
                "Estimated {} outages, consider public communication",
                outages
            ));
        }

        CrewRecommendation {
            line_crews,
            tree_crews,
            service_crews,
            total_crews,
            mutual_aid_needed,
            pre_stage,
            notes,
        }
    }
}

/// Line crews restore feeders and laterals
fn line_crew_count(outages: u32) -> u32 {
    match outages {
        0..=9 => 1,
        10..=49 => 2,
        50..=199 => (outages / 50).max(3),
        200..=999 => (outages / 100).max(5),
        _ => (outages / 200).max(10),
    }
}

/// Tree crews clear vegetation; more when outages suggest tree damage
fn tree_crew_count(vegetation_score: f64, outages: u32) -> u32 {
    let base = if vegetation_score > 80.0 {
        6
    } else if vegetation_score > 60.0 {
        4
    } else if vegetation_score > 40.0 {
        2
    } else if vegetation_score > 20.0 {
        1
    } else {
        0
    };
    if outages > 100 {
        base + outages / 200
    } else {
        base
    }
}

/// Service crews handle individual customer restorals
fn service_crew_count(outages: u32) -> u32 {
    match outages {
        0..=19 => 1,
        20..=99 => 2,
        100..=499 => (outages / 100).max(3),
        _ => (outages / 200).max(5),
    }
}
