//! # Member Code Checks
//!
//! Compares solver demands against AISC 360 capacities for every frame and
//! every combination. Strength combinations are checked for flexure, shear,
//! axial force and interaction; serviceability combinations for deflection
//! against span / limit.
//!
//! A frame's ratio is the maximum over all combinations and limit states,
//! with the combination and limit state that produced it.

pub mod aisc;

pub use aisc::{capacities, Capacities, ResistanceFactors};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisFrame, AnalysisModel, AnalysisResult, FrameDemand};
use crate::config::{DesignCode, SteelGrade};
use crate::errors::DesignResult;
use crate::loads::CombinationKind;
use crate::model::FrameId;
use crate::units::Inches;

/// Below this a force is treated as absent when choosing checks
const ZERO_FORCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitState {
    Flexure,
    Shear,
    Compression,
    Tension,
    Interaction,
    Deflection,
}

impl LimitState {
    pub fn display_name(&self) -> &'static str {
        match self {
            LimitState::Flexure => "Flexure",
            LimitState::Shear => "Shear",
            LimitState::Compression => "Compression",
            LimitState::Tension => "Tension",
            LimitState::Interaction => "Axial + Flexure",
            LimitState::Deflection => "Deflection",
        }
    }
}

impl std::fmt::Display for LimitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Worst serviceability result for a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeflectionCheck {
    pub combination: String,
    pub deflection: Inches,
    pub allowable: Inches,
    /// Span / limit ratio used (e.g. 240)
    pub limit_ratio: f64,
}

impl DeflectionCheck {
    pub fn ratio(&self) -> f64 {
        if self.allowable.0 > 0.0 {
            self.deflection.0 / self.allowable.0
        } else {
            0.0
        }
    }
}

/// Governing check of one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameCheck {
    pub frame: FrameId,
    pub section: String,
    /// Demand / capacity, maximum over combinations and limit states
    pub ratio: f64,
    /// Controlling combination
    pub combination: String,
    pub limit_state: LimitState,
    pub deflection: Option<DeflectionCheck>,
}

impl FrameCheck {
    pub fn passes(&self, tolerance: f64) -> bool {
        self.ratio <= 1.0 + tolerance
    }
}

/// Ratios of one demand record, as (limit state, ratio) pairs
fn strength_ratios(demand: &FrameDemand, caps: &Capacities) -> Vec<(LimitState, f64)> {
    let mut ratios = Vec::with_capacity(4);
    let flexure = demand.moment.0.abs() / caps.flexure.0;
    ratios.push((LimitState::Flexure, flexure));
    ratios.push((LimitState::Shear, demand.shear.0.abs() / caps.shear.0));

    let axial = demand.axial.0;
    if axial.abs() > ZERO_FORCE {
        let (state, ratio) = if axial > 0.0 {
            (LimitState::Compression, axial / caps.compression.0)
        } else {
            (LimitState::Tension, -axial / caps.tension.0)
        };
        ratios.push((state, ratio));
        if demand.moment.0.abs() > ZERO_FORCE {
            ratios.push((LimitState::Interaction, aisc::interaction(ratio, flexure)));
        }
    }
    ratios
}

/// Check one frame against its demands.
pub fn check_frame(
    frame: &AnalysisFrame,
    length_ft: f64,
    demands: &[FrameDemand],
    deflection_limits: &BTreeMap<String, f64>,
    steel: &SteelGrade,
    factors: ResistanceFactors,
) -> FrameCheck {
    let caps = capacities(&frame.section, steel, length_ft, factors);
    let mut check = FrameCheck {
        frame: frame.id.clone(),
        section: frame.section.label.clone(),
        ratio: 0.0,
        combination: String::new(),
        limit_state: LimitState::Flexure,
        deflection: None,
    };

    for demand in demands {
        match demand.kind {
            CombinationKind::Strength => {
                for (state, ratio) in strength_ratios(demand, &caps) {
                    if ratio > check.ratio || check.combination.is_empty() {
                        check.ratio = ratio;
                        check.combination = demand.combination.clone();
                        check.limit_state = state;
                    }
                }
            }
            CombinationKind::Serviceability => {
                let Some(limit_ratio) = deflection_limits.get(&demand.combination).copied() else {
                    continue;
                };
                let candidate = DeflectionCheck {
                    combination: demand.combination.clone(),
                    deflection: Inches(demand.deflection.0.abs()),
                    allowable: Inches(length_ft * 12.0 / limit_ratio),
                    limit_ratio,
                };
                let ratio = candidate.ratio();
                if ratio > check.ratio {
                    check.ratio = ratio;
                    check.combination = demand.combination.clone();
                    check.limit_state = LimitState::Deflection;
                }
                if check.deflection.as_ref().map_or(true, |d| ratio > d.ratio()) {
                    check.deflection = Some(candidate);
                }
            }
        }
    }
    check
}

/// Check every frame in the analysis result.
pub fn check_frames(
    model: &AnalysisModel,
    result: &AnalysisResult,
    code: DesignCode,
    steel: &SteelGrade,
) -> DesignResult<BTreeMap<FrameId, FrameCheck>> {
    let factors = ResistanceFactors::for_code(code);
    let limits: BTreeMap<String, f64> = model
        .combinations
        .iter()
        .filter_map(|c| c.deflection_limit.map(|l| (c.name.clone(), l)))
        .collect();

    let mut checks = BTreeMap::new();
    for frame in model.frames.values() {
        let length = model.frame_length_ft(frame)?;
        let check = check_frame(frame, length, result.demands(&frame.id), &limits, steel, factors);
        checks.insert(frame.id.clone(), check);
    }
    Ok(checks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FrameRole;
    use crate::sections::SteelShapeDb;
    use crate::units::{KipFt, Kips};

    fn frame(section: &str, role: FrameRole) -> AnalysisFrame {
        AnalysisFrame {
            id: "F1".into(),
            i: "A".into(),
            j: "B".into(),
            role,
            section: SteelShapeDb::builtin().lookup(section).unwrap().clone(),
        }
    }

    fn demand(combo: &str, kind: CombinationKind, axial: f64, shear: f64, moment: f64, defl: f64) -> FrameDemand {
        FrameDemand {
            combination: combo.into(),
            kind,
            axial: Kips(axial),
            shear: Kips(shear),
            moment: KipFt(moment),
            deflection: Inches(defl),
        }
    }

    fn limits() -> BTreeMap<String, f64> {
        BTreeMap::from([("SERV-1".to_string(), 240.0), ("SERV-2".to_string(), 360.0)])
    }

    #[test]
    fn test_beam_flexure_controls() {
        let demands = vec![
            demand("LRFD-1", CombinationKind::Strength, 0.0, 5.0, 40.0, 0.0),
            demand("LRFD-2", CombinationKind::Strength, 0.0, 10.0, 100.0, 0.0),
            demand("SERV-1", CombinationKind::Serviceability, 0.0, 0.0, 0.0, 0.5),
        ];
        let factors = ResistanceFactors::for_code(DesignCode::AiscLrfd);
        let check = check_frame(&frame("W12X26", FrameRole::Beam), 20.0, &demands, &limits(), &SteelGrade::default(), factors);
        assert_eq!(check.combination, "LRFD-2");
        assert_eq!(check.limit_state, LimitState::Flexure);
        assert!((check.ratio - 100.0 / 139.5).abs() < 1e-9);
        // allowable 240 in / 240 = 1.0 in
        let defl = check.deflection.as_ref().unwrap();
        assert_eq!(defl.allowable, Inches(1.0));
        assert!((defl.ratio() - 0.5).abs() < 1e-12);
        assert!(check.passes(0.0));
    }

    #[test]
    fn test_deflection_can_govern() {
        let demands = vec![
            demand("LRFD-2", CombinationKind::Strength, 0.0, 10.0, 50.0, 0.0),
            demand("SERV-2", CombinationKind::Serviceability, 0.0, 0.0, 0.0, 0.8),
        ];
        let factors = ResistanceFactors::for_code(DesignCode::AiscLrfd);
        let check = check_frame(&frame("W12X26", FrameRole::Beam), 20.0, &demands, &limits(), &SteelGrade::default(), factors);
        // 240 / 360 = 0.667 in allowable
        assert_eq!(check.limit_state, LimitState::Deflection);
        assert_eq!(check.combination, "SERV-2");
        assert!((check.ratio - 1.2).abs() < 1e-9);
        assert!(!check.passes(0.0));
        assert!(check.passes(0.25));
    }

    #[test]
    fn test_column_compression() {
        let demands = vec![demand("LRFD-2", CombinationKind::Strength, 100.0, 0.0, 0.0, 0.0)];
        let factors = ResistanceFactors::for_code(DesignCode::AiscLrfd);
        let steel = SteelGrade::default();
        let column = frame("W10X33", FrameRole::Column);
        let check = check_frame(&column, 12.0, &demands, &limits(), &steel, factors);
        let caps = capacities(&column.section, &steel, 12.0, factors);
        assert_eq!(check.limit_state, LimitState::Compression);
        assert!((check.ratio - 100.0 / caps.compression.0).abs() < 1e-12);
        assert!(check.deflection.is_none());
    }

    #[test]
    fn test_tension_and_interaction() {
        let demands = vec![demand("LRFD-1", CombinationKind::Strength, -200.0, 0.0, 60.0, 0.0)];
        let factors = ResistanceFactors::for_code(DesignCode::AiscLrfd);
        let steel = SteelGrade::default();
        let column = frame("W10X33", FrameRole::Column);
        let caps = capacities(&column.section, &steel, 12.0, factors);
        let check = check_frame(&column, 12.0, &demands, &limits(), &steel, factors);
        let pr = 200.0 / caps.tension.0;
        let mr = 60.0 / caps.flexure.0;
        assert_eq!(check.limit_state, LimitState::Interaction);
        assert!((check.ratio - aisc::interaction(pr, mr)).abs() < 1e-12);
    }
}
