//! # Structural Analysis Boundary
//!
//! The optimizer does not know how demands are computed. It assembles an
//! [`AnalysisModel`] (joints, frames with their current sections, area
//! loads, self-weight and combinations) and hands it to a
//! [`StructuralSolver`]. The solver returns per-frame demands for every
//! combination plus base reactions, or an analysis error.
//!
//! [`TributarySolver`] is the built-in implementation: simple-span beams,
//! tributary area loads and top-down column accumulation.

pub mod tributary;

pub use tributary::TributarySolver;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::Classification;
use crate::errors::{DesignError, DesignResult};
use crate::geometry::GeometryIndex;
use crate::loads::{CombinationKind, FrameLoad, LoadCase, LoadCombination, LoadSet};
use crate::model::{AreaId, FrameId, FrameRole, Joint, JointId, StructuralModel};
use crate::sections::{SteelShape, SteelShapeDb};
use crate::units::{Inches, KipFt, Kips, Ksi};

/// A frame as the solver sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFrame {
    pub id: FrameId,
    pub i: JointId,
    pub j: JointId,
    pub role: FrameRole,
    pub section: SteelShape,
}

/// A loaded floor area and the beams that carry it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedArea {
    pub id: AreaId,
    pub boundary_beams: Vec<FrameId>,
    pub net_area_sqft: f64,
    /// Unfactored pressures (psf) by load type
    pub pressures: LoadCase,
}

/// Everything a solver needs for one pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisModel {
    pub joints: BTreeMap<JointId, Joint>,
    pub frames: BTreeMap<FrameId, AnalysisFrame>,
    pub areas: Vec<LoadedArea>,
    /// Uniform line loads applied directly to frames (self-weight)
    pub frame_loads: Vec<FrameLoad>,
    pub combinations: Vec<LoadCombination>,
    pub elastic_modulus: Ksi,
    /// Joints closer than this in elevation share a level
    pub level_tolerance_ft: f64,
}

impl AnalysisModel {
    /// Assemble the solver input from committed upstream stages.
    ///
    /// Each frame carries its override section when set, otherwise the
    /// section of its group.
    pub fn assemble(
        model: &StructuralModel,
        geometry: &GeometryIndex,
        groups: &Classification,
        loads: &LoadSet,
        catalog: &SteelShapeDb,
        elastic_modulus: Ksi,
        level_tolerance_ft: f64,
    ) -> DesignResult<Self> {
        let mut frames = BTreeMap::new();
        for frame in model.frames.values() {
            let label = match &frame.section_override {
                Some(label) => label.clone(),
                None => groups
                    .group_of(&frame.id)
                    .and_then(|g| g.section.clone())
                    .ok_or_else(|| {
                        DesignError::invalid_stage(
                            "analysis",
                            format!("Frame {} has no assigned section", frame.id),
                        )
                    })?,
            };
            frames.insert(
                frame.id.clone(),
                AnalysisFrame {
                    id: frame.id.clone(),
                    i: frame.i.clone(),
                    j: frame.j.clone(),
                    role: geometry.role(&frame.id),
                    section: catalog.lookup(&label)?.clone(),
                },
            );
        }

        let areas = geometry
            .floor_areas
            .iter()
            .map(|area| LoadedArea {
                id: area.id.clone(),
                boundary_beams: area.boundary_beams.clone(),
                net_area_sqft: area.net_area.0,
                pressures: loads.area_case(&area.id),
            })
            .collect();

        Ok(AnalysisModel {
            joints: model.joints.clone(),
            frames,
            areas,
            frame_loads: loads.frame_loads(),
            combinations: loads.combinations.clone(),
            elastic_modulus,
            level_tolerance_ft,
        })
    }

    pub fn frame_length_ft(&self, frame: &AnalysisFrame) -> DesignResult<f64> {
        let a = self.joint(&frame.i)?;
        let b = self.joint(&frame.j)?;
        Ok(a.position.distance(&b.position))
    }

    /// Line loads (plf) on one frame by load type
    pub fn line_load(&self, frame: &FrameId) -> LoadCase {
        let mut case = LoadCase::new(frame.to_string());
        for load in self.frame_loads.iter().filter(|l| &l.frame == frame) {
            case.add(load.load_type, load.line_load.0);
        }
        case
    }

    pub fn joint(&self, id: &JointId) -> DesignResult<&Joint> {
        self.joints.get(id).ok_or_else(|| DesignError::unknown("joint", id.to_string()))
    }
}

/// Demands in one frame under one combination
///
/// Axial force is positive in compression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDemand {
    pub combination: String,
    pub kind: CombinationKind,
    pub axial: Kips,
    pub shear: Kips,
    pub moment: KipFt,
    /// Maximum transverse deflection
    pub deflection: Inches,
}

/// Vertical base reaction under one combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub combination: String,
    pub vertical: Kips,
}

/// Solver output for one pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub frames: BTreeMap<FrameId, Vec<FrameDemand>>,
    pub reactions: BTreeMap<JointId, Vec<Reaction>>,
}

impl AnalysisResult {
    pub fn demands(&self, frame: &FrameId) -> &[FrameDemand] {
        self.frames.get(frame).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sum of base reactions for a combination
    pub fn total_reaction(&self, combination: &str) -> Kips {
        self.reactions
            .values()
            .flatten()
            .filter(|r| r.combination == combination)
            .fold(Kips(0.0), |acc, r| acc + r.vertical)
    }
}

/// External structural-analysis collaborator
///
/// Calls are blocking and never concurrent; the optimizer holds the solver
/// mutably for the whole run.
pub trait StructuralSolver {
    fn name(&self) -> &str;

    fn analyze(&mut self, model: &AnalysisModel) -> DesignResult<AnalysisResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_reaction() {
        let mut result = AnalysisResult::default();
        for (joint, value) in [("A", 10.0), ("B", 12.5)] {
            result.reactions.insert(
                JointId::from(joint),
                vec![
                    Reaction {
                        combination: "LRFD-1".into(),
                        vertical: Kips(value),
                    },
                    Reaction {
                        combination: "LRFD-2".into(),
                        vertical: Kips(value * 2.0),
                    },
                ],
            );
        }
        assert_eq!(result.total_reaction("LRFD-1"), Kips(22.5));
        assert_eq!(result.total_reaction("LRFD-2"), Kips(45.0));
        assert_eq!(result.total_reaction("SERV-1"), Kips(0.0));
        assert!(result.demands(&"missing".into()).is_empty());
    }
}
