//! Initial section assignment from a coarse service-load estimate
//!
//! Beams: tributary line load (service D + L or D + Lr) as a simple span,
//! M = wL²/8, against Fy·Zx. Columns: beam end reactions collected at every
//! column top stacked above (same plan position), against 0.5·Fy·A.
//!
//! The resulting index is the group's plausibility floor; the optimizer
//! never steps below it.

use std::collections::BTreeMap;

use crate::classify::Group;
use crate::config::SteelGrade;
use crate::errors::{DesignError, DesignResult};
use crate::geometry::GeometryIndex;
use crate::loads::LoadSet;
use crate::model::{FrameId, FrameRole, JointId, StructuralModel};
use crate::sections::SectionSeries;
use crate::units::{KipFt, Kips};

/// Unfactored service demands used only to seed the search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceEstimate {
    pub beam_moment: BTreeMap<FrameId, KipFt>,
    pub column_axial: BTreeMap<FrameId, Kips>,
}

impl ServiceEstimate {
    pub fn build(
        model: &StructuralModel,
        geometry: &GeometryIndex,
        loads: &LoadSet,
        plan_tolerance_ft: f64,
    ) -> DesignResult<Self> {
        let mut line_klf: BTreeMap<FrameId, f64> = BTreeMap::new();
        for area in &geometry.floor_areas {
            let mut perimeter = 0.0;
            for beam in &area.boundary_beams {
                perimeter += model.frame_length_ft(beam)?;
            }
            if perimeter <= 0.0 {
                continue;
            }
            let psf = loads.area_case(&area.id).total();
            for beam in &area.boundary_beams {
                *line_klf.entry(beam.clone()).or_insert(0.0) += psf * area.net_area.0 / perimeter / 1000.0;
            }
        }

        let mut estimate = ServiceEstimate::default();
        let mut joint_kips: BTreeMap<JointId, f64> = BTreeMap::new();
        for (beam, w) in &line_klf {
            let frame = model.frame(beam)?;
            let span = model.frame_length_ft(beam)?;
            estimate.beam_moment.insert(beam.clone(), KipFt(w * span * span / 8.0));
            for end in [&frame.i, &frame.j] {
                *joint_kips.entry(end.clone()).or_insert(0.0) += w * span / 2.0;
            }
        }

        let mut tops = Vec::new();
        for frame in model.frames.values() {
            if geometry.role(&frame.id) == FrameRole::Column {
                let (_, top) = model.bottom_top(&frame.id)?;
                tops.push((frame.id.clone(), model.joint(&top)?.position, top));
            }
        }
        for (column, position, _) in &tops {
            let total: f64 = tops
                .iter()
                .filter(|(_, p, _)| p.plan_distance(position) <= plan_tolerance_ft && p.z >= position.z - plan_tolerance_ft)
                .map(|(_, _, top)| joint_kips.get(top).copied().unwrap_or(0.0))
                .sum();
            estimate.column_axial.insert(column.clone(), Kips(total));
        }
        Ok(estimate)
    }
}

/// Lightest index in `series` covering the group's estimated demand
pub fn initial_index(
    group: &Group,
    series: &SectionSeries,
    estimate: &ServiceEstimate,
    steel: &SteelGrade,
) -> DesignResult<usize> {
    if series.is_empty() {
        return Err(DesignError::configuration(
            "series",
            format!("Series '{}' for group {} is empty", series.name, group.id),
        ));
    }
    let fy = steel.fy().0;
    let index = match group.role() {
        FrameRole::Beam => {
            let moment = group
                .members
                .iter()
                .filter_map(|m| estimate.beam_moment.get(m))
                .fold(0.0_f64, |acc, m| acc.max(m.0));
            series.first_satisfying(0, |s| fy * s.zx_in3 / 12.0 >= moment)
        }
        FrameRole::Column => {
            let axial = group
                .members
                .iter()
                .filter_map(|m| estimate.column_axial.get(m))
                .fold(0.0_f64, |acc, p| acc.max(p.0));
            series.first_satisfying(0, |s| 0.5 * fy * s.area_in2 >= axial)
        }
    };
    Ok(index)
}
