//! Tributary-area gravity solver
//!
//! A statically determinate idealization good enough to size gravity
//! framing:
//!
//! - Each floor area's load (pressure × net area) is spread over its
//!   boundary beams in proportion to beam length, giving a uniform line
//!   load per beam.
//! - Beams are simple spans: V = wL/2, M = wL²/8, Δ = 5wL⁴/384EI. End
//!   reactions go to the beam's joints.
//! - Joints are processed top-down by elevation band. Load on a joint with a
//!   column below goes down that column, picking up the column's
//!   self-weight. Load on a joint with nothing below moves to the nearest
//!   column or support in the same band. Load that reaches a support
//!   becomes a base reaction.
//!
//! Demands are computed once per load type and combined linearly.

use std::collections::BTreeMap;

use tracing::debug;

use super::{AnalysisFrame, AnalysisModel, AnalysisResult, FrameDemand, Reaction, StructuralSolver};
use crate::errors::{DesignError, DesignResult};
use crate::loads::LoadCase;
use crate::model::{FrameId, FrameRole, JointId};
use crate::units::{Inches, KipFt, Kips};

/// Loads below this (kips) are treated as zero when tracing load paths
const NEGLIGIBLE_KIPS: f64 = 1e-9;

/// Per-load-type demands in one frame, before combination
#[derive(Debug, Clone, Default)]
struct TypeDemands {
    axial: LoadCase,
    shear: LoadCase,
    moment: LoadCase,
    deflection: LoadCase,
}

/// Built-in gravity solver; stateless apart from a pass counter
#[derive(Debug, Clone, Default)]
pub struct TributarySolver {
    passes: usize,
}

impl TributarySolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of analyses run so far
    pub fn passes(&self) -> usize {
        self.passes
    }
}

impl StructuralSolver for TributarySolver {
    fn name(&self) -> &str {
        "tributary"
    }

    fn analyze(&mut self, model: &AnalysisModel) -> DesignResult<AnalysisResult> {
        self.passes += 1;
        if !model.joints.values().any(|j| j.restraint.resists_gravity()) {
            return Err(DesignError::analysis("Structure has no supports"));
        }

        let line_loads = beam_line_loads(model)?;
        let mut demands: BTreeMap<FrameId, TypeDemands> = BTreeMap::new();
        let mut joint_loads: BTreeMap<JointId, LoadCase> = BTreeMap::new();

        for frame in model.frames.values().filter(|f| f.role == FrameRole::Beam) {
            let span = model.frame_length_ft(frame)?;
            let ei = model.elastic_modulus.0 * frame.section.ix_in4;
            if ei <= 0.0 {
                return Err(DesignError::analysis(format!(
                    "Section {} on {} has no flexural stiffness",
                    frame.section.label, frame.id
                )));
            }
            let entry = demands.entry(frame.id.clone()).or_default();
            let mut w_plf = line_loads.get(&frame.id).cloned().unwrap_or_default();
            for (load_type, plf) in &model.line_load(&frame.id).loads {
                w_plf.add(*load_type, *plf);
            }
            for (load_type, plf) in &w_plf.loads {
                let w = plf / 1000.0;
                let end = w * span / 2.0;
                entry.shear.add(*load_type, end);
                entry.moment.add(*load_type, w * span * span / 8.0);
                let w_kin = w / 12.0;
                let l_in = span * 12.0;
                entry.deflection.add(*load_type, 5.0 * w_kin * l_in.powi(4) / (384.0 * ei));
                joint_loads.entry(frame.i.clone()).or_default().add(*load_type, end);
                joint_loads.entry(frame.j.clone()).or_default().add(*load_type, end);
            }
        }

        let reactions = trace_to_supports(model, &mut joint_loads, &mut demands)?;

        let mut result = AnalysisResult::default();
        for (id, d) in &demands {
            let per_combo = model
                .combinations
                .iter()
                .map(|c| FrameDemand {
                    combination: c.name.clone(),
                    kind: c.kind,
                    axial: Kips(c.apply(&d.axial)),
                    shear: Kips(c.apply(&d.shear)),
                    moment: KipFt(c.apply(&d.moment)),
                    deflection: Inches(c.apply(&d.deflection)),
                })
                .collect();
            result.frames.insert(id.clone(), per_combo);
        }
        for (joint, case) in &reactions {
            let per_combo = model
                .combinations
                .iter()
                .map(|c| Reaction {
                    combination: c.name.clone(),
                    vertical: Kips(c.apply(case)),
                })
                .collect();
            result.reactions.insert(joint.clone(), per_combo);
        }

        debug!(
            solver = self.name(),
            pass = self.passes,
            frames = result.frames.len(),
            supports = result.reactions.len(),
            "Analysis complete"
        );
        Ok(result)
    }
}

/// Unfactored line loads (plf) on each boundary beam from the floor areas
fn beam_line_loads(model: &AnalysisModel) -> DesignResult<BTreeMap<FrameId, LoadCase>> {
    let mut loads: BTreeMap<FrameId, LoadCase> = BTreeMap::new();
    for area in &model.areas {
        let mut perimeter = 0.0;
        for beam in &area.boundary_beams {
            perimeter += model.frame_length_ft(frame_of(model, beam)?)?;
        }
        if perimeter <= 0.0 {
            return Err(DesignError::analysis(format!("Floor area {} has no supporting beams", area.id)));
        }
        for beam in &area.boundary_beams {
            let entry = loads.entry(beam.clone()).or_default();
            for (load_type, psf) in &area.pressures.loads {
                // share of q·A by length, divided back over the length
                entry.add(*load_type, psf * area.net_area_sqft / perimeter);
            }
        }
    }
    Ok(loads)
}

fn frame_of<'a>(model: &'a AnalysisModel, id: &FrameId) -> DesignResult<&'a AnalysisFrame> {
    model.frames.get(id).ok_or_else(|| DesignError::unknown("frame", id.to_string()))
}

/// Joints grouped by elevation, highest band first
fn elevation_bands(model: &AnalysisModel) -> Vec<Vec<JointId>> {
    let mut joints: Vec<_> = model.joints.values().collect();
    joints.sort_by(|a, b| b.position.z.total_cmp(&a.position.z).then_with(|| a.id.cmp(&b.id)));

    let mut bands: Vec<Vec<JointId>> = Vec::new();
    let mut last_z: Option<f64> = None;
    for joint in joints {
        match last_z {
            Some(z) if z - joint.position.z <= model.level_tolerance_ft => {}
            _ => bands.push(Vec::new()),
        }
        if let Some(band) = bands.last_mut() {
            band.push(joint.id.clone());
        }
        last_z = Some(joint.position.z);
    }
    bands
}

/// Push joint loads down through columns to the supports.
///
/// Records column axial demands and returns unfactored reactions.
fn trace_to_supports(
    model: &AnalysisModel,
    joint_loads: &mut BTreeMap<JointId, LoadCase>,
    demands: &mut BTreeMap<FrameId, TypeDemands>,
) -> DesignResult<BTreeMap<JointId, LoadCase>> {
    // columns hanging below each joint, keyed by top joint
    let mut below: BTreeMap<JointId, Vec<(&AnalysisFrame, JointId, f64)>> = BTreeMap::new();
    for frame in model.frames.values().filter(|f| f.role == FrameRole::Column) {
        let a = model.joint(&frame.i)?;
        let b = model.joint(&frame.j)?;
        let (bottom, top) = if a.position.z <= b.position.z {
            (&frame.i, &frame.j)
        } else {
            (&frame.j, &frame.i)
        };
        let length = a.position.distance(&b.position);
        below.entry(top.clone()).or_default().push((frame, bottom.clone(), length));
    }

    let mut reactions = BTreeMap::new();
    for band in elevation_bands(model) {
        let carriers: Vec<&JointId> = band
            .iter()
            .filter(|j| {
                below.contains_key(*j) || model.joints.get(*j).is_some_and(|joint| joint.restraint.resists_gravity())
            })
            .collect();

        for joint in band.iter().filter(|j| !carriers.contains(j)) {
            let Some(load) = joint_loads.remove(joint) else {
                continue;
            };
            if load.total().abs() < NEGLIGIBLE_KIPS {
                continue;
            }
            let from = model.joint(joint)?.position;
            let target = carriers
                .iter()
                .map(|c| model.joint(c).map(|j| (*c, j.position.plan_distance(&from))))
                .collect::<DesignResult<Vec<_>>>()?
                .into_iter()
                .min_by(|(a_id, a), (b_id, b)| a.total_cmp(b).then_with(|| a_id.cmp(b_id)))
                .map(|(c, _)| c.clone())
                .ok_or_else(|| {
                    DesignError::analysis(format!(
                        "No load path below joint {} at elevation {:.2} ft",
                        joint, from.z
                    ))
                })?;
            let entry = joint_loads.entry(target).or_default();
            for (load_type, value) in &load.loads {
                entry.add(*load_type, *value);
            }
        }

        for joint in &carriers {
            let load = joint_loads.remove(*joint).unwrap_or_default();
            match below.get(*joint) {
                Some(columns) => {
                    let share = 1.0 / columns.len() as f64;
                    for (column, bottom, length) in columns {
                        let mut axial = LoadCase::new(column.id.to_string());
                        for (load_type, value) in &load.loads {
                            axial.add(*load_type, value * share);
                        }
                        for (load_type, plf) in &model.line_load(&column.id).loads {
                            axial.add(*load_type, plf / 1000.0 * length);
                        }
                        let entry = joint_loads.entry(bottom.clone()).or_default();
                        for (load_type, value) in &axial.loads {
                            entry.add(*load_type, *value);
                        }
                        demands.entry(column.id.clone()).or_default().axial = axial;
                    }
                }
                None => {
                    reactions.insert((*joint).clone(), load);
                }
            }
        }
    }
    Ok(reactions)
}
