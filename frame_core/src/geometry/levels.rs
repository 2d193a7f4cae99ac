//! Role inference, level clustering and foundation support detection.

use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{DesignError, DesignResult, GeometryErrorKind};
use crate::model::{FrameId, FrameRole, JointId, LevelId, Point3, StructuralModel};

/// Role from orientation: a column iff within `tol_deg` of vertical.
pub fn infer_role(a: &Point3, b: &Point3, tol_deg: f64) -> FrameRole {
    let horizontal = a.plan_distance(b);
    let vertical = (a.z - b.z).abs();
    let from_vertical = horizontal.atan2(vertical).to_degrees();
    if from_vertical <= tol_deg {
        FrameRole::Column
    } else {
        FrameRole::Beam
    }
}

/// Infer every frame's role. Zero-length frames are degenerate.
pub fn infer_roles(model: &StructuralModel, tol_deg: f64) -> DesignResult<BTreeMap<FrameId, FrameRole>> {
    let mut roles = BTreeMap::new();
    for frame in model.frames.values() {
        let (a, b) = model.frame_ends(&frame.id)?;
        if a.distance(&b) < 1e-9 {
            return Err(DesignError::geometry(
                GeometryErrorKind::Degenerate,
                "frame has zero length",
                vec![frame.id.to_string()],
                vec![frame.i.to_string(), frame.j.to_string()],
            ));
        }
        roles.insert(frame.id.clone(), infer_role(&a, &b, tol_deg));
    }
    Ok(roles)
}

/// A cluster of joint elevations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationCluster {
    /// Mean elevation (ft)
    pub elevation: f64,
    pub lowest: f64,
    pub highest: f64,
}

impl ElevationCluster {
    pub fn contains(&self, z: f64) -> bool {
        z >= self.lowest && z <= self.highest
    }
}

/// Cluster sorted elevations: a gap larger than `tol` starts a new cluster.
pub fn cluster_elevations(elevations: impl IntoIterator<Item = f64>, tol: f64) -> Vec<ElevationCluster> {
    let mut zs: Vec<f64> = elevations.into_iter().collect();
    zs.sort_by(f64::total_cmp);

    let mut clusters = Vec::new();
    let mut members: Vec<f64> = Vec::new();
    for z in zs {
        if let Some(last) = members.last() {
            if z - last > tol {
                clusters.push(close_cluster(&members));
                members.clear();
            }
        }
        members.push(z);
    }
    if !members.is_empty() {
        clusters.push(close_cluster(&members));
    }
    clusters
}

fn close_cluster(members: &[f64]) -> ElevationCluster {
    let sum: f64 = members.iter().sum();
    ElevationCluster {
        elevation: sum / members.len() as f64,
        lowest: members[0],
        highest: members[members.len() - 1],
    }
}

/// Joint-to-level map built from the clusters
pub fn joint_levels(model: &StructuralModel, clusters: &[ElevationCluster]) -> BTreeMap<JointId, LevelId> {
    model
        .joints
        .values()
        .filter_map(|j| {
            clusters
                .iter()
                .position(|c| c.contains(j.position.z))
                .map(|idx| (j.id.clone(), LevelId(idx)))
        })
        .collect()
}

/// Level of every frame: a beam's shared level, a column's top-joint level.
///
/// A beam whose two ends fall into different clusters breaks the
/// flat-floor rule and is reported with both elevations.
pub fn frame_levels(
    model: &StructuralModel,
    roles: &BTreeMap<FrameId, FrameRole>,
    joint_levels: &BTreeMap<JointId, LevelId>,
) -> DesignResult<BTreeMap<FrameId, LevelId>> {
    let mut levels = BTreeMap::new();
    for frame in model.frames.values() {
        let lookup = |id: &JointId| {
            joint_levels
                .get(id)
                .copied()
                .ok_or_else(|| DesignError::unknown("joint level", id.to_string()))
        };
        let level = match roles.get(&frame.id).copied().unwrap_or_default() {
            FrameRole::Beam => {
                let (li, lj) = (lookup(&frame.i)?, lookup(&frame.j)?);
                if li != lj {
                    let (a, b) = model.frame_ends(&frame.id)?;
                    return Err(DesignError::geometry(
                        GeometryErrorKind::InconsistentElevation,
                        format!("beam ends at {:.3} ft and {:.3} ft", a.z, b.z),
                        vec![frame.id.to_string()],
                        vec![frame.i.to_string(), frame.j.to_string()],
                    ));
                }
                li
            }
            FrameRole::Column => {
                let (_, top) = model.bottom_top(&frame.id)?;
                lookup(&top)?
            }
        };
        levels.insert(frame.id.clone(), level);
    }
    Ok(levels)
}

/// Beam-carrying levels must be flat.
///
/// Clustering chains elevations that are each within `tol_ft` of the next,
/// so a gently sloped or stepped floor can land in one cluster. The beam
/// joints of every level must span at most `tol_ft`; otherwise the lowest
/// and highest joint are reported with the beams that meet them.
pub fn check_flat_levels(
    model: &StructuralModel,
    roles: &BTreeMap<FrameId, FrameRole>,
    frame_levels: &BTreeMap<FrameId, LevelId>,
    tol_ft: f64,
) -> DesignResult<()> {
    let mut by_level: BTreeMap<LevelId, Vec<(&JointId, f64)>> = BTreeMap::new();
    for frame in model.frames.values() {
        if roles.get(&frame.id) != Some(&FrameRole::Beam) {
            continue;
        }
        let Some(level) = frame_levels.get(&frame.id) else {
            continue;
        };
        for end in [&frame.i, &frame.j] {
            by_level.entry(*level).or_default().push((end, model.joint(end)?.position.z));
        }
    }

    for (level, joints) in &by_level {
        let lowest = joints.iter().min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(b.0)));
        let highest = joints.iter().max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(a.0)));
        let (Some(&(low_id, low_z)), Some(&(high_id, high_z))) = (lowest, highest) else {
            continue;
        };
        if high_z - low_z > tol_ft + 1e-9 {
            let frames: Vec<String> = model
                .frames
                .values()
                .filter(|f| roles.get(&f.id) == Some(&FrameRole::Beam))
                .filter(|f| [&f.i, &f.j].iter().any(|j| *j == low_id || *j == high_id))
                .map(|f| f.id.to_string())
                .collect();
            return Err(DesignError::geometry(
                GeometryErrorKind::InconsistentElevation,
                format!("level {} spans {:.3} ft to {:.3} ft", level, low_z, high_z),
                frames,
                vec![low_id.to_string(), high_id.to_string()],
            ));
        }
    }
    Ok(())
}

/// Joints that are the bottom of a column with nothing extending below.
pub fn base_joints(
    model: &StructuralModel,
    roles: &BTreeMap<FrameId, FrameRole>,
    tol_ft: f64,
) -> DesignResult<Vec<JointId>> {
    let mut incident: BTreeMap<&JointId, Vec<&JointId>> = BTreeMap::new();
    for frame in model.frames.values() {
        incident.entry(&frame.i).or_default().push(&frame.j);
        incident.entry(&frame.j).or_default().push(&frame.i);
    }

    let mut bases = BTreeSet::new();
    for frame in model.frames.values() {
        if roles.get(&frame.id) != Some(&FrameRole::Column) {
            continue;
        }
        let (bottom, _) = model.bottom_top(&frame.id)?;
        let z = model.joint(&bottom)?.position.z;
        let extends_below = match incident.get(&bottom) {
            Some(others) => others
                .iter()
                .map(|other| model.joint(other).map(|j| j.position.z < z - tol_ft))
                .collect::<DesignResult<Vec<_>>>()?
                .into_iter()
                .any(|below| below),
            None => false,
        };
        if !extends_below {
            bases.insert(bottom);
        }
    }
    Ok(bases.into_iter().collect())
}
