//! # Geometry Indexer
//!
//! Turns raw joints and frames into a queryable structure: frame roles,
//! detected levels, the enclosed floor areas bounded by beams at each
//! level, and the foundation joints.
//!
//! Indexing is a pure function of the model and configuration. Writing the
//! results back (roles, levels, base restraints) is a separate `commit` so a
//! geometry error never leaves the model half-updated.
//!
//! ## Example
//!
//! ```rust
//! use frame_core::config::DesignConfig;
//! use frame_core::geometry::index_geometry;
//! use frame_core::model::{Point3, StructuralModel};
//!
//! let mut model = StructuralModel::new();
//! for (id, x, y) in [("A", 0.0, 0.0), ("B", 20.0, 0.0), ("C", 20.0, 20.0), ("D", 0.0, 20.0)] {
//!     model.add_joint(format!("{id}0"), Point3::new(x, y, 0.0)).unwrap();
//!     model.add_joint(format!("{id}1"), Point3::new(x, y, 12.0)).unwrap();
//!     model.add_frame(format!("C{id}"), format!("{id}0"), format!("{id}1")).unwrap();
//! }
//! for (id, a, b) in [("B1", "A1", "B1"), ("B2", "B1", "C1"), ("B3", "C1", "D1"), ("B4", "D1", "A1")] {
//!     model.add_frame(id, a, b).unwrap();
//! }
//!
//! let index = index_geometry(&model, &DesignConfig::default()).unwrap();
//! assert_eq!(index.levels.len(), 2);
//! assert_eq!(index.floor_areas.len(), 1);
//! assert_eq!(index.base_joints.len(), 4);
//! ```

pub mod levels;
pub mod planar;
pub mod polygon;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::DesignConfig;
use crate::errors::{DesignError, DesignResult};
use crate::model::{AreaId, FrameId, FrameRole, JointId, LevelId, Restraint, StructuralModel};
use crate::units::SqFt;

pub use planar::PlanSegment;
pub use polygon::{Bounds, PlanPoint};

/// Usage tag deciding which area loads apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloorUsage {
    Floor,
    Roof,
}

impl FloorUsage {
    pub fn display_name(&self) -> &'static str {
        match self {
            FloorUsage::Floor => "Floor",
            FloorUsage::Roof => "Roof",
        }
    }
}

/// A detected elevation and what it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    /// Mean elevation of the clustered joints (ft)
    pub elevation_ft: f64,
    /// Beams with both ends at this level
    pub beams: Vec<FrameId>,
    /// Columns whose top joint is at this level
    pub columns: Vec<FrameId>,
    pub floor_areas: Vec<AreaId>,
    /// None for levels without beams (e.g. the foundation)
    pub usage: Option<FloorUsage>,
    /// Outer boundary edges of the level's beam grid
    pub footprint: Vec<PlanSegment>,
    /// Unloaded openings found at this level
    pub openings: usize,
}

impl Level {
    /// Plan bounds of the footprint. None when the level has no beams.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of(self.footprint.iter().flat_map(|s| [s.start, s.end]))
    }
}

/// An enclosed polygon bounded by beams at one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorArea {
    pub id: AreaId,
    pub level: LevelId,
    /// Outline joints, counter-clockwise
    pub outline: Vec<JointId>,
    pub coordinates: Vec<PlanPoint>,
    /// Openings excluded from the loaded area
    pub holes: Vec<Vec<PlanPoint>>,
    pub usage: FloorUsage,
    pub boundary_beams: Vec<FrameId>,
    pub gross_area: SqFt,
    /// Gross area minus openings
    pub net_area: SqFt,
    /// Span direction: angle of the shortest outline edge (degrees)
    pub local_axis_deg: f64,
}

/// Output of the geometry indexer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryIndex {
    pub roles: BTreeMap<FrameId, FrameRole>,
    pub frame_levels: BTreeMap<FrameId, LevelId>,
    /// Levels sorted by elevation, lowest first
    pub levels: Vec<Level>,
    pub floor_areas: Vec<FloorArea>,
    /// Foundation joints, in id order
    pub base_joints: Vec<JointId>,
    /// Topmost level carrying beams
    pub roof_level: Option<LevelId>,
}

impl GeometryIndex {
    pub fn level(&self, id: LevelId) -> DesignResult<&Level> {
        self.levels
            .get(id.0)
            .ok_or_else(|| DesignError::unknown("level", id.to_string()))
    }

    pub fn area(&self, id: &AreaId) -> DesignResult<&FloorArea> {
        self.floor_areas
            .iter()
            .find(|a| &a.id == id)
            .ok_or_else(|| DesignError::unknown("floor area", id.to_string()))
    }

    pub fn role(&self, frame: &FrameId) -> FrameRole {
        self.roles.get(frame).copied().unwrap_or_default()
    }

    /// Display label (`Level 2` for `L2`; the lowest level is `Level 0`)
    pub fn level_label(&self, id: LevelId) -> String {
        format!("Level {}", id.0)
    }

    /// Total net floor area across all levels
    pub fn total_area(&self) -> SqFt {
        self.floor_areas.iter().fold(SqFt(0.0), |acc, a| acc + a.net_area)
    }

    /// Write roles, levels and foundation restraints onto the model.
    pub fn commit(&self, model: &mut StructuralModel, restraint: Restraint) -> DesignResult<()> {
        for (id, role) in &self.roles {
            let frame = model.frame_mut(id)?;
            frame.role = *role;
            frame.level = self.frame_levels.get(id).copied();
        }
        model.apply_restraints(&self.base_joints, restraint)
    }
}

/// Index the model's geometry.
pub fn index_geometry(model: &StructuralModel, config: &DesignConfig) -> DesignResult<GeometryIndex> {
    let tol = &config.tolerances;
    let roles = levels::infer_roles(model, tol.column_angle_deg)?;
    let clusters = levels::cluster_elevations(model.joints.values().map(|j| j.position.z), tol.level_ft);
    let joint_levels = levels::joint_levels(model, &clusters);
    let frame_levels = levels::frame_levels(model, &roles, &joint_levels)?;
    levels::check_flat_levels(model, &roles, &frame_levels, tol.level_ft)?;
    let base_joints = levels::base_joints(model, &roles, tol.level_ft)?;

    let mut levels: Vec<Level> = clusters
        .iter()
        .enumerate()
        .map(|(idx, c)| Level {
            id: LevelId(idx),
            elevation_ft: c.elevation,
            beams: Vec::new(),
            columns: Vec::new(),
            floor_areas: Vec::new(),
            usage: None,
            footprint: Vec::new(),
            openings: 0,
        })
        .collect();

    for (frame, level) in &frame_levels {
        let slot = levels
            .get_mut(level.0)
            .ok_or_else(|| DesignError::unknown("level", level.to_string()))?;
        match roles.get(frame).copied().unwrap_or_default() {
            FrameRole::Beam => slot.beams.push(frame.clone()),
            FrameRole::Column => slot.columns.push(frame.clone()),
        }
    }

    let roof_level = levels.iter().rev().find(|l| !l.beams.is_empty()).map(|l| l.id);

    let mut floor_areas = Vec::new();
    for level in levels.iter_mut() {
        if level.beams.is_empty() {
            continue;
        }
        let usage = if Some(level.id) == roof_level {
            FloorUsage::Roof
        } else {
            FloorUsage::Floor
        };
        level.usage = Some(usage);

        let plan = planar::detect_areas(model, &level.beams, tol.level_ft)?;
        for (n, detected) in plan.areas.into_iter().enumerate() {
            let id = AreaId(format!("{}-A{:02}", level.id, n + 1));
            level.floor_areas.push(id.clone());
            floor_areas.push(FloorArea {
                id,
                level: level.id,
                outline: detected.outline,
                coordinates: detected.coordinates,
                holes: detected.holes,
                usage,
                boundary_beams: detected.boundary_beams,
                gross_area: SqFt(detected.gross_area_sqft),
                net_area: SqFt(detected.net_area_sqft),
                local_axis_deg: detected.local_axis_deg,
            });
        }
        level.footprint = plan.footprint;
        level.openings = plan.openings;
        debug!(
            level = %level.id,
            elevation_ft = level.elevation_ft,
            beams = level.beams.len(),
            areas = level.floor_areas.len(),
            openings = level.openings,
            "Level indexed"
        );
    }

    info!(
        levels = levels.len(),
        floor_areas = floor_areas.len(),
        base_joints = base_joints.len(),
        "Geometry indexed"
    );

    Ok(GeometryIndex {
        roles,
        frame_levels,
        levels,
        floor_areas,
        base_joints,
        roof_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GeometryErrorKind;
    use crate::model::Point3;

    /// One-bay, one-story frame
    fn portal() -> StructuralModel {
        let mut model = StructuralModel::new();
        for (id, x, y) in [("A", 0.0, 0.0), ("B", 24.0, 0.0), ("C", 24.0, 20.0), ("D", 0.0, 20.0)] {
            model.add_joint(format!("{id}0"), Point3::new(x, y, 0.0)).unwrap();
            model.add_joint(format!("{id}1"), Point3::new(x, y, 12.0)).unwrap();
            model.add_frame(format!("C{id}"), format!("{id}0"), format!("{id}1")).unwrap();
        }
        for (id, a, b) in [("B1", "A1", "B1"), ("B2", "B1", "C1"), ("B3", "C1", "D1"), ("B4", "D1", "A1")] {
            model.add_frame(id, a, b).unwrap();
        }
        model
    }

    #[test]
    fn test_portal_index() {
        let model = portal();
        let index = index_geometry(&model, &DesignConfig::default()).unwrap();
        assert_eq!(index.levels.len(), 2);
        assert_eq!(index.roof_level, Some(LevelId(1)));
        let roof = index.level(LevelId(1)).unwrap();
        assert_eq!(roof.usage, Some(FloorUsage::Roof));
        assert_eq!(roof.columns.len(), 4);
        assert_eq!(roof.beams.len(), 4);
        assert_eq!(index.floor_areas[0].id.as_str(), "L1-A01");
        assert_eq!(index.floor_areas[0].net_area, SqFt(480.0));
        // shortest edge runs along Y
        assert_eq!(index.floor_areas[0].local_axis_deg, 90.0);
        assert!(index.level(LevelId(0)).unwrap().usage.is_none());
    }

    #[test]
    fn test_commit_writes_roles_and_restraints() {
        let mut model = portal();
        let index = index_geometry(&model, &DesignConfig::default()).unwrap();
        index.commit(&mut model, Restraint::FIXED).unwrap();
        let column = model.frame(&"CA".into()).unwrap();
        assert_eq!(column.role, FrameRole::Column);
        assert_eq!(column.level, Some(LevelId(1)));
        assert_eq!(model.supports().count(), 4);
        assert!(model.supports().all(|j| j.position.z == 0.0));
    }

    #[test]
    fn test_index_is_idempotent() {
        let model = portal();
        let config = DesignConfig::default();
        let first = index_geometry(&model, &config).unwrap();
        let second = index_geometry(&model, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_stepped_roof_rejected() {
        let mut model = StructuralModel::new();
        let corners = [("A", 0.0, 0.0, 12.0), ("B", 20.0, 0.0, 12.09), ("C", 20.0, 20.0, 12.18), ("D", 0.0, 20.0, 12.27)];
        for (id, x, y, z) in corners {
            model.add_joint(format!("{id}0"), Point3::new(x, y, 0.0)).unwrap();
            model.add_joint(format!("{id}1"), Point3::new(x, y, z)).unwrap();
            model.add_frame(format!("C{id}"), format!("{id}0"), format!("{id}1")).unwrap();
        }
        for (id, a, b) in [("B1", "A1", "B1"), ("B2", "B1", "C1"), ("B3", "C1", "D1"), ("B4", "D1", "A1")] {
            model.add_frame(id, a, b).unwrap();
        }
        match index_geometry(&model, &DesignConfig::default()).unwrap_err() {
            DesignError::Geometry { kind, joints, .. } => {
                assert_eq!(kind, GeometryErrorKind::InconsistentElevation);
                assert_eq!(joints, vec!["A1".to_string(), "D1".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
