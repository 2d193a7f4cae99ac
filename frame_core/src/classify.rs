//! # Member Classifier
//!
//! Clusters frames into named groups that share one section:
//!
//! - Beams by span bucket: `round_half_up(span / beam_bucket_ft)`, so with
//!   the default 1 ft bucket a 23.5 ft and a 24.4 ft beam both land in
//!   `B-24.0ft` ("24ft Beams").
//! - Columns per level by plan position: corner, edge or interior, e.g.
//!   `C-L2-corner` ("Corner Columns (Level 2)").
//!
//! Position comes from the level footprint (outer boundary of the beam
//! grid): no footprint edge at the column means interior, collinear
//! footprint edges mean edge, two non-collinear edges mean corner. A column
//! whose top joint is not on the level's beam grid falls back to the
//! building bounding-box test.
//!
//! Group ids are derived from the key only, so re-running classification on
//! unchanged geometry regenerates identical groups.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::DesignConfig;
use crate::errors::{DesignError, DesignResult};
use crate::geometry::{Bounds, GeometryIndex, Level, PlanPoint};
use crate::model::{FrameId, FrameRole, GroupId, JointId, LevelId, StructuralModel};

/// Distance within which a column counts as on a bounding-box line (ft)
const BOUNDS_TOLERANCE_FT: f64 = 1.0;

/// Plan position of a column within its level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnPosition {
    Corner,
    Edge,
    Interior,
}

impl ColumnPosition {
    pub fn code(&self) -> &'static str {
        match self {
            ColumnPosition::Corner => "corner",
            ColumnPosition::Edge => "edge",
            ColumnPosition::Interior => "interior",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ColumnPosition::Corner => "Corner",
            ColumnPosition::Edge => "Edge",
            ColumnPosition::Interior => "Interior",
        }
    }
}

/// Classification key; equal keys share a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupKey {
    Beam { bucket: i64 },
    Column { level: LevelId, position: ColumnPosition },
}

impl GroupKey {
    pub fn role(&self) -> FrameRole {
        match self {
            GroupKey::Beam { .. } => FrameRole::Beam,
            GroupKey::Column { .. } => FrameRole::Column,
        }
    }

    /// Deterministic id, e.g. `B-24.0ft` or `C-L2-corner`
    ///
    /// Beam spans print with as many decimals as the bucket width needs, so
    /// distinct buckets never share an id.
    pub fn group_id(&self, bucket_ft: f64) -> GroupId {
        match self {
            GroupKey::Beam { bucket } => {
                let decimals = bucket_decimals(bucket_ft);
                GroupId(format!("B-{:.*}ft", decimals, *bucket as f64 * bucket_ft))
            }
            GroupKey::Column { level, position } => GroupId(format!("C-{}-{}", level, position.code())),
        }
    }

    /// Display name, e.g. `24ft Beams` or `Corner Columns (Level 2)`
    pub fn display_name(&self, bucket_ft: f64) -> String {
        match self {
            GroupKey::Beam { bucket } => {
                let span = *bucket as f64 * bucket_ft;
                if span.fract().abs() < 1e-9 {
                    format!("{:.0}ft Beams", span)
                } else {
                    format!("{:.*}ft Beams", bucket_decimals(bucket_ft), span)
                }
            }
            GroupKey::Column { level, position } => {
                format!("{} Columns (Level {})", position.display_name(), level.0)
            }
        }
    }
}

/// Frames sharing one section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub key: GroupKey,
    /// Member frames in id order
    pub members: Vec<FrameId>,
    /// Section label owned by the group; assigned by the optimizer or a user
    pub section: Option<String>,
}

impl Group {
    pub fn role(&self) -> FrameRole {
        self.key.role()
    }
}

/// All groups produced by one classification run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub groups: BTreeMap<GroupId, Group>,
    /// Column positions, kept for reporting
    pub column_positions: BTreeMap<FrameId, ColumnPosition>,
}

impl Classification {
    pub fn group(&self, id: &GroupId) -> DesignResult<&Group> {
        self.groups.get(id).ok_or_else(|| DesignError::unknown("group", id.to_string()))
    }

    pub fn group_mut(&mut self, id: &GroupId) -> DesignResult<&mut Group> {
        self.groups.get_mut(id).ok_or_else(|| DesignError::unknown("group", id.to_string()))
    }

    /// Group a frame belongs to
    pub fn group_of(&self, frame: &FrameId) -> Option<&Group> {
        self.groups.values().find(|g| g.members.contains(frame))
    }

    pub fn beam_groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values().filter(|g| g.role() == FrameRole::Beam)
    }

    pub fn column_groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values().filter(|g| g.role() == FrameRole::Column)
    }

    /// Move a frame into another existing group of the same role.
    pub fn reassign(&mut self, frame: &FrameId, target: &GroupId) -> DesignResult<()> {
        let target_role = self.group(target)?.role();
        let current = self
            .group_of(frame)
            .ok_or_else(|| DesignError::unknown("grouped frame", frame.to_string()))?;
        if current.role() != target_role {
            return Err(DesignError::invalid_input(
                "group",
                target.to_string(),
                format!("Frame {} is a {} and cannot join a {} group", frame, current.role(), target_role),
            ));
        }
        let current_id = current.id.clone();
        if &current_id == target {
            return Ok(());
        }
        self.group_mut(&current_id)?.members.retain(|m| m != frame);
        let members = &mut self.group_mut(target)?.members;
        members.push(frame.clone());
        members.sort();
        Ok(())
    }

    /// Write each member's group reference onto the model.
    pub fn commit(&self, model: &mut StructuralModel) -> DesignResult<()> {
        for frame in model.frames.values_mut() {
            frame.group = None;
        }
        for group in self.groups.values() {
            for member in &group.members {
                model.frame_mut(member)?.group = Some(group.id.clone());
            }
        }
        Ok(())
    }
}

/// Decimals needed to print multiples of `bucket_ft` exactly (at least one)
fn bucket_decimals(bucket_ft: f64) -> usize {
    (1..=6)
        .find(|d| {
            let scaled = bucket_ft * 10f64.powi(*d as i32);
            (scaled - scaled.round()).abs() < 1e-6
        })
        .unwrap_or(6)
}

/// Beam span bucket: span / width rounded half up
pub fn beam_bucket(span_ft: f64, bucket_ft: f64) -> i64 {
    (span_ft / bucket_ft + 0.5).floor() as i64
}

/// Classify every frame of the indexed model.
pub fn classify_members(
    model: &StructuralModel,
    geometry: &GeometryIndex,
    config: &DesignConfig,
) -> DesignResult<Classification> {
    let bucket_ft = config.tolerances.beam_bucket_ft;
    let tol = config.tolerances.level_ft;

    let mut by_key: BTreeMap<GroupKey, Vec<FrameId>> = BTreeMap::new();
    let mut column_positions = BTreeMap::new();

    let model_bounds = Bounds::of(model.joints.values().map(|j| PlanPoint::new(j.position.x, j.position.y)));

    for level in &geometry.levels {
        for beam in &level.beams {
            let span = model.frame_length_ft(beam)?;
            by_key
                .entry(GroupKey::Beam {
                    bucket: beam_bucket(span, bucket_ft),
                })
                .or_default()
                .push(beam.clone());
        }

        let grid_joints: BTreeSet<&JointId> = level
            .beams
            .iter()
            .filter_map(|b| model.frames.get(b))
            .flat_map(|f| [&f.i, &f.j])
            .collect();
        let bounds = level.bounds().or(model_bounds);

        for column in &level.columns {
            let (_, top) = model.bottom_top(column)?;
            let p = model.joint(&top)?.position;
            let location = PlanPoint::new(p.x, p.y);
            let position = if grid_joints.contains(&top) {
                footprint_position(&location, level, tol)
            } else {
                bounds_position(&location, bounds)
            };
            column_positions.insert(column.clone(), position);
            by_key
                .entry(GroupKey::Column {
                    level: level.id,
                    position,
                })
                .or_default()
                .push(column.clone());
        }
    }

    let mut groups: BTreeMap<GroupId, Group> = BTreeMap::new();
    for (key, mut members) in by_key {
        members.sort();
        let id = key.group_id(bucket_ft);
        if let Some(existing) = groups.get(&id) {
            return Err(DesignError::configuration(
                "tolerances.beam_bucket_ft",
                format!("Group id {} would be shared by {:?} and {:?}", id, existing.key, key),
            ));
        }
        debug!(group = %id, members = members.len(), "Group formed");
        groups.insert(
            id.clone(),
            Group {
                name: key.display_name(bucket_ft),
                id,
                key,
                members,
                section: None,
            },
        );
    }

    let classification = Classification {
        groups,
        column_positions,
    };
    info!(
        groups = classification.groups.len(),
        beam_groups = classification.beam_groups().count(),
        column_groups = classification.column_groups().count(),
        "Members classified"
    );
    Ok(classification)
}

fn footprint_position(location: &PlanPoint, level: &Level, tol: f64) -> ColumnPosition {
    let directions: Vec<(f64, f64)> = level
        .footprint
        .iter()
        .filter_map(|seg| {
            if seg.start.approx_eq(location, tol) {
                Some((seg.end.x - seg.start.x, seg.end.y - seg.start.y))
            } else if seg.end.approx_eq(location, tol) {
                Some((seg.start.x - seg.end.x, seg.start.y - seg.end.y))
            } else {
                None
            }
        })
        .collect();

    if directions.is_empty() {
        return ColumnPosition::Interior;
    }
    let (ax, ay) = directions[0];
    let a_len = ax.hypot(ay);
    let collinear = directions.iter().all(|(bx, by)| {
        let cross = ax * by - ay * bx;
        cross.abs() <= 1e-6 * a_len * bx.hypot(*by)
    });
    if collinear {
        ColumnPosition::Edge
    } else {
        ColumnPosition::Corner
    }
}

fn bounds_position(location: &PlanPoint, bounds: Option<Bounds>) -> ColumnPosition {
    match bounds.map(|b| b.extremes(location, BOUNDS_TOLERANCE_FT)) {
        Some((true, true)) => ColumnPosition::Corner,
        Some((true, false)) | Some((false, true)) => ColumnPosition::Edge,
        _ => ColumnPosition::Interior,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::index_geometry;
    use crate::model::Point3;

    #[test]
    fn test_bucket_rounds_half_up() {
        assert_eq!(beam_bucket(23.5, 1.0), 24);
        assert_eq!(beam_bucket(24.49, 1.0), 24);
        assert_eq!(beam_bucket(24.5, 1.0), 25);
        assert_eq!(beam_bucket(10.0, 2.0), 5);
        assert_eq!(beam_bucket(11.0, 2.0), 6);
    }

    #[test]
    fn test_group_ids_and_names() {
        let beam = GroupKey::Beam { bucket: 24 };
        assert_eq!(beam.group_id(1.0).as_str(), "B-24.0ft");
        assert_eq!(beam.display_name(1.0), "24ft Beams");
        assert_eq!(GroupKey::Beam { bucket: 49 }.display_name(0.5), "24.5ft Beams");

        let column = GroupKey::Column {
            level: LevelId(2),
            position: ColumnPosition::Corner,
        };
        assert_eq!(column.group_id(1.0).as_str(), "C-L2-corner");
        assert_eq!(column.display_name(1.0), "Corner Columns (Level 2)");
    }

    #[test]
    fn test_fine_buckets_keep_distinct_ids() {
        assert_eq!(GroupKey::Beam { bucket: 484 }.group_id(0.05).as_str(), "B-24.20ft");
        assert_eq!(GroupKey::Beam { bucket: 485 }.group_id(0.05).as_str(), "B-24.25ft");
        assert_eq!(GroupKey::Beam { bucket: 485 }.display_name(0.05), "24.25ft Beams");
        assert_eq!(GroupKey::Beam { bucket: 49 }.group_id(0.5).as_str(), "B-24.5ft");
        assert_eq!(bucket_decimals(1.0), 1);
        assert_eq!(bucket_decimals(0.25), 2);
        assert_eq!(bucket_decimals(0.001), 3);
    }

    fn bay(width: f64, depth: f64) -> StructuralModel {
        let mut model = StructuralModel::new();
        for (id, x, y) in [("A", 0.0, 0.0), ("B", width, 0.0), ("C", width, depth), ("D", 0.0, depth)] {
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
    fn test_fine_buckets_group_every_frame() {
        let mut config = DesignConfig::default();
        config.tolerances.beam_bucket_ft = 0.05;
        let model = bay(24.2, 24.25);
        let geometry = index_geometry(&model, &config).unwrap();
        let groups = classify_members(&model, &geometry, &config).unwrap();

        let grouped: usize = groups.groups.values().map(|g| g.members.len()).sum();
        assert_eq!(grouped, model.frames.len());
        assert_eq!(groups.beam_groups().count(), 2);
        let b1 = groups.group_of(&"B1".into()).unwrap();
        let b2 = groups.group_of(&"B2".into()).unwrap();
        assert_eq!(b1.id.as_str(), "B-24.20ft");
        assert_eq!(b2.id.as_str(), "B-24.25ft");
        assert_eq!(b1.members, vec![FrameId::from("B1"), FrameId::from("B3")]);
    }

    #[test]
    fn test_bounds_fallback() {
        let b = Bounds::of([PlanPoint::new(0.0, 0.0), PlanPoint::new(40.0, 30.0)]);
        assert_eq!(bounds_position(&PlanPoint::new(0.0, 30.0), b), ColumnPosition::Corner);
        assert_eq!(bounds_position(&PlanPoint::new(20.0, 0.2), b), ColumnPosition::Edge);
        assert_eq!(bounds_position(&PlanPoint::new(20.0, 15.0), b), ColumnPosition::Interior);
        assert_eq!(bounds_position(&PlanPoint::new(20.0, 15.0), None), ColumnPosition::Interior);
    }

    #[test]
    fn test_reassign_keeps_role() {
        let mut c = Classification::default();
        for (id, key, members) in [
            ("B-20.0ft", GroupKey::Beam { bucket: 20 }, vec!["B1", "B2"]),
            ("B-24.0ft", GroupKey::Beam { bucket: 24 }, vec!["B3"]),
            (
                "C-L1-corner",
                GroupKey::Column {
                    level: LevelId(1),
                    position: ColumnPosition::Corner,
                },
                vec!["C1"],
            ),
        ] {
            c.groups.insert(
                GroupId::from(id),
                Group {
                    id: GroupId::from(id),
                    name: id.to_string(),
                    key,
                    members: members.into_iter().map(FrameId::from).collect(),
                    section: None,
                },
            );
        }

        c.reassign(&"B1".into(), &"B-24.0ft".into()).unwrap();
        assert_eq!(c.group_of(&"B1".into()).unwrap().id.as_str(), "B-24.0ft");
        assert_eq!(c.group(&"B-20.0ft".into()).unwrap().members.len(), 1);

        assert!(c.reassign(&"B2".into(), &"C-L1-corner".into()).is_err());
        assert!(c.reassign(&"B2".into(), &"missing".into()).is_err());
    }
}
