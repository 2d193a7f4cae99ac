//! # Structural Model
//!
//! Joints and frame elements as they exist in the externally held model.
//! The pipeline reads this geometry, writes frame roles, levels and group
//! references onto it, and mutates joint restraints exactly once (base
//! support setup).
//!
//! ## Structure
//!
//! ```text
//! StructuralModel
//! ├── joints: BTreeMap<JointId, Joint>   (coordinates in feet, restraints)
//! └── frames: BTreeMap<FrameId, Frame>   (joint pair, role, group, level)
//! ```
//!
//! Maps are ordered so every traversal of the model is deterministic, which
//! keeps level/area/group numbering stable across re-runs.
//!
//! ## Example
//!
//! ```rust
//! use frame_core::model::{ModelInput, StructuralModel};
//!
//! let json = r#"{
//!   "joints": [
//!     { "id": "J1", "x": 0.0, "y": 0.0, "z": 0.0 },
//!     { "id": "J2", "x": 0.0, "y": 0.0, "z": 12.0 }
//!   ],
//!   "frames": [ { "id": "C1", "i": "J1", "j": "J2" } ]
//! }"#;
//! let input: ModelInput = serde_json::from_str(json).unwrap();
//! let model = StructuralModel::from_input(input).unwrap();
//! assert_eq!(model.frame_length_ft(&"C1".into()).unwrap(), 12.0);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{DesignError, DesignResult};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a joint in the external model
    JointId
);
string_id!(
    /// Identifier of a frame element in the external model
    FrameId
);
string_id!(
    /// Deterministic group identifier derived from the classification key
    GroupId
);
string_id!(
    /// Identifier of a detected floor area (e.g. "L1-A01")
    AreaId
);

/// Index of a detected level, counted from the lowest elevation (0 = lowest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelId(pub usize);

impl std::fmt::Display for LevelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// 3D coordinate in feet
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Point3 { x, y, z }
    }

    /// Euclidean distance in feet
    pub fn distance(&self, other: &Point3) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2)).sqrt()
    }

    /// Horizontal (plan) distance in feet, ignoring elevation
    pub fn plan_distance(&self, other: &Point3) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Restraint flags per degree of freedom: [Ux, Uy, Uz, Rx, Ry, Rz]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Restraint(pub [bool; 6]);

impl Restraint {
    /// No restraint
    pub const FREE: Restraint = Restraint([false; 6]);
    /// All translations and rotations fixed
    pub const FIXED: Restraint = Restraint([true; 6]);
    /// Translations fixed, rotations free
    pub const PINNED: Restraint = Restraint([true, true, true, false, false, false]);

    /// Whether any degree of freedom is restrained
    pub fn is_support(&self) -> bool {
        self.0.iter().any(|r| *r)
    }

    /// Whether vertical translation is restrained
    pub fn resists_gravity(&self) -> bool {
        self.0[2]
    }
}

/// A joint (node) of the structural model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub id: JointId,
    pub position: Point3,
    #[serde(default)]
    pub restraint: Restraint,
}

/// Member role, inferred from orientation by the geometry indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FrameRole {
    #[default]
    Beam,
    Column,
}

impl FrameRole {
    pub fn display_name(&self) -> &'static str {
        match self {
            FrameRole::Beam => "Beam",
            FrameRole::Column => "Column",
        }
    }
}

impl std::fmt::Display for FrameRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A frame element spanning two joints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub id: FrameId,
    pub i: JointId,
    pub j: JointId,
    #[serde(default)]
    pub role: FrameRole,
    /// Group reference, assigned by the member classifier
    #[serde(default)]
    pub group: Option<GroupId>,
    /// Level reference: the beam's level, or the level a column spans into
    #[serde(default)]
    pub level: Option<LevelId>,
    /// Per-member section override set by a user. The optimizer never
    /// writes this field; it always sizes the group's shared section.
    #[serde(default)]
    pub section_override: Option<String>,
}

/// Joint record in a model input file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointInput {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Frame record in a model input file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameInput {
    pub id: String,
    pub i: String,
    pub j: String,
}

/// Raw geometry as exported from the external model (joints + frames).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelInput {
    pub joints: Vec<JointInput>,
    pub frames: Vec<FrameInput>,
}

/// In-memory view of the external structural model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralModel {
    pub joints: BTreeMap<JointId, Joint>,
    pub frames: BTreeMap<FrameId, Frame>,
}

impl StructuralModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model from an input file, validating ids and references.
    pub fn from_input(input: ModelInput) -> DesignResult<Self> {
        let mut model = StructuralModel::new();
        for j in input.joints {
            model.add_joint(j.id.as_str(), Point3::new(j.x, j.y, j.z))?;
        }
        for f in input.frames {
            model.add_frame(f.id.as_str(), f.i.as_str(), f.j.as_str())?;
        }
        Ok(model)
    }

    /// Add a joint. Duplicate ids are rejected.
    pub fn add_joint(&mut self, id: impl Into<JointId>, position: Point3) -> DesignResult<JointId> {
        let id = id.into();
        if !(position.x.is_finite() && position.y.is_finite() && position.z.is_finite()) {
            return Err(DesignError::invalid_input(
                format!("joint {}", id),
                format!("{:?}", position),
                "Coordinates must be finite",
            ));
        }
        if self.joints.contains_key(&id) {
            return Err(DesignError::invalid_input("joint id", id.to_string(), "Duplicate joint id"));
        }
        self.joints.insert(
            id.clone(),
            Joint {
                id: id.clone(),
                position,
                restraint: Restraint::FREE,
            },
        );
        Ok(id)
    }

    /// Add a frame between two existing joints.
    pub fn add_frame(
        &mut self,
        id: impl Into<FrameId>,
        i: impl Into<JointId>,
        j: impl Into<JointId>,
    ) -> DesignResult<FrameId> {
        let (id, i, j) = (id.into(), i.into(), j.into());
        if self.frames.contains_key(&id) {
            return Err(DesignError::invalid_input("frame id", id.to_string(), "Duplicate frame id"));
        }
        for end in [&i, &j] {
            if !self.joints.contains_key(end) {
                return Err(DesignError::unknown("joint", end.to_string()));
            }
        }
        if i == j {
            return Err(DesignError::invalid_input(
                format!("frame {}", id),
                i.to_string(),
                "Frame must connect two distinct joints",
            ));
        }
        self.frames.insert(
            id.clone(),
            Frame {
                id: id.clone(),
                i,
                j,
                role: FrameRole::Beam,
                group: None,
                level: None,
                section_override: None,
            },
        );
        Ok(id)
    }

    pub fn joint(&self, id: &JointId) -> DesignResult<&Joint> {
        self.joints.get(id).ok_or_else(|| DesignError::unknown("joint", id.to_string()))
    }

    pub fn frame(&self, id: &FrameId) -> DesignResult<&Frame> {
        self.frames.get(id).ok_or_else(|| DesignError::unknown("frame", id.to_string()))
    }

    pub fn frame_mut(&mut self, id: &FrameId) -> DesignResult<&mut Frame> {
        self.frames.get_mut(id).ok_or_else(|| DesignError::unknown("frame", id.to_string()))
    }

    /// End coordinates of a frame (i-end, j-end)
    pub fn frame_ends(&self, id: &FrameId) -> DesignResult<(Point3, Point3)> {
        let frame = self.frame(id)?;
        Ok((self.joint(&frame.i)?.position, self.joint(&frame.j)?.position))
    }

    /// Frame length in feet
    pub fn frame_length_ft(&self, id: &FrameId) -> DesignResult<f64> {
        let (a, b) = self.frame_ends(id)?;
        Ok(a.distance(&b))
    }

    /// Bottom and top joint of a frame (by elevation; ties keep i-end first)
    pub fn bottom_top(&self, id: &FrameId) -> DesignResult<(JointId, JointId)> {
        let frame = self.frame(id)?;
        let zi = self.joint(&frame.i)?.position.z;
        let zj = self.joint(&frame.j)?.position.z;
        if zj < zi {
            Ok((frame.j.clone(), frame.i.clone()))
        } else {
            Ok((frame.i.clone(), frame.j.clone()))
        }
    }

    /// Frames of a given role, in id order
    pub fn frames_with_role(&self, role: FrameRole) -> impl Iterator<Item = &Frame> {
        self.frames.values().filter(move |f| f.role == role)
    }

    /// Joints currently carrying any restraint
    pub fn supports(&self) -> impl Iterator<Item = &Joint> {
        self.joints.values().filter(|j| j.restraint.is_support())
    }

    /// Apply one restraint pattern to each listed joint.
    pub fn apply_restraints(&mut self, joints: &[JointId], restraint: Restraint) -> DesignResult<()> {
        for id in joints {
            let joint = self
                .joints
                .get_mut(id)
                .ok_or_else(|| DesignError::unknown("joint", id.to_string()))?;
            joint.restraint = restraint;
        }
        Ok(())
    }
}
