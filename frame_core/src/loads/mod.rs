//! # Load Applicator
//!
//! Uniform area loads per floor area, frame self-weight and the code's
//! gravity combinations.
//!
//! - [`LoadType`] - D, L, Lr
//! - [`LoadCase`] - unfactored values by load type
//! - [`LoadCombination`] - factors for one code combination
//! - [`LoadSet`] - everything the analysis consumes: area loads,
//!   self-weight line loads and the combination set
//!
//! Area loads depend only on geometry and configuration. Self-weight depends
//! on the sections currently assigned, so the optimizer refreshes it on every
//! pass with [`LoadSet::refresh_self_weight`].
//!
//! # Example
//!
//! ```
//! use frame_core::loads::{LoadCase, LoadType, lrfd_gravity_combinations, find_governing_combination};
//!
//! let floor = LoadCase::new("Second Floor")
//!     .with_load(LoadType::Dead, 20.0)
//!     .with_load(LoadType::Live, 50.0);
//!
//! let combos = lrfd_gravity_combinations();
//! let (q, combo) = find_governing_combination(&floor, &combos).unwrap();
//! assert_eq!(combo.name, "LRFD-2");
//! assert!(q > 100.0);
//! ```

pub mod combinations;
pub mod load_types;

pub use combinations::{
    asd_gravity_combinations, combinations_for, find_governing_combination, lrfd_gravity_combinations,
    CombinationKind, LoadCombination,
};
pub use load_types::LoadType;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::DesignConfig;
use crate::errors::{DesignError, DesignResult};
use crate::geometry::{FloorUsage, GeometryIndex};
use crate::model::{AreaId, FrameId};
use crate::units::{PlF, Psf};

/// Unfactored load values by type
///
/// Units depend on context (psf for areas, kips or kip-ft for demands).
///
/// # Example
/// ```
/// use frame_core::loads::{LoadCase, LoadType};
///
/// let case = LoadCase::new("Roof")
///     .with_load(LoadType::Dead, 15.0)
///     .with_load(LoadType::LiveRoof, 20.0);
///
/// assert_eq!(case.get(LoadType::Live), 0.0);
/// assert_eq!(case.total(), 35.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadCase {
    pub label: String,
    pub loads: BTreeMap<LoadType, f64>,
}

impl LoadCase {
    pub fn new(label: impl Into<String>) -> Self {
        LoadCase {
            label: label.into(),
            loads: BTreeMap::new(),
        }
    }

    pub fn with_load(mut self, load_type: LoadType, value: f64) -> Self {
        self.loads.insert(load_type, value);
        self
    }

    /// Add to the existing value of a type
    pub fn add(&mut self, load_type: LoadType, value: f64) {
        *self.loads.entry(load_type).or_insert(0.0) += value;
    }

    /// Value for a type, 0.0 when absent
    pub fn get(&self, load_type: LoadType) -> f64 {
        self.loads.get(&load_type).copied().unwrap_or(0.0)
    }

    /// Unfactored sum of all types
    pub fn total(&self) -> f64 {
        self.loads.values().sum()
    }

    /// Gravity loads may not be negative.
    pub fn validate(&self) -> DesignResult<()> {
        for (load_type, value) in &self.loads {
            if !value.is_finite() || *value < 0.0 {
                return Err(DesignError::invalid_input(
                    format!("load_{}", load_type.code()),
                    value.to_string(),
                    format!("{} cannot be negative", load_type.description()),
                ));
            }
        }
        Ok(())
    }
}

/// Uniform pressure of one load type on one floor area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaLoad {
    pub area: AreaId,
    pub load_type: LoadType,
    pub pressure: Psf,
}

/// Uniform line load along a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameLoad {
    pub frame: FrameId,
    pub load_type: LoadType,
    pub line_load: PlF,
}

/// Loads handed to the structural analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadSet {
    pub area_loads: Vec<AreaLoad>,
    /// Self-weight (Dead) per frame, from the currently assigned section
    pub self_weight: BTreeMap<FrameId, PlF>,
    pub combinations: Vec<LoadCombination>,
}

impl LoadSet {
    /// Unfactored pressures on one area
    pub fn area_case(&self, area: &AreaId) -> LoadCase {
        let mut case = LoadCase::new(area.to_string());
        for load in self.area_loads.iter().filter(|l| &l.area == area) {
            case.add(load.load_type, load.pressure.0);
        }
        case
    }

    /// Self-weight line loads as frame loads
    pub fn frame_loads(&self) -> Vec<FrameLoad> {
        self.self_weight
            .iter()
            .map(|(frame, w)| FrameLoad {
                frame: frame.clone(),
                load_type: LoadType::Dead,
                line_load: *w,
            })
            .collect()
    }

    /// Replace every frame's self-weight with its current section weight.
    pub fn refresh_self_weight(&mut self, weights: impl IntoIterator<Item = (FrameId, PlF)>) {
        self.self_weight = weights.into_iter().collect();
    }
}

/// Build area loads and combinations for the indexed geometry.
///
/// Configuration is validated before anything is produced; missing or
/// negative values fail with a configuration error.
pub fn apply_area_loads(geometry: &GeometryIndex, config: &DesignConfig) -> DesignResult<LoadSet> {
    let values = config.area_loads()?;
    let code = config.code()?;

    let mut area_loads = Vec::with_capacity(geometry.floor_areas.len() * 2);
    for area in &geometry.floor_areas {
        let (dead, live, live_type) = match area.usage {
            FloorUsage::Floor => (values.floor_dead, values.floor_live, LoadType::Live),
            FloorUsage::Roof => (values.roof_dead, values.roof_live, LoadType::LiveRoof),
        };
        area_loads.push(AreaLoad {
            area: area.id.clone(),
            load_type: LoadType::Dead,
            pressure: dead,
        });
        area_loads.push(AreaLoad {
            area: area.id.clone(),
            load_type: live_type,
            pressure: live,
        });
    }

    let combinations = combinations_for(code);
    info!(
        areas = geometry.floor_areas.len(),
        area_loads = area_loads.len(),
        combinations = combinations.len(),
        code = %code,
        "Area loads applied"
    );

    Ok(LoadSet {
        area_loads,
        self_weight: BTreeMap::new(),
        combinations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{FloorArea, PlanPoint};
    use crate::model::LevelId;
    use crate::units::SqFt;

    fn area(id: &str, usage: FloorUsage) -> FloorArea {
        FloorArea {
            id: AreaId::from(id),
            level: LevelId(1),
            outline: vec![],
            coordinates: vec![PlanPoint::new(0.0, 0.0)],
            holes: vec![],
            usage,
            boundary_beams: vec![],
            gross_area: SqFt(100.0),
            net_area: SqFt(100.0),
            local_axis_deg: 0.0,
        }
    }

    fn geometry() -> GeometryIndex {
        GeometryIndex {
            floor_areas: vec![area("L1-A01", FloorUsage::Floor), area("L2-A01", FloorUsage::Roof)],
            ..Default::default()
        }
    }

    #[test]
    fn test_floor_and_roof_loads() {
        let loads = apply_area_loads(&geometry(), &DesignConfig::default()).unwrap();
        assert_eq!(loads.area_loads.len(), 4);

        let floor = loads.area_case(&"L1-A01".into());
        assert_eq!(floor.get(LoadType::Dead), 20.0);
        assert_eq!(floor.get(LoadType::Live), 50.0);
        assert_eq!(floor.get(LoadType::LiveRoof), 0.0);

        let roof = loads.area_case(&"L2-A01".into());
        assert_eq!(roof.get(LoadType::Dead), 15.0);
        assert_eq!(roof.get(LoadType::LiveRoof), 20.0);
        assert_eq!(roof.get(LoadType::Live), 0.0);
    }

    #[test]
    fn test_negative_load_rejected() {
        let mut config = DesignConfig::default();
        config.loads.floor_live_psf = Some(-1.0);
        let err = apply_area_loads(&geometry(), &config).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_refresh_self_weight() {
        let mut loads = apply_area_loads(&geometry(), &DesignConfig::default()).unwrap();
        loads.refresh_self_weight(vec![(FrameId::from("B1"), PlF(26.0))]);
        loads.refresh_self_weight(vec![(FrameId::from("B1"), PlF(35.0))]);
        let frame_loads = loads.frame_loads();
        assert_eq!(frame_loads.len(), 1);
        assert_eq!(frame_loads[0].line_load, PlF(35.0));
        assert_eq!(frame_loads[0].load_type, LoadType::Dead);
    }

    #[test]
    fn test_load_case_validation() {
        assert!(LoadCase::new("ok").with_load(LoadType::Dead, 10.0).validate().is_ok());
        assert!(LoadCase::new("bad").with_load(LoadType::Live, -10.0).validate().is_err());
    }
}
