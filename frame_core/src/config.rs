//! # Design Configuration
//!
//! `DesignConfig` holds every tunable the pipeline reads: design code,
//! selection metric, series preferences, area load values, tolerances,
//! iteration budget and base restraint pattern. It is consumed once when a
//! pipeline is created and validated before any model mutation.
//!
//! ## Example
//!
//! ```rust
//! use frame_core::config::{DesignCode, DesignConfig};
//!
//! let config = DesignConfig::default();
//! config.validate().unwrap();
//! assert_eq!(config.code().unwrap(), DesignCode::AiscLrfd);
//!
//! let json = r#"{ "design_code": "ASD", "max_iterations": 10 }"#;
//! let asd: DesignConfig = serde_json::from_str(json).unwrap();
//! assert_eq!(asd.code().unwrap(), DesignCode::AiscAsd);
//! assert_eq!(asd.loads.floor_dead_psf, Some(20.0));
//! ```

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{DesignError, DesignResult};
use crate::model::Restraint;
use crate::units::{Ksi, Psf};

/// Supported design codes (gravity checks only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DesignCode {
    /// AISC 360-16 LRFD with ASCE 7 §2.3 combinations
    AiscLrfd,
    /// AISC 360-16 ASD with ASCE 7 §2.4 combinations
    AiscAsd,
}

impl DesignCode {
    pub fn display_name(&self) -> &'static str {
        match self {
            DesignCode::AiscLrfd => "AISC 360-16 LRFD",
            DesignCode::AiscAsd => "AISC 360-16 ASD",
        }
    }
}

impl FromStr for DesignCode {
    type Err = DesignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "LRFD" | "AISCLRFD" | "AISC360LRFD" | "AISC36016LRFD" => Ok(DesignCode::AiscLrfd),
            "ASD" | "AISCASD" | "AISC360ASD" | "AISC36016ASD" => Ok(DesignCode::AiscAsd),
            _ => Err(DesignError::configuration(
                "design_code",
                format!("Unknown design code '{}'", s),
            )),
        }
    }
}

impl std::fmt::Display for DesignCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Objective the optimizer minimizes over all frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionMetric {
    /// Total steel weight (lb)
    Weight,
    /// Total steel cost at a flat price per pound
    Cost { dollars_per_lb: f64 },
}

impl Default for SelectionMetric {
    fn default() -> Self {
        SelectionMetric::Weight
    }
}

impl SelectionMetric {
    /// Metric of one linear foot of a section weighing `plf`
    pub fn per_foot(&self, plf: f64) -> f64 {
        match self {
            SelectionMetric::Weight => plf,
            SelectionMetric::Cost { dollars_per_lb } => plf * dollars_per_lb,
        }
    }

    pub fn unit_label(&self) -> &'static str {
        match self {
            SelectionMetric::Weight => "lb",
            SelectionMetric::Cost { .. } => "$",
        }
    }
}

/// Restraint pattern applied to foundation joints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestraintPattern {
    /// All six degrees of freedom fixed
    #[default]
    Fixed,
    /// Three translations fixed
    Pinned,
}

impl RestraintPattern {
    pub fn restraint(&self) -> Restraint {
        match self {
            RestraintPattern::Fixed => Restraint::FIXED,
            RestraintPattern::Pinned => Restraint::PINNED,
        }
    }
}

/// Uniform area load values in psf. `None` means missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadValues {
    pub floor_dead_psf: Option<f64>,
    pub floor_live_psf: Option<f64>,
    pub roof_dead_psf: Option<f64>,
    pub roof_live_psf: Option<f64>,
}

impl Default for LoadValues {
    fn default() -> Self {
        LoadValues {
            floor_dead_psf: Some(20.0),
            floor_live_psf: Some(50.0),
            roof_dead_psf: Some(15.0),
            roof_live_psf: Some(20.0),
        }
    }
}

/// Validated area loads
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaLoadValues {
    pub floor_dead: Psf,
    pub floor_live: Psf,
    pub roof_dead: Psf,
    pub roof_live: Psf,
}

impl LoadValues {
    /// Resolve to concrete values, failing on missing or negative entries.
    pub fn resolve(&self) -> DesignResult<AreaLoadValues> {
        fn required(field: &str, value: Option<f64>) -> DesignResult<Psf> {
            match value {
                None => Err(DesignError::configuration(field, "Load value is missing")),
                Some(v) if !v.is_finite() || v < 0.0 => Err(DesignError::configuration(
                    field,
                    format!("Load value must be a non-negative number, got {}", v),
                )),
                Some(v) => Ok(Psf(v)),
            }
        }
        Ok(AreaLoadValues {
            floor_dead: required("loads.floor_dead_psf", self.floor_dead_psf)?,
            floor_live: required("loads.floor_live_psf", self.floor_live_psf)?,
            roof_dead: required("loads.roof_dead_psf", self.roof_dead_psf)?,
            roof_live: required("loads.roof_live_psf", self.roof_live_psf)?,
        })
    }
}

/// Geometric and convergence tolerances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Joint elevations within this distance share a level (ft)
    pub level_ft: f64,
    /// A frame within this angle of vertical is a column (degrees)
    pub column_angle_deg: f64,
    /// Width of a beam span bucket (ft)
    pub beam_bucket_ft: f64,
    /// Groups below this utilization are downsized
    pub efficiency_floor: f64,
    /// Allowed overshoot of the 1.0 utilization limit
    pub utilization: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Tolerances {
            level_ft: 0.1,
            column_angle_deg: 5.0,
            beam_bucket_ft: 1.0,
            efficiency_floor: 0.5,
            utilization: 0.0,
        }
    }
}

/// Steel material properties shared by every section
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteelGrade {
    pub fy_ksi: f64,
    pub e_ksi: f64,
}

impl Default for SteelGrade {
    /// ASTM A992
    fn default() -> Self {
        SteelGrade {
            fy_ksi: 50.0,
            e_ksi: 29_000.0,
        }
    }
}

impl SteelGrade {
    pub fn fy(&self) -> Ksi {
        Ksi(self.fy_ksi)
    }

    pub fn e(&self) -> Ksi {
        Ksi(self.e_ksi)
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignConfig {
    /// Design code name, e.g. "AISC360-16-LRFD" or "ASD"
    pub design_code: String,

    pub selection_metric: SelectionMetric,

    /// Preferred catalog series for beams (e.g. "W", "W24")
    pub beam_series: String,

    /// Preferred catalog series for columns (e.g. "W", "W14")
    pub column_series: String,

    pub loads: LoadValues,

    pub tolerances: Tolerances,

    /// Optimizer pass budget
    pub max_iterations: usize,

    pub base_restraint: RestraintPattern,

    pub steel: SteelGrade,

    /// Optional AISC shapes CSV export replacing the built-in catalog
    pub catalog_csv: Option<String>,
}

impl Default for DesignConfig {
    fn default() -> Self {
        DesignConfig {
            design_code: "AISC360-16-LRFD".to_string(),
            selection_metric: SelectionMetric::Weight,
            beam_series: "W".to_string(),
            column_series: "W".to_string(),
            loads: LoadValues::default(),
            tolerances: Tolerances::default(),
            max_iterations: 20,
            base_restraint: RestraintPattern::Fixed,
            steel: SteelGrade::default(),
            catalog_csv: None,
        }
    }
}

impl DesignConfig {
    /// Parsed design code
    pub fn code(&self) -> DesignResult<DesignCode> {
        self.design_code.parse()
    }

    /// Validated area load values
    pub fn area_loads(&self) -> DesignResult<AreaLoadValues> {
        self.loads.resolve()
    }

    /// Check every field. Returns the first problem found.
    pub fn validate(&self) -> DesignResult<()> {
        self.code()?;
        self.area_loads()?;

        let t = &self.tolerances;
        positive("tolerances.level_ft", t.level_ft)?;
        positive("tolerances.beam_bucket_ft", t.beam_bucket_ft)?;
        if !(t.column_angle_deg > 0.0 && t.column_angle_deg < 45.0) {
            return Err(DesignError::configuration(
                "tolerances.column_angle_deg",
                format!("Must be between 0 and 45 degrees, got {}", t.column_angle_deg),
            ));
        }
        if !(t.efficiency_floor > 0.0 && t.efficiency_floor < 1.0) {
            return Err(DesignError::configuration(
                "tolerances.efficiency_floor",
                format!("Must be between 0 and 1, got {}", t.efficiency_floor),
            ));
        }
        if !(t.utilization >= 0.0 && t.utilization < 0.5) {
            return Err(DesignError::configuration(
                "tolerances.utilization",
                format!("Must be in [0, 0.5), got {}", t.utilization),
            ));
        }

        if self.max_iterations == 0 {
            return Err(DesignError::configuration("max_iterations", "Must be at least 1"));
        }
        if self.beam_series.trim().is_empty() {
            return Err(DesignError::configuration("beam_series", "Series name is empty"));
        }
        if self.column_series.trim().is_empty() {
            return Err(DesignError::configuration("column_series", "Series name is empty"));
        }
        positive("steel.fy_ksi", self.steel.fy_ksi)?;
        positive("steel.e_ksi", self.steel.e_ksi)?;
        if let SelectionMetric::Cost { dollars_per_lb } = self.selection_metric {
            positive("selection_metric.dollars_per_lb", dollars_per_lb)?;
        }
        Ok(())
    }

    /// Read a JSON config file and validate it.
    pub fn load(path: impl AsRef<Path>) -> DesignResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| DesignError::file_error("read", path.display().to_string(), e.to_string()))?;
        let config: DesignConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}

fn positive(field: &str, value: f64) -> DesignResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DesignError::configuration(field, format!("Must be positive, got {}", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = DesignConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_iterations, 20);
        assert_eq!(config.tolerances.efficiency_floor, 0.5);
        assert_eq!(config.base_restraint.restraint(), Restraint::FIXED);
    }

    #[test]
    fn test_unknown_design_code() {
        let config = DesignConfig {
            design_code: "EC3".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_design_code_aliases() {
        assert_eq!("lrfd".parse::<DesignCode>().unwrap(), DesignCode::AiscLrfd);
        assert_eq!("AISC 360-16 ASD".parse::<DesignCode>().unwrap(), DesignCode::AiscAsd);
    }

    #[test]
    fn test_missing_load_value() {
        let json = r#"{ "loads": { "floor_dead_psf": 20.0, "floor_live_psf": null } }"#;
        let config: DesignConfig = serde_json::from_str(json).unwrap();
        match config.validate().unwrap_err() {
            DesignError::Configuration { field, .. } => assert_eq!(field, "loads.floor_live_psf"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_negative_load_value() {
        let mut config = DesignConfig::default();
        config.loads.roof_live_psf = Some(-5.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cost_metric() {
        let json = r#"{ "selection_metric": { "kind": "cost", "dollars_per_lb": 1.5 } }"#;
        let config: DesignConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.selection_metric.per_foot(10.0), 15.0);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "design_code": "ASD", "base_restraint": "pinned" }"#).unwrap();
        let config = DesignConfig::load(&path).unwrap();
        assert_eq!(config.code().unwrap(), DesignCode::AiscAsd);
        assert_eq!(config.base_restraint, RestraintPattern::Pinned);
    }
}
