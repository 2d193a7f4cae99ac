//! # Design Pipeline
//!
//! Explicit stage machine over the five components:
//!
//! ```text
//! Created → GeometryIndexed → LoadsApplied → MembersClassified → Optimized → Reported
//! ```
//!
//! Each stage reads only committed outputs of earlier stages, computes its
//! result, and commits it in one step. A failing stage leaves the
//! checkpoint exactly as it was. Re-running a stage discards everything
//! downstream of it.
//!
//! The whole state is a serializable [`Checkpoint`], saved with
//! [`crate::file_io::save_checkpoint`] between stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::analysis::StructuralSolver;
use crate::classify::{self, Classification};
use crate::config::DesignConfig;
use crate::errors::{DesignError, DesignResult};
use crate::geometry::{self, GeometryIndex};
use crate::loads::{self, LoadSet};
use crate::model::{FrameId, GroupId, StructuralModel};
use crate::optimizer::{CancelFlag, OptimizationOutcome, SectionOptimizer};
use crate::report::{self, DesignReport};
use crate::sections::SteelShapeDb;

/// Checkpoint schema version
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Created,
    GeometryIndexed,
    LoadsApplied,
    MembersClassified,
    Optimized,
    Reported,
}

impl Stage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Created => "created",
            Stage::GeometryIndexed => "geometry indexed",
            Stage::LoadsApplied => "loads applied",
            Stage::MembersClassified => "members classified",
            Stage::Optimized => "optimized",
            Stage::Reported => "reported",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for Stage {
    type Err = DesignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "geometry" | "geometryindexed" => Ok(Stage::GeometryIndexed),
            "loads" | "loadsapplied" => Ok(Stage::LoadsApplied),
            "classify" | "membersclassified" => Ok(Stage::MembersClassified),
            "optimize" | "optimized" => Ok(Stage::Optimized),
            "report" | "reported" => Ok(Stage::Reported),
            _ => Err(DesignError::invalid_input(
                "stage",
                s,
                "Expected geometry, loads, classify, optimize or report",
            )),
        }
    }
}

/// Checkpoint metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub run_id: Uuid,
    /// Schema version for compatibility checks
    pub version: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub stage: Stage,
}

/// Complete pipeline state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub meta: CheckpointMeta,
    pub config: DesignConfig,
    pub model: StructuralModel,
    pub geometry: Option<GeometryIndex>,
    pub loads: Option<LoadSet>,
    pub groups: Option<Classification>,
    pub outcome: Option<OptimizationOutcome>,
    pub report: Option<DesignReport>,
}

impl Checkpoint {
    pub fn new(model: StructuralModel, config: DesignConfig) -> Self {
        let now = Utc::now();
        Checkpoint {
            meta: CheckpointMeta {
                run_id: Uuid::new_v4(),
                version: SCHEMA_VERSION.to_string(),
                created: now,
                modified: now,
                stage: Stage::Created,
            },
            config,
            model,
            geometry: None,
            loads: None,
            groups: None,
            outcome: None,
            report: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.meta.stage
    }

    fn touch(&mut self, stage: Stage) {
        self.meta.stage = stage;
        self.meta.modified = Utc::now();
    }

    /// Drop every output produced after `stage`.
    fn truncate_after(&mut self, stage: Stage) {
        if stage < Stage::GeometryIndexed {
            self.geometry = None;
        }
        if stage < Stage::LoadsApplied {
            self.loads = None;
        }
        if stage < Stage::MembersClassified {
            self.groups = None;
        }
        if stage < Stage::Optimized {
            self.outcome = None;
        }
        if stage < Stage::Reported {
            self.report = None;
        }
    }
}

/// Load the configured section catalog.
pub fn load_catalog(config: &DesignConfig) -> DesignResult<SteelShapeDb> {
    match &config.catalog_csv {
        Some(path) => SteelShapeDb::load_from_csv(path),
        None => Ok(SteelShapeDb::builtin()),
    }
}

/// Both configured series must exist in the catalog.
fn require_series(catalog: &SteelShapeDb, config: &DesignConfig) -> DesignResult<()> {
    for (field, name) in [("beam_series", &config.beam_series), ("column_series", &config.column_series)] {
        if catalog.series(name, config.selection_metric).is_err() {
            return Err(DesignError::configuration(
                field,
                format!("Catalog series '{}' has no sections", name),
            ));
        }
    }
    Ok(())
}

/// Stage runner around a checkpoint
pub struct Pipeline {
    checkpoint: Checkpoint,
    catalog: SteelShapeDb,
    cancel: CancelFlag,
}

impl Pipeline {
    /// Start a run. The configuration is validated before anything else.
    pub fn new(model: StructuralModel, config: DesignConfig) -> DesignResult<Self> {
        Self::from_checkpoint(Checkpoint::new(model, config))
    }

    /// Resume from a saved checkpoint.
    pub fn from_checkpoint(checkpoint: Checkpoint) -> DesignResult<Self> {
        checkpoint.config.validate()?;
        let catalog = load_catalog(&checkpoint.config)?;
        require_series(&catalog, &checkpoint.config)?;
        Ok(Pipeline {
            checkpoint,
            catalog,
            cancel: CancelFlag::new(),
        })
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn stage(&self) -> Stage {
        self.checkpoint.stage()
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn into_checkpoint(self) -> Checkpoint {
        self.checkpoint
    }

    pub fn catalog(&self) -> &SteelShapeDb {
        &self.catalog
    }

    fn require(&self, needed: Stage, running: Stage) -> DesignResult<()> {
        if self.stage() < needed {
            return Err(DesignError::invalid_stage(
                running.display_name(),
                format!("Requires stage '{}', pipeline is at '{}'", needed, self.stage()),
            ));
        }
        Ok(())
    }

    /// Geometry Indexer: roles, levels, floor areas, base restraints.
    pub fn index_geometry(&mut self) -> DesignResult<&GeometryIndex> {
        let cp = &mut self.checkpoint;
        let index = geometry::index_geometry(&cp.model, &cp.config)?;
        let mut model = cp.model.clone();
        index.commit(&mut model, cp.config.base_restraint.restraint())?;

        cp.truncate_after(Stage::Created);
        cp.model = model;
        cp.touch(Stage::GeometryIndexed);
        info!(stage = %Stage::GeometryIndexed, levels = index.levels.len(), "Stage committed");
        Ok(cp.geometry.insert(index))
    }

    /// Load Applicator: area loads and combinations.
    pub fn apply_loads(&mut self) -> DesignResult<&LoadSet> {
        self.require(Stage::GeometryIndexed, Stage::LoadsApplied)?;
        let cp = &mut self.checkpoint;
        let geometry = cp
            .geometry
            .as_ref()
            .ok_or_else(|| DesignError::invalid_stage("loads applied", "Geometry missing"))?;
        let load_set = loads::apply_area_loads(geometry, &cp.config)?;

        cp.truncate_after(Stage::GeometryIndexed);
        cp.touch(Stage::LoadsApplied);
        info!(stage = %Stage::LoadsApplied, area_loads = load_set.area_loads.len(), "Stage committed");
        Ok(cp.loads.insert(load_set))
    }

    /// Member Classifier: groups, written back onto the frames.
    pub fn classify_members(&mut self) -> DesignResult<&Classification> {
        self.require(Stage::LoadsApplied, Stage::MembersClassified)?;
        let cp = &mut self.checkpoint;
        let geometry = cp
            .geometry
            .as_ref()
            .ok_or_else(|| DesignError::invalid_stage("members classified", "Geometry missing"))?;
        let groups = classify::classify_members(&cp.model, geometry, &cp.config)?;
        let mut model = cp.model.clone();
        groups.commit(&mut model)?;

        cp.truncate_after(Stage::LoadsApplied);
        cp.model = model;
        cp.touch(Stage::MembersClassified);
        info!(stage = %Stage::MembersClassified, groups = groups.groups.len(), "Stage committed");
        Ok(cp.groups.insert(groups))
    }

    /// Section Optimizer: blocking loop over the solver.
    pub fn optimize(&mut self, solver: &mut dyn StructuralSolver) -> DesignResult<&OptimizationOutcome> {
        self.require(Stage::MembersClassified, Stage::Optimized)?;
        let cp = &mut self.checkpoint;
        let geometry = cp
            .geometry
            .as_ref()
            .ok_or_else(|| DesignError::invalid_stage("optimized", "Geometry missing"))?;
        let mut groups = cp
            .groups
            .clone()
            .ok_or_else(|| DesignError::invalid_stage("optimized", "Groups missing"))?;
        let mut load_set = cp
            .loads
            .clone()
            .ok_or_else(|| DesignError::invalid_stage("optimized", "Loads missing"))?;

        let outcome = SectionOptimizer::new(&cp.model, geometry, &self.catalog, &cp.config)?
            .with_cancel(self.cancel.clone())
            .run(&mut groups, &mut load_set, solver)?;

        cp.truncate_after(Stage::MembersClassified);
        cp.groups = Some(groups);
        cp.loads = Some(load_set);
        cp.touch(Stage::Optimized);
        info!(
            stage = %Stage::Optimized,
            status = outcome.status.display_name(),
            iterations = outcome.iterations,
            "Stage committed"
        );
        Ok(cp.outcome.insert(outcome))
    }

    /// Report Aggregator.
    pub fn report(&mut self) -> DesignResult<&DesignReport> {
        self.require(Stage::Optimized, Stage::Reported)?;
        let cp = &mut self.checkpoint;
        let missing = |what: &str| DesignError::invalid_stage("reported", format!("{} missing", what));
        let geometry = cp.geometry.as_ref().ok_or_else(|| missing("Geometry"))?;
        let groups = cp.groups.as_ref().ok_or_else(|| missing("Groups"))?;
        let loads = cp.loads.as_ref().ok_or_else(|| missing("Loads"))?;
        let outcome = cp.outcome.as_ref().ok_or_else(|| missing("Optimization outcome"))?;
        let design_report =
            report::aggregate(&cp.model, geometry, groups, loads, outcome, &self.catalog, &cp.config)?;

        cp.touch(Stage::Reported);
        info!(stage = %Stage::Reported, frames = design_report.frames.len(), "Stage committed");
        Ok(cp.report.insert(design_report))
    }

    /// Run every remaining stage up to and including `target`.
    pub fn run_until(&mut self, target: Stage, solver: &mut dyn StructuralSolver) -> DesignResult<Stage> {
        while self.stage() < target {
            if self.cancel.is_cancelled() {
                info!(stage = %self.stage(), "Pipeline cancelled between stages");
                break;
            }
            match self.stage() {
                Stage::Created => {
                    self.index_geometry()?;
                }
                Stage::GeometryIndexed => {
                    self.apply_loads()?;
                }
                Stage::LoadsApplied => {
                    self.classify_members()?;
                }
                Stage::MembersClassified => {
                    self.optimize(solver)?;
                }
                Stage::Optimized => {
                    self.report()?;
                }
                Stage::Reported => break,
            }
        }
        Ok(self.stage())
    }

    /// Run all stages.
    pub fn run_all(&mut self, solver: &mut dyn StructuralSolver) -> DesignResult<&DesignReport> {
        self.run_until(Stage::Reported, solver)?;
        self.checkpoint
            .report
            .as_ref()
            .ok_or_else(|| DesignError::invalid_stage("reported", "Pipeline stopped before the report"))
    }

    fn rewind_to_classified(&mut self) {
        if self.stage() > Stage::MembersClassified {
            self.checkpoint.truncate_after(Stage::MembersClassified);
            self.checkpoint.touch(Stage::MembersClassified);
        }
    }

    /// Move a frame to another group. Optimization must be re-run.
    pub fn reassign_frame(&mut self, frame: &FrameId, group: &GroupId) -> DesignResult<()> {
        self.require(Stage::MembersClassified, Stage::MembersClassified)?;
        let cp = &mut self.checkpoint;
        let mut groups = cp
            .groups
            .clone()
            .ok_or_else(|| DesignError::invalid_stage("members classified", "Groups missing"))?;
        groups.reassign(frame, group)?;
        let mut model = cp.model.clone();
        groups.commit(&mut model)?;
        cp.groups = Some(groups);
        cp.model = model;
        self.rewind_to_classified();
        Ok(())
    }

    /// Set a group's section. The optimizer starts from it on the next run.
    pub fn set_group_section(&mut self, group: &GroupId, section: &str) -> DesignResult<()> {
        self.require(Stage::MembersClassified, Stage::MembersClassified)?;
        let label = self.catalog.lookup(section)?.label.clone();
        let groups = self
            .checkpoint
            .groups
            .as_mut()
            .ok_or_else(|| DesignError::invalid_stage("members classified", "Groups missing"))?;
        groups.group_mut(group)?.section = Some(label);
        self.rewind_to_classified();
        Ok(())
    }

    /// Pin a single frame to a section (or clear the pin). The optimizer
    /// never changes overridden frames.
    pub fn set_frame_override(&mut self, frame: &FrameId, section: Option<&str>) -> DesignResult<()> {
        let label = match section {
            Some(s) => Some(self.catalog.lookup(s)?.label.clone()),
            None => None,
        };
        self.checkpoint.model.frame_mut(frame)?.section_override = label;
        self.rewind_to_classified();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TributarySolver;
    use crate::model::Point3;

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
    fn test_stage_order_enforced() {
        let mut pipeline = Pipeline::new(portal(), DesignConfig::default()).unwrap();
        let err = pipeline.classify_members().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STAGE");
        assert_eq!(pipeline.stage(), Stage::Created);
    }

    #[test]
    fn test_unknown_series_rejected_up_front() {
        let config = DesignConfig {
            beam_series: "HSS".to_string(),
            ..Default::default()
        };
        match Pipeline::new(portal(), config) {
            Err(DesignError::Configuration { field, .. }) => assert_eq!(field, "beam_series"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("pipeline accepted an empty beam series"),
        }

        let config = DesignConfig {
            column_series: "W44".to_string(),
            ..Default::default()
        };
        let err = Pipeline::new(portal(), config).err().unwrap();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_run_all() {
        let mut pipeline = Pipeline::new(portal(), DesignConfig::default()).unwrap();
        let report = pipeline.run_all(&mut TributarySolver::new()).unwrap();
        assert_eq!(report.frames.len(), 8);
        assert_eq!(pipeline.stage(), Stage::Reported);
        let cp = pipeline.checkpoint();
        assert!(cp.model.frames.values().all(|f| f.group.is_some()));
        assert_eq!(cp.model.supports().count(), 4);
    }

    #[test]
    fn test_failed_stage_keeps_checkpoint() {
        let mut model = portal();
        // dangling beam makes the roof unenclosed
        model.add_joint("X1", Point3::new(30.0, 0.0, 12.0)).unwrap();
        model.add_frame("B9", "B1", "X1").unwrap();
        let mut pipeline = Pipeline::new(model, DesignConfig::default()).unwrap();
        let before = pipeline.checkpoint().clone();
        let err = pipeline.index_geometry().unwrap_err();
        assert_eq!(err.error_code(), "GEOMETRY_ERROR");
        assert_eq!(pipeline.checkpoint(), &before);
    }

    #[test]
    fn test_rerun_discards_downstream() {
        let mut pipeline = Pipeline::new(portal(), DesignConfig::default()).unwrap();
        pipeline.run_until(Stage::MembersClassified, &mut TributarySolver::new()).unwrap();
        assert!(pipeline.checkpoint().groups.is_some());
        pipeline.index_geometry().unwrap();
        assert_eq!(pipeline.stage(), Stage::GeometryIndexed);
        assert!(pipeline.checkpoint().loads.is_none());
        assert!(pipeline.checkpoint().groups.is_none());
    }

    #[test]
    fn test_overrides_rewind_to_classified() {
        let mut pipeline = Pipeline::new(portal(), DesignConfig::default()).unwrap();
        pipeline.run_all(&mut TributarySolver::new()).unwrap();
        pipeline.set_frame_override(&"B1".into(), Some("w24x94")).unwrap();
        assert_eq!(pipeline.stage(), Stage::MembersClassified);
        assert!(pipeline.checkpoint().outcome.is_none());
        assert_eq!(
            pipeline.checkpoint().model.frame(&"B1".into()).unwrap().section_override.as_deref(),
            Some("W24X94")
        );

        let report = pipeline.run_all(&mut TributarySolver::new()).unwrap();
        let row = report.frames.iter().find(|f| f.frame.as_str() == "B1").unwrap();
        assert_eq!(row.section, "W24X94");
    }

    #[test]
    fn test_stage_names_parse() {
        assert_eq!("classify".parse::<Stage>().unwrap(), Stage::MembersClassified);
        assert_eq!("Geometry-Indexed".parse::<Stage>().unwrap(), Stage::GeometryIndexed);
        assert!("bogus".parse::<Stage>().is_err());
    }
}
