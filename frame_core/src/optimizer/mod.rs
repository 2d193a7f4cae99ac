//! # Section Optimizer
//!
//! Iterative group-wise section selection:
//!
//! ```text
//! Initialized → Assigned → Analyzed → Checked → Converged
//!                              ↑           ↓
//!                              └─ Adjusted ┴→ Exhausted
//! ```
//!
//! Every pass runs [`SectionOptimizer::analysis_pass`]: refresh self-weight
//! from the current sections, call the solver, check every frame. Each
//! group's governing ratio (max over its members) then drives one step in
//! its series:
//!
//! - ratio > 1 + tolerance → next larger section (stays put at the top)
//! - ratio < efficiency floor → next smaller section, but never below the
//!   plausibility floor or the section just above the last one that failed
//!
//! All steps come from the same result snapshot and are applied together.
//! A pass with no changes ends the run: `Converged` if every frame passes,
//! `Infeasible` otherwise. Running out of passes is `Exhausted`; the best
//! feasible design seen (lowest total metric) is kept.

pub mod initial;

pub use initial::{initial_index, ServiceEstimate};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisModel, AnalysisResult, StructuralSolver};
use crate::classify::Classification;
use crate::config::{DesignCode, DesignConfig};
use crate::design::{check_frames, FrameCheck};
use crate::errors::{DesignError, DesignResult};
use crate::geometry::GeometryIndex;
use crate::loads::LoadSet;
use crate::model::{FrameId, FrameRole, GroupId, StructuralModel};
use crate::sections::{SectionSeries, SteelShapeDb};

/// Members below this ratio are reported as underutilized
const UNDERUTILIZED_RATIO: f64 = 0.5;

/// Where the optimization loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerState {
    Initialized,
    Assigned,
    Analyzed,
    Checked,
    Adjusted,
    Converged,
    Exhausted,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OptimizationStatus {
    /// No changes in a full pass and every frame passes
    Converged,
    /// Iteration budget spent
    Exhausted,
    /// No changes possible but some group still fails
    Infeasible,
    /// Solver failed after the first pass; last stable design returned
    Halted { reason: String },
    /// Cancel flag observed between passes
    Cancelled,
}

impl OptimizationStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            OptimizationStatus::Converged => "Converged",
            OptimizationStatus::Exhausted => "Exhausted",
            OptimizationStatus::Infeasible => "Infeasible",
            OptimizationStatus::Halted { .. } => "Halted",
            OptimizationStatus::Cancelled => "Cancelled",
        }
    }
}

/// Shared cancellation request, checked only between passes
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One line of the optimization history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassRecord {
    pub iteration: usize,
    pub total_metric: f64,
    pub max_ratio: f64,
    pub feasible: bool,
    /// Sections changed after this pass
    pub changes: usize,
}

/// Utilization spread within one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupUtilization {
    pub group: GroupId,
    pub section: String,
    pub max_ratio: f64,
    pub min_ratio: f64,
    pub avg_ratio: f64,
    pub controlling_frame: Option<FrameId>,
    /// Members under 50% utilization
    pub underutilized: Vec<FrameId>,
    /// The section cannot step lighter (plausibility floor or last failure)
    pub at_lower_limit: bool,
}

/// Design state after one analysis pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSnapshot {
    pub iteration: usize,
    pub sections: BTreeMap<GroupId, String>,
    pub checks: BTreeMap<FrameId, FrameCheck>,
    pub analysis: AnalysisResult,
    pub total_metric: f64,
    pub max_ratio: f64,
    pub feasible: bool,
}

/// Final result of the optimizer stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub status: OptimizationStatus,
    pub iterations: usize,
    /// Whether every frame of the returned design passes
    pub feasible: bool,
    pub total_metric: f64,
    pub metric_unit: String,
    pub max_ratio: f64,
    pub sections: BTreeMap<GroupId, String>,
    pub checks: BTreeMap<FrameId, FrameCheck>,
    pub analysis: AnalysisResult,
    pub history: Vec<PassRecord>,
    pub utilization: Vec<GroupUtilization>,
}

/// Search position of one group within its series
#[derive(Debug, Clone)]
struct GroupCursor {
    series: SectionSeries,
    index: usize,
    /// Plausibility floor from the service estimate
    floor: usize,
    last_failing: Option<usize>,
}

impl GroupCursor {
    fn lower_limit(&self) -> usize {
        self.last_failing.map_or(self.floor, |f| self.floor.max(f + 1))
    }

    /// Next index for a governing ratio; None when the section stays
    fn step(&mut self, ratio: f64, tolerance: f64, efficiency_floor: f64) -> Option<usize> {
        if ratio > 1.0 + tolerance {
            self.last_failing = Some(self.last_failing.map_or(self.index, |f| f.max(self.index)));
            (self.index < self.series.last_index()).then(|| self.index + 1)
        } else if ratio < efficiency_floor && self.index > self.lower_limit() {
            Some(self.index - 1)
        } else {
            None
        }
    }
}

/// Drives the analysis/check/adjust loop for one committed model
pub struct SectionOptimizer<'a> {
    model: &'a StructuralModel,
    geometry: &'a GeometryIndex,
    catalog: &'a SteelShapeDb,
    config: &'a DesignConfig,
    code: DesignCode,
    lengths: BTreeMap<FrameId, f64>,
    cancel: CancelFlag,
    state: OptimizerState,
}

impl<'a> SectionOptimizer<'a> {
    pub fn new(
        model: &'a StructuralModel,
        geometry: &'a GeometryIndex,
        catalog: &'a SteelShapeDb,
        config: &'a DesignConfig,
    ) -> DesignResult<Self> {
        config.validate()?;
        let code = config.code()?;
        let mut lengths = BTreeMap::new();
        for id in model.frames.keys() {
            lengths.insert(id.clone(), model.frame_length_ft(id)?);
        }
        Ok(SectionOptimizer {
            model,
            geometry,
            catalog,
            config,
            code,
            lengths,
            cancel: CancelFlag::new(),
            state: OptimizerState::Initialized,
        })
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    fn transition(&mut self, next: OptimizerState) {
        debug!(from = ?self.state, to = ?next, "Optimizer state");
        self.state = next;
    }

    fn series_for(&self, role: FrameRole) -> DesignResult<SectionSeries> {
        let name = match role {
            FrameRole::Beam => &self.config.beam_series,
            FrameRole::Column => &self.config.column_series,
        };
        self.catalog.series(name, self.config.selection_metric)
    }

    /// Section label a frame currently carries
    fn section_of<'g>(&self, frame: &FrameId, groups: &'g Classification) -> DesignResult<&'g str> {
        let owner = groups
            .group_of(frame)
            .ok_or_else(|| DesignError::invalid_stage("optimization", format!("Frame {} has no group", frame)))?;
        owner
            .section
            .as_deref()
            .ok_or_else(|| DesignError::invalid_stage("optimization", format!("Group {} has no section", owner.id)))
    }

    /// Total selection metric of the current assignment
    pub fn total_metric(&self, groups: &Classification) -> DesignResult<f64> {
        let mut total = 0.0;
        for frame in self.model.frames.values() {
            let label = match &frame.section_override {
                Some(label) => label.as_str(),
                None => self.section_of(&frame.id, groups)?,
            };
            let shape = self.catalog.lookup(label)?;
            let length = self.lengths.get(&frame.id).copied().unwrap_or(0.0);
            total += self.config.selection_metric.per_foot(shape.weight_plf) * length;
        }
        Ok(total)
    }

    /// Reapply self-weight, solve and check the current assignment.
    ///
    /// Safe to call repeatedly; it reads the groups and rewrites only the
    /// self-weight in `loads`.
    pub fn analysis_pass(
        &self,
        groups: &Classification,
        loads: &mut LoadSet,
        solver: &mut dyn StructuralSolver,
    ) -> DesignResult<(AnalysisResult, BTreeMap<FrameId, FrameCheck>)> {
        let mut weights = Vec::with_capacity(self.model.frames.len());
        for frame in self.model.frames.values() {
            let label = match &frame.section_override {
                Some(label) => label.as_str(),
                None => self.section_of(&frame.id, groups)?,
            };
            weights.push((frame.id.clone(), self.catalog.lookup(label)?.weight()));
        }
        loads.refresh_self_weight(weights);

        let analysis_model = AnalysisModel::assemble(
            self.model,
            self.geometry,
            groups,
            loads,
            self.catalog,
            self.config.steel.e(),
            self.config.tolerances.level_ft,
        )?;
        let result = solver.analyze(&analysis_model)?;
        let checks = check_frames(&analysis_model, &result, self.code, &self.config.steel)?;
        Ok((result, checks))
    }

    /// Governing ratio per group, ignoring members with a section override
    fn group_ratios(&self, groups: &Classification, checks: &BTreeMap<FrameId, FrameCheck>) -> BTreeMap<GroupId, f64> {
        groups
            .groups
            .values()
            .map(|g| {
                let ratio = g
                    .members
                    .iter()
                    .filter(|m| self.model.frames.get(*m).is_some_and(|f| f.section_override.is_none()))
                    .filter_map(|m| checks.get(m))
                    .fold(0.0_f64, |acc, c| acc.max(c.ratio));
                (g.id.clone(), ratio)
            })
            .collect()
    }

    fn snapshot(
        &self,
        iteration: usize,
        groups: &Classification,
        result: AnalysisResult,
        checks: BTreeMap<FrameId, FrameCheck>,
    ) -> DesignResult<DesignSnapshot> {
        let tolerance = self.config.tolerances.utilization;
        Ok(DesignSnapshot {
            iteration,
            sections: groups
                .groups
                .values()
                .filter_map(|g| g.section.clone().map(|s| (g.id.clone(), s)))
                .collect(),
            feasible: checks.values().all(|c| c.passes(tolerance)),
            max_ratio: checks.values().fold(0.0_f64, |acc, c| acc.max(c.ratio)),
            total_metric: self.total_metric(groups)?,
            checks,
            analysis: result,
        })
    }

    /// Seed every group with its initial section and build the cursors.
    fn assign_initial(
        &mut self,
        groups: &mut Classification,
        loads: &LoadSet,
    ) -> DesignResult<BTreeMap<GroupId, GroupCursor>> {
        let estimate = ServiceEstimate::build(self.model, self.geometry, loads, self.config.tolerances.level_ft)?;
        let mut cursors = BTreeMap::new();
        for group in groups.groups.values_mut() {
            let series = self.series_for(group.role())?;
            let floor = initial_index(group, &series, &estimate, &self.config.steel)?;
            let preset = group.section.as_deref().and_then(|s| series.index_of(s));
            if group.section.is_some() && preset.is_none() {
                warn!(group = %group.id, section = ?group.section, series = %series.name, "Preset section not in series, ignored");
            }
            let index = preset.unwrap_or(floor);
            let floor = floor.min(index);
            let label = series
                .get(index)
                .map(|s| s.label.clone())
                .ok_or_else(|| DesignError::configuration("series", format!("No section at index {}", index)))?;
            debug!(group = %group.id, section = %label, floor, "Initial section");
            group.section = Some(label);
            cursors.insert(
                group.id.clone(),
                GroupCursor {
                    series,
                    index,
                    floor,
                    last_failing: None,
                },
            );
        }
        self.transition(OptimizerState::Assigned);
        Ok(cursors)
    }

    /// Run the loop. Group sections in `groups` hold the returned design on
    /// success.
    pub fn run(
        &mut self,
        groups: &mut Classification,
        loads: &mut LoadSet,
        solver: &mut dyn StructuralSolver,
    ) -> DesignResult<OptimizationOutcome> {
        let tolerance = self.config.tolerances.utilization;
        let efficiency_floor = self.config.tolerances.efficiency_floor;
        let mut cursors = self.assign_initial(groups, loads)?;

        let mut history = Vec::new();
        let mut best: Option<DesignSnapshot> = None;
        let mut last: Option<DesignSnapshot> = None;
        let mut status = OptimizationStatus::Exhausted;
        let mut iterations = 0;

        for iteration in 1..=self.config.max_iterations {
            if self.cancel.is_cancelled() {
                info!(iteration, "Optimization cancelled");
                status = OptimizationStatus::Cancelled;
                break;
            }

            let (result, checks) = match self.analysis_pass(groups, loads, solver) {
                Ok(pass) => pass,
                Err(DesignError::Analysis { reason }) if last.is_some() => {
                    warn!(iteration, %reason, "Analysis failed, halting with last stable design");
                    status = OptimizationStatus::Halted { reason };
                    break;
                }
                Err(e) => return Err(e),
            };
            iterations = iteration;
            self.transition(OptimizerState::Analyzed);

            let ratios = self.group_ratios(groups, &checks);
            let snapshot = self.snapshot(iteration, groups, result, checks)?;
            self.transition(OptimizerState::Checked);

            let mut changes = BTreeMap::new();
            for (id, cursor) in cursors.iter_mut() {
                let ratio = ratios.get(id).copied().unwrap_or(0.0);
                if let Some(next) = cursor.step(ratio, tolerance, efficiency_floor) {
                    changes.insert(id.clone(), next);
                }
            }

            info!(
                iteration,
                total_metric = snapshot.total_metric,
                max_ratio = snapshot.max_ratio,
                feasible = snapshot.feasible,
                changes = changes.len(),
                "Optimization pass"
            );
            history.push(PassRecord {
                iteration,
                total_metric: snapshot.total_metric,
                max_ratio: snapshot.max_ratio,
                feasible: snapshot.feasible,
                changes: changes.len(),
            });

            if snapshot.feasible && best.as_ref().map_or(true, |b| snapshot.total_metric < b.total_metric) {
                best = Some(snapshot.clone());
            }
            let converged = changes.is_empty();
            let feasible = snapshot.feasible;
            last = Some(snapshot);

            if converged {
                if feasible {
                    self.transition(OptimizerState::Converged);
                    status = OptimizationStatus::Converged;
                } else {
                    warn!(iteration, "No further changes possible but design still fails");
                    status = OptimizationStatus::Infeasible;
                }
                break;
            }

            for (id, next) in changes {
                let cursor = cursors
                    .get_mut(&id)
                    .ok_or_else(|| DesignError::unknown("group", id.to_string()))?;
                cursor.index = next;
                let label = cursor
                    .series
                    .get(next)
                    .map(|s| s.label.clone())
                    .ok_or_else(|| DesignError::configuration("series", format!("No section at index {}", next)))?;
                groups.group_mut(&id)?.section = Some(label);
            }
            self.transition(OptimizerState::Adjusted);
        }

        if status == OptimizationStatus::Exhausted {
            self.transition(OptimizerState::Exhausted);
            warn!(passes = iterations, "Iteration budget exhausted");
        }

        // Converged and Infeasible keep the final pass; everything else
        // falls back to the best feasible design seen.
        let chosen = match status {
            OptimizationStatus::Converged | OptimizationStatus::Infeasible => last,
            _ => best.or(last),
        }
        .ok_or_else(|| DesignError::invalid_stage("optimization", "No analysis pass completed"))?;

        for (id, section) in &chosen.sections {
            groups.group_mut(id)?.section = Some(section.clone());
        }

        let at_limit: BTreeMap<GroupId, bool> = cursors
            .iter()
            .map(|(id, c)| {
                let index = chosen.sections.get(id).and_then(|s| c.series.index_of(s));
                (id.clone(), index.is_some_and(|i| i <= c.lower_limit()))
            })
            .collect();
        let utilization = self.utilization(groups, &chosen.checks, &at_limit);
        Ok(OptimizationOutcome {
            status,
            iterations,
            feasible: chosen.feasible,
            total_metric: chosen.total_metric,
            metric_unit: self.config.selection_metric.unit_label().to_string(),
            max_ratio: chosen.max_ratio,
            sections: chosen.sections,
            checks: chosen.checks,
            analysis: chosen.analysis,
            history,
            utilization,
        })
    }

    /// Per-group utilization spread, logged for review
    fn utilization(
        &self,
        groups: &Classification,
        checks: &BTreeMap<FrameId, FrameCheck>,
        at_limit: &BTreeMap<GroupId, bool>,
    ) -> Vec<GroupUtilization> {
        let mut out = Vec::new();
        for group in groups.groups.values() {
            let member_checks: Vec<&FrameCheck> = group.members.iter().filter_map(|m| checks.get(m)).collect();
            if member_checks.is_empty() {
                continue;
            }
            let max = member_checks.iter().fold(0.0_f64, |acc, c| acc.max(c.ratio));
            let min = member_checks.iter().fold(f64::INFINITY, |acc, c| acc.min(c.ratio));
            let avg = member_checks.iter().map(|c| c.ratio).sum::<f64>() / member_checks.len() as f64;
            let controlling_frame = member_checks
                .iter()
                .max_by(|a, b| a.ratio.total_cmp(&b.ratio))
                .map(|c| c.frame.clone());
            let underutilized: Vec<FrameId> = member_checks
                .iter()
                .filter(|c| c.ratio < UNDERUTILIZED_RATIO)
                .map(|c| c.frame.clone())
                .collect();

            info!(
                group = %group.id,
                section = group.section.as_deref().unwrap_or("-"),
                avg,
                min,
                max,
                "Group utilization"
            );
            if !underutilized.is_empty() {
                debug!(group = %group.id, frames = ?underutilized, "Underutilized members");
            }

            out.push(GroupUtilization {
                group: group.id.clone(),
                section: group.section.clone().unwrap_or_default(),
                max_ratio: max,
                min_ratio: min,
                avg_ratio: avg,
                controlling_frame,
                underutilized,
                at_lower_limit: at_limit.get(&group.id).copied().unwrap_or(false),
            });
        }
        out
    }
}
