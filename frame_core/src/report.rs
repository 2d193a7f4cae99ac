//! # Report Aggregator
//!
//! Pure summary of a finished design: sections by group, a per-frame
//! utilization table, beam deflections and a quantity takeoff. Nothing
//! upstream is modified; rendering is left to the caller (the CLI prints
//! JSON).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::Classification;
use crate::config::{DesignConfig, SelectionMetric};
use crate::design::LimitState;
use crate::errors::{DesignError, DesignResult};
use crate::geometry::{GeometryIndex, Level};
use crate::loads::{find_governing_combination, LoadCase, LoadSet};
use crate::model::{FrameId, FrameRole, GroupId, LevelId, StructuralModel};
use crate::optimizer::{OptimizationOutcome, OptimizationStatus};
use crate::sections::SteelShapeDb;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub design_code: String,
    pub status: OptimizationStatus,
    pub iterations: usize,
    pub feasible: bool,
    pub total_metric: f64,
    pub metric_unit: String,
    pub total_weight_lb: f64,
    pub total_length_ft: f64,
    pub floor_area_sqft: f64,
    /// Steel weight per square foot of loaded floor
    pub steel_psf: f64,
    pub max_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub level: LevelId,
    pub label: String,
    pub elevation_ft: f64,
    pub usage: Option<String>,
    pub beams: usize,
    pub columns: usize,
    pub floor_areas: usize,
    pub net_area_sqft: f64,
    /// Unfactored dead pressure (psf)
    pub dead_psf: f64,
    /// Unfactored transient pressure, floor or roof live (psf)
    pub live_psf: f64,
    /// Largest factored pressure over the strength combinations (psf)
    pub factored_psf: Option<f64>,
    pub governing_combination: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: GroupId,
    pub name: String,
    pub role: FrameRole,
    pub section: String,
    pub members: usize,
    pub max_ratio: f64,
    pub controlling_frame: Option<FrameId>,
    pub controlling_combination: Option<String>,
    pub limit_state: Option<LimitState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRow {
    pub frame: FrameId,
    pub group: Option<GroupId>,
    pub role: FrameRole,
    pub level: Option<LevelId>,
    pub section: String,
    pub length_ft: f64,
    pub ratio: f64,
    pub combination: String,
    pub limit_state: LimitState,
    pub passes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeflectionRow {
    pub frame: FrameId,
    pub section: String,
    pub span_ft: f64,
    pub combination: String,
    pub deflection_in: f64,
    pub allowable_in: f64,
    /// e.g. "L/360"
    pub limit: String,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeoffRow {
    pub section: String,
    pub count: usize,
    pub total_length_ft: f64,
    pub weight_lb: f64,
    /// Only when the selection metric is cost
    pub cost: Option<f64>,
}

/// Everything the report stage produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignReport {
    pub summary: ReportSummary,
    pub levels: Vec<LevelSummary>,
    pub groups: Vec<GroupSummary>,
    pub frames: Vec<FrameRow>,
    pub deflections: Vec<DeflectionRow>,
    pub takeoff: Vec<TakeoffRow>,
}

impl DesignReport {
    /// Frames that fail their checks
    pub fn failing_frames(&self) -> impl Iterator<Item = &FrameRow> {
        self.frames.iter().filter(|f| !f.passes)
    }
}

/// Build the report from committed stage outputs.
pub fn aggregate(
    model: &StructuralModel,
    geometry: &GeometryIndex,
    groups: &Classification,
    loads: &LoadSet,
    outcome: &OptimizationOutcome,
    catalog: &SteelShapeDb,
    config: &DesignConfig,
) -> DesignResult<DesignReport> {
    let tolerance = config.tolerances.utilization;

    let mut frames = Vec::with_capacity(model.frames.len());
    let mut deflections = Vec::new();
    let mut takeoff: BTreeMap<String, TakeoffRow> = BTreeMap::new();

    for frame in model.frames.values() {
        let check = outcome
            .checks
            .get(&frame.id)
            .ok_or_else(|| DesignError::invalid_stage("report", format!("Frame {} was not checked", frame.id)))?;
        let length = model.frame_length_ft(&frame.id)?;
        let shape = catalog.lookup(&check.section)?;
        let group = groups.group_of(&frame.id).map(|g| g.id.clone());

        frames.push(FrameRow {
            frame: frame.id.clone(),
            group,
            role: geometry.role(&frame.id),
            level: geometry.frame_levels.get(&frame.id).copied(),
            section: check.section.clone(),
            length_ft: length,
            ratio: check.ratio,
            combination: check.combination.clone(),
            limit_state: check.limit_state,
            passes: check.passes(tolerance),
        });

        if let Some(d) = &check.deflection {
            deflections.push(DeflectionRow {
                frame: frame.id.clone(),
                section: check.section.clone(),
                span_ft: length,
                combination: d.combination.clone(),
                deflection_in: d.deflection.0,
                allowable_in: d.allowable.0,
                limit: format!("L/{:.0}", d.limit_ratio),
                ratio: d.ratio(),
            });
        }

        let row = takeoff.entry(check.section.clone()).or_insert_with(|| TakeoffRow {
            section: check.section.clone(),
            count: 0,
            total_length_ft: 0.0,
            weight_lb: 0.0,
            cost: None,
        });
        row.count += 1;
        row.total_length_ft += length;
        row.weight_lb += shape.weight_plf * length;
    }

    if let SelectionMetric::Cost { dollars_per_lb } = config.selection_metric {
        for row in takeoff.values_mut() {
            row.cost = Some(row.weight_lb * dollars_per_lb);
        }
    }

    let group_rows = groups
        .groups
        .values()
        .map(|g| {
            let governing = g
                .members
                .iter()
                .filter_map(|m| outcome.checks.get(m))
                .max_by(|a, b| a.ratio.total_cmp(&b.ratio));
            GroupSummary {
                group: g.id.clone(),
                name: g.name.clone(),
                role: g.role(),
                section: g.section.clone().unwrap_or_default(),
                members: g.members.len(),
                max_ratio: governing.map_or(0.0, |c| c.ratio),
                controlling_frame: governing.map(|c| c.frame.clone()),
                controlling_combination: governing.map(|c| c.combination.clone()),
                limit_state: governing.map(|c| c.limit_state),
            }
        })
        .collect();

    let levels = geometry
        .levels
        .iter()
        .map(|l| level_summary(geometry, loads, l))
        .collect();

    let takeoff: Vec<TakeoffRow> = takeoff.into_values().collect();
    let total_weight_lb: f64 = takeoff.iter().map(|r| r.weight_lb).sum();
    let total_length_ft: f64 = takeoff.iter().map(|r| r.total_length_ft).sum();
    let floor_area_sqft = geometry.total_area().0;

    Ok(DesignReport {
        summary: ReportSummary {
            design_code: config.code()?.display_name().to_string(),
            status: outcome.status.clone(),
            iterations: outcome.iterations,
            feasible: outcome.feasible,
            total_metric: outcome.total_metric,
            metric_unit: outcome.metric_unit.clone(),
            total_weight_lb,
            total_length_ft,
            floor_area_sqft,
            steel_psf: if floor_area_sqft > 0.0 {
                total_weight_lb / floor_area_sqft
            } else {
                0.0
            },
            max_ratio: outcome.max_ratio,
        },
        levels,
        groups: group_rows,
        frames,
        deflections,
        takeoff,
    })
}

/// Pressures come from the level's first floor area; every area on a level
/// carries the same usage loads.
fn level_summary(geometry: &GeometryIndex, loads: &LoadSet, level: &Level) -> LevelSummary {
    let case = level
        .floor_areas
        .first()
        .map(|area| loads.area_case(area))
        .unwrap_or_else(|| LoadCase::new(geometry.level_label(level.id)));
    let governing = find_governing_combination(&case, &loads.combinations).filter(|_| case.total() > 0.0);

    LevelSummary {
        level: level.id,
        label: geometry.level_label(level.id),
        elevation_ft: level.elevation_ft,
        usage: level.usage.map(|u| u.display_name().to_string()),
        beams: level.beams.len(),
        columns: level.columns.len(),
        floor_areas: level.floor_areas.len(),
        net_area_sqft: geometry
            .floor_areas
            .iter()
            .filter(|a| a.level == level.id)
            .map(|a| a.net_area.0)
            .sum(),
        dead_psf: case.loads.iter().filter(|(t, _)| !t.is_live()).map(|(_, v)| v).sum(),
        live_psf: case.loads.iter().filter(|(t, _)| t.is_live()).map(|(_, v)| v).sum(),
        factored_psf: governing.map(|(q, _)| q),
        governing_combination: governing.map(|(_, c)| c.name.clone()),
    }
}
