//! Enclosed-region detection on one level's beam graph.
//!
//! Beams at a level form a plane graph. Faces are traced with the half-edge
//! walk: arriving at a vertex, leave along the neighbor immediately
//! clockwise of the one just left, which keeps the face on the left. Bounded
//! faces come out counter-clockwise (positive area); each connected
//! component also yields one clockwise outer boundary.
//!
//! A component nested inside a bounded face of another component is an
//! opening. Its outer boundary becomes a hole of that face and its own
//! bounded faces carry no load.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use super::polygon::{centroid, contains_point, segments_intersect, signed_area, PlanPoint};
use crate::errors::{DesignError, DesignResult, GeometryErrorKind};
use crate::model::{FrameId, JointId, StructuralModel};

/// Relative tolerance for crossing tests
const CROSSING_TOL: f64 = 1e-9;

/// Angular tolerance for overlapping beams at a shared joint (radians)
const OVERLAP_TOL_RAD: f64 = 1e-6;

#[derive(Debug, Clone)]
struct PlanNode {
    joint: JointId,
    point: PlanPoint,
}

/// A straight footprint edge between two joints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSegment {
    pub frame: FrameId,
    pub start: PlanPoint,
    pub end: PlanPoint,
}

/// A loadable region found on a level
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedArea {
    /// Outline joints, counter-clockwise, starting at the smallest id
    pub outline: Vec<JointId>,
    pub coordinates: Vec<PlanPoint>,
    /// Opening outlines, counter-clockwise
    pub holes: Vec<Vec<PlanPoint>>,
    /// Beams on the outline and around holes
    pub boundary_beams: Vec<FrameId>,
    pub gross_area_sqft: f64,
    pub net_area_sqft: f64,
    /// Direction of the shortest outline edge, degrees in [0, 360)
    pub local_axis_deg: f64,
}

/// Result of region detection for one level
#[derive(Debug, Clone, Default)]
pub struct LevelPlan {
    /// Loaded areas in canonical order
    pub areas: Vec<DetectedArea>,
    /// Edges of the outer boundaries of top-level components
    pub footprint: Vec<PlanSegment>,
    /// Number of unloaded openings found
    pub openings: usize,
}

type HalfEdge = (NodeIndex, NodeIndex);

struct Face {
    half_edges: Vec<HalfEdge>,
    area: f64,
}

struct PlanGraph {
    graph: UnGraph<PlanNode, FrameId>,
    /// Neighbors of each node sorted by angle, counter-clockwise
    rotation: Vec<Vec<NodeIndex>>,
}

impl PlanGraph {
    fn build(model: &StructuralModel, beams: &[FrameId], tol_ft: f64) -> DesignResult<Self> {
        let mut graph: UnGraph<PlanNode, FrameId> = UnGraph::new_undirected();
        let mut by_joint: BTreeMap<JointId, NodeIndex> = BTreeMap::new();

        let mut sorted: Vec<&FrameId> = beams.iter().collect();
        sorted.sort();
        for id in sorted {
            let frame = model.frame(id)?;
            let mut ends = [NodeIndex::end(); 2];
            for (slot, joint_id) in [&frame.i, &frame.j].into_iter().enumerate() {
                let node = match by_joint.get(joint_id) {
                    Some(node) => *node,
                    None => {
                        let p = model.joint(joint_id)?.position;
                        let node = graph.add_node(PlanNode {
                            joint: joint_id.clone(),
                            point: PlanPoint::new(p.x, p.y),
                        });
                        by_joint.insert(joint_id.clone(), node);
                        node
                    }
                };
                ends[slot] = node;
            }
            if let Some(existing) = graph.find_edge(ends[0], ends[1]) {
                return Err(DesignError::geometry(
                    GeometryErrorKind::Degenerate,
                    "two beams connect the same pair of joints",
                    vec![graph[existing].to_string(), id.to_string()],
                    vec![frame.i.to_string(), frame.j.to_string()],
                ));
            }
            graph.add_edge(ends[0], ends[1], id.clone());
        }

        let plan = PlanGraph {
            rotation: Vec::new(),
            graph,
        };
        plan.check_coincident_joints(tol_ft)?;
        plan.check_crossings()?;
        let rotation = plan.sorted_neighbors()?;
        Ok(PlanGraph { rotation, ..plan })
    }

    fn check_coincident_joints(&self, tol_ft: f64) -> DesignResult<()> {
        let nodes: Vec<NodeIndex> = self.graph.node_indices().collect();
        for (k, a) in nodes.iter().enumerate() {
            for b in &nodes[k + 1..] {
                let (na, nb) = (&self.graph[*a], &self.graph[*b]);
                if na.point.approx_eq(&nb.point, tol_ft) {
                    return Err(DesignError::geometry(
                        GeometryErrorKind::Degenerate,
                        "distinct joints share a plan location on one level",
                        vec![],
                        vec![na.joint.to_string(), nb.joint.to_string()],
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_crossings(&self) -> DesignResult<()> {
        let edges: Vec<_> = self.graph.edge_references().collect();
        for (k, e1) in edges.iter().enumerate() {
            for e2 in &edges[k + 1..] {
                let shares_joint = [e1.source(), e1.target()]
                    .iter()
                    .any(|n| *n == e2.source() || *n == e2.target());
                if shares_joint {
                    continue;
                }
                let (a, b) = (self.graph[e1.source()].point, self.graph[e1.target()].point);
                let (c, d) = (self.graph[e2.source()].point, self.graph[e2.target()].point);
                if segments_intersect(&a, &b, &c, &d, CROSSING_TOL) {
                    return Err(DesignError::geometry(
                        GeometryErrorKind::Degenerate,
                        "beams cross or touch without a shared joint",
                        vec![e1.weight().to_string(), e2.weight().to_string()],
                        vec![],
                    ));
                }
            }
        }
        Ok(())
    }

    fn sorted_neighbors(&self) -> DesignResult<Vec<Vec<NodeIndex>>> {
        let mut rotation = Vec::with_capacity(self.graph.node_count());
        for node in self.graph.node_indices() {
            let origin = self.graph[node].point;
            let mut around: Vec<(f64, NodeIndex)> = self
                .graph
                .neighbors(node)
                .map(|n| (origin.angle_to(&self.graph[n].point), n))
                .collect();
            around.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            for pair in around.windows(2) {
                if (pair[1].0 - pair[0].0).abs() < OVERLAP_TOL_RAD {
                    return Err(DesignError::geometry(
                        GeometryErrorKind::Degenerate,
                        "beams overlap along the same line",
                        vec![self.frame_between(node, pair[0].1), self.frame_between(node, pair[1].1)],
                        vec![self.graph[node].joint.to_string()],
                    ));
                }
            }
            rotation.push(around.into_iter().map(|(_, n)| n).collect());
        }
        Ok(rotation)
    }

    fn frame_between(&self, a: NodeIndex, b: NodeIndex) -> String {
        self.graph
            .find_edge(a, b)
            .map(|e| self.graph[e].to_string())
            .unwrap_or_default()
    }

    fn point(&self, n: NodeIndex) -> PlanPoint {
        self.graph[n].point
    }

    /// Trace every face by walking half-edges.
    fn faces(&self) -> DesignResult<Vec<Face>> {
        let limit = 2 * self.graph.edge_count() + 1;
        let mut visited: HashSet<HalfEdge> = HashSet::new();
        let mut faces = Vec::new();

        for u in self.graph.node_indices() {
            for &v in &self.rotation[u.index()] {
                let start = (u, v);
                if visited.contains(&start) {
                    continue;
                }
                let mut half_edges = Vec::new();
                let mut current = start;
                loop {
                    visited.insert(current);
                    half_edges.push(current);
                    let (from, at) = current;
                    let around = &self.rotation[at.index()];
                    let back = around.iter().position(|n| *n == from).ok_or_else(|| {
                        DesignError::geometry(
                            GeometryErrorKind::Degenerate,
                            "neighbor order is missing a beam end",
                            vec![self.frame_between(from, at)],
                            vec![self.graph[from].joint.to_string(), self.graph[at].joint.to_string()],
                        )
                    })?;
                    let next = around[(back + around.len() - 1) % around.len()];
                    current = (at, next);
                    if current == start {
                        break;
                    }
                    if half_edges.len() > limit {
                        return Err(DesignError::geometry(
                            GeometryErrorKind::Degenerate,
                            "face traversal did not close",
                            vec![],
                            vec![self.graph[u].joint.to_string()],
                        ));
                    }
                }
                let points: Vec<PlanPoint> = half_edges.iter().map(|(a, _)| self.point(*a)).collect();
                faces.push(Face {
                    area: signed_area(&points),
                    half_edges,
                });
            }
        }
        Ok(faces)
    }
}

/// Detect loadable regions among `beams` (all at one level).
pub fn detect_areas(model: &StructuralModel, beams: &[FrameId], tol_ft: f64) -> DesignResult<LevelPlan> {
    if beams.is_empty() {
        return Ok(LevelPlan::default());
    }
    let plan = PlanGraph::build(model, beams, tol_ft)?;
    let faces = plan.faces()?;

    reject_bridges(&plan, &faces)?;

    // Connected components
    let mut components = UnionFind::new(plan.graph.node_count());
    for edge in plan.graph.edge_references() {
        components.union(edge.source().index(), edge.target().index());
    }
    let component_of = |face: &Face| components.find(face.half_edges[0].0.index());

    let area_eps = tol_ft * tol_ft;
    let mut bounded: Vec<usize> = Vec::new();
    let mut outer: BTreeMap<usize, usize> = BTreeMap::new();
    for (idx, face) in faces.iter().enumerate() {
        if face.area > area_eps {
            ensure_simple(&plan, face)?;
            bounded.push(idx);
        } else if outer.insert(component_of(face), idx).is_some() {
            return Err(DesignError::geometry(
                GeometryErrorKind::UnenclosedRegion,
                "component has more than one outer boundary",
                face_frames(&plan, face),
                vec![],
            ));
        }
    }

    // Nesting: the smallest bounded face of another component containing
    // a component's first vertex is its parent.
    let mut parent: BTreeMap<usize, usize> = BTreeMap::new();
    for (&comp, &outer_face) in &outer {
        let sample = plan.point(faces[outer_face].half_edges[0].0);
        let container = bounded
            .iter()
            .filter(|&&f| component_of(&faces[f]) != comp)
            .filter(|&&f| contains_point(&face_points(&plan, &faces[f]), &sample))
            .min_by(|&&a, &&b| faces[a].area.total_cmp(&faces[b].area));
        if let Some(&f) = container {
            parent.insert(comp, f);
        }
    }
    let depth = |comp: usize| -> usize {
        let mut d = 0;
        let mut c = comp;
        while let Some(&f) = parent.get(&c) {
            d += 1;
            c = component_of(&faces[f]);
            if d > outer.len() {
                break;
            }
        }
        d
    };

    let mut holes: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (&comp, &f) in &parent {
        if depth(comp) % 2 == 1 {
            if let Some(&hole_face) = outer.get(&comp) {
                holes.entry(f).or_default().push(hole_face);
            }
        }
    }

    let mut areas = Vec::new();
    let mut openings = 0;
    for &f in &bounded {
        if depth(component_of(&faces[f])) % 2 == 1 {
            openings += 1;
            continue;
        }
        let hole_faces = holes.get(&f).map(Vec::as_slice).unwrap_or(&[]);
        areas.push(build_area(&plan, &faces[f], hole_faces.iter().map(|h| &faces[*h])));
    }
    areas.sort_by(|a, b| {
        let (ca, cb) = (centroid(&a.coordinates), centroid(&b.coordinates));
        round6(ca.y)
            .total_cmp(&round6(cb.y))
            .then(round6(ca.x).total_cmp(&round6(cb.x)))
            .then_with(|| a.outline.cmp(&b.outline))
    });

    let mut footprint = Vec::new();
    for (&comp, &f) in &outer {
        if depth(comp) == 0 {
            for (a, b) in &faces[f].half_edges {
                footprint.push(PlanSegment {
                    frame: FrameId::from(plan.frame_between(*a, *b)),
                    start: plan.point(*a),
                    end: plan.point(*b),
                });
            }
        }
    }

    Ok(LevelPlan {
        areas,
        footprint,
        openings,
    })
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

fn face_points(plan: &PlanGraph, face: &Face) -> Vec<PlanPoint> {
    face.half_edges.iter().map(|(a, _)| plan.point(*a)).collect()
}

fn face_frames(plan: &PlanGraph, face: &Face) -> Vec<String> {
    let set: BTreeSet<String> = face.half_edges.iter().map(|(a, b)| plan.frame_between(*a, *b)).collect();
    set.into_iter().collect()
}

/// A beam with the same face on both sides encloses nothing.
fn reject_bridges(plan: &PlanGraph, faces: &[Face]) -> DesignResult<()> {
    let mut frames = BTreeSet::new();
    let mut joints = BTreeSet::new();
    for face in faces {
        let walked: HashSet<&HalfEdge> = face.half_edges.iter().collect();
        for (a, b) in &face.half_edges {
            if walked.contains(&(*b, *a)) {
                frames.insert(plan.frame_between(*a, *b));
                joints.insert(plan.graph[*a].joint.to_string());
            }
        }
    }
    if frames.is_empty() {
        return Ok(());
    }
    Err(DesignError::geometry(
        GeometryErrorKind::UnenclosedRegion,
        "beams do not bound a closed region on both sides (dangling or bridging beams)",
        frames.into_iter().collect(),
        joints.into_iter().collect(),
    ))
}

fn ensure_simple(plan: &PlanGraph, face: &Face) -> DesignResult<()> {
    let mut seen = HashSet::new();
    for (a, _) in &face.half_edges {
        if !seen.insert(*a) {
            return Err(DesignError::geometry(
                GeometryErrorKind::UnenclosedRegion,
                "region boundary is not a simple polygon",
                face_frames(plan, face),
                vec![plan.graph[*a].joint.to_string()],
            ));
        }
    }
    Ok(())
}

fn build_area<'a>(plan: &PlanGraph, face: &Face, hole_faces: impl Iterator<Item = &'a Face>) -> DetectedArea {
    // rotate so the outline starts at the smallest joint id
    let nodes: Vec<NodeIndex> = face.half_edges.iter().map(|(a, _)| *a).collect();
    let start = (0..nodes.len())
        .min_by(|&i, &j| plan.graph[nodes[i]].joint.cmp(&plan.graph[nodes[j]].joint))
        .unwrap_or(0);
    let ordered: Vec<NodeIndex> = nodes[start..].iter().chain(nodes[..start].iter()).copied().collect();

    let outline: Vec<JointId> = ordered.iter().map(|n| plan.graph[*n].joint.clone()).collect();
    let coordinates: Vec<PlanPoint> = ordered.iter().map(|n| plan.point(*n)).collect();

    let mut boundary_beams: Vec<FrameId> = Vec::new();
    let mut push_beam = |frame: String| {
        let id = FrameId::from(frame);
        if !boundary_beams.contains(&id) {
            boundary_beams.push(id);
        }
    };
    for (a, b) in &face.half_edges {
        push_beam(plan.frame_between(*a, *b));
    }

    let mut holes = Vec::new();
    let mut hole_area = 0.0;
    for hole in hole_faces {
        let mut points = face_points(plan, hole);
        points.reverse();
        hole_area += signed_area(&points).abs();
        holes.push(points);
        for (a, b) in &hole.half_edges {
            push_beam(plan.frame_between(*a, *b));
        }
    }

    DetectedArea {
        local_axis_deg: shortest_edge_angle(&coordinates),
        gross_area_sqft: face.area,
        net_area_sqft: face.area - hole_area,
        outline,
        coordinates,
        holes,
        boundary_beams,
    }
}

/// Direction of the shortest polygon edge in degrees, normalized to [0, 360)
pub fn shortest_edge_angle(points: &[PlanPoint]) -> f64 {
    let n = points.len();
    let mut best: Option<(f64, f64)> = None;
    for i in 0..n {
        let (a, b) = (points[i], points[(i + 1) % n]);
        let len = a.distance(&b);
        if best.map_or(true, |(l, _)| len < l - 1e-9) {
            best = Some((len, a.angle_to(&b).to_degrees()));
        }
    }
    best.map(|(_, angle)| angle.rem_euclid(360.0)).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Point3;

    fn add_beam(model: &mut StructuralModel, a: &str, b: &str) -> FrameId {
        let id = format!("B-{}-{}", a, b);
        model.add_frame(id.as_str(), a, b).unwrap()
    }

    fn square_model(size: f64) -> (StructuralModel, Vec<FrameId>) {
        let mut model = StructuralModel::new();
        let pts = [("A", 0.0, 0.0), ("B", size, 0.0), ("C", size, size), ("D", 0.0, size)];
        for (id, x, y) in pts {
            model.add_joint(id, Point3::new(x, y, 10.0)).unwrap();
        }
        let beams = vec![
            add_beam(&mut model, "A", "B"),
            add_beam(&mut model, "B", "C"),
            add_beam(&mut model, "C", "D"),
            add_beam(&mut model, "D", "A"),
        ];
        (model, beams)
    }

    #[test]
    fn test_single_bay() {
        let (model, beams) = square_model(20.0);
        let plan = detect_areas(&model, &beams, 0.01).unwrap();
        assert_eq!(plan.areas.len(), 1);
        let area = &plan.areas[0];
        assert_eq!(area.gross_area_sqft, 400.0);
        assert_eq!(area.outline[0].as_str(), "A");
        assert_eq!(area.boundary_beams.len(), 4);
        assert_eq!(plan.footprint.len(), 4);
    }

    #[test]
    fn test_dangling_beam_rejected() {
        let (mut model, mut beams) = square_model(20.0);
        model.add_joint("E", Point3::new(30.0, 0.0, 10.0)).unwrap();
        beams.push(add_beam(&mut model, "B", "E"));
        match detect_areas(&model, &beams, 0.01).unwrap_err() {
            DesignError::Geometry { kind, frames, .. } => {
                assert_eq!(kind, GeometryErrorKind::UnenclosedRegion);
                assert_eq!(frames, vec!["B-B-E".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_crossing_beams_rejected() {
        let (mut model, mut beams) = square_model(20.0);
        beams.push(add_beam(&mut model, "A", "C"));
        beams.push(add_beam(&mut model, "B", "D"));
        let err = detect_areas(&model, &beams, 0.01).unwrap_err();
        match err {
            DesignError::Geometry { kind, .. } => assert_eq!(kind, GeometryErrorKind::Degenerate),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_nested_opening_becomes_hole() {
        let (mut model, mut beams) = square_model(30.0);
        let inner = [("E", 10.0, 10.0), ("F", 20.0, 10.0), ("G", 20.0, 20.0), ("H", 10.0, 20.0)];
        for (id, x, y) in inner {
            model.add_joint(id, Point3::new(x, y, 10.0)).unwrap();
        }
        for (a, b) in [("E", "F"), ("F", "G"), ("G", "H"), ("H", "E")] {
            beams.push(add_beam(&mut model, a, b));
        }
        let plan = detect_areas(&model, &beams, 0.01).unwrap();
        assert_eq!(plan.areas.len(), 1);
        assert_eq!(plan.openings, 1);
        let area = &plan.areas[0];
        assert_eq!(area.holes.len(), 1);
        assert_eq!(area.gross_area_sqft, 900.0);
        assert_eq!(area.net_area_sqft, 800.0);
        assert_eq!(area.boundary_beams.len(), 8);
        // hole edges are not part of the footprint
        assert_eq!(plan.footprint.len(), 4);
    }

    #[test]
    fn test_inconsistent_neighbor_order_is_degenerate() {
        let (model, beams) = square_model(20.0);
        let mut plan = PlanGraph::build(&model, &beams, 0.01).unwrap();
        // B no longer lists A, so the walk A→B cannot turn
        plan.rotation[1].retain(|n| n.index() != 0);
        match plan.faces() {
            Err(DesignError::Geometry { kind, frames, joints, .. }) => {
                assert_eq!(kind, GeometryErrorKind::Degenerate);
                assert_eq!(frames, vec!["B-A-B".to_string()]);
                assert_eq!(joints, vec!["A".to_string(), "B".to_string()]);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("traversal accepted a broken neighbor order"),
        }
    }

    #[test]
    fn test_shortest_edge_angle() {
        let rect = [
            PlanPoint::new(0.0, 0.0),
            PlanPoint::new(30.0, 0.0),
            PlanPoint::new(30.0, 10.0),
            PlanPoint::new(0.0, 10.0),
        ];
        assert_eq!(shortest_edge_angle(&rect), 90.0);
    }
}
