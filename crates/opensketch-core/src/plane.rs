//! Planar face extraction.
//!
//! A batch pass over the graph's valid-definition snapshot: cluster
//! coincident intersection points into arrangement vertices, split every
//! curve into edges between consecutive vertices along it, then trace
//! closed face boundaries. Faces are rebuilt from scratch on every call;
//! they are not graph nodes.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::TAU;

use kurbo::Point;
use serde::{Deserialize, Serialize};

use opensketch_geom::angle::normalize_angle;
use opensketch_geom::Curve;

use crate::definition::{DefinitionId, DefinitionKind};
use crate::graph::SketchGraph;
use crate::spatial::PointIndex;

/// Squared distance under which two intersection points share one
/// arrangement vertex.
const CLUSTER_DIST_SQ: f64 = 1e-20;

/// Minimum signed area for a traced cycle to count as a face; the
/// unbounded outer cycle comes out negative and is dropped here too.
const AREA_EPS: f64 = 1e-12;

/// Parameter fraction used to probe a curve's departure direction just
/// off a vertex.
const PROBE_RATIO: f64 = 1e-4;

/// One closed face: cyclic curve and vertex sequences, where `curves[i]`
/// runs from `points[i]` to `points[(i + 1) % len]`. Each vertex is the
/// representative intersection definition of its cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneDefinition {
    pub curves: Vec<DefinitionId>,
    pub points: Vec<DefinitionId>,
}

/// An arrangement vertex: one or more coincident intersection points.
#[derive(Debug)]
struct IntersectionNode {
    point: Point,
    representative: DefinitionId,
    members: Vec<DefinitionId>,
    edges: Vec<usize>,
}

/// One curve's sub-span between two consecutive vertices along it, with
/// one traversal flag per direction.
#[derive(Debug)]
struct CurveEdge {
    curve_id: DefinitionId,
    curve: Curve,
    /// Vertex indices, ordered by the curve parameter.
    nodes: [usize; 2],
    /// Curve parameters of the two vertices.
    params: [f64; 2],
    /// `visited[0]`: traversed from `nodes[0]` to `nodes[1]`.
    visited: [bool; 2],
}

/// Extract every closed face bounded by the currently valid curves and
/// their intersection points.
pub fn extract_planes(graph: &SketchGraph) -> Vec<PlaneDefinition> {
    let mut arrangement = Arrangement::build(graph);
    log::debug!(
        "arrangement has {} vertices and {} edges",
        arrangement.nodes.len(),
        arrangement.edges.len()
    );
    let planes = arrangement.trace();
    log::info!("extracted {} planes", planes.len());
    planes
}

struct Arrangement {
    nodes: Vec<IntersectionNode>,
    edges: Vec<CurveEdge>,
}

impl Arrangement {
    fn build(graph: &SketchGraph) -> Self {
        let valid = graph.valid_definitions();
        let mut curve_map: HashMap<DefinitionId, Curve> = HashMap::new();
        for def in &valid {
            if let Some(curve) = def.curve_value() {
                curve_map.insert(def.id, curve);
            }
        }

        // Cluster intersection points into vertices and register each
        // vertex against both parent curves.
        let mut nodes: Vec<IntersectionNode> = Vec::new();
        let mut seeds = PointIndex::new();
        let mut curve_nodes: BTreeMap<DefinitionId, Vec<usize>> = BTreeMap::new();
        for def in &valid {
            let DefinitionKind::Intersection { first, second, .. } = *def.kind() else {
                continue;
            };
            let Some(p) = def.point_value() else {
                continue;
            };
            let node_idx = match seeds.nearest_within(p, CLUSTER_DIST_SQ) {
                Some(i) => {
                    nodes[i].members.push(def.id);
                    i
                }
                None => {
                    let i = nodes.len();
                    seeds.insert(p, i);
                    nodes.push(IntersectionNode {
                        point: p,
                        representative: def.id,
                        members: vec![def.id],
                        edges: Vec::new(),
                    });
                    i
                }
            };
            for parent in [first, second] {
                if curve_map.contains_key(&parent) {
                    let list = curve_nodes.entry(parent).or_default();
                    if !list.contains(&node_idx) {
                        list.push(node_idx);
                    }
                }
            }
        }

        // Edge-ize: one edge per consecutive vertex pair along each
        // curve. Curves with fewer than two vertices bound nothing.
        let mut edges: Vec<CurveEdge> = Vec::new();
        for (curve_id, node_ids) in &curve_nodes {
            if node_ids.len() < 2 {
                continue;
            }
            let Some(curve) = curve_map.get(curve_id).copied() else {
                continue;
            };
            let mut ordered: Vec<(f64, usize)> = node_ids
                .iter()
                .map(|&n| (curve.param_of(nodes[n].point), n))
                .collect();
            ordered.sort_by(|a, b| a.0.total_cmp(&b.0));
            for pair in ordered.windows(2) {
                let (t0, n0) = pair[0];
                let (t1, n1) = pair[1];
                if n0 == n1 {
                    continue;
                }
                let e = edges.len();
                edges.push(CurveEdge {
                    curve_id: *curve_id,
                    curve,
                    nodes: [n0, n1],
                    params: [t0, t1],
                    visited: [false, false],
                });
                nodes[n0].edges.push(e);
                nodes[n1].edges.push(e);
            }
        }

        Self { nodes, edges }
    }

    fn trace(&mut self) -> Vec<PlaneDefinition> {
        let mut planes = Vec::new();
        for edge in 0..self.edges.len() {
            for dir in 0..2 {
                if self.edges[edge].visited[dir] {
                    continue;
                }
                if let Some(walk) = self.trace_face(edge, dir) {
                    if let Some(plane) = self.materialize(&walk) {
                        planes.push(plane);
                    }
                }
            }
        }
        planes
    }

    /// Walk half-edges from the start until the boundary closes, marking
    /// each as traversed. Returns the walk as (edge, direction) pairs.
    fn trace_face(&mut self, start_edge: usize, start_dir: usize) -> Option<Vec<(usize, usize)>> {
        let mut walk: Vec<(usize, usize)> = Vec::new();
        let (mut edge, mut dir) = (start_edge, start_dir);
        loop {
            if self.edges[edge].visited[dir] {
                if (edge, dir) == (start_edge, start_dir) && !walk.is_empty() {
                    return Some(walk);
                }
                // Angular ties can merge orbits; abandon the walk rather
                // than steal half-edges from another face.
                log::warn!("face trace hit a consumed half-edge, abandoning walk");
                return None;
            }
            self.edges[edge].visited[dir] = true;
            walk.push((edge, dir));
            let arrival = if dir == 0 {
                self.edges[edge].nodes[1]
            } else {
                self.edges[edge].nodes[0]
            };
            let (next_edge, next_dir) = self.next_half_edge(edge, dir, arrival);
            edge = next_edge;
            dir = next_dir;
        }
    }

    /// The half-edge that continues the face boundary after arriving at
    /// vertex `at`: straight through at degree 2, otherwise the next edge
    /// clockwise from the arrival back-direction, which keeps the face
    /// interior on the left.
    fn next_half_edge(&self, edge: usize, dir: usize, at: usize) -> (usize, usize) {
        let node = &self.nodes[at];
        if node.edges.len() == 1 {
            // Dead end: bounce back along the same edge.
            return (edge, 1 - dir);
        }
        if node.edges.len() == 2 {
            // Degree-2 contraction: extend through the other edge.
            let other = if node.edges[0] == edge {
                node.edges[1]
            } else {
                node.edges[0]
            };
            return (other, self.departing_dir(other, at));
        }
        let back = self.departure_angle(edge, at);
        let mut best = edge;
        let mut best_offset = f64::INFINITY;
        for &candidate in &node.edges {
            if candidate == edge {
                continue;
            }
            let alpha = self.departure_angle(candidate, at);
            let mut offset = normalize_angle(back - alpha);
            if offset < 1e-12 {
                // Departs exactly along the arrival direction; take it
                // only as a last resort.
                offset = TAU;
            }
            if offset < best_offset {
                best_offset = offset;
                best = candidate;
            }
        }
        if best == edge {
            return (edge, 1 - dir);
        }
        (best, self.departing_dir(best, at))
    }

    fn departing_dir(&self, edge: usize, at: usize) -> usize {
        if self.edges[edge].nodes[0] == at {
            0
        } else {
            1
        }
    }

    /// Direction in which `edge` leaves vertex `at`, measured by probing
    /// the curve a small parameter step into the edge.
    fn departure_angle(&self, edge: usize, at: usize) -> f64 {
        let e = &self.edges[edge];
        let (t_here, t_other) = if e.nodes[0] == at {
            (e.params[0], e.params[1])
        } else {
            (e.params[1], e.params[0])
        };
        let probe = e.curve.point_at(t_here + (t_other - t_here) * PROBE_RATIO);
        (probe - self.nodes[at].point).atan2()
    }

    /// Turn a closed walk into a face, keeping only positive-area cycles.
    /// The signed area is the chord shoelace plus a circular-segment
    /// correction per arc edge, so arc-only faces classify correctly.
    fn materialize(&self, walk: &[(usize, usize)]) -> Option<PlaneDefinition> {
        if walk.len() < 2 {
            return None;
        }
        let mut area = 0.0;
        let mut curves = Vec::with_capacity(walk.len());
        let mut points = Vec::with_capacity(walk.len());
        for &(e, dir) in walk {
            let edge = &self.edges[e];
            let (from, to) = if dir == 0 {
                (edge.nodes[0], edge.nodes[1])
            } else {
                (edge.nodes[1], edge.nodes[0])
            };
            let a = self.nodes[from].point;
            let b = self.nodes[to].point;
            area += 0.5 * (a.x * b.y - b.x * a.y);
            if let Curve::Arc(arc) = edge.curve {
                let (t0, t1) = if dir == 0 {
                    (edge.params[0], edge.params[1])
                } else {
                    (edge.params[1], edge.params[0])
                };
                let dtheta = arc.sweep * (t1 - t0);
                area += 0.5 * arc.radius * arc.radius * (dtheta - dtheta.sin());
            }
            curves.push(edge.curve_id);
            points.push(self.nodes[from].representative);
        }
        if area <= AREA_EPS {
            return None;
        }
        Some(PlaneDefinition { curves, points })
    }
}
