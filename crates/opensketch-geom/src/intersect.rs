//! Indexed pairwise intersection solvers for curve pairs.
//!
//! Every pair of curve kinds has a fixed number of solution slots
//! (1 for segment x segment, 2 otherwise), and each slot keeps a stable
//! identity as the geometry moves: for pairs involving a segment the slots
//! are ordered by the segment's line parameter, for arc x arc by the two
//! sides of the center line. A slot resolves to `None` while its solution
//! does not exist or falls outside the segment span / angular sweep.

use kurbo::{Point, Vec2};

use crate::curve::{Arc, Curve, Segment};

/// Tolerance for segment-span membership; endpoints count as on-span.
const SPAN_EPS: f64 = 1e-9;

/// Number of solution slots for a pair of curve kinds.
pub fn solution_count(a: &Curve, b: &Curve) -> usize {
    match (a, b) {
        (Curve::Segment(_), Curve::Segment(_)) => 1,
        _ => 2,
    }
}

/// The intersection point at the given solution slot, if it currently
/// exists. Never panics on degenerate input; parallel segments,
/// disjoint, contained, or concentric circles yield `None` at every slot.
///
/// Tangency makes both slots of an arc pair resolve to the same point;
/// the slots are deliberately not merged.
pub fn intersection(a: &Curve, b: &Curve, index: usize) -> Option<Point> {
    if index >= solution_count(a, b) {
        return None;
    }
    match (a, b) {
        (Curve::Segment(s1), Curve::Segment(s2)) => segment_segment(s1, s2),
        (Curve::Segment(s), Curve::Arc(c)) => segment_arc(s, c, index),
        (Curve::Arc(c), Curve::Segment(s)) => segment_arc(s, c, index),
        (Curve::Arc(c1), Curve::Arc(c2)) => arc_arc(c1, c2, index),
    }
}

fn on_span(t: f64) -> bool {
    (-SPAN_EPS..=1.0 + SPAN_EPS).contains(&t)
}

fn segment_segment(s1: &Segment, s2: &Segment) -> Option<Point> {
    let d1 = s1.direction();
    let d2 = s2.direction();
    let cross = d1.cross(d2);
    if cross.abs() < 1e-12 {
        // Parallel or collinear: no point solution.
        return None;
    }
    let d = s2.start - s1.start;
    let t = d.cross(d2) / cross;
    let u = d.cross(d1) / cross;
    if !on_span(t) || !on_span(u) {
        return None;
    }
    Some(s1.point_at(t))
}

/// Line-circle quadratic; slot 0 is the smaller line parameter.
fn segment_arc(seg: &Segment, arc: &Arc, index: usize) -> Option<Point> {
    let d = seg.direction();
    let f = seg.start - arc.center;
    let a = d.dot(d);
    if a < 1e-18 {
        return None;
    }
    let b = 2.0 * f.dot(d);
    let c = f.dot(f) - arc.radius * arc.radius;
    let disc = b * b - 4.0 * a * c;
    if disc < -1e-9 {
        return None;
    }
    // Clamp a tangent's tiny negative discriminant to a double root, so
    // both slots resolve to the same point.
    let sqrt_disc = disc.max(0.0).sqrt();
    let t = if index == 0 {
        (-b - sqrt_disc) / (2.0 * a)
    } else {
        (-b + sqrt_disc) / (2.0 * a)
    };
    if !on_span(t) {
        return None;
    }
    let pt = seg.point_at(t);
    if !arc.contains_point(pt) {
        return None;
    }
    Some(pt)
}

/// Circle-circle radical line; slot 0 is the `+perp` side of the center
/// vector from the first arc to the second.
fn arc_arc(a1: &Arc, a2: &Arc, index: usize) -> Option<Point> {
    let d_vec = a2.center - a1.center;
    let d = d_vec.hypot();
    if d < 1e-9 {
        // Concentric, including coincident circles.
        return None;
    }
    if d > a1.radius + a2.radius + 1e-9 {
        return None;
    }
    if d < (a1.radius - a2.radius).abs() - 1e-9 {
        return None;
    }
    let a = (a1.radius * a1.radius - a2.radius * a2.radius + d * d) / (2.0 * d);
    let h = (a1.radius * a1.radius - a * a).max(0.0).sqrt();
    let base = a1.center + d_vec * (a / d);
    let perp = Vec2::new(-d_vec.y / d, d_vec.x / d);
    let pt = if index == 0 {
        base + perp * h
    } else {
        base - perp * h
    };
    if !a1.contains_point(pt) || !a2.contains_point(pt) {
        return None;
    }
    Some(pt)
}
