//! Segment and arc primitives and the closed `Curve` union over them.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

use crate::angle::{angle_in_sweep, normalize_angle, sweep_between, sweep_ratio};

/// A straight segment between two points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        (self.end - self.start).hypot()
    }

    pub fn direction(&self) -> Vec2 {
        self.end - self.start
    }

    /// Point at parameter `t`, where 0 is `start` and 1 is `end`.
    pub fn point_at(&self, t: f64) -> Point {
        self.start + (self.end - self.start) * t
    }

    /// Projection ratio of `p` onto the carrier line.
    ///
    /// Returns 0 for a degenerate (zero-length) segment.
    pub fn param_of(&self, p: Point) -> f64 {
        let d = self.end - self.start;
        let len_sq = d.dot(d);
        if len_sq < 1e-12 {
            return 0.0;
        }
        (p - self.start).dot(d) / len_sq
    }
}

/// A circular arc: a circle plus a start angle and a positive CCW sweep.
///
/// The sweep is always the normalized positive angle from the start
/// direction to the end direction; there is no complementary-arc option.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub center: Point,
    pub radius: f64,
    pub start_angle: f64,
    pub sweep: f64,
}

impl Arc {
    pub fn new(center: Point, radius: f64, start_angle: f64, sweep: f64) -> Self {
        Self {
            center,
            radius,
            start_angle: normalize_angle(start_angle),
            sweep: normalize_angle(sweep),
        }
    }

    /// Derive an arc from a center and two points.
    ///
    /// The radius comes from `|start - center|`; the end point only
    /// contributes a direction. Returns `None` when either point coincides
    /// with the center, since no direction exists there.
    pub fn from_points(center: Point, start: Point, end: Point) -> Option<Self> {
        let sv = start - center;
        let ev = end - center;
        let radius = sv.hypot();
        if radius < 1e-9 || ev.hypot() < 1e-9 {
            return None;
        }
        let start_angle = normalize_angle(sv.atan2());
        let sweep = sweep_between(start_angle, ev.atan2());
        Some(Self {
            center,
            radius,
            start_angle,
            sweep,
        })
    }

    pub fn end_angle(&self) -> f64 {
        normalize_angle(self.start_angle + self.sweep)
    }

    pub fn point_at_angle(&self, angle: f64) -> Point {
        self.center + Vec2::new(angle.cos(), angle.sin()) * self.radius
    }

    pub fn start_point(&self) -> Point {
        self.point_at_angle(self.start_angle)
    }

    pub fn end_point(&self) -> Point {
        self.point_at_angle(self.end_angle())
    }

    /// Direction angle from the center to `p`, normalized to `[0, 2π)`.
    pub fn angle_of(&self, p: Point) -> f64 {
        normalize_angle((p - self.center).atan2())
    }

    pub fn contains_angle(&self, angle: f64) -> bool {
        angle_in_sweep(angle, self.start_angle, self.sweep)
    }

    /// Whether the direction to `p` falls inside the angular sweep.
    pub fn contains_point(&self, p: Point) -> bool {
        self.contains_angle(self.angle_of(p))
    }

    /// Point at parameter `t`, where 0 is the sweep start and 1 the end.
    pub fn point_at(&self, t: f64) -> Point {
        self.point_at_angle(self.start_angle + self.sweep * t)
    }

    /// Angle-ratio parameter of `p` along the sweep, clamped to `[0, 1]`.
    pub fn param_of(&self, p: Point) -> f64 {
        sweep_ratio(self.angle_of(p), self.start_angle, self.sweep)
    }
}

/// The two curve kinds that can bound a face.
///
/// A closed union so that arrangement code is written once against the
/// shared parametrization instead of per-kind type tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Curve {
    Segment(Segment),
    Arc(Arc),
}

impl Curve {
    /// Point at the curve-intrinsic parameter `t` in `[0, 1]`.
    pub fn point_at(&self, t: f64) -> Point {
        match self {
            Curve::Segment(s) => s.point_at(t),
            Curve::Arc(a) => a.point_at(t),
        }
    }

    /// Curve-intrinsic parameter of `p`: projection ratio for segments,
    /// angle ratio for arcs.
    pub fn param_of(&self, p: Point) -> f64 {
        match self {
            Curve::Segment(s) => s.param_of(p),
            Curve::Arc(a) => a.param_of(p),
        }
    }
}
