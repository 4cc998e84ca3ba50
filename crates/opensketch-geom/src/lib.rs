//! # OpenSketch Geom
//!
//! Pure 2D curve toolkit used by the sketch kernel: segment and arc
//! primitives, angle normalization and sweep arithmetic, and indexed
//! pairwise intersection solvers.
//!
//! Everything here is a side-effect-free function over immutable values;
//! the reactive definition graph lives in `opensketch-core`.

pub mod angle;
pub mod curve;
pub mod intersect;

pub use curve::{Arc, Curve, Segment};
