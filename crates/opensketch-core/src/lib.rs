//! # OpenSketch Core
//!
//! Reactive geometric-definition graph and planar face extraction.
//!
//! A sketch is a dependency graph of derived geometric entities: points,
//! segments, arcs, and their pairwise intersections. The graph propagates
//! validity as leaves change, and a batch pass reconstructs the closed
//! planar regions ("planes") bounded by the currently valid curves and
//! their intersection points.
//!
//! This crate is the heart of the OpenSketch kernel; the pure curve
//! algebra lives in `opensketch-geom`.

pub mod definition;
pub mod graph;
pub mod plane;
pub mod spatial;

pub use definition::{
    DefinitionId, DefinitionKind, GeometryDefinition, GeometryValue, IntersectionIndex,
    IntersectionKey, InvalidIndex,
};
pub use graph::{ChangeListener, GraphError, SketchGraph};
pub use plane::{extract_planes, PlaneDefinition};
