//! Definition nodes: one geometric value each, plus the fixed dependency
//! list, computed validity, and dependency depth that drive recomputation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use kurbo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use opensketch_geom::{Arc, Curve, Segment};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable unique handle of a definition in the sketch graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DefinitionId(pub u64);

impl DefinitionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Make sure freshly allocated ids stay above `id`, e.g. after loading
    /// a serialized graph.
    pub(crate) fn reserve_through(id: u64) {
        NEXT_ID.fetch_max(id + 1, Ordering::Relaxed);
    }
}

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which of the up to two intersection solutions a definition selects.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum IntersectionIndex {
    First,
    Second,
}

impl IntersectionIndex {
    pub fn as_usize(self) -> usize {
        match self {
            IntersectionIndex::First => 0,
            IntersectionIndex::Second => 1,
        }
    }
}

/// Caller-contract violation: an intersection index outside `{0, 1}`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("intersection index {0} is outside {{0, 1}}")]
pub struct InvalidIndex(pub u8);

impl TryFrom<u8> for IntersectionIndex {
    type Error = InvalidIndex;

    fn try_from(value: u8) -> Result<Self, InvalidIndex> {
        match value {
            0 => Ok(IntersectionIndex::First),
            1 => Ok(IntersectionIndex::Second),
            other => Err(InvalidIndex(other)),
        }
    }
}

/// The variant of a definition node and its fixed inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DefinitionKind {
    /// A free leaf point. The position is the only mutable input of the
    /// whole graph.
    Point { position: Point },
    /// A segment between two point definitions.
    Segment {
        start: DefinitionId,
        end: DefinitionId,
    },
    /// An arc from a center and two point definitions; the radius comes
    /// from the start point, the end point only gives a direction.
    Arc {
        center: DefinitionId,
        start: DefinitionId,
        end: DefinitionId,
    },
    /// One solution of the pairwise intersection of two curve definitions.
    /// Parents are kept in ascending-id order so the slot identity does
    /// not depend on insertion order.
    Intersection {
        first: DefinitionId,
        second: DefinitionId,
        index: IntersectionIndex,
    },
}

impl DefinitionKind {
    /// The fixed, ordered dependency list of this variant.
    pub fn dependencies(&self) -> Vec<DefinitionId> {
        match *self {
            DefinitionKind::Point { .. } => Vec::new(),
            DefinitionKind::Segment { start, end } => vec![start, end],
            DefinitionKind::Arc { center, start, end } => vec![center, start, end],
            DefinitionKind::Intersection { first, second, .. } => vec![first, second],
        }
    }

    /// Whether this definition yields a point value.
    pub fn is_point(&self) -> bool {
        matches!(
            self,
            DefinitionKind::Point { .. } | DefinitionKind::Intersection { .. }
        )
    }

    /// Whether this definition yields a curve value.
    pub fn is_curve(&self) -> bool {
        matches!(self, DefinitionKind::Segment { .. } | DefinitionKind::Arc { .. })
    }
}

/// The computed value of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GeometryValue {
    Point(Point),
    Segment(Segment),
    Arc(Arc),
}

impl GeometryValue {
    pub fn as_point(&self) -> Option<Point> {
        match self {
            GeometryValue::Point(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_curve(&self) -> Option<Curve> {
        match self {
            GeometryValue::Segment(s) => Some(Curve::Segment(*s)),
            GeometryValue::Arc(a) => Some(Curve::Arc(*a)),
            GeometryValue::Point(_) => None,
        }
    }
}

/// Deduplication key for intersection definitions: the unordered curve
/// pair plus the solution index, canonicalized by ascending id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntersectionKey {
    pub first: DefinitionId,
    pub second: DefinitionId,
    pub index: IntersectionIndex,
}

impl IntersectionKey {
    pub fn new(a: DefinitionId, b: DefinitionId, index: IntersectionIndex) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            first,
            second,
            index,
        }
    }
}

/// One node of the sketch graph: a geometric value, its fixed dependency
/// list, and its computed validity.
///
/// Constructed detached with a fresh id; the graph is the only consumer.
/// Depth and value are settled on insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryDefinition {
    pub id: DefinitionId,
    kind: DefinitionKind,
    dependencies: Vec<DefinitionId>,
    depth: u32,
    valid: bool,
    value: Option<GeometryValue>,
}

impl GeometryDefinition {
    fn new(kind: DefinitionKind) -> Self {
        let dependencies = kind.dependencies();
        Self {
            id: DefinitionId::next(),
            kind,
            dependencies,
            depth: 0,
            valid: false,
            value: None,
        }
    }

    /// A free leaf point.
    pub fn point(position: Point) -> Self {
        Self::new(DefinitionKind::Point { position })
    }

    /// A segment between two point definitions.
    pub fn segment(start: DefinitionId, end: DefinitionId) -> Self {
        Self::new(DefinitionKind::Segment { start, end })
    }

    /// An arc from a center and two point definitions.
    pub fn arc(center: DefinitionId, start: DefinitionId, end: DefinitionId) -> Self {
        Self::new(DefinitionKind::Arc { center, start, end })
    }

    /// One intersection solution of two curve definitions. The pair is
    /// stored in ascending-id order.
    pub fn intersection(
        a: DefinitionId,
        b: DefinitionId,
        index: IntersectionIndex,
    ) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self::new(DefinitionKind::Intersection {
            first,
            second,
            index,
        })
    }

    pub fn kind(&self) -> &DefinitionKind {
        &self.kind
    }

    /// The fixed dependency list, immutable after construction.
    pub fn dependencies(&self) -> &[DefinitionId] {
        &self.dependencies
    }

    /// 0 for leaves, otherwise 1 + the maximum dependency depth.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The last computed value. May be stale while `is_valid` is false.
    pub fn value(&self) -> Option<&GeometryValue> {
        self.value.as_ref()
    }

    pub fn point_value(&self) -> Option<Point> {
        self.value.as_ref().and_then(GeometryValue::as_point)
    }

    pub fn curve_value(&self) -> Option<Curve> {
        self.value.as_ref().and_then(GeometryValue::as_curve)
    }

    pub(crate) fn set_depth(&mut self, depth: u32) {
        self.depth = depth;
    }

    pub(crate) fn set_value(&mut self, value: Option<GeometryValue>, valid: bool) {
        self.value = value;
        self.valid = valid;
    }

    /// Flip to invalid without touching the (now stale) value.
    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Move a free leaf point. Returns false for any other variant.
    pub(crate) fn set_position(&mut self, p: Point) -> bool {
        match &mut self.kind {
            DefinitionKind::Point { position } => {
                *position = p;
                true
            }
            _ => false,
        }
    }
}
