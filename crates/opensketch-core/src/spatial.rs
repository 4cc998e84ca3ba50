//! R-tree point index used to cluster coincident intersection points
//! without an O(n²) scan.

use kurbo::Point;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// An entry in the point index, referencing an arrangement vertex by its
/// slot in the node list.
#[derive(Debug, Clone)]
pub struct PointEntry {
    pub position: [f64; 2],
    pub node: usize,
}

impl RTreeObject for PointEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for PointEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Spatial index over cluster seed points.
#[derive(Debug, Default)]
pub struct PointIndex {
    tree: RTree<PointEntry>,
}

impl PointIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, p: Point, node: usize) {
        self.tree.insert(PointEntry {
            position: [p.x, p.y],
            node,
        });
    }

    /// The nearest registered node within the squared distance bound.
    pub fn nearest_within(&self, p: Point, max_dist_sq: f64) -> Option<usize> {
        let query = [p.x, p.y];
        self.tree
            .nearest_neighbor(&query)
            .filter(|entry| entry.distance_2(&query) <= max_dist_sq)
            .map(|entry| entry.node)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_within_bound() {
        let mut index = PointIndex::new();
        index.insert(Point::new(0.0, 0.0), 0);
        index.insert(Point::new(10.0, 0.0), 1);

        assert_eq!(index.nearest_within(Point::new(1e-11, 0.0), 1e-20), Some(0));
        assert_eq!(index.nearest_within(Point::new(0.1, 0.0), 1e-20), None);
        assert_eq!(index.nearest_within(Point::new(10.0, 1e-11), 1e-20), Some(1));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_empty_index() {
        let index = PointIndex::new();
        assert!(index.is_empty());
        assert!(index.nearest_within(Point::new(0.0, 0.0), 1.0).is_none());
    }
}
