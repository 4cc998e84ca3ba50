//! End-to-end scenarios driving the full pipeline: insertion, discovery,
//! validity propagation, and face extraction.

use kurbo::Point;
use opensketch_core::{
    extract_planes, DefinitionId, GeometryDefinition, GraphError, SketchGraph,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn add_segment(graph: &mut SketchGraph, a: (f64, f64), b: (f64, f64)) -> DefinitionId {
    let p0 = graph.add_free_point(Point::new(a.0, a.1)).unwrap();
    let p1 = graph.add_free_point(Point::new(b.0, b.1)).unwrap();
    graph
        .add_segment_definition(GeometryDefinition::segment(p0, p1))
        .unwrap()
}

fn add_arc(
    graph: &mut SketchGraph,
    center: (f64, f64),
    start: (f64, f64),
    end: (f64, f64),
) -> DefinitionId {
    let c = graph.add_free_point(Point::new(center.0, center.1)).unwrap();
    let s = graph.add_free_point(Point::new(start.0, start.1)).unwrap();
    let e = graph.add_free_point(Point::new(end.0, end.1)).unwrap();
    graph
        .add_arc_definition(GeometryDefinition::arc(c, s, e))
        .unwrap()
}

#[test]
fn crossing_segments_intersect_at_center() {
    init();
    let mut graph = SketchGraph::new();
    let s1 = add_segment(&mut graph, (0.0, 0.0), (4.0, 4.0));
    let s2 = add_segment(&mut graph, (0.0, 4.0), (4.0, 0.0));

    let int_id = graph.intersection_between(s1, s2, 0).unwrap().unwrap();
    let def = graph.definition(int_id).unwrap();
    assert!(def.is_valid());
    let p = def.point_value().unwrap();
    assert!((p.x - 2.0).abs() < 1e-10);
    assert!((p.y - 2.0).abs() < 1e-10);
}

#[test]
fn parallel_segments_have_no_valid_intersection() {
    init();
    let mut graph = SketchGraph::new();
    let s1 = add_segment(&mut graph, (0.0, 0.0), (4.0, 0.0));
    let s2 = add_segment(&mut graph, (0.0, 1.0), (4.0, 1.0));

    // The candidate exists but stays invalid.
    let int_id = graph.intersection_between(s1, s2, 0).unwrap().unwrap();
    assert!(!graph.definition(int_id).unwrap().is_valid());
    assert!(graph
        .valid_definitions()
        .iter()
        .all(|d| d.id != int_id));
}

#[test]
fn arc_sweep_filters_intersections() {
    init();
    let mut graph = SketchGraph::new();
    // Arc on circle(O, 5) sweeping 30..60 degrees.
    let deg30 = 30.0_f64.to_radians();
    let deg60 = 60.0_f64.to_radians();
    let arc = add_arc(
        &mut graph,
        (0.0, 0.0),
        (5.0 * deg30.cos(), 5.0 * deg30.sin()),
        (5.0 * deg60.cos(), 5.0 * deg60.sin()),
    );

    // Crosses the carrier circle at 0 and 180 degrees: both outside the
    // sweep, so both slots stay invalid.
    let horizontal = add_segment(&mut graph, (-10.0, 0.0), (10.0, 0.0));
    for index in 0..2 {
        let id = graph
            .intersection_between(arc, horizontal, index)
            .unwrap()
            .unwrap();
        assert!(!graph.definition(id).unwrap().is_valid());
    }

    // A 45 degree ray crosses inside the sweep; only the slot whose root
    // lies on the segment span becomes valid.
    let diagonal = add_segment(&mut graph, (0.0, 0.0), (10.0, 10.0));
    let slot0 = graph
        .intersection_between(arc, diagonal, 0)
        .unwrap()
        .unwrap();
    let slot1 = graph
        .intersection_between(arc, diagonal, 1)
        .unwrap()
        .unwrap();
    assert!(!graph.definition(slot0).unwrap().is_valid());
    let hit = graph.definition(slot1).unwrap();
    assert!(hit.is_valid());
    let p = hit.point_value().unwrap();
    assert!((p.to_vec2().hypot() - 5.0).abs() < 1e-9);
    assert!((p.x - p.y).abs() < 1e-9);
}

#[test]
fn duplicate_insertion_is_rejected() {
    init();
    let mut graph = SketchGraph::new();
    let a = graph.add_free_point(Point::new(0.0, 0.0)).unwrap();
    let b = graph.add_free_point(Point::new(1.0, 1.0)).unwrap();
    let seg = GeometryDefinition::segment(a, b);
    graph.add_segment_definition(seg.clone()).unwrap();
    assert!(matches!(
        graph.add_segment_definition(seg),
        Err(GraphError::DuplicateDefinition(_))
    ));
}

#[test]
fn unit_square_yields_one_plane() {
    init();
    let mut graph = SketchGraph::new();
    let sides = [
        add_segment(&mut graph, (0.0, 0.0), (1.0, 0.0)),
        add_segment(&mut graph, (1.0, 0.0), (1.0, 1.0)),
        add_segment(&mut graph, (1.0, 1.0), (0.0, 1.0)),
        add_segment(&mut graph, (0.0, 1.0), (0.0, 0.0)),
    ];

    let planes = extract_planes(&graph);
    assert_eq!(planes.len(), 1);
    let plane = &planes[0];
    assert_eq!(plane.curves.len(), 4);
    assert_eq!(plane.points.len(), 4);
    for side in sides {
        assert!(plane.curves.contains(&side));
    }
    // Cyclic order: consecutive curves differ, consecutive points differ.
    for i in 0..4 {
        assert_ne!(plane.curves[i], plane.curves[(i + 1) % 4]);
        assert_ne!(plane.points[i], plane.points[(i + 1) % 4]);
    }
}

#[test]
fn drag_breaks_and_restores_intersection() {
    init();
    let mut graph = SketchGraph::new();
    let s1 = add_segment(&mut graph, (0.0, 0.0), (4.0, 4.0));
    let s2 = add_segment(&mut graph, (0.0, 4.0), (4.0, 0.0));
    let int_id = graph.intersection_between(s1, s2, 0).unwrap().unwrap();
    assert!(graph.definition(int_id).unwrap().is_valid());

    let end = graph.definition(s1).unwrap().dependencies()[1];
    graph.set_point(end, Point::new(1.0, 1.0)).unwrap();
    assert!(graph.definition(s1).unwrap().is_valid());
    assert!(!graph.definition(int_id).unwrap().is_valid());

    graph.set_point(end, Point::new(4.0, 4.0)).unwrap();
    let def = graph.definition(int_id).unwrap();
    assert!(def.is_valid());
    let p = def.point_value().unwrap();
    assert!((p.x - 2.0).abs() < 1e-10);
    assert!((p.y - 2.0).abs() < 1e-10);
}

#[test]
fn degenerate_arc_invalidates_its_intersections() {
    init();
    let mut graph = SketchGraph::new();
    let arc = add_arc(&mut graph, (0.0, 0.0), (2.0, 0.0), (0.0, 2.0));
    let seg = add_segment(&mut graph, (0.0, 0.0), (3.0, 3.0));
    // The segment starts inside the circle, so only the larger-t slot hits.
    let int_id = graph.intersection_between(arc, seg, 1).unwrap().unwrap();
    assert!(graph.definition(int_id).unwrap().is_valid());

    // Collapse the start point onto the center: no radius, no direction.
    let start = graph.definition(arc).unwrap().dependencies()[1];
    graph.set_point(start, Point::new(0.0, 0.0)).unwrap();
    assert!(!graph.definition(arc).unwrap().is_valid());
    assert!(!graph.definition(int_id).unwrap().is_valid());

    graph.set_point(start, Point::new(2.0, 0.0)).unwrap();
    assert!(graph.definition(arc).unwrap().is_valid());
    assert!(graph.definition(int_id).unwrap().is_valid());
}

#[test]
fn two_arcs_form_a_lens() {
    init();
    let mut graph = SketchGraph::new();
    // Half of circle(O, 2) bulging through (2, 0), and half of
    // circle((2, 0), 2) bulging through (0, 0).
    let a = add_arc(&mut graph, (0.0, 0.0), (0.0, -2.0), (0.0, 2.0));
    let b = add_arc(&mut graph, (2.0, 0.0), (2.0, 2.0), (2.0, -2.0));

    let sqrt3 = 3.0_f64.sqrt();
    for index in 0..2 {
        let id = graph.intersection_between(a, b, index).unwrap().unwrap();
        let def = graph.definition(id).unwrap();
        assert!(def.is_valid());
        let p = def.point_value().unwrap();
        assert!((p.x - 1.0).abs() < 1e-9);
        assert!((p.y.abs() - sqrt3).abs() < 1e-9);
    }

    let planes = extract_planes(&graph);
    assert_eq!(planes.len(), 1);
    assert_eq!(planes[0].curves.len(), 2);
    assert_eq!(planes[0].points.len(), 2);
}

#[test]
fn depth_and_validity_invariants_hold() {
    init();
    let mut graph = SketchGraph::new();
    add_segment(&mut graph, (0.0, 0.0), (4.0, 0.0));
    add_segment(&mut graph, (0.0, 1.0), (4.0, 1.0)); // parallel to the first
    add_segment(&mut graph, (1.0, -1.0), (1.0, 2.0));
    add_arc(&mut graph, (2.0, 0.0), (3.5, 0.0), (2.0, 1.5));

    for def in graph.definitions() {
        if def.dependencies().is_empty() {
            assert_eq!(def.depth(), 0);
        } else {
            let max_dep = def
                .dependencies()
                .iter()
                .map(|d| graph.definition(*d).unwrap().depth())
                .max()
                .unwrap();
            assert_eq!(def.depth(), 1 + max_dep);
        }
        let any_dep_invalid = def
            .dependencies()
            .iter()
            .any(|d| !graph.definition(*d).unwrap().is_valid());
        if any_dep_invalid {
            assert!(!def.is_valid());
        }
    }
}

#[test]
fn extraction_tracks_the_valid_set() {
    init();
    let mut graph = SketchGraph::new();
    add_segment(&mut graph, (0.0, 0.0), (1.0, 0.0));
    add_segment(&mut graph, (1.0, 0.0), (1.0, 1.0));
    add_segment(&mut graph, (1.0, 1.0), (0.0, 1.0));
    let closing = add_segment(&mut graph, (0.0, 1.0), (0.0, 0.0));
    assert_eq!(extract_planes(&graph).len(), 1);

    // Drag the closing side away: the square opens, the face disappears.
    let end = graph.definition(closing).unwrap().dependencies()[1];
    graph.set_point(end, Point::new(-0.5, -0.5)).unwrap();
    assert!(extract_planes(&graph).is_empty());

    graph.set_point(end, Point::new(0.0, 0.0)).unwrap();
    assert_eq!(extract_planes(&graph).len(), 1);
}
