use sightline_core::{
    Axis, Constraint, ConstraintStatus, Line, LineDirection, SceneGraph, WorldPoint,
};
use sightline_sfm::propagator::{propagate, Priority};
use sightline_sfm::InferenceSettings;

fn settings() -> InferenceSettings {
    InferenceSettings::default()
}

#[test]
fn axis_line_with_target_length_derives_the_free_endpoint() {
    // Line with direction z, point A locked at the origin, target length 2:
    // the canonical choice walks the positive axis.
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
    let b = graph.add_point(WorldPoint::free());
    graph
        .add_line(
            Line::new(a, b)
                .with_direction(LineDirection::Z)
                .with_target_length(2.0),
        )
        .unwrap();

    let report = propagate(&mut graph, &settings());
    assert!(report.converged);
    assert!(report.conflicts.is_empty());
    assert_eq!(graph.points[b].inferred, [Some(0.0), Some(0.0), Some(2.0)]);
    assert_eq!(graph.points[b].status(), ConstraintStatus::Inferred);
}

#[test]
fn collinear_point_without_own_constraints_is_underdetermined() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
    let b = graph.add_point(WorldPoint::locked_at(1.0, 0.0, 0.0));
    let c = graph.add_point(WorldPoint::free());
    let line = graph.add_line(Line::new(a, b)).unwrap();
    graph.add_collinear_point(line, c).unwrap();

    let report = propagate(&mut graph, &settings());
    assert!(report.converged);
    assert_eq!(graph.points[c].status(), ConstraintStatus::Free);
    assert!(report.underdetermined.contains(&c));
}

#[test]
fn collinear_point_with_one_known_axis_lands_on_the_line() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
    let b = graph.add_point(WorldPoint::locked_at(1.0, 0.0, 0.0));
    let c = graph.add_point(WorldPoint::with_locked([Some(0.25), None, None]));
    let line = graph.add_line(Line::new(a, b)).unwrap();
    graph.add_collinear_point(line, c).unwrap();

    let report = propagate(&mut graph, &settings());
    assert!(report.converged);
    let p = graph.points[c].known_point().unwrap();
    assert!((p.x - 0.25).abs() < 1e-12);
    assert!(p.y.abs() < 1e-12 && p.z.abs() < 1e-12);
    assert!(!report.underdetermined.contains(&c));
}

#[test]
fn fixed_point_outranks_line_direction() {
    // B carries a FixedPoint constraint and sits on an x-direction line from
    // a locked A; the FixedPoint value must win on every axis it specifies.
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
    let b = graph.add_point(WorldPoint::free());
    graph
        .add_line(Line::new(a, b).with_direction(LineDirection::X))
        .unwrap();
    graph
        .add_constraint(Constraint::FixedPoint {
            point: b,
            xyz: [Some(4.0), Some(5.0), Some(6.0)],
        })
        .unwrap();

    let report = propagate(&mut graph, &settings());
    assert!(report.converged);
    assert_eq!(graph.points[b].inferred, [Some(4.0), Some(5.0), Some(6.0)]);
    // The line wanted y = z = 0; both disagreements are warnings, not
    // overrides.
    assert!(report
        .conflicts
        .iter()
        .any(|c| c.point == b && c.kept_priority == Priority::FixedPoint));
}

#[test]
fn disagreement_within_tolerance_is_not_a_conflict() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
    let b = graph.add_point(WorldPoint::locked_at(1.0, 0.0005, 0.0));
    graph
        .add_line(Line::new(a, b).with_direction(LineDirection::X))
        .unwrap();

    let report = propagate(&mut graph, &settings());
    assert!(report.conflicts.is_empty());

    // Widen the disagreement past the tolerance and it surfaces.
    graph.set_locked(b, Axis::Y, Some(0.1)).unwrap();
    let report = propagate(&mut graph, &settings());
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].axis, Axis::Y);
    assert_eq!(report.conflicts[0].kept_priority, Priority::Locked);
}

#[test]
fn planar_direction_pins_only_the_normal_axis() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(1.0, 2.0, 3.0));
    let b = graph.add_point(WorldPoint::free());
    graph
        .add_line(Line::new(a, b).with_direction(LineDirection::XY))
        .unwrap();

    propagate(&mut graph, &settings());
    assert_eq!(graph.points[b].inferred, [None, None, Some(3.0)]);
    assert_eq!(graph.points[b].status(), ConstraintStatus::Partial);
}

#[test]
fn coplanar_solves_the_single_missing_axis() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 1.0));
    let b = graph.add_point(WorldPoint::locked_at(1.0, 0.0, 1.0));
    let c = graph.add_point(WorldPoint::locked_at(0.0, 1.0, 1.0));
    let d = graph.add_point(WorldPoint::with_locked([Some(2.0), Some(3.0), None]));
    graph
        .add_constraint(Constraint::Coplanar {
            points: vec![a, b, c, d],
        })
        .unwrap();

    let report = propagate(&mut graph, &settings());
    assert!(report.converged);
    let z = graph.points[d].inferred[2].unwrap();
    assert!((z - 1.0).abs() < 1e-9);
}

#[test]
fn inference_chains_across_constraints() {
    // A locked corner, an x edge of length 1, then a z edge of length 2
    // hanging off its far end: the second line can only resolve once the
    // first has.
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
    let b = graph.add_point(WorldPoint::free());
    let c = graph.add_point(WorldPoint::free());
    graph
        .add_line(
            Line::new(a, b)
                .with_direction(LineDirection::X)
                .with_target_length(1.0),
        )
        .unwrap();
    graph
        .add_line(
            Line::new(b, c)
                .with_direction(LineDirection::Z)
                .with_target_length(2.0),
        )
        .unwrap();

    let report = propagate(&mut graph, &settings());
    assert!(report.converged);
    assert!(report.passes >= 2);
    assert_eq!(graph.points[c].inferred, [Some(1.0), Some(0.0), Some(2.0)]);
}

#[test]
fn propagation_is_idempotent() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
    let b = graph.add_point(WorldPoint::free());
    let c = graph.add_point(WorldPoint::with_locked([Some(0.5), None, None]));
    let line = graph
        .add_line(
            Line::new(a, b)
                .with_direction(LineDirection::X)
                .with_target_length(1.0),
        )
        .unwrap();
    graph.add_collinear_point(line, c).unwrap();

    propagate(&mut graph, &settings());
    let first: Vec<_> = graph.points.iter().map(|(k, p)| (k, p.inferred)).collect();

    // A clean graph has nothing to recompute.
    let report = propagate(&mut graph, &settings());
    assert!(report.recomputed.is_empty());

    // A full forced recomputation reproduces the same values.
    graph.mark_all_dirty();
    propagate(&mut graph, &settings());
    let second: Vec<_> = graph.points.iter().map(|(k, p)| (k, p.inferred)).collect();
    assert_eq!(first, second);
}

#[test]
fn dirty_closure_only_touches_the_connected_subgraph() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
    let b = graph.add_point(WorldPoint::free());
    graph
        .add_line(Line::new(a, b).with_direction(LineDirection::X))
        .unwrap();
    // An unrelated island.
    let c = graph.add_point(WorldPoint::locked_at(9.0, 9.0, 9.0));

    propagate(&mut graph, &settings());

    // Touching only the island leaves the line's points alone.
    graph.set_locked(c, Axis::X, Some(8.0)).unwrap();
    let report = propagate(&mut graph, &settings());
    assert_eq!(report.recomputed, vec![c]);
    assert!(!report.recomputed.contains(&a));
    assert!(!report.recomputed.contains(&b));
}

#[test]
fn construction_lines_do_not_infer() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
    let b = graph.add_point(WorldPoint::free());
    let mut line = Line::new(a, b).with_direction(LineDirection::X);
    line.construction = true;
    graph.add_line(line).unwrap();

    propagate(&mut graph, &settings());
    assert_eq!(graph.points[b].status(), ConstraintStatus::Free);
}

#[test]
fn collinear_constraint_uses_first_two_known_points_as_anchors() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
    let b = graph.add_point(WorldPoint::locked_at(2.0, 2.0, 0.0));
    let c = graph.add_point(WorldPoint::with_locked([Some(1.0), None, None]));
    graph
        .add_constraint(Constraint::Collinear {
            points: vec![a, b, c],
        })
        .unwrap();

    let report = propagate(&mut graph, &settings());
    assert!(report.converged);
    let p = graph.points[c].known_point().unwrap();
    assert!((p.y - 1.0).abs() < 1e-12);
    assert!(p.z.abs() < 1e-12);
}
