use sightline_core::{Axis, Constraint, GraphError, Line, LineDirection, SceneGraph, WorldPoint};
use sightline_sfm::validator::{validate, IssueKind, Severity};
use sightline_sfm::InferenceSettings;

fn settings() -> InferenceSettings {
    InferenceSettings::default()
}

fn z_plane_quad(graph: &mut SceneGraph) -> Vec<sightline_core::PointKey> {
    [
        (0.0, 0.0),
        (1.0, 0.0),
        (1.0, 1.0),
        (0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y)| graph.add_point(WorldPoint::locked_at(x, y, 0.0)))
    .collect()
}

#[test]
fn planar_quad_validates_as_coplanar() {
    let mut graph = SceneGraph::new();
    let points = z_plane_quad(&mut graph);
    graph
        .add_constraint(Constraint::Coplanar { points })
        .unwrap();

    let report = validate(&graph, None, &settings());
    assert!(report.valid(), "unexpected issues: {:?}", report.issues);
}

#[test]
fn perturbed_quad_fails_with_a_deviation_distance() {
    let mut graph = SceneGraph::new();
    let points = z_plane_quad(&mut graph);
    graph
        .add_constraint(Constraint::Coplanar {
            points: points.clone(),
        })
        .unwrap();
    graph.set_locked(points[3], Axis::Z, Some(1.0)).unwrap();

    let report = validate(&graph, None, &settings());
    assert!(!report.valid());
    let issue = report
        .issues
        .iter()
        .find(|i| i.kind == IssueKind::CoplanarDeviation)
        .unwrap();
    assert_eq!(issue.severity, Severity::Error);
    // The quad folds around the best-fit plane; the reported deviation is
    // the largest point-to-plane distance, not the raw 1.0 perturbation.
    assert!(issue.message.contains("deviate"));
    assert!(issue.message.contains("0."));
}

#[test]
fn structural_problems_are_rejected_at_creation_and_reported_for_candidates() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::free());

    // The graph refuses to create a self-distance outright.
    assert_eq!(
        graph.add_constraint(Constraint::Distance {
            a,
            b: a,
            value: 1.0
        }),
        Err(GraphError::DuplicateParticipants {
            kind: sightline_core::ConstraintKind::Distance
        })
    );

    // The validator reports the same finding for a candidate.
    let candidate = Constraint::Distance {
        a,
        b: a,
        value: 1.0,
    };
    let report = validate(&graph, Some(&candidate), &settings());
    assert!(!report.valid());
    assert!(report
        .errors()
        .any(|i| i.kind == IssueKind::Structural));
}

#[test]
fn candidate_contradicting_locked_values_is_an_error() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));

    let candidate = Constraint::FixedPoint {
        point: a,
        xyz: [Some(5.0), None, None],
    };
    let report = validate(&graph, Some(&candidate), &settings());
    assert!(report
        .errors()
        .any(|i| i.kind == IssueKind::GeometricConflict));

    // A candidate repeating the locked values is merely redundant.
    let candidate = Constraint::FixedPoint {
        point: a,
        xyz: [Some(0.0), Some(0.0), None],
    };
    let report = validate(&graph, Some(&candidate), &settings());
    assert!(report.valid());
    assert!(report
        .issues
        .iter()
        .any(|i| i.severity == Severity::Info && i.kind == IssueKind::Redundant));
}

#[test]
fn over_constrained_points_warn_without_blocking() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
    let b = graph.add_point(WorldPoint::locked_at(1.0, 0.0, 0.0));
    graph
        .add_constraint(Constraint::Distance { a, b, value: 1.0 })
        .unwrap();

    let report = validate(&graph, None, &settings());
    assert!(report.valid());
    assert!(report
        .issues
        .iter()
        .any(|i| i.severity == Severity::Warning && i.kind == IssueKind::OverConstrained));
}

#[test]
fn duplicate_candidate_is_reported_as_redundant() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::free());
    let b = graph.add_point(WorldPoint::free());
    let constraint = Constraint::Distance { a, b, value: 2.0 };
    graph.add_constraint(constraint.clone()).unwrap();

    let report = validate(&graph, Some(&constraint), &settings());
    assert!(report
        .issues
        .iter()
        .any(|i| i.kind == IssueKind::Redundant));
}

#[test]
fn satisfied_distance_between_locked_points_is_redundant_not_conflicting() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
    let b = graph.add_point(WorldPoint::locked_at(3.0, 0.0, 0.0));
    graph
        .add_constraint(Constraint::Distance { a, b, value: 3.0 })
        .unwrap();

    let report = validate(&graph, None, &settings());
    assert!(report.valid());
    assert!(report
        .issues
        .iter()
        .any(|i| i.kind == IssueKind::Redundant));
}

#[test]
fn contradicted_distance_is_a_geometric_conflict() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
    let b = graph.add_point(WorldPoint::locked_at(3.0, 0.0, 0.0));
    graph
        .add_constraint(Constraint::Distance { a, b, value: 1.0 })
        .unwrap();

    let report = validate(&graph, None, &settings());
    assert!(!report.valid());
    assert!(report
        .errors()
        .any(|i| i.kind == IssueKind::GeometricConflict));
}

#[test]
fn misaligned_direction_line_is_reported() {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
    let b = graph.add_point(WorldPoint::locked_at(1.0, 0.5, 0.0));
    graph
        .add_line(Line::new(a, b).with_direction(LineDirection::X))
        .unwrap();

    let report = validate(&graph, None, &settings());
    assert!(!report.valid());
    assert!(report
        .errors()
        .any(|i| i.kind == IssueKind::GeometricConflict && i.message.contains("direction")));
}
