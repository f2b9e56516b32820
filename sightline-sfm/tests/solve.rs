use std::collections::BTreeMap;

use sightline_core::nalgebra::Point2;
use sightline_core::{
    Axis, Camera, CameraIntrinsics, Line, LineDirection, Observation, SceneGraph, VanishingLine,
    Viewpoint, WorldPoint,
};
use sightline_sfm::bridge::{export_snapshot, BridgeError, SolveResult};
use sightline_sfm::propagator::propagate;
use sightline_sfm::{InferenceSettings, SolveSession};

fn settings() -> InferenceSettings {
    InferenceSettings::default()
}

/// A graph with a locked origin, an inferred point on a z edge, and one
/// observed viewpoint.
fn sample_graph() -> SceneGraph {
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

    let mut view = Viewpoint::new(640, 480);
    view.camera = Some(Camera::new(CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0)));
    let view = graph.add_view(view);
    graph.add_observation(view, Observation::new(b, 320.0, 240.0)).unwrap();

    propagate(&mut graph, &settings());
    graph
}

fn successful_result(optimized: BTreeMap<String, [f64; 3]>) -> SolveResult {
    SolveResult {
        success: true,
        iterations: 12,
        final_cost: 0.25,
        convergence_reason: "converged".to_string(),
        computation_time: 0.05,
        optimized_points: optimized,
        reprojections: BTreeMap::new(),
    }
}

#[test]
fn snapshot_carries_points_observations_and_constraints() {
    let graph = sample_graph();
    let (snapshot, _) = export_snapshot(&graph, &settings());

    assert_eq!(snapshot.world_points.len(), 2);
    assert_eq!(snapshot.world_points["p0"].locked_xyz, [Some(0.0); 3]);
    assert_eq!(
        snapshot.world_points["p1"].effective_xyz,
        [Some(0.0), Some(0.0), Some(2.0)]
    );
    let image = &snapshot.images["v0"];
    assert_eq!(image.camera.as_deref(), Some("c0"));
    assert_eq!(image.points.len(), 1);
    assert_eq!(image.points[0].world_point_id, "p1");
    // The line declaration rides along as a constraint row.
    let json = serde_json::to_value(&snapshot.constraints).unwrap();
    assert!(json
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c["type"] == "line_direction"));
}

#[test]
fn solve_round_trip_preserves_effective_positions() {
    let mut graph = sample_graph();
    let before: Vec<_> = graph.points.values().map(|p| p.effective()).collect();

    let mut session = SolveSession::new();
    let snapshot = session.begin_solve(&graph, &settings()).unwrap();

    // The solver returns exactly the effective positions it was handed.
    let optimized = snapshot
        .world_points
        .iter()
        .map(|(id, p)| {
            let xyz = p.effective_xyz.map(|v| v.unwrap());
            (id.clone(), xyz)
        })
        .collect();
    let diagnostics = session
        .complete_solve(&mut graph, &successful_result(optimized), &settings())
        .unwrap();

    assert!(diagnostics.applied);
    let after: Vec<_> = graph.points.values().map(|p| p.effective()).collect();
    assert_eq!(before, after);
}

#[test]
fn only_one_solve_may_be_in_flight() {
    let graph = sample_graph();
    let mut session = SolveSession::new();
    session.begin_solve(&graph, &settings()).unwrap();

    assert_eq!(
        session.begin_solve(&graph, &settings()).unwrap_err(),
        BridgeError::SolveInProgress
    );

    assert!(session.cancel_solve());
    assert!(!session.in_flight());
    // After cancellation a new solve may start.
    session.begin_solve(&graph, &settings()).unwrap();
}

#[test]
fn completing_without_a_pending_solve_is_an_error() {
    let mut graph = sample_graph();
    let mut session = SolveSession::new();
    let result = successful_result(BTreeMap::new());
    assert_eq!(
        session
            .complete_solve(&mut graph, &result, &settings())
            .unwrap_err(),
        BridgeError::NoSolveInFlight
    );
}

#[test]
fn failed_solve_leaves_the_graph_untouched() {
    let mut graph = sample_graph();
    let mut session = SolveSession::new();
    session.begin_solve(&graph, &settings()).unwrap();

    let result = SolveResult {
        success: false,
        convergence_reason: "max iterations reached".to_string(),
        optimized_points: [("p0".to_string(), [9.0, 9.0, 9.0])].into(),
        ..successful_result(BTreeMap::new())
    };
    let diagnostics = session
        .complete_solve(&mut graph, &result, &settings())
        .unwrap();

    assert!(!diagnostics.applied);
    assert_eq!(diagnostics.convergence_reason, "max iterations reached");
    assert!(graph.points.values().all(|p| p.optimized.is_none()));
}

#[test]
fn high_final_cost_is_rejected_by_the_acceptance_policy() {
    let mut graph = sample_graph();
    let mut session = SolveSession::new();
    session.begin_solve(&graph, &settings()).unwrap();

    let mut result = successful_result([("p0".to_string(), [0.0, 0.0, 0.0])].into());
    result.final_cost = settings().max_final_cost * 10.0;
    let diagnostics = session
        .complete_solve(&mut graph, &result, &settings())
        .unwrap();

    assert!(!diagnostics.applied);
    assert!(graph.points.values().all(|p| p.optimized.is_none()));
}

#[test]
fn malformed_results_are_fatal_and_mutate_nothing() {
    let mut graph = sample_graph();
    let mut session = SolveSession::new();

    session.begin_solve(&graph, &settings()).unwrap();
    let unknown_id = successful_result(
        [
            ("p0".to_string(), [0.0, 0.0, 0.0]),
            ("p99".to_string(), [1.0, 1.0, 1.0]),
        ]
        .into(),
    );
    assert_eq!(
        session
            .complete_solve(&mut graph, &unknown_id, &settings())
            .unwrap_err(),
        BridgeError::UnknownPointId("p99".to_string())
    );
    assert!(graph.points.values().all(|p| p.optimized.is_none()));

    session.begin_solve(&graph, &settings()).unwrap();
    let non_finite = successful_result([("p0".to_string(), [f64::NAN, 0.0, 0.0])].into());
    assert!(matches!(
        session
            .complete_solve(&mut graph, &non_finite, &settings())
            .unwrap_err(),
        BridgeError::NonFinite(_)
    ));
    assert!(graph.points.values().all(|p| p.optimized.is_none()));
}

#[test]
fn reprojections_land_on_the_matching_observations() {
    let mut graph = sample_graph();
    let mut session = SolveSession::new();
    session.begin_solve(&graph, &settings()).unwrap();

    let mut result = successful_result([("p1".to_string(), [0.0, 0.0, 2.0])].into());
    result.reprojections = [(
        "v0".to_string(),
        [("p1".to_string(), [321.5, 239.5])].into(),
    )]
    .into();
    let diagnostics = session
        .complete_solve(&mut graph, &result, &settings())
        .unwrap();
    assert!(diagnostics.applied);

    let view = graph.views.values().next().unwrap();
    assert_eq!(view.observations[0].reprojected, Some([321.5, 239.5]));
}

#[test]
fn vanishing_lines_produce_an_orientation_hint() {
    let mut graph = SceneGraph::new();
    let mut view = Viewpoint::new(640, 480);
    view.camera = Some(Camera::new(CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0)));
    let view = graph.add_view(view);

    // Two horizontal segments at different heights vanish along x; two
    // vertical segments vanish along y: an identity-oriented camera.
    for (p1, p2, axis) in [
        ((0.0, 100.0), (600.0, 101.0), Axis::X),
        ((0.0, 400.0), (600.0, 398.0), Axis::X),
        ((100.0, 0.0), (101.0, 450.0), Axis::Y),
        ((500.0, 0.0), (498.0, 450.0), Axis::Y),
    ] {
        graph
            .add_vanishing_line(
                view,
                VanishingLine::new(Point2::new(p1.0, p1.1), Point2::new(p2.0, p2.1), axis),
            )
            .unwrap();
    }

    let (snapshot, _) = export_snapshot(&graph, &settings());
    let hint = snapshot.cameras["c0"].orientation_hint.unwrap();
    assert!(hint.iter().all(|v| v.is_finite()));
}

#[test]
fn solver_contract_serializes_to_the_wire_shape() {
    let graph = sample_graph();
    let (snapshot, _) = export_snapshot(&graph, &settings());
    let json = serde_json::to_value(&snapshot).unwrap();
    assert!(json["world_points"]["p0"]["locked_xyz"].is_array());
    assert!(json["images"]["v0"]["points"][0]["world_point_id"].is_string());
    assert!(json["cameras"]["c0"]["intrinsics"].is_array());

    let result_json = r#"{
        "success": true,
        "iterations": 3,
        "final_cost": 0.5,
        "convergence_reason": "converged",
        "computation_time": 0.01,
        "optimized_points": {"p0": [0.0, 0.0, 0.0]},
        "reprojections": {"v0": {"p0": [1.0, 2.0]}}
    }"#;
    let result: SolveResult = serde_json::from_str(result_json).unwrap();
    assert_eq!(result.optimized_points["p0"], [0.0, 0.0, 0.0]);
}
