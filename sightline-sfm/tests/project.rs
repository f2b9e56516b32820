use sightline_core::nalgebra::Point2;
use sightline_core::{
    Axis, Camera, CameraIntrinsics, Constraint, Line, LineDirection, Observation, Plane,
    PlaneDefinition, SceneGraph, VanishingLine, Viewpoint, WorldPoint,
};
use sightline_sfm::propagator::propagate;
use sightline_sfm::snapshot::ProjectSnapshot;
use sightline_sfm::InferenceSettings;

fn settings() -> InferenceSettings {
    InferenceSettings::default()
}

fn sample_project() -> SceneGraph {
    let mut graph = SceneGraph::new();
    let a = graph.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
    let b = graph.add_point(WorldPoint::free());
    let c = graph.add_point(WorldPoint::with_locked([Some(0.5), None, None]));
    let d = graph.add_point(WorldPoint::locked_at(0.0, 1.0, 0.0));

    let ab = graph
        .add_line(
            Line::new(a, b)
                .with_direction(LineDirection::X)
                .with_target_length(1.0),
        )
        .unwrap();
    graph.add_collinear_point(ab, c).unwrap();
    graph
        .add_plane(Plane::new(PlaneDefinition::LinePoint(ab, d)))
        .unwrap();
    graph
        .add_constraint(Constraint::Distance { a, b: d, value: 1.0 })
        .unwrap();

    let mut view = Viewpoint::new(800, 600);
    view.camera = Some(Camera::new(CameraIntrinsics::new(600.0, 600.0, 400.0, 300.0)));
    let view = graph.add_view(view);
    graph.add_observation(view, Observation::new(b, 415.0, 302.0)).unwrap();
    graph
        .add_vanishing_line(
            view,
            VanishingLine::new(Point2::new(0.0, 10.0), Point2::new(100.0, 12.0), Axis::X),
        )
        .unwrap();
    graph
        .add_constraint(Constraint::Projection {
            point: c,
            view,
            u: 200.0,
            v: 150.0,
            sigma: 1.0,
        })
        .unwrap();

    graph
}

#[test]
fn capture_restore_round_trip_preserves_geometry() {
    let mut original = sample_project();
    propagate(&mut original, &settings());

    let snapshot = ProjectSnapshot::capture(&original, &settings(), None);
    // Through the transport representation and back.
    let json = serde_json::to_string(&snapshot).unwrap();
    let parsed: ProjectSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, snapshot);

    let (mut restored, restored_settings) = parsed.restore().unwrap();
    assert_eq!(restored_settings, settings());
    assert_eq!(restored.points.len(), original.points.len());
    assert_eq!(restored.lines.len(), original.lines.len());
    assert_eq!(restored.planes.len(), original.planes.len());
    assert_eq!(restored.views.len(), original.views.len());
    assert_eq!(restored.constraints.len(), original.constraints.len());

    // The inferred layer is a cache: it comes back after propagation.
    propagate(&mut restored, &settings());
    let mut original_known: Vec<_> = original
        .points
        .values()
        .map(|p| p.effective())
        .collect();
    let mut restored_known: Vec<_> = restored
        .points
        .values()
        .map(|p| p.effective())
        .collect();
    original_known.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
    restored_known.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
    assert_eq!(original_known, restored_known);
}

#[test]
fn restore_rejects_dangling_ids() {
    let graph = sample_project();
    let mut snapshot = ProjectSnapshot::capture(&graph, &settings(), None);
    snapshot.world_points.remove("p0");

    assert!(snapshot.restore().is_err());
}

#[test]
fn snapshot_keeps_optimized_positions_but_not_inferred_ones() {
    let mut graph = sample_project();
    propagate(&mut graph, &settings());
    let b = graph
        .points
        .iter()
        .find(|(_, p)| p.locked == [None; 3])
        .map(|(k, _)| k)
        .unwrap();
    graph.points[b].optimized = Some([1.0, 0.0, 0.0]);

    let snapshot = ProjectSnapshot::capture(&graph, &settings(), None);
    let stored = snapshot
        .world_points
        .values()
        .find(|p| p.locked_xyz == [None; 3])
        .unwrap();
    assert_eq!(stored.optimized_xyz, Some([1.0, 0.0, 0.0]));

    let (restored, _) = snapshot.restore().unwrap();
    assert!(restored
        .points
        .values()
        .all(|p| p.inferred == [None; 3]));
}
