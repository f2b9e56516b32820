//! The marshalling boundary with the external bundle-adjustment solver.
//!
//! The bridge performs no optimization. [`export_snapshot`] serializes the
//! graph into the solver's input contract and [`ingest_result`] applies a
//! well-formed result back — atomically: the whole result is validated
//! before the first value is written, so a malformed result never leaves the
//! graph partially mutated.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use sightline_core::nalgebra::UnitQuaternion;
use sightline_core::{
    Axis, CameraLockFlags, Constraint, LineDirection, PointKey, SceneGraph, ViewKey,
};
use sightline_geom::vanishing::{orientation_hint, VanishingPointEstimator};

use crate::InferenceSettings;

/// A fatal integration error: the solver result does not match the contract.
///
/// Distinct from ordinary non-convergence, which is a well-formed result
/// with `success == false` and is reported through [`SolveDiagnostics`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("a solve is already in progress")]
    SolveInProgress,
    #[error("no solve is in flight")]
    NoSolveInFlight,
    #[error("solver result references unknown world point id {0:?}")]
    UnknownPointId(String),
    #[error("solver result references unknown image id {0:?}")]
    UnknownImageId(String),
    #[error("solver result contains a non-finite value for {0}")]
    NonFinite(String),
}

/// Per-point entry of the solver input.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SnapshotPoint {
    pub locked_xyz: [Option<f64>; 3],
    pub effective_xyz: [Option<f64>; 3],
}

/// One observation row of the solver input.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SnapshotObservation {
    pub world_point_id: String,
    pub u: f64,
    pub v: f64,
    pub sigma: f64,
}

/// Per-image entry of the solver input.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SnapshotImage {
    /// Id of this image's camera in the `cameras` table, when one exists.
    pub camera: Option<String>,
    pub points: Vec<SnapshotObservation>,
}

/// Per-camera entry of the solver input. Cameras without parameters yet are
/// placeholders the solver is expected to initialize.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SnapshotCamera {
    /// `[fx, fy, cx, cy, k1?, k2?]`.
    pub intrinsics: Vec<f64>,
    /// Axis-angle world-to-camera rotation.
    pub rotation: [f64; 3],
    pub translation: [f64; 3],
    pub locks: CameraLockFlags,
    /// World-to-camera rotation hint `[w, x, y, z]` recovered from
    /// vanishing-line geometry, when enough lines were drawn.
    pub orientation_hint: Option<[f64; 4]>,
}

/// Constraint rows of the solver input, in the `{type, parameters}` wire
/// shape.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "parameters", rename_all = "snake_case")]
pub enum SnapshotConstraint {
    FixedPoint {
        point: String,
        xyz: [Option<f64>; 3],
    },
    Distance {
        a: String,
        b: String,
        value: f64,
    },
    Angle {
        vertex: String,
        a: String,
        c: String,
        radians: f64,
    },
    Collinear {
        points: Vec<String>,
    },
    Coplanar {
        points: Vec<String>,
    },
    LineDirection {
        a: String,
        b: String,
        direction: LineDirection,
        target_length: Option<f64>,
    },
    ParallelLines {
        line_a: [String; 2],
        line_b: [String; 2],
    },
    PerpendicularLines {
        line_a: [String; 2],
        line_b: [String; 2],
    },
    EqualDistances {
        pairs: Vec<[String; 2]>,
    },
    EqualAngles {
        triplets: Vec<[String; 3]>,
    },
}

/// The full solver input contract.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SolveSnapshot {
    pub world_points: BTreeMap<String, SnapshotPoint>,
    pub images: BTreeMap<String, SnapshotImage>,
    pub cameras: BTreeMap<String, SnapshotCamera>,
    pub constraints: Vec<SnapshotConstraint>,
}

/// The solver output contract.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SolveResult {
    pub success: bool,
    pub iterations: usize,
    pub final_cost: f64,
    pub convergence_reason: String,
    /// Wall-clock solve time in seconds.
    pub computation_time: f64,
    #[serde(default)]
    pub optimized_points: BTreeMap<String, [f64; 3]>,
    /// `image id → world point id → [u, v]`.
    #[serde(default)]
    pub reprojections: BTreeMap<String, BTreeMap<String, [f64; 2]>>,
}

/// What a completed solve did to the graph.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SolveDiagnostics {
    /// Whether the result was committed. False for solver-reported failure
    /// and for results rejected by the acceptance policy; the graph is then
    /// untouched.
    pub applied: bool,
    pub success: bool,
    pub iterations: usize,
    pub final_cost: f64,
    pub convergence_reason: String,
    pub computation_time: f64,
}

/// Maps snapshot string ids back to graph keys. Produced together with a
/// snapshot and consumed when the matching result is ingested.
#[derive(Debug, Clone, Default)]
pub struct SnapshotIndex {
    points: BTreeMap<String, PointKey>,
    views: BTreeMap<String, ViewKey>,
}

impl SnapshotIndex {
    pub fn point(&self, id: &str) -> Option<PointKey> {
        self.points.get(id).copied()
    }

    pub fn view(&self, id: &str) -> Option<ViewKey> {
        self.views.get(id).copied()
    }
}

/// Serializes the graph into the solver input contract.
///
/// Returns the snapshot together with the [`SnapshotIndex`] that resolves
/// its string ids back to graph keys at ingest time.
pub fn export_snapshot(
    graph: &SceneGraph,
    settings: &InferenceSettings,
) -> (SolveSnapshot, SnapshotIndex) {
    let mut snapshot = SolveSnapshot::default();
    let mut index = SnapshotIndex::default();

    let mut point_keys: Vec<PointKey> = graph.points.keys().collect();
    point_keys.sort();
    let mut point_ids: slotmap::SecondaryMap<PointKey, String> = Default::default();
    for (n, &key) in point_keys.iter().enumerate() {
        let id = format!("p{n}");
        let point = &graph.points[key];
        snapshot.world_points.insert(
            id.clone(),
            SnapshotPoint {
                locked_xyz: point.locked,
                effective_xyz: point.effective(),
            },
        );
        point_ids.insert(key, id.clone());
        index.points.insert(id, key);
    }

    let mut view_keys: Vec<ViewKey> = graph.views.keys().collect();
    view_keys.sort();
    for (n, &key) in view_keys.iter().enumerate() {
        let view_id = format!("v{n}");
        let view = &graph.views[key];

        let camera_id = view.camera.as_ref().map(|camera| {
            let camera_id = format!("c{n}");
            let hint = vanishing_orientation_hint(graph, key, settings);
            snapshot.cameras.insert(
                camera_id.clone(),
                SnapshotCamera {
                    intrinsics: camera.intrinsics.to_vec(),
                    rotation: camera.pose.rotation.into(),
                    translation: camera.pose.translation.into(),
                    locks: camera.locks,
                    orientation_hint: hint.map(|q| {
                        let c = q.into_inner().coords;
                        [c.w, c.x, c.y, c.z]
                    }),
                },
            );
            camera_id
        });

        let mut points: Vec<SnapshotObservation> = view
            .observations
            .iter()
            .map(|o| SnapshotObservation {
                world_point_id: point_ids[o.point].clone(),
                u: o.u,
                v: o.v,
                sigma: o.sigma,
            })
            .collect();
        // Projection constraints targeting this view are observations too.
        for &ckey in graph.constraint_order() {
            if let Constraint::Projection {
                point,
                view: cview,
                u,
                v,
                sigma,
            } = graph.constraints[ckey]
            {
                if cview == key {
                    points.push(SnapshotObservation {
                        world_point_id: point_ids[point].clone(),
                        u,
                        v,
                        sigma,
                    });
                }
            }
        }

        snapshot.images.insert(
            view_id.clone(),
            SnapshotImage {
                camera: camera_id,
                points,
            },
        );
        index.views.insert(view_id, key);
    }

    let line_endpoint_ids = |lkey| {
        let line = &graph.lines[lkey];
        [point_ids[line.a].clone(), point_ids[line.b].clone()]
    };

    for &ckey in graph.constraint_order() {
        let wire = match &graph.constraints[ckey] {
            Constraint::FixedPoint { point, xyz } => Some(SnapshotConstraint::FixedPoint {
                point: point_ids[*point].clone(),
                xyz: *xyz,
            }),
            Constraint::Distance { a, b, value } => Some(SnapshotConstraint::Distance {
                a: point_ids[*a].clone(),
                b: point_ids[*b].clone(),
                value: *value,
            }),
            Constraint::Angle {
                vertex,
                a,
                c,
                radians,
            } => Some(SnapshotConstraint::Angle {
                vertex: point_ids[*vertex].clone(),
                a: point_ids[*a].clone(),
                c: point_ids[*c].clone(),
                radians: *radians,
            }),
            Constraint::Collinear { points } => Some(SnapshotConstraint::Collinear {
                points: points.iter().map(|&p| point_ids[p].clone()).collect(),
            }),
            Constraint::Coplanar { points } => Some(SnapshotConstraint::Coplanar {
                points: points.iter().map(|&p| point_ids[p].clone()).collect(),
            }),
            Constraint::ParallelLines { a, b } => Some(SnapshotConstraint::ParallelLines {
                line_a: line_endpoint_ids(*a),
                line_b: line_endpoint_ids(*b),
            }),
            Constraint::PerpendicularLines { a, b } => {
                Some(SnapshotConstraint::PerpendicularLines {
                    line_a: line_endpoint_ids(*a),
                    line_b: line_endpoint_ids(*b),
                })
            }
            Constraint::EqualDistances { pairs } => Some(SnapshotConstraint::EqualDistances {
                pairs: pairs
                    .iter()
                    .map(|&(a, b)| [point_ids[a].clone(), point_ids[b].clone()])
                    .collect(),
            }),
            Constraint::EqualAngles { triplets } => Some(SnapshotConstraint::EqualAngles {
                triplets: triplets
                    .iter()
                    .map(|&(v, a, c)| {
                        [
                            point_ids[v].clone(),
                            point_ids[a].clone(),
                            point_ids[c].clone(),
                        ]
                    })
                    .collect(),
            }),
            // Already exported as image observations.
            Constraint::Projection { .. } => None,
        };
        snapshot.constraints.extend(wire);
    }

    // Line declarations and plane definitions become constraint rows.
    for &lkey in graph.line_order() {
        let line = &graph.lines[lkey];
        if line.construction {
            continue;
        }
        if !line.direction.is_free() || line.target_length.is_some() {
            snapshot.constraints.push(SnapshotConstraint::LineDirection {
                a: point_ids[line.a].clone(),
                b: point_ids[line.b].clone(),
                direction: line.direction,
                target_length: line.target_length,
            });
        }
        if !line.collinear.is_empty() {
            snapshot.constraints.push(SnapshotConstraint::Collinear {
                points: line.points().map(|p| point_ids[p].clone()).collect(),
            });
        }
    }
    for pkey in graph.planes.keys() {
        if let Ok(members) = graph.plane_points(pkey) {
            if members.len() >= 3 {
                snapshot.constraints.push(SnapshotConstraint::Coplanar {
                    points: members.iter().map(|&p| point_ids[p].clone()).collect(),
                });
            }
        }
    }

    debug!(
        "exported solve snapshot: {} points, {} images, {} constraints",
        snapshot.world_points.len(),
        snapshot.images.len(),
        snapshot.constraints.len()
    );
    (snapshot, index)
}

/// Estimates a world-to-camera orientation hint for one view from its
/// vanishing lines. Needs vanishing points for at least two axes.
pub fn vanishing_orientation_hint(
    graph: &SceneGraph,
    view: ViewKey,
    settings: &InferenceSettings,
) -> Option<UnitQuaternion<f64>> {
    let viewpoint = graph.views.get(view)?;
    let intrinsics = viewpoint.camera.as_ref()?.intrinsics;
    let estimator = VanishingPointEstimator::new().epsilon(settings.solver_epsilon);

    let mut vanishing_points = Vec::new();
    for axis in Axis::ALL {
        let lines: Vec<_> = viewpoint.vanishing_lines_for(axis).cloned().collect();
        if let Some(vp) = estimator.estimate(&lines) {
            vanishing_points.push((axis, vp));
        }
    }
    orientation_hint(&intrinsics, &vanishing_points)
}

/// Applies a solver result to the graph.
///
/// The entire result is validated first: every referenced id must resolve
/// through `index` and every value must be finite, otherwise the matching
/// [`BridgeError`] is returned and the graph is untouched. A well-formed
/// result that the solver marked unsuccessful, or whose final cost exceeds
/// the acceptance threshold, also leaves the graph untouched and is reported
/// with `applied == false`.
pub fn ingest_result(
    graph: &mut SceneGraph,
    index: &SnapshotIndex,
    result: &SolveResult,
    settings: &InferenceSettings,
) -> Result<SolveDiagnostics, BridgeError> {
    if !result.final_cost.is_finite() {
        return Err(BridgeError::NonFinite("final_cost".to_string()));
    }
    for (id, xyz) in &result.optimized_points {
        if index.point(id).is_none() {
            return Err(BridgeError::UnknownPointId(id.clone()));
        }
        if xyz.iter().any(|v| !v.is_finite()) {
            return Err(BridgeError::NonFinite(format!("optimized_points[{id}]")));
        }
    }
    for (image_id, points) in &result.reprojections {
        if index.view(image_id).is_none() {
            return Err(BridgeError::UnknownImageId(image_id.clone()));
        }
        for (point_id, uv) in points {
            if index.point(point_id).is_none() {
                return Err(BridgeError::UnknownPointId(point_id.clone()));
            }
            if uv.iter().any(|v| !v.is_finite()) {
                return Err(BridgeError::NonFinite(format!(
                    "reprojections[{image_id}][{point_id}]"
                )));
            }
        }
    }

    let mut diagnostics = SolveDiagnostics {
        applied: false,
        success: result.success,
        iterations: result.iterations,
        final_cost: result.final_cost,
        convergence_reason: result.convergence_reason.clone(),
        computation_time: result.computation_time,
    };

    if !result.success {
        info!(
            "solve failed after {} iterations: {}",
            result.iterations, result.convergence_reason
        );
        return Ok(diagnostics);
    }
    if result.final_cost > settings.max_final_cost {
        info!(
            "solve rejected: final cost {} exceeds acceptance threshold {}",
            result.final_cost, settings.max_final_cost
        );
        return Ok(diagnostics);
    }

    // Everything validated; commit.
    for (id, &xyz) in &result.optimized_points {
        let key = index.point(id).expect("validated above");
        if let Some(point) = graph.points.get_mut(key) {
            point.optimized = Some(xyz);
        }
    }
    for (image_id, points) in &result.reprojections {
        let view_key = index.view(image_id).expect("validated above");
        let Some(view) = graph.views.get_mut(view_key) else {
            continue;
        };
        for (point_id, &uv) in points {
            let point_key = index.point(point_id).expect("validated above");
            for observation in view
                .observations
                .iter_mut()
                .filter(|o| o.point == point_key)
            {
                observation.reprojected = Some(uv);
            }
        }
    }

    diagnostics.applied = true;
    info!(
        "solve applied: {} points optimized, final cost {}",
        result.optimized_points.len(),
        result.final_cost
    );
    Ok(diagnostics)
}
