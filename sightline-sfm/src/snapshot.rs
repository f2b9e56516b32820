//! The project snapshot: the persistence and transport boundary.
//!
//! The shape is `{version, world_points, images, cameras, constraints,
//! settings, diagnostics?}`. How it is stored or moved is owned externally;
//! this module only captures a [`SceneGraph`] into the shape and restores
//! one from it. The inferred layer is deliberately not persisted — it is a
//! derived cache, and a restored graph comes back fully dirty so the next
//! propagation rebuilds it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sightline_core::nalgebra::Point2;
use sightline_core::{
    Axis, Camera, CameraIntrinsics, CameraLockFlags, Constraint, GraphError, Line, LineDirection,
    LineKey, Observation, Plane, PlaneDefinition, PointKey, SceneGraph, VanishingLine, ViewKey,
    Viewpoint, WorldPoint,
};
use thiserror::Error;

use crate::bridge::SolveDiagnostics;
use crate::InferenceSettings;

pub const FORMAT_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestoreError {
    #[error("snapshot references unknown id {0:?}")]
    UnknownId(String),
    #[error("snapshot is structurally invalid: {0}")]
    Graph(#[from] GraphError),
    #[error("snapshot camera {0:?} has malformed intrinsics")]
    BadIntrinsics(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectPoint {
    pub locked_xyz: [Option<f64>; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized_xyz: Option<[f64; 3]>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectObservation {
    pub point: String,
    pub u: f64,
    pub v: f64,
    pub sigma: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprojected: Option<[f64; 2]>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectVanishingLine {
    pub p1: [f64; 2],
    pub p2: [f64; 2],
    pub axis: Axis,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectImage {
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,
    #[serde(default)]
    pub observations: Vec<ProjectObservation>,
    #[serde(default)]
    pub vanishing_lines: Vec<ProjectVanishingLine>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectCamera {
    pub image: String,
    /// `[fx, fy, cx, cy, k1?, k2?]`.
    pub intrinsics: Vec<f64>,
    pub rotation: [f64; 3],
    pub translation: [f64; 3],
    #[serde(default)]
    pub locks: CameraLockFlags,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectPlaneDefinition {
    ThreePoints { a: String, b: String, c: String },
    TwoLines { a: String, b: String },
    LinePoint { line: String, point: String },
}

/// Constraint rows. Lines and planes ride along in the same array with
/// their own tags so the whole geometric declaration set round-trips.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectConstraint {
    Line {
        id: String,
        a: String,
        b: String,
        #[serde(default)]
        direction: LineDirection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_length: Option<f64>,
        #[serde(default)]
        collinear: Vec<String>,
        #[serde(default)]
        construction: bool,
    },
    Plane {
        definition: ProjectPlaneDefinition,
    },
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
    ParallelLines {
        a: String,
        b: String,
    },
    PerpendicularLines {
        a: String,
        b: String,
    },
    EqualDistances {
        pairs: Vec<[String; 2]>,
    },
    EqualAngles {
        triplets: Vec<[String; 3]>,
    },
    Projection {
        point: String,
        image: String,
        u: f64,
        v: f64,
        sigma: f64,
    },
}

/// The whole project at the persistence boundary.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectSnapshot {
    pub version: String,
    pub world_points: BTreeMap<String, ProjectPoint>,
    pub images: BTreeMap<String, ProjectImage>,
    pub cameras: BTreeMap<String, ProjectCamera>,
    pub constraints: Vec<ProjectConstraint>,
    pub settings: InferenceSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<SolveDiagnostics>,
}

impl ProjectSnapshot {
    /// Captures the graph (and settings, and the latest solve diagnostics)
    /// into the snapshot shape.
    pub fn capture(
        graph: &SceneGraph,
        settings: &InferenceSettings,
        diagnostics: Option<SolveDiagnostics>,
    ) -> Self {
        let mut point_keys: Vec<PointKey> = graph.points.keys().collect();
        point_keys.sort();
        let mut point_ids: slotmap::SecondaryMap<PointKey, String> = Default::default();
        let mut world_points = BTreeMap::new();
        for (n, &key) in point_keys.iter().enumerate() {
            let id = format!("p{n}");
            let point = &graph.points[key];
            world_points.insert(
                id.clone(),
                ProjectPoint {
                    locked_xyz: point.locked,
                    optimized_xyz: point.optimized,
                },
            );
            point_ids.insert(key, id);
        }

        let mut view_keys: Vec<ViewKey> = graph.views.keys().collect();
        view_keys.sort();
        let mut images = BTreeMap::new();
        let mut cameras = BTreeMap::new();
        for (n, &key) in view_keys.iter().enumerate() {
            let image_id = format!("v{n}");
            let view = &graph.views[key];
            let camera_id = view.camera.as_ref().map(|camera| {
                let camera_id = format!("c{n}");
                cameras.insert(
                    camera_id.clone(),
                    ProjectCamera {
                        image: image_id.clone(),
                        intrinsics: camera.intrinsics.to_vec(),
                        rotation: camera.pose.rotation.into(),
                        translation: camera.pose.translation.into(),
                        locks: camera.locks,
                    },
                );
                camera_id
            });
            images.insert(
                image_id,
                ProjectImage {
                    width: view.width,
                    height: view.height,
                    camera: camera_id,
                    observations: view
                        .observations
                        .iter()
                        .map(|o| ProjectObservation {
                            point: point_ids[o.point].clone(),
                            u: o.u,
                            v: o.v,
                            sigma: o.sigma,
                            reprojected: o.reprojected,
                        })
                        .collect(),
                    vanishing_lines: view
                        .vanishing_lines
                        .iter()
                        .map(|l| ProjectVanishingLine {
                            p1: [l.p1.x, l.p1.y],
                            p2: [l.p2.x, l.p2.y],
                            axis: l.axis,
                        })
                        .collect(),
                },
            );
        }

        let mut line_ids: slotmap::SecondaryMap<LineKey, String> = Default::default();
        let mut constraints = Vec::new();
        for (n, &key) in graph.line_order().iter().enumerate() {
            let id = format!("l{n}");
            let line = &graph.lines[key];
            constraints.push(ProjectConstraint::Line {
                id: id.clone(),
                a: point_ids[line.a].clone(),
                b: point_ids[line.b].clone(),
                direction: line.direction,
                target_length: line.target_length,
                collinear: line.collinear.iter().map(|&p| point_ids[p].clone()).collect(),
                construction: line.construction,
            });
            line_ids.insert(key, id);
        }
        for plane in graph.planes.values() {
            let definition = match plane.definition {
                PlaneDefinition::ThreePoints(a, b, c) => ProjectPlaneDefinition::ThreePoints {
                    a: point_ids[a].clone(),
                    b: point_ids[b].clone(),
                    c: point_ids[c].clone(),
                },
                PlaneDefinition::TwoLines(a, b) => ProjectPlaneDefinition::TwoLines {
                    a: line_ids[a].clone(),
                    b: line_ids[b].clone(),
                },
                PlaneDefinition::LinePoint(l, p) => ProjectPlaneDefinition::LinePoint {
                    line: line_ids[l].clone(),
                    point: point_ids[p].clone(),
                },
            };
            constraints.push(ProjectConstraint::Plane { definition });
        }
        let mut view_ids: slotmap::SecondaryMap<ViewKey, String> = Default::default();
        for (n, &key) in view_keys.iter().enumerate() {
            view_ids.insert(key, format!("v{n}"));
        }
        for &ckey in graph.constraint_order() {
            constraints.push(match &graph.constraints[ckey] {
                Constraint::FixedPoint { point, xyz } => ProjectConstraint::FixedPoint {
                    point: point_ids[*point].clone(),
                    xyz: *xyz,
                },
                Constraint::Distance { a, b, value } => ProjectConstraint::Distance {
                    a: point_ids[*a].clone(),
                    b: point_ids[*b].clone(),
                    value: *value,
                },
                Constraint::Angle {
                    vertex,
                    a,
                    c,
                    radians,
                } => ProjectConstraint::Angle {
                    vertex: point_ids[*vertex].clone(),
                    a: point_ids[*a].clone(),
                    c: point_ids[*c].clone(),
                    radians: *radians,
                },
                Constraint::Collinear { points } => ProjectConstraint::Collinear {
                    points: points.iter().map(|&p| point_ids[p].clone()).collect(),
                },
                Constraint::Coplanar { points } => ProjectConstraint::Coplanar {
                    points: points.iter().map(|&p| point_ids[p].clone()).collect(),
                },
                Constraint::ParallelLines { a, b } => ProjectConstraint::ParallelLines {
                    a: line_ids[*a].clone(),
                    b: line_ids[*b].clone(),
                },
                Constraint::PerpendicularLines { a, b } => {
                    ProjectConstraint::PerpendicularLines {
                        a: line_ids[*a].clone(),
                        b: line_ids[*b].clone(),
                    }
                }
                Constraint::EqualDistances { pairs } => ProjectConstraint::EqualDistances {
                    pairs: pairs
                        .iter()
                        .map(|&(a, b)| [point_ids[a].clone(), point_ids[b].clone()])
                        .collect(),
                },
                Constraint::EqualAngles { triplets } => ProjectConstraint::EqualAngles {
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
                },
                Constraint::Projection {
                    point,
                    view,
                    u,
                    v,
                    sigma,
                } => ProjectConstraint::Projection {
                    point: point_ids[*point].clone(),
                    image: view_ids[*view].clone(),
                    u: *u,
                    v: *v,
                    sigma: *sigma,
                },
            });
        }

        Self {
            version: FORMAT_VERSION.to_string(),
            world_points,
            images,
            cameras,
            constraints,
            settings: *settings,
            diagnostics,
        }
    }

    /// Rebuilds a graph from the snapshot.
    ///
    /// The restored graph is fully dirty: inference has to run before any
    /// inferred value is available again.
    pub fn restore(&self) -> Result<(SceneGraph, InferenceSettings), RestoreError> {
        let mut graph = SceneGraph::new();

        let mut points: BTreeMap<&str, PointKey> = BTreeMap::new();
        for (id, entry) in &self.world_points {
            let mut point = WorldPoint::with_locked(entry.locked_xyz);
            point.optimized = entry.optimized_xyz;
            points.insert(id.as_str(), graph.add_point(point));
        }
        let point = |id: &String| -> Result<PointKey, RestoreError> {
            points
                .get(id.as_str())
                .copied()
                .ok_or_else(|| RestoreError::UnknownId(id.clone()))
        };

        let mut views: BTreeMap<&str, ViewKey> = BTreeMap::new();
        for (id, entry) in &self.images {
            views.insert(id.as_str(), graph.add_view(Viewpoint::new(entry.width, entry.height)));
        }
        for (camera_id, entry) in &self.cameras {
            let &view_key = views
                .get(entry.image.as_str())
                .ok_or_else(|| RestoreError::UnknownId(entry.image.clone()))?;
            let intrinsics = CameraIntrinsics::from_slice(&entry.intrinsics)
                .ok_or_else(|| RestoreError::BadIntrinsics(camera_id.clone()))?;
            let mut camera = Camera::new(intrinsics);
            camera.pose.rotation = entry.rotation.into();
            camera.pose.translation = entry.translation.into();
            camera.locks = entry.locks;
            graph.views[view_key].camera = Some(camera);
        }
        for (id, entry) in &self.images {
            let view_key = views[id.as_str()];
            for o in &entry.observations {
                let mut observation = Observation::new(point(&o.point)?, o.u, o.v);
                observation.sigma = o.sigma;
                observation.reprojected = o.reprojected;
                graph.add_observation(view_key, observation)?;
            }
            for l in &entry.vanishing_lines {
                graph.add_vanishing_line(
                    view_key,
                    VanishingLine::new(
                        Point2::new(l.p1[0], l.p1[1]),
                        Point2::new(l.p2[0], l.p2[1]),
                        l.axis,
                    ),
                )?;
            }
        }

        // Two passes over the constraint rows: lines first so planes and
        // line constraints can resolve their ids.
        let mut lines: BTreeMap<&str, LineKey> = BTreeMap::new();
        for row in &self.constraints {
            if let ProjectConstraint::Line {
                id,
                a,
                b,
                direction,
                target_length,
                collinear,
                construction,
            } = row
            {
                let mut line = Line::new(point(a)?, point(b)?);
                line.direction = *direction;
                line.target_length = *target_length;
                line.collinear = collinear.iter().map(&point).collect::<Result<_, _>>()?;
                line.construction = *construction;
                lines.insert(id.as_str(), graph.add_line(line)?);
            }
        }
        let line = |id: &String| -> Result<LineKey, RestoreError> {
            lines
                .get(id.as_str())
                .copied()
                .ok_or_else(|| RestoreError::UnknownId(id.clone()))
        };
        let view = |id: &String| -> Result<ViewKey, RestoreError> {
            views
                .get(id.as_str())
                .copied()
                .ok_or_else(|| RestoreError::UnknownId(id.clone()))
        };

        for row in &self.constraints {
            match row {
                ProjectConstraint::Line { .. } => {}
                ProjectConstraint::Plane { definition } => {
                    let definition = match definition {
                        ProjectPlaneDefinition::ThreePoints { a, b, c } => {
                            PlaneDefinition::ThreePoints(point(a)?, point(b)?, point(c)?)
                        }
                        ProjectPlaneDefinition::TwoLines { a, b } => {
                            PlaneDefinition::TwoLines(line(a)?, line(b)?)
                        }
                        ProjectPlaneDefinition::LinePoint { line: l, point: p } => {
                            PlaneDefinition::LinePoint(line(l)?, point(p)?)
                        }
                    };
                    graph.add_plane(Plane::new(definition))?;
                }
                other => {
                    let constraint = match other {
                        ProjectConstraint::FixedPoint { point: p, xyz } => {
                            Constraint::FixedPoint {
                                point: point(p)?,
                                xyz: *xyz,
                            }
                        }
                        ProjectConstraint::Distance { a, b, value } => Constraint::Distance {
                            a: point(a)?,
                            b: point(b)?,
                            value: *value,
                        },
                        ProjectConstraint::Angle {
                            vertex,
                            a,
                            c,
                            radians,
                        } => Constraint::Angle {
                            vertex: point(vertex)?,
                            a: point(a)?,
                            c: point(c)?,
                            radians: *radians,
                        },
                        ProjectConstraint::Collinear { points } => Constraint::Collinear {
                            points: points.iter().map(&point).collect::<Result<_, _>>()?,
                        },
                        ProjectConstraint::Coplanar { points } => Constraint::Coplanar {
                            points: points.iter().map(&point).collect::<Result<_, _>>()?,
                        },
                        ProjectConstraint::ParallelLines { a, b } => Constraint::ParallelLines {
                            a: line(a)?,
                            b: line(b)?,
                        },
                        ProjectConstraint::PerpendicularLines { a, b } => {
                            Constraint::PerpendicularLines {
                                a: line(a)?,
                                b: line(b)?,
                            }
                        }
                        ProjectConstraint::EqualDistances { pairs } => {
                            Constraint::EqualDistances {
                                pairs: pairs
                                    .iter()
                                    .map(|[a, b]| Ok((point(a)?, point(b)?)))
                                    .collect::<Result<_, RestoreError>>()?,
                            }
                        }
                        ProjectConstraint::EqualAngles { triplets } => Constraint::EqualAngles {
                            triplets: triplets
                                .iter()
                                .map(|[v, a, c]| Ok((point(v)?, point(a)?, point(c)?)))
                                .collect::<Result<_, RestoreError>>()?,
                        },
                        ProjectConstraint::Projection {
                            point: p,
                            image,
                            u,
                            v,
                            sigma,
                        } => Constraint::Projection {
                            point: point(p)?,
                            view: view(image)?,
                            u: *u,
                            v: *v,
                            sigma: *sigma,
                        },
                        ProjectConstraint::Line { .. } | ProjectConstraint::Plane { .. } => {
                            unreachable!("handled above")
                        }
                    };
                    graph.add_constraint(constraint)?;
                }
            }
        }

        graph.mark_all_dirty();
        Ok((graph, self.settings))
    }
}
