use nalgebra::Point2;

use crate::{Axis, Camera, PointKey};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// An observed image location of a world point in one viewpoint.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Observation {
    pub point: PointKey,
    pub u: f64,
    pub v: f64,
    /// Measurement uncertainty in pixels.
    pub sigma: f64,
    /// Image location predicted by the last successful solve.
    pub reprojected: Option<[f64; 2]>,
}

impl Observation {
    pub fn new(point: PointKey, u: f64, v: f64) -> Self {
        Self {
            point,
            u,
            v,
            sigma: 1.0,
            reprojected: None,
        }
    }
}

/// An image-space line segment declared to vanish along a world axis.
///
/// Two or more vanishing lines sharing an axis in one viewpoint are needed
/// before that axis's vanishing point can be estimated.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct VanishingLine {
    pub p1: Point2<f64>,
    pub p2: Point2<f64>,
    pub axis: Axis,
}

impl VanishingLine {
    pub fn new(p1: Point2<f64>, p2: Point2<f64>, axis: Axis) -> Self {
        Self { p1, p2, axis }
    }
}

/// One photograph: its pixel dimensions, camera parameters, observations of
/// world points, and user-drawn vanishing lines.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Viewpoint {
    pub width: u32,
    pub height: u32,
    pub camera: Option<Camera>,
    pub observations: Vec<Observation>,
    pub vanishing_lines: Vec<VanishingLine>,
}

impl Viewpoint {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            camera: None,
            observations: Vec::new(),
            vanishing_lines: Vec::new(),
        }
    }

    /// Whether pixel coordinates fall inside the image bounds.
    pub fn contains_pixel(&self, u: f64, v: f64) -> bool {
        u >= 0.0 && u < self.width as f64 && v >= 0.0 && v < self.height as f64
    }

    /// All observations of one world point.
    pub fn observations_of(&self, point: PointKey) -> impl Iterator<Item = &Observation> {
        self.observations.iter().filter(move |o| o.point == point)
    }

    /// The vanishing lines declared for one axis.
    pub fn vanishing_lines_for(&self, axis: Axis) -> impl Iterator<Item = &VanishingLine> {
        self.vanishing_lines.iter().filter(move |l| l.axis == axis)
    }
}
