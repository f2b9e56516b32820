use derive_more::{AsRef, From, Into};
use nalgebra::{Point3, Vector3, Vector4};

use crate::{LineKey, PointKey};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// How a [`Plane`] is anchored to the rest of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(rename_all = "snake_case"))]
pub enum PlaneDefinition {
    /// The plane through three distinct points.
    ThreePoints(PointKey, PointKey, PointKey),
    /// The best-fit plane through the four endpoints of two lines.
    TwoLines(LineKey, LineKey),
    /// The best-fit plane through a line's endpoints and one more point.
    LinePoint(LineKey, PointKey),
}

/// A plane anchored to points or lines of the graph.
///
/// The numeric equation is derived geometry, not stored state; fit it from
/// the current effective positions of the defining entities when needed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Plane {
    pub definition: PlaneDefinition,
}

impl Plane {
    pub fn new(definition: PlaneDefinition) -> Self {
        Self { definition }
    }
}

/// A plane equation `ax + by + cz + d = 0` with unit normal.
///
/// The stored coefficients always satisfy `a² + b² + c² = 1`. The sign of the
/// normal carries no meaning; use [`PlaneEquation::approx_eq`] to compare
/// equations up to sign.
#[derive(Debug, Clone, Copy, PartialEq, AsRef, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PlaneEquation(pub Vector4<f64>);

impl PlaneEquation {
    /// Builds an equation from an arbitrary (non-zero) normal and offset,
    /// normalizing so the normal has unit length.
    ///
    /// Returns `None` when the normal is degenerate.
    pub fn new(normal: Vector3<f64>, d: f64) -> Option<Self> {
        let norm = normal.norm();
        if norm < 1e-12 || !norm.is_finite() {
            return None;
        }
        Some(Self(Vector4::new(
            normal.x / norm,
            normal.y / norm,
            normal.z / norm,
            d / norm,
        )))
    }

    /// The plane through a point with the given (non-zero) normal.
    pub fn from_point_normal(point: Point3<f64>, normal: Vector3<f64>) -> Option<Self> {
        Self::new(normal, -normal.dot(&point.coords))
    }

    /// The unit normal `[a, b, c]`.
    pub fn normal(&self) -> Vector3<f64> {
        self.0.xyz()
    }

    /// The offset coefficient `d`.
    pub fn offset(&self) -> f64 {
        self.0.w
    }

    /// Signed distance from the point to the plane.
    ///
    /// The sign depends on the (arbitrary) normal orientation; callers that
    /// care about deviation should take the absolute value.
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        self.normal().dot(&point.coords) + self.offset()
    }

    /// Compares two equations up to the sign of the normal.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        let same = (self.0 - other.0).norm() <= tolerance;
        let flipped = (self.0 + other.0).norm() <= tolerance;
        same || flipped
    }
}
