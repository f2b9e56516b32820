//! Quaternion helpers for camera-orientation hints.
//!
//! These are the operations the rest of the workspace needs when expressing
//! orientation hints and solver parameterizations: rotating vectors,
//! inverting and composing rotations, and moving between the axis-angle wire
//! form and unit quaternions.

use sightline_core::nalgebra::{UnitQuaternion, Vector3};
use sightline_core::AxisAngle;

/// Rotates a vector by a unit quaternion.
///
/// ```
/// use sightline_geom::rotation::rotate_vector;
/// use sightline_core::nalgebra::{UnitQuaternion, Vector3};
///
/// let q = UnitQuaternion::from_scaled_axis(Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2));
/// let v = rotate_vector(&q, &Vector3::new(1.0, 0.0, 0.0));
/// assert!((v - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
/// ```
pub fn rotate_vector(q: &UnitQuaternion<f64>, v: &Vector3<f64>) -> Vector3<f64> {
    q.transform_vector(v)
}

/// The inverse rotation.
///
/// ```
/// use sightline_geom::rotation::{inverse, rotate_vector};
/// use sightline_core::nalgebra::{UnitQuaternion, Vector3};
///
/// let q = UnitQuaternion::from_scaled_axis(Vector3::new(0.3, -0.1, 0.2));
/// let v = Vector3::new(1.0, 2.0, 3.0);
/// let back = rotate_vector(&inverse(&q), &rotate_vector(&q, &v));
/// assert!((back - v).norm() < 1e-12);
/// ```
pub fn inverse(q: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
    q.inverse()
}

/// Composes two rotations; the result applies `second` after `first`.
pub fn multiply(
    second: &UnitQuaternion<f64>,
    first: &UnitQuaternion<f64>,
) -> UnitQuaternion<f64> {
    second * first
}

/// Converts an axis-angle rotation vector to a unit quaternion.
pub fn from_axis_angle(axis_angle: AxisAngle) -> UnitQuaternion<f64> {
    axis_angle.into()
}

/// Converts a unit quaternion to its axis-angle rotation vector.
pub fn to_axis_angle(q: &UnitQuaternion<f64>) -> AxisAngle {
    (*q).into()
}
