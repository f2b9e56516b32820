//! Closed-form solving for line direction/length declarations and collinear
//! point placement.

use sightline_core::nalgebra::{Point3, Vector3};
use sightline_core::{Axis, LineDirection};

/// The endpoint reached by walking `length` along the positive direction of
/// `axis` from `origin`.
///
/// This is the canonical choice when a line declares an axis direction and a
/// target length but only one endpoint is known.
///
/// ```
/// use sightline_geom::direction::axis_offset_endpoint;
/// use sightline_core::{nalgebra::Point3, Axis};
///
/// let b = axis_offset_endpoint(Point3::new(0.0, 0.0, 0.0), Axis::Z, 2.0);
/// assert_eq!(b, Point3::new(0.0, 0.0, 2.0));
/// ```
pub fn axis_offset_endpoint(origin: Point3<f64>, axis: Axis, length: f64) -> Point3<f64> {
    origin + axis.unit() * length
}

/// The largest deviation, across the axes pinned by `direction`, between the
/// two endpoints of a line.
///
/// Zero means the endpoints satisfy the declared direction exactly; a free
/// direction always reports zero.
pub fn alignment_deviation(a: Point3<f64>, b: Point3<f64>, direction: LineDirection) -> f64 {
    direction
        .pinned_axes()
        .iter()
        .map(|axis| (a[axis.index()] - b[axis.index()]).abs())
        .fold(0.0, f64::max)
}

/// The difference between the actual endpoint distance and a target length.
pub fn length_deviation(a: Point3<f64>, b: Point3<f64>, target_length: f64) -> f64 {
    ((b - a).norm() - target_length).abs()
}

/// Least-squares line parameter `t` for a partially-known point on the line
/// `a + t·(b − a)`, using only the point's known axes.
///
/// Returns `None` when no known axis carries any signal about `t` — either
/// the point has no known axes at all (the point is underdetermined on this
/// line) or the line has no extent along any of them.
///
/// ```
/// use sightline_geom::direction::line_parameter;
/// use sightline_core::nalgebra::Point3;
///
/// let a = Point3::new(0.0, 0.0, 0.0);
/// let b = Point3::new(2.0, 0.0, 0.0);
/// // A point with known x = 1 sits halfway along the segment.
/// assert!((line_parameter(a, b, [Some(1.0), None, None]).unwrap() - 0.5).abs() < 1e-12);
/// // A point with no known axes is underdetermined.
/// assert!(line_parameter(a, b, [None; 3]).is_none());
/// ```
pub fn line_parameter(
    a: Point3<f64>,
    b: Point3<f64>,
    known: [Option<f64>; 3],
) -> Option<f64> {
    let d: Vector3<f64> = b - a;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for axis in Axis::ALL {
        let ix = axis.index();
        if let Some(value) = known[ix] {
            numerator += d[ix] * (value - a[ix]);
            denominator += d[ix] * d[ix];
        }
    }
    if denominator < 1e-12 {
        return None;
    }
    Some(numerator / denominator)
}

/// The point at parameter `t` on the line `a + t·(b − a)`.
pub fn point_on_line(a: Point3<f64>, b: Point3<f64>, t: f64) -> Point3<f64> {
    a + (b - a) * t
}

/// Euclidean distance from `p` to the infinite line through `a` and `b`.
///
/// Returns `None` when the anchors coincide.
pub fn distance_to_line(p: Point3<f64>, a: Point3<f64>, b: Point3<f64>) -> Option<f64> {
    let d: Vector3<f64> = b - a;
    let norm = d.norm();
    if norm < 1e-12 {
        return None;
    }
    Some((p - a).cross(&d).norm() / norm)
}
