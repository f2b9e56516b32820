//! Least-squares plane fitting and single-axis coplanar solving.

use float_ord::FloatOrd;
use sightline_core::nalgebra::{Matrix3, Point3, Vector3};
use sightline_core::{Axis, PlaneEquation};

/// Fits `ax + by + cz + d = 0` to three or more points by minimizing the sum
/// of squared point-to-plane distances.
///
/// The normal is the eigenvector of the centered scatter matrix with the
/// smallest eigenvalue. The fit fails on fewer than three points, on
/// (near-)collinear input where the plane is not unique, and on non-finite
/// results.
///
/// ```
/// use sightline_geom::plane_fit::PlaneFitter;
/// use sightline_core::nalgebra::Point3;
///
/// let points = [
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
///     Point3::new(1.0, 1.0, 0.0),
/// ];
/// let eq = PlaneFitter::new().fit(&points).unwrap();
/// // The fitted plane is z = 0 up to normal sign.
/// assert!(eq.normal().z.abs() > 1.0 - 1e-9);
/// assert!(eq.offset().abs() < 1e-9);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct PlaneFitter {
    epsilon: f64,
    max_iterations: usize,
}

impl PlaneFitter {
    /// Creates a `PlaneFitter` with default values.
    ///
    /// Same as calling [`Default::default`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the epsilon used in the symmetric eigen solver.
    ///
    /// Default is `1e-12`.
    #[must_use]
    pub fn epsilon(self, epsilon: f64) -> Self {
        Self { epsilon, ..self }
    }

    /// Set the maximum number of iterations for the symmetric eigen solver.
    ///
    /// Default is `1000`.
    #[must_use]
    pub fn max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    pub fn fit(&self, points: &[Point3<f64>]) -> Option<PlaneEquation> {
        if points.len() < 3 {
            return None;
        }

        let n = points.len() as f64;
        let centroid: Vector3<f64> = points.iter().map(|p| p.coords).sum::<Vector3<f64>>() / n;

        let mut scatter: Matrix3<f64> = Matrix3::zeros();
        for p in points {
            let r = p.coords - centroid;
            scatter += r * r.transpose();
        }

        let se = scatter.try_symmetric_eigen(self.epsilon, self.max_iterations)?;
        let mut indices: Vec<usize> = (0..3).collect();
        indices.sort_by_key(|&ix| FloatOrd(se.eigenvalues[ix]));
        let (smallest, middle) = (indices[0], indices[1]);

        // A unique plane needs spread in two directions; a collinear set has
        // two near-zero eigenvalues.
        let spread = se.eigenvalues[middle].abs();
        if spread <= self.epsilon * (1.0 + scatter.norm()) {
            return None;
        }

        let normal = se.eigenvectors.column(smallest).into_owned();
        PlaneEquation::from_point_normal(centroid.into(), normal)
            .filter(|eq| eq.0.iter().all(|v| v.is_finite()))
    }
}

impl Default for PlaneFitter {
    fn default() -> Self {
        Self {
            epsilon: 1e-12,
            max_iterations: 1000,
        }
    }
}

/// The largest absolute point-to-plane distance across a point set.
pub fn max_deviation(equation: &PlaneEquation, points: &[Point3<f64>]) -> f64 {
    points
        .iter()
        .map(|p| equation.signed_distance(p).abs())
        .fold(0.0, f64::max)
}

/// Solves the one unknown axis of a point from a plane equation, given the
/// other two axes.
///
/// Returns `None` when the plane is (near-)parallel to the unknown axis, in
/// which case the equation carries no information about it.
///
/// ```
/// use sightline_geom::plane_fit::solve_plane_axis;
/// use sightline_core::{nalgebra::Vector3, Axis, PlaneEquation};
///
/// // The plane z = 4.
/// let eq = PlaneEquation::new(Vector3::new(0.0, 0.0, 1.0), -4.0).unwrap();
/// let z = solve_plane_axis(&eq, [Some(1.0), Some(2.0), None], Axis::Z).unwrap();
/// assert!((z - 4.0).abs() < 1e-12);
/// // The same plane says nothing about x.
/// assert!(solve_plane_axis(&eq, [None, Some(2.0), Some(4.0)], Axis::X).is_none());
/// ```
pub fn solve_plane_axis(
    equation: &PlaneEquation,
    known: [Option<f64>; 3],
    unknown: Axis,
) -> Option<f64> {
    let normal = equation.normal();
    let coefficient = normal[unknown.index()];
    if coefficient.abs() < 1e-9 {
        return None;
    }
    let mut rest = equation.offset();
    for axis in Axis::ALL {
        if axis == unknown {
            continue;
        }
        rest += normal[axis.index()] * known[axis.index()]?;
    }
    Some(-rest / coefficient)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_a_tilted_plane() {
        // x + y + z = 3, sampled away from any axis plane.
        let points = [
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(0.0, 3.0, 0.0),
            Point3::new(0.0, 0.0, 3.0),
            Point3::new(1.0, 1.0, 1.0),
        ];
        let eq = PlaneFitter::new().fit(&points).unwrap();
        let expected =
            PlaneEquation::new(Vector3::new(1.0, 1.0, 1.0), -3.0).unwrap();
        assert!(eq.approx_eq(&expected, 1e-9));
        assert!(max_deviation(&eq, &points) < 1e-9);
    }

    #[test]
    fn rejects_collinear_points() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ];
        assert!(PlaneFitter::new().fit(&points).is_none());
    }

    #[test]
    fn deviation_reports_the_perturbed_point() {
        let mut points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let eq = PlaneFitter::new().fit(&points).unwrap();
        points.push(Point3::new(1.0, 1.0, 1.0));
        assert!((max_deviation(&eq, &points) - 1.0).abs() < 1e-9);
    }
}
