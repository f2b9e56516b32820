//! Vanishing-point estimation and camera-orientation hints.

use float_ord::FloatOrd;
use sightline_core::nalgebra::{
    Matrix3, Point2, Rotation3, UnitQuaternion, Vector3,
};
use sightline_core::{Axis, CameraIntrinsics, VanishingLine};

/// The homogeneous image line through two pixel locations, scaled so the
/// direction part `(a, b)` has unit norm.
///
/// With that scaling, `l · (u, v, 1)` is the signed pixel distance from
/// `(u, v)` to the line, which makes accumulated squared residuals geometric.
///
/// Returns `None` for coincident endpoints.
pub fn homogeneous_line(p1: Point2<f64>, p2: Point2<f64>) -> Option<Vector3<f64>> {
    let l = p1.to_homogeneous().cross(&p2.to_homogeneous());
    let direction_norm = (l.x * l.x + l.y * l.y).sqrt();
    if direction_norm < 1e-12 {
        return None;
    }
    Some(l / direction_norm)
}

/// Estimates the common intersection of two or more image lines.
///
/// Two lines intersect exactly at their homogeneous cross product. For more
/// lines the estimator minimizes the sum of squared point-to-line distances:
/// the minimizer is the eigenvector of `Σ lᵢlᵢᵀ` with the smallest
/// eigenvalue. The result is a homogeneous image point; its third component
/// is (near) zero for a vanishing point at infinity.
///
/// ```
/// use sightline_geom::vanishing::VanishingPointEstimator;
/// use sightline_core::{nalgebra::Point2, Axis, VanishingLine};
///
/// // Two segments at a right angle meeting at (100, 50).
/// let lines = [
///     VanishingLine::new(Point2::new(0.0, 50.0), Point2::new(10.0, 50.0), Axis::X),
///     VanishingLine::new(Point2::new(100.0, 0.0), Point2::new(100.0, 10.0), Axis::X),
/// ];
/// let vp = VanishingPointEstimator::new().estimate(&lines).unwrap();
/// let p = vp.point().unwrap();
/// assert!((p - Point2::new(100.0, 50.0)).norm() < 1e-6);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct VanishingPointEstimator {
    epsilon: f64,
    max_iterations: usize,
}

impl VanishingPointEstimator {
    /// Creates a `VanishingPointEstimator` with default values.
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

    /// Estimates the vanishing point of the given segments.
    ///
    /// Needs at least two segments with distinct endpoints; returns `None`
    /// otherwise, or when the segments are all (near-)parallel in the image
    /// and no finite estimate exists numerically.
    pub fn estimate(&self, lines: &[VanishingLine]) -> Option<VanishingPoint> {
        let homogeneous: Vec<Vector3<f64>> = lines
            .iter()
            .filter_map(|l| homogeneous_line(l.p1, l.p2))
            .collect();
        if homogeneous.len() < 2 {
            return None;
        }

        let v = if homogeneous.len() == 2 {
            homogeneous[0].cross(&homogeneous[1])
        } else {
            let mut design: Matrix3<f64> = Matrix3::zeros();
            for l in &homogeneous {
                design += l * l.transpose();
            }
            let se = design.try_symmetric_eigen(self.epsilon, self.max_iterations)?;
            let smallest = (0..3).min_by_key(|&ix| FloatOrd(se.eigenvalues[ix]))?;
            se.eigenvectors.column(smallest).into_owned()
        };

        let norm = v.norm();
        if norm < 1e-12 || !v.iter().all(|n| n.is_finite()) {
            return None;
        }
        Some(VanishingPoint(v / norm))
    }
}

impl Default for VanishingPointEstimator {
    fn default() -> Self {
        Self {
            epsilon: 1e-12,
            max_iterations: 1000,
        }
    }
}

/// A unit-norm homogeneous vanishing point.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct VanishingPoint(pub Vector3<f64>);

impl VanishingPoint {
    /// The euclidean pixel location, unless the point is at infinity.
    pub fn point(&self) -> Option<Point2<f64>> {
        Point2::from_homogeneous(self.0)
    }

    /// The world-axis bearing seen from the camera, by back-projecting the
    /// vanishing point through the intrinsics.
    ///
    /// The sign of the bearing is ambiguous: a vanishing point does not say
    /// whether the axis runs toward or away from the camera.
    pub fn bearing(&self, intrinsics: &CameraIntrinsics) -> Option<Vector3<f64>> {
        let d = Vector3::new(
            (self.0.x - intrinsics.cx * self.0.z) / intrinsics.fx,
            (self.0.y - intrinsics.cy * self.0.z) / intrinsics.fy,
            self.0.z,
        );
        let norm = d.norm();
        if norm < 1e-12 {
            return None;
        }
        Some(d / norm)
    }
}

/// Builds a world-to-camera rotation hint from per-axis vanishing points.
///
/// Each `(axis, vanishing point)` pair yields the camera-frame bearing of
/// that world axis. Two axes suffice: the third is completed by the
/// right-handed cross product, and the result is re-orthonormalized before
/// conversion to a quaternion. Because vanishing points leave axis signs
/// ambiguous, the hint is one representative of several possible mirrored
/// orientations, which is what a bundle-adjustment initializer needs.
pub fn orientation_hint(
    intrinsics: &CameraIntrinsics,
    vanishing_points: &[(Axis, VanishingPoint)],
) -> Option<UnitQuaternion<f64>> {
    let mut columns: [Option<Vector3<f64>>; 3] = [None; 3];
    for (axis, vp) in vanishing_points {
        if columns[axis.index()].is_none() {
            columns[axis.index()] = vp.bearing(intrinsics);
        }
    }

    let known = columns.iter().filter(|c| c.is_some()).count();
    if known < 2 {
        return None;
    }

    // Complete the missing column with the right-handed cross product.
    if known == 2 {
        let missing = columns.iter().position(|c| c.is_none()).unwrap();
        let (a, b) = match missing {
            0 => (columns[1].unwrap(), columns[2].unwrap()),
            1 => (columns[2].unwrap(), columns[0].unwrap()),
            _ => (columns[0].unwrap(), columns[1].unwrap()),
        };
        columns[missing] = Some(a.cross(&b));
    }

    let matrix = Matrix3::from_columns(&[
        columns[0].unwrap(),
        columns[1].unwrap(),
        columns[2].unwrap(),
    ]);
    // from_matrix orthonormalizes the possibly-skewed estimate.
    let rotation = Rotation3::from_matrix(&matrix);
    if rotation.matrix().iter().any(|n| !n.is_finite()) {
        return None;
    }
    Some(UnitQuaternion::from_rotation_matrix(&rotation))
}
