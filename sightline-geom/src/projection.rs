//! Pinhole projection with optional radial distortion.
//!
//! Positions are world coordinates; camera poses map world to camera with
//! X right, Y down and Z forward out of the optical center.

use sightline_core::nalgebra::{Point3, UnitQuaternion, Vector3};
use sightline_core::{AxisAngle, Camera, CameraPose};

/// Projects a world point into pixel coordinates.
///
/// Returns `None` for points at or behind the optical center, which have no
/// image.
///
/// ```
/// use sightline_geom::projection::project;
/// use sightline_core::{nalgebra::Point3, Camera, CameraIntrinsics};
///
/// let camera = Camera::new(CameraIntrinsics::new(100.0, 100.0, 50.0, 50.0));
/// // A point one unit ahead of the identity camera hits the principal point.
/// let uv = project(&camera, &Point3::new(0.0, 0.0, 1.0)).unwrap();
/// assert!((uv[0] - 50.0).abs() < 1e-12 && (uv[1] - 50.0).abs() < 1e-12);
/// // A point behind the camera has no image.
/// assert!(project(&camera, &Point3::new(0.0, 0.0, -1.0)).is_none());
/// ```
pub fn project(camera: &Camera, point: &Point3<f64>) -> Option<[f64; 2]> {
    let q: UnitQuaternion<f64> = AxisAngle(camera.pose.rotation).into();
    let in_camera = q.transform_vector(&point.coords) + camera.pose.translation;
    if in_camera.z <= 1e-9 {
        return None;
    }

    let mut x = in_camera.x / in_camera.z;
    let mut y = in_camera.y / in_camera.z;

    if let Some([k1, k2]) = camera.intrinsics.distortion {
        let r2 = x * x + y * y;
        let radial = 1.0 + k1 * r2 + k2 * r2 * r2;
        x *= radial;
        y *= radial;
    }

    let k = &camera.intrinsics;
    Some([k.fx * x + k.cx, k.fy * y + k.cy])
}

/// Unprojects a pixel location to the world point at the given depth along
/// its ray. Distortion is ignored; this is the ideal pinhole inverse.
pub fn unproject(camera: &Camera, u: f64, v: f64, depth: f64) -> Point3<f64> {
    let k = &camera.intrinsics;
    let in_camera = Vector3::new(
        (u - k.cx) / k.fx * depth,
        (v - k.cy) / k.fy * depth,
        depth,
    );
    let q: UnitQuaternion<f64> = AxisAngle(camera.pose.rotation).into();
    Point3::from(q.inverse_transform_vector(&(in_camera - camera.pose.translation)))
}

/// The camera's optical center in world coordinates.
pub fn optical_center(pose: &CameraPose) -> Point3<f64> {
    let q: UnitQuaternion<f64> = AxisAngle(pose.rotation).into();
    Point3::from(q.inverse_transform_vector(&-pose.translation))
}

/// Pixel distance between an observation and the projection of a point.
///
/// Returns `None` when the point does not project.
pub fn reprojection_error(camera: &Camera, point: &Point3<f64>, u: f64, v: f64) -> Option<f64> {
    let [pu, pv] = project(camera, point)?;
    Some(((pu - u).powi(2) + (pv - v).powi(2)).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_core::CameraIntrinsics;

    fn camera() -> Camera {
        let mut camera = Camera::new(CameraIntrinsics::new(120.0, 110.0, 64.0, 48.0));
        camera.pose.rotation = Vector3::new(0.1, -0.2, 0.05);
        camera.pose.translation = Vector3::new(0.3, -0.4, 1.5);
        camera
    }

    #[test]
    fn project_unproject_round_trip() {
        let camera = camera();
        let world = Point3::new(0.4, 0.2, 2.0);
        let q: UnitQuaternion<f64> =
            AxisAngle(camera.pose.rotation).into();
        let depth = (q.transform_vector(&world.coords) + camera.pose.translation).z;

        let [u, v] = project(&camera, &world).unwrap();
        let back = unproject(&camera, u, v, depth);
        assert!((back - world).norm() < 1e-9);
    }

    #[test]
    fn optical_center_projects_nowhere() {
        let camera = camera();
        let center = optical_center(&camera.pose);
        assert!(project(&camera, &center).is_none());
    }

    #[test]
    fn distortion_pushes_points_outward() {
        let mut camera = Camera::new(CameraIntrinsics::new(100.0, 100.0, 0.0, 0.0));
        let ideal = project(&camera, &Point3::new(0.5, 0.0, 1.0)).unwrap();
        camera.intrinsics.distortion = Some([0.1, 0.0]);
        let distorted = project(&camera, &Point3::new(0.5, 0.0, 1.0)).unwrap();
        assert!(distorted[0] > ideal[0]);
    }

    #[test]
    fn reprojection_error_is_zero_at_the_projection() {
        let camera = camera();
        let world = Point3::new(0.1, 0.1, 3.0);
        let [u, v] = project(&camera, &world).unwrap();
        assert!(reprojection_error(&camera, &world, u, v).unwrap() < 1e-9);
    }
}
