use nalgebra::Vector3;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Pinhole intrinsics with optional radial distortion.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// Radial distortion coefficients `[k1, k2]`.
    pub distortion: Option<[f64; 2]>,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            distortion: None,
        }
    }

    /// Flattens to the wire layout `[fx, fy, cx, cy, k1?, k2?]`.
    pub fn to_vec(&self) -> Vec<f64> {
        let mut v = vec![self.fx, self.fy, self.cx, self.cy];
        if let Some([k1, k2]) = self.distortion {
            v.push(k1);
            v.push(k2);
        }
        v
    }

    /// Parses the wire layout `[fx, fy, cx, cy, k1?, k2?]`.
    pub fn from_slice(k: &[f64]) -> Option<Self> {
        if k.len() < 4 || k.len() > 6 {
            return None;
        }
        let distortion = match k.len() {
            5 => Some([k[4], 0.0]),
            6 => Some([k[4], k[5]]),
            _ => None,
        };
        Some(Self {
            fx: k[0],
            fy: k[1],
            cx: k[2],
            cy: k[3],
            distortion,
        })
    }
}

/// Which parameter blocks the solver must hold fixed for a camera.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraLockFlags {
    pub intrinsics: bool,
    pub rotation: bool,
    pub translation: bool,
}

/// A world-to-camera pose as axis-angle rotation plus translation.
///
/// This is the unconstrained parameterization the external optimizer works
/// in; conversions to rotation types live in `sightline-geom`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraPose {
    /// Axis-angle rotation vector (world to camera).
    pub rotation: Vector3<f64>,
    /// Translation vector (world to camera).
    pub translation: Vector3<f64>,
}

impl CameraPose {
    pub fn identity() -> Self {
        Self {
            rotation: Vector3::zeros(),
            translation: Vector3::zeros(),
        }
    }
}

/// Full camera parameters for one viewpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Camera {
    pub intrinsics: CameraIntrinsics,
    pub pose: CameraPose,
    pub locks: CameraLockFlags,
}

impl Camera {
    pub fn new(intrinsics: CameraIntrinsics) -> Self {
        Self {
            intrinsics,
            pose: CameraPose::identity(),
            locks: CameraLockFlags::default(),
        }
    }
}
