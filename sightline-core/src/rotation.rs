use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{UnitQuaternion, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// An axis-angle rotation vector: direction is the rotation axis, magnitude
/// is the angle in radians.
///
/// This is the unconstrained three-parameter form used on the solver
/// boundary, where free variables must have no unit-norm constraint. For all
/// actual rotation math convert to a [`UnitQuaternion`] and back through the
/// `From` impls, which are the exponential and logarithm maps.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct AxisAngle(pub Vector3<f64>);

impl AxisAngle {
    pub fn identity() -> Self {
        Self(Vector3::zeros())
    }

    /// Converts to a unit quaternion.
    pub fn quaternion(self) -> UnitQuaternion<f64> {
        self.into()
    }
}

/// The exponential map.
impl From<AxisAngle> for UnitQuaternion<f64> {
    fn from(aa: AxisAngle) -> Self {
        UnitQuaternion::from_scaled_axis(aa.0)
    }
}

/// The log map.
impl From<UnitQuaternion<f64>> for AxisAngle {
    fn from(q: UnitQuaternion<f64>) -> Self {
        let scaled = q.scaled_axis();
        // Guard against NaN from a degenerate quaternion.
        if scaled.iter().any(|n| n.is_nan()) {
            Self(Vector3::zeros())
        } else {
            Self(scaled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exp_log_round_trip() {
        let aa = AxisAngle(Vector3::new(0.1, -0.2, 0.3));
        let back: AxisAngle = aa.quaternion().into();
        assert!((aa.0 - back.0).norm() < 1e-12);
    }

    #[test]
    fn identity_maps_to_identity() {
        let q: UnitQuaternion<f64> = AxisAngle::identity().into();
        assert_eq!(q, UnitQuaternion::identity());
    }
}
