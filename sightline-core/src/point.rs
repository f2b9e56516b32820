use crate::Axis;
use nalgebra::Point3;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// How well constrained a [`WorldPoint`] currently is.
///
/// An axis counts as *known* when either a locked or an inferred value
/// supplies it. Optimized values deliberately do not count: they are a solve
/// artifact, not constraint knowledge, and disappear as soon as the geometry
/// changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(rename_all = "snake_case"))]
pub enum ConstraintStatus {
    /// All three axes are locked by the user.
    Locked,
    /// All three axes are known and at least one was inferred.
    Inferred,
    /// One or two axes are known.
    Partial,
    /// No axis is known.
    Free,
}

/// A 3d point in world coordinates.
///
/// The position of a point is split into three layers. `locked` holds
/// user-declared per-axis values and is authoritative. `inferred` is filled
/// in by constraint propagation and must never be set by hand; it is an
/// ephemeral cache that is recomputed whenever an upstream locked value,
/// constraint, or piece of topology changes. `optimized` is written only by a
/// successful external solve and persists until the geometry changes or
/// another solve overwrites it.
///
/// The coordinate actually used for an axis is `locked ?? inferred ??
/// optimized`; see [`WorldPoint::effective`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct WorldPoint {
    /// Per-axis user-declared values. `None` leaves the axis free.
    pub locked: [Option<f64>; 3],
    /// Per-axis values derived by the propagator. Never set these directly.
    pub inferred: [Option<f64>; 3],
    /// Position from the last successful solve, if any.
    pub optimized: Option<[f64; 3]>,
    /// Set when propagation hit its pass cap while this point was still
    /// changing.
    pub unstable: bool,
}

impl WorldPoint {
    /// A point with no knowledge on any axis.
    pub fn free() -> Self {
        Self::default()
    }

    /// A point locked on all three axes.
    pub fn locked_at(x: f64, y: f64, z: f64) -> Self {
        Self {
            locked: [Some(x), Some(y), Some(z)],
            ..Self::default()
        }
    }

    /// A point with the given per-axis locks.
    pub fn with_locked(locked: [Option<f64>; 3]) -> Self {
        Self {
            locked,
            ..Self::default()
        }
    }

    /// The effective value of one axis: `locked ?? inferred ?? optimized`.
    pub fn effective_axis(&self, axis: Axis) -> Option<f64> {
        let ix = axis.index();
        self.locked[ix]
            .or(self.inferred[ix])
            .or(self.optimized.map(|xyz| xyz[ix]))
    }

    /// The effective value of all three axes.
    pub fn effective(&self) -> [Option<f64>; 3] {
        [
            self.effective_axis(Axis::X),
            self.effective_axis(Axis::Y),
            self.effective_axis(Axis::Z),
        ]
    }

    /// The effective position, if every axis has a value.
    pub fn effective_point(&self) -> Option<Point3<f64>> {
        let [x, y, z] = self.effective();
        Some(Point3::new(x?, y?, z?))
    }

    /// Whether this axis is supplied by a locked or inferred value.
    pub fn is_known(&self, axis: Axis) -> bool {
        let ix = axis.index();
        self.locked[ix].is_some() || self.inferred[ix].is_some()
    }

    /// The known (locked or inferred, not optimized) value of an axis.
    pub fn known_axis(&self, axis: Axis) -> Option<f64> {
        let ix = axis.index();
        self.locked[ix].or(self.inferred[ix])
    }

    /// The known position, if every axis is locked or inferred.
    pub fn known_point(&self) -> Option<Point3<f64>> {
        Some(Point3::new(
            self.known_axis(Axis::X)?,
            self.known_axis(Axis::Y)?,
            self.known_axis(Axis::Z)?,
        ))
    }

    /// Classifies the point from its current locked and inferred layers.
    pub fn status(&self) -> ConstraintStatus {
        let locked = self.locked.iter().filter(|v| v.is_some()).count();
        let known = Axis::ALL.iter().filter(|&&a| self.is_known(a)).count();
        match (locked, known) {
            (3, _) => ConstraintStatus::Locked,
            (_, 3) => ConstraintStatus::Inferred,
            (_, 0) => ConstraintStatus::Free,
            _ => ConstraintStatus::Partial,
        }
    }

    /// Drops the inferred layer and the unstable flag ahead of re-propagation.
    pub fn clear_inferred(&mut self) {
        self.inferred = [None; 3];
        self.unstable = false;
    }

    /// Drops the optimized layer, e.g. after the geometry changed.
    pub fn clear_optimized(&mut self) {
        self.optimized = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_prefers_locked_then_inferred_then_optimized() {
        let mut p = WorldPoint::free();
        p.optimized = Some([7.0, 8.0, 9.0]);
        p.inferred[1] = Some(4.0);
        p.locked[0] = Some(1.0);
        assert_eq!(p.effective(), [Some(1.0), Some(4.0), Some(9.0)]);
    }

    #[test]
    fn status_classification() {
        assert_eq!(WorldPoint::free().status(), ConstraintStatus::Free);
        assert_eq!(
            WorldPoint::locked_at(0.0, 0.0, 0.0).status(),
            ConstraintStatus::Locked
        );
        let mut p = WorldPoint::with_locked([Some(1.0), None, None]);
        assert_eq!(p.status(), ConstraintStatus::Partial);
        p.inferred = [None, Some(2.0), Some(3.0)];
        assert_eq!(p.status(), ConstraintStatus::Inferred);
    }

    #[test]
    fn optimized_does_not_count_as_known() {
        let mut p = WorldPoint::free();
        p.optimized = Some([1.0, 2.0, 3.0]);
        assert_eq!(p.status(), ConstraintStatus::Free);
        assert!(p.effective_point().is_some());
        assert!(p.known_point().is_none());
    }
}
