use crate::{LineKey, PointKey, ViewKey};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Discriminant of a [`Constraint`], used for table dispatch and for the
/// propagation priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(rename_all = "snake_case"))]
pub enum ConstraintKind {
    FixedPoint,
    Distance,
    Angle,
    Collinear,
    Coplanar,
    ParallelLines,
    PerpendicularLines,
    EqualDistances,
    EqualAngles,
    Projection,
}

/// A user-declared geometric constraint.
///
/// Constraints are a plain tagged union dispatched through per-kind evaluator
/// and validator functions; they carry no behavior themselves. Only
/// `FixedPoint`, line declarations, `Collinear` and `Coplanar` can derive
/// coordinates during propagation. The remaining kinds are validated here and
/// handed to the external optimizer as residual equations.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde-serialize",
    serde(tag = "kind", rename_all = "snake_case")
)]
pub enum Constraint {
    /// Pins the listed axes of a point to exact values.
    FixedPoint {
        point: PointKey,
        xyz: [Option<f64>; 3],
    },
    /// The distance between two distinct points.
    Distance {
        a: PointKey,
        b: PointKey,
        value: f64,
    },
    /// The angle at `vertex` between rays toward `a` and `c`, in radians.
    Angle {
        vertex: PointKey,
        a: PointKey,
        c: PointKey,
        radians: f64,
    },
    /// Three or more points on one line.
    Collinear { points: Vec<PointKey> },
    /// Four or more points on one plane.
    Coplanar { points: Vec<PointKey> },
    /// Two distinct lines with the same direction.
    ParallelLines { a: LineKey, b: LineKey },
    /// Two distinct lines at a right angle.
    PerpendicularLines { a: LineKey, b: LineKey },
    /// All listed point pairs share one (unspecified) distance.
    EqualDistances { pairs: Vec<(PointKey, PointKey)> },
    /// All listed `(vertex, a, c)` triplets share one (unspecified) angle.
    EqualAngles {
        triplets: Vec<(PointKey, PointKey, PointKey)>,
    },
    /// An image observation of a point in a viewpoint.
    Projection {
        point: PointKey,
        view: ViewKey,
        u: f64,
        v: f64,
        /// Measurement uncertainty in pixels.
        sigma: f64,
    },
}

impl Constraint {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Constraint::FixedPoint { .. } => ConstraintKind::FixedPoint,
            Constraint::Distance { .. } => ConstraintKind::Distance,
            Constraint::Angle { .. } => ConstraintKind::Angle,
            Constraint::Collinear { .. } => ConstraintKind::Collinear,
            Constraint::Coplanar { .. } => ConstraintKind::Coplanar,
            Constraint::ParallelLines { .. } => ConstraintKind::ParallelLines,
            Constraint::PerpendicularLines { .. } => ConstraintKind::PerpendicularLines,
            Constraint::EqualDistances { .. } => ConstraintKind::EqualDistances,
            Constraint::EqualAngles { .. } => ConstraintKind::EqualAngles,
            Constraint::Projection { .. } => ConstraintKind::Projection,
        }
    }

    /// Every world point the constraint references, in declaration order.
    pub fn points(&self) -> Vec<PointKey> {
        match self {
            Constraint::FixedPoint { point, .. } => vec![*point],
            Constraint::Distance { a, b, .. } => vec![*a, *b],
            Constraint::Angle { vertex, a, c, .. } => vec![*vertex, *a, *c],
            Constraint::Collinear { points } | Constraint::Coplanar { points } => points.clone(),
            Constraint::ParallelLines { .. } | Constraint::PerpendicularLines { .. } => Vec::new(),
            Constraint::EqualDistances { pairs } => {
                pairs.iter().flat_map(|&(a, b)| [a, b]).collect()
            }
            Constraint::EqualAngles { triplets } => {
                triplets.iter().flat_map(|&(v, a, c)| [v, a, c]).collect()
            }
            Constraint::Projection { point, .. } => vec![*point],
        }
    }

    /// Every line the constraint references.
    pub fn lines(&self) -> Vec<LineKey> {
        match self {
            Constraint::ParallelLines { a, b } | Constraint::PerpendicularLines { a, b } => {
                vec![*a, *b]
            }
            _ => Vec::new(),
        }
    }

    /// The viewpoint the constraint references, if any.
    pub fn view(&self) -> Option<ViewKey> {
        match self {
            Constraint::Projection { view, .. } => Some(*view),
            _ => None,
        }
    }

    pub fn references_point(&self, key: PointKey) -> bool {
        self.points().contains(&key)
    }

    pub fn references_line(&self, key: LineKey) -> bool {
        self.lines().contains(&key)
    }
}
