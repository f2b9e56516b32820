use crate::{Axis, PointKey};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The declared direction of a [`Line`].
///
/// Single-axis variants constrain the line to run along that world axis, so
/// the two remaining coordinates are equal at both endpoints. Planar variants
/// (`XY`, `XZ`, `YZ`) constrain the line to lie in a plane parallel to that
/// coordinate plane, which pins only the complementary axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(rename_all = "lowercase"))]
pub enum LineDirection {
    #[default]
    Free,
    X,
    Y,
    Z,
    XY,
    XZ,
    YZ,
}

impl LineDirection {
    /// The single axis the line runs along, for axis-aligned directions.
    pub fn axis(self) -> Option<Axis> {
        match self {
            LineDirection::X => Some(Axis::X),
            LineDirection::Y => Some(Axis::Y),
            LineDirection::Z => Some(Axis::Z),
            _ => None,
        }
    }

    /// The axes pinned equal at both endpoints by this direction.
    ///
    /// An axis-aligned line pins the two off-axis coordinates; a planar line
    /// pins the axis normal to its plane; a free line pins nothing.
    pub fn pinned_axes(self) -> &'static [Axis] {
        match self {
            LineDirection::Free => &[],
            LineDirection::X => &[Axis::Y, Axis::Z],
            LineDirection::Y => &[Axis::X, Axis::Z],
            LineDirection::Z => &[Axis::X, Axis::Y],
            LineDirection::XY => &[Axis::Z],
            LineDirection::XZ => &[Axis::Y],
            LineDirection::YZ => &[Axis::X],
        }
    }

    pub fn is_free(self) -> bool {
        self == LineDirection::Free
    }
}

/// A line between two distinct world points.
///
/// A line may declare a direction and a target length, and may list extra
/// points that are collinear with it. Construction lines are visual guides
/// only and contribute nothing to inference.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Line {
    pub a: PointKey,
    pub b: PointKey,
    pub direction: LineDirection,
    /// Target distance between the endpoints, in world length units.
    pub target_length: Option<f64>,
    /// Additional points declared collinear with the endpoints.
    pub collinear: Vec<PointKey>,
    /// Visual-only guide line; ignored by inference.
    pub construction: bool,
}

impl Line {
    /// A free line between two points with no declarations.
    pub fn new(a: PointKey, b: PointKey) -> Self {
        Self {
            a,
            b,
            direction: LineDirection::Free,
            target_length: None,
            collinear: Vec::new(),
            construction: false,
        }
    }

    /// Builder-style direction declaration.
    #[must_use]
    pub fn with_direction(mut self, direction: LineDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Builder-style target length declaration.
    #[must_use]
    pub fn with_target_length(mut self, length: f64) -> Self {
        self.target_length = Some(length);
        self
    }

    /// Both endpoints followed by the declared collinear points.
    pub fn points(&self) -> impl Iterator<Item = PointKey> + '_ {
        [self.a, self.b].into_iter().chain(self.collinear.iter().copied())
    }

    /// Whether the line declares anything inference can act on.
    pub fn has_declarations(&self) -> bool {
        !self.construction
            && (!self.direction.is_free()
                || self.target_length.is_some()
                || !self.collinear.is_empty())
    }
}
