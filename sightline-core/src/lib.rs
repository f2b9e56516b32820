//! # Sightline Core
//!
//! This library provides the entity graph for constraint-guided photo
//! reconstruction: world points with per-axis locked/inferred/optimized
//! coordinates, lines with direction and length declarations, planes,
//! viewpoints with image observations and vanishing lines, and the tagged
//! constraint union that ties them together. It is pure data plus structural
//! mutation; all geometric solving lives in `sightline-geom` and all
//! inference, validation and solver marshalling live in `sightline-sfm`.
//!
//! Entities live in a single owning [`SceneGraph`] and refer to each other
//! exclusively through [`slotmap`] keys. The graph maintains id→id relation
//! indices (which constraints and lines touch a given point) and a dirty-point
//! set so that downstream inference can recompute only the affected subgraph
//! after a mutation.
//!
//! ## Coordinate layers
//!
//! Every axis of a [`WorldPoint`] can be supplied by up to three layers:
//!
//! * **locked** — declared by the user, authoritative;
//! * **inferred** — derived by constraint propagation, never hand-set;
//! * **optimized** — returned by the external bundle-adjustment solver.
//!
//! The *effective* coordinate is `locked ?? inferred ?? optimized` per axis.

mod camera;
mod constraint;
mod error;
mod graph;
mod line;
mod plane;
mod point;
mod rotation;
mod view;

pub use camera::*;
pub use constraint::*;
pub use error::*;
pub use graph::*;
pub use line::*;
pub use nalgebra;
pub use plane::*;
pub use point::*;
pub use rotation::*;
pub use view::*;

use slotmap::new_key_type;

new_key_type! {
    /// Key of a [`WorldPoint`] in a [`SceneGraph`].
    pub struct PointKey;
    /// Key of a [`Line`] in a [`SceneGraph`].
    pub struct LineKey;
    /// Key of a [`Plane`] in a [`SceneGraph`].
    pub struct PlaneKey;
    /// Key of a [`Viewpoint`] in a [`SceneGraph`].
    pub struct ViewKey;
    /// Key of a [`Constraint`] in a [`SceneGraph`].
    pub struct ConstraintKey;
}

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A world coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(rename_all = "lowercase"))]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All three axes in `X`, `Y`, `Z` order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// The component index of this axis in an `[x, y, z]` triple.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The positive unit vector along this axis.
    pub fn unit(self) -> nalgebra::Vector3<f64> {
        let mut v = nalgebra::Vector3::zeros();
        v[self.index()] = 1.0;
        v
    }
}
