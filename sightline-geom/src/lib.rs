//! This crate contains the computational geometry used to prepare a
//! constraint-guided photo reconstruction: axis-direction solving for lines,
//! collinear point placement, least-squares plane fitting, vanishing-point
//! estimation, camera-orientation hints, quaternion helpers, and the pinhole
//! projection model.
//!
//! ## Vanishing points
//!
//! A family of parallel 3d lines along a world axis projects to image-space
//! line segments that all pass through one vanishing point. With the segments
//! expressed as homogeneous lines `l`, the vanishing point `v` satisfies
//! `lᵀv = 0` for every segment:
//!
//! ```text
//!   \        |        /
//!    \       |       /      all segments extended
//!     \      |      /       meet at the vanishing
//!      \     |     /        point v
//!       \    |    /
//!        \   |   /
//!         \  |  /
//!           [v]
//! ```
//!
//! Two segments give the exact intersection as a cross product; more than two
//! give an overdetermined system solved in a least-squares sense.

pub mod direction;
pub mod plane_fit;
pub mod projection;
pub mod rotation;
pub mod vanishing;
