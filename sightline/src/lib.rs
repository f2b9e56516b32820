//! # `sightline`
//!
//! Batteries-included constraint-guided photo reconstruction toolkit
//!
//! This crate is useful for documentation/reference and for quickly wiring a
//! reconstruction routine together. If you are making a production
//! application, import the member crates individually so you only pull in
//! what you use; you can also disable default features on this crate and
//! enable specific features to get just the functionality you want.
//!
//! All of the basic entity-graph types are included in the root of the
//! crate. Modules wrap the functionality that may or may not be used:
//!
//! ## Modules
//! * [`geom`] - direction solving, plane fitting, vanishing points,
//!   rotation helpers, pinhole projection
//! * [`sfm`] - constraint propagation, validation, and the
//!   bundle-adjustment boundary

pub use sightline_core::*;

/// Computational geometry for reconstruction preparation
pub mod geom {
    #[cfg(feature = "sightline-geom")]
    pub use sightline_geom::*;
}

/// Inference, validation and the solver boundary
pub mod sfm {
    #[cfg(feature = "sightline-sfm")]
    pub use sightline_sfm::*;
}
