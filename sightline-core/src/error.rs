use crate::{ConstraintKey, ConstraintKind, LineKey, PlaneKey, PointKey, ViewKey};
use thiserror::Error;

/// Structural failures of graph mutation.
///
/// These reject the mutation outright: the entity or constraint is not
/// created. Geometric disagreements are deliberately not represented here;
/// they are non-fatal findings reported by validation and propagation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("references non-existent world point {0:?}")]
    UnknownPoint(PointKey),
    #[error("references non-existent line {0:?}")]
    UnknownLine(LineKey),
    #[error("references non-existent plane {0:?}")]
    UnknownPlane(PlaneKey),
    #[error("references non-existent viewpoint {0:?}")]
    UnknownView(ViewKey),
    #[error("references non-existent constraint {0:?}")]
    UnknownConstraint(ConstraintKey),
    #[error("line endpoints must be two distinct points")]
    DegenerateLine,
    #[error("{kind:?} constraint requires at least {required} points, got {actual}")]
    NotEnoughPoints {
        kind: ConstraintKind,
        required: usize,
        actual: usize,
    },
    #[error("{kind:?} constraint participants must be distinct")]
    DuplicateParticipants { kind: ConstraintKind },
    #[error("{kind:?} constraint referenced lines must be distinct")]
    DuplicateLines { kind: ConstraintKind },
    #[error("fixed point constraint must specify at least one axis")]
    EmptyFixedPoint,
    #[error("constraint value must be finite and non-negative")]
    InvalidValue,
}
