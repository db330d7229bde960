//! Validation errors

use crate::float_types::Real;
use nalgebra::Point3;

/// All the possible validation issues we might encounter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A face loop has fewer than 3 points
    #[error("(TooFewPoints) A face loop has fewer than 3 points at: {0}")]
    TooFewPoints(Point3<Real>),
    /// The loop has no area: vertices do not define a plane
    #[error("(DegenerateFace) The loop has no area near: {0}")]
    DegenerateFace(Point3<Real>),
    /// The coordinate has a NaN or infinite
    #[error("(InvalidCoordinate) The coordinate ({0}) has a NaN or infinite")]
    InvalidCoordinate(Point3<Real>),
    /// A hole loop is *not* contained by its outer loop
    #[error("(HoleOutsideShell) A hole loop is not contained by its outer loop at: {0}")]
    HoleOutsideShell(Point3<Real>),
    /// In general, anything else
    #[error("{0}")]
    Other(String),
}
