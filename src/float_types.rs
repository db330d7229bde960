//! Scalar selection and tolerances.

// Our Real scalar type:
#[cfg(feature = "f32")]
pub type Real = f32;
#[cfg(feature = "f64")]
pub type Real = f64;

/// Tolerance used for coordinate comparison, point/plane classification
/// and ray grazing tests throughout the crate.
#[cfg(feature = "f32")]
pub const EPSILON: Real = 1e-4;
/// Tolerance used for coordinate comparison, point/plane classification
/// and ray grazing tests throughout the crate.
#[cfg(feature = "f64")]
pub const EPSILON: Real = 1e-8;

/// Coordinates are welded when they agree after scaling by this factor
/// and rounding. See [`crate::shell::vertex::quantize_point`].
#[cfg(feature = "f32")]
pub const QUANTIZATION_FACTOR: Real = 1e4;
/// Coordinates are welded when they agree after scaling by this factor
/// and rounding. See [`crate::shell::vertex::quantize_point`].
#[cfg(feature = "f64")]
pub const QUANTIZATION_FACTOR: Real = 1e7;
