//! Continuum removal for 1-D spectra implemented in Rust.
//!
//! A [`Spectrum`] is an ordered set of [`Point`] samples. [`ContinuumHull`]
//! computes the upper envelope of those samples (the continuum) and divides
//! every sample by the continuum's value at the same x.

use thiserror::Error;

pub mod generator;
pub mod hull;
pub mod point;
pub mod spectrum;

pub use generator::{linspace, GeneratorKind, GeneratorParams, SpectrumGenerator};
pub use hull::{
    continuum_removal, normalize_point, orientation, upper_hull, ContinuumHull, Orientation,
};
pub use point::Point;
pub use spectrum::Spectrum;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContinuumError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("degenerate hull segment: vertical segment at x = {x}")]
    DegenerateSegment { x: f64 },
    #[error("normalization failed: continuum is zero at x = {x}")]
    NormalizationError { x: f64 },
}

/// Minimum number of samples a spectrum needs before a hull can be computed.
pub const MIN_HULL_POINTS: usize = 2;
