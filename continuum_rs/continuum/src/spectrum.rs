use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ContinuumError, Point};

/// An ordered set of spectrum samples.
///
/// The sorted flag is conservative: every [`Spectrum::add_point`] clears it,
/// even when the new point would keep the sequence ordered. Only
/// [`Spectrum::sort`] sets it again.
///
/// Deserialization ignores any stored flag and recomputes it from the points.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "SpectrumRepr")]
pub struct Spectrum {
    points: Vec<Point>,
    sorted: bool,
}

#[derive(Deserialize)]
struct SpectrumRepr {
    points: Vec<Point>,
}

impl TryFrom<SpectrumRepr> for Spectrum {
    type Error = ContinuumError;

    fn try_from(repr: SpectrumRepr) -> Result<Self, Self::Error> {
        if let Some(bad) = repr.points.iter().find(|p| !p.is_finite()) {
            return Err(ContinuumError::TypeMismatch(format!(
                "{} is not a valid point",
                bad
            )));
        }
        let sorted = repr.points.windows(2).all(|w| w[0] <= w[1]);
        Ok(Self {
            points: repr.points,
            sorted,
        })
    }
}

impl Default for Spectrum {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            sorted: true,
        }
    }
}

impl Spectrum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            sorted: true,
        }
    }

    /// Collect points into a spectrum, validating each one.
    pub fn from_points<I>(points: I) -> Result<Self, ContinuumError>
    where
        I: IntoIterator<Item = Point>,
    {
        let points = points.into_iter();
        let mut spectrum = Self::with_capacity(points.size_hint().0);
        for point in points {
            spectrum.add_point(point)?;
        }
        Ok(spectrum)
    }

    /// Append a sample. Points with a NaN or infinite coordinate are
    /// rejected with [`ContinuumError::TypeMismatch`].
    pub fn add_point(&mut self, point: Point) -> Result<(), ContinuumError> {
        if !point.is_finite() {
            return Err(ContinuumError::TypeMismatch(format!(
                "{} is not a valid point",
                point
            )));
        }
        self.points.push(point);
        self.sorted = false;
        Ok(())
    }

    /// Stable in-place sort by (x, y).
    pub fn sort(&mut self) {
        self.points.sort_by_key(Point::sort_key);
        self.sorted = true;
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn x_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn y_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Wrap points that the caller guarantees are finite and already ordered.
    pub(crate) fn from_sorted_unchecked(points: Vec<Point>) -> Self {
        Self {
            points,
            sorted: true,
        }
    }
}

impl fmt::Display for Spectrum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for point in &self.points {
            write!(f, "{}", point)?;
        }
        Ok(())
    }
}
