//! Upper-hull continuum and continuum removal.
//!
//! The hull is traced with a gift-wrapping walk that starts at the leftmost
//! sample and always turns to the most clockwise candidate. On x-sorted input
//! that walk follows the upper boundary only and ends at the rightmost
//! sample. Each sample is then divided by the linear interpolation of the
//! hull segment that covers its x.

use tracing::debug;

use crate::{ContinuumError, Point, Spectrum, MIN_HULL_POINTS};

/// Turn direction of an ordered triple of points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Collinear,
    Clockwise,
    CounterClockwise,
}

impl Orientation {
    /// Numeric code of the turn: 0 collinear, 1 clockwise, 2 counter-clockwise.
    pub fn code(&self) -> u8 {
        match self {
            Orientation::Collinear => 0,
            Orientation::Clockwise => 1,
            Orientation::CounterClockwise => 2,
        }
    }
}

/// Classify the turn p → q → r by the sign of the cross product.
pub fn orientation(p: &Point, q: &Point, r: &Point) -> Orientation {
    let val = (q.y - p.y) * (r.x - q.x) - (q.x - p.x) * (r.y - q.y);
    if val == 0.0 {
        Orientation::Collinear
    } else if val > 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::CounterClockwise
    }
}

/// Compute the upper hull of points sorted ascending by (x, y).
///
/// The result starts at the first point and ends at the last one. With two
/// or fewer points the hull is the input itself. When several candidates
/// are collinear with the winning edge, the first one found in scan order
/// is kept.
pub fn upper_hull(points: &[Point]) -> Result<Vec<Point>, ContinuumError> {
    let n = points.len();
    if n < MIN_HULL_POINTS {
        return Err(ContinuumError::InvalidInput(format!(
            "at least {} points are required to compute a hull, got {}",
            MIN_HULL_POINTS, n
        )));
    }
    if n <= 2 {
        return Ok(points.to_vec());
    }

    // Only the leftmost point is seeded; the rightmost point is appended by
    // the walk itself as its final step.
    let (first, last) = (0, n - 1);
    let mut hull = vec![points[first]];
    let mut p = first;
    loop {
        let mut q = (p + 1) % n;
        for i in 0..n {
            if orientation(&points[p], &points[i], &points[q]) == Orientation::Clockwise {
                q = i;
            }
        }
        p = q;
        hull.push(points[p]);
        if p == last {
            break;
        }
        if hull.len() > n {
            return Err(ContinuumError::InvalidInput(
                "hull walk did not reach the rightmost point".into(),
            ));
        }
    }
    Ok(hull)
}

/// Divide one sample by the continuum value at its x.
///
/// The covering segment is the first one whose right end is at or beyond
/// `point.x`; samples past the last vertex use the last segment.
pub fn normalize_point(point: &Point, hull: &[Point]) -> Result<Point, ContinuumError> {
    if hull.len() < 2 {
        return Err(ContinuumError::InvalidInput(format!(
            "hull needs at least 2 vertices to interpolate, got {}",
            hull.len()
        )));
    }
    let last = hull.len() - 1;
    let mut right = 1;
    while point.x > hull[right].x && right < last {
        right += 1;
    }
    let (p1, p2) = (&hull[right - 1], &hull[right]);
    if p2.x == p1.x {
        return Err(ContinuumError::DegenerateSegment { x: p1.x });
    }
    let k = (p2.y - p1.y) / (p2.x - p1.x);
    let b = p1.y - k * p1.x;
    let continuum = k * point.x + b;
    if continuum == 0.0 {
        return Err(ContinuumError::NormalizationError { x: point.x });
    }
    Ok(Point::new(point.x, point.y / continuum))
}

/// Hull and normalized samples for points sorted ascending by (x, y).
///
/// Either every point is normalized or an error is returned.
pub fn continuum_removal(points: &[Point]) -> Result<(Vec<Point>, Vec<Point>), ContinuumError> {
    let hull = upper_hull(points)?;
    let normalized = points
        .iter()
        .map(|p| normalize_point(p, &hull))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((hull, normalized))
}

/// Continuum removal with the last computed hull kept for inspection.
#[derive(Clone, Debug, Default)]
pub struct ContinuumHull {
    hull: Vec<Point>,
}

impl ContinuumHull {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the hull of `spectrum` and return the normalized spectrum.
    ///
    /// An unsorted spectrum is sorted in place first, so the caller's
    /// spectrum is left ordered by (x, y) afterwards. The returned spectrum
    /// has one point per input point in that order. On failure the stored
    /// hull is cleared.
    pub fn normalize_spectrum(
        &mut self,
        spectrum: &mut Spectrum,
    ) -> Result<Spectrum, ContinuumError> {
        self.hull.clear();
        if !spectrum.is_sorted() {
            spectrum.sort();
        }
        let (hull, normalized) = continuum_removal(spectrum.points())?;
        debug!(
            points = spectrum.len(),
            hull_vertices = hull.len(),
            "continuum removed"
        );
        self.hull = hull;
        Ok(Spectrum::from_sorted_unchecked(normalized))
    }

    pub fn hull_points(&self) -> &[Point] {
        &self.hull
    }

    pub fn hull_x(&self) -> Vec<f64> {
        self.hull.iter().map(|p| p.x).collect()
    }

    pub fn hull_y(&self) -> Vec<f64> {
        self.hull.iter().map(|p| p.y).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    fn pts(pairs: &[(f64, f64)]) -> Vec<Point> {
        pairs.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn orientation_codes() {
        let p = Point::new(0.0, 0.0);
        let q = Point::new(1.0, 1.0);
        assert_eq!(orientation(&p, &q, &Point::new(2.0, 2.0)), Orientation::Collinear);
        assert_eq!(orientation(&p, &q, &Point::new(2.0, 0.0)), Orientation::Clockwise);
        assert_eq!(
            orientation(&p, &q, &Point::new(0.0, 2.0)),
            Orientation::CounterClockwise
        );
        assert_eq!(Orientation::Collinear.code(), 0);
        assert_eq!(Orientation::Clockwise.code(), 1);
        assert_eq!(Orientation::CounterClockwise.code(), 2);
    }

    #[test]
    fn hull_of_two_points_is_input() {
        let points = pts(&[(0.0, 1.0), (2.0, 3.0)]);
        assert_eq!(upper_hull(&points).unwrap(), points);
    }

    #[test]
    fn hull_rejects_single_point() {
        let err = upper_hull(&pts(&[(0.0, 1.0)])).unwrap_err();
        assert!(matches!(err, ContinuumError::InvalidInput(_)));
        assert!(matches!(upper_hull(&[]), Err(ContinuumError::InvalidInput(_))));
    }

    #[test]
    fn apex_points_are_all_vertices() {
        let points = pts(&[(0.0, 1.0), (1.0, 2.0), (2.0, 1.0)]);
        assert_eq!(upper_hull(&points).unwrap(), points);
    }

    #[test]
    fn hull_skips_points_below_envelope() {
        let points = pts(&[(0.0, 1.0), (0.5, 1.2), (1.0, 2.0), (1.5, 1.3), (2.0, 1.0)]);
        let hull = upper_hull(&points).unwrap();
        assert_eq!(hull, pts(&[(0.0, 1.0), (1.0, 2.0), (2.0, 1.0)]));
    }

    #[test]
    fn collinear_middle_point_is_kept_as_first_found() {
        // (1, 1) lies on the edge from (0, 0) to (2, 2); it is the initial
        // candidate from (0, 0) and is never displaced by a collinear one.
        let points = pts(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        assert_eq!(upper_hull(&points).unwrap(), points);
    }

    #[test]
    fn collinear_points_on_flat_top_are_all_visited() {
        let points = pts(&[(0.0, 1.0), (1.0, 1.0), (2.0, 1.0), (3.0, 1.0), (1.5, 0.0)]);
        let mut sorted = points.clone();
        sorted.sort();
        let hull = upper_hull(&sorted).unwrap();
        assert_eq!(hull, pts(&[(0.0, 1.0), (1.0, 1.0), (2.0, 1.0), (3.0, 1.0)]));
    }

    #[test]
    fn normalize_point_interpolates_segment() {
        let hull = pts(&[(0.0, 1.0), (1.0, 2.0), (2.0, 1.0)]);
        let p = normalize_point(&Point::new(0.5, 1.2), &hull).unwrap();
        assert_eq!(p.x, 0.5);
        assert!((p.y - 0.8).abs() < TOL);
        let q = normalize_point(&Point::new(1.5, 1.3), &hull).unwrap();
        assert!((q.y - 1.3 / 1.5).abs() < TOL);
    }

    #[test]
    fn normalize_point_beyond_hull_uses_last_segment() {
        let hull = pts(&[(0.0, 1.0), (1.0, 2.0), (2.0, 1.0)]);
        // Last segment is y = 3 - x.
        let r = normalize_point(&Point::new(2.5, 0.25), &hull).unwrap();
        assert!((r.y - 0.5).abs() < TOL);
        let err = normalize_point(&Point::new(3.0, 1.0), &hull).unwrap_err();
        assert_eq!(err, ContinuumError::NormalizationError { x: 3.0 });
    }

    #[test]
    fn vertical_segment_is_degenerate() {
        let hull = pts(&[(1.0, 1.0), (1.0, 2.0)]);
        let err = normalize_point(&Point::new(1.0, 1.5), &hull).unwrap_err();
        assert_eq!(err, ContinuumError::DegenerateSegment { x: 1.0 });
    }

    #[test]
    fn zero_continuum_is_a_normalization_error() {
        let points = pts(&[(0.0, -1.0), (1.0, -5.0), (2.0, 1.0)]);
        let err = continuum_removal(&points).unwrap_err();
        assert_eq!(err, ContinuumError::NormalizationError { x: 1.0 });
    }

    #[test]
    fn normalize_spectrum_sorts_input_and_exposes_hull() {
        let mut spectrum = Spectrum::from_points(pts(&[
            (2.0, 1.0),
            (0.5, 1.2),
            (1.0, 2.0),
            (0.0, 1.0),
            (1.5, 1.3),
        ]))
        .unwrap();
        assert!(!spectrum.is_sorted());

        let mut hull = ContinuumHull::new();
        let normalized = hull.normalize_spectrum(&mut spectrum).unwrap();

        assert!(spectrum.is_sorted());
        assert_eq!(spectrum.x_values(), vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_eq!(normalized.x_values(), spectrum.x_values());
        assert_eq!(hull.hull_x(), vec![0.0, 1.0, 2.0]);
        assert_eq!(hull.hull_y(), vec![1.0, 2.0, 1.0]);

        let ys = normalized.y_values();
        assert!((ys[1] - 0.8).abs() < TOL);
        for i in [0, 2, 4] {
            assert!((ys[i] - 1.0).abs() < TOL);
        }
    }

    #[test]
    fn failed_call_clears_previous_hull() {
        let mut hull = ContinuumHull::new();
        let mut good = Spectrum::from_points(pts(&[(0.0, 1.0), (2.0, 3.0)])).unwrap();
        hull.normalize_spectrum(&mut good).unwrap();
        assert_eq!(hull.hull_points().len(), 2);

        let mut short = Spectrum::from_points(pts(&[(0.0, 1.0)])).unwrap();
        let err = hull.normalize_spectrum(&mut short).unwrap_err();
        assert!(matches!(err, ContinuumError::InvalidInput(_)));
        assert!(hull.hull_points().is_empty());
    }
}
