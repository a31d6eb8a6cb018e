// Synthetic spectrum sources used to exercise continuum removal without
// measured data: uniform noise inside a bounding box, and a noisy bell curve.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::{ContinuumError, Point, Spectrum};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    BellCurve,
    Uniform,
}

impl Default for GeneratorKind {
    fn default() -> Self {
        GeneratorKind::BellCurve
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorParams {
    pub kind: GeneratorKind,
    pub count: usize,
    pub x_left: f64,
    pub x_right: f64,
    pub y_bottom: f64,
    pub y_top: f64,
    pub walk_range: f64,
    pub seed: Option<u64>,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            kind: GeneratorKind::BellCurve,
            count: 40,
            x_left: 0.0,
            x_right: 1.0,
            y_bottom: 0.0,
            y_top: 1.0,
            walk_range: 0.2,
            seed: None,
        }
    }
}

pub struct SpectrumGenerator {
    rng: Xoshiro256PlusPlus,
}

impl SpectrumGenerator {
    /// Seeded generators are reproducible; `None` draws a fresh seed.
    pub fn new(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    pub fn generate(&mut self, params: &GeneratorParams) -> Result<Spectrum, ContinuumError> {
        match params.kind {
            GeneratorKind::BellCurve => {
                self.bell_curve_with_random_walk(params.count, params.walk_range)
            }
            GeneratorKind::Uniform => self.uniform_random(
                params.count,
                params.x_left,
                params.x_right,
                params.y_bottom,
                params.y_top,
            ),
        }
    }

    /// `n` points drawn uniformly from `[x_left, x_right] x [y_bottom, y_top]`,
    /// returned sorted.
    pub fn uniform_random(
        &mut self,
        n: usize,
        x_left: f64,
        x_right: f64,
        y_bottom: f64,
        y_top: f64,
    ) -> Result<Spectrum, ContinuumError> {
        let bounds_ok = x_left <= x_right && y_bottom <= y_top;
        let finite = [x_left, x_right, y_bottom, y_top]
            .iter()
            .all(|v| v.is_finite());
        if !bounds_ok || !finite {
            return Err(ContinuumError::InvalidInput(format!(
                "bounding box [{}, {}] x [{}, {}] is empty or unbounded",
                x_left, x_right, y_bottom, y_top
            )));
        }
        let mut spectrum = Spectrum::with_capacity(n);
        for _ in 0..n {
            let x = self.rng.gen_range(x_left..=x_right);
            let y = self.rng.gen_range(y_bottom..=y_top);
            spectrum.add_point(Point::new(x, y))?;
        }
        spectrum.sort();
        Ok(spectrum)
    }

    /// `n` points along `y = 1 - x^2` on `[-1, 1]`, each shifted by a uniform
    /// draw from `[-|walk_range|, |walk_range|]`.
    ///
    /// The x grid is already ascending but the spectrum is left flagged
    /// unsorted, like any spectrum built point by point.
    pub fn bell_curve_with_random_walk(
        &mut self,
        n: usize,
        walk_range: f64,
    ) -> Result<Spectrum, ContinuumError> {
        if !walk_range.is_finite() {
            return Err(ContinuumError::InvalidInput(format!(
                "walk range {} is not finite",
                walk_range
            )));
        }
        let walk = walk_range.abs();
        let mut spectrum = Spectrum::with_capacity(n);
        for x in linspace(-1.0, 1.0, n) {
            let y = -x * x + 1.0 + self.rng.gen_range(-walk..=walk);
            spectrum.add_point(Point::new(x, y))?;
        }
        Ok(spectrum)
    }
}

/// `count` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count as f64 - 1.0);
            let mut out = Vec::with_capacity(count);
            for i in 0..count - 1 {
                out.push(start + step * i as f64);
            }
            out.push(end);
            out
        }
    }
}
