//! Direction-field sampling for phase portraits.

use crate::traits::PlanarField;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Axis-aligned plotting window `[x_min, x_max] × [y_min, y_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Window {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [self.x_min, self.x_max, self.y_min, self.y_max]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.x_max <= self.x_min || self.y_max <= self.y_min {
            bail!("Window must be finite with max > min on both axes.");
        }
        Ok(())
    }

    /// Closed containment test.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }

    /// Part of the window below `y = w` (inclusive).
    pub fn lower(&self, w: f64) -> Self {
        Self {
            y_max: w.clamp(self.y_min, self.y_max),
            ..*self
        }
    }

    /// Part of the window above `y = w` (inclusive).
    pub fn upper(&self, w: f64) -> Self {
        Self {
            y_min: w.clamp(self.y_min, self.y_max),
            ..*self
        }
    }
}

/// `count` evenly spaced values over `[start, end]`, both ends included.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Values `start, start + h, ...` up to `end`, including `end` when it lies on
/// the lattice (within rounding).
pub fn arange_inclusive(start: f64, end: f64, h: f64) -> Result<Vec<f64>> {
    if !(h.is_finite() && h > 0.0) {
        bail!("Grid spacing must be positive and finite.");
    }
    if end < start {
        return Ok(Vec::new());
    }
    let count = ((end - start) / h + 1e-9).floor() as usize + 1;
    Ok((0..count).map(|i| start + h * i as f64).collect())
}

/// How the grid points of a [`sample_field`] call are spaced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridSpacing {
    /// Fixed spacing on both axes.
    Step { h: f64 },
    /// Fixed number of points per axis.
    Count { nx: usize, ny: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSample {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    /// Unit direction; `(0, 0)` where the field vanishes.
    pub ux: f64,
    pub uy: f64,
    pub magnitude: f64,
}

/// Evaluates `field` on a grid over `window` at time `t`.
pub fn sample_field<F>(
    field: &F,
    window: &Window,
    spacing: GridSpacing,
    t: f64,
) -> Result<Vec<FieldSample>>
where
    F: PlanarField,
{
    if field.dimension() != 2 {
        bail!("Direction fields require a planar system (dimension 2).");
    }
    if [window.x_min, window.x_max, window.y_min, window.y_max]
        .iter()
        .any(|v| !v.is_finite())
        || window.x_max < window.x_min
        || window.y_max < window.y_min
    {
        bail!("Sampling window must be finite and ordered.");
    }
    let (xs, ys) = match spacing {
        GridSpacing::Step { h } => (
            arange_inclusive(window.x_min, window.x_max, h)?,
            arange_inclusive(window.y_min, window.y_max, h)?,
        ),
        GridSpacing::Count { nx, ny } => {
            if nx == 0 || ny == 0 {
                bail!("Grid counts must be positive.");
            }
            (
                linspace(window.x_min, window.x_max, nx),
                linspace(window.y_min, window.y_max, ny),
            )
        }
    };

    let mut samples = Vec::with_capacity(xs.len() * ys.len());
    for &y in &ys {
        for &x in &xs {
            let (dx, dy) = field.eval_planar(t, x, y);
            samples.push(normalized_sample(x, y, dx, dy));
        }
    }
    Ok(samples)
}

fn normalized_sample(x: f64, y: f64, dx: f64, dy: f64) -> FieldSample {
    let magnitude = (dx * dx + dy * dy).sqrt();
    let norm = if magnitude == 0.0 || !magnitude.is_finite() {
        1.0
    } else {
        magnitude
    };
    let (ux, uy) = if magnitude.is_finite() {
        (dx / norm, dy / norm)
    } else {
        (0.0, 0.0)
    };
    FieldSample {
        x,
        y,
        dx,
        dy,
        ux,
        uy,
        magnitude,
    }
}

#[cfg(test)]
mod tests {
    use super::{arange_inclusive, linspace, sample_field, GridSpacing, Window};
    use crate::traits::DynamicalSystem;

    struct Saddle;

    impl DynamicalSystem<f64> for Saddle {
        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = x[0];
            out[1] = -x[1];
        }
    }

    #[test]
    fn arange_includes_end_on_lattice() {
        let values = arange_inclusive(0.0, 3.0, 0.5).expect("valid spacing");
        assert_eq!(values.len(), 7);
        assert!((values[6] - 3.0).abs() < 1e-12);
        assert!(arange_inclusive(0.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn linspace_hits_both_ends() {
        let values = linspace(-1.0, 1.0, 5);
        assert_eq!(values, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn zero_vector_normalizes_without_nan() {
        let window = Window::new(-1.0, 1.0, -1.0, 1.0);
        let samples = sample_field(&Saddle, &window, GridSpacing::Count { nx: 3, ny: 3 }, 0.0)
            .expect("sampling should succeed");
        assert_eq!(samples.len(), 9);
        let origin = samples
            .iter()
            .find(|s| s.x == 0.0 && s.y == 0.0)
            .expect("origin is a grid point");
        assert_eq!((origin.ux, origin.uy), (0.0, 0.0));
        for s in &samples {
            assert!(s.ux.is_finite() && s.uy.is_finite());
            if s.magnitude > 0.0 {
                assert!(((s.ux * s.ux + s.uy * s.uy).sqrt() - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn lower_and_upper_split_window_at_threshold() {
        let window = Window::new(0.0, 1.0, 0.0, 1.0);
        let lower = window.lower(0.3);
        let upper = window.upper(0.3);
        assert_eq!(lower.y_max, 0.3);
        assert_eq!(upper.y_min, 0.3);
        assert_eq!(window.lower(5.0).y_max, 1.0);
        assert!(window.contains(1.0, 0.0));
        assert!(!window.contains(1.0 + 1e-9, 0.5));
    }
}
