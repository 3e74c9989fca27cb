//! Nullclines of planar fields and roots of scalar functions on a sampled axis.
//!
//! Curves are extracted with marching squares over a regular grid, so each
//! cell contributes at most two independent line segments. Segments are not
//! stitched into polylines; plotting draws them one by one.

use crate::traits::PlanarField;
use crate::vector_field::Window;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sampled interval `[min, max]` with `samples >= 2` grid points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

impl AxisSpec {
    pub fn new(min: f64, max: f64, samples: usize) -> Self {
        Self { min, max, samples }
    }

    fn validate(&self) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.max <= self.min {
            bail!("Each axis range must be finite with max > min.");
        }
        if self.samples < 2 {
            bail!("Each axis needs at least 2 samples.");
        }
        Ok(())
    }

    fn step(&self) -> f64 {
        (self.max - self.min) / (self.samples - 1) as f64
    }

    fn at(&self, i: usize) -> f64 {
        self.min + self.step() * i as f64
    }
}

/// Which component of a planar field should vanish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// `x' = 0`
    X,
    /// `y' = 0`
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub start: (f64, f64),
    pub end: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Nullclines {
    pub x_nullcline: Vec<Segment>,
    pub y_nullcline: Vec<Segment>,
}

/// Both nullclines of `field` over `window`, sampled `samples × samples`.
pub fn nullclines<F: PlanarField>(
    field: &F,
    window: &Window,
    samples: usize,
    t: f64,
) -> Result<Nullclines> {
    window.validate()?;
    let x_axis = AxisSpec::new(window.x_min, window.x_max, samples);
    let y_axis = AxisSpec::new(window.y_min, window.y_max, samples);
    Ok(Nullclines {
        x_nullcline: nullcline(field, Component::X, &x_axis, &y_axis, t)?,
        y_nullcline: nullcline(field, Component::Y, &x_axis, &y_axis, t)?,
    })
}

/// Nullcline of a single component.
pub fn nullcline<F: PlanarField>(
    field: &F,
    component: Component,
    x_axis: &AxisSpec,
    y_axis: &AxisSpec,
    t: f64,
) -> Result<Vec<Segment>> {
    if field.dimension() != 2 {
        bail!("Nullclines require a planar system (dimension 2).");
    }
    zero_level_segments(
        |x, y| {
            let (fx, fy) = field.eval_planar(t, x, y);
            match component {
                Component::X => fx,
                Component::Y => fy,
            }
        },
        x_axis,
        y_axis,
    )
}

/// Marching squares for the zero set of `f` on the grid spanned by the axes.
pub fn zero_level_segments(
    f: impl Fn(f64, f64) -> f64,
    x_axis: &AxisSpec,
    y_axis: &AxisSpec,
) -> Result<Vec<Segment>> {
    x_axis.validate()?;
    y_axis.validate()?;
    let nx = x_axis.samples;
    let ny = y_axis.samples;
    let index = |ix: usize, iy: usize| -> usize { ix + iy * nx };
    let mut values = vec![0.0; nx * ny];
    for iy in 0..ny {
        let y = y_axis.at(iy);
        for ix in 0..nx {
            values[index(ix, iy)] = f(x_axis.at(ix), y);
        }
    }

    let mut segments = Vec::new();
    for iy in 0..ny - 1 {
        let (y0, y1) = (y_axis.at(iy), y_axis.at(iy + 1));
        for ix in 0..nx - 1 {
            let (x0, x1) = (x_axis.at(ix), x_axis.at(ix + 1));
            let corners = [
                values[index(ix, iy)],
                values[index(ix + 1, iy)],
                values[index(ix + 1, iy + 1)],
                values[index(ix, iy + 1)],
            ];
            if corners.iter().any(|v| !v.is_finite()) {
                continue;
            }

            let case_index = corners
                .iter()
                .enumerate()
                .fold(0u8, |acc, (bit, v)| if *v >= 0.0 { acc | (1 << bit) } else { acc });
            let cell = Cell {
                x0,
                x1,
                y0,
                y1,
                v: corners,
            };
            for (edge_a, edge_b) in marching_squares_edge_pairs(case_index) {
                segments.push(Segment {
                    start: cell.edge_point(*edge_a),
                    end: cell.edge_point(*edge_b),
                });
            }
        }
    }
    Ok(segments)
}

struct Cell {
    x0: f64,
    x1: f64,
    y0: f64,
    y1: f64,
    /// Corner values counter-clockwise from `(x0, y0)`.
    v: [f64; 4],
}

impl Cell {
    fn edge_point(&self, edge: u8) -> (f64, f64) {
        let [v0, v1, v2, v3] = self.v;
        match edge {
            0 => (lerp(self.x0, self.x1, interpolate_factor(v0, v1)), self.y0),
            1 => (self.x1, lerp(self.y0, self.y1, interpolate_factor(v1, v2))),
            2 => (lerp(self.x1, self.x0, interpolate_factor(v2, v3)), self.y1),
            _ => (self.x0, lerp(self.y1, self.y0, interpolate_factor(v3, v0))),
        }
    }
}

fn marching_squares_edge_pairs(case_index: u8) -> &'static [(u8, u8)] {
    match case_index {
        1 | 14 => &[(3, 0)],
        2 | 13 => &[(0, 1)],
        3 | 12 => &[(3, 1)],
        4 | 11 => &[(1, 2)],
        5 => &[(3, 2), (0, 1)],
        6 | 9 => &[(0, 2)],
        7 | 8 => &[(3, 2)],
        10 => &[(0, 3), (1, 2)],
        _ => &[],
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn interpolate_factor(v0: f64, v1: f64) -> f64 {
    let denominator = v0 - v1;
    if denominator.abs() <= 1e-12 {
        0.5
    } else {
        (v0 / denominator).clamp(0.0, 1.0)
    }
}

/// Roots of `f` on `axis`: sampled zeros plus linearly interpolated sign
/// changes, sorted and deduplicated.
pub fn roots_on_axis(f: impl Fn(f64) -> f64, axis: &AxisSpec) -> Result<Vec<f64>> {
    axis.validate()?;
    let values: Vec<f64> = (0..axis.samples).map(|i| f(axis.at(i))).collect();

    let mut roots = Vec::new();
    let zero_eps = 1e-10;
    for i in 0..axis.samples - 1 {
        let (x0, x1) = (axis.at(i), axis.at(i + 1));
        let (v0, v1) = (values[i], values[i + 1]);
        if v0.abs() <= zero_eps {
            roots.push(x0);
        }
        if v1.abs() <= zero_eps {
            roots.push(x1);
        }
        if (v0 < 0.0 && v1 > 0.0) || (v0 > 0.0 && v1 < 0.0) {
            roots.push(lerp(x0, x1, interpolate_factor(v0, v1)));
        }
    }

    roots.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    roots.dedup_by(|a, b| (*a - *b).abs() <= 1e-8 * (1.0 + a.abs().max(b.abs())));
    Ok(roots)
}

/// Refines a bracketed root of `f` in `[lo, hi]` by bisection.
pub fn bisect(f: impl Fn(f64) -> f64, mut lo: f64, mut hi: f64, tol: f64) -> Result<f64> {
    let mut f_lo = f(lo);
    let f_hi = f(hi);
    if f_lo == 0.0 {
        return Ok(lo);
    }
    if f_hi == 0.0 {
        return Ok(hi);
    }
    if f_lo.signum() == f_hi.signum() {
        bail!("Root is not bracketed in [{lo}, {hi}].");
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if hi - lo <= tol {
            return Ok(mid);
        }
        let f_mid = f(mid);
        if f_mid == 0.0 {
            return Ok(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Ok(0.5 * (lo + hi))
}
