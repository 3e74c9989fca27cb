//! Single-field phase portraits with their equilibria.

use crate::config::{CubicConfig, EigenConfig, LinearConfig, NonlinearConfig};
use crate::plot::{Figure, DARK_BLUE, DARK_GREEN, DARK_RED, ORANGE};
use anyhow::Result;
use filippov_core::equilibrium::{
    classify_planar, compute_eigenpairs, eigenvalues, solve_equilibrium, NewtonSettings,
};
use filippov_core::integrator::{integrate, solve_on_grid, IntegrationSettings};
use filippov_core::models::{LinearPlanar, NonlinearExample};
use filippov_core::nullcline::nullclines;
use filippov_core::vector_field::{linspace, sample_field};
use log::{debug, warn};
use num_complex::Complex;
use plotters::style::{BLACK, BLUE};
use std::path::Path;

const NULLCLINE_SAMPLES: usize = 120;

fn format_complex(z: Complex<f64>) -> String {
    if z.im == 0.0 {
        format!("{:.6}", z.re)
    } else {
        let sign = if z.im < 0.0 { '-' } else { '+' };
        format!("{:.6} {sign} {:.6}i", z.re, z.im.abs())
    }
}

/// Eigenvalues and origin type of `x' = A x`.
fn report_linear(field: &LinearPlanar) -> Result<()> {
    let values = eigenvalues(2, &field.matrix())?;
    println!(
        "trace = {:.6}, determinant = {:.6}",
        field.trace(),
        field.determinant()
    );
    for (k, value) in values.iter().enumerate() {
        println!("lambda{} = {}", k + 1, format_complex(*value));
    }
    println!(
        "origin: {:?}",
        classify_planar(values[0], values[1], 1e-12)
    );
    Ok(())
}

pub fn linear(config: &LinearConfig, out: &Path) -> Result<()> {
    let field = LinearPlanar::from_rows(config.matrix);
    report_linear(&field)?;

    let times = linspace(0.0, config.t_end, config.samples);
    let states = solve_on_grid(&field, &config.start, &times, &config.integration)?;
    if let Some(last) = states.last() {
        println!(
            "x({}) = {:.6}, y({}) = {:.6}",
            config.t_end, last[0], config.t_end, last[1]
        );
    }

    let lines = nullclines(&field, &config.window, NULLCLINE_SAMPLES, 0.0)?;
    let mut figure = Figure::phase("Linear planar system", config.window);
    figure
        .field(sample_field(&field, &config.window, config.grid, 0.0)?, BLUE)
        .segments(lines.x_nullcline, DARK_GREEN)
        .segments(lines.y_nullcline, ORANGE)
        .labelled_curve(
            "trajectory",
            states.iter().map(|s| (s[0], s[1])).collect(),
            DARK_RED,
        )
        .marker((config.start[0], config.start[1]), BLACK);
    figure.save(out)
}

pub fn cubic(config: &CubicConfig, out: &Path) -> Result<()> {
    let model = config.model;
    let times = linspace(0.0, config.t_end, config.samples);
    let states = solve_on_grid(&model, &config.start, &times, &config.integration)?;
    let radius = |s: &[f64]| (s[0] * s[0] + s[1] * s[1]).sqrt();
    if let (Some(first), Some(last)) = (states.first(), states.last()) {
        println!(
            "radius {:.6} at t = 0, {:.6e} at t = {}",
            radius(first),
            radius(last),
            config.t_end
        );
    }
    match solve_equilibrium(&model, &[0.0, 0.0], NewtonSettings::default()) {
        Ok(result) => println!("origin: {:?}", result.planar_stability()),
        Err(err) => warn!("origin analysis failed: {err:#}"),
    }

    let mut figure = Figure::phase(format!("Cubic planar system, a = {}", model.a), config.window);
    figure
        .field(sample_field(&model, &config.window, config.grid, 0.0)?, BLUE)
        .labelled_curve(
            "trajectory",
            states.iter().map(|s| (s[0], s[1])).collect(),
            DARK_RED,
        )
        .marker((config.start[0], config.start[1]), BLACK);
    figure.save(out)
}

pub fn nonlinear(config: &NonlinearConfig, out: &Path) -> Result<()> {
    let field = NonlinearExample;
    let mut figure = Figure::phase("x' = x - y, y' = x²y - 4x", config.window);

    println!(
        "{:>12} {:>12} {:>6}  {}",
        "x*", "y*", "iters", "type"
    );
    for guess in &config.guesses {
        match solve_equilibrium(&field, guess, NewtonSettings::default()) {
            Ok(result) => {
                let (x, y) = (result.state[0], result.state[1]);
                println!(
                    "{:>12.6} {:>12.6} {:>6}  {:?}",
                    x,
                    y,
                    result.iterations,
                    result.planar_stability()
                );
                figure.marker((x, y), BLACK);
            }
            Err(err) => warn!("no equilibrium from ({}, {}): {err:#}", guess[0], guess[1]),
        }
    }

    let lines = nullclines(&field, &config.window, config.nullcline_samples, 0.0)?;
    debug!(
        "nullclines: {} x segments, {} y segments",
        lines.x_nullcline.len(),
        lines.y_nullcline.len()
    );
    figure
        .field(sample_field(&field, &config.window, config.grid, 0.0)?, BLUE)
        .segments(lines.x_nullcline, DARK_GREEN)
        .segments(lines.y_nullcline, ORANGE);
    figure.save(out)
}

pub fn eigen(config: &EigenConfig, out: &Path) -> Result<()> {
    let field = LinearPlanar::from_rows(config.matrix);
    report_linear(&field)?;
    for (k, pair) in compute_eigenpairs(2, &field.matrix())?.iter().enumerate() {
        let v: Vec<String> = pair
            .vector
            .iter()
            .map(|c| format_complex(Complex::new(c.re, c.im)))
            .collect();
        println!("v{} = [{}]", k + 1, v.join(", "));
    }

    let trajectory = integrate(
        &field,
        0.0,
        config.t_end,
        &config.start,
        &[],
        &IntegrationSettings::default(),
    )?;
    let mut figure = Figure::phase("Linear system x' = A x", config.window);
    figure
        .field(sample_field(&field, &config.window, config.grid, 0.0)?, BLUE)
        .curve(
            trajectory.states.iter().map(|s| (s[0], s[1])).collect(),
            DARK_BLUE,
        )
        .marker((config.start[0], config.start[1]), BLACK);
    figure.save(out)
}

#[cfg(test)]
mod tests {
    use super::{eigen, format_complex, nonlinear};
    use crate::config::{EigenConfig, NonlinearConfig};
    use num_complex::Complex;

    #[test]
    fn complex_values_print_with_sign() {
        assert_eq!(format_complex(Complex::new(1.5, 0.0)), "1.500000");
        assert_eq!(format_complex(Complex::new(-0.5, -2.0)), "-0.500000 - 2.000000i");
        assert_eq!(format_complex(Complex::new(0.0, 1.0)), "0.000000 + 1.000000i");
    }

    #[test]
    fn portraits_are_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("eigen.svg");
        eigen(&EigenConfig::default(), &out).expect("eigen");
        assert!(out.exists());

        let out = dir.path().join("nonlinear.svg");
        let config = NonlinearConfig {
            nullcline_samples: 40,
            ..NonlinearConfig::default()
        };
        nonlinear(&config, &out).expect("nonlinear");
        assert!(out.exists());
    }
}
