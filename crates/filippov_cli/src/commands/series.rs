//! Time-series explorations: epidemics, cooling, growth and scalar IVPs.

use crate::config::{CoolingConfig, GrowthConfig, ScalarConfig, SiConfig, SirFitConfig};
use crate::plot::{Figure, DARK_BLUE, DARK_GREEN, DARK_RED, GREY, ORANGE};
use anyhow::{bail, Result};
use filippov_core::integrator::{integrate_fixed_steps, solve_on_grid};
use filippov_core::models::ScalarProblem;
use filippov_core::observations::{compare, load_observations, write_error_table};
use filippov_core::solvers::StepperKind;
use filippov_core::vector_field::linspace;
use plotters::style::BLACK;
use std::path::Path;

fn series(times: &[f64], values: impl Iterator<Item = f64>) -> Vec<(f64, f64)> {
    times.iter().copied().zip(values).collect()
}

pub fn si(config: &SiConfig, out: &Path) -> Result<()> {
    let times = linspace(0.0, config.t_end, config.samples);
    let states = solve_on_grid(&config.model, &config.initial, &times, &config.integration)?;
    let (peak_t, peak) = times
        .iter()
        .zip(&states)
        .map(|(t, s)| (*t, s[1]))
        .fold((0.0, f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
    println!("infected peak {peak:.6} at t = {peak_t:.2}");
    if let Some(last) = states.last() {
        println!("S({0}) = {1:.6}, I({0}) = {2:.6}", config.t_end, last[0], last[1]);
    }

    let mut figure = Figure::new("SI model", "t", "fraction");
    figure
        .labelled_curve("S(t)", series(&times, states.iter().map(|s| s[0])), DARK_BLUE)
        .labelled_curve("I(t)", series(&times, states.iter().map(|s| s[1])), DARK_RED);
    figure.save(out)
}

pub fn sir_fit(
    config: &SirFitConfig,
    data: Option<&Path>,
    errors: Option<&Path>,
    out: &Path,
) -> Result<()> {
    let Some(data) = data.or(config.data.as_deref()) else {
        bail!("sir-fit needs observations: pass --data or set sir_fit.data");
    };
    let observations = load_observations(data)?;
    let tf = observations
        .iter()
        .map(|o| o.day)
        .fold(f64::NEG_INFINITY, f64::max);
    let times = linspace(0.0, tf, config.samples);
    let states = solve_on_grid(&config.model, &config.initial, &times, &config.integration)?;
    let infected: Vec<f64> = states.iter().map(|s| s[1]).collect();
    let comparison = compare(&observations, &times, &infected)?;

    println!("{:>6} {:>10} {:>12} {:>12}", "day", "observed", "model", "abs error");
    for row in &comparison.rows {
        println!(
            "{:>6} {:>10} {:>12.4} {:>12.4}",
            row.day, row.observed, row.model, row.abs_error
        );
    }
    let summary = &comparison.summary;
    println!(
        "day {}: observed {}, model {:.4}, error {:.4} with step h = {:.4}",
        summary.last_day, summary.observed, summary.model, summary.abs_error, summary.step
    );
    if let Some(path) = errors.or(config.errors.as_deref()) {
        write_error_table(&comparison.rows, path)?;
        log::info!("wrote {}", path.display());
    }

    let mut figure = Figure::new("SIR model against observed cases", "t (days)", "infected");
    figure.labelled_curve("model I(t)", series(&times, infected.into_iter()), DARK_BLUE);
    for obs in &observations {
        figure.marker((obs.day, obs.cases), BLACK);
    }
    figure.save(out)
}

pub fn cooling(config: &CoolingConfig, out: &Path) -> Result<()> {
    let times = linspace(0.0, config.t_end, config.samples);
    let states = solve_on_grid(&config.model, &[config.initial], &times, &config.integration)?;
    let numeric: Vec<f64> = states.iter().map(|s| s[0]).collect();
    let ambient: Vec<f64> = times.iter().map(|&t| config.model.ambient.at(t)).collect();

    let mut figure = Figure::new("Newton's law of cooling", "t", "temperature");
    if let Some(last) = numeric.last() {
        println!("T({}) = {last:.6}", config.t_end);
    }
    if let Some(exact) = config.model.exact(config.t_end, config.initial) {
        println!("exact T({}) = {exact:.6}", config.t_end);
        let exact_curve = times
            .iter()
            .filter_map(|&t| config.model.exact(t, config.initial).map(|v| (t, v)))
            .collect();
        figure.labelled_curve("exact", exact_curve, DARK_GREEN);
    }
    figure
        .labelled_curve("T(t)", series(&times, numeric.into_iter()), DARK_RED)
        .labelled_curve("ambient", series(&times, ambient.into_iter()), GREY);
    figure.save(out)
}

pub fn growth(config: &GrowthConfig, out: &Path) -> Result<()> {
    let times = linspace(0.0, config.t_end, config.samples);
    let states = solve_on_grid(&config.model, &[config.initial], &times, &config.integration)?;
    let k = config.model.k;
    let exact = |t: f64| config.initial * (k * t).exp();
    if let Some(last) = states.last() {
        let reference = exact(config.t_end);
        println!(
            "y({}) = {:.6}, exact {:.6}, error {:.3e}",
            config.t_end,
            last[0],
            reference,
            (last[0] - reference).abs()
        );
    }

    let mut figure = Figure::new(format!("Exponential growth, k = {k}"), "t", "y");
    figure
        .labelled_curve("numeric", series(&times, states.iter().map(|s| s[0])), DARK_BLUE)
        .labelled_curve("exact", series(&times, times.iter().map(|&t| exact(t))), ORANGE);
    figure.save(out)
}

fn equation(problem: ScalarProblem) -> String {
    match problem {
        ScalarProblem::ForcedDecay => "x' = -x + sin t".to_string(),
        ScalarProblem::Relaxation { target } => format!("x' = -x + {target}"),
        ScalarProblem::Rational => "x' = -t / x".to_string(),
    }
}

pub fn scalar(config: &ScalarConfig, out: &Path) -> Result<()> {
    let times = linspace(config.t0, config.t_end, config.samples);
    let states = solve_on_grid(&config.problem, &[config.initial], &times, &config.integration)?;
    let values: Vec<f64> = states.iter().map(|s| s[0]).collect();
    let step = (config.t_end - config.t0) / config.samples as f64;
    if let Some(last) = values.last() {
        println!("approximate x({}) = {last:.6}", config.t_end);
        if let Some(exact) = config.exact {
            println!("exact x({}) = {exact:.6}", config.t_end);
            println!(
                "error E = {:.12} with step h = {step:.3}",
                (last - exact).abs()
            );
        }
    }

    let mut figure = Figure::new(equation(config.problem), "t", "x");
    figure.labelled_curve("x(t)", series(&times, values.into_iter()), DARK_BLUE);
    if let Some(steps) = config.euler_steps {
        let euler = integrate_fixed_steps(
            &config.problem,
            StepperKind::Euler,
            config.t0,
            config.t_end,
            &[config.initial],
            steps,
        )?;
        if let Some(last) = euler.last_state() {
            println!("Euler with {steps} steps: x({}) = {:.6}", config.t_end, last[0]);
        }
        figure.labelled_curve("Euler", series(&euler.t, euler.component(0).into_iter()), DARK_RED);
    }
    figure.save(out)
}

#[cfg(test)]
mod tests {
    use super::{cooling, equation, scalar, series, sir_fit};
    use crate::config::{CoolingConfig, ScalarConfig, SirFitConfig};

    #[test]
    fn series_pairs_times_with_values() {
        let points = series(&[0.0, 1.0, 2.0], [5.0, 6.0].into_iter());
        assert_eq!(points, vec![(0.0, 5.0), (1.0, 6.0)]);
    }

    #[test]
    fn scalar_titles_show_the_equation() {
        assert_eq!(equation(ScalarConfig::relaxation().problem), "x' = -x + 10");
        assert_eq!(equation(ScalarConfig::rational().problem), "x' = -t / x");
    }

    #[test]
    fn sir_fit_needs_data_and_writes_error_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("sir.svg");
        let err = sir_fit(&SirFitConfig::default(), None, None, &out).expect_err("no data");
        assert!(err.to_string().contains("--data"));

        let data = dir.path().join("cases.csv");
        std::fs::write(&data, "dia,Casos\n3,25\n4,75\n5,227\n").expect("write csv");
        let errors = dir.path().join("errors.csv");
        sir_fit(&SirFitConfig::default(), Some(data.as_path()), Some(errors.as_path()), &out).expect("sir fit");
        assert!(out.exists());
        let table = std::fs::read_to_string(&errors).expect("read errors");
        assert_eq!(table.lines().count(), 4);
    }

    #[test]
    fn scalar_presets_and_periodic_cooling_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        for (name, config) in [
            ("decay", ScalarConfig::forced_decay()),
            ("relax", ScalarConfig::relaxation()),
        ] {
            let out = dir.path().join(format!("{name}.svg"));
            scalar(&config, &out).expect("scalar run");
            assert!(out.exists());
        }
        let out = dir.path().join("cooling.svg");
        cooling(&CoolingConfig::periodic(), &out).expect("cooling");
        assert!(out.exists());
    }
}
