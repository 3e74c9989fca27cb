//! Explorations with two fields glued on a threshold line.

use crate::config::{
    starts, LinearSwitchConfig, PolynomialPairConfig, PredatorPreyConfig, ScenarioConfig,
    SiTreatmentConfig, TimeSwitchedConfig,
};
use crate::plot::{Figure, DARK_BLUE, DARK_GREEN, DARK_RED, GREY, ORANGE, PURPLE};
use anyhow::{Context, Result};
use filippov_core::equation_engine::EquationSystem;
use filippov_core::equilibrium::{solve_equilibrium, NewtonSettings};
use filippov_core::filippov::{
    FilippovSettings, Mode, SwitchedSystem, SwitchedTrajectory, TangentPoints,
};
use filippov_core::models::{LinearPlanar, PolynomialLower, PolynomialUpper};
use filippov_core::switching::Classification;
use filippov_core::time_switched;
use filippov_core::traits::PlanarField;
use filippov_core::vector_field::{sample_field, GridSpacing, Window};
use log::{info, warn};
use plotters::style::{RGBColor, BLACK, BLUE, GREEN, RED};
use std::path::Path;

/// Direction fields of both regions plus the threshold line.
fn switched_figure<F1, F2>(
    title: &str,
    system: &SwitchedSystem<F1, F2>,
    window: Window,
    grid: GridSpacing,
    upper_color: RGBColor,
) -> Result<Figure>
where
    F1: PlanarField,
    F2: PlanarField,
{
    let w = system.threshold;
    let mut figure = Figure::phase(title, window);
    figure
        .field(sample_field(&system.lower, &window.lower(w), grid, 0.0)?, RED)
        .field(sample_field(&system.upper, &window.upper(w), grid, 0.0)?, upper_color)
        .hline(w, BLACK);
    Ok(figure)
}

fn mode_color(mode: Mode) -> RGBColor {
    match mode {
        Mode::Region1 => DARK_RED,
        Mode::Region2 => DARK_BLUE,
        Mode::Sliding => ORANGE,
    }
}

fn draw_trajectory(figure: &mut Figure, trajectory: &SwitchedTrajectory, w: f64) {
    for segment in &trajectory.segments {
        figure.curve(segment.points.clone(), mode_color(segment.mode));
    }
    for record in &trajectory.switches {
        figure.marker((record.x, w), GREY);
    }
    figure.marker(trajectory.start, BLACK);
}

fn describe(classification: Classification) -> String {
    match classification {
        Classification::Crossing => "crossing".to_string(),
        Classification::Sliding => "sliding".to_string(),
        Classification::Tangency { exit } => format!("tangency, exit {exit:?}"),
    }
}

fn report(index: usize, trajectory: &SwitchedTrajectory) {
    let (x0, y0) = trajectory.start;
    println!("trajectory {index} from ({x0:.4}, {y0:.4})");
    if !trajectory.switches.is_empty() {
        println!(
            "  {:>3} {:>10} {:>10} {:>12} {:>12} {:>12}  {}",
            "#", "t", "x", "f1_y", "f2_y", "l", "class"
        );
    }
    for (k, record) in trajectory.switches.iter().enumerate() {
        let n = &record.normals;
        println!(
            "  {:>3} {:>10.4} {:>10.4} {:>12.4e} {:>12.4e} {:>12.4e}  {}",
            k + 1,
            record.t,
            record.x,
            n.f1_y,
            n.f2_y,
            n.product(),
            describe(record.classification)
        );
    }
    for exit in &trajectory.sliding_exits {
        let reached = match exit.reached {
            Some(point) => format!("{point:?}"),
            None => "window edge or time limit".to_string(),
        };
        println!(
            "  sliding ends at t = {:.4}, x = {:.4} ({reached}), released {:?}",
            exit.t, exit.x, exit.release
        );
    }
    match trajectory.final_point {
        Some((x, y)) => println!(
            "  termination: {:?} at ({x:.4}, {y:.4})",
            trajectory.termination
        ),
        None => println!("  termination: {:?}", trajectory.termination),
    }
}

fn report_tangents(tangents: &TangentPoints, w: f64, figure: &mut Figure) {
    for (label, point) in [("T1", tangents.t1), ("T2", tangents.t2)] {
        match point {
            Some(x) => {
                println!("{label} = {x:.6} on y = {w}");
                figure.marker((x, w), PURPLE);
            }
            None => println!("{label} not found on y = {w}"),
        }
    }
}

struct Portrait<'a> {
    title: &'a str,
    window: Window,
    grid: GridSpacing,
    starts: &'a [[f64; 2]],
    equilibria: Vec<(f64, f64)>,
}

/// Simulates every start through the Filippov driver and saves the portrait.
fn simulate_portrait<F1, F2>(
    system: &SwitchedSystem<F1, F2>,
    portrait: Portrait<'_>,
    settings: &FilippovSettings,
    out: &Path,
) -> Result<()>
where
    F1: PlanarField,
    F2: PlanarField,
{
    let w = system.threshold;
    let mut figure =
        switched_figure(portrait.title, system, portrait.window, portrait.grid, BLUE)?;
    let tangents = system.resolve_tangent_points(&portrait.window, settings.tangent_samples)?;
    report_tangents(&tangents, w, &mut figure);
    for point in portrait.equilibria {
        figure.marker(point, DARK_GREEN);
    }

    for (index, start) in starts(portrait.starts).enumerate() {
        let trajectory = system
            .simulate(start, &portrait.window, settings)
            .with_context(|| format!("simulating from ({}, {})", start.0, start.1))?;
        info!(
            "trajectory {}: {} segments, {} switches, {:?}",
            index + 1,
            trajectory.segments.len(),
            trajectory.switches.len(),
            trajectory.termination
        );
        report(index + 1, &trajectory);
        draw_trajectory(&mut figure, &trajectory, w);
    }
    figure.save(out)
}

pub fn predator_prey(config: &PredatorPreyConfig, out: &Path) -> Result<()> {
    let params = config.params;
    let (t1, t2) = params.tangent_points();
    let system = SwitchedSystem::new(params.lower(), params.upper(), config.threshold)
        .with_tangent_points(t1, t2);
    simulate_portrait(
        &system,
        Portrait {
            title: "Predator-prey with harvesting above the threshold",
            window: config.window,
            grid: config.grid,
            starts: &config.starts,
            equilibria: Vec::new(),
        },
        &config.simulator,
        out,
    )
}

pub fn si_treatment(config: &SiTreatmentConfig, out: &Path) -> Result<()> {
    let params = config.params;
    let w = config.threshold;
    let (t1, t2) = params.tangent_points(w);
    let system = SwitchedSystem::new(params.lower(), params.upper(), w).with_tangent_points(t1, t2);

    let mut equilibria = Vec::new();
    let lower = params.lower_equilibrium();
    println!("equilibrium of f1: ({:.6}, {:.6})", lower[0], lower[1]);
    equilibria.push((lower[0], lower[1]));
    let upper = params.upper_equilibria();
    if upper.is_empty() {
        println!("f2 has no real equilibria (negative discriminant)");
    }
    for point in upper {
        println!("equilibrium of f2: ({:.6}, {:.6})", point[0], point[1]);
        equilibria.push((point[0], point[1]));
    }
    match solve_equilibrium(&system.lower, &lower, NewtonSettings::default()) {
        Ok(result) => println!("f1 equilibrium type: {:?}", result.planar_stability()),
        Err(err) => warn!("could not refine the f1 equilibrium: {err:#}"),
    }

    simulate_portrait(
        &system,
        Portrait {
            title: "SI model with treatment above the threshold",
            window: config.window,
            grid: config.grid,
            starts: &config.starts,
            equilibria,
        },
        &config.simulator,
        out,
    )
}

pub fn polynomial_pair(config: &PolynomialPairConfig, out: &Path) -> Result<()> {
    let system = SwitchedSystem::new(PolynomialLower, PolynomialUpper, config.threshold);
    simulate_portrait(
        &system,
        Portrait {
            title: "Polynomial fields glued on the threshold",
            window: config.window,
            grid: config.grid,
            starts: &config.starts,
            equilibria: Vec::new(),
        },
        &config.simulator,
        out,
    )
}

pub fn scenario(config: &ScenarioConfig, out: &Path) -> Result<()> {
    let names = config.parameter_names();
    let values = config.parameter_values();
    let lower =
        EquationSystem::from_strings(&config.lower, &config.variables, &names, values.clone())
            .context("compiling scenario.lower")?;
    let upper = EquationSystem::from_strings(&config.upper, &config.variables, &names, values)
        .context("compiling scenario.upper")?;
    let mut system = SwitchedSystem::new(lower, upper, config.threshold);
    if let Some([t1, t2]) = config.tangent_points {
        system = system.with_tangent_points(t1, t2);
    }
    simulate_portrait(
        &system,
        Portrait {
            title: &config.title,
            window: config.window,
            grid: config.grid,
            starts: &config.starts,
            equilibria: Vec::new(),
        },
        &config.simulator,
        out,
    )
}

/// One crossing per start, no classification.
pub fn linear_switch(config: &LinearSwitchConfig, out: &Path) -> Result<()> {
    let system = SwitchedSystem::new(
        LinearPlanar::from_rows(config.lower),
        LinearPlanar::from_rows(config.upper),
        config.threshold,
    );
    let w = config.threshold;
    let mut figure = switched_figure(
        "Linear fields with a single switch",
        &system,
        config.window,
        config.grid,
        GREEN,
    )?;
    for (index, start) in starts(&config.starts).enumerate() {
        let trajectory = system.single_switch(start, config.t_max, &config.integration)?;
        match trajectory.switches.first() {
            Some(record) => println!(
                "trajectory {} from ({:.2}, {:.2}) crosses y = {w} at t = {:.4}, x = {:.4}",
                index + 1,
                start.0,
                start.1,
                record.t,
                record.x
            ),
            None => println!(
                "trajectory {} from ({:.2}, {:.2}) never reaches y = {w}",
                index + 1,
                start.0,
                start.1
            ),
        }
        if let Some((x, y)) = trajectory.final_point {
            println!(
                "  {:?} at ({x:.4}, {y:.4})",
                trajectory.termination
            );
        }
        draw_trajectory(&mut figure, &trajectory, w);
    }
    figure.save(out)
}

pub fn time_switched(config: &TimeSwitchedConfig, out: &Path) -> Result<()> {
    let settings = &config.settings;
    let run = time_switched::simulate(settings)?;
    println!(
        "{} switches in {} steps (h = {}, tol = {})",
        run.schedule.switch_times.len(),
        run.states.len(),
        settings.h,
        settings.tol
    );
    for (k, t) in run.schedule.switch_times.iter().enumerate() {
        println!("  switch {:>3} at t = {t:.2}", k + 1);
    }
    if let Some([x, y]) = run.states.last() {
        println!("final state ({x:.4e}, {y:.4e})");
    }

    let reference = config.reference;
    let window = config.window;
    let mut figure = Figure::phase("Alternating linear systems on a sinusoidal schedule", window);
    figure
        .field(
            sample_field(
                &LinearPlanar::from_rows(settings.a1),
                &window.lower(reference),
                config.grid,
                0.0,
            )?,
            RED,
        )
        .field(
            sample_field(
                &LinearPlanar::from_rows(settings.a2),
                &window.upper(reference),
                config.grid,
                0.0,
            )?,
            GREEN,
        )
        .hline(reference, GREY)
        .labelled_curve(
            "trajectory",
            run.states.iter().map(|s| (s[0], s[1])).collect(),
            DARK_BLUE,
        );
    figure.save(out)
}
