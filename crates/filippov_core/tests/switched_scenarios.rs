use filippov_core::equation_engine::EquationSystem;
use filippov_core::filippov::{FilippovSettings, Mode, SwitchedSystem, Termination};
use filippov_core::integrator::{solve_on_grid, IntegrationSettings};
use filippov_core::models::{PredatorPreyParams, SiTreatmentParams, SirModel};
use filippov_core::observations::{compare, read_observations};
use filippov_core::switching::Classification;
use filippov_core::vector_field::{linspace, Window};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn predator_prey_from_text(harvest: bool) -> EquationSystem<f64> {
    let dy = if harvest {
        "a*x*y/(b + x) - d*y - e*y"
    } else {
        "a*x*y/(b + x) - d*y"
    };
    let p = PredatorPreyParams::default();
    EquationSystem::from_strings(
        &names(&["x*(1 - x) - a*x*y/(b + x)", dy]),
        &names(&["x", "y"]),
        &names(&["a", "b", "d", "e"]),
        vec![p.a, p.b, p.d, p.e],
    )
    .expect("fields should compile")
}

#[test]
fn expression_fields_reproduce_builtin_predator_prey_run() {
    let params = PredatorPreyParams::default();
    let (t1, t2) = params.tangent_points();
    let window = Window::new(0.0, 1.2, 0.0, 2.0);
    let settings = FilippovSettings {
        eps: 1e-5,
        ..FilippovSettings::default()
    };

    let builtin = SwitchedSystem::new(params.lower(), params.upper(), 1.625)
        .with_tangent_points(t1, t2)
        .simulate((1.1, 1.5), &window, &settings)
        .expect("builtin run");
    let scripted = SwitchedSystem::new(
        predator_prey_from_text(false),
        predator_prey_from_text(true),
        1.625,
    )
    .with_tangent_points(t1, t2)
    .simulate((1.1, 1.5), &window, &settings)
    .expect("scripted run");

    assert_eq!(builtin.termination, scripted.termination);
    assert_eq!(builtin.switches.len(), scripted.switches.len());
    for (a, b) in builtin.switches.iter().zip(&scripted.switches) {
        assert_eq!(a.classification, b.classification);
        assert!((a.x - b.x).abs() < 1e-8);
    }
}

#[test]
fn every_transition_leaves_the_boundary() {
    let params = SiTreatmentParams::default();
    let w = 0.3;
    let (t1, t2) = params.tangent_points(w);
    let system =
        SwitchedSystem::new(params.lower(), params.upper(), w).with_tangent_points(t1, t2);
    let window = Window::new(0.0, 1.0, 0.0, 1.0);
    let settings = FilippovSettings::default();

    for start in [(0.55, 0.4), (0.3, 0.4), (0.9, 0.1)] {
        let run = system
            .simulate(start, &window, &settings)
            .expect("simulation should run");
        assert!(run.switches.len() <= settings.max_switches);
        for pair in run.segments.windows(2) {
            let next_start = pair[1].points[0];
            match pair[1].mode {
                Mode::Region1 => assert!(w - next_start.1 >= settings.eps * 0.5),
                Mode::Region2 => assert!(next_start.1 - w >= settings.eps * 0.5),
                Mode::Sliding => assert_eq!(next_start.1, w),
            }
        }
        for record in &run.switches {
            let expected = record.normals.classify(settings.tangency_tol);
            assert_eq!(record.classification, expected);
        }
        if run.termination == Termination::NoSwitch {
            assert!(run.final_point.is_some());
        }
    }
}

#[test]
fn crossings_alternate_regions() {
    let params = PredatorPreyParams::default();
    let (t1, t2) = params.tangent_points();
    let system = SwitchedSystem::new(params.lower(), params.upper(), 1.625)
        .with_tangent_points(t1, t2);
    let window = Window::new(0.0, 1.2, 0.0, 2.0);
    let settings = FilippovSettings {
        eps: 1e-5,
        ..FilippovSettings::default()
    };
    let run = system
        .simulate((1.1, 1.5), &window, &settings)
        .expect("simulation should run");

    let crossings: Vec<_> = run
        .switches
        .iter()
        .filter(|r| r.classification == Classification::Crossing)
        .collect();
    assert!(!crossings.is_empty(), "no crossing in {:?}", run.switches);
    for record in crossings {
        let from = record.from.expect("crossing reached from a region");
        let next = run
            .segments
            .iter()
            .find(|s| s.mode != Mode::Sliding && s.t[0] == record.t)
            .expect("segment after the crossing");
        assert_eq!(next.mode, Mode::from(from.opposite()));
    }
    assert!(run
        .switches
        .iter()
        .any(|r| r.classification == Classification::Sliding));
}

#[test]
fn sir_curve_compares_against_observations() {
    let data = "dia,Casos\n1,3\n2,8\n3,28\n4,75\n";
    let observations = read_observations(data.as_bytes()).expect("valid data");
    let times = linspace(0.0, 4.0, 250);
    let values = solve_on_grid(
        &SirModel::default(),
        &[762.0, 1.0, 0.0],
        &times,
        &IntegrationSettings::default(),
    )
    .expect("sir solve");
    let infected: Vec<f64> = values.iter().map(|s| s[1]).collect();
    let cmp = compare(&observations, &times, &infected).expect("comparison");

    assert_eq!(cmp.rows.len(), 4);
    assert!(infected.windows(2).take(200).all(|w| w[1] > w[0]));
    assert!((cmp.summary.step - 4.0 / 250.0).abs() < 1e-12);
    for row in &cmp.rows {
        assert!((row.abs_error - (row.observed - row.model).abs()).abs() < 1e-12);
    }
}
