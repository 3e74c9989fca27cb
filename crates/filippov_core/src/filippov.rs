//! Trajectories of planar systems whose vector field switches across `y = w`.
//!
//! The driver alternates planar segments, each stopped by a terminal event on
//! the switching line, with a classification of the boundary point:
//! crossings continue in the other region, sliding follows the line until a
//! tangent point, tangencies leave towards the dominant field. Every run ends
//! with a [`Termination`] describing why it stopped.

use crate::integrator::{
    integrate, Event, EventDirection, IntegrationSettings, IntegrationStatus, Solution,
};
use crate::nullcline::{bisect, roots_on_axis, AxisSpec};
use crate::switching::{nudge, BoundaryNormals, Classification, Side, SlidingField, SlidingRule};
use crate::traits::PlanarField;
use crate::vector_field::Window;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FilippovSettings {
    pub max_switches: usize,
    /// Time limit of each planar segment.
    pub segment_time: f64,
    /// Time limit of each sliding segment.
    pub sliding_time: f64,
    /// Offset from the line applied after every transition.
    pub eps: f64,
    pub tangency_tol: f64,
    pub sliding_rule: SlidingRule,
    /// Samples per axis when tangent points are located numerically.
    pub tangent_samples: usize,
    pub integration: IntegrationSettings,
}

impl Default for FilippovSettings {
    fn default() -> Self {
        Self {
            max_switches: 8,
            segment_time: 50.0,
            sliding_time: 50.0,
            eps: 1e-6,
            tangency_tol: 1e-8,
            sliding_rule: SlidingRule::FirstField,
            tangent_samples: 400,
            integration: IntegrationSettings::default(),
        }
    }
}

impl FilippovSettings {
    fn validate(&self) -> Result<()> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            bail!("eps must be positive and finite.");
        }
        if !(self.tangency_tol.is_finite() && self.tangency_tol >= 0.0) {
            bail!("tangency_tol must be non-negative and finite.");
        }
        if !(self.segment_time.is_finite() && self.segment_time > 0.0) {
            bail!("segment_time must be positive and finite.");
        }
        if !(self.sliding_time.is_finite() && self.sliding_time > 0.0) {
            bail!("sliding_time must be positive and finite.");
        }
        if self.tangent_samples < 2 {
            bail!("tangent_samples must be at least 2.");
        }
        Ok(())
    }
}

/// Which dynamics produced a trajectory segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Lower field, `y < w`.
    Region1,
    /// Upper field, `y > w`.
    Region2,
    /// Motion along `y = w`.
    Sliding,
}

impl From<Side> for Mode {
    fn from(side: Side) -> Self {
        match side {
            Side::Below => Mode::Region1,
            Side::Above => Mode::Region2,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrajectorySegment {
    pub mode: Mode,
    pub t: Vec<f64>,
    pub points: Vec<(f64, f64)>,
}

impl TrajectorySegment {
    fn planar(mode: Mode, solution: &Solution) -> Self {
        Self {
            mode,
            t: solution.t.clone(),
            points: solution.states.iter().map(|s| (s[0], s[1])).collect(),
        }
    }

    fn sliding(solution: &Solution, w: f64) -> Self {
        Self {
            mode: Mode::Sliding,
            t: solution.t.clone(),
            points: solution.states.iter().map(|s| (s[0], w)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A boundary point reached by the trajectory and how it was handled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SwitchRecord {
    pub t: f64,
    pub x: f64,
    /// Region the trajectory arrived from; `None` when a run starts on the line.
    pub from: Option<Side>,
    pub normals: BoundaryNormals,
    pub classification: Classification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TangentPoint {
    T1,
    T2,
}

/// End of a sliding segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlidingExit {
    pub t: f64,
    pub x: f64,
    /// Tangent point whose normal component vanished at the exit, if any.
    pub reached: Option<TangentPoint>,
    pub release: Side,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// A segment produced fewer than two samples.
    Degenerate,
    /// A planar segment ran its full time without reaching the line.
    NoSwitch,
    /// The state after a transition lies outside the window.
    LeftWindow,
    /// The switch budget was used up.
    MaxSwitches,
    /// The state stopped being finite.
    Diverged,
    /// A single-switch run came back down to the line.
    Returned,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwitchedTrajectory {
    pub start: (f64, f64),
    pub segments: Vec<TrajectorySegment>,
    pub switches: Vec<SwitchRecord>,
    pub sliding_exits: Vec<SlidingExit>,
    pub termination: Termination,
    /// Last state of the run, after any nudge.
    pub final_point: Option<(f64, f64)>,
}

impl SwitchedTrajectory {
    fn new(start: (f64, f64)) -> Self {
        Self {
            start,
            segments: Vec::new(),
            switches: Vec::new(),
            sliding_exits: Vec::new(),
            termination: Termination::MaxSwitches,
            final_point: None,
        }
    }

    fn finish(mut self, termination: Termination, point: Option<(f64, f64)>) -> Self {
        self.termination = termination;
        if point.is_some() {
            self.final_point = point;
        }
        self
    }
}

/// Abscissae on `y = w` where `f1_y` (`t1`) and `f2_y` (`t2`) vanish.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TangentPoints {
    pub t1: Option<f64>,
    pub t2: Option<f64>,
}

/// Two planar fields glued along the horizontal line `y = threshold`.
#[derive(Debug, Clone)]
pub struct SwitchedSystem<F1, F2> {
    pub lower: F1,
    pub upper: F2,
    pub threshold: f64,
    pub tangent_points: Option<TangentPoints>,
}

impl<F1, F2> SwitchedSystem<F1, F2>
where
    F1: PlanarField,
    F2: PlanarField,
{
    pub fn new(lower: F1, upper: F2, threshold: f64) -> Self {
        Self {
            lower,
            upper,
            threshold,
            tangent_points: None,
        }
    }

    pub fn with_tangent_points(mut self, t1: f64, t2: f64) -> Self {
        self.tangent_points = Some(TangentPoints {
            t1: Some(t1),
            t2: Some(t2),
        });
        self
    }

    pub fn normals(&self, t: f64, x: f64) -> BoundaryNormals {
        BoundaryNormals::at(&self.lower, &self.upper, t, x, self.threshold)
    }

    /// Analytic tangent points when set, otherwise the first non-zero root of
    /// each normal component along the window's x range.
    pub fn resolve_tangent_points(
        &self,
        window: &Window,
        samples: usize,
    ) -> Result<TangentPoints> {
        if let Some(points) = self.tangent_points {
            return Ok(points);
        }
        let axis = AxisSpec::new(window.x_min, window.x_max, samples);
        let w = self.threshold;
        let t1 = locate_tangent(|x| self.lower.eval_planar(0.0, x, w).1, &axis)?;
        let t2 = locate_tangent(|x| self.upper.eval_planar(0.0, x, w).1, &axis)?;
        log::debug!("numeric tangent points on y = {w}: T1 = {t1:?}, T2 = {t2:?}");
        Ok(TangentPoints { t1, t2 })
    }

    fn validate(&self, window: &Window) -> Result<()> {
        if self.lower.dimension() != 2 || self.upper.dimension() != 2 {
            bail!("Switched systems require two planar fields (dimension 2).");
        }
        if !self.threshold.is_finite() {
            bail!("Switching threshold must be finite.");
        }
        window.validate()
    }

    /// Follows the trajectory from `start` through at most
    /// `settings.max_switches` boundary transitions.
    pub fn simulate(
        &self,
        start: (f64, f64),
        window: &Window,
        settings: &FilippovSettings,
    ) -> Result<SwitchedTrajectory> {
        self.validate(window)?;
        settings.validate()?;
        let w = self.threshold;
        if nudge(w, Side::Below, settings.eps) == w || nudge(w, Side::Above, settings.eps) == w {
            bail!(
                "eps = {} does not move the state off y = {w}; increase eps.",
                settings.eps
            );
        }
        let mut run = SwitchedTrajectory::new(start);
        let mut tangents: Option<TangentPoints> = None;
        let (mut t, mut x, mut y) = (0.0, start.0, start.1);

        for switch_count in 0..settings.max_switches {
            if !window.contains(x, y) {
                log::info!("trajectory left the window at ({x}, {y})");
                return Ok(run.finish(Termination::LeftWindow, Some((x, y))));
            }

            let from = match Side::of(y, w) {
                Some(side) => {
                    let solution = match side {
                        Side::Below => self.planar_segment(&self.lower, side, t, (x, y), settings),
                        Side::Above => self.planar_segment(&self.upper, side, t, (x, y), settings),
                    }
                    .with_context(|| format!("Planar segment {switch_count} failed."))?;

                    if solution.len() < 2 {
                        log::warn!("degenerate segment from ({x}, {y}); stopping");
                        return Ok(run.finish(Termination::Degenerate, Some((x, y))));
                    }
                    run.segments.push(TrajectorySegment::planar(side.into(), &solution));
                    let last = solution.last_state().map(|s| (s[0], s[1]));

                    match solution.status {
                        IntegrationStatus::Completed => {
                            log::debug!("no switch within {} time units", settings.segment_time);
                            return Ok(run.finish(Termination::NoSwitch, last));
                        }
                        IntegrationStatus::NonFinite => {
                            log::warn!("planar segment diverged after t = {t}");
                            return Ok(run.finish(Termination::Diverged, last));
                        }
                        IntegrationStatus::TerminalEvent(_) => {}
                    }
                    let Some(&hit_t) = solution.t.last() else {
                        return Ok(run.finish(Termination::Degenerate, last));
                    };
                    t = hit_t;
                    x = last.map_or(x, |p| p.0);
                    Some(side)
                }
                None => None,
            };

            let normals = self.normals(t, x);
            let classification = normals.classify(settings.tangency_tol);
            log::info!(
                "switch {switch_count} at x = {x:.6}, t = {t:.4}: l = {:.3e} ({classification:?})",
                normals.product()
            );
            run.switches.push(SwitchRecord {
                t,
                x,
                from,
                normals,
                classification,
            });

            y = match classification {
                Classification::Crossing => {
                    let side = match from {
                        Some(side) => side.opposite(),
                        None => normals.release_side(),
                    };
                    nudge(w, side, settings.eps)
                }
                Classification::Tangency { exit } => nudge(w, exit, settings.eps),
                Classification::Sliding => {
                    let points = match tangents {
                        Some(points) => points,
                        None => {
                            let points =
                                self.resolve_tangent_points(window, settings.tangent_samples)?;
                            tangents = Some(points);
                            points
                        }
                    };
                    let solution = self.sliding_segment(t, x, &points, window, settings)?;
                    if solution.len() < 2 {
                        log::warn!("degenerate sliding segment at x = {x}; stopping");
                        return Ok(run.finish(Termination::Degenerate, Some((x, w))));
                    }
                    run.segments.push(TrajectorySegment::sliding(&solution, w));
                    if solution.status == IntegrationStatus::NonFinite {
                        log::warn!("sliding segment diverged after t = {t}");
                        return Ok(run.finish(Termination::Diverged, Some((x, w))));
                    }
                    t = solution.t.last().copied().unwrap_or(t);
                    x = solution.last_state().map_or(x, |s| s[0]);

                    let exit_normals = self.normals(t, x);
                    let reached = if exit_normals.f1_y.abs() < settings.tangency_tol {
                        Some(TangentPoint::T1)
                    } else if exit_normals.f2_y.abs() < settings.tangency_tol {
                        Some(TangentPoint::T2)
                    } else {
                        match solution.status {
                            IntegrationStatus::TerminalEvent(0) if points.t1.is_some() => {
                                Some(TangentPoint::T1)
                            }
                            IntegrationStatus::TerminalEvent(1) if points.t2.is_some() => {
                                Some(TangentPoint::T2)
                            }
                            _ => None,
                        }
                    };
                    let release = exit_normals.release_side();
                    log::info!("sliding ended at x = {x:.6} ({reached:?}), released {release:?}");
                    run.sliding_exits.push(SlidingExit {
                        t,
                        x,
                        reached,
                        release,
                    });
                    nudge(w, release, settings.eps)
                }
            };
            run.final_point = Some((x, y));
        }

        if !window.contains(x, y) {
            return Ok(run.finish(Termination::LeftWindow, Some((x, y))));
        }
        log::info!("stopped after {} switches", settings.max_switches);
        Ok(run.finish(Termination::MaxSwitches, Some((x, y))))
    }

    fn planar_segment<F: PlanarField>(
        &self,
        field: &F,
        side: Side,
        t0: f64,
        start: (f64, f64),
        settings: &FilippovSettings,
    ) -> Result<Solution> {
        let direction = match side {
            Side::Below => EventDirection::Rising,
            Side::Above => EventDirection::Falling,
        };
        let events = [Event::threshold(1, self.threshold, direction)];
        integrate(
            field,
            t0,
            t0 + settings.segment_time,
            &[start.0, start.1],
            &events,
            &settings.integration,
        )
    }

    /// Integrates the sliding dynamics from `x0`. Events 0 and 1 are the
    /// tangent points (when known); the window edges stop the run too.
    fn sliding_segment(
        &self,
        t0: f64,
        x0: f64,
        points: &TangentPoints,
        window: &Window,
        settings: &FilippovSettings,
    ) -> Result<Solution> {
        let field = SlidingField {
            lower: &self.lower,
            upper: &self.upper,
            w: self.threshold,
            rule: settings.sliding_rule,
        };
        // Unknown tangent points never fire.
        let at = |point: Option<f64>| -> Event<'static> {
            match point {
                Some(level) => Event::threshold(0, level, EventDirection::Either),
                None => Event::new("none", EventDirection::Either, true, |_t, _x: &[f64]| 1.0),
            }
        };
        let events = [
            at(points.t1),
            at(points.t2),
            Event::threshold(0, window.x_min, EventDirection::Falling),
            Event::threshold(0, window.x_max, EventDirection::Rising),
        ];
        integrate(
            &field,
            t0,
            t0 + settings.sliding_time,
            &[x0],
            &events,
            &settings.integration,
        )
        .context("Sliding segment failed.")
    }

    /// Region 1 until the first upward crossing, then region 2 from the
    /// crossing point until it comes back down or another `t_max` elapses.
    /// Time runs on from the crossing. No classification is performed.
    pub fn single_switch(
        &self,
        start: (f64, f64),
        t_max: f64,
        settings: &IntegrationSettings,
    ) -> Result<SwitchedTrajectory> {
        if self.lower.dimension() != 2 || self.upper.dimension() != 2 {
            bail!("Switched systems require two planar fields (dimension 2).");
        }
        if !(t_max.is_finite() && t_max > 0.0) {
            bail!("t_max must be positive and finite.");
        }
        let w = self.threshold;
        let mut run = SwitchedTrajectory::new(start);

        let up = [Event::threshold(1, w, EventDirection::Rising)];
        let first = integrate(&self.lower, 0.0, t_max, &[start.0, start.1], &up, settings)?;
        run.segments.push(TrajectorySegment::planar(Mode::Region1, &first));
        let Some(hit) = first.first_hit(0) else {
            let last = first.last_state().map(|s| (s[0], s[1]));
            return Ok(run.finish(Termination::NoSwitch, last));
        };
        let crossing = (hit.state[0], w);
        run.switches.push(SwitchRecord {
            t: hit.t,
            x: crossing.0,
            from: Some(Side::Below),
            normals: self.normals(hit.t, crossing.0),
            classification: Classification::Crossing,
        });
        log::info!("single switch at ({:.4}, {:.4})", crossing.0, crossing.1);

        let down = [Event::threshold(1, w, EventDirection::Falling)];
        let second = integrate(
            &self.upper,
            hit.t,
            hit.t + t_max,
            &[crossing.0, crossing.1],
            &down,
            settings,
        )?;
        run.segments.push(TrajectorySegment::planar(Mode::Region2, &second));
        let last = second.last_state().map(|s| (s[0], s[1]));
        let termination = match second.status {
            IntegrationStatus::NonFinite => Termination::Diverged,
            IntegrationStatus::TerminalEvent(_) => Termination::Returned,
            IntegrationStatus::Completed => Termination::NoSwitch,
        };
        Ok(run.finish(termination, last))
    }
}

/// First root of `g` on `axis` away from `x = 0`, refined by bisection.
fn locate_tangent(g: impl Fn(f64) -> f64, axis: &AxisSpec) -> Result<Option<f64>> {
    let roots = roots_on_axis(&g, axis)?;
    let Some(&root) = roots
        .iter()
        .find(|r| r.abs() > 1e-9)
        .or_else(|| roots.first())
    else {
        return Ok(None);
    };
    let h = (axis.max - axis.min) / (axis.samples - 1) as f64;
    let (lo, hi) = ((root - h).max(axis.min), (root + h).min(axis.max));
    Ok(Some(bisect(&g, lo, hi, 1e-12).unwrap_or(root)))
}

#[cfg(test)]
mod tests {
    use super::{FilippovSettings, Mode, SwitchedSystem, TangentPoint, Termination};
    use crate::integrator::IntegrationSettings;
    use crate::models::{LinearPlanar, PredatorPreyParams, SiTreatmentParams};
    use crate::switching::{nudge, Classification, Side};
    use crate::traits::DynamicalSystem;
    use crate::vector_field::Window;

    /// x' = 1, y' = c
    struct Constant(f64);

    impl DynamicalSystem<f64> for Constant {
        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, _t: f64, _x: &[f64], out: &mut [f64]) {
            out[0] = 1.0;
            out[1] = self.0;
        }
    }

    /// x' = 1, y' = c - x
    struct Tangent(f64);

    impl DynamicalSystem<f64> for Tangent {
        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = 1.0;
            out[1] = self.0 - x[0];
        }
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: anyhow::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn crossing_continues_in_upper_region_off_the_line() {
        let system = SwitchedSystem::new(Constant(1.0), Constant(1.0), 0.5);
        let window = Window::new(0.0, 10.0, 0.0, 3.0);
        let settings = FilippovSettings {
            segment_time: 1.0,
            ..FilippovSettings::default()
        };
        let run = system
            .simulate((0.0, 0.0), &window, &settings)
            .expect("simulation should run");
        assert_eq!(run.switches.len(), 1);
        assert_eq!(run.switches[0].classification, Classification::Crossing);
        assert!((run.switches[0].x - 0.5).abs() < 1e-9);
        assert_eq!(run.segments[0].mode, Mode::Region1);
        assert_eq!(run.segments[1].mode, Mode::Region2);
        let upper_start = run.segments[1].points[0];
        assert!((upper_start.1 - 0.5 - settings.eps).abs() < 1e-15);
        assert_eq!(run.termination, Termination::NoSwitch);
    }

    #[test]
    fn opposing_fields_slide_to_window_edge() {
        // lower pushes up, upper pushes down: sliding with x' = 1
        let system = SwitchedSystem::new(Constant(1.0), Constant(-1.0), 0.5)
            .with_tangent_points(-100.0, -200.0);
        let window = Window::new(0.0, 2.0, 0.0, 1.0);
        let run = system
            .simulate((0.0, 0.0), &window, &FilippovSettings::default())
            .expect("simulation should run");
        assert_eq!(run.switches[0].classification, Classification::Sliding);
        let sliding = run
            .segments
            .iter()
            .find(|s| s.mode == Mode::Sliding)
            .expect("a sliding segment");
        assert!(sliding.points.iter().all(|p| p.1 == 0.5));
        let exit = run.sliding_exits[0];
        assert!((exit.x - 2.0).abs() < 1e-9);
        assert_eq!(exit.reached, None);
    }

    #[test]
    fn start_on_the_line_classifies_without_planar_segment() {
        let system = SwitchedSystem::new(Constant(2.0), Constant(3.0), 1.0);
        let window = Window::new(0.0, 10.0, 0.0, 5.0);
        let settings = FilippovSettings {
            segment_time: 0.5,
            ..FilippovSettings::default()
        };
        let run = system
            .simulate((1.0, 1.0), &window, &settings)
            .expect("simulation should run");
        assert_eq!(run.switches[0].from, None);
        assert_eq!(run.segments[0].mode, Mode::Region2);
        assert_eq!(run.termination, Termination::NoSwitch);
    }

    #[test]
    fn start_outside_window_terminates_immediately() {
        let system = SwitchedSystem::new(Constant(1.0), Constant(1.0), 0.5);
        let window = Window::new(0.0, 1.0, 0.0, 1.0);
        let run = system
            .simulate((5.0, 0.2), &window, &FilippovSettings::default())
            .expect("simulation should run");
        assert_eq!(run.termination, Termination::LeftWindow);
        assert!(run.segments.is_empty());
    }

    #[test]
    fn predator_prey_run_is_bounded_and_stays_off_the_line() {
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
        assert!(!run.switches.is_empty());
        assert!(run.switches.len() <= settings.max_switches);
        for segment in &run.segments {
            match segment.mode {
                Mode::Region1 => assert!(segment.points[0].1 < 1.625),
                Mode::Region2 => assert!(segment.points[0].1 > 1.625),
                Mode::Sliding => assert!(segment.points.iter().all(|p| p.1 == 1.625)),
            }
        }
        for record in &run.switches {
            assert!(record.t.is_finite() && record.x.is_finite());
        }
    }

    #[test]
    fn si_treatment_sliding_reaches_a_tangent_point() {
        let params = SiTreatmentParams::default();
        let w = 0.3;
        let (t1, t2) = params.tangent_points(w);
        let system = SwitchedSystem::new(params.lower(), params.upper(), w)
            .with_tangent_points(t1, t2);
        let window = Window::new(0.0, 1.0, 0.0, 1.0);
        let run = system
            .simulate((0.98, 0.25), &window, &FilippovSettings::default())
            .expect("simulation should run");
        assert_eq!(run.switches[0].classification, Classification::Sliding);
        assert!(run.switches[0].x > t1 && run.switches[0].x < t2);
        let exit = run.sliding_exits.first().expect("a sliding exit");
        assert_eq!(exit.reached, Some(TangentPoint::T1));
        assert!((exit.x - t1).abs() < 1e-6, "exit at {}", exit.x);
        assert!(run.switches.len() <= 8);
    }

    #[test]
    fn tangency_leaves_towards_the_dominant_field() {
        // Falls onto y = 0 at x = 1, where f1_y = 1 - x vanishes.
        let system = SwitchedSystem::new(Tangent(1.0), Constant(-1.0), 0.0);
        let window = Window::new(-1.0, 5.0, -5.0, 2.0);
        let settings = FilippovSettings {
            segment_time: 2.0,
            ..FilippovSettings::default()
        };
        let run = system
            .simulate((0.0, 1.0), &window, &settings)
            .expect("simulation should run");
        let record = run.switches[0];
        assert_eq!(record.from, Some(Side::Above));
        assert_eq!(
            record.classification,
            Classification::Tangency { exit: Side::Below }
        );
        assert!((record.x - 1.0).abs() < 1e-9);

        let next = &run.segments[1];
        assert_eq!(next.mode, Mode::Region1);
        assert_eq!(next.t[0], record.t);
        assert_eq!(next.points[0].1, nudge(0.0, Side::Below, settings.eps));
        assert_eq!(run.switches.len(), 1);
        assert_eq!(run.termination, Termination::NoSwitch);
    }

    #[test]
    fn eps_lost_to_rounding_at_the_threshold_is_rejected() {
        let w = 1e11;
        let system = SwitchedSystem::new(Constant(1.0), Constant(1.0), w);
        let window = Window::new(-1.0, 10.0, 0.0, 2e11);
        assert_err_contains(
            system.simulate((0.0, w - 0.5), &window, &FilippovSettings::default()),
            "eps",
        );

        let settings = FilippovSettings {
            eps: 1e-3,
            segment_time: 1.0,
            ..FilippovSettings::default()
        };
        let run = system
            .simulate((0.0, w - 0.5), &window, &settings)
            .expect("coarser eps should run");
        assert_eq!(run.switches.len(), 1);
        assert!(run.segments[1].points[0].1 > w);
        assert_eq!(run.termination, Termination::NoSwitch);
    }

    #[test]
    fn numeric_tangent_points_match_analytic_ones() {
        let params = PredatorPreyParams::default();
        let (t1, t2) = params.tangent_points();
        let system = SwitchedSystem::new(params.lower(), params.upper(), 1.625);
        let window = Window::new(0.0, 1.2, 0.0, 2.0);
        let points = system
            .resolve_tangent_points(&window, 400)
            .expect("tangent search");
        assert!((points.t1.expect("T1 in window") - t1).abs() < 1e-9);
        assert!((points.t2.expect("T2 in window") - t2).abs() < 1e-9);
    }

    #[test]
    fn tangent_point_reached_is_recorded() {
        // Sliding with x' = 1 towards T1 at x = 1 where f1_y vanishes.
        let system =
            SwitchedSystem::new(Tangent(1.0), Constant(-1.0), 0.0).with_tangent_points(1.0, 5.0);
        let window = Window::new(-1.0, 3.0, -1.0, 1.0);
        let settings = FilippovSettings {
            max_switches: 1,
            ..FilippovSettings::default()
        };
        let run = system
            .simulate((0.0, 0.0), &window, &settings)
            .expect("simulation should run");
        let exit = run.sliding_exits[0];
        assert!((exit.x - 1.0).abs() < 1e-9);
        assert_eq!(exit.reached, Some(TangentPoint::T1));
        assert_eq!(run.termination, Termination::MaxSwitches);
    }

    #[test]
    fn single_switch_follows_linear_exploration() {
        let system = SwitchedSystem::new(
            LinearPlanar::from_rows([[2.0, -1.0], [1.0, 4.0]]),
            LinearPlanar::from_rows([[1.0, 2.0], [-1.0, 1.0]]),
            3.0,
        );
        let run = system
            .single_switch((0.5, 0.5), 10.5, &IntegrationSettings::default())
            .expect("single switch should run");
        assert_eq!(run.switches.len(), 1);
        assert_eq!(run.segments.len(), 2);
        let crossing = run.segments[1].points[0];
        assert_eq!(crossing.1, 3.0);
        let last_lower = run.segments[0].points.last().expect("samples");
        assert!((last_lower.1 - 3.0).abs() < 1e-9);
        assert_eq!(run.segments[1].t[0], run.switches[0].t);
        assert!(run.switches[0].t > 0.0);
    }

    #[test]
    fn single_switch_keeps_time_and_reports_return() {
        // Up through y = 1 at t = 0.5, then y' = 2 - x brings it back at x = 3.5.
        let system = SwitchedSystem::new(Constant(1.0), Tangent(2.0), 1.0);
        let run = system
            .single_switch((0.0, 0.5), 10.0, &IntegrationSettings::default())
            .expect("single switch should run");
        assert!((run.switches[0].t - 0.5).abs() < 1e-9);
        let upper = &run.segments[1];
        assert_eq!(upper.t[0], run.switches[0].t);
        let end = *upper.points.last().expect("samples");
        assert!((end.0 - 3.5).abs() < 1e-6, "returned at x = {}", end.0);
        assert!((upper.t.last().expect("samples") - 3.5).abs() < 1e-6);
        assert_eq!(run.termination, Termination::Returned);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let system = SwitchedSystem::new(Constant(1.0), Constant(1.0), 0.5);
        let window = Window::new(0.0, 1.0, 0.0, 1.0);
        let settings = FilippovSettings {
            eps: 0.0,
            ..FilippovSettings::default()
        };
        assert_err_contains(system.simulate((0.1, 0.1), &window, &settings), "eps");
        let inverted = Window::new(1.0, 0.0, 0.0, 1.0);
        assert_err_contains(
            system.simulate((0.1, 0.1), &inverted, &FilippovSettings::default()),
            "Window",
        );
        assert_err_contains(
            system.single_switch((0.1, 0.1), -1.0, &IntegrationSettings::default()),
            "t_max",
        );
    }
}
