//! Initial value problem driver with event detection.
//!
//! Wraps the fixed-step methods in [`crate::solvers`] with a maximum step
//! length, direction-filtered event functions and bisection refinement of
//! event roots on the step length.

use crate::solvers::{Stepper, StepperKind};
use crate::traits::{DynamicalSystem, Steppable};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Which sign changes of an event function count as an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventDirection {
    /// Negative to non-negative.
    Rising,
    /// Positive to non-positive.
    Falling,
    Either,
}

impl EventDirection {
    pub fn triggers(self, before: f64, after: f64) -> bool {
        let rising = before < 0.0 && after >= 0.0;
        let falling = before > 0.0 && after <= 0.0;
        match self {
            EventDirection::Rising => rising,
            EventDirection::Falling => falling,
            EventDirection::Either => rising || falling,
        }
    }
}

/// Scalar event function `g(t, x)`; an event fires when `g` changes sign.
pub struct Event<'a> {
    pub label: String,
    pub direction: EventDirection,
    pub terminal: bool,
    condition: Box<dyn Fn(f64, &[f64]) -> f64 + 'a>,
}

impl<'a> Event<'a> {
    pub fn new(
        label: impl Into<String>,
        direction: EventDirection,
        terminal: bool,
        condition: impl Fn(f64, &[f64]) -> f64 + 'a,
    ) -> Self {
        Self {
            label: label.into(),
            direction,
            terminal,
            condition: Box::new(condition),
        }
    }

    /// Terminal event on `x[index] == level`.
    pub fn threshold(index: usize, level: f64, direction: EventDirection) -> Event<'static> {
        Event::new(
            format!("x[{index}] = {level}"),
            direction,
            true,
            move |_t, x: &[f64]| x[index] - level,
        )
    }

    pub fn eval(&self, t: f64, x: &[f64]) -> f64 {
        (self.condition)(t, x)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationSettings {
    pub stepper: StepperKind,
    pub max_step: f64,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            stepper: StepperKind::Tsit5,
            max_step: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventHit {
    /// Index into the event slice passed to [`integrate`].
    pub event: usize,
    pub t: f64,
    pub state: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    /// Reached the requested final time.
    Completed,
    /// Stopped at a terminal event (index into the event slice).
    TerminalEvent(usize),
    /// The state stopped being finite; samples end at the last finite state.
    NonFinite,
}

#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    pub t: Vec<f64>,
    pub states: Vec<Vec<f64>>,
    pub events: Vec<EventHit>,
    pub status: IntegrationStatus,
}

impl Solution {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn last_state(&self) -> Option<&[f64]> {
        self.states.last().map(Vec::as_slice)
    }

    /// Values of one state component across all samples.
    pub fn component(&self, index: usize) -> Vec<f64> {
        self.states.iter().map(|s| s[index]).collect()
    }

    /// First hit of the given event, if any.
    pub fn first_hit(&self, event: usize) -> Option<&EventHit> {
        self.events.iter().find(|hit| hit.event == event)
    }

    fn push(&mut self, t: f64, state: &[f64]) {
        self.t.push(t);
        self.states.push(state.to_vec());
    }
}

const ROOT_ITERATIONS: usize = 80;

pub fn integrate<S>(
    system: &S,
    t0: f64,
    t_end: f64,
    initial_state: &[f64],
    events: &[Event<'_>],
    settings: &IntegrationSettings,
) -> Result<Solution>
where
    S: DynamicalSystem<f64>,
{
    let dim = system.dimension();
    if initial_state.len() != dim {
        bail!(
            "Initial state dimension mismatch. Expected {}, got {}.",
            dim,
            initial_state.len()
        );
    }
    if !(settings.max_step.is_finite() && settings.max_step > 0.0) {
        bail!("max_step must be positive and finite.");
    }
    if !t0.is_finite() || !t_end.is_finite() || t_end < t0 {
        bail!("Time span must be finite with t_end >= t0.");
    }
    if initial_state.iter().any(|v| !v.is_finite()) {
        bail!("Initial state must be finite.");
    }

    let mut stepper = settings.stepper.build(dim);
    let mut solution = Solution {
        t: Vec::new(),
        states: Vec::new(),
        events: Vec::new(),
        status: IntegrationStatus::Completed,
    };

    let mut t = t0;
    let mut state = initial_state.to_vec();
    let mut g_prev: Vec<f64> = events.iter().map(|e| e.eval(t, &state)).collect();
    solution.push(t, &state);

    let min_dt = 1e-12 * (1.0 + t_end.abs());
    while t_end - t > min_dt {
        let dt = settings.max_step.min(t_end - t);
        let mut next_t = t;
        let mut next = state.clone();
        stepper.step(system, &mut next_t, &mut next, dt);
        if next.iter().any(|v| !v.is_finite()) {
            log::warn!("integration produced a non-finite state after t = {t}");
            solution.status = IntegrationStatus::NonFinite;
            return Ok(solution);
        }

        let g_next: Vec<f64> = events.iter().map(|e| e.eval(next_t, &next)).collect();
        let mut hits: Vec<(usize, f64, Vec<f64>)> = Vec::new();
        for (idx, event) in events.iter().enumerate() {
            if event.direction.triggers(g_prev[idx], g_next[idx]) {
                let (h, root_state) =
                    locate_root(system, &mut stepper, event, t, &state, g_prev[idx], dt);
                hits.push((idx, h, root_state));
            }
        }
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));

        let terminal = hits.iter().position(|(idx, _, _)| events[*idx].terminal);
        let cutoff = terminal.map(|pos| hits[pos].1);
        for (idx, h, root_state) in &hits {
            if cutoff.map_or(true, |c| *h <= c) {
                solution.events.push(EventHit {
                    event: *idx,
                    t: t + h,
                    state: root_state.clone(),
                });
            }
        }

        if let Some(pos) = terminal {
            let (idx, h, root_state) = &hits[pos];
            solution.push(t + h, root_state);
            solution.status = IntegrationStatus::TerminalEvent(*idx);
            return Ok(solution);
        }

        t = next_t;
        state = next;
        g_prev = g_next;
        solution.push(t, &state);
    }

    Ok(solution)
}

/// Bisection on the step length `h ∈ (0, dt]` for the sign change of `event`.
/// Returns the end of the final bracket, i.e. the first state past the root.
fn locate_root<S>(
    system: &S,
    stepper: &mut Stepper,
    event: &Event<'_>,
    t: f64,
    state: &[f64],
    g_start: f64,
    dt: f64,
) -> (f64, Vec<f64>)
where
    S: DynamicalSystem<f64>,
{
    let mut advance = |h: f64| -> Vec<f64> {
        let mut tt = t;
        let mut x = state.to_vec();
        stepper.step(system, &mut tt, &mut x, h);
        x
    };

    let mut lo = 0.0;
    let mut hi = dt;
    let mut hi_state = advance(hi);
    for _ in 0..ROOT_ITERATIONS {
        if hi - lo <= 1e-14 * (1.0 + t.abs()) {
            break;
        }
        let mid = 0.5 * (lo + hi);
        let mid_state = advance(mid);
        let g_mid = event.eval(t + mid, &mid_state);
        if g_mid == 0.0 {
            return (mid, mid_state);
        }
        if g_mid.signum() == g_start.signum() {
            lo = mid;
        } else {
            hi = mid;
            hi_state = mid_state;
        }
    }
    (hi, hi_state)
}

/// Values of the solution at each of `times` (non-decreasing), starting from
/// `initial_state` at `times[0]`. Each interval is split into equal sub-steps
/// no longer than `max_step`.
pub fn solve_on_grid<S>(
    system: &S,
    initial_state: &[f64],
    times: &[f64],
    settings: &IntegrationSettings,
) -> Result<Vec<Vec<f64>>>
where
    S: DynamicalSystem<f64>,
{
    let dim = system.dimension();
    if initial_state.len() != dim {
        bail!(
            "Initial state dimension mismatch. Expected {}, got {}.",
            dim,
            initial_state.len()
        );
    }
    if times.is_empty() {
        bail!("Time grid must contain at least one point.");
    }
    if times.windows(2).any(|w| !(w[1] >= w[0])) {
        bail!("Time grid must be non-decreasing.");
    }
    if !(settings.max_step.is_finite() && settings.max_step > 0.0) {
        bail!("max_step must be positive and finite.");
    }

    let mut stepper = settings.stepper.build(dim);
    let mut state = initial_state.to_vec();
    let mut out = Vec::with_capacity(times.len());
    out.push(state.clone());
    for window in times.windows(2) {
        let span = window[1] - window[0];
        if span > 0.0 {
            let substeps = (span / settings.max_step).ceil().max(1.0) as usize;
            let h = span / substeps as f64;
            let mut t = window[0];
            for _ in 0..substeps {
                stepper.step(system, &mut t, &mut state, h);
            }
        }
        out.push(state.clone());
    }
    Ok(out)
}

/// Exactly `steps` steps of equal size from `t0` to `t_end`.
pub fn integrate_fixed_steps<S>(
    system: &S,
    stepper: StepperKind,
    t0: f64,
    t_end: f64,
    initial_state: &[f64],
    steps: usize,
) -> Result<Solution>
where
    S: DynamicalSystem<f64>,
{
    if steps == 0 {
        bail!("At least one step is required.");
    }
    if initial_state.len() != system.dimension() {
        bail!(
            "Initial state dimension mismatch. Expected {}, got {}.",
            system.dimension(),
            initial_state.len()
        );
    }
    let h = (t_end - t0) / steps as f64;
    let mut method = stepper.build(initial_state.len());
    let mut solution = Solution {
        t: Vec::with_capacity(steps + 1),
        states: Vec::with_capacity(steps + 1),
        events: Vec::new(),
        status: IntegrationStatus::Completed,
    };
    let mut t = t0;
    let mut state = initial_state.to_vec();
    solution.push(t, &state);
    for _ in 0..steps {
        method.step(system, &mut t, &mut state, h);
        if state.iter().any(|v| !v.is_finite()) {
            solution.status = IntegrationStatus::NonFinite;
            return Ok(solution);
        }
        solution.push(t, &state);
    }
    Ok(solution)
}
