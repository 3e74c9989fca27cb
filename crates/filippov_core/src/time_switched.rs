//! Linear system whose matrix alternates on a sinusoidal schedule.
//!
//! The control signal rises as `sin(t - ti + φ)` while `A1` is active and
//! mirrors around `h` as `2h - sin(t - ti + φ)` while `A2` is active. Reaching
//! the threshold (within `tol`) swaps the matrix and restarts the phase at
//! `φ = asin(h)`.

use crate::models::LinearPlanar;
use crate::solvers::Euler;
use crate::traits::Steppable;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveMatrix {
    A1,
    A2,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSwitchedSettings {
    pub a1: [[f64; 2]; 2],
    pub a2: [[f64; 2]; 2],
    /// Switching threshold of the control signal, in `[-1, 1]`.
    pub h: f64,
    pub tol: f64,
    pub total_time: f64,
    pub dt: f64,
    pub initial: [f64; 2],
}

impl Default for TimeSwitchedSettings {
    fn default() -> Self {
        Self {
            a1: [[2.0, -1.0], [1.0, 4.0]],
            a2: [[-1.0, -2.0], [1.0, -1.0]],
            h: 1.0,
            tol: 0.01,
            total_time: 10.0,
            dt: 0.01,
            initial: [1.0, 1.0],
        }
    }
}

impl TimeSwitchedSettings {
    fn validate(&self) -> Result<()> {
        if !(-1.0..=1.0).contains(&self.h) {
            bail!("Threshold h must lie in [-1, 1], got {}.", self.h);
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            bail!("dt must be positive and finite.");
        }
        if !(self.total_time.is_finite() && self.total_time > 0.0) {
            bail!("total_time must be positive and finite.");
        }
        if !(self.tol.is_finite() && self.tol >= 0.0) {
            bail!("tol must be non-negative and finite.");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Schedule {
    pub t: Vec<f64>,
    pub control: Vec<f64>,
    /// Matrix used for the step ending at `t[i]`.
    pub active: Vec<ActiveMatrix>,
    pub switch_times: Vec<f64>,
}

/// Control signal and active matrix on the grid `0, dt, ..` below `total_time`.
pub fn schedule(settings: &TimeSwitchedSettings) -> Result<Schedule> {
    settings.validate()?;
    let count = ((settings.total_time / settings.dt) - 1e-9).ceil().max(1.0) as usize;
    let t: Vec<f64> = (0..count).map(|i| i as f64 * settings.dt).collect();
    let (h, tol) = (settings.h, settings.tol);
    let restart_phase = h.asin();

    let mut control = vec![0.0; count];
    let mut active = vec![ActiveMatrix::A1; count];
    let mut switch_times = Vec::new();
    let mut mode = ActiveMatrix::A1;
    let (mut ti, mut phase) = (0.0, 0.0);

    for i in 1..count {
        let s = (t[i] - ti + phase).sin();
        match mode {
            ActiveMatrix::A1 => {
                control[i] = s;
                if control[i] >= h - tol {
                    mode = ActiveMatrix::A2;
                }
            }
            ActiveMatrix::A2 => {
                control[i] = -s + 2.0 * h;
                if control[i] <= h + tol {
                    mode = ActiveMatrix::A1;
                }
            }
        }
        if mode != active[i - 1] {
            ti = t[i];
            phase = restart_phase;
            switch_times.push(t[i]);
        }
        active[i] = mode;
    }

    Ok(Schedule {
        t,
        control,
        active,
        switch_times,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeSwitchedRun {
    pub schedule: Schedule,
    pub states: Vec<[f64; 2]>,
}

/// Explicit Euler over the schedule, `v[i] = v[i-1] + dt A(i) v[i-1]`.
pub fn simulate(settings: &TimeSwitchedSettings) -> Result<TimeSwitchedRun> {
    let schedule = schedule(settings)?;
    let fields = [
        LinearPlanar::from_rows(settings.a1),
        LinearPlanar::from_rows(settings.a2),
    ];
    let mut euler = Euler::<f64>::new(2);
    let mut state = settings.initial;
    let mut states = Vec::with_capacity(schedule.t.len());
    states.push(state);
    for i in 1..schedule.t.len() {
        let field = match schedule.active[i] {
            ActiveMatrix::A1 => &fields[0],
            ActiveMatrix::A2 => &fields[1],
        };
        let mut t = schedule.t[i - 1];
        euler.step(field, &mut t, &mut state, settings.dt);
        states.push(state);
    }
    log::debug!(
        "time-switched run: {} steps, {} switches",
        states.len(),
        schedule.switch_times.len()
    );
    Ok(TimeSwitchedRun { schedule, states })
}

#[cfg(test)]
mod tests {
    use super::{schedule, simulate, ActiveMatrix, TimeSwitchedSettings};

    #[test]
    fn schedule_alternates_around_threshold() {
        let settings = TimeSwitchedSettings::default();
        let plan = schedule(&settings).expect("valid settings");
        assert_eq!(plan.t.len(), 1000);
        assert_eq!(plan.active[0], ActiveMatrix::A1);
        assert!(!plan.switch_times.is_empty());
        // First switch once sin(t) >= 0.99, i.e. t close to asin(0.99).
        let first = plan.switch_times[0];
        assert!((first - 0.99f64.asin()).abs() < 0.011, "first switch at {first}");
        for i in 1..plan.t.len() {
            let held = plan.active[i - 1] == ActiveMatrix::A2 && plan.active[i] == ActiveMatrix::A2;
            if held {
                assert!(plan.control[i] > settings.h + settings.tol);
            }
        }
    }

    #[test]
    fn euler_uses_matrix_scheduled_for_each_step() {
        let settings = TimeSwitchedSettings {
            a2: [[2.0, -1.0], [1.0, 4.0]],
            total_time: 0.05,
            ..TimeSwitchedSettings::default()
        };
        let run = simulate(&settings).expect("valid settings");
        assert_eq!(run.states.len(), 5);
        // A1 == A2, so every step is the plain Euler update.
        let [x0, y0] = settings.initial;
        let expected = [x0 + 0.01 * (2.0 * x0 - y0), y0 + 0.01 * (x0 + 4.0 * y0)];
        assert!((run.states[1][0] - expected[0]).abs() < 1e-15);
        assert!((run.states[1][1] - expected[1]).abs() < 1e-15);
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        let settings = TimeSwitchedSettings {
            h: 1.5,
            ..TimeSwitchedSettings::default()
        };
        let err = schedule(&settings).expect_err("h out of range");
        assert!(err.to_string().contains("[-1, 1]"));
    }
}
