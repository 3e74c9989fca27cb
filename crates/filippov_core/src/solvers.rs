use crate::traits::{DynamicalSystem, Scalar, Steppable};
use serde::{Deserialize, Serialize};

fn constant<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

/// Writes `base + dt * Σ coeff_k * stage_k` into `out`.
fn combine<T: Scalar>(out: &mut [T], base: &[T], dt: T, terms: &[(T, &[T])]) {
    for i in 0..base.len() {
        let mut incr = T::zero();
        for (coeff, stage) in terms {
            incr = incr + *coeff * stage[i];
        }
        out[i] = base[i] + dt * incr;
    }
}

/// Explicit (forward) Euler. First order, kept for the step-size experiments.
pub struct Euler<T: Scalar> {
    k1: Vec<T>,
}

impl<T: Scalar> Euler<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for Euler<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        system.apply(*t, state, &mut self.k1);
        for (x, k) in state.iter_mut().zip(&self.k1[..]) {
            *x = *x + dt * *k;
        }
        *t = *t + dt;
    }
}

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half: T = constant(0.5);
        let sixth: T = constant(1.0 / 6.0);
        let third: T = constant(1.0 / 3.0);
        let t0 = *t;

        system.apply(t0, state, &mut self.k1);
        combine(&mut self.tmp, state, dt, &[(half, &self.k1[..])]);
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);
        combine(&mut self.tmp, state, dt, &[(half, &self.k2[..])]);
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);
        combine(&mut self.tmp, state, dt, &[(T::one(), &self.k3[..])]);
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        self.tmp.copy_from_slice(state);
        combine(
            state,
            &self.tmp,
            dt,
            &[
                (sixth, &self.k1[..]),
                (third, &self.k2[..]),
                (third, &self.k3[..]),
                (sixth, &self.k4[..]),
            ],
        );
        *t = t0 + dt;
    }
}

/// Tsitouras 5/4 Solver, used here with a fixed step.
pub struct Tsit5<T: Scalar> {
    k: [Vec<T>; 6],
    tmp: Vec<T>,
}

const TSIT5_C: [f64; 6] = [0.0, 0.161, 0.327, 0.9, 0.9800255409045097, 1.0];

const TSIT5_A: [&[f64]; 6] = [
    &[],
    &[0.161],
    &[-0.008480655492356989, 0.335480655492357],
    &[2.897153057105493, -6.359448489975075, 4.3622954328695815],
    &[
        5.325864828439257,
        -11.748883564062828,
        7.4955393428898365,
        -0.09249506636175525,
    ],
    &[
        5.86145544294642,
        -12.92096931784711,
        8.159367898576159,
        -0.071584973281401,
        -0.028269050394068383,
    ],
];

const TSIT5_B: [f64; 6] = [
    0.09646076681806523,
    0.01,
    0.4798896504144996,
    1.379008574103742,
    -3.290069515436081,
    2.324710524099774,
];

impl<T: Scalar> Tsit5<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k: std::array::from_fn(|_| vec![z; dim]),
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for Tsit5<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let t0 = *t;
        for stage in 0..6 {
            {
                let (done, _) = self.k.split_at(stage);
                let terms: Vec<(T, &[T])> = TSIT5_A[stage]
                    .iter()
                    .zip(done)
                    .map(|(a, k)| (constant::<T>(*a), k.as_slice()))
                    .collect();
                combine(&mut self.tmp, state, dt, &terms);
            }
            let ts = t0 + constant::<T>(TSIT5_C[stage]) * dt;
            system.apply(ts, &self.tmp, &mut self.k[stage]);
        }

        self.tmp.copy_from_slice(state);
        let terms: Vec<(T, &[T])> = TSIT5_B
            .iter()
            .zip(&self.k)
            .map(|(b, k)| (constant::<T>(*b), k.as_slice()))
            .collect();
        combine(state, &self.tmp, dt, &terms);
        *t = t0 + dt;
    }
}

/// Selects one of the fixed-step methods above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepperKind {
    Euler,
    Rk4,
    #[default]
    Tsit5,
}

impl StepperKind {
    pub fn build(self, dim: usize) -> Stepper {
        match self {
            StepperKind::Euler => Stepper::Euler(Euler::new(dim)),
            StepperKind::Rk4 => Stepper::Rk4(RK4::new(dim)),
            StepperKind::Tsit5 => Stepper::Tsit5(Tsit5::new(dim)),
        }
    }
}

pub enum Stepper {
    Euler(Euler<f64>),
    Rk4(RK4<f64>),
    Tsit5(Tsit5<f64>),
}

impl Steppable<f64> for Stepper {
    fn step(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        t: &mut f64,
        state: &mut [f64],
        dt: f64,
    ) {
        match self {
            Stepper::Euler(s) => s.step(system, t, state, dt),
            Stepper::Rk4(s) => s.step(system, t, state, dt),
            Stepper::Tsit5(s) => s.step(system, t, state, dt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Euler, StepperKind, Tsit5, RK4};
    use crate::traits::{DynamicalSystem, Steppable};

    struct Decay {
        rate: f64,
    }

    impl DynamicalSystem<f64> for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -self.rate * x[0];
        }
    }

    struct Rotation;

    impl DynamicalSystem<f64> for Rotation {
        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -x[1];
            out[1] = x[0];
        }
    }

    fn run(
        stepper: &mut impl Steppable<f64>,
        system: &impl DynamicalSystem<f64>,
        x0: &[f64],
        steps: usize,
        dt: f64,
    ) -> (f64, Vec<f64>) {
        let mut t = 0.0;
        let mut state = x0.to_vec();
        for _ in 0..steps {
            stepper.step(system, &mut t, &mut state, dt);
        }
        (t, state)
    }

    #[test]
    fn euler_single_step_matches_formula() {
        let mut euler = Euler::new(1);
        let (t, state) = run(&mut euler, &Decay { rate: 2.0 }, &[1.0], 1, 0.1);
        assert!((t - 0.1).abs() < 1e-15);
        assert!((state[0] - 0.8).abs() < 1e-15);
    }

    #[test]
    fn rk4_tracks_exponential_decay() {
        let mut rk4 = RK4::new(1);
        let (_, state) = run(&mut rk4, &Decay { rate: 1.0 }, &[1.0], 100, 0.01);
        assert!((state[0] - (-1.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn tsit5_preserves_rotation_radius() {
        let mut tsit = Tsit5::new(2);
        let (t, state) = run(&mut tsit, &Rotation, &[1.0, 0.0], 628, 0.01);
        let radius = (state[0] * state[0] + state[1] * state[1]).sqrt();
        assert!((radius - 1.0).abs() < 1e-8, "radius drifted to {radius}");
        assert!((state[0] - t.cos()).abs() < 1e-8);
    }

    #[test]
    fn tsit5_converges_at_fifth_order() {
        let system = Decay { rate: 1.0 };
        let error = |steps: usize| {
            let mut tsit = Tsit5::new(1);
            let (t, state) = run(&mut tsit, &system, &[1.0], steps, 5.0 / steps as f64);
            (state[0] - (-t).exp()).abs()
        };
        let (coarse, fine) = (error(25), error(50));
        assert!(fine < 1e-10, "error {fine} at h = 0.1");
        assert!(coarse / fine > 24.0, "halving h only gained {}", coarse / fine);
    }

    #[test]
    fn stepper_kind_dispatches_to_matching_method() {
        let system = Decay { rate: 1.0 };
        let mut euler = StepperKind::Euler.build(1);
        let (_, e) = run(&mut euler, &system, &[1.0], 1, 0.5);
        assert!((e[0] - 0.5).abs() < 1e-15);

        let mut tsit = StepperKind::default().build(1);
        let (_, s) = run(&mut tsit, &system, &[1.0], 10, 0.05);
        assert!((s[0] - (-0.5f64).exp()).abs() < 1e-10);
    }
}
