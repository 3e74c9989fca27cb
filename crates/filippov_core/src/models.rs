//! Catalogue of the vector fields explored by the command line tool.
//!
//! Parameter structs carry `Default` values matching the reference runs so a
//! scenario file only needs to override what it changes.

use crate::traits::DynamicalSystem;
use serde::{Deserialize, Serialize};

macro_rules! planar {
    ($ty:ty, |$s:ident, $t:ident, $x:ident, $y:ident| $body:expr) => {
        impl DynamicalSystem<f64> for $ty {
            fn dimension(&self) -> usize {
                2
            }

            #[allow(unused_variables)]
            fn apply(&self, $t: f64, state: &[f64], out: &mut [f64]) {
                let $s = self;
                let ($x, $y) = (state[0], state[1]);
                let (fx, fy): (f64, f64) = $body;
                out[0] = fx;
                out[1] = fy;
            }
        }
    };
}

macro_rules! scalar {
    ($ty:ty, |$s:ident, $t:ident, $x:ident| $fx:expr) => {
        impl DynamicalSystem<f64> for $ty {
            fn dimension(&self) -> usize {
                1
            }

            #[allow(unused_variables)]
            fn apply(&self, $t: f64, state: &[f64], out: &mut [f64]) {
                let $s = self;
                let $x = state[0];
                out[0] = $fx;
            }
        }
    };
}

/// `x' = a x + b y`, `y' = c x + d y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearPlanar {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl LinearPlanar {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }

    pub fn from_rows(rows: [[f64; 2]; 2]) -> Self {
        Self::new(rows[0][0], rows[0][1], rows[1][0], rows[1][1])
    }

    /// Row-major coefficient matrix.
    pub fn matrix(&self) -> [f64; 4] {
        [self.a, self.b, self.c, self.d]
    }

    pub fn trace(&self) -> f64 {
        self.a + self.d
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }
}

impl Default for LinearPlanar {
    fn default() -> Self {
        Self::new(-1.0, -2.0, 1.0, -1.0)
    }
}

planar!(LinearPlanar, |s, t, x, y| (s.a * x + s.b * y, s.c * x + s.d * y));

/// `x' = -y + a x (x² + y²)`, `y' = x + a y (x² + y²)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicPlanar {
    pub a: f64,
}

impl Default for CubicPlanar {
    fn default() -> Self {
        Self { a: -5.0 }
    }
}

planar!(CubicPlanar, |s, t, x, y| {
    (
        -y + s.a * x * (x * x + y * y),
        x + s.a * y * (x * x + y * y),
    )
});

/// `x' = x - y`, `y' = x² y - 4 x`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NonlinearExample;

impl NonlinearExample {
    pub fn known_equilibria() -> [[f64; 2]; 3] {
        [[-2.0, -2.0], [0.0, 0.0], [2.0, 2.0]]
    }
}

planar!(NonlinearExample, |s, t, x, y| (x - y, x * x * y - 4.0 * x));

/// Field drawn in red below the threshold of the polynomial pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PolynomialLower;

planar!(PolynomialLower, |s, t, x, y| (y - x * x + 2.0, x * x - x * y));

/// Field drawn in blue above the threshold of the polynomial pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PolynomialUpper;

planar!(PolynomialUpper, |s, t, x, y| (y * y - x * x, -x * y));

/// Susceptible/infected fractions, `S' = -βSI`, `I' = βSI - γI`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiModel {
    pub beta: f64,
    pub gamma: f64,
}

impl Default for SiModel {
    fn default() -> Self {
        Self {
            beta: 0.2,
            gamma: 0.1,
        }
    }
}

planar!(SiModel, |s, t, x, y| {
    (
        -s.beta * x * y,
        s.beta * x * y - s.gamma * y,
    )
});

/// Classic SIR with `N = S + I + R` recomputed from the state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SirModel {
    pub beta: f64,
    pub gamma: f64,
}

impl Default for SirModel {
    /// Boarding school influenza estimates (days⁻¹).
    fn default() -> Self {
        Self {
            beta: 1.6682,
            gamma: 0.4417,
        }
    }
}

impl DynamicalSystem<f64> for SirModel {
    fn dimension(&self) -> usize {
        3
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let (s, i, r) = (x[0], x[1], x[2]);
        let n = s + i + r;
        let infection = if n == 0.0 {
            0.0
        } else {
            self.beta * s * i / n
        };
        out[0] = -infection;
        out[1] = infection - self.gamma * i;
        out[2] = self.gamma * i;
    }
}

/// Holling type II predator-prey parameters; predators are harvested with
/// effort `e` once they exceed the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredatorPreyParams {
    pub a: f64,
    pub b: f64,
    pub d: f64,
    pub e: f64,
}

impl Default for PredatorPreyParams {
    fn default() -> Self {
        Self {
            a: 0.3556,
            b: 0.33,
            d: 0.0444,
            e: 0.2067,
        }
    }
}

impl PredatorPreyParams {
    pub fn lower(&self) -> PredatorPrey {
        PredatorPrey {
            params: *self,
            harvested: false,
        }
    }

    pub fn upper(&self) -> PredatorPrey {
        PredatorPrey {
            params: *self,
            harvested: true,
        }
    }

    /// Prey levels where each field's predator growth vanishes on `y = w`
    /// (independent of `w`).
    pub fn tangent_points(&self) -> (f64, f64) {
        let p = self;
        let t1 = p.d * p.b / (p.a - p.d);
        let t2 = (p.d + p.e) * p.b / (p.a - p.d - p.e);
        (t1, t2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredatorPrey {
    pub params: PredatorPreyParams,
    pub harvested: bool,
}

planar!(PredatorPrey, |s, t, x, y| {
    let p = &s.params;
    let predation = p.a * x * y / (p.b + x);
    let harvest = if s.harvested { p.e * y } else { 0.0 };
    (x * (1.0 - x) - predation, predation - p.d * y - harvest)
});

/// SI model with vital dynamics; treatment at rate `u` is applied while the
/// infected fraction is above the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiTreatmentParams {
    pub r0: f64,
    pub mu: f64,
    pub theta: f64,
    pub u: f64,
}

impl Default for SiTreatmentParams {
    fn default() -> Self {
        Self {
            r0: 1.5,
            mu: 0.2,
            theta: 0.15,
            u: 0.1,
        }
    }
}

impl SiTreatmentParams {
    pub fn lower(&self) -> SiTreatment {
        SiTreatment {
            params: *self,
            treated: false,
        }
    }

    pub fn upper(&self) -> SiTreatment {
        SiTreatment {
            params: *self,
            treated: true,
        }
    }

    pub fn tangent_points(&self, w: f64) -> (f64, f64) {
        let p = self;
        let t1 = 1.0 / p.r0;
        let t2 = (1.0 / p.r0) * (1.0 + p.u / ((p.mu + p.theta) * w));
        (t1, t2)
    }

    /// Endemic equilibrium of the untreated field.
    pub fn lower_equilibrium(&self) -> [f64; 2] {
        let p = self;
        [
            1.0 / p.r0,
            p.mu * (p.r0 - 1.0) / ((p.mu + p.theta) * p.r0),
        ]
    }

    /// Equilibria of the treated field, roots of
    /// `μR0 x² - (μ + μR0 - uR0) x + μ = 0`. Empty when the roots are complex.
    pub fn upper_equilibria(&self) -> Vec<[f64; 2]> {
        let p = self;
        let qa = p.mu * p.r0;
        let qb = -(p.mu + p.mu * p.r0 - p.u * p.r0);
        let qc = p.mu;
        let disc = qb * qb - 4.0 * qa * qc;
        if disc < 0.0 || qa == 0.0 {
            return Vec::new();
        }
        let root = disc.sqrt();
        [(-qb + root) / (2.0 * qa), (-qb - root) / (2.0 * qa)]
            .iter()
            .map(|&x| [x, (p.mu * (1.0 - x) - p.u) / (p.mu + p.theta)])
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiTreatment {
    pub params: SiTreatmentParams,
    pub treated: bool,
}

planar!(SiTreatment, |s, t, x, y| {
    let p = &s.params;
    let treatment = if s.treated { p.u } else { 0.0 };
    (
        p.mu * (1.0 - x) - (p.mu + p.theta) * p.r0 * x * y,
        (p.mu + p.theta) * y * (p.r0 * x - 1.0) - treatment,
    )
});

/// `y' = k y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialGrowth {
    pub k: f64,
}

impl Default for ExponentialGrowth {
    fn default() -> Self {
        Self { k: 0.5 }
    }
}

scalar!(ExponentialGrowth, |s, t, x| s.k * x);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ambient {
    Constant { temperature: f64 },
    /// `T0 + T1 cos(ω t)`
    Periodic { base: f64, amplitude: f64, omega: f64 },
}

impl Ambient {
    pub fn at(&self, t: f64) -> f64 {
        match *self {
            Ambient::Constant { temperature } => temperature,
            Ambient::Periodic {
                base,
                amplitude,
                omega,
            } => base + amplitude * (omega * t).cos(),
        }
    }
}

/// Newton's law of cooling `T' = k (T - Tm(t))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewtonCooling {
    pub k: f64,
    pub ambient: Ambient,
}

impl Default for NewtonCooling {
    fn default() -> Self {
        Self {
            k: -0.15,
            ambient: Ambient::Constant { temperature: 18.0 },
        }
    }
}

impl NewtonCooling {
    /// Closed form for a constant ambient temperature.
    pub fn exact(&self, t: f64, initial: f64) -> Option<f64> {
        match self.ambient {
            Ambient::Constant { temperature } => {
                Some(temperature + (initial - temperature) * (self.k * t).exp())
            }
            Ambient::Periodic { .. } => None,
        }
    }
}

scalar!(NewtonCooling, |s, t, x| s.k * (x - s.ambient.at(t)));

/// Scalar right-hand sides used for the initial value problem exercises.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalarProblem {
    /// `x' = -x + sin t`
    ForcedDecay,
    /// `x' = -x + target`
    Relaxation { target: f64 },
    /// `x' = -t / x`
    Rational,
}

impl Default for ScalarProblem {
    fn default() -> Self {
        ScalarProblem::ForcedDecay
    }
}

scalar!(ScalarProblem, |s, t, x| match s {
    ScalarProblem::ForcedDecay => -x + t.sin(),
    ScalarProblem::Relaxation { target } => -x + target,
    ScalarProblem::Rational => -t / x,
});
