use crate::traits::DynamicalSystem;
use anyhow::{anyhow, bail, Context, Result};
use nalgebra::linalg::SVD;
use nalgebra::{DMatrix, DVector};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonSettings {
    pub max_steps: usize,
    pub damping: f64,
    pub tolerance: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 25,
            damping: 1.0,
            tolerance: 1e-9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexNumber {
    pub re: f64,
    pub im: f64,
}

impl From<Complex<f64>> for ComplexNumber {
    fn from(value: Complex<f64>) -> Self {
        Self {
            re: value.re,
            im: value.im,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EigenPair {
    pub value: ComplexNumber,
    pub vector: Vec<ComplexNumber>,
}

/// Linear stability type of a planar equilibrium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanarStability {
    Saddle,
    StableNode,
    UnstableNode,
    StableFocus,
    UnstableFocus,
    Center,
    /// At least one eigenvalue on the imaginary axis with a real partner.
    Degenerate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquilibriumResult {
    pub state: Vec<f64>,
    pub residual_norm: f64,
    pub iterations: usize,
    /// Row-major Jacobian at `state`.
    pub jacobian: Vec<f64>,
    pub eigenpairs: Vec<EigenPair>,
}

impl EquilibriumResult {
    /// Classification when the system is planar.
    pub fn planar_stability(&self) -> Option<PlanarStability> {
        if self.eigenpairs.len() != 2 {
            return None;
        }
        let values: Vec<Complex<f64>> = self
            .eigenpairs
            .iter()
            .map(|p| Complex::new(p.value.re, p.value.im))
            .collect();
        Some(classify_planar(values[0], values[1], 1e-10))
    }
}

pub fn solve_equilibrium<S: DynamicalSystem<f64>>(
    system: &S,
    initial_guess: &[f64],
    settings: NewtonSettings,
) -> Result<EquilibriumResult> {
    let dim = system.dimension();
    if dim == 0 {
        bail!("System has zero dimension.");
    }
    if initial_guess.len() != dim {
        bail!(
            "Initial guess dimension mismatch. Expected {}, got {}.",
            dim,
            initial_guess.len()
        );
    }
    if settings.max_steps == 0 {
        bail!("max_steps must be greater than zero.");
    }
    if settings.damping <= 0.0 {
        bail!("damping must be positive.");
    }
    if settings.tolerance <= 0.0 {
        bail!("tolerance must be positive.");
    }

    let mut state = initial_guess.to_vec();
    let mut residual = vec![0.0; dim];
    system.apply(0.0, &state, &mut residual);
    let mut residual_norm = l2_norm(&residual);
    let mut iterations = 0usize;

    while residual_norm > settings.tolerance {
        if iterations >= settings.max_steps {
            bail!(
                "Newton solver failed to converge in {} steps (‖f(x)‖ = {}).",
                settings.max_steps,
                residual_norm
            );
        }

        let jacobian = compute_jacobian(system, &state);
        let delta = solve_linear_system(dim, &jacobian, &residual)
            .context("Failed to solve linear system during Newton iteration.")?;
        for (x, dx) in state.iter_mut().zip(&delta) {
            *x -= settings.damping * dx;
        }

        iterations += 1;
        system.apply(0.0, &state, &mut residual);
        residual_norm = l2_norm(&residual);
        if !residual_norm.is_finite() {
            bail!("Newton iteration diverged (non-finite residual).");
        }
    }

    let jacobian = compute_jacobian(system, &state);
    let eigenpairs = compute_eigenpairs(dim, &jacobian)
        .context("Failed to compute eigenvalues/eigenvectors of Jacobian.")?;

    Ok(EquilibriumResult {
        state,
        residual_norm,
        iterations,
        jacobian,
        eigenpairs,
    })
}

/// Central-difference Jacobian, row-major.
pub fn compute_jacobian<S: DynamicalSystem<f64>>(system: &S, state: &[f64]) -> Vec<f64> {
    let dim = state.len();
    let mut jacobian = vec![0.0; dim * dim];
    let mut plus = vec![0.0; dim];
    let mut minus = vec![0.0; dim];
    let mut probe = state.to_vec();
    for j in 0..dim {
        let h = 1e-6 * (1.0 + state[j].abs());
        probe[j] = state[j] + h;
        system.apply(0.0, &probe, &mut plus);
        probe[j] = state[j] - h;
        system.apply(0.0, &probe, &mut minus);
        probe[j] = state[j];
        for i in 0..dim {
            jacobian[i * dim + j] = (plus[i] - minus[i]) / (2.0 * h);
        }
    }
    jacobian
}

fn solve_linear_system(dim: usize, jacobian: &[f64], residual: &[f64]) -> Result<Vec<f64>> {
    let j_matrix = DMatrix::from_row_slice(dim, dim, jacobian);
    let rhs = DVector::from_column_slice(residual);
    j_matrix
        .lu()
        .solve(&rhs)
        .map(|v| v.iter().cloned().collect())
        .ok_or_else(|| anyhow!("Jacobian is singular."))
}

/// Eigenvalues of a square row-major matrix.
pub fn eigenvalues(dim: usize, matrix: &[f64]) -> Result<Vec<Complex<f64>>> {
    if dim == 0 || matrix.len() != dim * dim {
        bail!(
            "Matrix must be square: got {} entries for dimension {}.",
            matrix.len(),
            dim
        );
    }
    let m = DMatrix::from_row_slice(dim, dim, matrix);
    Ok(m.complex_eigenvalues().iter().copied().collect())
}

pub fn compute_eigenpairs(dim: usize, jacobian: &[f64]) -> Result<Vec<EigenPair>> {
    let eigenvalues = eigenvalues(dim, jacobian)?;
    let complex_matrix = DMatrix::from_row_slice(dim, dim, jacobian).map(|v| Complex::new(v, 0.0));

    let mut pairs = Vec::with_capacity(dim);
    for (idx, lambda) in eigenvalues.into_iter().enumerate() {
        let mut shifted = complex_matrix.clone();
        for i in 0..dim {
            shifted[(i, i)] -= lambda;
        }

        // The right singular vector of the smallest singular value spans the
        // (numerical) null space of A - λI.
        let svd = SVD::new(shifted, true, true);
        let v_t = svd
            .v_t
            .ok_or_else(|| anyhow!("Failed to compute eigenvector for eigenvalue index {}", idx))?;
        let smallest = svd
            .singular_values
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let mut vector: Vec<Complex<f64>> =
            v_t.row(smallest).iter().map(|c| c.conj()).collect();
        normalize_complex_vector(&mut vector);

        pairs.push(EigenPair {
            value: ComplexNumber::from(lambda),
            vector: vector.into_iter().map(ComplexNumber::from).collect(),
        });
    }
    Ok(pairs)
}

/// Classifies a planar equilibrium from its two eigenvalues.
pub fn classify_planar(l1: Complex<f64>, l2: Complex<f64>, tol: f64) -> PlanarStability {
    let complex = l1.im.abs() > tol || l2.im.abs() > tol;
    if complex {
        let re = l1.re;
        return if re.abs() <= tol {
            PlanarStability::Center
        } else if re < 0.0 {
            PlanarStability::StableFocus
        } else {
            PlanarStability::UnstableFocus
        };
    }
    let (a, b) = (l1.re, l2.re);
    if a.abs() <= tol || b.abs() <= tol {
        PlanarStability::Degenerate
    } else if a * b < 0.0 {
        PlanarStability::Saddle
    } else if a < 0.0 {
        PlanarStability::StableNode
    } else {
        PlanarStability::UnstableNode
    }
}

fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

fn normalize_complex_vector(vec: &mut [Complex<f64>]) {
    let norm = vec.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
    if norm > 0.0 {
        for entry in vec {
            *entry /= norm;
        }
    }
}
