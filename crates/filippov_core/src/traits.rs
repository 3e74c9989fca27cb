use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in our vector fields.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Represents a vector field `x' = f(t, x)`.
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// x: current state
    /// t: current time
    /// out: buffer to write dx/dt
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

impl<T: Scalar, S: DynamicalSystem<T> + ?Sized> DynamicalSystem<T> for &S {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) {
        (**self).apply(t, x, out)
    }
}

/// A trait for solvers that can step a system forward.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt.
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    /// dt: step size
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}

/// Convenience helpers for planar (two dimensional) fields.
pub trait PlanarField: DynamicalSystem<f64> {
    /// Evaluates the field at `(x, y)` and returns `(dx/dt, dy/dt)`.
    fn eval_planar(&self, t: f64, x: f64, y: f64) -> (f64, f64) {
        let mut out = [0.0; 2];
        self.apply(t, &[x, y], &mut out);
        (out[0], out[1])
    }
}

impl<S: DynamicalSystem<f64> + ?Sized> PlanarField for S {}
