/// The `filippov_core` crate is the numerical engine behind the `filippov` CLI.
/// It simulates planar systems whose vector field switches across a horizontal
/// line `y = w`, and hosts the smaller ODE explorations built on the same parts.
///
/// Key components:
/// - **Traits**: `Scalar`, `DynamicalSystem`, `Steppable`, `PlanarField`.
/// - **Solvers / Integrator**: fixed-step Euler, RK4 and Tsit5 with event detection.
/// - **Switching / Filippov**: boundary classification and the switched trajectory driver.
/// - **Analysis**: direction fields, nullclines, equilibria and eigenvalues.
/// - **Equation Engine**: bytecode VM for user-defined fields in scenario files.
pub mod equation_engine;
pub mod equilibrium;
pub mod filippov;
pub mod integrator;
pub mod models;
pub mod nullcline;
pub mod observations;
pub mod solvers;
pub mod switching;
pub mod time_switched;
pub mod traits;
pub mod vector_field;
