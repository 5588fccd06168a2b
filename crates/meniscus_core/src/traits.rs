use crate::error::Result;
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in our systems.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Represents a first-order ODE system dx/dt = f(t, x).
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: independent variable
    /// x: current state
    /// out: buffer to write dx/dt
    ///
    /// Fails when `x` lies outside the domain of the field.
    fn apply(&self, t: T, x: &[T], out: &mut [T]) -> Result<()>;
}

/// A trait for solvers that can step a system forward.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt.
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    /// dt: step size, may be negative
    fn step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: &mut T,
        state: &mut [T],
        dt: T,
    ) -> Result<()>;
}

/// States of a system sampled on an output grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSolution<T> {
    /// One state per grid point reached, in grid order.
    pub states: Vec<Vec<T>>,
    /// True when the halt predicate stopped the integration early.
    pub halted: bool,
}

/// An ODE integrator that reports the solution on a caller-supplied grid.
pub trait GridIntegrator<T: Scalar> {
    /// Integrates `system` from `initial` at `grid[0]` across the grid.
    ///
    /// `halt` is checked on the initial state and after every accepted
    /// internal step. When it fires off-grid, the solution ends at the last
    /// grid point reached; when it fires on a grid point, that point is kept.
    fn integrate<S, H>(
        &mut self,
        system: &S,
        initial: &[T],
        grid: &[T],
        halt: H,
    ) -> Result<GridSolution<T>>
    where
        S: DynamicalSystem<T>,
        H: FnMut(T, &[T]) -> bool;
}

/// Result of a bracketed root search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Root {
    pub x: f64,
    pub residual: f64,
    pub iterations: usize,
}

/// A root-finder for scalar functions on a sign-changing bracket.
pub trait BracketSolver {
    fn solve<F>(&self, f: F, lower: f64, upper: f64) -> Result<Root>
    where
        F: FnMut(f64) -> Result<f64>;
}
