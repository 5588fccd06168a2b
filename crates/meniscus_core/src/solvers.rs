use crate::error::{MeniscusError, Result};
use crate::traits::{DynamicalSystem, GridIntegrator, GridSolution, Scalar, Steppable};
use serde::{Deserialize, Serialize};

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
        Self {
            k1: vec![T::zero(); dim],
            k2: vec![T::zero(); dim],
            k3: vec![T::zero(); dim],
            k4: vec![T::zero(); dim],
            tmp: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: &mut T,
        state: &mut [T],
        dt: T,
    ) -> Result<()> {
        let half = T::from_f64(0.5).unwrap();
        let sixth = T::from_f64(1.0 / 6.0).unwrap();
        let two = T::from_f64(2.0).unwrap();

        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1)?;

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2)?;

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3)?;

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4)?;

        // y_next = y + dt/6 * (k1 + 2k2 + 2k3 + k4)
        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
        Ok(())
    }
}

/// Tsitouras 5/4 Solver
pub struct Tsit5<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    k5: Vec<T>,
    k6: Vec<T>,
    k7: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> Tsit5<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            k5: vec![z; dim],
            k6: vec![z; dim],
            k7: vec![z; dim],
            tmp: vec![z; dim],
        }
    }

    /// Runs the six stages from `(t0, state)` and writes the 5th order
    /// solution at `t0 + dt` into `out`.
    fn stages(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t0: T,
        state: &[T],
        dt: T,
        out: &mut [T],
    ) -> Result<()> {
        // Tsit5 Coefficients
        let c2 = T::from_f64(0.161).unwrap();
        let c3 = T::from_f64(0.327).unwrap();
        let c4 = T::from_f64(0.9).unwrap();
        let c5 = T::from_f64(0.9800255409045097).unwrap();
        let c6 = T::from_f64(1.0).unwrap();

        let a21 = T::from_f64(0.161).unwrap();

        let a31 = T::from_f64(-0.008480655492356989).unwrap();
        let a32 = T::from_f64(0.335480655492357).unwrap();

        let a41 = T::from_f64(2.897153057105493).unwrap();
        let a42 = T::from_f64(-6.359448489975075).unwrap();
        let a43 = T::from_f64(4.3622954328695815).unwrap();

        let a51 = T::from_f64(5.325864828439257).unwrap();
        let a52 = T::from_f64(-11.748883564062828).unwrap();
        let a53 = T::from_f64(7.4955393428898365).unwrap();
        let a54 = T::from_f64(-0.09249506636175525).unwrap();

        let a61 = T::from_f64(5.86145544294642).unwrap();
        let a62 = T::from_f64(-12.92096931784711).unwrap();
        let a63 = T::from_f64(8.159367898576159).unwrap();
        let a64 = T::from_f64(-0.071584973281401).unwrap();
        let a65 = T::from_f64(-0.028269050394068383).unwrap();

        // b coefficients (5th order)
        let b1 = T::from_f64(0.09646076681806523).unwrap();
        let b2 = T::from_f64(0.01).unwrap();
        let b3 = T::from_f64(0.4798896504144996).unwrap();
        let b4 = T::from_f64(1.379008574103742).unwrap();
        let b5 = T::from_f64(-3.290069515436081).unwrap();
        let b6 = T::from_f64(2.324710524099774).unwrap();

        // k1
        system.apply(t0, state, &mut self.k1)?;

        // k2
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * (a21 * self.k1[i]);
        }
        system.apply(t0 + c2 * dt, &self.tmp, &mut self.k2)?;

        // k3
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * (a31 * self.k1[i] + a32 * self.k2[i]);
        }
        system.apply(t0 + c3 * dt, &self.tmp, &mut self.k3)?;

        // k4
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * (a41 * self.k1[i] + a42 * self.k2[i] + a43 * self.k3[i]);
        }
        system.apply(t0 + c4 * dt, &self.tmp, &mut self.k4)?;

        // k5
        for i in 0..state.len() {
            self.tmp[i] = state[i]
                + dt * (a51 * self.k1[i] + a52 * self.k2[i] + a53 * self.k3[i] + a54 * self.k4[i]);
        }
        system.apply(t0 + c5 * dt, &self.tmp, &mut self.k5)?;

        // k6
        for i in 0..state.len() {
            self.tmp[i] = state[i]
                + dt * (a61 * self.k1[i]
                    + a62 * self.k2[i]
                    + a63 * self.k3[i]
                    + a64 * self.k4[i]
                    + a65 * self.k5[i]);
        }
        system.apply(t0 + c6 * dt, &self.tmp, &mut self.k6)?;

        for i in 0..state.len() {
            out[i] = state[i]
                + dt * (b1 * self.k1[i]
                    + b2 * self.k2[i]
                    + b3 * self.k3[i]
                    + b4 * self.k4[i]
                    + b5 * self.k5[i]
                    + b6 * self.k6[i]);
        }
        Ok(())
    }

    /// Computes a step without committing it.
    ///
    /// `out` receives the 5th order solution and `err` the difference with
    /// the embedded 4th order solution.
    pub fn trial_step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t0: T,
        state: &[T],
        dt: T,
        out: &mut [T],
        err: &mut [T],
    ) -> Result<()> {
        self.stages(system, t0, state, dt, out)?;
        system.apply(t0 + dt, out, &mut self.k7)?;

        // btilde = b - bhat
        let e1 = T::from_f64(-0.00178001105222577714).unwrap();
        let e2 = T::from_f64(-0.0008164344596567469).unwrap();
        let e3 = T::from_f64(0.007880878010261995).unwrap();
        let e4 = T::from_f64(-0.1447110071732629).unwrap();
        let e5 = T::from_f64(0.5823571654525552).unwrap();
        let e6 = T::from_f64(-0.45808210592918697).unwrap();
        let e7 = T::from_f64(1.0 / 66.0).unwrap();

        for i in 0..state.len() {
            err[i] = dt
                * (e1 * self.k1[i]
                    + e2 * self.k2[i]
                    + e3 * self.k3[i]
                    + e4 * self.k4[i]
                    + e5 * self.k5[i]
                    + e6 * self.k6[i]
                    + e7 * self.k7[i]);
        }
        Ok(())
    }
}

/// Tolerances and limits of the grid integrators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub rtol: f64,
    pub atol: f64,
    /// First trial step magnitude; steps never cross a grid point.
    pub initial_step: f64,
    /// Rejections below this step magnitude abort the integration.
    pub min_step: f64,
    /// Accepted step budget for one grid integration.
    pub max_steps: usize,
    /// RK4 steps per grid interval for [`FixedRk4`].
    pub fixed_substeps: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-9,
            atol: 1e-9,
            initial_step: 1e-3,
            min_step: 1e-14,
            max_steps: 1_000_000,
            fixed_substeps: 16,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.rtol > 0.0) || !(self.atol > 0.0) {
            return Err(MeniscusError::InvalidRequest(format!(
                "solver tolerances must be positive (rtol = {}, atol = {})",
                self.rtol, self.atol
            )));
        }
        if !(self.initial_step > 0.0) || !(self.min_step > 0.0) {
            return Err(MeniscusError::InvalidRequest(
                "initial_step and min_step must be positive".to_string(),
            ));
        }
        if self.min_step > self.initial_step {
            return Err(MeniscusError::InvalidRequest(format!(
                "min_step {} exceeds initial_step {}",
                self.min_step, self.initial_step
            )));
        }
        if self.max_steps == 0 {
            return Err(MeniscusError::InvalidRequest(
                "max_steps must be greater than zero".to_string(),
            ));
        }
        if self.fixed_substeps == 0 {
            return Err(MeniscusError::InvalidRequest(
                "fixed_substeps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;
const FAILURE_FACTOR: f64 = 0.25;

/// Adaptive Tsit5 with embedded error control, sampled onto a grid.
///
/// Trial steps whose stages leave the domain of the field, or whose error
/// estimate is not finite, are rejected and retried with a smaller step. A
/// domain violation that persists down to `min_step` is returned as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveTsit5 {
    pub settings: SolverSettings,
}

impl AdaptiveTsit5 {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }
}

impl<T: Scalar> GridIntegrator<T> for AdaptiveTsit5 {
    fn integrate<S, H>(
        &mut self,
        system: &S,
        initial: &[T],
        grid: &[T],
        mut halt: H,
    ) -> Result<GridSolution<T>>
    where
        S: DynamicalSystem<T>,
        H: FnMut(T, &[T]) -> bool,
    {
        let settings = self.settings;
        settings.validate()?;
        let dim = check_inputs(system, initial, grid)?;

        let mut states = Vec::with_capacity(grid.len());
        let Some((&t_start, rest)) = grid.split_first() else {
            return Ok(GridSolution {
                states,
                halted: false,
            });
        };

        let mut state = initial.to_vec();
        states.push(state.clone());
        if halt(t_start, &state) {
            return Ok(GridSolution {
                states,
                halted: true,
            });
        }

        let rtol = T::from_f64(settings.rtol).unwrap();
        let atol = T::from_f64(settings.atol).unwrap();
        let min_step = T::from_f64(settings.min_step).unwrap();
        let safety = T::from_f64(SAFETY).unwrap();
        let min_factor = T::from_f64(MIN_FACTOR).unwrap();
        let max_factor = T::from_f64(MAX_FACTOR).unwrap();
        let failure_factor = T::from_f64(FAILURE_FACTOR).unwrap();
        let exponent = T::from_f64(-0.2).unwrap();

        let mut stepper = Tsit5::new(dim);
        let mut trial = vec![T::zero(); dim];
        let mut err = vec![T::zero(); dim];
        let mut t = t_start;
        let mut h = T::from_f64(settings.initial_step).unwrap();
        let mut accepted = 0usize;
        let mut last_violation: Option<MeniscusError> = None;

        for &target in rest {
            let direction = (target - t).signum();
            while t != target {
                if accepted >= settings.max_steps {
                    return Err(MeniscusError::StepBudgetExhausted {
                        altitude: to_f64(t),
                        max_steps: settings.max_steps,
                    });
                }

                let remaining = target - t;
                let landing = h >= remaining.abs();
                let dt = if landing { remaining } else { direction * h };

                let error = match stepper.trial_step(system, t, &state, dt, &mut trial, &mut err) {
                    Ok(()) if trial.iter().all(|v| v.is_finite()) => {
                        error_norm(&err, &state, &trial, atol, rtol)
                    }
                    Ok(()) => T::nan(),
                    Err(violation @ MeniscusError::DomainViolation { .. }) => {
                        last_violation = Some(violation);
                        T::nan()
                    }
                    Err(other) => return Err(other),
                };

                if error <= T::one() {
                    let next_t = if landing { target } else { t + dt };
                    if next_t == t {
                        return Err(MeniscusError::StepSizeUnderflow {
                            altitude: to_f64(t),
                            step: to_f64(dt.abs()),
                        });
                    }
                    t = next_t;
                    state.copy_from_slice(&trial);
                    accepted += 1;
                    last_violation = None;

                    let factor = if error == T::zero() {
                        max_factor
                    } else {
                        (safety * error.powf(exponent)).max(min_factor).min(max_factor)
                    };
                    let proposed = dt.abs() * factor;
                    h = if landing { h.max(proposed) } else { proposed };

                    if halt(t, &state) {
                        if t == target {
                            states.push(state.clone());
                        }
                        return Ok(GridSolution {
                            states,
                            halted: true,
                        });
                    }
                } else {
                    let shrink = if error.is_finite() {
                        (safety * error.powf(exponent)).max(min_factor).min(T::one())
                    } else {
                        failure_factor
                    };
                    h = dt.abs() * shrink;
                    log::trace!(
                        "Rejected step of {:e} at t = {}, retrying with {:e}",
                        to_f64(dt.abs()),
                        to_f64(t),
                        to_f64(h)
                    );
                    if h < min_step {
                        return Err(last_violation.take().unwrap_or(
                            MeniscusError::StepSizeUnderflow {
                                altitude: to_f64(t),
                                step: to_f64(h),
                            },
                        ));
                    }
                }
            }
            states.push(state.clone());
        }

        Ok(GridSolution {
            states,
            halted: false,
        })
    }
}

/// Classic RK4 with a fixed number of substeps per grid interval.
///
/// There is no step rejection: a domain violation in any stage is returned
/// immediately.
#[derive(Debug, Clone, Copy)]
pub struct FixedRk4 {
    pub substeps: usize,
}

impl FixedRk4 {
    pub fn new(substeps: usize) -> Self {
        Self { substeps }
    }
}

impl<T: Scalar> GridIntegrator<T> for FixedRk4 {
    fn integrate<S, H>(
        &mut self,
        system: &S,
        initial: &[T],
        grid: &[T],
        mut halt: H,
    ) -> Result<GridSolution<T>>
    where
        S: DynamicalSystem<T>,
        H: FnMut(T, &[T]) -> bool,
    {
        if self.substeps == 0 {
            return Err(MeniscusError::InvalidRequest(
                "fixed_substeps must be at least 1".to_string(),
            ));
        }
        let dim = check_inputs(system, initial, grid)?;

        let mut states = Vec::with_capacity(grid.len());
        let Some((&t_start, rest)) = grid.split_first() else {
            return Ok(GridSolution {
                states,
                halted: false,
            });
        };

        let mut state = initial.to_vec();
        states.push(state.clone());
        if halt(t_start, &state) {
            return Ok(GridSolution {
                states,
                halted: true,
            });
        }

        let mut stepper = RK4::new(dim);
        let substeps = T::from_usize(self.substeps).unwrap();
        let mut t = t_start;

        for &target in rest {
            let dt = (target - t) / substeps;
            for k in 0..self.substeps {
                stepper.step(system, &mut t, &mut state, dt)?;
                let on_grid = k + 1 == self.substeps;
                if on_grid {
                    t = target;
                }
                if halt(t, &state) {
                    if on_grid {
                        states.push(state.clone());
                    }
                    return Ok(GridSolution {
                        states,
                        halted: true,
                    });
                }
                if state.iter().any(|v| !v.is_finite()) {
                    return Err(MeniscusError::NonFiniteState {
                        altitude: to_f64(t),
                    });
                }
            }
            states.push(state.clone());
        }

        Ok(GridSolution {
            states,
            halted: false,
        })
    }
}

/// Selects a grid integrator from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OdeMethod {
    #[default]
    Tsit5,
    Rk4,
}

impl OdeMethod {
    pub fn build(self, settings: SolverSettings) -> GridStepper {
        match self {
            OdeMethod::Tsit5 => GridStepper::Tsit5(AdaptiveTsit5::new(settings)),
            OdeMethod::Rk4 => GridStepper::Rk4(FixedRk4::new(settings.fixed_substeps)),
        }
    }
}

pub enum GridStepper {
    Tsit5(AdaptiveTsit5),
    Rk4(FixedRk4),
}

impl<T: Scalar> GridIntegrator<T> for GridStepper {
    fn integrate<S, H>(
        &mut self,
        system: &S,
        initial: &[T],
        grid: &[T],
        halt: H,
    ) -> Result<GridSolution<T>>
    where
        S: DynamicalSystem<T>,
        H: FnMut(T, &[T]) -> bool,
    {
        match self {
            GridStepper::Tsit5(s) => s.integrate(system, initial, grid, halt),
            GridStepper::Rk4(s) => s.integrate(system, initial, grid, halt),
        }
    }
}

fn check_inputs<T: Scalar, S: DynamicalSystem<T>>(
    system: &S,
    initial: &[T],
    grid: &[T],
) -> Result<usize> {
    let dim = system.dimension();
    if dim == 0 {
        return Err(MeniscusError::InvalidRequest(
            "system has zero dimension".to_string(),
        ));
    }
    if initial.len() != dim {
        return Err(MeniscusError::InvalidRequest(format!(
            "initial state dimension mismatch: expected {}, got {}",
            dim,
            initial.len()
        )));
    }
    if grid.iter().any(|t| !t.is_finite()) {
        return Err(MeniscusError::InvalidRequest(
            "grid contains non-finite values".to_string(),
        ));
    }
    let increasing = grid.windows(2).all(|w| w[1] > w[0]);
    let decreasing = grid.windows(2).all(|w| w[1] < w[0]);
    if !(increasing || decreasing) {
        return Err(MeniscusError::InvalidRequest(
            "grid must be strictly monotonic".to_string(),
        ));
    }
    Ok(dim)
}

fn error_norm<T: Scalar>(err: &[T], y0: &[T], y1: &[T], atol: T, rtol: T) -> T {
    let mut sum = T::zero();
    for i in 0..err.len() {
        let scale = atol + rtol * y0[i].abs().max(y1[i].abs());
        let ratio = err[i] / scale;
        sum = sum + ratio * ratio;
    }
    (sum / T::from_usize(err.len()).unwrap()).sqrt()
}

fn to_f64<T: Scalar>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}
