use crate::error::{MeniscusError, Result};
use crate::traits::{BracketSolver, Root};
use serde::{Deserialize, Serialize};

/// Termination criteria for [`Bisection`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BisectionSettings {
    pub max_iters: usize,
    pub x_abs_tol: f64,
    pub x_rel_tol: f64,
}

impl Default for BisectionSettings {
    fn default() -> Self {
        Self {
            max_iters: 100,
            x_abs_tol: 2e-12,
            x_rel_tol: 4.0 * f64::EPSILON,
        }
    }
}

impl BisectionSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_iters == 0 {
            return Err(MeniscusError::InvalidRequest(
                "max_iters must be greater than zero".to_string(),
            ));
        }
        if !(self.x_abs_tol > 0.0) {
            return Err(MeniscusError::InvalidRequest(format!(
                "x_abs_tol must be positive, got {}",
                self.x_abs_tol
            )));
        }
        if !(self.x_rel_tol >= 0.0) {
            return Err(MeniscusError::InvalidRequest(format!(
                "x_rel_tol must be non-negative, got {}",
                self.x_rel_tol
            )));
        }
        Ok(())
    }
}

/// Interval halving on a sign-changing bracket.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bisection {
    pub settings: BisectionSettings,
}

impl Bisection {
    pub fn new(settings: BisectionSettings) -> Self {
        Self { settings }
    }
}

impl BracketSolver for Bisection {
    fn solve<F>(&self, mut f: F, lower: f64, upper: f64) -> Result<Root>
    where
        F: FnMut(f64) -> Result<f64>,
    {
        self.settings.validate()?;
        if !lower.is_finite() || !upper.is_finite() || lower >= upper {
            return Err(MeniscusError::InvalidRequest(format!(
                "bracket [{lower}, {upper}] must be finite with lower < upper"
            )));
        }

        let f_lower = finite(lower, f(lower)?)?;
        if f_lower == 0.0 {
            return Ok(Root {
                x: lower,
                residual: 0.0,
                iterations: 0,
            });
        }
        let f_upper = finite(upper, f(upper)?)?;
        if f_upper == 0.0 {
            return Ok(Root {
                x: upper,
                residual: 0.0,
                iterations: 0,
            });
        }
        if f_lower.signum() == f_upper.signum() {
            return Err(MeniscusError::BracketingFailure {
                lower,
                upper,
                f_lower,
                f_upper,
            });
        }

        let mut a = lower;
        let mut f_a = f_lower;
        let mut width = upper - lower;
        for iteration in 1..=self.settings.max_iters {
            width *= 0.5;
            let mid = a + width;
            let f_mid = finite(mid, f(mid)?)?;
            log::debug!(
                "bisection iter {}: x = {:.15}, f(x) = {:e}, width = {:e}",
                iteration,
                mid,
                f_mid,
                width
            );
            if f_mid.signum() == f_a.signum() {
                a = mid;
                f_a = f_mid;
            }
            let tolerance = self.settings.x_abs_tol + self.settings.x_rel_tol * mid.abs();
            if f_mid == 0.0 || width.abs() < tolerance {
                return Ok(Root {
                    x: mid,
                    residual: f_mid,
                    iterations: iteration,
                });
            }
        }

        Err(MeniscusError::NotConverged {
            iterations: self.settings.max_iters,
            lower: a,
            upper: a + width,
        })
    }
}

fn finite(x: f64, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MeniscusError::NonFiniteResidual { x })
    }
}
