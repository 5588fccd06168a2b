use thiserror::Error;

/// Errors raised while integrating a meniscus profile or shooting for the
/// contact line altitude.
#[derive(Debug, Error)]
pub enum MeniscusError {
    /// The vector field was evaluated where the radius is not strictly positive.
    #[error("vector field undefined at non-positive radius r = {radius} (z = {altitude})")]
    DomainViolation { altitude: f64, radius: f64 },

    /// The adaptive solver shrank its step below the configured minimum.
    #[error("integration stalled at z = {altitude}: step size {step:e} below minimum")]
    StepSizeUnderflow { altitude: f64, step: f64 },

    /// The solver used up its step budget before reaching the end of the grid.
    #[error("integration exceeded {max_steps} steps (reached z = {altitude})")]
    StepBudgetExhausted { altitude: f64, max_steps: usize },

    /// A fixed-step solver produced a non-finite state.
    #[error("integration produced a non-finite state at z = {altitude}")]
    NonFiniteState { altitude: f64 },

    /// Every sample was removed by the slope cutoff.
    #[error(
        "profile for TCL altitude {tcl_position} is empty: slope cutoff exceeded at the contact line"
    )]
    EmptyProfile { tcl_position: f64 },

    /// The root-finder bounds do not straddle a sign change.
    #[error(
        "bracket [{lower}, {upper}] does not straddle a root: f(lower) = {f_lower}, f(upper) = {f_upper}"
    )]
    BracketingFailure {
        lower: f64,
        upper: f64,
        f_lower: f64,
        f_upper: f64,
    },

    /// The root-finder returned a non-finite function value.
    #[error("root finder evaluated a non-finite value at x = {x}")]
    NonFiniteResidual { x: f64 },

    /// Bisection ran out of iterations.
    #[error("bisection did not converge in {iterations} iterations (bracket [{lower}, {upper}])")]
    NotConverged {
        iterations: usize,
        lower: f64,
        upper: f64,
    },

    /// A request or settings value was rejected before any computation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A profile integration failed during the shooting search.
    #[error("integration failed for trial TCL altitude {tcl_position}")]
    Trial {
        tcl_position: f64,
        #[source]
        source: Box<MeniscusError>,
    },
}

pub type Result<T> = std::result::Result<T, MeniscusError>;

impl MeniscusError {
    /// Strips any [`MeniscusError::Trial`] wrappers.
    pub fn root_cause(&self) -> &MeniscusError {
        match self {
            MeniscusError::Trial { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MeniscusError;

    #[test]
    fn root_cause_unwraps_nested_trials() {
        let err = MeniscusError::Trial {
            tcl_position: 1.0,
            source: Box::new(MeniscusError::Trial {
                tcl_position: 0.5,
                source: Box::new(MeniscusError::DomainViolation {
                    altitude: -0.2,
                    radius: 0.0,
                }),
            }),
        };
        assert!(matches!(
            err.root_cause(),
            MeniscusError::DomainViolation { .. }
        ));
        assert!(format!("{err}").contains("trial TCL altitude 1"));
    }

    #[test]
    fn bracketing_failure_reports_both_endpoints() {
        let err = MeniscusError::BracketingFailure {
            lower: 0.5,
            upper: 1.5,
            f_lower: 0.1,
            f_upper: 0.2,
        };
        let message = format!("{err}");
        assert!(message.contains("[0.5, 1.5]"));
        assert!(message.contains("f(lower) = 0.1"));
    }
}
