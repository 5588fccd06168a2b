//! Integration of the meniscus profile downward from a trial contact line.

use crate::error::{MeniscusError, Result};
use crate::meniscus::{far_field_altitude, MeniscusPinOde, MeniscusState};
use crate::solvers::AdaptiveTsit5;
use crate::traits::GridIntegrator;
use serde::{Deserialize, Serialize};

/// Parameters of a single profile integration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrationRequest {
    /// Altitude of the three-phase contact line.
    pub tcl_position: f64,
    pub pin_radius: f64,
    /// Contact angle in degrees.
    pub theta: f64,
    /// Height integrated below the contact line.
    pub delta_z: f64,
    pub num_point: usize,
    /// Largest `|dr/dz|` kept in the profile.
    pub slope_cutoff: f64,
}

impl IntegrationRequest {
    pub fn new(tcl_position: f64, pin_radius: f64) -> Self {
        Self {
            tcl_position,
            pin_radius,
            theta: 0.0,
            delta_z: 0.5,
            num_point: 1800,
            slope_cutoff: 1e7,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.tcl_position.is_finite() {
            return Err(MeniscusError::InvalidRequest(format!(
                "tcl_position must be finite, got {}",
                self.tcl_position
            )));
        }
        if !(self.pin_radius > 0.0) || !self.pin_radius.is_finite() {
            return Err(MeniscusError::InvalidRequest(format!(
                "pin_radius must be positive, got {}",
                self.pin_radius
            )));
        }
        if !self.theta.is_finite() {
            return Err(MeniscusError::InvalidRequest(format!(
                "theta must be finite, got {}",
                self.theta
            )));
        }
        if !(self.delta_z > 0.0) || !self.delta_z.is_finite() {
            return Err(MeniscusError::InvalidRequest(format!(
                "delta_z must be positive, got {}",
                self.delta_z
            )));
        }
        if self.num_point == 0 {
            return Err(MeniscusError::InvalidRequest(
                "num_point must be at least 1".to_string(),
            ));
        }
        if !(self.slope_cutoff > 0.0) {
            return Err(MeniscusError::InvalidRequest(format!(
                "slope_cutoff must be positive, got {}",
                self.slope_cutoff
            )));
        }
        Ok(())
    }

    /// Altitudes from `tcl_position` down to `tcl_position - delta_z`.
    pub fn altitudes(&self) -> Vec<f64> {
        linspace(
            self.tcl_position,
            self.tcl_position - self.delta_z,
            self.num_point,
        )
    }

    pub fn initial_state(&self) -> MeniscusState {
        MeniscusState::at_contact_line(self.pin_radius, self.theta)
    }
}

/// Sampled meniscus: altitudes in decreasing order, one state per altitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSample {
    pub altitudes: Vec<f64>,
    pub states: Vec<MeniscusState>,
}

impl ProfileSample {
    pub fn len(&self) -> usize {
        self.altitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.altitudes.is_empty()
    }

    pub fn tcl_altitude(&self) -> Option<f64> {
        self.altitudes.first().copied()
    }

    /// Lowest altitude reached before truncation or the end of the span.
    pub fn terminal_altitude(&self) -> Option<f64> {
        self.altitudes.last().copied()
    }

    pub fn radii(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.radius).collect()
    }

    pub fn slopes(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.slope).collect()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, MeniscusState)> + '_ {
        self.altitudes.iter().copied().zip(self.states.iter().copied())
    }

    /// Largest gap between the profile and the far-field exponential
    /// `exp(-(r - R))`.
    pub fn far_field_deviation(&self, pin_radius: f64) -> Option<f64> {
        self.points()
            .map(|(z, s)| (z - far_field_altitude(s.radius, pin_radius, 1.0)).abs())
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |m| m.max(d))))
    }
}

/// Integrates the meniscus with the default adaptive solver.
pub fn integrate(request: &IntegrationRequest) -> Result<ProfileSample> {
    integrate_with(request, &mut AdaptiveTsit5::default())
}

/// Integrates the meniscus ODE from the contact line down `delta_z` and drops
/// every point from the first one whose `|slope|` exceeds the cutoff.
pub fn integrate_with<I>(request: &IntegrationRequest, integrator: &mut I) -> Result<ProfileSample>
where
    I: GridIntegrator<f64>,
{
    request.validate()?;

    let mut altitudes = request.altitudes();
    let initial = request.initial_state().to_array();
    let cutoff = request.slope_cutoff;

    // The guard also runs on internal steps so a blow-up between two grid
    // points ends the solve instead of stalling it.
    let solution = integrator.integrate(&MeniscusPinOde, &initial, &altitudes, |_, x| {
        x[1].abs() > cutoff
    })?;

    let mut states: Vec<MeniscusState> = solution
        .states
        .iter()
        .map(|x| MeniscusState::from_slice(x))
        .collect();
    altitudes.truncate(states.len());

    if let Some(idx) = first_unstable_index(&states, cutoff) {
        states.truncate(idx);
        altitudes.truncate(idx);
    }

    if solution.halted || states.len() < request.num_point {
        log::trace!(
            "profile from z = {} truncated to {} of {} points",
            request.tcl_position,
            states.len(),
            request.num_point
        );
    }

    Ok(ProfileSample { altitudes, states })
}

fn first_unstable_index(states: &[MeniscusState], cutoff: f64) -> Option<usize> {
    states.iter().position(|s| s.slope.abs() > cutoff)
}

fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let mut values: Vec<f64> = (0..num).map(|i| start + i as f64 * step).collect();
            values[num - 1] = stop;
            values
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solvers::{FixedRk4, SolverSettings};
    use approx::assert_relative_eq;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn request(tcl_position: f64, theta: f64) -> IntegrationRequest {
        IntegrationRequest {
            theta,
            delta_z: 1.8,
            slope_cutoff: 200.0,
            ..IntegrationRequest::new(tcl_position, 1000.0)
        }
    }

    #[test]
    fn linspace_hits_both_endpoints() {
        let values = linspace(1.0, -0.8, 10);
        assert_eq!(values.len(), 10);
        assert_eq!(values[0], 1.0);
        assert_eq!(values[9], -0.8);
        assert!(values.windows(2).all(|w| w[1] < w[0]));
        assert_eq!(linspace(0.3, 0.0, 1), vec![0.3]);
    }

    #[test]
    fn altitudes_are_strictly_decreasing() {
        for tcl in [-0.05, 0.6, 1.55] {
            let profile = integrate(&request(tcl, 20.0)).unwrap();
            assert!(!profile.is_empty());
            assert_eq!(profile.tcl_altitude(), Some(tcl));
            assert!(profile.altitudes.windows(2).all(|w| w[1] < w[0]));
            assert_eq!(profile.altitudes.len(), profile.states.len());
        }
    }

    #[test]
    fn retained_slopes_respect_cutoff() {
        let req = request(1.55, 0.0);
        let profile = integrate(&req).unwrap();
        assert!(profile.len() < req.num_point);
        assert!(profile
            .states
            .iter()
            .all(|s| s.slope.abs() <= req.slope_cutoff));
    }

    #[test]
    fn truncated_point_would_exceed_cutoff() {
        let req = IntegrationRequest {
            slope_cutoff: 5.0,
            ..request(1.55, 0.0)
        };
        let truncated = integrate(&req).unwrap();
        let relaxed = integrate(&IntegrationRequest {
            slope_cutoff: 50.0,
            ..req
        })
        .unwrap();
        assert!(relaxed.len() > truncated.len());
        let next = relaxed.states[truncated.len()];
        assert!(next.slope.abs() > req.slope_cutoff);
        for (a, b) in truncated.states.iter().zip(&relaxed.states) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn contact_angle_sets_initial_slope() {
        let flat = integrate(&request(1.0, 0.0)).unwrap();
        assert_eq!(flat.states[0], MeniscusState::new(1000.0, 0.0));

        let tilted = integrate(&request(0.5, 60.0)).unwrap();
        assert_relative_eq!(tilted.states[0].slope, -3.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn integration_is_idempotent() {
        let req = request(0.9, 30.0);
        let first = integrate(&req).unwrap();
        let second = integrate(&req).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cutoff_at_contact_line_empties_profile() {
        let req = IntegrationRequest {
            slope_cutoff: 1.0,
            ..request(0.5, 60.0)
        };
        let profile = integrate(&req).unwrap();
        assert!(profile.is_empty());
        assert_eq!(profile.terminal_altitude(), None);
        assert_eq!(profile.far_field_deviation(1000.0), None);
    }

    #[test]
    fn far_field_deviation_is_the_largest_gap() {
        let profile = ProfileSample {
            altitudes: vec![1.0, 0.5, 0.1],
            states: vec![
                MeniscusState::new(10.0, 0.0),
                MeniscusState::new(10.0 + 2.0f64.ln(), -1.0),
                MeniscusState::new(12.0, -5.0),
            ],
        };
        let deviation = profile.far_field_deviation(10.0).unwrap();
        let expected = (0.1 - (-2.0f64).exp()).abs();
        assert!((deviation - expected).abs() < 1e-12, "{deviation}");
    }

    #[test]
    fn untruncated_profile_keeps_every_point() {
        let req = IntegrationRequest {
            delta_z: 0.1,
            num_point: 50,
            ..request(1.0, 0.0)
        };
        let profile = integrate(&req).unwrap();
        assert_eq!(profile.len(), 50);
        assert_relative_eq!(profile.terminal_altitude().unwrap(), 0.9, epsilon = 1e-15);
        // Above the flat level the interface moves away from the pin.
        assert!(profile.radii().windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn fixed_rk4_agrees_with_default_solver() {
        let req = IntegrationRequest {
            delta_z: 0.2,
            num_point: 41,
            ..request(1.0, 10.0)
        };
        let adaptive = integrate(&req).unwrap();
        let fixed = integrate_with(&req, &mut FixedRk4::new(8)).unwrap();
        assert_eq!(adaptive.len(), fixed.len());
        for (a, b) in adaptive.states.iter().zip(&fixed.states) {
            assert_relative_eq!(a.radius, b.radius, epsilon = 1e-8);
            assert_relative_eq!(a.slope, b.slope, epsilon = 1e-7);
        }
    }

    #[test]
    fn invalid_requests_are_rejected() {
        assert_err_contains(
            integrate(&IntegrationRequest::new(0.5, 0.0)),
            "pin_radius must be positive",
        );
        assert_err_contains(
            integrate(&IntegrationRequest {
                delta_z: 0.0,
                ..IntegrationRequest::new(0.5, 1.0)
            }),
            "delta_z",
        );
        assert_err_contains(
            integrate(&IntegrationRequest {
                num_point: 0,
                ..IntegrationRequest::new(0.5, 1.0)
            }),
            "num_point",
        );
        assert_err_contains(
            integrate(&IntegrationRequest {
                slope_cutoff: f64::NAN,
                ..IntegrationRequest::new(0.5, 1.0)
            }),
            "slope_cutoff",
        );
    }

    #[test]
    fn solver_failures_propagate() {
        let settings = SolverSettings {
            max_steps: 3,
            ..SolverSettings::default()
        };
        let result = integrate_with(&request(1.0, 0.0), &mut AdaptiveTsit5::new(settings));
        assert!(matches!(
            result,
            Err(MeniscusError::StepBudgetExhausted { .. })
        ));
    }
}
