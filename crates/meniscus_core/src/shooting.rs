//! Shooting method for the contact line altitude.
//!
//! The far-field condition (the interface flattens at `z = 0`) is met by
//! bisecting on the trial contact line altitude until the lowest altitude
//! reached by the integrated profile changes sign.

use crate::error::{MeniscusError, Result};
use crate::meniscus::large_radius_tcl_height;
use crate::profile::{integrate_with, IntegrationRequest, ProfileSample};
use crate::root_finding::{Bisection, BisectionSettings};
use crate::solvers::{AdaptiveTsit5, OdeMethod, SolverSettings};
use crate::traits::{BracketSolver, GridIntegrator};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Search bracket plus the physical parameters held fixed while shooting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShootingRequest {
    pub z_min: f64,
    pub z_max: f64,
    pub pin_radius: f64,
    /// Contact angle in degrees.
    pub theta: f64,
    pub delta_z: f64,
    pub num_point: usize,
    pub slope_cutoff: f64,
}

impl Default for ShootingRequest {
    fn default() -> Self {
        Self {
            z_min: -0.05,
            z_max: 1.55,
            pin_radius: 1e3,
            theta: 0.0,
            delta_z: 1.8,
            num_point: 1800,
            slope_cutoff: 2e2,
        }
    }
}

impl ShootingRequest {
    /// Integration request for one trial contact line altitude.
    pub fn request_at(&self, tcl_position: f64) -> IntegrationRequest {
        IntegrationRequest {
            tcl_position,
            pin_radius: self.pin_radius,
            theta: self.theta,
            delta_z: self.delta_z,
            num_point: self.num_point,
            slope_cutoff: self.slope_cutoff,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.z_min.is_finite() || !self.z_max.is_finite() || self.z_min >= self.z_max {
            return Err(MeniscusError::InvalidRequest(format!(
                "bracket [{}, {}] must be finite with z_min < z_max",
                self.z_min, self.z_max
            )));
        }
        self.request_at(self.z_min).validate()
    }
}

/// Bisects on the trial altitude until the terminal altitude of
/// `integrate_fn` vanishes, then returns the profile at the converged
/// altitude.
///
/// An empty profile at any trial altitude aborts the search with
/// [`MeniscusError::EmptyProfile`]; other failures are wrapped in
/// [`MeniscusError::Trial`].
pub fn shoot<F, B>(
    lower: f64,
    upper: f64,
    mut integrate_fn: F,
    root_finder: &B,
) -> Result<ProfileSample>
where
    F: FnMut(f64) -> Result<ProfileSample>,
    B: BracketSolver,
{
    let mut run = |tcl_position: f64| -> Result<ProfileSample> {
        integrate_fn(tcl_position).map_err(|source| MeniscusError::Trial {
            tcl_position,
            source: Box::new(source),
        })
    };

    let root = root_finder.solve(
        |tcl_position| {
            run(tcl_position)?
                .terminal_altitude()
                .ok_or(MeniscusError::EmptyProfile { tcl_position })
        },
        lower,
        upper,
    )?;

    log::debug!(
        "shooting converged at z = {} after {} iterations (terminal altitude {:e})",
        root.x,
        root.iterations,
        root.residual
    );
    run(root.x)
}

/// Shoots the meniscus with the default solver and bisection settings.
pub fn shoot_meniscus(request: &ShootingRequest) -> Result<ProfileSample> {
    shoot_meniscus_with(request, &mut AdaptiveTsit5::default(), &Bisection::default())
}

pub fn shoot_meniscus_with<I, B>(
    request: &ShootingRequest,
    integrator: &mut I,
    root_finder: &B,
) -> Result<ProfileSample>
where
    I: GridIntegrator<f64>,
    B: BracketSolver,
{
    request.validate()?;
    let profile = shoot(
        request.z_min,
        request.z_max,
        |tcl_position| integrate_with(&request.request_at(tcl_position), &mut *integrator),
        root_finder,
    )?;
    log::debug!(
        "theta = {}: contact line at z = {:?}, {} points",
        request.theta,
        profile.tcl_altitude(),
        profile.len()
    );
    Ok(profile)
}

/// Converged contact line of one shot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotSummary {
    pub tcl_altitude: f64,
    pub terminal_altitude: f64,
    /// Large-radius prediction `sqrt(2 (1 - sin theta))`.
    pub expected_tcl_altitude: f64,
    /// Largest gap to the far-field profile `exp(-(r - R))`.
    pub far_field_deviation: f64,
    pub points: usize,
}

impl ShotSummary {
    pub fn from_profile(profile: &ProfileSample, request: &ShootingRequest) -> Result<Self> {
        let (Some(tcl_altitude), Some(terminal_altitude), Some(far_field_deviation)) = (
            profile.tcl_altitude(),
            profile.terminal_altitude(),
            profile.far_field_deviation(request.pin_radius),
        ) else {
            return Err(MeniscusError::InvalidRequest(format!(
                "cannot summarize an empty profile (theta = {} deg)",
                request.theta
            )));
        };
        Ok(Self {
            tcl_altitude,
            terminal_altitude,
            expected_tcl_altitude: large_radius_tcl_height(request.theta),
            far_field_deviation,
            points: profile.len(),
        })
    }
}

#[derive(Debug)]
pub struct SweepOutcome {
    pub theta: f64,
    pub result: Result<ShotSummary>,
}

/// Shoots every contact angle independently, in parallel, with the default
/// solver and bisection settings.
pub fn sweep_contact_angles(base: &ShootingRequest, thetas: &[f64]) -> Vec<SweepOutcome> {
    sweep_contact_angles_with(
        base,
        thetas,
        OdeMethod::default(),
        SolverSettings::default(),
        BisectionSettings::default(),
    )
}

pub fn sweep_contact_angles_with(
    base: &ShootingRequest,
    thetas: &[f64],
    method: OdeMethod,
    solver: SolverSettings,
    bisection: BisectionSettings,
) -> Vec<SweepOutcome> {
    thetas
        .par_iter()
        .map(|&theta| {
            let request = ShootingRequest { theta, ..*base };
            let mut integrator = method.build(solver);
            let result = shoot_meniscus_with(&request, &mut integrator, &Bisection::new(bisection))
                .and_then(|profile| ShotSummary::from_profile(&profile, &request));
            SweepOutcome { theta, result }
        })
        .collect()
}
