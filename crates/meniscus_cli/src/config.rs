//! Run configuration: physical parameters plus numeric settings.
//!
//! Values come from an optional JSON file; command-line flags override them.

use anyhow::{Context, Result};
use meniscus_core::root_finding::BisectionSettings;
use meniscus_core::solvers::{OdeMethod, SolverSettings};
use meniscus_core::{IntegrationRequest, ShootingRequest};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Contact line altitude for a single integration.
    pub tcl_position: f64,
    pub pin_radius: f64,
    /// Contact angle in degrees.
    pub theta: f64,
    pub delta_z: f64,
    pub num_point: usize,
    pub slope_cutoff: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub method: OdeMethod,
    pub solver: SolverSettings,
    pub bisection: BisectionSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tcl_position: 1.0,
            pin_radius: 1e3,
            theta: 50.0,
            delta_z: 1.8,
            num_point: 1800,
            slope_cutoff: 2e2,
            z_min: 0.25,
            z_max: 1.55,
            method: OdeMethod::default(),
            solver: SolverSettings::default(),
            bisection: BisectionSettings::default(),
        }
    }
}

impl RunConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    pub fn integration_request(&self) -> IntegrationRequest {
        IntegrationRequest {
            tcl_position: self.tcl_position,
            pin_radius: self.pin_radius,
            theta: self.theta,
            delta_z: self.delta_z,
            num_point: self.num_point,
            slope_cutoff: self.slope_cutoff,
        }
    }

    pub fn shooting_request(&self) -> ShootingRequest {
        ShootingRequest {
            z_min: self.z_min,
            z_max: self.z_max,
            pin_radius: self.pin_radius,
            theta: self.theta,
            delta_z: self.delta_z,
            num_point: self.num_point,
            slope_cutoff: self.slope_cutoff,
        }
    }

    /// One-line description of the physical inputs, for error reports.
    pub fn describe(&self) -> String {
        format!(
            "pin_radius = {}, theta = {} deg, delta_z = {}, num_point = {}, slope_cutoff = {}",
            self.pin_radius, self.theta, self.delta_z, self.num_point, self.slope_cutoff
        )
    }
}

#[cfg(test)]
mod tests {
    use super::RunConfig;
    use meniscus_core::solvers::OdeMethod;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{ "theta": 20.0, "method": "rk4", "solver": { "rtol": 1e-6 } }"#)
                .expect("config should parse");
        assert_eq!(config.theta, 20.0);
        assert_eq!(config.method, OdeMethod::Rk4);
        assert_eq!(config.solver.rtol, 1e-6);
        assert_eq!(config.solver.atol, 1e-9);
        assert_eq!(config.pin_radius, 1e3);
    }

    #[test]
    fn requests_carry_the_physical_parameters() {
        let config = RunConfig {
            theta: 35.0,
            z_min: -0.05,
            ..RunConfig::default()
        };
        let shooting = config.shooting_request();
        assert_eq!(shooting.theta, 35.0);
        assert_eq!(shooting.z_min, -0.05);
        let single = config.integration_request();
        assert_eq!(single.tcl_position, config.tcl_position);
        assert_eq!(single.slope_cutoff, config.slope_cutoff);
        assert!(config.describe().contains("theta = 35 deg"));
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = RunConfig::from_file("/nonexistent/meniscus.json").expect_err("missing file");
        assert!(format!("{err}").contains("/nonexistent/meniscus.json"));
    }
}
