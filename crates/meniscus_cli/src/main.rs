//! Meniscus on a pin
//!
//! Integrates the meniscus profile around a cylindrical pin and shoots for
//! the contact line altitude that gives a flat far field.

mod config;
mod output;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use meniscus_core::profile::integrate_with;
use meniscus_core::root_finding::Bisection;
use meniscus_core::shooting::{shoot_meniscus_with, sweep_contact_angles_with, ShotSummary};

use config::RunConfig;
use output::{write_profile, write_sweep, OutputFormat};

/// Equilibrium meniscus around a cylindrical pin
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format written to stdout
    #[arg(long, value_enum, default_value = "csv", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Integrate one profile from a fixed contact line altitude
    Integrate {
        /// Altitude of the contact line
        #[arg(long, allow_hyphen_values = true)]
        tcl_position: Option<f64>,

        #[command(flatten)]
        physical: PhysicalArgs,
    },
    /// Shoot for the contact line altitude at one contact angle
    Shoot {
        #[command(flatten)]
        bracket: BracketArgs,

        #[command(flatten)]
        physical: PhysicalArgs,
    },
    /// Shoot several contact angles in parallel
    Sweep {
        /// Contact angles in degrees, comma separated
        #[arg(long, value_delimiter = ',', default_value = "0,10,20,30,40,50,60,70,80")]
        thetas: Vec<f64>,

        #[command(flatten)]
        bracket: BracketArgs,

        #[command(flatten)]
        physical: PhysicalArgs,
    },
}

#[derive(Args, Debug)]
struct PhysicalArgs {
    /// Pin radius, in capillary lengths
    #[arg(long)]
    pin_radius: Option<f64>,

    /// Contact angle in degrees
    #[arg(long)]
    theta: Option<f64>,

    /// Height integrated below the contact line
    #[arg(long)]
    delta_z: Option<f64>,

    /// Number of altitude samples
    #[arg(long)]
    num_point: Option<usize>,

    /// Largest |dr/dz| kept in the profile
    #[arg(long)]
    slope_cutoff: Option<f64>,
}

#[derive(Args, Debug)]
struct BracketArgs {
    /// Lower bound of the contact line altitude
    #[arg(long, allow_hyphen_values = true)]
    z_min: Option<f64>,

    /// Upper bound of the contact line altitude
    #[arg(long, allow_hyphen_values = true)]
    z_max: Option<f64>,
}

impl PhysicalArgs {
    fn apply(&self, config: &mut RunConfig) {
        if let Some(value) = self.pin_radius {
            config.pin_radius = value;
        }
        if let Some(value) = self.theta {
            config.theta = value;
        }
        if let Some(value) = self.delta_z {
            config.delta_z = value;
        }
        if let Some(value) = self.num_point {
            config.num_point = value;
        }
        if let Some(value) = self.slope_cutoff {
            config.slope_cutoff = value;
        }
    }
}

impl BracketArgs {
    fn apply(&self, config: &mut RunConfig) {
        if let Some(value) = self.z_min {
            config.z_min = value;
        }
        if let Some(value) = self.z_max {
            config.z_max = value;
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let config = RunConfig::from_file(path)?;
            log::info!("Loaded config from {}", path.display());
            config
        }
        None => RunConfig::default(),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Command::Integrate {
            tcl_position,
            physical,
        } => {
            physical.apply(&mut config);
            if let Some(value) = tcl_position {
                config.tcl_position = *value;
            }
            run_integrate(&config, cli.format, &mut out)?;
        }
        Command::Shoot { bracket, physical } => {
            physical.apply(&mut config);
            bracket.apply(&mut config);
            run_shoot(&config, cli.format, &mut out)?;
        }
        Command::Sweep {
            thetas,
            bracket,
            physical,
        } => {
            physical.apply(&mut config);
            bracket.apply(&mut config);
            run_sweep(&config, thetas, cli.format, &mut out)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn run_integrate<W: Write>(config: &RunConfig, format: OutputFormat, out: &mut W) -> Result<()> {
    let request = config.integration_request();
    let mut integrator = config.method.build(config.solver);
    let profile = integrate_with(&request, &mut integrator).with_context(|| {
        format!(
            "Integration from z = {} failed ({})",
            config.tcl_position,
            config.describe()
        )
    })?;

    log::info!(
        "Integrated {} of {} points from z = {}",
        profile.len(),
        request.num_point,
        request.tcl_position
    );
    write_profile(out, format, &profile, config.pin_radius, config.theta)
}

fn run_shoot<W: Write>(config: &RunConfig, format: OutputFormat, out: &mut W) -> Result<()> {
    let request = config.shooting_request();
    let mut integrator = config.method.build(config.solver);
    let bisection = Bisection::new(config.bisection);
    let profile = shoot_meniscus_with(&request, &mut integrator, &bisection).with_context(|| {
        format!(
            "Shooting over bracket [{}, {}] failed ({})",
            config.z_min,
            config.z_max,
            config.describe()
        )
    })?;

    let summary = ShotSummary::from_profile(&profile, &request)?;
    log::info!(
        "Contact line at z = {:.6} for theta = {} deg (expected {:.6}, far-field deviation {:.3e}, {} points)",
        summary.tcl_altitude,
        config.theta,
        summary.expected_tcl_altitude,
        summary.far_field_deviation,
        summary.points
    );
    write_profile(out, format, &profile, config.pin_radius, config.theta)
}

fn run_sweep<W: Write>(
    config: &RunConfig,
    thetas: &[f64],
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    let base = config.shooting_request();
    let outcomes =
        sweep_contact_angles_with(&base, thetas, config.method, config.solver, config.bisection);
    write_sweep(out, format, &outcomes)?;

    let failures: Vec<_> = outcomes.iter().filter(|o| o.result.is_err()).collect();
    for failure in &failures {
        if let Err(err) = &failure.result {
            log::error!("theta = {} deg: {}", failure.theta, err);
        }
    }
    if !failures.is_empty() {
        bail!(
            "{} of {} shots failed over bracket [{}, {}] ({})",
            failures.len(),
            outcomes.len(),
            config.z_min,
            config.z_max,
            config.describe()
        );
    }
    log::info!("Swept {} contact angles", outcomes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{run_integrate, run_shoot, run_sweep};
    use crate::config::RunConfig;
    use crate::output::OutputFormat;

    #[test]
    fn integrate_writes_one_csv_row_per_point() {
        let config = RunConfig {
            tcl_position: 1.0,
            theta: 0.0,
            delta_z: 0.1,
            num_point: 20,
            ..RunConfig::default()
        };
        let mut buffer = Vec::new();
        run_integrate(&config, OutputFormat::Csv, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "z,r,slope,far_field_z");
        assert_eq!(lines.len(), 21);
        assert!(lines[1].starts_with("1,1000,"));
    }

    #[test]
    fn shoot_failure_names_the_bracket_and_parameters() {
        let config = RunConfig {
            theta: 0.0,
            z_min: 1.5,
            z_max: 1.55,
            ..RunConfig::default()
        };
        let mut buffer = Vec::new();
        let err = run_shoot(&config, OutputFormat::Csv, &mut buffer).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("bracket [1.5, 1.55]"), "{message}");
        assert!(message.contains("pin_radius = 1000"), "{message}");
        assert!(message.contains("theta = 0 deg"), "{message}");
        assert!(message.contains("does not straddle a root"), "{message}");
        assert!(buffer.is_empty());
    }

    #[test]
    fn sweep_reports_rows_before_failing() {
        let config = RunConfig {
            slope_cutoff: 1.0,
            ..RunConfig::default()
        };
        let mut buffer = Vec::new();
        let err = run_sweep(&config, &[60.0], OutputFormat::Csv, &mut buffer).unwrap_err();
        assert!(err.to_string().contains("1 of 1 shots failed"), "{err}");
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().starts_with("60,,"));
    }
}
