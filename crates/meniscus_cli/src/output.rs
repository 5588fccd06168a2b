use anyhow::Result;
use clap::ValueEnum;
use meniscus_core::meniscus::far_field_altitude;
use meniscus_core::shooting::{ShotSummary, SweepOutcome};
use meniscus_core::ProfileSample;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

#[derive(Serialize)]
struct ProfileReport<'a> {
    pin_radius: f64,
    theta: f64,
    far_field_deviation: Option<f64>,
    profile: &'a ProfileSample,
}

/// Writes a profile with the far-field reference `exp(-(r - R))` alongside.
pub fn write_profile<W: Write>(
    out: &mut W,
    format: OutputFormat,
    profile: &ProfileSample,
    pin_radius: f64,
    theta: f64,
) -> Result<()> {
    match format {
        OutputFormat::Csv => {
            writeln!(out, "z,r,slope,far_field_z")?;
            for (z, state) in profile.points() {
                writeln!(
                    out,
                    "{},{},{},{}",
                    z,
                    state.radius,
                    state.slope,
                    far_field_altitude(state.radius, pin_radius, 1.0)
                )?;
            }
        }
        OutputFormat::Json => {
            let report = ProfileReport {
                pin_radius,
                theta,
                far_field_deviation: profile.far_field_deviation(pin_radius),
                profile,
            };
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct SweepRow {
    theta: f64,
    #[serde(flatten)]
    summary: Option<ShotSummary>,
    error: Option<String>,
}

pub fn write_sweep<W: Write>(
    out: &mut W,
    format: OutputFormat,
    outcomes: &[SweepOutcome],
) -> Result<()> {
    let rows: Vec<SweepRow> = outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(summary) => SweepRow {
                theta: outcome.theta,
                summary: Some(*summary),
                error: None,
            },
            Err(err) => SweepRow {
                theta: outcome.theta,
                summary: None,
                error: Some(err.to_string()),
            },
        })
        .collect();

    match format {
        OutputFormat::Csv => {
            writeln!(
                out,
                "theta,tcl_altitude,expected_tcl_altitude,terminal_altitude,far_field_deviation,points,error"
            )?;
            for row in &rows {
                match (&row.summary, &row.error) {
                    (Some(s), _) => writeln!(
                        out,
                        "{},{},{},{},{},{},",
                        row.theta,
                        s.tcl_altitude,
                        s.expected_tcl_altitude,
                        s.terminal_altitude,
                        s.far_field_deviation,
                        s.points
                    )?,
                    (None, error) => writeln!(
                        out,
                        "{},,,,,,\"{}\"",
                        row.theta,
                        error.as_deref().unwrap_or_default().replace('"', "'")
                    )?,
                }
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &rows)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
