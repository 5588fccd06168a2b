//! Governing equation of a meniscus around a vertical cylindrical pin.
//!
//! Lengths are in units of the capillary length. The interface is described
//! by its distance `r` to the pin axis as a function of the altitude `z`
//! measured from the flat far-field level.

use crate::error::{MeniscusError, Result};
use crate::traits::{DynamicalSystem, Scalar};
use serde::{Deserialize, Serialize};

/// Radius of the interface and its derivative `dr/dz` at one altitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeniscusState {
    pub radius: f64,
    pub slope: f64,
}

impl MeniscusState {
    pub fn new(radius: f64, slope: f64) -> Self {
        Self { radius, slope }
    }

    /// State at the contact line for a contact angle in degrees.
    pub fn at_contact_line(pin_radius: f64, theta_deg: f64) -> Self {
        Self {
            radius: pin_radius,
            slope: -theta_deg.to_radians().tan(),
        }
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.radius, self.slope]
    }

    pub fn from_slice(values: &[f64]) -> Self {
        Self {
            radius: values[0],
            slope: values[1],
        }
    }
}

/// The meniscus ODE as a first-order system in `[r, r']`:
///
/// `r'' = z (1 + r'^2)^(3/2) + (1 + r'^2) / r`
#[derive(Debug, Clone, Copy, Default)]
pub struct MeniscusPinOde;

impl<T: Scalar> DynamicalSystem<T> for MeniscusPinOde {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) -> Result<()> {
        let radius = x[0];
        let slope = x[1];
        if !(radius > T::zero()) || !radius.is_finite() {
            return Err(MeniscusError::DomainViolation {
                altitude: t.to_f64().unwrap_or(f64::NAN),
                radius: radius.to_f64().unwrap_or(f64::NAN),
            });
        }
        let stretch = T::one() + slope * slope;
        out[0] = slope;
        out[1] = t * stretch * stretch.sqrt() + stretch / radius;
        Ok(())
    }
}

/// Evaluates `(dr/dz, d2r/dz2)` at altitude `z`.
pub fn meniscus_pin_ode(z: f64, state: MeniscusState) -> Result<[f64; 2]> {
    let mut out = [0.0; 2];
    DynamicalSystem::<f64>::apply(&MeniscusPinOde, z, &state.to_array(), &mut out)?;
    Ok(out)
}

/// Contact line altitude for a pin much larger than the capillary length.
pub fn large_radius_tcl_height(theta_deg: f64) -> f64 {
    2.0_f64.sqrt() * (1.0 - theta_deg.to_radians().sin()).sqrt()
}

/// Far-field profile `z = amplitude * exp(-(r - R))` of a flat-wall meniscus.
pub fn far_field_altitude(radius: f64, pin_radius: f64, amplitude: f64) -> f64 {
    amplitude * (-(radius - pin_radius)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn vector_field_matches_closed_form() {
        let state = MeniscusState::new(2.0, -1.0);
        let [slope, curvature] = meniscus_pin_ode(0.5, state).unwrap();
        assert_eq!(slope, -1.0);
        let expected = 0.5 * 2.0_f64.powf(1.5) + 2.0 / 2.0;
        assert_relative_eq!(curvature, expected, epsilon = 1e-14);
    }

    #[test]
    fn vector_field_rejects_non_positive_radius() {
        for radius in [0.0, -1.0, f64::NAN] {
            let result = meniscus_pin_ode(0.3, MeniscusState::new(radius, 0.0));
            match result {
                Err(MeniscusError::DomainViolation { altitude, .. }) => {
                    assert_eq!(altitude, 0.3)
                }
                other => panic!("expected domain violation, got {other:?}"),
            }
        }
    }

    #[test]
    fn contact_line_slope_follows_contact_angle() {
        let flat = MeniscusState::at_contact_line(1000.0, 0.0);
        assert_eq!(flat.slope, 0.0);
        assert_eq!(flat.radius, 1000.0);

        let tilted = MeniscusState::at_contact_line(1.0, 45.0);
        assert_relative_eq!(tilted.slope, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn large_radius_height_limits() {
        assert_relative_eq!(large_radius_tcl_height(0.0), 2.0_f64.sqrt());
        assert_relative_eq!(large_radius_tcl_height(90.0), 0.0, epsilon = 1e-8);
        assert_relative_eq!(large_radius_tcl_height(30.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn far_field_decays_from_the_pin() {
        assert_relative_eq!(far_field_altitude(10.0, 10.0, 1.0), 1.0);
        assert_relative_eq!(far_field_altitude(11.0, 10.0, 2.0), 2.0 * (-1.0f64).exp());
    }
}
