use approx::assert_abs_diff_eq;
use meniscus_core::meniscus::large_radius_tcl_height;
use meniscus_core::profile::integrate;
use meniscus_core::root_finding::Bisection;
use meniscus_core::shooting::{shoot, shoot_meniscus, ShootingRequest};
use meniscus_core::MeniscusError;

fn request(theta: f64) -> ShootingRequest {
    ShootingRequest {
        z_min: -0.05,
        z_max: 1.55,
        pin_radius: 1e3,
        theta,
        delta_z: 1.8,
        num_point: 1800,
        slope_cutoff: 2e2,
    }
}

#[test]
fn height_large_radius() {
    for step in 0..9 {
        let theta = 10.0 * step as f64;
        let profile = shoot_meniscus(&request(theta)).expect("shot should converge");
        let expected = 2.0_f64.sqrt() * (1.0 - (theta * std::f64::consts::PI / 180.0).sin()).sqrt();
        // Two decimals, as numpy's assert_almost_equal(decimal=2).
        assert_abs_diff_eq!(profile.altitudes[0], expected, epsilon = 1.5e-2);
        assert_abs_diff_eq!(expected, large_radius_tcl_height(theta), epsilon = 1e-12);
    }
}

#[test]
fn converged_profile_is_monotonic_and_below_cutoff() {
    let req = request(50.0);
    let profile = shoot_meniscus(&req).unwrap();
    assert!(profile.altitudes.windows(2).all(|w| w[1] < w[0]));
    assert!(profile.len() <= req.num_point);
    assert!(profile
        .slopes()
        .iter()
        .all(|slope| slope.abs() <= req.slope_cutoff));
}

#[test]
fn generic_shooter_accepts_any_integration_closure() -> anyhow::Result<()> {
    let req = request(20.0);
    let direct = shoot(
        req.z_min,
        req.z_max,
        |tcl| integrate(&req.request_at(tcl)),
        &Bisection::default(),
    )?;
    let wrapped = shoot_meniscus(&req)?;
    assert_eq!(direct, wrapped);
    Ok(())
}

#[test]
fn bracket_above_the_solution_fails() {
    let req = ShootingRequest {
        z_min: 1.5,
        ..request(0.0)
    };
    let err = shoot_meniscus(&req).expect_err("bracket does not straddle the root");
    assert!(matches!(err, MeniscusError::BracketingFailure { .. }));
    assert!(err.to_string().contains("does not straddle a root"));
}
