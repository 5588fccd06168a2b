pub mod error;
pub mod meniscus;
pub mod profile;
pub mod root_finding;
pub mod shooting;
pub mod solvers;
/// The `meniscus_core` crate computes the shape of a liquid meniscus around a
/// vertical cylindrical pin.
///
/// Key components:
/// - **Traits**: `Scalar`, `DynamicalSystem`, `Steppable`, plus the `GridIntegrator`
///   and `BracketSolver` strategies used by the shooting method.
/// - **Meniscus**: the governing ODE `r'' = z (1 + r'^2)^(3/2) + (1 + r'^2) / r`.
/// - **Solvers**: RK4 and Tsit5 steppers, adaptive Tsit5 on an output grid.
/// - **Profile**: integration from a trial contact line with slope-cutoff truncation.
/// - **Shooting**: bisection on the contact line altitude for a flat far field.
pub mod traits;

pub use error::{MeniscusError, Result};
pub use meniscus::MeniscusState;
pub use profile::{integrate, IntegrationRequest, ProfileSample};
pub use shooting::{shoot, shoot_meniscus, ShootingRequest};
