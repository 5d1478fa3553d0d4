//! Numerical building blocks for Poisson rate models.

pub mod math;

pub use math::gamma::*;
pub use math::spectral;
pub use math::stable::log_gamma;
