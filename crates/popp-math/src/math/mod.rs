//! Core math modules.

pub mod gamma;
pub mod spectral;
pub mod stable;
