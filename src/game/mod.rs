//! Race simulation: lifecycle, tick loop, physics and registry

pub mod physics;
pub mod race;
pub mod registry;
pub mod results;

pub use race::RaceSummary;
pub use registry::{RaceRegistry, RegistryError};
pub use results::RaceResults;
