//! Channel registry: stations in playlist order

pub mod registry;

pub use registry::{Station, StationRegistry};
