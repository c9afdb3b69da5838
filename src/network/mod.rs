//! Network reachability

pub mod probe;

pub use probe::{Reachability, TcpProbe};
