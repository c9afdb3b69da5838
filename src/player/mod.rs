//! External player control

pub mod client;
pub mod controller;

pub use client::{MpcClient, PlaybackProcess, PlayerClient, PlayerCommand};
pub use controller::{PlaybackController, PlayerTimings, PlayerStats};
