//! Recovery loop
//!
//! The supervisor owns every resource of a run ("generation"). Any fatal
//! failure tears the generation down completely and starts a fresh one;
//! nothing from the failed generation is carried over.

pub mod runner;

pub use runner::{Backends, GenerationOutcome, Supervisor};

use std::fmt;

/// A fatal failure reported by a worker thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub source: &'static str,
    pub message: String,
}

impl Fault {
    pub fn new(source: &'static str, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

/// Why a cold restart happens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartReason {
    /// Connectivity check failed before playback was initialized
    Unreachable,
    Fault(Fault),
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartReason::Unreachable => write!(f, "no network connection"),
            RestartReason::Fault(fault) => write!(f, "fault in {}", fault),
        }
    }
}

/// Supervisor lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorState {
    Probing,
    Initializing,
    Running,
    Restarting(RestartReason),
    Stopped,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorState::Probing => write!(f, "probing"),
            SupervisorState::Initializing => write!(f, "initializing"),
            SupervisorState::Running => write!(f, "running"),
            SupervisorState::Restarting(_) => write!(f, "restarting"),
            SupervisorState::Stopped => write!(f, "stopped"),
        }
    }
}
