//! Error types for the radio appliance

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Player error: {0}")]
    Player(#[from] PlayerError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Connectivity error: {0}")]
    Connectivity(#[from] ConnectivityError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Digital input line errors
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Line {pin} setup failed: {reason}")]
    SetupFailed { pin: u32, reason: String },

    #[error("Line {pin} read failed: {reason}")]
    ReadFailed { pin: u32, reason: String },

    #[error("Line {0} is not configured")]
    NotConfigured(u32),

    #[error("Unexpected line value {value:?} on line {pin}")]
    InvalidValue { pin: u32, value: String },

    #[error("Edge source failed: {0}")]
    EdgeSource(String),
}

/// External player errors
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Failed to launch `{command}`: {reason}")]
    LaunchFailed { command: String, reason: String },

    #[error("Failed to add station {station}: {reason}")]
    AddFailed { station: String, reason: String },
}

/// Channel registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Unknown station: {0}")]
    UnknownStation(String),

    #[error("Station already registered: {0}")]
    Duplicate(String),
}

/// Connectivity probe errors
#[derive(Error, Debug)]
pub enum ConnectivityError {
    #[error("Failed to resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("No addresses found for {0}")]
    NoAddress(String),

    #[error("Connection to {addr} failed: {reason}")]
    ConnectFailed { addr: String, reason: String },
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
