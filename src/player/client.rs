//! External media-player command client
//!
//! Every command is a fire-and-forget subprocess launch. Only launch
//! success is checked. Exit codes are collected with `try_wait` when the
//! child is reaped, never awaited.

use std::fmt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use crate::config::PlayerConfig;
use crate::error::PlayerError;

/// Commands understood by the player control tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    Clear,
    Add(String),
    Playlist,
    Stop,
    /// Play from a 1-based playlist position, or resume when `None`
    Play(Option<usize>),
}

impl PlayerCommand {
    pub fn args(&self) -> Vec<String> {
        match self {
            PlayerCommand::Clear => vec!["clear".into()],
            PlayerCommand::Add(url) => vec!["add".into(), url.clone()],
            PlayerCommand::Playlist => vec!["playlist".into()],
            PlayerCommand::Stop => vec!["stop".into()],
            PlayerCommand::Play(None) => vec!["play".into()],
            PlayerCommand::Play(Some(ordinal)) => vec!["play".into(), ordinal.to_string()],
        }
    }
}

impl fmt::Display for PlayerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args().join(" "))
    }
}

/// Handle to the most recently launched player invocation
pub struct PlaybackProcess {
    command: PlayerCommand,
    child: Option<Child>,
}

impl PlaybackProcess {
    pub fn spawned(command: PlayerCommand, child: Child) -> Self {
        Self {
            command,
            child: Some(child),
        }
    }

    /// A handle with no OS process behind it
    pub fn detached(command: PlayerCommand) -> Self {
        Self {
            command,
            child: None,
        }
    }

    pub fn command(&self) -> &PlayerCommand {
        &self.command
    }

    /// OS process id, while the child has not been reaped
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn has_child(&self) -> bool {
        self.child.is_some()
    }

    /// Reap the child if it finished and report whether it still runs
    pub fn is_running(&mut self) -> bool {
        self.reap();
        self.child.is_some()
    }

    /// Collect the exit status if the process already finished
    pub fn reap(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if let Ok(Some(status)) = child.try_wait() {
                tracing::trace!("`{}` exited with {}", self.command, status);
                self.child = None;
            }
        }
    }

    /// Kill the process if it is still running
    pub fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                tracing::debug!("Terminating `{}`", self.command);
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

/// Launches player commands
pub trait PlayerClient: Send + Sync {
    fn launch(&self, command: &PlayerCommand) -> Result<PlaybackProcess, PlayerError>;
}

/// `mpc`-style command line client
pub struct MpcClient {
    program: PathBuf,
    args: Vec<String>,
}

impl MpcClient {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }
}

impl PlayerClient for MpcClient {
    fn launch(&self, command: &PlayerCommand) -> Result<PlaybackProcess, PlayerError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .args(command.args())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| PlayerError::LaunchFailed {
                command: command.to_string(),
                reason: format!("{}: {}", self.program.display(), e),
            })?;
        Ok(PlaybackProcess::spawned(command.clone(), child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_args() {
        assert_eq!(PlayerCommand::Play(Some(4)).args(), vec!["play", "4"]);
        assert_eq!(PlayerCommand::Play(None).to_string(), "play");
        assert_eq!(
            PlayerCommand::Add("http://stream.anr.dk/anr".into()).to_string(),
            "add http://stream.anr.dk/anr"
        );
    }

    #[test]
    fn test_missing_program_is_launch_failure() {
        let client = MpcClient::new("/nonexistent/rotary-radio/mpc", Vec::new());
        let err = client.launch(&PlayerCommand::Stop).err().unwrap();
        assert!(matches!(err, PlayerError::LaunchFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_spawned_process_terminates() {
        let client = MpcClient::new("sleep", Vec::new());
        // `sleep play` fails fast, which is fine: only the launch matters
        let mut process = client.launch(&PlayerCommand::Play(None)).unwrap();
        assert_eq!(process.command(), &PlayerCommand::Play(None));
        process.terminate();
        process.reap();
    }
}
