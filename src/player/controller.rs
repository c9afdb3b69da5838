//! Playback controller
//!
//! Owns every player invocation until it is reaped. Finished children are
//! collected before each new launch and the rest on shutdown. Serializes every
//! stop/play sequence behind one lock, so a channel change and an
//! assistant pause can never interleave. Ordering between a stop and the
//! following play relies on the settle delay, not on process completion.
//!
//! Retries after a failed launch are unbounded. An appliance with no
//! operator has nothing better to do than keep trying, but a permanently
//! broken player means `select` never returns.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::PlayerConfig;
use crate::error::PlayerError;
use crate::player::{PlaybackProcess, PlayerClient, PlayerCommand};
use crate::stations::{Station, StationRegistry};

/// Delays used around player commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerTimings {
    /// After `clear`, before the first `add`
    pub clear_delay: Duration,
    /// After each `add`
    pub add_delay: Duration,
    /// Between `stop` and `play`
    pub settle: Duration,
    /// Before retrying a failed operation
    pub retry_backoff: Duration,
}

impl PlayerTimings {
    pub fn from_config(config: &PlayerConfig) -> Self {
        Self {
            clear_delay: Duration::from_millis(config.clear_delay_ms),
            add_delay: Duration::from_millis(config.add_delay_ms),
            settle: Duration::from_millis(config.settle_ms),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// No delays at all
    pub fn immediate() -> Self {
        Self {
            clear_delay: Duration::ZERO,
            add_delay: Duration::ZERO,
            settle: Duration::ZERO,
            retry_backoff: Duration::ZERO,
        }
    }
}

impl Default for PlayerTimings {
    fn default() -> Self {
        Self::from_config(&PlayerConfig::default())
    }
}

/// Launch counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub commands_launched: u64,
    pub launch_failures: u64,
    pub retries: u64,
    /// Launched processes not yet reaped
    pub live_processes: usize,
}

/// Every player invocation that has not been reaped yet
#[derive(Default)]
struct Processes {
    /// Last stop/play invocation
    current: Option<PlaybackProcess>,
    /// Playlist edits and superseded stop/play invocations
    background: Vec<PlaybackProcess>,
}

impl Processes {
    /// Collect every finished child
    fn reap(&mut self) {
        if let Some(current) = self.current.as_mut() {
            current.reap();
        }
        self.background.retain_mut(|process| process.is_running());
    }

    fn replace_current(&mut self, process: PlaybackProcess) {
        if let Some(mut previous) = self.current.replace(process) {
            if previous.is_running() {
                self.background.push(previous);
            }
        }
    }

    fn push_background(&mut self, process: PlaybackProcess) {
        if process.has_child() {
            self.background.push(process);
        }
    }

    fn terminate_all(&mut self) {
        if let Some(mut process) = self.current.take() {
            tracing::info!("Terminating previous player process `{}`", process.command());
            process.terminate();
        }
        for mut process in self.background.drain(..) {
            process.terminate();
        }
    }

    fn live(&self) -> usize {
        self.background.len() + usize::from(self.current.as_ref().is_some_and(|p| p.has_child()))
    }
}

/// Drives the external player
pub struct PlaybackController {
    client: Arc<dyn PlayerClient>,
    timings: PlayerTimings,
    processes: Mutex<Processes>,
    paused: AtomicBool,
    commands_launched: AtomicU64,
    launch_failures: AtomicU64,
    retries: AtomicU64,
}

impl PlaybackController {
    pub fn new(client: Arc<dyn PlayerClient>, timings: PlayerTimings) -> Self {
        Self {
            client,
            timings,
            processes: Mutex::new(Processes::default()),
            paused: AtomicBool::new(false),
            commands_launched: AtomicU64::new(0),
            launch_failures: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    /// Launch a command and make it the current process handle
    fn launch(&self, processes: &mut Processes, command: PlayerCommand) -> Result<(), PlayerError> {
        let process = self.spawn(processes, command)?;
        processes.replace_current(process);
        Ok(())
    }

    /// Launch a command without replacing the current process handle
    fn launch_detached(&self, processes: &mut Processes, command: PlayerCommand) -> Result<(), PlayerError> {
        let process = self.spawn(processes, command)?;
        processes.push_background(process);
        Ok(())
    }

    fn spawn(&self, processes: &mut Processes, command: PlayerCommand) -> Result<PlaybackProcess, PlayerError> {
        processes.reap();

        match self.client.launch(&command) {
            Ok(process) => {
                self.commands_launched.fetch_add(1, Ordering::Relaxed);
                Ok(process)
            }
            Err(e) => {
                self.launch_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Replace the player's playlist with every station in registry order.
    ///
    /// Retries the whole sequence until every `add` launched. Returns the
    /// number of attempts taken.
    pub fn initialize(&self, registry: &StationRegistry) -> u32 {
        let mut processes = self.processes.lock();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            tracing::info!("Initializing playlist with {} stations (attempt {})", registry.len(), attempt);

            processes.terminate_all();

            if let Err(e) = self.launch_detached(&mut processes, PlayerCommand::Clear) {
                tracing::warn!("Failed to clear playlist: {}", e);
            }
            thread::sleep(self.timings.clear_delay);

            let mut failed = false;
            for station in registry.iter() {
                tracing::info!("Adding station {} (#{}) at {}", station.name, station.ordinal, station.url);
                if let Err(e) = self.launch_detached(&mut processes, PlayerCommand::Add(station.url.clone())) {
                    let e = PlayerError::AddFailed {
                        station: station.name.clone(),
                        reason: e.to_string(),
                    };
                    tracing::warn!("{}", e);
                    failed = true;
                }
                thread::sleep(self.timings.add_delay);
            }

            if !failed {
                tracing::info!("All stations added to the player");
                if let Err(e) = self.launch_detached(&mut processes, PlayerCommand::Playlist) {
                    tracing::warn!("Failed to list playlist: {}", e);
                }
                return attempt;
            }

            self.retries.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Not all stations were added, retrying in {:?}", self.timings.retry_backoff);
            thread::sleep(self.timings.retry_backoff);
        }
    }

    /// Stop whatever plays and start `station`.
    ///
    /// A failed stop is only logged. A failed play restarts the whole
    /// stop/settle/play sequence after the backoff. Returns the number of
    /// attempts taken.
    pub fn select(&self, station: &Station) -> u32 {
        let mut processes = self.processes.lock();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            tracing::info!("Playing {} (#{})", station.name, station.ordinal);

            if let Err(e) = self.launch(&mut processes, PlayerCommand::Stop) {
                tracing::warn!("Failed to stop playback: {}", e);
            }
            thread::sleep(self.timings.settle);

            match self.launch(&mut processes, PlayerCommand::Play(Some(station.ordinal))) {
                Ok(()) => {
                    self.paused.store(false, Ordering::SeqCst);
                    return attempt;
                }
                Err(e) => {
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        "Error playing {}: {}; retrying in {:?}",
                        station.name,
                        e,
                        self.timings.retry_backoff
                    );
                    thread::sleep(self.timings.retry_backoff);
                }
            }
        }
    }

    /// Stop playback for an assistant turn
    pub fn pause(&self) -> Result<(), PlayerError> {
        let mut processes = self.processes.lock();
        self.launch(&mut processes, PlayerCommand::Stop)?;
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Resume the playlist at its current position
    pub fn resume(&self) -> Result<(), PlayerError> {
        let mut processes = self.processes.lock();
        self.launch(&mut processes, PlayerCommand::Play(None))?;
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Terminate and reap every player process still held
    pub fn shutdown(&self) {
        self.processes.lock().terminate_all();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PlayerStats {
        PlayerStats {
            commands_launched: self.commands_launched.load(Ordering::Relaxed),
            launch_failures: self.launch_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            live_processes: self.processes.lock().live(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;
    use crate::player::testing::RecordingClient;

    fn controller() -> (Arc<RecordingClient>, PlaybackController) {
        let client = Arc::new(RecordingClient::new());
        let controller = PlaybackController::new(client.clone(), PlayerTimings::immediate());
        (client, controller)
    }

    fn registry() -> StationRegistry {
        StationRegistry::from_channels(&ChannelConfig::reference_table()).unwrap()
    }

    #[test]
    fn test_initialize_adds_in_order() {
        let (client, controller) = controller();
        let registry = registry();

        assert_eq!(controller.initialize(&registry), 1);

        let launched = client.launched();
        assert_eq!(launched.first(), Some(&PlayerCommand::Clear));
        assert_eq!(launched.last(), Some(&PlayerCommand::Playlist));
        let urls: Vec<&PlayerCommand> = launched[1..launched.len() - 1].iter().collect();
        let expected: Vec<PlayerCommand> =
            registry.iter().map(|s| PlayerCommand::Add(s.url.clone())).collect();
        assert_eq!(urls, expected.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_initialize_retries_whole_sequence() {
        let (client, controller) = controller();
        let registry = registry();
        client.fail(PlayerCommand::Add("http://stream.novafm.dk/nova128".into()), 2);

        assert_eq!(controller.initialize(&registry), 3);

        let launched = client.launched();
        let clears = launched.iter().filter(|c| **c == PlayerCommand::Clear).count();
        assert_eq!(clears, 3);
        // Ordinals are unaffected by retries
        assert_eq!(registry.ordinal("NOVA"), Ok(5));
        assert_eq!(controller.stats().retries, 2);
    }

    #[test]
    fn test_select_issues_stop_then_play() {
        let (client, controller) = controller();
        let registry = registry();
        let station = registry.iter().nth(3).unwrap();

        assert_eq!(controller.select(station), 1);
        assert_eq!(
            client.launched(),
            vec![PlayerCommand::Stop, PlayerCommand::Play(Some(4))]
        );
    }

    #[test]
    fn test_select_tolerates_failed_stop() {
        let (client, controller) = controller();
        let registry = registry();
        client.fail(PlayerCommand::Stop, 1);

        assert_eq!(controller.select(registry.iter().next().unwrap()), 1);
        assert_eq!(client.launched(), vec![PlayerCommand::Play(Some(1))]);
    }

    #[test]
    fn test_select_retries_failed_play() {
        let (client, controller) = controller();
        let registry = registry();
        client.fail(PlayerCommand::Play(Some(2)), 2);

        assert_eq!(controller.select(registry.iter().nth(1).unwrap()), 3);
        assert_eq!(
            client.launched(),
            vec![
                PlayerCommand::Stop,
                PlayerCommand::Stop,
                PlayerCommand::Stop,
                PlayerCommand::Play(Some(2)),
            ]
        );
        assert_eq!(controller.stats().launch_failures, 2);
    }

    #[test]
    fn test_pause_resume() {
        let (client, controller) = controller();

        controller.pause().unwrap();
        assert!(controller.is_paused());
        controller.resume().unwrap();
        assert!(!controller.is_paused());

        assert_eq!(
            client.launched(),
            vec![PlayerCommand::Stop, PlayerCommand::Play(None)]
        );
    }

    #[test]
    fn test_pause_failure_reported() {
        let (client, controller) = controller();
        client.fail(PlayerCommand::Stop, 1);

        assert!(controller.pause().is_err());
        assert!(!controller.is_paused());
    }

    /// Real `true` launches, remembering every child pid
    #[cfg(target_os = "linux")]
    struct PidClient {
        inner: crate::player::MpcClient,
        pids: parking_lot::Mutex<Vec<u32>>,
    }

    #[cfg(target_os = "linux")]
    impl PlayerClient for PidClient {
        fn launch(&self, command: &PlayerCommand) -> Result<PlaybackProcess, PlayerError> {
            let process = self.inner.launch(command)?;
            if let Some(pid) = process.id() {
                self.pids.lock().push(pid);
            }
            Ok(process)
        }
    }

    #[cfg(target_os = "linux")]
    fn pid_controller() -> (Arc<PidClient>, PlaybackController) {
        let client = Arc::new(PidClient {
            inner: crate::player::MpcClient::new("true", Vec::new()),
            pids: parking_lot::Mutex::new(Vec::new()),
        });
        let controller = PlaybackController::new(client.clone(), PlayerTimings::immediate());
        (client, controller)
    }

    #[cfg(target_os = "linux")]
    fn is_zombie_child(pid: u32) -> bool {
        let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) else {
            return false;
        };
        let Some(rest) = stat.rsplit_once(')').map(|(_, rest)| rest) else {
            return false;
        };
        let fields: Vec<&str> = rest.split_whitespace().collect();
        fields.first() == Some(&"Z") && fields.get(1) == Some(&std::process::id().to_string().as_str())
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_shutdown_leaves_no_zombies() {
        let (client, controller) = pid_controller();
        let registry = registry();

        for _ in 0..3 {
            controller.initialize(&registry);
        }
        controller.select(registry.iter().next().unwrap());
        controller.shutdown();

        let pids = client.pids.lock().clone();
        assert_eq!(pids.len(), 3 * (registry.len() + 2) + 2);
        let zombies: Vec<u32> = pids.into_iter().filter(|pid| is_zombie_child(*pid)).collect();
        assert!(zombies.is_empty(), "unreaped children: {:?}", zombies);
        assert_eq!(controller.stats().live_processes, 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_finished_children_reaped_on_next_launch() {
        let (_client, controller) = pid_controller();
        controller.initialize(&registry());

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            controller.pause().unwrap();
            // Only the stop just launched may still be outstanding
            if controller.stats().live_processes <= 1 {
                break;
            }
            assert!(std::time::Instant::now() < deadline, "children never reaped");
            thread::sleep(Duration::from_millis(10));
        }
        controller.shutdown();
    }
}
