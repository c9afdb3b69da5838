//! Supervisor state machine
//!
//! ```text
//!  Probing ──unreachable──────────────────────────┐
//!     │                                           ▼
//!     └─► Initializing ──► Running ──fault──► Restarting ──► Probing
//!                             │
//!                             └──shutdown──► Stopped
//! ```

use crossbeam_channel::{bounded, select, unbounded, Receiver, RecvTimeoutError, Sender};
use std::ffi::OsString;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::assistant::{AssistantEvent, AssistantHook};
use crate::config::{AppConfig, RestartMode};
use crate::error::{Error, Result};
use crate::input::{self, EdgeEvent, EdgeMonitor, InputLines};
use crate::network::{Reachability, TcpProbe};
use crate::player::{MpcClient, PlaybackController, PlayerClient, PlayerTimings};
use crate::selector::{ChannelTable, SelectionEngine, SelectionOutcome, VoteConfig};
use crate::stations::StationRegistry;
use crate::status::StatusBoard;
use crate::supervisor::{Fault, RestartReason, SupervisorState};

/// External collaborators the supervisor drives
#[derive(Clone)]
pub struct Backends {
    pub lines: Arc<dyn InputLines>,
    pub player: Arc<dyn PlayerClient>,
    pub probe: Arc<dyn Reachability>,
}

impl Backends {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            lines: input::create_lines(&config.input),
            player: Arc::new(MpcClient::from_config(&config.player)),
            probe: Arc::new(TcpProbe::from_config(&config.connectivity)),
        }
    }
}

/// How one generation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Restart(RestartReason),
    Shutdown,
}

/// Resources owned by one generation
struct Generation {
    lines: Arc<dyn InputLines>,
    player: Arc<PlaybackController>,
    monitor: Option<EdgeMonitor>,
    workers: Vec<JoinHandle<()>>,
    stop_tx: Option<Sender<()>>,
}

impl Generation {
    fn teardown(mut self) {
        // Disconnecting the stop channel wakes every worker
        self.stop_tx.take();
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                tracing::warn!("Worker {} panicked during teardown", name);
            }
        }
        self.player.shutdown();
        self.lines.cleanup();
        tracing::info!("Released input lines and player process");
    }
}

/// Top-level recovery loop
pub struct Supervisor {
    config: Arc<AppConfig>,
    backends: Backends,
    status: StatusBoard,
    shutdown: Receiver<()>,
    assistant_events: Option<Receiver<AssistantEvent>>,
    launch_args: Vec<OsString>,
    state: SupervisorState,
    generation: u64,
    restarts: u64,
}

impl Supervisor {
    pub fn new(
        config: Arc<AppConfig>,
        backends: Backends,
        status: StatusBoard,
        shutdown: Receiver<()>,
    ) -> Self {
        status.update(|s| {
            s.device_model = config.device.model_id.clone();
            s.assistant_enabled = config.assistant.enabled;
        });
        Self {
            config,
            backends,
            status,
            shutdown,
            assistant_events: None,
            launch_args: std::env::args_os().skip(1).collect(),
            state: SupervisorState::Probing,
            generation: 0,
            restarts: 0,
        }
    }

    /// Route assistant events to each generation's hook
    pub fn with_assistant_events(mut self, events: Receiver<AssistantEvent>) -> Self {
        self.assistant_events = Some(events);
        self
    }

    /// Arguments handed to the executable on an exec restart
    pub fn with_launch_args(mut self, args: Vec<OsString>) -> Self {
        self.launch_args = args;
        self
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    fn set_state(&mut self, state: SupervisorState) {
        let label = state.to_string();
        let generation = self.generation;
        let restarts = self.restarts;
        self.status.update(|s| {
            s.supervisor_state = label;
            s.generation = generation;
            s.restarts = restarts;
        });
        self.state = state;
    }

    /// Run generations until shutdown is requested
    pub fn run(mut self) -> SupervisorState {
        loop {
            match self.run_generation() {
                GenerationOutcome::Shutdown => break,
                GenerationOutcome::Restart(reason) => {
                    if !self.cold_restart(reason) {
                        break;
                    }
                }
            }
        }
        self.set_state(SupervisorState::Stopped);
        tracing::info!("Supervisor stopped");
        self.state
    }

    /// Wait out the restart delay and relaunch. Returns false when a
    /// shutdown arrived in the meantime.
    fn cold_restart(&mut self, reason: RestartReason) -> bool {
        tracing::warn!("Cold restart: {}", reason);
        self.restarts += 1;
        self.set_state(SupervisorState::Restarting(reason));

        match self.shutdown.recv_timeout(self.config.supervisor.restart_delay()) {
            Err(RecvTimeoutError::Timeout) => {}
            _ => return false,
        }

        if self.config.supervisor.restart_mode == RestartMode::Exec {
            let err = self.exec_restart();
            tracing::error!("Failed to relaunch process: {}; restarting in place", err);
        }
        true
    }

    #[cfg(unix)]
    fn exec_restart(&self) -> std::io::Error {
        use std::os::unix::process::CommandExt;

        let exe = match std::env::current_exe() {
            Ok(exe) => exe,
            Err(e) => return e,
        };
        tracing::info!("Relaunching {} {:?}", exe.display(), self.launch_args);
        std::process::Command::new(exe).args(&self.launch_args).exec()
    }

    #[cfg(not(unix))]
    fn exec_restart(&self) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::Unsupported, "exec restart needs a Unix host")
    }

    /// One full lifecycle: probe, initialize, run until fault or shutdown,
    /// tear down
    pub fn run_generation(&mut self) -> GenerationOutcome {
        self.generation += 1;
        tracing::info!("Starting generation {}", self.generation);

        self.set_state(SupervisorState::Probing);
        if !self.backends.probe.is_reachable() {
            tracing::warn!("No connection, restarting");
            return GenerationOutcome::Restart(RestartReason::Unreachable);
        }

        self.set_state(SupervisorState::Initializing);
        let player = Arc::new(PlaybackController::new(
            self.backends.player.clone(),
            PlayerTimings::from_config(&self.config.player),
        ));
        let mut generation = Generation {
            lines: self.backends.lines.clone(),
            player: player.clone(),
            monitor: None,
            workers: Vec::new(),
            stop_tx: None,
        };

        let faults = match self.start(&mut generation, player) {
            Ok(faults) => faults,
            Err(e) => {
                tracing::error!("Startup failed: {}", e);
                generation.teardown();
                return GenerationOutcome::Restart(RestartReason::Fault(Fault::new(
                    "startup",
                    e.to_string(),
                )));
            }
        };

        self.set_state(SupervisorState::Running);
        tracing::info!("Radio running");

        let outcome = select! {
            recv(faults) -> fault => {
                let fault = fault.unwrap_or_else(|_| Fault::new("supervisor", "all workers exited"));
                tracing::error!("Fatal fault: {}", fault);
                GenerationOutcome::Restart(RestartReason::Fault(fault))
            }
            recv(self.shutdown) -> _ => GenerationOutcome::Shutdown,
        };

        generation.teardown();
        outcome
    }

    fn start(
        &mut self,
        generation: &mut Generation,
        player: Arc<PlaybackController>,
    ) -> Result<Receiver<Fault>> {
        let config = self.config.clone();
        let lines = self.backends.lines.clone();

        let table = Arc::new(ChannelTable::from_config(&config.channels)?);
        lines.setup(&table.pins())?;

        let registry = Arc::new(StationRegistry::from_channels(&config.channels)?);
        self.status.update(|s| s.stations = registry.iter().cloned().collect());

        player.initialize(&registry);
        thread::sleep(config.supervisor.boot_delay());

        let vote = VoteConfig {
            samples: config.input.sample_count,
            threshold: config.input.confirm_threshold,
            interval: config.input.sample_interval(),
        };
        let engine = Arc::new(SelectionEngine::new(
            table.clone(),
            lines.clone(),
            registry,
            player.clone(),
            vote,
            &config.default_channel,
            self.status.clone(),
        )?);
        engine.boot_scan()?;

        let (fault_tx, fault_rx) = unbounded();
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (edge_tx, edge_rx) = unbounded::<EdgeEvent>();
        generation.stop_tx = Some(stop_tx);

        generation.monitor = Some(EdgeMonitor::start(
            lines,
            table,
            config.input.poll_interval(),
            config.input.bounce_time(),
            edge_tx,
            fault_tx.clone(),
        )?);

        let edge_engine = engine.clone();
        let edge_stop = stop_rx.clone();
        generation.workers.push(spawn_worker("edge-dispatch", fault_tx.clone(), move || {
            dispatch_edges(&edge_engine, &edge_rx, &edge_stop)
        })?);

        if config.assistant.enabled {
            if let Some(events) = self.assistant_events.clone() {
                let stale = events.try_iter().count();
                if stale > 0 {
                    tracing::debug!("Dropped {} assistant events from before this generation", stale);
                }
                let hook = AssistantHook::new(player, self.status.clone());
                let delay = config.assistant.startup_delay();
                generation.workers.push(spawn_worker("assistant", fault_tx, move || {
                    dispatch_assistant(&hook, &events, &stop_rx, delay)
                })?);
            }
        }

        Ok(fault_rx)
    }
}

/// Spawn a worker whose error or panic becomes a fault
fn spawn_worker<F>(name: &'static str, faults: Sender<Fault>, body: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() -> std::result::Result<(), String> + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let fault = match panic::catch_unwind(AssertUnwindSafe(body)) {
                Ok(Ok(())) => return,
                Ok(Err(message)) => Fault::new(name, message),
                Err(_) => Fault::new(name, "worker panicked"),
            };
            let _ = faults.send(fault);
        })
        .map_err(Error::Io)
}

/// Service edges one at a time, each to completion
fn dispatch_edges(
    engine: &SelectionEngine,
    edges: &Receiver<EdgeEvent>,
    stop: &Receiver<()>,
) -> std::result::Result<(), String> {
    loop {
        select! {
            recv(edges) -> edge => {
                let Ok(edge) = edge else { return Ok(()) };
                match engine.handle_edge(edge.channel) {
                    Ok(SelectionOutcome::Selected { channel, ordinal }) => {
                        tracing::debug!("Edge selected {} (#{})", channel, ordinal);
                    }
                    Ok(outcome) => tracing::trace!("Edge outcome: {:?}", outcome),
                    Err(e) => return Err(e.to_string()),
                }
            }
            recv(stop) -> _ => return Ok(()),
        }
    }
}

/// Feed assistant events to the hook after the startup delay
fn dispatch_assistant(
    hook: &AssistantHook,
    events: &Receiver<AssistantEvent>,
    stop: &Receiver<()>,
    delay: Duration,
) -> std::result::Result<(), String> {
    match stop.recv_timeout(delay) {
        Err(RecvTimeoutError::Timeout) => {}
        _ => return Ok(()),
    }

    tracing::info!("Assistant hook active");

    loop {
        select! {
            recv(events) -> event => match event {
                Ok(event) => hook.handle(&event),
                Err(_) => return Err("assistant event stream closed".to_string()),
            },
            recv(stop) -> _ => return Ok(()),
        }
    }
}
