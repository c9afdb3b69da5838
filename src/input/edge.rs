//! Rising-edge source
//!
//! Polls every channel line on a dedicated thread and emits an
//! [`EdgeEvent`] on each low-to-high transition. The bounce time is
//! enforced per line here, the way a GPIO interrupt layer would: an edge
//! arriving sooner than `bounce` after the last accepted edge on the same
//! line is dropped.

use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::InputError;
use crate::input::InputLines;
use crate::selector::{ChannelId, ChannelTable};
use crate::supervisor::Fault;

/// A rising edge on a channel line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub channel: ChannelId,
    pub at: Instant,
}

/// Per-line edge and bounce bookkeeping
pub struct EdgeDetector {
    previous: Vec<bool>,
    last_accepted: Vec<Option<Instant>>,
    bounce: Duration,
}

impl EdgeDetector {
    /// Start from the given baseline so lines already asserted do not fire
    pub fn new(baseline: Vec<bool>, bounce: Duration) -> Self {
        let len = baseline.len();
        Self {
            previous: baseline,
            last_accepted: vec![None; len],
            bounce,
        }
    }

    /// Record a sample; returns true when it is an accepted rising edge
    pub fn observe(&mut self, index: usize, level: bool, now: Instant) -> bool {
        let was = std::mem::replace(&mut self.previous[index], level);
        if was || !level {
            return false;
        }

        let clear = self.last_accepted[index]
            .map_or(true, |last| now.saturating_duration_since(last) >= self.bounce);
        if clear {
            self.last_accepted[index] = Some(now);
        }
        clear
    }
}

/// Background edge source
pub struct EdgeMonitor {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl EdgeMonitor {
    /// Spawn the polling thread
    pub fn start(
        lines: Arc<dyn InputLines>,
        table: Arc<ChannelTable>,
        poll_interval: Duration,
        bounce: Duration,
        events: Sender<EdgeEvent>,
        faults: Sender<Fault>,
    ) -> Result<Self, InputError> {
        let mut baseline = Vec::with_capacity(table.len());
        for channel in table.iter() {
            baseline.push(lines.read(channel.pin)?);
        }

        let running = Arc::new(AtomicBool::new(true));
        let running_for_loop = running.clone();

        let handle = thread::Builder::new()
            .name("edge-monitor".to_string())
            .spawn(move || {
                let mut detector = EdgeDetector::new(baseline, bounce);

                while running_for_loop.load(Ordering::Relaxed) {
                    for channel in table.iter() {
                        let level = match lines.read(channel.pin) {
                            Ok(level) => level,
                            Err(e) => {
                                tracing::error!("Edge monitor lost line {}: {}", channel.pin, e);
                                running_for_loop.store(false, Ordering::SeqCst);
                                let _ = faults.send(Fault::new("edge-monitor", e.to_string()));
                                return;
                            }
                        };

                        let now = Instant::now();
                        if detector.observe(channel.id.index(), level, now) {
                            tracing::trace!("Rising edge on {} (pin {})", channel.name, channel.pin);
                            if events.send(EdgeEvent { channel: channel.id, at: now }).is_err() {
                                running_for_loop.store(false, Ordering::SeqCst);
                                return;
                            }
                        }
                    }
                    thread::sleep(poll_interval);
                }
            })
            .map_err(|e| InputError::EdgeSource(e.to_string()))?;

        Ok(Self {
            running,
            thread_handle: Some(handle),
        })
    }

    /// Stop polling and join the thread
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for EdgeMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
