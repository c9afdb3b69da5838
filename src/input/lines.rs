//! Input line backends
//!
//! Lines are active-high. Reads have no side effects beyond the physical
//! read and may be issued from any thread.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::InputError;

/// Access to a fixed set of digital input lines
pub trait InputLines: Send + Sync {
    /// Claim the given lines as inputs
    fn setup(&self, pins: &[u32]) -> Result<(), InputError>;

    /// Current logic level of a line (`true` = asserted)
    fn read(&self, pin: u32) -> Result<bool, InputError>;

    /// Release every claimed line. Must be safe to call repeatedly.
    fn cleanup(&self);
}

/// Linux sysfs GPIO lines (`/sys/class/gpio`)
///
/// Pull-down bias cannot be set through sysfs; it has to come from the
/// board wiring or device tree.
///
/// Pins are numbered relative to the GPIO chip. The kernel number of a
/// line is `base + pin` (newer Raspberry Pi kernels place the main chip
/// at 512).
pub struct SysfsLines {
    root: PathBuf,
    base: u32,
    claimed: Mutex<Vec<u32>>,
}

impl SysfsLines {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_base(root, 0)
    }

    pub fn with_base(root: impl Into<PathBuf>, base: u32) -> Self {
        Self {
            root: root.into(),
            base,
            claimed: Mutex::new(Vec::new()),
        }
    }

    fn gpio(&self, pin: u32) -> u32 {
        self.base + pin
    }

    fn line_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", self.gpio(pin)))
    }

    fn write_attr(path: &Path, value: &str, pin: u32) -> Result<(), InputError> {
        fs::write(path, value).map_err(|e| InputError::SetupFailed {
            pin,
            reason: format!("{}: {}", path.display(), e),
        })
    }
}

impl InputLines for SysfsLines {
    fn setup(&self, pins: &[u32]) -> Result<(), InputError> {
        let mut claimed = self.claimed.lock();
        for &pin in pins {
            if !self.line_dir(pin).exists() {
                Self::write_attr(&self.root.join("export"), &self.gpio(pin).to_string(), pin)?;
            }
            Self::write_attr(&self.line_dir(pin).join("direction"), "in", pin)?;
            if !claimed.contains(&pin) {
                claimed.push(pin);
            }
        }
        tracing::info!("Configured {} input lines (pull-down bias from hardware)", pins.len());
        Ok(())
    }

    fn read(&self, pin: u32) -> Result<bool, InputError> {
        let path = self.line_dir(pin).join("value");
        let raw = fs::read_to_string(&path).map_err(|e| InputError::ReadFailed {
            pin,
            reason: e.to_string(),
        })?;
        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(InputError::InvalidValue {
                pin,
                value: other.to_string(),
            }),
        }
    }

    fn cleanup(&self) {
        let mut claimed = self.claimed.lock();
        for pin in claimed.drain(..) {
            if let Err(e) = fs::write(self.root.join("unexport"), self.gpio(pin).to_string()) {
                tracing::warn!("Failed to release line {}: {}", pin, e);
            }
        }
    }
}

#[derive(Default)]
struct SimulatedState {
    configured: HashSet<u32>,
    levels: HashMap<u32, bool>,
    scripts: HashMap<u32, VecDeque<bool>>,
    reads: HashMap<u32, usize>,
    setups: usize,
    cleanups: usize,
    lost: bool,
}

/// In-memory lines for bench-top runs and tests
///
/// Each line has a steady level plus an optional script of levels that
/// successive reads consume before falling back to the steady level.
#[derive(Default)]
pub struct SimulatedLines {
    state: Mutex<SimulatedState>,
}

impl SimulatedLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the steady level of a line
    pub fn set_level(&self, pin: u32, asserted: bool) {
        self.state.lock().levels.insert(pin, asserted);
    }

    /// Queue levels returned by the next reads of a line
    pub fn script(&self, pin: u32, levels: impl IntoIterator<Item = bool>) {
        self.state
            .lock()
            .scripts
            .entry(pin)
            .or_default()
            .extend(levels);
    }

    /// Number of reads issued against a line
    pub fn reads(&self, pin: u32) -> usize {
        self.state.lock().reads.get(&pin).copied().unwrap_or(0)
    }

    pub fn is_configured(&self, pin: u32) -> bool {
        self.state.lock().configured.contains(&pin)
    }

    /// Fail every read until the next setup, as a vanished line would
    pub fn lose_lines(&self) {
        self.state.lock().lost = true;
    }

    pub fn setup_count(&self) -> usize {
        self.state.lock().setups
    }

    pub fn cleanup_count(&self) -> usize {
        self.state.lock().cleanups
    }
}

impl InputLines for SimulatedLines {
    fn setup(&self, pins: &[u32]) -> Result<(), InputError> {
        let mut state = self.state.lock();
        state.configured.extend(pins.iter().copied());
        state.lost = false;
        state.setups += 1;
        Ok(())
    }

    fn read(&self, pin: u32) -> Result<bool, InputError> {
        let mut state = self.state.lock();
        if !state.configured.contains(&pin) {
            return Err(InputError::NotConfigured(pin));
        }
        if state.lost {
            return Err(InputError::ReadFailed {
                pin,
                reason: "line lost".to_string(),
            });
        }
        *state.reads.entry(pin).or_insert(0) += 1;
        let scripted = state.scripts.get_mut(&pin).and_then(|s| s.pop_front());
        Ok(scripted.unwrap_or_else(|| state.levels.get(&pin).copied().unwrap_or(false)))
    }

    fn cleanup(&self) {
        let mut state = self.state.lock();
        state.configured.clear();
        state.cleanups += 1;
    }
}
