//! Digital input subsystem
//!
//! Line access is behind [`InputLines`] so the debounce engine can run
//! against real GPIO or against simulated lines.

pub mod edge;
pub mod lines;

pub use edge::{EdgeEvent, EdgeMonitor};
pub use lines::{InputLines, SimulatedLines, SysfsLines};

use std::sync::Arc;

use crate::config::{InputBackend, InputConfig};

/// Build the line backend selected by configuration
pub fn create_lines(config: &InputConfig) -> Arc<dyn InputLines> {
    match config.backend {
        InputBackend::Sysfs => Arc::new(SysfsLines::with_base(config.sysfs_root.clone(), config.sysfs_base)),
        InputBackend::Simulated => Arc::new(SimulatedLines::new()),
    }
}
