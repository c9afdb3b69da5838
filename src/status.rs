//! Read-only view of the appliance for the local API

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

use crate::stations::Station;

/// The confirmed selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub channel: String,
    pub station: String,
    pub ordinal: usize,
    pub selected_at: DateTime<Utc>,
}

/// Everything the status endpoint reports
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub device_model: String,
    pub supervisor_state: String,
    pub generation: u64,
    pub restarts: u64,
    pub current: Option<Selection>,
    pub paused: bool,
    pub assistant_enabled: bool,
    pub stations: Vec<Station>,
}

/// Shared, lock-protected status snapshot
#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut StatusSnapshot)) {
        f(&mut *self.inner.write());
    }

    pub fn set_selection(&self, channel: &str, station: &Station) {
        self.update(|s| {
            s.current = Some(Selection {
                channel: channel.to_string(),
                station: station.name.clone(),
                ordinal: station.ordinal,
                selected_at: Utc::now(),
            });
            s.paused = false;
        });
    }

    pub fn set_paused(&self, paused: bool) {
        self.update(|s| s.paused = paused);
    }
}
