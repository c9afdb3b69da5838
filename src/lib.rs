//! # Rotary Radio
//!
//! Internet radio appliance driven by a physical position switch. Each
//! switch position is wired to one digital input line; the line that is
//! asserted picks the station the external player streams.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                        Supervisor (supervisor::runner)                   │
//! │   Probing ─► Initializing ─► Running ─► (fault) ─► Restarting ─► ...     │
//! │                                                                          │
//! │  ┌────────────────┐   ┌────────────────┐   ┌──────────────────────────┐  │
//! │  │ Connectivity   │   │ Station        │   │ Playback Controller      │  │
//! │  │ Gate           │   │ Registry       │──►│ (player::controller)     │  │
//! │  │ (network)      │   │ (stations)     │   │ stop ─ settle ─ play     │  │
//! │  └────────────────┘   └───────▲────────┘   └───────────▲──────────┬───┘  │
//! │                               │                        │          │      │
//! │  ┌─────────────┐  edges  ┌────┴──────────────────┐     │          ▼      │
//! │  │ Edge Monitor├────────►│ Selection Engine      │─────┘    ┌─────────┐  │
//! │  │ (input)     │         │ (selector::engine)    │          │ mpc     │  │
//! │  └──────▲──────┘         │ 5 samples, 3 to win   │          │ process │  │
//! │         │                └───────────▲───────────┘          └─────────┘  │
//! │  ┌──────┴──────┐                     │                           ▲       │
//! │  │ Input Lines │─────────────────────┘                           │       │
//! │  │ (sysfs GPIO)│          ┌───────────────────┐   pause/resume   │       │
//! │  └─────────────┘          │ Assistant Hook    │──────────────────┘       │
//! │                           └─────────▲─────────┘                          │
//! └─────────────────────────────────────┼────────────────────────────────────┘
//!                                       │ POST /api/assistant/events
//!                                ┌──────┴──────┐
//!                                │  Local API  │  GET /api/status
//!                                └─────────────┘
//! ```

pub mod api;
pub mod assistant;
pub mod config;
pub mod error;
pub mod input;
pub mod network;
pub mod player;
pub mod selector;
pub mod stations;
pub mod status;
pub mod supervisor;

pub use error::{Error, Result};

/// Reference values of the six-position deployment
pub mod constants {
    /// Minimum spacing between two accepted edges on one line
    pub const DEFAULT_BOUNCE_MS: u64 = 900;

    /// Edge source polling interval
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2;

    /// Samples taken per line during a vote
    pub const DEFAULT_SAMPLE_COUNT: usize = 5;

    /// Asserted samples needed to confirm a channel
    pub const DEFAULT_CONFIRM_THRESHOLD: usize = 3;

    /// Pause between sampling passes
    pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 10;

    /// Pause between `stop` and `play`
    pub const DEFAULT_SETTLE_MS: u64 = 100;

    /// Pause after clearing the playlist
    pub const DEFAULT_CLEAR_DELAY_MS: u64 = 50;

    /// Pause after each playlist addition
    pub const DEFAULT_ADD_DELAY_MS: u64 = 100;

    /// Backoff before retrying a failed player operation
    pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 2000;

    /// Connectivity probe connect timeout
    pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2000;

    /// Delay before a cold restart
    pub const DEFAULT_RESTART_DELAY_MS: u64 = 2000;

    /// Pause between playlist initialization and the boot scan
    pub const DEFAULT_BOOT_DELAY_MS: u64 = 100;

    /// Delay before assistant events are serviced
    pub const DEFAULT_ASSISTANT_DELAY_MS: u64 = 2000;

    /// Default port of the local API
    pub const DEFAULT_API_PORT: u16 = 8080;
}
