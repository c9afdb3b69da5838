//! Debounce/voting engine
//!
//! ```text
//!            edge                 vote ok, new channel
//!   Idle ──────────► Settling ─────────────────────────► Active(ch)
//!    ▲                  │  vote rejected                    │
//!    └──────────────────┘  (back to previous state)         │ edge
//!                                                           ▼
//!                                                       Settling
//! ```
//!
//! Edges are handled one at a time, synchronously, by a single dispatcher.
//! The vote and the update of the current channel happen under one lock;
//! the player call happens after it is released. The phase sits behind its
//! own lock so observers see `Settling` while a vote is running.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::{Error, InputError, Result};
use crate::input::InputLines;
use crate::player::PlaybackController;
use crate::selector::vote::{confirm_single, elect, SampleWindow, VoteConfig};
use crate::selector::{Channel, ChannelId, ChannelTable};
use crate::stations::{Station, StationRegistry};
use crate::status::StatusBoard;

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    /// No channel confirmed yet
    Idle,
    /// A vote is in progress; `trigger` is the line that fired, if any
    Settling { trigger: Option<ChannelId> },
    /// Confirmed selection
    Active(ChannelId),
}

/// Result of handling one edge or the boot scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// The vote did not confirm any channel
    Discarded,
    /// The confirmed channel is already active
    Unchanged(ChannelId),
    /// A new channel is active and playback was switched
    Selected { channel: ChannelId, ordinal: usize },
}


/// Converts edges into confirmed channel selections
pub struct SelectionEngine {
    table: Arc<ChannelTable>,
    lines: Arc<dyn InputLines>,
    registry: Arc<StationRegistry>,
    player: Arc<PlaybackController>,
    vote: VoteConfig,
    default_channel: ChannelId,
    status: StatusBoard,
    /// Held for a whole decision
    current: Mutex<Option<ChannelId>>,
    phase: Mutex<SelectorState>,
}

impl SelectionEngine {
    pub fn new(
        table: Arc<ChannelTable>,
        lines: Arc<dyn InputLines>,
        registry: Arc<StationRegistry>,
        player: Arc<PlaybackController>,
        vote: VoteConfig,
        default_channel: &str,
        status: StatusBoard,
    ) -> Result<Self> {
        let default_channel = table
            .by_name(default_channel)
            .map(|c| c.id)
            .ok_or_else(|| Error::Config(format!("default channel {} is not configured", default_channel)))?;

        Ok(Self {
            table,
            lines,
            registry,
            player,
            vote,
            default_channel,
            status,
            current: Mutex::new(None),
            phase: Mutex::new(SelectorState::Idle),
        })
    }

    /// Last confirmed channel
    pub fn current(&self) -> Option<ChannelId> {
        *self.current.lock()
    }

    pub fn state(&self) -> SelectorState {
        *self.phase.lock()
    }

    fn set_phase(&self, phase: SelectorState) {
        *self.phase.lock() = phase;
    }

    fn settle(&self, current: Option<ChannelId>) {
        self.set_phase(current.map_or(SelectorState::Idle, SelectorState::Active));
    }

    pub fn table(&self) -> &ChannelTable {
        &self.table
    }

    /// Handle a rising edge on `trigger`'s line
    pub fn handle_edge(&self, trigger: ChannelId) -> Result<SelectionOutcome> {
        self.decide(Some(trigger))
    }

    /// Select whatever the lines show at boot, or the default channel
    pub fn boot_scan(&self) -> Result<SelectionOutcome> {
        self.decide(None)
    }

    fn decide(&self, trigger: Option<ChannelId>) -> Result<SelectionOutcome> {
        let (channel, station) = {
            let mut current = self.current.lock();
            self.set_phase(SelectorState::Settling { trigger });

            let voted = match trigger {
                Some(trigger) => self.vote_on_edge(trigger),
                None => self.vote_all(),
            };
            let confirmed = match voted {
                Ok(confirmed) => confirmed,
                Err(e) => {
                    self.settle(*current);
                    return Err(e.into());
                }
            };

            let confirmed = match (confirmed, trigger) {
                (Some(channel), _) => channel,
                (None, Some(trigger)) => {
                    tracing::debug!("Edge on {} rejected by vote", trigger);
                    self.settle(*current);
                    return Ok(SelectionOutcome::Discarded);
                }
                (None, None) => {
                    tracing::info!("No line asserted at boot, using default channel");
                    self.default_channel
                }
            };

            let (channel, station) = match self.resolve(confirmed) {
                Ok(resolved) => resolved,
                Err(e) => {
                    self.settle(*current);
                    return Err(e);
                }
            };

            self.set_phase(SelectorState::Active(channel.id));
            if *current == Some(channel.id) {
                return Ok(SelectionOutcome::Unchanged(channel.id));
            }
            *current = Some(channel.id);
            (channel, station)
        };

        tracing::info!("Channel is {} (pin {})", channel.name, channel.pin);
        self.player.select(&station);
        self.status.set_selection(&channel.name, &station);

        Ok(SelectionOutcome::Selected {
            channel: channel.id,
            ordinal: station.ordinal,
        })
    }

    fn vote_on_edge(&self, trigger: ChannelId) -> std::result::Result<Option<ChannelId>, InputError> {
        let pin = self
            .table
            .get(trigger)
            .map(|c| c.pin)
            .ok_or_else(|| InputError::EdgeSource(format!("edge on unknown channel {}", trigger)))?;

        if self.lines.read(pin)? {
            let window = SampleWindow::collect_single(self.lines.as_ref(), &self.table, trigger, &self.vote)?;
            let confirmed = confirm_single(&window, trigger, self.vote.threshold);
            tracing::debug!(
                "Line {} vote: {}/{} asserted",
                pin,
                window.asserted(trigger),
                window.len()
            );
            Ok(confirmed.then_some(trigger))
        } else {
            // The triggering line already dropped; another line may be the
            // real cause
            self.vote_all()
        }
    }

    fn vote_all(&self) -> std::result::Result<Option<ChannelId>, InputError> {
        let window = SampleWindow::collect_all(self.lines.as_ref(), &self.table, &self.vote)?;
        Ok(elect(&window, &self.table, self.vote.threshold))
    }

    /// Channel and station to play, falling back to the default channel
    /// when the mapping is missing
    fn resolve(&self, id: ChannelId) -> Result<(Channel, Station)> {
        let channel = self.table.get(id).cloned();
        if let Some(channel) = channel {
            match self.registry.resolve(&channel) {
                Ok(station) => return Ok((channel, station.clone())),
                Err(e) => tracing::warn!("{}; selecting default channel", e),
            }
        } else {
            tracing::warn!("Unknown channel {} in selection; selecting default channel", id);
        }

        let default = self
            .table
            .get(self.default_channel)
            .cloned()
            .ok_or_else(|| Error::Config("default channel missing from table".into()))?;
        let station = self.registry.resolve(&default)?.clone();
        Ok((default, station))
    }
}
