//! Voice-assistant hook
//!
//! Conversation lifecycle events pause and resume the player. The
//! selected channel is never touched: resuming continues the playlist at
//! the position the selector chose.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::player::PlaybackController;
use crate::status::StatusBoard;

/// Conversation lifecycle events delivered by the assistant integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantEvent {
    TurnStarted,
    /// `with_follow_on_turn` is absent when the assistant sent no details
    TurnFinished {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        with_follow_on_turn: Option<bool>,
    },
    TurnTimeout,
    /// Any other event kind; logged only
    #[serde(other)]
    Other,
}

/// Maps assistant events onto pause/resume
pub struct AssistantHook {
    player: Arc<PlaybackController>,
    status: StatusBoard,
}

impl AssistantHook {
    pub fn new(player: Arc<PlaybackController>, status: StatusBoard) -> Self {
        Self { player, status }
    }

    pub fn handle(&self, event: &AssistantEvent) {
        tracing::debug!("Assistant event: {:?}", event);
        match event {
            AssistantEvent::TurnStarted => self.on_turn_started(),
            AssistantEvent::TurnFinished { with_follow_on_turn: Some(follow_on) } => {
                self.on_turn_finished(*follow_on)
            }
            AssistantEvent::TurnFinished { with_follow_on_turn: None } => {
                tracing::debug!("Turn finished without details, staying paused");
            }
            AssistantEvent::TurnTimeout => self.on_turn_timeout(),
            AssistantEvent::Other => {}
        }
    }

    pub fn on_turn_started(&self) {
        match self.player.pause() {
            Ok(()) => self.status.set_paused(true),
            Err(e) => tracing::warn!("Failed to pause for assistant: {}", e),
        }
    }

    /// Resume unless the assistant expects the user to keep talking
    pub fn on_turn_finished(&self, had_follow_on: bool) {
        if had_follow_on {
            tracing::debug!("Follow-on turn expected, staying paused");
            return;
        }
        self.resume();
    }

    pub fn on_turn_timeout(&self) {
        self.resume();
    }

    fn resume(&self) {
        match self.player.resume() {
            Ok(()) => self.status.set_paused(false),
            Err(e) => tracing::warn!("Failed to resume after assistant: {}", e),
        }
    }
}
